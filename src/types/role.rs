use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// A named bundle of permissions. Role names are globally unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,

    #[serde(default = "default_vec")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<Permission>,
}

/// The named operation a permission grants, e.g. `read` or `write`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Action(String);

/// A grant of one action on one resource pattern. The pattern is opaque and
/// only ever compared by exact equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub action: Action,
    pub resource_pattern: String,
}

impl Role {
    pub fn new(name: impl Into<String>, permissions: Vec<Permission>) -> Self {
        Self {
            name: name.into(),
            permissions,
        }
    }
}

impl Action {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Action {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Action {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Permission {
    pub fn new(action: impl Into<Action>, resource_pattern: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            resource_pattern: resource_pattern.into(),
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.action, self.resource_pattern)
    }
}

/// Parses `ACTION:PATTERN`. Only the first colon separates the two parts, so
/// patterns may themselves contain colons.
impl FromStr for Permission {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let Some((action, pattern)) = s.split_once(':') else {
            bail!("invalid permission '{s}', expect 'ACTION:PATTERN'");
        };
        if action.is_empty() {
            bail!("invalid permission '{s}', action cannot be empty");
        }
        if pattern.is_empty() {
            bail!("invalid permission '{s}', resource pattern cannot be empty");
        }
        Ok(Self::new(action, pattern))
    }
}

fn default_vec<T>() -> Vec<T> {
    Vec::new()
}
