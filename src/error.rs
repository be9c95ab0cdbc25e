use std::fmt;

use thiserror::Error;

/// The kind of record an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Role,
    Action,
    Permission,
    Assignment,
    GroupAssignment,
    Actor,
    Group,
}

/// Errors returned by the repository contracts.
///
/// `NotFound` and `AlreadyExists` are recognized right after the statement
/// that produced them. Everything else is a store failure that callers must
/// not interpret further.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0} not found")]
    NotFound(Entity),

    #[error("{0} already exists")]
    AlreadyExists(Entity),

    #[error("context canceled")]
    Canceled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,

    #[error("store failure: {0:#}")]
    Store(#[from] anyhow::Error),
}

/// Structural view of an [`Error`], comparable with `==`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound(Entity),
    AlreadyExists(Entity),
    Store,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(entity) => ErrorKind::NotFound(*entity),
            Self::AlreadyExists(entity) => ErrorKind::AlreadyExists(*entity),
            Self::Canceled | Self::DeadlineExceeded | Self::Store(_) => ErrorKind::Store,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(err.into())
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Role => "role",
            Self::Action => "action",
            Self::Permission => "permission",
            Self::Assignment => "assignment",
            Self::GroupAssignment => "group assignment",
            Self::Actor => "actor",
            Self::Group => "group",
        };
        f.write_str(name)
    }
}
