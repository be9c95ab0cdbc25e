use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::{expandenv, CommonConfig, PathSet};
use crate::migrate;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DbConfig {
    #[serde(default = "DbConfig::default_backend")]
    pub backend: DbType,

    #[serde(default = "SqliteConfig::default")]
    pub sqlite: SqliteConfig,

    #[serde(default = "DbConfig::default_ledger_table")]
    pub ledger_table: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub enum DbType {
    #[serde(rename = "sqlite")]
    Sqlite,

    #[serde(rename = "memory")]
    Memory,
}

impl CommonConfig for DbConfig {
    fn default() -> Self {
        Self {
            backend: Self::default_backend(),
            sqlite: SqliteConfig::default(),
            ledger_table: Self::default_ledger_table(),
        }
    }

    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        migrate::validate_table_name(&self.ledger_table).context("ledger_table")?;
        if let DbType::Sqlite = self.backend {
            self.sqlite.complete(ps).context("sqlite")?;
        }
        Ok(())
    }
}

impl DbConfig {
    fn default_backend() -> DbType {
        DbType::Sqlite
    }

    fn default_ledger_table() -> String {
        String::from("schema_migrations")
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SqliteConfig {
    #[serde(default = "SqliteConfig::default_memory")]
    pub memory: bool,

    #[serde(default = "SqliteConfig::default_path")]
    pub path: String,
}

impl CommonConfig for SqliteConfig {
    fn default() -> Self {
        Self {
            memory: Self::default_memory(),
            path: Self::default_path(),
        }
    }

    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        if self.memory {
            return Ok(());
        }

        self.path = expandenv("path", &self.path)?;
        if self.path.is_empty() {
            let path = ps.data_file("warden.db")?;
            self.path = format!("{}", path.display());
        }

        Ok(())
    }
}

impl SqliteConfig {
    fn default_memory() -> bool {
        false
    }

    fn default_path() -> String {
        String::new()
    }
}
