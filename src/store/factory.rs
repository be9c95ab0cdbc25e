use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result};

use crate::context::Context;
use crate::logs::Logger;

use super::config::{DbConfig, DbType};
use super::{MemoryStore, SqlStore, UnionStore};

pub struct StoreFactory;

impl StoreFactory {
    pub fn new() -> Self {
        Self
    }

    /// Builds the configured backend. The relational store is migrated and
    /// verified before it is returned.
    pub fn build_store(&self, ctx: &Context, log: &Logger, cfg: &DbConfig) -> Result<Arc<UnionStore>> {
        let store = match cfg.backend {
            DbType::Sqlite => UnionStore::Sql(self.build_sqlite(ctx, log, cfg)?),
            DbType::Memory => UnionStore::Memory(MemoryStore::new()),
        };
        log.info(format!("Using {} store", store.backend_name()));
        Ok(Arc::new(store))
    }

    /// Opens the relational database without migrating it.
    pub fn build_unmigrated(&self, cfg: &DbConfig) -> Result<SqlStore> {
        if cfg.sqlite.memory {
            anyhow::bail!("migration tooling needs a file database, sqlite.memory is set");
        }
        let store = SqlStore::open_unmigrated(Path::new(&cfg.sqlite.path), &cfg.ledger_table)
            .with_context(|| format!("open sqlite database '{}'", cfg.sqlite.path))?;
        Ok(store)
    }

    fn build_sqlite(&self, ctx: &Context, log: &Logger, cfg: &DbConfig) -> Result<SqlStore> {
        if cfg.sqlite.memory {
            return SqlStore::memory(ctx, log, &cfg.ledger_table).context("open sqlite memory database");
        }
        let store = SqlStore::open(ctx, log, Path::new(&cfg.sqlite.path), &cfg.ledger_table)
            .with_context(|| format!("open sqlite database '{}'", cfg.sqlite.path))?;
        Ok(store)
    }
}

impl Default for StoreFactory {
    fn default() -> Self {
        Self::new()
    }
}
