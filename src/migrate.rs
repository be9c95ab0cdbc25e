//! Versioned schema migrations with an applied-migrations ledger.
//!
//! A migration's version is its 0-based position in the ordered list handed to
//! the engine, never a number chosen by its author. The ledger table records
//! `(version, name, applied_at)` for every applied migration, and each row is
//! written or removed in the same transaction as the migration itself, so the
//! ledger and the schema can never disagree.

use std::collections::HashSet;

use anyhow::Result as AnyResult;
use chrono::Local;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use thiserror::Error;

use crate::context::Context;
use crate::logs::Logger;

/// One forward/backward schema transformation.
pub trait Migration: Send + Sync {
    fn name(&self) -> &str;
    fn up(&self, tx: &Transaction) -> AnyResult<()>;
    fn down(&self, tx: &Transaction) -> AnyResult<()>;
}

/// A migration made of two SQL scripts.
pub struct SqlMigration {
    pub name: &'static str,
    pub up: &'static str,
    pub down: &'static str,
}

impl Migration for SqlMigration {
    fn name(&self) -> &str {
        self.name
    }

    fn up(&self, tx: &Transaction) -> AnyResult<()> {
        tx.execute_batch(self.up)?;
        Ok(())
    }

    fn down(&self, tx: &Transaction) -> AnyResult<()> {
        tx.execute_batch(self.down)?;
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("migrations out of sync: {0}")]
    OutOfSync(String),

    #[error("migration {version} '{name}' failed: {source:#}")]
    Failed {
        version: usize,
        name: String,
        source: anyhow::Error,
    },

    #[error("invalid ledger table name '{0}'")]
    InvalidLedger(String),

    #[error("migration interrupted: {0}")]
    Interrupted(crate::error::Error),

    #[error("migration store failure: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for MigrationError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(err.into())
    }
}

impl From<crate::error::Error> for MigrationError {
    fn from(err: crate::error::Error) -> Self {
        use crate::error::Error;
        match err {
            Error::Canceled | Error::DeadlineExceeded => Self::Interrupted(err),
            err => Self::Store(err.into()),
        }
    }
}

pub type Result<T, E = MigrationError> = std::result::Result<T, E>;

/// A row of the ledger joined with the expected migration list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub version: usize,
    pub name: String,
    pub applied_at: Option<i64>,
}

/// Applies every migration not yet recorded in the ledger, in list order.
///
/// Each migration runs in its own transaction together with its ledger
/// insert. The run stops at the first failure; migrations after it are never
/// attempted. Returns the number of migrations applied by this call.
pub fn apply_migrations(
    ctx: &Context,
    log: &Logger,
    conn: &mut Connection,
    table: &str,
    migrations: &[Box<dyn Migration>],
) -> Result<usize> {
    validate_table_name(table)?;
    check(ctx)?;
    ensure_ledger(log, conn, table)?;
    let applied = applied_versions(conn, table)?;

    let mut count = 0;
    for (version, migration) in migrations.iter().enumerate() {
        if applied.contains(&(version as i64)) {
            continue;
        }
        check(ctx)?;

        let log = log.with("version", version).with("migration", migration.name());
        log.info("Applying migration");

        let tx = conn.transaction()?;
        let result = migration
            .up(&tx)
            .map_err(|source| MigrationError::Failed {
                version,
                name: migration.name().to_string(),
                source,
            })
            .and_then(|_| {
                let sql = format!("INSERT INTO {table} (version, name, applied_at) VALUES (?, ?, ?)");
                log.debug(format!("Database record_migration: {sql}"));
                tx.execute(
                    &sql,
                    params![version as i64, migration.name(), Local::now().timestamp()],
                )?;
                check(ctx)
            });
        finish(&log, tx, result)?;
        count += 1;
    }

    if count == 0 {
        log.debug("No pending migrations");
    }
    Ok(count)
}

/// Reverts the most recently applied migration, or every applied migration
/// when `all` is set. Walks the list newest-first; each `down` runs in one
/// transaction with the removal of its ledger row. Returns the number of
/// migrations reverted.
pub fn rollback_migrations(
    ctx: &Context,
    log: &Logger,
    conn: &mut Connection,
    table: &str,
    migrations: &[Box<dyn Migration>],
    all: bool,
) -> Result<usize> {
    validate_table_name(table)?;
    check(ctx)?;
    if !ledger_exists(conn, table)? {
        log.info("Migration ledger does not exist, nothing to roll back");
        return Ok(0);
    }
    let applied = applied_versions(conn, table)?;

    // Refuse to skip over migrations this code does not know how to revert.
    if let Some(unknown) = applied.iter().find(|v| **v as usize >= migrations.len()) {
        return Err(MigrationError::OutOfSync(format!(
            "ledger contains version {unknown} but only {} migrations are known",
            migrations.len()
        )));
    }

    let mut count = 0;
    for (version, migration) in migrations.iter().enumerate().rev() {
        if !applied.contains(&(version as i64)) {
            continue;
        }
        check(ctx)?;

        let log = log.with("version", version).with("migration", migration.name());
        log.info("Rolling back migration");

        let tx = conn.transaction()?;
        let result = migration
            .down(&tx)
            .map_err(|source| MigrationError::Failed {
                version,
                name: migration.name().to_string(),
                source,
            })
            .and_then(|_| {
                let sql = format!("DELETE FROM {table} WHERE version = ?");
                log.debug(format!("Database delete_migration: {sql}"));
                tx.execute(&sql, params![version as i64])?;
                check(ctx)
            });
        finish(&log, tx, result)?;
        count += 1;

        if !all {
            break;
        }
    }
    Ok(count)
}

/// Checks that the ledger records exactly the expected list: same count, and
/// the same name at every version.
pub fn verify_applied_migrations(
    ctx: &Context,
    log: &Logger,
    conn: &Connection,
    table: &str,
    migrations: &[Box<dyn Migration>],
) -> Result<()> {
    validate_table_name(table)?;
    check(ctx)?;
    let ledger = if ledger_exists(conn, table)? {
        ledger_rows(conn, table)?
    } else {
        Vec::new()
    };

    if ledger.len() != migrations.len() {
        return Err(MigrationError::OutOfSync(format!(
            "expect {} applied migrations, found {}",
            migrations.len(),
            ledger.len()
        )));
    }

    for (expected_version, ((version, name, _), migration)) in
        ledger.iter().zip(migrations.iter()).enumerate()
    {
        if *version as usize != expected_version || name != migration.name() {
            return Err(MigrationError::OutOfSync(format!(
                "expect version {expected_version} to be '{}', found version {version} '{name}'",
                migration.name()
            )));
        }
    }

    log.debug(format!("Verified {} applied migrations", ledger.len()));
    Ok(())
}

/// Reports every known migration and when it was applied, followed by any
/// ledger rows that the list does not know about.
pub fn migration_status(
    conn: &Connection,
    table: &str,
    migrations: &[Box<dyn Migration>],
) -> Result<Vec<MigrationStatus>> {
    validate_table_name(table)?;
    let ledger = if ledger_exists(conn, table)? {
        ledger_rows(conn, table)?
    } else {
        Vec::new()
    };

    let mut status: Vec<MigrationStatus> = migrations
        .iter()
        .enumerate()
        .map(|(version, migration)| MigrationStatus {
            version,
            name: migration.name().to_string(),
            applied_at: ledger
                .iter()
                .find(|(v, name, _)| *v as usize == version && name == migration.name())
                .map(|(_, _, applied_at)| *applied_at),
        })
        .collect();

    for (version, name, applied_at) in ledger {
        if version as usize >= migrations.len() {
            status.push(MigrationStatus {
                version: version as usize,
                name,
                applied_at: Some(applied_at),
            });
        }
    }
    Ok(status)
}

/// The ledger name is spliced into SQL text, so only plain identifiers are
/// accepted.
pub fn validate_table_name(table: &str) -> Result<()> {
    let mut chars = table.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if !valid {
        return Err(MigrationError::InvalidLedger(table.to_string()));
    }
    Ok(())
}

fn check(ctx: &Context) -> Result<()> {
    ctx.check()?;
    Ok(())
}

fn finish(log: &Logger, tx: Transaction, result: Result<()>) -> Result<()> {
    match result {
        Ok(()) => {
            tx.commit()?;
            Ok(())
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback() {
                log.warn(format!("Rollback migration failed: {rollback_err:#}"));
            }
            log.error(format!("Migration aborted: {err}"));
            Err(err)
        }
    }
}

fn ensure_ledger(log: &Logger, conn: &Connection, table: &str) -> Result<()> {
    let sql = format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            version INTEGER PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            applied_at INTEGER NOT NULL
        )"
    );
    log.debug(format!("Database ensure_ledger: {table}"));
    conn.execute_batch(&sql)?;
    Ok(())
}

fn ledger_exists(conn: &Connection, table: &str) -> Result<bool> {
    let name: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
            params![table],
            |row| row.get(0),
        )
        .optional()?;
    Ok(name.is_some())
}

fn applied_versions(conn: &Connection, table: &str) -> Result<HashSet<i64>> {
    let mut stmt = conn.prepare(&format!("SELECT version FROM {table}"))?;
    let versions = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<HashSet<i64>>>()?;
    Ok(versions)
}

fn ledger_rows(conn: &Connection, table: &str) -> Result<Vec<(i64, String, i64)>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT version, name, applied_at FROM {table} ORDER BY version ASC"
    ))?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use anyhow::bail;

    use super::*;

    const LEDGER: &str = "schema_migrations";

    struct Failing;

    impl Migration for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn up(&self, tx: &Transaction) -> AnyResult<()> {
            tx.execute_batch("CREATE TABLE half_done (id INTEGER);")?;
            bail!("boom");
        }

        fn down(&self, _tx: &Transaction) -> AnyResult<()> {
            Ok(())
        }
    }

    fn list() -> Vec<Box<dyn Migration>> {
        vec![
            Box::new(SqlMigration {
                name: "create_a",
                up: "CREATE TABLE a (id INTEGER PRIMARY KEY);",
                down: "DROP TABLE a;",
            }),
            Box::new(SqlMigration {
                name: "create_b",
                up: "CREATE TABLE b (id INTEGER PRIMARY KEY);",
                down: "DROP TABLE b;",
            }),
            Box::new(SqlMigration {
                name: "add_b_name",
                up: "ALTER TABLE b ADD COLUMN name TEXT;",
                down: "ALTER TABLE b DROP COLUMN name;",
            }),
        ]
    }

    fn table_exists(conn: &Connection, name: &str) -> bool {
        ledger_exists(conn, name).unwrap()
    }

    fn open() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn test_apply_idempotent() {
        let ctx = Context::background();
        let log = Logger::new();
        let mut conn = open();
        let migrations = list();

        assert_eq!(apply_migrations(&ctx, &log, &mut conn, LEDGER, &migrations).unwrap(), 3);
        verify_applied_migrations(&ctx, &log, &conn, LEDGER, &migrations).unwrap();

        // A second run must not execute any `up` again; re-running ALTER TABLE
        // would fail with a duplicate column.
        assert_eq!(apply_migrations(&ctx, &log, &mut conn, LEDGER, &migrations).unwrap(), 0);
        verify_applied_migrations(&ctx, &log, &conn, LEDGER, &migrations).unwrap();

        let status = migration_status(&conn, LEDGER, &migrations).unwrap();
        assert_eq!(status.len(), 3);
        assert!(status.iter().all(|s| s.applied_at.is_some()));
        assert_eq!(status[2].name, "add_b_name");
    }

    #[test]
    fn test_apply_incremental() {
        let ctx = Context::background();
        let log = Logger::new();
        let mut conn = open();
        let mut migrations = list();
        let last = migrations.pop().unwrap();

        assert_eq!(apply_migrations(&ctx, &log, &mut conn, LEDGER, &migrations).unwrap(), 2);
        migrations.push(last);

        let err = verify_applied_migrations(&ctx, &log, &conn, LEDGER, &migrations).unwrap_err();
        assert!(matches!(err, MigrationError::OutOfSync(_)));

        assert_eq!(apply_migrations(&ctx, &log, &mut conn, LEDGER, &migrations).unwrap(), 1);
        verify_applied_migrations(&ctx, &log, &conn, LEDGER, &migrations).unwrap();
    }

    #[test]
    fn test_apply_failure_stops() {
        let ctx = Context::background();
        let log = Logger::new();
        let mut conn = open();
        let mut migrations = list();
        migrations.insert(1, Box::new(Failing));

        let err = apply_migrations(&ctx, &log, &mut conn, LEDGER, &migrations).unwrap_err();
        match err {
            MigrationError::Failed { version, name, .. } => {
                assert_eq!(version, 1);
                assert_eq!(name, "failing");
            }
            err => panic!("unexpected error: {err}"),
        }

        assert!(table_exists(&conn, "a"));
        // The failing migration was rolled back and later ones never ran.
        assert!(!table_exists(&conn, "half_done"));
        assert!(!table_exists(&conn, "b"));

        let status = migration_status(&conn, LEDGER, &migrations).unwrap();
        let applied: Vec<_> = status.iter().filter(|s| s.applied_at.is_some()).collect();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].name, "create_a");
    }

    #[test]
    fn test_rollback() {
        let ctx = Context::background();
        let log = Logger::new();
        let mut conn = open();
        let migrations = list();

        apply_migrations(&ctx, &log, &mut conn, LEDGER, &migrations).unwrap();

        assert_eq!(
            rollback_migrations(&ctx, &log, &mut conn, LEDGER, &migrations, false).unwrap(),
            1
        );
        assert!(table_exists(&conn, "b"));
        let status = migration_status(&conn, LEDGER, &migrations).unwrap();
        assert!(status[2].applied_at.is_none());
        assert!(status[1].applied_at.is_some());

        assert_eq!(
            rollback_migrations(&ctx, &log, &mut conn, LEDGER, &migrations, true).unwrap(),
            2
        );
        assert!(!table_exists(&conn, "a"));
        assert!(!table_exists(&conn, "b"));

        assert_eq!(
            rollback_migrations(&ctx, &log, &mut conn, LEDGER, &migrations, true).unwrap(),
            0
        );

        // Everything can be re-applied after a full rollback.
        assert_eq!(apply_migrations(&ctx, &log, &mut conn, LEDGER, &migrations).unwrap(), 3);
    }

    #[test]
    fn test_rollback_without_ledger() {
        let mut conn = open();
        let count = rollback_migrations(
            &Context::background(),
            &Logger::new(),
            &mut conn,
            LEDGER,
            &list(),
            true,
        )
        .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_verify_renamed() {
        let ctx = Context::background();
        let log = Logger::new();
        let mut conn = open();
        apply_migrations(&ctx, &log, &mut conn, LEDGER, &list()).unwrap();

        let mut renamed = list();
        renamed[1] = Box::new(SqlMigration {
            name: "create_b_renamed",
            up: "",
            down: "",
        });
        let err = verify_applied_migrations(&ctx, &log, &conn, LEDGER, &renamed).unwrap_err();
        assert!(matches!(err, MigrationError::OutOfSync(_)));

        // Code older than the database cannot roll back what it doesn't know.
        let mut older = list();
        older.pop();
        let err = verify_applied_migrations(&ctx, &log, &conn, LEDGER, &older).unwrap_err();
        assert!(matches!(err, MigrationError::OutOfSync(_)));
        let err = rollback_migrations(&ctx, &log, &mut conn, LEDGER, &older, false).unwrap_err();
        assert!(matches!(err, MigrationError::OutOfSync(_)));
    }

    #[test]
    fn test_canceled() {
        let ctx = Context::background();
        ctx.cancel();
        let mut conn = open();
        let err = apply_migrations(&ctx, &Logger::new(), &mut conn, LEDGER, &list()).unwrap_err();
        assert!(matches!(err, MigrationError::Interrupted(_)));
        assert!(!table_exists(&conn, "a"));
    }

    #[test]
    fn test_validate_table_name() {
        assert!(validate_table_name("schema_migrations").is_ok());
        assert!(validate_table_name("_ledger2").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("2ledger").is_err());
        assert!(validate_table_name("ledger; DROP TABLE role").is_err());
    }
}
