mod builder;
mod permission;
mod role;
mod schema;

pub use schema::schema_migrations;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::anyhow;
use rusqlite::types::Value;
use rusqlite::{ffi, params_from_iter, Connection as RawConnection, OptionalExtension, Row};
use rusqlite::{ErrorCode, Transaction as RawTransaction};

use crate::context::Context;
use crate::error::{Entity, Error, Result};
use crate::logs::Logger;
use crate::migrate::{self, MigrationError, MigrationStatus};
use crate::types::{Action, Actor, Group, Permission, Role};

use super::{PermissionRepo, RoleRepo};

/// Relational store on SQLite. Supports both file-based and in-memory
/// databases.
///
/// One connection is shared by all callers behind a mutex; every repository
/// call runs inside its own transaction on that connection, so calls are
/// serialized and never observe each other's partial writes.
pub struct SqlStore {
    conn: Mutex<RawConnection>,
    ledger: String,
}

/// A transaction bound to the context and logger of one repository call.
/// Every statement checks the context first and is logged at debug level.
pub struct SqlTransaction<'a> {
    tx: RawTransaction<'a>,
    ctx: &'a Context,
    log: &'a Logger,
}

impl SqlStore {
    /// Opens a SQLite database file, creating it if it doesn't exist, then
    /// applies pending migrations and verifies the ledger.
    pub fn open(ctx: &Context, log: &Logger, path: &Path, ledger: &str) -> Result<Self> {
        let store = Self::open_unmigrated(path, ledger)?;
        store.migrate(ctx, log)?;
        Ok(store)
    }

    /// Creates a migrated in-memory database. Content is lost when the store
    /// is dropped.
    pub fn memory(ctx: &Context, log: &Logger, ledger: &str) -> Result<Self> {
        let conn = RawConnection::open_in_memory()?;
        let store = Self::from_connection(conn, ledger)?;
        store.migrate(ctx, log)?;
        Ok(store)
    }

    /// Opens a database without touching its schema. Used by migration
    /// tooling, which manages the ledger itself.
    pub fn open_unmigrated(path: &Path, ledger: &str) -> Result<Self> {
        let conn = RawConnection::open(path)?;
        Self::from_connection(conn, ledger)
    }

    fn from_connection(conn: RawConnection, ledger: &str) -> Result<Self> {
        migrate::validate_table_name(ledger).map_err(|err| Error::Store(err.into()))?;
        // Cascades on role deletion rely on foreign keys, which SQLite
        // disables by default per connection.
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: Mutex::new(conn),
            ledger: ledger.to_string(),
        })
    }

    fn migrate(&self, ctx: &Context, log: &Logger) -> Result<()> {
        let migrations = schema_migrations();
        let mut conn = self.lock()?;
        let applied = migrate::apply_migrations(ctx, log, &mut conn, &self.ledger, &migrations)
            .map_err(convert_migration_error)?;
        if applied > 0 {
            log.info(format!("Applied {applied} schema migrations"));
        }
        migrate::verify_applied_migrations(ctx, log, &conn, &self.ledger, &migrations)
            .map_err(convert_migration_error)
    }

    pub fn apply_migrations(&self, ctx: &Context, log: &Logger) -> Result<usize, MigrationError> {
        let mut conn = self.lock()?;
        migrate::apply_migrations(ctx, log, &mut conn, &self.ledger, &schema_migrations())
    }

    pub fn rollback_migrations(
        &self,
        ctx: &Context,
        log: &Logger,
        all: bool,
    ) -> Result<usize, MigrationError> {
        let mut conn = self.lock()?;
        migrate::rollback_migrations(ctx, log, &mut conn, &self.ledger, &schema_migrations(), all)
    }

    pub fn verify_migrations(&self, ctx: &Context, log: &Logger) -> Result<(), MigrationError> {
        let conn = self.lock()?;
        migrate::verify_applied_migrations(ctx, log, &conn, &self.ledger, &schema_migrations())
    }

    pub fn migration_status(&self) -> Result<Vec<MigrationStatus>, MigrationError> {
        let conn = self.lock()?;
        migrate::migration_status(&conn, &self.ledger, &schema_migrations())
    }

    /// Executes `f` within a transaction:
    /// - if `f` succeeds and the context is still live, the transaction is
    ///   committed, and a commit failure becomes the call's error
    /// - otherwise it is rolled back and the original error is returned; a
    ///   failing rollback is only logged
    pub fn with_transaction<T, F>(&self, ctx: &Context, log: &Logger, op: &str, f: F) -> Result<T>
    where
        F: FnOnce(&SqlTransaction) -> Result<T>,
    {
        let mut conn = match ctx.check().and_then(|_| self.lock()) {
            Ok(conn) => conn,
            Err(err) => return Err(log_failure(log, op, err)),
        };
        let tx = match conn.transaction() {
            Ok(tx) => SqlTransaction { tx, ctx, log },
            Err(err) => return Err(log_failure(log, op, err.into())),
        };

        let result = f(&tx).and_then(|value| {
            ctx.check()?;
            Ok(value)
        });

        match result {
            Ok(value) => {
                if let Err(err) = tx.tx.commit() {
                    log.error(format!("Database {op} commit failed: {err:#}"));
                    return Err(err.into());
                }
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.tx.rollback() {
                    log.warn(format!("Database {op} rollback failed: {rollback_err:#}"));
                }
                Err(log_failure(log, op, err))
            }
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, RawConnection>> {
        match self.conn.lock() {
            Ok(conn) => Ok(conn),
            Err(e) => Err(Error::Store(anyhow!("failed to lock database: {e:#}"))),
        }
    }
}

impl SqlTransaction<'_> {
    pub fn execute(&self, op: &str, (sql, values): (String, Vec<Value>)) -> Result<usize> {
        self.ctx.check()?;
        self.log.debug(format!("Database {op}: {sql}, {values:?}"));
        let count = self.tx.execute(&sql, params_from_iter(values.iter()))?;
        Ok(count)
    }

    /// Inserts one row and returns its id. A uniqueness violation is
    /// reported as `AlreadyExists(entity)`.
    pub fn insert(&self, op: &str, entity: Entity, (sql, values): (String, Vec<Value>)) -> Result<i64> {
        self.ctx.check()?;
        self.log.debug(format!("Database {op}: {sql}, {values:?}"));
        match self.tx.execute(&sql, params_from_iter(values.iter())) {
            Ok(_) => Ok(self.tx.last_insert_rowid()),
            Err(err) if is_unique_violation(&err) => Err(Error::AlreadyExists(entity)),
            Err(err) => Err(err.into()),
        }
    }

    pub fn query_count(&self, op: &str, (sql, values): (String, Vec<Value>)) -> Result<i64> {
        self.ctx.check()?;
        self.log.debug(format!("Database {op}: {sql}, {values:?}"));
        let mut stmt = self.tx.prepare(&sql)?;
        let count: i64 = stmt.query_row(params_from_iter(values.iter()), |row| row.get(0))?;
        Ok(count)
    }

    pub fn query_id(&self, op: &str, (sql, values): (String, Vec<Value>)) -> Result<Option<i64>> {
        self.ctx.check()?;
        self.log.debug(format!("Database {op}: {sql}, {values:?}"));
        let mut stmt = self.tx.prepare(&sql)?;
        let id = stmt
            .query_row(params_from_iter(values.iter()), |row| row.get(0))
            .optional()?;
        Ok(id)
    }

    pub fn query_rows<T, F>(&self, op: &str, (sql, values): (String, Vec<Value>), f: F) -> Result<Vec<T>>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.ctx.check()?;
        self.log.debug(format!("Database {op}: {sql}, {values:?}"));
        let mut stmt = self.tx.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), f)?
            .collect::<rusqlite::Result<Vec<T>>>()?;
        Ok(rows)
    }
}

/// Store failures are logged with the call's fields. Domain errors and
/// interruptions are returned silently.
fn log_failure(log: &Logger, op: &str, err: Error) -> Error {
    if matches!(err, Error::Store(_)) {
        log.error(format!("Database {op} failed: {err}"));
    }
    err
}

/// Matches SQLite's duplicate-key result codes. Other constraint failures,
/// such as foreign keys or NOT NULL, stay store failures.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    if let rusqlite::Error::SqliteFailure(err, _) = err {
        return err.code == ErrorCode::ConstraintViolation
            && (err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                || err.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY);
    }
    false
}

fn convert_migration_error(err: MigrationError) -> Error {
    match err {
        MigrationError::Interrupted(err) => err,
        err => Error::Store(err.into()),
    }
}

impl RoleRepo for SqlStore {
    fn create_role(
        &self,
        ctx: &Context,
        log: &Logger,
        name: &str,
        permissions: &[Permission],
    ) -> Result<Role> {
        let log = log.with("role", name);
        let role = self.with_transaction(ctx, &log, "create_role", |tx| {
            role::create_role(tx, name, permissions)
        })?;
        log.info(format!("Created role with {} permissions", permissions.len()));
        Ok(role)
    }

    fn delete_role(&self, ctx: &Context, log: &Logger, name: &str) -> Result<()> {
        let log = log.with("role", name);
        self.with_transaction(ctx, &log, "delete_role", |tx| role::delete_role(tx, name))?;
        log.info("Deleted role");
        Ok(())
    }

    fn list_roles(&self, ctx: &Context, log: &Logger) -> Result<Vec<String>> {
        self.with_transaction(ctx, log, "list_roles", role::list_roles)
    }

    fn list_role_permissions(
        &self,
        ctx: &Context,
        log: &Logger,
        name: &str,
    ) -> Result<Vec<Permission>> {
        let log = log.with("role", name);
        self.with_transaction(ctx, &log, "list_role_permissions", |tx| {
            role::list_role_permissions(tx, name)
        })
    }

    fn assign_role(&self, ctx: &Context, log: &Logger, role: &str, actor: &Actor) -> Result<()> {
        let log = log.with("role", role).with("actor", actor);
        self.with_transaction(ctx, &log, "assign_role", |tx| {
            role::assign_role(tx, role, actor)
        })?;
        log.info("Assigned role");
        Ok(())
    }

    fn assign_role_to_group(
        &self,
        ctx: &Context,
        log: &Logger,
        role: &str,
        group: &Group,
    ) -> Result<()> {
        let log = log.with("role", role).with("group", group);
        self.with_transaction(ctx, &log, "assign_role_to_group", |tx| {
            role::assign_role_to_group(tx, role, group)
        })?;
        log.info("Assigned role to group");
        Ok(())
    }

    fn unassign_role(&self, ctx: &Context, log: &Logger, role: &str, actor: &Actor) -> Result<()> {
        let log = log.with("role", role).with("actor", actor);
        self.with_transaction(ctx, &log, "unassign_role", |tx| {
            role::unassign_role(tx, role, actor)
        })?;
        log.info("Unassigned role");
        Ok(())
    }

    fn unassign_role_from_group(
        &self,
        ctx: &Context,
        log: &Logger,
        role: &str,
        group: &Group,
    ) -> Result<()> {
        let log = log.with("role", role).with("group", group);
        self.with_transaction(ctx, &log, "unassign_role_from_group", |tx| {
            role::unassign_role_from_group(tx, role, group)
        })?;
        log.info("Unassigned role from group");
        Ok(())
    }

    fn has_role(&self, ctx: &Context, log: &Logger, role: &str, actor: &Actor) -> Result<bool> {
        let log = log.with("role", role).with("actor", actor);
        self.with_transaction(ctx, &log, "has_role", |tx| role::has_role(tx, role, actor))
    }

    fn has_role_for_group(
        &self,
        ctx: &Context,
        log: &Logger,
        role: &str,
        group: &Group,
    ) -> Result<bool> {
        let log = log.with("role", role).with("group", group);
        self.with_transaction(ctx, &log, "has_role_for_group", |tx| {
            role::has_role_for_group(tx, role, group)
        })
    }
}

impl PermissionRepo for SqlStore {
    fn has_permission(
        &self,
        ctx: &Context,
        log: &Logger,
        actor: &Actor,
        groups: &[Group],
        action: &Action,
        resource_pattern: &str,
    ) -> Result<bool> {
        let log = log
            .with("actor", actor)
            .with("action", action)
            .with("resource", resource_pattern);
        self.with_transaction(ctx, &log, "has_permission", |tx| {
            permission::has_permission(tx, actor, groups, action, resource_pattern)
        })
    }

    fn list_resource_patterns(
        &self,
        ctx: &Context,
        log: &Logger,
        actor: &Actor,
        groups: &[Group],
        action: &Action,
    ) -> Result<Vec<String>> {
        let log = log.with("actor", actor).with("action", action);
        self.with_transaction(ctx, &log, "list_resource_patterns", |tx| {
            permission::list_resource_patterns(tx, actor, groups, action)
        })
    }
}
