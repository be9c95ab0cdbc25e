mod memory;
mod sql;

#[cfg(test)]
mod tests;

pub mod config;
pub mod factory;

pub use memory::MemoryStore;
pub use sql::{schema_migrations, SqlStore};

use crate::context::Context;
use crate::error::Result;
use crate::logs::Logger;
use crate::types::{Action, Actor, Group, Permission, Role};

/// Role lifecycle and role bindings for actors and groups.
///
/// Every method takes the request context and a logger tagged with request
/// fields. Implementations must be safe to call concurrently from many
/// threads sharing one instance, and each call must be atomic as observed
/// by other callers.
pub trait RoleRepo: Send + Sync {
    /// Creates a role together with its permissions. Fails with
    /// `AlreadyExists(Role)` when the name is taken, leaving nothing behind.
    fn create_role(
        &self,
        ctx: &Context,
        log: &Logger,
        name: &str,
        permissions: &[Permission],
    ) -> Result<Role>;

    /// Deletes a role with its permissions and every assignment to it.
    fn delete_role(&self, ctx: &Context, log: &Logger, name: &str) -> Result<()>;

    /// Role names, sorted.
    fn list_roles(&self, ctx: &Context, log: &Logger) -> Result<Vec<String>>;

    /// Permissions of a role, in creation order.
    fn list_role_permissions(&self, ctx: &Context, log: &Logger, name: &str)
        -> Result<Vec<Permission>>;

    fn assign_role(&self, ctx: &Context, log: &Logger, role: &str, actor: &Actor) -> Result<()>;

    fn assign_role_to_group(
        &self,
        ctx: &Context,
        log: &Logger,
        role: &str,
        group: &Group,
    ) -> Result<()>;

    fn unassign_role(&self, ctx: &Context, log: &Logger, role: &str, actor: &Actor) -> Result<()>;

    fn unassign_role_from_group(
        &self,
        ctx: &Context,
        log: &Logger,
        role: &str,
        group: &Group,
    ) -> Result<()>;

    /// Fails with `NotFound(Role)` for an unknown role; an unassigned actor
    /// is `Ok(false)`.
    fn has_role(&self, ctx: &Context, log: &Logger, role: &str, actor: &Actor) -> Result<bool>;

    fn has_role_for_group(
        &self,
        ctx: &Context,
        log: &Logger,
        role: &str,
        group: &Group,
    ) -> Result<bool>;
}

/// Permission resolution over direct actor grants and indirect group grants.
///
/// Unknown actors and groups are never an error, they simply hold no grants.
pub trait PermissionRepo: Send + Sync {
    fn has_permission(
        &self,
        ctx: &Context,
        log: &Logger,
        actor: &Actor,
        groups: &[Group],
        action: &Action,
        resource_pattern: &str,
    ) -> Result<bool>;

    /// Every distinct resource pattern the actor may perform `action` on,
    /// in no particular order.
    fn list_resource_patterns(
        &self,
        ctx: &Context,
        log: &Logger,
        actor: &Actor,
        groups: &[Group],
        action: &Action,
    ) -> Result<Vec<String>>;
}

/// The backend chosen at startup.
pub enum UnionStore {
    Sql(SqlStore),
    Memory(MemoryStore),
}

impl UnionStore {
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Sql(_) => "sqlite",
            Self::Memory(_) => "memory",
        }
    }
}

impl RoleRepo for UnionStore {
    fn create_role(
        &self,
        ctx: &Context,
        log: &Logger,
        name: &str,
        permissions: &[Permission],
    ) -> Result<Role> {
        match self {
            Self::Sql(store) => store.create_role(ctx, log, name, permissions),
            Self::Memory(store) => store.create_role(ctx, log, name, permissions),
        }
    }

    fn delete_role(&self, ctx: &Context, log: &Logger, name: &str) -> Result<()> {
        match self {
            Self::Sql(store) => store.delete_role(ctx, log, name),
            Self::Memory(store) => store.delete_role(ctx, log, name),
        }
    }

    fn list_roles(&self, ctx: &Context, log: &Logger) -> Result<Vec<String>> {
        match self {
            Self::Sql(store) => store.list_roles(ctx, log),
            Self::Memory(store) => store.list_roles(ctx, log),
        }
    }

    fn list_role_permissions(
        &self,
        ctx: &Context,
        log: &Logger,
        name: &str,
    ) -> Result<Vec<Permission>> {
        match self {
            Self::Sql(store) => store.list_role_permissions(ctx, log, name),
            Self::Memory(store) => store.list_role_permissions(ctx, log, name),
        }
    }

    fn assign_role(&self, ctx: &Context, log: &Logger, role: &str, actor: &Actor) -> Result<()> {
        match self {
            Self::Sql(store) => store.assign_role(ctx, log, role, actor),
            Self::Memory(store) => store.assign_role(ctx, log, role, actor),
        }
    }

    fn assign_role_to_group(
        &self,
        ctx: &Context,
        log: &Logger,
        role: &str,
        group: &Group,
    ) -> Result<()> {
        match self {
            Self::Sql(store) => store.assign_role_to_group(ctx, log, role, group),
            Self::Memory(store) => store.assign_role_to_group(ctx, log, role, group),
        }
    }

    fn unassign_role(&self, ctx: &Context, log: &Logger, role: &str, actor: &Actor) -> Result<()> {
        match self {
            Self::Sql(store) => store.unassign_role(ctx, log, role, actor),
            Self::Memory(store) => store.unassign_role(ctx, log, role, actor),
        }
    }

    fn unassign_role_from_group(
        &self,
        ctx: &Context,
        log: &Logger,
        role: &str,
        group: &Group,
    ) -> Result<()> {
        match self {
            Self::Sql(store) => store.unassign_role_from_group(ctx, log, role, group),
            Self::Memory(store) => store.unassign_role_from_group(ctx, log, role, group),
        }
    }

    fn has_role(&self, ctx: &Context, log: &Logger, role: &str, actor: &Actor) -> Result<bool> {
        match self {
            Self::Sql(store) => store.has_role(ctx, log, role, actor),
            Self::Memory(store) => store.has_role(ctx, log, role, actor),
        }
    }

    fn has_role_for_group(
        &self,
        ctx: &Context,
        log: &Logger,
        role: &str,
        group: &Group,
    ) -> Result<bool> {
        match self {
            Self::Sql(store) => store.has_role_for_group(ctx, log, role, group),
            Self::Memory(store) => store.has_role_for_group(ctx, log, role, group),
        }
    }
}

impl PermissionRepo for UnionStore {
    fn has_permission(
        &self,
        ctx: &Context,
        log: &Logger,
        actor: &Actor,
        groups: &[Group],
        action: &Action,
        resource_pattern: &str,
    ) -> Result<bool> {
        match self {
            Self::Sql(store) => {
                store.has_permission(ctx, log, actor, groups, action, resource_pattern)
            }
            Self::Memory(store) => {
                store.has_permission(ctx, log, actor, groups, action, resource_pattern)
            }
        }
    }

    fn list_resource_patterns(
        &self,
        ctx: &Context,
        log: &Logger,
        actor: &Actor,
        groups: &[Group],
        action: &Action,
    ) -> Result<Vec<String>> {
        match self {
            Self::Sql(store) => store.list_resource_patterns(ctx, log, actor, groups, action),
            Self::Memory(store) => store.list_resource_patterns(ctx, log, actor, groups, action),
        }
    }
}
