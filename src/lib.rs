//! Role-based authorization engine.
//!
//! Roles bundle permissions (an action on a resource pattern) and are bound to
//! actors directly or to groups of actors. [`store::PermissionRepo`] answers
//! whether an actor may perform an action on a resource, and which resources
//! it may act on, over either backend of [`store::UnionStore`].

pub mod config;
pub mod context;
pub mod error;
pub mod logs;
pub mod migrate;
pub mod store;
pub mod types;

pub use context::Context;
pub use error::{Entity, Error, ErrorKind, Result};
pub use logs::Logger;
pub use store::{MemoryStore, PermissionRepo, RoleRepo, SqlStore, UnionStore};
pub use types::{Action, Actor, Group, Permission, Role};
