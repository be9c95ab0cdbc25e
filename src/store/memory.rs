use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use anyhow::anyhow;

use crate::context::Context;
use crate::error::{Entity, Error, Result};
use crate::logs::Logger;
use crate::types::{Action, Actor, Group, Permission, Role};

use super::{PermissionRepo, RoleRepo};

/// A memory-based store that keeps everything in plain maps behind one
/// mutex. Content is lost when the store is dropped.
///
/// Every call validates its input before mutating, so a failed call leaves
/// the state untouched, matching the transactional behavior of the
/// relational store.
pub struct MemoryStore {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    /// Role name to its permissions, in creation order.
    roles: HashMap<String, Vec<Permission>>,

    actor_roles: HashMap<Actor, BTreeSet<String>>,
    group_roles: HashMap<Group, BTreeSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    /// Checks the context, then locks the state. The context is only
    /// consulted on entry; once the lock is held the call runs to completion.
    fn enter(&self, ctx: &Context) -> Result<MutexGuard<'_, State>> {
        ctx.check()?;
        match self.state.lock() {
            Ok(state) => Ok(state),
            Err(e) => Err(Error::Store(anyhow!("failed to lock memory store: {e:#}"))),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    fn must_get_role(&self, name: &str) -> Result<&Vec<Permission>> {
        self.roles.get(name).ok_or(Error::NotFound(Entity::Role))
    }

    fn grants(&self, roles: Option<&BTreeSet<String>>, action: &Action) -> Vec<&str> {
        let Some(roles) = roles else {
            return Vec::new();
        };
        roles
            .iter()
            .filter_map(|role| self.roles.get(role))
            .flatten()
            .filter(|permission| &permission.action == action)
            .map(|permission| permission.resource_pattern.as_str())
            .collect()
    }
}

impl RoleRepo for MemoryStore {
    fn create_role(
        &self,
        ctx: &Context,
        log: &Logger,
        name: &str,
        permissions: &[Permission],
    ) -> Result<Role> {
        let log = log.with("role", name);
        let mut state = self.enter(ctx)?;
        if state.roles.contains_key(name) {
            return Err(Error::AlreadyExists(Entity::Role));
        }

        let mut seen = HashSet::with_capacity(permissions.len());
        for permission in permissions {
            if !seen.insert(permission) {
                return Err(Error::AlreadyExists(Entity::Permission));
            }
        }

        state.roles.insert(name.to_string(), permissions.to_vec());
        log.info(format!("Created role with {} permissions", permissions.len()));
        Ok(Role::new(name, permissions.to_vec()))
    }

    fn delete_role(&self, ctx: &Context, log: &Logger, name: &str) -> Result<()> {
        let log = log.with("role", name);
        let mut state = self.enter(ctx)?;
        if state.roles.remove(name).is_none() {
            return Err(Error::NotFound(Entity::Role));
        }

        // Only bindings to the deleted role go away; other roles held by the
        // same principals stay assigned.
        state.actor_roles.retain(|_, roles| {
            roles.remove(name);
            !roles.is_empty()
        });
        state.group_roles.retain(|_, roles| {
            roles.remove(name);
            !roles.is_empty()
        });

        log.info("Deleted role");
        Ok(())
    }

    fn list_roles(&self, ctx: &Context, _log: &Logger) -> Result<Vec<String>> {
        let state = self.enter(ctx)?;
        let mut names: Vec<String> = state.roles.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn list_role_permissions(
        &self,
        ctx: &Context,
        _log: &Logger,
        name: &str,
    ) -> Result<Vec<Permission>> {
        let state = self.enter(ctx)?;
        Ok(state.must_get_role(name)?.clone())
    }

    fn assign_role(&self, ctx: &Context, log: &Logger, role: &str, actor: &Actor) -> Result<()> {
        let log = log.with("role", role).with("actor", actor);
        let mut state = self.enter(ctx)?;
        state.must_get_role(role)?;

        let roles = state.actor_roles.entry(actor.clone()).or_default();
        if !roles.insert(role.to_string()) {
            return Err(Error::AlreadyExists(Entity::Assignment));
        }
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
        let mut state = self.enter(ctx)?;
        state.must_get_role(role)?;

        let roles = state.group_roles.entry(group.clone()).or_default();
        if !roles.insert(role.to_string()) {
            return Err(Error::AlreadyExists(Entity::GroupAssignment));
        }
        log.info("Assigned role to group");
        Ok(())
    }

    fn unassign_role(&self, ctx: &Context, log: &Logger, role: &str, actor: &Actor) -> Result<()> {
        let log = log.with("role", role).with("actor", actor);
        let mut state = self.enter(ctx)?;
        state.must_get_role(role)?;

        let Some(roles) = state.actor_roles.get_mut(actor) else {
            return Err(Error::NotFound(Entity::Assignment));
        };
        if !roles.remove(role) {
            return Err(Error::NotFound(Entity::Assignment));
        }
        if roles.is_empty() {
            state.actor_roles.remove(actor);
        }
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
        let mut state = self.enter(ctx)?;
        state.must_get_role(role)?;

        let Some(roles) = state.group_roles.get_mut(group) else {
            return Err(Error::NotFound(Entity::GroupAssignment));
        };
        if !roles.remove(role) {
            return Err(Error::NotFound(Entity::GroupAssignment));
        }
        if roles.is_empty() {
            state.group_roles.remove(group);
        }
        log.info("Unassigned role from group");
        Ok(())
    }

    fn has_role(&self, ctx: &Context, _log: &Logger, role: &str, actor: &Actor) -> Result<bool> {
        let state = self.enter(ctx)?;
        state.must_get_role(role)?;
        Ok(state
            .actor_roles
            .get(actor)
            .is_some_and(|roles| roles.contains(role)))
    }

    fn has_role_for_group(
        &self,
        ctx: &Context,
        _log: &Logger,
        role: &str,
        group: &Group,
    ) -> Result<bool> {
        let state = self.enter(ctx)?;
        state.must_get_role(role)?;
        Ok(state
            .group_roles
            .get(group)
            .is_some_and(|roles| roles.contains(role)))
    }
}

impl PermissionRepo for MemoryStore {
    fn has_permission(
        &self,
        ctx: &Context,
        _log: &Logger,
        actor: &Actor,
        groups: &[Group],
        action: &Action,
        resource_pattern: &str,
    ) -> Result<bool> {
        let state = self.enter(ctx)?;
        if state
            .grants(state.actor_roles.get(actor), action)
            .contains(&resource_pattern)
        {
            return Ok(true);
        }

        for group in groups {
            if state
                .grants(state.group_roles.get(group), action)
                .contains(&resource_pattern)
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn list_resource_patterns(
        &self,
        ctx: &Context,
        _log: &Logger,
        actor: &Actor,
        groups: &[Group],
        action: &Action,
    ) -> Result<Vec<String>> {
        let state = self.enter(ctx)?;
        let mut patterns: BTreeSet<&str> = state
            .grants(state.actor_roles.get(actor), action)
            .into_iter()
            .collect();
        for group in groups {
            patterns.extend(state.grants(state.group_roles.get(group), action));
        }
        Ok(patterns.into_iter().map(String::from).collect())
    }
}
