use std::collections::BTreeSet;

use crate::error::Result;
use crate::types::{Action, Actor, Group};

use super::builder::{text, Select};
use super::SqlTransaction;

/// Group ids bound per query, well below SQLite's bound-parameter limit.
const GROUP_CHUNK_SIZE: usize = 500;

/// Checks the direct grant first, then each group in order, returning as soon
/// as one path matches.
pub fn has_permission(
    tx: &SqlTransaction,
    actor: &Actor,
    groups: &[Group],
    action: &Action,
    resource_pattern: &str,
) -> Result<bool> {
    let mut select = Select::count("assignment");
    select.add_join("JOIN permission ON permission.role_id = assignment.role_id");
    select.add_join("JOIN action ON action.id = permission.action_id");
    select.add_where("assignment.actor_id = ?", text(&actor.id));
    select.add_where("assignment.actor_namespace = ?", text(&actor.namespace));
    select.add_where("action.name = ?", text(action.as_str()));
    select.add_where("permission.resource_pattern = ?", text(resource_pattern));
    if tx.query_count("has_direct_permission", select.build())? > 0 {
        return Ok(true);
    }

    for group in groups {
        let mut select = Select::count("group_assignment");
        select.add_join("JOIN permission ON permission.role_id = group_assignment.role_id");
        select.add_join("JOIN action ON action.id = permission.action_id");
        select.add_where("group_assignment.group_id = ?", text(&group.id));
        select.add_where("action.name = ?", text(action.as_str()));
        select.add_where("permission.resource_pattern = ?", text(resource_pattern));
        if tx.query_count("has_group_permission", select.build())? > 0 {
            return Ok(true);
        }
    }

    Ok(false)
}

pub fn list_resource_patterns(
    tx: &SqlTransaction,
    actor: &Actor,
    groups: &[Group],
    action: &Action,
) -> Result<Vec<String>> {
    let mut select = Select::new(vec!["permission.resource_pattern"], "role").distinct();
    select.add_join("JOIN assignment ON assignment.role_id = role.id");
    select.add_join("JOIN permission ON permission.role_id = role.id");
    select.add_join("JOIN action ON action.id = permission.action_id");
    select.add_where("assignment.actor_id = ?", text(&actor.id));
    select.add_where("assignment.actor_namespace = ?", text(&actor.namespace));
    select.add_where("action.name = ?", text(action.as_str()));
    let direct: Vec<String> =
        tx.query_rows("list_direct_patterns", select.build(), |row| row.get(0))?;

    let mut patterns: BTreeSet<String> = direct.into_iter().collect();
    for chunk in groups.chunks(GROUP_CHUNK_SIZE) {
        let mut select = Select::new(vec!["permission.resource_pattern"], "role").distinct();
        select.add_join("JOIN group_assignment ON group_assignment.role_id = role.id");
        select.add_join("JOIN permission ON permission.role_id = role.id");
        select.add_join("JOIN action ON action.id = permission.action_id");
        select.add_where("action.name = ?", text(action.as_str()));
        select.add_where_in(
            "group_assignment.group_id",
            chunk.iter().map(|group| text(&group.id)).collect(),
        );
        let indirect: Vec<String> =
            tx.query_rows("list_group_patterns", select.build(), |row| row.get(0))?;
        patterns.extend(indirect);
    }

    Ok(patterns.into_iter().collect())
}
