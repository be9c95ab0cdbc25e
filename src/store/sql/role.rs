use rusqlite::types::Value;
use uuid::Uuid;

use crate::error::{Entity, Error, Result};
use crate::types::{Action, Actor, Group, Permission, Role};

use super::builder::{text, Delete, Insert, Select};
use super::SqlTransaction;

pub fn create_role(tx: &SqlTransaction, name: &str, permissions: &[Permission]) -> Result<Role> {
    let mut insert = Insert::new("role");
    insert.add_field("uuid", new_uuid());
    insert.add_field("name", text(name));
    let role_id = tx.insert("create_role", Entity::Role, insert.build())?;

    for permission in permissions {
        let action_id = get_or_create_action(tx, &permission.action)?;

        let mut insert = Insert::new("permission");
        insert.add_field("uuid", new_uuid());
        insert.add_field("role_id", Value::Integer(role_id));
        insert.add_field("action_id", Value::Integer(action_id));
        insert.add_field("resource_pattern", text(&permission.resource_pattern));
        tx.insert("create_permission", Entity::Permission, insert.build())?;
    }

    Ok(Role::new(name, permissions.to_vec()))
}

pub fn delete_role(tx: &SqlTransaction, name: &str) -> Result<()> {
    let role_id = must_get_role_id(tx, name)?;

    // Permissions and assignments go with the role through ON DELETE CASCADE,
    // scoped to this role's id only.
    let mut delete = Delete::new("role");
    delete.add_where("id = ?", Value::Integer(role_id));
    tx.execute("delete_role", delete.build())?;
    Ok(())
}

pub fn list_roles(tx: &SqlTransaction) -> Result<Vec<String>> {
    let mut select = Select::new(vec!["name"], "role");
    select.add_order_by("name ASC");
    tx.query_rows("list_roles", select.build(), |row| row.get(0))
}

pub fn list_role_permissions(tx: &SqlTransaction, name: &str) -> Result<Vec<Permission>> {
    let role_id = must_get_role_id(tx, name)?;

    let mut select = Select::new(
        vec!["action.name", "permission.resource_pattern"],
        "permission",
    );
    select.add_join("JOIN action ON action.id = permission.action_id");
    select.add_where("permission.role_id = ?", Value::Integer(role_id));
    select.add_order_by("permission.id ASC");

    tx.query_rows("list_role_permissions", select.build(), |row| {
        let action: String = row.get(0)?;
        let resource_pattern: String = row.get(1)?;
        Ok(Permission::new(action, resource_pattern))
    })
}

pub fn assign_role(tx: &SqlTransaction, role: &str, actor: &Actor) -> Result<()> {
    let role_id = must_get_role_id(tx, role)?;

    let mut insert = Insert::new("actor").or_ignore();
    insert.add_field("uuid", new_uuid());
    insert.add_field("actor_id", text(&actor.id));
    insert.add_field("namespace", text(&actor.namespace));
    tx.execute("ensure_actor", insert.build())?;

    let mut insert = Insert::new("assignment");
    insert.add_field("uuid", new_uuid());
    insert.add_field("role_id", Value::Integer(role_id));
    insert.add_field("actor_id", text(&actor.id));
    insert.add_field("actor_namespace", text(&actor.namespace));
    tx.insert("assign_role", Entity::Assignment, insert.build())?;
    Ok(())
}

pub fn assign_role_to_group(tx: &SqlTransaction, role: &str, group: &Group) -> Result<()> {
    let role_id = must_get_role_id(tx, role)?;

    let mut insert = Insert::new("principal_group").or_ignore();
    insert.add_field("uuid", new_uuid());
    insert.add_field("group_id", text(&group.id));
    tx.execute("ensure_group", insert.build())?;

    let mut insert = Insert::new("group_assignment");
    insert.add_field("uuid", new_uuid());
    insert.add_field("role_id", Value::Integer(role_id));
    insert.add_field("group_id", text(&group.id));
    tx.insert("assign_role_to_group", Entity::GroupAssignment, insert.build())?;
    Ok(())
}

pub fn unassign_role(tx: &SqlTransaction, role: &str, actor: &Actor) -> Result<()> {
    let role_id = must_get_role_id(tx, role)?;

    let mut delete = Delete::new("assignment");
    delete.add_where("role_id = ?", Value::Integer(role_id));
    delete.add_where("actor_id = ?", text(&actor.id));
    delete.add_where("actor_namespace = ?", text(&actor.namespace));
    let count = tx.execute("unassign_role", delete.build())?;
    if count == 0 {
        return Err(Error::NotFound(Entity::Assignment));
    }
    Ok(())
}

pub fn unassign_role_from_group(tx: &SqlTransaction, role: &str, group: &Group) -> Result<()> {
    let role_id = must_get_role_id(tx, role)?;

    let mut delete = Delete::new("group_assignment");
    delete.add_where("role_id = ?", Value::Integer(role_id));
    delete.add_where("group_id = ?", text(&group.id));
    let count = tx.execute("unassign_role_from_group", delete.build())?;
    if count == 0 {
        return Err(Error::NotFound(Entity::GroupAssignment));
    }
    Ok(())
}

pub fn has_role(tx: &SqlTransaction, role: &str, actor: &Actor) -> Result<bool> {
    let role_id = must_get_role_id(tx, role)?;

    let mut select = Select::count("assignment");
    select.add_where("role_id = ?", Value::Integer(role_id));
    select.add_where("actor_id = ?", text(&actor.id));
    select.add_where("actor_namespace = ?", text(&actor.namespace));
    let count = tx.query_count("has_role", select.build())?;
    Ok(count > 0)
}

pub fn has_role_for_group(tx: &SqlTransaction, role: &str, group: &Group) -> Result<bool> {
    let role_id = must_get_role_id(tx, role)?;

    let mut select = Select::count("group_assignment");
    select.add_where("role_id = ?", Value::Integer(role_id));
    select.add_where("group_id = ?", text(&group.id));
    let count = tx.query_count("has_role_for_group", select.build())?;
    Ok(count > 0)
}

fn must_get_role_id(tx: &SqlTransaction, name: &str) -> Result<i64> {
    let mut select = Select::new(vec!["id"], "role");
    select.add_where("name = ?", text(name));
    match tx.query_id("get_role_id", select.build())? {
        Some(id) => Ok(id),
        None => Err(Error::NotFound(Entity::Role)),
    }
}

/// Actions are shared between roles and never deleted, so the first role
/// granting an action creates its row.
fn get_or_create_action(tx: &SqlTransaction, action: &Action) -> Result<i64> {
    let mut select = Select::new(vec!["id"], "action");
    select.add_where("name = ?", text(action.as_str()));
    if let Some(id) = tx.query_id("get_action_id", select.build())? {
        return Ok(id);
    }

    let mut insert = Insert::new("action");
    insert.add_field("uuid", new_uuid());
    insert.add_field("name", text(action.as_str()));
    tx.insert("create_action", Entity::Action, insert.build())
}

fn new_uuid() -> Value {
    text(Uuid::new_v4().to_string())
}
