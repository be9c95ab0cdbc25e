use crate::context::Context;
use crate::error::{Entity, ErrorKind};
use crate::logs::Logger;
use crate::store::{PermissionRepo, RoleRepo};
use crate::types::{Action, Actor, Group, Permission};

pub fn run_role_tests<S: RoleRepo + PermissionRepo>(store: &S) {
    let ctx = Context::background();
    let log = Logger::new();

    let permissions = vec![
        Permission::new("read", "wiki/*"),
        Permission::new("write", "wiki/drafts"),
        Permission::new("read", "blog/*"),
    ];
    let role = store
        .create_role(&ctx, &log, "wiki-editor", &permissions)
        .unwrap();
    assert_eq!(role.name, "wiki-editor");
    assert_eq!(role.permissions, permissions);

    // Permissions come back in the order they were created.
    let listed = store
        .list_role_permissions(&ctx, &log, "wiki-editor")
        .unwrap();
    assert_eq!(listed, permissions);

    let empty = store.create_role(&ctx, &log, "wiki-guest", &[]).unwrap();
    assert!(empty.permissions.is_empty());
    assert!(store
        .list_role_permissions(&ctx, &log, "wiki-guest")
        .unwrap()
        .is_empty());

    // A taken name fails and leaves the existing role untouched.
    let err = store
        .create_role(&ctx, &log, "wiki-editor", &[Permission::new("admin", "*")])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists(Entity::Role));
    assert_eq!(
        store
            .list_role_permissions(&ctx, &log, "wiki-editor")
            .unwrap(),
        permissions
    );

    // A duplicated grant fails the whole creation.
    let err = store
        .create_role(
            &ctx,
            &log,
            "wiki-dup",
            &[
                Permission::new("read", "wiki/*"),
                Permission::new("read", "wiki/*"),
            ],
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists(Entity::Permission));
    let err = store
        .list_role_permissions(&ctx, &log, "wiki-dup")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound(Entity::Role));

    let roles = store.list_roles(&ctx, &log).unwrap();
    let mut sorted = roles.clone();
    sorted.sort();
    assert_eq!(roles, sorted);
    assert!(roles.contains(&String::from("wiki-editor")));
    assert!(roles.contains(&String::from("wiki-guest")));
    assert!(!roles.contains(&String::from("wiki-dup")));

    store.delete_role(&ctx, &log, "wiki-guest").unwrap();
    let err = store.delete_role(&ctx, &log, "wiki-guest").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound(Entity::Role));
    assert!(!store
        .list_roles(&ctx, &log)
        .unwrap()
        .contains(&String::from("wiki-guest")));

    // The name is free again after deletion.
    store.create_role(&ctx, &log, "wiki-guest", &[]).unwrap();

    let err = store
        .list_role_permissions(&ctx, &log, "no-such-role")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound(Entity::Role));
}

pub fn run_assignment_tests<S: RoleRepo + PermissionRepo>(store: &S) {
    let ctx = Context::background();
    let log = Logger::new();
    let alice = Actor::new("alice", "acme");
    // Same id in another namespace is a different actor.
    let alice_other = Actor::new("alice", "globex");

    store
        .create_role(&ctx, &log, "acme-viewer", &[Permission::new("view", "dash")])
        .unwrap();

    assert!(!store.has_role(&ctx, &log, "acme-viewer", &alice).unwrap());
    store.assign_role(&ctx, &log, "acme-viewer", &alice).unwrap();
    assert!(store.has_role(&ctx, &log, "acme-viewer", &alice).unwrap());
    assert!(!store
        .has_role(&ctx, &log, "acme-viewer", &alice_other)
        .unwrap());

    let err = store
        .assign_role(&ctx, &log, "acme-viewer", &alice)
        .unwrap_err();
    assert!(err.is_already_exists());
    assert_eq!(err.kind(), ErrorKind::AlreadyExists(Entity::Assignment));

    let err = store
        .assign_role(&ctx, &log, "no-such-role", &alice)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound(Entity::Role));

    let err = store
        .has_role(&ctx, &log, "no-such-role", &alice)
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.kind(), ErrorKind::NotFound(Entity::Role));

    let err = store
        .unassign_role(&ctx, &log, "acme-viewer", &alice_other)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound(Entity::Assignment));
    let err = store
        .unassign_role(&ctx, &log, "no-such-role", &alice)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound(Entity::Role));

    store
        .unassign_role(&ctx, &log, "acme-viewer", &alice)
        .unwrap();
    assert!(!store.has_role(&ctx, &log, "acme-viewer", &alice).unwrap());
    let err = store
        .unassign_role(&ctx, &log, "acme-viewer", &alice)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound(Entity::Assignment));

    // Re-assigning after an unassign works.
    store.assign_role(&ctx, &log, "acme-viewer", &alice).unwrap();
    assert!(store
        .has_permission(&ctx, &log, &alice, &[], &Action::new("view"), "dash")
        .unwrap());
}

pub fn run_group_assignment_tests<S: RoleRepo + PermissionRepo>(store: &S) {
    let ctx = Context::background();
    let log = Logger::new();
    let ops = Group::new("ops");
    let dev = Group::new("dev");

    store
        .create_role(&ctx, &log, "pager", &[Permission::new("ack", "alerts/*")])
        .unwrap();

    assert!(!store.has_role_for_group(&ctx, &log, "pager", &ops).unwrap());
    store.assign_role_to_group(&ctx, &log, "pager", &ops).unwrap();
    assert!(store.has_role_for_group(&ctx, &log, "pager", &ops).unwrap());
    assert!(!store.has_role_for_group(&ctx, &log, "pager", &dev).unwrap());

    let err = store
        .assign_role_to_group(&ctx, &log, "pager", &ops)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists(Entity::GroupAssignment));

    let err = store
        .assign_role_to_group(&ctx, &log, "no-such-role", &ops)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound(Entity::Role));

    let err = store
        .has_role_for_group(&ctx, &log, "no-such-role", &ops)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound(Entity::Role));

    let err = store
        .unassign_role_from_group(&ctx, &log, "pager", &dev)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound(Entity::GroupAssignment));

    store
        .unassign_role_from_group(&ctx, &log, "pager", &ops)
        .unwrap();
    assert!(!store.has_role_for_group(&ctx, &log, "pager", &ops).unwrap());

    store.assign_role_to_group(&ctx, &log, "pager", &dev).unwrap();
}

/// Deleting one role removes its own permissions and bindings, and nothing
/// that belongs to other roles of the same principals.
pub fn run_delete_cascade_tests<S: RoleRepo + PermissionRepo>(store: &S) {
    let ctx = Context::background();
    let log = Logger::new();
    let bob = Actor::new("bob", "acme");
    let carol = Actor::new("carol", "acme");
    let team = Group::new("cascade-team");
    let edit = Action::new("edit");

    store
        .create_role(&ctx, &log, "cascade-a", &[Permission::new("edit", "a/*")])
        .unwrap();
    store
        .create_role(&ctx, &log, "cascade-b", &[Permission::new("edit", "b/*")])
        .unwrap();

    for role in ["cascade-a", "cascade-b"] {
        store.assign_role(&ctx, &log, role, &bob).unwrap();
        store.assign_role_to_group(&ctx, &log, role, &team).unwrap();
    }
    store.assign_role(&ctx, &log, "cascade-b", &carol).unwrap();

    store.delete_role(&ctx, &log, "cascade-a").unwrap();

    assert!(store.has_role(&ctx, &log, "cascade-b", &bob).unwrap());
    assert!(store.has_role(&ctx, &log, "cascade-b", &carol).unwrap());
    assert!(store
        .has_role_for_group(&ctx, &log, "cascade-b", &team)
        .unwrap());
    assert_eq!(
        store
            .list_role_permissions(&ctx, &log, "cascade-b")
            .unwrap(),
        vec![Permission::new("edit", "b/*")]
    );

    assert!(!store
        .has_permission(&ctx, &log, &bob, &[], &edit, "a/*")
        .unwrap());
    assert!(!store
        .has_permission(&ctx, &log, &carol, &[team.clone()], &edit, "a/*")
        .unwrap());
    assert!(store
        .has_permission(&ctx, &log, &bob, &[], &edit, "b/*")
        .unwrap());

    let err = store.has_role(&ctx, &log, "cascade-a", &bob).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound(Entity::Role));

    // A new role with the old name starts without any bindings.
    store.create_role(&ctx, &log, "cascade-a", &[]).unwrap();
    assert!(!store.has_role(&ctx, &log, "cascade-a", &bob).unwrap());
    assert!(!store
        .has_role_for_group(&ctx, &log, "cascade-a", &team)
        .unwrap());
}
