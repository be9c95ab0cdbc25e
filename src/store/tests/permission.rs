use crate::context::Context;
use crate::error::{Entity, ErrorKind};
use crate::logs::Logger;
use crate::store::{PermissionRepo, RoleRepo};
use crate::types::{Action, Actor, Group, Permission};

pub fn run_scenario_tests<S: RoleRepo + PermissionRepo>(store: &S) {
    let ctx = Context::background();
    let log = Logger::new();
    let u1 = Actor::new("u1", "org");
    let write = Action::new("write");

    store
        .create_role(&ctx, &log, "writer", &[Permission::new("write", "doc-1")])
        .unwrap();
    store.assign_role(&ctx, &log, "writer", &u1).unwrap();

    assert!(store
        .has_permission(&ctx, &log, &u1, &[], &write, "doc-1")
        .unwrap());
    assert!(!store
        .has_permission(&ctx, &log, &u1, &[], &write, "doc-2")
        .unwrap());

    store.delete_role(&ctx, &log, "writer").unwrap();

    assert!(!store
        .has_permission(&ctx, &log, &u1, &[], &write, "doc-1")
        .unwrap());
    let err = store.has_role(&ctx, &log, "writer", &u1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound(Entity::Role));
}

pub fn run_has_permission_tests<S: RoleRepo + PermissionRepo>(store: &S) {
    let ctx = Context::background();
    let log = Logger::new();
    let dave = Actor::new("dave", "hp");
    let erin = Actor::new("erin", "hp");
    let auditors = Group::new("hp-auditors");
    let nobody = Group::new("hp-nobody");
    let read = Action::new("hp-read");
    let delete = Action::new("hp-delete");

    store
        .create_role(
            &ctx,
            &log,
            "hp-owner",
            &[
                Permission::new("hp-read", "reports/q1"),
                Permission::new("hp-delete", "reports/q1"),
            ],
        )
        .unwrap();
    store
        .create_role(
            &ctx,
            &log,
            "hp-auditor",
            &[Permission::new("hp-read", "reports/q2")],
        )
        .unwrap();
    store.assign_role(&ctx, &log, "hp-owner", &dave).unwrap();
    store
        .assign_role_to_group(&ctx, &log, "hp-auditor", &auditors)
        .unwrap();

    // Direct grant.
    assert!(store
        .has_permission(&ctx, &log, &dave, &[], &read, "reports/q1")
        .unwrap());
    assert!(store
        .has_permission(&ctx, &log, &dave, &[], &delete, "reports/q1")
        .unwrap());
    // Action and pattern must both match the same grant.
    assert!(!store
        .has_permission(&ctx, &log, &dave, &[], &delete, "reports/q2")
        .unwrap());
    // Patterns are compared literally.
    assert!(!store
        .has_permission(&ctx, &log, &dave, &[], &read, "reports/*")
        .unwrap());

    // Group grant, found only when the group is passed in.
    assert!(!store
        .has_permission(&ctx, &log, &erin, &[], &read, "reports/q2")
        .unwrap());
    assert!(store
        .has_permission(&ctx, &log, &erin, &[auditors.clone()], &read, "reports/q2")
        .unwrap());
    assert!(store
        .has_permission(
            &ctx,
            &log,
            &erin,
            &[nobody.clone(), auditors.clone()],
            &read,
            "reports/q2"
        )
        .unwrap());
    assert!(!store
        .has_permission(&ctx, &log, &erin, &[nobody.clone()], &read, "reports/q2")
        .unwrap());

    // Both paths at once.
    assert!(store
        .has_permission(&ctx, &log, &dave, &[auditors.clone()], &read, "reports/q2")
        .unwrap());

    // Unknown principals and actions are a plain `false`.
    let ghost = Actor::new("ghost", "nowhere");
    assert!(!store
        .has_permission(&ctx, &log, &ghost, &[nobody], &read, "reports/q1")
        .unwrap());
    assert!(!store
        .has_permission(&ctx, &log, &dave, &[], &Action::new("hp-fly"), "reports/q1")
        .unwrap());

    // Unassigning removes the grant.
    store
        .unassign_role_from_group(&ctx, &log, "hp-auditor", &auditors)
        .unwrap();
    assert!(!store
        .has_permission(&ctx, &log, &erin, &[auditors], &read, "reports/q2")
        .unwrap());
}

pub fn run_resource_pattern_tests<S: RoleRepo + PermissionRepo>(store: &S) {
    let ctx = Context::background();
    let log = Logger::new();
    let frank = Actor::new("frank", "rp");
    let red = Group::new("rp-red");
    let blue = Group::new("rp-blue");
    let read = Action::new("rp-read");

    store
        .create_role(
            &ctx,
            &log,
            "rp-direct",
            &[
                Permission::new("rp-read", "shared"),
                Permission::new("rp-read", "frank/*"),
                Permission::new("rp-write", "frank/*"),
            ],
        )
        .unwrap();
    store
        .create_role(
            &ctx,
            &log,
            "rp-red",
            &[
                Permission::new("rp-read", "shared"),
                Permission::new("rp-read", "red/*"),
            ],
        )
        .unwrap();
    store
        .create_role(
            &ctx,
            &log,
            "rp-blue",
            &[
                Permission::new("rp-read", "red/*"),
                Permission::new("rp-read", "blue/*"),
            ],
        )
        .unwrap();
    store.assign_role(&ctx, &log, "rp-direct", &frank).unwrap();
    store.assign_role_to_group(&ctx, &log, "rp-red", &red).unwrap();
    store
        .assign_role_to_group(&ctx, &log, "rp-blue", &blue)
        .unwrap();

    let sorted = |mut patterns: Vec<String>| {
        patterns.sort();
        patterns
    };

    let patterns = store
        .list_resource_patterns(&ctx, &log, &frank, &[], &read)
        .unwrap();
    assert_eq!(sorted(patterns), vec!["frank/*", "shared"]);

    // Patterns reachable through several paths appear once.
    let patterns = store
        .list_resource_patterns(&ctx, &log, &frank, &[red.clone(), blue.clone()], &read)
        .unwrap();
    assert_eq!(
        sorted(patterns),
        vec!["blue/*", "frank/*", "red/*", "shared"]
    );

    // Groups alone are enough.
    let stranger = Actor::new("stranger", "rp");
    let patterns = store
        .list_resource_patterns(&ctx, &log, &stranger, &[blue], &read)
        .unwrap();
    assert_eq!(sorted(patterns), vec!["blue/*", "red/*"]);

    assert!(store
        .list_resource_patterns(&ctx, &log, &stranger, &[], &read)
        .unwrap()
        .is_empty());
    assert!(store
        .list_resource_patterns(&ctx, &log, &frank, &[red], &Action::new("rp-none"))
        .unwrap()
        .is_empty());
}
