mod permission;
mod role;

use crate::context::Context;
use crate::logs::Logger;

use super::{PermissionRepo, RoleRepo};

/// Runs the behavior suite shared by every backend. Each sub-suite works on
/// its own role and principal names, so they can share one store.
pub fn run_all_store_tests<S: RoleRepo + PermissionRepo>(store: &S) {
    role::run_role_tests(store);
    role::run_assignment_tests(store);
    role::run_group_assignment_tests(store);
    role::run_delete_cascade_tests(store);

    permission::run_scenario_tests(store);
    permission::run_has_permission_tests(store);
    permission::run_resource_pattern_tests(store);

    run_canceled_tests(store);
}

fn run_canceled_tests<S: RoleRepo + PermissionRepo>(store: &S) {
    let log = Logger::new();
    let ctx = Context::background().child();
    ctx.cancel();

    let err = store.create_role(&ctx, &log, "canceled", &[]).unwrap_err();
    assert!(matches!(err, crate::error::Error::Canceled));
    let err = store.list_roles(&ctx, &log).unwrap_err();
    assert!(matches!(err, crate::error::Error::Canceled));

    let roles = store.list_roles(&Context::background(), &log).unwrap();
    assert!(!roles.contains(&String::from("canceled")));

    let ctx = Context::background().with_timeout(std::time::Duration::ZERO);
    let err = store.list_roles(&ctx, &log).unwrap_err();
    assert!(matches!(err, crate::error::Error::DeadlineExceeded));
}
