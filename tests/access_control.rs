//! Authorization behavior against a real database: organization isolation,
//! assignment-derived access, and the read/write asymmetry.

mod common;
use common::*;

use casetrack::error::AppError;

#[test]
fn cross_org_lookups_surface_as_not_found() {
    let conn = setup_test_db();
    let org_a = create_test_org(&conn, "Org A");
    let org_b = create_test_org(&conn, "Org B");
    let admin_a = create_test_user(&conn, &org_a.id, "admin@a.com", &[Role::Admin]);
    let acting = current(&conn, &admin_a);

    let project_b = create_test_project(&conn, &org_b.id, "Foreign Project");
    let module_b = create_test_module(&conn, &project_b.id, "Foreign Module");

    // Resolving a foreign module fails the same way an absent id would.
    let result = access::resolve_scope_checked(
        &conn,
        &acting,
        |c| queries::resolve_module_scope(c, &module_b.id),
        "Module not found",
    );
    assert!(matches!(result, Err(AppError::NotFound(_))));

    let absent = access::resolve_scope_checked(
        &conn,
        &acting,
        |c| queries::resolve_module_scope(c, "no-such-id"),
        "Module not found",
    );
    assert!(matches!(absent, Err(AppError::NotFound(_))));
}

#[test]
fn foreign_users_are_invisible() {
    let conn = setup_test_db();
    let org_a = create_test_org(&conn, "Org A");
    let org_b = create_test_org(&conn, "Org B");
    let admin_a = create_test_user(&conn, &org_a.id, "admin@a.com", &[Role::Admin]);
    let user_b = create_test_user(&conn, &org_b.id, "qa@b.com", &[Role::Qa]);
    let acting = current(&conn, &admin_a);

    let result = access::load_same_org_user(&conn, &acting, &user_b.id);
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[test]
fn email_uniqueness_stops_at_the_org_boundary() {
    let conn = setup_test_db();
    let org_a = create_test_org(&conn, "Org A");
    let org_b = create_test_org(&conn, "Org B");
    create_test_user(&conn, &org_a.id, "bob@example.com", &[Role::Qa]);

    // Reusing the address in another tenant must succeed; a conflict here
    // would reveal that the email exists somewhere else.
    let user_b = create_test_user(&conn, &org_b.id, "bob@example.com", &[Role::Tester]);
    assert_eq!(user_b.org_id, org_b.id);

    // Within one org the duplicate still conflicts.
    let dup = queries::create_user(
        &conn,
        &org_a.id,
        &CreateUser {
            email: "bob@example.com".to_string(),
            name: "Duplicate".to_string(),
            roles: vec![Role::Qa],
        },
    );
    assert!(matches!(dup, Err(AppError::Conflict(_))));
}

#[test]
fn module_assignment_flows_into_current_user() {
    let conn = setup_test_db();
    let org = create_test_org(&conn, "Org");
    let qa = create_test_user(&conn, &org.id, "qa@test.com", &[Role::Qa]);
    let project = create_test_project(&conn, &org.id, "Project");
    let module = create_test_module(&conn, &project.id, "Module");

    let before = current(&conn, &qa);
    assert!(!before.is_assigned_to_module(&module.id));

    queries::assign_user_to_module(&conn, &qa.id, &module.id).unwrap();
    let after = current(&conn, &qa);
    assert!(after.is_assigned_to_module(&module.id));
}

#[test]
fn write_needs_assignment_but_read_does_not() {
    let conn = setup_test_db();
    let org = create_test_org(&conn, "Org");
    let qa = create_test_user(&conn, &org.id, "qa@test.com", &[Role::Qa]);
    let project = create_test_project(&conn, &org.id, "Project");
    let module = create_test_module(&conn, &project.id, "Module");

    let scope = queries::resolve_module_scope(&conn, &module.id)
        .unwrap()
        .unwrap();

    let acting = current(&conn, &qa);
    assert!(access::require_read(&acting, &org.id).is_ok());
    assert!(matches!(
        access::require_module_write(&acting, &scope),
        Err(AppError::AccessDenied(_))
    ));

    queries::assign_user_to_module(&conn, &qa.id, &module.id).unwrap();
    let acting = current(&conn, &qa);
    assert!(access::require_module_write(&acting, &scope).is_ok());
}

#[test]
fn execution_actor_is_admin_assignee_or_module_holder() {
    let mut conn = setup_test_db();
    let org = create_test_org(&conn, "Org");
    let admin = create_test_user(&conn, &org.id, "admin@test.com", &[Role::Admin]);
    let assignee = create_test_user(&conn, &org.id, "tester@test.com", &[Role::Tester]);
    let holder = create_test_user(&conn, &org.id, "ba@test.com", &[Role::Ba]);
    let outsider = create_test_user(&conn, &org.id, "other@test.com", &[Role::Qa]);

    let project = create_test_project(&conn, &org.id, "Project");
    let module = create_test_module(&conn, &project.id, "Module");
    let submodule = create_test_submodule(&conn, &module.id, "Submodule");
    let case = create_test_case(&mut conn, &submodule.id, "TC-1", 2);

    queries::assign_user_to_module(&conn, &holder.id, &module.id).unwrap();
    let execution = queries::create_execution(&mut conn, &case.id, Some(&assignee.id)).unwrap();
    let scope = queries::resolve_execution_scope(&conn, &execution.id)
        .unwrap()
        .unwrap();

    for user in [&admin, &assignee, &holder] {
        let acting = current(&conn, user);
        assert!(
            access::require_execution_actor(&acting, &scope, &execution).is_ok(),
            "{} should be allowed",
            user.email
        );
    }

    let acting = current(&conn, &outsider);
    assert!(matches!(
        access::require_execution_actor(&acting, &scope, &execution),
        Err(AppError::AccessDenied(_))
    ));
}

#[test]
fn assignment_targets_are_role_checked() {
    let conn = setup_test_db();
    let org = create_test_org(&conn, "Org");
    let tester = create_test_user(&conn, &org.id, "tester@test.com", &[Role::Tester]);
    let qa = create_test_user(&conn, &org.id, "qa@test.com", &[Role::Qa]);

    // Testers may hold modules but not projects.
    assert!(access::require_module_assignable(&tester).is_ok());
    assert!(matches!(
        access::require_project_assignable(&tester),
        Err(AppError::AccessDenied(_))
    ));
    assert!(access::require_project_assignable(&qa).is_ok());
}
