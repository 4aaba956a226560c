//! Assignment junctions and the execution bulk-generation they trigger.

mod common;
use common::*;

#[test]
fn assigning_twice_leaves_one_junction_row() {
    let conn = setup_test_db();
    let org = create_test_org(&conn, "Org");
    let qa = create_test_user(&conn, &org.id, "qa@test.com", &[Role::Qa]);
    let project = create_test_project(&conn, &org.id, "Project");
    let module = create_test_module(&conn, &project.id, "Module");

    queries::assign_user_to_project(&conn, &qa.id, &project.id).unwrap();
    queries::assign_user_to_project(&conn, &qa.id, &project.id).unwrap();
    assert_eq!(count_rows(&conn, "user_projects"), 1);

    queries::assign_user_to_module(&conn, &qa.id, &module.id).unwrap();
    queries::assign_user_to_module(&conn, &qa.id, &module.id).unwrap();
    assert_eq!(count_rows(&conn, "user_test_modules"), 1);
}

#[test]
fn unassigning_an_absent_pair_is_a_no_op() {
    let conn = setup_test_db();
    let org = create_test_org(&conn, "Org");
    let qa = create_test_user(&conn, &org.id, "qa@test.com", &[Role::Qa]);

    assert!(queries::unassign_user_from_project(&conn, &qa.id, "no-such-project").is_ok());
    assert!(queries::unassign_user_from_module(&conn, &qa.id, "no-such-module").is_ok());
}

#[test]
fn bulk_generation_covers_every_case_under_the_module() {
    let mut conn = setup_test_db();
    let org = create_test_org(&conn, "Org");
    let tester = create_test_user(&conn, &org.id, "tester@test.com", &[Role::Tester]);
    let project = create_test_project(&conn, &org.id, "Project");
    let module = create_test_module(&conn, &project.id, "Module");
    let sub_a = create_test_submodule(&conn, &module.id, "Sub A");
    let sub_b = create_test_submodule(&conn, &module.id, "Sub B");
    let case_a = create_test_case(&mut conn, &sub_a.id, "TC-A", 3);
    let _case_b = create_test_case(&mut conn, &sub_b.id, "TC-B", 2);

    queries::assign_user_to_module(&conn, &tester.id, &module.id).unwrap();
    let created = queries::bulk_generate_executions(&mut conn, &module.id, &tester.id).unwrap();
    assert_eq!(created, 2);

    let filter = ExecutionFilter {
        assigned_user_id: Some(tester.id.clone()),
        ..Default::default()
    };
    let (executions, total) =
        queries::list_executions_for_org(&conn, &org.id, &filter, 50, 0).unwrap();
    assert_eq!(total, 2);

    // Generated PENDING, with one result slot per step.
    for summary in &executions {
        let execution = &summary.execution;
        assert_eq!(execution.status, ExecutionStatus::Pending);
        assert_eq!(execution.overall_result, OverallResult::Pending);
        let slots = queries::list_step_results_for_execution(&conn, &execution.id).unwrap();
        let expected = if execution.test_case_id == case_a.id { 3 } else { 2 };
        assert_eq!(slots.len(), expected);
        assert!(slots.iter().all(|s| s.status == StepStatus::Pending));
    }
}

#[test]
fn bulk_generation_skips_cases_the_user_already_has() {
    let mut conn = setup_test_db();
    let org = create_test_org(&conn, "Org");
    let tester = create_test_user(&conn, &org.id, "tester@test.com", &[Role::Tester]);
    let other = create_test_user(&conn, &org.id, "other@test.com", &[Role::Tester]);
    let project = create_test_project(&conn, &org.id, "Project");
    let module = create_test_module(&conn, &project.id, "Module");
    let submodule = create_test_submodule(&conn, &module.id, "Sub");
    let case_a = create_test_case(&mut conn, &submodule.id, "TC-A", 1);
    let _case_b = create_test_case(&mut conn, &submodule.id, "TC-B", 1);

    // The user already has an execution for case A; another user's execution
    // for case B must not count.
    queries::create_execution(&mut conn, &case_a.id, Some(&tester.id)).unwrap();
    queries::create_execution(&mut conn, &_case_b.id, Some(&other.id)).unwrap();

    let created = queries::bulk_generate_executions(&mut conn, &module.id, &tester.id).unwrap();
    assert_eq!(created, 1);

    // Re-running generates nothing further.
    let again = queries::bulk_generate_executions(&mut conn, &module.id, &tester.id).unwrap();
    assert_eq!(again, 0);
}

#[test]
fn bulk_generation_on_an_empty_module_creates_nothing() {
    let mut conn = setup_test_db();
    let org = create_test_org(&conn, "Org");
    let tester = create_test_user(&conn, &org.id, "tester@test.com", &[Role::Tester]);
    let project = create_test_project(&conn, &org.id, "Project");
    let module = create_test_module(&conn, &project.id, "Module");

    let created = queries::bulk_generate_executions(&mut conn, &module.id, &tester.id).unwrap();
    assert_eq!(created, 0);
    assert_eq!(count_rows(&conn, "test_executions"), 0);
}
