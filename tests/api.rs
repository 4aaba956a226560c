//! End-to-end tests over the HTTP router: session auth, org scoping in the
//! URL, and the main workflows as a client would drive them.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;
use common::*;

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(v) => builder
            .header("content-type", "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn requests_without_a_token_are_unauthorized() {
    let state = create_test_app_state();
    let org_id;
    {
        let conn = state.db.get().unwrap();
        org_id = create_test_org(&conn, "Org").id;
    }
    let app = test_app(state);

    let (status, _) = send(&app, "GET", &format!("/orgs/{}/projects", org_id), None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "GET",
        &format!("/orgs/{}/projects", org_id),
        Some("ct_bogus"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn foreign_org_paths_read_as_not_found() {
    let state = create_test_app_state();
    let (org_b_id, token);
    {
        let conn = state.db.get().unwrap();
        let org_a = create_test_org(&conn, "Org A");
        let org_b = create_test_org(&conn, "Org B");
        let admin_a = create_test_user(&conn, &org_a.id, "admin@a.com", &[Role::Admin]);
        org_b_id = org_b.id;
        token = session_for(&conn, &admin_a);
    }
    let app = test_app(state);

    let (status, _) = send(
        &app,
        "GET",
        &format!("/orgs/{}/projects", org_b_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn project_creation_is_admin_only() {
    let state = create_test_app_state();
    let (org_id, admin_token, qa_token);
    {
        let conn = state.db.get().unwrap();
        let org = create_test_org(&conn, "Org");
        let admin = create_test_user(&conn, &org.id, "admin@test.com", &[Role::Admin]);
        let qa = create_test_user(&conn, &org.id, "qa@test.com", &[Role::Qa]);
        org_id = org.id;
        admin_token = session_for(&conn, &admin);
        qa_token = session_for(&conn, &qa);
    }
    let app = test_app(state);
    let uri = format!("/orgs/{}/projects", org_id);
    let body = json!({ "name": "Checkout" });

    let (status, _) = send(&app, "POST", &uri, Some(&qa_token), Some(body.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = send(&app, "POST", &uri, Some(&admin_token), Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["name"], "Checkout");

    // Same name in the same org conflicts.
    let (status, _) = send(&app, "POST", &uri, Some(&admin_token), Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn an_empty_update_echoes_the_entity() {
    let state = create_test_app_state();
    let (org_id, project_id, admin_token);
    {
        let conn = state.db.get().unwrap();
        let org = create_test_org(&conn, "Org");
        let admin = create_test_user(&conn, &org.id, "admin@test.com", &[Role::Admin]);
        let project = create_test_project(&conn, &org.id, "Checkout");
        org_id = org.id;
        project_id = project.id;
        admin_token = session_for(&conn, &admin);
    }
    let app = test_app(state);

    // A PUT with no fields is a no-op on an existing entity, not a 404.
    let (status, body) = send(
        &app,
        "PUT",
        &format!("/orgs/{}/projects/{}", org_id, project_id),
        Some(&admin_token),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], project_id);
    assert_eq!(body["name"], "Checkout");

    // An absent entity still reads as missing.
    let (status, _) = send(
        &app,
        "PUT",
        &format!("/orgs/{}/projects/no-such-id", org_id),
        Some(&admin_token),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn qa_writes_only_under_assigned_modules() {
    let state = create_test_app_state();
    let (org_id, module_a_id, module_b_id, qa_token);
    {
        let conn = state.db.get().unwrap();
        let org = create_test_org(&conn, "Org");
        let qa = create_test_user(&conn, &org.id, "qa1@test.com", &[Role::Qa]);
        let project = create_test_project(&conn, &org.id, "Project");
        let module_a = create_test_module(&conn, &project.id, "Assigned");
        let module_b = create_test_module(&conn, &project.id, "Unassigned");
        queries::assign_user_to_module(&conn, &qa.id, &module_a.id).unwrap();

        org_id = org.id;
        module_a_id = module_a.id;
        module_b_id = module_b.id;
        qa_token = session_for(&conn, &qa);
    }
    let app = test_app(state);
    let body = json!({ "name": "New Submodule" });

    let (status, submodule) = send(
        &app,
        "POST",
        &format!("/orgs/{}/modules/{}/submodules", org_id, module_a_id),
        Some(&qa_token),
        Some(body.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(submodule["name"], "New Submodule");

    let (status, _) = send(
        &app,
        "POST",
        &format!("/orgs/{}/modules/{}/submodules", org_id, module_b_id),
        Some(&qa_token),
        Some(body),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Reading the unassigned module is still allowed.
    let (status, _) = send(
        &app,
        "GET",
        &format!("/orgs/{}/modules/{}", org_id, module_b_id),
        Some(&qa_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn module_assignment_generates_pending_executions() {
    let state = create_test_app_state();
    let (org_id, module_id, tester_id, admin_token, tester_token);
    {
        let mut conn = state.db.get().unwrap();
        let org = create_test_org(&conn, "Org");
        let admin = create_test_user(&conn, &org.id, "admin@test.com", &[Role::Admin]);
        let tester = create_test_user(&conn, &org.id, "tester@test.com", &[Role::Tester]);
        let project = create_test_project(&conn, &org.id, "Project");
        let module = create_test_module(&conn, &project.id, "Module");
        let submodule = create_test_submodule(&conn, &module.id, "Sub");
        create_test_case(&mut conn, &submodule.id, "TC-1", 2);
        create_test_case(&mut conn, &submodule.id, "TC-2", 1);

        org_id = org.id;
        module_id = module.id;
        tester_id = tester.id.clone();
        admin_token = session_for(&conn, &admin);
        tester_token = session_for(&conn, &tester);
    }
    let app = test_app(state);

    let assign_uri = format!("/orgs/{}/users/{}/modules/{}", org_id, tester_id, module_id);
    let (status, body) = send(&app, "PUT", &assign_uri, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["assigned"], true);
    assert_eq!(body["executions_created"], 2);

    // Repeating the grant generates nothing new.
    let (status, body) = send(&app, "PUT", &assign_uri, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["executions_created"], 0);

    let (status, listed) = send(
        &app,
        "GET",
        &format!(
            "/orgs/{}/executions?assigned_user_id={}&status=PENDING",
            org_id, tester_id
        ),
        Some(&tester_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["total"], 2);
}

#[tokio::test]
async fn tester_runs_a_case_through_to_completion() {
    let state = create_test_app_state();
    let (org_id, execution_id, step_id, tester_token);
    {
        let mut conn = state.db.get().unwrap();
        let org = create_test_org(&conn, "Org");
        let tester = create_test_user(&conn, &org.id, "tester@test.com", &[Role::Tester]);
        let project = create_test_project(&conn, &org.id, "Project");
        let module = create_test_module(&conn, &project.id, "Module");
        let submodule = create_test_submodule(&conn, &module.id, "Sub");
        let case = create_test_case(&mut conn, &submodule.id, "TC-1", 1);
        let execution = queries::create_execution(&mut conn, &case.id, Some(&tester.id)).unwrap();
        let steps = queries::list_steps_for_case(&conn, &case.id).unwrap();

        org_id = org.id;
        execution_id = execution.id;
        step_id = steps[0].id.clone();
        tester_token = session_for(&conn, &tester);
    }
    let app = test_app(state);

    let (status, result) = send(
        &app,
        "PUT",
        &format!("/orgs/{}/executions/{}/steps/{}", org_id, execution_id, step_id),
        Some(&tester_token),
        Some(json!({ "status": "PASSED", "actual_result": "looks right" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["status"], "PASSED");

    let (status, saved) = send(
        &app,
        "PUT",
        &format!("/orgs/{}/executions/{}/work", org_id, execution_id),
        Some(&tester_token),
        Some(json!({ "notes": "one step down" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["notes"], "one step down");

    let complete_uri = format!("/orgs/{}/executions/{}/complete", org_id, execution_id);
    let (status, completed) = send(
        &app,
        "POST",
        &complete_uri,
        Some(&tester_token),
        Some(json!({ "overall_result": "PASSED" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["status"], "COMPLETED");
    assert_eq!(completed["overall_result"], "PASSED");

    // COMPLETED is terminal.
    let (status, _) = send(
        &app,
        "POST",
        &complete_uri,
        Some(&tester_token),
        Some(json!({ "overall_result": "FAILED" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let detail_uri = format!("/orgs/{}/executions/{}", org_id, execution_id);
    let (status, detail) = send(&app, "GET", &detail_uri, Some(&tester_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["step_results"][0]["status"], "PASSED");
}

#[tokio::test]
async fn deleting_a_project_clears_assignments_everywhere() {
    let state = create_test_app_state();
    let (org_id, project_id, qa_id, admin_token, qa_token);
    {
        let mut conn = state.db.get().unwrap();
        let org = create_test_org(&conn, "Org");
        let admin = create_test_user(&conn, &org.id, "admin@test.com", &[Role::Admin]);
        let qa = create_test_user(&conn, &org.id, "qa@test.com", &[Role::Qa]);
        let project = create_test_project(&conn, &org.id, "Doomed");
        let module = create_test_module(&conn, &project.id, "Module");
        let submodule = create_test_submodule(&conn, &module.id, "Sub");
        create_test_case(&mut conn, &submodule.id, "TC-1", 1);
        queries::assign_user_to_project(&conn, &qa.id, &project.id).unwrap();
        queries::assign_user_to_module(&conn, &qa.id, &module.id).unwrap();

        org_id = org.id;
        project_id = project.id;
        qa_id = qa.id.clone();
        admin_token = session_for(&conn, &admin);
        qa_token = session_for(&conn, &qa);
    }
    let app = test_app(state.clone());

    let project_uri = format!("/orgs/{}/projects/{}", org_id, project_id);
    let (status, body) = send(&app, "DELETE", &project_uri, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = send(&app, "GET", &project_uri, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The QA's principal no longer carries the dead assignments.
    let (status, me) = send(
        &app,
        "GET",
        &format!("/orgs/{}/me", org_id),
        Some(&qa_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], qa_id);
    assert_eq!(me["assigned_project_ids"], json!([]));
    assert_eq!(me["assigned_module_ids"], json!([]));

    let conn = state.db.get().unwrap();
    assert_eq!(count_rows(&conn, "user_projects"), 0);
    assert_eq!(count_rows(&conn, "user_test_modules"), 0);
    assert_eq!(count_rows(&conn, "test_cases"), 0);
}

#[tokio::test]
async fn analytics_user_filter_is_admin_only() {
    let state = create_test_app_state();
    let (org_id, tester_id, admin_token, tester_token);
    {
        let conn = state.db.get().unwrap();
        let org = create_test_org(&conn, "Org");
        let admin = create_test_user(&conn, &org.id, "admin@test.com", &[Role::Admin]);
        let tester = create_test_user(&conn, &org.id, "tester@test.com", &[Role::Tester]);
        org_id = org.id;
        tester_id = tester.id.clone();
        admin_token = session_for(&conn, &admin);
        tester_token = session_for(&conn, &tester);
    }
    let app = test_app(state);
    let uri = format!("/orgs/{}/analytics?user_id={}", org_id, tester_id);

    let (status, _) = send(&app, "GET", &uri, Some(&tester_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, report) = send(&app, "GET", &uri, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["org_id"], org_id);
}
