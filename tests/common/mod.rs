//! Test utilities and fixtures for Casetrack integration tests

#![allow(dead_code)]

use axum::Router;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

pub use casetrack::access;
pub use casetrack::db::{cascade, init_db, queries, AppState};
pub use casetrack::handlers;
pub use casetrack::models::*;

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    conn.execute_batch("PRAGMA foreign_keys = ON")
        .expect("Failed to enable foreign keys");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// Create a test organization
pub fn create_test_org(conn: &Connection, name: &str) -> Organization {
    let input = CreateOrganization {
        name: name.to_string(),
    };
    queries::create_organization(conn, &input).expect("Failed to create test organization")
}

/// Create a test user holding the given roles
pub fn create_test_user(conn: &Connection, org_id: &str, email: &str, roles: &[Role]) -> User {
    let input = CreateUser {
        email: email.to_string(),
        name: format!("Test User {}", email),
        roles: roles.to_vec(),
    };
    queries::create_user(conn, org_id, &input).expect("Failed to create test user")
}

/// Resolve a user into the acting principal, assignment sets included
pub fn current(conn: &Connection, user: &User) -> CurrentUser {
    queries::load_current_user(conn, &user.id)
        .expect("Failed to load current user")
        .expect("User should exist")
}

pub fn create_test_project(conn: &Connection, org_id: &str, name: &str) -> Project {
    let input = CreateProject {
        name: name.to_string(),
        description: None,
    };
    queries::create_project(conn, org_id, &input).expect("Failed to create test project")
}

pub fn create_test_module(conn: &Connection, project_id: &str, name: &str) -> TestModule {
    let input = CreateModule {
        name: name.to_string(),
    };
    queries::create_module(conn, project_id, &input).expect("Failed to create test module")
}

pub fn create_test_submodule(conn: &Connection, module_id: &str, name: &str) -> Submodule {
    let input = CreateModule {
        name: name.to_string(),
    };
    queries::create_submodule(conn, module_id, &input).expect("Failed to create test submodule")
}

/// Create a test case with `step_count` steps numbered 1..=step_count
pub fn create_test_case(
    conn: &mut Connection,
    submodule_id: &str,
    name: &str,
    step_count: i64,
) -> TestCase {
    let steps = (1..=step_count)
        .map(|n| CreateTestStep {
            step_number: n,
            action: format!("Step {} action", n),
            expected_result: format!("Step {} expected", n),
        })
        .collect();
    let input = CreateTestCase {
        name: name.to_string(),
        description: None,
        steps,
    };
    queries::create_test_case(conn, submodule_id, &input).expect("Failed to create test case")
}

/// Count all rows in a table
pub fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })
    .expect("Failed to count rows")
}

/// Push an execution's date into the past so ordering between runs created in
/// the same second becomes deterministic
pub fn backdate_execution(conn: &Connection, execution_id: &str, seconds: i64) {
    conn.execute(
        "UPDATE test_executions SET execution_date = execution_date - ?1 WHERE id = ?2",
        rusqlite::params![seconds, execution_id],
    )
    .expect("Failed to backdate execution");
}

/// Get the current timestamp
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Create an AppState for router tests. The shared-cache URI makes every
/// pooled connection see the same in-memory database.
pub fn create_test_app_state() -> AppState {
    let uri = format!(
        "file:casetrack_test_{}?mode=memory&cache=shared",
        uuid::Uuid::new_v4().simple()
    );
    let manager = SqliteConnectionManager::file(uri)
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON"));
    let pool = Pool::builder().max_size(4).build(manager).unwrap();
    {
        let conn = pool.get().unwrap();
        init_db(&conn).unwrap();
    }
    AppState { db: pool }
}

/// Build the full API router over a test state
pub fn test_app(state: AppState) -> Router {
    handlers::router(state.clone()).with_state(state)
}

/// Mint a session token for a user
pub fn session_for(conn: &Connection, user: &User) -> String {
    queries::create_session(conn, &user.id, 3600).expect("Failed to create session")
}
