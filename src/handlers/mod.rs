pub mod analytics;
pub mod assignments;
pub mod executions;
pub mod modules;
pub mod projects;
pub mod test_cases;
pub mod users;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::db::AppState;
use crate::middleware::session_auth;

/// All org-scoped routes, behind the session-auth identity middleware.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        // Users and identity
        .route("/orgs/{org_id}/users", post(users::create_user))
        .route("/orgs/{org_id}/users", get(users::list_users))
        .route("/orgs/{org_id}/users/{user_id}", get(users::get_user))
        .route("/orgs/{org_id}/me", get(users::me))
        // Projects
        .route("/orgs/{org_id}/projects", post(projects::create_project))
        .route("/orgs/{org_id}/projects", get(projects::list_projects))
        .route("/orgs/{org_id}/projects/{project_id}", get(projects::get_project))
        .route("/orgs/{org_id}/projects/{project_id}", put(projects::update_project))
        .route("/orgs/{org_id}/projects/{project_id}", delete(projects::delete_project))
        // Modules
        .route("/orgs/{org_id}/projects/{project_id}/modules", post(modules::create_module))
        .route("/orgs/{org_id}/projects/{project_id}/modules", get(modules::list_modules))
        .route("/orgs/{org_id}/modules/{module_id}", get(modules::get_module))
        .route("/orgs/{org_id}/modules/{module_id}", put(modules::update_module))
        .route("/orgs/{org_id}/modules/{module_id}", delete(modules::delete_module))
        // Submodules
        .route("/orgs/{org_id}/modules/{module_id}/submodules", post(modules::create_submodule))
        .route("/orgs/{org_id}/modules/{module_id}/submodules", get(modules::list_submodules))
        .route("/orgs/{org_id}/submodules/{submodule_id}", get(modules::get_submodule))
        .route("/orgs/{org_id}/submodules/{submodule_id}", put(modules::update_submodule))
        .route("/orgs/{org_id}/submodules/{submodule_id}", delete(modules::delete_submodule))
        // Test cases and steps
        .route("/orgs/{org_id}/submodules/{submodule_id}/cases", post(test_cases::create_test_case))
        .route("/orgs/{org_id}/submodules/{submodule_id}/cases", get(test_cases::list_test_cases))
        .route("/orgs/{org_id}/cases/{case_id}", get(test_cases::get_test_case))
        .route("/orgs/{org_id}/cases/{case_id}", put(test_cases::update_test_case))
        .route("/orgs/{org_id}/cases/{case_id}", delete(test_cases::delete_test_case))
        .route("/orgs/{org_id}/cases/{case_id}/steps", get(test_cases::list_steps))
        // Assignments
        .route(
            "/orgs/{org_id}/users/{user_id}/projects/{project_id}",
            put(assignments::assign_project),
        )
        .route(
            "/orgs/{org_id}/users/{user_id}/projects/{project_id}",
            delete(assignments::unassign_project),
        )
        .route(
            "/orgs/{org_id}/users/{user_id}/modules/{module_id}",
            put(assignments::assign_module),
        )
        .route(
            "/orgs/{org_id}/users/{user_id}/modules/{module_id}",
            delete(assignments::unassign_module),
        )
        // Executions
        .route("/orgs/{org_id}/cases/{case_id}/executions", post(executions::create_execution))
        .route("/orgs/{org_id}/executions", get(executions::list_executions))
        .route("/orgs/{org_id}/executions/{execution_id}", get(executions::get_execution))
        .route(
            "/orgs/{org_id}/executions/{execution_id}/assign",
            post(executions::assign_execution),
        )
        .route("/orgs/{org_id}/executions/{execution_id}/work", put(executions::save_work))
        .route(
            "/orgs/{org_id}/executions/{execution_id}/complete",
            post(executions::complete_execution),
        )
        .route(
            "/orgs/{org_id}/executions/{execution_id}/steps/{step_id}",
            put(executions::update_step_result),
        )
        // Analytics
        .route("/orgs/{org_id}/analytics", get(analytics::get_analytics))
        .layer(middleware::from_fn_with_state(state, session_auth))
}
