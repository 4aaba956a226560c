//! Assignment endpoints: the many-to-many grants the authorization engine
//! consults. Both sides must live in the caller's organization; assign and
//! unassign are idempotent.

use axum::extract::{Extension, State};

use crate::access;
use crate::db::{queries, AppState};
use crate::error::{msg, AppError, OptionExt, Result};
use crate::extractors::{Json, Path};
use crate::models::{CurrentUser, Role};

#[derive(serde::Deserialize)]
pub struct UserProjectPath {
    pub org_id: String,
    pub user_id: String,
    pub project_id: String,
}

#[derive(serde::Deserialize)]
pub struct UserModulePath {
    pub org_id: String,
    pub user_id: String,
    pub module_id: String,
}

pub async fn assign_project(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(path): Path<UserProjectPath>,
) -> Result<Json<serde_json::Value>> {
    access::require_admin(&user)?;

    let conn = state.db.get()?;
    let target = access::load_same_org_user(&conn, &user, &path.user_id)?;
    access::require_project_assignable(&target)?;

    let org_id = queries::resolve_project_org(&conn, &path.project_id)?
        .or_not_found(msg::PROJECT_NOT_FOUND)?;
    if org_id != user.org_id {
        return Err(AppError::NotFound(msg::PROJECT_NOT_FOUND.into()));
    }

    queries::assign_user_to_project(&conn, &path.user_id, &path.project_id)?;
    Ok(Json(serde_json::json!({ "assigned": true })))
}

pub async fn unassign_project(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(path): Path<UserProjectPath>,
) -> Result<Json<serde_json::Value>> {
    access::require_admin(&user)?;

    let conn = state.db.get()?;
    access::load_same_org_user(&conn, &user, &path.user_id)?;

    queries::unassign_user_from_project(&conn, &path.user_id, &path.project_id)?;
    Ok(Json(serde_json::json!({ "assigned": false })))
}

/// Assign a user to a module. Besides the grant itself, this generates one
/// PENDING execution (with step-result slots) for every test case under the
/// module the user does not already have one for.
pub async fn assign_module(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(path): Path<UserModulePath>,
) -> Result<Json<serde_json::Value>> {
    // System policy: QA/BA may manage module assignments, ADMIN implicitly.
    access::require_role(&user, &[Role::Qa, Role::Ba])?;

    let mut conn = state.db.get()?;
    let target = access::load_same_org_user(&conn, &user, &path.user_id)?;
    access::require_module_assignable(&target)?;

    access::resolve_scope_checked(
        &conn,
        &user,
        |c| queries::resolve_module_scope(c, &path.module_id),
        msg::MODULE_NOT_FOUND,
    )?;

    queries::assign_user_to_module(&conn, &path.user_id, &path.module_id)?;
    let created = queries::bulk_generate_executions(&mut conn, &path.module_id, &path.user_id)?;
    tracing::info!(
        "Assigned user {} to module {}, generated {} executions",
        path.user_id,
        path.module_id,
        created
    );

    Ok(Json(serde_json::json!({
        "assigned": true,
        "executions_created": created,
    })))
}

pub async fn unassign_module(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(path): Path<UserModulePath>,
) -> Result<Json<serde_json::Value>> {
    access::require_role(&user, &[Role::Qa, Role::Ba])?;

    let conn = state.db.get()?;
    access::load_same_org_user(&conn, &user, &path.user_id)?;

    queries::unassign_user_from_module(&conn, &path.user_id, &path.module_id)?;
    Ok(Json(serde_json::json!({ "assigned": false })))
}
