use axum::extract::{Extension, State};

use crate::access;
use crate::db::{cascade, queries, AppState};
use crate::error::{msg, AppError, OptionExt, Result};
use crate::extractors::{Json, Path, Query};
use crate::models::{CreateProject, CurrentUser, Project, UpdateProject};
use crate::pagination::{Paginated, PaginationQuery};

#[derive(serde::Deserialize)]
pub struct OrgProjectPath {
    pub org_id: String,
    pub project_id: String,
}

/// Load a project, mapping cross-org hits to the same NotFound as absence.
fn load_org_project(
    conn: &rusqlite::Connection,
    org_id: &str,
    project_id: &str,
) -> Result<Project> {
    let project =
        queries::get_project_by_id(conn, project_id)?.or_not_found(msg::PROJECT_NOT_FOUND)?;
    if project.org_id != org_id {
        return Err(AppError::NotFound(msg::PROJECT_NOT_FOUND.into()));
    }
    Ok(project)
}

pub async fn create_project(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(org_id): Path<String>,
    Json(input): Json<CreateProject>,
) -> Result<Json<Project>> {
    access::require_admin(&user)?;
    input.validate()?;

    let conn = state.db.get()?;
    let project = queries::create_project(&conn, &org_id, &input)?;
    tracing::info!("Created project {} in org {}", project.id, org_id);
    Ok(Json(project))
}

pub async fn list_projects(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<Paginated<Project>>> {
    let conn = state.db.get()?;
    let limit = pagination.limit();
    let offset = pagination.offset();
    let (projects, total) = queries::list_projects_for_org(&conn, &org_id, limit, offset)?;
    Ok(Json(Paginated::new(projects, total, limit, offset)))
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(path): Path<OrgProjectPath>,
) -> Result<Json<Project>> {
    let conn = state.db.get()?;
    let project = load_org_project(&conn, &path.org_id, &path.project_id)?;
    Ok(Json(project))
}

pub async fn update_project(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(path): Path<OrgProjectPath>,
    Json(input): Json<UpdateProject>,
) -> Result<Json<Project>> {
    access::require_admin(&user)?;
    input.validate()?;

    let conn = state.db.get()?;
    load_org_project(&conn, &path.org_id, &path.project_id)?;

    let project = queries::update_project(&conn, &path.project_id, &input)?
        .or_not_found(msg::PROJECT_NOT_FOUND)?;
    Ok(Json(project))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(path): Path<OrgProjectPath>,
) -> Result<Json<serde_json::Value>> {
    access::require_admin(&user)?;

    let mut conn = state.db.get()?;
    load_org_project(&conn, &path.org_id, &path.project_id)?;

    cascade::delete_project(&mut conn, &path.project_id)?;
    tracing::info!("Deleted project {} and its subtree", path.project_id);
    Ok(Json(serde_json::json!({ "success": true })))
}
