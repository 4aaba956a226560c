use axum::extract::{Extension, State};

use crate::access;
use crate::db::{cascade, queries, AppState};
use crate::error::{msg, AppError, OptionExt, Result};
use crate::extractors::{Json, Path};
use crate::models::{CreateModule, CurrentUser, Submodule, TestModule, UpdateModule};

use super::projects::OrgProjectPath;

#[derive(serde::Deserialize)]
pub struct OrgModulePath {
    pub org_id: String,
    pub module_id: String,
}

#[derive(serde::Deserialize)]
pub struct OrgSubmodulePath {
    pub org_id: String,
    pub submodule_id: String,
}

pub async fn create_module(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(path): Path<OrgProjectPath>,
    Json(input): Json<CreateModule>,
) -> Result<Json<TestModule>> {
    input.validate()?;

    let conn = state.db.get()?;
    let org_id = queries::resolve_project_org(&conn, &path.project_id)?
        .or_not_found(msg::PROJECT_NOT_FOUND)?;
    if org_id != path.org_id {
        return Err(AppError::NotFound(msg::PROJECT_NOT_FOUND.into()));
    }
    access::require_project_write(&user, &org_id, &path.project_id)?;

    let module = queries::create_module(&conn, &path.project_id, &input)?;
    Ok(Json(module))
}

pub async fn list_modules(
    State(state): State<AppState>,
    Path(path): Path<OrgProjectPath>,
) -> Result<Json<Vec<TestModule>>> {
    let conn = state.db.get()?;
    let org_id = queries::resolve_project_org(&conn, &path.project_id)?
        .or_not_found(msg::PROJECT_NOT_FOUND)?;
    if org_id != path.org_id {
        return Err(AppError::NotFound(msg::PROJECT_NOT_FOUND.into()));
    }
    Ok(Json(queries::list_modules_for_project(&conn, &path.project_id)?))
}

pub async fn get_module(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(path): Path<OrgModulePath>,
) -> Result<Json<TestModule>> {
    let conn = state.db.get()?;
    access::resolve_scope_checked(
        &conn,
        &user,
        |c| queries::resolve_module_scope(c, &path.module_id),
        msg::MODULE_NOT_FOUND,
    )?;
    let module =
        queries::get_module_by_id(&conn, &path.module_id)?.or_not_found(msg::MODULE_NOT_FOUND)?;
    Ok(Json(module))
}

pub async fn update_module(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(path): Path<OrgModulePath>,
    Json(input): Json<UpdateModule>,
) -> Result<Json<TestModule>> {
    input.validate()?;

    let conn = state.db.get()?;
    let scope = access::resolve_scope_checked(
        &conn,
        &user,
        |c| queries::resolve_module_scope(c, &path.module_id),
        msg::MODULE_NOT_FOUND,
    )?;
    access::require_module_write(&user, &scope)?;

    let module = queries::update_module(&conn, &path.module_id, &input)?
        .or_not_found(msg::MODULE_NOT_FOUND)?;
    Ok(Json(module))
}

/// Module deletion is ADMIN-only; it severs assignments for every user
/// holding the module before the subtree goes.
pub async fn delete_module(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(path): Path<OrgModulePath>,
) -> Result<Json<serde_json::Value>> {
    let mut conn = state.db.get()?;
    access::resolve_scope_checked(
        &conn,
        &user,
        |c| queries::resolve_module_scope(c, &path.module_id),
        msg::MODULE_NOT_FOUND,
    )?;
    access::require_admin(&user)?;

    cascade::delete_module(&mut conn, &path.module_id)?;
    tracing::info!("Deleted module {} and its subtree", path.module_id);
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn create_submodule(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(path): Path<OrgModulePath>,
    Json(input): Json<CreateModule>,
) -> Result<Json<Submodule>> {
    input.validate()?;

    let conn = state.db.get()?;
    let scope = access::resolve_scope_checked(
        &conn,
        &user,
        |c| queries::resolve_module_scope(c, &path.module_id),
        msg::MODULE_NOT_FOUND,
    )?;
    access::require_module_write(&user, &scope)?;

    let submodule = queries::create_submodule(&conn, &path.module_id, &input)?;
    Ok(Json(submodule))
}

pub async fn list_submodules(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(path): Path<OrgModulePath>,
) -> Result<Json<Vec<Submodule>>> {
    let conn = state.db.get()?;
    access::resolve_scope_checked(
        &conn,
        &user,
        |c| queries::resolve_module_scope(c, &path.module_id),
        msg::MODULE_NOT_FOUND,
    )?;
    Ok(Json(queries::list_submodules_for_module(&conn, &path.module_id)?))
}

pub async fn get_submodule(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(path): Path<OrgSubmodulePath>,
) -> Result<Json<Submodule>> {
    let conn = state.db.get()?;
    access::resolve_scope_checked(
        &conn,
        &user,
        |c| queries::resolve_submodule_scope(c, &path.submodule_id),
        msg::SUBMODULE_NOT_FOUND,
    )?;
    let submodule = queries::get_submodule_by_id(&conn, &path.submodule_id)?
        .or_not_found(msg::SUBMODULE_NOT_FOUND)?;
    Ok(Json(submodule))
}

pub async fn update_submodule(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(path): Path<OrgSubmodulePath>,
    Json(input): Json<UpdateModule>,
) -> Result<Json<Submodule>> {
    input.validate()?;

    let conn = state.db.get()?;
    let scope = access::resolve_scope_checked(
        &conn,
        &user,
        |c| queries::resolve_submodule_scope(c, &path.submodule_id),
        msg::SUBMODULE_NOT_FOUND,
    )?;
    access::require_module_write(&user, &scope)?;

    let submodule = queries::update_submodule(&conn, &path.submodule_id, &input)?
        .or_not_found(msg::SUBMODULE_NOT_FOUND)?;
    Ok(Json(submodule))
}

/// Submodule deletion allows assigned QA/BA as well as ADMIN.
pub async fn delete_submodule(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(path): Path<OrgSubmodulePath>,
) -> Result<Json<serde_json::Value>> {
    let mut conn = state.db.get()?;
    let scope = access::resolve_scope_checked(
        &conn,
        &user,
        |c| queries::resolve_submodule_scope(c, &path.submodule_id),
        msg::SUBMODULE_NOT_FOUND,
    )?;
    access::require_module_write(&user, &scope)?;

    cascade::delete_submodule(&mut conn, &path.submodule_id)?;
    Ok(Json(serde_json::json!({ "success": true })))
}
