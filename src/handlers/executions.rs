use axum::extract::{Extension, State};
use serde::Serialize;

use crate::access;
use crate::db::{queries, AppState};
use crate::error::{msg, OptionExt, Result};
use crate::extractors::{Json, Path, Query};
use crate::models::{
    AssignExecution, CompleteExecution, CurrentUser, ExecutionFilter, ExecutionSummary, SaveWork,
    TestExecution, TestStepResult, UpdateStepResult,
};
use crate::pagination::{Paginated, PaginationQuery};

use super::test_cases::OrgCasePath;

#[derive(serde::Deserialize)]
pub struct OrgExecutionPath {
    pub org_id: String,
    pub execution_id: String,
}

#[derive(serde::Deserialize)]
pub struct ExecutionStepPath {
    pub org_id: String,
    pub execution_id: String,
    pub step_id: String,
}

#[derive(Serialize)]
pub struct ExecutionDetail {
    #[serde(flatten)]
    pub summary: ExecutionSummary,
    pub step_results: Vec<TestStepResult>,
}

// Flat on purpose: serde_urlencoded does not handle nested flatten well.
#[derive(serde::Deserialize, Default)]
pub struct ListExecutionsQuery {
    pub assigned_user_id: Option<String>,
    pub module_id: Option<String>,
    pub status: Option<crate::models::ExecutionStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListExecutionsQuery {
    fn filter(&self) -> ExecutionFilter {
        ExecutionFilter {
            assigned_user_id: self.assigned_user_id.clone(),
            module_id: self.module_id.clone(),
            status: self.status,
        }
    }

    fn pagination(&self) -> PaginationQuery {
        PaginationQuery {
            limit: self.limit,
            offset: self.offset,
        }
    }
}

pub async fn create_execution(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(path): Path<OrgCasePath>,
) -> Result<Json<TestExecution>> {
    let mut conn = state.db.get()?;
    let scope = access::resolve_scope_checked(
        &conn,
        &user,
        |c| queries::resolve_case_scope(c, &path.case_id),
        msg::TEST_CASE_NOT_FOUND,
    )?;
    access::require_execution_create(&user, &scope)?;

    let execution = queries::create_execution(&mut conn, &path.case_id, None)?;
    Ok(Json(execution))
}

pub async fn list_executions(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
    Query(query): Query<ListExecutionsQuery>,
) -> Result<Json<Paginated<ExecutionSummary>>> {
    let conn = state.db.get()?;
    let pagination = query.pagination();
    let (limit, offset) = (pagination.limit(), pagination.offset());
    let (items, total) =
        queries::list_executions_for_org(&conn, &org_id, &query.filter(), limit, offset)?;
    Ok(Json(Paginated::new(items, total, limit, offset)))
}

pub async fn get_execution(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(path): Path<OrgExecutionPath>,
) -> Result<Json<ExecutionDetail>> {
    let conn = state.db.get()?;
    access::resolve_scope_checked(
        &conn,
        &user,
        |c| queries::resolve_execution_scope(c, &path.execution_id),
        msg::EXECUTION_NOT_FOUND,
    )?;

    let summary = queries::get_execution_summary(&conn, &path.execution_id)?
        .or_not_found(msg::EXECUTION_NOT_FOUND)?;
    let step_results = queries::list_step_results_for_execution(&conn, &path.execution_id)?;
    Ok(Json(ExecutionDetail {
        summary,
        step_results,
    }))
}

/// ADMIN only: hand an execution to a QA/BA/TESTER in the same organization.
pub async fn assign_execution(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(path): Path<OrgExecutionPath>,
    Json(input): Json<AssignExecution>,
) -> Result<Json<TestExecution>> {
    let conn = state.db.get()?;
    access::resolve_scope_checked(
        &conn,
        &user,
        |c| queries::resolve_execution_scope(c, &path.execution_id),
        msg::EXECUTION_NOT_FOUND,
    )?;
    access::require_admin(&user)?;

    let target = access::load_same_org_user(&conn, &user, &input.user_id)?;
    access::require_module_assignable(&target)?;

    let execution = queries::assign_execution(&conn, &path.execution_id, &input.user_id)?;
    Ok(Json(execution))
}

pub async fn save_work(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(path): Path<OrgExecutionPath>,
    Json(input): Json<SaveWork>,
) -> Result<Json<TestExecution>> {
    let conn = state.db.get()?;
    let scope = access::resolve_scope_checked(
        &conn,
        &user,
        |c| queries::resolve_execution_scope(c, &path.execution_id),
        msg::EXECUTION_NOT_FOUND,
    )?;
    let execution = queries::get_execution_by_id(&conn, &path.execution_id)?
        .or_not_found(msg::EXECUTION_NOT_FOUND)?;
    access::require_execution_actor(&user, &scope, &execution)?;

    let updated = queries::save_work(&conn, &path.execution_id, &input.notes)?;
    Ok(Json(updated))
}

pub async fn complete_execution(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(path): Path<OrgExecutionPath>,
    Json(input): Json<CompleteExecution>,
) -> Result<Json<TestExecution>> {
    input.validate()?;

    let conn = state.db.get()?;
    let scope = access::resolve_scope_checked(
        &conn,
        &user,
        |c| queries::resolve_execution_scope(c, &path.execution_id),
        msg::EXECUTION_NOT_FOUND,
    )?;
    let execution = queries::get_execution_by_id(&conn, &path.execution_id)?
        .or_not_found(msg::EXECUTION_NOT_FOUND)?;
    access::require_execution_actor(&user, &scope, &execution)?;

    let completed = queries::complete_execution(&conn, &path.execution_id, &input)?;
    Ok(Json(completed))
}

pub async fn update_step_result(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(path): Path<ExecutionStepPath>,
    Json(input): Json<UpdateStepResult>,
) -> Result<Json<TestStepResult>> {
    let conn = state.db.get()?;
    let scope = access::resolve_scope_checked(
        &conn,
        &user,
        |c| queries::resolve_execution_scope(c, &path.execution_id),
        msg::EXECUTION_NOT_FOUND,
    )?;
    let execution = queries::get_execution_by_id(&conn, &path.execution_id)?
        .or_not_found(msg::EXECUTION_NOT_FOUND)?;
    access::require_execution_actor(&user, &scope, &execution)?;

    let result =
        queries::update_step_result(&conn, &path.execution_id, &path.step_id, &input)?;
    Ok(Json(result))
}
