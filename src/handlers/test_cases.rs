use axum::extract::{Extension, State};

use crate::access;
use crate::db::{cascade, queries, AppState};
use crate::error::{msg, OptionExt, Result};
use crate::extractors::{Json, Path};
use crate::models::{
    CreateTestCase, CurrentUser, TestCase, TestCaseWithSteps, TestStep, UpdateTestCase,
};

use super::modules::OrgSubmodulePath;

#[derive(serde::Deserialize)]
pub struct OrgCasePath {
    pub org_id: String,
    pub case_id: String,
}

pub async fn create_test_case(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(path): Path<OrgSubmodulePath>,
    Json(input): Json<CreateTestCase>,
) -> Result<Json<TestCaseWithSteps>> {
    input.validate()?;

    let mut conn = state.db.get()?;
    let scope = access::resolve_scope_checked(
        &conn,
        &user,
        |c| queries::resolve_submodule_scope(c, &path.submodule_id),
        msg::SUBMODULE_NOT_FOUND,
    )?;
    access::require_module_write(&user, &scope)?;

    let case = queries::create_test_case(&mut conn, &path.submodule_id, &input)?;
    let steps = queries::list_steps_for_case(&conn, &case.id)?;
    Ok(Json(TestCaseWithSteps { case, steps }))
}

pub async fn list_test_cases(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(path): Path<OrgSubmodulePath>,
) -> Result<Json<Vec<TestCase>>> {
    let conn = state.db.get()?;
    access::resolve_scope_checked(
        &conn,
        &user,
        |c| queries::resolve_submodule_scope(c, &path.submodule_id),
        msg::SUBMODULE_NOT_FOUND,
    )?;
    Ok(Json(queries::list_test_cases_for_submodule(
        &conn,
        &path.submodule_id,
    )?))
}

pub async fn get_test_case(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(path): Path<OrgCasePath>,
) -> Result<Json<TestCaseWithSteps>> {
    let conn = state.db.get()?;
    access::resolve_scope_checked(
        &conn,
        &user,
        |c| queries::resolve_case_scope(c, &path.case_id),
        msg::TEST_CASE_NOT_FOUND,
    )?;
    let case = queries::get_test_case_by_id(&conn, &path.case_id)?
        .or_not_found(msg::TEST_CASE_NOT_FOUND)?;
    let steps = queries::list_steps_for_case(&conn, &path.case_id)?;
    Ok(Json(TestCaseWithSteps { case, steps }))
}

pub async fn update_test_case(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(path): Path<OrgCasePath>,
    Json(input): Json<UpdateTestCase>,
) -> Result<Json<TestCase>> {
    input.validate()?;

    let conn = state.db.get()?;
    let scope = access::resolve_scope_checked(
        &conn,
        &user,
        |c| queries::resolve_case_scope(c, &path.case_id),
        msg::TEST_CASE_NOT_FOUND,
    )?;
    access::require_module_write(&user, &scope)?;

    let case = queries::update_test_case(&conn, &path.case_id, &input)?
        .or_not_found(msg::TEST_CASE_NOT_FOUND)?;
    Ok(Json(case))
}

pub async fn delete_test_case(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(path): Path<OrgCasePath>,
) -> Result<Json<serde_json::Value>> {
    let mut conn = state.db.get()?;
    let scope = access::resolve_scope_checked(
        &conn,
        &user,
        |c| queries::resolve_case_scope(c, &path.case_id),
        msg::TEST_CASE_NOT_FOUND,
    )?;
    access::require_module_write(&user, &scope)?;

    cascade::delete_test_case(&mut conn, &path.case_id)?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn list_steps(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(path): Path<OrgCasePath>,
) -> Result<Json<Vec<TestStep>>> {
    let conn = state.db.get()?;
    access::resolve_scope_checked(
        &conn,
        &user,
        |c| queries::resolve_case_scope(c, &path.case_id),
        msg::TEST_CASE_NOT_FOUND,
    )?;
    Ok(Json(queries::list_steps_for_case(&conn, &path.case_id)?))
}
