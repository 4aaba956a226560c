use axum::extract::{Extension, State};

use crate::access;
use crate::db::{queries, AppState};
use crate::error::Result;
use crate::extractors::{Json, Path, Query};
use crate::models::{CreateUser, CurrentUser, User};
use crate::pagination::{Paginated, PaginationQuery};

pub async fn create_user(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(org_id): Path<String>,
    Json(input): Json<CreateUser>,
) -> Result<Json<User>> {
    access::require_admin(&user)?;
    input.validate()?;

    let conn = state.db.get()?;
    let created = queries::create_user(&conn, &org_id, &input)?;
    Ok(Json(created))
}

pub async fn list_users(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<Paginated<User>>> {
    let conn = state.db.get()?;
    let limit = pagination.limit();
    let offset = pagination.offset();
    let (users, total) = queries::list_users_for_org(&conn, &org_id, limit, offset)?;
    Ok(Json(Paginated::new(users, total, limit, offset)))
}

#[derive(serde::Deserialize)]
pub struct OrgUserPath {
    pub org_id: String,
    pub user_id: String,
}

pub async fn get_user(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(path): Path<OrgUserPath>,
) -> Result<Json<User>> {
    let conn = state.db.get()?;
    let target = access::load_same_org_user(&conn, &user, &path.user_id)?;
    Ok(Json(target))
}

/// Echo the resolved principal, assignments included, for role-aware UIs.
pub async fn me(Extension(user): Extension<CurrentUser>) -> Result<Json<CurrentUser>> {
    Ok(Json(user))
}
