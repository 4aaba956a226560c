//! Identity middleware: bearer session token -> `CurrentUser`.
//!
//! The resolved principal (identity, roles, both assignment sets) is built
//! exactly once per request and inserted into request extensions. Handlers
//! and the authorization predicates consume that value; nothing downstream
//! re-derives identity, so the checks cannot drift apart.

use std::collections::HashMap;

use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};

use crate::db::{queries, AppState};
use crate::error::{msg, AppError};

pub async fn session_auth(
    State(state): State<AppState>,
    // Routes nest more captures than org_id; pull just the one we guard on.
    Path(params): Path<HashMap<String, String>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let org_id = params
        .get("org_id")
        .cloned()
        .ok_or_else(|| AppError::Internal("route missing org_id capture".into()))?;
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthenticated)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthenticated)?;

    let conn = state.db.get()?;

    let user_id = queries::get_user_id_by_session(&conn, token)?
        .ok_or(AppError::Unauthenticated)?;
    let current = queries::load_current_user(&conn, &user_id)?
        .ok_or(AppError::Unauthenticated)?;

    // Hand the connection back before the handler runs.
    drop(conn);

    // Org mismatch reads as absence: foreign tenants see the same 404 a
    // nonexistent org would produce.
    if current.org_id != org_id {
        return Err(AppError::NotFound(msg::ORG_NOT_FOUND.into()));
    }

    request.extensions_mut().insert(current);
    Ok(next.run(request).await)
}
