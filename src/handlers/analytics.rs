use axum::extract::{Extension, State};

use crate::access;
use crate::db::{
    queries::{self, AnalyticsVisibility},
    AppState,
};
use crate::error::{msg, AppError, Result};
use crate::extractors::{Json, Path, Query};
use crate::models::{AnalyticsReport, CurrentUser};

#[derive(serde::Deserialize, Default)]
pub struct AnalyticsQuery {
    /// ADMIN only: narrow the report to executions assigned to one user.
    pub user_id: Option<String>,
}

/// Pass/fail/coverage rollup. Scoped to the caller's organization, then to
/// their visibility: admins see everything (optionally filtered to one user),
/// everyone else sees only their own executions under modules they hold.
pub async fn get_analytics(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(org_id): Path<String>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<AnalyticsReport>> {
    let conn = state.db.get()?;

    let visibility = if user.is_admin() {
        let user_filter = match query.user_id {
            Some(ref target_id) => {
                Some(access::load_same_org_user(&conn, &user, target_id)?.id)
            }
            None => None,
        };
        AnalyticsVisibility {
            user_filter,
            module_filter: None,
        }
    } else {
        if query.user_id.is_some() {
            return Err(AppError::AccessDenied(
                msg::ANALYTICS_USER_FILTER_ADMIN_ONLY.into(),
            ));
        }
        AnalyticsVisibility {
            user_filter: Some(user.id.clone()),
            module_filter: Some(user.assigned_module_ids.clone()),
        }
    };

    let report = queries::analytics_report(&conn, &org_id, &visibility)?;
    Ok(Json(report))
}
