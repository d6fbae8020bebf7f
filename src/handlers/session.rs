use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{CurrentSession, Permission, Role, SessionContext};
use crate::handlers::AppState;
use crate::{ApiResponse, ApiResult};

#[derive(Debug, Deserialize, Validate)]
pub struct PermissionQuery {
    #[validate(length(min = 1, max = 64))]
    pub resource: String,
    #[validate(length(min = 1, max = 64))]
    pub action: String,
}

#[derive(Debug, Serialize)]
pub struct PermissionCheck {
    pub resource: String,
    pub action: String,
    pub role: Role,
    /// Matched an explicit grant
    pub explicit: bool,
    /// Explicit grant or role shortcut
    pub allowed: bool,
}

#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub user_id: Uuid,
    pub tenant_id: String,
    pub role: Role,
    pub permissions: Vec<Permission>,
    pub loaded_at: String,
}

impl From<&SessionContext> for SessionSummary {
    fn from(session: &SessionContext) -> Self {
        Self {
            user_id: session.user_id,
            tenant_id: session.tenant_id.clone(),
            role: session.role(),
            permissions: session.evaluator().permissions().entries().to_vec(),
            loaded_at: session.loaded_at.to_rfc3339(),
        }
    }
}

/// GET /api/v1/session
pub async fn current_session(CurrentSession(session): CurrentSession) -> ApiResult<SessionSummary> {
    Ok(Json(ApiResponse::success(SessionSummary::from(
        session.as_ref(),
    ))))
}

/// GET /api/v1/session/permissions?resource=&action=
pub async fn check_permission(
    CurrentSession(session): CurrentSession,
    Query(query): Query<PermissionQuery>,
) -> ApiResult<PermissionCheck> {
    query.validate()?;

    let check = PermissionCheck {
        explicit: session.has_permission(&query.resource, &query.action),
        allowed: session.can_perform(&query.resource, &query.action),
        role: session.role(),
        resource: query.resource,
        action: query.action,
    };
    Ok(Json(ApiResponse::success(check)))
}

/// POST /api/v1/session/refresh: reloads role and permissions for the caller
pub async fn refresh_session(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> ApiResult<SessionSummary> {
    let refreshed = state
        .sessions
        .refresh(session.user_id, &session.tenant_id)
        .await?;
    Ok(Json(ApiResponse::success(SessionSummary::from(
        refreshed.as_ref(),
    ))))
}
