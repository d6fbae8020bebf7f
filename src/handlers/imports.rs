use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::debug;

use crate::auth::CurrentSession;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::imports::{
    detect_headers, parser::parse_headers, required_permission, templates, ImportRecordKind,
    ImportResult,
};
use crate::{ApiResponse, ApiResult};

#[derive(Debug, Serialize)]
pub struct DetectResponse {
    pub kind: ImportRecordKind,
    pub headers: Vec<String>,
    /// `resource:action` the caller would need to run this import
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_permission: Option<String>,
    pub allowed: bool,
}

/// POST /api/v1/imports, body is the raw CSV text
pub async fn import_csv(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    body: String,
) -> ApiResult<ImportResult> {
    let result = state.imports.import_csv(&session, &body).await?;
    Ok(Json(ApiResponse::success(result)))
}

/// POST /api/v1/imports/detect
pub async fn detect_format(
    CurrentSession(session): CurrentSession,
    body: String,
) -> ApiResult<DetectResponse> {
    let headers = parse_headers(&body).unwrap_or_default();
    let kind = detect_headers(&headers);
    debug!(%kind, columns = headers.len(), "Detected import format");

    let permission = required_permission(kind);
    let response = DetectResponse {
        kind,
        headers,
        required_permission: permission
            .map(|(resource, action)| crate::auth::format_permission(resource, action)),
        allowed: permission
            .map(|(resource, action)| session.can_perform(resource, action))
            .unwrap_or(false),
    };

    Ok(Json(ApiResponse::success(response)))
}

/// GET /api/v1/imports/templates/:kind
pub async fn download_template(Path(kind): Path<String>) -> Result<Response, ServiceError> {
    let record_kind = kind
        .parse::<ImportRecordKind>()
        .map_err(|_| ServiceError::NotFound(format!("No import template named '{}'", kind)))?;
    let body = templates::template_for(record_kind)
        .ok_or_else(|| ServiceError::NotFound(format!("No import template named '{}'", kind)))?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        templates::template_file_name(record_kind)
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}
