// Route exports
pub mod dev;
pub mod matches;

pub use matches::AppState;

use actix_web::{error, http::StatusCode, web, HttpRequest, HttpResponse};

use crate::core::MatchError;
use crate::models::{ErrorResponse, Identity};
use crate::services::{AuthError, EngineError};

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(matches::configure)
            .configure(dev::configure),
    );
}

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST))
            .json(self)
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    JsonError {
        error: "invalid_query".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle path parameter errors
pub fn handle_path_error(err: error::PathError, _req: &HttpRequest) -> actix_web::Error {
    JsonError {
        error: "invalid_path".to_string(),
        message: format!("Invalid path: {}", err),
        status_code: 400,
    }
    .into()
}

pub(crate) fn error_response(status: StatusCode, error: &str, message: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status).json(ErrorResponse {
        error: error.to_string(),
        message: message.into(),
        status_code: status.as_u16(),
    })
}

pub(crate) fn match_error_response(err: &MatchError) -> HttpResponse {
    let (status, error) = match err {
        MatchError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
        MatchError::AttestationInvalid(_) => (StatusCode::BAD_REQUEST, "attestation_invalid"),
        MatchError::PermissionDenied(_) => (StatusCode::FORBIDDEN, "permission_denied"),
        MatchError::NotRegistered(_) => (StatusCode::NOT_FOUND, "not_registered"),
        MatchError::Engine(_) => (StatusCode::INTERNAL_SERVER_ERROR, "engine_error"),
    };
    if status.is_server_error() {
        tracing::error!("Request failed: {}", err);
    } else {
        tracing::debug!("Request rejected: {}", err);
    }
    error_response(status, error, err.to_string())
}

pub(crate) fn engine_error_response(err: &EngineError) -> HttpResponse {
    match err {
        EngineError::DecryptionDenied { .. } => error_response(StatusCode::FORBIDDEN, "decryption_denied", err.to_string()),
        EngineError::UnknownHandle(_) => error_response(StatusCode::NOT_FOUND, "unknown_handle", err.to_string()),
        other => match_error_response(&MatchError::from(other.clone())),
    }
}

pub(crate) fn validation_error_response(errors: &validator::ValidationErrors) -> HttpResponse {
    error_response(StatusCode::BAD_REQUEST, "Validation failed", errors.to_string())
}

/// Caller identity from the request's bearer token
pub(crate) fn caller_identity(state: &AppState, req: &HttpRequest) -> Result<Identity, HttpResponse> {
    let header = req
        .headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let caller = state.auth.identity_from_header(header).map_err(|err| {
        tracing::debug!("Rejected caller on {}: {}", req.path(), err);
        let error = match err {
            AuthError::MissingToken => "missing_token",
            _ => "invalid_token",
        };
        error_response(StatusCode::UNAUTHORIZED, error, err.to_string())
    })?;

    // Result grants name the system identity, so a token for it would read every result
    if &caller == state.service.system_identity() {
        tracing::warn!("Rejected token for the system identity on {}", req.path());
        return Err(error_response(
            StatusCode::FORBIDDEN,
            "reserved_identity",
            format!("{} is reserved for the match service", caller),
        ));
    }

    Ok(caller)
}
