//! Consistent error responses.
//!
//! Every payload, success or failure, travels in the `{status, body}`
//! envelope with the HTTP status mirrored in `status`. Failures put a stable
//! machine-checkable `error` code plus a human-readable message in `body`;
//! internal storage error text never reaches a client (it is logged at the
//! storage layer instead).

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use tribunal_auth::TokenError;
use tribunal_core::DomainError;

/// Wrap `body` in the response envelope.
pub fn respond(status: StatusCode, body: serde_json::Value) -> Response {
    (
        status,
        Json(json!({
            "status": status.as_u16(),
            "body": body,
        })),
    )
        .into_response()
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    respond(
        status,
        json!({
            "error": code,
            "message": message.into(),
        }),
    )
}

pub fn domain_error_response(err: DomainError) -> Response {
    let message = err.to_string();
    match err {
        DomainError::Validation(_) => json_error(StatusCode::BAD_REQUEST, "validation_error", message),
        DomainError::Unauthenticated => {
            json_error(StatusCode::UNAUTHORIZED, "unauthenticated", message)
        }
        DomainError::Forbidden => json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            "access denied - you are not the owner of the organisation",
        ),
        DomainError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", message),
        DomainError::QuotaExceeded(_) => {
            json_error(StatusCode::BAD_REQUEST, "quota_exceeded", message)
        }
        DomainError::DuplicateOpenCase => json_error(
            StatusCode::BAD_REQUEST,
            "duplicate_open_case",
            "appeal creation failed - you already have an open appeal for this form",
        ),
        DomainError::Conflict(_) => json_error(StatusCode::CONFLICT, "conflict", message),
        DomainError::Unavailable => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "unavailable",
            "service temporarily unavailable - please retry",
        ),
    }
}

pub fn token_error_response(err: TokenError) -> Response {
    match err {
        TokenError::InvalidSignature => json_error(
            StatusCode::UNAUTHORIZED,
            "invalid_signature",
            "invalid signature for provided token",
        ),
        TokenError::Expired => json_error(
            StatusCode::UNAUTHORIZED,
            "expired_token",
            "expired token - please log in again",
        ),
        TokenError::NotYetValid => json_error(
            StatusCode::UNAUTHORIZED,
            "token_not_yet_valid",
            "token not yet valid",
        ),
        TokenError::Malformed => json_error(
            StatusCode::BAD_REQUEST,
            "malformed_token",
            "error whilst processing token",
        ),
        TokenError::Signing => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "token_signing",
            "could not issue a token",
        ),
    }
}

pub fn missing_token_response() -> Response {
    json_error(
        StatusCode::UNAUTHORIZED,
        "unauthenticated",
        "access denied - token not found",
    )
}
