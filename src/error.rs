use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::state::state_machine::RuleViolation;

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The match rules refused the command.
    #[error(transparent)]
    Rule(#[from] RuleViolation),
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Command refused by a match rule.
    #[error("{message}")]
    RuleViolation {
        /// Machine-readable code, e.g. `LIBERO_INVOLVED`.
        code: &'static str,
        /// Human-readable reason.
        message: String,
    },
    /// Internal server error.
    #[error("internal error: {message}")]
    Internal {
        /// Machine-readable code when the failure comes from the engine.
        code: Option<&'static str>,
        /// Human-readable reason.
        message: String,
    },
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Rule(violation) if violation.is_programmer_error() => AppError::Internal {
                code: Some(violation.code()),
                message: violation.to_string(),
            },
            ServiceError::Rule(violation) => AppError::RuleViolation {
                code: violation.code(),
                message: violation.to_string(),
            },
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = match &self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, None),
            AppError::RuleViolation { code, .. } => (StatusCode::CONFLICT, Some(*code)),
            AppError::Internal { code, .. } => (StatusCode::INTERNAL_SERVER_ERROR, *code),
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
            code,
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::game::Side;
    use crate::state::state_machine::Quota;

    #[test]
    fn rule_violations_map_to_conflict() {
        let err = AppError::from(ServiceError::Rule(RuleViolation::QuotaExceeded {
            side: Side::Home,
            quota: Quota::Substitutions,
        }));
        assert!(matches!(
            err,
            AppError::RuleViolation {
                code: "QUOTA_EXCEEDED",
                ..
            }
        ));
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn unknown_player_is_an_internal_error() {
        let err = AppError::from(ServiceError::Rule(RuleViolation::UnknownPlayer(42)));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
