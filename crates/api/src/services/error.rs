use axum::http::StatusCode;
use concierge_auth::AuthError;
use concierge_database::{is_foreign_key_violation, is_unique_violation};
use concierge_integrations::IntegrationError;
use thiserror::Error;

use crate::ApiError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Integration(#[from] IntegrationError),
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Map constraint failures to a conflict with a domain message, leaving other errors alone.
    pub fn on_constraint(message: &'static str) -> impl Fn(sqlx::Error) -> ServiceError {
        move |error| {
            if is_unique_violation(&error) || is_foreign_key_violation(&error) {
                ServiceError::conflict(message)
            } else {
                ServiceError::Database(error)
            }
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(msg) => ApiError::not_found(msg),
            ServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            ServiceError::BadRequest(msg) => ApiError::bad_request(msg),
            ServiceError::Conflict(msg) => ApiError::conflict(msg),
            ServiceError::Database(db_err) => {
                if is_unique_violation(&db_err) {
                    return ApiError::conflict("resource already exists");
                }
                if is_foreign_key_violation(&db_err) {
                    return ApiError::conflict("resource is still referenced");
                }
                if matches!(db_err, sqlx::Error::RowNotFound) {
                    return ApiError::not_found("resource not found");
                }
                tracing::error!(error = %db_err, "database error");
                ApiError::internal_server_error("database operation failed")
            }
            ServiceError::Auth(auth_err) => ApiError::from(auth_err),
            ServiceError::Integration(integration_err) => ApiError::from(integration_err),
            ServiceError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_expected_statuses() {
        let cases = [
            (ServiceError::not_found("x"), StatusCode::NOT_FOUND),
            (ServiceError::forbidden("x"), StatusCode::FORBIDDEN),
            (ServiceError::bad_request("x"), StatusCode::BAD_REQUEST),
            (ServiceError::conflict("x"), StatusCode::CONFLICT),
            (ServiceError::internal("x"), StatusCode::INTERNAL_SERVER_ERROR),
            (
                ServiceError::Database(sqlx::Error::RowNotFound),
                StatusCode::NOT_FOUND,
            ),
            (
                ServiceError::Integration(IntegrationError::NotConfigured("stripe")),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ServiceError::Integration(IntegrationError::Upstream {
                    status: 500,
                    body: String::new(),
                }),
                StatusCode::BAD_GATEWAY,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).status, expected);
        }
    }

    #[test]
    fn messages_are_preserved() {
        let api = ApiError::from(ServiceError::bad_request("quantity must be positive"));
        assert_eq!(api.message, "quantity must be positive");
    }
}
