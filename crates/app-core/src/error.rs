//! Centralized error handling for the Axum HTTP surface.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bb8_redis::bb8;
use bb8_redis::redis;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use super::config::ConfigError;
use super::oauth::OAuthError;
use super::uid::SnowflakeError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Invalid request format: {0}")]
    RequestFormat(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    // Internal libraries
    #[error("Config operation failed")]
    Config(#[from] ConfigError),

    #[error("OAuth operation failed")]
    OAuth(#[from] OAuthError),

    #[error("Snowflake operation failed")]
    IdGeneration(#[from] SnowflakeError),

    // Third-party libraries
    #[error("Sea ORM operation failed")]
    Database(#[from] sea_orm::DbErr),

    #[error("Redis operation failed")]
    Redis(#[from] redis::RedisError),

    #[error("Redis connection pool operation failed")]
    RedisPool(#[from] bb8::RunError<redis::RedisError>),

    #[error("Serde JSON operation failed")]
    JsonParse(#[from] serde_json::Error),

    #[error("An internal server error occurred")]
    Internal,
}

const INTERNAL_MSG: &str = "An internal server error occurred";

#[derive(Serialize)]
struct ErrorResponse {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, details) = match self {
            AppError::Validation(err) => {
                let details = json!(err.field_errors());
                (StatusCode::UNPROCESSABLE_ENTITY, "Validation failed".to_string(), Some(details))
            },
            AppError::RequestFormat(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg, None),

            AppError::Config(err) => {
                tracing::error!("config getter error: {err:?}");
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MSG.to_string(), None)
            },
            AppError::OAuth(err) => {
                let status = match err {
                    OAuthError::InvalidUrl(_)
                    | OAuthError::TokenExchange(_)
                    | OAuthError::InvalidState(_)
                    | OAuthError::ProviderNotFound(_) => StatusCode::BAD_REQUEST,
                    OAuthError::HttpClient(_) | OAuthError::AttributesParse => StatusCode::BAD_GATEWAY,
                };
                let message = match err {
                    OAuthError::InvalidUrl(_) | OAuthError::ProviderNotFound(_) => err.to_string(),
                    OAuthError::HttpClient(_) | OAuthError::AttributesParse => "OAuth provider unavailable".to_string(),
                    OAuthError::TokenExchange(_) | OAuthError::InvalidState(_) => "OAuth operation failed".to_string(),
                };
                (status, message, None)
            },
            AppError::IdGeneration(err) => {
                tracing::error!("id generation error: {err:?}");
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MSG.to_string(), None)
            },

            AppError::Database(err) => {
                tracing::error!("database error: {err:?}");
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MSG.to_string(), None)
            },
            AppError::Redis(err) | AppError::RedisPool(bb8::RunError::User(err)) => {
                tracing::error!("redis error: {err:?}");
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MSG.to_string(), None)
            },
            AppError::RedisPool(bb8::RunError::TimedOut) => {
                tracing::error!("redis connection pool timed out");
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MSG.to_string(), None)
            },
            AppError::JsonParse(err) => {
                tracing::error!("failed to serialize JSON: {err:?}");
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MSG.to_string(), None)
            },
            AppError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MSG.to_string(), None),
        };

        (status, Json(ErrorResponse { message, details })).into_response()
    }
}
