use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::api::common::{self, ErrorCode};

#[derive(Debug, Error)]
pub enum BlogError {
    #[error("validation failed: {1}")]
    Validation(ErrorCode, String),
    #[error("email already registered")]
    DuplicateEmail,
    #[error("a category with this slug already exists")]
    DuplicateSlug,
    #[error("token is invalid or already used")]
    InvalidToken,
    #[error("token expired")]
    TokenExpired,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account is banned")]
    AccountBanned,
    #[error("email address is not verified")]
    EmailNotVerified,
    #[error("forbidden")]
    Forbidden,
    #[error("an administrator cannot ban or demote their own account")]
    ForbiddenSelfAction,
    #[error("category is protected")]
    Protected,
    #[error("category still has posts")]
    NotEmpty,
    #[error("not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("migration error: {0}")]
    Migration(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
    #[error("blocking task failed")]
    Blocking(#[from] actix_web::error::BlockingError),
}

impl BlogError {
    pub fn validation(code: ErrorCode, message: impl Into<String>) -> Self {
        BlogError::Validation(code, message.into())
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            BlogError::Validation(code, _) => Some(*code),
            BlogError::DuplicateEmail => Some(ErrorCode::EmailDuplicated),
            BlogError::DuplicateSlug => Some(ErrorCode::SlugDuplicated),
            BlogError::InvalidToken => Some(ErrorCode::TokenInvalid),
            BlogError::TokenExpired => Some(ErrorCode::TokenExpired),
            BlogError::InvalidCredentials => Some(ErrorCode::InvalidCredentials),
            BlogError::AccountBanned => Some(ErrorCode::AccountBanned),
            BlogError::EmailNotVerified => Some(ErrorCode::EmailNotVerified),
            BlogError::ForbiddenSelfAction => Some(ErrorCode::SelfActionForbidden),
            BlogError::Protected => Some(ErrorCode::CategoryProtected),
            BlogError::NotEmpty => Some(ErrorCode::CategoryNotEmpty),
            BlogError::Forbidden | BlogError::NotFound => None,
            _ => Some(ErrorCode::Internal),
        }
    }
}

impl ResponseError for BlogError {
    fn status_code(&self) -> StatusCode {
        match self {
            BlogError::Forbidden => StatusCode::FORBIDDEN,
            BlogError::NotFound => StatusCode::NOT_FOUND,
            BlogError::Database(_)
            | BlogError::Pool(_)
            | BlogError::Migration(_)
            | BlogError::Io(_)
            | BlogError::PasswordHash(_)
            | BlogError::Blocking(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::OK,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }
        match self.error_code() {
            Some(code) => common::error_response_with_code(code, status),
            None => HttpResponse::build(status).finish(),
        }
    }
}
