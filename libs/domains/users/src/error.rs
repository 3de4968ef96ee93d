use thiserror::Error;

use crate::identity::IdentityError;

/// Errors reported by the storage ports
///
/// Adapters translate their native failures into exactly one of these.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepoError {
    #[error("Record not found")]
    NotFound,

    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    #[error("Storage failure: {0}")]
    ServerError(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors returned by [`crate::UserService`]
///
/// No storage error crosses this boundary untranslated.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UserError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("User not found")]
    RepoNotFound,

    #[error("Conflict: {0}")]
    RepoConflict(String),

    #[error("Repository error: {0}")]
    RepoServerError(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Password hashing error: {0}")]
    PasswordHash(String),
}

pub type UserResult<T> = Result<T, UserError>;

impl From<RepoError> for UserError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => UserError::RepoNotFound,
            RepoError::Conflict(msg) => UserError::RepoConflict(msg),
            RepoError::ServerError(msg) => UserError::RepoServerError(msg),
        }
    }
}

impl From<IdentityError> for UserError {
    fn from(err: IdentityError) -> Self {
        UserError::InvalidArgument(err.to_string())
    }
}

impl From<validator::ValidationErrors> for UserError {
    fn from(err: validator::ValidationErrors) -> Self {
        UserError::InvalidArgument(err.to_string())
    }
}

/// Translate SeaORM failures into storage port errors
impl From<sea_orm::DbErr> for RepoError {
    fn from(err: sea_orm::DbErr) -> Self {
        if let sea_orm::DbErr::RecordNotFound(_) = err {
            return RepoError::NotFound;
        }

        match err.sql_err() {
            Some(sea_orm::SqlErr::UniqueConstraintViolation(detail)) => RepoError::Conflict(detail),
            _ => RepoError::ServerError(err.to_string()),
        }
    }
}
