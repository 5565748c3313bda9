//! Domain service for authentication.
//!
//! Registration plus the guarded login: credentials are checked behind the
//! brute-force lockout state machine and every outcome lands in the audit
//! trail before the caller sees it.

use thiserror::Error;

use crate::services::token::TokenError;

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Outcome of one guarded login attempt. Each variant maps to exactly one
/// HTTP response and has already been written to the audit trail.
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    /// 200 with the signed token
    Success { token: String },
    /// 401 with a generic message; account existence is not revealed
    UnknownUser,
    /// 401 with the remaining attempt count
    WrongPassword { remaining: u32 },
    /// 403; this attempt crossed the threshold and locked the account
    LockedOut { window_minutes: i64 },
    /// 403; attempt during an active brute window extended it
    LockedBrute { retry_after_minutes: i64 },
    /// 403; administrative lock, cleared only by an operator
    LockedAdmin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Created,
    EmailTaken,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Drive one login attempt through the lockout state machine.
    async fn login(
        &self,
        email: &str,
        password: &str,
        ip: Option<String>,
    ) -> Result<LoginOutcome, AuthError>;

    /// Create an account with the `user` role.
    async fn register(
        &self,
        email: &str,
        name: &str,
        password: &str,
        ip: Option<String>,
    ) -> Result<RegisterOutcome, AuthError>;
}
