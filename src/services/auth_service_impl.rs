//! `SeaORM` implementation of the `AuthService` trait.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::info;

use crate::config::SecurityConfig;
use crate::db::{Store, User};
use crate::services::audit::{AuditAction, AuditService};
use crate::services::auth_service::{AuthError, AuthService, LoginOutcome, RegisterOutcome};
use crate::services::lockout::{LockState, LockoutPolicy, LoginEvent, Outcome};
use crate::services::token::TokenService;

pub struct SeaOrmAuthService {
    store: Store,
    audit: Arc<AuditService>,
    tokens: Arc<TokenService>,
    policy: LockoutPolicy,
    security: SecurityConfig,
}

impl SeaOrmAuthService {
    #[must_use]
    pub fn new(
        store: Store,
        audit: Arc<AuditService>,
        tokens: Arc<TokenService>,
        security: &SecurityConfig,
    ) -> Self {
        Self {
            store,
            audit,
            tokens,
            policy: LockoutPolicy::from_config(security),
            security: security.clone(),
        }
    }

    async fn persist(&self, user: &User, state: LockState) -> Result<(), AuthError> {
        let (is_locked, failed_login, locked_at) = state.fields();
        self.store
            .set_user_lock_fields(user.id, is_locked, failed_login, locked_at)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn login(
        &self,
        email: &str,
        password: &str,
        ip: Option<String>,
    ) -> Result<LoginOutcome, AuthError> {
        let Some((user, password_hash)) =
            self.store.get_user_by_email_with_password(email).await?
        else {
            self.audit
                .record(
                    AuditAction::LoginFailedUserNotFound,
                    None,
                    ip,
                    Some(json!({ "email": email })),
                )
                .await;
            return Ok(LoginOutcome::UnknownUser);
        };

        let now = Utc::now();
        let state = LockState::of_user(&user);

        // Gate on the lock state before any password work
        let gate = self.policy.transition(state, LoginEvent::Attempt, now);
        let state = match gate.outcome {
            Outcome::RejectedAdminLock => {
                self.audit
                    .record(
                        AuditAction::LoginAttemptAdminLocked,
                        Some(user.id),
                        ip,
                        Some(json!({ "email": email })),
                    )
                    .await;
                return Ok(LoginOutcome::LockedAdmin);
            }
            Outcome::RejectedBruteLock {
                retry_after_minutes,
            } => {
                self.persist(&user, gate.next).await?;
                self.audit
                    .record(
                        AuditAction::LoginAttemptDuringLockout,
                        Some(user.id),
                        ip,
                        Some(json!({
                            "email": email,
                            "lockDurationMinutes": retry_after_minutes,
                        })),
                    )
                    .await;
                return Ok(LoginOutcome::LockedBrute {
                    retry_after_minutes,
                });
            }
            Outcome::ProceedUnlocked => {
                self.persist(&user, gate.next).await?;
                self.audit
                    .record(
                        AuditAction::AccountUnlockedTimeout,
                        Some(user.id),
                        ip.clone(),
                        None,
                    )
                    .await;
                gate.next
            }
            _ => gate.next,
        };

        let correct = self
            .store
            .verify_user_password(password_hash, password.to_string())
            .await?;
        let event = if correct {
            LoginEvent::PasswordCorrect
        } else {
            LoginEvent::PasswordWrong
        };
        let result = self.policy.transition(state, event, now);

        match result.outcome {
            Outcome::Accepted => {
                self.persist(&user, result.next).await?;
                let token = self.tokens.issue(user.id, &user.email, &user.role)?;
                self.audit
                    .record(AuditAction::LoginSuccess, Some(user.id), ip, None)
                    .await;
                info!(user_id = user.id, "Login succeeded");
                Ok(LoginOutcome::Success { token })
            }
            Outcome::Rejected { remaining } => {
                self.persist(&user, result.next).await?;
                self.audit
                    .record(
                        AuditAction::LoginFailedWrongPassword,
                        Some(user.id),
                        ip,
                        Some(json!({
                            "email": email,
                            "remainingAttempts": remaining,
                        })),
                    )
                    .await;
                Ok(LoginOutcome::WrongPassword { remaining })
            }
            Outcome::LockedOut { window_minutes } => {
                self.persist(&user, result.next).await?;
                let attempts = match result.next {
                    LockState::LockedBrute { strikes, .. } => strikes,
                    _ => self.policy.max_attempts,
                };
                self.audit
                    .record(
                        AuditAction::AccountLockedBruteForce,
                        Some(user.id),
                        ip,
                        Some(json!({
                            "email": email,
                            "attempts": attempts,
                            "lockDurationMinutes": window_minutes,
                        })),
                    )
                    .await;
                Ok(LoginOutcome::LockedOut { window_minutes })
            }
            // Password events after a Proceed gate can only yield password
            // outcomes; anything else is a machine bug.
            _ => Err(AuthError::Internal(
                "unexpected lockout transition".to_string(),
            )),
        }
    }

    async fn register(
        &self,
        email: &str,
        name: &str,
        password: &str,
        ip: Option<String>,
    ) -> Result<RegisterOutcome, AuthError> {
        if self.store.get_user_by_email(email).await?.is_some() {
            self.audit
                .record(
                    AuditAction::RegisterFailedEmailExists,
                    None,
                    ip,
                    Some(json!({ "email": email })),
                )
                .await;
            return Ok(RegisterOutcome::EmailTaken);
        }

        let user = self
            .store
            .create_user(email, name, password, "user", Some(&self.security))
            .await?;

        self.audit
            .record(AuditAction::RegisterSuccess, Some(user.id), ip, None)
            .await;
        info!(user_id = user.id, "User registered");

        Ok(RegisterOutcome::Created)
    }
}
