//! Append-only audit trail of security-relevant events.

use serde_json::Value;
use tracing::warn;

use crate::db::Store;

/// Event tags written to the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    RegisterSuccess,
    RegisterFailedEmailExists,
    LoginSuccess,
    LoginFailedUserNotFound,
    LoginFailedWrongPassword,
    AccountLockedBruteForce,
    LoginAttemptDuringLockout,
    LoginAttemptAdminLocked,
    AccountUnlockedTimeout,
    AccountLockedAdmin,
    AccountUnlockedAdmin,
    UserRoleChanged,
    UserDeleted,
    XssAttemptFailed,
    LogInjectionAttemptFailed,
    TraversalAttemptBlocked,
    TraversalTestAllowed,
}

impl AuditAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RegisterSuccess => "REGISTER_SUCCESS",
            Self::RegisterFailedEmailExists => "REGISTER_FAILED_EMAIL_EXISTS",
            Self::LoginSuccess => "LOGIN_SUCCESS",
            Self::LoginFailedUserNotFound => "LOGIN_FAILED_USER_NOT_FOUND",
            Self::LoginFailedWrongPassword => "LOGIN_FAILED_WRONG_PASSWORD",
            Self::AccountLockedBruteForce => "ACCOUNT_LOCKED_BRUTE_FORCE",
            Self::LoginAttemptDuringLockout => "LOGIN_ATTEMPT_DURING_LOCKOUT",
            Self::LoginAttemptAdminLocked => "LOGIN_ATTEMPT_ADMIN_LOCKED",
            Self::AccountUnlockedTimeout => "ACCOUNT_UNLOCKED_TIMEOUT",
            Self::AccountLockedAdmin => "ACCOUNT_LOCKED_ADMIN",
            Self::AccountUnlockedAdmin => "ACCOUNT_UNLOCKED_ADMIN",
            Self::UserRoleChanged => "USER_ROLE_CHANGED",
            Self::UserDeleted => "USER_DELETED",
            Self::XssAttemptFailed => "XSS_ATTEMPT_FAILED",
            Self::LogInjectionAttemptFailed => "LOG_INJECTION_ATTEMPT_FAILED",
            Self::TraversalAttemptBlocked => "TRAVERSAL_ATTEMPT_BLOCKED",
            Self::TraversalTestAllowed => "TRAVERSAL_TEST_ALLOWED",
        }
    }

    /// Failure events keep their JSON context; the rest store none.
    /// An explicit match, not a substring test: `ACCOUNT_UNLOCKED_TIMEOUT`
    /// contains "LOCKED" and is not a failure.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(
            self,
            Self::RegisterFailedEmailExists
                | Self::LoginFailedUserNotFound
                | Self::LoginFailedWrongPassword
                | Self::AccountLockedBruteForce
                | Self::LoginAttemptDuringLockout
                | Self::LoginAttemptAdminLocked
                | Self::XssAttemptFailed
                | Self::LogInjectionAttemptFailed
                | Self::TraversalAttemptBlocked
        )
    }
}

pub struct AuditService {
    store: Store,
    snippet_chars: usize,
}

impl AuditService {
    #[must_use]
    pub const fn new(store: Store, snippet_chars: usize) -> Self {
        Self {
            store,
            snippet_chars,
        }
    }

    /// Append one entry. Best-effort: a failed write is logged and swallowed
    /// so audit problems never abort the request being audited.
    pub async fn record(
        &self,
        action: AuditAction,
        user_id: Option<i32>,
        ip: Option<String>,
        context: Option<Value>,
    ) {
        let executed_command = if action.is_failure() {
            context.map(|c| snippet(&c.to_string(), self.snippet_chars))
        } else {
            None
        };

        if let Err(err) = self
            .store
            .record_audit(action.as_str(), user_id, ip, executed_command)
            .await
        {
            warn!("Failed to write audit entry {}: {err}", action.as_str());
        }
    }

    /// Cap a raw payload before it goes into an audit context field.
    #[must_use]
    pub fn snippet(&self, raw: &str) -> String {
        snippet(raw, self.snippet_chars)
    }
}

/// Cap a string by character count, marking the cut.
#[must_use]
pub fn snippet(raw: &str, cap: usize) -> String {
    let mut out: String = raw.chars().take(cap).collect();
    if out.len() < raw.len() {
        out.push_str("...[truncated]");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_classification_is_exact() {
        assert!(AuditAction::LoginFailedWrongPassword.is_failure());
        assert!(AuditAction::AccountLockedBruteForce.is_failure());
        assert!(AuditAction::TraversalAttemptBlocked.is_failure());

        // Contains "LOCKED" but records a recovery, not a failure
        assert!(!AuditAction::AccountUnlockedTimeout.is_failure());
        assert!(!AuditAction::LoginSuccess.is_failure());
        assert!(!AuditAction::UserDeleted.is_failure());
    }

    #[test]
    fn action_tags_are_screaming_snake() {
        assert_eq!(
            AuditAction::LoginAttemptDuringLockout.as_str(),
            "LOGIN_ATTEMPT_DURING_LOCKOUT"
        );
        assert_eq!(
            AuditAction::AccountUnlockedTimeout.as_str(),
            "ACCOUNT_UNLOCKED_TIMEOUT"
        );
    }

    #[test]
    fn snippet_caps_long_payloads() {
        let raw = "a".repeat(50);
        assert_eq!(snippet(&raw, 50), raw);

        let capped = snippet(&raw, 10);
        assert!(capped.starts_with("aaaaaaaaaa"));
        assert!(capped.ends_with("...[truncated]"));
    }
}
