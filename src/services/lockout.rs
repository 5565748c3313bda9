//! Brute-force lockout state machine.
//!
//! Lock state is derived from the persisted user fields, stepped through a
//! single transition function, and written back by the caller. Time math
//! lives here and nowhere else.

use chrono::{DateTime, Duration, Utc};

use crate::config::SecurityConfig;
use crate::db::User;

/// Lock status parsed from the persisted `is_locked` / `failed_login` /
/// `locked_at` columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Active { strikes: u32 },
    /// Set by an operator; never expires on its own.
    LockedAdmin,
    LockedBrute { since: DateTime<Utc>, strikes: u32 },
}

impl LockState {
    /// Parse from a user row. A locked row with a failure count but no
    /// readable timestamp cannot expire, so it is treated as an
    /// administrative lock rather than silently unlocking.
    #[must_use]
    pub fn of_user(user: &User) -> Self {
        if !user.is_locked {
            return Self::Active {
                strikes: u32::try_from(user.failed_login.max(0)).unwrap_or(0),
            };
        }

        if user.failed_login > 0 {
            if let Some(since) = user
                .locked_at
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            {
                return Self::LockedBrute {
                    since: since.with_timezone(&Utc),
                    strikes: u32::try_from(user.failed_login).unwrap_or(0),
                };
            }
        }

        Self::LockedAdmin
    }

    /// Column values to persist: (`is_locked`, `failed_login`, `locked_at`).
    #[must_use]
    pub fn fields(&self) -> (bool, i32, Option<String>) {
        match self {
            Self::Active { strikes } => (false, i32::try_from(*strikes).unwrap_or(i32::MAX), None),
            Self::LockedAdmin => (true, 0, None),
            Self::LockedBrute { since, strikes } => (
                true,
                i32::try_from(*strikes).unwrap_or(i32::MAX),
                Some(since.to_rfc3339()),
            ),
        }
    }
}

/// Login attempt events, in the order the login flow emits them: every
/// request starts with `Attempt`; the password events follow only when the
/// gate lets the attempt through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginEvent {
    Attempt,
    PasswordCorrect,
    PasswordWrong,
}

/// Result of one transition step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: LockState,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Attempt may proceed to the password check.
    Proceed,
    /// Brute window elapsed; lock cleared, attempt proceeds.
    ProceedUnlocked,
    /// Administrative lock; rejected unconditionally.
    RejectedAdminLock,
    /// Inside the brute window; window restarted and the counter grew.
    RejectedBruteLock { retry_after_minutes: i64 },
    /// Correct password accepted, counters reset.
    Accepted,
    /// Wrong password below the lock threshold.
    Rejected { remaining: u32 },
    /// Wrong password reached the threshold; account is now locked.
    LockedOut { window_minutes: i64 },
}

/// Thresholds, explicit at construction.
#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    pub max_attempts: u32,
    pub base_window: Duration,
}

impl LockoutPolicy {
    #[must_use]
    pub fn from_config(config: &SecurityConfig) -> Self {
        Self {
            max_attempts: config.lockout_max_attempts,
            base_window: Duration::minutes(config.lockout_base_window_minutes),
        }
    }

    /// Enforced window for a given strike count: the base window, doubled
    /// once the count has reached the attempt threshold.
    #[must_use]
    pub fn window_for(&self, strikes: u32) -> Duration {
        if strikes >= self.max_attempts {
            self.base_window * 2
        } else {
            self.base_window
        }
    }

    /// Step the state machine. Total over all state/event pairs: password
    /// events against a still-locked state behave like the attempt gate, so
    /// a misordered caller cannot bypass a lock.
    #[must_use]
    pub fn transition(&self, state: LockState, event: LoginEvent, now: DateTime<Utc>) -> Transition {
        match (state, event) {
            (LockState::LockedAdmin, _) => Transition {
                next: LockState::LockedAdmin,
                outcome: Outcome::RejectedAdminLock,
            },

            (LockState::LockedBrute { since, strikes }, event) => {
                let window = self.window_for(strikes);
                if now - since < window {
                    // Attempting during the window restarts it and raises
                    // the counter, regardless of the submitted password.
                    let strikes = strikes.saturating_add(1);
                    Transition {
                        next: LockState::LockedBrute { since: now, strikes },
                        outcome: Outcome::RejectedBruteLock {
                            retry_after_minutes: self.window_for(strikes).num_minutes(),
                        },
                    }
                } else {
                    let unlocked = LockState::Active { strikes: 0 };
                    match event {
                        LoginEvent::Attempt => Transition {
                            next: unlocked,
                            outcome: Outcome::ProceedUnlocked,
                        },
                        _ => self.transition(unlocked, event, now),
                    }
                }
            }

            (LockState::Active { strikes }, LoginEvent::Attempt) => Transition {
                next: LockState::Active { strikes },
                outcome: Outcome::Proceed,
            },

            (LockState::Active { .. }, LoginEvent::PasswordCorrect) => Transition {
                next: LockState::Active { strikes: 0 },
                outcome: Outcome::Accepted,
            },

            (LockState::Active { strikes }, LoginEvent::PasswordWrong) => {
                let strikes = strikes.saturating_add(1);
                if strikes >= self.max_attempts {
                    Transition {
                        next: LockState::LockedBrute { since: now, strikes },
                        outcome: Outcome::LockedOut {
                            window_minutes: self.base_window.num_minutes(),
                        },
                    }
                } else {
                    Transition {
                        next: LockState::Active { strikes },
                        outcome: Outcome::Rejected {
                            remaining: self.max_attempts - strikes,
                        },
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> LockoutPolicy {
        LockoutPolicy {
            max_attempts: 5,
            base_window: Duration::minutes(15),
        }
    }

    fn user_row(is_locked: bool, failed_login: i32, locked_at: Option<String>) -> User {
        User {
            id: 1,
            email: "a@example.com".to_string(),
            name: "A".to_string(),
            role: "user".to_string(),
            is_locked,
            failed_login,
            locked_at,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn active_attempt_proceeds() {
        let t = policy().transition(
            LockState::Active { strikes: 2 },
            LoginEvent::Attempt,
            Utc::now(),
        );
        assert_eq!(t.outcome, Outcome::Proceed);
        assert_eq!(t.next, LockState::Active { strikes: 2 });
    }

    #[test]
    fn admin_lock_never_expires() {
        let now = Utc::now();
        let later = now + Duration::days(365);
        let t = policy().transition(LockState::LockedAdmin, LoginEvent::Attempt, later);
        assert_eq!(t.outcome, Outcome::RejectedAdminLock);
        assert_eq!(t.next, LockState::LockedAdmin);
    }

    #[test]
    fn brute_lock_rejects_and_extends_within_window() {
        let p = policy();
        let locked_at = Utc::now();
        let attempt_at = locked_at + Duration::minutes(10);

        let t = p.transition(
            LockState::LockedBrute {
                since: locked_at,
                strikes: 5,
            },
            LoginEvent::Attempt,
            attempt_at,
        );

        assert_eq!(
            t.outcome,
            Outcome::RejectedBruteLock {
                retry_after_minutes: 30
            }
        );
        // Window restarts from the newest attempt and the counter grows
        assert_eq!(
            t.next,
            LockState::LockedBrute {
                since: attempt_at,
                strikes: 6,
            }
        );
    }

    #[test]
    fn brute_lock_clears_after_window() {
        let p = policy();
        let locked_at = Utc::now();
        // strikes >= 5 doubles the window to 30 minutes
        let attempt_at = locked_at + Duration::minutes(31);

        let t = p.transition(
            LockState::LockedBrute {
                since: locked_at,
                strikes: 5,
            },
            LoginEvent::Attempt,
            attempt_at,
        );

        assert_eq!(t.outcome, Outcome::ProceedUnlocked);
        assert_eq!(t.next, LockState::Active { strikes: 0 });
    }

    #[test]
    fn window_doubles_at_the_attempt_threshold() {
        let p = policy();
        assert_eq!(p.window_for(4), Duration::minutes(15));
        assert_eq!(p.window_for(5), Duration::minutes(30));
        assert_eq!(p.window_for(9), Duration::minutes(30));
    }

    #[test]
    fn fifth_wrong_password_locks() {
        let now = Utc::now();
        let t = policy().transition(
            LockState::Active { strikes: 4 },
            LoginEvent::PasswordWrong,
            now,
        );

        assert_eq!(t.outcome, Outcome::LockedOut { window_minutes: 15 });
        assert_eq!(
            t.next,
            LockState::LockedBrute {
                since: now,
                strikes: 5,
            }
        );
    }

    #[test]
    fn wrong_password_reports_remaining_attempts() {
        let t = policy().transition(
            LockState::Active { strikes: 0 },
            LoginEvent::PasswordWrong,
            Utc::now(),
        );
        assert_eq!(t.outcome, Outcome::Rejected { remaining: 4 });
        assert_eq!(t.next, LockState::Active { strikes: 1 });
    }

    #[test]
    fn correct_password_resets_counters() {
        let t = policy().transition(
            LockState::Active { strikes: 3 },
            LoginEvent::PasswordCorrect,
            Utc::now(),
        );
        assert_eq!(t.outcome, Outcome::Accepted);
        assert_eq!(t.next, LockState::Active { strikes: 0 });
    }

    #[test]
    fn correct_password_during_window_is_still_rejected() {
        let p = policy();
        let locked_at = Utc::now();
        let attempt_at = locked_at + Duration::minutes(1);

        let t = p.transition(
            LockState::LockedBrute {
                since: locked_at,
                strikes: 5,
            },
            LoginEvent::PasswordCorrect,
            attempt_at,
        );

        assert!(matches!(t.outcome, Outcome::RejectedBruteLock { .. }));
        assert_eq!(
            t.next,
            LockState::LockedBrute {
                since: attempt_at,
                strikes: 6,
            }
        );
    }

    #[test]
    fn parses_lock_state_from_user_rows() {
        let now = Utc::now();

        let active = user_row(false, 2, None);
        assert_eq!(LockState::of_user(&active), LockState::Active { strikes: 2 });

        let admin = user_row(true, 0, None);
        assert_eq!(LockState::of_user(&admin), LockState::LockedAdmin);

        let brute = user_row(true, 5, Some(now.to_rfc3339()));
        match LockState::of_user(&brute) {
            LockState::LockedBrute { strikes, since } => {
                assert_eq!(strikes, 5);
                assert_eq!(since.timestamp(), now.timestamp());
            }
            other => panic!("expected brute lock, got {other:?}"),
        }

        // Locked with strikes but no timestamp: cannot expire, so admin lock
        let corrupt = user_row(true, 3, None);
        assert_eq!(LockState::of_user(&corrupt), LockState::LockedAdmin);
    }

    #[test]
    fn fields_round_trip() {
        let now = Utc::now();
        let state = LockState::LockedBrute {
            since: now,
            strikes: 6,
        };
        let (is_locked, failed_login, locked_at) = state.fields();
        assert!(is_locked);
        assert_eq!(failed_login, 6);

        let row = user_row(is_locked, failed_login, locked_at);
        match LockState::of_user(&row) {
            LockState::LockedBrute { strikes, .. } => assert_eq!(strikes, 6),
            other => panic!("expected brute lock, got {other:?}"),
        }
    }
}
