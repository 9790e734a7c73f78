//! Failure counting and time-boxed lockouts for secret checks.
//!
//! State per (identity, secret kind): a wrong-attempt counter and an optional
//! `blocked_until` timestamp. The increment and the lock decision happen in a
//! single SQL statement, so concurrent wrong attempts against the same
//! identity each count exactly once even across service instances. Counters
//! reset only on a successful verification; an elapsed window merely stops
//! the guard from firing.

use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::error::AuthError;
use super::identity::Identity;

/// Which secret a counter belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecretKind {
    Password,
    Pin,
}

impl SecretKind {
    fn noun(self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::Pin => "PIN",
        }
    }

    /// Uniform wrong-secret prefix. The password variant matches the unknown
    /// email message so responses do not reveal whether the account exists.
    pub(crate) fn wrong_secret_message(self) -> &'static str {
        match self {
            Self::Password => "Incorrect email or password",
            Self::Pin => "Incorrect PIN",
        }
    }

    fn attempts(self, identity: &Identity) -> i32 {
        match self {
            Self::Password => identity.wrong_password_attempts,
            Self::Pin => identity.wrong_pin_attempts,
        }
    }

    fn blocked_until(self, identity: &Identity) -> Option<DateTime<Utc>> {
        match self {
            Self::Password => identity.blocked_until_password,
            Self::Pin => identity.blocked_until_pin,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockoutPolicy {
    max_attempts: i32,
    penalty_seconds: i64,
}

impl LockoutPolicy {
    #[must_use]
    pub fn new(max_attempts: i32, penalty_seconds: i64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            penalty_seconds: penalty_seconds.max(1),
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> i32 {
        self.max_attempts
    }

    #[must_use]
    pub fn penalty_seconds(&self) -> i64 {
        self.penalty_seconds
    }
}

/// Outcome of evaluating the counters against the policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptState {
    /// Checks are allowed; `remaining` wrong attempts are left before a lock.
    Open { remaining: i32 },
    /// Checks are refused until the timestamp passes.
    Locked { until: DateTime<Utc> },
}

/// Pure policy decision over counter + lockout timestamp.
#[must_use]
pub fn evaluate(
    policy: &LockoutPolicy,
    attempts: i32,
    blocked_until: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> AttemptState {
    if let Some(until) = blocked_until {
        if until > now {
            return AttemptState::Locked { until };
        }
    }
    AttemptState::Open {
        remaining: (policy.max_attempts - attempts).max(0),
    }
}

/// Refuse a secret check while a lockout window is active.
///
/// # Errors
///
/// Returns `Unauthorized` with the unlock time while locked.
pub fn ensure_not_locked(
    policy: &LockoutPolicy,
    identity: &Identity,
    kind: SecretKind,
    now: DateTime<Utc>,
) -> Result<(), AuthError> {
    match evaluate(policy, kind.attempts(identity), kind.blocked_until(identity), now) {
        AttemptState::Locked { until } => Err(AuthError::unauthorized(locked_message(kind, until))),
        AttemptState::Open { .. } => Ok(()),
    }
}

#[must_use]
pub fn locked_message(kind: SecretKind, until: DateTime<Utc>) -> String {
    format!(
        "Too many wrong {} attempts. Locked until {}",
        kind.noun(),
        until.format("%Y-%m-%d %H:%M:%S UTC")
    )
}

/// User-facing message for a freshly recorded wrong attempt.
#[must_use]
pub fn failure_message(kind: SecretKind, state: AttemptState) -> String {
    match state {
        AttemptState::Open { remaining } => format!(
            "{}. {} attempt(s) remaining before lockout",
            kind.wrong_secret_message(),
            remaining
        ),
        AttemptState::Locked { until } => locked_message(kind, until),
    }
}

const PASSWORD_FAILURE_QUERY: &str = r"
    UPDATE identities
    SET wrong_password_attempts = wrong_password_attempts + 1,
        blocked_until_password = CASE
            WHEN wrong_password_attempts + 1 >= $2
            THEN NOW() + ($3 * INTERVAL '1 second')
            ELSE blocked_until_password
        END,
        updated_at = NOW()
    WHERE id = $1
    RETURNING wrong_password_attempts AS attempts,
              blocked_until_password AS blocked_until
";

const PIN_FAILURE_QUERY: &str = r"
    UPDATE identities
    SET wrong_pin_attempts = wrong_pin_attempts + 1,
        blocked_until_pin = CASE
            WHEN wrong_pin_attempts + 1 >= $2
            THEN NOW() + ($3 * INTERVAL '1 second')
            ELSE blocked_until_pin
        END,
        updated_at = NOW()
    WHERE id = $1
    RETURNING wrong_pin_attempts AS attempts,
              blocked_until_pin AS blocked_until
";

const PASSWORD_RESET_QUERY: &str = r"
    UPDATE identities
    SET wrong_password_attempts = 0,
        blocked_until_password = NULL,
        updated_at = NOW()
    WHERE id = $1
";

const PIN_RESET_QUERY: &str = r"
    UPDATE identities
    SET wrong_pin_attempts = 0,
        blocked_until_pin = NULL,
        updated_at = NOW()
    WHERE id = $1
";

/// Record one wrong attempt and return the resulting state.
///
/// The increment and the conditional lock are a single atomic statement;
/// two concurrent failures both land and the third locks, no lost updates.
///
/// # Errors
///
/// Returns `Internal` if the store round-trip fails.
pub async fn record_failure(
    pool: &PgPool,
    policy: &LockoutPolicy,
    identity_id: Uuid,
    kind: SecretKind,
) -> Result<AttemptState, AuthError> {
    let query = match kind {
        SecretKind::Password => PASSWORD_FAILURE_QUERY,
        SecretKind::Pin => PIN_FAILURE_QUERY,
    };
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(identity_id)
        .bind(policy.max_attempts())
        .bind(policy.penalty_seconds())
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to record wrong attempt")?;

    let attempts: i32 = row.get("attempts");
    let blocked_until: Option<DateTime<Utc>> = row.get("blocked_until");
    Ok(evaluate(policy, attempts, blocked_until, Utc::now()))
}

/// Reset the counter and clear the lockout after a successful verification.
///
/// # Errors
///
/// Returns `Internal` if the store round-trip fails.
pub async fn reset(pool: &PgPool, identity_id: Uuid, kind: SecretKind) -> Result<(), AuthError> {
    let query = match kind {
        SecretKind::Password => PASSWORD_RESET_QUERY,
        SecretKind::Pin => PIN_RESET_QUERY,
    };
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(identity_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to reset attempt counter")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        AttemptState, LockoutPolicy, SecretKind, ensure_not_locked, evaluate, failure_message,
        locked_message,
    };
    use crate::auth::identity::test_identity;
    use chrono::{Duration, Utc};

    fn policy() -> LockoutPolicy {
        LockoutPolicy::new(3, 180)
    }

    #[test]
    fn fresh_identity_is_open_with_all_attempts_left() {
        let state = evaluate(&policy(), 0, None, Utc::now());
        assert_eq!(state, AttemptState::Open { remaining: 3 });
    }

    #[test]
    fn counter_shrinks_remaining_until_zero() {
        let now = Utc::now();
        assert_eq!(
            evaluate(&policy(), 2, None, now),
            AttemptState::Open { remaining: 1 }
        );
        // Remaining never goes negative no matter how high the counter is.
        assert_eq!(
            evaluate(&policy(), 7, None, now),
            AttemptState::Open { remaining: 0 }
        );
    }

    #[test]
    fn future_lockout_refuses_checks() {
        let now = Utc::now();
        let until = now + Duration::seconds(60);
        assert_eq!(
            evaluate(&policy(), 3, Some(until), now),
            AttemptState::Locked { until }
        );

        let mut identity = test_identity("a@example.com");
        identity.wrong_password_attempts = 3;
        identity.blocked_until_password = Some(until);
        let err = ensure_not_locked(&policy(), &identity, SecretKind::Password, now)
            .expect_err("locked identity must be refused");
        assert!(err.to_string().contains("Locked until"));
    }

    #[test]
    fn elapsed_lockout_opens_without_resetting_counter() {
        let now = Utc::now();
        let until = now - Duration::seconds(1);
        // The guard stops firing, but the stale counter means the very next
        // failure locks again.
        assert_eq!(
            evaluate(&policy(), 3, Some(until), now),
            AttemptState::Open { remaining: 0 }
        );

        let mut identity = test_identity("a@example.com");
        identity.wrong_pin_attempts = 3;
        identity.blocked_until_pin = Some(until);
        assert!(ensure_not_locked(&policy(), &identity, SecretKind::Pin, now).is_ok());
    }

    #[test]
    fn pin_and_password_counters_are_independent() {
        let now = Utc::now();
        let mut identity = test_identity("a@example.com");
        identity.wrong_password_attempts = 3;
        identity.blocked_until_password = Some(now + Duration::seconds(120));

        assert!(ensure_not_locked(&policy(), &identity, SecretKind::Password, now).is_err());
        assert!(ensure_not_locked(&policy(), &identity, SecretKind::Pin, now).is_ok());
    }

    #[test]
    fn failure_messages_report_remaining_or_unlock_time() {
        let message = failure_message(SecretKind::Password, AttemptState::Open { remaining: 2 });
        assert_eq!(
            message,
            "Incorrect email or password. 2 attempt(s) remaining before lockout"
        );

        let until = Utc::now() + Duration::seconds(60);
        let message = failure_message(SecretKind::Pin, AttemptState::Locked { until });
        assert!(message.starts_with("Too many wrong PIN attempts. Locked until "));
        assert_eq!(message, locked_message(SecretKind::Pin, until));
    }
}
