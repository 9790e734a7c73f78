//! One-time code lifecycle: generation, storage, single-use consumption.
//!
//! One active code per (identity, purpose); a new request replaces the stored
//! hash and resets the clock. Codes expire after a configurable TTL, checked
//! at verify time regardless of the background sweeper. Consumption locks the
//! row (`FOR UPDATE`) and deletes it in the same transaction, so a concurrent
//! duplicate submission observes `NotFound` instead of a second success.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rand::{Rng, rngs::OsRng};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tokio::time::sleep;
use tracing::{Instrument, debug, error};
use utoipa::ToSchema;
use uuid::Uuid;

use super::config::AuthConfig;
use super::error::AuthError;
use super::hasher::SecretHasher;
use super::identity::{Identity, is_unique_violation};
use crate::notify::CodeSender;

pub const CODE_LENGTH: usize = 6;
pub const PIN_LENGTH: usize = 4;

/// What a one-time code proves or authorizes. Closed set: adding a purpose
/// means adding a variant and its side-effect arm.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    Email,
    Phone,
    ResetPassword,
    ResetPin,
}

impl OtpPurpose {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
            Self::ResetPassword => "reset_password",
            Self::ResetPin => "reset_pin",
        }
    }
}

/// Generate a numeric code of [`CODE_LENGTH`] digits.
#[must_use]
pub fn generate_code() -> String {
    let value = OsRng.gen_range(0..1_000_000u32);
    format!("{value:06}")
}

/// Generate, dispatch, and store a code for (identity, purpose).
///
/// Dispatch happens before the hash is committed: if the provider fails, the
/// caller gets `Internal` and no code record is written.
///
/// # Errors
///
/// - `Conflict` for a `phone` code when a verified phone number exists.
/// - `Internal` on dispatch or store failure.
pub async fn request_code(
    pool: &PgPool,
    hasher: &SecretHasher,
    sender: &dyn CodeSender,
    identity: &Identity,
    purpose: OtpPurpose,
) -> Result<(), AuthError> {
    if purpose == OtpPurpose::Phone && identity.phone_verified {
        return Err(AuthError::conflict("Phone number already verified"));
    }

    let code = generate_code();
    sender
        .send(&identity.email, &code, purpose)
        .await
        .context("failed to dispatch one-time code")?;

    let digest = hasher.hash(&code)?;
    upsert_code(pool, identity.id, purpose, &digest).await?;
    Ok(())
}

async fn upsert_code(
    pool: &PgPool,
    identity_id: Uuid,
    purpose: OtpPurpose,
    digest: &str,
) -> Result<(), AuthError> {
    let query = r"
        INSERT INTO one_time_codes (identity_id, purpose, code_hash, created_at)
        VALUES ($1, $2, $3, NOW())
        ON CONFLICT ON CONSTRAINT one_time_codes_identity_purpose_key
        DO UPDATE SET code_hash = EXCLUDED.code_hash, created_at = NOW()
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(identity_id)
        .bind(purpose.as_str())
        .bind(digest)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to store one-time code")?;
    Ok(())
}

/// Per-purpose side effect, prepared before the code is touched so a bad
/// auxiliary payload never consumes a valid code.
#[derive(Debug)]
enum SideEffect {
    MarkEmailVerified,
    SetPhone { number: String },
    SetPin { digest: String },
    SetPassword { digest: String },
}

impl SideEffect {
    fn prepare(
        purpose: OtpPurpose,
        auxiliary: Option<&str>,
        hasher: &SecretHasher,
    ) -> Result<Self, AuthError> {
        match purpose {
            OtpPurpose::Email => Ok(Self::MarkEmailVerified),
            OtpPurpose::Phone => {
                let number = auxiliary
                    .map(str::trim)
                    .filter(|number| !number.is_empty())
                    .ok_or_else(|| AuthError::invalid_argument("Phone number is required"))?;
                Ok(Self::SetPhone {
                    number: number.to_string(),
                })
            }
            OtpPurpose::ResetPin => {
                let pin = auxiliary
                    .map(str::trim)
                    .ok_or_else(|| AuthError::invalid_argument("PIN is required"))?;
                if pin.chars().count() != PIN_LENGTH {
                    return Err(AuthError::invalid_argument("PIN must be 4 digits"));
                }
                Ok(Self::SetPin {
                    digest: hasher.hash(pin)?,
                })
            }
            OtpPurpose::ResetPassword => {
                let password = auxiliary
                    .map(str::trim)
                    .filter(|password| !password.is_empty())
                    .ok_or_else(|| AuthError::invalid_argument("Password is required"))?;
                Ok(Self::SetPassword {
                    digest: hasher.hash(password)?,
                })
            }
        }
    }

    async fn apply(
        self,
        tx: &mut Transaction<'_, Postgres>,
        identity_id: Uuid,
    ) -> Result<(), AuthError> {
        match self {
            Self::MarkEmailVerified => {
                let query =
                    "UPDATE identities SET email_verified = TRUE, updated_at = NOW() WHERE id = $1";
                let span = tracing::info_span!(
                    "db.query",
                    db.system = "postgresql",
                    db.operation = "UPDATE",
                    db.statement = query
                );
                sqlx::query(query)
                    .bind(identity_id)
                    .execute(&mut **tx)
                    .instrument(span)
                    .await
                    .context("failed to mark email verified")?;
            }
            Self::SetPhone { number } => {
                let query = r"
                    UPDATE identities
                    SET phone_number = $2, phone_verified = TRUE, updated_at = NOW()
                    WHERE id = $1
                ";
                let span = tracing::info_span!(
                    "db.query",
                    db.system = "postgresql",
                    db.operation = "UPDATE",
                    db.statement = query
                );
                let result = sqlx::query(query)
                    .bind(identity_id)
                    .bind(&number)
                    .execute(&mut **tx)
                    .instrument(span)
                    .await;
                if let Err(err) = result {
                    if is_unique_violation(&err) {
                        return Err(AuthError::conflict("Phone number already in use"));
                    }
                    return Err(AuthError::Internal(
                        anyhow::Error::new(err).context("failed to set phone number"),
                    ));
                }
            }
            Self::SetPin { digest } => {
                // A reset also clears the PIN lockout state; the reset was
                // itself authorized by a verified code.
                let query = r"
                    UPDATE identities
                    SET pin_hash = $2,
                        wrong_pin_attempts = 0,
                        blocked_until_pin = NULL,
                        updated_at = NOW()
                    WHERE id = $1
                ";
                let span = tracing::info_span!(
                    "db.query",
                    db.system = "postgresql",
                    db.operation = "UPDATE",
                    db.statement = query
                );
                sqlx::query(query)
                    .bind(identity_id)
                    .bind(&digest)
                    .execute(&mut **tx)
                    .instrument(span)
                    .await
                    .context("failed to set pin")?;
            }
            Self::SetPassword { digest } => {
                let query = r"
                    UPDATE identities
                    SET password_hash = $2,
                        wrong_password_attempts = 0,
                        blocked_until_password = NULL,
                        updated_at = NOW()
                    WHERE id = $1
                ";
                let span = tracing::info_span!(
                    "db.query",
                    db.system = "postgresql",
                    db.operation = "UPDATE",
                    db.statement = query
                );
                sqlx::query(query)
                    .bind(identity_id)
                    .bind(&digest)
                    .execute(&mut **tx)
                    .instrument(span)
                    .await
                    .context("failed to set password")?;
            }
        }
        Ok(())
    }
}

/// Verify and consume a code, applying its purpose-specific side effect.
///
/// Exactly-once: the code row is locked and deleted in the same transaction
/// as the side effect, so two concurrent submissions cannot both succeed;
/// the loser sees `NotFound`.
///
/// # Errors
///
/// - `NotFound` when no active code exists for (identity, purpose).
/// - `Expired` past the TTL (the stale row is removed on the way out).
/// - `InvalidArgument` for a bad auxiliary payload (code not consumed).
/// - `Unauthorized` when the hash comparison fails (code not consumed).
pub async fn verify_code(
    pool: &PgPool,
    hasher: &SecretHasher,
    identity: &Identity,
    purpose: OtpPurpose,
    submitted: &str,
    auxiliary: Option<&str>,
    config: &AuthConfig,
) -> Result<(), AuthError> {
    let submitted = submitted.trim();
    if submitted.is_empty() {
        return Err(AuthError::invalid_argument("Code is required"));
    }
    let side_effect = SideEffect::prepare(purpose, auxiliary, hasher)?;

    let mut tx = pool
        .begin()
        .await
        .context("failed to start code verification transaction")?;

    let query = r"
        SELECT code_hash, created_at
        FROM one_time_codes
        WHERE identity_id = $1 AND purpose = $2
        FOR UPDATE
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(identity.id)
        .bind(purpose.as_str())
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to load one-time code")?;

    let Some(row) = row else {
        let _ = tx.rollback().await;
        return Err(AuthError::NotFound);
    };

    let code_hash: String = row.get("code_hash");
    let created_at: DateTime<Utc> = row.get("created_at");

    if created_at + Duration::seconds(config.otp_ttl_seconds()) <= Utc::now() {
        // Expired rows are reaped here as well as by the sweeper; the active
        // check is what correctness rests on.
        delete_code(&mut tx, identity.id, purpose).await?;
        tx.commit()
            .await
            .context("failed to commit expired code removal")?;
        return Err(AuthError::Expired);
    }

    if !hasher.verify(submitted, &code_hash) {
        let _ = tx.rollback().await;
        return Err(AuthError::unauthorized("Invalid code"));
    }

    delete_code(&mut tx, identity.id, purpose).await?;
    side_effect.apply(&mut tx, identity.id).await?;

    tx.commit()
        .await
        .context("failed to commit code verification")?;
    Ok(())
}

async fn delete_code(
    tx: &mut Transaction<'_, Postgres>,
    identity_id: Uuid,
    purpose: OtpPurpose,
) -> Result<(), AuthError> {
    let query = "DELETE FROM one_time_codes WHERE identity_id = $1 AND purpose = $2";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(identity_id)
        .bind(purpose.as_str())
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to delete one-time code")?;
    Ok(())
}

/// Spawn a background task that reaps expired codes on a fixed cadence.
///
/// The sweeper is hygiene only; verification never relies on it.
pub fn spawn_expiry_sweeper(pool: PgPool, config: &AuthConfig) -> tokio::task::JoinHandle<()> {
    let interval = std::time::Duration::from_secs(config.otp_sweep_interval_seconds());
    let ttl_seconds = config.otp_ttl_seconds();
    tokio::spawn(async move {
        loop {
            if let Err(err) = sweep_expired(&pool, ttl_seconds).await {
                error!("one-time code sweep failed: {err}");
            }
            sleep(interval).await;
        }
    })
}

async fn sweep_expired(pool: &PgPool, ttl_seconds: i64) -> Result<u64> {
    let query = r"
        DELETE FROM one_time_codes
        WHERE created_at < NOW() - ($1 * INTERVAL '1 second')
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(ttl_seconds)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to sweep expired one-time codes")?;

    let swept = result.rows_affected();
    if swept > 0 {
        debug!("swept {swept} expired one-time codes");
    }
    Ok(swept)
}
