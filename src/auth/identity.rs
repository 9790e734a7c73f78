//! Identity records and their storage helpers.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::Instrument;
use utoipa::ToSchema;
use uuid::Uuid;

/// Full identity row, secret digests and counters included.
///
/// This type never crosses the API boundary; responses carry
/// [`IdentityProfile`] instead.
#[derive(Clone, Debug)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub phone_number: Option<String>,
    pub password_hash: Option<String>,
    pub pin_hash: Option<String>,
    pub biometric_key: Option<String>,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub wrong_password_attempts: i32,
    pub wrong_pin_attempts: i32,
    pub blocked_until_password: Option<DateTime<Utc>>,
    pub blocked_until_pin: Option<DateTime<Utc>>,
    pub name: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

/// Sanitized identity view returned to clients: no digests, no counters,
/// no lockout timestamps.
#[derive(ToSchema, Serialize, Deserialize, Clone, Debug)]
pub struct IdentityProfile {
    pub id: Uuid,
    pub email: String,
    pub phone_number: Option<String>,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub name: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub has_password: bool,
    pub has_pin: bool,
    pub has_biometric_key: bool,
}

impl From<&Identity> for IdentityProfile {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id,
            email: identity.email.clone(),
            phone_number: identity.phone_number.clone(),
            email_verified: identity.email_verified,
            phone_verified: identity.phone_verified,
            name: identity.name.clone(),
            gender: identity.gender.clone(),
            date_of_birth: identity.date_of_birth,
            has_password: identity.password_hash.is_some(),
            has_pin: identity.pin_hash.is_some(),
            has_biometric_key: identity.biometric_key.is_some(),
        }
    }
}

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    regex::Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")
        .is_ok_and(|regex| regex.is_match(email_normalized))
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn identity_from_row(row: &PgRow) -> Identity {
    Identity {
        id: row.get("id"),
        email: row.get("email"),
        phone_number: row.get("phone_number"),
        password_hash: row.get("password_hash"),
        pin_hash: row.get("pin_hash"),
        biometric_key: row.get("biometric_key"),
        email_verified: row.get("email_verified"),
        phone_verified: row.get("phone_verified"),
        wrong_password_attempts: row.get("wrong_password_attempts"),
        wrong_pin_attempts: row.get("wrong_pin_attempts"),
        blocked_until_password: row.get("blocked_until_password"),
        blocked_until_pin: row.get("blocked_until_pin"),
        name: row.get("name"),
        gender: row.get("gender"),
        date_of_birth: row.get("date_of_birth"),
    }
}

/// Look up an identity by normalized email.
pub async fn lookup_by_email(pool: &PgPool, email: &str) -> Result<Option<Identity>> {
    let query = r"
        SELECT id, email, phone_number, password_hash, pin_hash, biometric_key,
               email_verified, phone_verified,
               wrong_password_attempts, wrong_pin_attempts,
               blocked_until_password, blocked_until_pin,
               name, gender, date_of_birth
        FROM identities
        WHERE email = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup identity by email")?;

    Ok(row.map(|row| identity_from_row(&row)))
}

/// Look up an identity by id.
pub async fn lookup_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Identity>> {
    let query = r"
        SELECT id, email, phone_number, password_hash, pin_hash, biometric_key,
               email_verified, phone_verified,
               wrong_password_attempts, wrong_pin_attempts,
               blocked_until_password, blocked_until_pin,
               name, gender, date_of_birth
        FROM identities
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup identity by id")?;

    Ok(row.map(|row| identity_from_row(&row)))
}

/// Load the identity for a normalized email, creating a blank record on
/// first contact. The upsert keeps concurrent first contacts idempotent.
pub async fn find_or_create(pool: &PgPool, email: &str) -> Result<Identity> {
    let query = r"
        INSERT INTO identities (email)
        VALUES ($1)
        ON CONFLICT (email) DO UPDATE SET updated_at = NOW()
        RETURNING id, email, phone_number, password_hash, pin_hash, biometric_key,
                  email_verified, phone_verified,
                  wrong_password_attempts, wrong_pin_attempts,
                  blocked_until_password, blocked_until_pin,
                  name, gender, date_of_birth
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to find or create identity")?;

    Ok(identity_from_row(&row))
}

/// Find-or-create for a federated assertion: the provider already attests
/// ownership of the email, so the record is marked verified unconditionally.
pub async fn upsert_federated(pool: &PgPool, email: &str, name: &str) -> Result<Identity> {
    let query = r"
        INSERT INTO identities (email, name, email_verified)
        VALUES ($1, $2, TRUE)
        ON CONFLICT (email) DO UPDATE
            SET name = EXCLUDED.name,
                email_verified = TRUE,
                updated_at = NOW()
        RETURNING id, email, phone_number, password_hash, pin_hash, biometric_key,
                  email_verified, phone_verified,
                  wrong_password_attempts, wrong_pin_attempts,
                  blocked_until_password, blocked_until_pin,
                  name, gender, date_of_birth
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(name)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to upsert federated identity")?;

    Ok(identity_from_row(&row))
}

/// Store a new password digest.
pub async fn set_password_hash(pool: &PgPool, id: Uuid, digest: &str) -> Result<()> {
    let query =
        "UPDATE identities SET password_hash = $2, updated_at = NOW() WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(id)
        .bind(digest)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to set password hash")?;
    Ok(())
}

/// Store a new PIN digest.
pub async fn set_pin_hash(pool: &PgPool, id: Uuid, digest: &str) -> Result<()> {
    let query = "UPDATE identities SET pin_hash = $2, updated_at = NOW() WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(id)
        .bind(digest)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to set pin hash")?;
    Ok(())
}

/// Replace or clear the registered biometric public key.
pub async fn set_biometric_key(pool: &PgPool, id: Uuid, key: Option<&str>) -> Result<()> {
    let query = "UPDATE identities SET biometric_key = $2, updated_at = NOW() WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(id)
        .bind(key)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update biometric key")?;
    Ok(())
}

/// Blank in-memory identity for unit tests across the engine.
#[cfg(test)]
pub(crate) fn test_identity(email: &str) -> Identity {
    Identity {
        id: Uuid::new_v4(),
        email: email.to_string(),
        phone_number: None,
        password_hash: None,
        pin_hash: None,
        biometric_key: None,
        email_verified: false,
        phone_verified: false,
        wrong_password_attempts: 0,
        wrong_pin_attempts: 0,
        blocked_until_password: None,
        blocked_until_pin: None,
        name: None,
        gender: None,
        date_of_birth: None,
    }
}
