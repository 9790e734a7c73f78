//! # Credo (Credential & Identity Verification Service)
//!
//! `credo` is the identity-verification backend for a mobile financial
//! application. It authenticates users with a password or a 4-digit PIN,
//! issues access/refresh bearer tokens, verifies one-time codes for
//! email/phone verification and credential resets, validates Google
//! sign-in assertions, and checks biometric challenge signatures.
//!
//! ## Lockouts
//!
//! Wrong password and PIN attempts are counted per identity in PostgreSQL
//! with atomic conditional updates; the third wrong attempt starts a
//! configurable lockout window. Counters reset only on a successful
//! verification.
//!
//! ## One-time codes
//!
//! Codes are 6-digit, single-use, and short-lived. One active code exists
//! per (identity, purpose); a repeat request replaces it. Verification and
//! consumption happen in a single transaction, so a code can never be
//! redeemed twice even under concurrent submissions.
//!
//! ## Secrets
//!
//! Passwords, PINs, and one-time codes are stored only as salted Argon2id
//! digests and never logged. Tokens are stateless HMAC-signed JWTs; the
//! only revocation mechanism is the identity-existence recheck performed
//! on every authorization.

pub mod api;
pub mod auth;
pub mod cli;
pub mod notify;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
