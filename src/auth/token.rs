//! Access and refresh token signing and verification.
//!
//! Tokens are compact JWTs (`header.claims.signature`, base64url without
//! padding) signed with HMAC-SHA256 over a process-wide secret. They are
//! stateless and self-verifying; revocation is the caller's concern (the
//! orchestrator re-resolves the identity after verification).

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

pub const TOKEN_VERSION: u8 = 1;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenHeader {
    pub alg: String,
    pub typ: String,
}

impl TokenHeader {
    fn hs256() -> Self {
        Self {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Access tokens authorize requests; refresh tokens only mint new access
/// tokens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    pub v: u8,
    pub sub: Uuid,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid signing key")]
    Key,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("invalid token version")]
    InvalidVersion,
    #[error("wrong token kind")]
    WrongKind,
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Create an HS256 signed token.
///
/// # Errors
///
/// Returns an error if the claims cannot be encoded or the key is unusable.
pub fn sign_hs256(secret: &[u8], claims: &TokenClaims) -> Result<String, Error> {
    let header_b64 = b64e_json(&TokenHeader::hs256())?;
    let claims_b64 = b64e_json(claims)?;
    let signing_input = format!("{header_b64}.{claims_b64}");

    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| Error::Key)?;
    mac.update(signing_input.as_bytes());
    let signature = mac.finalize().into_bytes();
    let signature_b64 = Base64UrlUnpadded::encode_string(&signature);

    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Verify an HS256 token and return its decoded claims.
///
/// `leeway_seconds` absorbs small clock skew between the issuing and
/// verifying sides.
///
/// # Errors
///
/// Returns an error if:
/// - the token is malformed or contains invalid base64/json,
/// - the signature does not match,
/// - the claims fail validation (`v`, `exp`).
pub fn verify_hs256(
    token: &str,
    secret: &[u8],
    now_unix_seconds: i64,
    leeway_seconds: i64,
) -> Result<TokenClaims, Error> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let claims_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let sig_b64 = parts.next().ok_or(Error::TokenFormat)?;
    if parts.next().is_some() {
        return Err(Error::TokenFormat);
    }

    let header: TokenHeader = b64d_json(header_b64)?;
    if header.alg != "HS256" {
        return Err(Error::UnsupportedAlg(header.alg));
    }

    let signing_input = format!("{header_b64}.{claims_b64}");
    let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| Error::Base64)?;
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| Error::Key)?;
    mac.update(signing_input.as_bytes());
    // Constant-time comparison lives in the MAC primitive.
    mac.verify_slice(&signature)
        .map_err(|_| Error::InvalidSignature)?;

    let claims: TokenClaims = b64d_json(claims_b64)?;
    if claims.v != TOKEN_VERSION {
        return Err(Error::InvalidVersion);
    }
    if claims.exp + leeway_seconds <= now_unix_seconds {
        return Err(Error::Expired);
    }

    Ok(claims)
}

/// Bearer token pair bound to one identity.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct AccessGrant {
    pub access_token: String,
    pub refresh_token: String,
}

/// Signs and validates tokens with the process-wide secret.
pub struct TokenIssuer {
    secret: SecretString,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
    leeway_seconds: i64,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(
        secret: SecretString,
        access_ttl_seconds: i64,
        refresh_ttl_seconds: i64,
        leeway_seconds: i64,
    ) -> Self {
        Self {
            secret,
            access_ttl_seconds,
            refresh_ttl_seconds,
            leeway_seconds,
        }
    }

    fn issue(&self, kind: TokenKind, identity_id: Uuid, now: i64) -> Result<String, Error> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl_seconds,
            TokenKind::Refresh => self.refresh_ttl_seconds,
        };
        let claims = TokenClaims {
            v: TOKEN_VERSION,
            sub: identity_id,
            kind,
            iat: now,
            exp: now + ttl,
        };
        sign_hs256(self.secret.expose_secret().as_bytes(), &claims)
    }

    /// Issue a short-lived access token.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn issue_access(&self, identity_id: Uuid) -> Result<String, Error> {
        self.issue(TokenKind::Access, identity_id, Utc::now().timestamp())
    }

    /// Issue a long-lived refresh token.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn issue_refresh(&self, identity_id: Uuid) -> Result<String, Error> {
        self.issue(TokenKind::Refresh, identity_id, Utc::now().timestamp())
    }

    /// Issue an access + refresh pair for one identity.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn grant(&self, identity_id: Uuid) -> Result<AccessGrant, Error> {
        Ok(AccessGrant {
            access_token: self.issue_access(identity_id)?,
            refresh_token: self.issue_refresh(identity_id)?,
        })
    }

    /// Verify a token of the expected kind and return its claims.
    ///
    /// # Errors
    ///
    /// Returns an error on any signature/claims failure, or `WrongKind` when
    /// e.g. a refresh token is presented where an access token is required.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<TokenClaims, Error> {
        let claims = verify_hs256(
            token,
            self.secret.expose_secret().as_bytes(),
            Utc::now().timestamp(),
            self.leeway_seconds,
        )?;
        if claims.kind != expected {
            return Err(Error::WrongKind);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Error, TOKEN_VERSION, TokenClaims, TokenIssuer, TokenKind, sign_hs256, verify_hs256,
    };
    use secrecy::SecretString;
    use uuid::Uuid;

    const SECRET: &[u8] = b"unit-test-signing-secret";
    const NOW: i64 = 1_700_000_000;

    fn test_claims(kind: TokenKind) -> TokenClaims {
        TokenClaims {
            v: TOKEN_VERSION,
            sub: Uuid::from_u128(42),
            kind,
            iat: NOW,
            exp: NOW + 120,
        }
    }

    #[test]
    fn sign_and_verify_round_trip() -> Result<(), Error> {
        let token = sign_hs256(SECRET, &test_claims(TokenKind::Access))?;
        let verified = verify_hs256(&token, SECRET, NOW, 0)?;
        assert_eq!(verified.sub, Uuid::from_u128(42));
        assert_eq!(verified.kind, TokenKind::Access);
        Ok(())
    }

    #[test]
    fn rejects_spliced_claims() -> Result<(), Error> {
        let token_a = sign_hs256(SECRET, &test_claims(TokenKind::Access))?;
        let mut other = test_claims(TokenKind::Access);
        other.sub = Uuid::from_u128(7);
        let token_b = sign_hs256(SECRET, &other)?;

        // Claims from one token with the signature of another must not verify.
        let parts_a: Vec<&str> = token_a.split('.').collect();
        let parts_b: Vec<&str> = token_b.split('.').collect();
        let spliced = format!("{}.{}.{}", parts_a[0], parts_b[1], parts_a[2]);
        let result = verify_hs256(&spliced, SECRET, NOW, 0);
        assert!(matches!(result, Err(Error::InvalidSignature)));
        Ok(())
    }

    #[test]
    fn rejects_wrong_secret() -> Result<(), Error> {
        let token = sign_hs256(SECRET, &test_claims(TokenKind::Access))?;
        let result = verify_hs256(&token, b"another-secret", NOW, 0);
        assert!(matches!(result, Err(Error::InvalidSignature)));
        Ok(())
    }

    #[test]
    fn rejects_expired_within_leeway_rules() -> Result<(), Error> {
        let token = sign_hs256(SECRET, &test_claims(TokenKind::Access))?;

        let result = verify_hs256(&token, SECRET, NOW + 121, 0);
        assert!(matches!(result, Err(Error::Expired)));

        // A small leeway absorbs clock skew on the verifying side.
        assert!(verify_hs256(&token, SECRET, NOW + 121, 30).is_ok());
        assert!(matches!(
            verify_hs256(&token, SECRET, NOW + 151, 30),
            Err(Error::Expired)
        ));
        Ok(())
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!(matches!(
            verify_hs256("not-a-token", SECRET, NOW, 0),
            Err(Error::TokenFormat)
        ));
        assert!(matches!(
            verify_hs256("a.b.c.d", SECRET, NOW, 0),
            Err(Error::TokenFormat)
        ));
        assert!(matches!(
            verify_hs256("!!.!!.!!", SECRET, NOW, 0),
            Err(Error::Base64)
        ));
    }

    #[test]
    fn rejects_wrong_version() -> Result<(), Error> {
        let mut claims = test_claims(TokenKind::Access);
        claims.v = 2;
        let token = sign_hs256(SECRET, &claims)?;
        let result = verify_hs256(&token, SECRET, NOW, 0);
        assert!(matches!(result, Err(Error::InvalidVersion)));
        Ok(())
    }

    #[test]
    fn issuer_grants_verify_to_the_same_identity() -> Result<(), Error> {
        let issuer = TokenIssuer::new(SecretString::from("grant-secret"), 60, 3600, 0);
        let identity_id = Uuid::from_u128(99);
        let grant = issuer.grant(identity_id)?;

        let access = issuer.verify(&grant.access_token, TokenKind::Access)?;
        assert_eq!(access.sub, identity_id);

        let refresh = issuer.verify(&grant.refresh_token, TokenKind::Refresh)?;
        assert_eq!(refresh.sub, identity_id);
        Ok(())
    }

    #[test]
    fn issuer_refuses_kind_confusion() -> Result<(), Error> {
        let issuer = TokenIssuer::new(SecretString::from("grant-secret"), 60, 3600, 0);
        let grant = issuer.grant(Uuid::from_u128(99))?;

        // A refresh token must not pass as an access token, nor the reverse.
        assert!(matches!(
            issuer.verify(&grant.refresh_token, TokenKind::Access),
            Err(Error::WrongKind)
        ));
        assert!(matches!(
            issuer.verify(&grant.access_token, TokenKind::Refresh),
            Err(Error::WrongKind)
        ));
        Ok(())
    }
}
