//! Ed25519 challenge verification for registered device keys.
//!
//! One public key per identity, uploaded by the client device and stored
//! base64-encoded. The challenge payload is the identity's own id; a valid
//! signature over it proves possession of the device key. The payload is
//! static, not a fresh nonce, so a captured signature replays; callers that
//! need replay resistance must rotate the key (logout clears it).

use anyhow::anyhow;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use super::error::AuthError;
use super::identity::Identity;

pub const PUBLIC_KEY_LENGTH: usize = 32;
pub const SIGNATURE_LENGTH: usize = 64;

/// Decode a base64-encoded Ed25519 public key.
///
/// # Errors
///
/// Returns `InvalidArgument` for bad encoding, length, or key material.
pub fn decode_public_key(encoded: &str) -> Result<VerifyingKey, AuthError> {
    let trimmed = encoded.trim();
    if trimmed.is_empty() {
        return Err(AuthError::invalid_argument("Public key is required"));
    }
    let bytes = STANDARD
        .decode(trimmed)
        .map_err(|_| AuthError::invalid_argument("Invalid public key encoding"))?;
    let bytes: [u8; PUBLIC_KEY_LENGTH] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| AuthError::invalid_argument("Invalid public key length"))?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|_| AuthError::invalid_argument("Invalid public key"))
}

/// Validate an uploaded key before it is stored.
///
/// # Errors
///
/// Returns `InvalidArgument` when the key does not decode.
pub fn validate_public_key(encoded: &str) -> Result<(), AuthError> {
    decode_public_key(encoded).map(|_| ())
}

/// Verify a signature over the identity's challenge payload.
///
/// # Errors
///
/// - `PreconditionFailed` when no key is registered.
/// - `InvalidArgument` when the signature does not decode.
/// - `Unauthorized` when the signature does not verify.
pub fn verify_challenge(identity: &Identity, signature_b64: &str) -> Result<(), AuthError> {
    let Some(encoded_key) = identity.biometric_key.as_deref() else {
        return Err(AuthError::precondition_failed(
            "No biometric key registered",
        ));
    };
    // Registration validates keys, so a stored key that fails to decode is
    // corrupted state, not caller error.
    let key = decode_public_key(encoded_key)
        .map_err(|_| AuthError::Internal(anyhow!("stored biometric key failed to decode")))?;

    let trimmed = signature_b64.trim();
    if trimmed.is_empty() {
        return Err(AuthError::invalid_argument("Signature is required"));
    }
    let signature_bytes = STANDARD
        .decode(trimmed)
        .map_err(|_| AuthError::invalid_argument("Invalid signature encoding"))?;
    if signature_bytes.len() != SIGNATURE_LENGTH {
        return Err(AuthError::invalid_argument("Invalid signature length"));
    }
    let signature = Signature::from_slice(&signature_bytes)
        .map_err(|_| AuthError::invalid_argument("Invalid signature"))?;

    let challenge = identity.id.to_string();
    key.verify(challenge.as_bytes(), &signature)
        .map_err(|_| AuthError::unauthorized("Biometric verification failed"))
}

#[cfg(test)]
mod tests {
    use super::{decode_public_key, validate_public_key, verify_challenge};
    use crate::auth::error::AuthError;
    use crate::auth::identity::test_identity;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use ed25519_dalek::{Signer, SigningKey};

    fn registered_identity(signing_key: &SigningKey) -> crate::auth::identity::Identity {
        let mut identity = test_identity("device@example.com");
        identity.biometric_key = Some(STANDARD.encode(signing_key.verifying_key().to_bytes()));
        identity
    }

    #[test]
    fn valid_signature_over_identity_id_verifies() {
        let signing_key = SigningKey::from_bytes(&[7u8; 32]);
        let identity = registered_identity(&signing_key);

        let signature = signing_key.sign(identity.id.to_string().as_bytes());
        let encoded = STANDARD.encode(signature.to_bytes());

        assert!(verify_challenge(&identity, &encoded).is_ok());
    }

    #[test]
    fn missing_key_is_a_precondition_failure() {
        let identity = test_identity("device@example.com");
        let result = verify_challenge(&identity, "c2lnbmF0dXJl");
        assert!(matches!(result, Err(AuthError::PreconditionFailed(_))));
    }

    #[test]
    fn tampered_signature_is_unauthorized() {
        let signing_key = SigningKey::from_bytes(&[7u8; 32]);
        let identity = registered_identity(&signing_key);

        let mut bytes = signing_key
            .sign(identity.id.to_string().as_bytes())
            .to_bytes();
        bytes[0] ^= 0xff;
        let tampered = STANDARD.encode(bytes);

        let result = verify_challenge(&identity, &tampered);
        assert!(matches!(result, Err(AuthError::Unauthorized(_))));
    }

    #[test]
    fn signature_from_another_key_is_unauthorized() {
        let registered = SigningKey::from_bytes(&[7u8; 32]);
        let identity = registered_identity(&registered);

        let other = SigningKey::from_bytes(&[9u8; 32]);
        let signature = other.sign(identity.id.to_string().as_bytes());
        let encoded = STANDARD.encode(signature.to_bytes());

        let result = verify_challenge(&identity, &encoded);
        assert!(matches!(result, Err(AuthError::Unauthorized(_))));
    }

    #[test]
    fn signature_over_wrong_payload_is_unauthorized() {
        let signing_key = SigningKey::from_bytes(&[7u8; 32]);
        let identity = registered_identity(&signing_key);

        let signature = signing_key.sign(b"some-other-identity");
        let encoded = STANDARD.encode(signature.to_bytes());

        let result = verify_challenge(&identity, &encoded);
        assert!(matches!(result, Err(AuthError::Unauthorized(_))));
    }

    #[test]
    fn malformed_inputs_are_invalid_arguments() {
        let signing_key = SigningKey::from_bytes(&[7u8; 32]);
        let identity = registered_identity(&signing_key);

        assert!(matches!(
            verify_challenge(&identity, " "),
            Err(AuthError::InvalidArgument(_))
        ));
        assert!(matches!(
            verify_challenge(&identity, "not-base64!"),
            Err(AuthError::InvalidArgument(_))
        ));
        // Too short once decoded.
        assert!(matches!(
            verify_challenge(&identity, "c2hvcnQ"),
            Err(AuthError::InvalidArgument(_))
        ));
    }

    #[test]
    fn public_key_validation_rejects_bad_material() {
        assert!(matches!(
            validate_public_key(""),
            Err(AuthError::InvalidArgument(_))
        ));
        assert!(matches!(
            validate_public_key("@@@"),
            Err(AuthError::InvalidArgument(_))
        ));
        // 16 bytes is too short for an Ed25519 key.
        let short = STANDARD.encode([1u8; 16]);
        assert!(matches!(
            validate_public_key(&short),
            Err(AuthError::InvalidArgument(_))
        ));

        let signing_key = SigningKey::from_bytes(&[3u8; 32]);
        let encoded = STANDARD.encode(signing_key.verifying_key().to_bytes());
        assert!(decode_public_key(&encoded).is_ok());
    }
}
