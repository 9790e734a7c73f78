//! Federated identity assertion verification (Google ID tokens).
//!
//! The provider is an injected collaborator so the engine stays testable with
//! fakes; the production implementation asks Google's tokeninfo endpoint to
//! validate the assertion and hand back the verified claims.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Deserialize;

const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// Claims extracted from a verified third-party assertion.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct FederatedClaims {
    pub email: Option<String>,
    pub name: Option<String>,
    pub aud: Option<String>,
}

/// External identity provider collaborator.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Validate a bearer assertion and return its verified claims.
    async fn verify(&self, assertion: &str) -> Result<FederatedClaims>;
}

/// Verifies Google ID tokens through the public tokeninfo endpoint.
///
/// The endpoint checks the signature against Google's rotating keys; this
/// side only checks the audience when one is configured.
#[derive(Clone, Debug)]
pub struct GoogleTokenVerifier {
    client: reqwest::Client,
    endpoint: String,
    audience: Option<String>,
}

impl GoogleTokenVerifier {
    /// Build a verifier with the default Google endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(audience: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .context("failed to build identity provider client")?;
        Ok(Self {
            client,
            endpoint: GOOGLE_TOKENINFO_URL.to_string(),
            audience,
        })
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = endpoint;
        self
    }
}

#[async_trait]
impl IdentityProvider for GoogleTokenVerifier {
    async fn verify(&self, assertion: &str) -> Result<FederatedClaims> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("id_token", assertion)])
            .send()
            .await
            .context("failed to reach identity provider")?;

        if !response.status().is_success() {
            bail!(
                "identity provider rejected the assertion: {}",
                response.status()
            );
        }

        let claims: FederatedClaims = response
            .json()
            .await
            .context("invalid identity provider response")?;

        if let Some(expected) = &self.audience {
            if claims.aud.as_deref() != Some(expected.as_str()) {
                bail!("assertion audience mismatch");
            }
        }

        Ok(claims)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::{FederatedClaims, IdentityProvider};
    use anyhow::{Result, bail};
    use async_trait::async_trait;

    /// Returns fixed claims, or rejects everything when `claims` is `None`.
    #[derive(Debug, Default)]
    pub(crate) struct FakeProvider {
        pub(crate) claims: Option<FederatedClaims>,
    }

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        async fn verify(&self, _assertion: &str) -> Result<FederatedClaims> {
            match &self.claims {
                Some(claims) => Ok(claims.clone()),
                None => bail!("assertion rejected"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FederatedClaims, GoogleTokenVerifier};

    #[test]
    fn claims_parse_from_tokeninfo_payload() {
        let payload = r#"{
            "aud": "client-id.apps.example",
            "email": "alice@example.com",
            "email_verified": "true",
            "name": "Alice Example",
            "exp": "1700000000"
        }"#;
        let claims: FederatedClaims = serde_json::from_str(payload).expect("claims parse");
        assert_eq!(claims.email.as_deref(), Some("alice@example.com"));
        assert_eq!(claims.name.as_deref(), Some("Alice Example"));
        assert_eq!(claims.aud.as_deref(), Some("client-id.apps.example"));
    }

    #[test]
    fn claims_tolerate_missing_fields() {
        let claims: FederatedClaims = serde_json::from_str("{}").expect("empty claims parse");
        assert!(claims.email.is_none());
        assert!(claims.name.is_none());
    }

    #[test]
    fn verifier_endpoint_is_overridable() {
        let verifier = GoogleTokenVerifier::new(Some("aud".to_string()))
            .expect("client builds")
            .with_endpoint("http://localhost:9999/tokeninfo".to_string());
        assert_eq!(verifier.endpoint, "http://localhost:9999/tokeninfo");
    }
}
