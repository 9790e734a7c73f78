//! Engine configuration with builder-style overrides.

const DEFAULT_LOCKOUT_MAX_ATTEMPTS: i32 = 3;
// Observed deployments ranged from 3 to 30 minutes; 3 minutes is the default,
// the CLI exposes the knob.
const DEFAULT_LOCKOUT_PENALTY_SECONDS: i64 = 3 * 60;
const DEFAULT_OTP_TTL_SECONDS: i64 = 5 * 60;
const DEFAULT_OTP_SWEEP_INTERVAL_SECONDS: u64 = 60;
const DEFAULT_ACCESS_TOKEN_TTL_SECONDS: i64 = 30 * 60;
const DEFAULT_REFRESH_TOKEN_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;
const DEFAULT_TOKEN_LEEWAY_SECONDS: i64 = 30;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    lockout_max_attempts: i32,
    lockout_penalty_seconds: i64,
    otp_ttl_seconds: i64,
    otp_sweep_interval_seconds: u64,
    access_token_ttl_seconds: i64,
    refresh_token_ttl_seconds: i64,
    token_leeway_seconds: i64,
    require_verified_email: bool,
    google_audience: Option<String>,
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            lockout_max_attempts: DEFAULT_LOCKOUT_MAX_ATTEMPTS,
            lockout_penalty_seconds: DEFAULT_LOCKOUT_PENALTY_SECONDS,
            otp_ttl_seconds: DEFAULT_OTP_TTL_SECONDS,
            otp_sweep_interval_seconds: DEFAULT_OTP_SWEEP_INTERVAL_SECONDS,
            access_token_ttl_seconds: DEFAULT_ACCESS_TOKEN_TTL_SECONDS,
            refresh_token_ttl_seconds: DEFAULT_REFRESH_TOKEN_TTL_SECONDS,
            token_leeway_seconds: DEFAULT_TOKEN_LEEWAY_SECONDS,
            require_verified_email: true,
            google_audience: None,
        }
    }

    #[must_use]
    pub fn with_lockout_max_attempts(mut self, attempts: i32) -> Self {
        self.lockout_max_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_lockout_penalty_seconds(mut self, seconds: i64) -> Self {
        self.lockout_penalty_seconds = seconds.max(1);
        self
    }

    #[must_use]
    pub fn with_otp_ttl_seconds(mut self, seconds: i64) -> Self {
        self.otp_ttl_seconds = seconds.max(1);
        self
    }

    #[must_use]
    pub fn with_otp_sweep_interval_seconds(mut self, seconds: u64) -> Self {
        self.otp_sweep_interval_seconds = seconds.max(1);
        self
    }

    #[must_use]
    pub fn with_access_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_token_ttl_seconds = seconds.max(1);
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_token_ttl_seconds = seconds.max(1);
        self
    }

    #[must_use]
    pub fn with_token_leeway_seconds(mut self, seconds: i64) -> Self {
        self.token_leeway_seconds = seconds.max(0);
        self
    }

    #[must_use]
    pub fn with_require_verified_email(mut self, required: bool) -> Self {
        self.require_verified_email = required;
        self
    }

    #[must_use]
    pub fn with_google_audience(mut self, audience: Option<String>) -> Self {
        self.google_audience = audience;
        self
    }

    #[must_use]
    pub fn lockout_max_attempts(&self) -> i32 {
        self.lockout_max_attempts
    }

    #[must_use]
    pub fn lockout_penalty_seconds(&self) -> i64 {
        self.lockout_penalty_seconds
    }

    #[must_use]
    pub fn otp_ttl_seconds(&self) -> i64 {
        self.otp_ttl_seconds
    }

    #[must_use]
    pub fn otp_sweep_interval_seconds(&self) -> u64 {
        self.otp_sweep_interval_seconds
    }

    #[must_use]
    pub fn access_token_ttl_seconds(&self) -> i64 {
        self.access_token_ttl_seconds
    }

    #[must_use]
    pub fn refresh_token_ttl_seconds(&self) -> i64 {
        self.refresh_token_ttl_seconds
    }

    #[must_use]
    pub fn token_leeway_seconds(&self) -> i64 {
        self.token_leeway_seconds
    }

    #[must_use]
    pub fn require_verified_email(&self) -> bool {
        self.require_verified_email
    }

    #[must_use]
    pub fn google_audience(&self) -> Option<&str> {
        self.google_audience.as_deref()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::AuthConfig;

    #[test]
    fn defaults_and_overrides() {
        let config = AuthConfig::new();

        assert_eq!(config.lockout_max_attempts(), 3);
        assert_eq!(config.lockout_penalty_seconds(), 180);
        assert_eq!(config.otp_ttl_seconds(), 300);
        assert_eq!(config.access_token_ttl_seconds(), 1800);
        assert_eq!(config.refresh_token_ttl_seconds(), 2_592_000);
        assert_eq!(config.token_leeway_seconds(), 30);
        assert!(config.require_verified_email());
        assert_eq!(config.google_audience(), None);

        let config = config
            .with_lockout_max_attempts(5)
            .with_lockout_penalty_seconds(1800)
            .with_otp_ttl_seconds(120)
            .with_access_token_ttl_seconds(60)
            .with_refresh_token_ttl_seconds(3600)
            .with_token_leeway_seconds(0)
            .with_require_verified_email(false)
            .with_google_audience(Some("client-id.apps.example".to_string()));

        assert_eq!(config.lockout_max_attempts(), 5);
        assert_eq!(config.lockout_penalty_seconds(), 1800);
        assert_eq!(config.otp_ttl_seconds(), 120);
        assert_eq!(config.access_token_ttl_seconds(), 60);
        assert_eq!(config.refresh_token_ttl_seconds(), 3600);
        assert_eq!(config.token_leeway_seconds(), 0);
        assert!(!config.require_verified_email());
        assert_eq!(config.google_audience(), Some("client-id.apps.example"));
    }

    #[test]
    fn overrides_clamp_to_sane_minimums() {
        let config = AuthConfig::new()
            .with_lockout_max_attempts(0)
            .with_lockout_penalty_seconds(-5)
            .with_otp_ttl_seconds(0)
            .with_token_leeway_seconds(-1);

        assert_eq!(config.lockout_max_attempts(), 1);
        assert_eq!(config.lockout_penalty_seconds(), 1);
        assert_eq!(config.otp_ttl_seconds(), 1);
        assert_eq!(config.token_leeway_seconds(), 0);
    }
}
