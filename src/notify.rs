//! Outbound delivery of one-time codes.
//!
//! The engine dispatches a code through a [`CodeSender`] before committing
//! its hash; delivery failure must propagate so callers never report "code
//! sent" when nothing went out. The sender decides the channel (SMTP, SMS
//! gateway, push); the default implementation just logs for local dev.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::auth::otp::OtpPurpose;

/// Delivery abstraction for one-time codes.
#[async_trait]
pub trait CodeSender: Send + Sync {
    /// Deliver a code to an address or return an error.
    async fn send(&self, address: &str, code: &str, purpose: OtpPurpose) -> Result<()>;
}

/// Local dev sender that logs instead of sending anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogCodeSender;

#[async_trait]
impl CodeSender for LogCodeSender {
    async fn send(&self, address: &str, code: &str, purpose: OtpPurpose) -> Result<()> {
        info!(
            address = %address,
            purpose = %purpose.as_str(),
            "one-time code dispatch stub"
        );
        // The code itself stays out of info-level logs.
        debug!(code = %code, "one-time code value");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::{CodeSender, OtpPurpose};
    use anyhow::{Result, bail};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Captures dispatched codes, optionally failing every send.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingSender {
        pub(crate) sent: Mutex<Vec<(String, String, OtpPurpose)>>,
        pub(crate) fail: bool,
    }

    #[async_trait]
    impl CodeSender for RecordingSender {
        async fn send(&self, address: &str, code: &str, purpose: OtpPurpose) -> Result<()> {
            if self.fail {
                bail!("dispatch provider unavailable");
            }
            self.sent
                .lock()
                .expect("sender mutex poisoned")
                .push((address.to_string(), code.to_string(), purpose));
            Ok(())
        }
    }
}
