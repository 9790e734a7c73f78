//! Request and response types for the auth API.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::engine::LoginOutcome;
use crate::auth::identity::IdentityProfile;
use crate::auth::otp::OtpPurpose;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct LoginResponse {
    pub token: String,
    pub refresh_token: String,
    pub identity: IdentityProfile,
}

impl From<LoginOutcome> for LoginResponse {
    fn from(outcome: LoginOutcome) -> Self {
        Self {
            token: outcome.grant.access_token,
            refresh_token: outcome.grant.refresh_token,
            identity: outcome.identity,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PinRequest {
    pub pin: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CheckIdentityRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CheckIdentityResponse {
    pub email_verified: bool,
    pub phone_verified: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SetPasswordRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SendOtpRequest {
    pub email: String,
    pub purpose: OtpPurpose,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub purpose: OtpPurpose,
    pub code: String,
    /// Purpose-specific payload: the phone number for `phone`, the new
    /// secret for `reset_password` / `reset_pin`.
    pub data: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct FederatedLoginRequest {
    pub token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RefreshResponse {
    pub token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct BiometricKeyRequest {
    pub public_key: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct BiometricVerifyRequest {
    pub signature: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct IdentityResponse {
    pub identity: IdentityProfile,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AckResponse {
    pub message: String,
}

impl AckResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
