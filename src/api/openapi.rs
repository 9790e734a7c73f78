//! OpenAPI document assembly for the HTTP surface.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::api::handlers;
use crate::api::handlers::health::Health;
use crate::api::handlers::types::{
    AckResponse, BiometricKeyRequest, BiometricVerifyRequest, CheckIdentityRequest,
    CheckIdentityResponse, FederatedLoginRequest, IdentityResponse, LoginRequest, LoginResponse,
    PinRequest, RefreshRequest, RefreshResponse, SendOtpRequest, SetPasswordRequest,
    VerifyOtpRequest,
};
use crate::auth::identity::IdentityProfile;
use crate::auth::otp::OtpPurpose;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::login::login,
        handlers::login::verify_pin,
        handlers::login::refresh,
        handlers::login::logout,
        handlers::identity::check_identity,
        handlers::identity::set_password,
        handlers::identity::set_pin,
        handlers::otp::send_otp,
        handlers::otp::verify_otp,
        handlers::federated::google_login,
        handlers::biometric::register_key,
        handlers::biometric::verify_challenge,
    ),
    components(schemas(
        Health,
        LoginRequest,
        LoginResponse,
        PinRequest,
        CheckIdentityRequest,
        CheckIdentityResponse,
        SetPasswordRequest,
        SendOtpRequest,
        VerifyOtpRequest,
        FederatedLoginRequest,
        RefreshRequest,
        RefreshResponse,
        BiometricKeyRequest,
        BiometricVerifyRequest,
        IdentityResponse,
        AckResponse,
        IdentityProfile,
        OtpPurpose,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Login, credentials, and tokens"),
        (name = "otp", description = "One-time codes"),
        (name = "biometric", description = "Device keys and challenge signatures"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI document.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
