use axum::{http::StatusCode, response::IntoResponse};

// Plain-text landing route; everything interesting lives under /v1.
pub async fn root() -> impl IntoResponse {
    (
        StatusCode::OK,
        concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION")),
    )
}
