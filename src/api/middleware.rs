use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use tracing::warn;
use uuid::Uuid;

use super::routes::AppState;
use super::types::ApiError;

pub const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Rejects peers on the configured blacklist. Requests without peer info pass.
pub async fn reject_blacklisted(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(ConnectInfo(peer)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        if state.blacklist.contains(peer.ip()) {
            warn!("Rejected request from blacklisted address {}", peer.ip());
            return Err(ApiError::Forbidden(peer.ip()));
        }
    }
    Ok(next.run(request).await)
}

/// Echoes the client's `X-Request-ID` or assigns a fresh one.
pub async fn request_id(request: Request, next: Next) -> Response {
    let id = request
        .headers()
        .get(&REQUEST_ID)
        .cloned()
        .unwrap_or_else(|| {
            HeaderValue::from_str(&Uuid::new_v4().to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("unknown"))
        });

    let mut response = next.run(request).await;
    response.headers_mut().insert(REQUEST_ID, id);
    response
}
