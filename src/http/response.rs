//! Response handling.
//!
//! # Responsibilities
//! - Turn the upstream hyper response into an axum response
//! - Map gateway failures onto their status codes
//!
//! # Design Decisions
//! - Upstream bodies are streamed, never buffered
//! - Status and headers pass through untouched; only route filters change them

use axum::{
    body::Body,
    http::Response as HttpResponse,
    response::{IntoResponse, Response},
};
use hyper::body::Incoming;

use crate::error::GatewayError;

/// Wrap an upstream response for the client.
pub fn from_upstream(response: HttpResponse<Incoming>) -> Response {
    let (parts, body) = response.into_parts();
    Response::from_parts(parts, Body::new(body))
}

/// Render a gateway failure.
pub fn from_error(error: GatewayError) -> Response {
    error.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn no_route_renders_404() {
        let response = from_error(GatewayError::NoRouteMatched);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"No matching route found");
    }
}
