use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::{errors::HttpError, state::HttpState};

pub const ADMIN_TOKEN_HEADER: &str = "x-metering-admin-token";

/// Decides whether a request may use the admin usage endpoints.
pub trait AdminGate: Send + Sync {
    fn is_admin(&self, headers: &HeaderMap) -> bool;
}

pub struct StaticTokenGate {
    token: String,
}

impl StaticTokenGate {
    pub fn new(token: String) -> Self {
        Self { token }
    }
}

impl AdminGate for StaticTokenGate {
    fn is_admin(&self, headers: &HeaderMap) -> bool {
        if self.token.is_empty() {
            return false;
        }
        headers
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| constant_time_eq(value.as_bytes(), self.token.as_bytes()))
    }
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    left.len() == right.len()
        && left
            .iter()
            .zip(right)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

pub async fn require_admin(
    State(state): State<HttpState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, HttpError> {
    if !state.admin_gate.is_admin(req.headers()) {
        return Err(HttpError::new(
            StatusCode::UNAUTHORIZED,
            "admin access required",
            Some("admin_required".to_string()),
        ));
    }
    Ok(next.run(req).await)
}
