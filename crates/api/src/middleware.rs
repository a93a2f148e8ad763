use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};

use gatehouse_core::SessionToken;
use gatehouse_infra::SessionManager;

use crate::context::SessionContext;

/// Header carrying the opaque session token in both directions.
pub const SESSION_HEADER: &str = "x-session-token";

#[derive(Clone)]
pub struct SessionLayerState {
    pub sessions: Arc<SessionManager>,
}

/// Attach the caller's session (or a fresh anonymous one) and echo its token.
///
/// Unknown, malformed or purged tokens silently get a new session.
pub async fn session_middleware(
    State(state): State<SessionLayerState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let session = state.sessions.get_or_open(extract_token(req.headers()));
    let token = session.token();

    req.extensions_mut().insert(SessionContext::new(session));
    let mut res = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&token.to_string()) {
        res.headers_mut().insert(SESSION_HEADER, value);
    }
    res
}

fn extract_token(headers: &HeaderMap) -> Option<SessionToken> {
    let raw = headers.get(SESSION_HEADER)?.to_str().ok()?.trim();
    if raw.is_empty() {
        return None;
    }
    raw.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_header_parsing() {
        let token = SessionToken::generate();
        let mut headers = HeaderMap::new();
        assert_eq!(extract_token(&headers), None);

        headers.insert(SESSION_HEADER, HeaderValue::from_static("   "));
        assert_eq!(extract_token(&headers), None);

        headers.insert(SESSION_HEADER, HeaderValue::from_static("not-a-token"));
        assert_eq!(extract_token(&headers), None);

        headers.insert(SESSION_HEADER, HeaderValue::from_str(&format!(" {token} ")).unwrap());
        assert_eq!(extract_token(&headers), Some(token));
    }
}
