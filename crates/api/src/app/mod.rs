//! HTTP application wiring.
//!
//! - `services.rs`: controller, providers, sessions and facades
//! - `routes/`: handlers
//! - `errors.rs`: error kind to status/code mapping

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::middleware;

pub mod errors;
pub mod routes;
pub mod services;

use services::Services;

/// Build the full HTTP router over wired services (used by `main.rs`).
pub fn router(services: Services) -> Router {
    let session_state = middleware::SessionLayerState {
        sessions: services.sessions.clone(),
    };

    let in_session = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            session_state,
            middleware::session_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(in_session)
        .layer(ServiceBuilder::new())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::middleware::SESSION_HEADER;
    use crate::testing;

    fn query(token: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/query")
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header(SESSION_HEADER, token);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn health_needs_no_session() {
        let app = router(testing::services().await);
        let res = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().get(SESSION_HEADER).is_none());
    }

    #[tokio::test]
    async fn session_token_is_issued_and_kept() {
        let services = testing::services().await;
        let app = router(services.clone());

        let res = app
            .clone()
            .oneshot(query(None, r#"{"field":"sessionUser"}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let token = res.headers()[SESSION_HEADER].to_str().unwrap().to_string();
        assert_eq!(services.sessions.len(), 1);

        let res = app
            .oneshot(query(Some(&token), r#"{"field":"authProviders"}"#))
            .await
            .unwrap();
        assert_eq!(res.headers()[SESSION_HEADER].to_str().unwrap(), token);
        assert_eq!(services.sessions.len(), 1);
    }

    #[tokio::test]
    async fn errors_map_to_status() {
        let app = router(testing::services().await);

        let res = app
            .clone()
            .oneshot(query(None, r#"{"field":"listUsers"}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let res = app.clone().oneshot(query(None, r#"{"field":"nope"}"#)).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = app.oneshot(query(None, "{not json")).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn tokenless_traffic_does_not_pile_up_sessions() {
        let config = gatehouse_infra::GatehouseConfig {
            session_ttl_secs: 0,
            ..Default::default()
        };
        let local = std::sync::Arc::new(gatehouse_infra::LocalPasswordVerifier::with_cost(8, 1, 1).unwrap());
        let services = services::build_services_with(&config, local).await.unwrap();
        let app = router(services.clone());

        for _ in 0..50 {
            let res = app
                .clone()
                .oneshot(query(None, r#"{"field":"authProviders"}"#))
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }
        assert_eq!(services.sessions.len(), 50);

        assert_eq!(services.sessions.purge_expired().await, 50);
        assert!(services.sessions.is_empty());
    }
}
