use axum::{routing::post, Router};

pub mod query;
pub mod system;

/// Router for every endpoint that runs inside an access session.
pub fn router() -> Router {
    Router::new().route("/api/query", post(query::query))
}
