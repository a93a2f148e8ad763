//! `POST /api/query`: `{ "field": ..., "args": {...} }` -> `{ "data": ... }`.

use axum::{
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::app::{errors, services::Services};
use crate::context::SessionContext;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub field: String,
    #[serde(default)]
    pub args: Value,
}

pub async fn query(
    Extension(services): Extension<Services>,
    Extension(ctx): Extension<SessionContext>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", rejection.body_text());
        }
    };

    match services
        .registry
        .resolve(&services.facades, ctx.session(), &req.field, req.args)
        .await
    {
        Ok(data) => Json(json!({ "data": data })).into_response(),
        Err(err) => errors::service_error_to_response(&err),
    }
}
