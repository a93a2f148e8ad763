use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use gatehouse_core::ErrorKind;

use crate::error::ServiceError;

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::InvalidCredentials => StatusCode::UNAUTHORIZED,
        ErrorKind::UnknownProvider => StatusCode::BAD_REQUEST,
        ErrorKind::Unsupported => StatusCode::NOT_IMPLEMENTED,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Map a facade failure to `{error, message}`. Internal causes are logged, not returned.
pub fn service_error_to_response(err: &ServiceError) -> axum::response::Response {
    let kind = err.kind();
    if kind == ErrorKind::Internal {
        tracing::error!(operation = err.operation, error = %err.source, "internal failure");
    }
    json_error(status_for(kind), kind.code(), err.public_message())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use gatehouse_core::IamError;

    use super::*;

    #[test]
    fn every_kind_has_a_distinct_code() {
        let kinds = [
            ErrorKind::Validation,
            ErrorKind::Conflict,
            ErrorKind::NotFound,
            ErrorKind::Forbidden,
            ErrorKind::InvalidCredentials,
            ErrorKind::UnknownProvider,
            ErrorKind::Unsupported,
            ErrorKind::Timeout,
            ErrorKind::Internal,
        ];
        let codes: std::collections::BTreeSet<&str> = kinds.iter().map(|k| k.code()).collect();
        assert_eq!(codes.len(), kinds.len());
        assert_eq!(status_for(ErrorKind::Unsupported), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(status_for(ErrorKind::InvalidCredentials), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn response_status_follows_kind() {
        let err = ServiceError::new("deleteRole", IamError::unsupported("deleteRole"));
        assert_eq!(service_error_to_response(&err).status(), StatusCode::NOT_IMPLEMENTED);

        let err = ServiceError::new("listUsers", IamError::internal("disk on fire"));
        assert_eq!(service_error_to_response(&err).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
