//! JSON body extractor that rejects with an [`ApiError`].
//!
//! axum's own `Json` answers a body with a missing or mistyped field with
//! `422` and a plain-text serde message. Every malformed body here is a
//! `400` carrying the usual `{error, kind}` JSON instead.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use reca::auth::AuthError;

use super::error::ApiError;

/// Drop-in replacement for [`axum::Json`] in handler arguments
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(detail = %rejection.body_text(), "Rejected request body");

        let message = match rejection {
            JsonRejection::JsonDataError(_) => "Request body has missing or invalid fields",
            JsonRejection::JsonSyntaxError(_) => "Request body is not valid JSON",
            JsonRejection::MissingJsonContentType(_) => "Expected Content-Type: application/json",
            _ => "Invalid request body",
        };
        ApiError(AuthError::Validation(message.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Payload {
        #[allow(dead_code)]
        refresh_token: String,
    }

    async fn extract(content_type: Option<&str>, body: &str) -> Result<ApiJson<Payload>, ApiError> {
        let mut builder = Request::builder().method("POST").uri("/");
        if let Some(content_type) = content_type {
            builder = builder.header("content-type", content_type);
        }
        let request = builder.body(Body::from(body.to_string())).unwrap();
        ApiJson::<Payload>::from_request(request, &()).await
    }

    #[tokio::test]
    async fn test_valid_body() {
        assert!(extract(Some("application/json"), r#"{"refresh_token":"abc"}"#).await.is_ok());
    }

    #[tokio::test]
    async fn test_wrong_type_is_bad_request() {
        let err = extract(Some("application/json"), r#"{"refresh_token":42}"#)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.0.client_message(), "Request body has missing or invalid fields");
    }

    #[tokio::test]
    async fn test_missing_content_type_is_bad_request() {
        let err = extract(None, r#"{"refresh_token":"abc"}"#).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
