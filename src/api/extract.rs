use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;

use crate::errors::ApiError;

/// JSON body extractor whose rejections are API faults
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(rejection_to_fault(rejection, content_type)),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiJson<T> {
    fn into_response(self) -> Response {
        Json(self.0).into_response()
    }
}

fn rejection_to_fault(rejection: JsonRejection, content_type: String) -> ApiError {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => ApiError::UnsupportedMediaType(content_type),
        JsonRejection::JsonSyntaxError(err) => {
            ApiError::ParseError(format!("JSON parse error - {}", err.body_text()))
        }
        JsonRejection::JsonDataError(err) => {
            ApiError::validation(json!({ "non_field_errors": [err.body_text()] }))
        }
        _ => ApiError::parse_error(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Booking {
        room: u32,
    }

    async fn extract(content_type: Option<&str>, body: &str) -> Result<ApiJson<Booking>, ApiError> {
        let mut builder = Request::builder().method("POST").uri("/api/bookings");
        if let Some(content_type) = content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        let request = builder.body(Body::from(body.to_string())).unwrap();
        ApiJson::<Booking>::from_request(request, &()).await
    }

    #[tokio::test]
    async fn test_valid_body() {
        let ApiJson(booking) = extract(Some("application/json"), r#"{"room": 4}"#)
            .await
            .unwrap();
        assert_eq!(booking.room, 4);
    }

    #[tokio::test]
    async fn test_wrong_content_type() {
        let err = extract(Some("text/plain"), r#"{"room": 4}"#).await.unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedMediaType(ref t) if t == "text/plain"));
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let err = extract(Some("application/json"), r#"{"room": "#).await.unwrap_err();
        match err {
            ApiError::ParseError(message) => assert!(message.starts_with("JSON parse error - ")),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_wrong_shape_is_validation_fault() {
        let err = extract(Some("application/json"), r#"{"room": "four"}"#)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid");
        assert!(err.payload().unwrap()["non_field_errors"].is_array());
    }
}
