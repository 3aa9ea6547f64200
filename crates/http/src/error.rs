//! Request errors and their HTTP mapping.

use crate::wire::ErrorResponse;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, ALLOW, RETRY_AFTER};
use hyper::{Method, Response, StatusCode};
use ratings_service::ServiceError;

/// Methods served on `/rating/{entity}`.
pub const ALLOWED_METHODS: &str = "GET, PUT, DELETE";

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("no route for {0}")]
    NotFound(String),
    #[error("method {0} is not allowed")]
    MethodNotAllowed(Method),
    #[error("content type must be application/json")]
    UnsupportedMediaType,
    #[error("responses are only available as application/json")]
    NotAcceptable,
    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },
    #[error("malformed request body: {0}")]
    BadBody(String),
    #[error("failed to read request body: {0}")]
    Body(String),
    #[error("no rating stored for '{0}'")]
    NoSuchEntity(String),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl RequestError {
    pub fn status(&self) -> StatusCode {
        match self {
            RequestError::NotFound(_) | RequestError::NoSuchEntity(_) => StatusCode::NOT_FOUND,
            RequestError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            RequestError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            RequestError::NotAcceptable => StatusCode::NOT_ACCEPTABLE,
            RequestError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            RequestError::BadBody(_) | RequestError::Body(_) => StatusCode::BAD_REQUEST,
            RequestError::Service(e) => match e {
                ServiceError::Contention { .. } => StatusCode::SERVICE_UNAVAILABLE,
                ServiceError::TooManySiblings { .. } => StatusCode::CONFLICT,
                ServiceError::Storage(_)
                | ServiceError::Corrupt(_)
                | ServiceError::Invariant(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Render as a JSON error response, with `Allow` on 405 and
    /// `Retry-After` on retryable failures.
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let status = self.status();
        let mut response = crate::router::json_response(
            status,
            &ErrorResponse {
                error: self.to_string(),
            },
        );

        let headers = response.headers_mut();
        if status == StatusCode::METHOD_NOT_ALLOWED {
            headers.insert(ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
        }
        if let RequestError::Service(e) = &self {
            if e.is_retryable() {
                headers.insert(RETRY_AFTER, HeaderValue::from_static("1"));
            }
        }
        response
    }
}
