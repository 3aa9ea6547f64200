//! Request routing: maps `/rating/{entity}` requests onto the service.

use crate::error::RequestError;
use crate::negotiate;
use crate::wire::{PutRatingRequest, RatingResponse, RatingStateResponse};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};
use ratings_service::RatingService;
use ratings_storage::RatingStore;
use serde::Serialize;

/// Path prefix of the rating resource.
pub const ROUTE_PREFIX: &str = "/rating/";

/// Largest PUT body accepted.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Serve one request. Never fails: every error becomes a JSON response.
pub async fn handle<S, B>(service: &RatingService<S>, req: Request<B>) -> Response<Full<Bytes>>
where
    S: RatingStore,
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = match route(service, req).await {
        Ok(response) => response,
        Err(e) => {
            if e.status().is_server_error() {
                tracing::warn!(method = %method, path = %path, "request failed: {}", e);
            }
            e.into_response()
        }
    };

    tracing::debug!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        "request served"
    );
    ratings_metrics::record_http_request(method.as_str(), response.status().as_u16());
    response
}

async fn route<S, B>(
    service: &RatingService<S>,
    req: Request<B>,
) -> Result<Response<Full<Bytes>>, RequestError>
where
    S: RatingStore,
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let entity = entity_of(req.uri().path())
        .ok_or_else(|| RequestError::NotFound(req.uri().path().to_string()))?
        .to_string();

    let method = req.method().clone();
    if !matches!(method, Method::GET | Method::PUT | Method::DELETE) {
        return Err(RequestError::MethodNotAllowed(method));
    }
    if !negotiate::accepts_json(req.headers()) {
        return Err(RequestError::NotAcceptable);
    }

    match method {
        Method::PUT => {
            if !negotiate::has_json_body(req.headers()) {
                return Err(RequestError::UnsupportedMediaType);
            }
            let body = read_body(req.into_body()).await?;
            let put = PutRatingRequest::from_slice(&body)?;
            let rating = service.put(&entity, put.rating, put.clocks).await?;
            Ok(json_response(
                StatusCode::OK,
                &RatingResponse {
                    rating: Some(rating),
                },
            ))
        }
        Method::GET => {
            let state = match service.get(&entity).await? {
                Some(view) => RatingStateResponse::from(view),
                None => RatingStateResponse::absent(),
            };
            Ok(json_response(StatusCode::OK, &state))
        }
        Method::DELETE => {
            if service.delete(&entity).await? {
                Ok(json_response(StatusCode::OK, &RatingResponse { rating: None }))
            } else {
                Err(RequestError::NoSuchEntity(entity))
            }
        }
        _ => Err(RequestError::MethodNotAllowed(method)),
    }
}

/// Entity named by a `/rating/{entity}` path: non-empty, one segment.
fn entity_of(path: &str) -> Option<&str> {
    path.strip_prefix(ROUTE_PREFIX)
        .filter(|entity| !entity.is_empty() && !entity.contains('/'))
}

async fn read_body<B>(body: B) -> Result<Bytes, RequestError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, MAX_BODY_BYTES).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => Err(RequestError::PayloadTooLarge {
            limit: MAX_BODY_BYTES,
        }),
        Err(e) => Err(RequestError::Body(e.to_string())),
    }
}

/// A JSON response with the given status.
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let payload = serde_json::to_vec(body).expect("response bodies always serialize");
    let mut response = Response::new(Full::new(Bytes::from(payload)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
