//! JSON bodies accepted and produced by the HTTP surface.

use crate::error::RequestError;
use ratings_core::VectorClock;
use ratings_service::RatingView;
use serde::{Deserialize, Serialize};

/// Body of `PUT /rating/{entity}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PutRatingRequest {
    pub rating: f64,
    #[serde(alias = "clock")]
    pub clocks: VectorClock,
}

impl PutRatingRequest {
    /// Decode a request body. Anything but a finite number and a map of
    /// writer ids to non-negative integers is rejected.
    pub fn from_slice(body: &[u8]) -> Result<Self, RequestError> {
        let request: Self =
            serde_json::from_slice(body).map_err(|e| RequestError::BadBody(e.to_string()))?;
        if !request.rating.is_finite() {
            return Err(RequestError::BadBody("rating must be a finite number".into()));
        }
        Ok(request)
    }
}

/// Body returned by PUT and DELETE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingResponse {
    pub rating: Option<f64>,
}

/// Body returned by GET: the aggregate and the index-aligned siblings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingStateResponse {
    pub rating: Option<f64>,
    pub choices: Vec<f64>,
    pub clocks: Vec<VectorClock>,
}

impl RatingStateResponse {
    /// State of an entity that holds nothing.
    pub fn absent() -> Self {
        Self {
            rating: None,
            choices: Vec::new(),
            clocks: Vec::new(),
        }
    }
}

impl From<RatingView> for RatingStateResponse {
    fn from(view: RatingView) -> Self {
        Self {
            rating: Some(view.rating),
            choices: view.choices,
            clocks: view.clocks,
        }
    }
}

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_put_request() {
        let req = PutRatingRequest::from_slice(br#"{"rating": 5, "clocks": {"c0": 1}}"#).unwrap();
        assert_eq!(req.rating, 5.0);
        assert_eq!(req.clocks.get("c0"), 1);
    }

    #[test]
    fn test_decode_accepts_clock_alias() {
        let req = PutRatingRequest::from_slice(br#"{"rating": 2.5, "clock": {"c1": 3}}"#).unwrap();
        assert_eq!(req.rating, 2.5);
        assert_eq!(req.clocks.get("c1"), 3);
    }

    #[test]
    fn test_decode_rejects_bad_bodies() {
        let bad: &[&[u8]] = &[
            b"not json",
            br#"{"rating": "five", "clocks": {"c0": 1}}"#,
            br#"{"rating": 5}"#,
            br#"{"clocks": {"c0": 1}}"#,
            br#"{"rating": 5, "clocks": {"c0": -1}}"#,
            br#"{"rating": 5, "clocks": {"c0": 1.5}}"#,
            br#"{"rating": 5, "clocks": [1, 2]}"#,
            br#"{"rating": 5, "clocks": {"c0": 1}, "extra": true}"#,
            br#"{"rating": 1e400, "clocks": {"c0": 1}}"#,
        ];
        for body in bad {
            let err = PutRatingRequest::from_slice(body).unwrap_err();
            assert!(
                matches!(err, RequestError::BadBody(_)),
                "{:?} should be rejected as a bad body, got {}",
                String::from_utf8_lossy(body),
                err
            );
        }
    }

    #[test]
    fn test_state_response_shape() {
        let json = serde_json::to_value(RatingStateResponse::absent()).unwrap();
        assert_eq!(json, serde_json::json!({"rating": null, "choices": [], "clocks": []}));

        let view = RatingView {
            rating: 3.5,
            choices: vec![5.0, 2.0],
            clocks: vec![
                [("c0", 5)].into_iter().collect(),
                [("c1", 3)].into_iter().collect(),
            ],
        };
        let json = serde_json::to_value(RatingStateResponse::from(view)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "rating": 3.5,
                "choices": [5.0, 2.0],
                "clocks": [{"c0": 5}, {"c1": 3}],
            })
        );
    }
}
