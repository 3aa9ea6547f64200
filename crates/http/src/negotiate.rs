//! Content negotiation: every request body and every response is JSON.

use hyper::header::{ACCEPT, CONTENT_TYPE};
use hyper::HeaderMap;

const JSON: &str = "application/json";

/// Whether `Content-Type` names JSON. Parameters such as `charset` are
/// ignored; a missing header does not count.
pub fn has_json_body(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| essence(v).eq_ignore_ascii_case(JSON))
        .unwrap_or(false)
}

/// Whether the client will take a JSON response. No `Accept` header at all
/// means anything is acceptable.
pub fn accepts_json(headers: &HeaderMap) -> bool {
    let mut values = headers.get_all(ACCEPT).into_iter().peekable();
    if values.peek().is_none() {
        return true;
    }
    values
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(admits_json)
}

/// One media range from an `Accept` header, e.g. `application/*;q=0.5`.
fn admits_json(range: &str) -> bool {
    if quality(range) == Some(0.0) {
        return false;
    }
    let media = essence(range);
    media == "*/*"
        || media.eq_ignore_ascii_case("application/*")
        || media.eq_ignore_ascii_case(JSON)
}

/// The media type without parameters.
fn essence(value: &str) -> &str {
    value.split(';').next().unwrap_or("").trim()
}

fn quality(range: &str) -> Option<f32> {
    range.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("q") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}
