//! Caller identification and request accounting.
//!
//! Authentication happens upstream of this server. Whatever sits in front
//! of it forwards the verified profile id in the `x-profile-id` header, and
//! [`profile_middleware`] turns that header into a [`ProfileId`] extension
//! for the handlers.
//!
//! ```rust,no_run
//! use axum::extract::Extension;
//! use pt_server::api::middleware::ProfileId;
//!
//! async fn handler(Extension(ProfileId(profile_id)): Extension<ProfileId>) -> String {
//!     format!("Acting as profile {}", profile_id)
//! }
//! # let _ = handler;
//! ```

use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use poker_tourney::PlayerId;
use std::time::Instant;

use crate::{logging, metrics};

/// Header carrying the caller's profile id
pub const PROFILE_ID_HEADER: &str = "x-profile-id";

/// Profile the request acts as
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProfileId(pub PlayerId);

/// Reads the caller's profile id from the request headers.
///
/// # Returns
///
/// * `Ok(ProfileId)` - Header present and a positive integer
/// * `Err(StatusCode::UNAUTHORIZED)` - Header missing
/// * `Err(StatusCode::BAD_REQUEST)` - Header malformed; AI players use
///   negative ids, so those are refused too
pub fn profile_from_headers(headers: &HeaderMap) -> Result<ProfileId, StatusCode> {
    let value = headers
        .get(PROFILE_ID_HEADER)
        .ok_or(StatusCode::UNAUTHORIZED)?;
    let id: PlayerId = value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .ok_or(StatusCode::BAD_REQUEST)?;
    if id <= 0 {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(ProfileId(id))
}

/// Middleware that requires `x-profile-id` and injects [`ProfileId`].
pub async fn profile_middleware(mut request: Request, next: Next) -> Result<Response, StatusCode> {
    let profile = profile_from_headers(request.headers())?;
    request.extensions_mut().insert(profile);
    Ok(next.run(request).await)
}

/// Middleware that logs every request and counts it.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let profile = profile_from_headers(request.headers()).ok().map(|p| p.0);

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    logging::log_api_request(method.as_str(), &path, status, elapsed, profile);
    metrics::http_requests_total(method.as_str(), status);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(PROFILE_ID_HEADER, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_profile_from_headers() {
        assert_eq!(profile_from_headers(&headers("42")), Ok(ProfileId(42)));
        assert_eq!(profile_from_headers(&headers(" 7 ")), Ok(ProfileId(7)));
    }

    #[test]
    fn test_missing_profile_is_unauthorized() {
        assert_eq!(
            profile_from_headers(&HeaderMap::new()),
            Err(StatusCode::UNAUTHORIZED)
        );
    }

    #[test]
    fn test_malformed_profile_is_bad_request() {
        assert_eq!(profile_from_headers(&headers("abc")), Err(StatusCode::BAD_REQUEST));
        assert_eq!(profile_from_headers(&headers("-3")), Err(StatusCode::BAD_REQUEST));
        assert_eq!(profile_from_headers(&headers("0")), Err(StatusCode::BAD_REQUEST));
    }
}
