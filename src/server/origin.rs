//! Cross-origin admission and response header middleware

use crate::server::error::ApiError;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;

const ALLOW_METHODS: &str = "GET, POST, OPTIONS";
const ALLOW_HEADERS: &str = "Origin, Content-Type";
const NO_CACHE: &str = "private, no-cache, no-store, must-revalidate";

/// Path admitted regardless of origin
const LIVENESS_PATH: &str = "/ping";

/// Which browser origins may call the service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OriginPolicy {
    /// No policy configured. Every origin passes and no CORS headers are sent.
    #[default]
    Unrestricted,
    /// `*`: every origin passes and is echoed back
    Any,
    /// Exact, case-sensitive matches only
    AllowList(Vec<String>),
}

impl OriginPolicy {
    /// Parse a comma-separated `CORS_ALLOW_ORIGIN` value. Entries are
    /// trimmed and empty entries ignored. Only the whole value `*` permits
    /// every origin; a `*` inside a list is an ordinary entry.
    pub fn parse(value: &str) -> Self {
        if value.trim() == "*" {
            return OriginPolicy::Any;
        }

        let entries: Vec<String> = value
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(String::from)
            .collect();

        if entries.is_empty() {
            OriginPolicy::Unrestricted
        } else {
            OriginPolicy::AllowList(entries)
        }
    }

    pub fn permits(&self, origin: &str) -> bool {
        match self {
            OriginPolicy::Unrestricted | OriginPolicy::Any => true,
            OriginPolicy::AllowList(allowed) => allowed.iter().any(|a| a == origin),
        }
    }

    /// Admission for a request that may not declare an origin
    fn admits(&self, origin: Option<&str>) -> bool {
        match origin {
            Some(origin) => self.permits(origin),
            None => !matches!(self, OriginPolicy::AllowList(_)),
        }
    }

    fn allow_origin_value(&self, origin: Option<&str>) -> Option<HeaderValue> {
        match self {
            OriginPolicy::Unrestricted => None,
            OriginPolicy::Any => Some(match origin {
                Some(origin) => HeaderValue::from_str(origin).ok()?,
                None => HeaderValue::from_static("*"),
            }),
            OriginPolicy::AllowList(_) => HeaderValue::from_str(origin?).ok(),
        }
    }
}

/// Rejects disallowed origins, answers preflight requests and attaches the
/// CORS headers to everything else
pub async fn origin_gate(
    State(policy): State<Arc<OriginPolicy>>,
    request: Request,
    next: Next,
) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let admitted = policy.admits(origin.as_deref());
    let exempt = request.uri().path().trim_end_matches('/') == LIVENESS_PATH;

    if !admitted && !exempt {
        debug!(origin = origin.as_deref().unwrap_or_default(), path = %request.uri().path(), "Origin rejected");
        return ApiError::origin_rejected().into_response();
    }

    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    if admitted {
        if let Some(allow_origin) = policy.allow_origin_value(origin.as_deref()) {
            let headers = response.headers_mut();
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allow_origin);
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(ALLOW_METHODS),
            );
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static(ALLOW_HEADERS),
            );
        }
    }

    response
}

/// Marks every response as uncacheable
pub async fn no_cache(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));
    headers.insert(header::EXPIRES, HeaderValue::from_static("-1"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));

    response
}
