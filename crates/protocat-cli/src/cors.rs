//! Cross-origin policy for browser clients (API explorers served from a local
//! dev server).

use hyper::header::{
    HeaderMap, HeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_HEADERS,
    ORIGIN, VARY,
};

const ALLOWED_METHODS: &str = "HEAD, GET, POST, PUT, PATCH, DELETE";

#[derive(Debug, Clone)]
pub struct CorsPolicy {
    host_prefix: String,
}

impl CorsPolicy {
    pub fn new(host_prefix: impl Into<String>) -> Self {
        Self {
            host_prefix: host_prefix.into(),
        }
    }

    /// An origin is allowed when it parses as a URL whose host starts with the
    /// configured prefix.
    pub fn allows(&self, origin: &str) -> bool {
        url::Url::parse(origin)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.starts_with(&self.host_prefix)))
            .unwrap_or(false)
    }

    /// Headers for a regular (non-preflight) response.
    pub fn response_headers(&self, request: &HeaderMap) -> HeaderMap {
        let mut out = HeaderMap::new();
        out.insert(VARY, HeaderValue::from_static("Origin"));
        if let Some(origin) = self.allowed_origin(request) {
            out.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
            out.insert(
                ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        out
    }

    /// Headers for an `OPTIONS` preflight. Requested headers are reflected.
    pub fn preflight_headers(&self, request: &HeaderMap) -> HeaderMap {
        let mut out = self.response_headers(request);
        if !out.contains_key(ACCESS_CONTROL_ALLOW_ORIGIN) {
            return out;
        }
        out.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        if let Some(requested) = request.get(ACCESS_CONTROL_REQUEST_HEADERS) {
            out.insert(ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
        }
        out
    }

    fn allowed_origin(&self, request: &HeaderMap) -> Option<HeaderValue> {
        let origin = request.get(ORIGIN)?;
        let text = origin.to_str().ok()?;
        self.allows(text).then(|| origin.clone())
    }
}
