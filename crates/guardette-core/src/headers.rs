//! Header names and filtering rules at the gateway edges.

use http::header::{HeaderMap, HeaderName};

/// Declares which source an inbound call targets.
pub static PROXY_HOST_HEADER: HeaderName = HeaderName::from_static("x-guardette-host");

/// Marks responses produced by the gateway itself rather than the upstream.
pub static PROXY_ERROR_HEADER: HeaderName = HeaderName::from_static("x-guardette-error");

/// Overrides the principal impersonated by `gcp_service_account`.
pub static GCP_IMPERSONATE_SUB_HEADER: HeaderName =
    HeaderName::from_static("x-guardette-gcp-impersonate-sub");

/// Value of [`PROXY_ERROR_HEADER`].
pub const PROXY_ERROR_SOURCE: &str = "proxy";

/// Inbound headers never copied onto the upstream request.
///
/// `accept-encoding` is dropped so the upstream client negotiates
/// compression itself and actions always see decoded JSON.
pub static REQUEST_STRIPPED_HEADERS: &[&str] = &[
    "x-guardette-host",
    "authorization",
    "host",
    "content-length",
    "accept-encoding",
    // Hop-by-hop headers (HTTP/1.1)
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Upstream headers never copied onto the caller response.
///
/// The body is re-serialised after the response actions run, so the
/// upstream framing and encoding no longer apply.
pub static RESPONSE_STRIPPED_HEADERS: &[&str] = &[
    "content-length",
    "content-encoding",
    // Hop-by-hop headers (HTTP/1.1)
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Copies the inbound headers that may travel to the upstream.
pub fn filter_request_headers(headers: &HeaderMap) -> HeaderMap {
    filter(headers, REQUEST_STRIPPED_HEADERS)
}

/// Copies the upstream headers that may travel back to the caller.
pub fn filter_response_headers(headers: &HeaderMap) -> HeaderMap {
    filter(headers, RESPONSE_STRIPPED_HEADERS)
}

fn filter(headers: &HeaderMap, stripped: &[&str]) -> HeaderMap {
    let mut filtered = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !stripped.contains(&name.as_str()) {
            filtered.append(name.clone(), value.clone());
        }
    }
    filtered
}
