//! HTTP response building module
//!
//! Builders for the responses the host server produces itself; application
//! and static responses come back through the adapters.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};

/// Build a response from captured status, headers and body
pub fn build_response(
    status: StatusCode,
    headers: &[(String, String)],
    body: Bytes,
    server_name: &str,
) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(status);
    let mut has_server = false;
    for (name, value) in headers {
        has_server |= name.eq_ignore_ascii_case("server");
        builder = builder.header(name.as_str(), value.as_str());
    }
    if !has_server && !server_name.is_empty() {
        builder = builder.header("Server", server_name);
    }

    builder.body(Full::new(body)).unwrap_or_else(|e| {
        log_build_error(status.as_str(), &e);
        build_500_response()
    })
}

/// Build 413 Payload Too Large response
pub fn build_413_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(413)
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from("413 Payload Too Large")))
        .unwrap_or_else(|e| {
            log_build_error("413", &e);
            Response::new(Full::new(Bytes::from("413 Payload Too Large")))
        })
}

/// Build 500 Internal Server Error response
pub fn build_500_response() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from("Internal Server Error")));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
