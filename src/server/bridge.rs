//! Request bridge
//!
//! Turns a hyper request into whichever calling convention the dispatch
//! speaks, runs it and converts what the application produced back into a
//! hyper response. Application errors become a 500 here and nowhere else.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::{Request, Response, StatusCode, Version};
use percent_encoding::percent_decode_str;
use tokio::sync::mpsc;

use crate::adapter::{AsyncAdapter, Dispatch, SyncAdapter};
use crate::app::environ::{
    Environ, StartResponse, SyncApp, QUERY_STRING, REMOTE_ADDR, SERVER_NAME, SERVER_PORT,
    SERVER_PROTOCOL,
};
use crate::app::scope::{AsyncApp, Channel, Message, Scope, ScopeKind};
use crate::config::AppState;
use crate::error::AppError;
use crate::http;
use crate::logger::{self, AccessLogEntry};

const CHANNEL_CAPACITY: usize = 16;

/// Addresses of both ends of the connection a request arrived on
#[derive(Debug, Clone, Copy)]
pub struct ConnInfo {
    pub peer: SocketAddr,
    pub local: SocketAddr,
}

/// Request line and headers, independent of the calling convention
struct RequestHead {
    method: String,
    /// Percent-decoded path
    path: String,
    raw_path: String,
    query: String,
    version: &'static str,
    headers: Vec<(String, String)>,
}

impl RequestHead {
    fn from_parts(parts: &hyper::http::request::Parts) -> Self {
        let raw_path = parts.uri.path().to_string();
        let path = percent_decode_str(&raw_path).decode_utf8_lossy().into_owned();
        let headers = parts
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        Self {
            method: parts.method.as_str().to_string(),
            path,
            raw_path,
            query: parts.uri.query().unwrap_or_default().to_string(),
            version: version_str(parts.version),
            headers,
        }
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

const fn version_str(version: Version) -> &'static str {
    match version {
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        _ => "1.1",
    }
}

/// Status, headers and body produced by an application
#[derive(Debug, Default)]
struct Produced {
    status: Option<StatusCode>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl StartResponse for Produced {
    fn start(&mut self, status: StatusCode, headers: Vec<(String, String)>) {
        self.status = Some(status);
        self.headers = headers;
    }

    fn write(&mut self, chunk: Bytes) {
        self.body.extend_from_slice(&chunk);
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    conn: ConnInfo,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let started = Instant::now();
    let (parts, body) = req.into_parts();
    let head = RequestHead::from_parts(&parts);

    let (response, handled_by) = match read_body(body, state.config.http.max_body_size).await {
        Ok(body) => match dispatch(&state.dispatch, &head, body, conn).await {
            Ok(produced) => (into_response(produced, &state), "app"),
            Err(e) => {
                logger::log_error(&format!("{} {}: {e}", head.method, head.path));
                (http::build_500_response(), "server")
            }
        },
        Err(response) => (response, "server"),
    };

    if state.access_log() {
        log_access(&head, &response, conn, handled_by, started, &state);
    }
    Ok(response)
}

/// Collect the request body, refusing anything over `max_body_size`
async fn read_body<B>(body: B, max_body_size: u64) -> Result<Bytes, Response<Full<Bytes>>>
where
    B: Body<Data = Bytes>,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => {
            logger::log_warning(&format!(
                "Request body too large (max: {max_body_size} bytes)"
            ));
            Err(http::build_413_response())
        }
        Err(e) => {
            logger::log_error(&format!("Failed to read request body: {e}"));
            Err(http::build_500_response())
        }
    }
}

async fn dispatch(
    dispatch: &Dispatch,
    head: &RequestHead,
    body: Bytes,
    conn: ConnInfo,
) -> Result<Produced, AppError> {
    match dispatch {
        Dispatch::Sync(adapter) => {
            let environ = build_environ(head, body, conn);
            run_sync(Arc::clone(adapter), environ).await
        }
        Dispatch::Async(adapter) => run_async(adapter, build_scope(head, conn), body).await,
    }
}

fn build_environ(head: &RequestHead, body: Bytes, conn: ConnInfo) -> Environ {
    let mut environ = Environ::new(&head.method, &head.path).with_input(body);
    environ.set(QUERY_STRING, head.query.as_str());
    environ.set(SERVER_NAME, conn.local.ip().to_string());
    environ.set(SERVER_PORT, conn.local.port().to_string());
    environ.set(SERVER_PROTOCOL, format!("HTTP/{}", head.version));
    environ.set(REMOTE_ADDR, conn.peer.ip().to_string());
    for (name, value) in &head.headers {
        environ.insert_header(name, value);
    }
    environ
}

fn build_scope(head: &RequestHead, conn: ConnInfo) -> Scope {
    Scope {
        kind: ScopeKind::Http,
        http_version: head.version.to_string(),
        method: head.method.clone(),
        scheme: "http".to_string(),
        path: head.path.clone(),
        raw_path: head.raw_path.as_bytes().to_vec(),
        query_string: head.query.as_bytes().to_vec(),
        root_path: String::new(),
        headers: head
            .headers
            .iter()
            .map(|(k, v)| (Bytes::from(k.to_ascii_lowercase()), Bytes::from(v.clone())))
            .collect(),
        client: Some((conn.peer.ip().to_string(), conn.peer.port())),
        server: Some((conn.local.ip().to_string(), conn.local.port())),
    }
}

/// Run a synchronous application off the reactor. The body iterator is
/// drained on the same blocking thread.
async fn run_sync(adapter: Arc<SyncAdapter>, mut environ: Environ) -> Result<Produced, AppError> {
    let joined = tokio::task::spawn_blocking(move || {
        let mut produced = Produced::default();
        let chunks = adapter.call(&mut environ, &mut produced)?;
        for chunk in chunks {
            produced.body.extend_from_slice(&chunk);
        }
        Ok::<_, AppError>(produced)
    })
    .await;

    joined.map_err(|e| AppError::raised(format!("application thread failed: {e}")))?
}

/// Run an asynchronous application while draining what it sends. The
/// request body arrives as a single message; after that the connection
/// reads as disconnected.
async fn run_async(adapter: &AsyncAdapter, scope: Scope, body: Bytes) -> Result<Produced, AppError> {
    let Channel {
        inbound,
        outbound,
        to_app,
        from_app,
    } = Channel::new(CHANNEL_CAPACITY);

    to_app
        .send(Message::HttpRequest {
            body,
            more_body: false,
        })
        .await
        .map_err(|_| AppError::ChannelClosed)?;
    drop(to_app);

    let (called, produced) = tokio::join!(
        adapter.call(scope, inbound, outbound),
        collect_response(from_app)
    );

    match produced {
        Ok(produced) if produced.status.is_some() => {
            if let Err(e) = called {
                logger::log_warning(&format!("Application failed after responding: {e}"));
            }
            Ok(produced)
        }
        Ok(_) => Err(called.err().unwrap_or_else(|| {
            AppError::raised("application returned without sending a response")
        })),
        Err(e) => Err(called.err().unwrap_or(e)),
    }
}

/// Gather response messages until the final body chunk. The receiver is
/// dropped on return so a misbehaving application sees a closed channel
/// instead of blocking.
async fn collect_response(mut from_app: mpsc::Receiver<Message>) -> Result<Produced, AppError> {
    let mut produced = Produced::default();
    while let Some(message) = from_app.recv().await {
        match message {
            Message::HttpResponseStart { status, headers } if produced.status.is_none() => {
                let status = StatusCode::from_u16(status)
                    .map_err(|_| AppError::raised(format!("invalid status code {status}")))?;
                produced.start(status, headers);
            }
            Message::HttpResponseBody { body, more_body } if produced.status.is_some() => {
                produced.write(body);
                if !more_body {
                    return Ok(produced);
                }
            }
            other => {
                let expected = if produced.status.is_none() {
                    "http.response.start"
                } else {
                    "http.response.body"
                };
                return Err(AppError::UnexpectedMessage {
                    expected,
                    got: other.kind().to_string(),
                });
            }
        }
    }
    Ok(produced)
}

fn into_response(produced: Produced, state: &AppState) -> Response<Full<Bytes>> {
    let status = produced.status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    http::build_response(
        status,
        &produced.headers,
        Bytes::from(produced.body),
        &state.config.http.server_name,
    )
}

fn log_access(
    head: &RequestHead,
    response: &Response<Full<Bytes>>,
    conn: ConnInfo,
    handled_by: &'static str,
    started: Instant,
    state: &AppState,
) {
    let mut entry = AccessLogEntry::new(
        conn.peer.ip().to_string(),
        head.method.clone(),
        head.raw_path.clone(),
    );
    entry.query = Some(head.query.clone()).filter(|q| !q.is_empty());
    entry.http_version = head.version.to_string();
    entry.status = response.status().as_u16();
    entry.body_bytes = usize::try_from(response.body().size_hint().exact().unwrap_or(0))
        .unwrap_or(usize::MAX);
    entry.referer = head.header("referer").map(ToString::to_string);
    entry.user_agent = head.header("user-agent").map(ToString::to_string);
    entry.handled_by = handled_by;
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    logger::log_access(&entry, &state.config.logging.access_log_format);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::detect::detect;
    use crate::app::entrypoint::{AsyncHandler, SyncHandler};
    use crate::config::Config;
    use crate::demo;
    use crate::prefix::RoutePrefix;
    use crate::static_files::StaticFiles;
    use futures::FutureExt;
    use std::collections::HashMap;
    use std::path::Path;

    fn config(extra: &[(&str, &str)]) -> Config {
        let mut vars = HashMap::from([("PORT".to_string(), "8000".to_string())]);
        for (k, v) in extra {
            vars.insert((*k).to_string(), (*v).to_string());
        }
        Config::load_with_env("does-not-exist/devroute", &vars).unwrap()
    }

    fn state_for(entry: &str, prefix: &str, root: &Path) -> Arc<AppState> {
        let loaded = demo::registry().load(entry).unwrap();
        let label = loaded.label();
        let prefix = Arc::new(RoutePrefix::new(prefix));
        let dispatch =
            Dispatch::wrap(detect(loaded.object), StaticFiles::new(root), Arc::clone(&prefix))
                .unwrap();
        Arc::new(AppState::new(config(&[]), dispatch, prefix, label))
    }

    fn public_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.css"), "h1{}").unwrap();
        dir
    }

    fn conn() -> ConnInfo {
        ConnInfo {
            peer: "127.0.0.1:50000".parse().unwrap(),
            local: "127.0.0.1:8000".parse().unwrap(),
        }
    }

    fn request(method: &str, uri: &str, body: &'static str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("user-agent", "test")
            .body(Full::new(Bytes::from_static(body.as_bytes())))
            .unwrap()
    }

    async fn send(state: &Arc<AppState>, req: Request<Full<Bytes>>) -> (StatusCode, Bytes) {
        let resp = handle_request(req, Arc::clone(state), conn()).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, body)
    }

    fn json(body: &Bytes) -> serde_json::Value {
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn test_prefixed_static_file_is_served() {
        let dir = public_dir();
        let state = state_for("main", "/svc", dir.path());
        let (status, body) = send(&state, request("GET", "/svc/app.css", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"h1{}");
    }

    #[tokio::test]
    async fn test_sync_app_sees_stripped_path() {
        let dir = public_dir();
        let state = state_for("main", "/svc", dir.path());
        let (status, body) = send(&state, request("POST", "/svc/items?x=1", "abc")).await;
        let value = json(&body);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["convention"], "sync");
        assert_eq!(value["path"], "/items");
        assert_eq!(value["root_path"], "/svc");
        assert_eq!(value["query"], "x=1");
        assert_eq!(value["body_bytes"], 3);
    }

    #[tokio::test]
    async fn test_async_app_outside_prefix_is_untouched() {
        let dir = public_dir();
        let state = state_for("hello_async", "/svc", dir.path());
        let (status, body) = send(&state, request("GET", "/other", "")).await;
        let value = json(&body);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["convention"], "async");
        assert_eq!(value["path"], "/other");
        assert_eq!(value["root_path"], "");
    }

    #[tokio::test]
    async fn test_async_path_is_percent_decoded() {
        let dir = public_dir();
        let state = state_for("framework", "/svc", dir.path());
        let (_, body) = send(&state, request("GET", "/svc/caf%C3%A9", "")).await;
        assert_eq!(json(&body)["path"], "/café");
    }

    #[tokio::test]
    async fn test_async_static_file_is_served() {
        let dir = public_dir();
        let state = state_for("hello_async", "", dir.path());
        let (status, body) = send(&state, request("GET", "/app.css", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"h1{}");
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let dir = public_dir();
        let loaded = demo::registry().load("main").unwrap();
        let label = loaded.label();
        let prefix = Arc::new(RoutePrefix::default());
        let dispatch = Dispatch::wrap(
            detect(loaded.object),
            StaticFiles::new(dir.path()),
            Arc::clone(&prefix),
        )
        .unwrap();
        let state = Arc::new(AppState::new(
            config(&[("DEVROUTE__HTTP__MAX_BODY_SIZE", "4")]),
            dispatch,
            prefix,
            label,
        ));

        let (status, _) = send(&state, request("POST", "/upload", "too long")).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_sync_app_error_is_500() {
        let dir = public_dir();
        let app = Arc::new(SyncHandler::new(|_, _| Err(AppError::raised("boom"))));
        let prefix = Arc::new(RoutePrefix::default());
        let adapter = SyncAdapter::new(app, StaticFiles::new(dir.path()), Arc::clone(&prefix));
        let state = Arc::new(AppState::new(
            config(&[]),
            Dispatch::Sync(Arc::new(adapter)),
            prefix,
            "test:app".to_string(),
        ));

        let (status, _) = send(&state, request("GET", "/", "")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_async_app_without_response_is_500() {
        let dir = public_dir();
        let app = Arc::new(AsyncHandler::new(|_scope, _receive, _send| {
            async { Ok(()) }.boxed()
        }));
        let prefix = Arc::new(RoutePrefix::default());
        let adapter = AsyncAdapter::new(app, StaticFiles::new(dir.path()), Arc::clone(&prefix));
        let state = Arc::new(AppState::new(
            config(&[]),
            Dispatch::Async(Arc::new(adapter)),
            prefix,
            "test:app".to_string(),
        ));

        let (status, _) = send(&state, request("GET", "/", "")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_body_before_start_is_rejected() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(Message::HttpResponseBody {
            body: Bytes::from_static(b"early"),
            more_body: false,
        })
        .await
        .unwrap();
        drop(tx);

        match collect_response(rx).await {
            Err(AppError::UnexpectedMessage { expected, got }) => {
                assert_eq!(expected, "http.response.start");
                assert_eq!(got, "http.response.body");
            }
            other => panic!("unexpected result: {:?}", other.map(|p| p.status)),
        }
    }

    #[test]
    fn test_environ_carries_request_metadata() {
        let req = request("GET", "/a%20b?q=1", "");
        let (parts, _) = req.into_parts();
        let head = RequestHead::from_parts(&parts);
        let environ = build_environ(&head, Bytes::new(), conn());

        assert_eq!(environ.path_info(), "/a b");
        assert_eq!(environ.get(QUERY_STRING), Some("q=1"));
        assert_eq!(environ.get(SERVER_PORT), Some("8000"));
        assert_eq!(environ.get(REMOTE_ADDR), Some("127.0.0.1"));
        assert_eq!(environ.header("user-agent"), Some("test"));
    }

    #[test]
    fn test_scope_keeps_raw_path() {
        let req = request("GET", "/a%20b?q=1", "");
        let (parts, _) = req.into_parts();
        let scope = build_scope(&RequestHead::from_parts(&parts), conn());

        assert_eq!(scope.path, "/a b");
        assert_eq!(scope.raw_path, b"/a%20b".to_vec());
        assert_eq!(scope.query_string, b"q=1".to_vec());
        assert_eq!(scope.client, Some(("127.0.0.1".to_string(), 50000)));
    }
}
