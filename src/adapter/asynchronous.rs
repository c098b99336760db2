//! Asynchronous adapter
//!
//! Works on a rewritten copy of the scope; the scope it was handed is never
//! changed. Lifespan connections go straight to the wrapped application.

use crate::app::scope::{AsyncApp, Inbound, Outbound, Scope, ScopeKind};
use crate::error::AppError;
use crate::prefix::{extend_root, strip_raw, RoutePrefix};
use crate::static_files::StaticFiles;
use async_trait::async_trait;
use std::sync::Arc;

pub struct AsyncAdapter {
    app: Arc<dyn AsyncApp>,
    statics: StaticFiles,
    prefix: Arc<RoutePrefix>,
}

impl AsyncAdapter {
    pub fn new(app: Arc<dyn AsyncApp>, statics: StaticFiles, prefix: Arc<RoutePrefix>) -> Self {
        Self {
            app,
            statics,
            prefix,
        }
    }
}

/// Copy of `scope` with the route prefix stripped from `path` and
/// `raw_path`, and appended to `root_path`.
pub fn rewrite_scope(scope: &Scope, prefix: &RoutePrefix) -> Scope {
    let stripped = prefix.strip(&scope.path);
    if !stripped.is_match() {
        return scope.clone();
    }

    let mut rewritten = scope.clone();
    rewritten.path = stripped.path;
    if !scope.raw_path.is_empty() {
        rewritten.raw_path = strip_raw(&scope.raw_path, &stripped.matched);
    }
    rewritten.root_path = extend_root(&scope.root_path, &stripped.matched);
    rewritten
}

#[async_trait]
impl AsyncApp for AsyncAdapter {
    async fn call(&self, scope: Scope, receive: Inbound, send: Outbound) -> Result<(), AppError> {
        if scope.kind == ScopeKind::Lifespan {
            return self.app.call(scope, receive, send).await;
        }

        let effective = rewrite_scope(&scope, &self.prefix);

        if effective.is_http() && self.statics.lookup(&effective.path).is_some() {
            return self.statics.call(effective, receive, send).await;
        }

        self.app.call(effective, receive, send).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::entrypoint::AsyncHandler;
    use crate::app::scope::{Channel, Message};
    use futures::FutureExt;
    use hyper::body::Bytes;
    use std::sync::Mutex;

    type Seen = Arc<Mutex<Vec<Scope>>>;

    /// Application that records its scope, answers lifespan events and
    /// replies 204 to requests.
    fn recording_app(seen: Seen) -> Arc<dyn AsyncApp> {
        Arc::new(AsyncHandler::new(move |scope: Scope, mut receive: Inbound, send: Outbound| {
            seen.lock().unwrap().push(scope.clone());
            async move {
                if scope.kind == ScopeKind::Lifespan {
                    while let Message::LifespanStartup | Message::LifespanShutdown =
                        receive.receive().await
                    {
                        send.send(Message::LifespanStartupComplete).await?;
                    }
                    return Ok(());
                }
                send.send(Message::HttpResponseStart {
                    status: 204,
                    headers: vec![],
                })
                .await?;
                send.send(Message::HttpResponseBody {
                    body: Bytes::new(),
                    more_body: false,
                })
                .await
            }
            .boxed()
        }))
    }

    fn public_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.css"), "h1{}").unwrap();
        dir
    }

    fn adapter(prefix: &str, root: &std::path::Path, seen: Seen) -> AsyncAdapter {
        AsyncAdapter::new(
            recording_app(seen),
            StaticFiles::new(root),
            Arc::new(RoutePrefix::new(prefix)),
        )
    }

    async fn run(adapter: &AsyncAdapter, scope: Scope) -> Vec<Message> {
        let Channel {
            inbound,
            outbound,
            to_app,
            mut from_app,
        } = Channel::new(16);
        drop(to_app);
        adapter.call(scope, inbound, outbound).await.unwrap();
        let mut messages = Vec::new();
        while let Some(msg) = from_app.recv().await {
            messages.push(msg);
        }
        messages
    }

    fn status_of(messages: &[Message]) -> u16 {
        match messages.first() {
            Some(Message::HttpResponseStart { status, .. }) => *status,
            other => panic!("expected response start, got {other:?}"),
        }
    }

    #[test]
    fn test_rewrite_scope_leaves_original_untouched() {
        let mut scope = Scope::http("GET", "/svc/items");
        scope.root_path = "/proxy".to_string();
        let prefix = RoutePrefix::new("/svc");

        let rewritten = rewrite_scope(&scope, &prefix);

        assert_eq!(rewritten.path, "/items");
        assert_eq!(rewritten.raw_path, b"/items".to_vec());
        assert_eq!(rewritten.root_path, "/proxy/svc");
        assert_eq!(scope.path, "/svc/items");
        assert_eq!(scope.root_path, "/proxy");
    }

    #[test]
    fn test_rewrite_scope_preserves_raw_bytes() {
        let mut scope = Scope::http("GET", "/svc/café");
        scope.raw_path = b"/svc/caf%C3%A9".to_vec();
        let rewritten = rewrite_scope(&scope, &RoutePrefix::new("/svc"));
        assert_eq!(rewritten.path, "/café");
        assert_eq!(rewritten.raw_path, b"/caf%C3%A9".to_vec());
    }

    #[test]
    fn test_rewrite_scope_without_match() {
        let scope = Scope::http("GET", "/other");
        let rewritten = rewrite_scope(&scope, &RoutePrefix::new("/svc"));
        assert_eq!(rewritten, scope);
    }

    #[tokio::test]
    async fn test_static_file_served_without_app() {
        let dir = public_dir();
        let seen = Seen::default();
        let adapter = adapter("", dir.path(), seen.clone());

        let messages = run(&adapter, Scope::http("GET", "/app.css")).await;

        assert_eq!(status_of(&messages), 200);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_reaches_app() {
        let dir = public_dir();
        let seen = Seen::default();
        let adapter = adapter("", dir.path(), seen.clone());

        let messages = run(&adapter, Scope::http("GET", "/missing.png")).await;

        assert_eq!(status_of(&messages), 204);
        assert_eq!(seen.lock().unwrap()[0].path, "/missing.png");
    }

    #[tokio::test]
    async fn test_prefix_is_applied_for_app() {
        let dir = public_dir();
        let seen = Seen::default();
        let adapter = adapter("/svc", dir.path(), seen.clone());

        run(&adapter, Scope::http("POST", "/svc/items")).await;
        run(&adapter, Scope::http("GET", "/other")).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].path, "/items");
        assert!(seen[0].root_path.ends_with("/svc"));
        assert_eq!(seen[1].path, "/other");
        assert_eq!(seen[1].root_path, "");
    }

    #[tokio::test]
    async fn test_prefixed_static_file() {
        let dir = public_dir();
        let adapter = adapter("/svc", dir.path(), Seen::default());
        let messages = run(&adapter, Scope::http("GET", "/svc/app.css")).await;
        assert_eq!(status_of(&messages), 200);
    }

    #[tokio::test]
    async fn test_lifespan_bypasses_static_and_prefix() {
        let dir = public_dir();
        let seen = Seen::default();
        let adapter = adapter("/svc", dir.path(), seen.clone());

        let Channel {
            inbound,
            outbound,
            to_app,
            mut from_app,
        } = Channel::new(4);
        to_app.send(Message::LifespanStartup).await.unwrap();
        drop(to_app);

        adapter
            .call(Scope::lifespan(), inbound, outbound)
            .await
            .unwrap();

        assert_eq!(
            from_app.recv().await,
            Some(Message::LifespanStartupComplete)
        );
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], Scope::lifespan());
    }
}
