//! Built-in entrypoint modules
//!
//! Entry strings are resolved against this registry. Each module exports
//! `app`; they echo what the application saw as JSON, which makes prefix
//! stripping and static fallthrough visible from a client.

use crate::app::entrypoint::{AsyncHandler, Entrypoint, Framework, Instance, SyncHandler};
use crate::app::environ::{body_from, Environ, StartResponse, PATH_INFO, QUERY_STRING};
use crate::app::registry::{Module, Registry};
use crate::app::scope::{AsyncApp, Inbound, Message, Outbound, Scope, ScopeKind};
use crate::app::signature::Signature;
use crate::error::AppError;
use futures::future::BoxFuture;
use futures::FutureExt;
use hyper::body::Bytes;
use hyper::StatusCode;
use serde_json::json;
use std::io::Read;
use std::sync::Arc;

const JSON: &str = "application/json";

/// Registry with every built-in module
pub fn registry() -> Registry {
    let sync_app = sync_echo();
    Registry::new()
        .register("main", Module::new().export("app", Arc::clone(&sync_app)))
        .register("hello_sync", Module::new().export("application", sync_app))
        .register(
            "hello_async",
            Module::new().export("app", Arc::new(Instance::new(async_echo()))),
        )
        .register(
            "framework",
            Module::new().export("app", Arc::new(Framework::new("framework:app", async_app()))),
        )
        .register(
            "lifespan_fail",
            Module::new().export("app", Arc::new(failing_startup())),
        )
        .register("broken", Module::new().export("app", broken()))
}

fn echo_body(
    convention: &str,
    method: &str,
    path: &str,
    root: &str,
    query: &str,
    body_len: usize,
) -> Bytes {
    let value = json!({
        "convention": convention,
        "method": method,
        "path": path,
        "root_path": root,
        "query": query,
        "body_bytes": body_len,
    });
    Bytes::from(value.to_string())
}

fn sync_echo() -> Arc<dyn Entrypoint> {
    Arc::new(SyncHandler::new(
        |environ: &mut Environ, start: &mut dyn StartResponse| {
            let mut body = Vec::new();
            environ
                .input()
                .read_to_end(&mut body)
                .map_err(|e| AppError::raised(format!("reading request body: {e}")))?;

            let payload = echo_body(
                "sync",
                environ.method(),
                environ.get(PATH_INFO).unwrap_or_default(),
                environ.script_name(),
                environ.get(QUERY_STRING).unwrap_or_default(),
                body.len(),
            );
            start.start(
                StatusCode::OK,
                vec![
                    ("Content-Type".to_string(), JSON.to_string()),
                    ("Content-Length".to_string(), payload.len().to_string()),
                ],
            );
            Ok(body_from(vec![payload]))
        },
    ))
}

async fn answer_lifespan(mut receive: Inbound, send: Outbound) -> Result<(), AppError> {
    loop {
        match receive.receive().await {
            Message::LifespanStartup => send.send(Message::LifespanStartupComplete).await?,
            Message::LifespanShutdown => {
                return send.send(Message::LifespanShutdownComplete).await;
            }
            _ => return Ok(()),
        }
    }
}

async fn echo_request(scope: Scope, mut receive: Inbound, send: Outbound) -> Result<(), AppError> {
    let mut body_len = 0;
    loop {
        match receive.receive().await {
            Message::HttpRequest { body, more_body } => {
                body_len += body.len();
                if !more_body {
                    break;
                }
            }
            _ => break,
        }
    }

    let payload = echo_body(
        "async",
        &scope.method,
        &scope.path,
        &scope.root_path,
        &String::from_utf8_lossy(&scope.query_string),
        body_len,
    );
    send.send(Message::HttpResponseStart {
        status: StatusCode::OK.as_u16(),
        headers: vec![
            ("content-type".to_string(), JSON.to_string()),
            ("content-length".to_string(), payload.len().to_string()),
        ],
    })
    .await?;
    send.send(Message::HttpResponseBody {
        body: payload,
        more_body: false,
    })
    .await
}

fn echo(scope: Scope, receive: Inbound, send: Outbound) -> BoxFuture<'static, Result<(), AppError>> {
    async move {
        match scope.kind.clone() {
            ScopeKind::Lifespan => answer_lifespan(receive, send).await,
            ScopeKind::Http => echo_request(scope, receive, send).await,
            ScopeKind::Other(kind) => {
                Err(AppError::raised(format!("unsupported scope type '{kind}'")))
            }
        }
    }
    .boxed()
}

fn async_echo() -> Arc<dyn Entrypoint> {
    Arc::new(AsyncHandler::new(echo))
}

fn async_app() -> Arc<dyn AsyncApp> {
    Arc::new(AsyncHandler::new(echo))
}

/// Refuses to start, to exercise the lifespan failure path
fn failing_startup() -> impl Entrypoint {
    AsyncHandler::new(|scope: Scope, mut receive: Inbound, send: Outbound| {
        async move {
            if scope.kind != ScopeKind::Lifespan {
                return echo(scope, receive, send).await;
            }
            if let Message::LifespanStartup = receive.receive().await {
                send.send(Message::LifespanStartupFailed {
                    message: "database unavailable".to_string(),
                })
                .await?;
            }
            Ok(())
        }
        .boxed()
    })
}

/// Takes a single argument, which matches neither convention
fn broken() -> Arc<dyn Entrypoint> {
    Arc::new(
        SyncHandler::new(|_: &mut Environ, _: &mut dyn StartResponse| Ok(body_from(Vec::new())))
            .with_signature(Signature::positional(&["request"])),
    )
}
