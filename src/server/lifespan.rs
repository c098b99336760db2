//! Lifespan protocol driver
//!
//! Runs the application's lifespan connection alongside the server:
//! `startup` before the first request is accepted, `shutdown` after the last
//! one. Applications that do not implement the protocol (they fail, or
//! return without answering) are served without it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::app::scope::{AsyncApp, Channel, Message, Scope};
use crate::error::{AppError, DevError};
use crate::logger;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// A lifespan connection that completed startup
pub struct Lifespan {
    to_app: mpsc::Sender<Message>,
    from_app: mpsc::Receiver<Message>,
    task: JoinHandle<Result<(), AppError>>,
}

/// Send `lifespan.startup` and wait for the answer.
///
/// `Ok(None)` means the application does not speak the protocol;
/// `startup.failed` is fatal.
pub async fn startup(app: Arc<dyn AsyncApp>) -> Result<Option<Lifespan>, DevError> {
    let Channel {
        inbound,
        outbound,
        to_app,
        mut from_app,
    } = Channel::new(4);

    let task = tokio::spawn(async move { app.call(Scope::lifespan(), inbound, outbound).await });

    if to_app.send(Message::LifespanStartup).await.is_err() {
        return Ok(unsupported(task).await);
    }

    match from_app.recv().await {
        Some(Message::LifespanStartupComplete) => {
            logger::log_debug("Lifespan startup complete");
            Ok(Some(Lifespan {
                to_app,
                from_app,
                task,
            }))
        }
        Some(Message::LifespanStartupFailed { message }) => {
            task.abort();
            Err(DevError::LifespanFailed(message))
        }
        Some(other) => {
            logger::log_warning(&format!(
                "Unexpected '{}' during lifespan startup; continuing without lifespan",
                other.kind()
            ));
            task.abort();
            Ok(None)
        }
        None => Ok(unsupported(task).await),
    }
}

async fn unsupported(task: JoinHandle<Result<(), AppError>>) -> Option<Lifespan> {
    match task.await {
        Ok(Err(e)) => logger::log_debug(&format!("Lifespan unsupported: {e}")),
        Err(e) => logger::log_debug(&format!("Lifespan task failed: {e}")),
        Ok(Ok(())) => logger::log_debug("Lifespan returned without answering startup"),
    }
    None
}

impl Lifespan {
    /// Send `lifespan.shutdown` and wait for the answer, bounded by a
    /// timeout. Failures are logged, never fatal.
    pub async fn shutdown(mut self) {
        if self.to_app.send(Message::LifespanShutdown).await.is_err() {
            logger::log_debug("Lifespan connection closed before shutdown");
            return;
        }

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.from_app.recv()).await {
            Ok(Some(Message::LifespanShutdownComplete)) => {
                logger::log_debug("Lifespan shutdown complete");
            }
            Ok(Some(Message::LifespanShutdownFailed { message })) => {
                logger::log_error(&format!("Lifespan shutdown failed: {message}"));
            }
            Ok(Some(other)) => logger::log_warning(&format!(
                "Unexpected '{}' during lifespan shutdown",
                other.kind()
            )),
            Ok(None) => logger::log_debug("Lifespan connection closed during shutdown"),
            Err(_) => logger::log_warning("Lifespan shutdown timed out"),
        }

        drop(self.to_app);
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut self.task).await.is_err() {
            self.task.abort();
        }
    }
}
