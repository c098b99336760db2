//! Error taxonomy
//!
//! `DevError` covers the fatal startup conditions: every variant terminates the
//! process with a non-zero status. `AppError` is what a wrapped application
//! raises; it passes through the adapters untouched and is only turned into a
//! 500 by the host server.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DevError {
    #[error("Could not load module '{module}': no such entrypoint module")]
    ModuleNotFound { module: String },

    #[error(
        "Missing 'app' or 'application' in module '{module}'. \
         Define `app = ...` or `application = ...` in your entrypoint."
    )]
    MissingApp { module: String },

    #[error("Attribute '{attr}' not found in module '{module}'")]
    MissingAttribute { module: String, attr: String },

    #[error(
        "Could not determine the application interface for '{entry}'\n\
         Expected either:\n  \
         - An async app: async callable(scope, receive, send)\n  \
         - A sync app: callable(environ, start_response)"
    )]
    UndeterminedConvention { entry: String },

    #[error("PORT environment variable is required.")]
    MissingPort,

    #[error("Invalid address '{addr}': {reason}")]
    InvalidAddress { addr: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Lifespan startup failed: {0}")]
    LifespanFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DevError {
    /// Process exit status for this failure
    pub const fn exit_code(&self) -> i32 {
        1
    }
}

/// Error raised by a wrapped application
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("application error: {0}")]
    Raised(String),

    #[error("channel closed before the message could be delivered")]
    ChannelClosed,

    #[error("unexpected message: expected {expected}, got {got}")]
    UnexpectedMessage { expected: &'static str, got: String },
}

impl AppError {
    pub fn raised(message: impl Into<String>) -> Self {
        Self::Raised(message.into())
    }
}
