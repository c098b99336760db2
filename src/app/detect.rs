//! Calling convention detection
//!
//! Entrypoints come with no interface declaration, so the convention is read
//! off their shape: a declared async form wins, otherwise a coroutine taking
//! three required positional parameters is asynchronous and anything taking
//! two is synchronous. Everything else is undetermined, which is fatal.

use super::entrypoint::Entrypoint;
use super::environ::SyncApp;
use super::scope::AsyncApp;
use crate::error::DevError;
use crate::logger;
use std::fmt;
use std::sync::Arc;

pub enum Convention {
    Synchronous(Arc<dyn SyncApp>),
    Asynchronous(Arc<dyn AsyncApp>),
    Undetermined,
}

impl Convention {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Synchronous(_) => "sync",
            Self::Asynchronous(_) => "async",
            Self::Undetermined => "undetermined",
        }
    }

    /// Turn an undetermined result into the fatal configuration error for
    /// `entry`.
    pub fn determined(self, entry: &str) -> Result<Self, DevError> {
        match self {
            Self::Undetermined => Err(DevError::UndeterminedConvention {
                entry: entry.to_string(),
            }),
            other => Ok(other),
        }
    }
}

impl fmt::Debug for Convention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Convention::{}", self.name())
    }
}

/// Classify `object` and bind it to the matching contract.
pub fn detect(object: Arc<dyn Entrypoint>) -> Convention {
    if let Some(delegate) = object.async_form() {
        return Convention::Asynchronous(delegate);
    }

    let is_async = object.is_coroutine()
        || object
            .call_method()
            .is_some_and(|method| method.is_coroutine());

    let required = match object.signature() {
        Ok(signature) => Some(signature.required_positional()),
        Err(e) => {
            logger::log_debug(&format!("Signature introspection failed: {e}"));
            None
        }
    };

    match required {
        Some(3) if is_async => object
            .as_async()
            .map_or(Convention::Undetermined, Convention::Asynchronous),
        Some(2) => object
            .as_sync()
            .map_or(Convention::Undetermined, Convention::Synchronous),
        _ => Convention::Undetermined,
    }
}
