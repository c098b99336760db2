//! devroute: local development router
//!
//! Serves one application behind a static file directory and an optional
//! route prefix, whichever of the two calling conventions the application
//! speaks.

pub mod adapter;
pub mod app;
pub mod config;
pub mod demo;
pub mod error;
pub mod http;
pub mod logger;
pub mod prefix;
pub mod server;
pub mod static_files;

pub use error::{AppError, DevError};
