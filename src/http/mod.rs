//! HTTP protocol layer module
//!
//! Content types and the host server's own response builders.

pub mod mime;
pub mod response;

// Re-export commonly used types
pub use response::{build_413_response, build_500_response, build_response};
