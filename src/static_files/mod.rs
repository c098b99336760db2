//! Static files
//!
//! - `resolve`: contained, canonicalized lookup of a request path
//! - `serve`: the serving capability both adapters delegate to

pub mod resolve;
pub mod serve;

pub use resolve::resolve;
pub use serve::StaticFiles;
