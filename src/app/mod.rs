//! Application contracts and entrypoint handling
//!
//! - `environ`: synchronous contract
//! - `scope`: asynchronous contract
//! - `entrypoint` / `signature`: what a loaded entrypoint exposes
//! - `detect`: calling convention detection
//! - `registry`: entry string lookup

pub mod detect;
pub mod entrypoint;
pub mod environ;
pub mod registry;
pub mod scope;
pub mod signature;

pub use detect::{detect, Convention};
pub use entrypoint::{AsyncHandler, Entrypoint, Framework, Instance, SyncHandler};
pub use environ::{body_from, empty_body, BodyIter, Environ, StartResponse, SyncApp};
pub use registry::{LoadedEntry, Module, Registry};
pub use scope::{AsyncApp, Channel, Inbound, Message, Outbound, Scope, ScopeKind};
pub use signature::{Param, ParamKind, Signature, SignatureError};
