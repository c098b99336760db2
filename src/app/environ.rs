//! Synchronous calling convention
//!
//! An application receives a CGI-style [`Environ`] plus a [`StartResponse`]
//! sink, and returns the body as an iterator of byte chunks.

use crate::error::AppError;
use hyper::body::Bytes;
use hyper::StatusCode;
use std::collections::BTreeMap;
use std::io::{Cursor, Read};

/// Response body produced by a synchronous application
pub type BodyIter = Box<dyn Iterator<Item = Bytes> + Send>;

pub fn body_from(chunks: Vec<Bytes>) -> BodyIter {
    Box::new(chunks.into_iter())
}

pub fn empty_body() -> BodyIter {
    Box::new(std::iter::empty())
}

/// A synchronous application: `(environ, start_response) -> body`
pub trait SyncApp: Send + Sync {
    fn call(
        &self,
        environ: &mut Environ,
        start_response: &mut dyn StartResponse,
    ) -> Result<BodyIter, AppError>;
}

/// Response-start capability handed to a synchronous application
pub trait StartResponse {
    /// Begin the response. Must be called once before any body is produced.
    fn start(&mut self, status: StatusCode, headers: Vec<(String, String)>);

    /// Legacy imperative writer, emitted ahead of the returned body.
    fn write(&mut self, chunk: Bytes);
}

/// Request environment of one synchronous call.
///
/// Keys follow CGI naming. `SCRIPT_NAME` is the routing root already consumed
/// upstream; `PATH_INFO` is the part the application routes on.
#[derive(Debug, Default)]
pub struct Environ {
    vars: BTreeMap<String, String>,
    input: Cursor<Bytes>,
}

pub const REQUEST_METHOD: &str = "REQUEST_METHOD";
pub const PATH_INFO: &str = "PATH_INFO";
pub const SCRIPT_NAME: &str = "SCRIPT_NAME";
pub const QUERY_STRING: &str = "QUERY_STRING";
pub const SERVER_NAME: &str = "SERVER_NAME";
pub const SERVER_PORT: &str = "SERVER_PORT";
pub const SERVER_PROTOCOL: &str = "SERVER_PROTOCOL";
pub const REMOTE_ADDR: &str = "REMOTE_ADDR";
pub const CONTENT_TYPE: &str = "CONTENT_TYPE";
pub const CONTENT_LENGTH: &str = "CONTENT_LENGTH";

impl Environ {
    pub fn new(method: &str, path_info: &str) -> Self {
        let mut environ = Self::default();
        environ.set(REQUEST_METHOD, method);
        environ.set(PATH_INFO, path_info);
        environ.set(SCRIPT_NAME, "");
        environ.set(QUERY_STRING, "");
        environ
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.vars.insert(key.to_string(), value.into());
    }

    pub fn method(&self) -> &str {
        self.get(REQUEST_METHOD).unwrap_or("GET")
    }

    /// `PATH_INFO`, with a missing or empty value read as `/`
    pub fn path_info(&self) -> &str {
        match self.get(PATH_INFO) {
            Some(p) if !p.is_empty() => p,
            _ => "/",
        }
    }

    pub fn script_name(&self) -> &str {
        self.get(SCRIPT_NAME).unwrap_or_default()
    }

    /// Store a request header under its `HTTP_*` key.
    ///
    /// `Content-Type` and `Content-Length` use their bare CGI names. Repeated
    /// headers are joined with `,`.
    pub fn insert_header(&mut self, name: &str, value: &str) {
        let key = match name.to_ascii_lowercase().as_str() {
            "content-type" => CONTENT_TYPE.to_string(),
            "content-length" => CONTENT_LENGTH.to_string(),
            other => format!("HTTP_{}", other.to_ascii_uppercase().replace('-', "_")),
        };
        match self.vars.get_mut(&key) {
            Some(existing) => {
                existing.push(',');
                existing.push_str(value);
            }
            None => {
                self.vars.insert(key, value.to_string());
            }
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        let key = format!("HTTP_{}", name.to_ascii_uppercase().replace('-', "_"));
        self.get(&key)
    }

    pub fn with_input(mut self, body: Bytes) -> Self {
        self.input = Cursor::new(body);
        self
    }

    /// Body reader
    pub fn input(&mut self) -> &mut impl Read {
        &mut self.input
    }
}
