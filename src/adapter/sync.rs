//! Synchronous adapter
//!
//! Strips the route prefix from `PATH_INFO`, tries the static directory and
//! falls back to the wrapped application.

use crate::app::environ::{BodyIter, Environ, StartResponse, SyncApp, PATH_INFO, SCRIPT_NAME};
use crate::error::AppError;
use crate::prefix::{extend_root, RoutePrefix};
use crate::static_files::StaticFiles;
use hyper::body::Bytes;
use hyper::StatusCode;
use std::sync::Arc;

pub struct SyncAdapter {
    app: Arc<dyn SyncApp>,
    statics: StaticFiles,
    prefix: Arc<RoutePrefix>,
}

impl SyncAdapter {
    pub fn new(app: Arc<dyn SyncApp>, statics: StaticFiles, prefix: Arc<RoutePrefix>) -> Self {
        Self {
            app,
            statics,
            prefix,
        }
    }

    /// Run the static handler against a capturing sink. Only a 200 is
    /// forwarded to the real sink; anything else is discarded so the wrapped
    /// application can emit its own response.
    fn try_static(
        &self,
        environ: &mut Environ,
        start_response: &mut dyn StartResponse,
    ) -> Option<BodyIter> {
        let method = environ.method();
        if !(method.eq_ignore_ascii_case("GET") || method.eq_ignore_ascii_case("HEAD")) {
            return None;
        }

        let mut captured = CapturedStart::default();
        let body = SyncApp::call(&self.statics, environ, &mut captured).ok()?;

        match captured.status {
            Some(StatusCode::OK) => {
                start_response.start(StatusCode::OK, captured.headers);
                for chunk in captured.written {
                    start_response.write(chunk);
                }
                Some(body)
            }
            _ => None,
        }
    }
}

/// Rewrite `PATH_INFO` and extend `SCRIPT_NAME` in place
pub fn apply_prefix(environ: &mut Environ, prefix: &RoutePrefix) {
    let stripped = prefix.strip(environ.path_info());
    environ.set(PATH_INFO, stripped.path);
    if stripped.matched.is_empty() {
        return;
    }
    let root = extend_root(environ.script_name(), &stripped.matched);
    environ.set(SCRIPT_NAME, root);
}

impl SyncApp for SyncAdapter {
    fn call(
        &self,
        environ: &mut Environ,
        start_response: &mut dyn StartResponse,
    ) -> Result<BodyIter, AppError> {
        apply_prefix(environ, &self.prefix);

        if let Some(body) = self.try_static(environ, start_response) {
            return Ok(body);
        }

        self.app.call(environ, start_response)
    }
}

/// Start-response sink that records instead of emitting
#[derive(Default)]
struct CapturedStart {
    status: Option<StatusCode>,
    headers: Vec<(String, String)>,
    written: Vec<Bytes>,
}

impl StartResponse for CapturedStart {
    fn start(&mut self, status: StatusCode, headers: Vec<(String, String)>) {
        self.status = Some(status);
        self.headers = headers;
    }

    fn write(&mut self, chunk: Bytes) {
        self.written.push(chunk);
    }
}
