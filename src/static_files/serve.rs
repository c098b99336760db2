//! Static file serving
//!
//! `StaticFiles` answers GET/HEAD for regular files under its directory and
//! 404 for everything else. It speaks both calling conventions so each
//! adapter can delegate to it directly.

use super::resolve::resolve;
use crate::app::environ::{body_from, empty_body, BodyIter, Environ, StartResponse, SyncApp};
use crate::app::scope::{AsyncApp, Inbound, Message, Outbound, Scope};
use crate::error::AppError;
use crate::http::mime;
use async_trait::async_trait;
use hyper::body::Bytes;
use hyper::StatusCode;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// File serving `path`, if there is one inside the root
    pub fn lookup(&self, path: &str) -> Option<PathBuf> {
        resolve(path, &self.root)
    }
}

fn is_servable_method(method: &str) -> bool {
    method.eq_ignore_ascii_case("GET") || method.eq_ignore_ascii_case("HEAD")
}

fn not_found_headers() -> Vec<(String, String)> {
    vec![(
        "Content-Type".to_string(),
        "text/plain; charset=utf-8".to_string(),
    )]
}

/// Content type follows the requested name, not a symlink's target.
fn file_headers(requested: &str, len: u64) -> Vec<(String, String)> {
    vec![
        (
            "Content-Type".to_string(),
            mime::content_type_for(Path::new(requested)).to_string(),
        ),
        ("Content-Length".to_string(), len.to_string()),
    ]
}

/// Lazily reads an open file in fixed-size chunks. The file is closed when
/// the iterator is dropped.
struct FileChunks {
    file: File,
}

impl Iterator for FileChunks {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        let mut buf = vec![0; CHUNK_SIZE];
        match self.file.read(&mut buf) {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some(Bytes::from(buf))
            }
            Err(e) => {
                crate::logger::log_error(&format!("Static file read failed: {e}"));
                None
            }
        }
    }
}

impl SyncApp for StaticFiles {
    fn call(
        &self,
        environ: &mut Environ,
        start_response: &mut dyn StartResponse,
    ) -> Result<BodyIter, AppError> {
        let not_found = |start_response: &mut dyn StartResponse| {
            start_response.start(StatusCode::NOT_FOUND, not_found_headers());
            body_from(vec![Bytes::from_static(b"Not Found")])
        };

        if !is_servable_method(environ.method()) {
            return Ok(not_found(start_response));
        }
        let Some(path) = self.lookup(environ.path_info()) else {
            return Ok(not_found(start_response));
        };

        let opened = File::open(&path).and_then(|file| {
            let len = file.metadata()?.len();
            Ok((file, len))
        });
        let Ok((file, len)) = opened else {
            return Ok(not_found(start_response));
        };

        start_response.start(StatusCode::OK, file_headers(environ.path_info(), len));
        if environ.method().eq_ignore_ascii_case("HEAD") {
            return Ok(empty_body());
        }
        Ok(Box::new(FileChunks { file }))
    }
}

#[async_trait]
impl AsyncApp for StaticFiles {
    async fn call(&self, scope: Scope, _receive: Inbound, send: Outbound) -> Result<(), AppError> {
        if !scope.is_http() {
            return Err(AppError::raised(format!(
                "static files cannot serve '{}' connections",
                scope.kind.as_str()
            )));
        }

        if !is_servable_method(&scope.method) {
            let mut headers = not_found_headers();
            headers.push(("Allow".to_string(), "GET, HEAD".to_string()));
            return send_whole(&send, StatusCode::METHOD_NOT_ALLOWED, headers, "Method Not Allowed").await;
        }

        let Some(path) = self.lookup(&scope.path) else {
            return send_whole(&send, StatusCode::NOT_FOUND, not_found_headers(), "Not Found").await;
        };

        // Owned by this call: dropped, and the descriptor closed, on every
        // return path and on cancellation.
        let Ok(mut file) = tokio::fs::File::open(&path).await else {
            return send_whole(&send, StatusCode::NOT_FOUND, not_found_headers(), "Not Found").await;
        };
        let len = match file.metadata().await {
            Ok(metadata) => metadata.len(),
            Err(_) => {
                return send_whole(&send, StatusCode::NOT_FOUND, not_found_headers(), "Not Found")
                    .await
            }
        };

        send.send(Message::HttpResponseStart {
            status: StatusCode::OK.as_u16(),
            headers: file_headers(&scope.path, len),
        })
        .await?;

        if scope.method.eq_ignore_ascii_case("HEAD") {
            return send
                .send(Message::HttpResponseBody {
                    body: Bytes::new(),
                    more_body: false,
                })
                .await;
        }

        let mut buf = vec![0; CHUNK_SIZE];
        loop {
            let n = file
                .read(&mut buf)
                .await
                .map_err(|e| AppError::raised(format!("static file read failed: {e}")))?;
            if n == 0 {
                break;
            }
            send.send(Message::HttpResponseBody {
                body: Bytes::copy_from_slice(&buf[..n]),
                more_body: true,
            })
            .await?;
        }

        send.send(Message::HttpResponseBody {
            body: Bytes::new(),
            more_body: false,
        })
        .await
    }
}

async fn send_whole(
    send: &Outbound,
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: &'static str,
) -> Result<(), AppError> {
    send.send(Message::HttpResponseStart {
        status: status.as_u16(),
        headers,
    })
    .await?;
    send.send(Message::HttpResponseBody {
        body: Bytes::from_static(body.as_bytes()),
        more_body: false,
    })
    .await
}
