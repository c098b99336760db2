//! Asynchronous calling convention
//!
//! An application receives a connection [`Scope`] and two message channels:
//! [`Inbound`] to receive request and lifespan events, [`Outbound`] to send
//! response and lifespan replies. Each call owns its pair exclusively.

use crate::error::AppError;
use async_trait::async_trait;
use hyper::body::Bytes;
use tokio::sync::mpsc;

/// An asynchronous application: `async (scope, receive, send)`
#[async_trait]
pub trait AsyncApp: Send + Sync {
    async fn call(&self, scope: Scope, receive: Inbound, send: Outbound) -> Result<(), AppError>;
}

/// Kind of connection a scope describes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeKind {
    /// One request/response exchange
    Http,
    /// Startup/shutdown handshake, carries no path
    Lifespan,
    Other(String),
}

impl ScopeKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Http => "http",
            Self::Lifespan => "lifespan",
            Self::Other(kind) => kind,
        }
    }
}

/// Connection metadata. Cloning gives the shallow copy the adapters rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub kind: ScopeKind,
    pub http_version: String,
    pub method: String,
    pub scheme: String,
    /// Percent-decoded path
    pub path: String,
    /// Path exactly as received on the wire
    pub raw_path: Vec<u8>,
    pub query_string: Vec<u8>,
    /// Routing root consumed by upstream layers
    pub root_path: String,
    pub headers: Vec<(Bytes, Bytes)>,
    pub client: Option<(String, u16)>,
    pub server: Option<(String, u16)>,
}

impl Scope {
    pub fn http(method: &str, path: &str) -> Self {
        Self {
            kind: ScopeKind::Http,
            http_version: "1.1".to_string(),
            method: method.to_string(),
            scheme: "http".to_string(),
            path: path.to_string(),
            raw_path: path.as_bytes().to_vec(),
            query_string: Vec::new(),
            root_path: String::new(),
            headers: Vec::new(),
            client: None,
            server: None,
        }
    }

    pub fn lifespan() -> Self {
        Self {
            kind: ScopeKind::Lifespan,
            http_version: String::new(),
            method: String::new(),
            scheme: String::new(),
            path: String::new(),
            raw_path: Vec::new(),
            query_string: Vec::new(),
            root_path: String::new(),
            headers: Vec::new(),
            client: None,
            server: None,
        }
    }

    pub fn is_http(&self) -> bool {
        self.kind == ScopeKind::Http
    }
}

/// Messages exchanged over [`Inbound`] and [`Outbound`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    HttpRequest { body: Bytes, more_body: bool },
    HttpDisconnect,
    HttpResponseStart { status: u16, headers: Vec<(String, String)> },
    HttpResponseBody { body: Bytes, more_body: bool },
    LifespanStartup,
    LifespanStartupComplete,
    LifespanStartupFailed { message: String },
    LifespanShutdown,
    LifespanShutdownComplete,
    LifespanShutdownFailed { message: String },
}

impl Message {
    /// Wire name of the message type
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::HttpRequest { .. } => "http.request",
            Self::HttpDisconnect => "http.disconnect",
            Self::HttpResponseStart { .. } => "http.response.start",
            Self::HttpResponseBody { .. } => "http.response.body",
            Self::LifespanStartup => "lifespan.startup",
            Self::LifespanStartupComplete => "lifespan.startup.complete",
            Self::LifespanStartupFailed { .. } => "lifespan.startup.failed",
            Self::LifespanShutdown => "lifespan.shutdown",
            Self::LifespanShutdownComplete => "lifespan.shutdown.complete",
            Self::LifespanShutdownFailed { .. } => "lifespan.shutdown.failed",
        }
    }
}

/// Receive side of a connection
#[derive(Debug)]
pub struct Inbound {
    rx: mpsc::Receiver<Message>,
}

impl Inbound {
    pub const fn new(rx: mpsc::Receiver<Message>) -> Self {
        Self { rx }
    }

    /// Next message. Once the peer side is gone this yields
    /// `http.disconnect` forever.
    pub async fn receive(&mut self) -> Message {
        self.rx.recv().await.unwrap_or(Message::HttpDisconnect)
    }
}

/// Send side of a connection
#[derive(Debug, Clone)]
pub struct Outbound {
    tx: mpsc::Sender<Message>,
}

impl Outbound {
    pub const fn new(tx: mpsc::Sender<Message>) -> Self {
        Self { tx }
    }

    pub async fn send(&self, message: Message) -> Result<(), AppError> {
        self.tx
            .send(message)
            .await
            .map_err(|_| AppError::ChannelClosed)
    }
}

/// A connected `(Inbound, Outbound)` pair plus the host ends of both channels
pub struct Channel {
    pub inbound: Inbound,
    pub outbound: Outbound,
    /// Host side: push messages the application will receive
    pub to_app: mpsc::Sender<Message>,
    /// Host side: messages the application sent
    pub from_app: mpsc::Receiver<Message>,
}

impl Channel {
    pub fn new(capacity: usize) -> Self {
        let (to_app, rx) = mpsc::channel(capacity);
        let (tx, from_app) = mpsc::channel(capacity);
        Self {
            inbound: Inbound::new(rx),
            outbound: Outbound::new(tx),
            to_app,
            from_app,
        }
    }
}
