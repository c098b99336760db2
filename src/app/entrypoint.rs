//! Entrypoint objects
//!
//! A loaded entrypoint is opaque to the router: it only exposes what can be
//! introspected (its declared signature, whether it is a coroutine, an
//! optional declared async form) and binding hooks the detector calls once it
//! has classified the object.

use super::environ::{BodyIter, Environ, StartResponse, SyncApp};
use super::scope::{AsyncApp, Inbound, Outbound, Scope};
use super::signature::{Signature, SignatureError};
use crate::error::AppError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;

pub trait Entrypoint: Send + Sync {
    /// Declared call signature; an error means it cannot be introspected.
    fn signature(&self) -> Result<Signature, SignatureError>;

    /// Whether calling the object itself produces a future
    fn is_coroutine(&self) -> bool {
        false
    }

    /// The object's invoke method, when it is an instance rather than a
    /// plain function.
    fn call_method(&self) -> Option<&dyn Entrypoint> {
        None
    }

    /// Explicitly declared asynchronous form. Takes precedence over the
    /// structural checks.
    fn async_form(&self) -> Option<Arc<dyn AsyncApp>> {
        None
    }

    fn as_sync(self: Arc<Self>) -> Option<Arc<dyn SyncApp>> {
        None
    }

    fn as_async(self: Arc<Self>) -> Option<Arc<dyn AsyncApp>> {
        None
    }
}

/// Plain synchronous function entrypoint
pub struct SyncHandler<F> {
    func: F,
    signature: Signature,
}

impl<F> SyncHandler<F>
where
    F: Fn(&mut Environ, &mut dyn StartResponse) -> Result<BodyIter, AppError>
        + Send
        + Sync
        + 'static,
{
    pub fn new(func: F) -> Self {
        Self {
            func,
            signature: Signature::positional(&["environ", "start_response"]),
        }
    }

    #[must_use]
    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }
}

impl<F> SyncApp for SyncHandler<F>
where
    F: Fn(&mut Environ, &mut dyn StartResponse) -> Result<BodyIter, AppError>
        + Send
        + Sync
        + 'static,
{
    fn call(
        &self,
        environ: &mut Environ,
        start_response: &mut dyn StartResponse,
    ) -> Result<BodyIter, AppError> {
        (self.func)(environ, start_response)
    }
}

impl<F> Entrypoint for SyncHandler<F>
where
    F: Fn(&mut Environ, &mut dyn StartResponse) -> Result<BodyIter, AppError>
        + Send
        + Sync
        + 'static,
{
    fn signature(&self) -> Result<Signature, SignatureError> {
        Ok(self.signature.clone())
    }

    fn as_sync(self: Arc<Self>) -> Option<Arc<dyn SyncApp>> {
        let app: Arc<dyn SyncApp> = self;
        Some(app)
    }
}

/// Coroutine function entrypoint
pub struct AsyncHandler<F> {
    func: F,
    signature: Signature,
}

impl<F> AsyncHandler<F>
where
    F: Fn(Scope, Inbound, Outbound) -> BoxFuture<'static, Result<(), AppError>>
        + Send
        + Sync
        + 'static,
{
    pub fn new(func: F) -> Self {
        Self {
            func,
            signature: Signature::positional(&["scope", "receive", "send"]),
        }
    }

    #[must_use]
    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }
}

#[async_trait]
impl<F> AsyncApp for AsyncHandler<F>
where
    F: Fn(Scope, Inbound, Outbound) -> BoxFuture<'static, Result<(), AppError>>
        + Send
        + Sync
        + 'static,
{
    async fn call(&self, scope: Scope, receive: Inbound, send: Outbound) -> Result<(), AppError> {
        (self.func)(scope, receive, send).await
    }
}

impl<F> Entrypoint for AsyncHandler<F>
where
    F: Fn(Scope, Inbound, Outbound) -> BoxFuture<'static, Result<(), AppError>>
        + Send
        + Sync
        + 'static,
{
    fn signature(&self) -> Result<Signature, SignatureError> {
        Ok(self.signature.clone())
    }

    fn is_coroutine(&self) -> bool {
        true
    }

    fn as_async(self: Arc<Self>) -> Option<Arc<dyn AsyncApp>> {
        let app: Arc<dyn AsyncApp> = self;
        Some(app)
    }
}

/// Object instance whose behavior lives in its invoke method.
///
/// The instance itself is never a coroutine; the detector has to look at
/// [`Entrypoint::call_method`] to find out.
pub struct Instance {
    call: Arc<dyn Entrypoint>,
}

impl Instance {
    pub fn new(call: Arc<dyn Entrypoint>) -> Self {
        Self { call }
    }
}

impl Entrypoint for Instance {
    fn signature(&self) -> Result<Signature, SignatureError> {
        self.call.signature()
    }

    fn call_method(&self) -> Option<&dyn Entrypoint> {
        Some(self.call.as_ref())
    }

    fn as_sync(self: Arc<Self>) -> Option<Arc<dyn SyncApp>> {
        Arc::clone(&self.call).as_sync()
    }

    fn as_async(self: Arc<Self>) -> Option<Arc<dyn AsyncApp>> {
        Arc::clone(&self.call).as_async()
    }
}

/// Framework object that declares its own asynchronous form.
///
/// Its own signature can be anything; detection goes straight to the
/// declared form.
pub struct Framework {
    name: String,
    signature: Option<Signature>,
    async_form: Arc<dyn AsyncApp>,
}

impl Framework {
    pub fn new(name: &str, async_form: Arc<dyn AsyncApp>) -> Self {
        Self {
            name: name.to_string(),
            signature: None,
            async_form,
        }
    }

    #[must_use]
    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = Some(signature);
        self
    }
}

impl Entrypoint for Framework {
    fn signature(&self) -> Result<Signature, SignatureError> {
        self.signature
            .clone()
            .ok_or_else(|| SignatureError(self.name.clone()))
    }

    fn async_form(&self) -> Option<Arc<dyn AsyncApp>> {
        Some(Arc::clone(&self.async_form))
    }
}
