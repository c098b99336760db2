//! Protocol adapters
//!
//! Each adapter wraps one detected application and puts prefix stripping and
//! static file serving in front of it.

pub mod asynchronous;
pub mod sync;

pub use asynchronous::AsyncAdapter;
pub use sync::SyncAdapter;

use crate::app::Convention;
use crate::prefix::RoutePrefix;
use crate::static_files::StaticFiles;
use std::sync::Arc;

/// The adapter serving requests, by detected convention
#[derive(Clone)]
pub enum Dispatch {
    Sync(Arc<SyncAdapter>),
    Async(Arc<AsyncAdapter>),
}

impl Dispatch {
    /// Wrap a determined convention. Returns `None` for `Undetermined`.
    pub fn wrap(convention: Convention, statics: StaticFiles, prefix: Arc<RoutePrefix>) -> Option<Self> {
        match convention {
            Convention::Synchronous(app) => {
                Some(Self::Sync(Arc::new(SyncAdapter::new(app, statics, prefix))))
            }
            Convention::Asynchronous(app) => {
                Some(Self::Async(Arc::new(AsyncAdapter::new(app, statics, prefix))))
            }
            Convention::Undetermined => None,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sync(_) => "sync",
            Self::Async(_) => "async",
        }
    }
}
