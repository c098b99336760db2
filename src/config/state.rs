// Application state module
// Everything a connection needs, fixed before serving starts

use std::sync::Arc;

use super::types::Config;
use crate::adapter::Dispatch;
use crate::prefix::RoutePrefix;

/// Application state, shared read-only by all connections
pub struct AppState {
    pub config: Config,
    pub dispatch: Dispatch,
    pub prefix: Arc<RoutePrefix>,
    /// Entry label (`module:attr`) for diagnostics
    pub entry: String,
}

impl AppState {
    pub const fn new(
        config: Config,
        dispatch: Dispatch,
        prefix: Arc<RoutePrefix>,
        entry: String,
    ) -> Self {
        Self {
            config,
            dispatch,
            prefix,
            entry,
        }
    }

    pub const fn access_log(&self) -> bool {
        self.config.logging.access_log
    }
}
