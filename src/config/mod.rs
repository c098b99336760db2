// Configuration module entry point
// Loads layered configuration and holds the shared serving state

mod state;
mod types;

use std::collections::HashMap;
use std::net::SocketAddr;

use crate::error::DevError;
use crate::prefix::RoutePrefix;

// Re-export public types
pub use state::AppState;
pub use types::{
    AppConfig, Config, HttpConfig, LoggingConfig, PerformanceConfig, RoutePrefixConfig,
    ServerConfig, StaticFilesConfig,
};

/// Default config file, looked up without extension
pub const DEFAULT_CONFIG_PATH: &str = "devroute";

/// Platform variables read on top of the file and `DEVROUTE__*` settings
const PORT_VAR: &str = "PORT";
const PREFIX_VAR: &str = "SERVICE_ROUTE_PREFIX";
const PREFIX_STRIP_VAR: &str = "SERVICE_ROUTE_PREFIX_STRIP";

impl Config {
    /// Load configuration from specified file path (without extension)
    /// and the process environment.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::load_with_env(config_path, &vars)
    }

    /// Load configuration using `vars` in place of the process environment
    pub fn load_with_env(
        config_path: &str,
        vars: &HashMap<String, String>,
    ) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("DEVROUTE")
                    .separator("__")
                    .source(Some(vars.clone())),
            )
            .set_default("server.host", "127.0.0.1")?
            .set_default("app.entry", "main")?
            .set_default("static_files.dir", "public")?
            .set_default("route_prefix.strip", false)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "common")?
            .set_default("http.server_name", "devroute")?
            .set_default("http.max_body_size", 10_485_760)? // 10MB
            .set_default("performance.keep_alive_timeout", 5)?
            .set_default("performance.read_timeout", 60)?
            .set_default("performance.write_timeout", 60)?
            .set_override_option(
                "server.port",
                vars.get(PORT_VAR).filter(|v| !v.is_empty()).cloned(),
            )?
            .set_override_option("route_prefix.prefix", vars.get(PREFIX_VAR).cloned())?
            .set_override_option(
                "route_prefix.strip",
                vars.get(PREFIX_STRIP_VAR).map(|v| is_truthy(v)),
            )?
            .build()?;

        settings.try_deserialize()
    }

    /// Port to bind. Missing port is fatal.
    pub fn port(&self) -> Result<u16, DevError> {
        self.server.port.ok_or(DevError::MissingPort)
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, DevError> {
        let addr = format!("{}:{}", self.server.host, self.port()?);
        addr.parse().map_err(|e| DevError::InvalidAddress {
            reason: format!("{e}"),
            addr,
        })
    }

    /// The normalized prefix, empty unless stripping is enabled
    pub fn route_prefix(&self) -> RoutePrefix {
        RoutePrefix::from_config(self.route_prefix.prefix.as_deref(), self.route_prefix.strip)
    }
}

/// `1` and `true` (any case) enable a flag; anything else disables it
pub fn is_truthy(raw: &str) -> bool {
    raw == "1" || raw.eq_ignore_ascii_case("true")
}
