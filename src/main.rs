use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use devroute::adapter::Dispatch;
use devroute::app::{detect, AsyncApp};
use devroute::config::{AppState, Config, DEFAULT_CONFIG_PATH};
use devroute::server::{self, lifespan};
use devroute::static_files::StaticFiles;
use devroute::{demo, logger, DevError};

/// Local development router
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Config file path, without extension
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Entrypoint as `module` or `module:attribute`
    #[arg(short, long)]
    entry: Option<String>,

    /// Port to listen on (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Directory static files are served from
    #[arg(long)]
    static_dir: Option<PathBuf>,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if let Some(entry) = self.entry {
            config.app.entry = entry;
        }
        if let Some(port) = self.port {
            config.server.port = Some(port);
        }
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(dir) = self.static_dir {
            config.static_files.dir = dir.to_string_lossy().into_owned();
        }
    }
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logger::fatal(&e);
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        }
    }
}

fn run(cli: Cli) -> Result<(), DevError> {
    let mut cfg = Config::load_from(&cli.config)?;
    cli.apply(&mut cfg);
    logger::init(&cfg.logging);

    let loaded = demo::registry().load(&cfg.app.entry)?;
    let entry = loaded.label();
    let convention = detect(loaded.object).determined(&entry)?;
    let addr = cfg.get_socket_addr()?;

    let prefix = Arc::new(cfg.route_prefix());
    let statics = StaticFiles::new(&cfg.static_files.dir);
    let dispatch = Dispatch::wrap(convention, statics, Arc::clone(&prefix))
        .ok_or_else(|| DevError::UndeterminedConvention {
            entry: entry.clone(),
        })?;

    let state = Arc::new(AppState::new(cfg, dispatch, prefix, entry));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let local = tokio::task::LocalSet::new();
    local.block_on(&runtime, async_main(addr, state))
}

async fn async_main(addr: std::net::SocketAddr, state: Arc<AppState>) -> Result<(), DevError> {
    let lifespan = match &state.dispatch {
        Dispatch::Async(adapter) => {
            let app: Arc<dyn AsyncApp> = adapter.clone();
            lifespan::startup(app).await?
        }
        Dispatch::Sync(_) => None,
    };

    let listener = server::create_listener(addr)?;
    let bound = listener.local_addr()?;
    logger::log_server_start(
        &bound,
        &state.entry,
        state.dispatch.name(),
        &state.config.static_files.dir,
    );
    logger::log_route_prefix(state.prefix.as_str());

    server::serve(listener, Arc::clone(&state), server::shutdown_signal()).await;

    if let Some(lifespan) = lifespan {
        lifespan.shutdown().await;
    }
    Ok(())
}
