//! Binary entry point: CLI -> Config -> Store -> Dispatcher -> event loop.
//!
//! Mirrors `original_source/src/server.cc`'s `main`: parse argv, open the
//! store, bind the listener, log readiness, run forever. Multi-crate
//! workspace wiring follows `flux-network`'s sibling binaries in spirit,
//! one small `main.rs` that composes library crates rather than containing
//! logic itself.

mod cli;
mod config;
mod error;
mod logging;

use std::process::ExitCode;
use std::sync::Arc;

use config::Config;
use error::ServerError;
use resp_network::{Dispatcher, DispatcherConfig, ExecutionMode, WorkerPool};
use resp_store::Store;
use tracing::{error, warn};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let parsed = match cli::parse(args) {
        cli::Outcome::Run(args) => args,
        cli::Outcome::Exit(0) => return ExitCode::SUCCESS,
        cli::Outcome::Exit(code) => return ExitCode::from(code as u8),
    };

    let _logger_guard = logging::init();
    let config = Config::from_args(parsed);

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "fatal startup error");
            ExitCode::FAILURE
        }
    }
}

fn run(config: Config) -> Result<(), ServerError> {
    // The '#' tier (spec.md §6.3's "notable") marks milestones an operator
    // scanning logs should never miss, the way `original_source`'s "Server
    // started" banner does.
    error!(
        "Server started, resp-server version {}, sled version 0.34, mio version 1.1.1",
        env!("CARGO_PKG_VERSION")
    );

    let store = open_store(&config)?;
    let store_for_handler = Arc::clone(&store);
    let handler: resp_network::Handler =
        Arc::new(move |args, out| resp_commands::dispatch(store_for_handler.as_ref(), args, out));

    let mode = if config.inmem {
        ExecutionMode::Inline(handler)
    } else {
        let workers = std::thread::available_parallelism().map(std::num::NonZeroUsize::get).unwrap_or(4);
        ExecutionMode::Pooled(WorkerPool::new(workers, handler))
    };

    let dispatcher_config = DispatcherConfig { bind_addr: config.bind_addr, keepalive: config.keepalive };
    let mut dispatcher = Dispatcher::bind(dispatcher_config, mode)
        .map_err(|source| ServerError::Bind { addr: config.bind_addr, source })?;

    // The '*' tier (spec.md §6.3's "startup") marks the single "ready for
    // traffic" line, the way `original_source`'s second banner line does.
    warn!(port = config.bind_addr.port(), "The server is now ready to accept connections");

    dispatcher.run().map_err(ServerError::EventLoop)
}

fn open_store(config: &Config) -> Result<Arc<dyn Store>, ServerError> {
    if config.inmem {
        return Ok(Arc::new(resp_store::MemStore::new()));
    }
    resp_store::SledStore::open(&config.data_dir, config.sync, config.readonly)
        .map(|s| Arc::new(s) as Arc<dyn Store>)
        .map_err(|source| ServerError::OpenStore { path: config.data_dir.display().to_string(), source })
}
