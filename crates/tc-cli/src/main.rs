//! CLI entry point for tailcast.
//!
//! Tails a growing log file and streams every newly appended line to all
//! connected browsers as Server-Sent Events.
//!
//! # Usage
//!
//! ```bash
//! tailcast [OPTIONS]
//!
//! # Stream ./access.log on port 8000
//! tailcast
//!
//! # Stream another file on another port
//! tailcast -f /var/log/nginx/access.log -p 9000
//!
//! # Demo mode: write synthetic lines into the file while streaming it
//! tailcast --mock
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

mod generator;

use std::net::IpAddr;

use camino::Utf8PathBuf;
use clap::Parser;
use tc_broker::Broker;
use tc_core::{Config, ConfigError};
use tc_server::{AppState, ServerError};
use tc_watcher::FileWatcher;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Streams lines appended to a log file to browsers over Server-Sent Events.
///
/// Open `http://localhost:<port>/` for a demo page, or connect any
/// `EventSource` client to `/events/`.
#[derive(Debug, Parser)]
#[command(name = "tailcast", version, about, long_about = None)]
struct Cli {
    /// File to watch for appended lines.
    #[arg(short, long, env = "TAILCAST_FILE")]
    file: Option<Utf8PathBuf>,

    /// Port to serve on.
    #[arg(short, long, env = "TAILCAST_PORT")]
    port: Option<u16>,

    /// Address to bind.
    #[arg(long, env = "TAILCAST_BIND")]
    bind: Option<IpAddr>,

    /// How often the file is checked for growth, in milliseconds.
    #[arg(long, env = "TAILCAST_POLL_INTERVAL_MS")]
    poll_interval_ms: Option<u64>,

    /// JSON config file. Flags override its values.
    #[arg(long, env = "TAILCAST_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Append synthetic lines to the watched file, creating it if missing.
    #[arg(long)]
    mock: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long)]
    no_color: bool,
}

// =============================================================================
// INITIALIZATION FUNCTIONS
// =============================================================================

/// Initializes the tracing subscriber for logging.
///
/// Respects the `RUST_LOG` environment variable if set. Otherwise, uses
/// `debug` level if `--verbose` is set, or `info` level by default.
/// Noisy crates like `hyper` and `mio` are filtered to `warn` level.
fn init_tracing(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::new(format!("{level},hyper=warn,tower=warn,mio=warn"))
    });

    // Check if colors should be disabled (flag or NO_COLOR env var)
    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_ansi(use_ansi))
        .with(filter)
        .init();
}

/// Builds a [`Config`] from the optional config file and CLI overrides.
///
/// The watched file must exist unless `--mock` is set, in which case it is
/// created later.
fn build_config(cli: &Cli) -> Result<Config, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };

    if let Some(file) = &cli.file {
        config.file.clone_from(file);
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(poll_interval_ms) = cli.poll_interval_ms {
        config.watch.poll_interval_ms = poll_interval_ms;
    }

    config.validate()?;

    if !cli.mock && !config.file.exists() {
        return Err(ConfigError::MissingFile(config.file));
    }

    Ok(config)
}

// =============================================================================
// RUNNING THE SERVICE
// =============================================================================

/// Why the service stopped waiting.
enum Exit {
    /// Ctrl-C or SIGTERM.
    Signal,
    /// The HTTP server task ended on its own.
    Server(Result<Result<(), ServerError>, tokio::task::JoinError>),
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = sigterm.recv() => Ok(()),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}

/// Waits for a shutdown signal or for the server to stop.
///
/// A watcher that stops on its own is logged and the server keeps running:
/// connected clients stay connected but receive nothing further.
async fn wait_for_exit(
    server: &mut JoinHandle<Result<(), ServerError>>,
    watcher: &mut FileWatcher,
) -> Exit {
    let signal = shutdown_signal();
    tokio::pin!(signal);
    let path = watcher.path().to_owned();

    let mut watching = true;
    loop {
        tokio::select! {
            result = &mut signal => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for shutdown signal");
                }
                info!("Received shutdown signal, shutting down");
                return Exit::Signal;
            }
            result = &mut *server => return Exit::Server(result),
            result = watcher.stopped(), if watching => {
                watching = false;
                match result {
                    Ok(()) => warn!(path = %path, "File watcher stopped"),
                    Err(e) => error!(path = %path, error = %e, "File watcher failed"),
                }
            }
        }
    }
}

/// Runs the broker, watcher, optional generator and HTTP server until
/// shutdown.
async fn run(config: Config, mock: bool) -> color_eyre::Result<()> {
    if mock {
        generator::ensure_file(&config.file)?;
    }

    let (broker, broker_task) = Broker::start(&config.broker);
    let shutdown = CancellationToken::new();

    let mut watcher = FileWatcher::new(&config.file, &config.watch)?;
    watcher.subscribe(broker.clone())?;
    info!(path = %config.file, cursor = watcher.cursor(), "Watching file");

    let generator_task =
        mock.then(|| tokio::spawn(generator::run(config.file.clone(), shutdown.child_token())));

    let addr = config.server.socket_addr();
    let state = AppState::with_shutdown(broker.clone(), shutdown.clone());
    let mut server = tokio::spawn(tc_server::serve(addr, state));
    info!(port = addr.port(), "Server started");

    let exit = wait_for_exit(&mut server, &mut watcher).await;

    // Ends every open stream and stops the generator
    shutdown.cancel();

    let served = match exit {
        Exit::Signal => server.await,
        Exit::Server(result) => result,
    };

    if let Err(e) = watcher.shutdown().await {
        warn!(error = %e, "File watcher ended with an error");
    }

    if let Some(task) = generator_task {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Mock logger failed"),
            Err(e) => warn!(error = %e, "Mock logger task panicked"),
        }
    }

    broker.shutdown();
    if let Err(e) = broker_task.await {
        warn!(error = %e, "Broker task panicked");
    }

    served??;
    info!("Shutdown complete");
    Ok(())
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Application entry point.
#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // 1. Install color-eyre FIRST (before any potential panics)
    color_eyre::install()?;

    // 2. Parse CLI arguments
    let cli = Cli::parse();

    // 3. Initialize tracing (handles --no-color for log output)
    init_tracing(cli.verbose, cli.no_color);

    // 4. Resolve configuration
    let config = build_config(&cli)?;

    // 5. Serve until shutdown
    run(config, cli.mock).await
}
