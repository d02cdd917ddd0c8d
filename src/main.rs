mod cli;
mod config;
mod db;
mod error;
mod keys;
mod logger;
mod models;

use cli::{run_loop, Cli, RustylineReader, Session, TerminalState};
use clap::Parser;
use colored::*;
use config::Config;
use db::{Backend, LocalBackend};
use error::Result;
use logger::{Logger, LoggerConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use tokio::sync::oneshot;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

const VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"));

#[tokio::main]
async fn main() -> Result<()> {
    // Diagnostics only; the session log below is what the user sees.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(e) => {
            println!("{} {}", "Error:".red(), e);
            return Err(e);
        },
    };
    debug!(?config, "Loaded configuration");

    let logger = Arc::new(Logger::new(config.logger.clone()));
    if let Err(e) = logger.init() {
        Logger::new(LoggerConfig::default()).fatal(format!("Failed to initialize logger: {}", e));
    }
    logger.info(format!("PolarysDB CLI Version: {}", VERSION));
    println!("{}", "Type 'help' to list commands.".cyan());

    let session = Arc::new(Mutex::new(Session::new(
        LocalBackend,
        VERSION,
        logger.clone(),
    )));
    let stop = Arc::new(AtomicBool::new(false));
    let terminal = TerminalState::capture();
    let (done_tx, done_rx) = oneshot::channel();

    {
        let session = session.clone();
        let stop = stop.clone();
        let logger = logger.clone();
        let history = config.history.clone();
        thread::Builder::new()
            .name("prompt".to_string())
            .spawn(move || {
                let result = RustylineReader::new(history)
                    .and_then(|mut reader| run_loop(&*session, &mut reader, &stop, &logger));
                // The receiver is gone only if main already started shutting down.
                let _ = done_tx.send(result);
            })?;
    }

    let interrupted = tokio::select! {
        finished = done_rx => {
            match finished {
                Ok(Ok(exit)) => info!(?exit, "Prompt loop finished"),
                Ok(Err(e)) => logger.error(format!("Prompt failed: {}", e)),
                Err(_) => logger.error("Prompt loop ended without reporting"),
            }
            false
        },
        _ = shutdown_signal() => {
            stop.store(true, Ordering::SeqCst);
            info!("Interrupt received");
            logger.warn("Interrupt received, shutting down...");
            true
        },
    };

    shutdown(session, logger).await;
    if interrupted {
        // The prompt thread is still inside the editor, which left the terminal raw.
        terminal.restore();
    }
    Ok(())
}

/// Closes the session's handle and then the logger. Every exit path goes through here.
///
/// Runs on the blocking pool: the session lock is held by the prompt thread for
/// as long as a command is executing.
async fn shutdown<B>(session: Arc<Mutex<Session<B>>>, logger: Arc<Logger>)
where
    B: Backend + 'static,
{
    let result = tokio::task::spawn_blocking(move || {
        session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .shutdown()
    })
    .await;

    match result {
        Ok(Ok(())) => {},
        Ok(Err(e)) => logger.error(format!("Failed to close database: {}", e)),
        Err(e) => error!("Shutdown task failed: {}", e),
    }
    logger.close();
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
