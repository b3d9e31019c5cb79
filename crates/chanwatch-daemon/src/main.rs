//! chanwatch binary: observes one channel's membership from a stream of
//! raw transitions on standard input.
//!
//! Loads configuration, installs structured logging, seeds the observer,
//! and processes transitions until input ends or SIGTERM/SIGINT arrives.

use chanwatch_daemon::{config, source, watch};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "chanwatch.toml";

/// Picks the config file: first argument, then `CHANWATCH_CONFIG_PATH`,
/// then `chanwatch.toml` in the working directory.
fn resolve_config_path() -> (String, &'static str) {
    let non_blank = |value: &String| !value.trim().is_empty();

    std::env::args()
        .nth(1)
        .filter(non_blank)
        .map(|path| (path, "cli-arg"))
        .or_else(|| {
            std::env::var("CHANWATCH_CONFIG_PATH")
                .ok()
                .filter(non_blank)
                .map(|path| (path, "env-var"))
        })
        .unwrap_or_else(|| (DEFAULT_CONFIG_PATH.to_string(), "default"))
}

#[tokio::main]
async fn main() {
    let (config_path, config_source) = resolve_config_path();

    let config = config::load_config(Some(&config_path))
        .expect("failed to load configuration; chanwatch cannot start without a channel id");

    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = %config_path,
        channel = %config.observer.channel_id,
        "resolved startup configuration"
    );

    // The observer snapshot is loaded inside `watch` before the first
    // transition is received; lines read meanwhile wait in the queue.
    let (tx, rx) = mpsc::channel(config.observer.queue_capacity);
    let mut reader = source::spawn_stdin_source(tx);
    let run = watch::watch(&config.observer, rx);
    tokio::pin!(run);

    let result = tokio::select! {
        result = &mut run => result,
        e = source::source_failure(&mut reader) => {
            tracing::error!(error = %e, "transition source failed");
            std::process::exit(1);
        }
        signal = shutdown_signal() => {
            // Closing the source lets the observer drain what is already queued.
            tracing::info!(signal, "closing transition source");
            reader.abort();
            run.await
        }
    };

    match result {
        Ok(summary) => tracing::info!(
            processed = summary.processed,
            rejected = summary.rejected,
            "transition stream ended"
        ),
        Err(e) => {
            tracing::error!(error = %e, "channel observer stopped");
            std::process::exit(1);
        }
    }

    reader.abort();
    tracing::info!("chanwatch shut down");
}

/// Resolves with the name of the first shutdown signal received.
async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "SIGINT handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => "SIGINT",
        () = terminate => "SIGTERM",
    }
}
