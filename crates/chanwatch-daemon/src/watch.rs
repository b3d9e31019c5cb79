//! Observer construction and log-emitting subscriptions for the daemon.

use crate::config::ObserverConfig;
use crate::error::DaemonError;
use crate::lookup::FileLookup;
use chanwatch_presence::{ChannelObserver, RunSummary};
use chanwatch_types::RawTransition;
use tokio::sync::mpsc;

/// Builds an observer for `config` and loads its initial membership.
///
/// With `members_file` set, membership comes from a one-time
/// [`FileLookup`]; otherwise the observer is seeded from `initial_members`.
///
/// # Errors
///
/// Returns [`DaemonError::Presence`] if the lookup fails under the `fail`
/// policy.
pub async fn start_observer(config: &ObserverConfig) -> Result<ChannelObserver, DaemonError> {
    let observer = match &config.members_file {
        Some(path) => {
            let mut observer = ChannelObserver::new(config.channel_id.as_str())
                .with_lookup_failure(config.on_lookup_failure);
            observer.start(&FileLookup::new(path)).await?;
            observer
        }
        None => {
            let observer = ChannelObserver::with_members(
                config.channel_id.as_str(),
                config.initial_members.iter().map(String::as_str),
            );
            tracing::info!(
                channel = %observer.channel_id(),
                present = observer.present_count(),
                "channel observer seeded from configuration"
            );
            observer
        }
    };
    Ok(observer)
}

/// Registers the subscriptions that turn membership events into log lines.
pub fn attach_logging(observer: &ChannelObserver, thresholds: &[usize]) {
    let channel = observer.channel_id().clone();
    observer.on_change(move |counts| {
        tracing::info!(
            channel = %channel,
            before = counts.before,
            now = counts.now,
            "membership changed"
        );
    });

    let channel = observer.channel_id().clone();
    observer.on_nothing_changed(move |counts| {
        tracing::trace!(channel = %channel, now = counts.now, "transition left membership unchanged");
    });

    let channel = observer.channel_id().clone();
    observer.on_empty(move |_| {
        tracing::info!(channel = %channel, "channel is now empty");
    });

    let channel = observer.channel_id().clone();
    observer.on_not_empty(move |counts| {
        tracing::info!(channel = %channel, now = counts.now, "channel is no longer empty");
    });

    for &threshold in thresholds {
        observer.on_threshold_reached(threshold, move |channel, counts| {
            tracing::info!(
                channel = %channel,
                threshold,
                now = counts.now,
                "occupancy threshold reached"
            );
        });
        observer.on_threshold_left(threshold, move |channel, counts| {
            tracing::info!(
                channel = %channel,
                threshold,
                now = counts.now,
                "occupancy dropped below threshold"
            );
        });
    }
}

/// Starts an observer for `config`, attaches logging, and processes
/// `transitions` until the source closes.
///
/// # Errors
///
/// Returns [`DaemonError::Presence`] if the observer cannot be started.
pub async fn watch(
    config: &ObserverConfig,
    transitions: mpsc::Receiver<RawTransition>,
) -> Result<RunSummary, DaemonError> {
    let mut observer = start_observer(config).await?;
    attach_logging(&observer, &config.thresholds);
    Ok(observer.run(transitions).await?)
}
