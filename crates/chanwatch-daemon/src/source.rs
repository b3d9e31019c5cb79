//! Newline-delimited JSON transition source.
//!
//! Each non-blank line is one [`RawTransition`], for example:
//!
//! ```text
//! {"member_id":"u1","previous":null,"next":"voice-1"}
//! {"member_id":"u1","previous":"voice-1","next":"voice-2"}
//! ```

use crate::error::DaemonError;
use chanwatch_types::RawTransition;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Reads transitions from `reader` and forwards them on `tx`.
///
/// Lines that are not valid UTF-8 or not a valid transition are logged and
/// skipped. Stops at end of input or when the receiving side is dropped.
/// Returns the number of transitions forwarded.
///
/// # Errors
///
/// Returns [`DaemonError::Io`] if reading from `reader` fails.
pub async fn read_transitions<R>(
    mut reader: R,
    tx: mpsc::Sender<RawTransition>,
) -> Result<usize, DaemonError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut line_no = 0usize;
    let mut forwarded = 0usize;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        line_no += 1;

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim(),
            Err(e) => {
                tracing::warn!(line = line_no, error = %e, "skipping transition line that is not UTF-8");
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }

        let transition: RawTransition = match serde_json::from_str(line) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(line = line_no, error = %e, "skipping malformed transition");
                continue;
            }
        };

        if tx.send(transition).await.is_err() {
            tracing::debug!("observer stopped receiving, closing transition source");
            break;
        }
        forwarded += 1;
    }

    Ok(forwarded)
}

/// Spawns a task that feeds transitions read from standard input into `tx`.
pub fn spawn_stdin_source(tx: mpsc::Sender<RawTransition>) -> JoinHandle<Result<usize, DaemonError>> {
    tokio::spawn(async move { read_transitions(BufReader::new(tokio::io::stdin()), tx).await })
}

/// Resolves only if the source task fails.
///
/// A source that reaches end of input never resolves here: the observer
/// notices the closed queue on its own and ends the run.
pub async fn source_failure(source: &mut JoinHandle<Result<usize, DaemonError>>) -> DaemonError {
    match source.await {
        Ok(Ok(_)) => std::future::pending().await,
        Ok(Err(e)) => e,
        Err(e) => DaemonError::SourceTask(e),
    }
}
