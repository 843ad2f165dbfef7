//! Synthetic access log generator for `--mock`.
//!
//! Appends one numbered, timestamped line to the watched file every
//! 500-1000 ms so the stream has something to show without a real
//! producer.

use std::io;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Local};
use rand::Rng;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Shortest pause between two generated lines.
const MIN_DELAY: Duration = Duration::from_millis(500);

/// Upper bound (exclusive) of the random extra pause, in milliseconds.
const JITTER_MS: u64 = 500;

/// Creates `path` if it does not exist, leaving existing content alone.
pub(crate) fn ensure_file(path: &Utf8Path) -> io::Result<()> {
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    Ok(())
}

/// Formats the `index`-th generated line.
pub(crate) fn format_line(index: u64, now: DateTime<Local>) -> String {
    format!(
        "{index} - the time is {}\n",
        now.format("%Y-%m-%d %H:%M:%S%.6f %:z")
    )
}

fn next_delay() -> Duration {
    MIN_DELAY + Duration::from_millis(rand::thread_rng().gen_range(0..JITTER_MS))
}

/// Appends generated lines to `path` until `cancel` fires.
///
/// # Errors
///
/// Returns the I/O error that stopped generation.
pub(crate) async fn run(path: Utf8PathBuf, cancel: CancellationToken) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await?;

    info!(path = %path, "Mock logger started");

    let mut index = 0_u64;
    while !cancel.is_cancelled() {
        file.write_all(format_line(index, Local::now()).as_bytes())
            .await?;
        file.flush().await?;
        debug!(index, "Appended mock line");
        index += 1;

        tokio::select! {
            () = cancel.cancelled() => {}
            () = tokio::time::sleep(next_delay()) => {}
        }
    }

    info!(path = %path, lines = index, "Mock logger stopped");
    Ok(())
}
