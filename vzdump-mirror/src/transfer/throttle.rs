//! Rate-limited chunk copying.
//!
//! The limiter writes fixed 4 KiB chunks and waits for a periodic tick after
//! each one. With a limit of `r` KB/s the tick period is `4 / r` seconds.
//! There is no token bucket; pacing is only as fine as one chunk.

use super::progress::{format_bytes, format_speed, ProgressTracker};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

/// Bytes written between two ticks
pub const CHUNK_SIZE: usize = 4096;

/// Largest rate limit (KB/s) that still throttles
pub const MAX_RATE_LIMIT_KBPS: i64 = 250_000_000;

/// How a backup is moved from source to destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Single bulk stream copy
    Unthrottled,

    /// Chunked copy, one chunk per `period`
    Throttled { period: Duration },
}

impl TransferMode {
    /// Map a rate limit in KB/s to a transfer mode.
    ///
    /// Values outside `1..=250_000_000` mean no limit.
    pub fn from_rate_limit(kbps: i64) -> Self {
        match u32::try_from(kbps) {
            Ok(rate) if (1..=MAX_RATE_LIMIT_KBPS).contains(&kbps) => Self::Throttled {
                period: tick_period(rate),
            },
            _ => Self::Unthrottled,
        }
    }

    pub fn is_throttled(&self) -> bool {
        matches!(self, Self::Throttled { .. })
    }
}

/// Tick period for a rate limit: one second divided by the rate, times four.
///
/// The division happens at nanosecond resolution before the multiplication.
pub fn tick_period(kbps: u32) -> Duration {
    Duration::from_secs(1) / kbps.max(1) * 4
}

/// Copy `reader` into `writer` one chunk per tick.
///
/// The first tick fires one period after the start, so every chunk
/// including the last is followed by a full wait. A zero-byte read ends the
/// copy. Returns the number of bytes written.
pub async fn throttled_copy<R, W>(
    reader: &mut R,
    writer: &mut W,
    period: Duration,
    progress: &mut ProgressTracker,
) -> io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n]).await?;
        total += n as u64;

        if progress.advance(n as u64) {
            debug!(
                "Throttled copy at {} ({:.1}%, {})",
                format_bytes(progress.transferred_bytes()),
                progress.percent_complete(),
                format_speed(progress.average_speed())
            );
        }

        ticker.tick().await;
    }
    writer.flush().await?;

    Ok(total)
}
