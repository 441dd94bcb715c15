use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::clock::Clock;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("time request failed: {0}")]
    Request(String),

    #[error("time endpoint returned status {0}")]
    Status(u16),

    #[error("time response has no server_time_ms")]
    MissingTimestamp,

    #[error("time request timed out after {0:?}")]
    Timeout(Duration),
}

/// A remote clock that can be sampled once.
#[async_trait]
pub trait TimeSource: Send + Sync {
    /// Remote wall time in epoch milliseconds.
    async fn server_time_ms(&self) -> Result<i64, SyncError>;
}

/// Difference between the remote clock and the local monotonic clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockOffset {
    pub offset_ms: i64,
}

impl ClockOffset {
    /// Assumes the remote sample was taken halfway through the round trip.
    pub fn from_probe(t0_ms: u64, t1_ms: u64, remote_ms: i64) -> Self {
        let rtt = t1_ms.saturating_sub(t0_ms) as f64;
        let local_at_sample = t0_ms as f64 + rtt / 2.0;
        Self {
            offset_ms: (remote_ms as f64 - local_at_sample).round() as i64,
        }
    }

    pub fn to_absolute(&self, local_ms: u64) -> i64 {
        local_ms as i64 + self.offset_ms
    }
}

/// One-shot round-trip probe. There is no retry: callers treat a failure as
/// "absolute times unknown" and carry on.
pub struct ClockSync;

impl ClockSync {
    #[tracing::instrument(skip_all)]
    pub async fn sync(source: &dyn TimeSource, clock: &dyn Clock) -> Result<ClockOffset, SyncError> {
        let t0 = clock.now_ms();
        let remote = source.server_time_ms().await?;
        let t1 = clock.now_ms();
        let offset = ClockOffset::from_probe(t0, t1, remote);
        tracing::debug!(rtt_ms = t1.saturating_sub(t0), offset_ms = offset.offset_ms, "clock synced");
        Ok(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    struct DelayedSource {
        clock: ManualClock,
        rtt_ms: u64,
        remote_ms: i64,
    }

    #[async_trait]
    impl TimeSource for DelayedSource {
        async fn server_time_ms(&self) -> Result<i64, SyncError> {
            self.clock.advance(self.rtt_ms);
            Ok(self.remote_ms)
        }
    }

    struct DownSource;

    #[async_trait]
    impl TimeSource for DownSource {
        async fn server_time_ms(&self) -> Result<i64, SyncError> {
            Err(SyncError::Request("connection refused".into()))
        }
    }

    #[test]
    fn offset_uses_round_trip_midpoint() {
        let offset = ClockOffset::from_probe(1_000, 1_200, 1_700_000_000_500);
        assert_eq!(offset.offset_ms, 1_700_000_000_500 - 1_100);
        assert_eq!(offset.to_absolute(1_100), 1_700_000_000_500);
    }

    #[tokio::test]
    async fn sync_measures_rtt_with_local_clock() {
        let clock = ManualClock::at(1_000);
        let source = DelayedSource {
            clock: clock.clone(),
            rtt_ms: 200,
            remote_ms: 50_000,
        };
        let offset = ClockSync::sync(&source, &clock).await.unwrap();
        assert_eq!(offset.offset_ms, 50_000 - 1_100);
    }

    #[tokio::test]
    async fn failed_probe_is_reported() {
        let clock = ManualClock::new();
        let err = ClockSync::sync(&DownSource, &clock).await.unwrap_err();
        assert!(matches!(err, SyncError::Request(_)));
    }
}
