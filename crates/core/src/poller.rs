//! Timer-driven change polling
//!
//! The poller exclusively owns the previous snapshot. Each cycle builds a
//! fresh snapshot, diffs it against the previous one and advances the
//! baseline; a failed build keeps the old baseline so the next tick retries
//! the same comparison.

use std::time::Duration;

use color_eyre::Result;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::scan::Scanner;
use crate::snapshot::{FileEvent, Snapshot};

/// Polls a source tree for changes against a single-slot baseline snapshot
pub struct ChangePoller {
    scanner: Scanner,
    previous: Snapshot,
}

impl ChangePoller {
    /// Create a poller, building the baseline snapshot immediately.
    ///
    /// # Errors
    /// Returns an error if the initial walk of the source root fails.
    pub fn new(scanner: Scanner) -> Result<Self> {
        let previous = Snapshot::from_records(scanner.scan()?);
        Ok(Self { scanner, previous })
    }

    /// Number of objects currently tracked by the baseline
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.previous.len()
    }

    /// Every baseline entry as a creation event, for seeding an empty
    /// destination without waiting for the first diff. Assumes creates are
    /// idempotent at the destination.
    #[must_use]
    pub fn baseline_events(&self) -> Vec<FileEvent> {
        self.previous.to_created_events()
    }

    /// Run one poll cycle: build a snapshot, diff it against the baseline,
    /// advance the baseline and return the detected events.
    ///
    /// # Errors
    /// Returns an error if the snapshot build fails; the baseline is left
    /// untouched so the next cycle retries the same comparison.
    pub fn poll(&mut self) -> Result<Vec<FileEvent>> {
        let current = Snapshot::from_records(self.scanner.scan()?);
        let events = self.previous.diff(&current);
        self.previous = current;
        Ok(events)
    }

    /// Poll on a fixed interval until cancelled, publishing events to the
    /// channel. The send blocks until the consumer takes the previous event,
    /// which is the pipeline's only backpressure. Missed ticks are skipped,
    /// not queued. Events sent after cancellation begins may be lost.
    pub async fn run(
        mut self,
        events: mpsc::Sender<FileEvent>,
        interval: Duration,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("poll loop cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    match self.poll() {
                        Ok(batch) => {
                            for event in batch {
                                if events.send(event).await.is_err() {
                                    warn!("event channel closed, stopping poll loop");
                                    return;
                                }
                            }
                        }
                        Err(err) => {
                            warn!("poll cycle failed, keeping previous snapshot: {err}");
                        }
                    }
                }
            }
        }
    }
}
