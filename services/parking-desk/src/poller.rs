//! Recognition poller: periodic frame capture with a single-flight guard

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::capture::FrameSource;
use crate::recognition::Recognizer;
use crate::state::StateHandle;

/// What a single tick did
#[derive(Debug)]
pub enum TickOutcome {
    /// A previous submission was still outstanding
    Skipped,
    /// A submission was started
    Dispatched(JoinHandle<()>),
}

impl TickOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, TickOutcome::Skipped)
    }
}

/// Clears the in-flight flag when the submission task ends, however it ends
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Samples the frame source on a fixed period and submits frames for recognition
pub struct Poller {
    source: Arc<dyn FrameSource>,
    recognizer: Arc<dyn Recognizer>,
    state: StateHandle,
    interval: Duration,
    in_flight: Arc<AtomicBool>,
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("interval", &self.interval)
            .field("in_flight", &self.is_in_flight())
            .finish()
    }
}

impl Poller {
    pub fn new(
        source: Arc<dyn FrameSource>,
        recognizer: Arc<dyn Recognizer>,
        state: StateHandle,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            recognizer,
            state,
            interval,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Open the source, then tick every interval until cancelled.
    ///
    /// Returns the open error without polling if the source cannot be acquired.
    pub async fn run(&self, cancel: CancellationToken) -> crate::Result<()> {
        if let Err(e) = self.source.open().await {
            tracing::error!("Failed to open capture source, recognition disabled: {}", e);
            return Err(e);
        }

        tracing::info!("Recognition poller started ({:?} interval)", self.interval);

        let start = tokio::time::Instant::now() + self.interval;
        let mut ticker = tokio::time::interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick();
                }
                _ = cancel.cancelled() => {
                    tracing::debug!("Recognition poller cancelled");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Start one submission unless the previous one is still outstanding
    pub fn tick(&self) -> TickOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Recognition still in flight, skipping tick");
            return TickOutcome::Skipped;
        }

        let guard = InFlightGuard(Arc::clone(&self.in_flight));
        let source = Arc::clone(&self.source);
        let recognizer = Arc::clone(&self.recognizer);
        let state = Arc::clone(&self.state);

        TickOutcome::Dispatched(tokio::spawn(async move {
            let _guard = guard;
            submit_once(source.as_ref(), recognizer.as_ref(), &state).await;
        }))
    }
}

async fn submit_once(source: &dyn FrameSource, recognizer: &dyn Recognizer, state: &StateHandle) {
    let frame = match source.latest_frame().await {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!("Frame capture failed: {}", e);
            return;
        }
    };

    tracing::debug!("Submitting {} byte frame for recognition", frame.bytes.len());

    match recognizer.recognize(frame).await {
        Ok(Some(plate)) => {
            tracing::info!("Recognized plate {}", plate);
            state.write().await.set_recognized_plate(&plate);
        }
        Ok(None) => {
            tracing::debug!("No plate recognized in frame");
        }
        Err(e) => {
            tracing::warn!("Plate recognition failed: {}", e);
        }
    }
}
