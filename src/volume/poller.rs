//! Periodic volume sampling
//!
//! Reads run on the blocking pool so a slow `osascript` never stalls the
//! engine. Each read is awaited before the next tick, which keeps readings
//! in observation order on the engine channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::engine::Command;

use super::source::{NoReading, VolumeSource};

/// Polls a volume source and forwards every reading to the engine
pub struct VolumePoller<S> {
    source: Arc<S>,
    interval: Duration,
    engine_tx: mpsc::Sender<Command>,
}

impl<S: VolumeSource> VolumePoller<S> {
    pub fn new(source: S, interval: Duration, engine_tx: mpsc::Sender<Command>) -> Self {
        Self {
            source: Arc::new(source),
            interval,
            engine_tx,
        }
    }

    /// Run until the engine channel closes
    pub async fn run(self) {
        info!(interval_ms = self.interval.as_millis() as u64, "volume sampler started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let reading = self.sample().await;
            if let Err(e) = &reading {
                debug!(%e, "volume unavailable this tick");
            }

            if self.engine_tx.send(Command::Reading(reading)).await.is_err() {
                debug!("engine channel closed");
                break;
            }
        }

        info!("volume sampler stopped");
    }

    async fn sample(&self) -> Result<u8, NoReading> {
        let source = Arc::clone(&self.source);
        match tokio::task::spawn_blocking(move || source.read()).await {
            Ok(reading) => reading,
            Err(e) => {
                warn!(?e, "volume read task failed");
                Err(NoReading::Command(e.to_string()))
            }
        }
    }
}
