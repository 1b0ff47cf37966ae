//! Timer-driven sequencer loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::error::SequencerError;
use crate::sequencer::Sequencer;

/// Tuning knobs for the sequencer loop.
#[derive(Debug, Clone)]
pub struct SequencerTuning {
    /// Maximum leaves integrated per tick.
    pub batch_limit: usize,
    /// Interval between sequencing passes.
    pub tick: Duration,
    /// A tree head older than this is re-signed even with no new leaves.
    pub max_root_age: Duration,
}

impl Default for SequencerTuning {
    fn default() -> Self {
        Self {
            batch_limit: 50,
            tick: Duration::from_secs(1),
            max_root_age: Duration::from_secs(300),
        }
    }
}

/// Run sequencing passes on a timer until `shutdown` flips.
///
/// Transient failures are logged and retried on the next tick; nothing
/// escapes an aborted pass, so re-running is always safe.
pub async fn run(
    sequencer: Arc<Sequencer>,
    tuning: SequencerTuning,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(tuning.tick);
    info!(
        batch_limit = tuning.batch_limit,
        tick_millis = tuning.tick.as_millis() as u64,
        "sequencer loop started"
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => {
                info!("sequencer loop stopped");
                return;
            }
        }

        let result = sequencer.sequence_batch(tuning.batch_limit, |root| {
            sequencer.root_expired(root, tuning.max_root_age)
        });

        match result {
            Ok(0) => {}
            Ok(count) => info!(count, "sequenced leaves"),
            Err(SequencerError::RevisionConflict { got, want }) => {
                warn!(got, want, "revision conflict, retrying next tick");
            }
            Err(e @ SequencerError::CorruptState(_)) => {
                // Retrying cannot help here; stop and leave the queue
                // intact for operator inspection.
                error!(%e, "tree state is damaged, stopping the sequencer loop");
                return;
            }
            Err(e) => warn!(%e, "sequencing pass failed"),
        }
    }
}
