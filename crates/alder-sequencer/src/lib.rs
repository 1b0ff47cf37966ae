//! The alder sequencer: drains the pending-leaf queue, extends the
//! compact Merkle tree, persists changed nodes at a new tree revision,
//! and signs a fresh tree head — all inside one storage transaction.
//!
//! [`Sequencer::sequence_batch`] is the integration state machine;
//! [`Sequencer::sign_root`] re-signs the current tree on an idle log.
//! [`run`] drives the sequencer from a timer until shutdown.

mod error;
mod runner;
mod sequencer;


pub use error::SequencerError;
pub use runner::{SequencerTuning, run};
pub use sequencer::Sequencer;
