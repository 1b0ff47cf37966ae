//! Revision-scoped transactional storage for the alder log.
//!
//! The sequencer and the CT front-end consume the [`LogStorage`] /
//! [`LogTransaction`] / [`LogReader`] traits; two backends implement them:
//!
//! - [`MemoryLogStorage`] — `RwLock`'d maps, for tests and `--memory` mode.
//! - [`FjallLogStorage`] — fjall keyspaces on disk.
//!
//! Both enforce the same contract: a single writer per revision (lease
//! taken at `begin()`), writes staged privately and applied atomically at
//! `commit()`, immutable `(node_id, revision)` rows, and at most one
//! signed log root per revision.

mod disk;
mod error;
mod memory;
mod queries;
mod traits;


pub use disk::FjallLogStorage;
pub use error::StorageError;
pub use memory::MemoryLogStorage;
pub use traits::{LogReader, LogStorage, LogTransaction};
