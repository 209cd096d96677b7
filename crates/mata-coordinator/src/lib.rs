//! Mata Coordinator - the reconciliation core
//!
//! Three library operations drive the coordinator:
//!
//! - [`JobCoordinator::poll`] reconciles "one running ingestion job per
//!   (source, store) pair" against the execution backend;
//! - [`SpecPropagator::publish_pending`] pushes updated feature-set specs
//!   to running jobs over the spec channel;
//! - [`AckListener::process`] folds per-job delivery acknowledgements
//!   into the feature-set delivery state and promotes feature sets to
//!   ready once every live job has confirmed the current version.
//!
//! Each operation is an independent, idempotent pass; the daemon drives
//! them from separate periodic/event loops.

pub mod ack;
pub mod error;
pub mod poll;
pub mod propagate;

pub use ack::{AckListener, AckOutcome, AckRecord, DiscardReason};
pub use error::CoordinatorError;
pub use poll::{JobCoordinator, PollSummary};
pub use propagate::{PropagationSummary, SpecPropagator};
