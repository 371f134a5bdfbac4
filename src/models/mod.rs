//! Domain models for the automatic trainer.
//!
//! # Core Concepts
//!
//! ## Snapshots
//!
//! - [`DatasetSnapshot`]: an immutable training dataset built from annotations,
//!   embedding the [`ProjectInfo`] it was built from. Superseded, never mutated.
//! - [`ModelTrainingSettings`]: model + input size + epochs, compared structurally.
//!
//! ## Inference
//!
//! - [`TrainedModelReference`]: opaque handle to a model artifact.
//! - [`PredictionSet`]: per-file predicted labels produced by one model.
//!
//! ## Remote / local records
//!
//! - [`RemoteTask`], [`RemoteFile`], [`ProjectLabel`], [`TaskFrame`]: what the
//!   annotation service reports.
//! - [`LocalFile`]: an image available on disk.
//!
//! ## Decisions
//!
//! - [`Changeset`]: what changed since the last successful training.

mod changeset;
mod dataset;
mod local;
mod prediction;
mod remote;
mod strategy;

pub use changeset::*;
pub use dataset::*;
pub use local::*;
pub use prediction::*;
pub use remote::*;
pub use strategy::*;
