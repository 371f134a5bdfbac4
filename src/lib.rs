//! Automatic training orchestrator for human-in-the-loop object detection.
//!
//! The orchestrator repeatedly samples unlabeled images, pushes them to a
//! remote annotation service, rebuilds a dataset once new ground truth lands,
//! retrains, and promotes the resulting model for the next round of
//! pre-labeling. Remote services and the training tool are reached only through
//! the traits in [`accessors`].

pub mod accessors;
pub mod api;
pub mod batch;
pub mod changeset;
pub mod config;
pub mod error;
pub mod injector;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod prediction;
pub mod timeline;

pub use error::{Error, Result};
