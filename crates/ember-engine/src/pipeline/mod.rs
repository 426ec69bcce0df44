//! Staged build pipeline.
//!
//! A [`Pipeline`] runs an ordered list of [`BuildStep`]s against a shared
//! [`ArtifactStore`]. Steps never reference each other directly; a step reads
//! what earlier steps published under well-known keys and publishes its own
//! results the same way.
//!
//! Execution is sequential and fail-fast: the first failing step aborts the run
//! and the store is dropped, releasing everything committed so far.

mod error;
mod orchestrator;
mod step;
mod store;

pub use error::{BoxError, BuildError, ErrorKind, ExternalContext, PipelineError};
pub use orchestrator::{Pipeline, PipelineState};
pub use step::{BuildStep, FnStep};
pub use store::ArtifactStore;
