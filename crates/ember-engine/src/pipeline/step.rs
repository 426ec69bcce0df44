use super::{ArtifactStore, BuildError};

/// One stage of a [`Pipeline`](super::Pipeline).
///
/// A step reads the artifacts it depends on, performs its work, and publishes
/// its results. A failing step must not publish anything: compute first, push
/// last.
pub trait BuildStep {
    /// Name used in logs and in [`PipelineError`](super::PipelineError).
    ///
    /// Defaults to the implementing type's name without its module path.
    fn name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }

    fn build(&mut self, store: &mut ArtifactStore) -> Result<(), BuildError>;
}

fn short_type_name(full: &'static str) -> &'static str {
    full.rsplit("::").next().unwrap_or(full)
}

/// Closure-backed step, for caller-side glue that does not warrant a type.
pub struct FnStep<F> {
    name: &'static str,
    f: F,
}

impl<F> FnStep<F>
where
    F: FnMut(&mut ArtifactStore) -> Result<(), BuildError>,
{
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }
}

impl<F> BuildStep for FnStep<F>
where
    F: FnMut(&mut ArtifactStore) -> Result<(), BuildError>,
{
    fn name(&self) -> &str {
        self.name
    }

    fn build(&mut self, store: &mut ArtifactStore) -> Result<(), BuildError> {
        (self.f)(store)
    }
}
