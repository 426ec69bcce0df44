use std::any::Any;
use std::time::Instant;

use super::{ArtifactStore, BuildStep, PipelineError};

/// Lifecycle of a [`Pipeline`]. A pipeline runs at most once.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PipelineState {
    /// Steps and seed artifacts may still be added.
    Idle,
    /// `build()` is executing steps.
    Running,
    /// Every step succeeded; the store was handed to the caller.
    Completed,
    /// A step failed; later steps did not run and the store was dropped.
    Aborted,
}

/// Ordered list of build steps plus the store they share.
pub struct Pipeline {
    steps: Vec<Box<dyn BuildStep>>,
    store: ArtifactStore,
    state: PipelineState,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            store: ArtifactStore::new(),
            state: PipelineState::Idle,
        }
    }

    /// Seeds an artifact before any step runs (builder form).
    pub fn with_artifact<T: Any>(mut self, key: impl Into<String>, value: T) -> Self {
        self.push_artifact(key, value);
        self
    }

    /// Seeds an artifact before any step runs.
    pub fn push_artifact<T: Any>(&mut self, key: impl Into<String>, value: T) -> &mut Self {
        self.store.push(key, value);
        self
    }

    /// Appends a step (builder form).
    pub fn with_step<S: BuildStep + 'static>(mut self, step: S) -> Self {
        self.use_step(Box::new(step));
        self
    }

    /// Appends a step. Dependencies between steps are not checked here; they
    /// resolve through the store when the pipeline runs.
    pub fn use_step(&mut self, step: Box<dyn BuildStep>) -> &mut Self {
        self.steps.push(step);
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Number of registered steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs every step in registration order and returns the filled store.
    ///
    /// Stops at the first failing step. On failure the store is dropped, which
    /// releases the artifacts committed by the steps that did complete.
    pub fn build(&mut self) -> Result<ArtifactStore, PipelineError> {
        if self.state != PipelineState::Idle {
            return Err(PipelineError::AlreadyBuilt);
        }

        self.state = PipelineState::Running;
        let mut store = std::mem::take(&mut self.store);
        let total = self.steps.len();
        let mut failure = None;

        for (index, step) in self.steps.iter_mut().enumerate() {
            let name = step.name().to_owned();
            log::debug!("step {}/{total} `{name}` starting", index + 1);
            let started = Instant::now();

            if let Err(source) = step.build(&mut store) {
                log::error!("step {}/{total} `{name}` failed: {source}", index + 1);
                failure = Some(PipelineError::Step {
                    index,
                    name,
                    source,
                });
                break;
            }

            log::info!("step `{name}` done in {:.2?}", started.elapsed());
        }

        // Steps may capture resources for the duration of the run only.
        self.steps.clear();

        match failure {
            Some(err) => {
                self.state = PipelineState::Aborted;
                drop(store);
                Err(err)
            }
            None => {
                self.state = PipelineState::Completed;
                Ok(store)
            }
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{BuildError, ErrorKind, FnStep};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<&'static str>>>;

    fn recording(log: &Log, id: &'static str) -> impl BuildStep + 'static {
        let log = log.clone();
        FnStep::new(id, move |_store: &mut ArtifactStore| {
            log.borrow_mut().push(id);
            Ok(())
        })
    }

    fn failing(log: &Log, id: &'static str) -> impl BuildStep + 'static {
        let log = log.clone();
        FnStep::new(id, move |_store: &mut ArtifactStore| {
            log.borrow_mut().push(id);
            Err(BuildError::unsupported("no present queue"))
        })
    }

    #[test]
    fn steps_run_in_registration_order() {
        let log = Log::default();
        let mut pipeline = Pipeline::new()
            .with_step(recording(&log, "a"))
            .with_step(recording(&log, "b"))
            .with_step(recording(&log, "c"))
            .with_step(recording(&log, "d"));

        assert_eq!(pipeline.len(), 4);
        pipeline.build().unwrap();

        assert_eq!(*log.borrow(), ["a", "b", "c", "d"]);
        assert_eq!(pipeline.state(), PipelineState::Completed);
    }

    #[test]
    fn failure_stops_later_steps() {
        let log = Log::default();
        let mut pipeline = Pipeline::new();
        pipeline
            .use_step(Box::new(recording(&log, "a")))
            .use_step(Box::new(failing(&log, "b")))
            .use_step(Box::new(recording(&log, "c")));

        let err = pipeline.build().unwrap_err();

        assert_eq!(*log.borrow(), ["a", "b"]);
        assert_eq!(pipeline.state(), PipelineState::Aborted);
        match err {
            PipelineError::Step { index, name, source } => {
                assert_eq!(index, 1);
                assert_eq!(name, "b");
                assert_eq!(source.kind(), ErrorKind::HardwareUnsupported);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_dependency_surfaces_as_missing_key() {
        let mut pipeline = Pipeline::new().with_step(FnStep::new(
            "device",
            |store: &mut ArtifactStore| {
                store.fetch::<u32>("select.physical_device")?;
                Ok(())
            },
        ));

        let err = pipeline.build().unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::MissingKey));
    }

    #[test]
    fn artifacts_flow_between_steps_and_back_to_caller() {
        let mut pipeline = Pipeline::new()
            .with_artifact("seed", 2u32)
            .with_step(FnStep::new("square", |store: &mut ArtifactStore| {
                let v = *store.fetch::<u32>("seed")?;
                store.push("square", v * v);
                Ok(())
            }))
            .with_step(FnStep::new("label", |store: &mut ArtifactStore| {
                let v = *store.fetch::<u32>("square")?;
                store.push("label", format!("{v}"));
                Ok(())
            }));

        let mut store = pipeline.build().unwrap();
        assert_eq!(store.take::<String>("label").unwrap(), "4");
        assert_eq!(*store.fetch::<u32>("seed").unwrap(), 2);
    }

    #[test]
    fn pipeline_runs_only_once() {
        let log = Log::default();
        let mut pipeline = Pipeline::new().with_step(recording(&log, "a"));

        pipeline.build().unwrap();
        assert!(matches!(pipeline.build(), Err(PipelineError::AlreadyBuilt)));
        assert_eq!(*log.borrow(), ["a"]);
        assert_eq!(pipeline.state(), PipelineState::Completed);
    }

    #[test]
    fn aborted_pipeline_cannot_be_rerun() {
        let log = Log::default();
        let mut pipeline = Pipeline::new().with_step(failing(&log, "a"));

        assert!(pipeline.build().is_err());
        assert!(matches!(pipeline.build(), Err(PipelineError::AlreadyBuilt)));
        assert_eq!(*log.borrow(), ["a"]);
    }

    #[test]
    fn abort_releases_committed_artifacts() {
        struct Tracked(Rc<Cell<bool>>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.0.set(true);
            }
        }

        let released = Rc::new(Cell::new(false));
        let flag = released.clone();
        let log = Log::default();
        let mut pipeline = Pipeline::new()
            .with_step(FnStep::new("acquire", move |store: &mut ArtifactStore| {
                store.push("resource", Tracked(flag.clone()));
                Ok(())
            }))
            .with_step(failing(&log, "explode"));

        assert!(pipeline.build().is_err());
        assert!(released.get());
    }

    #[test]
    fn empty_pipeline_completes_with_seed_artifacts() {
        let mut pipeline = Pipeline::default().with_artifact("only", 1u8);
        assert!(pipeline.is_empty());
        assert_eq!(pipeline.state(), PipelineState::Idle);

        let store = pipeline.build().unwrap();
        assert_eq!(store.len(), 1);
    }
}
