//! Multi-stage copy-on-write state
//!
//! A [`PipelineCycler`] keeps one snapshot of some state per pipeline stage
//! (app/cull upstream, draw downstream). Readers take an `Arc` snapshot of
//! their stage and keep it as long as they like. Writers go through
//! [`PipelineCycler::write`], which clones the stage's value first whenever
//! anybody else still holds it, so a writer preparing frame N+1 never
//! disturbs a reader still drawing frame N. [`PipelineCycler::cycle`] hands
//! each stage's snapshot one stage downstream at the frame boundary.

use parking_lot::RwLock;
use std::sync::Arc;

/// Per-stage copy-on-write container
#[derive(Debug)]
pub struct PipelineCycler<T> {
    stages: RwLock<Vec<Arc<T>>>,
}

impl<T: Clone> PipelineCycler<T> {
    /// Create a cycler whose stages all share `value`
    pub fn new(value: T, num_stages: usize) -> Self {
        let shared = Arc::new(value);
        let stages = (0..num_stages.max(1)).map(|_| Arc::clone(&shared)).collect();
        Self {
            stages: RwLock::new(stages),
        }
    }

    /// Number of stages
    pub fn num_stages(&self) -> usize {
        self.stages.read().len()
    }

    /// Immutable snapshot of a stage
    ///
    /// Stages past the end clamp to the last stage.
    pub fn read(&self, stage: usize) -> Arc<T> {
        let stages = self.stages.read();
        let index = stage.min(stages.len() - 1);
        Arc::clone(&stages[index])
    }

    /// Mutate one stage, cloning it first if the snapshot is shared
    pub fn write<R>(&self, stage: usize, f: impl FnOnce(&mut T) -> R) -> R {
        let mut stages = self.stages.write();
        let index = stage.min(stages.len() - 1);
        f(Arc::make_mut(&mut stages[index]))
    }

    /// Whether the stage's snapshot is currently referenced elsewhere
    pub fn is_shared(&self, stage: usize) -> bool {
        let stages = self.stages.read();
        let index = stage.min(stages.len() - 1);
        Arc::strong_count(&stages[index]) > 1
    }

    /// Advance the pipeline by one frame: stage i+1 receives stage i
    pub fn cycle(&self) {
        let mut stages = self.stages.write();
        for i in (1..stages.len()).rev() {
            let upstream = Arc::clone(&stages[i - 1]);
            stages[i] = upstream;
        }
    }
}

impl<T> Clone for PipelineCycler<T> {
    fn clone(&self) -> Self {
        Self {
            stages: RwLock::new(self.stages.read().clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_does_not_disturb_reader_snapshot() {
        let cycler = PipelineCycler::new(vec![1, 2, 3], 2);
        let snapshot = cycler.read(0);

        cycler.write(0, |v| v.push(4));

        assert_eq!(*snapshot, vec![1, 2, 3]);
        assert_eq!(*cycler.read(0), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_cycle_moves_data_downstream() {
        let cycler = PipelineCycler::new(0u32, 2);
        cycler.write(0, |v| *v = 7);
        assert_eq!(*cycler.read(1), 0);

        cycler.cycle();
        assert_eq!(*cycler.read(1), 7);
        assert!(cycler.is_shared(0));

        // Writing upstream again leaves the downstream frame intact
        cycler.write(0, |v| *v = 8);
        assert_eq!(*cycler.read(1), 7);
        assert_eq!(*cycler.read(0), 8);
    }

    #[test]
    fn test_unshared_write_is_in_place() {
        let cycler = PipelineCycler::new(String::from("a"), 1);
        let before = Arc::as_ptr(&cycler.read(0));
        cycler.write(0, |s| s.push('b'));
        assert_eq!(Arc::as_ptr(&cycler.read(0)), before);
    }

    #[test]
    fn test_stage_index_clamps() {
        let cycler = PipelineCycler::new(5, 1);
        assert_eq!(*cycler.read(3), 5);
        assert_eq!(cycler.num_stages(), 1);
    }
}
