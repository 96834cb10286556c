//! Named phase collectors for frame instrumentation
//!
//! Collectors count how often a phase ran and how long it took. They are
//! purely observational: nothing in the pipeline reads them back to make
//! decisions. A [`PhaseTimer`] is an RAII guard that records into its
//! collector when dropped, so early returns are still accounted for.

use crate::foundation::time::Stopwatch;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Accumulated measurements for one named phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseSample {
    /// Number of completed timings
    pub count: u64,
    /// Sum of all completed timings
    pub total: Duration,
    /// Arbitrary level counter (e.g. number of batches emitted)
    pub level: u64,
}

/// Handle to a named collector
///
/// Cheap to clone; clones record into the same sample.
#[derive(Debug, Clone)]
pub struct PhaseCollector {
    name: Arc<str>,
    sample: Arc<Mutex<PhaseSample>>,
}

impl PhaseCollector {
    fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            sample: Arc::new(Mutex::new(PhaseSample::default())),
        }
    }

    /// Collector name, colon separated from outer to inner phase
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start timing; the measurement is recorded when the guard drops
    pub fn start(&self) -> PhaseTimer<'_> {
        PhaseTimer {
            collector: self,
            stopwatch: Stopwatch::start_new(),
        }
    }

    /// Add to the level counter without timing anything
    pub fn add_level(&self, amount: u64) {
        self.sample.lock().level += amount;
    }

    /// Snapshot of the current measurements
    pub fn sample(&self) -> PhaseSample {
        *self.sample.lock()
    }

    fn record(&self, elapsed: Duration) {
        let mut sample = self.sample.lock();
        sample.count += 1;
        sample.total += elapsed;
    }

    fn clear(&self) {
        *self.sample.lock() = PhaseSample::default();
    }
}

/// RAII timer recording into a [`PhaseCollector`] on drop
pub struct PhaseTimer<'a> {
    collector: &'a PhaseCollector,
    stopwatch: Stopwatch,
}

impl Drop for PhaseTimer<'_> {
    fn drop(&mut self) {
        self.stopwatch.stop();
        self.collector.record(self.stopwatch.elapsed());
    }
}

/// Registry of named collectors
///
/// Requesting the same name twice returns handles to the same collector.
#[derive(Debug, Default)]
pub struct PhaseProfiler {
    collectors: Mutex<BTreeMap<String, PhaseCollector>>,
}

impl PhaseProfiler {
    /// Create an empty profiler
    pub fn new() -> Self {
        Self::default()
    }

    /// Find or create the collector with the given name
    pub fn collector(&self, name: &str) -> PhaseCollector {
        let mut collectors = self.collectors.lock();
        collectors
            .entry(name.to_string())
            .or_insert_with(|| PhaseCollector::new(name))
            .clone()
    }

    /// Snapshot of every collector, sorted by name
    pub fn snapshot(&self) -> Vec<(String, PhaseSample)> {
        self.collectors
            .lock()
            .iter()
            .map(|(name, collector)| (name.clone(), collector.sample()))
            .collect()
    }

    /// Zero every collector (typically once per reporting interval)
    pub fn clear(&self) {
        for collector in self.collectors.lock().values() {
            collector.clear();
        }
    }
}
