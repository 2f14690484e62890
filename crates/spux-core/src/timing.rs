use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::iter::Sum;
use std::ops::AddAssign;
use std::time::{Duration, Instant};
use tracing::warn;

/// A `(start, end)` pair in seconds since the recorder's origin.
pub type Stamp = (f64, f64);

/// Named duration recorder.
///
/// Runtimes accumulate per name; every completed measurement also leaves a
/// timestamp pair so that per-call activity can be plotted afterwards.
/// Recorders from different workers merge with `+=`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timing {
    pub runtimes: BTreeMap<String, f64>,
    pub timestamps: BTreeMap<String, Vec<Stamp>>,
    #[serde(skip, default = "Instant::now")]
    origin: Instant,
    #[serde(skip)]
    running: HashMap<String, Instant>,
}

impl Default for Timing {
    fn default() -> Self {
        Self::new()
    }
}

impl Timing {
    pub fn new() -> Self {
        Self {
            runtimes: BTreeMap::new(),
            timestamps: BTreeMap::new(),
            origin: Instant::now(),
            running: HashMap::new(),
        }
    }

    pub fn start(&mut self, name: &str) {
        self.running.insert(name.to_string(), Instant::now());
    }

    /// Stops the clock started by `start(name)` and records it.
    pub fn time(&mut self, name: &str) -> Option<Duration> {
        let Some(started) = self.running.remove(name) else {
            warn!("Timing: '{}' was never started", name);
            return None;
        };
        let elapsed = started.elapsed();
        let begin = started.duration_since(self.origin).as_secs_f64();
        self.add(name, elapsed, (begin, begin + elapsed.as_secs_f64()));
        Some(elapsed)
    }

    /// Records an externally measured duration ending now.
    pub fn record(&mut self, name: &str, elapsed: Duration) {
        let end = self.origin.elapsed().as_secs_f64();
        self.add(name, elapsed, ((end - elapsed.as_secs_f64()).max(0.0), end));
    }

    fn add(&mut self, name: &str, elapsed: Duration, stamp: Stamp) {
        *self.runtimes.entry(name.to_string()).or_insert(0.0) += elapsed.as_secs_f64();
        self.timestamps
            .entry(name.to_string())
            .or_default()
            .push(stamp);
    }

    /// Accumulated seconds under `name`, zero when never recorded.
    pub fn runtime(&self, name: &str) -> f64 {
        self.runtimes.get(name).copied().unwrap_or(0.0)
    }

    pub fn calls(&self, name: &str) -> usize {
        self.timestamps.get(name).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.runtimes.is_empty()
    }
}

impl AddAssign<&Timing> for Timing {
    fn add_assign(&mut self, other: &Timing) {
        for (name, secs) in &other.runtimes {
            *self.runtimes.entry(name.clone()).or_insert(0.0) += secs;
        }
        for (name, stamps) in &other.timestamps {
            self.timestamps
                .entry(name.clone())
                .or_default()
                .extend_from_slice(stamps);
        }
    }
}

impl AddAssign<Timing> for Timing {
    fn add_assign(&mut self, other: Timing) {
        *self += &other;
    }
}

impl Sum for Timing {
    fn sum<I: Iterator<Item = Timing>>(iter: I) -> Self {
        iter.fold(Timing::new(), |mut acc, t| {
            acc += t;
            acc
        })
    }
}
