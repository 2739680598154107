//! Wall-clock timing of scheduler stages.
//!
//! Stages are timed with RAII guards: [`TimingAggregator::span`] starts a
//! clock and the returned [`SpanGuard`] records the elapsed time under the
//! span name when it is dropped.
//!
//! ```ignore
//! {
//!     let _g = timings.span("resolve-mechanics");
//!     resolver.resolve(&mut manager, &index)?;
//! }
//! ```
//!
//! Names keep first-recorded order, so a report lists stages in pipeline
//! order. Each closed span is also emitted as a `trace!` record.

use std::fmt;
use std::time::{Duration, Instant};

use log::trace;


/// Accumulated timing of one named span.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpanTiming {
    /// Number of recorded spans.
    pub calls: u64,
    /// Sum of all span durations.
    pub total: Duration,
    /// Longest single span.
    pub max: Duration,
}

impl SpanTiming {
    /// Average span duration.
    pub fn mean(&self) -> Duration {
        if self.calls == 0 {
            Duration::ZERO
        } else {
            self.total / self.calls as u32
        }
    }
}

/// Per-name timing totals.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TimingAggregator {
    entries: Vec<(&'static str, SpanTiming)>,
}

impl TimingAggregator {
    /// Creates an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one measurement under `name`.
    pub fn record(&mut self, name: &'static str, elapsed: Duration) {
        let entry = match self.entries.iter().position(|(n, _)| *n == name) {
            Some(i) => &mut self.entries[i].1,
            None => {
                self.entries.push((name, SpanTiming::default()));
                let last = self.entries.len() - 1;
                &mut self.entries[last].1
            }
        };
        entry.calls += 1;
        entry.total += elapsed;
        entry.max = entry.max.max(elapsed);
    }

    /// Starts timing `name` until the guard is dropped.
    pub fn span(&mut self, name: &'static str) -> SpanGuard<'_> {
        SpanGuard { aggregator: self, name, start: Instant::now() }
    }

    /// Timing recorded under `name`.
    pub fn get(&self, name: &str) -> Option<&SpanTiming> {
        self.entries.iter().find(|(n, _)| *n == name).map(|(_, t)| t)
    }

    /// Every span name with its timing, in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &SpanTiming)> + '_ {
        self.entries.iter().map(|(n, t)| (*n, t))
    }

    /// Sum of every recorded span.
    pub fn total(&self) -> Duration {
        self.entries.iter().map(|(_, t)| t.total).sum()
    }

    /// Drops every recorded timing.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl fmt::Display for TimingAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, timing) in &self.entries {
            writeln!(
                f,
                "{name:<24} calls={:<6} total={:>10.3?} mean={:>10.3?} max={:>10.3?}",
                timing.calls,
                timing.total,
                timing.mean(),
                timing.max
            )?;
        }
        Ok(())
    }
}

/// Records the elapsed time of a span when dropped.
pub struct SpanGuard<'a> {
    aggregator: &'a mut TimingAggregator,
    name: &'static str,
    start: Instant,
}

impl Drop for SpanGuard<'_> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        trace!("{} took {:?}", self.name, elapsed);
        self.aggregator.record(self.name, elapsed);
    }
}
