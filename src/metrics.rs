//! Per-day byte and timing accounting. Printed as plain text at
//! end-of-run; no external metrics crate.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Accumulated per-phase byte counters and wall-clock timings across a run.
#[derive(Debug, Default)]
pub struct Metrics {
    comm_bytes: BTreeMap<&'static str, u64>,
    phase_time: BTreeMap<&'static str, Duration>,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics::default()
    }

    /// Add `bytes` to the running total for `phase` (e.g. "updates",
    /// "candidates").
    pub fn record_bytes(&mut self, phase: &'static str, bytes: u64) {
        *self.comm_bytes.entry(phase).or_insert(0) += bytes;
    }

    /// Time a closure and add its duration to `phase`'s running total.
    pub fn time<R>(&mut self, phase: &'static str, f: impl FnOnce() -> R) -> R {
        let start = Instant::now();
        let result = f();
        *self.phase_time.entry(phase).or_insert(Duration::ZERO) += start.elapsed();
        result
    }

    /// Render the accumulated metrics as plain text for end-of-run output.
    pub fn report(&self) -> String {
        let mut out = String::new();
        out.push_str("comm bytes by phase:\n");
        for (phase, bytes) in &self.comm_bytes {
            out.push_str(&format!("  {phase}: {bytes} bytes\n"));
        }
        out.push_str("phase timings:\n");
        for (phase, dur) in &self.phase_time {
            out.push_str(&format!("  {phase}: {:.3}ms\n", dur.as_secs_f64() * 1000.0));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_accumulate_across_calls() {
        let mut m = Metrics::new();
        m.record_bytes("updates", 100);
        m.record_bytes("updates", 50);
        assert_eq!(*m.comm_bytes.get("updates").unwrap(), 150);
    }

    #[test]
    fn time_accumulates_duration() {
        let mut m = Metrics::new();
        m.time("daily", || {
            let mut acc = 0u64;
            for i in 0..1000 {
                acc += i;
            }
            acc
        });
        assert!(m.phase_time.contains_key("daily"));
    }
}
