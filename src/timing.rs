use serde_derive::Serialize;
use std::time::{Duration, Instant};

/// Wall clock statistics of one pipeline stage, in milliseconds
#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct StageTiming {
    pub last: f32,
    pub avg: f32,
    pub min: f32,
    pub max: f32,
    pub count: u64,
}

impl StageTiming {
    pub fn push(&mut self, ms: f32) {
        self.count += 1;
        self.last = ms;

        if self.count == 1 {
            self.avg = ms;
            self.min = ms;
            self.max = ms;
        } else {
            self.avg += (ms - self.avg) / self.count as f32;
            self.min = self.min.min(ms);
            self.max = self.max.max(ms);
        }
    }

    #[inline]
    pub fn record(&mut self, elapsed: Duration) {
        self.push(elapsed.as_secs_f32() * 1000.0);
    }

    /// Runs `f` and records how long it took.
    pub fn time<T, F: FnOnce() -> T>(&mut self, f: F) -> T {
        let start = Instant::now();
        let out = f();
        self.record(start.elapsed());

        out
    }
}

#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct Timings {
    pub segmentation: StageTiming,
    pub tracking: StageTiming,
    pub fitting: StageTiming,
    pub total: StageTiming,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn keeps_running_statistics() {
        let mut t = StageTiming::default();
        for ms in [4.0, 2.0, 6.0] {
            t.push(ms);
        }

        assert_eq!(t.count, 3);
        assert_eq!(t.last, 6.0);
        assert_eq!(t.min, 2.0);
        assert_eq!(t.max, 6.0);
        assert_relative_eq!(t.avg, 4.0);
    }

    #[test]
    fn time_records_closure() {
        let mut t = StageTiming::default();
        let value = t.time(|| 21 * 2);

        assert_eq!(value, 42);
        assert_eq!(t.count, 1);
        assert!(t.last >= 0.0 && t.min == t.last && t.max == t.last);
    }
}
