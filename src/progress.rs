/*!
 * Transfer progress reporting
 *
 * The host injects a [`ProgressSink`]; transfers report through a
 * [`ProgressThrottle`] so the sink sees bounded-frequency, monotonically
 * non-decreasing updates and always the final one.
 */

use std::time::{Duration, Instant};

/// Receives `(bytes_transferred, total_bytes)` updates
///
/// `total_bytes` is zero when the size is unknown.
pub trait ProgressSink: Send + Sync {
    fn update(&self, transferred: u64, total: u64);
}

/// Fraction complete in `[0, 1]`; an empty transfer counts as complete
pub fn fraction(transferred: u64, total: u64) -> f64 {
    if total == 0 {
        1.0
    } else {
        (transferred as f64 / total as f64).min(1.0)
    }
}

impl<F> ProgressSink for F
where
    F: Fn(u64, u64) + Send + Sync,
{
    fn update(&self, transferred: u64, total: u64) {
        self(transferred, total)
    }
}

/// Sink that discards every update
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn update(&self, _transferred: u64, _total: u64) {}
}

/// Default minimum time between two updates
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

/// Rate limiter in front of a sink
pub struct ProgressThrottle<'a> {
    sink: &'a dyn ProgressSink,
    interval: Duration,
    total: u64,
    reported: u64,
    last_emit: Option<Instant>,
}

impl<'a> ProgressThrottle<'a> {
    pub fn new(sink: &'a dyn ProgressSink, total: u64, interval: Duration) -> Self {
        Self {
            sink,
            interval,
            total,
            reported: 0,
            last_emit: None,
        }
    }

    /// Report the running byte count; may be skipped if too soon
    pub fn report(&mut self, transferred: u64) {
        let due = self
            .last_emit
            .map_or(true, |last| last.elapsed() >= self.interval);
        if due {
            self.emit(transferred);
        }
    }

    /// Report the final byte count unconditionally
    pub fn finish(&mut self, transferred: u64) {
        self.emit(transferred);
    }

    fn emit(&mut self, transferred: u64) {
        self.reported = self.reported.max(transferred);
        self.last_emit = Some(Instant::now());
        self.sink.update(self.reported, self.total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_closure_sink() {
        let seen = Mutex::new(Vec::new());
        let sink = |done: u64, total: u64| seen.lock().unwrap().push((done, total));
        sink.update(5, 10);
        assert_eq!(*seen.lock().unwrap(), vec![(5, 10)]);
    }

    #[test]
    fn test_throttle_skips_rapid_updates_but_emits_final() {
        let seen = Mutex::new(Vec::new());
        let sink = |done: u64, total: u64| seen.lock().unwrap().push((done, total));
        let mut throttle = ProgressThrottle::new(&sink, 100, Duration::from_secs(3600));

        for done in (10..=100).step_by(10) {
            throttle.report(done);
        }
        throttle.finish(100);

        assert_eq!(*seen.lock().unwrap(), vec![(10, 100), (100, 100)]);
    }

    #[test]
    fn test_throttle_is_monotonic() {
        let seen = Mutex::new(Vec::new());
        let sink = |done: u64, _total: u64| seen.lock().unwrap().push(done);
        let mut throttle = ProgressThrottle::new(&sink, 100, Duration::ZERO);

        throttle.report(50);
        throttle.report(20);
        throttle.finish(100);

        let seen = seen.lock().unwrap();
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.last(), Some(&100));
    }

    #[test]
    fn test_fraction() {
        assert_eq!(fraction(0, 0), 1.0);
        assert_eq!(fraction(5, 10), 0.5);
        assert_eq!(fraction(20, 10), 1.0);
    }
}
