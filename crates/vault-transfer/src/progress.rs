use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Transfer speed over a sliding window of samples.
///
/// The host tool renders progress; the core only accounts bytes. The chunk
/// loop feeds one sample per chunk and the façade can expose bytes/sec and
/// an ETA without the core knowing anything about terminals.
#[derive(Debug)]
pub struct SpeedCalculator {
    inner: Mutex<SpeedInner>,
}

#[derive(Debug)]
struct Sample {
    bytes: i64,
    at: Instant,
}

#[derive(Debug)]
struct SpeedInner {
    samples: Vec<Sample>,
    window: Duration,
    max_samples: usize,
}

impl SpeedCalculator {
    /// Creates a calculator with a 5 s window and at most 100 samples.
    pub fn new() -> Self {
        Self::with_window(Duration::from_secs(5), 100)
    }

    pub fn with_window(window: Duration, max_samples: usize) -> Self {
        Self {
            inner: Mutex::new(SpeedInner {
                samples: Vec::new(),
                window,
                max_samples,
            }),
        }
    }

    /// Records `bytes` transferred at the current instant.
    pub fn add_sample(&self, bytes: i64) {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();
        inner.samples.push(Sample { bytes, at: now });

        let cutoff = now - inner.window;
        inner.samples.retain(|s| s.at >= cutoff);
        if inner.samples.len() > inner.max_samples {
            let excess = inner.samples.len() - inner.max_samples;
            inner.samples.drain(..excess);
        }
    }

    /// Average speed in bytes/second within the window; 0.0 with fewer than
    /// two samples.
    pub fn bytes_per_second(&self) -> f64 {
        let inner = self.inner.lock().unwrap();
        if inner.samples.len() < 2 {
            return 0.0;
        }
        let first = &inner.samples[0];
        let last = &inner.samples[inner.samples.len() - 1];
        let elapsed = last.at.duration_since(first.at);
        if elapsed.is_zero() {
            return 0.0;
        }
        let total: i64 = inner.samples.iter().map(|s| s.bytes).sum();
        total as f64 / elapsed.as_secs_f64()
    }

    /// Estimated time to transfer `remaining` bytes; `None` at zero speed.
    pub fn eta(&self, remaining: i64) -> Option<Duration> {
        let speed = self.bytes_per_second();
        if speed <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining as f64 / speed))
    }

    /// Drops all recorded samples.
    pub fn reset(&self) {
        self.inner.lock().unwrap().samples.clear();
    }
}

impl Default for SpeedCalculator {
    fn default() -> Self {
        Self::new()
    }
}
