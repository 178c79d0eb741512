use std::time::Duration;

/// Fibonacci backoff iterator with an optional cap.
///
/// Yields `base, base, 2*base, 3*base, 5*base, ...` and never ends; the
/// retry loop bounds the total wait with an outer deadline. Retryability is
/// a predicate on the last error, decided by the caller.
#[derive(Debug, Clone)]
pub struct Fibonacci {
    curr: Duration,
    next: Duration,
    cap: Option<Duration>,
}

impl Fibonacci {
    /// Creates a backoff starting at `base`.
    pub fn new(base: Duration) -> Self {
        Self {
            curr: base,
            next: base,
            cap: None,
        }
    }

    /// Caps every yielded delay at `cap`.
    pub fn capped(mut self, cap: Duration) -> Self {
        self.cap = Some(cap);
        self
    }
}

impl Iterator for Fibonacci {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let mut delay = self.curr;
        if let Some(cap) = self.cap {
            delay = delay.min(cap);
        }
        let sum = self.curr.saturating_add(self.next);
        self.curr = self.next;
        self.next = sum;
        Some(delay)
    }
}
