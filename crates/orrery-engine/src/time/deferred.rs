use std::time::{Duration, Instant};

/// A single cancellable one-shot continuation.
///
/// Arming replaces whatever was pending, so at most one continuation exists
/// at a time. The owner polls with `take_due(now)`; nothing fires on its own.
/// The runtime sleeps until `deadline()` and wakes the owner then.
#[derive(Debug, Clone)]
pub struct DeferredTimer<T> {
    pending: Option<(Instant, T)>,
}

impl<T> Default for DeferredTimer<T> {
    fn default() -> Self {
        Self { pending: None }
    }
}

impl<T> DeferredTimer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `payload` to become due `delay` after `now`.
    ///
    /// Returns the continuation that was superseded, if any.
    pub fn arm(&mut self, now: Instant, delay: Duration, payload: T) -> Option<T> {
        self.pending.replace((now + delay, payload)).map(|(_, p)| p)
    }

    /// Drops the pending continuation. Returns it when one existed.
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(_, p)| p)
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&T> {
        self.pending.as_ref().map(|(_, p)| p)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(at, _)| *at)
    }

    /// Removes and returns the payload if its deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((at, _)) if *at <= now => self.pending.take().map(|(_, p)| p),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_only_after_deadline() {
        let t0 = Instant::now();
        let mut timer = DeferredTimer::new();
        timer.arm(t0, Duration::from_millis(50), "medium");
        assert_eq!(timer.take_due(t0 + Duration::from_millis(49)), None);
        assert_eq!(timer.take_due(t0 + Duration::from_millis(50)), Some("medium"));
        assert!(!timer.is_armed());
    }

    #[test]
    fn arming_supersedes_pending() {
        let t0 = Instant::now();
        let mut timer = DeferredTimer::new();
        timer.arm(t0, Duration::from_millis(10), 1);
        assert_eq!(timer.arm(t0, Duration::from_millis(20), 2), Some(1));
        assert_eq!(timer.deadline(), Some(t0 + Duration::from_millis(20)));
    }

    #[test]
    fn cancel_clears() {
        let mut timer = DeferredTimer::new();
        timer.arm(Instant::now(), Duration::ZERO, ());
        assert_eq!(timer.cancel(), Some(()));
        assert_eq!(timer.take_due(Instant::now()), None);
    }
}
