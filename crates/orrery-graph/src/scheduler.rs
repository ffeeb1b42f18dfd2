//! Progressive refinement: a cheap pass right away, better ones once the
//! view has been still for a while.

use std::time::{Duration, Instant};

use orrery_engine::time::DeferredTimer;

/// Quality level of one pass; `uniform()` is what shaders see as `render_mode`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RenderMode {
    Draft,
    Medium,
    HighPass1,
    /// Alpha-blended refinement; no hard discard threshold.
    HighPass2,
    /// Off-screen color-id pass.
    Picking,
}

impl RenderMode {
    pub const fn uniform(self) -> u32 {
        match self {
            RenderMode::Draft => 0,
            RenderMode::Medium => 1,
            RenderMode::HighPass1 => 2,
            RenderMode::HighPass2 => 3,
            RenderMode::Picking => 4,
        }
    }

    pub const fn is_picking(self) -> bool {
        matches!(self, RenderMode::Picking)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// DRAFT → MEDIUM.
    pub medium_delay: Duration,
    /// MEDIUM → HIGH_PASS_1.
    pub high_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            medium_delay: Duration::from_millis(85),
            high_delay: Duration::from_millis(120),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SchedulerState {
    Idle,
    /// DRAFT runs on the next refresh.
    DraftPending,
    /// A deferred continuation is armed.
    Scheduled(RenderMode),
}

/// DRAFT → PICKING → MEDIUM → HIGH_PASS_1 → HIGH_PASS_2 state machine.
///
/// Invalidation never queues: it drops any armed continuation and restarts
/// at DRAFT.
#[derive(Debug, Clone, Default)]
pub struct RenderScheduler {
    config: SchedulerConfig,
    draft_pending: bool,
    continuation: DeferredTimer<RenderMode>,
}

impl RenderScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config, draft_pending: false, continuation: DeferredTimer::new() }
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    pub fn invalidate(&mut self) {
        if let Some(mode) = self.continuation.cancel() {
            log::trace!("scheduler: {mode:?} superseded by invalidate");
        }
        self.draft_pending = true;
    }

    /// Passes due at `now`, in the order they must run.
    pub fn poll(&mut self, now: Instant) -> Vec<RenderMode> {
        if self.draft_pending {
            self.draft_pending = false;
            self.continuation.arm(now, self.config.medium_delay, RenderMode::Medium);
            log::trace!("scheduler: DRAFT + PICKING, MEDIUM in {:?}", self.config.medium_delay);
            return vec![RenderMode::Draft, RenderMode::Picking];
        }
        match self.continuation.take_due(now) {
            Some(RenderMode::Medium) => {
                self.continuation.arm(now, self.config.high_delay, RenderMode::HighPass1);
                log::trace!("scheduler: MEDIUM, HIGH_PASS_1 in {:?}", self.config.high_delay);
                vec![RenderMode::Medium]
            }
            Some(RenderMode::HighPass1) => {
                log::trace!("scheduler: HIGH_PASS_1 + HIGH_PASS_2, idle");
                vec![RenderMode::HighPass1, RenderMode::HighPass2]
            }
            Some(other) => {
                log::warn!("scheduler: unexpected continuation {other:?}");
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    /// True when [`poll`](Self::poll) at `now` would return passes.
    pub fn wants_refresh(&self, now: Instant) -> bool {
        self.draft_pending || self.continuation.deadline().is_some_and(|d| d <= now)
    }

    /// When the armed continuation becomes due.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.continuation.deadline()
    }

    pub fn state(&self) -> SchedulerState {
        if self.draft_pending {
            return SchedulerState::DraftPending;
        }
        match self.continuation.pending() {
            Some(&mode) => SchedulerState::Scheduled(mode),
            None => SchedulerState::Idle,
        }
    }

    /// Drops all pending work (teardown).
    pub fn cancel(&mut self) {
        self.draft_pending = false;
        self.continuation.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    /// Drives the scheduler in 1 ms steps, collecting every pass.
    fn run(s: &mut RenderScheduler, from: Instant, until_ms: u64) -> Vec<RenderMode> {
        (0..=until_ms).flat_map(|t| s.poll(from + ms(t))).collect()
    }

    #[test]
    fn full_refinement_sequence() {
        let t0 = Instant::now();
        let mut s = RenderScheduler::default();
        s.invalidate();
        assert_eq!(s.state(), SchedulerState::DraftPending);
        assert_eq!(
            run(&mut s, t0, 400),
            vec![
                RenderMode::Draft,
                RenderMode::Picking,
                RenderMode::Medium,
                RenderMode::HighPass1,
                RenderMode::HighPass2,
            ]
        );
        assert_eq!(s.state(), SchedulerState::Idle);
    }

    #[test]
    fn continuation_delays() {
        let t0 = Instant::now();
        let mut s = RenderScheduler::default();
        s.invalidate();
        s.poll(t0);
        assert_eq!(s.next_deadline(), Some(t0 + ms(85)));
        assert!(!s.wants_refresh(t0 + ms(84)));
        assert!(s.poll(t0 + ms(84)).is_empty());
        assert_eq!(s.poll(t0 + ms(85)), vec![RenderMode::Medium]);
        assert_eq!(s.state(), SchedulerState::Scheduled(RenderMode::HighPass1));
        assert_eq!(s.next_deadline(), Some(t0 + ms(205)));
    }

    #[test]
    fn burst_of_invalidations_yields_one_sequence() {
        let t0 = Instant::now();
        let mut s = RenderScheduler::default();
        for _ in 0..10 {
            s.invalidate();
        }
        let passes = run(&mut s, t0, 400);
        assert_eq!(passes.iter().filter(|m| **m == RenderMode::Draft).count(), 1);
        assert_eq!(passes.iter().filter(|m| **m == RenderMode::HighPass2).count(), 1);
    }

    #[test]
    fn invalidate_mid_sequence_restarts_from_draft() {
        let t0 = Instant::now();
        let mut s = RenderScheduler::default();
        s.invalidate();
        s.poll(t0);
        assert_eq!(s.poll(t0 + ms(85)), vec![RenderMode::Medium]);

        // Dragging: the armed HIGH_PASS_1 never runs.
        s.invalidate();
        assert_eq!(s.next_deadline(), None);
        let t1 = t0 + ms(150);
        let passes = run(&mut s, t1, 400);
        assert_eq!(
            passes,
            vec![
                RenderMode::Draft,
                RenderMode::Picking,
                RenderMode::Medium,
                RenderMode::HighPass1,
                RenderMode::HighPass2,
            ]
        );
    }

    #[test]
    fn cancel_goes_idle() {
        let mut s = RenderScheduler::default();
        s.invalidate();
        s.poll(Instant::now());
        s.cancel();
        assert_eq!(s.state(), SchedulerState::Idle);
        assert!(s.next_deadline().is_none());
    }

    #[test]
    fn picking_mode_is_distinct() {
        assert!(RenderMode::Picking.is_picking());
        assert_eq!(RenderMode::HighPass2.uniform(), 3);
    }
}
