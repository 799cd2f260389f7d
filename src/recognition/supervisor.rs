//! Restart and keep-alive timers
//!
//! The supervisor owns every pending deadline of the recognition layer. It does
//! not spawn tasks: the controller sleeps until [`Supervisor::next_deadline`]
//! and then calls [`Supervisor::poll`] to collect what fired.

use std::time::Duration;

use tokio::time::Instant;

/// A deadline that elapsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerFired {
    Restart,
    Reinit,
    KeepAlive,
}

/// Shortest keep-alive interval the supervisor will run with
pub const MIN_KEEP_ALIVE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct Supervisor {
    restart_delay: Duration,
    reinit_delay: Duration,
    keep_alive_interval: Duration,
    pending_restart: Option<Instant>,
    pending_reinit: Option<Instant>,
    keep_alive: Option<Instant>,
}

impl Supervisor {
    pub fn new(restart_delay: Duration, reinit_delay: Duration, keep_alive_interval: Duration) -> Self {
        Self {
            restart_delay,
            reinit_delay,
            keep_alive_interval: keep_alive_interval.max(MIN_KEEP_ALIVE),
            pending_restart: None,
            pending_reinit: None,
            keep_alive: None,
        }
    }

    /// Debounced restart. Replaces any restart already pending.
    pub fn schedule_restart(&mut self, now: Instant) {
        if self.pending_reinit.is_some() {
            // the re-initialization will start the engine
            return;
        }
        if self.pending_restart.is_some() {
            tracing::debug!("Replacing pending restart");
        }
        self.pending_restart = deadline(now, self.restart_delay);
    }

    /// Restart unless one is already on its way. Keep-alive ticks use this
    /// so they cannot keep pushing a pending restart back.
    pub fn ensure_restart(&mut self, now: Instant) {
        if !self.restart_pending() {
            self.schedule_restart(now);
        }
    }

    pub fn schedule_reinit(&mut self, now: Instant) {
        // A re-initialization supersedes a plain restart
        self.pending_restart = None;
        self.pending_reinit = deadline(now, self.reinit_delay);
    }

    pub fn cancel_restarts(&mut self) {
        self.pending_restart = None;
        self.pending_reinit = None;
    }

    pub fn arm_keep_alive(&mut self, now: Instant) {
        self.keep_alive = deadline(now, self.keep_alive_interval);
    }

    pub fn disarm_keep_alive(&mut self) {
        self.keep_alive = None;
    }

    pub fn restart_pending(&self) -> bool {
        self.pending_restart.is_some() || self.pending_reinit.is_some()
    }

    pub fn keep_alive_armed(&self) -> bool {
        self.keep_alive.is_some()
    }

    /// Earliest pending deadline, if any
    pub fn next_deadline(&self) -> Option<Instant> {
        [self.pending_restart, self.pending_reinit, self.keep_alive]
            .into_iter()
            .flatten()
            .min()
    }

    /// Collect every timer due at `now`. The keep-alive re-arms itself.
    pub fn poll(&mut self, now: Instant) -> Vec<TimerFired> {
        let mut fired = Vec::new();

        if self.pending_reinit.is_some_and(|at| at <= now) {
            self.pending_reinit = None;
            fired.push(TimerFired::Reinit);
        }
        if self.pending_restart.is_some_and(|at| at <= now) {
            self.pending_restart = None;
            fired.push(TimerFired::Restart);
        }
        if let Some(at) = self.keep_alive {
            if at <= now {
                self.keep_alive = deadline(now, self.keep_alive_interval);
                fired.push(TimerFired::KeepAlive);
            }
        }

        fired
    }
}

/// `None` when the delay is too large to represent, which never fires
fn deadline(now: Instant, delay: Duration) -> Option<Instant> {
    let at = now.checked_add(delay);
    if at.is_none() {
        tracing::warn!(?delay, "Timer delay out of range, not scheduling");
    }
    at
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supervisor() -> Supervisor {
        Supervisor::new(
            Duration::from_millis(500),
            Duration::from_secs(1),
            Duration::from_secs(10),
        )
    }

    #[test]
    fn test_restart_is_debounced() {
        let mut sup = supervisor();
        let t0 = Instant::now();
        sup.schedule_restart(t0);
        sup.schedule_restart(t0 + Duration::from_millis(300));

        assert!(sup.poll(t0 + Duration::from_millis(600)).is_empty());
        assert_eq!(
            sup.poll(t0 + Duration::from_millis(800)),
            vec![TimerFired::Restart]
        );
        assert!(!sup.restart_pending());
    }

    #[test]
    fn test_cancel_clears_restart_and_reinit() {
        let mut sup = supervisor();
        let t0 = Instant::now();
        sup.schedule_restart(t0);
        sup.schedule_reinit(t0);
        sup.cancel_restarts();
        assert!(sup.next_deadline().is_none());
        assert!(sup.poll(t0 + Duration::from_secs(5)).is_empty());
    }

    #[test]
    fn test_reinit_supersedes_restart() {
        let mut sup = supervisor();
        let t0 = Instant::now();
        sup.schedule_restart(t0);
        sup.schedule_reinit(t0);
        assert_eq!(sup.next_deadline(), Some(t0 + Duration::from_secs(1)));
        assert_eq!(sup.poll(t0 + Duration::from_secs(1)), vec![TimerFired::Reinit]);
    }

    #[test]
    fn test_restart_ignored_while_reinit_pending() {
        let mut sup = supervisor();
        let t0 = Instant::now();
        sup.schedule_reinit(t0);
        sup.schedule_restart(t0);
        assert!(sup.poll(t0 + Duration::from_millis(500)).is_empty());
        assert_eq!(sup.poll(t0 + Duration::from_secs(1)), vec![TimerFired::Reinit]);
    }

    #[test]
    fn test_keep_alive_rearms() {
        let mut sup = supervisor();
        let t0 = Instant::now();
        sup.arm_keep_alive(t0);
        assert_eq!(sup.next_deadline(), Some(t0 + Duration::from_secs(10)));

        let t1 = t0 + Duration::from_secs(10);
        assert_eq!(sup.poll(t1), vec![TimerFired::KeepAlive]);
        assert_eq!(sup.next_deadline(), Some(t1 + Duration::from_secs(10)));

        sup.disarm_keep_alive();
        assert!(sup.next_deadline().is_none());
    }

    #[test]
    fn test_next_deadline_is_earliest() {
        let mut sup = supervisor();
        let t0 = Instant::now();
        sup.arm_keep_alive(t0);
        sup.schedule_restart(t0);
        assert_eq!(sup.next_deadline(), Some(t0 + Duration::from_millis(500)));
    }

    #[test]
    fn test_keep_alive_does_not_postpone_pending_restart() {
        let mut sup = supervisor();
        let t0 = Instant::now();
        sup.ensure_restart(t0);
        sup.ensure_restart(t0 + Duration::from_millis(400));
        assert_eq!(
            sup.poll(t0 + Duration::from_millis(500)),
            vec![TimerFired::Restart]
        );

        // Also a no-op while a re-initialization is pending
        sup.schedule_reinit(t0);
        sup.ensure_restart(t0);
        assert_eq!(sup.next_deadline(), Some(t0 + Duration::from_secs(1)));
    }

    #[test]
    fn test_zero_keep_alive_is_clamped() {
        let mut sup = Supervisor::new(
            Duration::from_millis(500),
            Duration::from_secs(1),
            Duration::ZERO,
        );
        let t0 = Instant::now();
        sup.arm_keep_alive(t0);
        assert!(sup.poll(t0).is_empty());
        assert_eq!(sup.next_deadline(), Some(t0 + MIN_KEEP_ALIVE));
    }

    #[test]
    fn test_oversized_delays_never_fire() {
        let mut sup = Supervisor::new(Duration::MAX, Duration::MAX, Duration::MAX);
        let t0 = Instant::now();
        sup.arm_keep_alive(t0);
        sup.schedule_restart(t0);
        assert!(sup.next_deadline().is_none());
        assert!(!sup.restart_pending());

        sup.schedule_reinit(t0);
        assert!(sup.next_deadline().is_none());
    }
}
