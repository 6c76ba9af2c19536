use bevy::prelude::{ResMut, Resource};

/// Smallest duration a timer will accept. Out-of-range tunables are clamped
/// rather than rejected.
const MIN_TIMER_DURATION: f64 = 0.01;

/// Fixed-step mission clock; every system in the tick chain observes the
/// same `now`.
#[derive(Resource, Debug, Clone, Copy)]
pub struct MissionClock {
    pub elapsed: f64,
    pub dt: f64,
    pub tick: u64,
}

impl MissionClock {
    pub fn with_dt(dt: f64) -> Self {
        Self {
            elapsed: 0.0,
            dt: dt.max(MIN_TIMER_DURATION),
            tick: 0,
        }
    }

    pub fn now(&self) -> f64 {
        self.elapsed
    }

    pub fn reset(&mut self) {
        self.elapsed = 0.0;
        self.tick = 0;
    }
}

impl Default for MissionClock {
    fn default() -> Self {
        Self::with_dt(0.1)
    }
}

pub fn advance_clock(mut clock: ResMut<MissionClock>) {
    clock.elapsed += clock.dt;
    clock.tick += 1;
}

/// Countdown timer with an explicit not-started state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum CountdownTimer {
    #[default]
    Inactive,
    Pending {
        deadline: f64,
    },
}

impl CountdownTimer {
    /// Arm the timer `duration` seconds from `now`; durations clamp to a
    /// small positive minimum.
    pub fn start(&mut self, now: f64, duration: f64) {
        *self = CountdownTimer::Pending {
            deadline: now + duration.max(MIN_TIMER_DURATION),
        };
    }

    pub fn invalidate(&mut self) {
        *self = CountdownTimer::Inactive;
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, CountdownTimer::Pending { .. })
    }

    /// True once the deadline has passed. An inactive timer never elapses.
    pub fn elapsed(&self, now: f64) -> bool {
        match self {
            CountdownTimer::Inactive => false,
            CountdownTimer::Pending { deadline } => now >= *deadline,
        }
    }

    pub fn remaining(&self, now: f64) -> Option<f64> {
        match self {
            CountdownTimer::Inactive => None,
            CountdownTimer::Pending { deadline } => Some((deadline - now).max(0.0)),
        }
    }

    /// Pull the deadline earlier so it fires within `max_remaining` seconds.
    /// Never pushes a deadline later; arms the timer if it was inactive.
    pub fn fast_forward(&mut self, now: f64, max_remaining: f64) {
        let capped = now + max_remaining.max(MIN_TIMER_DURATION);
        match self {
            CountdownTimer::Inactive => *self = CountdownTimer::Pending { deadline: capped },
            CountdownTimer::Pending { deadline } => {
                if *deadline > capped {
                    *deadline = capped;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_start_has_positive_remaining() {
        let mut timer = CountdownTimer::default();
        timer.start(10.0, 0.0);
        assert!(timer.is_pending());
        assert!(timer.remaining(10.0).unwrap() > 0.0);

        timer.start(10.0, -5.0);
        assert!(timer.remaining(10.0).unwrap() > 0.0);
    }

    #[test]
    fn inactive_never_elapses() {
        let timer = CountdownTimer::Inactive;
        assert!(!timer.elapsed(f64::MAX));
        assert_eq!(timer.remaining(0.0), None);
    }

    #[test]
    fn elapses_at_deadline() {
        let mut timer = CountdownTimer::default();
        timer.start(0.0, 2.0);
        assert!(!timer.elapsed(1.9));
        assert!(timer.elapsed(2.0));
        assert!(timer.elapsed(100.0));
    }

    #[test]
    fn fast_forward_only_shortens() {
        let mut timer = CountdownTimer::default();
        timer.start(0.0, 60.0);
        timer.fast_forward(0.0, 5.0);
        assert!(timer.remaining(0.0).unwrap() <= 5.0);

        // A later fast-forward with a larger window must not push it back out.
        timer.fast_forward(0.0, 30.0);
        assert!(timer.remaining(0.0).unwrap() <= 5.0);
    }

    #[test]
    fn fast_forward_arms_inactive_timer() {
        let mut timer = CountdownTimer::Inactive;
        timer.fast_forward(3.0, 2.0);
        assert!(timer.is_pending());
        assert!(timer.elapsed(5.0));
    }

    #[test]
    fn clock_advances_by_fixed_dt() {
        let mut clock = MissionClock::with_dt(0.25);
        clock.elapsed += clock.dt;
        clock.tick += 1;
        assert_eq!(clock.tick, 1);
        assert!((clock.now() - 0.25).abs() < f64::EPSILON);
    }
}
