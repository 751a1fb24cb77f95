use std::time::{Duration, Instant};

/// Frame timing snapshot.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Seconds since the clock was started.
    pub t: f32,

    /// Time elapsed since the previous tick, in seconds. Zero on the first tick.
    pub dt: f32,

    /// Monotonic timestamp taken at the tick.
    pub now: Instant,
}

impl FrameTime {
    /// Snapshot for a frame that has not advanced simulated time.
    pub fn zero(now: Instant) -> Self {
        Self { t: 0.0, dt: 0.0, now }
    }
}

/// Monotonic simulation clock.
///
/// Unlike a UI frame clock there is no lower clamp: the first frame after
/// `start` must observe `dt == 0` so that velocities do not jump the scene.
/// An optional upper clamp keeps integration stable after debugger pauses.
#[derive(Debug, Clone)]
pub struct SimClock {
    start: Option<Instant>,
    last: Option<Instant>,
    dt_max: Option<Duration>,
}

impl SimClock {
    /// Creates an unstarted clock without a delta-time clamp.
    pub fn new() -> Self {
        Self {
            start: None,
            last: None,
            dt_max: None,
        }
    }

    /// Creates an unstarted clock whose delta time never exceeds `dt_max`.
    pub fn with_max_step(dt_max: Duration) -> Self {
        Self {
            dt_max: Some(dt_max),
            ..Self::new()
        }
    }

    /// Returns true once `start`/`start_at` or the first tick happened.
    pub fn is_started(&self) -> bool {
        self.start.is_some()
    }

    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    /// Sets the time origin. The next tick reports `dt == 0` if it happens at `now`.
    pub fn start_at(&mut self, now: Instant) {
        self.start = Some(now);
        self.last = None;
    }

    /// Forgets the time origin; the next tick restarts the clock.
    pub fn reset(&mut self) {
        self.start = None;
        self.last = None;
    }

    /// Advances the clock to the current instant.
    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    /// Advances the clock to `now`.
    ///
    /// Instants earlier than the previous tick saturate to `dt == 0`.
    pub fn tick_at(&mut self, now: Instant) -> FrameTime {
        let start = *self.start.get_or_insert(now);

        let mut dt = match self.last {
            Some(last) => now.saturating_duration_since(last),
            None => Duration::ZERO,
        };
        if let Some(max) = self.dt_max {
            dt = dt.min(max);
        }

        self.last = Some(now);

        FrameTime {
            t: now.saturating_duration_since(start).as_secs_f32(),
            dt: dt.as_secs_f32(),
            now,
        }
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    // ── first tick ──────────────────────────────────────────────────────

    #[test]
    fn first_tick_has_zero_dt() {
        let base = Instant::now();
        let mut clock = SimClock::new();
        clock.start_at(base);

        let ft = clock.tick_at(base + ms(40));
        assert_eq!(ft.dt, 0.0);
        assert!((ft.t - 0.04).abs() < 1e-6);
    }

    #[test]
    fn unstarted_clock_starts_on_first_tick() {
        let base = Instant::now();
        let mut clock = SimClock::new();

        let ft = clock.tick_at(base);
        assert!(clock.is_started());
        assert_eq!(ft.dt, 0.0);
        assert_eq!(ft.t, 0.0);
    }

    // ── stepping ────────────────────────────────────────────────────────

    #[test]
    fn dt_is_difference_between_ticks() {
        let base = Instant::now();
        let mut clock = SimClock::new();
        clock.start_at(base);

        clock.tick_at(base);
        let ft = clock.tick_at(base + ms(16));
        assert!((ft.dt - 0.016).abs() < 1e-6);
    }

    #[test]
    fn max_step_clamps_long_stalls() {
        let base = Instant::now();
        let mut clock = SimClock::with_max_step(ms(250));
        clock.start_at(base);

        clock.tick_at(base);
        let ft = clock.tick_at(base + ms(5_000));
        assert!((ft.dt - 0.25).abs() < 1e-6);
        // Absolute time is not clamped.
        assert!((ft.t - 5.0).abs() < 1e-4);
    }

    #[test]
    fn backwards_instant_saturates() {
        let base = Instant::now() + ms(100);
        let mut clock = SimClock::new();
        clock.start_at(base);

        clock.tick_at(base);
        let ft = clock.tick_at(base - ms(50));
        assert_eq!(ft.dt, 0.0);
    }

    #[test]
    fn reset_restarts_time() {
        let base = Instant::now();
        let mut clock = SimClock::new();
        clock.start_at(base);
        clock.tick_at(base + ms(500));

        clock.reset();
        let ft = clock.tick_at(base + ms(900));
        assert_eq!(ft.t, 0.0);
        assert_eq!(ft.dt, 0.0);
    }
}
