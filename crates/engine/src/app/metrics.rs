use std::time::{Duration, Instant};

/// Per-interval loop health, logged as `loop_metrics`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub tps: f32,
    pub tick_time_ms: f32,
    pub slowest_tick_ms: f32,
    pub entity_count: usize,
}

#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    window_start: Instant,
    window: Duration,
    ticks: u32,
    busy: Duration,
    slowest: Duration,
}

impl MetricsAccumulator {
    pub(crate) fn new(window: Duration) -> Self {
        Self::starting_at(Instant::now(), window)
    }

    pub(crate) fn starting_at(window_start: Instant, window: Duration) -> Self {
        Self {
            window_start,
            window,
            ticks: 0,
            busy: Duration::ZERO,
            slowest: Duration::ZERO,
        }
    }

    pub(crate) fn record_tick(&mut self, tick_time: Duration) {
        self.ticks = self.ticks.saturating_add(1);
        self.busy = self.busy.saturating_add(tick_time);
        self.slowest = self.slowest.max(tick_time);
    }

    /// Closes the window once it has run its length; counters restart at
    /// `now`.
    pub(crate) fn maybe_snapshot(
        &mut self,
        now: Instant,
        entity_count: usize,
    ) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.window {
            return None;
        }

        let tick_time_ms = match self.ticks {
            0 => 0.0,
            ticks => self.busy.as_secs_f32() * 1000.0 / ticks as f32,
        };
        let snapshot = LoopMetricsSnapshot {
            tps: self.ticks as f32 / elapsed.as_secs_f32().max(f32::EPSILON),
            tick_time_ms,
            slowest_tick_ms: self.slowest.as_secs_f32() * 1000.0,
            entity_count,
        };

        *self = Self::starting_at(now, self.window);
        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_reports_rate_mean_and_slowest_tick() {
        let base = Instant::now();
        let mut metrics = MetricsAccumulator::starting_at(base, Duration::from_secs(2));
        for ms in [1, 2, 3, 6] {
            metrics.record_tick(Duration::from_millis(ms));
        }

        let snapshot = metrics
            .maybe_snapshot(base + Duration::from_secs(2), 42)
            .expect("window closed");

        assert!((snapshot.tps - 2.0).abs() < 0.01);
        assert!((snapshot.tick_time_ms - 3.0).abs() < 0.001);
        assert!((snapshot.slowest_tick_ms - 6.0).abs() < 0.001);
        assert_eq!(snapshot.entity_count, 42);
    }

    #[test]
    fn open_window_yields_nothing() {
        let base = Instant::now();
        let mut metrics = MetricsAccumulator::starting_at(base, Duration::from_secs(1));
        metrics.record_tick(Duration::from_millis(1));

        assert!(metrics
            .maybe_snapshot(base + Duration::from_millis(999), 0)
            .is_none());
    }

    #[test]
    fn closing_a_window_starts_an_empty_one() {
        let base = Instant::now();
        let mut metrics = MetricsAccumulator::starting_at(base, Duration::from_secs(1));
        metrics.record_tick(Duration::from_millis(9));
        assert!(metrics
            .maybe_snapshot(base + Duration::from_secs(1), 3)
            .is_some());

        let idle = metrics
            .maybe_snapshot(base + Duration::from_secs(2), 3)
            .expect("second window");
        assert_eq!(idle.tps, 0.0);
        assert_eq!(idle.slowest_tick_ms, 0.0);
    }
}
