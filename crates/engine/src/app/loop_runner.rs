use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::metrics::MetricsAccumulator;

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    /// Wall-clock limit for headless runs; `None` runs until the simulation
    /// asks to stop.
    pub run_duration: Option<Duration>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            run_duration: None,
        }
    }
}

impl LoopConfig {
    pub fn fixed_dt_seconds(&self) -> f64 {
        1.0 / self.target_tps.max(1) as f64
    }
}

/// Something the fixed-step loop can drive.
pub trait Simulation {
    fn tick(&mut self, fixed_dt_seconds: f64);

    fn should_stop(&self) -> bool {
        false
    }

    fn entity_count(&self) -> usize;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub dropped_backlog: Duration,
    pub elapsed: Duration,
}

/// Runs `simulation` at `target_tps` against the wall clock until the
/// configured duration elapses or the simulation stops itself.
pub fn run_headless<S: Simulation + ?Sized>(config: &LoopConfig, simulation: &mut S) -> RunSummary {
    let target_tps = config.target_tps.max(1);
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);
    let fixed_dt_seconds = config.fixed_dt_seconds();

    info!(
        target_tps,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        run_duration_ms = config.run_duration.map(|limit| limit.as_millis() as u64),
        "loop_config"
    );

    let started = Instant::now();
    let mut summary = RunSummary::default();
    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = started;
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval);

    loop {
        if simulation.should_stop() {
            info!(reason = "simulation", "shutdown_requested");
            break;
        }
        if config
            .run_duration
            .is_some_and(|limit| started.elapsed() >= limit)
        {
            info!(reason = "run_duration", "shutdown_requested");
            break;
        }

        let now = Instant::now();
        let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
        last_frame_instant = now;

        accumulator = accumulator.saturating_add(clamp_frame_delta(raw_frame_dt, max_frame_delta));
        let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
        for _ in 0..step_plan.ticks_to_run {
            if simulation.should_stop() {
                break;
            }
            let tick_started = Instant::now();
            simulation.tick(fixed_dt_seconds);
            metrics_accumulator.record_tick(tick_started.elapsed());
            summary.ticks = summary.ticks.saturating_add(1);
        }
        accumulator = step_plan.remaining_accumulator;

        if step_plan.dropped_backlog > Duration::ZERO {
            summary.dropped_backlog = summary
                .dropped_backlog
                .saturating_add(step_plan.dropped_backlog);
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame, "sim_clamp_triggered"
            );
        }

        if let Some(snapshot) = metrics_accumulator.maybe_snapshot(now, simulation.entity_count()) {
            info!(
                tps = snapshot.tps,
                tick_time_ms = snapshot.tick_time_ms,
                slowest_tick_ms = snapshot.slowest_tick_ms,
                entity_count = snapshot.entity_count,
                "loop_metrics"
            );
        }

        let sleep = compute_pacing_sleep(now.elapsed(), fixed_dt);
        if sleep > Duration::ZERO {
            thread::sleep(sleep);
        }
    }

    summary.elapsed = started.elapsed();
    info!(
        ticks = summary.ticks,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "shutdown"
    );
    summary
}

/// Runs exactly `ticks` fixed steps with no wall-clock pacing.
pub fn run_ticks<S: Simulation + ?Sized>(simulation: &mut S, ticks: u64, fixed_dt_seconds: f64) {
    for _ in 0..ticks {
        simulation.tick(fixed_dt_seconds);
    }
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn compute_pacing_sleep(elapsed: Duration, target: Duration) -> Duration {
    target.saturating_sub(elapsed)
}
