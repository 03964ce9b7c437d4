use std::collections::HashMap;

use gem_engine::{EntityId, GemAction, State};
use tracing::warn;

use super::admin::advance_labs;
use super::context::SimContext;
use super::errors::SimError;
use super::gems::{action_speed, cancel_request, move_step, work_step};
use super::{FIXED_DT_SECONDS, STEP_THRESHOLD_EPSILON};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerConfig {
    pub fixed_dt_seconds: f64,
    /// When false, progress keeps accumulating for idle or unrequested gems
    /// and the next step can fire immediately once they resume.
    pub reset_progress_when_inactive: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            fixed_dt_seconds: FIXED_DT_SECONDS,
            reset_progress_when_inactive: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub steps_run: u32,
    pub failures: u32,
    pub labs_advanced: bool,
}

/// Drives per-gem action progress at a fixed logical rate.
#[derive(Debug, Default)]
pub struct CycleScheduler {
    config: SchedulerConfig,
    progress: HashMap<EntityId, f64>,
    lab_seconds: f64,
    tick_count: u64,
}

impl CycleScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn progress_of(&self, id: &EntityId) -> Option<f64> {
        self.progress.get(id).copied()
    }

    pub fn tracked(&self) -> usize {
        self.progress.len()
    }

    /// One fixed step. Does nothing while the context is paused.
    ///
    /// A gem seen for the first time only gets a progress entry; from the next
    /// tick on it gains `fixed_dt_seconds` per tick and fires one action once
    /// `progress * speed` reaches 1. Leftover progress is dropped when a step
    /// fires. A failing step cancels only that gem's request.
    pub fn tick(&mut self, ctx: &mut SimContext) -> TickReport {
        let mut report = TickReport::default();
        if !ctx.playing {
            return report;
        }
        self.tick_count = self.tick_count.saturating_add(1);
        let dt = self.config.fixed_dt_seconds;

        let requests = match ctx.admin() {
            Ok(admin) => admin.requests.clone(),
            Err(error) => {
                warn!(error = %error, "scheduler_admin_missing");
                return report;
            }
        };
        self.progress.retain(|id, _| requests.contains(id));

        for id in &requests {
            let Some(progress) = self.progress.get_mut(id) else {
                self.progress.insert(id.clone(), 0.0);
                continue;
            };
            *progress += dt;

            let state = match ctx.registry.get::<State>(id) {
                Ok(state) => *state,
                Err(error) => {
                    report.failures += 1;
                    isolate_failure(ctx, id, &SimError::from(error));
                    continue;
                }
            };
            if !state.request || state.action == GemAction::Idle {
                if self.config.reset_progress_when_inactive {
                    *progress = 0.0;
                }
                continue;
            }

            let speed = match action_speed(ctx, id, state.action) {
                Ok(speed) => speed,
                Err(error) => {
                    report.failures += 1;
                    isolate_failure(ctx, id, &error);
                    continue;
                }
            };
            if *progress * speed < 1.0 - STEP_THRESHOLD_EPSILON {
                continue;
            }
            *progress = 0.0;

            let result = match state.action {
                GemAction::Move => move_step(ctx, id),
                GemAction::Work => work_step(ctx, id),
                GemAction::Idle => Ok(()),
            };
            report.steps_run += 1;
            if let Err(error) = result {
                report.failures += 1;
                isolate_failure(ctx, id, &error);
            }
        }

        self.lab_seconds += dt;
        while self.lab_seconds >= 1.0 - STEP_THRESHOLD_EPSILON {
            self.lab_seconds = (self.lab_seconds - 1.0).max(0.0);
            report.labs_advanced = true;
            if let Err(error) = advance_labs(ctx) {
                warn!(error = %error, "lab_advance_failed");
            }
        }

        report
    }
}

fn isolate_failure(ctx: &mut SimContext, id: &EntityId, error: &SimError) {
    warn!(gem = %id, error = %error, "gem_step_failed");
    ctx.events.alert(format!("Gem {id} stopped: {error}"));
    if let Err(cancel_error) = cancel_request(ctx, id) {
        warn!(gem = %id, error = %cancel_error, "gem_cancel_failed");
        if let Ok(admin) = ctx.admin_mut() {
            admin.requests.retain(|gem| gem != id);
        }
    }
}
