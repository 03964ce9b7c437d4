use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use gem_engine::{
    read_save_file, restore_registry, snapshot_registry, write_save_file, EntityRegistry,
    GemAction, LoadedGameData, RollSource, SaveError, SaveFile, Simulation, State, WellKnownIds,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::admin::check_quests;
use super::context::SimContext;
use super::errors::{SimError, SimResult};
use super::events::SimEvent;
use super::gems::apply_ui_request;
use super::scheduler::{CycleScheduler, SchedulerConfig, TickReport};
use super::world_gen::new_world;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Save(#[from] SaveError),
    #[error(transparent)]
    Sim(#[from] SimError),
}

#[derive(Debug, Clone)]
struct Autosave {
    path: PathBuf,
    interval_ticks: u64,
}

/// One run of the simulation: context, scheduler and save wiring.
pub struct GameSession {
    ctx: SimContext,
    scheduler: CycleScheduler,
    content_hash_sha256_hex: String,
    autosave: Option<Autosave>,
    stop_after_ticks: Option<u64>,
    last_report: TickReport,
}

impl GameSession {
    pub fn new_game(
        loaded: LoadedGameData,
        seed: u32,
        rolls: Box<dyn RollSource>,
        config: SchedulerConfig,
    ) -> Result<Self, SessionError> {
        let ctx = new_world(loaded.data, seed, rolls)?;
        Ok(Self::from_context(ctx, loaded.content_hash_sha256_hex, config))
    }

    pub fn from_context(
        ctx: SimContext,
        content_hash_sha256_hex: String,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            ctx,
            scheduler: CycleScheduler::new(config),
            content_hash_sha256_hex,
            autosave: None,
            stop_after_ticks: None,
            last_report: TickReport::default(),
        }
    }

    /// Rebuilds a run from a save. Path cache and scheduler progress start
    /// empty; request lists are reconciled with each gem's `State`.
    pub fn from_save(
        loaded: LoadedGameData,
        save: &SaveFile,
        seed: u32,
        rolls: Box<dyn RollSource>,
        config: SchedulerConfig,
    ) -> Result<Self, SessionError> {
        if save.content_hash_sha256_hex != loaded.content_hash_sha256_hex {
            warn!(
                saved = save.content_hash_sha256_hex.as_str(),
                current = loaded.content_hash_sha256_hex.as_str(),
                "save_content_hash_mismatch"
            );
        }
        let mut registry = EntityRegistry::with_seed(seed);
        restore_registry(save, &mut registry)?;
        let ctx = SimContext::new(
            registry,
            save.well_known.admin_id.clone(),
            save.well_known.tilemap_id.clone(),
            loaded.data,
            rolls,
        );
        let mut session = Self::from_context(ctx, loaded.content_hash_sha256_hex, config);
        session.reconcile_requests()?;
        info!(
            entity_count = session.ctx.registry.len(),
            saved_at_unix_ms = save.saved_at_unix_ms,
            "save_loaded"
        );
        Ok(session)
    }

    pub fn load_from(
        path: &Path,
        loaded: LoadedGameData,
        seed: u32,
        rolls: Box<dyn RollSource>,
        config: SchedulerConfig,
    ) -> Result<Self, SessionError> {
        let save = read_save_file(path)?;
        Self::from_save(loaded, &save, seed, rolls, config)
    }

    fn reconcile_requests(&mut self) -> SimResult<()> {
        let admin = self.ctx.admin()?;
        let listed = admin.requests.clone();
        let gems = admin.gems.clone();

        let mut kept = Vec::with_capacity(listed.len());
        for id in listed {
            if self.ctx.registry.get::<State>(&id)?.request {
                kept.push(id);
            } else {
                warn!(gem = %id, "save_request_without_state_dropped");
            }
        }
        for id in &gems {
            let state = self.ctx.registry.get_mut::<State>(id)?;
            if state.request && !kept.contains(id) {
                warn!(gem = %id, "save_state_request_cleared");
                state.request = false;
                state.action = GemAction::Idle;
            }
        }
        self.ctx.admin_mut()?.requests = kept;
        Ok(())
    }

    pub fn snapshot(&self, saved_at_unix_ms: u64) -> SaveFile {
        snapshot_registry(
            &self.ctx.registry,
            WellKnownIds {
                admin_id: self.ctx.admin_id.clone(),
                tilemap_id: self.ctx.tilemap_id.clone(),
            },
            &self.content_hash_sha256_hex,
            saved_at_unix_ms,
        )
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SessionError> {
        write_save_file(path, &self.snapshot(unix_time_ms()))?;
        info!(path = %path.display(), entity_count = self.ctx.registry.len(), "save_written");
        Ok(())
    }

    pub fn enable_autosave(&mut self, path: PathBuf, interval_ticks: u64) {
        self.autosave = Some(Autosave {
            path,
            interval_ticks: interval_ticks.max(1),
        });
    }

    pub fn stop_after_ticks(&mut self, ticks: u64) {
        self.stop_after_ticks = Some(ticks);
    }

    pub fn context(&self) -> &SimContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut SimContext {
        &mut self.ctx
    }

    pub fn scheduler(&self) -> &CycleScheduler {
        &self.scheduler
    }

    pub fn last_report(&self) -> TickReport {
        self.last_report
    }

    /// One fixed step: UI input, scheduler, quest checks, then the event
    /// queue is drained to the log.
    pub fn step(&mut self) -> Vec<SimEvent> {
        if let Err(error) = apply_ui_request(&mut self.ctx) {
            warn!(error = %error, "ui_request_failed");
            self.ctx.events.alert(error.to_string());
        }
        self.last_report = self.scheduler.tick(&mut self.ctx);
        if let Err(error) = check_quests(&mut self.ctx) {
            warn!(error = %error, "quest_check_failed");
        }

        let events = self.ctx.events.drain_current_tick();
        for event in &events {
            log_event(event);
        }
        self.maybe_autosave();
        events
    }

    fn maybe_autosave(&self) {
        let Some(autosave) = &self.autosave else {
            return;
        };
        let tick = self.scheduler.tick_count();
        if tick == 0 || tick % autosave.interval_ticks != 0 {
            return;
        }
        if let Err(error) = self.save_to(&autosave.path) {
            warn!(error = %error, path = %autosave.path.display(), "autosave_failed");
        }
    }
}

impl Simulation for GameSession {
    fn tick(&mut self, _fixed_dt_seconds: f64) {
        self.step();
    }

    fn should_stop(&self) -> bool {
        self.stop_after_ticks
            .is_some_and(|limit| self.scheduler.tick_count() >= limit)
    }

    fn entity_count(&self) -> usize {
        self.ctx.registry.len()
    }
}

fn log_event(event: &SimEvent) {
    match event {
        SimEvent::Message { level, text } => {
            info!(level = ?level, text = text.as_str(), "sim_message")
        }
        other => debug!(event = ?other, "sim_event"),
    }
}

fn unix_time_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
