//! Simulation systems: pathfinding, the cycle scheduler, gem actions and
//! admin progression, all driven through one [`SimContext`].

mod admin;
mod carry;
mod context;
mod errors;
mod events;
mod gems;
mod mine;
mod nav;
mod scheduler;
mod session;
mod world_gen;

#[cfg(test)]
mod tests {
    include!("tests.rs");
}

pub use admin::{
    add_admin_item, advance_labs, check_quests, craft, deliver_item, remove_admin_item,
    restore_tile, start_lab,
};
pub use carry::{carry_step, try_drop, try_pick, CarryOutcome};
pub use context::{PendingRequest, SimContext, UiRequest};
pub use errors::{SimError, SimResult};
pub use events::{EventQueue, MessageLevel, SimEvent};
pub use gems::{
    action_speed, apply_ui_request, cancel_request, create_gem, deploy_gem, destroy_gem, gem_kind,
    move_step, request_move, request_work, set_carry_point, set_gem_request, step_toward,
    store_gem, work_step,
};
pub use mine::{mine_step, MineOutcome};
pub use nav::{find_path, Navigator, TileGrid, Walkable};
pub use scheduler::{CycleScheduler, SchedulerConfig, TickReport};
pub use session::{GameSession, SessionError};
pub use world_gen::{create_admin, generate_tilemap, new_world};

/// Rows below a carry gem's own row scanned for a pick-up source.
pub const CARRY_SEARCH_RANGE: u32 = 4;
/// Largest x at which a carry gem may hand items to the base.
pub const CARRY_DROP_MAX_X: u32 = 2;
pub const FIXED_DT_SECONDS: f64 = 1.0 / 60.0;
/// Slack on step thresholds so summed `1/60` increments still fire on the
/// expected tick.
pub const STEP_THRESHOLD_EPSILON: f64 = 1e-9;
