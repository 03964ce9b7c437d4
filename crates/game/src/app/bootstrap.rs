use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use gem_engine::{
    load_game_data, resolve_app_paths, ContentError, LoopConfig, SeededRandom, StartupError,
};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::gameplay::{GameSession, SchedulerConfig, SessionError};

const SEED_ENV_VAR: &str = "GEMCORE_SEED";
const RUN_SECONDS_ENV_VAR: &str = "GEMCORE_RUN_SECONDS";
const LOAD_SAVE_ENV_VAR: &str = "GEMCORE_LOAD_SAVE";
const SAVE_SLOT: &str = "slot1";
const DEFAULT_SEED: u32 = 1;
const AUTOSAVE_INTERVAL_TICKS: u64 = 600;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

pub struct AppWiring {
    pub config: LoopConfig,
    pub session: GameSession,
    pub save_path: PathBuf,
}

pub fn build_app() -> Result<AppWiring, AppError> {
    init_tracing();
    info!("=== Gem Core Startup ===");

    let paths = resolve_app_paths()?;
    info!(
        root = %paths.root.display(),
        data_dir = %paths.data_dir.display(),
        save_dir = %paths.save_dir.display(),
        "app_paths"
    );

    let seed = read_env_or(SEED_ENV_VAR, DEFAULT_SEED);
    let config = LoopConfig {
        run_duration: read_env_opt::<u64>(RUN_SECONDS_ENV_VAR).map(Duration::from_secs),
        ..LoopConfig::default()
    };
    let scheduler_config = SchedulerConfig {
        fixed_dt_seconds: config.fixed_dt_seconds(),
        ..SchedulerConfig::default()
    };

    let loaded = load_game_data(&paths.game_data_file())?;
    let save_path = paths.save_file(SAVE_SLOT);
    let rolls = Box::new(SeededRandom::new(seed));

    let mut session = if load_save_requested() && save_path.is_file() {
        info!(path = %save_path.display(), "loading_save");
        GameSession::load_from(&save_path, loaded, seed, rolls, scheduler_config)?
    } else {
        GameSession::new_game(loaded, seed, rolls, scheduler_config)?
    };
    session.enable_autosave(save_path.clone(), AUTOSAVE_INTERVAL_TICKS);

    Ok(AppWiring {
        config,
        session,
        save_path,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn load_save_requested() -> bool {
    matches!(
        env::var(LOAD_SAVE_ENV_VAR).as_deref(),
        Ok("1") | Ok("true") | Ok("TRUE")
    )
}

fn read_env_or<T: FromStr>(name: &str, default: T) -> T {
    read_env_opt(name).unwrap_or(default)
}

fn read_env_opt<T: FromStr>(name: &str) -> Option<T> {
    match env::var(name) {
        Ok(value) => match value.trim().parse::<T>() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                warn!(
                    env_var = name,
                    value = value.as_str(),
                    "invalid env var value; falling back to default"
                );
                None
            }
        },
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!(
                env_var = name,
                error = %err,
                "unable to read env var; falling back to default"
            );
            None
        }
    }
}
