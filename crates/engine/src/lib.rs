use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;
pub mod content;
pub mod ecs;
pub mod random;
pub mod save;

pub use app::{run_headless, run_ticks, LoopConfig, LoopMetricsSnapshot, RunSummary, Simulation};
pub use content::{
    load_game_data, parse_game_data, BuildDef, CarryRoute, ContentError, DataNotFound, GameData,
    GemDef, GemKind, LabDef, LabEffect, LayerDef, LoadedGameData, QuestDef, QuestObjective,
    StartDef, StartingGem, TilemapDef, Unlock,
};
pub use ecs::{
    Admin, CarryCursor, CarryGem, Component, ComponentData, ComponentKind, DropRate, EcsError,
    EntityId, EntityRegistry, GemAction, Inventory, ItemStack, LabProgress, LabStatus, MineGem,
    Position, QuestProgress, QuestStatus, Sprite, StatBonuses, StatKind, State, Tile, TileMap,
};
pub use random::{FixedRoll, RollSource, SeededRandom};
pub use save::{
    read_save_file, restore_registry, snapshot_registry, write_save_file, SaveError, SaveFile,
    SavedEntity, WellKnownIds, SAVE_VERSION,
};

pub const ROOT_ENV_VAR: &str = "GEMCORE_ROOT";
pub const GAME_DATA_FILE: &str = "game_data.json";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub save_dir: PathBuf,
}

impl AppPaths {
    pub fn game_data_file(&self) -> PathBuf {
        self.data_dir.join(GAME_DATA_FILE)
    }

    pub fn save_file(&self, slot: &str) -> PathBuf {
        self.save_dir.join(format!("{slot}.json"))
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error("failed to create cache directory at {path}: {source}")]
    CreateCacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "GEMCORE_ROOT is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and either crates/ or assets/."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and either crates/ or assets/.\n\
Set {env_var} explicitly, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/gem-core\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = resolve_root()?;
    app_paths_for_root(root)
}

/// Lays out the standard directories under `root`, creating the cache and
/// save directories.
pub fn app_paths_for_root(root: PathBuf) -> Result<AppPaths, StartupError> {
    let data_dir = root.join("assets").join("data");
    let cache_dir = root.join("cache");
    let save_dir = cache_dir.join("saves");

    fs::create_dir_all(&save_dir).map_err(|source| StartupError::CreateCacheDir {
        path: save_dir.clone(),
        source,
    })?;

    Ok(AppPaths {
        root,
        data_dir,
        cache_dir,
        save_dir,
    })
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let normalized = normalize_path(&PathBuf::from(value));
            if is_repo_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot { path: normalized })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            for candidate in exe_dir.ancestors() {
                if is_repo_marker(candidate) {
                    return Ok(normalize_path(candidate));
                }
            }

            Err(StartupError::RootNotFound {
                start_dir: normalize_path(&exe_dir),
                env_var: ROOT_ENV_VAR,
            })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn is_repo_marker(path: &Path) -> bool {
    let cargo_toml = path.join("Cargo.toml").is_file();
    let has_crates = path.join("crates").is_dir();
    let has_assets = path.join("assets").is_dir();

    cargo_toml && (has_crates || has_assets)
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_marker_requires_cargo_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("assets")).expect("assets");
        assert!(!is_repo_marker(dir.path()));

        fs::write(dir.path().join("Cargo.toml"), "[workspace]\n").expect("cargo toml");
        assert!(is_repo_marker(dir.path()));
    }

    #[test]
    fn app_paths_create_save_dir_under_cache() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = app_paths_for_root(dir.path().to_path_buf()).expect("paths");
        assert!(paths.save_dir.is_dir());
        assert_eq!(paths.save_dir, dir.path().join("cache").join("saves"));
        assert_eq!(
            paths.game_data_file(),
            dir.path().join("assets").join("data").join("game_data.json")
        );
        assert_eq!(paths.save_file("slot1"), paths.save_dir.join("slot1.json"));
    }
}
