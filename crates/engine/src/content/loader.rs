use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use super::database::{GameData, LabEffect, QuestObjective, Unlock};
use super::hashing::hash_content_bytes;
use crate::ecs::ItemStack;

const RATE_SUM_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("failed to read game data {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse game data at {location}: {message}")]
    Parse { location: String, message: String },
    #[error("invalid game data at {location}: {message}")]
    Invalid { location: String, message: String },
}

/// Parsed game data plus the hash of the bytes it came from.
#[derive(Debug, Clone)]
pub struct LoadedGameData {
    pub data: GameData,
    pub content_hash_sha256_hex: String,
}

pub fn load_game_data(path: &Path) -> Result<LoadedGameData, ContentError> {
    let raw = fs::read_to_string(path).map_err(|source| ContentError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let loaded = parse_game_data(&raw)?;
    info!(
        path = %path.display(),
        tilemaps = loaded.data.tilemaps.len(),
        labs = loaded.data.labs.len(),
        quests = loaded.data.quests.len(),
        builds = loaded.data.builds.len(),
        content_hash = %loaded.content_hash_sha256_hex,
        "game_data_loaded"
    );
    Ok(loaded)
}

pub fn parse_game_data(raw: &str) -> Result<LoadedGameData, ContentError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    let data = match serde_path_to_error::deserialize::<_, GameData>(&mut deserializer) {
        Ok(data) => data,
        Err(error) => {
            let path = error.path().to_string();
            let source = error.into_inner();
            let location = if path.is_empty() || path == "." {
                "<root>".to_string()
            } else {
                path
            };
            return Err(ContentError::Parse {
                location,
                message: source.to_string(),
            });
        }
    };
    validate_game_data(&data)?;
    Ok(LoadedGameData {
        data,
        content_hash_sha256_hex: hash_content_bytes(raw.as_bytes()),
    })
}

fn invalid(location: impl Into<String>, message: impl Into<String>) -> ContentError {
    ContentError::Invalid {
        location: location.into(),
        message: message.into(),
    }
}

fn ensure_unique<'a>(
    location: &str,
    names: impl Iterator<Item = &'a str>,
) -> Result<(), ContentError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(invalid(location, format!("duplicate name '{name}'")));
        }
    }
    Ok(())
}

fn validate_stacks(location: &str, stacks: &[ItemStack]) -> Result<(), ContentError> {
    for (index, stack) in stacks.iter().enumerate() {
        if stack.name.is_empty() {
            return Err(invalid(format!("{location}[{index}].name"), "empty item name"));
        }
    }
    Ok(())
}

pub fn validate_game_data(data: &GameData) -> Result<(), ContentError> {
    if data.tilemaps.is_empty() {
        return Err(invalid("tilemaps", "at least one tilemap is required"));
    }
    ensure_unique("tilemaps", data.tilemaps.iter().map(|def| def.name.as_str()))?;
    ensure_unique("builds", data.builds.iter().map(|def| def.name.as_str()))?;
    ensure_unique("labs", data.labs.iter().map(|def| def.name.as_str()))?;
    ensure_unique("quests", data.quests.iter().map(|def| def.name.as_str()))?;
    ensure_unique("gems", data.gems.iter().map(|def| def.kind.as_token()))?;

    for (map_index, tilemap) in data.tilemaps.iter().enumerate() {
        if tilemap.width == 0 {
            return Err(invalid(format!("tilemaps[{map_index}].width"), "must be > 0"));
        }
        if tilemap.layers.is_empty() {
            return Err(invalid(
                format!("tilemaps[{map_index}].layers"),
                "at least one layer is required",
            ));
        }
        for (layer_index, layer) in tilemap.layers.iter().enumerate() {
            let location = format!("tilemaps[{map_index}].layers[{layer_index}]");
            if layer.height == 0 {
                return Err(invalid(format!("{location}.height"), "must be > 0"));
            }
            let mut rate_sum = 0.0f64;
            for drop in &layer.drops {
                if !drop.rate.is_finite() || drop.rate < 0.0 {
                    return Err(invalid(
                        format!("{location}.drops"),
                        format!("rate for '{}' must be a finite non-negative number", drop.name),
                    ));
                }
                rate_sum += drop.rate;
            }
            if rate_sum > 1.0 + RATE_SUM_TOLERANCE {
                return Err(invalid(
                    format!("{location}.drops"),
                    format!("drop rates sum to {rate_sum}, expected <= 1.0"),
                ));
            }
        }
    }

    for (index, gem) in data.gems.iter().enumerate() {
        let speeds = [gem.move_speed, gem.dig_speed, gem.carry_speed];
        if speeds.iter().any(|speed| !speed.is_finite() || *speed < 0.0) {
            return Err(invalid(
                format!("gems[{index}]"),
                "speeds must be finite and non-negative",
            ));
        }
    }

    for (index, build) in data.builds.iter().enumerate() {
        validate_stacks(&format!("builds[{index}].inputs"), &build.inputs)?;
        validate_stacks(&format!("builds[{index}].outputs"), &build.outputs)?;
    }

    for (index, lab) in data.labs.iter().enumerate() {
        validate_stacks(&format!("labs[{index}].cost"), &lab.cost)?;
        if lab.duration_seconds == 0 {
            return Err(invalid(
                format!("labs[{index}].duration_seconds"),
                "must be > 0",
            ));
        }
        for effect in &lab.effects {
            if let LabEffect::UnlockCraft { build } = effect {
                if data.build(build).is_err() {
                    return Err(invalid(
                        format!("labs[{index}].effects"),
                        format!("unknown build '{build}'"),
                    ));
                }
            }
        }
    }

    for (index, quest) in data.quests.iter().enumerate() {
        validate_stacks(&format!("quests[{index}].rewards"), &quest.rewards)?;
        if let QuestObjective::CollectItem { item } = &quest.objective {
            if item.is_empty() {
                return Err(invalid(
                    format!("quests[{index}].objective.item"),
                    "empty item name",
                ));
            }
        }
        for unlock in &quest.unlocks {
            validate_unlock(data, &format!("quests[{index}].unlocks"), unlock)?;
        }
    }

    validate_start(data)
}

fn validate_unlock(data: &GameData, location: &str, unlock: &Unlock) -> Result<(), ContentError> {
    let missing = match unlock {
        Unlock::Craft { build } => data.build(build).err(),
        Unlock::Lab { lab } => data.lab(lab).err(),
        Unlock::Quest { quest } => data.quest(quest).err(),
    };
    match missing {
        Some(error) => Err(invalid(location, error.to_string())),
        None => Ok(()),
    }
}

fn validate_start(data: &GameData) -> Result<(), ContentError> {
    let start = &data.start;
    let tilemap = data
        .tilemap(&start.tilemap)
        .map_err(|error| invalid("start.tilemap", error.to_string()))?;
    validate_stacks("start.items", &start.items)?;
    for build in &start.crafts {
        data.build(build)
            .map_err(|error| invalid("start.crafts", error.to_string()))?;
    }
    for lab in &start.labs {
        data.lab(lab)
            .map_err(|error| invalid("start.labs", error.to_string()))?;
    }
    for quest in &start.quests {
        data.quest(quest)
            .map_err(|error| invalid("start.quests", error.to_string()))?;
    }
    let height = tilemap.height();
    for (index, gem) in start.gems.iter().enumerate() {
        data.gem(gem.kind)
            .map_err(|error| invalid(format!("start.gems[{index}].kind"), error.to_string()))?;
        let in_bounds = |x: u32, y: u32| x < tilemap.width && y < height;
        if !in_bounds(gem.position.x, gem.position.y) {
            return Err(invalid(
                format!("start.gems[{index}].position"),
                format!("{} is outside the tilemap", gem.position),
            ));
        }
        if let Some(route) = gem.carry {
            if !in_bounds(route.start.x, route.start.y) || !in_bounds(route.target.x, route.target.y)
            {
                return Err(invalid(
                    format!("start.gems[{index}].carry"),
                    "carry route leaves the tilemap",
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_game_data_json() -> serde_json::Value {
        json!({
            "tilemaps": [{
                "name": "mine",
                "width": 4,
                "layers": [
                    { "name": "surface", "height": 1, "density": 0, "drop_amount": 0, "open": true },
                    { "name": "dirt", "height": 3, "density": 1, "drop_amount": 2,
                      "drops": [{ "name": "STONE", "rate": 0.5 }] }
                ]
            }],
            "gems": [
                { "kind": "mine", "sprite": "gems/mine", "capacity": 3, "move_speed": 1.0,
                  "dig_speed": 1.0, "dig_strength": 1 }
            ],
            "start": { "tilemap": "mine" }
        })
    }

    #[test]
    fn parses_minimal_data_and_hashes_raw_bytes() {
        let raw = minimal_game_data_json().to_string();
        let loaded = parse_game_data(&raw).expect("parse");
        assert_eq!(loaded.data.tilemaps[0].height(), 4);
        assert_eq!(loaded.content_hash_sha256_hex.len(), 64);
        assert!(loaded.data.labs.is_empty());
    }

    #[test]
    fn parse_error_reports_json_path() {
        let mut value = minimal_game_data_json();
        value["tilemaps"][0]["width"] = json!("wide");
        let err = parse_game_data(&value.to_string()).expect_err("type mismatch");
        match err {
            ContentError::Parse { location, .. } => assert_eq!(location, "tilemaps[0].width"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_drop_rates_summing_past_one() {
        let mut value = minimal_game_data_json();
        value["tilemaps"][0]["layers"][1]["drops"] =
            json!([{ "name": "STONE", "rate": 0.7 }, { "name": "IRON", "rate": 0.4 }]);
        let err = parse_game_data(&value.to_string()).expect_err("rates");
        assert!(matches!(err, ContentError::Invalid { .. }), "{err}");
    }

    #[test]
    fn rejects_unknown_start_tilemap() {
        let mut value = minimal_game_data_json();
        value["start"]["tilemap"] = json!("caves");
        let err = parse_game_data(&value.to_string()).expect_err("missing tilemap");
        match err {
            ContentError::Invalid { location, .. } => assert_eq!(location, "start.tilemap"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_starting_gem_outside_map() {
        let mut value = minimal_game_data_json();
        value["start"]["gems"] = json!([{ "kind": "mine", "position": { "x": 9, "y": 0 } }]);
        let err = parse_game_data(&value.to_string()).expect_err("out of bounds");
        assert!(err.to_string().contains("start.gems[0].position"), "{err}");
    }

    #[test]
    fn rejects_duplicate_lab_names() {
        let mut value = minimal_game_data_json();
        let lab = json!({ "name": "picks", "cost": [], "duration_seconds": 2, "effects": [] });
        value["labs"] = json!([lab.clone(), lab]);
        let err = parse_game_data(&value.to_string()).expect_err("duplicate");
        assert!(err.to_string().contains("duplicate name 'picks'"), "{err}");
    }

    #[test]
    fn load_game_data_reports_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_game_data(&dir.path().join("nope.json")).expect_err("missing");
        assert!(matches!(err, ContentError::Io { .. }));
    }
}
