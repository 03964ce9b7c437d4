//! Versioned JSON snapshots of the entity registry.

mod atomic_io;

use std::collections::{BTreeMap, HashSet};
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ecs::{
    Admin, CarryGem, Component, ComponentKind, EcsError, EntityId, EntityRegistry, MineGem, Tile,
    TileMap,
};

pub const SAVE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("save io failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("encode save json: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("parse save json at {location}: {message}")]
    Parse { location: String, message: String },
    #[error("validation failed at {field}: {message}")]
    Validation { field: String, message: String },
    #[error(transparent)]
    Registry(#[from] EcsError),
}

/// Entities the simulation resolves directly instead of by query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WellKnownIds {
    pub admin_id: EntityId,
    pub tilemap_id: EntityId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedEntity {
    pub entity_type_name: String,
    pub components: Vec<Component>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveFile {
    pub save_version: u32,
    pub saved_at_unix_ms: u64,
    pub content_hash_sha256_hex: String,
    pub well_known: WellKnownIds,
    pub entities: BTreeMap<EntityId, SavedEntity>,
}

pub fn snapshot_registry(
    registry: &EntityRegistry,
    well_known: WellKnownIds,
    content_hash_sha256_hex: &str,
    saved_at_unix_ms: u64,
) -> SaveFile {
    let entities = registry
        .entities()
        .map(|(id, record)| {
            (
                id.clone(),
                SavedEntity {
                    entity_type_name: record.type_name().to_string(),
                    components: record.components().cloned().collect(),
                },
            )
        })
        .collect();
    SaveFile {
        save_version: SAVE_VERSION,
        saved_at_unix_ms,
        content_hash_sha256_hex: content_hash_sha256_hex.to_string(),
        well_known,
        entities,
    }
}

/// Replaces every entity in `registry` with the saved ones. The registry is
/// left empty if any insert fails.
pub fn restore_registry(save: &SaveFile, registry: &mut EntityRegistry) -> Result<(), SaveError> {
    registry.clear();
    for (id, entity) in &save.entities {
        let result = registry
            .create_entity_with_id(id.clone(), &entity.entity_type_name)
            .and_then(|()| {
                entity
                    .components
                    .iter()
                    .try_for_each(|component| registry.attach_component(id, component.clone()))
            });
        if let Err(error) = result {
            registry.clear();
            return Err(error.into());
        }
    }
    Ok(())
}

pub fn write_save_file(path: &Path, save: &SaveFile) -> Result<(), SaveError> {
    let json = serde_json::to_string_pretty(save).map_err(SaveError::Encode)?;
    atomic_io::write_text_atomic(path, &json).map_err(|source| SaveError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_save_file(path: &Path) -> Result<SaveFile, SaveError> {
    let raw = fs::read_to_string(path).map_err(|source| SaveError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let save = parse_save_json(&raw)?;
    validate_save_file(&save)?;
    Ok(save)
}

pub fn parse_save_json(raw: &str) -> Result<SaveFile, SaveError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, SaveFile>(&mut deserializer).map_err(|error| {
        let path = error.path().to_string();
        let source = error.into_inner();
        let location = if path.is_empty() || path == "." {
            "<root>".to_string()
        } else {
            path
        };
        SaveError::Parse {
            location,
            message: source.to_string(),
        }
    })
}

fn validation_err(field: impl Into<String>, message: impl Into<String>) -> SaveError {
    SaveError::Validation {
        field: field.into(),
        message: message.into(),
    }
}

fn expected_actual(field: impl Into<String>, expected: impl Display, actual: impl Display) -> SaveError {
    validation_err(field, format!("expected {expected}, got {actual}"))
}

fn find_component<'a>(save: &'a SaveFile, id: &EntityId, kind: ComponentKind) -> Option<&'a Component> {
    save.entities
        .get(id)?
        .components
        .iter()
        .find(|component| component.kind() == kind)
}

fn ensure_finite(field: String, value: f64) -> Result<(), SaveError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(expected_actual(field, "finite number", value))
    }
}

pub fn validate_save_file(save: &SaveFile) -> Result<(), SaveError> {
    if save.save_version != SAVE_VERSION {
        return Err(expected_actual(
            "save_version",
            SAVE_VERSION,
            save.save_version,
        ));
    }

    for (id, entity) in &save.entities {
        let mut kinds = HashSet::new();
        for component in &entity.components {
            if !kinds.insert(component.kind()) {
                return Err(validation_err(
                    format!("entities.{id}.components"),
                    format!("duplicate {:?} component", component.kind()),
                ));
            }
            match component {
                Component::Mine(MineGem {
                    dig_speed,
                    move_speed,
                    ..
                }) => {
                    ensure_finite(format!("entities.{id}.mine.dig_speed"), *dig_speed)?;
                    ensure_finite(format!("entities.{id}.mine.move_speed"), *move_speed)?;
                }
                Component::Carry(CarryGem {
                    carry_speed,
                    move_speed,
                    ..
                }) => {
                    ensure_finite(format!("entities.{id}.carry.carry_speed"), *carry_speed)?;
                    ensure_finite(format!("entities.{id}.carry.move_speed"), *move_speed)?;
                }
                _ => {}
            }
        }
    }

    let admin_id = &save.well_known.admin_id;
    let Some(Component::Admin(admin)) = find_component(save, admin_id, ComponentKind::Admin) else {
        return Err(validation_err(
            "well_known.admin_id",
            format!("entity {admin_id} has no admin component"),
        ));
    };
    validate_admin(save, admin)?;

    let tilemap_id = &save.well_known.tilemap_id;
    let Some(Component::TileMap(tilemap)) =
        find_component(save, tilemap_id, ComponentKind::TileMap)
    else {
        return Err(validation_err(
            "well_known.tilemap_id",
            format!("entity {tilemap_id} has no tilemap component"),
        ));
    };
    validate_tilemap(save, tilemap)
}

fn validate_admin(save: &SaveFile, admin: &Admin) -> Result<(), SaveError> {
    for (index, gem_id) in admin.gems.iter().enumerate() {
        if !save.entities.contains_key(gem_id) {
            return Err(validation_err(
                format!("admin.gems[{index}]"),
                format!("unknown entity {gem_id}"),
            ));
        }
    }
    for (index, gem_id) in admin.requests.iter().enumerate() {
        if !admin.gems.contains(gem_id) {
            return Err(validation_err(
                format!("admin.requests[{index}]"),
                format!("{gem_id} is not an owned gem"),
            ));
        }
    }
    for (index, lab) in admin.labs.iter().enumerate() {
        if lab.progress > lab.duration {
            return Err(expected_actual(
                format!("admin.labs[{index}].progress"),
                format!("<= {}", lab.duration),
                lab.progress,
            ));
        }
    }
    Ok(())
}

fn validate_tilemap(save: &SaveFile, tilemap: &TileMap) -> Result<(), SaveError> {
    let expected = tilemap.width as usize * tilemap.height as usize;
    if tilemap.tiles.len() != expected {
        return Err(expected_actual("tilemap.tiles.len", expected, tilemap.tiles.len()));
    }
    for (index, tile_id) in tilemap.tiles.iter().enumerate() {
        let Some(Component::Tile(tile)) = find_component(save, tile_id, ComponentKind::Tile) else {
            return Err(validation_err(
                format!("tilemap.tiles[{index}]"),
                format!("entity {tile_id} has no tile component"),
            ));
        };
        let Tile { x, y, .. } = tile;
        if tilemap.index_of(*x, *y) != Some(index) {
            return Err(validation_err(
                format!("tilemap.tiles[{index}]"),
                format!("tile {tile_id} sits at ({x}, {y}), not at its row-major slot"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{Position, State};

    fn sample_registry() -> (EntityRegistry, WellKnownIds) {
        let mut registry = EntityRegistry::with_seed(3);
        let tile = registry.create_entity("Tile");
        registry
            .attach(
                &tile,
                Tile {
                    x: 0,
                    y: 0,
                    density: 0,
                    drop_amount: 0,
                    drops: Vec::new(),
                    destroyed: true,
                },
            )
            .expect("tile");
        let tilemap = registry.create_entity("TileMap");
        registry
            .attach(
                &tilemap,
                TileMap {
                    name: "mine".to_string(),
                    width: 1,
                    height: 1,
                    tiles: vec![tile],
                },
            )
            .expect("tilemap");

        let gem = registry.create_entity("Gem");
        registry.attach(&gem, Position::new(0, 0)).expect("position");
        registry
            .attach(
                &gem,
                State {
                    request: true,
                    ..State::default()
                },
            )
            .expect("state");

        let admin = registry.create_entity("Admin");
        registry
            .attach(
                &admin,
                Admin {
                    gems: vec![gem.clone()],
                    requests: vec![gem],
                    ..Admin::default()
                },
            )
            .expect("admin");
        (
            registry,
            WellKnownIds {
                admin_id: admin,
                tilemap_id: tilemap,
            },
        )
    }

    #[test]
    fn write_then_read_restores_identical_registry() {
        let (registry, well_known) = sample_registry();
        let save = snapshot_registry(&registry, well_known, "abc", 7);
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("saves").join("slot.json");
        write_save_file(&path, &save).expect("write");

        let loaded = read_save_file(&path).expect("read");
        assert_eq!(loaded, save);

        let mut restored = EntityRegistry::with_seed(99);
        restore_registry(&loaded, &mut restored).expect("restore");
        assert_eq!(restored.len(), registry.len());
        for (id, record) in registry.entities() {
            assert_eq!(restored.record(id), Some(record));
        }
    }

    #[test]
    fn missing_field_reports_json_path() {
        let (registry, well_known) = sample_registry();
        let save = snapshot_registry(&registry, well_known, "abc", 7);
        let mut value = serde_json::to_value(&save).expect("to value");
        value
            .as_object_mut()
            .expect("object")
            .remove("save_version");
        let err = parse_save_json(&value.to_string()).expect_err("missing version");
        assert!(err.to_string().contains("save_version"), "{err}");
    }

    #[test]
    fn rejects_future_save_version() {
        let (registry, well_known) = sample_registry();
        let mut save = snapshot_registry(&registry, well_known, "abc", 7);
        save.save_version = SAVE_VERSION + 1;
        let err = validate_save_file(&save).expect_err("version");
        assert_eq!(
            err.to_string(),
            format!(
                "validation failed at save_version: expected {SAVE_VERSION}, got {}",
                SAVE_VERSION + 1
            )
        );
    }

    #[test]
    fn rejects_admin_pointing_at_missing_tilemap() {
        let (registry, mut well_known) = sample_registry();
        well_known.tilemap_id = well_known.admin_id.clone();
        let save = snapshot_registry(&registry, well_known, "abc", 7);
        let err = validate_save_file(&save).expect_err("no tilemap");
        assert!(err.to_string().contains("well_known.tilemap_id"), "{err}");
    }

    #[test]
    fn rejects_request_for_unowned_gem() {
        let (mut registry, well_known) = sample_registry();
        registry
            .get_mut::<Admin>(&well_known.admin_id)
            .expect("admin")
            .gems
            .clear();
        let save = snapshot_registry(&registry, well_known, "abc", 7);
        let err = validate_save_file(&save).expect_err("unowned request");
        assert!(err.to_string().contains("admin.requests[0]"), "{err}");
    }
}
