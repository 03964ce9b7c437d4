use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ecs::{DropRate, ItemStack, Position, StatKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} '{name}' not found in game data")]
pub struct DataNotFound {
    pub kind: &'static str,
    pub name: String,
}

impl DataNotFound {
    fn new(kind: &'static str, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GemKind {
    Mine,
    Carry,
}

impl GemKind {
    pub fn as_token(self) -> &'static str {
        match self {
            Self::Mine => "mine",
            Self::Carry => "carry",
        }
    }
}

/// One depth band of a tilemap. Bands stack top to bottom in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDef {
    pub name: String,
    pub height: u32,
    pub density: u32,
    pub drop_amount: u32,
    #[serde(default)]
    pub drops: Vec<DropRate>,
    /// Open bands start destroyed (walkable), like the surface row.
    #[serde(default)]
    pub open: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TilemapDef {
    pub name: String,
    pub width: u32,
    pub layers: Vec<LayerDef>,
}

impl TilemapDef {
    pub fn height(&self) -> u32 {
        self.layers
            .iter()
            .fold(0u32, |sum, layer| sum.saturating_add(layer.height))
    }

    /// Layer covering row `y`, if any.
    pub fn layer_for_row(&self, y: u32) -> Option<&LayerDef> {
        let mut top = 0u32;
        for layer in &self.layers {
            let bottom = top.saturating_add(layer.height);
            if y < bottom {
                return Some(layer);
            }
            top = bottom;
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GemDef {
    pub kind: GemKind,
    pub sprite: String,
    pub capacity: u32,
    pub move_speed: f64,
    #[serde(default)]
    pub dig_speed: f64,
    #[serde(default)]
    pub dig_strength: u32,
    #[serde(default)]
    pub carry_speed: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildDef {
    pub name: String,
    pub inputs: Vec<ItemStack>,
    pub outputs: Vec<ItemStack>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LabEffect {
    StatBonus { stat: StatKind, amount: f64 },
    UnlockCraft { build: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabDef {
    pub name: String,
    pub cost: Vec<ItemStack>,
    pub duration_seconds: u32,
    pub effects: Vec<LabEffect>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestObjective {
    CollectItem { item: String },
    OwnGems,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Unlock {
    Craft { build: String },
    Lab { lab: String },
    Quest { quest: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestDef {
    pub name: String,
    pub objective: QuestObjective,
    pub threshold: u32,
    #[serde(default)]
    pub rewards: Vec<ItemStack>,
    #[serde(default)]
    pub unlocks: Vec<Unlock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarryRoute {
    pub start: Position,
    pub target: Position,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartingGem {
    pub kind: GemKind,
    pub position: Position,
    #[serde(default)]
    pub work: bool,
    #[serde(default)]
    pub carry: Option<CarryRoute>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartDef {
    pub tilemap: String,
    #[serde(default)]
    pub items: Vec<ItemStack>,
    #[serde(default)]
    pub crafts: Vec<String>,
    #[serde(default)]
    pub labs: Vec<String>,
    #[serde(default)]
    pub quests: Vec<String>,
    #[serde(default)]
    pub gems: Vec<StartingGem>,
}

/// Static definitions the simulation reads by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameData {
    pub tilemaps: Vec<TilemapDef>,
    pub gems: Vec<GemDef>,
    #[serde(default)]
    pub builds: Vec<BuildDef>,
    #[serde(default)]
    pub labs: Vec<LabDef>,
    #[serde(default)]
    pub quests: Vec<QuestDef>,
    pub start: StartDef,
}

impl GameData {
    pub fn tilemap(&self, name: &str) -> Result<&TilemapDef, DataNotFound> {
        self.tilemaps
            .iter()
            .find(|def| def.name == name)
            .ok_or_else(|| DataNotFound::new("tilemap", name))
    }

    pub fn gem(&self, kind: GemKind) -> Result<&GemDef, DataNotFound> {
        self.gems
            .iter()
            .find(|def| def.kind == kind)
            .ok_or_else(|| DataNotFound::new("gem", kind.as_token()))
    }

    pub fn build(&self, name: &str) -> Result<&BuildDef, DataNotFound> {
        self.builds
            .iter()
            .find(|def| def.name == name)
            .ok_or_else(|| DataNotFound::new("build", name))
    }

    pub fn lab(&self, name: &str) -> Result<&LabDef, DataNotFound> {
        self.labs
            .iter()
            .find(|def| def.name == name)
            .ok_or_else(|| DataNotFound::new("lab", name))
    }

    pub fn quest(&self, name: &str) -> Result<&QuestDef, DataNotFound> {
        self.quests
            .iter()
            .find(|def| def.name == name)
            .ok_or_else(|| DataNotFound::new("quest", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(name: &str, height: u32) -> LayerDef {
        LayerDef {
            name: name.to_string(),
            height,
            density: 1,
            drop_amount: 1,
            drops: Vec::new(),
            open: false,
        }
    }

    #[test]
    fn layer_for_row_follows_band_order() {
        let def = TilemapDef {
            name: "mine".to_string(),
            width: 4,
            layers: vec![layer("surface", 1), layer("dirt", 3), layer("rock", 2)],
        };
        assert_eq!(def.height(), 6);
        assert_eq!(def.layer_for_row(0).map(|l| l.name.as_str()), Some("surface"));
        assert_eq!(def.layer_for_row(1).map(|l| l.name.as_str()), Some("dirt"));
        assert_eq!(def.layer_for_row(3).map(|l| l.name.as_str()), Some("dirt"));
        assert_eq!(def.layer_for_row(4).map(|l| l.name.as_str()), Some("rock"));
        assert_eq!(def.layer_for_row(6), None);
    }

    #[test]
    fn missing_lookup_reports_kind_and_name() {
        let data = GameData::default();
        let err = data.lab("deep_drill").expect_err("missing");
        assert_eq!(err.kind, "lab");
        assert_eq!(err.name, "deep_drill");
        assert_eq!(err.to_string(), "lab 'deep_drill' not found in game data");
        assert!(data.gem(GemKind::Carry).is_err());
    }
}
