mod database;
mod hashing;
mod loader;

pub use database::{
    BuildDef, CarryRoute, DataNotFound, GameData, GemDef, GemKind, LabDef, LabEffect, LayerDef,
    QuestDef, QuestObjective, StartDef, StartingGem, TilemapDef, Unlock,
};
pub use loader::{
    load_game_data, parse_game_data, validate_game_data, ContentError, LoadedGameData,
};
