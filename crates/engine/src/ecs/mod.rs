mod components;
mod registry;

pub use components::{
    Admin, CarryCursor, CarryGem, Component, ComponentData, ComponentKind, DropRate, GemAction,
    Inventory, ItemStack, LabProgress, LabStatus, MineGem, Position, QuestProgress, QuestStatus,
    Sprite, StatBonuses, StatKind, State, Tile, TileMap,
};
pub use registry::{EcsError, EntityId, EntityIdAllocator, EntityRecord, EntityRegistry};
