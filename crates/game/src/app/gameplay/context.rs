use gem_engine::{
    Admin, EntityId, EntityRegistry, GameData, Position, RollSource, StatBonuses, Tile, TileMap,
};

use super::errors::SimResult;
use super::events::EventQueue;
use super::nav::Navigator;

/// Actions a player can queue from the UI; consumed on the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingRequest {
    Move,
    Work,
    CarryStart,
    CarryTarget,
    Deploy,
    Store,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiRequest {
    pub selected_tile: Option<Position>,
    pub selected_gem: Option<EntityId>,
    pub pending: Option<PendingRequest>,
}

/// Everything one simulation run mutates. Owned by the session and handed
/// to systems by `&mut`.
pub struct SimContext {
    pub registry: EntityRegistry,
    pub admin_id: EntityId,
    pub tilemap_id: EntityId,
    pub data: GameData,
    pub navigator: Navigator,
    pub events: EventQueue,
    pub rolls: Box<dyn RollSource>,
    pub ui: UiRequest,
    pub playing: bool,
}

impl SimContext {
    pub fn new(
        registry: EntityRegistry,
        admin_id: EntityId,
        tilemap_id: EntityId,
        data: GameData,
        rolls: Box<dyn RollSource>,
    ) -> Self {
        Self {
            registry,
            admin_id,
            tilemap_id,
            data,
            navigator: Navigator::default(),
            events: EventQueue::default(),
            rolls,
            ui: UiRequest::default(),
            playing: true,
        }
    }

    pub fn admin(&self) -> SimResult<&Admin> {
        Ok(self.registry.get::<Admin>(&self.admin_id)?)
    }

    pub fn admin_mut(&mut self) -> SimResult<&mut Admin> {
        Ok(self.registry.get_mut::<Admin>(&self.admin_id)?)
    }

    pub fn stats(&self) -> SimResult<StatBonuses> {
        Ok(self.admin()?.stats)
    }

    pub fn tilemap(&self) -> SimResult<&TileMap> {
        Ok(self.registry.get::<TileMap>(&self.tilemap_id)?)
    }

    pub fn tile_id_at(&self, position: Position) -> SimResult<Option<EntityId>> {
        Ok(self.tilemap()?.tile_id_at(position).cloned())
    }

    pub fn tile_at(&self, position: Position) -> SimResult<Option<&Tile>> {
        let Some(tile_id) = self.tilemap()?.tile_id_at(position) else {
            return Ok(None);
        };
        Ok(Some(self.registry.get::<Tile>(tile_id)?))
    }
}
