use gem_engine::{
    Admin, CarryCursor, EntityId, EntityRegistry, GameData, Inventory, LabProgress, LabStatus,
    Position, QuestProgress, QuestStatus, RollSource, Sprite, StartDef, Tile, TileMap,
    TilemapDef,
};
use tracing::info;

use super::context::SimContext;
use super::errors::SimResult;
use super::gems::{create_gem, request_work, set_carry_point};

/// Creates one tile entity per cell, row by row, plus the tilemap entity
/// listing them in row-major order.
pub fn generate_tilemap(registry: &mut EntityRegistry, def: &TilemapDef) -> SimResult<EntityId> {
    let height = def.height();
    let mut tiles = Vec::with_capacity(def.width as usize * height as usize);
    for y in 0..height {
        let Some(layer) = def.layer_for_row(y) else {
            break;
        };
        for x in 0..def.width {
            let tile_id = registry.create_entity("Tile");
            registry.attach(
                &tile_id,
                Tile {
                    x,
                    y,
                    density: layer.density,
                    drop_amount: layer.drop_amount,
                    drops: layer.drops.clone(),
                    destroyed: layer.open,
                },
            )?;
            registry.attach(&tile_id, Position::new(x, y))?;
            registry.attach(
                &tile_id,
                Sprite {
                    key: format!("tiles/{}", layer.name),
                    visible: true,
                },
            )?;
            tiles.push(tile_id);
        }
    }

    let tilemap_id = registry.create_entity("TileMap");
    registry.attach(
        &tilemap_id,
        TileMap {
            name: def.name.clone(),
            width: def.width,
            height,
            tiles,
        },
    )?;
    info!(tilemap = %tilemap_id, name = def.name.as_str(), width = def.width, height, "tilemap_generated");
    Ok(tilemap_id)
}

pub fn create_admin(
    registry: &mut EntityRegistry,
    data: &GameData,
    start: &StartDef,
) -> SimResult<EntityId> {
    let mut labs = Vec::with_capacity(start.labs.len());
    for name in &start.labs {
        let def = data.lab(name)?;
        labs.push(LabProgress {
            name: def.name.clone(),
            status: LabStatus::Available,
            progress: 0,
            duration: def.duration_seconds,
        });
    }
    let mut quests = Vec::with_capacity(start.quests.len());
    for name in &start.quests {
        let def = data.quest(name)?;
        quests.push(QuestProgress {
            name: def.name.clone(),
            status: QuestStatus::Active,
        });
    }

    let admin_id = registry.create_entity("Admin");
    registry.attach(
        &admin_id,
        Admin {
            items: Inventory::from_stacks(&start.items),
            crafts: start.crafts.clone(),
            quests,
            labs,
            ..Admin::default()
        },
    )?;
    Ok(admin_id)
}

/// Fresh run: tilemap, admin and the starting gems from `data.start`.
pub fn new_world(data: GameData, seed: u32, rolls: Box<dyn RollSource>) -> SimResult<SimContext> {
    let mut registry = EntityRegistry::with_seed(seed);
    let tilemap_def = data.tilemap(&data.start.tilemap)?.clone();
    let tilemap_id = generate_tilemap(&mut registry, &tilemap_def)?;
    let admin_id = create_admin(&mut registry, &data, &data.start)?;

    let starting_gems = data.start.gems.clone();
    let mut ctx = SimContext::new(registry, admin_id, tilemap_id, data, rolls);
    for gem in starting_gems {
        let id = create_gem(&mut ctx, gem.kind, gem.position)?;
        if let Some(route) = gem.carry {
            set_carry_point(&mut ctx, &id, CarryCursor::Start, route.start)?;
            set_carry_point(&mut ctx, &id, CarryCursor::Target, route.target)?;
        }
        if gem.work {
            request_work(&mut ctx, &id)?;
        }
    }
    info!(
        seed,
        entity_count = ctx.registry.len(),
        admin = %ctx.admin_id,
        "world_created"
    );
    Ok(ctx)
}
