use gem_engine::{EntityId, MineGem, Position, Tile};
use tracing::debug;

use super::context::SimContext;
use super::errors::{SimError, SimResult};
use super::events::SimEvent;
use super::gems::{cancel_request, effective_capacity};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MineOutcome {
    /// One unit of budget spent; `item` is `None` when the roll missed the
    /// drop table.
    Mined { item: Option<String> },
    /// The tile had no budget left: it is now open and the gem moved down.
    Exhausted { moved_to: Position },
    TooWeak,
    Full,
    AtBottom,
}

/// One mining step at the gem's current cell.
///
/// Capacity is checked before any budget is spent, so a full gem leaves the
/// tile untouched.
pub fn mine_step(ctx: &mut SimContext, id: &EntityId) -> SimResult<MineOutcome> {
    let position = *ctx.registry.get::<Position>(id)?;
    let Some(tile_id) = ctx.tile_id_at(position)? else {
        return Err(SimError::invalid_state(
            id,
            format!("no tile to mine at {position}"),
        ));
    };
    let strength = ctx.registry.get::<MineGem>(id)?.dig_strength as f64 + ctx.stats()?.dig_strength;
    let (density, drop_amount, destroyed) = {
        let tile = ctx.registry.get::<Tile>(&tile_id)?;
        (tile.density, tile.drop_amount, tile.destroyed)
    };

    if strength < density as f64 {
        ctx.events
            .alert(format!("Gem is too weak to mine density {density} at {position}"));
        cancel_request(ctx, id)?;
        return Ok(MineOutcome::TooWeak);
    }

    if drop_amount == 0 {
        if !destroyed {
            ctx.registry.get_mut::<Tile>(&tile_id)?.destroyed = true;
            ctx.events.emit(SimEvent::TileDestroyed {
                id: tile_id.clone(),
                position,
            });
        }
        let below = position.below();
        if below == position || !ctx.tilemap()?.contains(below) {
            ctx.events.alert("Gem reached the bottom of the mine");
            cancel_request(ctx, id)?;
            return Ok(MineOutcome::AtBottom);
        }
        *ctx.registry.get_mut::<Position>(id)? = below;
        ctx.navigator.forget(id);
        ctx.events.emit(SimEvent::PositionChanged {
            id: id.clone(),
            from: position,
            to: below,
        });
        debug!(gem = %id, from = %position, to = %below, "tile_exhausted");
        return Ok(MineOutcome::Exhausted { moved_to: below });
    }

    let capacity = effective_capacity(ctx, id)?;
    if ctx.registry.get::<MineGem>(id)?.items.total() >= capacity {
        ctx.events.alert("Gem is full");
        return Ok(MineOutcome::Full);
    }

    let roll = ctx.rolls.roll();
    let item = {
        let tile = ctx.registry.get_mut::<Tile>(&tile_id)?;
        tile.drop_amount -= 1;
        tile.roll_drop(roll).map(str::to_string)
    };
    if let Some(name) = &item {
        ctx.registry.get_mut::<MineGem>(id)?.items.add(name, 1);
        ctx.events.emit(SimEvent::GemItemsChanged { id: id.clone() });
    }
    debug!(gem = %id, tile = %tile_id, roll, item = item.as_deref(), "tile_mined");
    Ok(MineOutcome::Mined { item })
}
