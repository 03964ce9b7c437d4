use gem_engine::{CarryCursor, CarryGem, EntityId, Position, State};
use tracing::debug;

use super::admin::deliver_item;
use super::context::SimContext;
use super::errors::{SimError, SimResult};
use super::events::SimEvent;
use super::gems::{effective_capacity, payload, payload_mut, step_toward};
use super::{CARRY_DROP_MAX_X, CARRY_SEARCH_RANGE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CarryOutcome {
    Picked { item: String, from: EntityId },
    /// A source gem was found but had nothing to hand over.
    PickFailed { from: EntityId },
    Dropped { item: String },
    /// The base refused the drop; the load is kept and the gem steps on.
    DropRejected { to: Position },
    Flipped { carry_to: CarryCursor },
    Moved { to: Position },
}

/// One shuttle step between the carry start and target points.
///
/// A successful pick or drop uses up the step, as does a failed pick while
/// the carrier is still empty. Otherwise the gem walks toward the waypoint
/// `carry_to` names and flips the cursor once it stands on it. A refused
/// drop keeps the request running.
pub fn carry_step(ctx: &mut SimContext, id: &EntityId) -> SimResult<CarryOutcome> {
    let position = *ctx.registry.get::<Position>(id)?;
    let (start, target, carrying, waypoint) = {
        let carry = ctx.registry.get::<CarryGem>(id)?;
        let (Some(start), Some(target)) = (carry.carry_start, carry.carry_target) else {
            return Err(SimError::invalid_state(id, "carry start and target must be set"));
        };
        (start, target, carry.items.total(), carry.waypoint())
    };

    if position == start && carrying < effective_capacity(ctx, id)? {
        if let Some(source) = find_pick_source(ctx, id, position)? {
            match try_pick(ctx, id, &source)? {
                Some(item) => return Ok(CarryOutcome::Picked { item, from: source }),
                // An empty carrier waits at the start for the source to refill.
                None if carrying == 0 => return Ok(CarryOutcome::PickFailed { from: source }),
                None => {}
            }
        }
    }

    if position == target && carrying > 0 {
        if let Some(item) = try_drop(ctx, id)? {
            return Ok(CarryOutcome::Dropped { item });
        }
        return Ok(CarryOutcome::DropRejected {
            to: walk_shuttle(ctx, id, position)?,
        });
    }

    let Some(waypoint) = waypoint else {
        return Err(SimError::invalid_state(id, "carry waypoint is unset"));
    };
    if position == waypoint {
        return Ok(CarryOutcome::Flipped {
            carry_to: flip_cursor(ctx, id)?,
        });
    }
    let next = step_toward(ctx, id, waypoint)?;
    if next == waypoint {
        flip_cursor(ctx, id)?;
    }
    Ok(CarryOutcome::Moved { to: next })
}

/// Steps toward the current waypoint, turning around first when already on
/// it. Stays put when start and target coincide.
fn walk_shuttle(ctx: &mut SimContext, id: &EntityId, position: Position) -> SimResult<Position> {
    let Some(mut waypoint) = ctx.registry.get::<CarryGem>(id)?.waypoint() else {
        return Err(SimError::invalid_state(id, "carry waypoint is unset"));
    };
    if position == waypoint {
        flip_cursor(ctx, id)?;
        match ctx.registry.get::<CarryGem>(id)?.waypoint() {
            Some(other) if other != position => waypoint = other,
            _ => return Ok(position),
        }
    }
    let next = step_toward(ctx, id, waypoint)?;
    if next == waypoint {
        flip_cursor(ctx, id)?;
    }
    Ok(next)
}

fn flip_cursor(ctx: &mut SimContext, id: &EntityId) -> SimResult<CarryCursor> {
    let carry = ctx.registry.get_mut::<CarryGem>(id)?;
    carry.carry_to = carry.carry_to.flipped();
    Ok(carry.carry_to)
}

/// First other deployed gem found scanning down the carrier's column from
/// its own row, `CARRY_SEARCH_RANGE` rows deep. Scan order, not distance,
/// decides.
fn find_pick_source(
    ctx: &SimContext,
    id: &EntityId,
    position: Position,
) -> SimResult<Option<EntityId>> {
    let admin = ctx.admin()?;
    for offset in 0..=CARRY_SEARCH_RANGE {
        let Some(y) = position.y.checked_add(offset) else {
            break;
        };
        let cell = Position::new(position.x, y);
        for gem in admin.gems.iter().filter(|gem| *gem != id) {
            let (Ok(gem_position), Ok(state)) = (
                ctx.registry.get::<Position>(gem),
                ctx.registry.get::<State>(gem),
            ) else {
                continue;
            };
            if !state.store && *gem_position == cell {
                return Ok(Some(gem.clone()));
            }
        }
    }
    Ok(None)
}

/// Moves one unit of `source`'s first item onto the carrier. Returns `None`
/// and changes nothing when the source is empty.
pub fn try_pick(
    ctx: &mut SimContext,
    id: &EntityId,
    source: &EntityId,
) -> SimResult<Option<String>> {
    let Some(item) = payload(&ctx.registry, source)?
        .items()
        .first_item()
        .map(str::to_string)
    else {
        return Ok(None);
    };
    payload_mut(&mut ctx.registry, source)?
        .items_mut()
        .remove(&item, 1);
    ctx.registry.get_mut::<CarryGem>(id)?.items.add(&item, 1);

    ctx.events.emit(SimEvent::GemItemsChanged { id: source.clone() });
    ctx.events.emit(SimEvent::GemItemsChanged { id: id.clone() });
    debug!(gem = %id, source = %source, item = item.as_str(), "carry_picked");
    Ok(Some(item))
}

/// Hands one unit of the carrier's first item to the base. Rejected with an
/// alert, consuming nothing, when the carrier stands too far from the base.
pub fn try_drop(ctx: &mut SimContext, id: &EntityId) -> SimResult<Option<String>> {
    let position = *ctx.registry.get::<Position>(id)?;
    if position.x > CARRY_DROP_MAX_X {
        ctx.events.alert(format!(
            "Carry target {position} is too far from the base to drop items"
        ));
        return Ok(None);
    }
    let carry = ctx.registry.get_mut::<CarryGem>(id)?;
    let Some(item) = carry.items.first_item().map(str::to_string) else {
        return Ok(None);
    };
    carry.items.remove(&item, 1);
    deliver_item(ctx, &item, 1)?;

    ctx.events.emit(SimEvent::GemItemsChanged { id: id.clone() });
    debug!(gem = %id, item = item.as_str(), "carry_dropped");
    Ok(Some(item))
}
