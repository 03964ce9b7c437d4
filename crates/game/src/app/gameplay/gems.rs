use gem_engine::{
    CarryCursor, CarryGem, ComponentKind, EntityId, EntityRegistry, GemAction, GemKind, Inventory,
    MineGem, Position, Sprite, State,
};
use tracing::{debug, info};

use super::admin::add_admin_item;
use super::carry::carry_step;
use super::context::{PendingRequest, SimContext};
use super::errors::{SimError, SimResult};
use super::events::SimEvent;
use super::mine::mine_step;
use super::nav::TileGrid;

/// Fields shared by every gem payload, so movement and storage do not care
/// which kind of gem they are handling.
pub(crate) trait GemPayload {
    fn items(&self) -> &Inventory;
    fn items_mut(&mut self) -> &mut Inventory;
    fn base_capacity(&self) -> u32;
    fn move_target(&self) -> Option<Position>;
    fn set_move_target(&mut self, target: Option<Position>);
}

macro_rules! gem_payload {
    ($($ty:ty),* $(,)?) => {
        $(
            impl GemPayload for $ty {
                fn items(&self) -> &Inventory {
                    &self.items
                }

                fn items_mut(&mut self) -> &mut Inventory {
                    &mut self.items
                }

                fn base_capacity(&self) -> u32 {
                    self.capacity
                }

                fn move_target(&self) -> Option<Position> {
                    self.move_target
                }

                fn set_move_target(&mut self, target: Option<Position>) {
                    self.move_target = target;
                }
            }
        )*
    };
}

gem_payload!(MineGem, CarryGem);

pub(crate) fn payload<'a>(
    registry: &'a EntityRegistry,
    id: &EntityId,
) -> SimResult<&'a dyn GemPayload> {
    if registry.has::<MineGem>(id) {
        return Ok(registry.get::<MineGem>(id)?);
    }
    if registry.has::<CarryGem>(id) {
        return Ok(registry.get::<CarryGem>(id)?);
    }
    Err(missing_payload(registry, id))
}

pub(crate) fn payload_mut<'a>(
    registry: &'a mut EntityRegistry,
    id: &EntityId,
) -> SimResult<&'a mut dyn GemPayload> {
    if registry.has::<MineGem>(id) {
        return Ok(registry.get_mut::<MineGem>(id)?);
    }
    if registry.has::<CarryGem>(id) {
        return Ok(registry.get_mut::<CarryGem>(id)?);
    }
    Err(missing_payload(registry, id))
}

fn missing_payload(registry: &EntityRegistry, id: &EntityId) -> SimError {
    if registry.contains(id) {
        SimError::ComponentNotFound {
            id: id.clone(),
            kind: ComponentKind::Mine,
        }
    } else {
        SimError::EntityNotFound(id.clone())
    }
}

pub fn gem_kind(ctx: &SimContext, id: &EntityId) -> SimResult<GemKind> {
    if ctx.registry.has::<MineGem>(id) {
        Ok(GemKind::Mine)
    } else if ctx.registry.has::<CarryGem>(id) {
        Ok(GemKind::Carry)
    } else {
        Err(missing_payload(&ctx.registry, id))
    }
}

/// Payload capacity plus the admin's global capacity bonus.
pub(crate) fn effective_capacity(ctx: &SimContext, id: &EntityId) -> SimResult<u32> {
    let base = payload(&ctx.registry, id)?.base_capacity();
    Ok(base.saturating_add(ctx.stats()?.capacity_bonus()))
}

pub fn create_gem(ctx: &mut SimContext, kind: GemKind, position: Position) -> SimResult<EntityId> {
    let def = ctx.data.gem(kind)?.clone();
    if !ctx.tilemap()?.contains(position) {
        return Err(SimError::invalid_state(
            &ctx.admin_id,
            format!("cannot place {} gem outside the map at {position}", kind.as_token()),
        ));
    }

    let id = ctx.registry.create_entity("Gem");
    ctx.registry.attach(&id, position)?;
    ctx.registry.attach(
        &id,
        Sprite {
            key: def.sprite.clone(),
            visible: true,
        },
    )?;
    ctx.registry.attach(&id, State::default())?;
    match kind {
        GemKind::Mine => ctx.registry.attach(
            &id,
            MineGem {
                items: Inventory::default(),
                capacity: def.capacity,
                dig_strength: def.dig_strength,
                dig_speed: def.dig_speed,
                move_speed: def.move_speed,
                move_target: None,
            },
        )?,
        GemKind::Carry => ctx.registry.attach(
            &id,
            CarryGem {
                items: Inventory::default(),
                capacity: def.capacity,
                carry_speed: def.carry_speed,
                move_speed: def.move_speed,
                move_target: None,
                carry_start: None,
                carry_target: None,
                carry_to: CarryCursor::Start,
            },
        )?,
    }
    ctx.admin_mut()?.gems.push(id.clone());

    ctx.events.emit(SimEvent::EntityCreated {
        id: id.clone(),
        type_name: "Gem".to_string(),
    });
    info!(gem = %id, kind = kind.as_token(), position = %position, "gem_created");
    Ok(id)
}

/// Removes a gem entirely, returning anything it carried to the ledger.
pub fn destroy_gem(ctx: &mut SimContext, id: &EntityId) -> SimResult<()> {
    // Items leave the gem only once the ledger is known to exist.
    ctx.admin()?;
    let items = payload_mut(&mut ctx.registry, id)?.items_mut().take_all();
    for stack in &items {
        add_admin_item(ctx, &stack.name, stack.amount)?;
    }
    let admin = ctx.admin_mut()?;
    admin.gems.retain(|gem| gem != id);
    admin.requests.retain(|gem| gem != id);
    ctx.navigator.forget(id);
    ctx.registry.destroy(id)?;
    ctx.events.emit(SimEvent::EntityDestroyed { id: id.clone() });
    info!(gem = %id, "gem_destroyed");
    Ok(())
}

/// The only place that changes `State.request`; keeps it in step with the
/// admin's request list.
pub fn set_gem_request(
    ctx: &mut SimContext,
    id: &EntityId,
    active: bool,
    action: GemAction,
) -> SimResult<()> {
    let state = {
        let state = ctx.registry.get_mut::<State>(id)?;
        state.request = active;
        state.action = action;
        *state
    };
    let admin = ctx.admin_mut()?;
    let listed = admin.requests.contains(id);
    if active && !listed {
        admin.requests.push(id.clone());
    } else if !active && listed {
        admin.requests.retain(|gem| gem != id);
    }
    ctx.events.emit(SimEvent::GemStateChanged {
        id: id.clone(),
        state,
    });
    Ok(())
}

fn ensure_deployed(ctx: &SimContext, id: &EntityId) -> SimResult<()> {
    if ctx.registry.get::<State>(id)?.store {
        return Err(SimError::invalid_state(id, "gem is stored"));
    }
    Ok(())
}

fn ensure_on_map(ctx: &SimContext, id: &EntityId, position: Position) -> SimResult<()> {
    if !ctx.tilemap()?.contains(position) {
        return Err(SimError::invalid_state(
            id,
            format!("{position} is outside the map"),
        ));
    }
    Ok(())
}

pub fn request_move(ctx: &mut SimContext, id: &EntityId, target: Position) -> SimResult<()> {
    ensure_deployed(ctx, id)?;
    ensure_on_map(ctx, id, target)?;
    payload_mut(&mut ctx.registry, id)?.set_move_target(Some(target));
    set_gem_request(ctx, id, true, GemAction::Move)?;
    debug!(gem = %id, target = %target, "move_requested");
    Ok(())
}

pub fn request_work(ctx: &mut SimContext, id: &EntityId) -> SimResult<()> {
    ensure_deployed(ctx, id)?;
    if let Ok(carry) = ctx.registry.get::<CarryGem>(id) {
        if carry.carry_start.is_none() || carry.carry_target.is_none() {
            return Err(SimError::invalid_state(id, "carry start and target must be set"));
        }
    }
    payload_mut(&mut ctx.registry, id)?.set_move_target(None);
    ctx.navigator.forget(id);
    set_gem_request(ctx, id, true, GemAction::Work)?;
    debug!(gem = %id, "work_requested");
    Ok(())
}

pub fn set_carry_point(
    ctx: &mut SimContext,
    id: &EntityId,
    which: CarryCursor,
    position: Position,
) -> SimResult<()> {
    ensure_on_map(ctx, id, position)?;
    let carry = ctx.registry.get_mut::<CarryGem>(id)?;
    match which {
        CarryCursor::Start => carry.carry_start = Some(position),
        CarryCursor::Target => carry.carry_target = Some(position),
    }
    debug!(gem = %id, point = ?which, position = %position, "carry_point_set");
    Ok(())
}

pub fn cancel_request(ctx: &mut SimContext, id: &EntityId) -> SimResult<()> {
    payload_mut(&mut ctx.registry, id)?.set_move_target(None);
    ctx.navigator.forget(id);
    set_gem_request(ctx, id, false, GemAction::Idle)?;
    ctx.events.emit(SimEvent::GemStopped { id: id.clone() });
    Ok(())
}

/// Parks a gem at the base: its items go to the ledger and it leaves the map.
pub fn store_gem(ctx: &mut SimContext, id: &EntityId) -> SimResult<()> {
    ensure_deployed(ctx, id)?;
    cancel_request(ctx, id)?;

    let items = payload_mut(&mut ctx.registry, id)?.items_mut().take_all();
    for stack in &items {
        add_admin_item(ctx, &stack.name, stack.amount)?;
    }
    let from = std::mem::take(ctx.registry.get_mut::<Position>(id)?);
    ctx.registry.get_mut::<State>(id)?.store = true;
    ctx.registry.get_mut::<Sprite>(id)?.visible = false;

    ctx.events.emit(SimEvent::GemItemsChanged { id: id.clone() });
    ctx.events.emit(SimEvent::PositionChanged {
        id: id.clone(),
        from,
        to: Position::default(),
    });
    info!(gem = %id, returned_stacks = items.len(), "gem_stored");
    Ok(())
}

pub fn deploy_gem(ctx: &mut SimContext, id: &EntityId, position: Position) -> SimResult<()> {
    if !ctx.registry.get::<State>(id)?.store {
        return Err(SimError::invalid_state(id, "gem is already deployed"));
    }
    ensure_on_map(ctx, id, position)?;

    let from = std::mem::replace(ctx.registry.get_mut::<Position>(id)?, position);
    ctx.registry.get_mut::<State>(id)?.store = false;
    ctx.registry.get_mut::<Sprite>(id)?.visible = true;
    ctx.events.emit(SimEvent::PositionChanged {
        id: id.clone(),
        from,
        to: position,
    });
    info!(gem = %id, position = %position, "gem_deployed");
    Ok(())
}

/// Steps per second for `action`: the gem's base speed plus the admin bonus.
pub fn action_speed(ctx: &SimContext, id: &EntityId, action: GemAction) -> SimResult<f64> {
    let stats = ctx.stats()?;
    let speed = match (action, gem_kind(ctx, id)?) {
        (GemAction::Idle, _) => 0.0,
        (GemAction::Move, GemKind::Mine) => {
            ctx.registry.get::<MineGem>(id)?.move_speed + stats.move_speed
        }
        (GemAction::Move, GemKind::Carry) => {
            ctx.registry.get::<CarryGem>(id)?.move_speed + stats.move_speed
        }
        (GemAction::Work, GemKind::Mine) => {
            ctx.registry.get::<MineGem>(id)?.dig_speed + stats.dig_speed
        }
        (GemAction::Work, GemKind::Carry) => {
            ctx.registry.get::<CarryGem>(id)?.carry_speed + stats.carry_speed
        }
    };
    Ok(speed.max(0.0))
}

/// Moves the gem one cell along its cached path toward `target`.
pub fn step_toward(ctx: &mut SimContext, id: &EntityId, target: Position) -> SimResult<Position> {
    let current = *ctx.registry.get::<Position>(id)?;
    let next = {
        let grid = TileGrid::from_registry(&ctx.registry, &ctx.tilemap_id)?;
        ctx.navigator.next_step(&grid, id, current, target)?
    };
    *ctx.registry.get_mut::<Position>(id)? = next;
    ctx.events.emit(SimEvent::PositionChanged {
        id: id.clone(),
        from: current,
        to: next,
    });
    Ok(next)
}

pub fn move_step(ctx: &mut SimContext, id: &EntityId) -> SimResult<()> {
    let Some(target) = payload(&ctx.registry, id)?.move_target() else {
        return Err(SimError::invalid_state(id, "move request without a target"));
    };
    let mut current = *ctx.registry.get::<Position>(id)?;
    if current != target {
        current = step_toward(ctx, id, target)?;
    }
    if current == target {
        cancel_request(ctx, id)?;
        debug!(gem = %id, position = %current, "move_arrived");
    }
    Ok(())
}

pub fn work_step(ctx: &mut SimContext, id: &EntityId) -> SimResult<()> {
    match gem_kind(ctx, id)? {
        GemKind::Mine => mine_step(ctx, id).map(|_| ()),
        GemKind::Carry => carry_step(ctx, id).map(|_| ()),
    }
}

/// Consumes the pending UI request, if any, against the current selection.
pub fn apply_ui_request(ctx: &mut SimContext) -> SimResult<()> {
    let Some(pending) = ctx.ui.pending.take() else {
        return Ok(());
    };
    let Some(gem) = ctx.ui.selected_gem.clone() else {
        ctx.events.alert("Select a gem first");
        return Ok(());
    };
    let tile = ctx.ui.selected_tile;
    let needs_tile = |ctx: &mut SimContext| -> Option<Position> {
        if tile.is_none() {
            ctx.events.alert("Select a tile first");
        }
        tile
    };

    match pending {
        PendingRequest::Move => {
            if let Some(target) = needs_tile(ctx) {
                request_move(ctx, &gem, target)?;
            }
        }
        PendingRequest::Work => request_work(ctx, &gem)?,
        PendingRequest::CarryStart => {
            if let Some(position) = needs_tile(ctx) {
                set_carry_point(ctx, &gem, CarryCursor::Start, position)?;
            }
        }
        PendingRequest::CarryTarget => {
            if let Some(position) = needs_tile(ctx) {
                set_carry_point(ctx, &gem, CarryCursor::Target, position)?;
            }
        }
        PendingRequest::Deploy => {
            if let Some(position) = needs_tile(ctx) {
                deploy_gem(ctx, &gem, position)?;
            }
        }
        PendingRequest::Store => store_gem(ctx, &gem)?,
    }
    Ok(())
}
