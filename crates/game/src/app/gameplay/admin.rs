use gem_engine::{
    LabEffect, LabProgress, LabStatus, Position, QuestObjective, QuestProgress, QuestStatus,
    State, Tile, Unlock,
};
use tracing::info;

use super::context::SimContext;
use super::errors::SimResult;
use super::events::SimEvent;

pub fn add_admin_item(ctx: &mut SimContext, name: &str, amount: u32) -> SimResult<()> {
    if amount == 0 {
        return Ok(());
    }
    ctx.admin_mut()?.items.add(name, amount);
    ctx.events.emit(SimEvent::AdminItemsChanged);
    Ok(())
}

/// Returns false and leaves the ledger untouched when stock is short.
pub fn remove_admin_item(ctx: &mut SimContext, name: &str, amount: u32) -> SimResult<bool> {
    if !ctx.admin_mut()?.items.remove(name, amount) {
        return Ok(false);
    }
    if amount > 0 {
        ctx.events.emit(SimEvent::AdminItemsChanged);
    }
    Ok(true)
}

/// Items handed in by gems also count toward lifetime collection totals.
pub fn deliver_item(ctx: &mut SimContext, name: &str, amount: u32) -> SimResult<()> {
    ctx.admin_mut()?.collected.add(name, amount);
    add_admin_item(ctx, name, amount)
}

pub fn craft(ctx: &mut SimContext, build_name: &str) -> SimResult<bool> {
    let build = ctx.data.build(build_name)?.clone();
    let admin = ctx.admin_mut()?;
    if !admin.crafts.iter().any(|name| name == build_name) {
        ctx.events
            .alert(format!("{build_name} has not been unlocked yet"));
        return Ok(false);
    }
    if !admin.items.contains_all(&build.inputs) {
        ctx.events
            .alert(format!("Not enough items to craft {build_name}"));
        return Ok(false);
    }
    for input in &build.inputs {
        admin.items.remove(&input.name, input.amount);
    }
    for output in &build.outputs {
        admin.items.add(&output.name, output.amount);
    }
    ctx.events.emit(SimEvent::AdminItemsChanged);
    info!(build = build_name, "craft_completed");
    Ok(true)
}

pub fn start_lab(ctx: &mut SimContext, lab_name: &str) -> SimResult<bool> {
    let lab = ctx.data.lab(lab_name)?.clone();
    let admin = ctx.admin_mut()?;
    let Some(index) = admin.labs.iter().position(|entry| entry.name == lab_name) else {
        ctx.events.alert(format!("{lab_name} has not been unlocked yet"));
        return Ok(false);
    };
    if admin.labs[index].status != LabStatus::Available {
        ctx.events.alert(format!("{lab_name} is not available"));
        return Ok(false);
    }
    if !admin.items.contains_all(&lab.cost) {
        ctx.events
            .alert(format!("Not enough items to start {lab_name}"));
        return Ok(false);
    }
    for cost in &lab.cost {
        admin.items.remove(&cost.name, cost.amount);
    }
    let entry = &mut admin.labs[index];
    entry.status = LabStatus::Running;
    entry.progress = 0;
    entry.duration = lab.duration_seconds;
    let event = lab_event(entry);

    ctx.events.emit(SimEvent::AdminItemsChanged);
    ctx.events.emit(event);
    info!(lab = lab_name, duration_seconds = lab.duration_seconds, "lab_started");
    Ok(true)
}

fn lab_event(lab: &LabProgress) -> SimEvent {
    SimEvent::LabUpdated {
        name: lab.name.clone(),
        status: lab.status,
        progress: lab.progress,
        duration: lab.duration,
    }
}

/// Adds one simulated second to every running lab and applies the effects
/// of those that finish.
pub fn advance_labs(ctx: &mut SimContext) -> SimResult<Vec<String>> {
    let mut updates = Vec::new();
    let mut completed = Vec::new();
    for lab in ctx
        .admin_mut()?
        .labs
        .iter_mut()
        .filter(|lab| lab.status == LabStatus::Running)
    {
        lab.progress = lab.progress.saturating_add(1).min(lab.duration);
        if lab.progress >= lab.duration {
            lab.status = LabStatus::Completed;
            completed.push(lab.name.clone());
        }
        updates.push(lab_event(lab));
    }
    for event in updates {
        ctx.events.emit(event);
    }

    for name in &completed {
        let effects = ctx.data.lab(name)?.effects.clone();
        let admin = ctx.admin_mut()?;
        for effect in effects {
            match effect {
                LabEffect::StatBonus { stat, amount } => admin.stats.add(stat, amount),
                LabEffect::UnlockCraft { build } => {
                    if !admin.crafts.contains(&build) {
                        admin.crafts.push(build);
                    }
                }
            }
        }
        ctx.events.info(format!("{name} research completed"));
        info!(lab = name.as_str(), "lab_completed");
    }
    Ok(completed)
}

/// Completes every active quest whose objective has reached its threshold,
/// paying rewards and applying unlocks. Returns the completed quest names.
pub fn check_quests(ctx: &mut SimContext) -> SimResult<Vec<String>> {
    let mut completed = Vec::new();
    let active: Vec<String> = ctx
        .admin()?
        .quests
        .iter()
        .filter(|quest| quest.status == QuestStatus::Active)
        .map(|quest| quest.name.clone())
        .collect();

    for name in active {
        let quest = ctx.data.quest(&name)?.clone();
        let admin = ctx.admin()?;
        let value = match &quest.objective {
            QuestObjective::CollectItem { item } => admin.collected.amount_of(item),
            QuestObjective::OwnGems => admin.gems.len() as u32,
        };
        if value < quest.threshold {
            continue;
        }

        let mut unlocked_labs = Vec::new();
        for unlock in &quest.unlocks {
            if let Unlock::Lab { lab } = unlock {
                unlocked_labs.push(ctx.data.lab(lab)?.clone());
            }
        }

        let admin = ctx.admin_mut()?;
        if let Some(entry) = admin.quests.iter_mut().find(|entry| entry.name == name) {
            entry.status = QuestStatus::Completed;
        }
        for reward in &quest.rewards {
            admin.items.add(&reward.name, reward.amount);
        }
        for unlock in &quest.unlocks {
            match unlock {
                Unlock::Craft { build } => {
                    if !admin.crafts.contains(build) {
                        admin.crafts.push(build.clone());
                    }
                }
                Unlock::Quest { quest } => {
                    if admin.quest(quest).is_none() {
                        admin.quests.push(QuestProgress {
                            name: quest.clone(),
                            status: QuestStatus::Active,
                        });
                    }
                }
                Unlock::Lab { .. } => {}
            }
        }
        for lab in unlocked_labs {
            if admin.lab(&lab.name).is_none() {
                admin.labs.push(LabProgress {
                    name: lab.name,
                    status: LabStatus::Available,
                    progress: 0,
                    duration: lab.duration_seconds,
                });
            }
        }

        if !quest.rewards.is_empty() {
            ctx.events.emit(SimEvent::AdminItemsChanged);
        }
        ctx.events.emit(SimEvent::QuestUpdated {
            name: name.clone(),
            status: QuestStatus::Completed,
        });
        ctx.events.info(format!("Quest {name} completed"));
        info!(quest = name.as_str(), "quest_completed");
        completed.push(name);
    }
    Ok(completed)
}

/// Fills an open tile back in. Refused while a deployed gem stands on it.
pub fn restore_tile(ctx: &mut SimContext, position: Position) -> SimResult<bool> {
    let Some(tile_id) = ctx.tile_id_at(position)? else {
        ctx.events.alert(format!("No tile at {position}"));
        return Ok(false);
    };
    if !ctx.registry.get::<Tile>(&tile_id)?.destroyed {
        return Ok(false);
    }
    let occupied = ctx.admin()?.gems.iter().any(|gem| {
        let on_tile = ctx
            .registry
            .get::<Position>(gem)
            .is_ok_and(|gem_position| *gem_position == position);
        let deployed = ctx
            .registry
            .get::<State>(gem)
            .is_ok_and(|state| !state.store);
        on_tile && deployed
    });
    if occupied {
        ctx.events
            .alert(format!("Cannot restore {position} while a gem stands on it"));
        return Ok(false);
    }

    ctx.registry.get_mut::<Tile>(&tile_id)?.destroyed = false;
    ctx.events.emit(SimEvent::TileRestored {
        id: tile_id,
        position,
    });
    Ok(true)
}
