use std::fmt;

use serde::{Deserialize, Serialize};

use super::registry::EntityId;

/// Grid cell coordinate. `y` grows downward from the surface, `x` grows away
/// from the base.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: u32,
    pub y: u32,
}

impl Position {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    pub fn manhattan_distance(self, other: Self) -> u32 {
        self.x
            .abs_diff(other.x)
            .saturating_add(self.y.abs_diff(other.y))
    }

    pub fn is_adjacent(self, other: Self) -> bool {
        self.manhattan_distance(other) == 1
    }

    pub fn below(self) -> Self {
        Self {
            x: self.x,
            y: self.y.saturating_add(1),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub name: String,
    pub amount: u32,
}

impl ItemStack {
    pub fn new(name: impl Into<String>, amount: u32) -> Self {
        Self {
            name: name.into(),
            amount,
        }
    }
}

/// Name -> amount list. Names are unique and empty stacks are dropped, so the
/// order of first insertion is preserved for "first carried item" lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Inventory {
    stacks: Vec<ItemStack>,
}

impl Inventory {
    pub fn from_stacks(stacks: &[ItemStack]) -> Self {
        let mut inventory = Self::default();
        for stack in stacks {
            inventory.add(&stack.name, stack.amount);
        }
        inventory
    }

    pub fn stacks(&self) -> &[ItemStack] {
        &self.stacks
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    pub fn amount_of(&self, name: &str) -> u32 {
        self.stacks
            .iter()
            .find(|stack| stack.name == name)
            .map(|stack| stack.amount)
            .unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.stacks
            .iter()
            .fold(0u32, |sum, stack| sum.saturating_add(stack.amount))
    }

    pub fn first_item(&self) -> Option<&str> {
        self.stacks.first().map(|stack| stack.name.as_str())
    }

    pub fn add(&mut self, name: &str, amount: u32) {
        if amount == 0 {
            return;
        }
        match self.stacks.iter_mut().find(|stack| stack.name == name) {
            Some(stack) => stack.amount = stack.amount.saturating_add(amount),
            None => self.stacks.push(ItemStack::new(name, amount)),
        }
    }

    /// Removes `amount` of `name`. Returns false and leaves the inventory
    /// untouched when there is not enough stock.
    pub fn remove(&mut self, name: &str, amount: u32) -> bool {
        let Some(index) = self.stacks.iter().position(|stack| stack.name == name) else {
            return amount == 0;
        };
        let stack = &mut self.stacks[index];
        if stack.amount < amount {
            return false;
        }
        stack.amount -= amount;
        if stack.amount == 0 {
            self.stacks.remove(index);
        }
        true
    }

    pub fn contains_all(&self, required: &[ItemStack]) -> bool {
        required
            .iter()
            .all(|stack| self.amount_of(&stack.name) >= stack.amount)
    }

    pub fn take_all(&mut self) -> Vec<ItemStack> {
        std::mem::take(&mut self.stacks)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sprite {
    pub key: String,
    pub visible: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GemAction {
    #[default]
    Idle,
    Move,
    Work,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub action: GemAction,
    pub request: bool,
    pub store: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropRate {
    pub name: String,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub x: u32,
    pub y: u32,
    pub density: u32,
    pub drop_amount: u32,
    pub drops: Vec<DropRate>,
    pub destroyed: bool,
}

impl Tile {
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }

    /// Walks the drop table accumulating rates; a roll past the cumulative
    /// mass is "no drop".
    pub fn roll_drop(&self, roll: f64) -> Option<&str> {
        let mut cumulative = 0.0f64;
        for drop in &self.drops {
            cumulative += drop.rate;
            if roll < cumulative {
                return Some(drop.name.as_str());
            }
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileMap {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub tiles: Vec<EntityId>,
}

impl TileMap {
    pub fn index_of(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn contains(&self, position: Position) -> bool {
        self.index_of(position.x, position.y).is_some()
    }

    pub fn tile_id_at(&self, position: Position) -> Option<&EntityId> {
        self.index_of(position.x, position.y)
            .and_then(|index| self.tiles.get(index))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    DigStrength,
    DigSpeed,
    MoveSpeed,
    CarrySpeed,
    Capacity,
}

/// Global additive bonuses applied on top of every gem's base stats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatBonuses {
    pub dig_strength: f64,
    pub dig_speed: f64,
    pub move_speed: f64,
    pub carry_speed: f64,
    pub capacity: f64,
}

impl StatBonuses {
    pub fn get(&self, stat: StatKind) -> f64 {
        match stat {
            StatKind::DigStrength => self.dig_strength,
            StatKind::DigSpeed => self.dig_speed,
            StatKind::MoveSpeed => self.move_speed,
            StatKind::CarrySpeed => self.carry_speed,
            StatKind::Capacity => self.capacity,
        }
    }

    pub fn add(&mut self, stat: StatKind, amount: f64) {
        let slot = match stat {
            StatKind::DigStrength => &mut self.dig_strength,
            StatKind::DigSpeed => &mut self.dig_speed,
            StatKind::MoveSpeed => &mut self.move_speed,
            StatKind::CarrySpeed => &mut self.carry_speed,
            StatKind::Capacity => &mut self.capacity,
        };
        *slot += amount;
    }

    pub fn capacity_bonus(&self) -> u32 {
        if self.capacity.is_finite() && self.capacity > 0.0 {
            self.capacity.floor() as u32
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestStatus {
    Active,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestProgress {
    pub name: String,
    pub status: QuestStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabStatus {
    Available,
    Running,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabProgress {
    pub name: String,
    pub status: LabStatus,
    pub progress: u32,
    pub duration: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Admin {
    pub items: Inventory,
    /// Lifetime totals of items delivered to the base; quest objectives read it.
    pub collected: Inventory,
    pub gems: Vec<EntityId>,
    pub requests: Vec<EntityId>,
    pub crafts: Vec<String>,
    pub quests: Vec<QuestProgress>,
    pub labs: Vec<LabProgress>,
    pub stats: StatBonuses,
}

impl Admin {
    pub fn has_request(&self, id: &EntityId) -> bool {
        self.requests.contains(id)
    }

    pub fn quest(&self, name: &str) -> Option<&QuestProgress> {
        self.quests.iter().find(|quest| quest.name == name)
    }

    pub fn lab(&self, name: &str) -> Option<&LabProgress> {
        self.labs.iter().find(|lab| lab.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MineGem {
    pub items: Inventory,
    pub capacity: u32,
    pub dig_strength: u32,
    pub dig_speed: f64,
    pub move_speed: f64,
    pub move_target: Option<Position>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarryCursor {
    #[default]
    Start,
    Target,
}

impl CarryCursor {
    pub fn flipped(self) -> Self {
        match self {
            Self::Start => Self::Target,
            Self::Target => Self::Start,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarryGem {
    pub items: Inventory,
    pub capacity: u32,
    pub carry_speed: f64,
    pub move_speed: f64,
    pub move_target: Option<Position>,
    pub carry_start: Option<Position>,
    pub carry_target: Option<Position>,
    pub carry_to: CarryCursor,
}

impl CarryGem {
    pub fn waypoint(&self) -> Option<Position> {
        match self.carry_to {
            CarryCursor::Start => self.carry_start,
            CarryCursor::Target => self.carry_target,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Position,
    Sprite,
    State,
    Tile,
    TileMap,
    Admin,
    Mine,
    Carry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Position(Position),
    Sprite(Sprite),
    State(State),
    Tile(Tile),
    TileMap(TileMap),
    Admin(Admin),
    Mine(MineGem),
    Carry(CarryGem),
}

impl Component {
    pub fn kind(&self) -> ComponentKind {
        match self {
            Self::Position(_) => ComponentKind::Position,
            Self::Sprite(_) => ComponentKind::Sprite,
            Self::State(_) => ComponentKind::State,
            Self::Tile(_) => ComponentKind::Tile,
            Self::TileMap(_) => ComponentKind::TileMap,
            Self::Admin(_) => ComponentKind::Admin,
            Self::Mine(_) => ComponentKind::Mine,
            Self::Carry(_) => ComponentKind::Carry,
        }
    }
}

/// Typed view over one [`Component`] variant.
pub trait ComponentData: Sized + Into<Component> {
    const KIND: ComponentKind;

    fn from_component(component: &Component) -> Option<&Self>;

    fn from_component_mut(component: &mut Component) -> Option<&mut Self>;
}

macro_rules! component_data {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Component {
                fn from(value: $ty) -> Self {
                    Component::$variant(value)
                }
            }

            impl ComponentData for $ty {
                const KIND: ComponentKind = ComponentKind::$variant;

                fn from_component(component: &Component) -> Option<&Self> {
                    match component {
                        Component::$variant(value) => Some(value),
                        _ => None,
                    }
                }

                fn from_component_mut(component: &mut Component) -> Option<&mut Self> {
                    match component {
                        Component::$variant(value) => Some(value),
                        _ => None,
                    }
                }
            }
        )*
    };
}

component_data!(
    Position => Position,
    Sprite => Sprite,
    State => State,
    Tile => Tile,
    TileMap => TileMap,
    Admin => Admin,
    MineGem => Mine,
    CarryGem => Carry,
);

#[cfg(test)]
mod tests {
    use super::*;

    fn tile_with_drops(drops: &[(&str, f64)]) -> Tile {
        Tile {
            x: 0,
            y: 0,
            density: 1,
            drop_amount: 1,
            drops: drops
                .iter()
                .map(|(name, rate)| DropRate {
                    name: (*name).to_string(),
                    rate: *rate,
                })
                .collect(),
            destroyed: false,
        }
    }

    #[test]
    fn inventory_remove_more_than_stock_fails_without_mutation() {
        let mut inventory = Inventory::default();
        inventory.add("IRON", 3);
        assert!(!inventory.remove("IRON", 4));
        assert_eq!(inventory.amount_of("IRON"), 3);
        assert!(!inventory.remove("GOLD", 1));
    }

    #[test]
    fn inventory_drops_empty_stacks_and_keeps_names_unique() {
        let mut inventory = Inventory::default();
        inventory.add("IRON", 1);
        inventory.add("STONE", 2);
        inventory.add("IRON", 4);
        assert_eq!(inventory.stacks().len(), 2);
        assert_eq!(inventory.amount_of("IRON"), 5);

        assert!(inventory.remove("IRON", 5));
        assert_eq!(inventory.first_item(), Some("STONE"));
        assert_eq!(inventory.total(), 2);
    }

    #[test]
    fn roll_drop_walks_cumulative_rates() {
        let tile = tile_with_drops(&[("STONE", 0.5), ("IRON", 0.25)]);
        assert_eq!(tile.roll_drop(0.0), Some("STONE"));
        assert_eq!(tile.roll_drop(0.49), Some("STONE"));
        assert_eq!(tile.roll_drop(0.5), Some("IRON"));
        assert_eq!(tile.roll_drop(0.74), Some("IRON"));
        assert_eq!(tile.roll_drop(0.75), None);
        assert_eq!(tile.roll_drop(0.99), None);
    }

    #[test]
    fn tilemap_indexing_and_bounds() {
        let tilemap = TileMap {
            name: "mine".to_string(),
            width: 2,
            height: 2,
            tiles: vec![
                EntityId::new("Tile-0"),
                EntityId::new("Tile-1"),
                EntityId::new("Tile-2"),
                EntityId::new("Tile-3"),
            ],
        };
        assert_eq!(tilemap.index_of(0, 0), Some(0));
        assert_eq!(tilemap.index_of(1, 1), Some(3));
        assert_eq!(tilemap.index_of(2, 0), None);
        assert_eq!(tilemap.index_of(0, 2), None);
        assert_eq!(
            tilemap.tile_id_at(Position::new(0, 1)),
            Some(&EntityId::new("Tile-2"))
        );
    }

    #[test]
    fn component_kind_matches_variant() {
        let component: Component = State::default().into();
        assert_eq!(component.kind(), ComponentKind::State);
        assert!(State::from_component(&component).is_some());
        assert!(Position::from_component(&component).is_none());
    }

    #[test]
    fn capacity_bonus_ignores_negative_and_fractional_parts() {
        let mut stats = StatBonuses::default();
        stats.add(StatKind::Capacity, 2.7);
        assert_eq!(stats.capacity_bonus(), 2);
        stats.add(StatKind::Capacity, -5.0);
        assert_eq!(stats.capacity_bonus(), 0);
    }
}
