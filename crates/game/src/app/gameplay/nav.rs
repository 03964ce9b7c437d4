use std::collections::{HashMap, HashSet, VecDeque};

use gem_engine::{EntityId, EntityRegistry, Position, Tile, TileMap};
use tracing::debug;

use super::errors::{SimError, SimResult};

pub trait Walkable {
    /// True when a tile exists at `position` and is destroyed/open.
    fn is_open(&self, position: Position) -> bool;
}

/// Walkability view over the registry's tilemap.
pub struct TileGrid<'a> {
    registry: &'a EntityRegistry,
    tilemap: &'a TileMap,
}

impl<'a> TileGrid<'a> {
    pub fn from_registry(registry: &'a EntityRegistry, tilemap_id: &EntityId) -> SimResult<Self> {
        let tilemap = registry.get::<TileMap>(tilemap_id)?;
        Ok(Self { registry, tilemap })
    }
}

impl Walkable for TileGrid<'_> {
    fn is_open(&self, position: Position) -> bool {
        self.tilemap
            .tile_id_at(position)
            .and_then(|id| self.registry.get::<Tile>(id).ok())
            .is_some_and(|tile| tile.destroyed)
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenNode {
    position: Position,
    g_cost: u32,
    f_cost: u32,
}

/// Four-directional A* with uniform step cost and a Manhattan heuristic.
///
/// The open set is a plain `Vec` scanned linearly; the first entry holding
/// the minimum `f` wins, so discovery order breaks ties. The returned path
/// starts at `start` and ends at `target`, or is empty when `target` cannot
/// be reached. `start` itself does not need to be open.
pub fn find_path(grid: &impl Walkable, start: Position, target: Position) -> Vec<Position> {
    if start == target {
        return vec![start];
    }

    let mut open = vec![OpenNode {
        position: start,
        g_cost: 0,
        f_cost: start.manhattan_distance(target),
    }];
    let mut closed = HashSet::new();
    let mut best_g = HashMap::from([(start, 0u32)]);
    let mut parent = HashMap::new();

    while !open.is_empty() {
        let current = open.remove(pick_first_min_f_index(&open));
        if !closed.insert(current.position) {
            continue;
        }
        if current.position == target {
            return reconstruct_path(&parent, start, target);
        }

        for neighbor in neighbors(current.position).into_iter().flatten() {
            if closed.contains(&neighbor) || !grid.is_open(neighbor) {
                continue;
            }
            let tentative_g = current.g_cost.saturating_add(1);
            if best_g
                .get(&neighbor)
                .is_some_and(|known| tentative_g >= *known)
            {
                continue;
            }
            best_g.insert(neighbor, tentative_g);
            parent.insert(neighbor, current.position);
            open.push(OpenNode {
                position: neighbor,
                g_cost: tentative_g,
                f_cost: tentative_g.saturating_add(neighbor.manhattan_distance(target)),
            });
        }
    }

    Vec::new()
}

fn pick_first_min_f_index(open: &[OpenNode]) -> usize {
    let mut best_index = 0usize;
    for (index, node) in open.iter().enumerate().skip(1) {
        if node.f_cost < open[best_index].f_cost {
            best_index = index;
        }
    }
    best_index
}

fn neighbors(position: Position) -> [Option<Position>; 4] {
    let Position { x, y } = position;
    [
        y.checked_add(1).map(|y| Position::new(x, y)),
        x.checked_add(1).map(|x| Position::new(x, y)),
        y.checked_sub(1).map(|y| Position::new(x, y)),
        x.checked_sub(1).map(|x| Position::new(x, y)),
    ]
}

fn reconstruct_path(
    parent: &HashMap<Position, Position>,
    start: Position,
    target: Position,
) -> Vec<Position> {
    let mut path = vec![target];
    let mut cursor = target;
    while cursor != start {
        match parent.get(&cursor) {
            Some(previous) => {
                cursor = *previous;
                path.push(cursor);
            }
            None => return Vec::new(),
        }
    }
    path.reverse();
    path
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CachedPath {
    target: Position,
    steps: VecDeque<Position>,
}

/// Per-entity path cache. Entries are created on the first step toward a
/// target and removed on arrival or when the caller forgets the mover.
#[derive(Debug, Default)]
pub struct Navigator {
    cache: HashMap<EntityId, CachedPath>,
    searches_run: u64,
}

impl Navigator {
    /// Next cell for `id` on its way from `current` to `target`.
    ///
    /// The cached path is replaced when the target changed, when its next
    /// cell is no longer open, or when the mover is no longer next to it.
    pub fn next_step(
        &mut self,
        grid: &impl Walkable,
        id: &EntityId,
        current: Position,
        target: Position,
    ) -> SimResult<Position> {
        let needs_plan = match self.cache.get(id) {
            None => true,
            Some(cached) => {
                cached.target != target
                    || cached
                        .steps
                        .front()
                        .map_or(true, |next| !next.is_adjacent(current) || !grid.is_open(*next))
            }
        };

        if needs_plan {
            self.searches_run = self.searches_run.saturating_add(1);
            let path = find_path(grid, current, target);
            if path.is_empty() {
                self.cache.remove(id);
                return Err(SimError::PathNotFound {
                    id: id.clone(),
                    from: current,
                    to: target,
                });
            }
            debug!(entity = %id, from = %current, to = %target, steps = path.len() - 1, "path_planned");
            self.cache.insert(
                id.clone(),
                CachedPath {
                    target,
                    steps: path.into_iter().skip(1).collect(),
                },
            );
        }

        let Some(cached) = self.cache.get_mut(id) else {
            return Err(SimError::invalid_state(id, "path cache missing after planning"));
        };
        let Some(next) = cached.steps.pop_front() else {
            self.cache.remove(id);
            return Err(SimError::invalid_state(id, "already at move target"));
        };
        if cached.steps.is_empty() {
            self.cache.remove(id);
        }
        Ok(next)
    }

    pub fn forget(&mut self, id: &EntityId) {
        self.cache.remove(id);
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    pub fn searches_run(&self) -> u64 {
        self.searches_run
    }

    pub fn cached_target(&self, id: &EntityId) -> Option<Position> {
        self.cache.get(id).map(|cached| cached.target)
    }

    pub fn cached_steps_remaining(&self, id: &EntityId) -> usize {
        self.cache.get(id).map_or(0, |cached| cached.steps.len())
    }
}

#[cfg(test)]
mod nav_tests {
    use super::*;

    struct TestGrid {
        width: u32,
        height: u32,
        blocked: HashSet<Position>,
    }

    impl TestGrid {
        fn open(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                blocked: HashSet::new(),
            }
        }

        fn block(&mut self, x: u32, y: u32) {
            self.blocked.insert(Position::new(x, y));
        }
    }

    impl Walkable for TestGrid {
        fn is_open(&self, position: Position) -> bool {
            position.x < self.width
                && position.y < self.height
                && !self.blocked.contains(&position)
        }
    }

    fn assert_unit_steps(path: &[Position]) {
        for pair in path.windows(2) {
            assert!(
                pair[0].is_adjacent(pair[1]),
                "non-unit step {} -> {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn path_starts_at_start_and_ends_at_target() {
        let grid = TestGrid::open(10, 10);
        let start = Position::new(5, 5);
        let target = Position::new(0, 0);
        let path = find_path(&grid, start, target);

        assert_eq!(path.len(), 11);
        assert_eq!(path.first(), Some(&start));
        assert_eq!(path.last(), Some(&target));
        assert_unit_steps(&path);
    }

    #[test]
    fn walled_off_target_yields_empty_path() {
        let mut grid = TestGrid::open(7, 5);
        for y in 0..5 {
            grid.block(3, y);
        }
        assert!(find_path(&grid, Position::new(1, 2), Position::new(5, 2)).is_empty());
    }

    #[test]
    fn path_routes_around_wall_gap_and_never_enters_blocked_cell() {
        let mut grid = TestGrid::open(7, 5);
        for y in 0..4 {
            grid.block(3, y);
        }
        let path = find_path(&grid, Position::new(1, 2), Position::new(5, 2));

        assert!(path.contains(&Position::new(3, 4)));
        assert_unit_steps(&path);
        for cell in &path[1..] {
            assert!(grid.is_open(*cell), "path entered blocked cell {cell}");
        }
    }

    #[test]
    fn start_cell_need_not_be_open() {
        let mut grid = TestGrid::open(3, 3);
        grid.block(1, 1);
        let path = find_path(&grid, Position::new(1, 1), Position::new(1, 0));
        assert_eq!(path, vec![Position::new(1, 1), Position::new(1, 0)]);
    }

    #[test]
    fn start_equal_to_target_is_single_cell_path() {
        let grid = TestGrid::open(2, 2);
        assert_eq!(
            find_path(&grid, Position::new(1, 1), Position::new(1, 1)),
            vec![Position::new(1, 1)]
        );
    }

    #[test]
    fn tie_break_is_deterministic_on_symmetric_map() {
        let mut grid = TestGrid::open(5, 5);
        grid.block(2, 2);
        let first = find_path(&grid, Position::new(0, 2), Position::new(4, 2));
        let second = find_path(&grid, Position::new(0, 2), Position::new(4, 2));
        assert_eq!(first, second);
        assert_eq!(first.len(), 7);
    }

    #[test]
    fn navigator_reuses_cached_path_for_same_target() {
        let grid = TestGrid::open(10, 10);
        let mut navigator = Navigator::default();
        let id = EntityId::new("Gem-1");
        let mut current = Position::new(5, 5);
        let target = Position::new(0, 0);

        while current != target {
            current = navigator
                .next_step(&grid, &id, current, target)
                .expect("step");
        }
        assert_eq!(navigator.searches_run(), 1);
        assert_eq!(navigator.cached_target(&id), None);
    }

    #[test]
    fn navigator_replans_when_target_changes() {
        let grid = TestGrid::open(10, 10);
        let mut navigator = Navigator::default();
        let id = EntityId::new("Gem-1");
        let current = navigator
            .next_step(&grid, &id, Position::new(5, 5), Position::new(0, 0))
            .expect("first");
        navigator
            .next_step(&grid, &id, current, Position::new(9, 9))
            .expect("second");
        assert_eq!(navigator.searches_run(), 2);
        assert_eq!(navigator.cached_target(&id), Some(Position::new(9, 9)));
    }

    #[test]
    fn navigator_replans_when_next_cell_closes() {
        let mut grid = TestGrid::open(5, 3);
        let mut navigator = Navigator::default();
        let id = EntityId::new("Gem-1");
        let start = Position::new(0, 0);
        let target = Position::new(4, 0);
        let first = navigator
            .next_step(&grid, &id, start, target)
            .expect("first");
        assert_eq!(first, Position::new(1, 0));

        grid.block(2, 0);
        let second = navigator
            .next_step(&grid, &id, first, target)
            .expect("replanned");
        assert_eq!(navigator.searches_run(), 2);
        assert_ne!(second, Position::new(2, 0));
        assert!(second.is_adjacent(first));
    }

    #[test]
    fn navigator_reports_path_not_found() {
        let mut grid = TestGrid::open(3, 1);
        grid.block(1, 0);
        let mut navigator = Navigator::default();
        let id = EntityId::new("Gem-1");
        let err = navigator
            .next_step(&grid, &id, Position::new(0, 0), Position::new(2, 0))
            .expect_err("walled");
        assert!(matches!(err, SimError::PathNotFound { .. }));
        assert_eq!(navigator.cached_target(&id), None);
    }
}
