use std::collections::VecDeque;

use serde::Serialize;

use crate::config::{GeneratorKind, MissionConfig};
use crate::constants::{
    BUILDING_PADDING, BUILDING_PLACEMENT_ATTEMPTS, CAVE_FILL_PROBABILITY, CAVE_SMOOTHING_PASSES,
    COVER_CLUSTERS, TUNNEL_MAX_STEPS,
};
use crate::pathfinding::find_path;
use crate::rng::Rng;
use crate::types::{Cell, GridSnapshot, Vec2};

/// Axis-aligned rectangle in grid coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.x && p.y >= self.y && p.x < self.x + self.w && p.y < self.y + self.h
    }

    pub fn inflate(&self, pad: i32) -> Rect {
        Rect {
            x: self.x - pad,
            y: self.y - pad,
            w: self.w + pad * 2,
            h: self.h + pad * 2,
        }
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.w
            && other.x < self.x + self.w
            && self.y < other.y + other.h
            && other.y < self.y + self.h
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Building {
    pub id: usize,
    pub rect: Rect,
    pub door: Vec2,
    #[serde(rename = "interiorCells")]
    pub interior_cells: Vec<Vec2>,
}

/// Wall/floor/door cells plus the building id of every interior cell (-1
/// outdoors). Row-major.
#[derive(Clone, Debug)]
pub struct Grid {
    width: i32,
    height: i32,
    cells: Vec<Cell>,
    building_ids: Vec<i32>,
}

impl Grid {
    pub fn filled(width: i32, height: i32, cell: Cell) -> Self {
        assert!(width > 0 && height > 0, "grid must not be empty");
        let len = (width * height) as usize;
        Self {
            width,
            height,
            cells: vec![cell; len],
            building_ids: vec![-1; len],
        }
    }

    /// Floor everywhere except a wall ring on the boundary.
    pub fn open(width: i32, height: i32) -> Self {
        let mut grid = Self::filled(width, height, Cell::Floor);
        for x in 0..width {
            grid.set(Vec2::new(x, 0), Cell::Wall);
            grid.set(Vec2::new(x, height - 1), Cell::Wall);
        }
        for y in 0..height {
            grid.set(Vec2::new(0, y), Cell::Wall);
            grid.set(Vec2::new(width - 1, y), Cell::Wall);
        }
        grid
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, p: Vec2) -> bool {
        p.x >= 0 && p.y >= 0 && p.x < self.width && p.y < self.height
    }

    pub fn index(&self, p: Vec2) -> usize {
        assert!(
            self.in_bounds(p),
            "cell ({}, {}) is outside the {}x{} grid",
            p.x,
            p.y,
            self.width,
            self.height
        );
        (p.y * self.width + p.x) as usize
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, p: Vec2) -> Cell {
        self.cells[self.index(p)]
    }

    pub fn set(&mut self, p: Vec2, cell: Cell) {
        let idx = self.index(p);
        self.cells[idx] = cell;
    }

    /// Off-grid cells are never passable.
    pub fn is_passable(&self, p: Vec2) -> bool {
        self.in_bounds(p) && self.cell(p).is_passable()
    }

    pub fn is_wall(&self, p: Vec2) -> bool {
        self.cell(p) == Cell::Wall
    }

    pub fn building_id(&self, p: Vec2) -> i32 {
        self.building_ids[self.index(p)]
    }

    pub fn set_building_id(&mut self, p: Vec2, id: i32) {
        let idx = self.index(p);
        self.building_ids[idx] = id;
    }

    /// First ring inside the outer wall, or the wall itself.
    pub fn is_border(&self, p: Vec2) -> bool {
        p.x <= 1 || p.y <= 1 || p.x >= self.width - 2 || p.y >= self.height - 2
    }

    pub fn coords(&self) -> impl Iterator<Item = Vec2> + '_ {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| Vec2::new(x, y)))
    }

    pub fn passable_cells(&self) -> Vec<Vec2> {
        self.coords().filter(|p| self.cell(*p).is_passable()).collect()
    }

    pub fn rows(&self) -> Vec<String> {
        (0..self.height)
            .map(|y| {
                (0..self.width)
                    .map(|x| self.cell(Vec2::new(x, y)).glyph())
                    .collect::<String>()
            })
            .collect()
    }

    /// Parses `#`, `.` and `+` rows. Used for hand-built layouts.
    pub fn from_rows(rows: &[&str]) -> Self {
        let height = rows.len() as i32;
        let width = rows.first().map(|row| row.chars().count()).unwrap_or(0) as i32;
        let mut grid = Self::filled(width, height, Cell::Floor);
        for (y, row) in rows.iter().enumerate() {
            assert_eq!(row.chars().count() as i32, width, "ragged layout row {y}");
            for (x, ch) in row.chars().enumerate() {
                let cell = match ch {
                    '#' => Cell::Wall,
                    '+' => Cell::Door,
                    _ => Cell::Floor,
                };
                grid.set(Vec2::new(x as i32, y as i32), cell);
            }
        }
        grid
    }
}

#[derive(Clone, Debug)]
pub struct GeneratedWorld {
    pub grid: Grid,
    pub buildings: Vec<Building>,
    pub entry: Vec2,
    pub extraction: Vec2,
    /// Whether the connectivity fallback had to carve a tunnel.
    pub tunnel_carved: bool,
}

impl GeneratedWorld {
    /// `revealed` is indexed like the grid; hidden cells render as `?`.
    pub fn to_snapshot(&self, revealed: &[bool]) -> GridSnapshot {
        let grid = &self.grid;
        let mut rows = Vec::with_capacity(grid.height() as usize);
        let mut building_ids = Vec::with_capacity(grid.height() as usize);
        for y in 0..grid.height() {
            let mut row = String::with_capacity(grid.width() as usize);
            let mut ids = Vec::with_capacity(grid.width() as usize);
            for x in 0..grid.width() {
                let p = Vec2::new(x, y);
                if revealed[grid.index(p)] {
                    row.push(grid.cell(p).glyph());
                    ids.push(grid.building_id(p));
                } else {
                    row.push('?');
                    ids.push(-1);
                }
            }
            rows.push(row);
            building_ids.push(ids);
        }
        GridSnapshot {
            width: grid.width(),
            height: grid.height(),
            rows,
            building_ids,
            entry: self.entry,
            extraction: self.extraction,
        }
    }
}

pub fn default_entry(height: i32) -> Vec2 {
    Vec2::new(2, height / 2)
}

pub fn default_extraction(width: i32, height: i32) -> Vec2 {
    Vec2::new(width - 3, height / 2)
}

pub fn generate_world(config: &MissionConfig, rng: &mut Rng) -> GeneratedWorld {
    match config.generator {
        GeneratorKind::Facility => generate_facility(
            config.map_width,
            config.map_height,
            config.building_count,
            rng,
        ),
        GeneratorKind::Cave => generate_cave(config.map_width, config.map_height, rng),
    }
}

pub fn generate_facility(
    width: i32,
    height: i32,
    building_count: usize,
    rng: &mut Rng,
) -> GeneratedWorld {
    let mut grid = Grid::open(width, height);
    let entry = default_entry(height);
    let extraction = default_extraction(width, height);

    scatter_cover(&mut grid, rng);

    let reserved = [
        Rect {
            x: entry.x - 1,
            y: entry.y - 1,
            w: 3,
            h: 3,
        },
        Rect {
            x: extraction.x - 1,
            y: extraction.y - 1,
            w: 3,
            h: 3,
        },
    ];
    let mut buildings: Vec<Building> = Vec::new();
    let max_w = (width - 5).min(15);
    let max_h = (height - 5).min(12);
    if max_w >= 9 && max_h >= 7 {
        let mut attempts = 0;
        while buildings.len() < building_count && attempts < BUILDING_PLACEMENT_ATTEMPTS {
            attempts += 1;
            let bw = rng.int(9, max_w);
            let bh = rng.int(7, max_h);
            let rect = Rect {
                x: rng.int(2, width - bw - 3),
                y: rng.int(2, height - bh - 3),
                w: bw,
                h: bh,
            };
            let padded = rect.inflate(BUILDING_PADDING);
            if buildings
                .iter()
                .any(|b| padded.intersects(&b.rect.inflate(BUILDING_PADDING)))
            {
                continue;
            }
            if reserved.iter().any(|zone| padded.intersects(zone)) {
                continue;
            }
            let id = buildings.len();
            buildings.push(build_structure(&mut grid, id, rect, rng));
        }
    }

    grid.set(entry, Cell::Floor);
    grid.set(extraction, Cell::Floor);
    let tunnel_carved = ensure_connected(&mut grid, entry, extraction, rng);

    GeneratedWorld {
        grid,
        buildings,
        entry,
        extraction,
        tunnel_carved,
    }
}

fn scatter_cover(grid: &mut Grid, rng: &mut Rng) {
    for _ in 0..COVER_CLUSTERS {
        let rw = rng.int(2, 5);
        let rh = rng.int(2, 4);
        if grid.width() - rw - 3 < 2 || grid.height() - rh - 3 < 2 {
            continue;
        }
        let cx = rng.int(2, grid.width() - rw - 3);
        let cy = rng.int(2, grid.height() - rh - 3);
        for y in cy..cy + rh {
            for x in cx..cx + rw {
                if rng.bool(0.55) {
                    grid.set(Vec2::new(x, y), Cell::Wall);
                }
            }
        }
    }
}

fn build_structure(grid: &mut Grid, id: usize, rect: Rect, rng: &mut Rng) -> Building {
    let Rect {
        x: bx,
        y: by,
        w: bw,
        h: bh,
    } = rect;
    for y in by..by + bh {
        for x in bx..bx + bw {
            let p = Vec2::new(x, y);
            let on_edge = x == bx || y == by || x == bx + bw - 1 || y == by + bh - 1;
            if on_edge {
                grid.set(p, Cell::Wall);
            } else {
                grid.set(p, Cell::Floor);
                grid.set_building_id(p, id as i32);
            }
        }
    }

    let mut partition_x = (bw >= 12 && rng.bool(0.9)).then(|| bx + rng.int(3, bw - 4));
    let mut partition_y = (bh >= 10 && rng.bool(0.8)).then(|| by + rng.int(3, bh - 4));
    if partition_x.is_none() && partition_y.is_none() {
        if bw >= bh {
            partition_x = Some(bx + rng.int(3, bw - 4));
        } else {
            partition_y = Some(by + rng.int(3, bh - 4));
        }
    }

    if let Some(px) = partition_x {
        for y in by + 1..by + bh - 1 {
            grid.set(Vec2::new(px, y), Cell::Wall);
        }
    }
    if let Some(py) = partition_y {
        for x in bx + 1..bx + bw - 1 {
            grid.set(Vec2::new(x, py), Cell::Wall);
        }
    }
    // One doorway per partition segment keeps every room reachable.
    if let Some(px) = partition_x {
        let segments = match partition_y {
            Some(py) => vec![(by + 1, py - 1), (py + 1, by + bh - 2)],
            None => vec![(by + 1, by + bh - 2)],
        };
        for (lo, hi) in segments {
            grid.set(Vec2::new(px, rng.int(lo, hi)), Cell::Floor);
        }
    }
    if let Some(py) = partition_y {
        let segments = match partition_x {
            Some(px) => vec![(bx + 1, px - 1), (px + 1, bx + bw - 2)],
            None => vec![(bx + 1, bx + bw - 2)],
        };
        for (lo, hi) in segments {
            grid.set(Vec2::new(rng.int(lo, hi), py), Cell::Floor);
        }
    }

    let (door, inward) = match rng.int(0, 3) {
        0 => (Vec2::new(bx + rng.int(2, bw - 3), by), Vec2::new(0, 1)),
        1 => (Vec2::new(bx + rng.int(2, bw - 3), by + bh - 1), Vec2::new(0, -1)),
        2 => (Vec2::new(bx, by + rng.int(2, bh - 3)), Vec2::new(1, 0)),
        _ => (Vec2::new(bx + bw - 1, by + rng.int(2, bh - 3)), Vec2::new(-1, 0)),
    };
    grid.set(door, Cell::Door);
    grid.set(Vec2::new(door.x + inward.x, door.y + inward.y), Cell::Floor);

    let run = rng.int(1, 3);
    for step in 1..=run {
        let p = Vec2::new(door.x - inward.x * step, door.y - inward.y * step);
        if p.x < 1 || p.y < 1 || p.x > grid.width() - 2 || p.y > grid.height() - 2 {
            break;
        }
        if grid.cell(p) == Cell::Wall {
            grid.set(p, Cell::Floor);
        }
    }

    let interior_cells = (by + 1..by + bh - 1)
        .flat_map(|y| (bx + 1..bx + bw - 1).map(move |x| Vec2::new(x, y)))
        .filter(|p| grid.cell(*p) == Cell::Floor)
        .collect();

    Building {
        id,
        rect,
        door,
        interior_cells,
    }
}

/// Cellular-automaton cave layout with the same entry/extraction contract as
/// the facility generator.
pub fn generate_cave(width: i32, height: i32, rng: &mut Rng) -> GeneratedWorld {
    let mut grid = Grid::filled(width, height, Cell::Wall);
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            if !rng.bool(CAVE_FILL_PROBABILITY) {
                grid.set(Vec2::new(x, y), Cell::Floor);
            }
        }
    }

    for _ in 0..CAVE_SMOOTHING_PASSES {
        let mut next = grid.clone();
        for y in 1..height - 1 {
            for x in 1..width - 1 {
                let walls = count_walls_around(&grid, Vec2::new(x, y));
                let cell = if walls >= 5 { Cell::Wall } else { Cell::Floor };
                next.set(Vec2::new(x, y), cell);
            }
        }
        grid = next;
    }

    let entry = default_entry(height);
    let extraction = default_extraction(width, height);
    grid.set(entry, Cell::Floor);
    grid.set(extraction, Cell::Floor);
    let tunnel_carved = ensure_connected(&mut grid, entry, extraction, rng);
    keep_region(&mut grid, entry);

    GeneratedWorld {
        grid,
        buildings: Vec::new(),
        entry,
        extraction,
        tunnel_carved,
    }
}

fn count_walls_around(grid: &Grid, p: Vec2) -> usize {
    let mut count = 0;
    for dy in -1..=1 {
        for dx in -1..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let q = Vec2::new(p.x + dx, p.y + dy);
            if !grid.in_bounds(q) || grid.cell(q) == Cell::Wall {
                count += 1;
            }
        }
    }
    count
}

/// Returns true when a tunnel had to be carved.
pub fn ensure_connected(grid: &mut Grid, from: Vec2, to: Vec2, rng: &mut Rng) -> bool {
    if !find_path(grid, from, to).is_empty() {
        return false;
    }
    carve_tunnel(grid, from, to, rng);
    debug_assert!(!find_path(grid, from, to).is_empty());
    true
}

/// Biased random walk from `from` to `to`. Every step closes the distance on
/// one axis, so the walk always arrives within the step budget. Doors are
/// left untouched.
pub fn carve_tunnel(grid: &mut Grid, from: Vec2, to: Vec2, rng: &mut Rng) {
    let mut cur = from;
    for _ in 0..TUNNEL_MAX_STEPS {
        if grid.cell(cur) == Cell::Wall {
            grid.set(cur, Cell::Floor);
        }
        if cur == to {
            return;
        }
        let step_x = if cur.x == to.x {
            false
        } else if cur.y == to.y {
            true
        } else {
            rng.bool(0.5)
        };
        if step_x {
            cur.x += (to.x - cur.x).signum();
        } else {
            cur.y += (to.y - cur.y).signum();
        }
    }
}

/// Cells reachable from `start` through passable cells, indexed like the grid.
pub fn reachable_from(grid: &Grid, start: Vec2) -> Vec<bool> {
    let mut seen = vec![false; grid.len()];
    if !grid.is_passable(start) {
        return seen;
    }
    let mut queue = VecDeque::new();
    seen[grid.index(start)] = true;
    queue.push_back(start);
    while let Some(p) = queue.pop_front() {
        for n in p.neighbors4() {
            if !grid.is_passable(n) {
                continue;
            }
            let idx = grid.index(n);
            if !seen[idx] {
                seen[idx] = true;
                queue.push_back(n);
            }
        }
    }
    seen
}

fn keep_region(grid: &mut Grid, start: Vec2) {
    let region = reachable_from(grid, start);
    for p in grid.passable_cells() {
        if !region[grid.index(p)] {
            grid.set(p, Cell::Wall);
            grid.set_building_id(p, -1);
        }
    }
}

/// Random passable cell farther than `min_distance` from every `avoid` cell.
/// Falls back to the first passable cell in row-major order.
pub fn random_floor_cell(
    grid: &Grid,
    avoid: &[Vec2],
    min_distance: i32,
    rng: &mut Rng,
) -> Option<Vec2> {
    for _ in 0..5_000 {
        let p = Vec2::new(
            rng.int(1, grid.width() - 2),
            rng.int(1, grid.height() - 2),
        );
        if grid.is_passable(p) && avoid.iter().all(|a| a.manhattan(p) > min_distance) {
            return Some(p);
        }
    }
    grid.coords().find(|p| grid.is_passable(*p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathfinding::find_path;

    #[test]
    fn entry_and_extraction_are_always_connected() {
        for seed in 0..120u64 {
            let mut rng = Rng::new(seed);
            let world = generate_facility(52, 34, 6, &mut rng);
            let path = find_path(&world.grid, world.entry, world.extraction);
            assert!(!path.is_empty(), "seed {seed} disconnected");
        }
    }

    #[test]
    fn buildings_do_not_overlap_and_have_exterior_doors() {
        for seed in 0..60u64 {
            let mut rng = Rng::new(seed);
            let world = generate_facility(52, 34, 6, &mut rng);
            assert!(!world.buildings.is_empty());
            for (i, a) in world.buildings.iter().enumerate() {
                for b in world.buildings.iter().skip(i + 1) {
                    assert!(!a.rect.intersects(&b.rect), "seed {seed}");
                }
                assert_eq!(world.grid.cell(a.door), Cell::Door);
                let open_neighbors = a
                    .door
                    .neighbors4()
                    .iter()
                    .filter(|n| world.grid.is_passable(**n))
                    .count();
                assert!(open_neighbors >= 2, "door must lead somewhere, seed {seed}");
            }
        }
    }

    #[test]
    fn every_room_is_reachable_from_its_door() {
        for seed in 0..80u64 {
            let mut rng = Rng::new(seed);
            let world = generate_facility(52, 34, 6, &mut rng);
            for building in &world.buildings {
                let reach = reachable_from(&world.grid, building.door);
                for cell in &building.interior_cells {
                    assert!(
                        reach[world.grid.index(*cell)],
                        "seed {seed}: building {} cell {:?} sealed off",
                        building.id,
                        cell
                    );
                }
            }
        }
    }

    #[test]
    fn interior_cells_are_floor_and_tagged() {
        let mut rng = Rng::new(9);
        let world = generate_facility(52, 34, 6, &mut rng);
        for building in &world.buildings {
            assert!(!building.interior_cells.is_empty());
            for cell in &building.interior_cells {
                assert_eq!(world.grid.cell(*cell), Cell::Floor);
                assert_eq!(world.grid.building_id(*cell), building.id as i32);
            }
        }
    }

    #[test]
    fn boundary_ring_is_wall() {
        let mut rng = Rng::new(4);
        let world = generate_facility(40, 30, 6, &mut rng);
        for p in world.grid.coords() {
            let edge = p.x == 0 || p.y == 0 || p.x == 39 || p.y == 29;
            if edge {
                assert_eq!(world.grid.cell(p), Cell::Wall);
            }
        }
    }

    #[test]
    fn crowded_request_places_fewer_buildings_without_failing() {
        let mut rng = Rng::new(21);
        let world = generate_facility(30, 20, 32, &mut rng);
        assert!(world.buildings.len() < 32);
        assert!(!find_path(&world.grid, world.entry, world.extraction).is_empty());

        let mut rng = Rng::new(21);
        let tiny = generate_facility(8, 8, 6, &mut rng);
        assert!(tiny.buildings.is_empty());
        assert!(!find_path(&tiny.grid, tiny.entry, tiny.extraction).is_empty());
    }

    #[test]
    fn fallback_tunnel_restores_connectivity() {
        let mut grid = Grid::from_rows(&[
            "##########",
            "#...#....#",
            "#...#....#",
            "#...#....#",
            "##########",
        ]);
        let from = Vec2::new(1, 2);
        let to = Vec2::new(8, 2);
        assert!(find_path(&grid, from, to).is_empty());
        let mut rng = Rng::new(1);
        assert!(ensure_connected(&mut grid, from, to, &mut rng));
        assert!(!find_path(&grid, from, to).is_empty());
        assert!(!ensure_connected(&mut grid, from, to, &mut rng));
    }

    #[test]
    fn tunnel_never_replaces_doors() {
        let mut grid = Grid::from_rows(&["#######", "#..+..#", "#######"]);
        let mut rng = Rng::new(2);
        carve_tunnel(&mut grid, Vec2::new(1, 1), Vec2::new(5, 1), &mut rng);
        assert_eq!(grid.cell(Vec2::new(3, 1)), Cell::Door);
    }

    #[test]
    fn cave_variant_keeps_a_single_connected_region() {
        for seed in 0..40u64 {
            let mut rng = Rng::new(seed);
            let world = generate_cave(52, 34, &mut rng);
            assert!(!find_path(&world.grid, world.entry, world.extraction).is_empty());
            let reach = reachable_from(&world.grid, world.entry);
            for p in world.grid.passable_cells() {
                assert!(reach[world.grid.index(p)], "seed {seed}: stray floor {p:?}");
            }
        }
    }

    #[test]
    fn random_floor_cell_respects_avoid_distance() {
        let grid = Grid::open(30, 30);
        let mut rng = Rng::new(8);
        let avoid = [Vec2::new(5, 5)];
        for _ in 0..50 {
            let p = random_floor_cell(&grid, &avoid, 6, &mut rng).expect("floor exists");
            assert!(grid.is_passable(p));
            assert!(p.manhattan(avoid[0]) > 6);
        }
    }

    #[test]
    fn snapshot_masks_unrevealed_cells() {
        let mut rng = Rng::new(3);
        let world = generate_facility(20, 12, 0, &mut rng);
        let mut revealed = vec![false; world.grid.len()];
        revealed[world.grid.index(world.entry)] = true;
        let snapshot = world.to_snapshot(&revealed);
        assert_eq!(snapshot.rows.len(), 12);
        let hidden = snapshot
            .rows
            .iter()
            .flat_map(|row| row.chars())
            .filter(|c| *c == '?')
            .count();
        assert_eq!(hidden, world.grid.len() - 1);
    }

    #[test]
    #[should_panic(expected = "outside")]
    fn off_grid_access_is_a_programming_error() {
        let grid = Grid::open(6, 6);
        let _ = grid.cell(Vec2::new(6, 0));
    }
}
