use crate::types::{Cell, Vec2};
use crate::world::Grid;

/// Integer Bresenham line from `a` to `b`, endpoints included.
pub fn bresenham_line(a: Vec2, b: Vec2) -> Vec<Vec2> {
    let dx = (b.x - a.x).abs();
    let dy = -(b.y - a.y).abs();
    let sx = if a.x < b.x { 1 } else { -1 };
    let sy = if a.y < b.y { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = (a.x, a.y);
    let mut cells = Vec::with_capacity((dx - dy + 1) as usize);
    loop {
        cells.push(Vec2::new(x, y));
        if x == b.x && y == b.y {
            break;
        }
        let e2 = err * 2;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
    cells
}

/// No wall strictly between the endpoints. Doors do not block sight.
pub fn los_clear(grid: &Grid, a: Vec2, b: Vec2) -> bool {
    let line = bresenham_line(a, b);
    if line.len() <= 2 {
        return true;
    }
    line[1..line.len() - 1]
        .iter()
        .all(|p| grid.cell(*p) != Cell::Wall)
}

/// Within Manhattan `radius` of `origin` with a clear line of sight. Used for
/// both fog reveal and anomaly detection.
pub fn observes(grid: &Grid, origin: Vec2, radius: i32, target: Vec2) -> bool {
    origin.manhattan(target) <= radius && los_clear(grid, origin, target)
}

/// Cover bonus from walls hugging `cell`, capped at 0.22.
pub fn target_cover(grid: &Grid, cell: Vec2) -> f32 {
    let walls = cell
        .neighbors4()
        .iter()
        .filter(|n| grid.in_bounds(**n) && grid.is_wall(**n))
        .count();
    (walls as f32 * 0.06).min(0.22)
}

/// Squad-wide fog-of-war mask. Cells only ever flip from hidden to revealed
/// until the mission is regenerated.
#[derive(Clone, Debug)]
pub struct VisibilityField {
    width: i32,
    height: i32,
    revealed: Vec<bool>,
    revealed_count: usize,
}

impl VisibilityField {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            revealed: vec![false; (width * height) as usize],
            revealed_count: 0,
        }
    }

    pub fn for_grid(grid: &Grid) -> Self {
        Self::new(grid.width(), grid.height())
    }

    pub fn is_revealed(&self, p: Vec2) -> bool {
        assert!(
            p.x >= 0 && p.y >= 0 && p.x < self.width && p.y < self.height,
            "cell ({}, {}) is outside the visibility field",
            p.x,
            p.y
        );
        self.revealed[(p.y * self.width + p.x) as usize]
    }

    pub fn revealed_count(&self) -> usize {
        self.revealed_count
    }

    pub fn mask(&self) -> &[bool] {
        &self.revealed
    }

    fn mark(&mut self, idx: usize) {
        if !self.revealed[idx] {
            self.revealed[idx] = true;
            self.revealed_count += 1;
        }
    }

    pub fn reveal_from(&mut self, grid: &Grid, origin: Vec2, radius: i32) {
        let x0 = (origin.x - radius).max(0);
        let x1 = (origin.x + radius).min(grid.width() - 1);
        let y0 = (origin.y - radius).max(0);
        let y1 = (origin.y + radius).min(grid.height() - 1);
        for y in y0..=y1 {
            for x in x0..=x1 {
                let p = Vec2::new(x, y);
                let idx = grid.index(p);
                if self.revealed[idx] {
                    continue;
                }
                if observes(grid, origin, radius, p) {
                    self.mark(idx);
                }
            }
        }
    }

    pub fn reveal_all(&mut self) {
        for idx in 0..self.revealed.len() {
            self.mark(idx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::Rng;
    use crate::world::generate_facility;

    #[test]
    fn line_includes_both_endpoints() {
        let line = bresenham_line(Vec2::new(0, 0), Vec2::new(4, 2));
        assert_eq!(line.first(), Some(&Vec2::new(0, 0)));
        assert_eq!(line.last(), Some(&Vec2::new(4, 2)));
        assert_eq!(line.len(), 5);
        let single = bresenham_line(Vec2::new(3, 3), Vec2::new(3, 3));
        assert_eq!(single, vec![Vec2::new(3, 3)]);
    }

    #[test]
    fn walls_block_sight_but_doors_do_not() {
        let grid = Grid::from_rows(&[
            "#######",
            "#..#..#",
            "#..+..#",
            "#######",
        ]);
        assert!(!los_clear(&grid, Vec2::new(1, 1), Vec2::new(5, 1)));
        assert!(los_clear(&grid, Vec2::new(1, 2), Vec2::new(5, 2)));
        // Endpoints are never tested.
        assert!(los_clear(&grid, Vec2::new(2, 1), Vec2::new(3, 1)));
    }

    #[test]
    fn cover_caps_at_point_two_two() {
        let grid = Grid::from_rows(&["###", "#.#", "###"]);
        assert!((target_cover(&grid, Vec2::new(1, 1)) - 0.22).abs() < 1e-6);
        let open = Grid::open(7, 7);
        assert_eq!(target_cover(&open, Vec2::new(3, 3)), 0.0);
    }

    #[test]
    fn reveal_marks_exactly_the_observed_cells() {
        let mut rng = Rng::new(17);
        let world = generate_facility(52, 34, 6, &mut rng);
        let origin = world.entry;
        let mut field = VisibilityField::for_grid(&world.grid);
        field.reveal_from(&world.grid, origin, 6);
        for p in world.grid.coords() {
            assert_eq!(
                field.is_revealed(p),
                observes(&world.grid, origin, 6, p),
                "mismatch at {p:?}"
            );
        }
    }

    #[test]
    fn revealed_set_never_shrinks() {
        let grid = Grid::open(20, 12);
        let mut field = VisibilityField::for_grid(&grid);
        field.reveal_from(&grid, Vec2::new(3, 3), 4);
        let before: Vec<bool> = field.mask().to_vec();
        let count = field.revealed_count();
        field.reveal_from(&grid, Vec2::new(15, 8), 3);
        assert!(field.revealed_count() >= count);
        for (was, now) in before.iter().zip(field.mask()) {
            assert!(!*was || *now);
        }
        field.reveal_all();
        assert_eq!(field.revealed_count(), grid.len());
    }
}
