use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::types::Vec2;
use crate::world::Grid;

/// 4-connected A* with a Manhattan heuristic and unit step cost.
///
/// Returns the full path including `start` and `goal`, `[start]` when they are
/// equal, and an empty path when the goal is a wall, off-grid or unreachable.
/// Ties break on (f, h, y, x) so identical inputs always yield the same path.
pub fn find_path(grid: &Grid, start: Vec2, goal: Vec2) -> Vec<Vec2> {
    if start == goal {
        return vec![start];
    }
    if !grid.is_passable(goal) || !grid.in_bounds(start) {
        return Vec::new();
    }

    let len = grid.len();
    let mut g_score = vec![i32::MAX; len];
    let mut came_from: Vec<Option<Vec2>> = vec![None; len];
    let mut closed = vec![false; len];
    let mut open = BinaryHeap::new();

    g_score[grid.index(start)] = 0;
    let h0 = start.manhattan(goal);
    open.push(Reverse((h0, h0, start.y, start.x)));

    while let Some(Reverse((_, _, y, x))) = open.pop() {
        let current = Vec2::new(x, y);
        let current_idx = grid.index(current);
        if closed[current_idx] {
            continue;
        }
        if current == goal {
            return reconstruct(grid, &came_from, goal);
        }
        closed[current_idx] = true;

        let next_g = g_score[current_idx] + 1;
        for next in current.neighbors4() {
            if !grid.is_passable(next) {
                continue;
            }
            let idx = grid.index(next);
            if closed[idx] || next_g >= g_score[idx] {
                continue;
            }
            g_score[idx] = next_g;
            came_from[idx] = Some(current);
            let h = next.manhattan(goal);
            open.push(Reverse((next_g + h, h, next.y, next.x)));
        }
    }

    Vec::new()
}

fn reconstruct(grid: &Grid, came_from: &[Option<Vec2>], goal: Vec2) -> Vec<Vec2> {
    let mut path = vec![goal];
    let mut cursor = goal;
    while let Some(prev) = came_from[grid.index(cursor)] {
        path.push(prev);
        cursor = prev;
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::rng::Rng;
    use crate::world::generate_cave;

    fn bfs_distance(grid: &Grid, start: Vec2, goal: Vec2) -> Option<usize> {
        let mut dist = vec![usize::MAX; grid.len()];
        let mut queue = VecDeque::new();
        dist[grid.index(start)] = 0;
        queue.push_back(start);
        while let Some(p) = queue.pop_front() {
            if p == goal {
                return Some(dist[grid.index(p)]);
            }
            for n in p.neighbors4() {
                if grid.is_passable(n) && dist[grid.index(n)] == usize::MAX {
                    dist[grid.index(n)] = dist[grid.index(p)] + 1;
                    queue.push_back(n);
                }
            }
        }
        None
    }

    fn assert_valid_path(grid: &Grid, path: &[Vec2]) {
        for pair in path.windows(2) {
            assert_eq!(pair[0].manhattan(pair[1]), 1, "path must be 4-connected");
        }
        for cell in path {
            assert!(grid.is_passable(*cell));
        }
    }

    #[test]
    fn start_equal_to_goal_is_a_single_cell_path() {
        let grid = Grid::open(6, 6);
        let p = Vec2::new(2, 2);
        assert_eq!(find_path(&grid, p, p), vec![p]);
    }

    #[test]
    fn wall_or_off_grid_goal_yields_no_path() {
        let grid = Grid::open(6, 6);
        assert!(find_path(&grid, Vec2::new(1, 1), Vec2::new(0, 0)).is_empty());
        assert!(find_path(&grid, Vec2::new(1, 1), Vec2::new(9, 9)).is_empty());
        assert!(find_path(&grid, Vec2::new(1, 1), Vec2::new(-1, 3)).is_empty());
    }

    #[test]
    fn sealed_goal_yields_no_path() {
        let grid = Grid::from_rows(&[
            "#######",
            "#..#..#",
            "#..#..#",
            "#######",
        ]);
        assert!(find_path(&grid, Vec2::new(1, 1), Vec2::new(5, 2)).is_empty());
    }

    #[test]
    fn routes_through_doors_around_walls() {
        let grid = Grid::from_rows(&[
            "#######",
            "#..#..#",
            "#..+..#",
            "#..#..#",
            "#######",
        ]);
        let path = find_path(&grid, Vec2::new(1, 1), Vec2::new(5, 1));
        assert_eq!(path.first(), Some(&Vec2::new(1, 1)));
        assert_eq!(path.last(), Some(&Vec2::new(5, 1)));
        assert!(path.contains(&Vec2::new(3, 2)));
        assert_eq!(path.len(), 7);
        assert_valid_path(&grid, &path);
    }

    #[test]
    fn paths_are_shortest_and_deterministic() {
        for seed in 0..20u64 {
            let mut rng = Rng::new(seed);
            let world = generate_cave(40, 28, &mut rng);
            let path = find_path(&world.grid, world.entry, world.extraction);
            let expected = bfs_distance(&world.grid, world.entry, world.extraction)
                .expect("generator guarantees a route");
            assert_eq!(path.len(), expected + 1, "seed {seed}");
            assert_valid_path(&world.grid, &path);
            assert_eq!(path, find_path(&world.grid, world.entry, world.extraction));
        }
    }
}
