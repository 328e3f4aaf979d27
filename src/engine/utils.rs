use std::collections::VecDeque;

use crate::types::Vec2;

/// Meters (panic, kit, stability, aggro) live in 0..=100.
pub(super) fn clamp_meter(value: f32) -> f32 {
    value.clamp(0.0, 100.0)
}

pub(super) fn centroid(cells: &[Vec2]) -> Option<(f32, f32)> {
    if cells.is_empty() {
        return None;
    }
    let n = cells.len() as f32;
    let sx: i32 = cells.iter().map(|c| c.x).sum();
    let sy: i32 = cells.iter().map(|c| c.y).sum();
    Some((sx as f32 / n, sy as f32 / n))
}

/// Moves a sub-tile position toward the head of `path` by `distance` tiles.
/// Returns the cell it snapped onto, if it reached one this call. At most one
/// node is consumed per call.
pub(super) fn advance_along_path(
    pos: &mut (f32, f32),
    cell: &mut Vec2,
    path: &mut VecDeque<Vec2>,
    distance: f32,
) -> Option<Vec2> {
    let next = *path.front()?;
    if distance <= 0.0 {
        return None;
    }
    let vx = next.x as f32 - pos.0;
    let vy = next.y as f32 - pos.1;
    let d = vx.hypot(vy);
    if d < 1e-6 || distance >= d {
        *pos = (next.x as f32, next.y as f32);
        *cell = next;
        path.pop_front();
        return Some(next);
    }
    pos.0 += vx / d * distance;
    pos.1 += vy / d * distance;
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meter_clamp_bounds() {
        assert_eq!(clamp_meter(-5.0), 0.0);
        assert_eq!(clamp_meter(140.0), 100.0);
        assert_eq!(clamp_meter(42.0), 42.0);
    }

    #[test]
    fn advance_snaps_only_when_reaching_the_node() {
        let mut pos = (1.0, 1.0);
        let mut cell = Vec2::new(1, 1);
        let mut path: VecDeque<Vec2> = [Vec2::new(2, 1), Vec2::new(3, 1)].into_iter().collect();

        assert_eq!(advance_along_path(&mut pos, &mut cell, &mut path, 0.4), None);
        assert!((pos.0 - 1.4).abs() < 1e-5);
        assert_eq!(cell, Vec2::new(1, 1));

        assert_eq!(
            advance_along_path(&mut pos, &mut cell, &mut path, 5.0),
            Some(Vec2::new(2, 1))
        );
        assert_eq!(cell, Vec2::new(2, 1));
        assert_eq!(path.len(), 1);
    }

    #[test]
    fn zero_speed_never_moves() {
        let mut pos = (1.0, 1.0);
        let mut cell = Vec2::new(1, 1);
        let mut path: VecDeque<Vec2> = [Vec2::new(2, 1)].into_iter().collect();
        assert_eq!(advance_along_path(&mut pos, &mut cell, &mut path, 0.0), None);
        assert_eq!(pos, (1.0, 1.0));
    }

    #[test]
    fn centroid_of_cells() {
        assert_eq!(centroid(&[]), None);
        assert_eq!(
            centroid(&[Vec2::new(0, 0), Vec2::new(4, 2)]),
            Some((2.0, 1.0))
        );
    }
}
