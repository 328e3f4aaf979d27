use super::*;

const SPAWN_SAMPLES: usize = 80;
const SPAWN_AVOID_DISTANCE: i32 = 6;

/// Operatives drop in on random floor cells near the entry, never close to
/// extraction. Falls back to the entry cell itself.
pub(super) fn spawn_squad(
    world: &GeneratedWorld,
    roster: &[RosterEntry],
    rng: &mut Rng,
) -> Vec<Operative> {
    let mut spawn_cells = Vec::new();
    for _ in 0..SPAWN_SAMPLES {
        let Some(cell) =
            random_floor_cell(&world.grid, &[world.extraction], SPAWN_AVOID_DISTANCE, rng)
        else {
            continue;
        };
        if cell.manhattan(world.entry) <= SPAWN_RADIUS {
            spawn_cells.push(cell);
        }
    }
    if spawn_cells.is_empty() {
        spawn_cells.push(world.entry);
    }

    roster
        .iter()
        .enumerate()
        .map(|(id, entry)| {
            let cell = spawn_cells[rng.pick_index(spawn_cells.len())];
            Operative::new(id, entry, cell)
        })
        .collect()
}

/// Prefers a random building interior; otherwise any floor cell away from
/// entry and extraction.
pub(super) fn spawn_anomaly(
    world: &GeneratedWorld,
    profile: &AnomalyProfile,
    rng: &mut Rng,
) -> Anomaly {
    let inside = if world.buildings.is_empty() {
        None
    } else {
        let building = &world.buildings[rng.pick_index(world.buildings.len())];
        building
            .interior_cells
            .get(rng.pick_index(building.interior_cells.len()))
            .copied()
    };
    let cell = inside
        .or_else(|| {
            random_floor_cell(
                &world.grid,
                &[world.entry, world.extraction],
                SPAWN_AVOID_DISTANCE,
                rng,
            )
        })
        .unwrap_or(world.extraction);
    Anomaly::new(profile, cell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::generate_facility;

    #[test]
    fn squad_spawns_on_floor_near_entry() {
        for seed in 0..30u64 {
            let mut rng = Rng::new(seed);
            let world = generate_facility(52, 34, 6, &mut rng);
            let roster = default_squad(&mut rng);
            let squad = spawn_squad(&world, &roster, &mut rng);
            assert_eq!(squad.len(), roster.len());
            for op in &squad {
                assert!(world.grid.is_passable(op.cell));
                assert!(op.cell.manhattan(world.entry) <= SPAWN_RADIUS);
                assert_eq!(op.hp, op.hp_max);
            }
        }
    }

    #[test]
    fn anomaly_prefers_building_interiors() {
        for seed in 0..30u64 {
            let mut rng = Rng::new(seed);
            let world = generate_facility(52, 34, 6, &mut rng);
            let profile = roll_anomaly(&mut rng);
            let anomaly = spawn_anomaly(&world, &profile, &mut rng);
            assert!(world.grid.is_passable(anomaly.cell));
            assert!(world.grid.building_id(anomaly.cell) >= 0, "seed {seed}");
            assert!(!anomaly.contained);
            assert_eq!(anomaly.stability, 100.0);
        }
    }

    #[test]
    fn open_ground_spawn_keeps_distance_from_entry() {
        let mut rng = Rng::new(3);
        let world = crate::world::generate_cave(52, 34, &mut rng);
        let profile = roll_anomaly(&mut rng);
        let anomaly = spawn_anomaly(&world, &profile, &mut rng);
        assert!(world.grid.is_passable(anomaly.cell));
        assert!(anomaly.cell.manhattan(world.entry) > SPAWN_AVOID_DISTANCE);
    }
}
