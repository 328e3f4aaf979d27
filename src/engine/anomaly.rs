use super::*;

#[derive(Clone, Debug)]
pub struct Anomaly {
    pub code: String,
    pub stats: AnomalyStats,
    pub cell: Vec2,
    pub(super) pos: (f32, f32),
    pub(super) path: VecDeque<Vec2>,
    pub hp: f32,
    pub hp_max: f32,
    pub stability: f32,
    pub aggro: f32,
    pub contained: bool,
    pub immobilized: bool,
    /// Seconds since the squad last had eyes on it.
    pub escape_timer: f32,
    pub(super) attack_cooldown: f32,
    pub(super) mode: AnomalyMode,
}

impl Anomaly {
    pub fn new(profile: &AnomalyProfile, cell: Vec2) -> Self {
        let stats = profile.stats.clamped();
        let hp_max = anomaly_hp_max(stats.threat, stats.resilience);
        Self {
            code: profile.code.clone(),
            stats,
            cell,
            pos: (cell.x as f32, cell.y as f32),
            path: VecDeque::new(),
            hp: hp_max,
            hp_max,
            stability: 100.0,
            aggro: clamp_meter(f32::from(stats.aggression) * 3.0),
            contained: false,
            immobilized: false,
            escape_timer: 0.0,
            attack_cooldown: 0.0,
            mode: AnomalyMode::Roam,
        }
    }

    /// Tiles per second. Instability makes it erratic and slightly faster.
    pub fn speed(&self) -> f32 {
        let mut speed = anomaly_base_speed(self.stats.speed);
        if self.immobilized {
            speed *= 0.15;
        }
        speed * (0.95 + (1.0 - self.stability / 100.0) * 0.25)
    }

    pub fn mode(&self) -> AnomalyMode {
        self.mode
    }

    pub fn view(&self, observed: bool) -> AnomalyView {
        AnomalyView {
            code: self.code.clone(),
            x: self.cell.x,
            y: self.cell.y,
            px: self.pos.0,
            py: self.pos.1,
            hp: self.hp,
            hp_max: self.hp_max,
            stability: self.stability,
            aggro: self.aggro,
            contained: self.contained,
            immobilized: self.immobilized,
            observed,
        }
    }
}

impl MissionEngine {
    pub(super) fn update_anomaly(&mut self, dt: f32) {
        if self.anomaly.contained {
            self.anomaly_observed = false;
            return;
        }
        self.anomaly.attack_cooldown = (self.anomaly.attack_cooldown - dt).max(0.0);

        let observers = self.collect_observers();
        self.anomaly_observed = !observers.is_empty();
        if observers.is_empty() {
            let a = &mut self.anomaly;
            a.stability = clamp_meter(a.stability + stability_regen(dt, a.stats.resilience));
            a.escape_timer += dt;
        } else {
            self.anomaly.escape_timer = 0.0;
        }

        self.anomaly_try_attack();

        if self.anomaly.path.is_empty() || self.rng.bool(ANOMALY_REPLAN_CHANCE) {
            self.plan_anomaly(&observers);
        }

        let a = &mut self.anomaly;
        let distance = a.speed() * dt;
        advance_along_path(&mut a.pos, &mut a.cell, &mut a.path, distance);
    }

    /// Cells of active operatives that see the anomaly this tick and win the
    /// stealth roll.
    fn collect_observers(&mut self) -> Vec<Vec2> {
        let target = self.anomaly.cell;
        let chance = observation_chance(self.anomaly.stats.stealth);
        let mut observers = Vec::new();
        for op in self.operatives.iter().filter(|op| op.is_active()) {
            if observes(&self.world.grid, op.cell, op.perception_radius(), target)
                && self.rng.bool(chance)
            {
                observers.push(op.cell);
            }
        }
        observers
    }

    /// Nearest active operative, ties to the lowest id.
    fn choose_anomaly_target(&self) -> Option<usize> {
        let origin = self.anomaly.cell;
        self.operatives
            .iter()
            .filter(|op| op.is_active())
            .min_by_key(|op| (op.cell.manhattan(origin), op.id))
            .map(|op| op.id)
    }

    fn anomaly_try_attack(&mut self) {
        if self.anomaly.contained || self.anomaly.attack_cooldown > 0.0 {
            return;
        }
        let Some(target) = self.choose_anomaly_target() else {
            return;
        };
        if !self.rng.bool(anomaly_attack_gate(self.anomaly.aggro)) {
            return;
        }

        let stats = self.anomaly.stats;
        let origin = self.anomaly.cell;
        let target_cell = self.operatives[target].cell;
        let distance = origin.manhattan(target_cell);

        if distance <= 1 {
            let bonus = self.rng.range_f32(0.0, 6.0);
            let damage = melee_damage(stats.threat, self.anomaly.stability, bonus);
            let cause = format!("{} melee", self.anomaly.code);
            self.damage_operative(target, damage, &cause);
            self.anomaly.attack_cooldown = self.rng.range_f32(0.9, 1.5);
            return;
        }

        let reach = anomaly_ranged_range(stats.threat, stats.aggression);
        if distance > reach || !los_clear(&self.world.grid, origin, target_cell) {
            return;
        }
        let op = &self.operatives[target];
        self.tracers.push(Tracer {
            x0: self.anomaly.pos.0 + 0.5,
            y0: self.anomaly.pos.1 + 0.5,
            x1: op.pos.0 + 0.5,
            y1: op.pos.1 + 0.5,
            ttl: TRACER_TTL_SECS,
            source: TracerSource::Anomaly,
        });
        let cover = target_cover(&self.world.grid, target_cell);
        let courage = op.attributes.courage;
        if self.rng.bool(ranged_hit_chance(stats.threat, cover, courage)) {
            let damage = ranged_damage(stats.threat, self.rng.range_f32(0.0, 6.0));
            let cause = format!("{} ranged", self.anomaly.code);
            self.damage_operative(target, damage, &cause);
        } else {
            let op = &mut self.operatives[target];
            op.panic = clamp_meter(op.panic + near_miss_panic(courage));
        }
        self.anomaly.attack_cooldown = self.rng.range_f32(1.1, 1.8);
    }

    fn plan_anomaly(&mut self, observers: &[Vec2]) {
        let drift_window = observers.is_empty()
            && self.anomaly.escape_timer > self.config.escape_threshold_secs / 2.0
            && self.rng.bool(0.25);
        let mode = next_anomaly_mode(&AnomalyFacts {
            contained: self.anomaly.contained,
            observed: !observers.is_empty(),
            drift_window,
        });
        self.anomaly.mode = mode;

        let target = match mode {
            AnomalyMode::Dormant => None,
            AnomalyMode::Evade => self.evade_target(observers),
            AnomalyMode::SlipAway => self.border_target().or_else(|| self.roam_target()),
            AnomalyMode::Roam => self.roam_target(),
        };
        self.anomaly.path = match target {
            Some(goal) => find_path(&self.world.grid, self.anomaly.cell, goal)
                .into_iter()
                .skip(1)
                .collect(),
            None => VecDeque::new(),
        };
    }

    /// Away from the observers' centroid, `9 + stealth / 2` cells out with a
    /// little jitter.
    fn evade_target(&mut self, observers: &[Vec2]) -> Option<Vec2> {
        let (cx, cy) = centroid(observers)?;
        let grid = &self.world.grid;
        let origin = self.anomaly.cell;
        let dx = origin.x as f32 - cx;
        let dy = origin.y as f32 - cy;
        let mag = dx.hypot(dy) + 1e-6;
        let reach = (9 + i32::from(self.anomaly.stats.stealth) / 2) as f32;
        let max_x = grid.width() - 2;
        let max_y = grid.height() - 2;
        let tx = (origin.x as f32 + dx / mag * reach).clamp(1.0, max_x as f32) as i32;
        let ty = (origin.y as f32 + dy / mag * reach).clamp(1.0, max_y as f32) as i32;
        let target = Vec2::new(
            (tx + self.rng.int(-3, 3)).clamp(1, max_x),
            (ty + self.rng.int(-3, 3)).clamp(1, max_y),
        );
        if grid.is_passable(target) {
            return Some(target);
        }
        let avoid: Vec<Vec2> = self
            .operatives
            .iter()
            .filter(|op| op.alive)
            .map(|op| op.cell)
            .collect();
        random_floor_cell(grid, &avoid, 6, &mut self.rng)
    }

    fn border_target(&mut self) -> Option<Vec2> {
        let grid = &self.world.grid;
        let (w, h) = (grid.width(), grid.height());
        for _ in 0..40 {
            let candidate = match self.rng.int(0, 3) {
                0 => Vec2::new(self.rng.int(1, w - 2), 1),
                1 => Vec2::new(self.rng.int(1, w - 2), h - 2),
                2 => Vec2::new(1, self.rng.int(1, h - 2)),
                _ => Vec2::new(w - 2, self.rng.int(1, h - 2)),
            };
            if grid.is_passable(candidate) {
                return Some(candidate);
            }
        }
        None
    }

    fn roam_target(&mut self) -> Option<Vec2> {
        let grid = &self.world.grid;
        let buildings = &self.world.buildings;
        let mut best: Option<(i32, Vec2)> = None;
        for _ in 0..ROAM_SAMPLES {
            let candidate = if !buildings.is_empty() && self.rng.bool(0.65) {
                let building = &buildings[self.rng.pick_index(buildings.len())];
                if building.interior_cells.is_empty() {
                    continue;
                }
                building.interior_cells[self.rng.pick_index(building.interior_cells.len())]
            } else {
                match random_floor_cell(grid, &[], 0, &mut self.rng) {
                    Some(cell) => cell,
                    None => continue,
                }
            };
            let mut score = 0;
            if !self.visibility.is_revealed(candidate) {
                score += 2;
            }
            if grid.building_id(candidate) != -1 {
                score += 1;
            }
            if best.is_none_or(|(top, _)| score > top) {
                best = Some((score, candidate));
            }
        }
        best.map(|(_, cell)| cell)
    }

    pub(super) fn damage_anomaly(&mut self, amount: f32, cause: &str) {
        if self.anomaly.contained {
            return;
        }
        let a = &mut self.anomaly;
        let before = a.hp;
        a.hp = (a.hp - amount).max(0.0);
        self.log.add(
            self.elapsed,
            format!("{} took {:.0} damage ({}).", a.code, amount, cause),
        );
        if !a.immobilized && a.hp <= a.hp_max * IMMOBILIZED_HP_RATIO {
            a.immobilized = true;
            self.log.add(
                self.elapsed,
                format!("{} destabilizes and slows (immobilized).", a.code),
            );
            self.events.push(RuntimeEvent::AnomalyImmobilized);
        }
        if before > 0.0 && a.hp <= 0.0 {
            self.log.add(
                self.elapsed,
                format!(
                    "{} manifestation collapses. Containment is now much easier.",
                    a.code
                ),
            );
        }
    }
}
