use super::*;

#[derive(Clone, Debug)]
pub(super) struct Bleed {
    pub(super) dps: f32,
    pub(super) remaining: f32,
}

#[derive(Clone, Debug)]
pub struct Operative {
    pub id: usize,
    pub name: String,
    pub role: String,
    pub attributes: Attributes,
    pub weapon: WeaponProfile,
    pub cell: Vec2,
    pub(super) pos: (f32, f32),
    pub(super) path: VecDeque<Vec2>,
    pub manual_target: Option<Vec2>,
    pub hp: f32,
    pub hp_max: f32,
    pub alive: bool,
    pub injured: bool,
    pub fleeing: bool,
    pub incapacitated: bool,
    pub(super) bleeds: Vec<Bleed>,
    pub panic: f32,
    pub kit_integrity: f32,
    pub behavior: Behavior,
    pub(super) cooldown: f32,
    pub(super) fire_cooldown: f32,
    pub(super) reload_timer: f32,
    pub ammo: u32,
    pub(super) last_seen_anomaly: Option<Vec2>,
    pub detected_anomaly: bool,
    pub(super) force_replan: bool,
}

impl Operative {
    pub fn new(id: usize, entry: &RosterEntry, cell: Vec2) -> Self {
        let attributes = entry.attributes.clamped();
        let hp_max = operative_hp_max(attributes.endurance);
        Self {
            id,
            name: entry.name.clone(),
            role: entry.role.clone(),
            attributes,
            weapon: entry.weapon.clone(),
            cell,
            pos: (cell.x as f32, cell.y as f32),
            path: VecDeque::new(),
            manual_target: None,
            hp: hp_max,
            hp_max,
            alive: true,
            injured: false,
            fleeing: false,
            incapacitated: false,
            bleeds: Vec::new(),
            panic: 0.0,
            kit_integrity: 100.0,
            behavior: Behavior::Search,
            cooldown: 0.0,
            fire_cooldown: 0.0,
            reload_timer: 0.0,
            ammo: entry.weapon.magazine_size,
            last_seen_anomaly: None,
            detected_anomaly: false,
            force_replan: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.alive && !self.incapacitated
    }

    pub fn is_bleeding(&self) -> bool {
        !self.bleeds.is_empty()
    }

    pub fn is_reloading(&self) -> bool {
        self.reload_timer > 0.0
    }

    /// Tiles per second.
    pub fn speed(&self) -> f32 {
        if self.incapacitated {
            return 0.0;
        }
        let mut speed = operative_base_speed(self.attributes.speed);
        if self.injured {
            speed *= 0.65;
        }
        if self.fleeing {
            speed *= 1.15;
        }
        speed
    }

    pub fn perception_radius(&self) -> i32 {
        perception_radius(self.attributes.perception)
    }

    pub fn medical_skill(&self) -> f32 {
        f32::from(self.attributes.medical) / ATTRIBUTE_MAX
    }

    pub fn last_seen_anomaly(&self) -> Option<Vec2> {
        self.last_seen_anomaly
    }

    pub fn path(&self) -> Vec<Vec2> {
        self.path.iter().copied().collect()
    }

    pub fn view(&self) -> OperativeView {
        OperativeView {
            id: self.id,
            name: self.name.clone(),
            role: self.role.clone(),
            weapon: self.weapon.name.clone(),
            x: self.cell.x,
            y: self.cell.y,
            px: self.pos.0,
            py: self.pos.1,
            hp: self.hp,
            hp_max: self.hp_max,
            panic: self.panic,
            kit_integrity: self.kit_integrity,
            ammo: self.ammo,
            magazine_size: self.weapon.magazine_size,
            reloading: self.is_reloading(),
            injured: self.injured,
            bleeding: self.is_bleeding(),
            fleeing: self.fleeing,
            incapacitated: self.incapacitated,
            alive: self.alive,
            behavior: self.behavior,
            manual_target: self.manual_target,
            path: self.path(),
        }
    }
}

impl MissionEngine {
    pub(super) fn update_operative(&mut self, idx: usize, dt: f32) {
        if !self.operatives[idx].is_active() {
            return;
        }
        {
            let op = &mut self.operatives[idx];
            op.cooldown = (op.cooldown - dt).max(0.0);
            op.fire_cooldown = (op.fire_cooldown - dt).max(0.0);
        }
        self.tick_reload(idx, dt);

        let near_threat = !self.anomaly.contained
            && self.operatives[idx].cell.manhattan(self.anomaly.cell) <= THREAT_AWARENESS_RADIUS;
        if !near_threat {
            let op = &mut self.operatives[idx];
            op.panic = (op.panic - panic_decay(dt, op.attributes.courage)).max(0.0);
        }

        self.update_bleeding(idx, dt);
        if !self.operatives[idx].alive {
            return;
        }
        self.heal_nearby(idx, dt);
        self.detect_anomaly(idx);

        if !self.anomaly.contained {
            self.try_shoot(idx);
            self.try_suppress(idx);
        }

        let adjacent = self.operatives[idx].cell.manhattan(self.anomaly.cell) <= 1;
        if adjacent && !self.anomaly.contained && self.operatives[idx].cooldown <= 0.0 {
            self.operatives[idx].cooldown = self.rng.range_f32(0.8, 1.5);
            self.attempt_containment(idx);
            if !self.operatives[idx].alive {
                return;
            }
        }

        self.plan_operative(idx);
        self.move_operative(idx, dt);
        self.start_reload_if_empty(idx);
    }

    fn tick_reload(&mut self, idx: usize, dt: f32) {
        let op = &mut self.operatives[idx];
        if op.reload_timer <= 0.0 {
            return;
        }
        op.reload_timer -= dt;
        if op.reload_timer <= 0.0 {
            op.reload_timer = 0.0;
            op.ammo = op.weapon.magazine_size;
            let line = format!("{} finished reloading.", op.name);
            self.log.add(self.elapsed, line);
        }
    }

    pub(super) fn start_reload_if_empty(&mut self, idx: usize) {
        let op = &mut self.operatives[idx];
        if op.reload_timer > 0.0 || op.ammo > 0 {
            return;
        }
        op.reload_timer = op.weapon.reload_time;
        let line = format!("{} reloads ({}).", op.name, op.weapon.name);
        let id = op.id;
        self.log.add(self.elapsed, line);
        self.events.push(RuntimeEvent::Reloading { operative: id });
    }

    fn update_bleeding(&mut self, idx: usize, dt: f32) {
        let op = &mut self.operatives[idx];
        if op.bleeds.is_empty() {
            return;
        }
        let mut total = 0.0;
        for bleed in &mut op.bleeds {
            total += bleed.dps * dt;
            bleed.remaining -= dt;
        }
        op.bleeds.retain(|bleed| bleed.remaining > 0.0);
        op.hp = (op.hp - total).max(0.0);
        if op.hp <= 0.0 {
            self.mark_down(idx, "bled out");
        }
    }

    pub(super) fn heal_nearby(&mut self, idx: usize, dt: f32) {
        let healer = &self.operatives[idx];
        let skill = healer.medical_skill();
        if skill < HEALER_MIN_SKILL || healer.panic > HEAL_PANIC_LIMIT {
            return;
        }
        if healer.behavior == Behavior::Chase && healer.detected_anomaly {
            return;
        }
        let cell = healer.cell;
        let rate = heal_rate(healer.attributes.medical);
        let healer_name = healer.name.clone();

        let Some(patient_idx) = self.operatives.iter().position(|other| {
            other.id != idx
                && other.alive
                && other.cell.manhattan(cell) <= 1
                && other.hp < other.hp_max
                && (other.injured || other.is_bleeding())
        }) else {
            return;
        };

        let stanch = self.operatives[patient_idx].is_bleeding() && self.rng.bool(0.2 * skill);
        let patient = &mut self.operatives[patient_idx];
        patient.hp = (patient.hp + rate * dt).min(patient.hp_max);
        if stanch {
            patient.bleeds.remove(0);
            let line = format!("{healer_name} stabilizes {}'s bleeding.", patient.name);
            self.log.add(self.elapsed, line);
        }
        let patient = &mut self.operatives[patient_idx];
        if patient.injured && patient.hp > patient.hp_max * RECOVERED_HP_RATIO {
            patient.injured = false;
            let line = format!("{} is back on their feet.", patient.name);
            self.log.add(self.elapsed, line);
        }
    }

    fn detect_anomaly(&mut self, idx: usize) {
        let target = self.anomaly.cell;
        let op = &self.operatives[idx];
        let seen = !self.anomaly.contained
            && observes(&self.world.grid, op.cell, op.perception_radius(), target);
        let name = op.name.clone();

        let op = &mut self.operatives[idx];
        op.detected_anomaly = seen;
        if !seen {
            return;
        }
        op.last_seen_anomaly = Some(target);
        let fresh = self.team_last_known_anomaly.is_none();
        self.team_last_known_anomaly = Some(target);
        if fresh {
            let line = format!(
                "{name} has eyes on {} at ({}, {}).",
                self.anomaly.code, target.x, target.y
            );
            self.log.add(self.elapsed, line);
            self.events.push(RuntimeEvent::AnomalySighted {
                x: target.x,
                y: target.y,
                by: idx,
            });
        }
    }

    fn try_shoot(&mut self, idx: usize) {
        let op = &self.operatives[idx];
        if op.reload_timer > 0.0 || op.fire_cooldown > 0.0 {
            return;
        }
        let target = self.anomaly.cell;
        let distance = op.cell.manhattan(target);
        if distance > op.weapon.range || !los_clear(&self.world.grid, op.cell, target) {
            return;
        }
        if op.ammo == 0 {
            self.start_reload_if_empty(idx);
            return;
        }

        let cover = target_cover(&self.world.grid, target);
        let chance = operative_hit_chance(
            &op.weapon,
            op.attributes.aim,
            op.injured,
            distance,
            cover,
            self.anomaly.stats.stealth,
        );
        let weapon = op.weapon.clone();
        let tactics = op.attributes.tactics;
        let name = op.name.clone();

        let op = &mut self.operatives[idx];
        op.fire_cooldown = fire_cooldown(&op.weapon);
        op.ammo -= 1;
        self.tracers.push(Tracer {
            x0: op.pos.0 + 0.5,
            y0: op.pos.1 + 0.5,
            x1: self.anomaly.pos.0 + 0.5,
            y1: self.anomaly.pos.1 + 0.5,
            ttl: TRACER_TTL_SECS,
            source: TracerSource::Squad,
        });
        self.stats.shots_fired += 1;

        let hit = self.rng.bool(chance);
        if hit {
            self.stats.shots_hit += 1;
            let damage = shot_damage(&weapon, tactics, self.rng.next_f32());
            self.damage_anomaly(damage, &format!("{} hit by {}", weapon.name, name));
            let a = &mut self.anomaly;
            a.stability = clamp_meter(a.stability - stability_loss_on_hit(damage));
            a.aggro = clamp_meter(a.aggro + 5.0);
        } else {
            self.anomaly.aggro = clamp_meter(self.anomaly.aggro + 1.5);
        }
        self.events.push(RuntimeEvent::ShotFired {
            operative: idx,
            hit,
        });
    }

    /// Pressure on the anomaly while the weapon is being reloaded.
    pub(super) fn try_suppress(&mut self, idx: usize) {
        let op = &self.operatives[idx];
        if op.reload_timer <= 0.0 || !op.detected_anomaly || op.cooldown > 0.0 {
            return;
        }
        if op.cell.manhattan(self.anomaly.cell) > suppression_range(op.attributes.aim) {
            return;
        }
        let aim = op.attributes.aim;
        let name = op.name.clone();
        if !self.rng.bool(suppression_chance(aim, op.injured)) {
            return;
        }
        let pressure = suppression_pressure(aim);
        let a = &mut self.anomaly;
        a.stability = clamp_meter(a.stability - pressure);
        a.aggro = clamp_meter(a.aggro + 6.0);
        self.operatives[idx].cooldown = self.rng.range_f32(0.6, 1.1);
        let line = format!("{name} applies pressure: anomaly stability -{pressure:.0}.");
        self.log.add(self.elapsed, line);
        self.events.push(RuntimeEvent::Suppressed {
            operative: idx,
            pressure,
        });
    }

    fn attempt_containment(&mut self, idx: usize) {
        let anomaly_cell = self.anomaly.cell;
        let adjacent = self
            .operatives
            .iter()
            .filter(|o| o.is_active() && o.cell.manhattan(anomaly_cell) <= 1)
            .count();
        let op = &self.operatives[idx];
        let chance = containment_chance(ContainmentInputs {
            containment: op.attributes.containment,
            kit_integrity: op.kit_integrity,
            stability: self.anomaly.stability,
            adjacent,
            immobilized: self.anomaly.immobilized,
            resilience: self.anomaly.stats.resilience,
        });
        let name = op.name.clone();

        let kit_cost = self.rng.range_f32(6.0, 14.0);
        let op = &mut self.operatives[idx];
        op.kit_integrity = clamp_meter(op.kit_integrity - kit_cost);
        self.anomaly.aggro = clamp_meter(self.anomaly.aggro + 10.0);
        self.stats.containment_attempts += 1;

        let success = self.rng.bool(chance);
        self.events.push(RuntimeEvent::ContainmentAttempt {
            operative: idx,
            chance,
            success,
        });
        if success {
            self.anomaly.contained = true;
            self.anomaly.path.clear();
            self.log.add(
                self.elapsed,
                format!("CONTAINMENT SUCCESS by {name}! Begin extraction."),
            );
            self.enter_extraction();
            return;
        }

        self.log.add(
            self.elapsed,
            format!("{name} containment attempt failed ({:.0}% odds).", chance * 100.0),
        );
        if self.rng.bool(backlash_chance(self.anomaly.stats.threat)) {
            let damage = self.rng.range_f32(8.0, 24.0);
            self.damage_operative(idx, damage, "containment backlash");
        }
    }

    fn plan_operative(&mut self, idx: usize) {
        let op = &self.operatives[idx];
        let due = op.force_replan
            || (op.cooldown <= 0.0
                && (op.path.is_empty() || self.rng.bool(OPERATIVE_REPLAN_CHANCE)));
        if !due {
            return;
        }
        self.operatives[idx].force_replan = false;

        let goal = self.decide_operative(idx);
        let op = &mut self.operatives[idx];
        let Some(goal) = goal else {
            op.path.clear();
            return;
        };
        let path = find_path(&self.world.grid, op.cell, goal);
        if !path.is_empty() {
            op.path = path.into_iter().skip(1).collect();
            return;
        }
        op.path.clear();
        if op.behavior == Behavior::Manual && op.manual_target.take().is_some() {
            let line = format!("{}: waypoint unreachable, holding position.", op.name);
            self.log.add(self.elapsed, line);
        }
    }

    /// Runs the behavior table and returns the cell to path toward.
    pub(super) fn decide_operative(&mut self, idx: usize) -> Option<Vec2> {
        let op = &mut self.operatives[idx];
        if op.manual_target == Some(op.cell) {
            op.manual_target = None;
            let line = format!("{} reached the waypoint.", op.name);
            self.log.add(self.elapsed, line);
        }

        if let Some(lead) = self.team_last_known_anomaly {
            let op = &self.operatives[idx];
            if !op.detected_anomaly && op.cell.manhattan(lead) <= 1 {
                let line = format!("{} reached the last known position. Trail is cold.", op.name);
                self.team_last_known_anomaly = None;
                self.log.add(self.elapsed, line);
            }
        }

        let healer = self.nearest_healer(idx);
        let ally_adjacent = self.ally_adjacent(idx);
        let op = &self.operatives[idx];
        let facts = OperativeFacts {
            alive: op.is_active(),
            fleeing: op.fleeing,
            retreat_ordered: self.retreat_order,
            extraction_phase: self.phase == Phase::Extraction,
            has_manual_target: op.manual_target.is_some(),
            needs_medic: op.injured && healer.is_some() && !ally_adjacent,
            anomaly_reported: self.team_last_known_anomaly.is_some() && !self.anomaly.contained,
        };
        let behavior = next_operative_behavior(&facts);
        self.operatives[idx].behavior = behavior;

        match behavior {
            Behavior::Dead => None,
            Behavior::Flee | Behavior::Extract => Some(self.world.extraction),
            Behavior::Manual => self.operatives[idx].manual_target,
            Behavior::Regroup => healer,
            Behavior::Chase => {
                let lead = self.team_last_known_anomaly?;
                Some(self.flank_target(idx, lead))
            }
            Behavior::Search => self.choose_explore_target(idx),
        }
    }

    fn nearest_healer(&self, idx: usize) -> Option<Vec2> {
        let origin = self.operatives[idx].cell;
        self.operatives
            .iter()
            .filter(|o| o.id != idx && o.is_active() && o.medical_skill() >= HEALER_MIN_SKILL)
            .min_by_key(|o| (o.cell.manhattan(origin), o.id))
            .map(|o| o.cell)
    }

    fn ally_adjacent(&self, idx: usize) -> bool {
        let origin = self.operatives[idx].cell;
        self.operatives
            .iter()
            .any(|o| o.id != idx && o.is_active() && o.cell.manhattan(origin) <= 1)
    }

    fn flank_target(&mut self, idx: usize, lead: Vec2) -> Vec2 {
        let tactics = f32::from(self.operatives[idx].attributes.tactics) / ATTRIBUTE_MAX;
        if self.rng.bool(0.35 + 0.35 * tactics) {
            let grid = &self.world.grid;
            let ox = self.rng.int(-2, 2);
            let oy = self.rng.int(-2, 2);
            let flank = Vec2::new(
                (lead.x + ox).clamp(1, grid.width() - 2),
                (lead.y + oy).clamp(1, grid.height() - 2),
            );
            if grid.is_passable(flank) {
                return flank;
            }
        }
        lead
    }

    /// Sampled sweep target: unvisited cells, fog frontiers and building
    /// interiors score up; distance and crowding score down.
    fn choose_explore_target(&mut self, idx: usize) -> Option<Vec2> {
        let origin = self.operatives[idx].cell;
        let grid = &self.world.grid;
        let buildings = &self.world.buildings;
        let mut best: Option<(f32, Vec2)> = None;

        for _ in 0..EXPLORE_SAMPLES {
            let candidate = if !buildings.is_empty() && self.rng.bool(0.75) {
                let building = &buildings[self.rng.pick_index(buildings.len())];
                if building.interior_cells.is_empty() {
                    continue;
                }
                building.interior_cells[self.rng.pick_index(building.interior_cells.len())]
            } else {
                Vec2::new(
                    self.rng.int(1, grid.width() - 2),
                    self.rng.int(1, grid.height() - 2),
                )
            };
            if !grid.is_passable(candidate) {
                continue;
            }

            let mut score = 0.0;
            if !self.visited[grid.index(candidate)] {
                score += 2.2;
            }
            let frontier = candidate
                .neighbors4()
                .iter()
                .filter(|n| grid.in_bounds(**n) && !self.visibility.is_revealed(**n))
                .count();
            score += frontier as f32 * 0.85;
            if grid.building_id(candidate) != -1 {
                score += 1.2;
            }
            score -= origin.manhattan(candidate) as f32 * 0.06;
            let crowd = self
                .operatives
                .iter()
                .filter(|o| o.alive && o.cell.manhattan(candidate) <= 2)
                .count();
            score -= crowd as f32 * 0.6;

            if best.is_none_or(|(top, _)| score > top) {
                best = Some((score, candidate));
            }
        }
        best.map(|(_, cell)| cell)
    }

    fn move_operative(&mut self, idx: usize, dt: f32) {
        let op = &mut self.operatives[idx];
        let distance = op.speed() * dt;
        let Some(cell) = advance_along_path(&mut op.pos, &mut op.cell, &mut op.path, distance)
        else {
            return;
        };
        self.visited[self.world.grid.index(cell)] = true;
        if op.manual_target == Some(cell) {
            op.manual_target = None;
        }
    }

    pub(super) fn damage_operative(&mut self, idx: usize, amount: f32, cause: &str) {
        if !self.operatives[idx].is_active() {
            return;
        }
        let bleed = if amount >= BLEED_DAMAGE_THRESHOLD && self.rng.bool(BLEED_CHANCE) {
            Some(Bleed {
                dps: self.rng.range_f32(1.2, 2.4),
                remaining: self.rng.range_f32(8.0, 14.0),
            })
        } else {
            None
        };

        let elapsed = self.elapsed;
        let op = &mut self.operatives[idx];
        op.hp = (op.hp - amount).max(0.0);
        self.log.add(
            elapsed,
            format!("{} took {:.0} damage ({}).", op.name, amount, cause),
        );
        self.events.push(RuntimeEvent::OperativeDamaged {
            operative: idx,
            amount,
            cause: cause.to_string(),
        });

        if let Some(bleed) = bleed {
            op.bleeds.push(bleed);
            self.log.add(elapsed, format!("{} is bleeding!", op.name));
        }
        if !op.injured && op.hp > 0.0 && op.hp <= op.hp_max * INJURED_HP_RATIO {
            op.injured = true;
            self.log.add(
                elapsed,
                format!("{} is injured (movement and aim degraded).", op.name),
            );
        }

        let courage = op.attributes.courage;
        op.panic = clamp_meter(op.panic + panic_gain(amount, courage));
        if !op.fleeing
            && op.panic > FLEE_PANIC_THRESHOLD
            && self.rng.bool(flee_chance(op.panic, courage))
        {
            op.fleeing = true;
            op.behavior = Behavior::Flee;
            op.force_replan = true;
            self.log.add(elapsed, format!("{} panics and flees!", op.name));
            self.events.push(RuntimeEvent::OperativeFled { operative: idx });
        }

        if op.hp <= 0.0 {
            self.mark_down(idx, cause);
        }
    }

    /// Permanent: nothing revives an operative before the next regenerate.
    pub(super) fn mark_down(&mut self, idx: usize, cause: &str) {
        let op = &mut self.operatives[idx];
        if !op.alive {
            return;
        }
        op.hp = 0.0;
        op.alive = false;
        op.incapacitated = true;
        op.behavior = Behavior::Dead;
        op.path.clear();
        op.manual_target = None;
        op.bleeds.clear();
        op.detected_anomaly = false;
        let line = format!("{} is KIA ({cause}).", op.name);
        self.log.add(self.elapsed, line);
        self.events.push(RuntimeEvent::OperativeDown {
            operative: idx,
            cause: cause.to_string(),
        });
    }
}
