use std::collections::VecDeque;

use crate::config::MissionConfig;
use crate::constants::{
    anomaly_base_speed, anomaly_hp_max, anomaly_ranged_range, operative_base_speed,
    operative_hp_max, perception_radius, suppression_range, ANOMALY_REPLAN_CHANCE,
    ATTRIBUTE_MAX, BLEED_CHANCE, BLEED_DAMAGE_THRESHOLD, EXPLORE_SAMPLES, FLEE_PANIC_THRESHOLD,
    HEALER_MIN_SKILL, HEAL_PANIC_LIMIT, IMMOBILIZED_HP_RATIO, INJURED_HP_RATIO,
    OPERATIVE_REPLAN_CHANCE, RECOVERED_HP_RATIO, ROAM_SAMPLES, SNAPSHOT_LOG_TAIL, SPAWN_RADIUS,
    THREAT_AWARENESS_RADIUS, TRACER_TTL_SECS,
};
use crate::error::{CommandError, ConfigError};
use crate::pathfinding::find_path;
use crate::rng::Rng;
use crate::roster::{default_squad, roll_anomaly, AnomalyProfile, RosterEntry, WeaponProfile};
use crate::types::{
    AnomalyStats, AnomalyView, Attributes, Behavior, GridSnapshot, MissionCommand,
    MissionOutcome, MissionSummary, OperativeView, Phase, RuntimeEvent, Snapshot, Tracer,
    TracerSource, Vec2,
};
use crate::visibility::{los_clear, observes, target_cover, VisibilityField};
use crate::world::{generate_world, random_floor_cell, GeneratedWorld};

mod anomaly;
pub mod combat;
pub mod decision;
mod event_log;
mod operative;
mod spawn_system;
mod utils;

pub use self::anomaly::Anomaly;
pub use self::event_log::EventLog;
pub use self::operative::Operative;

use self::combat::{
    anomaly_attack_gate, backlash_chance, containment_chance, fire_cooldown, flee_chance,
    heal_rate, melee_damage, near_miss_panic, observation_chance, operative_hit_chance,
    panic_decay, panic_gain, ranged_damage, ranged_hit_chance, shot_damage,
    stability_loss_on_hit, stability_regen, suppression_chance, suppression_pressure,
    ContainmentInputs,
};
use self::decision::{
    next_anomaly_mode, next_operative_behavior, AnomalyFacts, AnomalyMode, OperativeFacts,
};
use self::utils::{advance_along_path, centroid, clamp_meter};

#[derive(Clone, Debug, Default)]
struct MissionStats {
    containment_attempts: u32,
    shots_fired: u32,
    shots_hit: u32,
}

/// Hand-placed mission: a fixed world, squad positions and anomaly. Used for
/// scripted scenarios; regenerating afterwards falls back to the generator.
#[derive(Clone, Debug)]
pub struct MissionLayout {
    pub world: GeneratedWorld,
    pub squad: Vec<(RosterEntry, Vec2)>,
    pub anomaly: AnomalyProfile,
    pub anomaly_cell: Vec2,
}

/// Owns the grid, squad, anomaly, clock and fog. Everything mutates only
/// inside `step` and `apply_command`.
#[derive(Clone, Debug)]
pub struct MissionEngine {
    pub config: MissionConfig,
    pub world: GeneratedWorld,

    seed: u64,
    rng: Rng,
    /// `None` means a fresh default squad is rolled on every regenerate.
    custom_roster: Option<Vec<RosterEntry>>,
    operatives: Vec<Operative>,
    anomaly: Anomaly,
    visibility: VisibilityField,
    visited: Vec<bool>,
    tracers: Vec<Tracer>,
    events: Vec<RuntimeEvent>,
    log: EventLog,
    stats: MissionStats,

    phase: Phase,
    outcome: Option<MissionOutcome>,
    elapsed: f32,
    deadline: f32,
    tick: u64,
    paused: bool,
    retreat_order: bool,
    fog_enabled: bool,
    debug_anomaly: bool,
    selected: Option<usize>,
    team_last_known_anomaly: Option<Vec2>,
    anomaly_observed: bool,
}

impl MissionEngine {
    /// An empty `roster` rolls the default six-operative squad from the seed.
    pub fn new(
        roster: Vec<RosterEntry>,
        seed: u64,
        config: MissionConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let custom_roster = (!roster.is_empty()).then_some(roster);
        Ok(Self::generate(config, seed, custom_roster))
    }

    /// # Panics
    ///
    /// If a squad member or the anomaly is placed on an impassable cell.
    pub fn from_layout(
        layout: MissionLayout,
        seed: u64,
        config: MissionConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let grid = &layout.world.grid;
        for (entry, cell) in &layout.squad {
            assert!(
                grid.is_passable(*cell),
                "{} placed on impassable cell {cell:?}",
                entry.name
            );
        }
        assert!(grid.is_passable(layout.anomaly_cell));

        let operatives = layout
            .squad
            .iter()
            .enumerate()
            .map(|(id, (entry, cell))| Operative::new(id, entry, *cell))
            .collect();
        let anomaly = Anomaly::new(&layout.anomaly, layout.anomaly_cell);
        let roster = layout.squad.into_iter().map(|(entry, _)| entry).collect();
        Ok(Self::assemble(
            config,
            seed,
            Rng::new(seed),
            Some(roster),
            layout.world,
            operatives,
            anomaly,
        ))
    }

    fn generate(config: MissionConfig, seed: u64, custom_roster: Option<Vec<RosterEntry>>) -> Self {
        let mut rng = Rng::new(seed);
        let roster = match &custom_roster {
            Some(roster) => roster.clone(),
            None => default_squad(&mut rng),
        };
        let world = generate_world(&config, &mut rng);
        let profile = roll_anomaly(&mut rng);
        let operatives = spawn_system::spawn_squad(&world, &roster, &mut rng);
        let anomaly = spawn_system::spawn_anomaly(&world, &profile, &mut rng);
        Self::assemble(config, seed, rng, custom_roster, world, operatives, anomaly)
    }

    fn assemble(
        config: MissionConfig,
        seed: u64,
        rng: Rng,
        custom_roster: Option<Vec<RosterEntry>>,
        world: GeneratedWorld,
        operatives: Vec<Operative>,
        anomaly: Anomaly,
    ) -> Self {
        let visibility = VisibilityField::for_grid(&world.grid);
        let visited = vec![false; world.grid.len()];
        let mut engine = Self {
            deadline: config.deadline_secs,
            fog_enabled: config.fog_enabled,
            log: EventLog::new(config.event_log_capacity),
            config,
            world,
            seed,
            rng,
            custom_roster,
            selected: if operatives.is_empty() { None } else { Some(0) },
            operatives,
            anomaly,
            visibility,
            visited,
            tracers: Vec::new(),
            events: Vec::new(),
            stats: MissionStats::default(),
            phase: Phase::Operation,
            outcome: None,
            elapsed: 0.0,
            tick: 0,
            paused: false,
            retreat_order: false,
            debug_anomaly: false,
            team_last_known_anomaly: None,
            anomaly_observed: false,
        };

        for idx in 0..engine.operatives.len() {
            let cell = engine.operatives[idx].cell;
            let vidx = engine.world.grid.index(cell);
            engine.visited[vidx] = true;
        }
        engine.log.add(0.0, "New operation initialized.");
        engine
            .log
            .add(0.0, "Objective: contain the anomaly and extract survivors.");
        let squad = engine
            .operatives
            .iter()
            .map(|op| format!("{} ({}/{})", op.name, op.role, op.weapon.name))
            .collect::<Vec<_>>()
            .join(", ");
        engine.log.add(0.0, format!("Operatives inserted: {squad}."));
        let code = engine.anomaly.code.clone();
        engine.log.add(0.0, format!("Anomaly registered: {code}."));
        engine.refresh_visibility();
        engine
    }

    /// Fresh grid, squad and anomaly. View toggles (fog, debug) carry over.
    pub fn regenerate(&mut self, seed: Option<u64>) {
        let seed = seed.unwrap_or_else(|| self.rng.next_u64());
        let fog_enabled = self.fog_enabled;
        let debug_anomaly = self.debug_anomaly;
        *self = Self::generate(self.config.clone(), seed, self.custom_roster.take());
        self.fog_enabled = fog_enabled;
        self.debug_anomaly = debug_anomaly;
        self.refresh_visibility();
        self.events.push(RuntimeEvent::Regenerated { seed });
    }

    pub fn step(&mut self, dt: f32) {
        if self.paused {
            return;
        }
        if self.phase.is_terminal() {
            self.update_tracers(dt);
            return;
        }
        self.tick += 1;
        self.elapsed += dt;

        for idx in 0..self.operatives.len() {
            self.update_operative(idx, dt);
        }
        self.update_anomaly(dt);
        self.refresh_visibility();
        self.update_tracers(dt);
        self.evaluate_phase();
    }

    pub fn apply_command(&mut self, command: MissionCommand) -> Result<(), CommandError> {
        match command {
            MissionCommand::Select { operative } => {
                let op = self
                    .operatives
                    .get(operative)
                    .ok_or(CommandError::UnknownOperative(operative))?;
                if !op.alive {
                    return Err(CommandError::OperativeDown(operative));
                }
                let line = format!("Selected: {} ({}/{}).", op.name, op.role, op.weapon.name);
                self.selected = Some(operative);
                self.log.add(self.elapsed, line);
            }
            MissionCommand::Waypoint { x, y } => {
                let idx = self.controllable_selection()?;
                let target = Vec2::new(x, y);
                if !self.world.grid.in_bounds(target) {
                    return Err(CommandError::OffGrid(target));
                }
                if !self.world.grid.is_passable(target) {
                    return Err(CommandError::Impassable(target));
                }
                let op = &mut self.operatives[idx];
                op.manual_target = Some(target);
                op.path.clear();
                op.force_replan = true;
                let line = format!("Waypoint set for {}: ({x}, {y}).", op.name);
                self.log.add(self.elapsed, line);
            }
            MissionCommand::ClearWaypoint => {
                let idx = self.controllable_selection()?;
                let op = &mut self.operatives[idx];
                if op.manual_target.take().is_some() {
                    op.path.clear();
                    op.force_replan = true;
                    let line = format!("Waypoint cleared for {}.", op.name);
                    self.log.add(self.elapsed, line);
                }
            }
            MissionCommand::TogglePause => {
                self.paused = !self.paused;
                let line = if self.paused { "Paused." } else { "Resumed." };
                self.log.add(self.elapsed, line);
            }
            MissionCommand::Retreat => {
                if self.phase.is_terminal() {
                    return Err(CommandError::MissionOver);
                }
                if !self.retreat_order {
                    self.retreat_order = true;
                    self.log.add(
                        self.elapsed,
                        "RETREAT ORDERED: all units fall back to extraction.",
                    );
                    self.enter_extraction();
                    for op in self.operatives.iter_mut().filter(|op| op.is_active()) {
                        op.path.clear();
                        op.force_replan = true;
                    }
                }
            }
            MissionCommand::Regenerate { seed } => self.regenerate(seed),
            MissionCommand::ToggleFog => {
                self.fog_enabled = !self.fog_enabled;
                self.refresh_visibility();
                let line = if self.fog_enabled {
                    "Fog of war enabled."
                } else {
                    "Fog of war disabled."
                };
                self.log.add(self.elapsed, line);
            }
            MissionCommand::ToggleDebug => {
                self.debug_anomaly = !self.debug_anomaly;
            }
        }
        Ok(())
    }

    fn controllable_selection(&self) -> Result<usize, CommandError> {
        if self.phase.is_terminal() {
            return Err(CommandError::MissionOver);
        }
        let idx = self.selected.ok_or(CommandError::NoSelection)?;
        if !self.operatives[idx].is_active() {
            return Err(CommandError::OperativeDown(idx));
        }
        Ok(idx)
    }

    fn refresh_visibility(&mut self) {
        if !self.fog_enabled {
            self.visibility.reveal_all();
            return;
        }
        for op in self.operatives.iter().filter(|op| op.alive) {
            self.visibility
                .reveal_from(&self.world.grid, op.cell, op.perception_radius());
        }
    }

    fn update_tracers(&mut self, dt: f32) {
        for tracer in &mut self.tracers {
            tracer.ttl -= dt;
        }
        self.tracers.retain(|tracer| tracer.ttl > 0.0);
    }

    /// Operation -> extraction. Extraction is entered at most once.
    fn enter_extraction(&mut self) {
        if self.phase != Phase::Operation {
            return;
        }
        self.phase = Phase::Extraction;
        self.log
            .add(self.elapsed, "Phase: EXTRACTION. Move survivors to the exfil point.");
        self.events.push(RuntimeEvent::PhaseChanged {
            phase: Phase::Extraction,
        });
        for op in self.operatives.iter_mut().filter(|op| op.is_active()) {
            op.force_replan = true;
        }
    }

    fn evaluate_phase(&mut self) {
        if self.phase.is_terminal() {
            return;
        }
        if self.elapsed >= self.deadline {
            self.finish(
                MissionOutcome::Timeout,
                "OPERATION FAILED: Time limit exceeded. Anomaly activity lost.",
            );
            return;
        }
        if !self.anomaly.contained
            && self.world.grid.is_border(self.anomaly.cell)
            && self.anomaly.escape_timer > self.config.escape_threshold_secs
        {
            self.finish(
                MissionOutcome::AnomalyEscaped,
                "OPERATION FAILED: Anomaly escaped containment zone.",
            );
            return;
        }
        if !self.operatives.iter().any(|op| op.alive) {
            self.finish(MissionOutcome::SquadLost, "OPERATION FAILED: All operatives lost.");
            return;
        }

        let radius = self.config.extraction_radius;
        let extraction = self.world.extraction;
        let all_out = self
            .operatives
            .iter()
            .filter(|op| op.alive)
            .all(|op| op.cell.manhattan(extraction) <= radius);
        if !all_out {
            return;
        }
        if self.anomaly.contained {
            self.finish(
                MissionOutcome::Contained,
                "MISSION SUCCESS: Survivors extracted with contained anomaly.",
            );
        } else if self.retreat_order {
            self.finish(
                MissionOutcome::Withdrawn,
                "OPERATION FAILED: Squad withdrew without containing the anomaly.",
            );
        }
    }

    fn finish(&mut self, outcome: MissionOutcome, message: &str) {
        let next = outcome.phase();
        if !self.phase.can_advance_to(next) {
            return;
        }
        self.phase = next;
        self.outcome = Some(outcome);
        self.log.add(self.elapsed, message);
        self.events.push(RuntimeEvent::PhaseChanged { phase: next });
        self.events.push(RuntimeEvent::MissionEnded { outcome });
    }

    pub fn build_snapshot(&mut self, include_events: bool) -> Snapshot {
        let observed = self.anomaly_visible_to_squad();
        let show_anomaly = self.anomaly.contained || observed || self.debug_anomaly;
        Snapshot {
            tick: self.tick,
            elapsed: self.elapsed,
            deadline: self.deadline,
            time_left: self.time_left(),
            phase: self.phase,
            outcome: self.outcome,
            paused: self.paused,
            retreat_order: self.retreat_order,
            fog_enabled: self.fog_enabled,
            debug_anomaly: self.debug_anomaly,
            selected: self.selected,
            operatives: self.operatives.iter().map(Operative::view).collect(),
            anomaly: show_anomaly.then(|| self.anomaly.view(observed)),
            tracers: self.tracers.clone(),
            events: if include_events {
                std::mem::take(&mut self.events)
            } else {
                Vec::new()
            },
            log: self.log.tail(SNAPSHOT_LOG_TAIL),
        }
    }

    pub fn build_grid_snapshot(&self) -> GridSnapshot {
        self.world.to_snapshot(self.visibility.mask())
    }

    pub fn build_summary(&self) -> MissionSummary {
        let survivors = self.operatives.iter().filter(|op| op.alive).count();
        MissionSummary {
            seed: self.seed,
            outcome: self.outcome,
            phase: self.phase,
            duration_secs: self.elapsed,
            ticks: self.tick,
            survivors,
            kia: self.operatives.len() - survivors,
            contained: self.anomaly.contained,
            anomaly_hp: self.anomaly.hp,
            anomaly_stability: self.anomaly.stability,
            containment_attempts: self.stats.containment_attempts,
            shots_fired: self.stats.shots_fired,
            shots_hit: self.stats.shots_hit,
        }
    }

    /// Seen by an operative this tick or by the anomaly's own observer roll.
    fn anomaly_visible_to_squad(&self) -> bool {
        !self.anomaly.contained
            && (self.anomaly_observed || self.operatives.iter().any(|op| op.detected_anomaly))
    }

    pub fn time_left(&self) -> f32 {
        (self.deadline - self.elapsed).max(0.0)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn outcome(&self) -> Option<MissionOutcome> {
        self.outcome
    }

    pub fn is_ended(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn retreat_ordered(&self) -> bool {
        self.retreat_order
    }

    pub fn fog_enabled(&self) -> bool {
        self.fog_enabled
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn operatives(&self) -> &[Operative] {
        &self.operatives
    }

    pub fn anomaly(&self) -> &Anomaly {
        &self.anomaly
    }

    pub fn visibility(&self) -> &VisibilityField {
        &self.visibility
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn team_last_known_anomaly(&self) -> Option<Vec2> {
        self.team_last_known_anomaly
    }

    pub fn was_visited(&self, cell: Vec2) -> bool {
        self.visited[self.world.grid.index(cell)]
    }
}
