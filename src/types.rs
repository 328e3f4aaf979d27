use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: i32,
    pub y: i32,
}

impl Vec2 {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan(self, other: Vec2) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    pub fn neighbors4(self) -> [Vec2; 4] {
        [
            Vec2::new(self.x + 1, self.y),
            Vec2::new(self.x - 1, self.y),
            Vec2::new(self.x, self.y + 1),
            Vec2::new(self.x, self.y - 1),
        ]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cell {
    Wall,
    Floor,
    Door,
}

impl Cell {
    pub fn is_passable(self) -> bool {
        self != Cell::Wall
    }

    pub fn glyph(self) -> char {
        match self {
            Cell::Wall => '#',
            Cell::Floor => '.',
            Cell::Door => '+',
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Operation,
    Extraction,
    Success,
    Failure,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Success | Phase::Failure)
    }

    /// Phases only move forward: operation -> {extraction, failure} ->
    /// {success, failure}.
    pub fn can_advance_to(self, next: Phase) -> bool {
        match (self, next) {
            (Phase::Operation, Phase::Extraction | Phase::Failure) => true,
            (Phase::Extraction, Phase::Success | Phase::Failure) => true,
            _ => false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionOutcome {
    Contained,
    Timeout,
    AnomalyEscaped,
    SquadLost,
    Withdrawn,
}

impl MissionOutcome {
    pub fn phase(self) -> Phase {
        match self {
            MissionOutcome::Contained => Phase::Success,
            _ => Phase::Failure,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            MissionOutcome::Contained => "contained",
            MissionOutcome::Timeout => "timeout",
            MissionOutcome::AnomalyEscaped => "anomaly_escaped",
            MissionOutcome::SquadLost => "squad_lost",
            MissionOutcome::Withdrawn => "withdrawn",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Behavior {
    Search,
    Chase,
    Regroup,
    Manual,
    Extract,
    Flee,
    Dead,
}

/// Operative attribute set, every field in 0..=20.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    pub speed: u8,
    pub perception: u8,
    pub tactics: u8,
    pub aim: u8,
    pub endurance: u8,
    pub courage: u8,
    pub medical: u8,
    pub containment: u8,
}

impl Attributes {
    pub const fn uniform(value: u8) -> Self {
        Self {
            speed: value,
            perception: value,
            tactics: value,
            aim: value,
            endurance: value,
            courage: value,
            medical: value,
            containment: value,
        }
    }

    pub fn clamped(self) -> Self {
        let c = |v: u8| v.min(20);
        Self {
            speed: c(self.speed),
            perception: c(self.perception),
            tactics: c(self.tactics),
            aim: c(self.aim),
            endurance: c(self.endurance),
            courage: c(self.courage),
            medical: c(self.medical),
            containment: c(self.containment),
        }
    }
}

/// Anomaly stat block, every field in 0..=20.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyStats {
    pub threat: u8,
    pub speed: u8,
    pub stealth: u8,
    pub aggression: u8,
    pub resilience: u8,
}

impl AnomalyStats {
    pub fn clamped(self) -> Self {
        let c = |v: u8| v.min(20);
        Self {
            threat: c(self.threat),
            speed: c(self.speed),
            stealth: c(self.stealth),
            aggression: c(self.aggression),
            resilience: c(self.resilience),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TracerSource {
    Squad,
    Anomaly,
}

/// Cosmetic shot line; never read by gameplay.
#[derive(Clone, Debug, Serialize)]
pub struct Tracer {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
    pub ttl: f32,
    pub source: TracerSource,
}

#[derive(Clone, Debug, Serialize)]
pub struct LogLine {
    pub at: f32,
    pub text: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct OperativeView {
    pub id: usize,
    pub name: String,
    pub role: String,
    pub weapon: String,
    pub x: i32,
    pub y: i32,
    pub px: f32,
    pub py: f32,
    pub hp: f32,
    #[serde(rename = "hpMax")]
    pub hp_max: f32,
    pub panic: f32,
    #[serde(rename = "kitIntegrity")]
    pub kit_integrity: f32,
    pub ammo: u32,
    #[serde(rename = "magazineSize")]
    pub magazine_size: u32,
    pub reloading: bool,
    pub injured: bool,
    pub bleeding: bool,
    pub fleeing: bool,
    pub incapacitated: bool,
    pub alive: bool,
    pub behavior: Behavior,
    #[serde(rename = "manualTarget")]
    pub manual_target: Option<Vec2>,
    pub path: Vec<Vec2>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AnomalyView {
    pub code: String,
    pub x: i32,
    pub y: i32,
    pub px: f32,
    pub py: f32,
    pub hp: f32,
    #[serde(rename = "hpMax")]
    pub hp_max: f32,
    pub stability: f32,
    pub aggro: f32,
    pub contained: bool,
    pub immobilized: bool,
    pub observed: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct GridSnapshot {
    pub width: i32,
    pub height: i32,
    pub rows: Vec<String>,
    #[serde(rename = "buildingIds")]
    pub building_ids: Vec<Vec<i32>>,
    pub entry: Vec2,
    pub extraction: Vec2,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    AnomalySighted {
        x: i32,
        y: i32,
        by: usize,
    },
    ShotFired {
        operative: usize,
        hit: bool,
    },
    Suppressed {
        operative: usize,
        pressure: f32,
    },
    Reloading {
        operative: usize,
    },
    OperativeDamaged {
        operative: usize,
        amount: f32,
        cause: String,
    },
    OperativeFled {
        operative: usize,
    },
    OperativeDown {
        operative: usize,
        cause: String,
    },
    ContainmentAttempt {
        operative: usize,
        chance: f32,
        success: bool,
    },
    AnomalyImmobilized,
    PhaseChanged {
        phase: Phase,
    },
    MissionEnded {
        outcome: MissionOutcome,
    },
    Regenerated {
        seed: u64,
    },
    Toast {
        message: String,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    pub elapsed: f32,
    pub deadline: f32,
    #[serde(rename = "timeLeft")]
    pub time_left: f32,
    pub phase: Phase,
    pub outcome: Option<MissionOutcome>,
    pub paused: bool,
    #[serde(rename = "retreatOrder")]
    pub retreat_order: bool,
    #[serde(rename = "fogEnabled")]
    pub fog_enabled: bool,
    #[serde(rename = "debugAnomaly")]
    pub debug_anomaly: bool,
    pub selected: Option<usize>,
    pub operatives: Vec<OperativeView>,
    pub anomaly: Option<AnomalyView>,
    pub tracers: Vec<Tracer>,
    pub events: Vec<RuntimeEvent>,
    pub log: Vec<LogLine>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MissionSummary {
    pub seed: u64,
    pub outcome: Option<MissionOutcome>,
    pub phase: Phase,
    #[serde(rename = "durationSecs")]
    pub duration_secs: f32,
    pub ticks: u64,
    pub survivors: usize,
    pub kia: usize,
    pub contained: bool,
    #[serde(rename = "anomalyHp")]
    pub anomaly_hp: f32,
    #[serde(rename = "anomalyStability")]
    pub anomaly_stability: f32,
    #[serde(rename = "containmentAttempts")]
    pub containment_attempts: u32,
    #[serde(rename = "shotsFired")]
    pub shots_fired: u32,
    #[serde(rename = "shotsHit")]
    pub shots_hit: u32,
}

/// Player-issued commands. Each is a pure state write picked up by the next
/// tick.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum MissionCommand {
    Select { operative: usize },
    Waypoint { x: i32, y: i32 },
    ClearWaypoint,
    TogglePause,
    Retreat,
    Regenerate { seed: Option<u64> },
    ToggleFog,
    ToggleDebug,
}
