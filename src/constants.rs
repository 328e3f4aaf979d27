pub const TICK_RATE: u32 = 20;
pub const TICK_MS: u64 = 1000 / TICK_RATE as u64;
pub const TICK_SECS: f32 = TICK_MS as f32 / 1000.0;

pub const MAP_WIDTH: i32 = 52;
pub const MAP_HEIGHT: i32 = 34;
pub const BUILDING_COUNT: usize = 6;
pub const BUILDING_PLACEMENT_ATTEMPTS: usize = 800;
pub const BUILDING_PADDING: i32 = 2;
pub const COVER_CLUSTERS: usize = 10;
pub const TUNNEL_MAX_STEPS: usize = 2_000;

pub const CAVE_FILL_PROBABILITY: f32 = 0.42;
pub const CAVE_SMOOTHING_PASSES: usize = 5;

pub const DEFAULT_DEADLINE_SECS: f32 = 480.0;
pub const EXTRACTION_RADIUS: i32 = 3;
pub const ESCAPE_THRESHOLD_SECS: f32 = 12.0;
pub const EVENT_LOG_CAPACITY: usize = 400;
pub const SNAPSHOT_LOG_TAIL: usize = 24;
pub const SPAWN_RADIUS: i32 = 5;

pub const THREAT_AWARENESS_RADIUS: i32 = 7;
pub const INJURED_HP_RATIO: f32 = 0.45;
pub const RECOVERED_HP_RATIO: f32 = 0.55;
pub const IMMOBILIZED_HP_RATIO: f32 = 0.22;
pub const FLEE_PANIC_THRESHOLD: f32 = 65.0;
pub const HEAL_PANIC_LIMIT: f32 = 70.0;
pub const HEALER_MIN_SKILL: f32 = 0.25;
pub const BLEED_DAMAGE_THRESHOLD: f32 = 10.0;
pub const BLEED_CHANCE: f32 = 0.25;

pub const CONTAINMENT_CHANCE_MIN: f32 = 0.03;
pub const CONTAINMENT_CHANCE_MAX: f32 = 0.82;
pub const IMMOBILIZED_CONTAINMENT_BONUS: f32 = 1.25;

pub const OPERATIVE_REPLAN_CHANCE: f32 = 0.03;
pub const ANOMALY_REPLAN_CHANCE: f32 = 0.06;
pub const EXPLORE_SAMPLES: usize = 160;
pub const ROAM_SAMPLES: usize = 12;
pub const TRACER_TTL_SECS: f32 = 0.10;

pub const ATTRIBUTE_MAX: f32 = 20.0;

pub fn perception_radius(perception: u8) -> i32 {
    3 + i32::from(perception) / 3
}

pub fn operative_hp_max(endurance: u8) -> f32 {
    60.0 + f32::from(endurance) * 4.0
}

pub fn operative_base_speed(speed: u8) -> f32 {
    1.4 + (f32::from(speed) / ATTRIBUTE_MAX) * 2.0
}

pub fn anomaly_hp_max(threat: u8, resilience: u8) -> f32 {
    80.0 + f32::from(threat) * 6.0 + f32::from(resilience) * 5.0
}

pub fn anomaly_base_speed(speed: u8) -> f32 {
    1.6 + (f32::from(speed) / ATTRIBUTE_MAX) * 2.2
}

pub fn anomaly_ranged_range(threat: u8, aggression: u8) -> i32 {
    6 + i32::from(threat) / 4 + i32::from(aggression) / 5
}

pub fn suppression_range(aim: u8) -> i32 {
    6 + i32::from(aim) / 5
}
