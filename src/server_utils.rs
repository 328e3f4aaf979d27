use crate::config::{MAX_BUILDINGS, MAX_MAP_SIDE, MIN_MAP_SIDE};
use crate::constants::DEFAULT_DEADLINE_SECS;

const MIN_DEADLINE_SECS: i64 = 30;
const MAX_DEADLINE_SECS: i64 = 3_600;

pub fn normalize_building_count(value: Option<i64>, default: usize) -> usize {
    match value {
        None => default.min(MAX_BUILDINGS),
        Some(count) => count.clamp(0, MAX_BUILDINGS as i64) as usize,
    }
}

pub fn normalize_deadline_secs(value: Option<i64>) -> f32 {
    value
        .map(|secs| secs.clamp(MIN_DEADLINE_SECS, MAX_DEADLINE_SECS) as f32)
        .unwrap_or(DEFAULT_DEADLINE_SECS)
}

pub fn normalize_map_side(value: Option<i64>, default: i32) -> i32 {
    value
        .map(|side| side.clamp(i64::from(MIN_MAP_SIDE), i64::from(MAX_MAP_SIDE)) as i32)
        .unwrap_or(default)
}

pub fn parse_seed(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
}

pub fn parse_i64(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
}
