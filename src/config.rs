use serde::{Deserialize, Serialize};

use crate::constants::{
    BUILDING_COUNT, DEFAULT_DEADLINE_SECS, ESCAPE_THRESHOLD_SECS, EVENT_LOG_CAPACITY,
    EXTRACTION_RADIUS, MAP_HEIGHT, MAP_WIDTH,
};
use crate::error::ConfigError;

pub const MIN_MAP_SIDE: i32 = 6;
pub const MAX_MAP_SIDE: i32 = 256;
pub const MAX_BUILDINGS: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorKind {
    Facility,
    Cave,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MissionConfig {
    #[serde(rename = "mapWidth")]
    pub map_width: i32,
    #[serde(rename = "mapHeight")]
    pub map_height: i32,
    #[serde(rename = "buildingCount")]
    pub building_count: usize,
    pub generator: GeneratorKind,
    #[serde(rename = "deadlineSecs")]
    pub deadline_secs: f32,
    #[serde(rename = "extractionRadius")]
    pub extraction_radius: i32,
    #[serde(rename = "escapeThresholdSecs")]
    pub escape_threshold_secs: f32,
    #[serde(rename = "fogEnabled")]
    pub fog_enabled: bool,
    #[serde(rename = "eventLogCapacity")]
    pub event_log_capacity: usize,
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            map_width: MAP_WIDTH,
            map_height: MAP_HEIGHT,
            building_count: BUILDING_COUNT,
            generator: GeneratorKind::Facility,
            deadline_secs: DEFAULT_DEADLINE_SECS,
            extraction_radius: EXTRACTION_RADIUS,
            escape_threshold_secs: ESCAPE_THRESHOLD_SECS,
            fog_enabled: true,
            event_log_capacity: EVENT_LOG_CAPACITY,
        }
    }
}

impl MissionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let side_ok = |v: i32| (MIN_MAP_SIDE..=MAX_MAP_SIDE).contains(&v);
        if !side_ok(self.map_width) || !side_ok(self.map_height) {
            return Err(ConfigError::MapSize {
                width: self.map_width,
                height: self.map_height,
            });
        }
        if !(self.deadline_secs > 0.0) {
            return Err(ConfigError::Deadline(self.deadline_secs));
        }
        if self.extraction_radius < 0 {
            return Err(ConfigError::ExtractionRadius(self.extraction_radius));
        }
        if !(self.escape_threshold_secs > 0.0) {
            return Err(ConfigError::EscapeThreshold(self.escape_threshold_secs));
        }
        if self.event_log_capacity == 0 {
            return Err(ConfigError::EventLogCapacity);
        }
        if self.building_count > MAX_BUILDINGS {
            return Err(ConfigError::BuildingCount(self.building_count));
        }
        Ok(())
    }
}
