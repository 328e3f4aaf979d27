use thiserror::Error;

use crate::types::Vec2;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("map size {width}x{height} is outside 6..=256")]
    MapSize { width: i32, height: i32 },
    #[error("deadline must be positive, got {0}")]
    Deadline(f32),
    #[error("extraction radius must not be negative, got {0}")]
    ExtractionRadius(i32),
    #[error("escape threshold must be positive, got {0}")]
    EscapeThreshold(f32),
    #[error("event log capacity must be at least 1")]
    EventLogCapacity,
    #[error("building count {0} exceeds 32")]
    BuildingCount(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("no operative with id {0}")]
    UnknownOperative(usize),
    #[error("operative {0} is not able to act")]
    OperativeDown(usize),
    #[error("no operative selected")]
    NoSelection,
    #[error("cell ({}, {}) is outside the map", .0.x, .0.y)]
    OffGrid(Vec2),
    #[error("cell ({}, {}) is not passable", .0.x, .0.y)]
    Impassable(Vec2),
    #[error("mission is over; regenerate to start again")]
    MissionOver,
}
