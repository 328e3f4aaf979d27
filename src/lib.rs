pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod pathfinding;
pub mod rng;
pub mod roster;
pub mod server_protocol;
pub mod server_utils;
pub mod types;
pub mod visibility;
pub mod world;
