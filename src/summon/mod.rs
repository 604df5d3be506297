// src/summon/mod.rs
//! Timed summoning around fixed points, using the spawn-position search.
pub mod components;
pub mod plugin;
pub mod schedule;
pub mod systems;

pub use components::Summoner;
pub use plugin::{ClearSummoned, ForceSummon, ReleaseOccupant, SpawnRequested, SummonPlugin};
