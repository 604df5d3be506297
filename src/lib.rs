pub mod actions;
pub mod input;
pub mod placement;
pub mod setup;
pub mod summon;
pub mod world;
