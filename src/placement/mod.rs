// src/placement/mod.rs
pub mod core;
pub mod catalog;
pub mod validator;
pub mod preview;
pub mod search;
pub mod plugin;
pub mod systems;

pub use plugin::{PlacementPlugin, PlacementSettings};
