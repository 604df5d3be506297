// src/world/mod.rs
//! Reference collaborators: the occupant index and ground surfaces.
pub mod occupancy;
pub mod surface;
