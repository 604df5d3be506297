// src/placement/search.rs
//! Ring-expansion search for a free spawn slot near an anchor.
//!
//! Order is fixed: the anchor itself, then rings outward, each ring sampled by
//! ascending angle. Worst case is `1 + max_rings * samples_per_ring` checks.

use bevy::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::core::{sample_below, CandidatePose, Footprint, LayerMask, PlacementWorld};
use super::validator::{validate_occupancy, ValidityPolicy};

/// Ground probes start this far above the sample...
const PROBE_LIFT: f32 = 10.0;
/// ...and search this far down.
const PROBE_RANGE: f32 = 20.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnSearchParams {
    /// Ring `n` has radius `base_spacing * n`.
    pub base_spacing: f32,
    pub max_rings: u32,
    pub samples_per_ring: u32,
    /// Added to the surface height of every candidate.
    pub height_offset: f32,
    pub ground_layers: LayerMask,
}

impl Default for SpawnSearchParams {
    fn default() -> Self {
        Self {
            base_spacing: 2.0,
            max_rings: 3,
            samples_per_ring: 8,
            height_offset: 0.5,
            ground_layers: LayerMask::GROUND,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SpawnOutcome {
    /// Passed the occupancy check.
    Found(Vec3),
    /// Search exhausted; random nearby point that was never validated.
    Degraded(Vec3),
}

impl SpawnOutcome {
    pub fn position(&self) -> Vec3 {
        match *self {
            SpawnOutcome::Found(p) | SpawnOutcome::Degraded(p) => p,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, SpawnOutcome::Degraded(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnReport {
    pub outcome: SpawnOutcome,
    /// Validity checks performed, including the direct anchor check.
    pub evaluations: u32,
    /// Ring the result came from (0 = the anchor itself). `None` when degraded.
    pub ring: Option<u32>,
}

/// Drop `point` onto the ground (or just offset it when there is none).
pub fn project_to_surface(point: Vec3, params: &SpawnSearchParams, world: PlacementWorld<'_>) -> Vec3 {
    match sample_below(world.surface, point, PROBE_LIFT, PROBE_RANGE, params.ground_layers) {
        Some(hit) => hit.point + Vec3::Y * params.height_offset,
        None => point + Vec3::Y * params.height_offset,
    }
}

/// Find a slot for `footprint` near `anchor` that passes the occupancy checks of `policy`.
pub fn find_spawn_position(
    anchor: Vec3,
    footprint: &Footprint,
    params: &SpawnSearchParams,
    policy: &ValidityPolicy,
    world: PlacementWorld<'_>,
    rng: &mut impl Rng,
) -> SpawnReport {
    let mut evaluations = 0;
    let mut passes = |position: Vec3| {
        evaluations += 1;
        validate_occupancy(&CandidatePose::at(position), footprint, policy, world).is_valid()
    };

    let base = project_to_surface(anchor, params, world);
    if passes(base) {
        return SpawnReport { outcome: SpawnOutcome::Found(base), evaluations, ring: Some(0) };
    }

    let samples = params.samples_per_ring;
    let rings = if samples == 0 { 0 } else { params.max_rings };
    for ring in 1..=rings {
        let radius = params.base_spacing * ring as f32;
        for sample in 0..samples {
            let angle = (360.0 / samples as f32 * sample as f32).to_radians();
            let offset = Vec3::new(angle.cos() * radius, 0.0, angle.sin() * radius);
            let candidate = project_to_surface(anchor + offset, params, world);
            if passes(candidate) {
                debug!(
                    "Spawn search: ring {} angle {:.0}° radius {:.2}",
                    ring,
                    angle.to_degrees(),
                    radius
                );
                return SpawnReport { outcome: SpawnOutcome::Found(candidate), evaluations, ring: Some(ring) };
            }
        }
    }

    let heading = rng.random_range(0.0..std::f32::consts::TAU);
    let reach = params.base_spacing * 2.0;
    let offset = Vec3::new(heading.cos() * reach, 0.0, heading.sin() * reach);
    let fallback = project_to_surface(anchor + offset, params, world);
    warn!("Spawn search exhausted near {:?}; using unvalidated position {:?}", anchor, fallback);
    SpawnReport { outcome: SpawnOutcome::Degraded(fallback), evaluations, ring: None }
}
