// src/placement/validator.rs
//! Stateless constraint checks for a candidate pose.
//!
//! Every check runs on every call so callers see all violated constraints at once.
//! The result depends only on the inputs; calling twice gives the same answer.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::core::{
    horizontal_distance, sample_below, CandidatePose, Footprint, LayerMask, OccupantTags,
    OrientedBox, PlacementWorld,
};

/// Occupants with these tags never block a placement.
pub const EXCLUDED_TAGS: OccupantTags = OccupantTags(OccupantTags::SELF.0 | OccupantTags::IGNORABLE.0);

/// The slope probe starts this far above the candidate...
const SLOPE_PROBE_LIFT: f32 = 2.0;
/// ...and searches this far down.
const SLOPE_PROBE_RANGE: f32 = 5.0;

// ---------- Policy ----------

/// Keep-out distance around occupants carrying any of `tags`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaggedSeparation {
    pub tags: OccupantTags,
    pub min_distance: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidityPolicy {
    pub min_distance_from_reference: f32,
    pub max_distance_from_reference: f32,
    pub require_flat_surface: bool,
    pub max_surface_angle_deg: f32,
    /// 0 disables the check.
    pub min_separation_from_occupants: f32,
    /// 0 = any intersection rejects; otherwise the share of the shrunk candidate
    /// volume a single occupant must exceed to reject.
    pub overlap_significance_fraction: f32,
    /// Candidate bounds are scaled by this before measuring overlap volume.
    pub bounds_shrink_factor: f32,
    #[serde(default)]
    pub tagged_separation: Option<TaggedSeparation>,
    /// Layers the slope probe may land on.
    #[serde(default)]
    pub ground_layers: LayerMask,
}

impl ValidityPolicy {
    /// Zero tolerance: any intersecting occupant rejects.
    pub fn strict() -> Self {
        Self {
            min_distance_from_reference: 2.0,
            max_distance_from_reference: 15.0,
            require_flat_surface: true,
            max_surface_angle_deg: 25.0,
            min_separation_from_occupants: 1.0,
            overlap_significance_fraction: 0.0,
            bounds_shrink_factor: 1.0,
            tagged_separation: Some(TaggedSeparation { tags: OccupantTags::TOWER, min_distance: 10.0 }),
            ground_layers: LayerMask::GROUND,
        }
    }

    /// Only occupants covering more than half of the 80%-shrunk candidate reject.
    pub fn tolerant() -> Self {
        Self {
            overlap_significance_fraction: 0.5,
            bounds_shrink_factor: 0.8,
            ..Self::strict()
        }
    }

    #[inline]
    pub fn is_strict(&self) -> bool {
        self.overlap_significance_fraction <= 0.0
    }
}

impl Default for ValidityPolicy {
    fn default() -> Self { Self::strict() }
}

// ---------- Result ----------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReasonCode {
    OutOfDistanceRange,
    SlopeExceeded,
    Overlap,
    InsufficientSeparation,
    /// The pointer ray found no ground this tick.
    NoSurface,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidityResult {
    /// Violated constraints in check order, each at most once.
    reasons: Vec<ReasonCode>,
}

impl ValidityResult {
    pub fn valid() -> Self { Self::default() }

    pub fn rejected(reason: ReasonCode) -> Self { Self { reasons: vec![reason] } }

    #[inline]
    pub fn is_valid(&self) -> bool { self.reasons.is_empty() }

    pub fn reasons(&self) -> &[ReasonCode] { &self.reasons }

    pub fn has(&self, reason: ReasonCode) -> bool { self.reasons.contains(&reason) }

    fn flag(&mut self, reason: ReasonCode) {
        if !self.has(reason) {
            self.reasons.push(reason);
        }
    }
}

// ---------- Checks ----------

/// Full check of a player/agent placement relative to `reference`.
pub fn validate(
    pose: &CandidatePose,
    footprint: &Footprint,
    reference: Vec3,
    policy: &ValidityPolicy,
    world: PlacementWorld<'_>,
) -> ValidityResult {
    let mut result = ValidityResult::valid();

    let d = reference.distance(pose.position);
    if d < policy.min_distance_from_reference || d > policy.max_distance_from_reference {
        result.flag(ReasonCode::OutOfDistanceRange);
    }

    if policy.require_flat_surface {
        // No ground under the probe means nothing to penalize.
        let probe = sample_below(
            world.surface,
            pose.position,
            SLOPE_PROBE_LIFT,
            SLOPE_PROBE_RANGE,
            policy.ground_layers,
        );
        if let Some(hit) = probe {
            if hit.slope_deg() > policy.max_surface_angle_deg {
                result.flag(ReasonCode::SlopeExceeded);
            }
        }
    }

    check_occupants(pose, footprint, policy, world, &mut result);
    result
}

/// Overlap and separation only; used where there is no reference point or
/// surface constraint (automated spawning).
pub fn validate_occupancy(
    pose: &CandidatePose,
    footprint: &Footprint,
    policy: &ValidityPolicy,
    world: PlacementWorld<'_>,
) -> ValidityResult {
    let mut result = ValidityResult::valid();
    check_occupants(pose, footprint, policy, world, &mut result);
    result
}

fn check_occupants(
    pose: &CandidatePose,
    footprint: &Footprint,
    policy: &ValidityPolicy,
    world: PlacementWorld<'_>,
    result: &mut ValidityResult,
) {
    if overlaps_any(pose, footprint, policy, world) {
        result.flag(ReasonCode::Overlap);
    }

    let min_sep = policy.min_separation_from_occupants;
    if min_sep > 0.0 {
        let crowded = world
            .occupancy
            .query_radius(pose.position, min_sep, EXCLUDED_TAGS)
            .iter()
            .any(|o| horizontal_distance(o.position, pose.position) < min_sep);
        if crowded {
            result.flag(ReasonCode::InsufficientSeparation);
        }
    }

    if let Some(rule) = policy.tagged_separation.filter(|r| r.min_distance > 0.0) {
        let near_tagged = world
            .occupancy
            .query_radius(pose.position, rule.min_distance, EXCLUDED_TAGS)
            .iter()
            .any(|o| o.tags.any(rule.tags) && horizontal_distance(o.position, pose.position) < rule.min_distance);
        if near_tagged {
            result.flag(ReasonCode::InsufficientSeparation);
        }
    }
}

fn overlaps_any(
    pose: &CandidatePose,
    footprint: &Footprint,
    policy: &ValidityPolicy,
    world: PlacementWorld<'_>,
) -> bool {
    if footprint.volumes.is_empty() {
        // A point has no volume to measure: any occupant containing it rejects.
        let point = OrientedBox { center: pose.position, half_extents: Vec3::ZERO, rotation: Quat::IDENTITY };
        return !world.occupancy.query_box(&point, EXCLUDED_TAGS).is_empty();
    }
    for volume in footprint.world_volumes(pose) {
        let hits = world.occupancy.query_box(&volume, EXCLUDED_TAGS);
        if hits.is_empty() {
            continue;
        }
        if policy.is_strict() {
            return true;
        }

        let shrunk = volume.world_aabb().shrunk(policy.bounds_shrink_factor);
        let threshold = policy.overlap_significance_fraction * shrunk.volume();
        // Strictly greater: an occupant covering exactly the threshold is tolerated.
        if hits.iter().any(|o| shrunk.intersection_volume(&o.bounds) > threshold) {
            return true;
        }
    }
    false
}
