// src/placement/core.rs
//! Shared geometry and constraint types for placement validation.
//! Keep this file dependency-light; validator, preview and search all build on it.

use bevy::prelude::*; // Vec3, Quat, Ray3d
use serde::{Deserialize, Serialize};

// ---------- Bounds ----------

/// Axis-aligned world-space box.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min: min.min(max), max: min.max(max) }
    }

    pub fn from_center_half(center: Vec3, half: Vec3) -> Self {
        let half = half.abs();
        Self { min: center - half, max: center + half }
    }

    #[inline]
    pub fn center(&self) -> Vec3 { (self.min + self.max) * 0.5 }

    #[inline]
    pub fn half_extents(&self) -> Vec3 { (self.max - self.min) * 0.5 }

    pub fn volume(&self) -> f32 {
        let size = self.max - self.min;
        size.x.max(0.0) * size.y.max(0.0) * size.z.max(0.0)
    }

    /// Scale the box about its center. `factor` of 0.8 keeps 80% of each extent.
    pub fn shrunk(&self, factor: f32) -> Self {
        Self::from_center_half(self.center(), self.half_extents() * factor.max(0.0))
    }

    pub fn union(&self, other: &Aabb) -> Self {
        Self { min: self.min.min(other.min), max: self.max.max(other.max) }
    }

    /// Volume shared by both boxes; zero when any axis extent is non-positive.
    pub fn intersection_volume(&self, other: &Aabb) -> f32 {
        let ex = self.max.x.min(other.max.x) - self.min.x.max(other.min.x);
        let ey = self.max.y.min(other.max.y) - self.min.y.max(other.min.y);
        let ez = self.max.z.min(other.max.z) - self.min.z.max(other.min.z);
        if ex <= 0.0 || ey <= 0.0 || ez <= 0.0 {
            return 0.0;
        }
        ex * ey * ez
    }
}

/// Oriented box in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrientedBox {
    pub center: Vec3,
    pub half_extents: Vec3,
    pub rotation: Quat,
}

impl OrientedBox {
    pub fn axes(&self) -> [Vec3; 3] {
        [self.rotation * Vec3::X, self.rotation * Vec3::Y, self.rotation * Vec3::Z]
    }

    /// Tight axis-aligned box around the rotated volume.
    pub fn world_aabb(&self) -> Aabb {
        let [ax, ay, az] = self.axes();
        let h = self.half_extents.abs();
        let extent = ax.abs() * h.x + ay.abs() * h.y + az.abs() * h.z;
        Aabb::from_center_half(self.center, extent)
    }

    /// Projection radius of the box onto `axis`.
    fn radius_along(&self, axis: Vec3) -> f32 {
        let [ax, ay, az] = self.axes();
        let h = self.half_extents.abs();
        h.x * ax.dot(axis).abs() + h.y * ay.dot(axis).abs() + h.z * az.dot(axis).abs()
    }

    /// Separating axis test. Touching faces or edges are not counted as overlap.
    pub fn intersects(&self, other: &OrientedBox) -> bool {
        let a = self.axes();
        let b = other.axes();
        let d = other.center - self.center;

        let mut axes: Vec<Vec3> = Vec::with_capacity(15);
        axes.extend_from_slice(&a);
        axes.extend_from_slice(&b);
        for u in &a {
            for v in &b {
                let c = u.cross(*v);
                // Parallel edge pairs give no axis.
                if c.length_squared() > 1e-8 {
                    axes.push(c.normalize());
                }
            }
        }

        for axis in axes {
            let dist = d.dot(axis).abs();
            if dist >= self.radius_along(axis) + other.radius_along(axis) {
                return false;
            }
        }
        true
    }

    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        let other = OrientedBox {
            center: aabb.center(),
            half_extents: aabb.half_extents(),
            rotation: Quat::IDENTITY,
        };
        self.intersects(&other)
    }
}

// ---------- Footprints ----------

/// One box of a footprint, relative to the object's origin.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FootprintVolume {
    #[serde(default)]
    pub offset: Vec3,
    pub half_extents: Vec3,
    #[serde(default)]
    pub rotation: Quat,
}

impl FootprintVolume {
    pub fn cuboid(offset: Vec3, half_extents: Vec3) -> Self {
        Self { offset, half_extents, rotation: Quat::IDENTITY }
    }

    pub fn to_world(&self, pose: &CandidatePose) -> OrientedBox {
        OrientedBox {
            center: pose.position + pose.rotation * self.offset,
            half_extents: self.half_extents,
            rotation: pose.rotation * self.rotation,
        }
    }
}

/// Ordered set of volumes describing the space an object occupies.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    pub volumes: Vec<FootprintVolume>,
}

impl Footprint {
    pub fn single(volume: FootprintVolume) -> Self {
        Self { volumes: vec![volume] }
    }

    pub fn world_volumes<'a>(&'a self, pose: &'a CandidatePose) -> impl Iterator<Item = OrientedBox> + 'a {
        self.volumes.iter().map(move |v| v.to_world(pose))
    }

    /// Union of every volume's world AABB, or a point box at the pose when empty.
    pub fn world_bounds(&self, pose: &CandidatePose) -> Aabb {
        self.world_volumes(pose)
            .map(|obb| obb.world_aabb())
            .reduce(|a, b| a.union(&b))
            .unwrap_or(Aabb { min: pose.position, max: pose.position })
    }
}

/// Name of a catalog entry, carried by ghost and commit events.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FootprintId(pub String);

// ---------- Poses ----------

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidatePose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl CandidatePose {
    pub fn at(position: Vec3) -> Self {
        Self { position, rotation: Quat::IDENTITY }
    }
}

impl Default for CandidatePose {
    fn default() -> Self { Self::at(Vec3::ZERO) }
}

// ---------- Occupants ----------

/// Bitmask of occupant tags (fast filter).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct OccupantTags(pub u32);

impl OccupantTags {
    pub const NONE: Self = Self(0);
    /// The requesting agent itself.
    pub const SELF: Self = Self(1 << 0);
    /// Never blocks placement.
    pub const IGNORABLE: Self = Self(1 << 1);
    pub const STRUCTURE: Self = Self(1 << 2);
    pub const TOWER: Self = Self(1 << 3);
    pub const SUMMONED: Self = Self(1 << 4);

    pub fn contains(self, other: Self) -> bool { (self.0 & other.0) == other.0 }
    pub fn any(self, other: Self) -> bool { (self.0 & other.0) != 0 }
}

impl std::ops::BitOr for OccupantTags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self { Self(self.0 | rhs.0) }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OccupantId(pub u64);

/// Something already placed in the world. The core only reads these.
#[derive(Clone, Debug, PartialEq)]
pub struct Occupant {
    pub id: OccupantId,
    /// Origin of the occupant, used for separation checks.
    pub position: Vec3,
    pub bounds: Aabb,
    pub tags: OccupantTags,
}

#[inline]
pub fn horizontal_distance(a: Vec3, b: Vec3) -> f32 {
    Vec2::new(a.x - b.x, a.z - b.z).length()
}

// ---------- Surfaces ----------

/// Bitmask of surface layers a ray may hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const GROUND: Self = Self(1 << 0);
    pub const WATER: Self = Self(1 << 1);
    pub const ALL: Self = Self(u32::MAX);

    pub fn any(self, other: Self) -> bool { (self.0 & other.0) != 0 }
}

impl Default for LayerMask {
    fn default() -> Self { Self::GROUND }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceHit {
    pub point: Vec3,
    /// Unit surface normal.
    pub normal: Vec3,
    pub layer: LayerMask,
}

impl SurfaceHit {
    #[inline]
    pub fn height(&self) -> f32 { self.point.y }

    /// Angle between the normal and +Y, in degrees.
    pub fn slope_deg(&self) -> f32 {
        self.normal.normalize_or_zero().dot(Vec3::Y).clamp(-1.0, 1.0).acos().to_degrees()
    }
}

// ---------- Collaborator traits ----------

/// Ground queries (required by preview and spawn search).
pub trait SurfaceQuery: Send + Sync + 'static {
    /// First surface on one of `layers` hit by `ray` within `max_distance`.
    fn raycast(&self, ray: Ray3d, max_distance: f32, layers: LayerMask) -> Option<SurfaceHit>;
}

/// Sample straight down from `lift` above `point`, searching `range` units.
pub fn sample_below(
    surface: &dyn SurfaceQuery,
    point: Vec3,
    lift: f32,
    range: f32,
    layers: LayerMask,
) -> Option<SurfaceHit> {
    let ray = Ray3d::new(point + Vec3::Y * lift, Dir3::NEG_Y);
    surface.raycast(ray, range, layers)
}

/// Read-only view over placed occupants.
pub trait OccupancyIndex {
    /// Occupants whose bounds intersect `volume`, skipping any carrying a tag in `exclude`.
    fn query_box(&self, volume: &OrientedBox, exclude: OccupantTags) -> Vec<&Occupant>;

    /// Occupants whose origin lies within `radius` (horizontal) of `point`.
    fn query_radius(&self, point: Vec3, radius: f32, exclude: OccupantTags) -> Vec<&Occupant>;
}

/// Collaborators the core reads from during one evaluation.
#[derive(Clone, Copy)]
pub struct PlacementWorld<'a> {
    pub surface: &'a dyn SurfaceQuery,
    pub occupancy: &'a dyn OccupancyIndex,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_4;

    fn unit_box(center: Vec3, yaw: f32) -> OrientedBox {
        OrientedBox { center, half_extents: Vec3::ONE, rotation: Quat::from_rotation_y(yaw) }
    }

    #[test]
    fn intersection_volume_of_disjoint_boxes_is_zero() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::new(Vec3::splat(2.0), Vec3::splat(3.0));
        assert_eq!(a.intersection_volume(&b), 0.0);
    }

    #[test]
    fn intersection_volume_is_product_of_axis_overlaps() {
        let a = Aabb::new(Vec3::ZERO, Vec3::new(2.0, 2.0, 2.0));
        let b = Aabb::new(Vec3::new(1.0, 0.0, 1.5), Vec3::new(3.0, 2.0, 3.0));
        assert!((a.intersection_volume(&b) - 1.0 * 2.0 * 0.5).abs() < 1e-6);
    }

    #[test]
    fn shrink_keeps_center() {
        let a = Aabb::from_center_half(Vec3::new(1.0, 2.0, 3.0), Vec3::ONE);
        let s = a.shrunk(0.8);
        assert_eq!(s.center(), a.center());
        assert!((s.volume() - 1.6f32.powi(3)).abs() < 1e-5);
    }

    #[test]
    fn separated_boxes_do_not_intersect() {
        assert!(!unit_box(Vec3::ZERO, 0.0).intersects(&unit_box(Vec3::new(5.0, 0.0, 0.0), 0.0)));
    }

    #[test]
    fn touching_boxes_do_not_intersect() {
        assert!(!unit_box(Vec3::ZERO, 0.0).intersects(&unit_box(Vec3::new(2.0, 0.0, 0.0), 0.0)));
    }

    #[test]
    fn rotated_box_reaches_further() {
        // A 45° box has a corner at ~1.414 along X.
        let a = unit_box(Vec3::ZERO, FRAC_PI_4);
        let b = Aabb::new(Vec3::new(1.2, -1.0, -0.1), Vec3::new(2.0, 1.0, 0.1));
        assert!(a.intersects_aabb(&b));
        assert!(!unit_box(Vec3::ZERO, 0.0).intersects_aabb(&b));
    }

    #[test]
    fn world_aabb_grows_with_rotation() {
        let aabb = unit_box(Vec3::ZERO, FRAC_PI_4).world_aabb();
        assert!((aabb.max.x - std::f32::consts::SQRT_2).abs() < 1e-5);
        assert!((aabb.max.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn footprint_volume_follows_pose_rotation() {
        let v = FootprintVolume::cuboid(Vec3::new(2.0, 0.0, 0.0), Vec3::ONE);
        let pose = CandidatePose {
            position: Vec3::new(10.0, 0.0, 0.0),
            rotation: Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
        };
        let world = v.to_world(&pose);
        // +X offset rotated 90° about Y lands on -Z.
        assert!((world.center - Vec3::new(10.0, 0.0, -2.0)).length() < 1e-5);
    }

    #[test]
    fn flat_normal_has_zero_slope() {
        let hit = SurfaceHit { point: Vec3::ZERO, normal: Vec3::Y, layer: LayerMask::GROUND };
        assert!(hit.slope_deg().abs() < 1e-4);
    }
}
