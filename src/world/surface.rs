// src/world/surface.rs
//! Ground implementations of `SurfaceQuery`: an infinite plane and a sampled heightfield.

use bevy::math::{UVec2, Vec2};
use bevy::prelude::*;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use crate::placement::core::{LayerMask, SurfaceHit, SurfaceQuery};

/// Bisection steps after the march brackets a crossing.
const BISECT_STEPS: usize = 16;

/// Active ground the preview and summoners sample against.
#[derive(Resource)]
pub struct ActiveSurface(pub Box<dyn SurfaceQuery>);

// ---------- Flat ground ----------

#[derive(Clone, Copy, Debug)]
pub struct FlatGround {
    pub y: f32,
    pub layer: LayerMask,
}

impl Default for FlatGround {
    fn default() -> Self { Self { y: 0.0, layer: LayerMask::GROUND } }
}

impl SurfaceQuery for FlatGround {
    fn raycast(&self, ray: Ray3d, max_distance: f32, layers: LayerMask) -> Option<SurfaceHit> {
        if !self.layer.any(layers) {
            return None;
        }
        let dir = *ray.direction;
        if dir.y.abs() < f32::EPSILON {
            return None;
        }
        let t = (self.y - ray.origin.y) / dir.y;
        if t < 0.0 || t > max_distance {
            return None;
        }
        Some(SurfaceHit { point: ray.get_point(t), normal: Vec3::Y, layer: self.layer })
    }
}

// ---------- Heightfield ----------

#[derive(thiserror::Error, Debug)]
pub enum HeightfieldError {
    #[error("I/O while reading height tile: {0}")]
    Io(#[from] std::io::Error),
    #[error("height tile too short: expected {expected} bytes, found {found}")]
    TooShort { expected: usize, found: usize },
    #[error("heightfield resolution must be at least 2x2")]
    ZeroResolution,
}

/// Regular grid of heights covering `size` world units from `origin` (XZ).
#[derive(Clone, Debug)]
pub struct Heightfield {
    /// World-space origin of the grid (min X, min Z).
    pub origin: Vec2,
    /// Size of the grid in world units (X, Z).
    pub size: Vec2,
    /// Samples per axis.
    pub resolution: UVec2,
    /// Row-major heights in world units.
    heights: Arc<Vec<f32>>,
    pub layer: LayerMask,
}

impl Heightfield {
    pub fn new(origin: Vec2, size: Vec2, resolution: UVec2, heights: Vec<f32>) -> Result<Self, HeightfieldError> {
        if resolution.x < 2 || resolution.y < 2 {
            return Err(HeightfieldError::ZeroResolution);
        }
        let expected = (resolution.x * resolution.y) as usize;
        if heights.len() < expected {
            return Err(HeightfieldError::TooShort { expected, found: heights.len() });
        }
        Ok(Self { origin, size, resolution, heights: Arc::new(heights), layer: LayerMask::GROUND })
    }

    /// Load a little-endian 16-bit RAW tile and scale it to world heights.
    /// `raw_minmax` maps raw values to 0..1 before `height_scale` is applied.
    pub fn from_raw16(
        path: impl AsRef<Path>,
        resolution: UVec2,
        origin: Vec2,
        size: Vec2,
        height_scale: f32,
        raw_minmax: (f32, f32),
    ) -> Result<Self, HeightfieldError> {
        let expected_pixels = (resolution.x as usize) * (resolution.y as usize);
        let expected_bytes = expected_pixels * 2;

        let mut buf = Vec::with_capacity(expected_bytes);
        File::open(path.as_ref())?.read_to_end(&mut buf)?;
        if buf.len() < expected_bytes {
            return Err(HeightfieldError::TooShort { expected: expected_bytes, found: buf.len() });
        }

        let (rmin, rmax) = raw_minmax;
        let heights = buf[..expected_bytes]
            .chunks_exact(2)
            .map(|b| {
                let raw = u16::from_le_bytes([b[0], b[1]]) as f32;
                let norm = if rmax > rmin { ((raw - rmin) / (rmax - rmin)).clamp(0.0, 1.0) } else { 0.0 };
                norm * height_scale
            })
            .collect();

        Self::new(origin, size, resolution, heights)
    }

    #[inline]
    fn get_clamped(&self, x: i32, z: i32) -> f32 {
        let xi = x.clamp(0, self.resolution.x as i32 - 1) as u32;
        let zi = z.clamp(0, self.resolution.y as i32 - 1) as u32;
        self.heights[(zi * self.resolution.x + xi) as usize]
    }

    /// World units between neighbouring samples (X, Z).
    pub fn spacing(&self) -> Vec2 {
        Vec2::new(
            self.size.x / (self.resolution.x - 1) as f32,
            self.size.y / (self.resolution.y - 1) as f32,
        )
    }

    /// Bilinear height at world (x, z); `None` outside the grid.
    pub fn sample_height(&self, x: f32, z: f32) -> Option<f32> {
        let lx = x - self.origin.x;
        let lz = z - self.origin.y;
        if lx < 0.0 || lz < 0.0 || lx > self.size.x || lz > self.size.y {
            return None;
        }

        let px_f = lx / self.size.x * (self.resolution.x - 1) as f32;
        let pz_f = lz / self.size.y * (self.resolution.y - 1) as f32;
        let x0 = px_f.floor() as i32;
        let z0 = pz_f.floor() as i32;
        let dx = px_f - x0 as f32;
        let dz = pz_f - z0 as f32;

        let s00 = self.get_clamped(x0, z0);
        let s10 = self.get_clamped(x0 + 1, z0);
        let s01 = self.get_clamped(x0, z0 + 1);
        let s11 = self.get_clamped(x0 + 1, z0 + 1);

        let a = s00 * (1.0 - dx) + s10 * dx;
        let b = s01 * (1.0 - dx) + s11 * dx;
        Some(a * (1.0 - dz) + b * dz)
    }

    /// Surface normal from central differences; `None` outside the grid.
    pub fn normal_at(&self, x: f32, z: f32) -> Option<Vec3> {
        let centre = self.sample_height(x, z)?;
        let step = self.spacing();
        let h = |sx: f32, sz: f32| self.sample_height(sx, sz).unwrap_or(centre);

        let dhdx = (h(x + step.x, z) - h(x - step.x, z)) / (2.0 * step.x);
        let dhdz = (h(x, z + step.y) - h(x, z - step.y)) / (2.0 * step.y);
        Some(Vec3::new(-dhdx, 1.0, -dhdz).normalize())
    }

    fn above(&self, p: Vec3) -> Option<bool> {
        self.sample_height(p.x, p.z).map(|h| p.y > h)
    }
}

impl SurfaceQuery for Heightfield {
    fn raycast(&self, ray: Ray3d, max_distance: f32, layers: LayerMask) -> Option<SurfaceHit> {
        if !self.layer.any(layers) || max_distance <= 0.0 {
            return None;
        }

        // March at half a cell until the ray passes below the ground, then bisect.
        let step = (self.spacing().min_element() * 0.5).max(1e-3);
        let mut t_low = 0.0;
        let mut prev_above = self.above(ray.origin);
        let mut t = 0.0;
        let mut t_high = None;
        while t < max_distance {
            t = (t + step).min(max_distance);
            match (prev_above, self.above(ray.get_point(t))) {
                (Some(true), Some(false)) => {
                    t_high = Some(t);
                    break;
                }
                (_, now) => {
                    if now == Some(true) {
                        t_low = t;
                    }
                    prev_above = now;
                }
            }
        }
        let mut t_high = t_high?;

        for _ in 0..BISECT_STEPS {
            let t_mid = (t_low + t_high) * 0.5;
            if self.above(ray.get_point(t_mid)).unwrap_or(false) {
                t_low = t_mid;
            } else {
                t_high = t_mid;
            }
        }

        let p = ray.get_point(t_high);
        let y = self.sample_height(p.x, p.z)?;
        let normal = self.normal_at(p.x, p.z)?;
        Some(SurfaceHit { point: Vec3::new(p.x, y, p.z), normal, layer: self.layer })
    }
}
