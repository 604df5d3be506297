// src/world/occupancy.rs
use bevy::prelude::*;
use std::collections::HashMap;

use crate::placement::core::{
    horizontal_distance, Aabb, OccupancyIndex, Occupant, OccupantId, OccupantTags, OrientedBox,
};

/// Occupants covering more cells than this skip the grid and are checked on every query.
const MAX_CELLS_PER_OCCUPANT: i64 = 4096;

type CellKey = (i64, i64);

/// Inclusive cell range of an area.
#[derive(Clone, Copy)]
struct CellRange {
    x0: i64,
    z0: i64,
    x1: i64,
    z1: i64,
}

impl CellRange {
    fn count(&self) -> i64 {
        let w = self.x1.saturating_sub(self.x0).saturating_add(1).max(0);
        let d = self.z1.saturating_sub(self.z0).saturating_add(1).max(0);
        w.saturating_mul(d)
    }

    fn contains(&self, (cx, cz): CellKey) -> bool {
        cx >= self.x0 && cx <= self.x1 && cz >= self.z0 && cz <= self.z1
    }

    fn keys(self) -> impl Iterator<Item = CellKey> {
        (self.z0..=self.z1).flat_map(move |cz| (self.x0..=self.x1).map(move |cx| (cx, cz)))
    }
}

/// Runtime index of placed occupants, bucketed by XZ grid cell.
#[derive(Resource)]
pub struct OccupancyMap {
    cell_size: f32,
    occupants: HashMap<OccupantId, Occupant>,
    by_cell: HashMap<CellKey, Vec<OccupantId>>,
    /// Too large (or non-finite) for the grid.
    oversized: Vec<OccupantId>,
    next_id: u64,
}

impl Default for OccupancyMap {
    fn default() -> Self { Self::new(8.0) }
}

impl OccupancyMap {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(0.01),
            occupants: HashMap::new(),
            by_cell: HashMap::new(),
            oversized: Vec::new(),
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize { self.occupants.len() }

    pub fn is_empty(&self) -> bool { self.occupants.is_empty() }

    pub fn get(&self, id: OccupantId) -> Option<&Occupant> { self.occupants.get(&id) }

    pub fn iter(&self) -> impl Iterator<Item = &Occupant> { self.occupants.values() }

    /// Register a new occupant and return its id.
    pub fn insert(&mut self, position: Vec3, bounds: Aabb, tags: OccupantTags) -> OccupantId {
        let id = OccupantId(self.next_id);
        self.next_id += 1;
        let occupant = Occupant { id, position, bounds, tags };
        match self.indexable_range(&Self::index_extent(&occupant)) {
            Some(range) => {
                for key in range.keys() {
                    self.by_cell.entry(key).or_default().push(id);
                }
            }
            None => self.oversized.push(id),
        }
        self.occupants.insert(id, occupant);
        id
    }

    /// Remove from bookkeeping. Returns the occupant if it was present.
    pub fn remove(&mut self, id: OccupantId) -> Option<Occupant> {
        let occupant = self.occupants.remove(&id)?;
        let Some(range) = self.indexable_range(&Self::index_extent(&occupant)) else {
            self.oversized.retain(|&e| e != id);
            return Some(occupant);
        };
        for key in range.keys() {
            if let Some(v) = self.by_cell.get_mut(&key) {
                if let Some(i) = v.iter().position(|&e| e == id) {
                    v.swap_remove(i);
                }
                if v.is_empty() {
                    self.by_cell.remove(&key);
                }
            }
        }
        Some(occupant)
    }

    pub fn clear(&mut self) {
        self.occupants.clear();
        self.by_cell.clear();
        self.oversized.clear();
    }

    /// Bounds plus origin, so radius queries find occupants whose origin sits outside their box.
    fn index_extent(occupant: &Occupant) -> Aabb {
        occupant.bounds.union(&Aabb { min: occupant.position, max: occupant.position })
    }

    /// Saturating float-to-cell conversion; NaN lands in cell 0.
    #[inline]
    fn cell_key(&self, x: f32, z: f32) -> CellKey {
        ((x / self.cell_size).floor() as i64, (z / self.cell_size).floor() as i64)
    }

    fn cell_range(&self, area: &Aabb) -> CellRange {
        let (x0, z0) = self.cell_key(area.min.x, area.min.z);
        let (x1, z1) = self.cell_key(area.max.x, area.max.z);
        CellRange { x0, z0, x1, z1 }
    }

    /// Grid cells for an occupant, or `None` when it belongs on the oversized list.
    fn indexable_range(&self, extent: &Aabb) -> Option<CellRange> {
        let finite = extent.min.is_finite() && extent.max.is_finite();
        let range = self.cell_range(extent);
        (finite && range.count() <= MAX_CELLS_PER_OCCUPANT).then_some(range)
    }

    /// Unique occupants in the cells overlapping `area`, sorted by id.
    fn candidates(&self, area: &Aabb, exclude: OccupantTags) -> Vec<&Occupant> {
        let mut ids = self.oversized.clone();
        if area.min.is_finite() && area.max.is_finite() {
            let range = self.cell_range(area);
            if range.count() > self.by_cell.len() as i64 {
                // Fewer occupied cells than covered ones: walk the occupied set.
                ids.extend(
                    self.by_cell
                        .iter()
                        .filter(|(key, _)| range.contains(**key))
                        .flat_map(|(_, v)| v.iter().copied()),
                );
            } else {
                ids.extend(range.keys().filter_map(|key| self.by_cell.get(&key)).flatten().copied());
            }
        } else {
            ids.extend(self.occupants.keys().copied());
        }
        ids.sort_unstable();
        ids.dedup();
        ids.into_iter()
            .filter_map(|id| self.occupants.get(&id))
            .filter(|o| !o.tags.any(exclude))
            .collect()
    }
}

impl OccupancyIndex for OccupancyMap {
    fn query_box(&self, volume: &OrientedBox, exclude: OccupantTags) -> Vec<&Occupant> {
        self.candidates(&volume.world_aabb(), exclude)
            .into_iter()
            .filter(|o| volume.intersects_aabb(&o.bounds))
            .collect()
    }

    fn query_radius(&self, point: Vec3, radius: f32, exclude: OccupantTags) -> Vec<&Occupant> {
        if radius <= 0.0 {
            return Vec::new();
        }
        let area = Aabb::from_center_half(point, Vec3::new(radius, 0.0, radius));
        self.candidates(&area, exclude)
            .into_iter()
            .filter(|o| horizontal_distance(o.position, point) < radius)
            .collect()
    }
}
