// src/summon/components.rs
use bevy::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::time::Duration;

use crate::placement::core::{Footprint, OccupantId, PlacementWorld};
use crate::placement::search::{find_spawn_position, SpawnReport, SpawnSearchParams};
use crate::placement::validator::ValidityPolicy;

/// Periodically summons units around a set of world-space points.
#[derive(Component, Debug)]
pub struct Summoner {
    pub points: Vec<Vec3>,
    pub interval: Duration,
    /// Units per point before it counts as full. 0 = unlimited.
    pub capacity: u32,
    pub search: SpawnSearchParams,
    /// Space each summoned unit occupies. Empty = point-like.
    pub footprint: Footprint,
    rng: ChaCha8Rng,
    counts: Vec<u32>,
    /// Live summoned occupant -> point it came from.
    members: HashMap<OccupantId, usize>,
}

impl Summoner {
    pub fn new(points: Vec<Vec3>, interval: Duration, seed: u64) -> Self {
        let counts = vec![0; points.len()];
        Self {
            points,
            interval,
            capacity: 0,
            search: SpawnSearchParams::default(),
            footprint: Footprint::default(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            counts,
            members: HashMap::new(),
        }
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_search(mut self, search: SpawnSearchParams) -> Self {
        self.search = search;
        self
    }

    pub fn with_footprint(mut self, footprint: Footprint) -> Self {
        self.footprint = footprint;
        self
    }

    pub fn count(&self, point: usize) -> u32 {
        self.counts.get(point).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize { self.members.len() }

    /// Run the ring search around `points[point]`.
    pub fn search_from(&mut self, point: usize, world: PlacementWorld<'_>) -> Option<SpawnReport> {
        let anchor = *self.points.get(point)?;
        let policy = self.policy();
        Some(find_spawn_position(anchor, &self.footprint, &self.search, &policy, world, &mut self.rng))
    }

    /// Random point with room left; when all are full, the least-populated (first on ties).
    pub fn best_point(&mut self) -> Option<usize> {
        let open: Vec<usize> = (0..self.points.len())
            .filter(|&i| self.capacity == 0 || self.counts[i] < self.capacity)
            .collect();
        if !open.is_empty() {
            return Some(open[self.rng.random_range(0..open.len())]);
        }
        (0..self.points.len()).min_by_key(|&i| self.counts[i])
    }

    /// Keep summoned units `search.base_spacing` apart and clear of structures.
    pub fn policy(&self) -> ValidityPolicy {
        ValidityPolicy {
            min_separation_from_occupants: self.search.base_spacing,
            tagged_separation: None,
            ground_layers: self.search.ground_layers,
            ..ValidityPolicy::strict()
        }
    }

    pub fn record(&mut self, occupant: OccupantId, point: usize) {
        if let Some(c) = self.counts.get_mut(point) {
            *c += 1;
            self.members.insert(occupant, point);
        }
    }

    /// Forget a summoned occupant. Returns the point it belonged to.
    pub fn release(&mut self, occupant: OccupantId) -> Option<usize> {
        let point = self.members.remove(&occupant)?;
        if let Some(c) = self.counts.get_mut(point) {
            *c = c.saturating_sub(1);
        }
        Some(point)
    }

    /// Forget every summoned unit. Returns their occupant ids, sorted, so the caller can free them.
    pub fn clear(&mut self) -> Vec<OccupantId> {
        self.counts.iter_mut().for_each(|c| *c = 0);
        let mut ids: Vec<OccupantId> = self.members.drain().map(|(id, _)| id).collect();
        ids.sort_unstable();
        ids
    }
}
