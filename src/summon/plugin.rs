// src/summon/plugin.rs
use bevy::prelude::*;

use super::schedule::TaskQueue;
use super::systems::{
    clear_summoned, queue_forced_summons, release_occupants, run_due_summons, schedule_new_summoners,
};
use crate::placement::core::OccupantId;
use crate::world::occupancy::OccupancyMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SummonTask {
    pub summoner: Entity,
    /// `Some` for one-off forced summons; those are not rescheduled.
    pub forced_point: Option<usize>,
}

#[derive(Resource, Default)]
pub struct SummonQueue(pub TaskQueue<SummonTask>);

/// A unit should appear at `position`; `occupant` is already registered.
#[derive(Event, Clone, Copy, Debug, PartialEq)]
pub struct SpawnRequested {
    pub summoner: Entity,
    pub point: usize,
    pub position: Vec3,
    /// Search failed; `position` was never validated.
    pub degraded: bool,
    pub occupant: OccupantId,
}

/// Summon once at a specific point, now.
#[derive(Event, Clone, Copy, Debug)]
pub struct ForceSummon {
    pub summoner: Entity,
    pub point: usize,
}

/// A summoned unit is gone; free its slot and its occupancy.
#[derive(Event, Clone, Copy, Debug)]
pub struct ReleaseOccupant {
    pub summoner: Entity,
    pub occupant: OccupantId,
}

/// Drop every unit a summoner has produced, freeing their occupancy.
#[derive(Event, Clone, Copy, Debug)]
pub struct ClearSummoned {
    pub summoner: Entity,
}

pub struct SummonPlugin;
impl Plugin for SummonPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SummonQueue>()
            .init_resource::<OccupancyMap>()
            .add_event::<SpawnRequested>()
            .add_event::<ForceSummon>()
            .add_event::<ReleaseOccupant>()
            .add_event::<ClearSummoned>()
            .add_systems(
                Update,
                (
                    schedule_new_summoners,
                    queue_forced_summons,
                    release_occupants,
                    clear_summoned,
                    run_due_summons,
                )
                    .chain(),
            );
    }
}
