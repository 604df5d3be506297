// src/summon/systems.rs
use bevy::prelude::*;
use std::time::Duration;

use super::components::Summoner;
use super::plugin::{ClearSummoned, ForceSummon, ReleaseOccupant, SpawnRequested, SummonQueue, SummonTask};
use crate::placement::core::{CandidatePose, OccupantTags, PlacementWorld};
use crate::world::occupancy::OccupancyMap;
use crate::world::surface::ActiveSurface;

/// Zero intervals would reschedule into the same frame forever.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

pub fn schedule_new_summoners(
    time: Res<Time>,
    mut queue: ResMut<SummonQueue>,
    added: Query<(Entity, &Summoner), Added<Summoner>>,
) {
    for (entity, summoner) in &added {
        let at = time.elapsed() + summoner.interval.max(MIN_INTERVAL);
        queue.0.schedule(at, SummonTask { summoner: entity, forced_point: None });
        debug!("Summon: {:?} first due at {:?}", entity, at);
    }
}

pub fn queue_forced_summons(
    time: Res<Time>,
    mut evr: EventReader<ForceSummon>,
    summoners: Query<&Summoner>,
    mut queue: ResMut<SummonQueue>,
) {
    for ev in evr.read() {
        let Ok(summoner) = summoners.get(ev.summoner) else {
            warn!("Summon: force on {:?} which has no Summoner", ev.summoner);
            continue;
        };
        if ev.point >= summoner.points.len() {
            warn!(
                "Summon: point {} out of range ({} points) on {:?}",
                ev.point,
                summoner.points.len(),
                ev.summoner
            );
            continue;
        }
        queue.0.schedule(time.elapsed(), SummonTask { summoner: ev.summoner, forced_point: Some(ev.point) });
    }
}

pub fn release_occupants(
    mut evr: EventReader<ReleaseOccupant>,
    mut summoners: Query<&mut Summoner>,
    mut occupancy: ResMut<OccupancyMap>,
) {
    for ev in evr.read() {
        if let Ok(mut summoner) = summoners.get_mut(ev.summoner) {
            summoner.release(ev.occupant);
        }
        if occupancy.remove(ev.occupant).is_none() {
            debug!("Summon: occupant {:?} already gone", ev.occupant);
        }
    }
}

pub fn clear_summoned(
    mut evr: EventReader<ClearSummoned>,
    mut summoners: Query<&mut Summoner>,
    mut occupancy: ResMut<OccupancyMap>,
) {
    for ev in evr.read() {
        let Ok(mut summoner) = summoners.get_mut(ev.summoner) else {
            warn!("Summon: clear on {:?} which has no Summoner", ev.summoner);
            continue;
        };
        let ids = summoner.clear();
        for id in &ids {
            occupancy.remove(*id);
        }
        info!("Summon: cleared {} units from {:?}", ids.len(), ev.summoner);
    }
}

/// Pop every due task, search for a slot, register the occupant and announce it.
pub fn run_due_summons(
    time: Res<Time>,
    mut queue: ResMut<SummonQueue>,
    mut summoners: Query<&mut Summoner>,
    surface: Option<Res<ActiveSurface>>,
    mut occupancy: ResMut<OccupancyMap>,
    mut writer: EventWriter<SpawnRequested>,
) {
    let now = time.elapsed();
    while let Some((_, task)) = queue.0.pop_due(now) {
        let Ok(mut summoner) = summoners.get_mut(task.summoner) else {
            debug!("Summon: dropping task for despawned {:?}", task.summoner);
            continue;
        };
        if task.forced_point.is_none() {
            queue.0.schedule(now + summoner.interval.max(MIN_INTERVAL), task);
        }

        let Some(surface) = surface.as_ref() else {
            warn!("Summon: no active surface; skipping summon for {:?}", task.summoner);
            continue;
        };
        let Some(point) = task.forced_point.or_else(|| summoner.best_point()) else {
            continue;
        };

        let world = PlacementWorld { surface: &*surface.0, occupancy: &*occupancy };
        let Some(report) = summoner.search_from(point, world) else { continue };
        let position = report.outcome.position();

        let bounds = summoner.footprint.world_bounds(&CandidatePose::at(position));
        let occupant = occupancy.insert(position, bounds, OccupantTags::SUMMONED);
        summoner.record(occupant, point);

        if !report.outcome.is_degraded() {
            info!(
                "Summon: {:?} point {} -> {:?} after {} checks",
                task.summoner, point, position, report.evaluations
            );
        }
        writer.write(SpawnRequested {
            summoner: task.summoner,
            point,
            position,
            degraded: report.outcome.is_degraded(),
            occupant,
        });
    }
}
