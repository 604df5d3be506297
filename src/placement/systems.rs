use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use std::sync::Arc;

use super::catalog::Catalog;
use super::core::PlacementWorld;
use super::plugin::{CatalogHandle, PlacementAgent, PlacementSettings, PointerRay};
use super::preview::{PreviewController, PreviewError, PreviewEvent, RotateInput};
use crate::actions::{ActionState, PlayerAction};
use crate::world::occupancy::OccupancyMap;
use crate::world::surface::ActiveSurface;

/// Build the pointer ray from the cursor through the 3D camera.
pub fn cursor_pointer_ray(
    windows: Query<&Window, With<PrimaryWindow>>,
    cameras: Query<(&Camera, &GlobalTransform), With<Camera3d>>,
    mut pointer: ResMut<PointerRay>,
) {
    let Ok(window) = windows.single() else {
        *pointer = PointerRay::Missing("window");
        return;
    };
    let Ok((camera, cam_transform)) = cameras.single() else {
        *pointer = PointerRay::Missing("camera");
        return;
    };
    *pointer = match window.cursor_position() {
        Some(cursor) => match camera.viewport_to_world(cam_transform, cursor) {
            Ok(ray) => PointerRay::Ray(ray),
            Err(_) => PointerRay::Idle,
        },
        None => PointerRay::Idle,
    };
}

pub fn enter_placement_mode(
    actions: Res<ActionState>,
    settings: Res<PlacementSettings>,
    handle: Res<CatalogHandle>,
    catalogs: Res<Assets<Catalog>>,
    mut controller: ResMut<PreviewController>,
) {
    if !actions.pressed(PlayerAction::EnterPlacement) {
        return;
    }
    let Some(catalog) = catalogs.get(&handle.0) else {
        warn!("Placement: catalog not loaded yet");
        return;
    };
    if let Err(e) = controller.enter_mode(Arc::new(catalog.clone()), settings.start_index) {
        warn!("Placement: cannot enter mode: {}", e);
    }
}

pub fn rotate_and_cycle(actions: Res<ActionState>, mut controller: ResMut<PreviewController>) {
    if !controller.is_active() {
        return;
    }
    if actions.pressed(PlayerAction::RotateLeft) {
        controller.rotate(RotateInput::Step(-1));
    }
    if actions.pressed(PlayerAction::RotateRight) {
        controller.rotate(RotateInput::Step(1));
    }
    if actions.scroll() != 0.0 {
        controller.rotate(RotateInput::Continuous(actions.scroll()));
    }
    if actions.pressed(PlayerAction::CyclePrefab) {
        controller.cycle_prefab(1);
    }
    if let Some(digit) = actions.selected_prefab() {
        if let Err(e) = controller.select_prefab(digit as usize) {
            debug!("Placement: select {} ignored: {}", digit, e);
        }
    }
}

/// One tick of live tracking against the active surface and occupancy.
pub fn advance_preview(
    pointer: Res<PointerRay>,
    surface: Option<Res<ActiveSurface>>,
    occupancy: Res<OccupancyMap>,
    agents: Query<&GlobalTransform, With<PlacementAgent>>,
    mut controller: ResMut<PreviewController>,
) {
    if !controller.is_active() {
        return;
    }
    let ray = match *pointer {
        PointerRay::Ray(ray) => ray,
        PointerRay::Idle => return,
        PointerRay::Missing(what) => {
            controller.fail(PreviewError::MissingCollaborator(what));
            return;
        }
    };
    let Some(surface) = surface else {
        controller.fail(PreviewError::MissingCollaborator("surface"));
        return;
    };
    let Some(reference) = agents.iter().next().map(GlobalTransform::translation) else {
        controller.fail(PreviewError::MissingCollaborator("agent"));
        return;
    };

    let world = PlacementWorld { surface: &*surface.0, occupancy: &*occupancy };
    controller.advance(ray, reference, world);
}

pub fn commit_or_cancel(actions: Res<ActionState>, mut controller: ResMut<PreviewController>) {
    if !controller.is_active() {
        return;
    }
    if actions.pressed(PlayerAction::Cancel) {
        controller.cancel();
    } else if actions.pressed(PlayerAction::Commit) {
        controller.commit();
    }
}

/// Forward the controller's outbox to Bevy events.
pub fn flush_preview_events(mut controller: ResMut<PreviewController>, mut writer: EventWriter<PreviewEvent>) {
    let events = controller.drain_events();
    if !events.is_empty() {
        writer.write_batch(events);
    }
}

/// Committed placements become occupants so later candidates see them.
pub fn register_commits(
    mut evr: EventReader<PreviewEvent>,
    settings: Res<PlacementSettings>,
    mut occupancy: ResMut<OccupancyMap>,
) {
    for ev in evr.read() {
        let PreviewEvent::PlacementCommitted(c) = ev else { continue };
        if !settings.register_commits {
            continue;
        }
        let id = occupancy.insert(c.pose.position, c.bounds, c.tags);
        info!("Placement: registered '{}' as occupant {:?}", c.footprint.0, id);
    }
}
