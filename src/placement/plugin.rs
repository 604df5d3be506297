//! Placement plugin wiring (glue).
//! - Catalog asset/loader + handle
//! - PlacementSettings -> PreviewController
//! - Occupancy map, pointer ray, preview events
//! - Per-frame systems: input -> rotate/cycle -> advance -> commit/cancel -> flush -> register

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::catalog::{Catalog, CatalogAssetPlugin};
use super::preview::{PreviewConfig, PreviewController, PreviewEvent};
use super::systems::{
    advance_preview, commit_or_cancel, cursor_pointer_ray, enter_placement_mode,
    flush_preview_events, register_commits, rotate_and_cycle,
};
use super::validator::ValidityPolicy;
use crate::actions::ActionState;
use crate::input::input_mapping_system;
use crate::world::occupancy::OccupancyMap;

/// Where the catalog lives and how the preview behaves.
#[derive(Resource, Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementSettings {
    pub catalog_path: String,
    /// Entry selected when the mode is entered.
    pub start_index: usize,
    pub policy: ValidityPolicy,
    pub preview: PreviewConfig,
    /// Insert committed placements into the `OccupancyMap`.
    pub register_commits: bool,
    /// Build the pointer ray from the window cursor. When false, something
    /// else writes `PointerRay`.
    pub pointer_from_cursor: bool,
}

impl Default for PlacementSettings {
    fn default() -> Self {
        Self {
            catalog_path: "catalog/buildings.catalog.ron".to_string(),
            start_index: 0,
            policy: ValidityPolicy::strict(),
            preview: PreviewConfig::default(),
            register_commits: true,
            pointer_from_cursor: true,
        }
    }
}

/// Handle to the loaded Catalog asset.
#[derive(Resource, Default)]
pub struct CatalogHandle(pub Handle<Catalog>);

/// This frame's pointer ray into the world.
#[derive(Resource, Clone, Copy, Debug, PartialEq)]
pub enum PointerRay {
    Ray(Ray3d),
    /// Cursor is outside the window; keep the last pose.
    Idle,
    /// A collaborator needed to build the ray does not exist.
    Missing(&'static str),
}

impl Default for PointerRay {
    fn default() -> Self { PointerRay::Idle }
}

/// Whose position the distance constraint is measured from.
#[derive(Component, Debug, Default)]
pub struct PlacementAgent;

#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlacementSet;

pub struct PlacementPlugin;
impl Plugin for PlacementPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(CatalogAssetPlugin)
            .init_resource::<PlacementSettings>()
            .init_resource::<CatalogHandle>()
            .init_resource::<ActionState>()
            .init_resource::<OccupancyMap>()
            .init_resource::<PointerRay>()
            .init_resource::<PreviewController>()
            .add_event::<PreviewEvent>()
            .add_systems(Startup, (init_controller_from_settings, load_catalog))
            .add_systems(Update, monitor_catalog_ready)
            .add_systems(
                Update,
                (
                    input_mapping_system,
                    cursor_pointer_ray.run_if(|s: Res<PlacementSettings>| s.pointer_from_cursor),
                    enter_placement_mode,
                    rotate_and_cycle,
                    advance_preview,
                    commit_or_cancel,
                    flush_preview_events,
                    register_commits,
                )
                    .chain()
                    .in_set(PlacementSet),
            );
    }
}

/// Startup: build the controller from PlacementSettings.
fn init_controller_from_settings(mut commands: Commands, settings: Res<PlacementSettings>) {
    commands.insert_resource(PreviewController::new(settings.preview, settings.policy));
    debug!(
        "Placement: controller ready (strict={}, register_commits={})",
        settings.policy.is_strict(),
        settings.register_commits
    );
}

/// Startup: request loading the catalog, store handle.
fn load_catalog(
    mut handle_res: ResMut<CatalogHandle>,
    settings: Res<PlacementSettings>,
    assets: Res<AssetServer>,
) {
    if handle_res.0.is_strong() { return; }
    handle_res.0 = assets.load(settings.catalog_path.as_str());
    info!("Placement: loading catalog from '{}'", settings.catalog_path);
}

/// Update: log once when the catalog becomes available.
fn monitor_catalog_ready(
    handle_res: Res<CatalogHandle>,
    catalogs: Res<Assets<Catalog>>,
    mut logged: Local<bool>,
) {
    if *logged { return; }
    if let Some(catalog) = catalogs.get(&handle_res.0) {
        *logged = true;
        info!("Placement: catalog ready ({} entries)", catalog.len());
    }
}
