use bevy::prelude::*;

use ghostplace::input::camera_controller;
use ghostplace::placement::plugin::PlacementSet;
use ghostplace::placement::PlacementPlugin;
use ghostplace::setup::{setup, spawn_committed_structures, spawn_summoned_units};
use ghostplace::summon::SummonPlugin;

fn main() {
    App::new()
        .add_plugins(DefaultPlugins)
        // domain plugins
        .add_plugins(PlacementPlugin) // catalog, preview controller, occupancy
        .add_plugins(SummonPlugin)    // timed guard summoning
        // camera, light, ground, builder, one summoner
        .add_systems(Startup, setup)
        .add_systems(Update, camera_controller.after(PlacementSet))
        .add_systems(Update, (spawn_committed_structures, spawn_summoned_units))
        .run();
}
