//! Headless App tests: the placement and summon plugins driven frame by frame.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Standard in tests

use bevy::input::mouse::MouseWheel;
use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use std::time::Duration;

use ghostplace::placement::catalog::{Catalog, CatalogEntry};
use ghostplace::placement::core::{Footprint, FootprintVolume, OccupantTags};
use ghostplace::placement::plugin::{CatalogHandle, PlacementAgent, PlacementSettings, PointerRay};
use ghostplace::placement::preview::{ExitReason, PreviewController, PreviewEvent, PreviewState};
use ghostplace::placement::search::SpawnSearchParams;
use ghostplace::placement::PlacementPlugin;
use ghostplace::summon::{ClearSummoned, ForceSummon, ReleaseOccupant, SpawnRequested, SummonPlugin, Summoner};
use ghostplace::world::occupancy::OccupancyMap;
use ghostplace::world::surface::{ActiveSurface, FlatGround};

/// Events seen by the test, in arrival order.
#[derive(Resource, Default)]
struct Seen {
    preview: Vec<PreviewEvent>,
    spawns: Vec<SpawnRequested>,
}

fn collect(mut seen: ResMut<Seen>, mut preview: EventReader<PreviewEvent>, mut spawns: EventReader<SpawnRequested>) {
    seen.preview.extend(preview.read().cloned());
    seen.spawns.extend(spawns.read().copied());
}

/// Create a minimal Bevy app for testing (no window, no rendering).
fn test_app() -> App {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins);
    app.add_plugins(bevy::asset::AssetPlugin::default());
    // Input resources without the input plugin, so presses survive until Update.
    app.init_resource::<ButtonInput<KeyCode>>();
    app.init_resource::<ButtonInput<MouseButton>>();
    app.add_event::<MouseWheel>();
    app.insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_millis(100)));
    app.insert_resource(ActiveSurface(Box::new(FlatGround::default())));
    app.add_plugins((PlacementPlugin, SummonPlugin));
    app.insert_resource(PlacementSettings { pointer_from_cursor: false, ..default() });
    app.init_resource::<Seen>();
    app.add_systems(Last, collect);
    app
}

fn install_catalog(app: &mut App) {
    let hut = CatalogEntry {
        name: "hut".into(),
        footprint: Footprint::single(FootprintVolume::cuboid(Vec3::Y, Vec3::ONE)),
        tags: OccupantTags::STRUCTURE,
    };
    let shed = CatalogEntry { name: "shed".into(), ..hut.clone() };
    let catalog = Catalog::from_entries(vec![hut, shed]).unwrap();
    let handle = app.world_mut().resource_mut::<Assets<Catalog>>().add(catalog);
    app.insert_resource(CatalogHandle(handle));
}

fn tap_key(app: &mut App, key: KeyCode) {
    app.world_mut().resource_mut::<ButtonInput<KeyCode>>().press(key);
    app.update();
    let mut keys = app.world_mut().resource_mut::<ButtonInput<KeyCode>>();
    keys.release(key);
    keys.clear();
}

fn click(app: &mut App) {
    app.world_mut().resource_mut::<ButtonInput<MouseButton>>().press(MouseButton::Left);
    app.update();
    let mut buttons = app.world_mut().resource_mut::<ButtonInput<MouseButton>>();
    buttons.release(MouseButton::Left);
    buttons.clear();
}

fn point_at(app: &mut App, x: f32, z: f32) {
    app.insert_resource(PointerRay::Ray(Ray3d::new(Vec3::new(x, 20.0, z), Dir3::NEG_Y)));
}

fn spawn_agent(app: &mut App) {
    app.world_mut().spawn((Transform::IDENTITY, GlobalTransform::IDENTITY, PlacementAgent));
}

#[test]
fn enter_track_commit_registers_an_occupant() {
    let mut app = test_app();
    install_catalog(&mut app);
    spawn_agent(&mut app);
    app.update();

    tap_key(&mut app, KeyCode::KeyB);
    assert!(app.world().resource::<PreviewController>().is_active());

    point_at(&mut app, 5.0, 0.0);
    app.update();
    {
        let controller = app.world().resource::<PreviewController>();
        assert_eq!(controller.state(), PreviewState::Tracking);
        assert!(controller.session().unwrap().last_validity().is_valid());
    }

    click(&mut app);
    app.update();

    assert!(!app.world().resource::<PreviewController>().is_active());
    let map = app.world().resource::<OccupancyMap>();
    assert_eq!(map.len(), 1);
    assert!(map.iter().all(|o| (o.position - Vec3::new(5.0, 0.0, 0.0)).length() < 1e-4));

    let seen = &app.world().resource::<Seen>().preview;
    assert!(matches!(seen.first(), Some(PreviewEvent::GhostCreated { .. })));
    assert!(seen.iter().any(|e| matches!(e, PreviewEvent::PlacementCommitted(_))));
    assert_eq!(seen.last(), Some(&PreviewEvent::ModeExited { reason: ExitReason::Committed }));
}

#[test]
fn escape_cancels_without_building() {
    let mut app = test_app();
    install_catalog(&mut app);
    spawn_agent(&mut app);
    app.update();

    tap_key(&mut app, KeyCode::KeyB);
    point_at(&mut app, 5.0, 0.0);
    app.update();
    tap_key(&mut app, KeyCode::Escape);
    app.update();

    assert!(!app.world().resource::<PreviewController>().is_active());
    assert!(app.world().resource::<OccupancyMap>().is_empty());
    let seen = &app.world().resource::<Seen>().preview;
    assert!(!seen.iter().any(|e| matches!(e, PreviewEvent::PlacementCommitted(_))));
    assert_eq!(seen.last(), Some(&PreviewEvent::ModeExited { reason: ExitReason::Cancelled }));
}

#[test]
fn tab_cycles_to_the_next_entry() {
    let mut app = test_app();
    install_catalog(&mut app);
    spawn_agent(&mut app);
    app.update();

    tap_key(&mut app, KeyCode::KeyB);
    tap_key(&mut app, KeyCode::Tab);
    let controller = app.world().resource::<PreviewController>();
    assert_eq!(controller.session().unwrap().catalog_index(), 1);
}

#[test]
fn out_of_range_digit_keeps_the_session() {
    let mut app = test_app();
    install_catalog(&mut app);
    spawn_agent(&mut app);
    app.update();

    tap_key(&mut app, KeyCode::KeyB);
    tap_key(&mut app, KeyCode::Digit9);
    let controller = app.world().resource::<PreviewController>();
    assert!(controller.is_active());
    assert_eq!(controller.session().unwrap().catalog_index(), 0);

    tap_key(&mut app, KeyCode::Digit2);
    let controller = app.world().resource::<PreviewController>();
    assert_eq!(controller.session().unwrap().catalog_index(), 1);
}

#[test]
fn missing_agent_ends_the_session() {
    let mut app = test_app();
    install_catalog(&mut app);
    app.update();

    tap_key(&mut app, KeyCode::KeyB);
    point_at(&mut app, 5.0, 0.0);
    app.update();
    app.update();

    assert!(!app.world().resource::<PreviewController>().is_active());
    let seen = &app.world().resource::<Seen>().preview;
    assert_eq!(seen.last(), Some(&PreviewEvent::ModeExited { reason: ExitReason::Failed }));
}

#[test]
fn summoner_fills_points_and_keeps_spacing() {
    let mut app = test_app();
    let summoner = app
        .world_mut()
        .spawn(
            Summoner::new(vec![Vec3::ZERO, Vec3::new(30.0, 0.0, 0.0)], Duration::from_millis(300), 5)
                .with_capacity(3)
                .with_search(SpawnSearchParams { base_spacing: 2.0, height_offset: 0.0, ..default() }),
        )
        .id();

    for _ in 0..40 {
        app.update();
    }
    app.update();

    let spawns = app.world().resource::<Seen>().spawns.clone();
    assert!(spawns.len() >= 3, "only {} spawns", spawns.len());
    assert!(spawns.iter().all(|s| s.summoner == summoner));
    assert_eq!(app.world().resource::<OccupancyMap>().len(), spawns.len());

    let placed: Vec<_> = spawns.iter().filter(|s| !s.degraded).map(|s| s.position).collect();
    for (i, a) in placed.iter().enumerate() {
        for b in &placed[i + 1..] {
            assert!(Vec2::new(a.x - b.x, a.z - b.z).length() >= 2.0 - 1e-4);
        }
    }
}

#[test]
fn forced_summon_and_release() {
    let mut app = test_app();
    let summoner = app
        .world_mut()
        .spawn(Summoner::new(vec![Vec3::ZERO, Vec3::new(30.0, 0.0, 0.0)], Duration::from_secs(3600), 5))
        .id();
    app.update();

    app.world_mut().send_event(ForceSummon { summoner, point: 1 });
    app.update();
    app.update();

    let spawns = app.world().resource::<Seen>().spawns.clone();
    assert_eq!(spawns.len(), 1);
    assert_eq!(spawns[0].point, 1);
    assert_eq!(spawns[0].position, Vec3::new(30.0, 0.5, 0.0));
    assert_eq!(app.world().entity(summoner).get::<Summoner>().unwrap().count(1), 1);

    app.world_mut().send_event(ReleaseOccupant { summoner, occupant: spawns[0].occupant });
    app.update();
    assert!(app.world().resource::<OccupancyMap>().is_empty());
    assert_eq!(app.world().entity(summoner).get::<Summoner>().unwrap().count(1), 0);
}

#[test]
fn clear_frees_every_summoned_slot() {
    let mut app = test_app();
    let summoner = app
        .world_mut()
        .spawn(Summoner::new(vec![Vec3::ZERO, Vec3::new(30.0, 0.0, 0.0)], Duration::from_secs(3600), 5))
        .id();
    // A structure the clear must leave alone.
    app.world_mut().resource_mut::<OccupancyMap>().insert(
        Vec3::new(-20.0, 0.0, 0.0),
        ghostplace::placement::core::Aabb::from_center_half(Vec3::new(-20.0, 1.0, 0.0), Vec3::ONE),
        OccupantTags::STRUCTURE,
    );
    app.update();

    app.world_mut().send_event(ForceSummon { summoner, point: 0 });
    app.world_mut().send_event(ForceSummon { summoner, point: 1 });
    app.update();
    assert_eq!(app.world().resource::<OccupancyMap>().len(), 3);

    app.world_mut().send_event(ClearSummoned { summoner });
    app.update();

    let map = app.world().resource::<OccupancyMap>();
    assert_eq!(map.len(), 1);
    assert!(map.iter().all(|o| o.tags.contains(OccupantTags::STRUCTURE)));
    let s = app.world().entity(summoner).get::<Summoner>().unwrap();
    assert_eq!((s.total(), s.count(0), s.count(1)), (0, 0, 0));
}
