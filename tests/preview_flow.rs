//! End-to-end placement flows against the shipped catalog, driven through the
//! library API without an App.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Standard in tests

use bevy::prelude::*;
use std::sync::Arc;

use ghostplace::placement::catalog::Catalog;
use ghostplace::placement::core::{CandidatePose, OccupantTags, PlacementWorld};
use ghostplace::placement::preview::{ExitReason, PreviewController, PreviewEvent, RotateInput};
use ghostplace::placement::validator::{validate, ReasonCode, ValidityPolicy};
use ghostplace::world::occupancy::OccupancyMap;
use ghostplace::world::surface::FlatGround;

const SHIPPED: &str = include_str!("../assets/catalog/buildings.catalog.ron");

fn catalog() -> Arc<Catalog> {
    Arc::new(Catalog::from_ron_bytes(SHIPPED.as_bytes()).expect("shipped catalog parses"))
}

/// Straight down onto (x, z).
fn aim(x: f32, z: f32) -> Ray3d {
    Ray3d::new(Vec3::new(x, 30.0, z), Dir3::NEG_Y)
}

fn commit_and_register(controller: &mut PreviewController, map: &mut OccupancyMap) -> bool {
    match controller.commit() {
        Some(c) => {
            map.insert(c.pose.position, c.bounds, c.tags);
            true
        }
        None => false,
    }
}

#[test]
fn shipped_catalog_has_a_tower() {
    let cat = catalog();
    let tower = cat.index_of("guard_tower").unwrap();
    assert!(cat.get(tower).unwrap().tags.contains(OccupantTags::TOWER));
    assert!(cat.len() >= 2);
}

#[test]
fn second_building_cannot_land_on_the_first() {
    let cat = catalog();
    let ground = FlatGround::default();
    let mut map = OccupancyMap::default();
    let mut controller = PreviewController::default();
    let agent = Vec3::ZERO;

    controller.enter_mode(cat.clone(), cat.index_of("hut").unwrap()).unwrap();
    controller.advance(aim(6.0, 0.0), agent, PlacementWorld { surface: &ground, occupancy: &map });
    assert!(commit_and_register(&mut controller, &mut map));
    assert_eq!(map.len(), 1);
    assert!(!controller.is_active());

    controller.enter_mode(cat.clone(), cat.index_of("hut").unwrap()).unwrap();
    let r = controller
        .advance(aim(6.5, 0.5), agent, PlacementWorld { surface: &ground, occupancy: &map })
        .cloned()
        .unwrap();
    assert!(r.has(ReasonCode::Overlap));
    assert!(!commit_and_register(&mut controller, &mut map));
    assert!(controller.is_active());

    controller.advance(aim(-6.0, 0.0), agent, PlacementWorld { surface: &ground, occupancy: &map });
    assert!(commit_and_register(&mut controller, &mut map));
    assert_eq!(map.len(), 2);
}

#[test]
fn towers_keep_new_buildings_at_a_distance() {
    let cat = catalog();
    let ground = FlatGround::default();
    let mut map = OccupancyMap::default();
    let mut controller = PreviewController::default();
    let agent = Vec3::ZERO;

    controller.enter_mode(cat.clone(), cat.index_of("guard_tower").unwrap()).unwrap();
    controller.advance(aim(5.0, 0.0), agent, PlacementWorld { surface: &ground, occupancy: &map });
    assert!(commit_and_register(&mut controller, &mut map));

    controller.enter_mode(cat.clone(), cat.index_of("wall").unwrap()).unwrap();
    let near = controller
        .advance(aim(-3.0, 0.0), agent, PlacementWorld { surface: &ground, occupancy: &map })
        .cloned()
        .unwrap();
    assert_eq!(near.reasons(), &[ReasonCode::InsufficientSeparation]);

    let far = controller
        .advance(aim(-6.0, 0.0), agent, PlacementWorld { surface: &ground, occupancy: &map })
        .cloned()
        .unwrap();
    assert!(far.is_valid());
}

#[test]
fn tolerant_policy_accepts_what_strict_refuses() {
    let cat = catalog();
    let ground = FlatGround::default();
    let mut map = OccupancyMap::default();
    let wall = &cat.get(cat.index_of("wall").unwrap()).unwrap().footprint;

    // A thin post barely clipping the wall's end.
    let post = Vec3::new(7.9, 1.0, 0.0);
    map.insert(
        post,
        ghostplace::placement::core::Aabb::from_center_half(post, Vec3::new(0.1, 1.0, 0.1)),
        OccupantTags::STRUCTURE,
    );
    let world = PlacementWorld { surface: &ground, occupancy: &map };
    let pose = CandidatePose::at(Vec3::new(6.0, 0.0, 0.0));
    let lenient = ValidityPolicy { min_separation_from_occupants: 0.0, ..ValidityPolicy::tolerant() };
    let strict = ValidityPolicy { min_separation_from_occupants: 0.0, ..ValidityPolicy::strict() };

    assert!(validate(&pose, wall, Vec3::ZERO, &strict, world).has(ReasonCode::Overlap));
    assert!(validate(&pose, wall, Vec3::ZERO, &lenient, world).is_valid());
}

#[test]
fn rotated_wall_clears_a_neighbour() {
    let cat = catalog();
    let ground = FlatGround::default();
    let mut map = OccupancyMap::default();
    let mut controller = PreviewController::new(
        Default::default(),
        ValidityPolicy { min_separation_from_occupants: 0.0, ..ValidityPolicy::strict() },
    );
    let agent = Vec3::ZERO;

    // Post 1.5 units beside the wall's centre along X.
    let post = Vec3::new(7.5, 1.0, 0.0);
    map.insert(
        post,
        ghostplace::placement::core::Aabb::from_center_half(post, Vec3::splat(0.25)),
        OccupantTags::STRUCTURE,
    );

    controller.enter_mode(cat.clone(), cat.index_of("wall").unwrap()).unwrap();
    let r = controller
        .advance(aim(6.0, 0.0), agent, PlacementWorld { surface: &ground, occupancy: &map })
        .cloned()
        .unwrap();
    assert!(r.has(ReasonCode::Overlap));

    controller.rotate(RotateInput::Step(1));
    assert!(controller.commit().is_none(), "stale pose must not commit");
    let r = controller
        .advance(aim(6.0, 0.0), agent, PlacementWorld { surface: &ground, occupancy: &map })
        .cloned()
        .unwrap();
    assert!(r.is_valid());

    controller.drain_events();
    let committed = controller.commit().unwrap();
    let quarter = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
    assert!(committed.pose.rotation.angle_between(quarter) < 1e-3);
    assert_eq!(
        controller.drain_events().last(),
        Some(&PreviewEvent::ModeExited { reason: ExitReason::Committed })
    );
}
