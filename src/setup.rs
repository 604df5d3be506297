use bevy::prelude::*;
use std::time::Duration;

use crate::input::CameraOrbit;
use crate::placement::catalog::Catalog;
use crate::placement::plugin::{CatalogHandle, PlacementAgent};
use crate::placement::preview::PreviewEvent;
use crate::placement::search::SpawnSearchParams;
use crate::summon::{SpawnRequested, Summoner};
use crate::world::surface::{ActiveSurface, FlatGround};

#[derive(Component)]
pub struct MainCamera;

/// Something built from a committed placement.
#[derive(Component)]
pub struct Structure;

/// A unit brought in by a summoner.
#[derive(Component)]
pub struct SummonedUnit;

pub fn setup(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    // 1) Ground, both visible and queryable
    commands.insert_resource(ActiveSurface(Box::new(FlatGround::default())));
    commands.spawn((
        Mesh3d(meshes.add(Plane3d::default().mesh().size(200.0, 200.0))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb_u8(96, 128, 72),
            ..default()
        })),
        Transform::default(),
    ));

    // 2) Light
    commands.spawn((
        DirectionalLight {
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(20.0, 40.0, 10.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    // 3) Camera
    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(-12.0, 18.0, 24.0).looking_at(Vec3::ZERO, Vec3::Y),
        MainCamera,
        CameraOrbit {
            focus: Vec3::ZERO,
            radius: 30.0,
            yaw: 0.6,
            pitch: 0.8,
        },
    ));

    // 4) The builder: distance limits are measured from here
    commands.spawn((
        Mesh3d(meshes.add(Capsule3d::new(0.3, 1.0))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb_u8(124, 144, 255),
            ..default()
        })),
        Transform::from_xyz(0.0, 0.8, 0.0),
        PlacementAgent,
    ));

    // 5) A guard post summoning around two gates
    commands.spawn((
        Transform::from_xyz(-20.0, 0.0, -20.0),
        Summoner::new(
            vec![Vec3::new(-24.0, 0.0, -20.0), Vec3::new(-16.0, 0.0, -20.0)],
            Duration::from_secs(3),
            1337,
        )
        .with_capacity(4)
        .with_search(SpawnSearchParams { base_spacing: 1.5, ..default() }),
    ));
}

/// Build whatever a committed placement authorizes, one cuboid per footprint volume.
pub fn spawn_committed_structures(
    mut commands: Commands,
    mut evr: EventReader<PreviewEvent>,
    handle: Res<CatalogHandle>,
    catalogs: Res<Assets<Catalog>>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    for ev in evr.read() {
        let PreviewEvent::PlacementCommitted(c) = ev else { continue };
        let Some(entry) = catalogs
            .get(&handle.0)
            .and_then(|cat| cat.index_of(&c.footprint.0).and_then(|i| cat.get(i)))
        else {
            warn!("Demo: no catalog entry for '{}'", c.footprint.0);
            continue;
        };
        let material = materials.add(StandardMaterial {
            base_color: Color::srgb_u8(180, 170, 150),
            ..default()
        });
        for volume in entry.footprint.world_volumes(&c.pose) {
            commands.spawn((
                Mesh3d(meshes.add(Cuboid::from_size(volume.half_extents * 2.0))),
                MeshMaterial3d(material.clone()),
                Transform::from_translation(volume.center).with_rotation(volume.rotation),
                Structure,
            ));
        }
    }
}

pub fn spawn_summoned_units(
    mut commands: Commands,
    mut evr: EventReader<SpawnRequested>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    for ev in evr.read() {
        let color = if ev.degraded { Color::srgb_u8(220, 90, 60) } else { Color::srgb_u8(230, 200, 80) };
        commands.spawn((
            Mesh3d(meshes.add(Sphere::new(0.5))),
            MeshMaterial3d(materials.add(StandardMaterial { base_color: color, ..default() })),
            Transform::from_translation(ev.position),
            SummonedUnit,
        ));
    }
}
