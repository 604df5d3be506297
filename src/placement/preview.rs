// src/placement/preview.rs
//! Interactive ghost-placement session.
//!
//! The controller owns at most one session and that session owns exactly one
//! ghost. It never touches the world: it only emits `PreviewEvent`s, and a
//! `PlacementCommitted` event is the sole authorization to build something.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::catalog::{Catalog, CatalogEntry};
use super::core::{Aabb, CandidatePose, FootprintId, LayerMask, OccupantTags, PlacementWorld};
use super::validator::{validate, ReasonCode, ValidityPolicy, ValidityResult};

// ---------- Config ----------

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// Added to the surface hit height.
    pub vertical_offset: f32,
    pub max_ray_distance: f32,
    /// Distance along the pointer ray used when nothing is hit.
    pub fallback_distance: f32,
    /// Angle applied by one discrete rotate step.
    pub rotation_step_deg: f32,
    /// Angle applied per unit of continuous (wheel) rotation.
    pub scroll_step_deg: f32,
    pub ground_layers: LayerMask,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            vertical_offset: 0.0,
            max_ray_distance: 100.0,
            fallback_distance: 5.0,
            rotation_step_deg: 90.0,
            scroll_step_deg: 15.0,
            ground_layers: LayerMask::GROUND,
        }
    }
}

// ---------- Errors ----------

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PreviewError {
    #[error("cannot enter placement mode with an empty catalog")]
    EmptyCatalog,
    #[error("catalog index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("placement collaborator unavailable: {0}")]
    MissingCollaborator(&'static str),
    #[error("no active placement session")]
    NotActive,
}

// ---------- Ghost ownership ----------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GhostId(pub u64);

/// Live preview instance. Not `Clone`: a session holds the only handle and
/// gives it up exactly once in `release`.
#[derive(Debug)]
pub struct GhostHandle {
    id: GhostId,
}

impl GhostHandle {
    pub fn id(&self) -> GhostId { self.id }

    fn release(self) -> GhostId { self.id }
}

// ---------- Events ----------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    Committed,
    Cancelled,
    /// A collaborator went away mid-session.
    Failed,
}

/// What a committed placement authorizes the world to build.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacementCommitted {
    pub pose: CandidatePose,
    pub footprint: FootprintId,
    /// World bounds of the footprint at `pose`.
    pub bounds: Aabb,
    pub tags: OccupantTags,
}

#[derive(Event, Clone, Debug, PartialEq)]
pub enum PreviewEvent {
    ModeEntered { footprint: FootprintId },
    ModeExited { reason: ExitReason },
    GhostCreated { ghost: GhostId, footprint: FootprintId },
    GhostDestroyed { ghost: GhostId },
    AppearanceUpdate { ghost: GhostId, pose: CandidatePose, valid: bool },
    ValidityChanged { valid: bool },
    PlacementCommitted(PlacementCommitted),
}

// ---------- Input ----------

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RotateInput {
    /// Key-style input: +1 / -1 discrete steps.
    Step(i32),
    /// Wheel-style input: scaled by `scroll_step_deg`.
    Continuous(f32),
}

// ---------- Session ----------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreviewState {
    Inactive,
    /// Active, but the pointer has not hit ground this tick.
    Selecting,
    /// Active with a surface hit this tick.
    Tracking,
}

#[derive(Debug)]
pub struct PreviewSession {
    catalog: Arc<Catalog>,
    index: usize,
    pose: CandidatePose,
    last_validity: ValidityResult,
    surface_hit: bool,
    /// Pose changed since the last validation; commits wait for the next tick.
    stale: bool,
    ghost: GhostHandle,
}

impl PreviewSession {
    pub fn catalog_index(&self) -> usize { self.index }
    pub fn pose(&self) -> &CandidatePose { &self.pose }
    pub fn last_validity(&self) -> &ValidityResult { &self.last_validity }
    pub fn ghost(&self) -> GhostId { self.ghost.id() }

    fn entry(&self) -> Option<&CatalogEntry> { self.catalog.get(self.index) }
}

// ---------- Controller ----------

#[derive(Resource)]
pub struct PreviewController {
    config: PreviewConfig,
    policy: ValidityPolicy,
    session: Option<PreviewSession>,
    next_ghost: u64,
    events: Vec<PreviewEvent>,
}

impl PreviewController {
    pub fn new(config: PreviewConfig, policy: ValidityPolicy) -> Self {
        Self { config, policy, session: None, next_ghost: 1, events: Vec::new() }
    }

    pub fn config(&self) -> &PreviewConfig { &self.config }

    pub fn policy(&self) -> &ValidityPolicy { &self.policy }

    /// Takes effect on the next `advance`.
    pub fn set_policy(&mut self, policy: ValidityPolicy) { self.policy = policy; }

    pub fn session(&self) -> Option<&PreviewSession> { self.session.as_ref() }

    pub fn is_active(&self) -> bool { self.session.is_some() }

    pub fn state(&self) -> PreviewState {
        match &self.session {
            None => PreviewState::Inactive,
            Some(s) if s.surface_hit => PreviewState::Tracking,
            Some(_) => PreviewState::Selecting,
        }
    }

    /// Hand pending events to the caller.
    pub fn drain_events(&mut self) -> Vec<PreviewEvent> {
        std::mem::take(&mut self.events)
    }

    /// Start a session on `catalog[start_index]`. An already-active session is ended first.
    pub fn enter_mode(&mut self, catalog: Arc<Catalog>, start_index: usize) -> Result<(), PreviewError> {
        if catalog.is_empty() {
            return Err(PreviewError::EmptyCatalog);
        }
        let Some(entry) = catalog.get(start_index) else {
            return Err(PreviewError::IndexOutOfRange { index: start_index, len: catalog.len() });
        };
        let footprint = entry.id();

        self.teardown(ExitReason::Cancelled);

        let ghost = self.spawn_ghost(footprint.clone());
        self.session = Some(PreviewSession {
            catalog,
            index: start_index,
            pose: CandidatePose::default(),
            last_validity: ValidityResult::rejected(ReasonCode::NoSurface),
            surface_hit: false,
            stale: true,
            ghost,
        });
        info!("Placement: entered mode with '{}'", footprint.0);
        self.events.push(PreviewEvent::ModeEntered { footprint });
        Ok(())
    }

    /// One tick of live tracking. `reference` is the requesting agent's position.
    pub fn advance(&mut self, pointer: Ray3d, reference: Vec3, world: PlacementWorld<'_>) -> Option<&ValidityResult> {
        let config = self.config;
        let policy = self.policy;
        let session = self.session.as_mut()?;

        let hit = world.surface.raycast(pointer, config.max_ray_distance, config.ground_layers);
        let validity = match hit {
            Some(hit) => {
                session.pose.position = hit.point + Vec3::Y * config.vertical_offset;
                session.surface_hit = true;
                match session.entry() {
                    Some(entry) => validate(&session.pose, &entry.footprint, reference, &policy, world),
                    None => ValidityResult::rejected(ReasonCode::NoSurface),
                }
            }
            None => {
                // Parked in front of the viewer; never committable.
                session.pose.position = pointer.get_point(config.fallback_distance);
                session.surface_hit = false;
                ValidityResult::rejected(ReasonCode::NoSurface)
            }
        };

        let was_valid = session.last_validity.is_valid();
        let now_valid = validity.is_valid();
        session.last_validity = validity;
        session.stale = false;

        if was_valid != now_valid {
            debug!("Placement: validity -> {} {:?}", now_valid, session.last_validity.reasons());
            self.events.push(PreviewEvent::ValidityChanged { valid: now_valid });
        }
        self.events.push(PreviewEvent::AppearanceUpdate {
            ghost: session.ghost.id(),
            pose: session.pose,
            valid: now_valid,
        });
        Some(&session.last_validity)
    }

    /// Spin the candidate about +Y; translation is untouched.
    pub fn rotate(&mut self, input: RotateInput) {
        let Some(session) = self.session.as_mut() else { return };
        let degrees = match input {
            RotateInput::Step(dir) => dir.signum() as f32 * self.config.rotation_step_deg,
            RotateInput::Continuous(delta) => delta * self.config.scroll_step_deg,
        };
        if degrees == 0.0 {
            return;
        }
        session.pose.rotation = (session.pose.rotation * Quat::from_rotation_y(degrees.to_radians())).normalize();
        session.stale = true;
    }

    /// Move `direction` entries through the catalog, wrapping, and swap the ghost.
    pub fn cycle_prefab(&mut self, direction: i32) {
        let Some(session) = self.session.as_ref() else { return };
        let index = session.catalog.wrap(session.index, direction);
        self.switch_to(index);
    }

    /// Jump to a specific catalog entry. Out-of-range indices are refused without side effects.
    pub fn select_prefab(&mut self, index: usize) -> Result<(), PreviewError> {
        let session = self.session.as_ref().ok_or(PreviewError::NotActive)?;
        let len = session.catalog.len();
        if index >= len {
            warn!("Placement: prefab index {} out of range (len {})", index, len);
            return Err(PreviewError::IndexOutOfRange { index, len });
        }
        self.switch_to(index);
        Ok(())
    }

    fn switch_to(&mut self, index: usize) {
        let Some(session) = self.session.as_mut() else { return };
        let Some(footprint) = session.catalog.get(index).map(CatalogEntry::id) else { return };

        let old = std::mem::replace(&mut session.ghost, mint_ghost(&mut self.next_ghost));
        session.index = index;
        session.stale = true;
        let ghost = session.ghost.id();

        self.events.push(PreviewEvent::GhostDestroyed { ghost: old.release() });
        self.events.push(PreviewEvent::GhostCreated { ghost, footprint });
    }

    /// Emit the placement if the last validation passed. Otherwise a silent no-op.
    pub fn commit(&mut self) -> Option<PlacementCommitted> {
        let session = self.session.as_ref()?;
        if session.stale || !session.last_validity.is_valid() {
            debug!("Placement: commit ignored (stale={}, valid={})", session.stale, session.last_validity.is_valid());
            return None;
        }
        let entry = session.entry()?;
        let committed = PlacementCommitted {
            pose: session.pose,
            footprint: entry.id(),
            bounds: entry.footprint.world_bounds(&session.pose),
            tags: entry.tags,
        };

        info!("Placement: committed '{}' at {:?}", committed.footprint.0, committed.pose.position);
        self.events.push(PreviewEvent::PlacementCommitted(committed.clone()));
        self.teardown(ExitReason::Committed);
        Some(committed)
    }

    /// Drop the session. Safe to call when inactive.
    pub fn cancel(&mut self) {
        self.teardown(ExitReason::Cancelled);
    }

    /// A collaborator is missing: end any session and hand the error back for reporting.
    pub fn fail(&mut self, error: PreviewError) -> PreviewError {
        if self.is_active() {
            warn!("Placement: leaving mode: {}", error);
            self.teardown(ExitReason::Failed);
        }
        error
    }

    fn spawn_ghost(&mut self, footprint: FootprintId) -> GhostHandle {
        let ghost = mint_ghost(&mut self.next_ghost);
        self.events.push(PreviewEvent::GhostCreated { ghost: ghost.id(), footprint });
        ghost
    }

    fn release_ghost(&mut self, ghost: GhostHandle) {
        let ghost = ghost.release();
        self.events.push(PreviewEvent::GhostDestroyed { ghost });
    }

    /// Ghost goes first, then the session.
    fn teardown(&mut self, reason: ExitReason) {
        let Some(session) = self.session.take() else { return };
        self.release_ghost(session.ghost);
        info!("Placement: left mode ({:?})", reason);
        self.events.push(PreviewEvent::ModeExited { reason });
    }
}

fn mint_ghost(counter: &mut u64) -> GhostHandle {
    let id = GhostId(*counter);
    *counter += 1;
    GhostHandle { id }
}

impl Default for PreviewController {
    fn default() -> Self { Self::new(PreviewConfig::default(), ValidityPolicy::default()) }
}
