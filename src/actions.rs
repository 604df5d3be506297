use bevy::prelude::*;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerAction {
    // camera
    MoveForward,
    MoveBackward,
    MoveLeft,
    MoveRight,
    // placement
    EnterPlacement,
    CyclePrefab,
    RotateLeft,
    RotateRight,
    Commit,
    Cancel,
    /// Digit keys 1..9 pick a catalog entry directly.
    SelectPrefab(u8),
}

/// Actions for the current frame. Placement actions are edge-triggered
/// (set on the frame the key went down); camera moves are held.
#[derive(Default, Resource)]
pub struct ActionState {
    active: HashSet<PlayerAction>,
    /// Wheel lines accumulated this frame.
    scroll: f32,
}

impl ActionState {
    pub fn set(&mut self, action: PlayerAction, is_active: bool) {
        if is_active {
            self.active.insert(action);
        } else {
            self.active.remove(&action);
        }
    }

    pub fn pressed(&self, action: PlayerAction) -> bool {
        self.active.contains(&action)
    }

    pub fn set_scroll(&mut self, lines: f32) {
        self.scroll = lines;
    }

    pub fn scroll(&self) -> f32 {
        self.scroll
    }

    /// First digit-selected prefab this frame, if any.
    pub fn selected_prefab(&self) -> Option<u8> {
        (0..9u8).find(|&i| self.pressed(PlayerAction::SelectPrefab(i)))
    }
}
