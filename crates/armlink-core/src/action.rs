//! Action intents accepted by the command channel.

use serde::{Deserialize, Serialize};

use crate::geometry::PhysicalPosition;

/// High-level motion primitive, in physical millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionIntent {
    /// Move the effector to an absolute position
    Move {
        /// Target X in millimeters
        x_mm: f64,
        /// Target Y in millimeters
        y_mm: f64,
    },
    /// Press and release at the current position
    Click,
    /// Drag from one position to another, holding for `duration_secs`
    Swipe {
        /// Start X in millimeters
        x1: f64,
        /// Start Y in millimeters
        y1: f64,
        /// End X in millimeters
        x2: f64,
        /// End Y in millimeters
        y2: f64,
        /// Hold time at the end position, in seconds
        duration_secs: f64,
    },
    /// Move to a position, then click there
    MoveClick {
        /// Target X in millimeters
        x_mm: f64,
        /// Target Y in millimeters
        y_mm: f64,
    },
}

impl ActionIntent {
    /// Move to a physical position.
    pub fn move_to(target: PhysicalPosition) -> Self {
        ActionIntent::Move {
            x_mm: target.x_mm,
            y_mm: target.y_mm,
        }
    }

    /// Move to a physical position and click.
    pub fn move_and_click(target: PhysicalPosition) -> Self {
        ActionIntent::MoveClick {
            x_mm: target.x_mm,
            y_mm: target.y_mm,
        }
    }

    /// Whether this intent lowers the effector at some point.
    pub fn actuates_z(&self) -> bool {
        !matches!(self, ActionIntent::Move { .. })
    }
}
