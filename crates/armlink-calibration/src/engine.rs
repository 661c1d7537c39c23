//! Calibration state machine.
//!
//! The engine owns no hardware and no event loop. A front end shows the
//! operator a frame, collects a pixel, and hands it to
//! [`CalibrationEngine::submit_point`]; the returned [`Instruction`] says
//! what the actuator must do before the next checkpoint.

use serde::Serialize;
use tracing::{info, warn};

use armlink_core::{
    CalibrationRecord, CalibrationSettings, Error, FrameSize, PhysicalPosition, PixelPoint, Result,
};

/// Where the procedure is waiting for operator input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Checkpoint {
    /// Reference mark center, actuator at its origin
    AwaitingPoint1,
    /// Same reference mark after the known displacement
    AwaitingPoint2,
    /// Effector tip aligned with the mark, actuator back at its origin
    AwaitingTip,
}

impl std::fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Checkpoint::AwaitingPoint1 => "awaiting_point_1",
            Checkpoint::AwaitingPoint2 => "awaiting_point_2",
            Checkpoint::AwaitingTip => "awaiting_tip",
        };
        f.write_str(name)
    }
}

/// Procedure state.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationState {
    /// Phase 1, first mark
    AwaitingPoint1,
    /// Phase 1, second mark
    AwaitingPoint2 {
        /// First mark
        p1: PixelPoint,
    },
    /// Phase 2, effector tip
    AwaitingTip {
        /// Scale derived in phase 1
        mm_per_pixel: f64,
    },
    /// Record produced
    Complete(CalibrationRecord),
    /// Geometry was insufficient
    Failed(String),
    /// Operator aborted
    Cancelled,
}

/// Actuator work the driver performs after a point is accepted.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Move to this absolute position and settle before the next checkpoint.
    MoveTo(PhysicalPosition),
    /// Scale is known: move back to the origin, settle, and let the operator
    /// align the effector tip with the mark.
    ReturnForAlignment(PhysicalPosition),
    /// Procedure finished.
    Finished(CalibrationRecord),
}

/// Two-phase hand-eye calibration driven by operator-supplied points.
#[derive(Debug, Clone)]
pub struct CalibrationEngine {
    known_move_dist_mm: f64,
    min_pixel_displacement: f64,
    origin: PhysicalPosition,
    state: CalibrationState,
}

impl CalibrationEngine {
    /// Start a procedure with the actuator at its power-on origin.
    pub fn new(settings: &CalibrationSettings) -> Self {
        Self {
            known_move_dist_mm: settings.known_move_dist_mm,
            min_pixel_displacement: settings.min_pixel_displacement,
            origin: PhysicalPosition::origin(),
            state: CalibrationState::AwaitingPoint1,
        }
    }

    /// Current state.
    pub fn state(&self) -> &CalibrationState {
        &self.state
    }

    /// The checkpoint waiting for input, if any.
    pub fn checkpoint(&self) -> Option<Checkpoint> {
        match self.state {
            CalibrationState::AwaitingPoint1 => Some(Checkpoint::AwaitingPoint1),
            CalibrationState::AwaitingPoint2 { .. } => Some(Checkpoint::AwaitingPoint2),
            CalibrationState::AwaitingTip { .. } => Some(Checkpoint::AwaitingTip),
            _ => None,
        }
    }

    /// Where the actuator sits while phase 1 starts and phase 2 runs.
    pub fn origin(&self) -> PhysicalPosition {
        self.origin
    }

    /// The finished record, once complete.
    pub fn record(&self) -> Option<&CalibrationRecord> {
        match &self.state {
            CalibrationState::Complete(record) => Some(record),
            _ => None,
        }
    }

    /// Submit the pixel the operator marked in a frame of `frame_size`.
    ///
    /// For the tip checkpoint the frame size must come from the same frame
    /// the tip was marked in. A displacement below the minimum fails the
    /// procedure with [`Error::Validation`] and produces no record.
    pub fn submit_point(&mut self, point: PixelPoint, frame_size: FrameSize) -> Result<Instruction> {
        match self.state.clone() {
            CalibrationState::AwaitingPoint1 => {
                info!("Reference mark at ({:.1}, {:.1})", point.x, point.y);
                self.state = CalibrationState::AwaitingPoint2 { p1: point };
                Ok(Instruction::MoveTo(
                    self.origin + PhysicalPosition::new(self.known_move_dist_mm, 0.0),
                ))
            }
            CalibrationState::AwaitingPoint2 { p1 } => {
                match CalibrationRecord::scale_from_displacement(
                    self.known_move_dist_mm,
                    p1,
                    point,
                    self.min_pixel_displacement,
                ) {
                    Ok(mm_per_pixel) => {
                        info!("Derived scale {:.4} mm/pixel", mm_per_pixel);
                        self.state = CalibrationState::AwaitingTip { mm_per_pixel };
                        Ok(Instruction::ReturnForAlignment(self.origin))
                    }
                    Err(e) => {
                        warn!("Scale calibration failed: {}", e);
                        self.state = CalibrationState::Failed(e.to_string());
                        Err(e)
                    }
                }
            }
            CalibrationState::AwaitingTip { mm_per_pixel } => {
                let offset_px = CalibrationRecord::offset_from_tip(point, frame_size);
                let record = CalibrationRecord::new(mm_per_pixel, offset_px).map_err(|e| {
                    self.state = CalibrationState::Failed(e.to_string());
                    e
                })?;
                info!(
                    "Effector offset ({:.1}, {:.1}) px from the {}x{} frame center",
                    offset_px.dx(),
                    offset_px.dy(),
                    frame_size.width,
                    frame_size.height
                );
                self.state = CalibrationState::Complete(record);
                Ok(Instruction::Finished(record))
            }
            other => Err(Error::InvalidState(format!(
                "no checkpoint is waiting for a point (state: {other:?})"
            ))),
        }
    }

    /// Abort the procedure. Completed procedures stay complete.
    pub fn cancel(&mut self) {
        if self.checkpoint().is_some() {
            info!("Calibration cancelled");
            self.state = CalibrationState::Cancelled;
        }
    }

    /// Start over from the first checkpoint.
    pub fn reset(&mut self) {
        self.state = CalibrationState::AwaitingPoint1;
    }
}
