//! Pixel to physical coordinate transform.

use crate::calibration::CalibrationRecord;
use crate::geometry::{FrameSize, PhysicalPosition, PixelPoint};

/// Full-scale value of the normalized point-of-interest axes (0..=1000).
pub const NORMALIZED_SCALE: f64 = 1000.0;

/// Map a target pixel to the physical position the effector must move to.
///
/// The effector projects to `frame_center + offset_px`; the displacement from
/// there to `target_px` is scaled by `mm_per_pixel` and added to
/// `current_pos_mm`. Pure and deterministic: callers may pass either the
/// origin (relative mode) or a tracked absolute position.
pub fn to_physical(
    target_px: PixelPoint,
    current_pos_mm: PhysicalPosition,
    frame_size: FrameSize,
    calibration: &CalibrationRecord,
) -> PhysicalPosition {
    let effector_px = frame_size.center().offset_by(calibration.offset_px);
    let displacement = target_px - effector_px;
    let scale = calibration.mm_per_pixel;
    current_pos_mm
        + PhysicalPosition::new(displacement.dx() * scale, displacement.dy() * scale)
}

/// Rescale a 0-1000 normalized point to integer pixel coordinates of a frame.
///
/// Coordinates are truncated to whole pixels.
pub fn from_normalized(x: f64, y: f64, frame_size: FrameSize) -> PixelPoint {
    let px = (x / NORMALIZED_SCALE * f64::from(frame_size.width)).trunc();
    let py = (y / NORMALIZED_SCALE * f64::from(frame_size.height)).trunc();
    PixelPoint::new(px, py)
}
