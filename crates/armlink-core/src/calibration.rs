//! Hand-eye calibration record and its persisted JSON artifact.
//!
//! The artifact is a JSON object with exactly two keys:
//!
//! ```json
//! { "mm_per_pixel": 0.1234, "offset_px": [12.0, -7.0] }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::geometry::{FrameSize, PixelOffset, PixelPoint};
use crate::{Error, Result};

/// Minimum pixel displacement accepted for deriving the scale.
pub const MIN_PIXEL_DISPLACEMENT: f64 = 5.0;

/// Pixel to millimeter mapping and camera/effector offset for one rig setup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CalibrationRecord {
    /// Millimeters per pixel, isotropic
    pub mm_per_pixel: f64,
    /// Effector tip position minus frame center, in pixels
    pub offset_px: PixelOffset,
}

impl CalibrationRecord {
    /// Create a validated record.
    pub fn new(mm_per_pixel: f64, offset_px: PixelOffset) -> Result<Self> {
        let record = Self {
            mm_per_pixel,
            offset_px,
        };
        record.validate()?;
        Ok(record)
    }

    /// Derive the scale from one known physical displacement.
    ///
    /// `p1` and `p2` are the reference mark's centers before and after the
    /// actuator moved `known_move_dist_mm`. Fails when the marks are closer
    /// than `min_pixel_displacement`.
    pub fn scale_from_displacement(
        known_move_dist_mm: f64,
        p1: PixelPoint,
        p2: PixelPoint,
        min_pixel_displacement: f64,
    ) -> Result<f64> {
        let pixel_dist = p1.distance_to(&p2);
        if !pixel_dist.is_finite() || pixel_dist < min_pixel_displacement {
            return Err(Error::Validation(format!(
                "pixel displacement {pixel_dist:.2} is below the minimum of {min_pixel_displacement}"
            )));
        }
        let mm_per_pixel = known_move_dist_mm / pixel_dist;
        if !mm_per_pixel.is_finite() || mm_per_pixel <= 0.0 {
            return Err(Error::Validation(format!(
                "derived scale {mm_per_pixel} is not a positive finite number"
            )));
        }
        Ok(mm_per_pixel)
    }

    /// Offset of the effector tip from the center of the frame it was marked in.
    pub fn offset_from_tip(clicker_pos: PixelPoint, frame_size: FrameSize) -> PixelOffset {
        clicker_pos - frame_size.center()
    }

    /// Check the record's invariants.
    pub fn validate(&self) -> Result<()> {
        if !self.mm_per_pixel.is_finite() || self.mm_per_pixel <= 0.0 {
            return Err(Error::Validation(format!(
                "mm_per_pixel must be a positive finite number, got {}",
                self.mm_per_pixel
            )));
        }
        if !self.offset_px.0.is_finite() || !self.offset_px.1.is_finite() {
            return Err(Error::Validation(
                "offset_px must contain two finite numbers".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a record from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        let record: CalibrationRecord = serde_json::from_str(json)?;
        record.validate()?;
        Ok(record)
    }

    /// Load the calibration artifact from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Persist the calibration artifact as pretty JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.validate()?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_from_displacement() {
        let scale = CalibrationRecord::scale_from_displacement(
            50.0,
            PixelPoint::new(100.0, 100.0),
            PixelPoint::new(100.0, 600.0),
            MIN_PIXEL_DISPLACEMENT,
        )
        .unwrap();
        assert!((scale - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_scale_at_threshold_is_accepted() {
        let scale = CalibrationRecord::scale_from_displacement(
            50.0,
            PixelPoint::new(0.0, 0.0),
            PixelPoint::new(3.0, 4.0),
            MIN_PIXEL_DISPLACEMENT,
        )
        .unwrap();
        assert_eq!(scale, 10.0);
    }

    #[test]
    fn test_small_displacement_rejected() {
        let result = CalibrationRecord::scale_from_displacement(
            50.0,
            PixelPoint::new(10.0, 10.0),
            PixelPoint::new(12.0, 13.0),
            MIN_PIXEL_DISPLACEMENT,
        );
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_identical_points_rejected() {
        let p = PixelPoint::new(42.0, 42.0);
        let result = CalibrationRecord::scale_from_displacement(50.0, p, p, 5.0);
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_offset_from_tip() {
        let offset = CalibrationRecord::offset_from_tip(
            PixelPoint::new(250.0, 300.0),
            FrameSize::new(480, 640),
        );
        assert_eq!(offset, PixelOffset(10.0, -20.0));
    }

    #[test]
    fn test_json_has_exactly_two_keys() {
        let record = CalibrationRecord::new(0.25, PixelOffset(3.0, -4.0)).unwrap();
        let value = serde_json::to_value(record).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert_eq!(object["mm_per_pixel"], 0.25);
        assert_eq!(object["offset_px"], serde_json::json!([3.0, -4.0]));
    }

    #[test]
    fn test_from_json_accepts_integer_offsets() {
        let record =
            CalibrationRecord::from_json(r#"{"mm_per_pixel": 0.1, "offset_px": [5, -6]}"#)
                .unwrap();
        assert_eq!(record.offset_px, PixelOffset(5.0, -6.0));
    }

    #[test]
    fn test_from_json_rejects_bad_artifacts() {
        // Missing key
        assert!(CalibrationRecord::from_json(r#"{"mm_per_pixel": 0.1}"#).is_err());
        // Extra key
        assert!(CalibrationRecord::from_json(
            r#"{"mm_per_pixel": 0.1, "offset_px": [0, 0], "extra": 1}"#
        )
        .is_err());
        // Wrong arity
        assert!(
            CalibrationRecord::from_json(r#"{"mm_per_pixel": 0.1, "offset_px": [0]}"#).is_err()
        );
        // Non-positive scale
        assert!(matches!(
            CalibrationRecord::from_json(r#"{"mm_per_pixel": 0.0, "offset_px": [0, 0]}"#),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("final_config.json");

        let record = CalibrationRecord::new(0.125, PixelOffset(-12.0, 8.5)).unwrap();
        record.save(&path).unwrap();

        let loaded = CalibrationRecord::load(&path).unwrap();
        assert_eq!(loaded, record);
    }
}
