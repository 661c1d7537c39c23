//! Geometry types for pixel space and physical actuator space.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// A point in the image plane of the canonical (rotated) frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelPoint {
    /// Horizontal pixel coordinate
    pub x: f64,
    /// Vertical pixel coordinate (grows downward)
    pub y: f64,
}

impl PixelPoint {
    /// Create a new pixel point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &PixelPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Translate this point by an offset.
    pub fn offset_by(&self, offset: PixelOffset) -> PixelPoint {
        PixelPoint::new(self.x + offset.0, self.y + offset.1)
    }
}

impl Sub for PixelPoint {
    type Output = PixelOffset;

    fn sub(self, rhs: PixelPoint) -> PixelOffset {
        PixelOffset(self.x - rhs.x, self.y - rhs.y)
    }
}

/// A displacement in pixel space, serialized as a two-element array.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PixelOffset(pub f64, pub f64);

impl PixelOffset {
    /// Horizontal component.
    pub fn dx(&self) -> f64 {
        self.0
    }

    /// Vertical component.
    pub fn dy(&self) -> f64 {
        self.1
    }
}

/// Physical actuator position in millimeters relative to the power-on origin.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PhysicalPosition {
    /// X in millimeters
    pub x_mm: f64,
    /// Y in millimeters
    pub y_mm: f64,
}

impl PhysicalPosition {
    /// Create a new physical position.
    pub fn new(x_mm: f64, y_mm: f64) -> Self {
        Self { x_mm, y_mm }
    }

    /// The actuator's power-on origin (0, 0).
    pub fn origin() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl Add for PhysicalPosition {
    type Output = PhysicalPosition;

    fn add(self, rhs: PhysicalPosition) -> PhysicalPosition {
        PhysicalPosition::new(self.x_mm + rhs.x_mm, self.y_mm + rhs.y_mm)
    }
}

impl Sub for PhysicalPosition {
    type Output = PhysicalPosition;

    fn sub(self, rhs: PhysicalPosition) -> PhysicalPosition {
        PhysicalPosition::new(self.x_mm - rhs.x_mm, self.y_mm - rhs.y_mm)
    }
}

impl std::fmt::Display for PhysicalPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2}) mm", self.x_mm, self.y_mm)
    }
}

/// Dimensions of a captured frame in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameSize {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl FrameSize {
    /// Create new frame dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Geometric center `(w/2, h/2)`.
    pub fn center(&self) -> PixelPoint {
        PixelPoint::new(f64::from(self.width) / 2.0, f64::from(self.height) / 2.0)
    }
}

impl Default for FrameSize {
    fn default() -> Self {
        Self::new(640, 480)
    }
}
