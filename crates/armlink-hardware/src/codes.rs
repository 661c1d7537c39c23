//! Command codes understood by the remote actuator service.
//!
//! Codes are opaque tokens: `x{int}y{int}` for an XY move, `z{signed int}`
//! for a vertical actuation, and `0` to close the port. Callers build
//! [`ActionIntent`](armlink_core::ActionIntent)s; only the command channel
//! turns them into codes.

/// Vertical travel for the press half of a click.
pub const CLICK_DESCEND_Z: i32 = 9;

/// Vertical travel back up after a click or swipe.
pub const ASCEND_Z: i32 = -8;

/// Shallower press used while dragging.
pub const SWIPE_DESCEND_Z: i32 = 3;

/// A single encoded command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandCode(String);

impl CommandCode {
    /// Encode an XY move. Millimeters are truncated toward zero because the
    /// hardware only accepts integer targets.
    pub fn move_to(x_mm: f64, y_mm: f64) -> Self {
        Self(format!("x{}y{}", truncate_mm(x_mm), truncate_mm(y_mm)))
    }

    /// Encode a vertical actuation.
    pub fn z(steps: i32) -> Self {
        Self(format!("z{steps}"))
    }

    /// Press for a click.
    pub fn click_descend() -> Self {
        Self::z(CLICK_DESCEND_Z)
    }

    /// Press for a swipe.
    pub fn swipe_descend() -> Self {
        Self::z(SWIPE_DESCEND_Z)
    }

    /// Lift the effector.
    pub fn ascend() -> Self {
        Self::z(ASCEND_Z)
    }

    /// Close the port and free the remote resource.
    pub fn shutdown() -> Self {
        Self("0".to_string())
    }

    /// The wire token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CommandCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// Saturating cast; NaN becomes 0.
fn truncate_mm(value: f64) -> i64 {
    value.trunc() as i64
}
