use std::fmt;

/// Rotation in 90-degree steps.
///
/// # Example
/// ```rust
/// use viewfinder_core::prelude::Rotation90;
///
/// let rot = Rotation90::Deg90.compose(Rotation90::Deg270);
/// assert_eq!(rot, Rotation90::Deg0);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Rotation90 {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation90 {
    /// Degrees as an integer in `{0, 90, 180, 270}`.
    pub fn degrees(self) -> u32 {
        match self {
            Rotation90::Deg0 => 0,
            Rotation90::Deg90 => 90,
            Rotation90::Deg180 => 180,
            Rotation90::Deg270 => 270,
        }
    }

    /// Parse from degrees; accepts any multiple of 90.
    pub fn from_degrees(degrees: u32) -> Option<Self> {
        match degrees % 360 {
            0 => Some(Rotation90::Deg0),
            90 => Some(Rotation90::Deg90),
            180 => Some(Rotation90::Deg180),
            270 => Some(Rotation90::Deg270),
            _ => None,
        }
    }

    /// Sum of two rotations, modulo a full turn.
    pub fn compose(self, other: Rotation90) -> Self {
        // Both operands are multiples of 90, so the sum always parses.
        Rotation90::from_degrees(self.degrees() + other.degrees())
            .unwrap_or(Rotation90::Deg0)
    }

    /// True for 90/270, where image axes are perpendicular to view axes.
    pub fn is_quarter_turn(self) -> bool {
        self.degrees() % 180 != 0
    }
}

impl fmt::Display for Rotation90 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\u{b0}", self.degrees())
    }
}

/// Degrees needed to make the sensor image upright for a device rotation.
pub fn rotation_offset(device_rotation: Rotation90) -> Rotation90 {
    match device_rotation {
        Rotation90::Deg0 => Rotation90::Deg0,
        Rotation90::Deg90 => Rotation90::Deg270,
        Rotation90::Deg180 => Rotation90::Deg180,
        Rotation90::Deg270 => Rotation90::Deg90,
    }
}

/// Combined rotation inputs for the preview path.
///
/// # Example
/// ```rust
/// use viewfinder_core::prelude::{Rotation90, RotationState};
///
/// let state = RotationState {
///     device: Rotation90::Deg90,
///     extra: Rotation90::Deg0,
///     sensor: Rotation90::Deg90,
/// };
/// assert_eq!(state.total_rotation(), Rotation90::Deg270);
/// assert!(!state.dimension_swap());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RotationState {
    /// Physical device rotation.
    pub device: Rotation90,
    /// Client-requested additional rotation.
    pub extra: Rotation90,
    /// Sensor mounting orientation reported by the hardware.
    pub sensor: Rotation90,
}

impl RotationState {
    /// Rotation applied to the rendered preview.
    pub fn total_rotation(&self) -> Rotation90 {
        rotation_offset(self.device).compose(self.extra)
    }

    /// Whether width/height must be exchanged before matching against
    /// sensor-relative coordinates.
    pub fn dimension_swap(&self) -> bool {
        let device_sideways = self.device.is_quarter_turn();
        let sensor_sideways = self.sensor.is_quarter_turn();
        device_sideways != sensor_sideways
    }
}
