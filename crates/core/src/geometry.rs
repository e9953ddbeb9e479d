use std::{fmt, num::NonZeroU32};

/// Pixel dimensions of a buffer or surface.
///
/// # Example
/// ```rust
/// use viewfinder_core::prelude::Size;
///
/// let size = Size::new(1920, 1080).unwrap();
/// assert_eq!(size.area(), 1920 * 1080);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Size {
    /// Width in pixels (non-zero).
    pub width: NonZeroU32,
    /// Height in pixels (non-zero).
    pub height: NonZeroU32,
}

impl Size {
    /// Create a size, returning `None` if width or height are zero.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        Some(Self {
            width: NonZeroU32::new(width)?,
            height: NonZeroU32::new(height)?,
        })
    }

    /// Width times height.
    pub fn area(self) -> u64 {
        self.width.get() as u64 * self.height.get() as u64
    }

    /// Swap width and height.
    pub fn transpose(self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }

    /// Height over width.
    pub fn portrait_ratio(self) -> f64 {
        self.height.get() as f64 / self.width.get() as f64
    }

    /// Width over height.
    pub fn landscape_ratio(self) -> f64 {
        self.width.get() as f64 / self.height.get() as f64
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Axis-aligned rectangle in view coordinates.
///
/// # Example
/// ```rust
/// use viewfinder_core::prelude::RectF;
///
/// let rect = RectF::from_dims(640.0, 480.0);
/// assert_eq!(rect.center_x(), 320.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectF {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl RectF {
    /// Rectangle anchored at the origin with the given dimensions.
    pub fn from_dims(width: f32, height: f32) -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            right: width,
            bottom: height,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn center_x(&self) -> f32 {
        (self.left + self.right) / 2.0
    }

    pub fn center_y(&self) -> f32 {
        (self.top + self.bottom) / 2.0
    }

    /// True when the rectangle encloses no area.
    pub fn is_empty(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    /// Shift the rectangle by the given deltas.
    pub fn offset(&mut self, dx: f32, dy: f32) {
        self.left += dx;
        self.right += dx;
        self.top += dy;
        self.bottom += dy;
    }

    /// Shrink the rectangle symmetrically; negative values grow it.
    pub fn inset(&mut self, dx: f32, dy: f32) {
        self.left += dx;
        self.right -= dx;
        self.top += dy;
        self.bottom -= dy;
    }
}

/// Errors constructing viewport geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    /// A translation was positive; the viewport only ever shrinks.
    PositiveTranslation,
    /// Both axes carried a translation at once.
    BothAxesTranslated,
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryError::PositiveTranslation => {
                write!(f, "viewport translations must be zero or negative")
            }
            GeometryError::BothAxesTranslated => {
                write!(f, "viewport may only be compressed along one axis")
            }
        }
    }
}

impl std::error::Error for GeometryError {}

/// Measured viewport box plus the layout compression it reported.
///
/// The translations record how much the measured box was shrunk along one
/// axis relative to the ideal aspect-ratio box during the widget's own layout
/// pass. Both are `<= 0` and at most one is non-zero at a time.
///
/// # Example
/// ```rust
/// use viewfinder_core::prelude::ViewportGeometry;
///
/// let geom = ViewportGeometry::with_translation(1080, 1920, -80.0, 0.0).unwrap();
/// assert_eq!(geom.x_translation(), -80.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportGeometry {
    width: u32,
    height: u32,
    x_translation: f32,
    y_translation: f32,
}

impl ViewportGeometry {
    /// Geometry for a viewport that fit its ideal box exactly.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            x_translation: 0.0,
            y_translation: 0.0,
        }
    }

    /// Geometry for a viewport compressed along one axis.
    pub fn with_translation(
        width: u32,
        height: u32,
        x_translation: f32,
        y_translation: f32,
    ) -> Result<Self, GeometryError> {
        if x_translation > 0.0 || y_translation > 0.0 {
            return Err(GeometryError::PositiveTranslation);
        }
        if x_translation < 0.0 && y_translation < 0.0 {
            return Err(GeometryError::BothAxesTranslated);
        }
        Ok(Self {
            width,
            height,
            x_translation,
            y_translation,
        })
    }

    /// Derive geometry from the ideal aspect box and the measured box.
    ///
    /// The measured box never exceeds the ideal box; whichever axis came up
    /// short yields the (negative) translation for that axis.
    pub fn from_layout(ideal_w: u32, ideal_h: u32, measured_w: u32, measured_h: u32) -> Self {
        let dx = measured_w as f32 - ideal_w as f32;
        let dy = measured_h as f32 - ideal_h as f32;
        // Layout only compresses one axis; prefer the shorter one if a widget
        // reports both (rounding noise).
        let (x_translation, y_translation) = if dx < dy {
            (dx.min(0.0), 0.0)
        } else {
            (0.0, dy.min(0.0))
        };
        Self {
            width: measured_w,
            height: measured_h,
            x_translation,
            y_translation,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn x_translation(&self) -> f32 {
        self.x_translation
    }

    pub fn y_translation(&self) -> f32 {
        self.y_translation
    }
}
