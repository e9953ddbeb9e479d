use crate::geometry::RectF;
use crate::rotation::Rotation90;

/// Row-major 3x3 affine transform for preview rendering.
///
/// Only the top two rows carry meaning; the bottom row stays `[0 0 1]`.
/// Quarter-turn rotations use exact sine/cosine values so identical inputs
/// always produce bit-identical matrices.
///
/// # Example
/// ```rust
/// use viewfinder_core::prelude::{Matrix, RectF};
///
/// let src = RectF::from_dims(4.0, 2.0);
/// let dst = RectF::from_dims(8.0, 4.0);
/// let matrix = Matrix::rect_to_rect(src, dst).unwrap();
/// assert_eq!(matrix.map_point(4.0, 2.0), (8.0, 4.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    m: [f32; 9],
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl Matrix {
    pub fn identity() -> Self {
        Self {
            m: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    /// Raw row-major values.
    pub fn values(&self) -> [f32; 9] {
        self.m
    }

    /// Transform mapping `src` exactly onto `dst` (fill, anisotropic).
    ///
    /// Returns `None` when `src` encloses no area.
    pub fn rect_to_rect(src: RectF, dst: RectF) -> Option<Self> {
        if src.is_empty() {
            return None;
        }
        let sx = dst.width() / src.width();
        let sy = dst.height() / src.height();
        let tx = dst.left - src.left * sx;
        let ty = dst.top - src.top * sy;
        Some(Self {
            m: [sx, 0.0, tx, 0.0, sy, ty, 0.0, 0.0, 1.0],
        })
    }

    /// Rotate the mapped result by a quarter-turn step about a pivot.
    pub fn post_rotate(&mut self, rotation: Rotation90, px: f32, py: f32) {
        if rotation == Rotation90::Deg0 {
            return;
        }
        let (sin, cos) = match rotation {
            Rotation90::Deg0 => (0.0, 1.0),
            Rotation90::Deg90 => (1.0, 0.0),
            Rotation90::Deg180 => (0.0, -1.0),
            Rotation90::Deg270 => (-1.0, 0.0),
        };
        let rot = Self {
            m: [
                cos,
                -sin,
                px - cos * px + sin * py,
                sin,
                cos,
                py - sin * px - cos * py,
                0.0,
                0.0,
                1.0,
            ],
        };
        *self = rot.concat(self);
    }

    /// Scale the mapped result about a pivot.
    pub fn post_scale(&mut self, sx: f32, sy: f32, px: f32, py: f32) {
        let scale = Self {
            m: [sx, 0.0, px - sx * px, 0.0, sy, py - sy * py, 0.0, 0.0, 1.0],
        };
        *self = scale.concat(self);
    }

    /// `self * other` (apply `other` first, then `self`).
    pub fn concat(&self, other: &Matrix) -> Self {
        let a = &self.m;
        let b = &other.m;
        let mut out = [0.0f32; 9];
        for row in 0..3 {
            for col in 0..3 {
                out[row * 3 + col] = a[row * 3] * b[col]
                    + a[row * 3 + 1] * b[3 + col]
                    + a[row * 3 + 2] * b[6 + col];
            }
        }
        Self { m: out }
    }

    /// Map a point through the transform.
    pub fn map_point(&self, x: f32, y: f32) -> (f32, f32) {
        let m = &self.m;
        (
            m[0] * x + m[1] * y + m[2],
            m[3] * x + m[4] * y + m[5],
        )
    }
}
