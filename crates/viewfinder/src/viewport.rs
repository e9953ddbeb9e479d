//! Affine transform computation for rendering the preview in a viewport.

use viewfinder_core::prelude::{Matrix, RectF, RotationState, ViewportGeometry};

/// Result of a transform computation.
///
/// The translations echo the layout compression the viewport widget must
/// apply to itself; they come straight from the reported geometry and close
/// the two-way coupling between widget layout and transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportTransform {
    pub matrix: Matrix,
    pub x_translation: f32,
    pub y_translation: f32,
}

/// Compute the matrix that renders the preview into the viewport.
///
/// The destination rectangle starts as the viewport rectangle, transposed
/// and re-centered for quarter-turn rotations where the image's natural axes
/// are perpendicular to the viewport's. In never-distorted mode a viewport
/// that layout compressed along one axis gets its destination inflated so the
/// render still shows the visual center of the source instead of a stretched
/// or off-center crop. The viewport rectangle is then mapped onto the
/// destination and rotated about the viewport center.
///
/// Pure and deterministic; callers re-invoke it whenever the widget reports
/// final dimensions after layout.
///
/// # Example
/// ```rust
/// use viewfinder::viewport::compute;
/// use viewfinder_core::prelude::{RotationState, ViewportGeometry};
///
/// let transform = compute(640, 480, &RotationState::default(), true,
///                         &ViewportGeometry::new(640, 480));
/// assert!(transform.matrix.is_identity());
/// ```
pub fn compute(
    viewport_width: u32,
    viewport_height: u32,
    rotation: &RotationState,
    never_distorted: bool,
    geometry: &ViewportGeometry,
) -> ViewportTransform {
    let w = viewport_width as f32;
    let h = viewport_height as f32;
    let total = rotation.total_rotation();
    let view = RectF::from_dims(w, h);

    let mut dst = if total.is_quarter_turn() {
        // Swapped axes, re-centered over the viewport center.
        let mut rect = RectF::from_dims(h, w);
        rect.offset((w - h) / 2.0, (h - w) / 2.0);
        rect
    } else {
        view
    };

    if never_distorted {
        let x_translation = geometry.x_translation();
        let y_translation = geometry.y_translation();
        if x_translation < 0.0 {
            // Horizontally compressed viewport: grow the destination so the
            // uniform fill keeps the source's visual center on screen.
            let inflate = (w * h / (w + x_translation) - h) / 2.0;
            if total.is_quarter_turn() {
                dst.inset(-inflate, 0.0);
            } else {
                dst.inset(0.0, -inflate);
            }
        } else if y_translation < 0.0 {
            let inflate = (w * h / (h + y_translation) - w) / 2.0;
            if total.is_quarter_turn() {
                dst.inset(0.0, -inflate);
            } else {
                dst.inset(-inflate, 0.0);
            }
        }
    }

    let mut matrix = Matrix::rect_to_rect(view, dst).unwrap_or_else(Matrix::identity);
    matrix.post_rotate(total, view.center_x(), view.center_y());

    ViewportTransform {
        matrix,
        x_translation: geometry.x_translation(),
        y_translation: geometry.y_translation(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use viewfinder_core::prelude::Rotation90;

    fn rotation(device: Rotation90, sensor: Rotation90) -> RotationState {
        RotationState {
            device,
            extra: Rotation90::Deg0,
            sensor,
        }
    }

    #[test]
    fn untranslated_unrotated_is_identity() {
        let transform = compute(
            1080,
            1920,
            &rotation(Rotation90::Deg0, Rotation90::Deg0),
            true,
            &ViewportGeometry::new(1080, 1920),
        );
        assert!(transform.matrix.is_identity());
        assert_eq!(transform.x_translation, 0.0);
        assert_eq!(transform.y_translation, 0.0);
    }

    #[test]
    fn deterministic_for_identical_inputs() {
        let geometry = ViewportGeometry::with_translation(1080, 1920, -64.0, 0.0).unwrap();
        for device in [
            Rotation90::Deg0,
            Rotation90::Deg90,
            Rotation90::Deg180,
            Rotation90::Deg270,
        ] {
            let state = rotation(device, Rotation90::Deg90);
            let a = compute(1080, 1920, &state, true, &geometry);
            let b = compute(1080, 1920, &state, true, &geometry);
            assert_eq!(a.matrix.values(), b.matrix.values());
        }
    }

    #[test]
    fn quarter_turn_maps_corners_onto_viewport() {
        // 90-degree total rotation on a square viewport: the transform keeps
        // the viewport covered, with corners rotated around the center.
        let transform = compute(
            400,
            400,
            &rotation(Rotation90::Deg90, Rotation90::Deg0),
            true,
            &ViewportGeometry::new(400, 400),
        );
        // total = offset(90) = 270 degrees about (200, 200).
        let (x, y) = transform.matrix.map_point(200.0, 200.0);
        assert_eq!((x, y), (200.0, 200.0));
        let (x, y) = transform.matrix.map_point(0.0, 0.0);
        assert_eq!((x, y), (0.0, 400.0));
    }

    #[test]
    fn quarter_turn_rect_is_recentered() {
        // Portrait viewport with a sideways destination: the corner of the
        // un-rotated viewport maps into the swapped, re-centered rectangle.
        let transform = compute(
            100,
            200,
            &rotation(Rotation90::Deg90, Rotation90::Deg0),
            false,
            &ViewportGeometry::new(100, 200),
        );
        // Destination before rotation spans (-50, 50)..(150, 150); the top
        // left of the viewport maps there, then rotates by 270 about center.
        let (x, y) = transform.matrix.map_point(50.0, 100.0);
        assert_eq!((x, y), (50.0, 100.0));
    }

    #[test]
    fn horizontal_compression_inflates_vertically_when_upright() {
        let w = 1000.0f32;
        let h = 2000.0f32;
        let tx = -200.0f32;
        let geometry = ViewportGeometry::with_translation(1000, 2000, tx, 0.0).unwrap();
        let transform = compute(
            1000,
            2000,
            &rotation(Rotation90::Deg0, Rotation90::Deg0),
            true,
            &geometry,
        );
        let inflate = (w * h / (w + tx) - h) / 2.0;
        // Vertical axis grows by `inflate` on each side; horizontal is
        // untouched, so the y scale exceeds 1 while x stays 1.
        let values = transform.matrix.values();
        assert_eq!(values[0], 1.0);
        assert_eq!(values[4], (h + 2.0 * inflate) / h);
        // Top edge moves up by the inflation.
        let (_, y) = transform.matrix.map_point(0.0, 0.0);
        assert_eq!(y, -inflate);
    }

    #[test]
    fn distortion_allowed_skips_inflation() {
        let geometry = ViewportGeometry::with_translation(1000, 2000, -200.0, 0.0).unwrap();
        let transform = compute(
            1000,
            2000,
            &rotation(Rotation90::Deg0, Rotation90::Deg0),
            false,
            &geometry,
        );
        assert!(transform.matrix.is_identity());
        // The side channel still reports the layout compression.
        assert_eq!(transform.x_translation, -200.0);
    }

    #[test]
    fn vertical_compression_inflates_horizontally_when_upright() {
        let w = 1000.0f32;
        let h = 2000.0f32;
        let ty = -100.0f32;
        let geometry = ViewportGeometry::with_translation(1000, 2000, 0.0, ty).unwrap();
        let transform = compute(
            1000,
            2000,
            &rotation(Rotation90::Deg0, Rotation90::Deg0),
            true,
            &geometry,
        );
        let inflate = (w * h / (h + ty) - w) / 2.0;
        let values = transform.matrix.values();
        assert_eq!(values[0], (w + 2.0 * inflate) / w);
        assert_eq!(values[4], 1.0);
    }
}
