//! Output-size selection against hardware constraints and a target viewport.

use tracing::debug;
use viewfinder_core::prelude::{RotationState, Size};

use crate::config::{MAX_PREVIEW_HEIGHT, MAX_PREVIEW_WIDTH};
use crate::error::PipelineError;

/// Pick one supported output size for the given viewport.
///
/// `candidates` comes from the hardware capability list, sorted by resolution
/// descending. A `preferred` size present verbatim in the list always wins.
/// Otherwise candidates are held to the bandwidth ceiling and to
/// `[lower_area_ratio, upper_area_ratio]` of the target area, and the
/// closest aspect-ratio match is chosen; ties keep the first (largest)
/// candidate. When nothing passes the filters, the first candidate under the
/// ceiling is used, or the first candidate outright if even that fails.
///
/// # Example
/// ```rust
/// use viewfinder::selector::choose_preview_size;
/// use viewfinder_core::prelude::{RotationState, Size};
///
/// let candidates = [Size::new(1280, 720).unwrap(), Size::new(640, 480).unwrap()];
/// let chosen = choose_preview_size(
///     &candidates,
///     1280,
///     720,
///     &RotationState::default(),
///     None,
///     0.25,
///     1.5,
/// )
/// .unwrap();
/// assert_eq!(chosen, candidates[0]);
/// ```
pub fn choose_preview_size(
    candidates: &[Size],
    target_width: u32,
    target_height: u32,
    rotation: &RotationState,
    preferred: Option<Size>,
    lower_area_ratio: f64,
    upper_area_ratio: f64,
) -> Result<Size, PipelineError> {
    if candidates.is_empty() {
        return Err(PipelineError::NoSupportedSize);
    }

    // Explicit client intent overrides all heuristics.
    if let Some(preferred) = preferred {
        if candidates.contains(&preferred) {
            return Ok(preferred);
        }
    }

    // Candidates are sensor-relative; a sideways sensor means the viewport
    // axes must be exchanged before matching.
    let (target_width, target_height) = if rotation.dimension_swap() {
        (target_height, target_width)
    } else {
        (target_width, target_height)
    };
    let target_area = target_width as f64 * target_height as f64;
    if target_area <= 0.0 {
        return Err(PipelineError::NoSupportedSize);
    }

    let view_ratio = {
        let ratio = target_width as f64 / target_height as f64;
        ratio.min(1.0 / ratio)
    };

    // Baseline: the biggest size the bandwidth ceiling allows, falling back
    // to the biggest size outright.
    let baseline = candidates
        .iter()
        .copied()
        .find(within_ceiling)
        .unwrap_or(candidates[0]);

    let mut best: Option<(Size, f64)> = None;
    for &candidate in candidates {
        if !within_ceiling(&candidate) {
            continue;
        }
        let area_ratio = candidate.area() as f64 / target_area;
        if area_ratio < lower_area_ratio || area_ratio > upper_area_ratio {
            continue;
        }
        let aspect = if rotation.extra.is_quarter_turn() {
            candidate.landscape_ratio()
        } else {
            candidate.portrait_ratio()
        };
        let distance = (aspect - view_ratio).abs();
        // Strict comparison keeps the first (largest) candidate on ties.
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((candidate, distance));
        }
    }

    let chosen = best.map(|(size, _)| size).unwrap_or(baseline);
    debug!(%chosen, target_width, target_height, "preview size selected");
    Ok(chosen)
}

fn within_ceiling(size: &Size) -> bool {
    size.width.get() <= MAX_PREVIEW_WIDTH && size.height.get() <= MAX_PREVIEW_HEIGHT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_LOWER_AREA_RATIO, DEFAULT_UPPER_AREA_RATIO};
    use viewfinder_core::prelude::Rotation90;

    fn sizes(dims: &[(u32, u32)]) -> Vec<Size> {
        dims.iter().map(|&(w, h)| Size::new(w, h).unwrap()).collect()
    }

    fn portrait_rotation() -> RotationState {
        // Upright phone, sideways sensor: dimension swap applies.
        RotationState {
            device: Rotation90::Deg0,
            extra: Rotation90::Deg0,
            sensor: Rotation90::Deg90,
        }
    }

    #[test]
    fn empty_candidates_error() {
        let err = choose_preview_size(
            &[],
            1080,
            1920,
            &RotationState::default(),
            None,
            DEFAULT_LOWER_AREA_RATIO,
            DEFAULT_UPPER_AREA_RATIO,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::NoSupportedSize));
    }

    #[test]
    fn always_returns_a_member() {
        let candidates = sizes(&[(4032, 3024), (1920, 1080), (640, 480), (176, 144)]);
        for &(w, h) in &[(1080u32, 1920u32), (320, 240), (10, 10), (4000, 4000)] {
            let chosen = choose_preview_size(
                &candidates,
                w,
                h,
                &portrait_rotation(),
                None,
                DEFAULT_LOWER_AREA_RATIO,
                DEFAULT_UPPER_AREA_RATIO,
            )
            .unwrap();
            assert!(candidates.contains(&chosen), "{chosen} for target {w}x{h}");
        }
    }

    #[test]
    fn preferred_member_always_wins() {
        let candidates = sizes(&[(1920, 1080), (1280, 720), (640, 480)]);
        let preferred = Size::new(640, 480).unwrap();
        let chosen = choose_preview_size(
            &candidates,
            1080,
            1920,
            &portrait_rotation(),
            Some(preferred),
            DEFAULT_LOWER_AREA_RATIO,
            DEFAULT_UPPER_AREA_RATIO,
        )
        .unwrap();
        assert_eq!(chosen, preferred);
    }

    #[test]
    fn preferred_non_member_is_ignored() {
        let candidates = sizes(&[(1280, 720), (640, 480)]);
        let chosen = choose_preview_size(
            &candidates,
            720,
            1280,
            &portrait_rotation(),
            Some(Size::new(800, 600).unwrap()),
            DEFAULT_LOWER_AREA_RATIO,
            DEFAULT_UPPER_AREA_RATIO,
        )
        .unwrap();
        assert!(candidates.contains(&chosen));
        assert_ne!(chosen, Size::new(800, 600).unwrap());
    }

    #[test]
    fn ceiling_is_respected_when_satisfiable() {
        let candidates = sizes(&[(4032, 3024), (1920, 1080), (1280, 720)]);
        let chosen = choose_preview_size(
            &candidates,
            1080,
            1920,
            &portrait_rotation(),
            None,
            DEFAULT_LOWER_AREA_RATIO,
            DEFAULT_UPPER_AREA_RATIO,
        )
        .unwrap();
        assert!(chosen.width.get() <= MAX_PREVIEW_WIDTH);
        assert!(chosen.height.get() <= MAX_PREVIEW_HEIGHT);
    }

    #[test]
    fn oversized_only_list_falls_back_to_first() {
        let candidates = sizes(&[(4032, 3024), (3840, 2160)]);
        let chosen = choose_preview_size(
            &candidates,
            1080,
            1920,
            &portrait_rotation(),
            None,
            DEFAULT_LOWER_AREA_RATIO,
            DEFAULT_UPPER_AREA_RATIO,
        )
        .unwrap();
        assert_eq!(chosen, candidates[0]);
    }

    #[test]
    fn portrait_viewport_picks_area_bounded_match() {
        // Target 1080x1920 portrait, swapped to 1920x1080 sensor-relative:
        // target area 2_073_600, view ratio 0.5625.
        //   1920x1080: area ratio 1.0    -> above the 0.8 upper bound.
        //   1280x720:  area ratio 0.444  -> in bounds, aspect 0.5625, exact.
        //   640x480:   area ratio 0.148  -> below the 0.25 lower bound.
        let candidates = sizes(&[(1920, 1080), (1280, 720), (640, 480), (320, 240)]);
        let chosen = choose_preview_size(
            &candidates,
            1080,
            1920,
            &portrait_rotation(),
            None,
            DEFAULT_LOWER_AREA_RATIO,
            DEFAULT_UPPER_AREA_RATIO,
        )
        .unwrap();
        assert_eq!(chosen, Size::new(1280, 720).unwrap());
    }

    #[test]
    fn tie_break_keeps_first_candidate() {
        // Same aspect, both within bounds for a generous ratio window.
        let candidates = sizes(&[(1600, 900), (1280, 720)]);
        let chosen = choose_preview_size(
            &candidates,
            900,
            1600,
            &portrait_rotation(),
            None,
            0.1,
            2.0,
        )
        .unwrap();
        assert_eq!(chosen, candidates[0]);
    }

    #[test]
    fn quarter_turn_extra_rotation_flips_aspect_axis() {
        // With a 90-degree extra rotation the candidate aspect uses w/h, so a
        // portrait-shaped buffer matches the landscape view ratio directly.
        let candidates = sizes(&[(640, 480), (480, 640)]);
        let rotation = RotationState {
            device: Rotation90::Deg0,
            extra: Rotation90::Deg90,
            sensor: Rotation90::Deg0,
        };
        let chosen = choose_preview_size(
            &candidates,
            640,
            480,
            &rotation,
            None,
            0.1,
            2.0,
        )
        .unwrap();
        assert_eq!(chosen, Size::new(480, 640).unwrap());
    }
}
