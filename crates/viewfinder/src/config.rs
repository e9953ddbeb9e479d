use viewfinder_core::prelude::{Rotation90, Size};

/// Bandwidth ceiling: the largest preview buffer requested from hardware.
pub const MAX_PREVIEW_WIDTH: u32 = 1920;
/// See `MAX_PREVIEW_WIDTH`.
pub const MAX_PREVIEW_HEIGHT: u32 = 1080;

/// Default bounds on candidate area relative to the target viewport area.
///
/// The lower bound rejects visually under-detailed buffers; the upper bound
/// rejects buffers wastefully larger than the viewport can show.
pub const DEFAULT_LOWER_AREA_RATIO: f64 = 0.25;
/// See `DEFAULT_LOWER_AREA_RATIO`.
pub const DEFAULT_UPPER_AREA_RATIO: f64 = 0.8;

const AREA_RATIO_MIN: f64 = 0.01;
const AREA_RATIO_MAX: f64 = 4.0;

/// Validated pipeline configuration.
///
/// Plain data with clamping at construction; surface changes and rotation
/// updates are explicit pipeline calls, not configuration.
///
/// # Example
/// ```rust
/// use viewfinder::PipelineConfig;
///
/// let config = PipelineConfig::new(None, 10.0, 0.1, true, Default::default(), false);
/// // Bounds are clamped and reordered.
/// assert!(config.lower_area_ratio <= config.upper_area_ratio);
/// assert!(config.upper_area_ratio <= 4.0);
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Exact output size to use when the hardware supports it verbatim.
    pub preferred_size: Option<Size>,
    /// Lower bound on candidate area / target area.
    pub lower_area_ratio: f64,
    /// Upper bound on candidate area / target area.
    pub upper_area_ratio: f64,
    /// Crop to the visual center instead of stretching a squeezed viewport.
    pub never_distorted: bool,
    /// Additional client rotation on top of the device rotation.
    pub extra_rotation: Rotation90,
    /// Mirror the preview horizontally (front-facing modules).
    pub mirror: bool,
}

impl PipelineConfig {
    pub fn new(
        preferred_size: Option<Size>,
        lower_area_ratio: f64,
        upper_area_ratio: f64,
        never_distorted: bool,
        extra_rotation: Rotation90,
        mirror: bool,
    ) -> Self {
        let mut lower = clamp_ratio(lower_area_ratio);
        let mut upper = clamp_ratio(upper_area_ratio);
        if lower > upper {
            std::mem::swap(&mut lower, &mut upper);
        }
        Self {
            preferred_size,
            lower_area_ratio: lower,
            upper_area_ratio: upper,
            never_distorted,
            extra_rotation,
            mirror,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            preferred_size: None,
            lower_area_ratio: DEFAULT_LOWER_AREA_RATIO,
            upper_area_ratio: DEFAULT_UPPER_AREA_RATIO,
            never_distorted: true,
            extra_rotation: Rotation90::Deg0,
            mirror: false,
        }
    }
}

fn clamp_ratio(ratio: f64) -> f64 {
    if ratio.is_nan() {
        return DEFAULT_LOWER_AREA_RATIO;
    }
    ratio.clamp(AREA_RATIO_MIN, AREA_RATIO_MAX)
}
