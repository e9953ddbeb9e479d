#![doc = include_str!("../README.md")]

pub mod config;
pub mod controller;
pub mod error;
pub mod metrics;
mod reconcile;
pub mod selector;
pub mod viewport;

pub use config::PipelineConfig;
pub use controller::{spawn_worker, CameraPipeline, PipelineObserver, ViewportUpdate};
pub use error::PipelineError;
pub use metrics::PipelineMetrics;

pub mod prelude {
    pub use crate::{
        config::{
            PipelineConfig, DEFAULT_LOWER_AREA_RATIO, DEFAULT_UPPER_AREA_RATIO,
            MAX_PREVIEW_HEIGHT, MAX_PREVIEW_WIDTH,
        },
        controller::{spawn_worker, CameraPipeline, PipelineObserver, ViewportUpdate},
        error::PipelineError,
        metrics::PipelineMetrics,
        selector::choose_preview_size,
        viewport::{compute, ViewportTransform},
    };
}
