#![doc = include_str!("../README.md")]

pub mod geometry;
pub mod mailbox;
pub mod matrix;
pub mod metrics;
pub mod rotation;

pub mod prelude {
    pub use crate::{
        geometry::{GeometryError, RectF, Size, ViewportGeometry},
        mailbox::{mailbox, LatestSlot, MailboxReceiver, MailboxSender, PostOutcome},
        matrix::Matrix,
        metrics::{Counter, StageTimer},
        rotation::{rotation_offset, Rotation90, RotationState},
    };
}
