pub mod ops;
pub mod systems;

pub use ops::{Edges, LayoutCommand, LayoutOp, Orientation, reserve_ops};
pub use systems::{
    FloatingLayout, FullscreenLayout, Layout, LayoutCtx, LayoutKind, LayoutVariant,
    MaximizedLayout, TilingLayout,
};

use thiserror::Error;

use crate::model::ViewId;
use crate::output::OutputHandle;

/// Caller-bug class of failures. Structural rejections (an insert or resize
/// that would violate minimum sizes) are not errors; they simply produce an
/// empty op batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("operation not valid for the current tree state: {0}")]
    InvalidOperation(&'static str),
    #[error("view {0:?} is not tracked by this layout")]
    UnknownView(ViewId),
    #[error("output {0:?} is not registered")]
    UnknownOutput(OutputHandle),
}
