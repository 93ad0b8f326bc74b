use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::common::config::LayoutMode;
use crate::layout_engine::{LayoutCommand, LayoutError, LayoutOp};
use crate::model::{View, ViewId};
use crate::output::OutputRegistry;

/// Layout policy a view currently lives under.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    #[default]
    Floating,
    Tiling,
    Maximized,
    Fullscreen,
}

impl LayoutKind {
    pub const ALL: [LayoutKind; 4] = [
        LayoutKind::Floating,
        LayoutKind::Tiling,
        LayoutKind::Maximized,
        LayoutKind::Fullscreen,
    ];

    pub fn index(self) -> usize {
        match self {
            LayoutKind::Floating => 0,
            LayoutKind::Tiling => 1,
            LayoutKind::Maximized => 2,
            LayoutKind::Fullscreen => 3,
        }
    }
}

impl From<LayoutMode> for LayoutKind {
    fn from(mode: LayoutMode) -> Self {
        match mode {
            LayoutMode::Floating => LayoutKind::Floating,
            LayoutMode::Tiling => LayoutKind::Tiling,
        }
    }
}

/// Read-only inputs for one layout pass. Built fresh per command; output
/// geometry is read through it rather than cached in the variants.
#[derive(Clone, Copy)]
pub struct LayoutCtx<'a> {
    pub views: &'a SlotMap<ViewId, View>,
    pub outputs: &'a OutputRegistry,
    /// Most recently focused view of the owning workspace; the tiling insert
    /// point derives from it.
    pub focused: Option<ViewId>,
}

/// The single entry point every layout variant implements: translate one
/// command plus an optional target view into a bounded batch of geometry
/// assignments appended to `ops`. A variant that has no use for a command
/// appends nothing and must not mutate its state.
#[enum_dispatch]
pub trait Layout {
    fn kind(&self) -> LayoutKind;

    fn apply(
        &mut self,
        cmd: &LayoutCommand,
        view: Option<ViewId>,
        ctx: LayoutCtx<'_>,
        ops: &mut Vec<LayoutOp>,
    ) -> Result<(), LayoutError>;
}

mod floating;
pub use floating::FloatingLayout;
mod tiling;
pub use tiling::{MAX_LEVEL, TilingLayout};
mod maximized;
pub use maximized::MaximizedLayout;
mod fullscreen;
pub use fullscreen::FullscreenLayout;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[enum_dispatch(Layout)]
pub enum LayoutVariant {
    Floating(FloatingLayout),
    Tiling(TilingLayout),
    Maximized(MaximizedLayout),
    Fullscreen(FullscreenLayout),
}

impl LayoutVariant {
    /// One instance of every variant, indexable by [`LayoutKind::index`].
    pub fn full_set() -> [LayoutVariant; 4] {
        [
            FloatingLayout::default().into(),
            TilingLayout::default().into(),
            MaximizedLayout::default().into(),
            FullscreenLayout::default().into(),
        ]
    }
}

/// Resolve the view a command targets, for commands that require one.
pub(crate) fn require_view(view: Option<ViewId>) -> Result<ViewId, LayoutError> {
    view.ok_or(LayoutError::InvalidOperation("command requires a target view"))
}
