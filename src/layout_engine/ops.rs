use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect, Size};
use crate::model::ViewId;
use crate::output::OutputHandle;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    pub fn flipped(self) -> Self {
        match self {
            Orientation::Horizontal => Orientation::Vertical,
            Orientation::Vertical => Orientation::Horizontal,
        }
    }
}

bitflags! {
    /// Edges being dragged during an interactive resize.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Edges: u32 {
        const TOP = 1 << 0;
        const BOTTOM = 1 << 1;
        const LEFT = 1 << 2;
        const RIGHT = 1 << 3;
    }
}

/// The single command surface every layout variant implements. Commands a
/// variant has no use for are explicit no-ops, never silent state changes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LayoutCommand {
    Focus,
    /// `default` carries a caller-supplied rectangle, e.g. restored from a
    /// geometry backup. Without it the variant computes placement fresh.
    Add { default: Option<Rect> },
    Del,
    Deplace { dx: i32, dy: i32 },
    Toggle,
    Resize { dx: i32, dy: i32, edges: Edges },
    VSplit,
    HSplit,
    Merge,
    OutputAdd(OutputHandle),
    OutputRemove(OutputHandle),
    OutputResize(OutputHandle),
}

/// One geometry assignment produced by a layout pass. Batches are applied in
/// emission order; later entries may assume earlier sibling geometry is
/// already consistent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutOp {
    pub view: ViewId,
    pub pos: Point,
    pub size: Size,
}

/// Prepare the reusable scratch buffer for one layout pass: capacity for
/// every view plus slack, so the hot path never reallocates mid-traversal.
pub fn reserve_ops(ops: &mut Vec<LayoutOp>, view_count: usize) {
    ops.clear();
    ops.reserve(view_count + 2);
}
