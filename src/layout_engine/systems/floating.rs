use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::geometry::Rect;
use crate::layout_engine::systems::{Layout, LayoutCtx, LayoutKind, require_view};
use crate::layout_engine::{Edges, LayoutCommand, LayoutError, LayoutOp};
use crate::model::ViewId;

/// Floating views never shrink below this when dragged.
const MIN_FLOATING_EXTENT: i32 = 1;

/// Free placement. Geometry lives on the views themselves; this variant only
/// translates commands into new rectangles.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct FloatingLayout;

impl FloatingLayout {
    fn add_view(
        &self,
        view: ViewId,
        default: Option<Rect>,
        ctx: &LayoutCtx<'_>,
        ops: &mut Vec<LayoutOp>,
    ) -> Result<(), LayoutError> {
        let v = ctx.views.get(view).ok_or(LayoutError::UnknownView(view))?;
        let rect = match default {
            Some(rect) => rect,
            None => {
                let output = v.output.or_else(|| ctx.outputs.first().map(|o| o.handle));
                let Some(info) = output.and_then(|h| ctx.outputs.get(h)) else {
                    warn!(?view, "no output available for floating placement");
                    return Ok(());
                };
                // An unset planned size centers a zero-extent rect, leaving
                // the client's natural size in effect.
                info.desktop_area.center_rect(v.planned)
            }
        };
        ops.push(LayoutOp {
            view,
            pos: rect.pos(),
            size: rect.size(),
        });
        Ok(())
    }

    fn deplace_view(
        &self,
        view: ViewId,
        dx: i32,
        dy: i32,
        ctx: &LayoutCtx<'_>,
        ops: &mut Vec<LayoutOp>,
    ) -> Result<(), LayoutError> {
        let v = ctx.views.get(view).ok_or(LayoutError::UnknownView(view))?;
        ops.push(LayoutOp {
            view,
            pos: v.position.offset(dx, dy),
            size: v.planned,
        });
        Ok(())
    }

    fn resize_view(
        &self,
        view: ViewId,
        dx: i32,
        dy: i32,
        edges: Edges,
        ctx: &LayoutCtx<'_>,
        ops: &mut Vec<LayoutOp>,
    ) -> Result<(), LayoutError> {
        let v = ctx.views.get(view).ok_or(LayoutError::UnknownView(view))?;
        let mut rect = v.rect();

        if edges.contains(Edges::LEFT) {
            let dx = dx.min(rect.width - MIN_FLOATING_EXTENT);
            rect.x += dx;
            rect.width -= dx;
        } else if edges.contains(Edges::RIGHT) {
            rect.width = (rect.width + dx).max(MIN_FLOATING_EXTENT);
        }
        if edges.contains(Edges::TOP) {
            let dy = dy.min(rect.height - MIN_FLOATING_EXTENT);
            rect.y += dy;
            rect.height -= dy;
        } else if edges.contains(Edges::BOTTOM) {
            rect.height = (rect.height + dy).max(MIN_FLOATING_EXTENT);
        }

        ops.push(LayoutOp {
            view,
            pos: rect.pos(),
            size: rect.size(),
        });
        Ok(())
    }
}

impl Layout for FloatingLayout {
    fn kind(&self) -> LayoutKind { LayoutKind::Floating }

    fn apply(
        &mut self,
        cmd: &LayoutCommand,
        view: Option<ViewId>,
        ctx: LayoutCtx<'_>,
        ops: &mut Vec<LayoutOp>,
    ) -> Result<(), LayoutError> {
        match *cmd {
            LayoutCommand::Add { default } => {
                self.add_view(require_view(view)?, default, &ctx, ops)
            }
            LayoutCommand::Deplace { dx, dy } => {
                self.deplace_view(require_view(view)?, dx, dy, &ctx, ops)
            }
            LayoutCommand::Resize { dx, dy, edges } => {
                self.resize_view(require_view(view)?, dx, dy, edges, &ctx, ops)
            }
            // Floating geometry has no tree to maintain; everything else is
            // bookkeeping the workspace handles.
            LayoutCommand::Focus
            | LayoutCommand::Del
            | LayoutCommand::Toggle
            | LayoutCommand::VSplit
            | LayoutCommand::HSplit
            | LayoutCommand::Merge
            | LayoutCommand::OutputAdd(_)
            | LayoutCommand::OutputRemove(_)
            | LayoutCommand::OutputResize(_) => Ok(()),
        }
    }
}
