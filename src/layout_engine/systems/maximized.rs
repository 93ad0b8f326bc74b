use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::layout_engine::systems::{Layout, LayoutCtx, LayoutKind, require_view};
use crate::layout_engine::{LayoutCommand, LayoutError, LayoutOp};

/// Fills the output's usable desktop area (or a caller-supplied rectangle).
/// No per-view state: every add recomputes from the output.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MaximizedLayout;

impl Layout for MaximizedLayout {
    fn kind(&self) -> LayoutKind { LayoutKind::Maximized }

    fn apply(
        &mut self,
        cmd: &LayoutCommand,
        view: Option<crate::model::ViewId>,
        ctx: LayoutCtx<'_>,
        ops: &mut Vec<LayoutOp>,
    ) -> Result<(), LayoutError> {
        match *cmd {
            LayoutCommand::Add { default } => {
                let view = require_view(view)?;
                let v = ctx.views.get(view).ok_or(LayoutError::UnknownView(view))?;
                let rect = match default {
                    Some(rect) => rect,
                    None => {
                        let output = v.output.or_else(|| ctx.outputs.first().map(|o| o.handle));
                        let Some(info) = output.and_then(|h| ctx.outputs.get(h)) else {
                            warn!(?view, "no output available to maximize onto");
                            return Ok(());
                        };
                        info.desktop_area
                    }
                };
                ops.push(LayoutOp {
                    view,
                    pos: rect.pos(),
                    size: rect.size(),
                });
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
