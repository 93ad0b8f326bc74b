use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::layout_engine::systems::{Layout, LayoutCtx, LayoutKind, require_view};
use crate::layout_engine::{LayoutCommand, LayoutError, LayoutOp};

/// Fills the output's raw geometry, shell-reserved area included. Unlike
/// maximize there is no caller override; fullscreen is always the whole
/// output. No per-view state.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct FullscreenLayout;

impl Layout for FullscreenLayout {
    fn kind(&self) -> LayoutKind { LayoutKind::Fullscreen }

    fn apply(
        &mut self,
        cmd: &LayoutCommand,
        view: Option<crate::model::ViewId>,
        ctx: LayoutCtx<'_>,
        ops: &mut Vec<LayoutOp>,
    ) -> Result<(), LayoutError> {
        match *cmd {
            LayoutCommand::Add { default: _ } => {
                let view = require_view(view)?;
                let v = ctx.views.get(view).ok_or(LayoutError::UnknownView(view))?;
                let output = v.output.or_else(|| ctx.outputs.first().map(|o| o.handle));
                let Some(info) = output.and_then(|h| ctx.outputs.get(h)) else {
                    warn!(?view, "no output available for fullscreen");
                    return Ok(());
                };
                ops.push(LayoutOp {
                    view,
                    pos: info.geometry.pos(),
                    size: info.geometry.size(),
                });
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use slotmap::SlotMap;

    use super::*;
    use crate::common::config::GapSettings;
    use crate::geometry::{Point, Rect, Size};
    use crate::model::view::SurfaceHandle;
    use crate::model::{View, ViewId};
    use crate::output::{OutputHandle, OutputInfo, OutputRegistry};

    #[test]
    fn ignores_the_reserved_area_and_any_default() {
        let mut outputs = OutputRegistry::new();
        outputs.add(OutputInfo::new(
            OutputHandle(1),
            Rect::new(0, 0, 1920, 1080),
            GapSettings::default(),
        ));
        outputs.set_desktop_area(OutputHandle(1), Rect::new(0, 40, 1920, 1040));

        let mut views: SlotMap<ViewId, View> = SlotMap::default();
        let mut view = View::new(SurfaceHandle(1), LayoutKind::Fullscreen);
        view.output = Some(OutputHandle(1));
        let id = views.insert(view);

        let mut layout = FullscreenLayout;
        let mut ops = Vec::new();
        layout
            .apply(
                &LayoutCommand::Add { default: Some(Rect::new(1, 2, 3, 4)) },
                Some(id),
                LayoutCtx {
                    views: &views,
                    outputs: &outputs,
                    focused: None,
                },
                &mut ops,
            )
            .unwrap();

        assert_eq!(ops[0].pos, Point::new(0, 0));
        assert_eq!(ops[0].size, Size::new(1920, 1080));
    }
}
