use bitflags::bitflags;
use slotmap::new_key_type;

use crate::geometry::{Point, Rect, Size};
use crate::layout_engine::LayoutKind;
use crate::output::OutputHandle;

new_key_type! { pub struct ViewId; }

/// Opaque handle to a desktop surface owned by the surface provider. The core
/// never dereferences it; it only hands it back in configure requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceHandle(pub u64);

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ViewState: u32 {
        const TILED_LEFT = 1 << 0;
        const TILED_RIGHT = 1 << 1;
        const TILED_TOP = 1 << 2;
        const TILED_BOTTOM = 1 << 3;
        const FOCUSED = 1 << 4;
    }
}

impl ViewState {
    pub const TILED_ALL: ViewState = ViewState::TILED_LEFT
        .union(ViewState::TILED_RIGHT)
        .union(ViewState::TILED_TOP)
        .union(ViewState::TILED_BOTTOM);
}

/// One mapped application window. Owned exclusively by the desktop
/// controller; workspaces and layout trees refer to it by [`ViewId`] only,
/// since a view moves between layouts without being destroyed.
#[derive(Clone, Debug)]
pub struct View {
    pub surface: SurfaceHandle,
    pub output: Option<OutputHandle>,
    pub position: Point,
    /// The size layout wants. The client may answer with something else; the
    /// next commit is authoritative for what actually got drawn.
    pub planned: Size,
    pub state: ViewState,
    pub kind: LayoutKind,
    /// Layout to restore when toggling out of fullscreen/maximized.
    pub prev_kind: LayoutKind,
    /// Geometry backup used to restore the pre-toggle rectangle.
    pub old_geometry: Rect,
    /// True while the view is tracked by a workspace.
    pub added: bool,
    pub mapped: bool,
}

impl View {
    pub fn new(surface: SurfaceHandle, kind: LayoutKind) -> Self {
        Self {
            surface,
            output: None,
            position: Point::default(),
            planned: Size::default(),
            state: ViewState::empty(),
            kind,
            prev_kind: kind,
            old_geometry: Rect::default(),
            added: false,
            mapped: false,
        }
    }

    pub fn rect(&self) -> Rect { Rect::from_parts(self.position, self.planned) }

    pub fn set_rect(&mut self, rect: Rect) {
        self.position = rect.pos();
        self.planned = rect.size();
    }

    /// Snapshot current geometry and policy before a fullscreen/maximize
    /// toggle so both can be restored afterwards.
    pub fn backup_geometry(&mut self) {
        self.old_geometry = self.rect();
        self.prev_kind = self.kind;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_and_restore_round_trip() {
        let mut view = View::new(SurfaceHandle(7), LayoutKind::Floating);
        view.set_rect(Rect::new(10, 20, 300, 200));
        view.backup_geometry();

        view.kind = LayoutKind::Fullscreen;
        view.set_rect(Rect::new(0, 0, 1920, 1080));

        assert_eq!(view.old_geometry, Rect::new(10, 20, 300, 200));
        assert_eq!(view.prev_kind, LayoutKind::Floating);
    }

    #[test]
    fn tiled_all_covers_every_edge() {
        let s = ViewState::TILED_ALL;
        assert!(s.contains(ViewState::TILED_LEFT));
        assert!(s.contains(ViewState::TILED_RIGHT));
        assert!(s.contains(ViewState::TILED_TOP));
        assert!(s.contains(ViewState::TILED_BOTTOM));
        assert!(!s.contains(ViewState::FOCUSED));
    }
}
