use slotmap::SlotMap;
use strum::IntoEnumIterator;
use strum_macros::EnumIter;
use tracing::{debug, warn};

use crate::common::collections::VecDeque;
use crate::geometry::Rect;
use crate::layout_engine::{
    Layout, LayoutCommand, LayoutCtx, LayoutError, LayoutKind, LayoutOp, LayoutVariant,
    TilingLayout, reserve_ops,
};
use crate::model::{View, ViewId, ViewState};
use crate::output::{OutputHandle, OutputRegistry};

/// Stacking layers, bottom to top. Purely about draw/stacking order,
/// orthogonal to layout geometry. `Hidden` is not drawn at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter)]
pub enum Layer {
    Hidden,
    FullscreenBack,
    Back,
    Mid,
    Front,
    Fullscreen,
}

impl Layer {
    pub const COUNT: usize = 6;

    pub fn index(self) -> usize {
        match self {
            Layer::Hidden => 0,
            Layer::FullscreenBack => 1,
            Layer::Back => 2,
            Layer::Mid => 3,
            Layer::Front => 4,
            Layer::Fullscreen => 5,
        }
    }

    /// The layer a view of the given policy stacks in by default.
    pub fn for_kind(kind: LayoutKind) -> Layer {
        match kind {
            LayoutKind::Floating => Layer::Front,
            LayoutKind::Tiling => Layer::Mid,
            LayoutKind::Maximized => Layer::Front,
            LayoutKind::Fullscreen => Layer::Fullscreen,
        }
    }
}

/// One virtual desktop: a recency-ordered view list, six stacking layers,
/// and one instance of each layout policy.
#[derive(Debug)]
pub struct Workspace {
    index: usize,
    active: bool,
    current_layout: LayoutKind,
    layouts: [LayoutVariant; 4],
    /// Most-recently-focused first.
    recent_views: VecDeque<ViewId>,
    /// Within a layer, the last element is topmost.
    layers: [Vec<ViewId>; Layer::COUNT],
}

impl Workspace {
    pub fn new(index: usize, current_layout: LayoutKind) -> Self {
        Self {
            index,
            active: false,
            current_layout,
            layouts: LayoutVariant::full_set(),
            recent_views: VecDeque::new(),
            layers: Default::default(),
        }
    }

    pub fn index(&self) -> usize { self.index }

    pub fn is_active(&self) -> bool { self.active }

    pub fn current_layout(&self) -> LayoutKind { self.current_layout }

    pub fn set_current_layout(&mut self, kind: LayoutKind) { self.current_layout = kind; }

    pub fn len(&self) -> usize { self.recent_views.len() }

    pub fn is_empty(&self) -> bool { self.recent_views.is_empty() }

    pub fn contains(&self, view: ViewId) -> bool { self.recent_views.contains(&view) }

    /// Views in focus-recency order, most recent first.
    pub fn views(&self) -> impl Iterator<Item = ViewId> + '_ {
        self.recent_views.iter().copied()
    }

    pub fn top_view(&self) -> Option<ViewId> { self.recent_views.front().copied() }

    pub fn layer_of(&self, view: ViewId) -> Option<Layer> {
        Layer::iter().find(|l| self.layers[l.index()].contains(&view))
    }

    /// Draw order for the renderer: every visible layer bottom to top,
    /// views within a layer bottom to top. Hidden views are skipped.
    pub fn stacking_order(&self) -> impl Iterator<Item = ViewId> + '_ {
        Layer::iter()
            .filter(|&l| l != Layer::Hidden)
            .flat_map(|l| self.layers[l.index()].iter().copied())
    }

    pub fn tiling(&self) -> &TilingLayout {
        match &self.layouts[LayoutKind::Tiling.index()] {
            LayoutVariant::Tiling(tiling) => tiling,
            _ => unreachable!("layout slots are keyed by kind"),
        }
    }

    pub(crate) fn activate(&mut self) { self.active = true; }

    pub(crate) fn deactivate(&mut self) { self.active = false; }

    /// Dispatch one command into the given policy instance and apply the
    /// resulting geometry batch, in emission order, to the views.
    fn run_layout(
        &mut self,
        kind: LayoutKind,
        cmd: &LayoutCommand,
        view: Option<ViewId>,
        views: &mut SlotMap<ViewId, View>,
        outputs: &OutputRegistry,
        ops: &mut Vec<LayoutOp>,
    ) -> Result<(), LayoutError> {
        let start = ops.len();
        {
            let ctx = LayoutCtx {
                views: &*views,
                outputs,
                focused: self.recent_views.front().copied(),
            };
            self.layouts[kind.index()].apply(cmd, view, ctx, ops)?;
        }
        for op in &ops[start..] {
            let Some(v) = views.get_mut(op.view) else {
                warn!(view = ?op.view, "layout emitted an op for an unknown view");
                continue;
            };
            v.position = op.pos;
            v.planned = op.size;
            if v.kind == LayoutKind::Tiling {
                v.state |= ViewState::TILED_ALL;
            } else {
                v.state &= !ViewState::TILED_ALL;
            }
        }
        Ok(())
    }

    /// A tiling delete for a view the tree never accepted must stay a no-op
    /// rather than a caller-bug error.
    fn run_layout_del(
        &mut self,
        kind: LayoutKind,
        view: ViewId,
        views: &mut SlotMap<ViewId, View>,
        outputs: &OutputRegistry,
        ops: &mut Vec<LayoutOp>,
    ) -> Result<(), LayoutError> {
        if kind == LayoutKind::Tiling && !self.tiling().contains_view(view) {
            return Ok(());
        }
        self.run_layout(kind, &LayoutCommand::Del, Some(view), views, outputs, ops)
    }

    fn remove_from_layers(&mut self, view: ViewId) {
        for layer in &mut self.layers {
            layer.retain(|&v| v != view);
        }
    }

    fn raise_in_layer(&mut self, layer: Layer, view: ViewId) {
        self.remove_from_layers(view);
        self.layers[layer.index()].push(view);
    }

    /// Track a new view under its current policy, place it in the matching
    /// layer, and focus it. A caller-supplied rectangle (e.g. restored from
    /// a backup) overrides the policy's own placement.
    pub fn add_view(
        &mut self,
        view: ViewId,
        default: Option<Rect>,
        views: &mut SlotMap<ViewId, View>,
        outputs: &OutputRegistry,
        ops: &mut Vec<LayoutOp>,
    ) -> Result<(), LayoutError> {
        let kind = views.get(view).ok_or(LayoutError::UnknownView(view))?.kind;
        reserve_ops(ops, self.recent_views.len() + 1);
        self.run_layout(kind, &LayoutCommand::Add { default }, Some(view), views, outputs, ops)?;

        if let Some(v) = views.get_mut(view) {
            v.added = true;
        }
        if !self.recent_views.contains(&view) {
            self.recent_views.push_front(view);
        }
        self.raise_in_layer(Layer::for_kind(kind), view);
        self.focus_view(view, views);
        debug!(workspace = self.index, ?view, ?kind, "added view");
        Ok(())
    }

    pub fn remove_view(
        &mut self,
        view: ViewId,
        views: &mut SlotMap<ViewId, View>,
        outputs: &OutputRegistry,
        ops: &mut Vec<LayoutOp>,
    ) -> Result<(), LayoutError> {
        let kind = views.get(view).ok_or(LayoutError::UnknownView(view))?.kind;
        reserve_ops(ops, self.recent_views.len());
        self.run_layout_del(kind, view, views, outputs, ops)?;

        self.remove_from_layers(view);
        self.recent_views.retain(|&v| v != view);
        if let Some(v) = views.get_mut(view) {
            v.added = false;
            v.state &= !ViewState::FOCUSED;
        }
        debug!(workspace = self.index, ?view, "removed view");
        Ok(())
    }

    /// Raise the view within its layer and mark it most recent. Focusing a
    /// tiled view first drops every floating view to the back layer:
    /// floating only sits above tiling while actively interacted with.
    pub fn focus_view(&mut self, view: ViewId, views: &mut SlotMap<ViewId, View>) {
        let Some(kind) = views.get(view).map(|v| v.kind) else {
            warn!(?view, "cannot focus unknown view");
            return;
        };
        if kind == LayoutKind::Tiling {
            let floating: Vec<ViewId> = self.layers[Layer::Front.index()]
                .iter()
                .copied()
                .filter(|&v| views.get(v).is_some_and(|w| w.kind == LayoutKind::Floating))
                .collect();
            for v in floating {
                self.raise_in_layer(Layer::Back, v);
            }
        }

        if let Some(&old) = self.recent_views.front() {
            if old != view {
                if let Some(v) = views.get_mut(old) {
                    v.state &= !ViewState::FOCUSED;
                }
            }
        }

        self.raise_in_layer(Layer::for_kind(kind), view);
        self.recent_views.retain(|&v| v != view);
        self.recent_views.push_front(view);
        if let Some(v) = views.get_mut(view) {
            v.state |= ViewState::FOCUSED;
        }
    }

    /// Push the view to the back of the recency order, handing focus to the
    /// next most recent view, which is returned.
    pub fn defocus_view(
        &mut self,
        view: ViewId,
        views: &mut SlotMap<ViewId, View>,
    ) -> Option<ViewId> {
        if let Some(v) = views.get_mut(view) {
            v.state &= !ViewState::FOCUSED;
        }
        self.recent_views.retain(|&v| v != view);
        self.recent_views.push_back(view);
        let next = self.recent_views.front().copied().filter(|&v| v != view);
        if let Some(next) = next {
            if let Some(v) = views.get_mut(next) {
                v.state |= ViewState::FOCUSED;
            }
        }
        next
    }

    /// Toggle a view in or out of fullscreen. Enabling backs up the current
    /// geometry and policy; disabling restores both the same way, by
    /// removing the view from its policy and re-adding it through the other.
    pub fn fullscreen_view(
        &mut self,
        view: ViewId,
        output: Option<OutputHandle>,
        enable: bool,
        views: &mut SlotMap<ViewId, View>,
        outputs: &OutputRegistry,
        ops: &mut Vec<LayoutOp>,
    ) -> Result<(), LayoutError> {
        self.toggle_special(view, LayoutKind::Fullscreen, output, enable, views, outputs, ops)
    }

    pub fn maximize_view(
        &mut self,
        view: ViewId,
        enable: bool,
        views: &mut SlotMap<ViewId, View>,
        outputs: &OutputRegistry,
        ops: &mut Vec<LayoutOp>,
    ) -> Result<(), LayoutError> {
        self.toggle_special(view, LayoutKind::Maximized, None, enable, views, outputs, ops)
    }

    fn toggle_special(
        &mut self,
        view: ViewId,
        target: LayoutKind,
        output: Option<OutputHandle>,
        enable: bool,
        views: &mut SlotMap<ViewId, View>,
        outputs: &OutputRegistry,
        ops: &mut Vec<LayoutOp>,
    ) -> Result<(), LayoutError> {
        let Some(v) = views.get(view) else {
            return Err(LayoutError::UnknownView(view));
        };
        let kind = v.kind;
        reserve_ops(ops, self.recent_views.len() + 1);

        if enable {
            if kind == target {
                return Ok(());
            }
            if let Some(v) = views.get_mut(view) {
                v.backup_geometry();
                if let Some(output) = output {
                    v.output = Some(output);
                }
            }
            self.run_layout_del(kind, view, views, outputs, ops)?;
            if let Some(v) = views.get_mut(view) {
                v.kind = target;
            }
            self.run_layout(
                target,
                &LayoutCommand::Add { default: None },
                Some(view),
                views,
                outputs,
                ops,
            )?;
            self.raise_in_layer(Layer::for_kind(target), view);
        } else {
            if kind != target {
                return Ok(());
            }
            let (prev, backup) = {
                let v = views.get(view).ok_or(LayoutError::UnknownView(view))?;
                (v.prev_kind, v.old_geometry)
            };
            self.run_layout_del(kind, view, views, outputs, ops)?;
            if let Some(v) = views.get_mut(view) {
                v.kind = prev;
            }
            self.run_layout(
                prev,
                &LayoutCommand::Add { default: Some(backup) },
                Some(view),
                views,
                outputs,
                ops,
            )?;
            self.raise_in_layer(Layer::for_kind(prev), view);
        }
        Ok(())
    }

    /// Hide the view: no geometry change, it just stops being drawn and
    /// hands its focus position away.
    pub fn minimize_view(
        &mut self,
        view: ViewId,
        views: &mut SlotMap<ViewId, View>,
    ) -> Option<ViewId> {
        self.raise_in_layer(Layer::Hidden, view);
        self.defocus_view(view, views)
    }

    /// Generic passthrough for split/merge/toggle/resize/deplace commands
    /// triggered by keybindings or grabs.
    pub fn run_command(
        &mut self,
        cmd: LayoutCommand,
        view: ViewId,
        views: &mut SlotMap<ViewId, View>,
        outputs: &OutputRegistry,
        ops: &mut Vec<LayoutOp>,
    ) -> Result<(), LayoutError> {
        let kind = views.get(view).ok_or(LayoutError::UnknownView(view))?.kind;
        reserve_ops(ops, self.recent_views.len());
        self.run_layout(kind, &cmd, Some(view), views, outputs, ops)
    }

    /// Output lifecycle fan-out. All policies of every workspace track every
    /// physical output, visible or not.
    pub fn on_output_added(
        &mut self,
        output: OutputHandle,
        views: &mut SlotMap<ViewId, View>,
        outputs: &OutputRegistry,
        ops: &mut Vec<LayoutOp>,
    ) {
        reserve_ops(ops, self.recent_views.len());
        for kind in LayoutKind::ALL {
            if let Err(err) =
                self.run_layout(kind, &LayoutCommand::OutputAdd(output), None, views, outputs, ops)
            {
                warn!(workspace = self.index, ?err, "output add rejected");
            }
        }
    }

    pub fn on_output_removed(
        &mut self,
        output: OutputHandle,
        views: &mut SlotMap<ViewId, View>,
        outputs: &OutputRegistry,
        ops: &mut Vec<LayoutOp>,
    ) {
        reserve_ops(ops, self.recent_views.len());
        for kind in LayoutKind::ALL {
            if let Err(err) = self.run_layout(
                kind,
                &LayoutCommand::OutputRemove(output),
                None,
                views,
                outputs,
                ops,
            ) {
                warn!(workspace = self.index, ?err, "output remove rejected");
            }
        }
    }

    /// Re-arrange everything on a resized output: the tiling tree re-splits
    /// itself, maximized and fullscreen views recompute from the new
    /// geometry.
    pub fn on_output_resized(
        &mut self,
        output: OutputHandle,
        views: &mut SlotMap<ViewId, View>,
        outputs: &OutputRegistry,
        ops: &mut Vec<LayoutOp>,
    ) {
        reserve_ops(ops, self.recent_views.len() + 2);
        for kind in LayoutKind::ALL {
            if let Err(err) = self.run_layout(
                kind,
                &LayoutCommand::OutputResize(output),
                None,
                views,
                outputs,
                ops,
            ) {
                warn!(workspace = self.index, ?err, "output resize rejected");
            }
        }

        let stale: Vec<ViewId> = self
            .recent_views
            .iter()
            .copied()
            .filter(|&v| {
                views.get(v).is_some_and(|w| {
                    w.added
                        && w.output == Some(output)
                        && matches!(w.kind, LayoutKind::Maximized | LayoutKind::Fullscreen)
                })
            })
            .collect();
        for view in stale {
            let kind = views[view].kind;
            if let Err(err) = self.run_layout(
                kind,
                &LayoutCommand::Add { default: None },
                Some(view),
                views,
                outputs,
                ops,
            ) {
                warn!(?view, ?err, "could not refresh view on resized output");
            }
        }
    }
}
