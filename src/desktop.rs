use slotmap::SlotMap;
use tracing::{debug, info, warn};

use crate::common::collections::HashMap;
use crate::common::config::{DesktopSettings, GapSettings};
use crate::geometry::Rect;
use crate::layout_engine::{Edges, LayoutCommand, LayoutKind, LayoutOp};
use crate::model::view::SurfaceHandle;
use crate::model::{View, ViewId, ViewState};
use crate::output::{OutputHandle, OutputInfo, OutputRegistry};
use crate::workspace::Workspace;

/// Outbound interface to the compositor shell. Everything the desktop core
/// decides is communicated through here; geometry is a request, not a
/// guarantee, and the next commit is authoritative.
pub trait ShellBackend {
    fn configure(&mut self, surface: SurfaceHandle, rect: Rect, state: ViewState);

    /// Keyboard focus moved to this surface.
    fn focus(&mut self, _surface: SurfaceHandle) {}

    /// The input provider should start a pointer grab feeding deltas into
    /// [`Desktop::grab_motion`] until the grab ends.
    fn start_move_grab(&mut self, _surface: SurfaceHandle) {}
    fn start_resize_grab(&mut self, _surface: SurfaceHandle, _edges: Edges) {}
    fn start_task_switch_grab(&mut self) {}
}

#[derive(Clone, Copy, Debug)]
enum GrabMode {
    Move,
    Resize(Edges),
}

#[derive(Clone, Copy, Debug)]
struct GrabState {
    view: ViewId,
    mode: GrabMode,
}

/// Follow-up work that must not run inside the provider callback that
/// triggered it. Drained by [`Desktop::dispatch_idle`] before the next input
/// event is processed.
#[derive(Clone, Copy, Debug)]
enum Deferred {
    FocusHandoff { workspace: usize },
}

/// The desktop controller: owns every view, all workspaces, and the output
/// registry, and turns provider lifecycle events into workspace and layout
/// operations. One instance per compositor, owned by the embedder's main,
/// never ambient state.
pub struct Desktop {
    settings: DesktopSettings,
    views: SlotMap<ViewId, View>,
    surfaces: HashMap<SurfaceHandle, ViewId>,
    workspaces: Vec<Workspace>,
    active: usize,
    previous: usize,
    outputs: OutputRegistry,
    /// Reusable scratch for layout batches; the hot path never allocates.
    ops: Vec<LayoutOp>,
    deferred: Vec<Deferred>,
    grab: Option<GrabState>,
}

impl Desktop {
    pub fn new(settings: DesktopSettings) -> Self {
        let count = settings.workspaces.count.clamp(1, crate::common::config::MAX_WORKSPACES);
        let mut workspaces = Vec::with_capacity(count);
        for index in 0..count {
            let kind = LayoutKind::from(settings.workspaces.layout_for(index));
            workspaces.push(Workspace::new(index, kind));
        }
        workspaces[0].activate();
        info!(workspaces = count, "desktop controller initialized");
        Self {
            settings,
            views: SlotMap::default(),
            surfaces: HashMap::default(),
            workspaces,
            active: 0,
            previous: 0,
            outputs: OutputRegistry::new(),
            ops: Vec::new(),
            deferred: Vec::new(),
            grab: None,
        }
    }

    pub fn active_index(&self) -> usize { self.active }

    pub fn active_workspace(&self) -> &Workspace { &self.workspaces[self.active] }

    pub fn workspace(&self, index: usize) -> Option<&Workspace> { self.workspaces.get(index) }

    pub fn workspace_count(&self) -> usize { self.workspaces.len() }

    pub fn outputs(&self) -> &OutputRegistry { &self.outputs }

    pub fn view(&self, id: ViewId) -> Option<&View> { self.views.get(id) }

    pub fn view_for_surface(&self, surface: SurfaceHandle) -> Option<ViewId> {
        self.surfaces.get(&surface).copied()
    }

    /// Draw order of the active workspace, bottom to top.
    pub fn stacking_order(&self) -> impl Iterator<Item = ViewId> + '_ {
        self.active_workspace().stacking_order()
    }

    fn workspace_of(&self, view: ViewId) -> Option<usize> {
        self.workspaces.iter().position(|ws| ws.contains(view))
    }

    /// Push the batch the last workspace call produced out to the shell.
    fn flush_configures(&mut self, backend: &mut impl ShellBackend) {
        for op in &self.ops {
            let Some(view) = self.views.get(op.view) else {
                continue;
            };
            backend.configure(view.surface, Rect::from_parts(op.pos, op.size), view.state);
        }
        self.ops.clear();
    }

    // ---- output provider events ----

    pub fn output_added(
        &mut self,
        handle: OutputHandle,
        geometry: Rect,
        backend: &mut impl ShellBackend,
    ) {
        if !self.outputs.add(OutputInfo::new(handle, geometry, self.settings.gaps)) {
            return;
        }
        for ws in &mut self.workspaces {
            ws.on_output_added(handle, &mut self.views, &self.outputs, &mut self.ops);
        }
        self.ops.clear();
        self.place_pending(backend);
    }

    pub fn output_removed(&mut self, handle: OutputHandle, backend: &mut impl ShellBackend) {
        if self.outputs.remove(handle).is_none() {
            warn!(?handle, "unknown output removed");
            return;
        }
        for ws in &mut self.workspaces {
            ws.on_output_removed(handle, &mut self.views, &self.outputs, &mut self.ops);
        }
        self.ops.clear();

        // Re-home every view that lived on the lost output.
        let fallback = self.outputs.first().map(|o| o.handle);
        let stranded: Vec<ViewId> = self
            .views
            .iter()
            .filter(|(_, v)| v.output == Some(handle))
            .map(|(id, _)| id)
            .collect();
        for id in stranded {
            self.views[id].output = fallback;
            if fallback.is_none() || !self.views[id].added {
                continue;
            }
            let Some(ws) = self.workspace_of(id) else {
                continue;
            };
            if let Err(err) =
                self.workspaces[ws].remove_view(id, &mut self.views, &self.outputs, &mut self.ops)
            {
                warn!(?id, ?err, "could not detach stranded view");
                continue;
            }
            self.flush_configures(backend);
            if let Err(err) =
                self.workspaces[ws].add_view(id, None, &mut self.views, &self.outputs, &mut self.ops)
            {
                warn!(?id, ?err, "could not re-home stranded view");
            }
            self.flush_configures(backend);
        }
    }

    pub fn output_resized(
        &mut self,
        handle: OutputHandle,
        geometry: Rect,
        backend: &mut impl ShellBackend,
    ) {
        if !self.outputs.resize(handle, geometry) {
            warn!(?handle, "resize notification for unknown output");
            return;
        }
        self.rearrange_output(handle, backend);
    }

    /// The usable area changed (a panel appeared or vanished) without the
    /// resolution changing.
    pub fn output_area_changed(
        &mut self,
        handle: OutputHandle,
        area: Rect,
        backend: &mut impl ShellBackend,
    ) {
        if !self.outputs.set_desktop_area(handle, area) {
            warn!(?handle, "area notification for unknown output");
            return;
        }
        self.rearrange_output(handle, backend);
    }

    /// Runtime gap reconfiguration for one output.
    pub fn set_gaps(
        &mut self,
        handle: OutputHandle,
        gaps: GapSettings,
        backend: &mut impl ShellBackend,
    ) {
        if !self.outputs.set_gaps(handle, gaps) {
            warn!(?handle, "gap change for unknown output");
            return;
        }
        self.rearrange_output(handle, backend);
    }

    fn rearrange_output(&mut self, handle: OutputHandle, backend: &mut impl ShellBackend) {
        for idx in 0..self.workspaces.len() {
            self.workspaces[idx].on_output_resized(
                handle,
                &mut self.views,
                &self.outputs,
                &mut self.ops,
            );
            self.flush_configures(backend);
        }
    }

    // ---- surface provider events ----

    /// A new desktop surface appeared. The view is created immediately but
    /// only placed on first commit.
    pub fn surface_added(&mut self, surface: SurfaceHandle) -> ViewId {
        let kind = self.active_workspace().current_layout();
        let mut view = View::new(surface, kind);
        view.output = self.outputs.first().map(|o| o.handle);
        let id = self.views.insert(view);
        self.surfaces.insert(surface, id);
        debug!(?surface, ?kind, "surface added");
        id
    }

    /// First commit maps and places the view; later commits just re-send the
    /// stored geometry (covers decoration offsets changing client-side).
    pub fn surface_committed(&mut self, surface: SurfaceHandle, backend: &mut impl ShellBackend) {
        let Some(id) = self.surfaces.get(&surface).copied() else {
            warn!(?surface, "commit for unknown surface");
            return;
        };
        self.views[id].mapped = true;
        if self.views[id].added {
            let view = &self.views[id];
            backend.configure(view.surface, view.rect(), view.state);
            return;
        }
        if self.outputs.is_empty() {
            debug!(?surface, "commit deferred, no output yet");
            return;
        }
        if self.views[id].output.is_none() {
            self.views[id].output = self.outputs.first().map(|o| o.handle);
        }
        let active = self.active;
        if let Err(err) =
            self.workspaces[active].add_view(id, None, &mut self.views, &self.outputs, &mut self.ops)
        {
            warn!(?surface, ?err, "could not place committed surface");
            return;
        }
        self.flush_configures(backend);
        backend.focus(surface);
    }

    /// Surface gone. Survivors are reconfigured right away, but the focus
    /// hand-off is deferred to the next idle tick: seat state must not be
    /// touched from inside the destruction notification.
    pub fn surface_removed(&mut self, surface: SurfaceHandle, backend: &mut impl ShellBackend) {
        let Some(id) = self.surfaces.remove(&surface) else {
            warn!(?surface, "removal of unknown surface");
            return;
        };
        if self.grab.is_some_and(|g| g.view == id) {
            self.grab = None;
        }
        if let Some(ws) = self.workspace_of(id) {
            if let Err(err) =
                self.workspaces[ws].remove_view(id, &mut self.views, &self.outputs, &mut self.ops)
            {
                warn!(?surface, ?err, "could not remove view");
            }
            self.views.remove(id);
            self.flush_configures(backend);
            self.deferred.push(Deferred::FocusHandoff { workspace: ws });
        } else {
            self.views.remove(id);
        }
        debug!(?surface, "surface removed");
    }

    /// Run deferred follow-ups. Call once per event-loop iteration, before
    /// the next input event is dispatched.
    pub fn dispatch_idle(&mut self, backend: &mut impl ShellBackend) {
        self.flush_configures(backend);
        let pending: Vec<Deferred> = self.deferred.drain(..).collect();
        for item in pending {
            match item {
                Deferred::FocusHandoff { workspace } => {
                    if workspace != self.active {
                        continue;
                    }
                    if let Some(top) = self.workspaces[workspace].top_view() {
                        self.workspaces[workspace].focus_view(top, &mut self.views);
                        if let Some(view) = self.views.get(top) {
                            backend.focus(view.surface);
                        }
                    }
                }
            }
        }
    }

    /// Views that committed before any output existed get placed as soon as
    /// one shows up.
    fn place_pending(&mut self, backend: &mut impl ShellBackend) {
        let fallback = self.outputs.first().map(|o| o.handle);
        let pending: Vec<ViewId> = self
            .views
            .iter()
            .filter(|(_, v)| v.mapped && !v.added)
            .map(|(id, _)| id)
            .collect();
        let active = self.active;
        for id in pending {
            if self.views[id].output.is_none() {
                self.views[id].output = fallback;
            }
            if let Err(err) =
                self.workspaces[active].add_view(id, None, &mut self.views, &self.outputs, &mut self.ops)
            {
                warn!(?id, ?err, "could not place pending view");
            }
            self.flush_configures(backend);
        }
    }

    // ---- shell / input requests ----

    pub fn request_fullscreen(
        &mut self,
        surface: SurfaceHandle,
        output: Option<OutputHandle>,
        enable: bool,
        backend: &mut impl ShellBackend,
    ) {
        let Some((id, ws)) = self.target_of(surface) else {
            return;
        };
        if let Err(err) = self.workspaces[ws].fullscreen_view(
            id,
            output,
            enable,
            &mut self.views,
            &self.outputs,
            &mut self.ops,
        ) {
            warn!(?surface, ?err, "fullscreen request failed");
        }
        self.flush_configures(backend);
    }

    pub fn request_maximize(
        &mut self,
        surface: SurfaceHandle,
        enable: bool,
        backend: &mut impl ShellBackend,
    ) {
        let Some((id, ws)) = self.target_of(surface) else {
            return;
        };
        if let Err(err) = self.workspaces[ws].maximize_view(
            id,
            enable,
            &mut self.views,
            &self.outputs,
            &mut self.ops,
        ) {
            warn!(?surface, ?err, "maximize request failed");
        }
        self.flush_configures(backend);
    }

    pub fn request_minimize(&mut self, surface: SurfaceHandle, backend: &mut impl ShellBackend) {
        let Some((id, ws)) = self.target_of(surface) else {
            return;
        };
        let next = self.workspaces[ws].minimize_view(id, &mut self.views);
        if ws == self.active {
            if let Some(surface) = next.and_then(|v| self.views.get(v)).map(|v| v.surface) {
                backend.focus(surface);
            }
        }
    }

    pub fn request_move(&mut self, surface: SurfaceHandle, backend: &mut impl ShellBackend) {
        let Some((id, _)) = self.target_of(surface) else {
            return;
        };
        self.grab = Some(GrabState {
            view: id,
            mode: GrabMode::Move,
        });
        backend.start_move_grab(surface);
    }

    pub fn request_resize(
        &mut self,
        surface: SurfaceHandle,
        edges: Edges,
        backend: &mut impl ShellBackend,
    ) {
        let Some((id, _)) = self.target_of(surface) else {
            return;
        };
        self.grab = Some(GrabState {
            view: id,
            mode: GrabMode::Resize(edges),
        });
        backend.start_resize_grab(surface, edges);
    }

    /// Pointer delta from an active move/resize grab.
    pub fn grab_motion(&mut self, dx: i32, dy: i32, backend: &mut impl ShellBackend) {
        let Some(grab) = self.grab else {
            return;
        };
        if !self.views.contains_key(grab.view) {
            self.grab = None;
            return;
        }
        let Some(ws) = self.workspace_of(grab.view) else {
            return;
        };
        let cmd = match grab.mode {
            GrabMode::Move => LayoutCommand::Deplace { dx, dy },
            GrabMode::Resize(edges) => LayoutCommand::Resize { dx, dy, edges },
        };
        if let Err(err) = self.workspaces[ws].run_command(
            cmd,
            grab.view,
            &mut self.views,
            &self.outputs,
            &mut self.ops,
        ) {
            warn!(?err, "grab motion rejected");
        }
        self.flush_configures(backend);
    }

    pub fn end_grab(&mut self) { self.grab = None; }

    /// Start an alt-tab style task switch; the input provider feeds
    /// [`Desktop::cycle_focus`] while the grab is held.
    pub fn request_task_switch(&mut self, backend: &mut impl ShellBackend) {
        backend.start_task_switch_grab();
    }

    /// Rotate focus to the next view in recency order on the active
    /// workspace.
    pub fn cycle_focus(&mut self, backend: &mut impl ShellBackend) -> Option<ViewId> {
        let active = self.active;
        let current = self.workspaces[active].top_view()?;
        let next = self.workspaces[active].defocus_view(current, &mut self.views)?;
        self.workspaces[active].focus_view(next, &mut self.views);
        if let Some(view) = self.views.get(next) {
            backend.focus(view.surface);
        }
        Some(next)
    }

    /// Keybinding commands (split, merge, toggle, resize) act on the focused
    /// view of the active workspace.
    pub fn command_focused(&mut self, cmd: LayoutCommand, backend: &mut impl ShellBackend) {
        let Some(view) = self.active_workspace().top_view() else {
            return;
        };
        let active = self.active;
        if let Err(err) =
            self.workspaces[active].run_command(cmd, view, &mut self.views, &self.outputs, &mut self.ops)
        {
            warn!(?cmd, ?err, "command rejected");
        }
        self.flush_configures(backend);
    }

    // ---- workspace switching ----

    /// Activate another workspace. Returns the view that should take focus
    /// there, `None` when it is empty.
    pub fn switch_workspace(
        &mut self,
        index: usize,
        backend: &mut impl ShellBackend,
    ) -> Option<ViewId> {
        if index >= self.workspaces.len() {
            warn!(index, "switch to nonexistent workspace");
            return None;
        }
        if index == self.active {
            return self.active_workspace().top_view();
        }
        self.workspaces[self.active].deactivate();
        self.previous = self.active;
        self.active = index;
        self.workspaces[index].activate();
        debug!(from = self.previous, to = index, "switched workspace");

        let top = self.workspaces[index].top_view();
        if let Some(surface) = top.and_then(|v| self.views.get(v)).map(|v| v.surface) {
            backend.focus(surface);
        }
        top
    }

    /// Jump back to the previously active workspace.
    pub fn switch_back(&mut self, backend: &mut impl ShellBackend) -> Option<ViewId> {
        self.switch_workspace(self.previous, backend)
    }

    /// Change the policy newly added views on a workspace default to.
    /// Existing views keep their current policy.
    pub fn set_workspace_layout(&mut self, index: usize, kind: LayoutKind) {
        match self.workspaces.get_mut(index) {
            Some(ws) => ws.set_current_layout(kind),
            None => warn!(index, "layout change for nonexistent workspace"),
        }
    }

    /// Move a view to another workspace without switching there.
    pub fn send_to_workspace(
        &mut self,
        surface: SurfaceHandle,
        index: usize,
        backend: &mut impl ShellBackend,
    ) {
        if index >= self.workspaces.len() {
            warn!(index, "send to nonexistent workspace");
            return;
        }
        let Some((id, from)) = self.target_of(surface) else {
            return;
        };
        if from == index {
            return;
        }
        if let Err(err) =
            self.workspaces[from].remove_view(id, &mut self.views, &self.outputs, &mut self.ops)
        {
            warn!(?surface, ?err, "could not detach view for transfer");
            return;
        }
        self.flush_configures(backend);
        if let Err(err) =
            self.workspaces[index].add_view(id, None, &mut self.views, &self.outputs, &mut self.ops)
        {
            warn!(?surface, ?err, "could not attach view on target workspace");
        }
        // Only the active workspace's geometry is visible; the rest applies
        // when it is switched to.
        if index == self.active {
            self.flush_configures(backend);
        } else {
            self.ops.clear();
        }
        if from == self.active {
            self.deferred.push(Deferred::FocusHandoff { workspace: from });
        }
    }

    /// Debug dump of the active workspace's split tree on one output.
    pub fn draw_tree(&self, output: OutputHandle) -> String {
        self.active_workspace().tiling().draw_tree(output)
    }

    fn target_of(&self, surface: SurfaceHandle) -> Option<(ViewId, usize)> {
        let Some(&id) = self.surfaces.get(&surface) else {
            warn!(?surface, "request for unknown surface");
            return None;
        };
        match self.workspace_of(id) {
            Some(ws) => Some((id, ws)),
            None => {
                warn!(?surface, "request for a view not on any workspace");
                None
            }
        }
    }
}
