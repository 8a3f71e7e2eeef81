use glam::{Vec2, Vec3};
use iced::keyboard::Key;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::camera::{Camera, CameraKind, CameraSwitcher};
use crate::container::Container;
use crate::controls::Controls;
use crate::geom::Aabb;
use crate::hotkeys::{HotkeyAction, Hotkeys};
use crate::loader::{ModelSource, StaticModelSource};
use crate::pick::{EntityKind, EntityRef};
use crate::scene::{LinkSpec, NodeSpec, Scene};
use crate::selection::{PointerReaction, Selection};

/// Externally-owned snapshot of everything the viewport mirrors. The
/// counters are edge triggers: any increment requests one action, and
/// intermediate values that never reach the viewport coalesce.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportState {
    pub camera_type: CameraKind,
    pub frame_count: u64,
    pub undo_count: u64,
    pub selection: Option<EntityRef>,
    pub add_mode: bool,
    pub link_mode: bool,
    pub hotkeys_paused: bool,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            camera_type: CameraKind::Perspective,
            frame_count: 0,
            undo_count: 0,
            selection: None,
            add_mode: false,
            link_mode: false,
            hotkeys_paused: false,
        }
    }
}

/// One field-level difference between two snapshots. Application
/// order is fixed: camera first, placement modes and the hotkey gate
/// last.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StateChange {
    Camera(CameraKind),
    Frame,
    Undo,
    Selection(Option<EntityRef>),
    AddMode(bool),
    LinkMode(bool),
    HotkeysPaused(bool),
}

impl ViewportState {
    pub fn diff(old: &ViewportState, new: &ViewportState) -> Vec<StateChange> {
        let mut changes = Vec::new();
        if new.camera_type != old.camera_type {
            changes.push(StateChange::Camera(new.camera_type));
        }
        if new.frame_count != old.frame_count {
            changes.push(StateChange::Frame);
        }
        if new.undo_count != old.undo_count {
            changes.push(StateChange::Undo);
        }
        if new.selection != old.selection {
            changes.push(StateChange::Selection(new.selection));
        }
        if new.add_mode != old.add_mode {
            changes.push(StateChange::AddMode(new.add_mode));
        }
        if new.link_mode != old.link_mode {
            changes.push(StateChange::LinkMode(new.link_mode));
        }
        if new.hotkeys_paused != old.hotkeys_paused {
            changes.push(StateChange::HotkeysPaused(new.hotkeys_paused));
        }
        changes
    }
}

/// Outbound notifications. Fire-and-forget; the collaborator that owns
/// the scene graph decides what, if anything, to do with each.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewportEvent {
    Registered,
    FramePress,
    ToggleCameraPress,
    CanUndoChanged(bool),
    NodeAdd(Vec3),
    NodeMove(u64, Vec3),
    LinkAdd(u64, u64),
    SelectionChange(Option<EntityRef>),
}

type Callback0 = Box<dyn Fn()>;

/// Optional per-event callbacks, mirroring the outbound table. Events
/// are also returned from every entry point, so embedders that prefer
/// message passing can ignore this entirely.
#[derive(Default)]
pub struct ViewportEvents {
    pub on_register: Option<Callback0>,
    pub on_frame_press: Option<Callback0>,
    pub on_toggle_camera_press: Option<Callback0>,
    pub on_can_undo_changed: Option<Box<dyn Fn(bool)>>,
    pub on_node_add: Option<Box<dyn Fn(f32, f32, f32)>>,
    pub on_node_move: Option<Box<dyn Fn(u64, f32, f32, f32)>>,
    pub on_link_add: Option<Box<dyn Fn(u64, u64)>>,
    pub on_selection_change: Option<Box<dyn Fn(Option<EntityKind>, Option<u64>)>>,
}

impl ViewportEvents {
    fn dispatch(&self, event: &ViewportEvent) {
        match *event {
            ViewportEvent::Registered => {
                if let Some(f) = &self.on_register {
                    f();
                }
            }
            ViewportEvent::FramePress => {
                if let Some(f) = &self.on_frame_press {
                    f();
                }
            }
            ViewportEvent::ToggleCameraPress => {
                if let Some(f) = &self.on_toggle_camera_press {
                    f();
                }
            }
            ViewportEvent::CanUndoChanged(can) => {
                if let Some(f) = &self.on_can_undo_changed {
                    f(can);
                }
            }
            ViewportEvent::NodeAdd(p) => {
                if let Some(f) = &self.on_node_add {
                    f(p.x, p.y, p.z);
                }
            }
            ViewportEvent::NodeMove(handle, p) => {
                if let Some(f) = &self.on_node_move {
                    f(handle, p.x, p.y, p.z);
                }
            }
            ViewportEvent::LinkAdd(src, dst) => {
                if let Some(f) = &self.on_link_add {
                    f(src, dst);
                }
            }
            ViewportEvent::SelectionChange(sel) => {
                if let Some(f) = &self.on_selection_change {
                    f(sel.map(|e| e.kind), sel.map(|e| e.handle));
                }
            }
        }
    }
}

/// The interaction core: composes the container, cameras, scene,
/// selection machinery, and hotkeys, and turns inputs plus snapshot
/// diffs into scene mutations and outbound events. Fully headless;
/// the shader widget drives it and the renderer reads it.
pub struct Viewport {
    pub container: Container,
    pub cameras: CameraSwitcher,
    pub scene: Scene,
    pub controls: Controls,
    pub selection: Selection,
    pub hotkeys: Hotkeys,
    source: Box<dyn ModelSource>,
    events: ViewportEvents,
    state: ViewportState,
    registered: bool,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(Box::new(StaticModelSource::new()))
    }
}

impl Viewport {
    pub fn new(source: Box<dyn ModelSource>) -> Self {
        let container = Container::new(0.0, 0.0);
        let cameras = CameraSwitcher::new(container.aspect());
        let kind = cameras.kind();
        Self {
            container,
            cameras,
            scene: Scene::new(),
            controls: Controls,
            selection: Selection::new(kind),
            hotkeys: Hotkeys::default(),
            source,
            events: ViewportEvents::default(),
            state: ViewportState::default(),
            registered: false,
        }
    }

    pub fn set_events(&mut self, events: ViewportEvents) {
        self.events = events;
    }

    pub fn state(&self) -> &ViewportState {
        &self.state
    }

    pub fn camera(&self) -> Camera {
        self.cameras.active()
    }

    fn emit(&self, events: Vec<ViewportEvent>) -> Vec<ViewportEvent> {
        for event in &events {
            self.events.dispatch(event);
        }
        events
    }

    /// Announces the viewport to its embedder. Idempotent.
    pub fn register(&mut self) -> Vec<ViewportEvent> {
        if self.registered {
            return Vec::new();
        }
        self.registered = true;
        self.emit(vec![ViewportEvent::Registered])
    }

    pub fn unregister(&mut self) {
        self.registered = false;
    }

    /// Applies a new external snapshot, field by field in diff order.
    pub fn update_state(&mut self, new: ViewportState) -> Vec<ViewportEvent> {
        let changes = ViewportState::diff(&self.state, &new);
        let mut out = Vec::new();
        for change in changes {
            match change {
                StateChange::Camera(kind) => {
                    if let Some(switch) = self.cameras.set_kind(kind) {
                        self.selection.handle_camera_switch(switch, &mut self.scene);
                        self.frame_selection();
                    }
                }
                StateChange::Frame => self.frame_selection(),
                StateChange::Undo => {
                    let outcome = self.selection.drag.undo(&mut self.scene);
                    if let Some((handle, position)) = outcome.moved {
                        out.push(ViewportEvent::NodeMove(handle, position));
                    }
                    if let Some(can) = outcome.can_undo_changed {
                        out.push(ViewportEvent::CanUndoChanged(can));
                    }
                }
                StateChange::Selection(selection) => {
                    let resolved = selection.filter(|e| e.is_alive(&self.scene));
                    if resolved != selection {
                        debug!("selection {selection:?} resolves to a dead handle");
                    }
                    if let Some(change) = self.selection.state.set_selected(resolved) {
                        out.push(ViewportEvent::SelectionChange(change));
                    }
                }
                StateChange::AddMode(on) => {
                    self.selection.set_add_mode(on, &mut self.scene);
                }
                StateChange::LinkMode(on) => {
                    if let Some(can) = self.selection.set_link_mode(on, &mut self.scene) {
                        out.push(ViewportEvent::CanUndoChanged(can));
                    }
                }
                StateChange::HotkeysPaused(paused) => {
                    if paused {
                        self.hotkeys.pause();
                    } else {
                        self.hotkeys.resume();
                    }
                }
            }
        }
        self.state = new;
        self.emit(out)
    }

    pub fn add_node(&mut self, spec: NodeSpec) -> u64 {
        self.scene.add_node(spec, self.source.as_mut())
    }

    /// Removes a node: its undo history goes first, then the node, and
    /// a selection pointing at it resolves to empty.
    pub fn remove_node(&mut self, handle: u64) -> Vec<ViewportEvent> {
        let mut out = Vec::new();
        if let Some(can) = self.selection.drag.undo_stack.remove_node(handle) {
            out.push(ViewportEvent::CanUndoChanged(can));
        }
        self.scene.remove_node(handle);
        if let Some(change) = self.selection.state.prune(&self.scene) {
            out.push(ViewportEvent::SelectionChange(change));
        }
        self.emit(out)
    }

    pub fn add_link(&mut self, spec: LinkSpec) -> Option<u64> {
        self.scene.add_link(spec)
    }

    pub fn remove_link(&mut self, handle: u64) -> Vec<ViewportEvent> {
        self.scene.remove_link(handle);
        let mut out = Vec::new();
        if let Some(change) = self.selection.state.prune(&self.scene) {
            out.push(ViewportEvent::SelectionChange(change));
        }
        self.emit(out)
    }

    /// Frames the selected entity's bounds, or the whole scene when
    /// nothing is selected.
    pub fn frame_selection(&mut self) {
        let bounds = self.selection_bounds();
        self.controls
            .frame(&mut self.cameras, &self.container, &bounds);
    }

    fn selection_bounds(&self) -> Aabb {
        match self.selection.state.selected() {
            Some(EntityRef {
                kind: EntityKind::Node,
                handle,
            }) => match self.scene.node(handle) {
                Some(node) => node.world_bounds(),
                None => self.scene.bounding_box(),
            },
            Some(EntityRef {
                kind: EntityKind::Link,
                handle,
            }) => match self.scene.link(handle) {
                Some(link) => {
                    let (a, b) = link.endpoints();
                    let mut bounds = Aabb::EMPTY;
                    bounds.expand_point(a);
                    bounds.expand_point(b);
                    bounds
                }
                None => self.scene.bounding_box(),
            },
            None => self.scene.bounding_box(),
        }
    }

    /// Per-update heartbeat, in fixed order: surface resize, model
    /// load completion, link endpoint sync, then hover and highlight
    /// refresh. Called before any event of the same update is handled.
    pub fn tick(&mut self, width: f32, height: f32) {
        if self.container.recompute(width, height) {
            self.cameras.handle_resize(self.container.aspect());
        }

        for (url, result) in self.source.poll() {
            if self.scene.apply_load(&url, result).is_some() {
                self.frame_selection();
            }
        }

        self.scene.sync_links();
        let camera = self.cameras.active();
        self.selection.update(&camera, &mut self.scene);
    }

    pub fn pointer_move(&mut self, local_px: Vec2) {
        let camera = self.cameras.active();
        self.selection
            .pointer_move(local_px, &self.container, &camera, &mut self.scene);
    }

    pub fn pointer_down(&mut self, local_px: Vec2) {
        let camera = self.cameras.active();
        self.selection
            .pointer_down(local_px, &self.container, &camera, &self.scene);
    }

    pub fn pointer_up(&mut self, local_px: Vec2) -> Vec<ViewportEvent> {
        let reaction = self
            .selection
            .pointer_up(local_px, &self.container, &mut self.scene);
        self.emit(Self::reaction_events(reaction))
    }

    fn reaction_events(reaction: PointerReaction) -> Vec<ViewportEvent> {
        let mut out = Vec::new();
        if let Some((handle, position)) = reaction.node_move {
            out.push(ViewportEvent::NodeMove(handle, position));
        }
        if let Some(can) = reaction.can_undo_changed {
            out.push(ViewportEvent::CanUndoChanged(can));
        }
        if let Some(position) = reaction.node_add {
            out.push(ViewportEvent::NodeAdd(position));
        }
        if let Some((src, dst)) = reaction.link_add {
            out.push(ViewportEvent::LinkAdd(src, dst));
        }
        if let Some(selection) = reaction.selection_change {
            out.push(ViewportEvent::SelectionChange(selection));
        }
        out
    }

    /// Hotkey presses notify the embedder; the mirrored state decides
    /// whether a frame or camera switch actually happens.
    pub fn key_down(&mut self, key: &Key) -> Vec<ViewportEvent> {
        let Some(action) = self.hotkeys.key_down(key) else {
            return Vec::new();
        };
        self.emit(vec![Self::action_event(action)])
    }

    pub fn key_up(&mut self, key: &Key) -> Vec<ViewportEvent> {
        let Some(action) = self.hotkeys.key_up(key) else {
            return Vec::new();
        };
        self.emit(vec![Self::action_event(action)])
    }

    fn action_event(action: HotkeyAction) -> ViewportEvent {
        match action {
            HotkeyAction::FramePress => ViewportEvent::FramePress,
            HotkeyAction::ToggleCameraPress => ViewportEvent::ToggleCameraPress,
        }
    }
}
