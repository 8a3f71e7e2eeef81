use glam::{Vec2, Vec3};

use crate::camera::{Camera, CameraKind, CameraSwitch};
use crate::container::Container;
use crate::drag::DragContext;
use crate::pick::{CursorContext, EntityKind, EntityRef, HoverChange};
use crate::scene::Scene;

/// Hovered and selected entity references. Independent of each other;
/// both resolve against the live scene, so a dangling handle reads as
/// no selection.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectionState {
    hovered: Option<EntityRef>,
    selected: Option<EntityRef>,
}

impl SelectionState {
    pub fn hovered(&self) -> Option<EntityRef> {
        self.hovered
    }

    pub fn selected(&self) -> Option<EntityRef> {
        self.selected
    }

    pub fn set_hovered(&mut self, next: Option<EntityRef>) {
        self.hovered = next;
    }

    /// Returns the new value when it differs from the old one; equal
    /// assignments are silent.
    pub fn set_selected(&mut self, next: Option<EntityRef>) -> Option<Option<EntityRef>> {
        if next == self.selected {
            return None;
        }
        self.selected = next;
        Some(next)
    }

    /// Drops references to entities the scene no longer contains.
    /// Returns a notification when the selection vanished this way.
    pub fn prune(&mut self, scene: &Scene) -> Option<Option<EntityRef>> {
        if self.hovered.is_some_and(|e| !e.is_alive(scene)) {
            self.hovered = None;
        }
        if self.selected.is_some_and(|e| !e.is_alive(scene)) {
            self.selected = None;
            return Some(None);
        }
        None
    }
}

/// What a pointer release produced, for the orchestrator to turn into
/// outbound events. Everything defaults to "nothing happened".
#[derive(Debug, Default, PartialEq)]
pub struct PointerReaction {
    pub node_add: Option<Vec3>,
    pub link_add: Option<(u64, u64)>,
    pub node_move: Option<(u64, Vec3)>,
    pub selection_change: Option<Option<EntityRef>>,
    pub can_undo_changed: Option<bool>,
}

/// Input coordinator: owns the cursor, the drag machinery, and the
/// selection plus the two placement modes. The pointer protocol is
/// move (hover + drag tracking), down (maybe grab), up (drop, then
/// click resolution).
pub struct Selection {
    pub cursor: CursorContext,
    pub drag: DragContext,
    pub state: SelectionState,
    add_mode: bool,
    link_mode: bool,
}

impl Selection {
    pub fn new(kind: CameraKind) -> Self {
        Self {
            cursor: CursorContext::default(),
            drag: DragContext::new(kind),
            state: SelectionState::default(),
            add_mode: false,
            link_mode: false,
        }
    }

    pub fn add_mode(&self) -> bool {
        self.add_mode
    }

    pub fn link_mode(&self) -> bool {
        self.link_mode
    }

    pub fn pointer_move(
        &mut self,
        local_px: Vec2,
        container: &Container,
        camera: &Camera,
        scene: &mut Scene,
    ) {
        let Some(ndc) = CursorContext::reposition(local_px, container) else {
            return;
        };
        self.cursor.record_move(ndc);
        if self.drag.is_dragging() {
            self.drag.update(ndc, camera, scene);
        }
        if self.add_mode {
            scene.add_cursor.move_to(ndc, camera);
            scene.touch();
        }
    }

    pub fn pointer_down(
        &mut self,
        local_px: Vec2,
        container: &Container,
        camera: &Camera,
        scene: &Scene,
    ) {
        let Some(ndc) = CursorContext::reposition(local_px, container) else {
            return;
        };
        self.cursor.record_down(ndc);
        if self.add_mode || self.link_mode {
            return;
        }
        if let Some(EntityRef {
            kind: EntityKind::Node,
            handle,
        }) = self.cursor.hovered()
        {
            self.drag
                .start(handle, self.cursor.hovered_point(), camera, scene);
        }
    }

    pub fn pointer_up(
        &mut self,
        local_px: Vec2,
        container: &Container,
        scene: &mut Scene,
    ) -> PointerReaction {
        let mut reaction = PointerReaction::default();
        let in_bounds = CursorContext::reposition(local_px, container);
        if let Some(ndc) = in_bounds {
            self.cursor.record_up(ndc);
        }

        if self.drag.is_dragging() {
            if in_bounds.is_some() {
                let outcome = self.drag.finish(scene);
                reaction.node_move = outcome.moved;
                reaction.can_undo_changed = outcome.can_undo_changed;
            } else {
                self.drag.cancel(scene);
            }
        }

        if in_bounds.is_none() {
            return reaction;
        }
        let Some(clicked) = self.cursor.update_clicked() else {
            return reaction;
        };

        if self.add_mode {
            reaction.node_add = Some(scene.add_cursor.position);
            // A fresh node invalidates positional undo history.
            reaction.can_undo_changed = self
                .drag
                .undo_stack
                .clear()
                .or(reaction.can_undo_changed);
        } else if self.link_mode {
            if let (
                Some(EntityRef {
                    kind: EntityKind::Node,
                    handle: src,
                }),
                Some(EntityRef {
                    kind: EntityKind::Node,
                    handle: dst,
                }),
            ) = (self.state.selected(), clicked)
            {
                if src != dst {
                    reaction.link_add = Some((src, dst));
                }
            }
            // Any click ends the pending link gesture.
            reaction.selection_change = self.state.set_selected(None);
            scene.link_cursor.clear();
            scene.touch();
        } else {
            reaction.selection_change = self.state.set_selected(clicked);
        }
        reaction
    }

    /// Mode switches arrive from the externally-owned viewport state.
    /// Entering link mode pauses the undo affordance; both returns are
    /// can-undo edges to forward.
    pub fn set_add_mode(&mut self, on: bool, scene: &mut Scene) {
        if self.add_mode == on {
            return;
        }
        self.add_mode = on;
        scene.add_cursor.visible = on;
        scene.touch();
    }

    pub fn set_link_mode(&mut self, on: bool, scene: &mut Scene) -> Option<bool> {
        if self.link_mode == on {
            return None;
        }
        self.link_mode = on;
        if on {
            self.drag.undo_stack.pause()
        } else {
            scene.link_cursor.clear();
            scene.touch();
            self.drag.undo_stack.resume()
        }
    }

    pub fn handle_camera_switch(&mut self, switch: CameraSwitch, scene: &mut Scene) {
        self.drag.handle_camera_switch(switch.new, scene);
    }

    /// Per-frame refresh: hover raycast, highlight flags, and the link
    /// preview arrow.
    pub fn update(&mut self, camera: &Camera, scene: &mut Scene) -> Option<HoverChange> {
        let change = self.cursor.update_hovered(camera, scene);
        if let Some(change) = change {
            self.state.set_hovered(change.next);
        }

        if self.link_mode {
            let src = self.selected_node_anchor(scene);
            let dst = self.hovered_node_anchor(scene);
            let was_visible = scene.link_cursor.visible();
            scene.link_cursor.set(src, dst);
            if scene.link_cursor.visible() != was_visible || scene.link_cursor.visible() {
                scene.touch();
            }
        }

        self.apply_highlight(scene);
        change
    }

    fn selected_node_anchor(&self, scene: &Scene) -> Option<Vec3> {
        match self.state.selected() {
            Some(EntityRef {
                kind: EntityKind::Node,
                handle,
            }) => scene.node(handle).map(|n| n.link_anchor()),
            _ => None,
        }
    }

    fn hovered_node_anchor(&self, scene: &Scene) -> Option<Vec3> {
        match self.state.hovered() {
            Some(EntityRef {
                kind: EntityKind::Node,
                handle,
            }) => scene.node(handle).map(|n| n.link_anchor()),
            _ => None,
        }
    }

    /// Mirrors hovered/selected into the per-entity flags the outline
    /// passes read.
    fn apply_highlight(&self, scene: &mut Scene) {
        let hovered = self.state.hovered();
        let selected = self.state.selected();
        let mut changed = false;

        for node in scene.nodes_mut() {
            let h = hovered == Some(EntityRef::node(node.handle));
            let s = selected == Some(EntityRef::node(node.handle));
            if node.hovered != h || node.selected != s {
                node.hovered = h;
                node.selected = s;
                changed = true;
            }
        }
        for link in scene.links_mut() {
            let h = hovered == Some(EntityRef::link(link.handle));
            let s = selected == Some(EntityRef::link(link.handle));
            if link.hovered != h || link.selected != s {
                link.hovered = h;
                link.selected = s;
                changed = true;
            }
        }
        if changed {
            scene.touch();
        }
    }
}
