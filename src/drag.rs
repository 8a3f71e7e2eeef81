use glam::{Vec2, Vec3};
use log::debug;

use crate::camera::{Camera, CameraKind};
use crate::geom::{self, Plane, Ray};
use crate::scene::Scene;

/// Squared world-space distance below which a finished drag reverts
/// and above which it commits. Doubles as the staleness bound when
/// undoing: a node that has moved since its drag finished invalidates
/// the whole stack.
pub const MOVE_THRESHOLD_SQ: f32 = 0.001;

/// One plane-constrained node move. The drag plane faces the camera at
/// grab time and never changes afterwards, even if the camera moves
/// mid-drag.
#[derive(Debug, Clone, Copy)]
pub struct DragOperation {
    pub node_handle: u64,
    world_start: Vec3,
    world_finish: Vec3,
    plane: Plane,
    offset: Vec3,
}

impl DragOperation {
    /// Begins a drag on the node under `grab_point`. Fails when the
    /// grab ray misses the drag plane.
    pub fn start(
        node_handle: u64,
        node_position: Vec3,
        grab_point: Vec3,
        camera: &Camera,
    ) -> Option<Self> {
        let plane = Plane::from_normal_and_point(camera.forward, node_position);
        let probe = Ray::new(grab_point, plane.normal);
        let intersection = geom::ray_plane(&probe, &plane)?;
        Some(Self {
            node_handle,
            world_start: node_position,
            world_finish: node_position,
            plane,
            offset: intersection - node_position,
        })
    }

    pub fn world_start(&self) -> Vec3 {
        self.world_start
    }

    pub fn world_finish(&self) -> Vec3 {
        self.world_finish
    }

    /// Re-projects the pointer onto the fixed drag plane with the
    /// current camera and moves the node there.
    pub fn update(&self, ndc: Vec2, camera: &Camera, scene: &mut Scene) {
        let ray = camera.ray_from_ndc(ndc);
        if let Some(intersection) = geom::ray_plane(&ray, &self.plane) {
            if let Some(node) = scene.node_mut(self.node_handle) {
                node.set_position(intersection - self.offset);
                scene.touch();
            }
        }
    }

    /// Records the final position; true when the move is large enough
    /// to commit.
    pub fn finish(&mut self, scene: &Scene) -> bool {
        if let Some(node) = scene.node(self.node_handle) {
            self.world_finish = node.position();
        }
        self.world_finish.distance_squared(self.world_start) > MOVE_THRESHOLD_SQ
    }

    /// Puts the node back where the drag began.
    pub fn reset(&self, scene: &mut Scene) {
        if let Some(node) = scene.node_mut(self.node_handle) {
            node.set_position(self.world_start);
            scene.touch();
        }
    }
}

/// Completed drags, most recent last. Mutators report can-undo edges
/// as `Some(new_value)`; callers forward those to the outbound
/// notification table.
#[derive(Debug, Default)]
pub struct UndoStack {
    operations: Vec<DragOperation>,
}

impl UndoStack {
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn push(&mut self, operation: DragOperation) -> Option<bool> {
        self.operations.push(operation);
        (self.operations.len() == 1).then_some(true)
    }

    pub fn pop(&mut self) -> (Option<DragOperation>, Option<bool>) {
        let edge = (self.operations.len() == 1).then_some(false);
        (self.operations.pop(), edge)
    }

    /// Temporarily withdraws the undo affordance (link mode does this)
    /// without touching the stack.
    pub fn pause(&mut self) -> Option<bool> {
        (!self.operations.is_empty()).then_some(false)
    }

    pub fn resume(&mut self) -> Option<bool> {
        (!self.operations.is_empty()).then_some(true)
    }

    pub fn clear(&mut self) -> Option<bool> {
        if self.operations.is_empty() {
            return None;
        }
        self.operations.clear();
        Some(false)
    }

    /// Drops every operation touching a removed node.
    pub fn remove_node(&mut self, node_handle: u64) -> Option<bool> {
        let before = self.operations.len();
        self.operations.retain(|op| op.node_handle != node_handle);
        (before > 0 && self.operations.is_empty()).then_some(false)
    }
}

/// Outcome of a finished or undone drag, for event fan-out.
#[derive(Debug, Default, PartialEq)]
pub struct DragOutcome {
    /// Node and its new position, when one actually moved.
    pub moved: Option<(u64, Vec3)>,
    pub can_undo_changed: Option<bool>,
}

/// At most one live drag. Only the orthographic camera may drag; a
/// projection switch cancels any operation in flight.
#[derive(Debug, Default)]
pub struct DragContext {
    current: Option<DragOperation>,
    pub undo_stack: UndoStack,
    enabled: bool,
}

impl DragContext {
    pub fn new(kind: CameraKind) -> Self {
        Self {
            current: None,
            undo_stack: UndoStack::default(),
            enabled: kind == CameraKind::Top,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_dragging(&self) -> bool {
        self.current.is_some()
    }

    pub fn start(&mut self, node_handle: u64, grab_point: Vec3, camera: &Camera, scene: &Scene) {
        if !self.enabled || self.current.is_some() {
            return;
        }
        let Some(node) = scene.node(node_handle) else {
            return;
        };
        self.current = DragOperation::start(node_handle, node.position(), grab_point, camera);
        if self.current.is_none() {
            debug!("drag on node {node_handle} refused: grab ray missed the drag plane");
        }
    }

    pub fn update(&mut self, ndc: Vec2, camera: &Camera, scene: &mut Scene) {
        if let Some(op) = &self.current {
            op.update(ndc, camera, scene);
        }
    }

    /// Release inside the viewport: commit or revert by distance.
    pub fn finish(&mut self, scene: &mut Scene) -> DragOutcome {
        let Some(mut op) = self.current.take() else {
            return DragOutcome::default();
        };
        if op.finish(scene) {
            let moved = Some((op.node_handle, op.world_finish()));
            let can_undo_changed = self.undo_stack.push(op);
            DragOutcome {
                moved,
                can_undo_changed,
            }
        } else {
            op.reset(scene);
            DragOutcome::default()
        }
    }

    /// Release outside the viewport or any other abort: silent revert.
    pub fn cancel(&mut self, scene: &mut Scene) {
        if let Some(op) = self.current.take() {
            op.reset(scene);
        }
    }

    pub fn handle_camera_switch(&mut self, new_kind: CameraKind, scene: &mut Scene) {
        self.cancel(scene);
        self.enabled = new_kind == CameraKind::Top;
    }

    /// Reverts the most recent committed drag. A stale entry (node
    /// deleted, or moved since the drag finished) invalidates the
    /// whole stack instead of moving anything.
    pub fn undo(&mut self, scene: &mut Scene) -> DragOutcome {
        if self.undo_stack.is_empty() {
            return DragOutcome::default();
        }
        let (op, mut edge) = self.undo_stack.pop();
        let Some(op) = op else {
            return DragOutcome::default();
        };

        let fresh = scene.node(op.node_handle).map_or(false, |node| {
            node.position().distance_squared(op.world_finish()) < MOVE_THRESHOLD_SQ
        });

        if fresh {
            op.reset(scene);
            DragOutcome {
                moved: Some((op.node_handle, op.world_start())),
                can_undo_changed: edge,
            }
        } else {
            if let Some(clear_edge) = self.undo_stack.clear() {
                edge = Some(clear_edge);
            }
            DragOutcome {
                moved: None,
                can_undo_changed: edge,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraSwitcher;
    use crate::loader::StaticModelSource;
    use crate::scene::NodeSpec;

    fn top_camera() -> Camera {
        let mut sw = CameraSwitcher::new(1.0);
        sw.set_kind(CameraKind::Top);
        sw.active()
    }

    fn scene_with_node(position: Vec3) -> (Scene, u64) {
        let mut scene = Scene::new();
        let mut source = StaticModelSource::new();
        let handle = scene.add_node(
            NodeSpec {
                handle: 0,
                position: position.to_array(),
                model_url: None,
                reframe_on_model_load: false,
            },
            &mut source,
        );
        (scene, handle)
    }

    fn grab_top_of(scene: &Scene, handle: u64) -> Vec3 {
        let mut p = scene.node(handle).unwrap().position();
        p.y = 0.5;
        p
    }

    #[test]
    fn drag_commits_past_threshold_and_pushes_undo() {
        let camera = top_camera();
        let (mut scene, handle) = scene_with_node(Vec3::ZERO);
        let mut drag = DragContext::new(CameraKind::Top);

        drag.start(handle, grab_top_of(&scene, handle), &camera, &scene);
        assert!(drag.is_dragging());
        // Frustum half extent is 7.5, so this is a 3.75 unit move.
        drag.update(Vec2::new(0.5, 0.0), &camera, &mut scene);
        let outcome = drag.finish(&mut scene);

        let moved = outcome.moved.unwrap();
        assert_eq!(moved.0, handle);
        assert!((moved.1.x - 3.75).abs() < 1e-4);
        assert_eq!(outcome.can_undo_changed, Some(true));
        assert_eq!(drag.undo_stack.len(), 1);
    }

    #[test]
    fn tiny_drag_reverts_exactly() {
        let camera = top_camera();
        let start = Vec3::new(1.25, 0.0, -0.75);
        let (mut scene, handle) = scene_with_node(start);
        let mut drag = DragContext::new(CameraKind::Top);

        drag.start(handle, grab_top_of(&scene, handle), &camera, &scene);
        let nudge_ndc = Vec2::new(start.x / 7.5 + 0.001, -start.z / 7.5);
        drag.update(nudge_ndc, &camera, &mut scene);
        let outcome = drag.finish(&mut scene);

        assert_eq!(outcome, DragOutcome::default());
        assert_eq!(scene.node(handle).unwrap().position(), start);
        assert!(drag.undo_stack.is_empty());
    }

    #[test]
    fn drag_disabled_under_perspective() {
        let camera = top_camera();
        let (mut scene, handle) = scene_with_node(Vec3::ZERO);
        let mut drag = DragContext::new(CameraKind::Perspective);
        drag.start(handle, grab_top_of(&scene, handle), &camera, &scene);
        assert!(!drag.is_dragging());

        drag.handle_camera_switch(CameraKind::Top, &mut scene);
        drag.start(handle, grab_top_of(&scene, handle), &camera, &scene);
        assert!(drag.is_dragging());
    }

    #[test]
    fn camera_switch_cancels_in_flight_drag() {
        let camera = top_camera();
        let (mut scene, handle) = scene_with_node(Vec3::ZERO);
        let mut drag = DragContext::new(CameraKind::Top);

        drag.start(handle, grab_top_of(&scene, handle), &camera, &scene);
        drag.update(Vec2::new(0.5, 0.0), &camera, &mut scene);
        drag.handle_camera_switch(CameraKind::Perspective, &mut scene);

        assert!(!drag.is_dragging());
        assert_eq!(scene.node(handle).unwrap().position(), Vec3::ZERO);
        assert!(drag.undo_stack.is_empty());
    }

    #[test]
    fn undo_restores_start_position() {
        let camera = top_camera();
        let (mut scene, handle) = scene_with_node(Vec3::ZERO);
        let mut drag = DragContext::new(CameraKind::Top);

        drag.start(handle, grab_top_of(&scene, handle), &camera, &scene);
        drag.update(Vec2::new(0.5, 0.0), &camera, &mut scene);
        drag.finish(&mut scene);

        let outcome = drag.undo(&mut scene);
        assert_eq!(outcome.moved, Some((handle, Vec3::ZERO)));
        assert_eq!(outcome.can_undo_changed, Some(false));
        assert_eq!(scene.node(handle).unwrap().position(), Vec3::ZERO);
    }

    #[test]
    fn stale_undo_clears_the_stack_and_moves_nothing() {
        let camera = top_camera();
        let (mut scene, handle) = scene_with_node(Vec3::ZERO);
        let mut drag = DragContext::new(CameraKind::Top);

        for ndc_x in [0.3, 0.6] {
            drag.start(handle, grab_top_of(&scene, handle), &camera, &scene);
            drag.update(Vec2::new(ndc_x, 0.0), &camera, &mut scene);
            drag.finish(&mut scene);
        }
        assert_eq!(drag.undo_stack.len(), 2);

        // Something else moved the node since the last drag.
        scene
            .node_mut(handle)
            .unwrap()
            .set_position(Vec3::new(100.0, 0.0, 0.0));
        let outcome = drag.undo(&mut scene);

        assert_eq!(outcome.moved, None);
        assert_eq!(outcome.can_undo_changed, Some(false));
        assert!(drag.undo_stack.is_empty());
        assert_eq!(
            scene.node(handle).unwrap().position(),
            Vec3::new(100.0, 0.0, 0.0)
        );
    }

    #[test]
    fn undo_of_deleted_node_invalidates_stack() {
        let camera = top_camera();
        let (mut scene, handle) = scene_with_node(Vec3::ZERO);
        let mut drag = DragContext::new(CameraKind::Top);

        drag.start(handle, grab_top_of(&scene, handle), &camera, &scene);
        drag.update(Vec2::new(0.5, 0.0), &camera, &mut scene);
        drag.finish(&mut scene);
        scene.remove_node(handle);

        let outcome = drag.undo(&mut scene);
        assert_eq!(outcome.moved, None);
        assert!(drag.undo_stack.is_empty());
    }

    #[test]
    fn undo_edges_fire_only_on_zero_one_transitions() {
        let mut stack = UndoStack::default();
        let camera = top_camera();
        let (scene, handle) = scene_with_node(Vec3::ZERO);
        let op = DragOperation::start(
            handle,
            Vec3::ZERO,
            grab_top_of(&scene, handle),
            &camera,
        )
        .unwrap();

        assert_eq!(stack.push(op), Some(true));
        assert_eq!(stack.push(op), None);
        assert_eq!(stack.pop().1, None);
        assert_eq!(stack.pop().1, Some(false));

        assert_eq!(stack.pause(), None);
        stack.push(op);
        assert_eq!(stack.pause(), Some(false));
        assert_eq!(stack.resume(), Some(true));
        assert_eq!(stack.clear(), Some(false));
        assert_eq!(stack.clear(), None);
    }

    #[test]
    fn remove_node_purges_matching_operations() {
        let mut stack = UndoStack::default();
        let camera = top_camera();
        let (scene, handle) = scene_with_node(Vec3::ZERO);
        let op = DragOperation::start(
            handle,
            Vec3::ZERO,
            grab_top_of(&scene, handle),
            &camera,
        )
        .unwrap();
        stack.push(op);
        stack.push(op);

        assert_eq!(stack.remove_node(999), None);
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.remove_node(handle), Some(false));
        assert!(stack.is_empty());
    }
}
