use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::camera::Camera;
use crate::container::Container;
use crate::scene::Scene;

/// Press/release separation below which a gesture counts as a click,
/// in NDC units.
pub const CLICK_TOLERANCE: f32 = 0.025;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Node,
    Link,
}

/// Stable reference to a pickable entity. Handles may outlive their
/// entity; resolution against the scene decides liveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub handle: u64,
}

impl EntityRef {
    pub fn node(handle: u64) -> Self {
        Self {
            kind: EntityKind::Node,
            handle,
        }
    }

    pub fn link(handle: u64) -> Self {
        Self {
            kind: EntityKind::Link,
            handle,
        }
    }

    pub fn is_alive(&self, scene: &Scene) -> bool {
        match self.kind {
            EntityKind::Node => scene.node(self.handle).is_some(),
            EntityKind::Link => scene.link(self.handle).is_some(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoverChange {
    pub prev: Option<EntityRef>,
    pub next: Option<EntityRef>,
}

/// Pointer state in normalized device coordinates, hover hit-testing,
/// and click recognition.
#[derive(Debug, Clone, Copy, Default)]
pub struct CursorContext {
    pub pos: Vec2,
    down_pos: Vec2,
    up_pos: Vec2,
    hovered: Option<EntityRef>,
    hovered_point: Vec3,
}

impl CursorContext {
    /// Maps a pointer position in logical pixels (viewport-local) to
    /// NDC. None when the position falls outside the viewport.
    pub fn reposition(local_px: Vec2, container: &Container) -> Option<Vec2> {
        let (w, h) = (container.width(), container.height());
        if w <= 1.0 || h <= 1.0 {
            return None;
        }
        let unit_x = (local_px.x / w) * 2.0 - 1.0;
        let unit_y = -(local_px.y / h) * 2.0 + 1.0;
        if (-1.0..=1.0).contains(&unit_x) && (-1.0..=1.0).contains(&unit_y) {
            Some(Vec2::new(unit_x, unit_y))
        } else {
            None
        }
    }

    pub fn record_move(&mut self, ndc: Vec2) {
        self.pos = ndc;
    }

    pub fn record_down(&mut self, ndc: Vec2) {
        self.down_pos = ndc;
    }

    pub fn record_up(&mut self, ndc: Vec2) {
        self.up_pos = ndc;
    }

    pub fn hovered(&self) -> Option<EntityRef> {
        self.hovered
    }

    /// World-space point of the last successful hover hit.
    pub fn hovered_point(&self) -> Vec3 {
        self.hovered_point
    }

    /// Re-runs the hover raycast over every node mesh and link shaft,
    /// keeping the nearest hit. Returns the transition when the
    /// hovered entity changed.
    pub fn update_hovered(&mut self, camera: &Camera, scene: &Scene) -> Option<HoverChange> {
        let ray = camera.ray_from_ndc(self.pos);

        let mut best: Option<(f32, EntityRef)> = None;
        for node in scene.nodes() {
            if let Some(t) = node.raycast(&ray) {
                if best.map_or(true, |(b, _)| t < b) {
                    best = Some((t, EntityRef::node(node.handle)));
                }
            }
        }
        for link in scene.links() {
            if let Some(t) = link.raycast(&ray) {
                if best.map_or(true, |(b, _)| t < b) {
                    best = Some((t, EntityRef::link(link.handle)));
                }
            }
        }

        let next = best.map(|(t, entity)| {
            self.hovered_point = ray.at(t);
            entity
        });
        if next != self.hovered {
            let prev = self.hovered;
            self.hovered = next;
            Some(HoverChange { prev, next })
        } else {
            None
        }
    }

    /// Click resolution after a release: when press and release landed
    /// within tolerance the hovered entity (or empty space) was
    /// clicked. Exactly one event per qualifying pair.
    pub fn update_clicked(&self) -> Option<Option<EntityRef>> {
        let tolerance_sq = CLICK_TOLERANCE * CLICK_TOLERANCE;
        if self.up_pos.distance_squared(self.down_pos) < tolerance_sq {
            Some(self.hovered)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraKind, CameraSwitcher};
    use crate::loader::StaticModelSource;
    use crate::scene::{LinkSpec, NodeSpec};

    fn top_camera() -> Camera {
        let mut sw = CameraSwitcher::new(1.0);
        sw.set_kind(CameraKind::Top);
        sw.active()
    }

    fn node_spec(position: [f32; 3]) -> NodeSpec {
        NodeSpec {
            handle: 0,
            position,
            model_url: None,
            reframe_on_model_load: false,
        }
    }

    #[test]
    fn reposition_clamps_to_viewport() {
        let container = Container::new(800.0, 600.0);
        let center = CursorContext::reposition(Vec2::new(400.0, 300.0), &container).unwrap();
        assert!(center.length() < 1e-6);
        let corner = CursorContext::reposition(Vec2::new(0.0, 0.0), &container).unwrap();
        assert_eq!(corner, Vec2::new(-1.0, 1.0));
        assert!(CursorContext::reposition(Vec2::new(900.0, 300.0), &container).is_none());
        assert!(CursorContext::reposition(Vec2::new(400.0, -5.0), &container).is_none());
    }

    #[test]
    fn hover_picks_nearest_entity_and_reports_transitions() {
        let mut scene = Scene::new();
        let mut source = StaticModelSource::new();
        let a = scene.add_node(node_spec([0.0, 0.0, 0.0]), &mut source);
        scene.add_node(node_spec([30.0, 0.0, 0.0]), &mut source);

        let camera = top_camera();
        let mut cursor = CursorContext::default();
        cursor.record_move(Vec2::ZERO);

        let change = cursor.update_hovered(&camera, &scene).unwrap();
        assert_eq!(change.prev, None);
        assert_eq!(change.next, Some(EntityRef::node(a)));
        // Stable hover produces no transition.
        assert!(cursor.update_hovered(&camera, &scene).is_none());

        cursor.record_move(Vec2::new(0.9, 0.9));
        let change = cursor.update_hovered(&camera, &scene).unwrap();
        assert_eq!(change.prev, Some(EntityRef::node(a)));
        assert_eq!(change.next, None);
    }

    #[test]
    fn links_are_hoverable_between_nodes() {
        let mut scene = Scene::new();
        let mut source = StaticModelSource::new();
        let a = scene.add_node(node_spec([-6.0, 0.0, 0.0]), &mut source);
        let b = scene.add_node(node_spec([6.0, 0.0, 0.0]), &mut source);
        let link = scene
            .add_link(LinkSpec {
                handle: 0,
                src_node: a,
                dst_node: b,
            })
            .unwrap();

        let camera = top_camera();
        let mut cursor = CursorContext::default();
        // Over the midpoint of the shaft; frustum half width is 7.5.
        cursor.record_move(Vec2::ZERO);
        let change = cursor.update_hovered(&camera, &scene).unwrap();
        assert_eq!(change.next, Some(EntityRef::link(link)));
    }

    #[test]
    fn click_requires_press_release_proximity() {
        let mut cursor = CursorContext::default();
        cursor.record_down(Vec2::new(0.1, 0.1));
        cursor.record_up(Vec2::new(0.1 + 0.024, 0.1));
        assert_eq!(cursor.update_clicked(), Some(None));

        cursor.record_up(Vec2::new(0.1 + 0.026, 0.1));
        assert_eq!(cursor.update_clicked(), None);
    }
}
