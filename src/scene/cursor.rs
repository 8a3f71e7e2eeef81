use glam::{Vec2, Vec3};

use crate::camera::Camera;
use crate::geom::{self, Plane};
use crate::scene::link::inset_endpoints;

/// Ground disc that tracks the pointer while add mode is active. The
/// pointer ray is intersected with a camera-facing plane through the
/// cursor's previous position, then flattened onto the ground.
#[derive(Debug, Clone, Copy)]
pub struct AddCursor {
    pub position: Vec3,
    pub visible: bool,
}

pub const ADD_CURSOR_RADIUS: f32 = 0.5;

impl Default for AddCursor {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            visible: false,
        }
    }
}

impl AddCursor {
    pub fn move_to(&mut self, ndc: Vec2, camera: &Camera) {
        let ray = camera.ray_from_ndc(ndc);
        let plane = Plane::from_normal_and_point(camera.forward, self.position);
        if let Some(hit) = geom::ray_plane(&ray, &plane) {
            self.position = Vec3::new(hit.x, 0.0, hit.z);
        }
    }
}

/// Preview arrow shown in link mode, from the selected node's anchor
/// toward the hovered node's anchor. Hidden without a distinct target.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkCursor {
    endpoints: Option<(Vec3, Vec3)>,
}

impl LinkCursor {
    pub fn set(&mut self, src: Option<Vec3>, dst: Option<Vec3>) {
        self.endpoints = match (src, dst) {
            (Some(a), Some(b)) if a.distance_squared(b) > 1e-8 => Some((a, b)),
            _ => None,
        };
    }

    pub fn clear(&mut self) {
        self.endpoints = None;
    }

    pub fn visible(&self) -> bool {
        self.endpoints.is_some()
    }

    /// Display segment, inset more generously than committed links so
    /// the preview never hides behind either node.
    pub fn shaft(&self) -> Option<(Vec3, Vec3)> {
        self.endpoints
            .map(|(a, b)| inset_endpoints(a, b, 1.5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraKind, CameraSwitcher};

    #[test]
    fn add_cursor_lands_on_the_ground() {
        let mut sw = CameraSwitcher::new(1.0);
        sw.set_kind(CameraKind::Top);
        let camera = sw.active();

        let mut cursor = AddCursor::default();
        cursor.move_to(Vec2::new(0.5, 0.0), &camera);
        assert_eq!(cursor.position.y, 0.0);
        assert!(cursor.position.x > 0.0);
    }

    #[test]
    fn add_cursor_tracks_under_perspective() {
        let sw = CameraSwitcher::new(1.0);
        let camera = sw.active();
        let mut cursor = AddCursor::default();
        cursor.move_to(Vec2::ZERO, &camera);
        // Center ray passes through the orbit target at the origin.
        assert!(cursor.position.length() < 1e-3);
        assert_eq!(cursor.position.y, 0.0);
    }

    #[test]
    fn link_cursor_needs_two_distinct_anchors() {
        let mut cursor = LinkCursor::default();
        cursor.set(Some(Vec3::ZERO), None);
        assert!(!cursor.visible());
        cursor.set(Some(Vec3::ZERO), Some(Vec3::ZERO));
        assert!(!cursor.visible());
        cursor.set(Some(Vec3::ZERO), Some(Vec3::new(6.0, 0.0, 0.0)));
        assert!(cursor.visible());

        let (a, b) = cursor.shaft().unwrap();
        assert!((a.x - 1.5).abs() < 1e-5);
        assert!((b.x - 4.5).abs() < 1e-5);

        cursor.clear();
        assert!(!cursor.visible());
    }
}
