use glam::{Vec2, Vec3};

use crate::camera::{CameraKind, CameraSwitcher, TOP_FAR, TOP_FRUSTUM_SIZE, TOP_NEAR};
use crate::container::Container;
use crate::geom::Aabb;

/// Screen-space margin kept around framed content, in logical pixels.
const FRAME_PADDING_PX: f32 = 16.0;

/// Fraction of the perspective field of view the framed box may fill.
const FOV_FILL: f32 = 0.8;

const MIN_PITCH: f32 = -1.5;
const MAX_PITCH: f32 = 1.5;

/// Camera navigation: fit-to-bounds framing for both projections plus
/// orbit, pan, and zoom. Framing writes the target, position, and zoom
/// in one atomic step; there is no animated transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct Controls;

impl Controls {
    /// Frames `bounds` in the active camera.
    ///
    /// Top-down: the camera centers over the box footprint from a
    /// fixed height near the far plane, and the zoom fits the
    /// footprint with a constant 16 px margin on screen. Perspective:
    /// the view direction is kept and the distance is recomputed so
    /// the largest box dimension fills 80% of the field of view.
    /// Framing the same box twice in a row is a no-op.
    pub fn frame(&self, switcher: &mut CameraSwitcher, container: &Container, bounds: &Aabb) {
        match switcher.kind() {
            CameraKind::Top => Self::frame_top(switcher, container, bounds),
            CameraKind::Perspective => Self::frame_perspective(switcher, container, bounds),
        }
    }

    fn frame_top(switcher: &mut CameraSwitcher, container: &Container, bounds: &Aabb) {
        let center = bounds.center();
        let size = bounds.size();

        let (vw_px, vh_px) = (container.width(), container.height());
        let frustum_h = TOP_FRUSTUM_SIZE;
        let frustum_w = TOP_FRUSTUM_SIZE * container.aspect();

        // Shrink the usable frustum by the pixel margin on each side.
        let usable_w = if vw_px > 2.0 * FRAME_PADDING_PX {
            frustum_w * (1.0 - 2.0 * FRAME_PADDING_PX / vw_px)
        } else {
            frustum_w
        };
        let usable_h = if vh_px > 2.0 * FRAME_PADDING_PX {
            frustum_h * (1.0 - 2.0 * FRAME_PADDING_PX / vh_px)
        } else {
            frustum_h
        };

        let footprint_w = size.x.max(1e-3);
        let footprint_d = size.z.max(1e-3);
        let zoom = (usable_w / footprint_w).min(usable_h / footprint_d);

        let top = &mut switcher.top;
        top.target = Vec3::new(center.x, 0.0, center.z);
        top.height = TOP_NEAR + 0.95 * (TOP_FAR - TOP_NEAR);
        top.zoom = zoom.max(1e-4);
    }

    fn frame_perspective(switcher: &mut CameraSwitcher, container: &Container, bounds: &Aabb) {
        let center = bounds.center();
        let size = bounds.size();
        let max_dim = size.max_element().max(1e-3);

        let orbit = &mut switcher.orbit;
        if orbit.distance * orbit.distance < 0.01 {
            // Degenerate orbit: look in from +X.
            orbit.yaw = std::f32::consts::FRAC_PI_2;
            orbit.pitch = 0.0;
        }

        let mut fov = switcher.active().fovy * FOV_FILL;
        // The horizontal frustum is the binding one in portrait
        // viewports.
        if container.aspect() < 1.0 {
            fov *= container.aspect();
        }
        let distance = (0.5 * max_dim) / (0.5 * fov).tan();

        let orbit = &mut switcher.orbit;
        orbit.target = center;
        orbit.distance = distance;
    }

    /// Wheel zoom. Perspective dollies the orbit distance; top-down
    /// scales the frustum.
    pub fn zoom(&self, switcher: &mut CameraSwitcher, notches: f32) {
        let factor = (notches * 0.1).exp();
        match switcher.kind() {
            CameraKind::Perspective => {
                let orbit = &mut switcher.orbit;
                orbit.distance = (orbit.distance / factor).clamp(0.5, 2000.0);
            }
            CameraKind::Top => {
                let top = &mut switcher.top;
                top.zoom = (top.zoom * factor).clamp(1e-3, 1e3);
            }
        }
    }

    /// Orbit rotation from a pointer delta. Ignored in top-down, which
    /// has a fixed orientation.
    pub fn rotate(&self, switcher: &mut CameraSwitcher, delta_px: Vec2) {
        if switcher.kind() != CameraKind::Perspective {
            return;
        }
        let orbit = &mut switcher.orbit;
        orbit.yaw -= delta_px.x * 0.01;
        orbit.pitch = (orbit.pitch + delta_px.y * 0.01).clamp(MIN_PITCH, MAX_PITCH);
    }

    /// Drag pan: the target slides in the view plane by the world
    /// distance the pointer covered.
    pub fn pan(&self, switcher: &mut CameraSwitcher, delta_px: Vec2, container: &Container) {
        let camera = switcher.active();
        let per_px = match switcher.kind() {
            CameraKind::Top => camera.world_units_per_pixel(container.height()),
            CameraKind::Perspective => {
                let h = container.height().max(1.0);
                2.0 * switcher.orbit.distance * (0.5 * camera.fovy).tan() / h
            }
        };
        let shift = camera.right * (-delta_px.x * per_px) + camera.up * (delta_px.y * per_px);
        match switcher.kind() {
            CameraKind::Perspective => switcher.orbit.target += shift,
            CameraKind::Top => {
                switcher.top.target.x += shift.x;
                switcher.top.target.z += shift.z;
            }
        }
    }
}
