use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::geom::Ray;

pub const PERSP_FOV_DEG: f32 = 55.0;
pub const PERSP_NEAR: f32 = 1.0;
pub const PERSP_FAR: f32 = 8000.0;

/// Vertical extent of the top-down orthographic frustum at zoom 1.
pub const TOP_FRUSTUM_SIZE: f32 = 15.0;
pub const TOP_NEAR: f32 = 1.0;
pub const TOP_FAR: f32 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraKind {
    Perspective,
    Top,
}

impl CameraKind {
    pub const ALL: [CameraKind; 2] = [CameraKind::Perspective, CameraKind::Top];

    pub fn label(self) -> &'static str {
        match self {
            CameraKind::Perspective => "Perspective",
            CameraKind::Top => "Top",
        }
    }

    pub fn toggled(self) -> CameraKind {
        match self {
            CameraKind::Perspective => CameraKind::Top,
            CameraKind::Top => CameraKind::Perspective,
        }
    }
}

impl std::fmt::Display for CameraKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Orbit parameters for the perspective camera.
#[derive(Debug, Clone, Copy)]
pub struct PerspOrbit {
    pub target: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub distance: f32,
}

impl Default for PerspOrbit {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            yaw: 0.6,
            pitch: 0.5,
            distance: 20.0,
        }
    }
}

/// Top-down orthographic view: camera straight above `target`, north
/// (-Z) up on screen.
#[derive(Debug, Clone, Copy)]
pub struct TopView {
    pub target: Vec3,
    pub height: f32,
    pub zoom: f32,
}

impl Default for TopView {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            height: 5.0,
            zoom: 1.0,
        }
    }
}

/// A copyable camera snapshot. Rebuilt each update from the active
/// navigation parameters; everything downstream (picking, dragging,
/// rendering) reads only this.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub eye: Vec3,
    pub forward: Vec3,
    pub right: Vec3,
    pub up: Vec3,
    pub aspect: f32,
    pub fovy: f32,
    pub kind: CameraKind,
    pub ortho_half_h: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn from_orbit(orbit: &PerspOrbit, aspect: f32) -> Camera {
        let (sy, cy) = orbit.yaw.sin_cos();
        let (sp, cp) = orbit.pitch.sin_cos();
        let distance = orbit.distance.max(PERSP_NEAR);
        let offset = Vec3::new(distance * cp * sy, distance * sp, distance * cp * cy);
        let eye = orbit.target + offset;
        let forward = (orbit.target - eye).normalize_or_zero();
        let right = forward.cross(Vec3::Y).normalize_or_zero();
        let up = right.cross(forward);

        Camera {
            eye,
            forward,
            right,
            up,
            aspect,
            fovy: PERSP_FOV_DEG.to_radians(),
            kind: CameraKind::Perspective,
            ortho_half_h: 0.0,
            near: PERSP_NEAR,
            far: PERSP_FAR,
        }
    }

    pub fn from_top(top: &TopView, aspect: f32) -> Camera {
        let eye = Vec3::new(top.target.x, top.height, top.target.z);
        Camera {
            eye,
            forward: -Vec3::Y,
            right: Vec3::X,
            up: -Vec3::Z,
            aspect,
            fovy: PERSP_FOV_DEG.to_radians(),
            kind: CameraKind::Top,
            ortho_half_h: 0.5 * TOP_FRUSTUM_SIZE / top.zoom.max(1e-4),
            near: TOP_NEAR,
            far: TOP_FAR,
        }
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_to_rh(self.eye, self.forward, self.up)
    }

    pub fn projection(&self) -> Mat4 {
        match self.kind {
            CameraKind::Perspective => {
                Mat4::perspective_rh(self.fovy, self.aspect, self.near, self.far)
            }
            CameraKind::Top => {
                let half_h = self.ortho_half_h;
                let half_w = half_h * self.aspect;
                Mat4::orthographic_rh(-half_w, half_w, -half_h, half_h, self.near, self.far)
            }
        }
    }

    /// Ray through the given NDC position. Perspective rays diverge
    /// from the eye; orthographic rays run parallel, sliding the
    /// origin over the frustum plane.
    pub fn ray_from_ndc(&self, ndc: Vec2) -> Ray {
        match self.kind {
            CameraKind::Perspective => {
                let half_h = (0.5 * self.fovy).tan();
                let half_w = half_h * self.aspect;
                let dir = (self.forward
                    + self.right * (ndc.x * half_w)
                    + self.up * (ndc.y * half_h))
                    .normalize_or_zero();
                Ray::new(self.eye, dir)
            }
            CameraKind::Top => {
                let half_h = self.ortho_half_h;
                let half_w = half_h * self.aspect;
                let origin = self.eye
                    + self.right * (ndc.x * half_w)
                    + self.up * (ndc.y * half_h);
                Ray::new(origin, self.forward)
            }
        }
    }

    /// World units covered by one logical pixel. Only meaningful for
    /// the orthographic camera.
    pub fn world_units_per_pixel(&self, viewport_height_px: f32) -> f32 {
        if viewport_height_px <= 1.0 {
            return 0.0;
        }
        2.0 * self.ortho_half_h / viewport_height_px
    }
}

/// Emitted by [`CameraSwitcher::set_kind`]; the orchestrator fans it
/// out to controls, drag cancellation, and the renderer's depth
/// linearization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraSwitch {
    pub old: CameraKind,
    pub new: CameraKind,
}

/// Owns the two navigation states and the active projection kind.
#[derive(Debug, Clone)]
pub struct CameraSwitcher {
    kind: CameraKind,
    aspect: f32,
    pub orbit: PerspOrbit,
    pub top: TopView,
}

impl CameraSwitcher {
    pub fn new(aspect: f32) -> Self {
        Self {
            kind: CameraKind::Perspective,
            aspect,
            orbit: PerspOrbit::default(),
            top: TopView::default(),
        }
    }

    pub fn kind(&self) -> CameraKind {
        self.kind
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// No-op (and no notification) when the kind is unchanged.
    pub fn set_kind(&mut self, kind: CameraKind) -> Option<CameraSwitch> {
        if kind == self.kind {
            return None;
        }
        let old = self.kind;
        self.kind = kind;
        Some(CameraSwitch { old, new: kind })
    }

    pub fn toggle(&mut self) -> CameraSwitch {
        let old = self.kind;
        self.kind = self.kind.toggled();
        CameraSwitch {
            old,
            new: self.kind,
        }
    }

    /// Both frustums track the container aspect; the orthographic one
    /// keeps its vertical extent fixed and stretches horizontally.
    pub fn handle_resize(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    pub fn active(&self) -> Camera {
        match self.kind {
            CameraKind::Perspective => Camera::from_orbit(&self.orbit, self.aspect),
            CameraKind::Top => Camera::from_top(&self.top, self.aspect),
        }
    }
}
