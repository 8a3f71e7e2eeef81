use std::sync::Arc;

use glam::Vec3;
use log::{debug, warn};

use crate::geom::{Aabb, Ray};
use crate::loader::{self, LoadResult, Mesh, ModelSource};

/// Half extent of the placeholder box shown before a model arrives.
const PLACEHOLDER_HALF: f32 = 0.5;

/// A positioned entity in the scene graph. Carries either a loaded
/// model mesh or a placeholder box; the placeholder is rescaled to the
/// model bounds once a load completes so picking stays stable.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub handle: u64,
    position: Vec3,
    pub hovered: bool,
    pub selected: bool,
    /// When set, a completed model load asks the viewport to re-frame.
    pub reframe_on_model_load: bool,
    model: Option<Arc<Mesh>>,
    local_bounds: Aabb,
    loaded_model_url: Option<String>,
    loading_model_url: Option<String>,
}

impl SceneNode {
    pub fn new(handle: u64, position: Vec3) -> Self {
        Self {
            handle,
            position,
            hovered: false,
            selected: false,
            reframe_on_model_load: false,
            model: None,
            local_bounds: Aabb::new(
                Vec3::splat(-PLACEHOLDER_HALF),
                Vec3::splat(PLACEHOLDER_HALF),
            ),
            loaded_model_url: None,
            loading_model_url: None,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn model(&self) -> Option<&Arc<Mesh>> {
        self.model.as_ref()
    }

    pub fn loaded_model_url(&self) -> Option<&str> {
        self.loaded_model_url.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading_model_url.is_some()
    }

    pub fn loading_model_url(&self) -> Option<&str> {
        self.loading_model_url.as_deref()
    }

    /// Requests a model swap. At most one load may be in flight per
    /// node; a second request while one is pending is rejected, never
    /// queued. `None` clears the model back to the placeholder.
    pub fn set_model(&mut self, url: Option<&str>, source: &mut dyn ModelSource) {
        if let Some(pending) = &self.loading_model_url {
            warn!(
                "node {}: rejecting model change to {:?} while {pending} is loading",
                self.handle, url
            );
            return;
        }
        match url {
            Some(url) => {
                if self.loaded_model_url.as_deref() == Some(url) {
                    return;
                }
                debug!("node {}: requesting model {url}", self.handle);
                self.loading_model_url = Some(url.to_string());
                source.request(url);
            }
            None => {
                self.model = None;
                self.loaded_model_url = None;
                self.local_bounds = Aabb::new(
                    Vec3::splat(-PLACEHOLDER_HALF),
                    Vec3::splat(PLACEHOLDER_HALF),
                );
            }
        }
    }

    /// Applies a completed load for `url`. Ignored when the node is no
    /// longer waiting for that url. Returns true when a model was
    /// installed (the reframe trigger).
    pub fn finish_load(&mut self, url: &str, result: LoadResult) -> bool {
        if self.loading_model_url.as_deref() != Some(url) {
            return false;
        }
        self.loading_model_url = None;
        match result {
            Ok(mesh) => {
                let bounds = mesh.aabb();
                if !bounds.is_empty() {
                    self.local_bounds = bounds;
                }
                self.model = Some(mesh);
                self.loaded_model_url = Some(url.to_string());
                true
            }
            Err(e) => {
                warn!("node {}: model load failed: {e}", self.handle);
                false
            }
        }
    }

    /// Local-space bounds of whatever the node currently shows.
    pub fn local_bounds(&self) -> Aabb {
        self.local_bounds
    }

    pub fn world_bounds(&self) -> Aabb {
        self.local_bounds.translated(self.position)
    }

    /// Where links attach: the center of the node's bounds.
    pub fn link_anchor(&self) -> Vec3 {
        self.position + self.local_bounds.center()
    }

    /// Nearest hit against the loaded model's triangles, or against
    /// the placeholder box when no model is present. The ray is in
    /// world space.
    pub fn raycast(&self, ray: &Ray) -> Option<f32> {
        crate::geom::ray_aabb(ray, &self.world_bounds())?;
        let local = Ray::new(ray.origin - self.position, ray.dir);
        match &self.model {
            Some(mesh) => mesh.raycast(&local),
            None => {
                let placeholder = loader::box_mesh(self.local_bounds.min, self.local_bounds.max);
                placeholder.raycast(&local)
            }
        }
    }
}
