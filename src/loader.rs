use std::collections::VecDeque;
use std::sync::Arc;

use glam::Vec3;
use thiserror::Error;

use crate::geom::{self, Aabb, Ray};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("model fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },
    #[error("model decode failed for {url}: {reason}")]
    Decode { url: String, reason: String },
}

/// Triangle soup with the source file's node hierarchy preserved as
/// recursive children. Positions are in the model's local space.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub positions: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub children: Vec<Mesh>,
}

impl Mesh {
    pub fn aabb(&self) -> Aabb {
        let mut bounds = Aabb::EMPTY;
        self.expand_aabb(&mut bounds);
        bounds
    }

    fn expand_aabb(&self, bounds: &mut Aabb) {
        for &p in &self.positions {
            bounds.expand_point(p);
        }
        for child in &self.children {
            child.expand_aabb(bounds);
        }
    }

    /// Nearest hit distance over this mesh and all descendants.
    pub fn raycast(&self, ray: &Ray) -> Option<f32> {
        let mut best: Option<f32> = None;
        for tri in self.indices.chunks_exact(3) {
            let (a, b, c) = (
                self.positions[tri[0] as usize],
                self.positions[tri[1] as usize],
                self.positions[tri[2] as usize],
            );
            if let Some(t) = geom::ray_triangle(ray, a, b, c) {
                if best.map_or(true, |b| t < b) {
                    best = Some(t);
                }
            }
        }
        for child in &self.children {
            if let Some(t) = child.raycast(ray) {
                if best.map_or(true, |b| t < b) {
                    best = Some(t);
                }
            }
        }
        best
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
            + self
                .children
                .iter()
                .map(Mesh::triangle_count)
                .sum::<usize>()
    }
}

/// Axis-aligned box mesh, 12 triangles. The node placeholder and the
/// picking fallback both use it.
pub fn box_mesh(min: Vec3, max: Vec3) -> Mesh {
    let p = [
        Vec3::new(min.x, min.y, min.z),
        Vec3::new(max.x, min.y, min.z),
        Vec3::new(max.x, max.y, min.z),
        Vec3::new(min.x, max.y, min.z),
        Vec3::new(min.x, min.y, max.z),
        Vec3::new(max.x, min.y, max.z),
        Vec3::new(max.x, max.y, max.z),
        Vec3::new(min.x, max.y, max.z),
    ];
    let indices = vec![
        0, 2, 1, 0, 3, 2, // -z
        4, 5, 6, 4, 6, 7, // +z
        0, 1, 5, 0, 5, 4, // -y
        3, 6, 2, 3, 7, 6, // +y
        0, 7, 3, 0, 4, 7, // -x
        1, 2, 6, 1, 6, 5, // +x
    ];
    Mesh {
        positions: p.to_vec(),
        indices,
        children: Vec::new(),
    }
}

pub type LoadResult = Result<Arc<Mesh>, LoadError>;

/// Asynchronous model provider. Format parsing lives behind this seam;
/// the viewport only requests URLs and drains completions once per
/// update. There is no cancellation: callers enforce their own
/// in-flight limits before requesting.
pub trait ModelSource {
    fn request(&mut self, url: &str);
    fn poll(&mut self) -> Vec<(String, LoadResult)>;
}

/// In-memory source for tests and the demo: completions are queued up
/// front and delivered on poll, preserving request order.
#[derive(Default)]
pub struct StaticModelSource {
    meshes: Vec<(String, LoadResult)>,
    pending: VecDeque<String>,
}

impl StaticModelSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: impl Into<String>, mesh: Mesh) {
        self.meshes.push((url.into(), Ok(Arc::new(mesh))));
    }

    pub fn insert_failure(&mut self, url: impl Into<String>, error: LoadError) {
        self.meshes.push((url.into(), Err(error)));
    }
}

impl ModelSource for StaticModelSource {
    fn request(&mut self, url: &str) {
        self.pending.push_back(url.to_string());
    }

    fn poll(&mut self) -> Vec<(String, LoadResult)> {
        let mut out = Vec::new();
        while let Some(url) = self.pending.pop_front() {
            let result = match self.meshes.iter().find(|(u, _)| *u == url) {
                Some((_, Ok(mesh))) => Ok(Arc::clone(mesh)),
                Some((_, Err(e))) => Err(LoadError::Fetch {
                    url: url.clone(),
                    reason: e.to_string(),
                }),
                None => Err(LoadError::Fetch {
                    url: url.clone(),
                    reason: "unknown url".to_string(),
                }),
            };
            out.push((url, result));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_mesh_bounds_and_raycast() {
        let mesh = box_mesh(Vec3::splat(-1.0), Vec3::splat(1.0));
        let bounds = mesh.aabb();
        assert_eq!(bounds.min, Vec3::splat(-1.0));
        assert_eq!(bounds.max, Vec3::splat(1.0));

        let ray = Ray::new(Vec3::new(0.0, 0.0, 4.0), Vec3::new(0.0, 0.0, -1.0));
        let t = mesh.raycast(&ray).unwrap();
        assert!((t - 3.0).abs() < 1e-5);
    }

    #[test]
    fn nested_children_contribute_to_bounds_and_hits() {
        let mut root = box_mesh(Vec3::splat(-0.5), Vec3::splat(0.5));
        root.children
            .push(box_mesh(Vec3::new(4.5, -0.5, -0.5), Vec3::new(5.5, 0.5, 0.5)));
        assert_eq!(root.aabb().max.x, 5.5);

        let ray = Ray::new(Vec3::new(5.0, 0.0, 4.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(root.raycast(&ray).is_some());
        assert_eq!(root.triangle_count(), 24);
    }

    #[test]
    fn static_source_round_trip() {
        let mut source = StaticModelSource::new();
        source.insert("m.glb", box_mesh(Vec3::ZERO, Vec3::ONE));
        source.request("m.glb");
        source.request("missing.glb");

        let done = source.poll();
        assert_eq!(done.len(), 2);
        assert!(done[0].1.is_ok());
        assert!(done[1].1.is_err());
        assert!(source.poll().is_empty());
    }
}
