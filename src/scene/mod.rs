pub mod cursor;
pub mod link;
pub mod node;

use glam::Vec3;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::geom::Aabb;
use crate::loader::{LoadResult, ModelSource};

pub use cursor::{AddCursor, LinkCursor};
pub use link::NodeLink;
pub use node::SceneNode;

/// Wire-facing description of a node to create. A zero handle asks the
/// scene to assign one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    #[serde(default)]
    pub handle: u64,
    pub position: [f32; 3],
    #[serde(default)]
    pub model_url: Option<String>,
    #[serde(default)]
    pub reframe_on_model_load: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSpec {
    #[serde(default)]
    pub handle: u64,
    pub src_node: u64,
    pub dst_node: u64,
}

/// Flat node and link storage plus the two interaction cursors.
/// `geometry_version` bumps on every visible mutation; the renderer
/// compares it against the version it last uploaded.
pub struct Scene {
    nodes: Vec<SceneNode>,
    links: Vec<NodeLink>,
    pub add_cursor: AddCursor,
    pub link_cursor: LinkCursor,
    next_handle: u64,
    geometry_version: u64,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            links: Vec::new(),
            add_cursor: AddCursor::default(),
            link_cursor: LinkCursor::default(),
            next_handle: 1,
            geometry_version: 0,
        }
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn links(&self) -> &[NodeLink] {
        &self.links
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [SceneNode] {
        &mut self.nodes
    }

    pub(crate) fn links_mut(&mut self) -> &mut [NodeLink] {
        &mut self.links
    }

    pub fn geometry_version(&self) -> u64 {
        self.geometry_version
    }

    /// Marks the scene visually dirty. Mutators call this themselves;
    /// callers that move nodes through `node_mut` must call it too.
    pub fn touch(&mut self) {
        self.geometry_version = self.geometry_version.wrapping_add(1);
    }

    fn claim_handle(&mut self, requested: u64) -> u64 {
        let handle = if requested == 0 {
            self.next_handle
        } else {
            requested
        };
        self.next_handle = self.next_handle.max(handle + 1);
        handle
    }

    pub fn add_node(&mut self, spec: NodeSpec, source: &mut dyn ModelSource) -> u64 {
        let handle = self.claim_handle(spec.handle);
        let mut node = SceneNode::new(handle, Vec3::from(spec.position));
        node.reframe_on_model_load = spec.reframe_on_model_load;
        if let Some(url) = &spec.model_url {
            node.set_model(Some(url), source);
        }
        self.nodes.push(node);
        self.touch();
        handle
    }

    pub fn node(&self, handle: u64) -> Option<&SceneNode> {
        self.nodes.iter().find(|n| n.handle == handle)
    }

    pub fn node_mut(&mut self, handle: u64) -> Option<&mut SceneNode> {
        self.nodes.iter_mut().find(|n| n.handle == handle)
    }

    pub fn remove_node(&mut self, handle: u64) -> Option<SceneNode> {
        let index = self.nodes.iter().position(|n| n.handle == handle)?;
        self.touch();
        Some(self.nodes.remove(index))
    }

    /// Creates a link between two live nodes. Rejected (with a log)
    /// when either endpoint does not exist.
    pub fn add_link(&mut self, spec: LinkSpec) -> Option<u64> {
        let Some(src_node) = self.node(spec.src_node) else {
            warn!(
                "link {} -> {}: source node missing",
                spec.src_node, spec.dst_node
            );
            return None;
        };
        let src = src_node.link_anchor();
        let Some(dst_node) = self.node(spec.dst_node) else {
            warn!(
                "link {} -> {}: destination node missing",
                spec.src_node, spec.dst_node
            );
            return None;
        };
        let dst = dst_node.link_anchor();
        let handle = self.claim_handle(spec.handle);
        self.links
            .push(NodeLink::new(handle, spec.src_node, spec.dst_node, src, dst));
        self.touch();
        Some(handle)
    }

    pub fn link(&self, handle: u64) -> Option<&NodeLink> {
        self.links.iter().find(|l| l.handle == handle)
    }

    pub fn link_mut(&mut self, handle: u64) -> Option<&mut NodeLink> {
        self.links.iter_mut().find(|l| l.handle == handle)
    }

    pub fn remove_link(&mut self, handle: u64) -> Option<NodeLink> {
        let index = self.links.iter().position(|l| l.handle == handle)?;
        self.touch();
        Some(self.links.remove(index))
    }

    /// Refreshes cached link endpoints from the current node anchors.
    /// Links whose nodes are gone keep their last endpoints.
    pub fn sync_links(&mut self) {
        let mut moved = false;
        for i in 0..self.links.len() {
            let (src, dst) = {
                let l = &self.links[i];
                (
                    self.nodes
                        .iter()
                        .find(|n| n.handle == l.src_node)
                        .map(SceneNode::link_anchor),
                    self.nodes
                        .iter()
                        .find(|n| n.handle == l.dst_node)
                        .map(SceneNode::link_anchor),
                )
            };
            if let (Some(src), Some(dst)) = (src, dst) {
                let link = &mut self.links[i];
                if link.endpoints() != (src, dst) {
                    link.sync(src, dst);
                    moved = true;
                }
            }
        }
        if moved {
            self.touch();
        }
    }

    /// Routes a completed load to the node waiting on that url.
    /// Returns the handle of a node that both installed the model and
    /// asked to be re-framed.
    pub fn apply_load(&mut self, url: &str, result: LoadResult) -> Option<u64> {
        let node = self
            .nodes
            .iter_mut()
            .find(|n| n.loading_model_url() == Some(url))?;
        let installed = node.finish_load(url, result);
        let wants_reframe = installed && node.reframe_on_model_load;
        let handle = node.handle;
        if installed {
            self.touch();
        }
        wants_reframe.then_some(handle)
    }

    /// Union of all node bounds; a fixed ±5 box when the scene is
    /// empty so framing an empty scene still lands somewhere sane.
    pub fn bounding_box(&self) -> Aabb {
        let mut bounds = Aabb::EMPTY;
        for node in &self.nodes {
            bounds.expand(&node.world_bounds());
        }
        if bounds.is_empty() {
            Aabb::new(Vec3::splat(-5.0), Vec3::splat(5.0))
        } else {
            bounds
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::StaticModelSource;

    fn scene_with_two_nodes() -> (Scene, StaticModelSource) {
        let mut scene = Scene::new();
        let mut source = StaticModelSource::new();
        scene.add_node(
            NodeSpec {
                handle: 0,
                position: [0.0, 0.0, 0.0],
                model_url: None,
                reframe_on_model_load: false,
            },
            &mut source,
        );
        scene.add_node(
            NodeSpec {
                handle: 0,
                position: [6.0, 0.0, 0.0],
                model_url: None,
                reframe_on_model_load: false,
            },
            &mut source,
        );
        (scene, source)
    }

    #[test]
    fn handles_are_assigned_and_unique() {
        let (mut scene, mut source) = scene_with_two_nodes();
        let explicit = scene.add_node(
            NodeSpec {
                handle: 40,
                position: [0.0, 0.0, 0.0],
                model_url: None,
                reframe_on_model_load: false,
            },
            &mut source,
        );
        assert_eq!(explicit, 40);
        let next = scene.add_node(
            NodeSpec {
                handle: 0,
                position: [0.0, 0.0, 0.0],
                model_url: None,
                reframe_on_model_load: false,
            },
            &mut source,
        );
        assert_eq!(next, 41);
    }

    #[test]
    fn empty_scene_has_default_bounds() {
        let scene = Scene::new();
        let b = scene.bounding_box();
        assert_eq!(b.min, Vec3::splat(-5.0));
        assert_eq!(b.max, Vec3::splat(5.0));
    }

    #[test]
    fn link_requires_both_endpoints() {
        let (mut scene, _) = scene_with_two_nodes();
        assert!(scene
            .add_link(LinkSpec {
                handle: 0,
                src_node: 1,
                dst_node: 99,
            })
            .is_none());
        let link = scene
            .add_link(LinkSpec {
                handle: 0,
                src_node: 1,
                dst_node: 2,
            })
            .unwrap();
        assert!(scene.link(link).is_some());
    }

    #[test]
    fn sync_links_follows_node_moves() {
        let (mut scene, _) = scene_with_two_nodes();
        let link = scene
            .add_link(LinkSpec {
                handle: 0,
                src_node: 1,
                dst_node: 2,
            })
            .unwrap();
        let before = scene.geometry_version();

        scene
            .node_mut(2)
            .unwrap()
            .set_position(Vec3::new(6.0, 3.0, 0.0));
        scene.sync_links();
        let (_, dst) = scene.link(link).unwrap().endpoints();
        assert_eq!(dst.y, 3.0);
        assert!(scene.geometry_version() > before);

        // Removing a node leaves the link with its last endpoints.
        scene.remove_node(2);
        scene.sync_links();
        let (_, dst) = scene.link(link).unwrap().endpoints();
        assert_eq!(dst.y, 3.0);
    }

    #[test]
    fn apply_load_routes_to_waiting_node_and_reports_reframe() {
        let mut scene = Scene::new();
        let mut source = StaticModelSource::new();
        source.insert(
            "big.glb",
            crate::loader::box_mesh(Vec3::splat(-3.0), Vec3::splat(3.0)),
        );
        let handle = scene.add_node(
            NodeSpec {
                handle: 0,
                position: [0.0, 0.0, 0.0],
                model_url: Some("big.glb".to_string()),
                reframe_on_model_load: true,
            },
            &mut source,
        );

        let mut reframe = None;
        for (url, result) in source.poll() {
            reframe = scene.apply_load(&url, result).or(reframe);
        }
        assert_eq!(reframe, Some(handle));
        assert_eq!(scene.bounding_box().max.x, 3.0);
    }
}
