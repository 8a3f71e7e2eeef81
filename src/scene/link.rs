use glam::Vec3;

use crate::geom::{self, Ray};

pub const LINK_RADIUS: f32 = 0.05;
pub const LINK_CONE_RADIUS: f32 = 0.15;
pub const LINK_CONE_HEIGHT: f32 = 0.5;

/// Directed connection between two nodes, displayed as an inset
/// cylinder with an arrow cone at the destination end. Endpoint
/// positions are cached copies of the node anchors; [`NodeLink::sync`]
/// refreshes them whenever either node moves. A link whose node was
/// removed simply stops syncing; cascade deletion is owned by the
/// layer that owns the graph.
#[derive(Debug, Clone)]
pub struct NodeLink {
    pub handle: u64,
    pub src_node: u64,
    pub dst_node: u64,
    src_pos: Vec3,
    dst_pos: Vec3,
    pub hovered: bool,
    pub selected: bool,
}

/// Shaft endpoints pulled in from the node anchors so arrows read as
/// arriving at a node rather than piercing it.
pub fn inset_endpoints(src: Vec3, dst: Vec3, max_inset: f32) -> (Vec3, Vec3) {
    let delta = dst - src;
    let len = delta.length();
    if len < 1e-6 {
        return (src, dst);
    }
    let dir = delta / len;
    let inset = max_inset.min(len * 0.333);
    (src + dir * inset, dst - dir * inset)
}

impl NodeLink {
    pub fn new(handle: u64, src_node: u64, dst_node: u64, src_pos: Vec3, dst_pos: Vec3) -> Self {
        Self {
            handle,
            src_node,
            dst_node,
            src_pos,
            dst_pos,
            hovered: false,
            selected: false,
        }
    }

    pub fn sync(&mut self, src_pos: Vec3, dst_pos: Vec3) {
        self.src_pos = src_pos;
        self.dst_pos = dst_pos;
    }

    pub fn endpoints(&self) -> (Vec3, Vec3) {
        (self.src_pos, self.dst_pos)
    }

    /// Visible cylinder segment.
    pub fn shaft(&self) -> (Vec3, Vec3) {
        inset_endpoints(self.src_pos, self.dst_pos, 1.0)
    }

    /// Arrow cone at the destination end: (base center, tip).
    pub fn cone(&self) -> (Vec3, Vec3) {
        let (_, tip) = self.shaft();
        let dir = (self.dst_pos - self.src_pos).normalize_or_zero();
        (tip - dir * LINK_CONE_HEIGHT, tip)
    }

    /// Picking test against the shaft capsule.
    pub fn raycast(&self, ray: &Ray) -> Option<f32> {
        let (a, b) = self.shaft();
        geom::ray_capsule(ray, a, b, LINK_RADIUS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_links_use_proportional_inset() {
        let (a, b) = inset_endpoints(Vec3::ZERO, Vec3::new(1.5, 0.0, 0.0), 1.0);
        // 1.5 * 0.333 is below the 1.0 cap.
        assert!((a.x - 0.4995).abs() < 1e-4);
        assert!((b.x - 1.0005).abs() < 1e-4);
    }

    #[test]
    fn long_links_cap_the_inset() {
        let (a, b) = inset_endpoints(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), 1.0);
        assert!((a.x - 1.0).abs() < 1e-5);
        assert!((b.x - 9.0).abs() < 1e-5);
    }

    #[test]
    fn degenerate_link_keeps_endpoints() {
        let p = Vec3::new(2.0, 0.0, 2.0);
        assert_eq!(inset_endpoints(p, p, 1.0), (p, p));
    }

    #[test]
    fn raycast_hits_the_shaft_not_the_gap() {
        let link = NodeLink::new(1, 10, 11, Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0));
        let mid = Ray::new(Vec3::new(5.0, 0.0, 3.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(link.raycast(&mid).is_some());
        // Inside the inset gap next to the source anchor.
        let gap = Ray::new(Vec3::new(0.4, 0.0, 3.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(link.raycast(&gap).is_none());
    }

    #[test]
    fn sync_moves_cached_endpoints() {
        let mut link = NodeLink::new(1, 10, 11, Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0));
        link.sync(Vec3::new(0.0, 1.0, 0.0), Vec3::new(4.0, 1.0, 0.0));
        assert_eq!(link.endpoints().0.y, 1.0);
        let (base, tip) = link.cone();
        assert!(tip.x > base.x);
        assert!((tip.x - base.x - LINK_CONE_HEIGHT).abs() < 1e-5);
    }
}
