use glam::Vec3;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.max - self.min
        }
    }

    pub fn expand_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn expand(&mut self, other: &Aabb) {
        if !other.is_empty() {
            self.min = self.min.min(other.min);
            self.max = self.max.max(other.max);
        }
    }

    pub fn translated(&self, offset: Vec3) -> Aabb {
        if self.is_empty() {
            *self
        } else {
            Aabb::new(self.min + offset, self.max + offset)
        }
    }
}

/// A world-space ray. `dir` is unit length for perspective rays; for
/// orthographic rays it is the camera forward vector.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, dir: Vec3) -> Self {
        Self { origin, dir }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.dir * t
    }
}

/// Infinite plane through `point` with the given normal.
#[derive(Debug, Clone, Copy)]
pub struct Plane {
    pub normal: Vec3,
    pub point: Vec3,
}

impl Plane {
    pub fn from_normal_and_point(normal: Vec3, point: Vec3) -> Self {
        Self { normal, point }
    }
}

/// Ray/plane intersection, front and back facing alike. None when the
/// ray is parallel to the plane or the hit lies behind the origin.
pub fn ray_plane(ray: &Ray, plane: &Plane) -> Option<Vec3> {
    let denom = plane.normal.dot(ray.dir);
    if denom.abs() < 1e-8 {
        return None;
    }
    let t = plane.normal.dot(plane.point - ray.origin) / denom;
    if t < 0.0 {
        return None;
    }
    Some(ray.at(t))
}

/// Slab test. Returns the entry distance (clamped to 0 when the origin
/// is inside the box).
pub fn ray_aabb(ray: &Ray, aabb: &Aabb) -> Option<f32> {
    if aabb.is_empty() {
        return None;
    }
    let inv = ray.dir.recip();
    let t0 = (aabb.min - ray.origin) * inv;
    let t1 = (aabb.max - ray.origin) * inv;
    let t_min = t0.min(t1);
    let t_max = t0.max(t1);
    let near = t_min.max_element();
    let far = t_max.min_element();
    if near > far || far < 0.0 {
        None
    } else {
        Some(near.max(0.0))
    }
}

/// Möller-Trumbore, both winding orders accepted.
pub fn ray_triangle(ray: &Ray, a: Vec3, b: Vec3, c: Vec3) -> Option<f32> {
    let ab = b - a;
    let ac = c - a;
    let p = ray.dir.cross(ac);
    let det = ab.dot(p);
    if det.abs() < 1e-8 {
        return None;
    }
    let inv_det = 1.0 / det;
    let s = ray.origin - a;
    let u = s.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(ab);
    let v = ray.dir.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = ac.dot(q) * inv_det;
    if t < 0.0 {
        None
    } else {
        Some(t)
    }
}

/// Ray against the capsule around segment [p0, p1] with the given
/// radius. Closest-approach test; exact enough for picking thin link
/// cylinders.
pub fn ray_capsule(ray: &Ray, p0: Vec3, p1: Vec3, radius: f32) -> Option<f32> {
    let seg = p1 - p0;
    let seg_len_sq = seg.length_squared();
    if seg_len_sq < 1e-12 {
        return ray_sphere(ray, p0, radius);
    }

    // Closest approach between the ray line and the segment line,
    // then clamp onto the segment and verify the distance.
    let w = ray.origin - p0;
    let a = ray.dir.dot(ray.dir);
    let b = ray.dir.dot(seg);
    let c = seg_len_sq;
    let d = ray.dir.dot(w);
    let e = seg.dot(w);
    let denom = a * c - b * b;

    let (mut t_ray, mut t_seg);
    if denom.abs() < 1e-8 {
        t_seg = (e / c).clamp(0.0, 1.0);
        t_ray = (b * t_seg - d) / a;
    } else {
        t_seg = ((a * e - b * d) / denom).clamp(0.0, 1.0);
        t_ray = (b * t_seg - d) / a;
    }
    if t_ray < 0.0 {
        t_ray = 0.0;
        t_seg = (e / c).clamp(0.0, 1.0);
    }

    let on_ray = ray.at(t_ray);
    let on_seg = p0 + seg * t_seg;
    if on_ray.distance_squared(on_seg) <= radius * radius {
        Some(t_ray)
    } else {
        None
    }
}

fn ray_sphere(ray: &Ray, center: Vec3, radius: f32) -> Option<f32> {
    let oc = ray.origin - center;
    let a = ray.dir.dot(ray.dir);
    let b = 2.0 * oc.dot(ray.dir);
    let c = oc.dot(oc) - radius * radius;
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }
    let t = (-b - disc.sqrt()) / (2.0 * a);
    if t < 0.0 {
        None
    } else {
        Some(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aabb_expand_and_center() {
        let mut b = Aabb::EMPTY;
        assert!(b.is_empty());
        b.expand_point(Vec3::new(-1.0, 0.0, 2.0));
        b.expand_point(Vec3::new(3.0, 4.0, -2.0));
        assert_eq!(b.center(), Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(b.size(), Vec3::new(4.0, 4.0, 4.0));
    }

    #[test]
    fn ray_hits_aabb_from_outside_and_inside() {
        let b = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let r = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
        assert!((ray_aabb(&r, &b).unwrap() - 4.0).abs() < 1e-5);

        let inside = Ray::new(Vec3::ZERO, Vec3::X);
        assert_eq!(ray_aabb(&inside, &b), Some(0.0));

        let miss = Ray::new(Vec3::new(0.0, 5.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(ray_aabb(&miss, &b).is_none());
    }

    #[test]
    fn ray_behind_aabb_misses() {
        let b = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let r = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(ray_aabb(&r, &b).is_none());
    }

    #[test]
    fn triangle_hit_and_miss() {
        let a = Vec3::new(-1.0, 0.0, -1.0);
        let b = Vec3::new(1.0, 0.0, -1.0);
        let c = Vec3::new(0.0, 0.0, 1.0);
        let down = Ray::new(Vec3::new(0.0, 2.0, 0.0), Vec3::new(0.0, -1.0, 0.0));
        assert!((ray_triangle(&down, a, b, c).unwrap() - 2.0).abs() < 1e-5);

        let off = Ray::new(Vec3::new(5.0, 2.0, 0.0), Vec3::new(0.0, -1.0, 0.0));
        assert!(ray_triangle(&off, a, b, c).is_none());
    }

    #[test]
    fn capsule_grazing_hit() {
        let p0 = Vec3::new(-2.0, 0.0, 0.0);
        let p1 = Vec3::new(2.0, 0.0, 0.0);
        let hit = Ray::new(Vec3::new(0.0, 0.04, 5.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(ray_capsule(&hit, p0, p1, 0.05).is_some());
        let miss = Ray::new(Vec3::new(0.0, 0.2, 5.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(ray_capsule(&miss, p0, p1, 0.05).is_none());
    }

    #[test]
    fn plane_intersection() {
        let plane = Plane::from_normal_and_point(Vec3::Y, Vec3::ZERO);
        let r = Ray::new(Vec3::new(1.0, 3.0, 1.0), Vec3::new(0.0, -1.0, 0.0));
        assert_eq!(ray_plane(&r, &plane), Some(Vec3::new(1.0, 0.0, 1.0)));

        let parallel = Ray::new(Vec3::new(0.0, 1.0, 0.0), Vec3::X);
        assert!(ray_plane(&parallel, &plane).is_none());
    }
}
