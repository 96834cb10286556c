//! View-space frustum used for visibility culling

use crate::foundation::math::{Point3, Vec3};
use crate::gobj::BoundingVolume;

/// Result of testing a volume against the frustum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intersection {
    /// Entirely outside; nothing below needs visiting
    Outside,
    /// Straddles at least one plane
    Partial,
    /// Entirely inside; nothing below needs testing
    Inside,
}

/// Plane defined by normal and distance from origin
#[derive(Debug, Clone, Copy)]
pub struct Plane {
    /// Normal vector, pointing into the frustum
    pub normal: Vec3,
    /// Distance from origin along the normal
    pub distance: f32,
}

impl Plane {
    /// Create a new plane from normal and distance
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self {
            normal: normal.normalize(),
            distance,
        }
    }

    /// Signed distance from plane to point, positive inside
    pub fn distance_to_point(&self, point: &Point3) -> f32 {
        self.normal.dot(&point.coords) + self.distance
    }
}

/// Frustum for visibility culling, in view space looking down -Z
#[derive(Debug, Clone)]
pub struct ViewFrustum {
    /// Six planes defining the frustum (left, right, top, bottom, near, far)
    pub planes: [Plane; 6],
}

impl ViewFrustum {
    /// Create a frustum from six planes
    pub const fn new(planes: [Plane; 6]) -> Self {
        Self { planes }
    }

    /// Symmetric perspective frustum
    ///
    /// `fov_y` is the full vertical field of view in radians.
    pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        let half_v = fov_y * 0.5;
        let half_h = (half_v.tan() * aspect).atan();
        let (sin_h, cos_h) = half_h.sin_cos();
        let (sin_v, cos_v) = half_v.sin_cos();
        Self::new([
            Plane::new(Vec3::new(cos_h, 0.0, -sin_h), 0.0),
            Plane::new(Vec3::new(-cos_h, 0.0, -sin_h), 0.0),
            Plane::new(Vec3::new(0.0, -cos_v, -sin_v), 0.0),
            Plane::new(Vec3::new(0.0, cos_v, -sin_v), 0.0),
            Plane::new(Vec3::new(0.0, 0.0, -1.0), -near),
            Plane::new(Vec3::new(0.0, 0.0, 1.0), far),
        ])
    }

    /// Classify an axis-aligned box
    pub fn classify_box(&self, min: &Point3, max: &Point3) -> Intersection {
        let mut result = Intersection::Inside;
        for plane in &self.planes {
            // Corner farthest along the normal, and the one opposite it
            let mut p = *min;
            let mut n = *max;
            if plane.normal.x >= 0.0 {
                p.x = max.x;
                n.x = min.x;
            }
            if plane.normal.y >= 0.0 {
                p.y = max.y;
                n.y = min.y;
            }
            if plane.normal.z >= 0.0 {
                p.z = max.z;
                n.z = min.z;
            }

            if plane.distance_to_point(&p) < 0.0 {
                return Intersection::Outside;
            }
            if plane.distance_to_point(&n) < 0.0 {
                result = Intersection::Partial;
            }
        }
        result
    }

    /// Classify a bounding volume
    pub fn classify(&self, bounds: &BoundingVolume) -> Intersection {
        match bounds {
            BoundingVolume::Empty => Intersection::Outside,
            BoundingVolume::Omni => Intersection::Partial,
            BoundingVolume::Box { min, max } => self.classify_box(min, max),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    fn frustum() -> ViewFrustum {
        ViewFrustum::perspective(FRAC_PI_2, 1.0, 1.0, 100.0)
    }

    fn unit_box_at(x: f32, y: f32, z: f32) -> BoundingVolume {
        BoundingVolume::from_corners(Point3::new(x - 0.5, y - 0.5, z - 0.5), Point3::new(x + 0.5, y + 0.5, z + 0.5))
    }

    #[test]
    fn test_plane_distance() {
        let plane = Plane::new(Vec3::new(0.0, 0.0, -1.0), -1.0);
        assert_relative_eq!(plane.distance_to_point(&Point3::new(0.0, 0.0, -5.0)), 4.0);
    }

    #[test]
    fn test_classifies_boxes() {
        let frustum = frustum();
        assert_eq!(frustum.classify(&unit_box_at(0.0, 0.0, -10.0)), Intersection::Inside);
        assert_eq!(frustum.classify(&unit_box_at(0.0, 0.0, 10.0)), Intersection::Outside);
        assert_eq!(frustum.classify(&unit_box_at(0.0, 0.0, -200.0)), Intersection::Outside);
        assert_eq!(frustum.classify(&unit_box_at(50.0, 0.0, -10.0)), Intersection::Outside);
        assert_eq!(frustum.classify(&unit_box_at(10.0, 0.0, -10.0)), Intersection::Partial);
        assert_eq!(frustum.classify(&unit_box_at(0.0, 0.0, -1.0)), Intersection::Partial);
    }

    #[test]
    fn test_special_volumes() {
        let frustum = frustum();
        assert_eq!(frustum.classify(&BoundingVolume::Omni), Intersection::Partial);
        assert_eq!(frustum.classify(&BoundingVolume::Empty), Intersection::Outside);
    }
}
