//! Math utilities and types
//!
//! Provides the fundamental math types used by transforms, bounds and
//! view-space distance computation.

pub use nalgebra::{
    Vector3, Vector4,
    Matrix4,
};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Extension helpers for 4x4 matrices
pub trait Mat4Ext {
    /// Transform a point, applying translation
    fn xform_point(&self, point: &Point3) -> Point3;

    /// Hash-friendly bit pattern of every element, column-major
    fn to_bits(&self) -> [u32; 16];
}

impl Mat4Ext for Mat4 {
    fn xform_point(&self, point: &Point3) -> Point3 {
        self.transform_point(point)
    }

    fn to_bits(&self) -> [u32; 16] {
        let mut bits = [0u32; 16];
        for (slot, value) in bits.iter_mut().zip(self.iter()) {
            // Collapse -0.0 onto 0.0 so equal matrices hash equally
            *slot = if *value == 0.0 { 0 } else { value.to_bits() };
        }
        bits
    }
}

/// Math utility functions
pub mod utils {
    use super::{Point3, Vec3};

    /// Component-wise minimum of two points
    pub fn min_point(a: &Point3, b: &Point3) -> Point3 {
        Point3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z))
    }

    /// Component-wise maximum of two points
    pub fn max_point(a: &Point3, b: &Point3) -> Point3 {
        Point3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z))
    }

    /// Midpoint between two points
    pub fn midpoint(a: &Point3, b: &Point3) -> Point3 {
        Point3::from((a.coords + b.coords) * 0.5)
    }

    /// Build a vector from a slice of at least three components
    pub fn vec3_from_slice(values: &[f32]) -> Vec3 {
        Vec3::new(values[0], values[1], values[2])
    }
}
