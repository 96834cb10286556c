//! Bounding volumes used for culling and depth sorting

use crate::foundation::math::{utils, Mat4, Mat4Ext, Point3};

/// Spatial extent of a piece of geometry
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum BoundingVolume {
    /// Contains nothing; never visible and never sorted
    #[default]
    Empty,
    /// Axis-aligned box
    Box {
        /// Minimum corner
        min: Point3,
        /// Maximum corner
        max: Point3,
    },
    /// Contains everything; always passes the view test
    Omni,
}

impl BoundingVolume {
    /// Box spanning two corners in any order
    pub fn from_corners(a: Point3, b: Point3) -> Self {
        Self::Box {
            min: utils::min_point(&a, &b),
            max: utils::max_point(&a, &b),
        }
    }

    /// Smallest box containing the points, or `Empty`
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3>) -> Self {
        points
            .into_iter()
            .fold(Self::Empty, |bounds, point| bounds.extended(point))
    }

    /// Whether the volume contains nothing
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Whether the volume contains everything
    pub const fn is_infinite(&self) -> bool {
        matches!(self, Self::Omni)
    }

    /// Center of a finite volume
    pub fn center(&self) -> Option<Point3> {
        match self {
            Self::Box { min, max } => Some(utils::midpoint(min, max)),
            Self::Empty | Self::Omni => None,
        }
    }

    /// This volume grown to include a point
    pub fn extended(self, point: &Point3) -> Self {
        match self {
            Self::Empty => Self::Box {
                min: *point,
                max: *point,
            },
            Self::Box { min, max } => Self::Box {
                min: utils::min_point(&min, point),
                max: utils::max_point(&max, point),
            },
            Self::Omni => Self::Omni,
        }
    }

    /// Smallest volume containing both
    pub fn union(self, other: &Self) -> Self {
        match (self, other) {
            (Self::Omni, _) | (_, Self::Omni) => Self::Omni,
            (Self::Empty, other) => *other,
            (this, Self::Empty) => this,
            (Self::Box { min, max }, Self::Box { min: omin, max: omax }) => Self::Box {
                min: utils::min_point(&min, omin),
                max: utils::max_point(&max, omax),
            },
        }
    }

    /// Axis-aligned box around the transformed volume
    pub fn transformed(&self, mat: &Mat4) -> Self {
        match self {
            Self::Box { min, max } => {
                let corners = [
                    Point3::new(min.x, min.y, min.z),
                    Point3::new(max.x, min.y, min.z),
                    Point3::new(min.x, max.y, min.z),
                    Point3::new(max.x, max.y, min.z),
                    Point3::new(min.x, min.y, max.z),
                    Point3::new(max.x, min.y, max.z),
                    Point3::new(min.x, max.y, max.z),
                    Point3::new(max.x, max.y, max.z),
                ];
                let moved: Vec<Point3> = corners.iter().map(|c| mat.xform_point(c)).collect();
                Self::from_points(moved.iter())
            }
            other => *other,
        }
    }
}
