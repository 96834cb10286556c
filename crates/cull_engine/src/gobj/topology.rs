//! Per-topology behavior table
//!
//! The primitive kinds are a closed set, so behavior that differs between
//! them (vertices per primitive, connector vertices, decomposition and
//! rotation targets) lives in one `match` per property instead of being
//! spread across a type hierarchy.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{GeomRendering, ShadeModel};

/// Kind of primitive described by a [`GeomPrimitive`](super::GeomPrimitive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PrimitiveTopology {
    /// Independent points
    Points,
    /// Independent line segments
    Lines,
    /// Connected polylines of varying length
    LineStrips,
    /// Independent triangles
    Triangles,
    /// Triangle strips, joined by degenerate connector vertices
    TriStrips,
    /// Triangle fans of varying length
    TriFans,
}

impl PrimitiveTopology {
    /// All topologies
    pub const ALL: [Self; 6] = [
        Self::Points,
        Self::Lines,
        Self::LineStrips,
        Self::Triangles,
        Self::TriStrips,
        Self::TriFans,
    ];

    /// Vertices per primitive for fixed-size topologies, 0 for variable ones
    pub const fn num_vertices_per_primitive(self) -> usize {
        match self {
            Self::Points => 1,
            Self::Lines => 2,
            Self::Triangles => 3,
            Self::LineStrips | Self::TriStrips | Self::TriFans => 0,
        }
    }

    /// Vertices that must be added before a primitive may be closed
    pub const fn min_num_vertices_per_primitive(self) -> usize {
        match self {
            Self::Points => 1,
            Self::Lines | Self::LineStrips => 2,
            Self::Triangles | Self::TriStrips | Self::TriFans => 3,
        }
    }

    /// Connector vertices stored between consecutive primitives
    pub const fn num_unused_vertices_per_primitive(self) -> usize {
        match self {
            Self::TriStrips => 2,
            _ => 0,
        }
    }

    /// Whether primitives have varying vertex counts recorded in `ends`
    pub const fn is_variable(self) -> bool {
        self.num_vertices_per_primitive() == 0
    }

    /// Whether a new primitive begins with connector vertices
    pub const fn requires_unused_vertices(self) -> bool {
        self.num_unused_vertices_per_primitive() > 0
    }

    /// The simpler topology this one decomposes into, if any
    pub const fn decomposed(self) -> Option<Self> {
        match self {
            Self::TriStrips | Self::TriFans => Some(Self::Triangles),
            Self::LineStrips => Some(Self::Lines),
            _ => None,
        }
    }

    /// The fixed-size topology of the same family (points, lines or triangles)
    pub const fn base(self) -> Self {
        match self {
            Self::Points => Self::Points,
            Self::Lines | Self::LineStrips => Self::Lines,
            Self::Triangles | Self::TriStrips | Self::TriFans => Self::Triangles,
        }
    }

    /// Whether the vertex order can be rotated to swap flat-shading conventions
    pub const fn can_rotate(self) -> bool {
        matches!(self, Self::Triangles | Self::Lines | Self::LineStrips)
    }

    /// Whether this topology draws triangles
    pub const fn is_polygon(self) -> bool {
        matches!(self, Self::Triangles | Self::TriStrips | Self::TriFans)
    }

    /// Backend capabilities needed to draw this topology
    pub fn geom_rendering(self, indexed: bool, shade_model: ShadeModel) -> GeomRendering {
        let mut flags = match self {
            Self::TriStrips => GeomRendering::TRIANGLE_STRIP,
            Self::TriFans => GeomRendering::TRIANGLE_FAN,
            Self::LineStrips => GeomRendering::LINE_STRIP,
            _ => GeomRendering::empty(),
        };
        if indexed {
            flags |= if self == Self::Points {
                GeomRendering::INDEXED_POINT
            } else {
                GeomRendering::INDEXED_OTHER
            };
        }
        match shade_model {
            ShadeModel::FlatFirstVertex => flags |= GeomRendering::FLAT_FIRST_VERTEX,
            ShadeModel::FlatLastVertex => flags |= GeomRendering::FLAT_LAST_VERTEX,
            _ => {}
        }
        flags
    }

    /// Lowercase name used in diagnostics
    pub const fn name(self) -> &'static str {
        match self {
            Self::Points => "points",
            Self::Lines => "lines",
            Self::LineStrips => "linestrips",
            Self::Triangles => "triangles",
            Self::TriStrips => "tristrips",
            Self::TriFans => "trifans",
        }
    }
}

impl fmt::Display for PrimitiveTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_and_variable_topologies() {
        assert!(!PrimitiveTopology::Triangles.is_variable());
        assert!(PrimitiveTopology::TriStrips.is_variable());
        assert!(PrimitiveTopology::LineStrips.is_variable());
        assert_eq!(PrimitiveTopology::Lines.num_vertices_per_primitive(), 2);
    }

    #[test]
    fn test_only_tristrips_need_connectors() {
        for topology in PrimitiveTopology::ALL {
            assert_eq!(
                topology.requires_unused_vertices(),
                topology == PrimitiveTopology::TriStrips
            );
        }
    }

    #[test]
    fn test_geom_rendering_flags() {
        let flags = PrimitiveTopology::TriStrips.geom_rendering(true, ShadeModel::FlatLastVertex);
        assert!(flags.contains(GeomRendering::TRIANGLE_STRIP));
        assert!(flags.contains(GeomRendering::INDEXED_OTHER));
        assert!(flags.contains(GeomRendering::FLAT_LAST_VERTEX));
        assert!(PrimitiveTopology::Points
            .geom_rendering(true, ShadeModel::Smooth)
            .contains(GeomRendering::INDEXED_POINT));
    }
}
