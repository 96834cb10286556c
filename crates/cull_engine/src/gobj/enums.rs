//! Shared enumerations for vertex and index storage

use serde::{Serialize, Deserialize};

/// Numeric storage type of a vertex column or index array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NumericType {
    /// Unsigned 8-bit integer
    U8,
    /// Unsigned 16-bit integer
    U16,
    /// Unsigned 32-bit integer
    U32,
    /// 32-bit float
    F32,
}

impl NumericType {
    /// Size of one component in bytes
    pub const fn size_bytes(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 | Self::F32 => 4,
        }
    }

    /// Whether this type may be used to store vertex indices
    pub const fn is_index_type(self) -> bool {
        matches!(self, Self::U8 | Self::U16 | Self::U32)
    }

    /// Largest vertex index representable by this type
    pub const fn max_index(self) -> u32 {
        match self {
            Self::U8 => u8::MAX as u32,
            Self::U16 => u16::MAX as u32,
            Self::U32 | Self::F32 => u32::MAX,
        }
    }

    /// Smallest index type able to hold `vertex`
    pub const fn smallest_index_type_for(vertex: u32) -> Self {
        if vertex <= u8::MAX as u32 {
            Self::U8
        } else if vertex <= u16::MAX as u32 {
            Self::U16
        } else {
            Self::U32
        }
    }
}

/// Semantic meaning of a vertex column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Contents {
    /// Position-like data, affected by the full transform
    Point,
    /// Direction-like data, affected by rotation/scale only
    Vector,
    /// Surface normal
    Normal,
    /// RGBA color
    Color,
    /// Texture coordinate
    TexCoord,
    /// Vertex index
    Index,
    /// Anything else
    Other,
}

/// Hint describing how often the data is expected to change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UsageHint {
    /// Written once, drawn many times
    #[default]
    Static,
    /// Rewritten occasionally
    Dynamic,
    /// Rewritten every frame
    Stream,
    /// Kept client-side
    Client,
}

/// How flat shading picks its provoking vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ShadeModel {
    /// One color for the whole primitive set
    Uniform,
    /// Interpolated per vertex
    #[default]
    Smooth,
    /// Flat shading taken from the first vertex of each primitive
    FlatFirstVertex,
    /// Flat shading taken from the last vertex of each primitive
    FlatLastVertex,
}

impl ShadeModel {
    /// The opposite flat convention; non-flat models are unchanged
    pub const fn flipped(self) -> Self {
        match self {
            Self::FlatFirstVertex => Self::FlatLastVertex,
            Self::FlatLastVertex => Self::FlatFirstVertex,
            other => other,
        }
    }
}

bitflags::bitflags! {
    /// Rendering properties a backend must support to draw a primitive
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct GeomRendering: u32 {
        /// Indexed points
        const INDEXED_POINT = 0x0001;
        /// Indexed primitives other than points
        const INDEXED_OTHER = 0x0002;
        /// Triangle strips
        const TRIANGLE_STRIP = 0x0004;
        /// Triangle fans
        const TRIANGLE_FAN = 0x0008;
        /// Line strips
        const LINE_STRIP = 0x0010;
        /// Flat shading with the first vertex as provoking vertex
        const FLAT_FIRST_VERTEX = 0x0020;
        /// Flat shading with the last vertex as provoking vertex
        const FLAT_LAST_VERTEX = 0x0040;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smallest_index_type() {
        assert_eq!(NumericType::smallest_index_type_for(200), NumericType::U8);
        assert_eq!(NumericType::smallest_index_type_for(256), NumericType::U16);
        assert_eq!(NumericType::smallest_index_type_for(70_000), NumericType::U32);
    }

    #[test]
    fn test_shade_model_flip() {
        assert_eq!(ShadeModel::FlatFirstVertex.flipped(), ShadeModel::FlatLastVertex);
        assert_eq!(ShadeModel::FlatLastVertex.flipped(), ShadeModel::FlatFirstVertex);
        assert_eq!(ShadeModel::Smooth.flipped(), ShadeModel::Smooth);
    }
}
