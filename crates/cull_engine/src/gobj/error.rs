//! Errors raised by vertex and index storage

use thiserror::Error;

use super::PrimitiveTopology;

/// Result type for geometry operations
pub type GeomResult<T> = Result<T, GeomError>;

/// Geometry storage errors
///
/// Every variant describes a caller contract violation; the operation that
/// returned it made no changes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GeomError {
    /// The vertex format has no column with this name
    #[error("vertex format has no column named '{0}'")]
    UnknownColumn(String),

    /// A cursor or copy addressed a row outside the allowed range
    #[error("row {row} is outside the writable range 0..{limit}")]
    RowOutOfRange {
        /// Offending row
        row: usize,
        /// One past the last valid row
        limit: usize,
    },

    /// Row copies require both vertex datas to share a format
    #[error("vertex format mismatch: source format {source_format} differs from destination format {dest_format}")]
    FormatMismatch {
        /// Format id of the source data
        source_format: u64,
        /// Format id of the destination data
        dest_format: u64,
    },

    /// `close_primitive` was called before enough vertices were added
    #[error("{topology:?} needs at least {required} vertices per primitive, got {added}")]
    TooFewVertices {
        /// Topology of the primitive
        topology: PrimitiveTopology,
        /// Minimum number of vertices
        required: usize,
        /// Vertices added since the previous close
        added: usize,
    },

    /// Fixed-size primitives must contain a whole number of primitives
    #[error("{topology:?} holds {num_vertices} vertices, not a multiple of {per_primitive}")]
    IncompletePrimitive {
        /// Topology of the primitive
        topology: PrimitiveTopology,
        /// Total vertices stored
        num_vertices: usize,
        /// Vertices per primitive including connectors
        per_primitive: usize,
    },

    /// Primitive number outside `0..num_primitives`
    #[error("primitive {index} does not exist ({count} primitives)")]
    PrimitiveOutOfRange {
        /// Requested primitive
        index: usize,
        /// Number of primitives
        count: usize,
    },

    /// Vertex number outside `0..num_vertices`
    #[error("vertex {index} does not exist ({count} vertices)")]
    VertexOutOfRange {
        /// Requested vertex slot
        index: usize,
        /// Number of vertex slots
        count: usize,
    },

    /// The index does not fit in the requested numeric type
    #[error("index {value} cannot be stored as {index_type:?}")]
    IndexOverflow {
        /// Offending value
        value: u32,
        /// Target numeric type
        index_type: super::NumericType,
    },

    /// Float types cannot store indices
    #[error("{0:?} is not an index type")]
    NotAnIndexType(super::NumericType),

    /// Component count does not match the column
    #[error("column '{column}' has {expected} components, got {actual}")]
    ComponentCount {
        /// Column name
        column: String,
        /// Components in the column
        expected: usize,
        /// Components supplied
        actual: usize,
    },

    /// Offsetting would move a vertex outside the representable range
    #[error("offsetting by {offset} moves vertex {vertex} outside the index range")]
    OffsetOutOfRange {
        /// Requested offset
        offset: i64,
        /// Vertex that would leave the range
        vertex: u32,
    },

    /// A geom mixes points, lines and polygons
    #[error("cannot add {added} to a geom holding {existing}")]
    MixedPrimitiveFamily {
        /// Topology already stored
        existing: PrimitiveTopology,
        /// Topology offered
        added: PrimitiveTopology,
    },
}
