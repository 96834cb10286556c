//! Geometry objects
//!
//! Vertex formats and rows, index arrays, the pipelined [`GeomPrimitive`]
//! and the [`Geom`] that pairs them for drawing.

mod bounds;
mod enums;
mod error;
mod geom;
mod index_array;
mod prepared;
mod primitive;
mod topology;
mod vertex_data;
mod vertex_format;

pub use bounds::BoundingVolume;
pub use enums::{Contents, GeomRendering, NumericType, ShadeModel, UsageHint};
pub use error::{GeomError, GeomResult};
pub use geom::Geom;
pub use index_array::IndexArray;
pub use prepared::{IndexBufferContext, PreparedObjects};
pub use primitive::{GeomPrimitive, PrimitiveData, PrimitiveSettings};
pub use topology::PrimitiveTopology;
pub use vertex_data::{VertexData, VertexReader, VertexWriter};
pub use vertex_format::{
    FormatRegistry, FormatSpec, VertexColumn, VertexFormat, COLOR, INDEX, NORMAL, TEXCOORD, VERTEX,
};
