//! Per-frame dynamic geometry batching
//!
//! Geometry produced during cull is written into shared vertex buffers (one
//! per vertex format) and turned into indexed batches (one per format,
//! render state and primitive kind). Everything is rewound at the start of
//! each frame; a batch that does not fit in what is left of its buffer is
//! skipped for that frame.
//!
//! Writers follow a lock/write/unlock session:
//!
//! ```text
//! lock(n) -> write n rows through the writer -> unlock (indices generated)
//! ```
//!
//! Only one session may be open on a buffer at a time.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::gobj::{GeomError, PrimitiveTopology};

mod mesh;
mod node;
mod polygon;
mod registry;
mod vertex_buffer;

pub use mesh::{DynamicMesh, MeshKey};
pub use node::DynamicRenderNode;
pub use polygon::{DynamicPolygonNode, Polygon};
pub use registry::{MeshLease, MeshRegistry};
pub use vertex_buffer::{DynamicVertexBuffer, Reservation};

/// Shape a dynamic mesh builds out of each written vertex run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MeshPrimitive {
    /// Convex fan anchored at the first vertex of the run
    Triangles,
    /// Closed loop of separate segments
    Lines,
    /// One strip per run, closed back to its first vertex
    LineStrips,
}

impl MeshPrimitive {
    /// Topology of the generated index primitive
    pub const fn topology(self) -> PrimitiveTopology {
        match self {
            Self::Triangles => PrimitiveTopology::Triangles,
            Self::Lines => PrimitiveTopology::Lines,
            Self::LineStrips => PrimitiveTopology::LineStrips,
        }
    }

    /// Fewest vertices in a run that produces any indices
    pub const fn min_run(self) -> usize {
        match self {
            Self::Triangles => 3,
            Self::Lines | Self::LineStrips => 2,
        }
    }
}

impl fmt::Display for MeshPrimitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.topology().fmt(f)
    }
}

/// Dynamic batching contract violations
#[derive(Error, Debug)]
pub enum DynamicError {
    /// A write session is already open
    #[error("Vertex buffer is already locked")]
    AlreadyLocked,

    /// The operation needs an open write session
    #[error("Vertex buffer is not locked")]
    NotLocked,

    /// Buffers cannot be rewound while a write session is open
    #[error("Cannot reset a locked vertex buffer")]
    ResetWhileLocked,

    /// Underlying vertex storage error
    #[error("Geometry error: {0}")]
    Geom(#[from] GeomError),
}

/// Result type for dynamic batching operations
pub type DynamicResult<T> = Result<T, DynamicError>;
