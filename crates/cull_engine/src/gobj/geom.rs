//! Drawable geometry: vertex rows plus the primitives that index them

use std::fmt;
use std::sync::Arc;

use super::{BoundingVolume, GeomError, GeomPrimitive, GeomRendering, GeomResult, PrimitiveTopology, VertexData};

/// Vertex data and a list of primitives of one family
///
/// All primitives of a geom are points, lines or triangles (in any of their
/// strip/fan forms), so a backend can pick one draw path per geom.
#[derive(Debug, Clone)]
pub struct Geom {
    vertex_data: Arc<VertexData>,
    primitives: Vec<Arc<GeomPrimitive>>,
}

impl Geom {
    /// Geom without primitives
    pub fn new(vertex_data: Arc<VertexData>) -> Self {
        Self {
            vertex_data,
            primitives: Vec::new(),
        }
    }

    /// Geom with a single primitive
    pub fn with_primitive(vertex_data: Arc<VertexData>, primitive: Arc<GeomPrimitive>) -> Self {
        Self {
            vertex_data,
            primitives: vec![primitive],
        }
    }

    /// Vertex rows referenced by the primitives
    pub fn vertex_data(&self) -> &Arc<VertexData> {
        &self.vertex_data
    }

    /// Replace the vertex rows
    pub fn set_vertex_data(&mut self, vertex_data: Arc<VertexData>) {
        self.vertex_data = vertex_data;
    }

    /// Primitives in draw order
    pub fn primitives(&self) -> &[Arc<GeomPrimitive>] {
        &self.primitives
    }

    /// Number of primitive objects
    pub fn num_primitives(&self) -> usize {
        self.primitives.len()
    }

    /// Family shared by every primitive, as its fixed-size topology
    pub fn primitive_type(&self) -> Option<PrimitiveTopology> {
        self.primitives.first().map(|p| p.topology().base())
    }

    /// Append a primitive; it must be of the same family as the others
    pub fn add_primitive(&mut self, primitive: Arc<GeomPrimitive>) -> GeomResult<()> {
        if let Some(existing) = self.primitives.first().map(|p| p.topology()) {
            if existing.base() != primitive.topology().base() {
                return Err(GeomError::MixedPrimitiveFamily {
                    existing,
                    added: primitive.topology(),
                });
            }
        }
        self.primitives.push(primitive);
        Ok(())
    }

    /// Whether there is nothing to draw
    pub fn is_empty(&self) -> bool {
        self.primitives.iter().all(|p| p.num_vertices() == 0)
    }

    /// Whether every primitive references existing rows
    pub fn check_valid(&self) -> bool {
        self.primitives.iter().all(|p| p.check_valid(&self.vertex_data))
    }

    /// Union of the primitives' tight bounds
    pub fn bounds(&self) -> BoundingVolume {
        let mut bounds = BoundingVolume::Empty;
        for primitive in &self.primitives {
            match primitive.calc_tight_bounds(&self.vertex_data, None) {
                Ok(Some((min, max))) => bounds = bounds.union(&BoundingVolume::Box { min, max }),
                Ok(None) => {}
                Err(err) => log::warn!("skipping primitive {} in bounds: {}", primitive.id(), err),
            }
        }
        bounds
    }

    /// Copy of this geom with every primitive decomposed
    pub fn decompose(&self) -> Self {
        Self {
            vertex_data: Arc::clone(&self.vertex_data),
            primitives: self.primitives.iter().map(GeomPrimitive::decompose).collect(),
        }
    }

    /// Capabilities needed to draw every primitive
    pub fn geom_rendering(&self) -> GeomRendering {
        self.primitives
            .iter()
            .fold(GeomRendering::empty(), |flags, p| flags | p.geom_rendering())
    }

    /// Bytes used by the vertex rows and index tables
    pub fn num_bytes(&self) -> usize {
        self.vertex_data.data_size_bytes() + self.primitives.iter().map(|p| p.num_bytes()).sum::<usize>()
    }
}

impl fmt::Display for Geom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Geom [")?;
        for primitive in &self.primitives {
            write!(f, " {}", primitive.topology())?;
        }
        write!(f, " ], {} vertices", self.vertex_data.num_rows())
    }
}
