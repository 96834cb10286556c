//! One batch: a vertex run generator for a (format, state, primitive) key

use std::fmt;
use std::sync::Arc;

use super::{DynamicResult, MeshPrimitive, Reservation};
use crate::gobj::GeomPrimitive;
use crate::pgraph::RenderState;

/// Identity of a dynamic mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshKey {
    /// Vertex format id
    pub format_id: u64,
    /// Render state id
    pub state_id: u64,
    /// Generated shape
    pub primitive: MeshPrimitive,
}

/// Index batch built from vertex runs written into a shared buffer
#[derive(Debug)]
pub struct DynamicMesh {
    key: MeshKey,
    state: Arc<RenderState>,
    indices: GeomPrimitive,
    locked: Option<Reservation>,
    should_render: bool,
}

impl DynamicMesh {
    pub(super) fn new(key: MeshKey, state: Arc<RenderState>, indices: GeomPrimitive) -> Self {
        Self {
            key,
            state,
            indices,
            locked: None,
            should_render: false,
        }
    }

    /// Key the mesh was created for
    pub const fn key(&self) -> MeshKey {
        self.key
    }

    /// State the batch is drawn with
    pub fn state(&self) -> &Arc<RenderState> {
        &self.state
    }

    /// Generated shape
    pub const fn primitive(&self) -> MeshPrimitive {
        self.key.primitive
    }

    /// Whether a write session is open on this mesh
    pub const fn is_locked(&self) -> bool {
        self.locked.is_some()
    }

    /// Rows of the open session
    pub const fn reservation(&self) -> Option<Reservation> {
        self.locked
    }

    /// Whether a session was completed since the last reset
    pub const fn should_render(&self) -> bool {
        self.should_render
    }

    /// Indices generated so far this frame
    pub const fn indices(&self) -> &GeomPrimitive {
        &self.indices
    }

    /// Forget this frame's indices
    ///
    /// The shared vertex buffer is rewound separately.
    pub fn reset(&mut self) {
        self.should_render = false;
        self.indices.clear_vertices();
    }

    pub(super) fn begin(&mut self, reservation: Reservation) {
        self.locked = Some(reservation);
    }

    pub(super) fn abandon(&mut self) -> Option<Reservation> {
        self.locked.take()
    }

    /// Close the session and index its run; returns the number of indices added
    pub(super) fn finish(&mut self) -> DynamicResult<usize> {
        let Some(reservation) = self.locked.take() else {
            return Ok(0);
        };
        let before = self.indices.num_vertices();
        generate_indices(self.key.primitive, &self.indices, reservation)?;
        self.should_render = true;
        Ok(self.indices.num_vertices() - before)
    }
}

impl fmt::Display for DynamicMesh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} mesh F:{} {} ({} indices)",
            self.key.primitive,
            self.key.format_id,
            self.state,
            self.indices.num_vertices()
        )
    }
}

fn generate_indices(primitive: MeshPrimitive, indices: &GeomPrimitive, run: Reservation) -> DynamicResult<()> {
    if run.num_vertices < primitive.min_run() {
        return Ok(());
    }
    let first = run.first_vertex;
    let count = run.num_vertices as u32;
    match primitive {
        MeshPrimitive::Triangles => {
            for i in 1..count - 1 {
                indices.add_vertices(&[first, first + i, first + i + 1]);
            }
        }
        MeshPrimitive::Lines => {
            for i in 1..count {
                indices.add_vertices(&[first + i - 1, first + i]);
            }
            indices.add_vertices(&[first, first + count - 1]);
        }
        MeshPrimitive::LineStrips => {
            indices.add_consecutive_vertices(first, run.num_vertices);
            indices.add_vertex(first);
        }
    }
    indices.close_primitive()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pgraph::StateRegistry;

    fn mesh(primitive: MeshPrimitive) -> DynamicMesh {
        let states = StateRegistry::new();
        let key = MeshKey {
            format_id: 1,
            state_id: 1,
            primitive,
        };
        DynamicMesh::new(key, states.empty_state(), GeomPrimitive::new(primitive.topology()))
    }

    fn run(mesh: &mut DynamicMesh, first_vertex: u32, num_vertices: usize) -> usize {
        mesh.begin(Reservation {
            first_vertex,
            num_vertices,
        });
        mesh.finish().unwrap()
    }

    fn primitives(mesh: &DynamicMesh) -> Vec<Vec<u32>> {
        let data = mesh.indices().data();
        (0..data.num_primitives())
            .map(|n| data.primitive_vertices(n).unwrap())
            .collect()
    }

    #[test]
    fn test_triangle_fan_from_run() {
        let mut mesh = mesh(MeshPrimitive::Triangles);
        assert_eq!(run(&mut mesh, 10, 5), 9);
        assert_eq!(
            primitives(&mesh),
            vec![vec![10, 11, 12], vec![10, 12, 13], vec![10, 13, 14]]
        );
        assert!(mesh.should_render());
    }

    #[test]
    fn test_lines_close_the_loop() {
        let mut mesh = mesh(MeshPrimitive::Lines);
        run(&mut mesh, 0, 4);
        assert_eq!(
            primitives(&mesh),
            vec![vec![0, 1], vec![1, 2], vec![2, 3], vec![0, 3]]
        );
    }

    #[test]
    fn test_line_strip_returns_to_start() {
        let mut mesh = mesh(MeshPrimitive::LineStrips);
        run(&mut mesh, 0, 4);
        assert_eq!(primitives(&mesh), vec![vec![0, 1, 2, 3, 0]]);
    }

    #[test]
    fn test_runs_accumulate_until_reset() {
        let mut mesh = mesh(MeshPrimitive::LineStrips);
        run(&mut mesh, 0, 3);
        run(&mut mesh, 3, 2);
        assert_eq!(primitives(&mesh), vec![vec![0, 1, 2, 0], vec![3, 4, 3]]);

        mesh.reset();
        assert!(!mesh.should_render());
        assert_eq!(mesh.indices().num_vertices(), 0);
    }

    #[test]
    fn test_short_runs_add_nothing() {
        let mut mesh = mesh(MeshPrimitive::Triangles);
        assert_eq!(run(&mut mesh, 0, 2), 0);
        assert_eq!(mesh.indices().num_primitives(), 0);
    }
}
