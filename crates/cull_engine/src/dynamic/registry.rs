//! Lazily created buffers and meshes for one dynamic batch root

use std::collections::HashMap;
use std::sync::Arc;

use super::{DynamicError, DynamicMesh, DynamicResult, DynamicVertexBuffer, MeshKey, MeshPrimitive};
use crate::context::RenderContext;
use crate::foundation::collections::{MeshId, SlotMap};
use crate::foundation::profiling::PhaseCollector;
use crate::gobj::{Geom, GeomPrimitive, PrimitiveSettings, UsageHint, VertexFormat, VertexWriter};
use crate::pgraph::RenderState;

/// Vertex buffers by format and meshes by (format, state, primitive)
#[derive(Debug)]
pub struct MeshRegistry {
    budget_bytes: usize,
    settings: PrimitiveSettings,
    buffers: HashMap<u64, DynamicVertexBuffer>,
    meshes: SlotMap<MeshId, DynamicMesh>,
    lookup: HashMap<MeshKey, MeshId>,
    order: Vec<MeshId>,
    reset_pcollector: PhaseCollector,
    get_mesh_pcollector: PhaseCollector,
    lock_pcollector: PhaseCollector,
    indices_pcollector: PhaseCollector,
    draw_pcollector: PhaseCollector,
}

impl MeshRegistry {
    /// Create an empty registry using the context's budget and collectors
    pub fn new(ctx: &RenderContext) -> Self {
        let profiler = ctx.profiler();
        Self {
            budget_bytes: ctx.config().vertex_buffer_bytes,
            settings: ctx.primitive_settings(UsageHint::Stream),
            buffers: HashMap::new(),
            meshes: SlotMap::with_key(),
            lookup: HashMap::new(),
            order: Vec::new(),
            reset_pcollector: profiler.collector("Cull:Dynamic batch:Reset"),
            get_mesh_pcollector: profiler.collector("Cull:Dynamic batch:Get mesh"),
            lock_pcollector: profiler.collector("Cull:Dynamic batch:Lock"),
            indices_pcollector: profiler.collector("Cull:Dynamic batch:Calc indices"),
            draw_pcollector: profiler.collector("Cull:Dynamic batch:Add for draw"),
        }
    }

    /// The mesh for a key, created on first request
    ///
    /// Also creates the vertex buffer for `format` the first time the format
    /// is seen.
    pub fn get_mesh(
        &mut self,
        format: &Arc<VertexFormat>,
        state: &Arc<RenderState>,
        primitive: MeshPrimitive,
    ) -> MeshLease<'_> {
        let collector = self.get_mesh_pcollector.clone();
        let _timer = collector.start();
        let key = MeshKey {
            format_id: format.id(),
            state_id: state.id(),
            primitive,
        };
        let id = match self.lookup.get(&key) {
            Some(&id) => id,
            None => self.create_mesh(key, format, state),
        };
        MeshLease { registry: self, id }
    }

    /// Reopen a mesh by id
    pub fn lease(&mut self, id: MeshId) -> Option<MeshLease<'_>> {
        if self.meshes.contains_key(id) {
            Some(MeshLease { registry: self, id })
        } else {
            None
        }
    }

    /// Look up a mesh
    pub fn mesh(&self, id: MeshId) -> Option<&DynamicMesh> {
        self.meshes.get(id)
    }

    /// Vertex buffer for a format
    pub fn buffer(&self, format: &VertexFormat) -> Option<&DynamicVertexBuffer> {
        self.buffers.get(&format.id())
    }

    /// Number of meshes created so far
    pub fn num_meshes(&self) -> usize {
        self.meshes.len()
    }

    /// Number of vertex buffers created so far
    pub fn num_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Rewind every buffer and empty every mesh
    ///
    /// Fails without touching anything if a write session is still open.
    pub fn reset(&mut self) -> DynamicResult<()> {
        let _timer = self.reset_pcollector.start();
        if self.buffers.values().any(DynamicVertexBuffer::is_locked) {
            return Err(DynamicError::ResetWhileLocked);
        }
        for buffer in self.buffers.values_mut() {
            buffer.reset()?;
        }
        for mesh in self.meshes.values_mut() {
            mesh.reset();
        }
        Ok(())
    }

    /// Drawable geoms for every mesh that completed a session this frame
    ///
    /// Meshes come out in creation order. Each geom holds a copy-on-write
    /// snapshot of the indices and shares the buffer's rows.
    pub fn renderable(&self) -> Vec<(Arc<Geom>, Arc<RenderState>)> {
        let _timer = self.draw_pcollector.start();
        let batches: Vec<_> = self
            .order
            .iter()
            .filter_map(|&id| {
                let mesh = self.meshes.get(id)?;
                let geom = self.geom_for(mesh)?;
                Some((geom, Arc::clone(mesh.state())))
            })
            .collect();
        self.draw_pcollector.add_level(batches.len() as u64);
        batches
    }

    fn geom_for(&self, mesh: &DynamicMesh) -> Option<Arc<Geom>> {
        if !mesh.should_render() || mesh.indices().num_vertices() == 0 {
            return None;
        }
        let buffer = self.buffers.get(&mesh.key().format_id)?;
        let indices = Arc::new(mesh.indices().make_copy());
        Some(Arc::new(Geom::with_primitive(Arc::clone(buffer.vertex_data()), indices)))
    }

    fn create_mesh(&mut self, key: MeshKey, format: &Arc<VertexFormat>, state: &Arc<RenderState>) -> MeshId {
        let budget_bytes = self.budget_bytes;
        self.buffers
            .entry(key.format_id)
            .or_insert_with(|| DynamicVertexBuffer::new(Arc::clone(format), budget_bytes));

        let indices = GeomPrimitive::with_settings(key.primitive.topology(), self.settings);
        let mesh = DynamicMesh::new(key, Arc::clone(state), indices);
        log::debug!("Creating dynamic {}", mesh);
        let id = self.meshes.insert(mesh);
        self.lookup.insert(key, id);
        self.order.push(id);
        id
    }

    fn lock_mesh(&mut self, id: MeshId, num_vertices: usize) -> bool {
        let _timer = self.lock_pcollector.start();
        let Some(mesh) = self.meshes.get_mut(id) else {
            return false;
        };
        if mesh.is_locked() {
            return false;
        }
        let Some(buffer) = self.buffers.get_mut(&mesh.key().format_id) else {
            return false;
        };
        let Some(first_vertex) = buffer.lock(num_vertices) else {
            log::trace!("{} cannot take {} vertices this frame", mesh, num_vertices);
            return false;
        };
        mesh.begin(super::Reservation {
            first_vertex,
            num_vertices,
        });
        true
    }

    fn mesh_writer(&mut self, id: MeshId, column: &str) -> DynamicResult<VertexWriter<'_>> {
        let mesh = self.meshes.get(id).ok_or(DynamicError::NotLocked)?;
        if !mesh.is_locked() {
            return Err(DynamicError::NotLocked);
        }
        let buffer = self
            .buffers
            .get_mut(&mesh.key().format_id)
            .ok_or(DynamicError::NotLocked)?;
        buffer.writer(column)
    }

    fn unlock_mesh(&mut self, id: MeshId) -> DynamicResult<usize> {
        let mesh = self.meshes.get_mut(id).ok_or(DynamicError::NotLocked)?;
        if !mesh.is_locked() {
            return Err(DynamicError::NotLocked);
        }
        if let Some(buffer) = self.buffers.get_mut(&mesh.key().format_id) {
            buffer.unlock();
        }
        let _timer = self.indices_pcollector.start();
        mesh.finish()
    }

    fn abandon_mesh(&mut self, id: MeshId) {
        let Some(mesh) = self.meshes.get_mut(id) else {
            return;
        };
        if mesh.abandon().is_some() {
            if let Some(buffer) = self.buffers.get_mut(&mesh.key().format_id) {
                buffer.abandon();
            }
        }
    }
}

/// Exclusive handle on one mesh of a registry
///
/// Dropping a lease with an open session gives the reserved rows back and
/// generates no indices.
#[derive(Debug)]
pub struct MeshLease<'r> {
    registry: &'r mut MeshRegistry,
    id: MeshId,
}

impl MeshLease<'_> {
    /// Mesh id, stable for the life of the registry
    pub const fn id(&self) -> MeshId {
        self.id
    }

    /// The mesh itself
    pub fn mesh(&self) -> Option<&DynamicMesh> {
        self.registry.mesh(self.id)
    }

    /// Reserve `num_vertices` rows in the shared buffer
    ///
    /// Returns false without side effects when the mesh or its buffer is
    /// already locked or the rows do not fit this frame.
    pub fn lock(&mut self, num_vertices: usize) -> bool {
        self.registry.lock_mesh(self.id, num_vertices)
    }

    /// Whether a session is open
    pub fn is_locked(&self) -> bool {
        self.mesh().is_some_and(DynamicMesh::is_locked)
    }

    /// First reserved row of the open session
    pub fn first_vertex(&self) -> Option<u32> {
        self.mesh()?.reservation().map(|r| r.first_vertex)
    }

    /// Writer over the reserved rows of one column
    pub fn writer(&mut self, column: &str) -> DynamicResult<VertexWriter<'_>> {
        self.registry.mesh_writer(self.id, column)
    }

    /// Close the session and generate its indices
    ///
    /// Returns the number of indices added.
    pub fn unlock(&mut self) -> DynamicResult<usize> {
        self.registry.unlock_mesh(self.id)
    }
}

impl Drop for MeshLease<'_> {
    fn drop(&mut self) {
        if self.is_locked() {
            log::warn!("Dynamic mesh dropped while locked, discarding its vertices");
            self.registry.abandon_mesh(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::foundation::math::Point3;
    use crate::gobj::VERTEX;
    use crate::pgraph::RenderAttribs;

    fn write_run(lease: &mut MeshLease<'_>, n: usize) -> bool {
        if !lease.lock(n) {
            return false;
        }
        {
            let mut writer = lease.writer(VERTEX).unwrap();
            for i in 0..n {
                writer.add_point(&Point3::new(i as f32, 0.0, 0.0)).unwrap();
            }
        }
        lease.unlock().unwrap();
        true
    }

    #[test]
    fn test_get_mesh_memoizes_by_key() {
        let ctx = RenderContext::default();
        let mut registry = MeshRegistry::new(&ctx);
        let format = ctx.formats().v3();
        let red = ctx.states().state(RenderAttribs::default().with_color([255, 0, 0, 255]));
        let blue = ctx.states().state(RenderAttribs::default().with_color([0, 0, 255, 255]));

        let a = registry.get_mesh(&format, &red, MeshPrimitive::Triangles).id();
        let b = registry.get_mesh(&format, &red, MeshPrimitive::Triangles).id();
        let c = registry.get_mesh(&format, &blue, MeshPrimitive::Triangles).id();
        let d = registry.get_mesh(&format, &red, MeshPrimitive::Lines).id();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(registry.num_meshes(), 3);
        assert_eq!(registry.num_buffers(), 1);
    }

    #[test]
    fn test_meshes_of_one_format_share_the_lock() {
        let ctx = RenderContext::default();
        let mut registry = MeshRegistry::new(&ctx);
        let format = ctx.formats().v3();
        let state = ctx.states().empty_state();

        let tris = registry.get_mesh(&format, &state, MeshPrimitive::Triangles).id();
        assert!(registry.lock_mesh(tris, 3));
        assert!(!registry.lock_mesh(tris, 3));

        let lines = registry.get_mesh(&format, &state, MeshPrimitive::Lines).id();
        assert!(!registry.lock_mesh(lines, 2));
        assert!(matches!(registry.mesh_writer(lines, VERTEX), Err(DynamicError::NotLocked)));
        assert!(matches!(registry.unlock_mesh(lines), Err(DynamicError::NotLocked)));
        assert!(matches!(registry.reset(), Err(DynamicError::ResetWhileLocked)));

        assert!(matches!(registry.unlock_mesh(tris), Ok(3)));
        registry.reset().unwrap();
        assert!(registry.lock_mesh(lines, 2));
    }

    #[test]
    fn test_dropped_lease_gives_rows_back() {
        let ctx = RenderContext::default();
        let mut registry = MeshRegistry::new(&ctx);
        let format = ctx.formats().v3();
        let state = ctx.states().empty_state();
        {
            let mut lease = registry.get_mesh(&format, &state, MeshPrimitive::Triangles);
            assert!(lease.lock(6));
        }
        let buffer = registry.buffer(&format).unwrap();
        assert!(!buffer.is_locked());
        assert_eq!(buffer.position(), 0);
        assert!(registry.renderable().is_empty());
    }

    #[test]
    fn test_renderable_after_unlock_only() {
        let ctx = RenderContext::default();
        let mut registry = MeshRegistry::new(&ctx);
        let format = ctx.formats().v3();
        let state = ctx.states().empty_state();

        registry.get_mesh(&format, &state, MeshPrimitive::Lines);
        assert!(registry.renderable().is_empty());

        assert!(write_run(&mut registry.get_mesh(&format, &state, MeshPrimitive::Lines), 4));
        let batches = registry.renderable();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].0.primitives()[0].num_primitives(), 4);

        registry.reset().unwrap();
        assert!(registry.renderable().is_empty());
        assert_eq!(batches[0].0.primitives()[0].num_primitives(), 4);
    }

    #[test]
    fn test_batch_over_capacity_is_skipped() {
        let config = PipelineConfig::default().with_vertex_buffer_bytes(12 * 8);
        let ctx = RenderContext::new(config).unwrap();
        let mut registry = MeshRegistry::new(&ctx);
        let format = ctx.formats().v3();
        let state = ctx.states().empty_state();

        let mut lease = registry.get_mesh(&format, &state, MeshPrimitive::Triangles);
        assert!(write_run(&mut lease, 5));
        assert!(!write_run(&mut lease, 4));
        assert!(write_run(&mut lease, 3));
        drop(lease);

        let batches = registry.renderable();
        assert_eq!(batches[0].0.primitives()[0].num_primitives(), 4);
    }
}
