//! Backend interface used by the draw pass
//!
//! The pipeline never talks to a graphics API directly. Bins ask a
//! [`GraphicsStateGuardian`] for view distances while sorting and hand it
//! objects to draw. [`RecordingGsg`] logs every call instead of drawing,
//! which is what the demo and the tests run against.

use std::sync::Arc;

use super::CullableObject;
use crate::foundation::math::Point3;
use crate::gobj::{PreparedObjects, PrimitiveTopology};

/// Backend that receives draw calls
pub trait GraphicsStateGuardian {
    /// Distance from the eye to a view-space point, larger is farther
    ///
    /// The default assumes a right-handed view space looking down -Z.
    fn compute_distance_to(&self, point: &Point3) -> f32 {
        -point.z
    }

    /// Called before the first draw of a frame
    fn begin_frame(&mut self) {}

    /// Called after the last draw of a frame
    fn end_frame(&mut self) {}

    /// Draw one object
    fn draw_geom(&mut self, object: &CullableObject);

    /// About to draw the base of a decal chain the first time
    fn begin_decal_base_first(&mut self, _base: &CullableObject) {}

    /// About to draw the decals of a chain
    fn begin_decal_nested(&mut self) {}

    /// About to draw the base of a decal chain the second time
    fn begin_decal_base_second(&mut self, _base: &CullableObject) {}

    /// Done with a decal chain
    fn finish_decal(&mut self) {}
}

/// One recorded draw
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawCall {
    /// Render state id
    pub state_id: u64,
    /// Transform id
    pub transform_id: u64,
    /// Family of the geom's primitives
    pub topology: Option<PrimitiveTopology>,
    /// Primitives across all primitive objects
    pub num_primitives: usize,
    /// Vertex slots across all primitive objects
    pub num_indices: usize,
    /// Rows in the vertex data
    pub vertex_rows: usize,
}

/// Everything a [`RecordingGsg`] saw, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawEvent {
    /// Frame started
    BeginFrame(u64),
    /// Object drawn
    Draw(DrawCall),
    /// Decal hook: base, first pass
    DecalBaseFirst,
    /// Decal hook: decals
    DecalNested,
    /// Decal hook: base, second pass
    DecalBaseSecond,
    /// Decal hook: chain done
    FinishDecal,
    /// Frame ended
    EndFrame(u64),
}

/// Backend that records draw calls
#[derive(Debug, Default)]
pub struct RecordingGsg {
    events: Vec<DrawEvent>,
    prepared: Option<Arc<PreparedObjects>>,
    frame: u64,
}

impl RecordingGsg {
    /// Create a recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a recorder that uploads index buffers into `prepared` as it draws
    pub fn with_prepared(prepared: Arc<PreparedObjects>) -> Self {
        Self {
            prepared: Some(prepared),
            ..Self::default()
        }
    }

    /// Recorded events
    pub fn events(&self) -> &[DrawEvent] {
        &self.events
    }

    /// Recorded draws only
    pub fn draw_calls(&self) -> impl Iterator<Item = &DrawCall> {
        self.events.iter().filter_map(|event| match event {
            DrawEvent::Draw(call) => Some(call),
            _ => None,
        })
    }

    /// Number of recorded draws
    pub fn num_draws(&self) -> usize {
        self.draw_calls().count()
    }

    /// Frames begun so far
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    /// Forget recorded events
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl GraphicsStateGuardian for RecordingGsg {
    fn begin_frame(&mut self) {
        self.frame += 1;
        self.events.push(DrawEvent::BeginFrame(self.frame));
    }

    fn end_frame(&mut self) {
        self.events.push(DrawEvent::EndFrame(self.frame));
    }

    fn draw_geom(&mut self, object: &CullableObject) {
        let geom = &object.geom;
        if let Some(prepared) = &self.prepared {
            for primitive in geom.primitives() {
                primitive.prepare_now(prepared);
            }
        }
        let call = DrawCall {
            state_id: object.state.id(),
            transform_id: object.transform.id(),
            topology: geom.primitive_type(),
            num_primitives: geom.primitives().iter().map(|p| p.num_primitives()).sum(),
            num_indices: geom.primitives().iter().map(|p| p.num_vertices()).sum(),
            vertex_rows: geom.vertex_data().num_rows(),
        };
        log::trace!("draw {} ({} indices)", object, call.num_indices);
        self.events.push(DrawEvent::Draw(call));
    }

    fn begin_decal_base_first(&mut self, _base: &CullableObject) {
        self.events.push(DrawEvent::DecalBaseFirst);
    }

    fn begin_decal_nested(&mut self) {
        self.events.push(DrawEvent::DecalNested);
    }

    fn begin_decal_base_second(&mut self, _base: &CullableObject) {
        self.events.push(DrawEvent::DecalBaseSecond);
    }

    fn finish_decal(&mut self) {
        self.events.push(DrawEvent::FinishDecal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gobj::{FormatRegistry, Geom, GeomPrimitive, UsageHint, VertexData};
    use crate::pgraph::StateRegistry;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_distance_is_negative_z() {
        let gsg = RecordingGsg::new();
        assert_relative_eq!(gsg.compute_distance_to(&Point3::new(3.0, 1.0, -7.5)), 7.5);
    }

    #[test]
    fn test_draw_records_and_prepares() {
        let registry = FormatRegistry::new();
        let states = StateRegistry::new();
        let mut data = VertexData::new("tri", registry.v3(), UsageHint::Static);
        data.set_num_rows(3);
        let tris = GeomPrimitive::new(PrimitiveTopology::Triangles);
        tris.add_vertices(&[2, 1, 0]);
        let geom = Arc::new(Geom::with_primitive(Arc::new(data), Arc::new(tris)));
        let object = CullableObject::new(geom, states.empty_state(), states.identity_transform());

        let prepared = Arc::new(PreparedObjects::new("gpu"));
        let mut gsg = RecordingGsg::with_prepared(Arc::clone(&prepared));
        gsg.begin_frame();
        gsg.draw_geom(&object);
        gsg.end_frame();

        let call = gsg.draw_calls().next().unwrap();
        assert_eq!(call.num_primitives, 1);
        assert_eq!(call.num_indices, 3);
        assert_eq!(call.vertex_rows, 3);
        assert_eq!(prepared.num_prepared_index_buffers(), 1);
        assert_eq!(gsg.events().len(), 3);
    }
}
