//! Draw-stage snapshots stay intact while cull rewrites the next frame

use std::sync::Arc;

use crate::context::RenderContext;
use crate::dynamic::{MeshPrimitive, MeshRegistry};
use crate::foundation::math::Point3;
use crate::gobj::{Geom, PrimitiveTopology, UsageHint, VERTEX};

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn write_run(registry: &mut MeshRegistry, ctx: &RenderContext, points: &[Point3]) -> Arc<Geom> {
        let format = ctx.formats().v3();
        let state = ctx.states().empty_state();
        let mut lease = registry.get_mesh(&format, &state, MeshPrimitive::Triangles);
        assert!(lease.lock(points.len()));
        {
            let mut writer = lease.writer(VERTEX).unwrap();
            for point in points {
                writer.add_point(point).unwrap();
            }
        }
        lease.unlock().unwrap();
        drop(lease);
        let mut batches = registry.renderable();
        assert_eq!(batches.len(), 1);
        batches.remove(0).0
    }

    fn first_point(geom: &Geom) -> Point3 {
        geom.vertex_data().reader(VERTEX).unwrap().get_point().unwrap()
    }

    #[test]
    fn test_emitted_batch_outlives_the_next_reset() {
        let ctx = RenderContext::default();
        let mut registry = MeshRegistry::new(&ctx);
        let square = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let frame_one = write_run(&mut registry, &ctx, &square);

        registry.reset().unwrap();
        let triangle = [
            Point3::new(7.0, 0.0, 0.0),
            Point3::new(8.0, 0.0, 0.0),
            Point3::new(8.0, 1.0, 0.0),
        ];
        let frame_two = write_run(&mut registry, &ctx, &triangle);

        assert_eq!(frame_one.primitives()[0].num_primitives(), 2);
        assert_eq!(frame_one.vertex_data().num_rows(), 4);
        assert_relative_eq!(first_point(&frame_one).x, 0.0);

        assert_eq!(frame_two.primitives()[0].num_primitives(), 1);
        assert!(!Arc::ptr_eq(frame_one.vertex_data(), frame_two.vertex_data()));
        assert_relative_eq!(first_point(&frame_two).x, 7.0);
    }

    #[test]
    fn test_downstream_stage_sees_last_cycled_indices() {
        let ctx = RenderContext::default();
        let tris = ctx.new_primitive(PrimitiveTopology::Triangles, UsageHint::Stream);
        tris.add_vertices(&[0, 1, 2]);
        tris.cycle();

        tris.add_vertices(&[2, 1, 3]);

        assert_eq!(tris.num_stages(), ctx.num_stages());
        assert_eq!(tris.stage(0).num_primitives(), 2);
        assert_eq!(tris.stage(1).num_primitives(), 1);
        assert_eq!(tris.stage(1).primitive_vertices(0).unwrap(), vec![0, 1, 2]);

        tris.cycle();
        assert_eq!(tris.stage(1).num_primitives(), 2);
    }
}
