//! Frames through a dynamic batch root

use std::sync::Arc;

use crate::context::RenderContext;
use crate::cull::CullBinManager;
use crate::dynamic::{DynamicPolygonNode, DynamicRenderNode, MeshPrimitive, Polygon};
use crate::foundation::math::{Mat4, Point3, Vec3};
use crate::pgraph::{ObjectChain, RecordingGsg, RenderAttribs};
use crate::scene::{CullTraverser, GroupNode, SceneNode};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::cull::CullResult;
    use crate::gobj::{VertexFormat, VERTEX};
    use crate::pgraph::RenderState;
    use approx::assert_relative_eq;

    fn square(offset: f32) -> Polygon {
        Polygon::new(vec![
            Point3::new(offset, 0.0, 0.0),
            Point3::new(offset + 1.0, 0.0, 0.0),
            Point3::new(offset + 1.0, 1.0, 0.0),
            Point3::new(offset, 1.0, 0.0),
        ])
    }

    fn producer(
        name: &str,
        format: &Arc<VertexFormat>,
        state: &Arc<RenderState>,
        primitive: MeshPrimitive,
        offset: f32,
    ) -> Arc<dyn SceneNode> {
        Arc::new(
            DynamicPolygonNode::new(name, Arc::clone(format), Arc::clone(state), primitive)
                .with_polygon(square(offset)),
        )
    }

    fn cull(ctx: &RenderContext, scene: &dyn SceneNode) -> Vec<ObjectChain> {
        let mut recorded = Vec::new();
        CullTraverser::new(ctx, &mut recorded, &Mat4::identity()).traverse(scene);
        recorded
    }

    #[test]
    fn test_two_children_share_one_mesh_and_one_draw() {
        let ctx = RenderContext::default();
        let format = ctx.formats().v3();
        let state = ctx.states().state(RenderAttribs::default().with_texture("sparks"));
        let node = DynamicRenderNode::new(&ctx, "batch")
            .with_child(producer("a", &format, &state, MeshPrimitive::Triangles, 0.0))
            .with_child(producer("b", &format, &state, MeshPrimitive::Triangles, 5.0));

        let recorded = cull(&ctx, &node);

        assert_eq!(recorded.len(), 1);
        assert_eq!(node.registry().lock().num_meshes(), 1);
        let primitive = &recorded[0].base.geom.primitives()[0];
        assert_eq!(primitive.num_primitives(), 4);
        let data = primitive.data();
        assert_eq!(data.primitive_vertices(0).unwrap(), vec![0, 1, 2]);
        assert_eq!(data.primitive_vertices(2).unwrap(), vec![4, 5, 6]);
    }

    #[test]
    fn test_distinct_keys_make_distinct_draws() {
        let ctx = RenderContext::default();
        let format = ctx.formats().v3();
        let state = ctx.states().empty_state();
        let node = DynamicRenderNode::new(&ctx, "batch")
            .with_child(producer("fill", &format, &state, MeshPrimitive::Triangles, 0.0))
            .with_child(producer("outline", &format, &state, MeshPrimitive::LineStrips, 0.0));

        let recorded = cull(&ctx, &node);

        assert_eq!(recorded.len(), 2);
        let registry = node.registry().lock();
        assert_eq!(registry.num_meshes(), 2);
        assert_eq!(registry.num_buffers(), 1);
        assert_eq!(registry.buffer(&format).unwrap().position(), 8);
    }

    #[test]
    fn test_every_frame_starts_from_scratch() {
        let ctx = RenderContext::default();
        let format = ctx.formats().v3();
        let state = ctx.states().empty_state();
        let node = DynamicRenderNode::new(&ctx, "batch")
            .with_child(producer("a", &format, &state, MeshPrimitive::Lines, 0.0));

        for _ in 0..3 {
            let recorded = cull(&ctx, &node);
            assert_eq!(recorded.len(), 1);
            assert_eq!(recorded[0].base.geom.primitives()[0].num_primitives(), 4);
            assert_eq!(node.registry().lock().buffer(&format).unwrap().position(), 4);
        }
        let reset = ctx.profiler().collector("Cull:Dynamic batch:Reset").sample();
        assert_eq!(reset.count, 3);
    }

    #[test]
    fn test_batches_that_do_not_fit_are_dropped_for_the_frame() {
        let config = PipelineConfig::default().with_vertex_buffer_bytes(12 * 6);
        let ctx = RenderContext::new(config).unwrap();
        let format = ctx.formats().v3();
        let state = ctx.states().empty_state();
        let node = DynamicRenderNode::new(&ctx, "batch")
            .with_child(producer("a", &format, &state, MeshPrimitive::Triangles, 0.0))
            .with_child(producer("b", &format, &state, MeshPrimitive::Triangles, 2.0));

        let recorded = cull(&ctx, &node);

        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].base.geom.primitives()[0].num_primitives(), 2);
    }

    #[test]
    fn test_producers_write_in_the_root_space() {
        let ctx = RenderContext::default();
        let states = ctx.states();
        let format = ctx.formats().v3();
        let state = states.empty_state();
        let moved = Arc::new(
            GroupNode::new("moved")
                .with_transform(states.transform(Mat4::new_translation(&Vec3::new(3.0, 0.0, 0.0))))
                .with_child(producer("a", &format, &state, MeshPrimitive::Triangles, 0.0)),
        );
        let node = DynamicRenderNode::new(&ctx, "batch")
            .with_transform(states.transform(Mat4::new_translation(&Vec3::new(0.0, 0.0, -10.0))))
            .with_child(moved);
        let scene = GroupNode::new("root").with_child(Arc::new(node));

        let recorded = cull(&ctx, &scene);

        let object = &recorded[0].base;
        assert_relative_eq!(object.transform.mat()[(2, 3)], -10.0);
        let mut reader = object.geom.vertex_data().reader(VERTEX).unwrap();
        let first = reader.get_point().unwrap();
        assert_relative_eq!(first.x, 3.0);
        assert_relative_eq!(first.z, 0.0);
    }

    #[test]
    fn test_producer_outside_a_root_draws_nothing() {
        let ctx = RenderContext::default();
        let format = ctx.formats().v3();
        let scene = GroupNode::new("root").with_child(producer(
            "stray",
            &format,
            &ctx.states().empty_state(),
            MeshPrimitive::Triangles,
            0.0,
        ));

        assert!(cull(&ctx, &scene).is_empty());
    }

    #[test]
    fn test_dynamic_batch_draws_through_bins() {
        let ctx = RenderContext::default();
        let mut bins = CullBinManager::from_config(ctx.config()).unwrap();
        let mut gsg = RecordingGsg::new();
        let format = ctx.formats().v3c4();
        let state = ctx.states().empty_state();
        let node = DynamicRenderNode::new(&ctx, "batch")
            .with_child(producer("a", &format, &state, MeshPrimitive::Triangles, 0.0))
            .with_child(producer("b", &format, &state, MeshPrimitive::Triangles, 1.0));

        let summary = {
            let mut result = CullResult::new(&mut bins, &mut gsg, &ctx);
            CullTraverser::new(&ctx, &mut result, &Mat4::identity()).traverse(&node);
            result.draw()
        };

        assert_eq!(summary.chains_drawn, 1);
        let call = gsg.draw_calls().next().unwrap();
        assert_eq!(call.num_primitives, 4);
        assert_eq!(call.num_indices, 12);
    }
}
