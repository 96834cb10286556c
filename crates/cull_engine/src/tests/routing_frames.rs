//! Frames routed through the bin table

use std::sync::Arc;

use crate::context::RenderContext;
use crate::cull::{CullBinManager, CullResult};
use crate::foundation::math::{Mat4, Vec3};
use crate::gobj::{Geom, PrimitiveTopology, UsageHint, VertexData, VERTEX};
use crate::pgraph::{DrawEvent, RecordingGsg, RenderAttribs, Transparency};
use crate::scene::{CullTraverser, GeomNode, GroupNode, SceneNode};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pgraph::{DrawCullHandler, GraphicsStateGuardian};

    fn triangle(ctx: &RenderContext) -> Arc<Geom> {
        let mut data = VertexData::new("tri", ctx.formats().v3(), UsageHint::Static);
        {
            let mut writer = data.writer(VERTEX).unwrap();
            writer.add_data3f(-1.0, -1.0, 0.0).unwrap();
            writer.add_data3f(1.0, -1.0, 0.0).unwrap();
            writer.add_data3f(0.0, 1.0, 0.0).unwrap();
        }
        let tris = ctx.new_primitive(PrimitiveTopology::Triangles, UsageHint::Static);
        tris.add_next_vertices(3);
        Arc::new(Geom::with_primitive(Arc::new(data), Arc::new(tris)))
    }

    fn leaf(ctx: &RenderContext, name: &str, z: f32, attribs: RenderAttribs) -> Arc<dyn SceneNode> {
        Arc::new(
            GeomNode::new(name)
                .with_geom(triangle(ctx))
                .with_transform(ctx.states().transform(Mat4::new_translation(&Vec3::new(0.0, 0.0, z))))
                .with_state(ctx.states().state(attribs)),
        )
    }

    fn drawn_transforms(gsg: &RecordingGsg) -> Vec<u64> {
        gsg.draw_calls().map(|call| call.transform_id).collect()
    }

    #[test]
    fn test_opaque_before_transparent_and_glass_back_to_front() {
        let ctx = RenderContext::default();
        let alpha = RenderAttribs::default().with_transparency(Transparency::Alpha);
        let scene = GroupNode::new("root")
            .with_child(leaf(&ctx, "near glass", -2.0, alpha.clone()))
            .with_child(leaf(&ctx, "far glass", -8.0, alpha))
            .with_child(leaf(&ctx, "wall", -20.0, RenderAttribs::default()));

        let mut bins = CullBinManager::from_config(ctx.config()).unwrap();
        let mut gsg = RecordingGsg::new();
        gsg.begin_frame();
        {
            let mut result = CullResult::new(&mut bins, &mut gsg, &ctx);
            CullTraverser::new(&ctx, &mut result, &Mat4::identity()).traverse(&scene);
            result.draw();
        }
        gsg.end_frame();

        let at = |z: f32| ctx.states().transform(Mat4::new_translation(&Vec3::new(0.0, 0.0, z))).id();
        assert_eq!(drawn_transforms(&gsg), vec![at(-20.0), at(-8.0), at(-2.0)]);
        assert!(matches!(gsg.events().first(), Some(DrawEvent::BeginFrame(1))));
        assert!(matches!(gsg.events().last(), Some(DrawEvent::EndFrame(1))));
    }

    #[test]
    fn test_bins_are_empty_between_frames() {
        let ctx = RenderContext::default();
        let scene = GroupNode::new("root").with_child(leaf(&ctx, "wall", -5.0, RenderAttribs::default()));
        let mut bins = CullBinManager::from_config(ctx.config()).unwrap();
        let mut gsg = RecordingGsg::new();

        for frame in 1..=3 {
            let mut result = CullResult::new(&mut bins, &mut gsg, &ctx);
            CullTraverser::new(&ctx, &mut result, &Mat4::identity()).traverse(&scene);
            let summary = result.draw();
            assert_eq!(summary.chains_drawn, 1);
            assert_eq!(bins.num_objects(), 0);
            assert_eq!(gsg.num_draws(), frame);
        }
    }

    #[test]
    fn test_moving_camera_does_not_grow_the_state_tables() {
        let ctx = RenderContext::default();
        let scene = GroupNode::new("root").with_child(leaf(&ctx, "wall", -5.0, RenderAttribs::default()));
        let mut bins = CullBinManager::from_config(ctx.config()).unwrap();
        let mut gsg = RecordingGsg::new();

        let mut sizes = Vec::new();
        for frame in 0..200 {
            let camera = Mat4::new_translation(&Vec3::new(frame as f32 * 0.25, 0.0, 0.0));
            let mut result = CullResult::new(&mut bins, &mut gsg, &ctx);
            CullTraverser::new(&ctx, &mut result, &camera).traverse(&scene);
            result.draw();
            sizes.push(ctx.states().num_transforms());
        }

        assert_eq!(gsg.num_draws(), 200);
        assert_eq!(sizes[199], sizes[1]);
    }

    #[test]
    fn test_decal_chain_survives_binning() {
        let ctx = RenderContext::default();
        let states = ctx.states();
        let wall = GeomNode::new("wall")
            .with_geom(triangle(&ctx))
            .with_state(states.state(RenderAttribs::default().with_decal()))
            .with_child(Arc::new(GeomNode::new("poster").with_geom(triangle(&ctx))));

        let mut bins = CullBinManager::from_config(ctx.config()).unwrap();
        let mut gsg = RecordingGsg::new();
        {
            let mut result = CullResult::new(&mut bins, &mut gsg, &ctx);
            CullTraverser::new(&ctx, &mut result, &Mat4::identity()).traverse(&wall);
            result.draw();
        }

        let names: Vec<&str> = gsg
            .events()
            .iter()
            .map(|event| match event {
                DrawEvent::Draw(_) => "draw",
                DrawEvent::DecalBaseFirst => "base first",
                DrawEvent::DecalNested => "nested",
                DrawEvent::DecalBaseSecond => "base second",
                DrawEvent::FinishDecal => "finish",
                DrawEvent::BeginFrame(_) | DrawEvent::EndFrame(_) => "frame",
            })
            .collect();
        assert_eq!(
            names,
            vec!["base first", "draw", "nested", "draw", "base second", "draw", "finish"]
        );
    }

    #[test]
    fn test_immediate_handler_skips_bins() {
        let ctx = RenderContext::default();
        let scene = GroupNode::new("root")
            .with_child(leaf(&ctx, "a", -5.0, RenderAttribs::default().with_transparency(Transparency::Alpha)))
            .with_child(leaf(&ctx, "b", -9.0, RenderAttribs::default()));

        let mut gsg = RecordingGsg::new();
        let drawn = {
            let mut handler = DrawCullHandler::new(&mut gsg);
            CullTraverser::new(&ctx, &mut handler, &Mat4::identity()).traverse(&scene);
            handler.num_drawn()
        };
        assert_eq!(drawn, 2);
        assert_eq!(gsg.num_draws(), 2);
    }
}
