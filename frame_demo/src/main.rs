//! Frame pipeline demo
//!
//! Builds a small scene with opaque walls, alpha-blended glass, a decal
//! and a dynamic batch of spinning particles, then culls and draws a few
//! frames into a recording backend and logs what reached it.
//!
//! Pass a `.toml` or `.ron` pipeline config path as the first argument to
//! override the default bin table.

use std::f32::consts::FRAC_PI_3;
use std::sync::Arc;

use cull_engine::config::{Config, ConfigError};
use cull_engine::cull::CullError;
use cull_engine::foundation::logging;
use cull_engine::foundation::time::Stopwatch;
use cull_engine::gobj::{GeomError, VERTEX};
use cull_engine::prelude::*;

const FRAMES: usize = 3;
const PARTICLES: usize = 24;

#[derive(thiserror::Error, Debug)]
enum DemoError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("cull bins: {0}")]
    Bins(#[from] CullError),

    #[error("geometry: {0}")]
    Geom(#[from] GeomError),
}

fn quad(ctx: &RenderContext, size: f32) -> Result<Arc<Geom>, DemoError> {
    let mut data = VertexData::new("quad", ctx.formats().v3(), UsageHint::Static);
    {
        let mut writer = data.writer(VERTEX)?;
        writer.add_data3f(-size, -size, 0.0)?;
        writer.add_data3f(size, -size, 0.0)?;
        writer.add_data3f(size, size, 0.0)?;
        writer.add_data3f(-size, size, 0.0)?;
    }
    let tris = ctx.new_primitive(PrimitiveTopology::Triangles, UsageHint::Static);
    tris.add_vertices(&[0, 1, 2]);
    tris.add_vertices(&[0, 2, 3]);
    Ok(Arc::new(Geom::with_primitive(Arc::new(data), Arc::new(tris))))
}

fn placed(ctx: &RenderContext, name: &str, geom: Arc<Geom>, at: Vec3, attribs: RenderAttribs) -> GeomNode {
    let states = ctx.states();
    GeomNode::new(name)
        .with_geom(geom)
        .with_transform(states.transform(Mat4::new_translation(&at)))
        .with_state(states.state(attribs))
}

fn particles(ctx: &RenderContext, frame: usize) -> DynamicRenderNode {
    let states = ctx.states();
    let sparks = states.state(
        RenderAttribs::default()
            .with_texture("spark")
            .with_transparency(Transparency::Alpha),
    );
    let format = ctx.formats().v3c4();
    let mut producer = DynamicPolygonNode::new("sparks", format, sparks, MeshPrimitive::Triangles);
    for i in 0..PARTICLES {
        let angle = (i + frame) as f32 * std::f32::consts::TAU / PARTICLES as f32;
        let center = Point3::new(angle.cos() * 3.0, angle.sin() * 3.0, 0.0);
        let fade = i as f32 / PARTICLES as f32;
        producer = producer.with_polygon(
            Polygon::new(vec![
                center + Vec3::new(-0.1, -0.1, 0.0),
                center + Vec3::new(0.1, -0.1, 0.0),
                center + Vec3::new(0.0, 0.15, 0.0),
            ])
            .with_color([1.0, 0.6, 0.1, 1.0 - fade]),
        );
    }
    DynamicRenderNode::new(ctx, "particle batch")
        .with_transform(states.transform(Mat4::new_translation(&Vec3::new(0.0, 0.0, -12.0))))
        .with_child(Arc::new(producer))
}

fn build_scene(ctx: &RenderContext, frame: usize) -> Result<GroupNode, DemoError> {
    let panel = quad(ctx, 1.0)?;
    let poster = quad(ctx, 0.4)?;
    let wall = placed(ctx, "wall", Arc::clone(&panel), Vec3::new(0.0, 0.0, -20.0), RenderAttribs::default().with_decal())
        .with_child(Arc::new(GeomNode::new("poster").with_geom(poster)));
    let glass = RenderAttribs::default().with_transparency(Transparency::Alpha);

    Ok(GroupNode::new("root")
        .with_child(Arc::new(wall))
        .with_child(Arc::new(placed(ctx, "near glass", Arc::clone(&panel), Vec3::new(1.0, 0.0, -4.0), glass.clone())))
        .with_child(Arc::new(placed(ctx, "far glass", Arc::clone(&panel), Vec3::new(-1.0, 0.0, -9.0), glass)))
        .with_child(Arc::new(placed(ctx, "behind camera", panel, Vec3::new(0.0, 0.0, 5.0), RenderAttribs::default())))
        .with_child(Arc::new(particles(ctx, frame))))
}

fn load_config() -> Result<PipelineConfig, DemoError> {
    match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading pipeline config from {}", path);
            Ok(PipelineConfig::load_from_file(&path)?)
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn run() -> Result<(), DemoError> {
    let ctx = RenderContext::new(load_config()?)?;
    let mut bins = CullBinManager::from_config(ctx.config())?;
    let mut gsg = RecordingGsg::new();
    let frustum = ViewFrustum::perspective(FRAC_PI_3, 16.0 / 9.0, 0.1, 100.0);
    let camera = Mat4::identity();

    for frame in 0..FRAMES {
        let scene = build_scene(&ctx, frame)?;
        let stopwatch = Stopwatch::start_new();

        gsg.begin_frame();
        let mut result = CullResult::new(&mut bins, &mut gsg, &ctx);
        let stats = {
            let mut trav = CullTraverser::new(&ctx, &mut result, &camera).with_frustum(frustum.clone());
            trav.traverse(&scene);
            trav.stats()
        };
        let summary = result.draw();
        gsg.end_frame();

        log::info!(
            "Frame {}: visited {} nodes, culled {}, recorded {}, drew {} chains in {} bins, freed {} states ({:.3} ms)",
            gsg.frame(),
            stats.nodes_visited,
            stats.nodes_culled,
            stats.objects_recorded,
            summary.chains_drawn,
            summary.bins_drawn,
            summary.states_freed,
            stopwatch.elapsed().as_secs_f64() * 1000.0
        );
    }

    for call in gsg.draw_calls() {
        log::debug!(
            "draw state {} transform {} {:?}: {} primitives, {} indices over {} rows",
            call.state_id,
            call.transform_id,
            call.topology,
            call.num_primitives,
            call.num_indices,
            call.vertex_rows
        );
    }

    for (name, sample) in ctx.profiler().snapshot() {
        log::info!(
            "{:<40} count {:>4} level {:>4} total {:?}",
            name,
            sample.count,
            sample.level,
            sample.total
        );
    }
    Ok(())
}

fn main() {
    logging::init();
    log::info!("Starting frame pipeline demo");

    if let Err(err) = run() {
        log::error!("Demo failed: {}", err);
        std::process::exit(1);
    }
}
