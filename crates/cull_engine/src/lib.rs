//! # Cull Engine
//!
//! A renderer-independent cull-and-draw pipeline.
//!
//! ## Features
//!
//! - **Geometry objects**: vertex formats and rows, pipelined index
//!   primitives with decomposition and shade-model rotation
//! - **Cull traversal**: frustum tests, state and transform composition,
//!   decal chains
//! - **Cull bins**: unsorted, state-sorted, back-to-front, front-to-back
//!   and fixed-order bins, drawn in configurable priority order
//! - **Dynamic batching**: geometry written during cull into shared
//!   frame-reset vertex buffers and emitted as one draw per batch
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cull_engine::prelude::*;
//!
//! let ctx = RenderContext::new(PipelineConfig::default()).unwrap();
//! let mut bins = CullBinManager::from_config(ctx.config()).unwrap();
//! let mut gsg = RecordingGsg::new();
//! let scene = GroupNode::new("root");
//!
//! let mut result = CullResult::new(&mut bins, &mut gsg, &ctx);
//! CullTraverser::new(&ctx, &mut result, &Mat4::identity()).traverse(&scene);
//! result.draw();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod context;
pub mod cull;
pub mod dynamic;
pub mod foundation;
pub mod gobj;
pub mod pgraph;
pub mod scene;

#[cfg(test)]
mod tests;

/// Common imports for pipeline users
pub mod prelude {
    pub use crate::{
        config::{BinDefinition, Config, ConfigError, PipelineConfig},
        context::RenderContext,
        cull::{BinType, CullBin, CullBinManager, CullResult, DrawSummary},
        dynamic::{DynamicPolygonNode, DynamicRenderNode, MeshPrimitive, MeshRegistry, Polygon},
        foundation::math::{Mat4, Point3, Vec3},
        gobj::{
            BoundingVolume, Geom, GeomPrimitive, NumericType, PrimitiveTopology, ShadeModel, UsageHint,
            VertexData, VertexFormat,
        },
        pgraph::{
            CullHandler, CullableObject, DrawCullHandler, GraphicsStateGuardian, ObjectChain, RecordingGsg,
            RenderAttribs, RenderState, TransformState, Transparency,
        },
        scene::{CullTraverser, GeomNode, GroupNode, SceneNode, ViewFrustum},
    };
}
