//! The cull traversal
//!
//! One [`CullTraverser`] walks the scene once per frame. It carries the
//! camera, the frustum and the handler that receives visible objects; the
//! per-node [`CullTraverserData`] carries what has been composed so far on
//! the way down.

use parking_lot::Mutex;
use std::sync::Arc;

use super::{Intersection, SceneNode, ViewFrustum};
use crate::context::RenderContext;
use crate::dynamic::{MeshLease, MeshPrimitive, MeshRegistry};
use crate::foundation::math::Mat4;
use crate::gobj::{Geom, VertexFormat};
use crate::pgraph::{CullHandler, CullableObject, ObjectChain, RenderState, TransformState};

/// Net transform, view transform and state at one node
#[derive(Debug, Clone)]
pub struct CullTraverserData {
    net_transform: Arc<TransformState>,
    modelview: Arc<TransformState>,
    state: Arc<RenderState>,
    fully_inside: bool,
}

impl CullTraverserData {
    /// Model-to-world transform
    pub fn net_transform(&self) -> &Arc<TransformState> {
        &self.net_transform
    }

    /// Model-to-view transform
    pub fn modelview(&self) -> &Arc<TransformState> {
        &self.modelview
    }

    /// Net render state
    pub fn state(&self) -> &Arc<RenderState> {
        &self.state
    }

    /// Whether an ancestor was found entirely inside the frustum
    pub const fn is_fully_inside(&self) -> bool {
        self.fully_inside
    }

    fn descend(&self, node: &dyn SceneNode, ctx: &RenderContext, view: &Arc<TransformState>) -> Self {
        let states = ctx.states();
        let (net_transform, modelview) = match node.transform() {
            Some(transform) => {
                let net = states.compose_transforms(&self.net_transform, transform);
                let modelview = states.compose_transforms(view, &net);
                (net, modelview)
            }
            None => (Arc::clone(&self.net_transform), Arc::clone(&self.modelview)),
        };
        let state = match node.state() {
            Some(state) => states.compose_states(&self.state, state),
            None => Arc::clone(&self.state),
        };
        Self {
            net_transform,
            modelview,
            state,
            fully_inside: self.fully_inside,
        }
    }
}

/// Counters for one traversal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalStats {
    /// Nodes whose callback ran
    pub nodes_visited: usize,
    /// Nodes and geoms rejected by the frustum
    pub nodes_culled: usize,
    /// Object chains handed to the handler
    pub objects_recorded: usize,
}

#[derive(Debug)]
struct DynamicScope {
    registry: Arc<Mutex<MeshRegistry>>,
    root_inverse: Mat4,
}

/// Walks a scene once and records what is visible
pub struct CullTraverser<'a> {
    ctx: &'a RenderContext,
    handler: &'a mut dyn CullHandler,
    view: Arc<TransformState>,
    frustum: Option<ViewFrustum>,
    dynamic: Option<DynamicScope>,
    stats: TraversalStats,
}

impl<'a> CullTraverser<'a> {
    /// Traverser for a camera placed by `camera` (camera-to-world)
    ///
    /// Without a frustum nothing is culled.
    pub fn new(ctx: &'a RenderContext, handler: &'a mut dyn CullHandler, camera: &Mat4) -> Self {
        let view = camera.try_inverse().unwrap_or_else(|| {
            log::warn!("Camera transform is singular, culling from the origin");
            Mat4::identity()
        });
        Self {
            ctx,
            handler,
            view: ctx.states().transform(view),
            frustum: None,
            dynamic: None,
            stats: TraversalStats::default(),
        }
    }

    /// Cull against `frustum`
    pub fn with_frustum(mut self, frustum: ViewFrustum) -> Self {
        self.frustum = Some(frustum);
        self
    }

    /// Context the traversal runs in
    pub const fn ctx(&self) -> &'a RenderContext {
        self.ctx
    }

    /// World-to-view transform
    pub fn view_transform(&self) -> &Arc<TransformState> {
        &self.view
    }

    /// Counters so far
    pub const fn stats(&self) -> TraversalStats {
        self.stats
    }

    /// Data for the scene root
    pub fn root_data(&self) -> CullTraverserData {
        let states = self.ctx.states();
        CullTraverserData {
            net_transform: states.identity_transform(),
            modelview: Arc::clone(&self.view),
            state: states.empty_state(),
            fully_inside: self.frustum.is_none(),
        }
    }

    /// Traverse a whole scene
    pub fn traverse(&mut self, root: &dyn SceneNode) {
        let data = self.root_data();
        self.traverse_node(root, &data);
    }

    /// Visit `node` below a parent
    pub fn traverse_node(&mut self, node: &dyn SceneNode, parent: &CullTraverserData) {
        let mut data = parent.descend(node, self.ctx, &self.view);
        if !self.is_in_view(node, &mut data) {
            self.stats.nodes_culled += 1;
            log::trace!("Culled '{}'", node.name());
            return;
        }
        self.traverse_below(node, &mut data);
    }

    /// Run `node`'s callback, then record its geoms and visit its children
    pub fn traverse_below(&mut self, node: &dyn SceneNode, data: &mut CullTraverserData) {
        self.stats.nodes_visited += 1;
        if !node.cull_callback(self, data) {
            return;
        }
        for geom in node.geoms() {
            self.record_geom(Arc::clone(geom), data);
        }
        self.traverse_children(node, data);
    }

    /// Visit every child of `node`
    pub fn traverse_children(&mut self, node: &dyn SceneNode, data: &CullTraverserData) {
        for child in node.children() {
            self.traverse_node(child.as_ref(), data);
        }
    }

    /// Record one geom with the node's view transform and state
    pub fn record_geom(&mut self, geom: Arc<Geom>, data: &CullTraverserData) {
        if geom.is_empty() {
            return;
        }
        if !data.fully_inside {
            if let Some(frustum) = &self.frustum {
                let bounds = geom.bounds().transformed(data.modelview.mat());
                if frustum.classify(&bounds) == Intersection::Outside {
                    self.stats.nodes_culled += 1;
                    return;
                }
            }
        }
        let object = CullableObject::new(geom, Arc::clone(&data.state), Arc::clone(&data.modelview));
        self.record_object(object.into());
    }

    /// Hand a finished chain to the handler
    pub fn record_object(&mut self, chain: ObjectChain) {
        self.stats.objects_recorded += 1;
        self.handler.record_object(chain);
    }

    /// Run `f` with `registry` as the current dynamic batch root
    ///
    /// `data` is the root's own traversal data; producers below write
    /// vertices in the root's space. The previous scope is restored after.
    pub fn with_dynamic<R>(
        &mut self,
        registry: Arc<Mutex<MeshRegistry>>,
        data: &CullTraverserData,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        let root_inverse = data.net_transform.mat().try_inverse().unwrap_or_else(Mat4::identity);
        let previous = self.dynamic.replace(DynamicScope { registry, root_inverse });
        let result = f(self);
        self.dynamic = previous;
        result
    }

    /// Whether a dynamic batch root is active
    pub const fn in_dynamic_scope(&self) -> bool {
        self.dynamic.is_some()
    }

    /// Transform from a node's space into the dynamic root's space
    pub fn dynamic_local_transform(&self, data: &CullTraverserData) -> Option<Mat4> {
        let scope = self.dynamic.as_ref()?;
        Some(scope.root_inverse * data.net_transform.mat())
    }

    /// Run `f` on the dynamic mesh for a key, creating it on first use
    ///
    /// Returns `None` outside a dynamic batch root.
    pub fn with_dynamic_mesh<R>(
        &self,
        format: &Arc<VertexFormat>,
        state: &Arc<RenderState>,
        primitive: MeshPrimitive,
        f: impl FnOnce(&mut MeshLease<'_>) -> R,
    ) -> Option<R> {
        let scope = self.dynamic.as_ref()?;
        let mut registry = scope.registry.lock();
        let mut lease = registry.get_mesh(format, state, primitive);
        Some(f(&mut lease))
    }

    fn is_in_view(&self, node: &dyn SceneNode, data: &mut CullTraverserData) -> bool {
        if data.fully_inside {
            return true;
        }
        let Some(frustum) = &self.frustum else {
            return true;
        };
        let bounds = node.bounds();
        let view_bounds = if bounds.is_infinite() {
            bounds
        } else {
            bounds.transformed(data.modelview.mat())
        };
        match frustum.classify(&view_bounds) {
            Intersection::Outside => false,
            Intersection::Partial => true,
            Intersection::Inside => {
                data.fully_inside = true;
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::gobj::{GeomPrimitive, PrimitiveTopology, UsageHint, VertexData, VERTEX};
    use crate::pgraph::RenderAttribs;
    use crate::scene::{GeomNode, GroupNode};
    use std::f32::consts::FRAC_PI_2;

    fn triangle(ctx: &RenderContext) -> Arc<Geom> {
        let mut data = VertexData::new("tri", ctx.formats().v3(), UsageHint::Static);
        {
            let mut writer = data.writer(VERTEX).unwrap();
            writer.add_data3f(-0.5, -0.5, 0.0).unwrap();
            writer.add_data3f(0.5, -0.5, 0.0).unwrap();
            writer.add_data3f(0.0, 0.5, 0.0).unwrap();
        }
        let tris = GeomPrimitive::new(PrimitiveTopology::Triangles);
        tris.add_next_vertices(3);
        Arc::new(Geom::with_primitive(Arc::new(data), Arc::new(tris)))
    }

    fn placed(ctx: &RenderContext, name: &str, z: f32) -> Arc<dyn SceneNode> {
        Arc::new(
            GeomNode::new(name)
                .with_geom(triangle(ctx))
                .with_transform(ctx.states().transform(Mat4::new_translation(&Vec3::new(0.0, 0.0, z)))),
        )
    }

    #[test]
    fn test_frustum_rejects_nodes_behind_camera() {
        let ctx = RenderContext::default();
        let scene = GroupNode::new("root")
            .with_child(placed(&ctx, "front", -5.0))
            .with_child(placed(&ctx, "behind", 5.0));

        let mut recorded: Vec<ObjectChain> = Vec::new();
        let stats = {
            let mut trav = CullTraverser::new(&ctx, &mut recorded, &Mat4::identity())
                .with_frustum(ViewFrustum::perspective(FRAC_PI_2, 1.0, 0.1, 100.0));
            trav.traverse(&scene);
            trav.stats()
        };

        assert_eq!(recorded.len(), 1);
        assert_eq!(stats.nodes_culled, 1);
        let z = recorded[0].base.transform.mat()[(2, 3)];
        assert!((z + 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_states_compose_down_the_tree() {
        let ctx = RenderContext::default();
        let states = ctx.states();
        let leaf = GeomNode::new("leaf")
            .with_geom(triangle(&ctx))
            .with_state(states.state(RenderAttribs::default().with_color([255, 0, 0, 255])));
        let scene = GroupNode::new("root")
            .with_state(states.state(RenderAttribs::default().with_texture("brick")))
            .with_child(Arc::new(leaf));

        let mut recorded: Vec<ObjectChain> = Vec::new();
        CullTraverser::new(&ctx, &mut recorded, &Mat4::identity()).traverse(&scene);

        let attribs = recorded[0].base.state.attribs();
        assert_eq!(attribs.texture.as_deref(), Some("brick"));
        assert_eq!(attribs.color, Some([255, 0, 0, 255]));
    }

    #[test]
    fn test_camera_offset_moves_objects_into_view_space() {
        let ctx = RenderContext::default();
        let scene = GroupNode::new("root").with_child(placed(&ctx, "origin", 0.0));
        let camera = Mat4::new_translation(&Vec3::new(0.0, 0.0, 10.0));

        let mut recorded: Vec<ObjectChain> = Vec::new();
        CullTraverser::new(&ctx, &mut recorded, &camera).traverse(&scene);

        let z = recorded[0].base.transform.mat()[(2, 3)];
        assert!((z + 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_decal_node_records_one_chain() {
        let ctx = RenderContext::default();
        let states = ctx.states();
        let stripe = GeomNode::new("stripe").with_geom(triangle(&ctx));
        let wall = GeomNode::new("wall")
            .with_geom(triangle(&ctx))
            .with_state(states.state(RenderAttribs::default().with_decal()))
            .with_child(Arc::new(stripe));

        let mut recorded: Vec<ObjectChain> = Vec::new();
        CullTraverser::new(&ctx, &mut recorded, &Mat4::identity()).traverse(&wall);

        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].len(), 2);
    }

    #[test]
    fn test_dynamic_scope_is_restored() {
        let ctx = RenderContext::default();
        let registry = Arc::new(Mutex::new(MeshRegistry::new(&ctx)));
        let mut recorded: Vec<ObjectChain> = Vec::new();
        let mut trav = CullTraverser::new(&ctx, &mut recorded, &Mat4::identity());
        let data = trav.root_data();

        assert!(!trav.in_dynamic_scope());
        let inside = trav.with_dynamic(registry, &data, |trav| {
            trav.with_dynamic_mesh(&ctx.formats().v3(), &ctx.states().empty_state(), MeshPrimitive::Lines, |mesh| {
                mesh.lock(2)
            })
        });
        assert_eq!(inside, Some(true));
        assert!(!trav.in_dynamic_scope());
        assert!(trav.dynamic_local_transform(&data).is_none());
    }
}
