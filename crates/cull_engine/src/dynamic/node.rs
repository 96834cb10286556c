//! Scene entry point for dynamic batching

use parking_lot::Mutex;
use std::sync::Arc;

use super::MeshRegistry;
use crate::context::RenderContext;
use crate::gobj::BoundingVolume;
use crate::pgraph::{CullableObject, RenderState, TransformState};
use crate::scene::{CullTraverser, CullTraverserData, SceneNode};

/// Node whose children write geometry into shared batches during cull
///
/// Every frame the node rewinds its buffers and meshes, traverses its
/// children with itself as the dynamic batch root, then records one object
/// per mesh that received geometry. Its bounds are infinite because its
/// content is only known after the children ran.
pub struct DynamicRenderNode {
    name: String,
    children: Vec<Arc<dyn SceneNode>>,
    transform: Option<Arc<TransformState>>,
    state: Option<Arc<RenderState>>,
    registry: Arc<Mutex<MeshRegistry>>,
}

impl DynamicRenderNode {
    /// Node with an empty registry
    pub fn new(ctx: &RenderContext, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
            transform: None,
            state: None,
            registry: Arc::new(Mutex::new(MeshRegistry::new(ctx))),
        }
    }

    /// Append a child
    pub fn with_child(mut self, child: Arc<dyn SceneNode>) -> Self {
        self.children.push(child);
        self
    }

    /// Set the local transform
    pub fn with_transform(mut self, transform: Arc<TransformState>) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Set the local state
    pub fn with_state(mut self, state: Arc<RenderState>) -> Self {
        self.state = Some(state);
        self
    }

    /// Buffers and meshes owned by this node
    pub fn registry(&self) -> &Arc<Mutex<MeshRegistry>> {
        &self.registry
    }
}

impl SceneNode for DynamicRenderNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn children(&self) -> &[Arc<dyn SceneNode>] {
        &self.children
    }

    fn transform(&self) -> Option<&Arc<TransformState>> {
        self.transform.as_ref()
    }

    fn state(&self) -> Option<&Arc<RenderState>> {
        self.state.as_ref()
    }

    fn internal_bounds(&self) -> BoundingVolume {
        BoundingVolume::Omni
    }

    fn bounds(&self) -> BoundingVolume {
        BoundingVolume::Omni
    }

    fn cull_callback(&self, trav: &mut CullTraverser<'_>, data: &mut CullTraverserData) -> bool {
        if let Err(err) = self.registry.lock().reset() {
            log::error!("Dynamic render node '{}' could not reset: {}", self.name, err);
        }

        trav.with_dynamic(Arc::clone(&self.registry), data, |trav| {
            trav.traverse_children(self, data);
        });

        let batches = self.registry.lock().renderable();
        let states = trav.ctx().states();
        for (geom, mesh_state) in batches {
            let state = states.compose_states(data.state(), &mesh_state);
            let object = CullableObject::new(geom, state, Arc::clone(data.modelview()));
            trav.record_object(object.into());
        }
        false
    }

    fn safe_to_combine(&self) -> bool {
        false
    }

    fn safe_to_flatten(&self) -> bool {
        false
    }
}
