use std::sync::Arc;

use super::{CullTraverser, CullTraverserData};
use crate::gobj::{BoundingVolume, Geom};
use crate::pgraph::{CullableObject, ObjectChain, RenderState, TransformState};

/// A node the cull traversal can visit
///
/// Everything is read through `&self`; nodes are shared between frames and
/// threads once built.
pub trait SceneNode: Send + Sync {
    /// Debug name
    fn name(&self) -> &str;

    /// Child nodes, in traversal order
    fn children(&self) -> &[Arc<dyn SceneNode>] {
        &[]
    }

    /// Transform relative to the parent
    fn transform(&self) -> Option<&Arc<TransformState>> {
        None
    }

    /// State applied over the parent's
    fn state(&self) -> Option<&Arc<RenderState>> {
        None
    }

    /// Geometry drawn at this node
    fn geoms(&self) -> &[Arc<Geom>] {
        &[]
    }

    /// Bounds of this node's own content, in its own space
    fn internal_bounds(&self) -> BoundingVolume {
        self.geoms()
            .iter()
            .fold(BoundingVolume::Empty, |bounds, geom| bounds.union(&geom.bounds()))
    }

    /// Bounds of this node and everything below it, in its own space
    fn bounds(&self) -> BoundingVolume {
        self.children().iter().fold(self.internal_bounds(), |bounds, child| {
            let child_bounds = match child.transform() {
                Some(transform) => child.bounds().transformed(transform.mat()),
                None => child.bounds(),
            };
            bounds.union(&child_bounds)
        })
    }

    /// Hook run when the traversal reaches this node
    ///
    /// Return false when the node has handled its geoms and children itself.
    fn cull_callback(&self, _trav: &mut CullTraverser<'_>, _data: &mut CullTraverserData) -> bool {
        true
    }

    /// Whether this node may be merged with its siblings
    fn safe_to_combine(&self) -> bool {
        true
    }

    /// Whether this node's transform may be baked into its geometry
    fn safe_to_flatten(&self) -> bool {
        true
    }
}

/// Node that only groups, transforms and restates its children
#[derive(Default)]
pub struct GroupNode {
    name: String,
    children: Vec<Arc<dyn SceneNode>>,
    transform: Option<Arc<TransformState>>,
    state: Option<Arc<RenderState>>,
}

impl GroupNode {
    /// Empty group
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
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
}

impl SceneNode for GroupNode {
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
}

/// Node holding drawable geometry
///
/// With a decal state, the first geom is the base and every other geom,
/// here and in the direct children, is layered onto it as one chain.
#[derive(Default)]
pub struct GeomNode {
    name: String,
    geoms: Vec<Arc<Geom>>,
    children: Vec<Arc<dyn SceneNode>>,
    transform: Option<Arc<TransformState>>,
    state: Option<Arc<RenderState>>,
}

impl GeomNode {
    /// Node without geometry
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Append a geom
    pub fn with_geom(mut self, geom: Arc<Geom>) -> Self {
        self.geoms.push(geom);
        self
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

    fn decal_chain(&self, trav: &CullTraverser<'_>, data: &CullTraverserData) -> Option<ObjectChain> {
        let (base, rest) = self.geoms.split_first()?;
        let states = trav.ctx().states();
        let object = |geom: &Arc<Geom>, state: &Arc<RenderState>| {
            CullableObject::new(Arc::clone(geom), Arc::clone(state), Arc::clone(data.modelview()))
        };

        let mut decals: Vec<CullableObject> = rest.iter().map(|geom| object(geom, data.state())).collect();
        for child in &self.children {
            let state = match child.state() {
                Some(child_state) => states.compose_states(data.state(), child_state),
                None => Arc::clone(data.state()),
            };
            decals.extend(child.geoms().iter().map(|geom| object(geom, &state)));
        }
        Some(ObjectChain::with_decals(object(base, data.state()), decals))
    }
}

impl SceneNode for GeomNode {
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

    fn geoms(&self) -> &[Arc<Geom>] {
        &self.geoms
    }

    fn cull_callback(&self, trav: &mut CullTraverser<'_>, data: &mut CullTraverserData) -> bool {
        if !self.state.as_ref().is_some_and(|state| state.is_decal()) {
            return true;
        }
        match self.decal_chain(trav, data) {
            Some(chain) => {
                trav.record_object(chain);
                false
            }
            None => true,
        }
    }
}
