//! Sinks for the objects produced by a cull traversal

use std::sync::Arc;

use super::{CullableObject, GraphicsStateGuardian, ObjectArena, ObjectChain, RenderState, TransformState};
use crate::gobj::Geom;

/// Receives the objects found visible during cull
pub trait CullHandler {
    /// Take ownership of an object and its decals
    fn record_object(&mut self, chain: ObjectChain);

    /// Record a single geom
    fn record_geom(&mut self, geom: Arc<Geom>, transform: Arc<TransformState>, state: Arc<RenderState>) {
        self.record_object(ObjectChain::single(CullableObject::new(geom, state, transform)));
    }
}

/// Collecting handler, mostly useful for inspection
impl CullHandler for Vec<ObjectChain> {
    fn record_object(&mut self, chain: ObjectChain) {
        self.push(chain);
    }
}

/// Handler that draws every object as soon as it is recorded
///
/// Skips binning and sorting entirely, for single-threaded paths where
/// draw order does not matter.
pub struct DrawCullHandler<'g> {
    gsg: &'g mut dyn GraphicsStateGuardian,
    scratch: ObjectArena,
    drawn: usize,
}

impl<'g> DrawCullHandler<'g> {
    /// Draw into `gsg`
    pub fn new(gsg: &'g mut dyn GraphicsStateGuardian) -> Self {
        Self {
            gsg,
            scratch: ObjectArena::new(),
            drawn: 0,
        }
    }

    /// Objects drawn so far, decals included
    pub const fn num_drawn(&self) -> usize {
        self.drawn
    }
}

impl CullHandler for DrawCullHandler<'_> {
    fn record_object(&mut self, chain: ObjectChain) {
        self.drawn += chain.len();
        let head = self.scratch.insert_chain(chain);
        self.scratch.draw_chain(head, &mut *self.gsg);
        self.scratch.clear();
    }
}
