use super::bin::draw_in_order;
use super::{BinType, CullBin};
use crate::foundation::collections::ObjectKey;
use crate::pgraph::{GraphicsStateGuardian, ObjectArena, ObjectChain};

#[derive(Debug, Clone, Copy)]
struct DepthEntry {
    key: ObjectKey,
    distance: f32,
}

/// Draws the farthest objects first, for alpha blending
///
/// Objects whose bounds are empty have no center to sort by and are
/// dropped when added.
#[derive(Debug)]
pub struct BackToFrontBin {
    name: String,
    arena: ObjectArena,
    entries: Vec<DepthEntry>,
}

impl BackToFrontBin {
    /// Create an empty bin
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arena: ObjectArena::new(),
            entries: Vec::new(),
        }
    }

    /// Stored view distances in current order
    pub fn distances(&self) -> Vec<f32> {
        self.entries.iter().map(|entry| entry.distance).collect()
    }
}

impl CullBin for BackToFrontBin {
    fn name(&self) -> &str {
        &self.name
    }

    fn bin_type(&self) -> BinType {
        BinType::BackToFront
    }

    fn add_object(&mut self, chain: ObjectChain, gsg: &dyn GraphicsStateGuardian) {
        let Some(center) = chain.base.view_bounds().center() else {
            log::trace!("'{}' drops {} without bounds", self.name, chain.base);
            return;
        };
        let distance = gsg.compute_distance_to(&center);
        let key = self.arena.insert_chain(chain);
        self.entries.push(DepthEntry { key, distance });
    }

    fn finish_cull(&mut self) {
        self.entries.sort_by(|a, b| b.distance.total_cmp(&a.distance));
    }

    fn draw(&self, gsg: &mut dyn GraphicsStateGuardian) -> usize {
        draw_in_order(&self.arena, self.entries.iter().map(|entry| entry.key), gsg)
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.arena.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cull::bin::test_support::{drawn_transforms, object_at};
    use crate::gobj::{FormatRegistry, Geom, UsageHint, VertexData};
    use crate::pgraph::{CullableObject, RecordingGsg, RenderAttribs, StateRegistry};
    use approx::assert_relative_eq;
    use std::sync::Arc;

    #[test]
    fn test_sorts_farthest_first() {
        let states = StateRegistry::new();
        let gsg = RecordingGsg::new();
        let mut bin = BackToFrontBin::new("transparent");

        let d1 = object_at(&states, -1.0, RenderAttribs::default());
        let d2 = object_at(&states, -5.0, RenderAttribs::default());
        let d3 = object_at(&states, -9.0, RenderAttribs::default());
        let expected = vec![d3.transform.id(), d2.transform.id(), d1.transform.id()];
        for object in [d2, d1, d3] {
            bin.add_object(object.into(), &gsg);
        }
        bin.finish_cull();

        let distances = bin.distances();
        assert_relative_eq!(distances[0], 9.0);
        assert_relative_eq!(distances[2], 1.0);

        let mut gsg = gsg;
        bin.draw(&mut gsg);
        assert_eq!(drawn_transforms(&gsg), expected);
    }

    #[test]
    fn test_order_is_repeatable() {
        let states = StateRegistry::new();
        let gsg = RecordingGsg::new();
        let mut orders = Vec::new();
        for _ in 0..3 {
            let mut bin = BackToFrontBin::new("transparent");
            for z in [-4.0, -8.0, -4.0, -2.0] {
                bin.add_object(object_at(&states, z, RenderAttribs::default()).into(), &gsg);
            }
            bin.finish_cull();
            orders.push(bin.distances());
        }
        assert_eq!(orders[0], orders[1]);
        assert_eq!(orders[1], orders[2]);
    }

    #[test]
    fn test_drops_objects_without_bounds() {
        let states = StateRegistry::new();
        let formats = FormatRegistry::new();
        let mut gsg = RecordingGsg::new();
        let mut bin = BackToFrontBin::new("transparent");

        let empty = Arc::new(Geom::new(Arc::new(VertexData::new("empty", formats.v3(), UsageHint::Static))));
        bin.add_object(
            CullableObject::new(empty, states.empty_state(), states.identity_transform()).into(),
            &gsg,
        );
        bin.add_object(object_at(&states, -3.0, RenderAttribs::default()).into(), &gsg);
        bin.finish_cull();

        assert_eq!(bin.len(), 1);
        assert_eq!(bin.draw(&mut gsg), 1);
    }
}
