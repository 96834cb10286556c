use super::bin::draw_in_order;
use super::{BinType, CullBin};
use crate::foundation::collections::ObjectKey;
use crate::pgraph::{GraphicsStateGuardian, ObjectArena, ObjectChain};

/// Draws the nearest objects first to make the most of early depth rejection
#[derive(Debug)]
pub struct FrontToBackBin {
    name: String,
    arena: ObjectArena,
    entries: Vec<(ObjectKey, f32)>,
}

impl FrontToBackBin {
    /// Create an empty bin
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arena: ObjectArena::new(),
            entries: Vec::new(),
        }
    }
}

impl CullBin for FrontToBackBin {
    fn name(&self) -> &str {
        &self.name
    }

    fn bin_type(&self) -> BinType {
        BinType::FrontToBack
    }

    fn add_object(&mut self, chain: ObjectChain, gsg: &dyn GraphicsStateGuardian) {
        let Some(center) = chain.base.view_bounds().center() else {
            log::trace!("'{}' drops {} without bounds", self.name, chain.base);
            return;
        };
        let distance = gsg.compute_distance_to(&center);
        self.entries.push((self.arena.insert_chain(chain), distance));
    }

    fn finish_cull(&mut self) {
        self.entries.sort_by(|a, b| a.1.total_cmp(&b.1));
    }

    fn draw(&self, gsg: &mut dyn GraphicsStateGuardian) -> usize {
        draw_in_order(&self.arena, self.entries.iter().map(|(key, _)| *key), gsg)
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
    use crate::pgraph::{RecordingGsg, RenderAttribs, StateRegistry};

    #[test]
    fn test_sorts_nearest_first() {
        let states = StateRegistry::new();
        let mut gsg = RecordingGsg::new();
        let mut bin = FrontToBackBin::new("opaque");

        let far = object_at(&states, -20.0, RenderAttribs::default());
        let near = object_at(&states, -2.0, RenderAttribs::default());
        let expected = vec![near.transform.id(), far.transform.id()];
        bin.add_object(far.into(), &gsg);
        bin.add_object(near.into(), &gsg);
        bin.finish_cull();
        bin.draw(&mut gsg);

        assert_eq!(drawn_transforms(&gsg), expected);
    }
}
