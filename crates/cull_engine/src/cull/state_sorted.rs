use std::cmp::Ordering;
use std::sync::Arc;

use super::bin::draw_in_order;
use super::{BinType, CullBin};
use crate::foundation::collections::ObjectKey;
use crate::pgraph::{GraphicsStateGuardian, ObjectArena, ObjectChain, RenderState};

#[derive(Debug)]
struct StateEntry {
    key: ObjectKey,
    state: Arc<RenderState>,
    format_id: u64,
}

impl StateEntry {
    fn sort_order(&self, other: &Self) -> Ordering {
        self.state
            .cmp(&other.state)
            .then(self.format_id.cmp(&other.format_id))
    }
}

/// Groups objects by render state to minimize state changes
///
/// Within one state, objects sharing a vertex format end up adjacent.
#[derive(Debug)]
pub struct StateSortedBin {
    name: String,
    arena: ObjectArena,
    entries: Vec<StateEntry>,
}

impl StateSortedBin {
    /// Create an empty bin
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arena: ObjectArena::new(),
            entries: Vec::new(),
        }
    }
}

impl CullBin for StateSortedBin {
    fn name(&self) -> &str {
        &self.name
    }

    fn bin_type(&self) -> BinType {
        BinType::StateSorted
    }

    fn add_object(&mut self, chain: ObjectChain, _gsg: &dyn GraphicsStateGuardian) {
        let state = Arc::clone(&chain.base.state);
        let format_id = chain.base.geom.vertex_data().format().id();
        let key = self.arena.insert_chain(chain);
        self.entries.push(StateEntry { key, state, format_id });
    }

    fn finish_cull(&mut self) {
        self.entries.sort_by(StateEntry::sort_order);
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
    use crate::cull::bin::test_support::object_at;
    use crate::pgraph::{DrawEvent, RecordingGsg, RenderAttribs, StateRegistry};

    #[test]
    fn test_groups_equal_states() {
        let states = StateRegistry::new();
        let mut gsg = RecordingGsg::new();
        let mut bin = StateSortedBin::new("opaque");

        for (i, texture) in ["stone", "grass", "stone", "grass", "stone"].into_iter().enumerate() {
            let attribs = RenderAttribs::default().with_texture(texture);
            bin.add_object(object_at(&states, -(i as f32), attribs).into(), &gsg);
        }
        bin.finish_cull();
        bin.draw(&mut gsg);

        let drawn: Vec<u64> = gsg
            .events()
            .iter()
            .filter_map(|event| match event {
                DrawEvent::Draw(call) => Some(call.state_id),
                _ => None,
            })
            .collect();
        let changes = drawn.windows(2).filter(|pair| pair[0] != pair[1]).count();
        assert_eq!(drawn.len(), 5);
        assert_eq!(changes, 1);

        let grass = states.state(RenderAttribs::default().with_texture("grass")).id();
        assert_eq!(drawn[0], grass);
    }
}
