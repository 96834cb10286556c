use super::bin::draw_in_order;
use super::{BinType, CullBin};
use crate::foundation::collections::ObjectKey;
use crate::pgraph::{GraphicsStateGuardian, ObjectArena, ObjectChain};

/// Draws objects by the draw order of their bin assignment
///
/// Objects with equal draw order keep their insertion order.
#[derive(Debug)]
pub struct FixedBin {
    name: String,
    arena: ObjectArena,
    entries: Vec<(ObjectKey, i32)>,
}

impl FixedBin {
    /// Create an empty bin
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arena: ObjectArena::new(),
            entries: Vec::new(),
        }
    }
}

impl CullBin for FixedBin {
    fn name(&self) -> &str {
        &self.name
    }

    fn bin_type(&self) -> BinType {
        BinType::Fixed
    }

    fn add_object(&mut self, chain: ObjectChain, _gsg: &dyn GraphicsStateGuardian) {
        let draw_order = chain.base.state.draw_order();
        self.entries.push((self.arena.insert_chain(chain), draw_order));
    }

    fn finish_cull(&mut self) {
        self.entries.sort_by_key(|(_, draw_order)| *draw_order);
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
