use super::bin::draw_in_order;
use super::{BinType, CullBin};
use crate::foundation::collections::ObjectKey;
use crate::pgraph::{GraphicsStateGuardian, ObjectArena, ObjectChain};

/// Draws objects in the order they were added
#[derive(Debug)]
pub struct UnsortedBin {
    name: String,
    arena: ObjectArena,
    objects: Vec<ObjectKey>,
}

impl UnsortedBin {
    /// Create an empty bin
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arena: ObjectArena::new(),
            objects: Vec::new(),
        }
    }
}

impl CullBin for UnsortedBin {
    fn name(&self) -> &str {
        &self.name
    }

    fn bin_type(&self) -> BinType {
        BinType::Unsorted
    }

    fn add_object(&mut self, chain: ObjectChain, _gsg: &dyn GraphicsStateGuardian) {
        self.objects.push(self.arena.insert_chain(chain));
    }

    fn draw(&self, gsg: &mut dyn GraphicsStateGuardian) -> usize {
        draw_in_order(&self.arena, self.objects.iter().copied(), gsg)
    }

    fn clear(&mut self) {
        self.objects.clear();
        self.arena.clear();
    }

    fn len(&self) -> usize {
        self.objects.len()
    }
}
