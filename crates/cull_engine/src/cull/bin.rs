use super::{BackToFrontBin, BinType, FixedBin, FrontToBackBin, StateSortedBin, UnsortedBin};
use crate::config::BinDefinition;
use crate::foundation::collections::ObjectKey;
use crate::pgraph::{GraphicsStateGuardian, ObjectArena, ObjectChain};

/// Accumulates one frame's objects and draws them in its own order
///
/// A bin owns every object it was given until [`CullBin::clear`] (or drop)
/// frees them, decal members included.
pub trait CullBin: Send {
    /// Bin name
    fn name(&self) -> &str;

    /// Ordering strategy
    fn bin_type(&self) -> BinType;

    /// Take ownership of an object chain
    ///
    /// `gsg` is only consulted for view distances.
    fn add_object(&mut self, chain: ObjectChain, gsg: &dyn GraphicsStateGuardian);

    /// Put the stored objects in draw order
    fn finish_cull(&mut self) {}

    /// Draw every stored chain in order; returns the number of chains drawn
    fn draw(&self, gsg: &mut dyn GraphicsStateGuardian) -> usize;

    /// Free every stored object
    fn clear(&mut self);

    /// Number of stored chains
    fn len(&self) -> usize;

    /// Whether nothing is stored
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Create an empty bin for a definition
pub fn make_bin(definition: &BinDefinition) -> Box<dyn CullBin> {
    log::debug!("Creating {} cull bin '{}'", definition.bin_type, definition.name);
    let name = definition.name.clone();
    match definition.bin_type {
        BinType::Unsorted => Box::new(UnsortedBin::new(name)),
        BinType::StateSorted => Box::new(StateSortedBin::new(name)),
        BinType::BackToFront => Box::new(BackToFrontBin::new(name)),
        BinType::FrontToBack => Box::new(FrontToBackBin::new(name)),
        BinType::Fixed => Box::new(FixedBin::new(name)),
    }
}

pub(super) fn draw_in_order(
    arena: &ObjectArena,
    keys: impl Iterator<Item = ObjectKey>,
    gsg: &mut dyn GraphicsStateGuardian,
) -> usize {
    let mut drawn = 0;
    for key in keys {
        arena.draw_chain(key, gsg);
        drawn += 1;
    }
    drawn
}
