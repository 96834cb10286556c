//! The atom of cull: geometry plus the state and transform to draw it with
//!
//! Objects layered as decals travel together as an [`ObjectChain`]. Once a
//! chain is stored in an [`ObjectArena`] its members are linked through
//! `next` keys, and the arena that received the chain owns every member.

use std::fmt;
use std::sync::Arc;

use super::{GraphicsStateGuardian, RenderState, TransformState};
use crate::foundation::collections::{ObjectKey, SlotMap};
use crate::gobj::{BoundingVolume, Geom};

/// Geometry with the state and view transform to draw it with
#[derive(Debug, Clone)]
pub struct CullableObject {
    /// Geometry to draw
    pub geom: Arc<Geom>,
    /// Net render state
    pub state: Arc<RenderState>,
    /// Model-to-view transform
    pub transform: Arc<TransformState>,
    /// Next member of a decal chain inside an arena
    pub next: Option<ObjectKey>,
}

impl CullableObject {
    /// A standalone object
    pub fn new(geom: Arc<Geom>, state: Arc<RenderState>, transform: Arc<TransformState>) -> Self {
        Self {
            geom,
            state,
            transform,
            next: None,
        }
    }

    /// Bounds of the geometry in view space
    pub fn view_bounds(&self) -> BoundingVolume {
        self.geom.bounds().transformed(self.transform.mat())
    }
}

impl fmt::Display for CullableObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} T:{}", self.geom, self.state, self.transform.id())
    }
}

/// A base object and the decals layered onto it
#[derive(Debug, Clone)]
pub struct ObjectChain {
    /// Object drawn first and again after its decals
    pub base: CullableObject,
    /// Objects drawn on top of the base, in order
    pub decals: Vec<CullableObject>,
}

impl ObjectChain {
    /// Chain without decals
    pub fn single(base: CullableObject) -> Self {
        Self {
            base,
            decals: Vec::new(),
        }
    }

    /// Chain with decals
    pub fn with_decals(base: CullableObject, decals: Vec<CullableObject>) -> Self {
        Self { base, decals }
    }

    /// Number of objects in the chain
    pub fn len(&self) -> usize {
        1 + self.decals.len()
    }

    /// Always false; a chain has at least its base
    pub const fn is_empty(&self) -> bool {
        false
    }
}

impl From<CullableObject> for ObjectChain {
    fn from(base: CullableObject) -> Self {
        Self::single(base)
    }
}

/// Storage for the objects a bin holds for one frame
#[derive(Debug, Default)]
pub struct ObjectArena {
    objects: SlotMap<ObjectKey, CullableObject>,
}

impl ObjectArena {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a chain and return the key of its base
    pub fn insert_chain(&mut self, chain: ObjectChain) -> ObjectKey {
        let mut next = None;
        for mut decal in chain.decals.into_iter().rev() {
            decal.next = next;
            next = Some(self.objects.insert(decal));
        }
        let mut base = chain.base;
        base.next = next;
        self.objects.insert(base)
    }

    /// Look up one object
    pub fn get(&self, key: ObjectKey) -> Option<&CullableObject> {
        self.objects.get(key)
    }

    /// Iterate over a chain starting at `head`
    pub fn chain(&self, head: ObjectKey) -> ChainIter<'_> {
        ChainIter {
            arena: self,
            next: Some(head),
        }
    }

    /// Remove a chain; returns how many objects were freed
    pub fn remove_chain(&mut self, head: ObjectKey) -> usize {
        let mut freed = 0;
        let mut next = Some(head);
        while let Some(key) = next {
            next = self.objects.remove(key).and_then(|object| object.next);
            freed += 1;
        }
        freed
    }

    /// Number of stored objects, decals included
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the arena holds nothing
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Free every object
    pub fn clear(&mut self) {
        self.objects.clear();
    }

    /// Draw the chain at `head`
    ///
    /// A chain with decals is drawn base first, then each decal, then the
    /// base again to restore depth, bracketed by the backend decal hooks.
    pub fn draw_chain(&self, head: ObjectKey, gsg: &mut dyn GraphicsStateGuardian) {
        let Some(base) = self.get(head) else {
            return;
        };
        if base.next.is_none() {
            gsg.draw_geom(base);
            return;
        }
        gsg.begin_decal_base_first(base);
        gsg.draw_geom(base);
        gsg.begin_decal_nested();
        for decal in self.chain(head).skip(1) {
            gsg.draw_geom(decal);
        }
        gsg.begin_decal_base_second(base);
        gsg.draw_geom(base);
        gsg.finish_decal();
    }
}

/// Iterator over the members of a decal chain
pub struct ChainIter<'a> {
    arena: &'a ObjectArena,
    next: Option<ObjectKey>,
}

impl<'a> Iterator for ChainIter<'a> {
    type Item = &'a CullableObject;

    fn next(&mut self) -> Option<Self::Item> {
        let object = self.arena.get(self.next?)?;
        self.next = object.next;
        Some(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pgraph::{DrawEvent, RecordingGsg, RenderAttribs, StateRegistry};
    use crate::gobj::{FormatRegistry, UsageHint, VertexData};

    fn object(states: &StateRegistry, texture: &str) -> CullableObject {
        let registry = FormatRegistry::new();
        let geom = Arc::new(Geom::new(Arc::new(VertexData::new("empty", registry.v3(), UsageHint::Static))));
        CullableObject::new(
            geom,
            states.state(RenderAttribs::default().with_texture(texture)),
            states.identity_transform(),
        )
    }

    #[test]
    fn test_chain_links_in_order() {
        let states = StateRegistry::new();
        let mut arena = ObjectArena::new();
        let head = arena.insert_chain(ObjectChain::with_decals(
            object(&states, "base"),
            vec![object(&states, "d1"), object(&states, "d2")],
        ));

        let textures: Vec<_> = arena
            .chain(head)
            .map(|o| o.state.attribs().texture.clone().unwrap_or_default())
            .collect();
        assert_eq!(textures, vec!["base", "d1", "d2"]);
        assert_eq!(arena.len(), 3);
    }

    #[test]
    fn test_remove_chain_frees_every_member() {
        let states = StateRegistry::new();
        let mut arena = ObjectArena::new();
        let head = arena.insert_chain(ObjectChain::with_decals(object(&states, "base"), vec![object(&states, "d")]));
        arena.insert_chain(object(&states, "other").into());

        assert_eq!(arena.remove_chain(head), 2);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_decal_draw_sequence() {
        let states = StateRegistry::new();
        let mut arena = ObjectArena::new();
        let base = object(&states, "base");
        let decal = object(&states, "decal");
        let (base_state, decal_state) = (base.state.id(), decal.state.id());
        let head = arena.insert_chain(ObjectChain::with_decals(base, vec![decal]));

        let mut gsg = RecordingGsg::new();
        arena.draw_chain(head, &mut gsg);

        let drawn: Vec<_> = gsg
            .events()
            .iter()
            .map(|event| match event {
                DrawEvent::Draw(call) => format!("draw {}", call.state_id),
                other => format!("{other:?}"),
            })
            .collect();
        assert_eq!(
            drawn,
            vec![
                "DecalBaseFirst".to_string(),
                format!("draw {base_state}"),
                "DecalNested".to_string(),
                format!("draw {decal_state}"),
                "DecalBaseSecond".to_string(),
                format!("draw {base_state}"),
                "FinishDecal".to_string(),
            ]
        );
    }
}
