//! Interned render and transform states
//!
//! States are immutable values handed around as `Arc`s. The
//! [`StateRegistry`] keeps one canonical instance per distinct content, so
//! two states are equal exactly when their ids are equal, and composition
//! results are cached by id pair.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use crate::foundation::collections::IdAllocator;
use crate::foundation::math::{Mat4, Mat4Ext};

/// How a state blends with what is already drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Transparency {
    /// Fully opaque
    #[default]
    None,
    /// Alpha blended; needs back-to-front ordering
    Alpha,
    /// Alpha tested; drawn with opaque geometry
    Binary,
}

/// Explicit bin assignment
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BinAttrib {
    /// Name of the bin in the bin table
    pub bin_name: String,
    /// Sort key within fixed bins
    pub draw_order: i32,
}

/// Attribute content of a render state
///
/// Every attribute is optional: composing a child over a parent keeps the
/// child's value where it has one and inherits the parent's otherwise. The
/// derived ordering puts texture first so sorted draws group by texture.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RenderAttribs {
    /// Bound texture name
    pub texture: Option<String>,
    /// Flat RGBA8 color
    pub color: Option<[u8; 4]>,
    /// Blending mode
    pub transparency: Option<Transparency>,
    /// Depth buffer writes
    pub depth_write: Option<bool>,
    /// Whether children are decals layered onto this node's geometry
    pub decal: Option<bool>,
    /// Explicit bin assignment
    pub bin: Option<BinAttrib>,
}

impl RenderAttribs {
    /// Attributes with only a texture set
    pub fn with_texture(mut self, texture: impl Into<String>) -> Self {
        self.texture = Some(texture.into());
        self
    }

    /// Attributes with a flat color set
    pub fn with_color(mut self, color: [u8; 4]) -> Self {
        self.color = Some(color);
        self
    }

    /// Attributes with a blending mode set
    pub fn with_transparency(mut self, transparency: Transparency) -> Self {
        self.transparency = Some(transparency);
        self
    }

    /// Attributes with the decal effect set
    pub fn with_decal(mut self) -> Self {
        self.decal = Some(true);
        self
    }

    /// Attributes with an explicit bin
    pub fn with_bin(mut self, bin_name: impl Into<String>, draw_order: i32) -> Self {
        self.bin = Some(BinAttrib {
            bin_name: bin_name.into(),
            draw_order,
        });
        self
    }

    /// Child attributes applied over parent attributes
    pub fn composed_over(&self, parent: &Self) -> Self {
        Self {
            texture: self.texture.clone().or_else(|| parent.texture.clone()),
            color: self.color.or(parent.color),
            transparency: self.transparency.or(parent.transparency),
            depth_write: self.depth_write.or(parent.depth_write),
            decal: self.decal.or(parent.decal),
            bin: self.bin.clone().or_else(|| parent.bin.clone()),
        }
    }
}

/// Canonical render state
#[derive(Debug)]
pub struct RenderState {
    id: u64,
    attribs: RenderAttribs,
}

impl RenderState {
    /// Unique id; equal ids mean equal content
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Attribute content
    pub fn attribs(&self) -> &RenderAttribs {
        &self.attribs
    }

    /// Effective blending mode
    pub fn transparency(&self) -> Transparency {
        self.attribs.transparency.unwrap_or_default()
    }

    /// Whether the geometry is alpha blended
    pub fn is_alpha_blended(&self) -> bool {
        self.transparency() == Transparency::Alpha
    }

    /// Whether depth writes are enabled
    pub fn depth_write(&self) -> bool {
        self.attribs.depth_write.unwrap_or(true)
    }

    /// Whether this state carries the decal effect
    pub fn is_decal(&self) -> bool {
        self.attribs.decal.unwrap_or(false)
    }

    /// Explicitly requested bin, if any
    pub fn bin_name(&self) -> Option<&str> {
        self.attribs.bin.as_ref().map(|bin| bin.bin_name.as_str())
    }

    /// Sort key for fixed bins
    pub fn draw_order(&self) -> i32 {
        self.attribs.bin.as_ref().map_or(0, |bin| bin.draw_order)
    }
}

impl PartialEq for RenderState {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RenderState {}

impl PartialOrd for RenderState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RenderState {
    fn cmp(&self, other: &Self) -> Ordering {
        self.attribs.cmp(&other.attribs).then(self.id.cmp(&other.id))
    }
}

impl fmt::Display for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S:{}", self.id)?;
        if let Some(texture) = &self.attribs.texture {
            write!(f, " tex={texture}")?;
        }
        if self.is_alpha_blended() {
            write!(f, " alpha")?;
        }
        if self.is_decal() {
            write!(f, " decal")?;
        }
        if let Some(bin) = &self.attribs.bin {
            write!(f, " bin={}:{}", bin.bin_name, bin.draw_order)?;
        }
        Ok(())
    }
}

/// Canonical transform
#[derive(Debug)]
pub struct TransformState {
    id: u64,
    mat: Mat4,
}

impl TransformState {
    /// Unique id; equal ids mean equal matrices
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// The matrix
    pub const fn mat(&self) -> &Mat4 {
        &self.mat
    }

    /// Whether this is the identity transform
    pub fn is_identity(&self) -> bool {
        self.mat == Mat4::identity()
    }
}

impl PartialEq for TransformState {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TransformState {}

struct Interner<K, V> {
    table: HashMap<K, Arc<V>>,
    compositions: HashMap<(u64, u64), Arc<V>>,
}

impl<K: Hash + Eq, V> Interner<K, V> {
    fn new() -> Self {
        Self {
            table: HashMap::new(),
            compositions: HashMap::new(),
        }
    }

    fn intern(&mut self, key: K, make: impl FnOnce() -> V) -> Arc<V> {
        Arc::clone(self.table.entry(key).or_insert_with(|| Arc::new(make())))
    }

    /// Drop entries nothing outside the registry refers to
    fn collect_garbage(&mut self) -> usize {
        self.compositions.clear();
        let before = self.table.len();
        self.table.retain(|_, value| Arc::strong_count(value) > 1);
        before - self.table.len()
    }
}

/// Registry of canonical render and transform states
pub struct StateRegistry {
    ids: IdAllocator,
    states: Mutex<Interner<RenderAttribs, RenderState>>,
    transforms: Mutex<Interner<[u32; 16], TransformState>>,
}

impl StateRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            ids: IdAllocator::new(),
            states: Mutex::new(Interner::new()),
            transforms: Mutex::new(Interner::new()),
        }
    }

    /// Canonical state for the given attributes
    pub fn state(&self, attribs: RenderAttribs) -> Arc<RenderState> {
        let mut states = self.states.lock();
        states.intern(attribs.clone(), || RenderState {
            id: self.ids.allocate(),
            attribs,
        })
    }

    /// State with no attributes set
    pub fn empty_state(&self) -> Arc<RenderState> {
        self.state(RenderAttribs::default())
    }

    /// Canonical transform for the given matrix
    pub fn transform(&self, mat: Mat4) -> Arc<TransformState> {
        let mut transforms = self.transforms.lock();
        transforms.intern(mat.to_bits(), || TransformState {
            id: self.ids.allocate(),
            mat,
        })
    }

    /// Identity transform
    pub fn identity_transform(&self) -> Arc<TransformState> {
        self.transform(Mat4::identity())
    }

    /// `child` applied over `parent`
    pub fn compose_states(&self, parent: &Arc<RenderState>, child: &Arc<RenderState>) -> Arc<RenderState> {
        let key = (parent.id, child.id);
        if let Some(cached) = self.states.lock().compositions.get(&key) {
            return Arc::clone(cached);
        }
        let composed = self.state(child.attribs.composed_over(&parent.attribs));
        self.states.lock().compositions.insert(key, Arc::clone(&composed));
        composed
    }

    /// `parent * child`
    pub fn compose_transforms(
        &self,
        parent: &Arc<TransformState>,
        child: &Arc<TransformState>,
    ) -> Arc<TransformState> {
        if child.is_identity() {
            return Arc::clone(parent);
        }
        if parent.is_identity() {
            return Arc::clone(child);
        }
        let key = (parent.id, child.id);
        if let Some(cached) = self.transforms.lock().compositions.get(&key) {
            return Arc::clone(cached);
        }
        let composed = self.transform(parent.mat * child.mat);
        self.transforms.lock().compositions.insert(key, Arc::clone(&composed));
        composed
    }

    /// Number of live canonical states
    pub fn num_states(&self) -> usize {
        self.states.lock().table.len()
    }

    /// Number of live canonical transforms
    pub fn num_transforms(&self) -> usize {
        self.transforms.lock().table.len()
    }

    /// Forget states and transforms no longer referenced elsewhere
    pub fn collect_garbage(&self) -> usize {
        let freed = self.states.lock().collect_garbage() + self.transforms.lock().collect_garbage();
        if freed > 0 {
            log::debug!("state registry freed {} unreferenced entries", freed);
        }
        freed
    }
}

impl Default for StateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateRegistry")
            .field("states", &self.num_states())
            .field("transforms", &self.num_transforms())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;

    #[test]
    fn test_equal_content_interns_to_same_state() {
        let registry = StateRegistry::new();
        let a = registry.state(RenderAttribs::default().with_texture("brick"));
        let b = registry.state(RenderAttribs::default().with_texture("brick"));
        let c = registry.state(RenderAttribs::default().with_texture("grass"));
        assert!(Arc::ptr_eq(&a, &b));
        assert_ne!(a.id(), c.id());
    }

    #[test]
    fn test_compose_child_overrides_parent() {
        let registry = StateRegistry::new();
        let parent = registry.state(
            RenderAttribs::default()
                .with_texture("brick")
                .with_transparency(Transparency::Alpha),
        );
        let child = registry.state(RenderAttribs::default().with_texture("grass"));

        let composed = registry.compose_states(&parent, &child);
        assert_eq!(composed.attribs().texture.as_deref(), Some("grass"));
        assert!(composed.is_alpha_blended());
        assert!(Arc::ptr_eq(&composed, &registry.compose_states(&parent, &child)));
    }

    #[test]
    fn test_transform_compose_and_identity() {
        let registry = StateRegistry::new();
        let identity = registry.identity_transform();
        let shift = registry.transform(Mat4::new_translation(&Vec3::new(1.0, 0.0, 0.0)));
        assert!(Arc::ptr_eq(&registry.compose_transforms(&identity, &shift), &shift));

        let twice = registry.compose_transforms(&shift, &shift);
        assert_eq!(twice.mat()[(0, 3)], 2.0);
        assert!(Arc::ptr_eq(
            &twice,
            &registry.transform(Mat4::new_translation(&Vec3::new(2.0, 0.0, 0.0)))
        ));
    }

    #[test]
    fn test_state_ordering_groups_by_texture() {
        let registry = StateRegistry::new();
        let b = registry.state(RenderAttribs::default().with_texture("b"));
        let a = registry.state(RenderAttribs::default().with_texture("a").with_color([1, 2, 3, 4]));
        let mut states = vec![Arc::clone(&b), Arc::clone(&a)];
        states.sort();
        assert_eq!(states[0].id(), a.id());
    }

    #[test]
    fn test_garbage_collection_keeps_referenced_states() {
        let registry = StateRegistry::new();
        let kept = registry.state(RenderAttribs::default().with_texture("kept"));
        drop(registry.state(RenderAttribs::default().with_texture("dropped")));
        assert_eq!(registry.num_states(), 2);
        assert_eq!(registry.collect_garbage(), 1);
        assert_eq!(registry.num_states(), 1);
        assert!(Arc::ptr_eq(&kept, &registry.state(RenderAttribs::default().with_texture("kept"))));
    }
}
