//! Cull-time objects and interfaces
//!
//! Interned render/transform states, the [`CullableObject`] atom with its
//! decal chains, the [`CullHandler`] sink and the backend interface.

mod cull_handler;
mod cullable_object;
mod gsg;
mod render_state;

pub use cull_handler::{CullHandler, DrawCullHandler};
pub use cullable_object::{ChainIter, CullableObject, ObjectArena, ObjectChain};
pub use gsg::{DrawCall, DrawEvent, GraphicsStateGuardian, RecordingGsg};
pub use render_state::{BinAttrib, RenderAttribs, RenderState, StateRegistry, Transparency, TransformState};
