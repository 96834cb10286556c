//! Minimal scene graph and the cull traversal over it
//!
//! Nodes are immutable once shared. The traversal composes transforms and
//! states on the way down, tests bounds against the view frustum, lets
//! nodes take over their own subtree through a cull callback and records
//! everything visible into a [`CullHandler`](crate::pgraph::CullHandler).

mod frustum;
mod node;
mod traverser;

pub use frustum::{Intersection, Plane, ViewFrustum};
pub use node::{GeomNode, GroupNode, SceneNode};
pub use traverser::{CullTraverser, CullTraverserData, TraversalStats};
