//! Cull bins and per-frame result routing
//!
//! A [`CullBin`] accumulates the objects found visible during one cull
//! traversal and decides the order they are drawn in. The
//! [`CullBinManager`] owns the bin table; a [`CullResult`] routes one
//! frame's objects into it and drives the draw pass.
//!
//! Every bin follows the same cycle: `add_object` during cull,
//! `finish_cull` once traversal is done, `draw`, then `clear` before the
//! next frame's first object arrives.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

mod back_to_front;
mod bin;
mod cull_result;
mod fixed;
mod front_to_back;
mod manager;
mod state_sorted;
mod unsorted;

pub use back_to_front::BackToFrontBin;
pub use bin::{make_bin, CullBin};
pub use cull_result::{CullResult, DrawSummary};
pub use fixed::FixedBin;
pub use front_to_back::FrontToBackBin;
pub use manager::CullBinManager;
pub use state_sorted::StateSortedBin;
pub use unsorted::UnsortedBin;

/// Name of the bin alpha-blended objects go to by default
pub const TRANSPARENT_BIN: &str = "transparent";

/// Name of the bin everything else goes to by default
pub const OPAQUE_BIN: &str = "opaque";

/// Ordering strategy of a bin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinType {
    /// Insertion order
    Unsorted,
    /// Grouped by render state
    StateSorted,
    /// Farthest first
    BackToFront,
    /// Nearest first
    FrontToBack,
    /// By the state's explicit draw order
    Fixed,
}

impl fmt::Display for BinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unsorted => "unsorted",
            Self::StateSorted => "state_sorted",
            Self::BackToFront => "back_to_front",
            Self::FrontToBack => "front_to_back",
            Self::Fixed => "fixed",
        };
        f.write_str(name)
    }
}

/// Bin table errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CullError {
    /// No bin with this name
    #[error("Unknown cull bin '{0}'")]
    UnknownBin(String),

    /// A bin with this name already exists
    #[error("Cull bin '{0}' is already defined")]
    DuplicateBin(String),
}

/// Result type for bin table operations
pub type BinResult<T> = Result<T, CullError>;
