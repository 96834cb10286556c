//! The bin table
//!
//! Bins are created once from their definitions and reused every frame.
//! Objects are routed by their render state: an explicit bin assignment
//! wins, otherwise alpha-blended states go to the transparent bin and
//! everything else to the opaque bin.

use std::collections::HashSet;

use parking_lot::Mutex;

use super::{make_bin, BinResult, CullBin, CullError, OPAQUE_BIN, TRANSPARENT_BIN};
use crate::config::{BinDefinition, PipelineConfig};
use crate::pgraph::RenderState;

/// Owns the bin definitions and one bin instance per definition
pub struct CullBinManager {
    definitions: Vec<BinDefinition>,
    bins: Vec<Box<dyn CullBin>>,
    sorted: Vec<usize>,
    reported_unknown: Mutex<HashSet<String>>,
}

impl CullBinManager {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            definitions: Vec::new(),
            bins: Vec::new(),
            sorted: Vec::new(),
            reported_unknown: Mutex::new(HashSet::new()),
        }
    }

    /// Table holding the configured bins
    pub fn from_config(config: &PipelineConfig) -> BinResult<Self> {
        let mut manager = Self::new();
        for definition in &config.bins {
            manager.add_bin(definition.clone())?;
        }
        Ok(manager)
    }

    /// Define a new bin; returns its index
    pub fn add_bin(&mut self, definition: BinDefinition) -> BinResult<usize> {
        if self.find_bin(&definition.name).is_some() {
            return Err(CullError::DuplicateBin(definition.name));
        }
        let index = self.bins.len();
        self.bins.push(make_bin(&definition));
        self.definitions.push(definition);
        self.resort();
        Ok(index)
    }

    /// Index of the bin with the given name
    pub fn find_bin(&self, name: &str) -> Option<usize> {
        self.definitions.iter().position(|definition| definition.name == name)
    }

    /// Change a bin's draw priority
    pub fn set_bin_sort(&mut self, name: &str, sort: i32) -> BinResult<()> {
        let index = self.require(name)?;
        self.definitions[index].sort = sort;
        self.resort();
        Ok(())
    }

    /// Enable or disable drawing of a bin
    pub fn set_bin_active(&mut self, name: &str, active: bool) -> BinResult<()> {
        let index = self.require(name)?;
        self.definitions[index].active = active;
        Ok(())
    }

    /// Definition of the bin at `index`
    pub fn definition(&self, index: usize) -> Option<&BinDefinition> {
        self.definitions.get(index)
    }

    /// Bin at `index`
    pub fn bin(&self, index: usize) -> Option<&dyn CullBin> {
        self.bins.get(index).map(|bin| bin.as_ref())
    }

    /// Mutable bin at `index`
    pub fn bin_mut(&mut self, index: usize) -> Option<&mut (dyn CullBin + 'static)> {
        self.bins.get_mut(index).map(|bin| bin.as_mut())
    }

    /// Number of bins
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    /// Whether no bins are defined
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Bin indices in draw order
    ///
    /// Ties in sort priority keep definition order.
    pub fn bins_in_sort_order(&self) -> &[usize] {
        &self.sorted
    }

    /// Bin an object with this state belongs in
    pub fn bin_index_for(&self, state: &RenderState) -> Option<usize> {
        if let Some(name) = state.bin_name() {
            if let Some(index) = self.find_bin(name) {
                return Some(index);
            }
            if self.reported_unknown.lock().insert(name.to_string()) {
                log::warn!("{} requests unknown bin '{}', using default routing", state, name);
            }
        }
        let fallback = if state.is_alpha_blended() { TRANSPARENT_BIN } else { OPAQUE_BIN };
        self.find_bin(fallback).or_else(|| self.sorted.first().copied())
    }

    /// Run `finish_cull` on every bin
    pub fn finish_cull(&mut self) {
        for bin in &mut self.bins {
            bin.finish_cull();
        }
    }

    /// Free the objects of every bin
    pub fn clear_all(&mut self) {
        for bin in &mut self.bins {
            bin.clear();
        }
    }

    /// Objects currently stored across all bins
    pub fn num_objects(&self) -> usize {
        self.bins.iter().map(|bin| bin.len()).sum()
    }

    pub(crate) fn is_active(&self, index: usize) -> bool {
        self.definitions.get(index).is_some_and(|definition| definition.active)
    }

    fn require(&self, name: &str) -> BinResult<usize> {
        self.find_bin(name).ok_or_else(|| CullError::UnknownBin(name.to_string()))
    }

    /// Distinct unknown bin names that have been warned about
    pub fn num_unknown_bins_reported(&self) -> usize {
        self.reported_unknown.lock().len()
    }

    fn resort(&mut self) {
        let mut sorted: Vec<usize> = (0..self.definitions.len()).collect();
        sorted.sort_by_key(|&index| self.definitions[index].sort);
        self.sorted = sorted;
    }
}

impl Default for CullBinManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CullBinManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CullBinManager")
            .field("definitions", &self.definitions)
            .field("sorted", &self.sorted)
            .field("objects", &self.num_objects())
            .finish()
    }
}
