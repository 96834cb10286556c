//! # Pipeline Configuration
//!
//! Tunables for the cull/draw pipeline and the dynamic batching allocator.
//!
//! ## Defaults
//!
//! - 1.5 MiB of vertex storage per dynamic vertex format
//! - two pipeline stages (app/cull writer and draw reader)
//! - the classic five-bin table: background, opaque, transparent, fixed, unsorted

use serde::{Serialize, Deserialize};
use std::collections::HashSet;

use super::{Config, ConfigError};
use crate::cull::BinType;
use crate::gobj::NumericType;

/// Byte budget for one dynamic vertex buffer (1024 + 512 KiB)
pub const DEFAULT_VERTEX_BUFFER_BYTES: usize = (1024 + 512) * 1024;

/// Upper bound on the number of pipeline stages a cycler may carry
pub const MAX_PIPELINE_STAGES: usize = 4;

/// One entry of the cull bin table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinDefinition {
    /// Name used by render states to request this bin
    pub name: String,
    /// Sorting strategy of the bin
    pub bin_type: BinType,
    /// Draw order among bins; lower draws first
    pub sort: i32,
    /// Inactive bins still accept objects but are skipped at draw time
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

impl BinDefinition {
    /// Create an active bin definition
    pub fn new(name: impl Into<String>, bin_type: BinType, sort: i32) -> Self {
        Self {
            name: name.into(),
            bin_type,
            sort,
            active: true,
        }
    }
}

/// Configuration for the whole cull/draw pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Byte budget of each dynamic vertex buffer; rows = budget / stride
    pub vertex_buffer_bytes: usize,
    /// Number of pipeline stages kept by every cycler
    pub pipeline_stages: usize,
    /// Index type new primitives start with
    pub default_index_type: NumericType,
    /// Cull bin table
    pub bins: Vec<BinDefinition>,
}

impl PipelineConfig {
    /// Set the dynamic vertex buffer budget
    pub fn with_vertex_buffer_bytes(mut self, bytes: usize) -> Self {
        self.vertex_buffer_bytes = bytes;
        self
    }

    /// Set the number of pipeline stages
    pub fn with_pipeline_stages(mut self, stages: usize) -> Self {
        self.pipeline_stages = stages;
        self
    }

    /// Replace the bin table
    pub fn with_bins(mut self, bins: Vec<BinDefinition>) -> Self {
        self.bins = bins;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vertex_buffer_bytes == 0 {
            return Err(ConfigError::Invalid("vertex buffer budget cannot be zero".to_string()));
        }

        if self.pipeline_stages == 0 || self.pipeline_stages > MAX_PIPELINE_STAGES {
            return Err(ConfigError::Invalid(format!(
                "pipeline stages must be between 1 and {}, got {}",
                MAX_PIPELINE_STAGES, self.pipeline_stages
            )));
        }

        if !self.default_index_type.is_index_type() {
            return Err(ConfigError::Invalid(format!(
                "{:?} cannot be used as an index type",
                self.default_index_type
            )));
        }

        if self.bins.is_empty() {
            return Err(ConfigError::Invalid("at least one cull bin is required".to_string()));
        }

        let mut seen = HashSet::new();
        for bin in &self.bins {
            if !seen.insert(bin.name.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate cull bin '{}'", bin.name)));
            }
        }

        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            vertex_buffer_bytes: DEFAULT_VERTEX_BUFFER_BYTES,
            pipeline_stages: 2,
            default_index_type: NumericType::U16,
            bins: vec![
                BinDefinition::new("background", BinType::Fixed, 10),
                BinDefinition::new("opaque", BinType::StateSorted, 20),
                BinDefinition::new("transparent", BinType::BackToFront, 30),
                BinDefinition::new("fixed", BinType::Fixed, 40),
                BinDefinition::new("unsorted", BinType::Unsorted, 50),
            ],
        }
    }
}

impl Config for PipelineConfig {}
