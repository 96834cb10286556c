//! Per-process pipeline context
//!
//! A [`RenderContext`] is built once at startup and passed by reference to
//! everything that would otherwise reach for process-wide caches: the vertex
//! format interner, the index format used by dynamic meshes, the render and
//! transform state interners and the phase profiler.

use std::sync::Arc;

use crate::config::{ConfigError, PipelineConfig};
use crate::foundation::profiling::PhaseProfiler;
use crate::gobj::{
    FormatRegistry, GeomPrimitive, NumericType, PrimitiveSettings, PrimitiveTopology, ShadeModel, UsageHint,
    VertexFormat,
};
use crate::pgraph::StateRegistry;

/// Shared registries and settings for one pipeline
#[derive(Debug)]
pub struct RenderContext {
    config: PipelineConfig,
    formats: FormatRegistry,
    index_format: Arc<VertexFormat>,
    states: StateRegistry,
    profiler: PhaseProfiler,
}

impl RenderContext {
    /// Build a context from a validated configuration
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        log::info!(
            "Initializing render context ({} stages, {} bins, {} byte vertex buffers)",
            config.pipeline_stages,
            config.bins.len(),
            config.vertex_buffer_bytes
        );

        let formats = FormatRegistry::new();
        let index_format = formats.index_format(config.default_index_type);
        Ok(Self {
            config,
            formats,
            index_format,
            states: StateRegistry::new(),
            profiler: PhaseProfiler::new(),
        })
    }

    /// Configuration the context was built from
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Vertex format interner
    pub const fn formats(&self) -> &FormatRegistry {
        &self.formats
    }

    /// Index column format used by dynamic meshes
    pub fn index_format(&self) -> &Arc<VertexFormat> {
        &self.index_format
    }

    /// Index type new primitives start with
    pub const fn index_type(&self) -> NumericType {
        self.config.default_index_type
    }

    /// Render and transform state interner
    pub const fn states(&self) -> &StateRegistry {
        &self.states
    }

    /// Phase collectors
    pub const fn profiler(&self) -> &PhaseProfiler {
        &self.profiler
    }

    /// Pipeline depth of every cycler created through this context
    pub const fn num_stages(&self) -> usize {
        self.config.pipeline_stages
    }

    /// Primitive settings matching this context
    pub const fn primitive_settings(&self, usage_hint: UsageHint) -> PrimitiveSettings {
        PrimitiveSettings {
            usage_hint,
            index_type: self.config.default_index_type,
            shade_model: ShadeModel::Smooth,
            num_stages: self.config.pipeline_stages,
        }
    }

    /// Empty primitive created with [`Self::primitive_settings`]
    pub fn new_primitive(&self, topology: PrimitiveTopology, usage_hint: UsageHint) -> GeomPrimitive {
        GeomPrimitive::with_settings(topology, self.primitive_settings(usage_hint))
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        let config = PipelineConfig::default();
        let formats = FormatRegistry::new();
        let index_format = formats.index_format(config.default_index_type);
        Self {
            config,
            formats,
            index_format,
            states: StateRegistry::new(),
            profiler: PhaseProfiler::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_config() {
        let config = PipelineConfig::default().with_vertex_buffer_bytes(0);
        assert!(matches!(RenderContext::new(config), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_primitives_follow_pipeline_depth() {
        let ctx = RenderContext::new(PipelineConfig::default().with_pipeline_stages(3)).unwrap();
        let primitive = ctx.new_primitive(PrimitiveTopology::Triangles, UsageHint::Stream);
        assert_eq!(primitive.num_stages(), 3);
        assert_eq!(primitive.usage_hint(), UsageHint::Stream);
    }

    #[test]
    fn test_index_format_is_interned() {
        let ctx = RenderContext::default();
        let again = ctx.formats().index_format(NumericType::U16);
        assert!(Arc::ptr_eq(ctx.index_format(), &again));
    }
}
