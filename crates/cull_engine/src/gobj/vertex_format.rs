//! Vertex format definitions and the format registry
//!
//! A [`VertexFormat`] describes one interleaved array of per-vertex
//! attributes. Formats are interned by the [`FormatRegistry`]: registering
//! the same column layout twice yields the same `Arc`, so formats can be
//! compared and hashed by id.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::{Contents, NumericType};
use crate::foundation::collections::IdAllocator;

/// Column name for positions
pub const VERTEX: &str = "vertex";
/// Column name for normals
pub const NORMAL: &str = "normal";
/// Column name for colors
pub const COLOR: &str = "color";
/// Column name for texture coordinates
pub const TEXCOORD: &str = "texcoord";
/// Column name for vertex indices
pub const INDEX: &str = "index";

/// Layout of a single attribute column within a row
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexColumn {
    name: String,
    num_components: usize,
    numeric_type: NumericType,
    contents: Contents,
    start: usize,
}

impl VertexColumn {
    /// Attribute name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Components per vertex
    pub const fn num_components(&self) -> usize {
        self.num_components
    }

    /// Storage type of each component
    pub const fn numeric_type(&self) -> NumericType {
        self.numeric_type
    }

    /// Semantic tag
    pub const fn contents(&self) -> Contents {
        self.contents
    }

    /// Byte offset within the row
    pub const fn start(&self) -> usize {
        self.start
    }

    /// Bytes occupied by this column in each row
    pub const fn total_bytes(&self) -> usize {
        self.num_components * self.numeric_type.size_bytes()
    }
}

/// Content key used to intern formats
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FormatSpec {
    columns: Vec<(String, usize, NumericType, Contents)>,
}

impl FormatSpec {
    /// Start an empty layout
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column; columns are packed in the order they are added
    pub fn column(
        mut self,
        name: impl Into<String>,
        num_components: usize,
        numeric_type: NumericType,
        contents: Contents,
    ) -> Self {
        self.columns.push((name.into(), num_components, numeric_type, contents));
        self
    }
}

/// Immutable, interned description of a vertex row layout
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct VertexFormat {
    id: u64,
    columns: Vec<VertexColumn>,
    stride: usize,
}

impl VertexFormat {
    fn from_spec(id: u64, spec: &FormatSpec) -> Self {
        let mut start = 0;
        let columns = spec
            .columns
            .iter()
            .map(|(name, num_components, numeric_type, contents)| {
                let column = VertexColumn {
                    name: name.clone(),
                    num_components: *num_components,
                    numeric_type: *numeric_type,
                    contents: *contents,
                    start,
                };
                start += column.total_bytes();
                column
            })
            .collect();

        Self {
            id,
            columns,
            stride: start,
        }
    }

    /// Registry id; equal ids mean the same format
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Bytes per row
    pub const fn stride(&self) -> usize {
        self.stride
    }

    /// All columns in row order
    pub fn columns(&self) -> &[VertexColumn] {
        &self.columns
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Option<&VertexColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Whether a column with the given name exists
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }
}

impl fmt::Display for VertexFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "format#{}[", self.id)?;
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}({}x{:?})", column.name, column.num_components, column.numeric_type)?;
        }
        write!(f, "] stride {}", self.stride)
    }
}

/// Interning registry for vertex formats
///
/// Also caches the single-column index formats used for index buffers.
#[derive(Debug, Default)]
pub struct FormatRegistry {
    ids: IdAllocator,
    formats: Mutex<HashMap<FormatSpec, Arc<VertexFormat>>>,
}

impl FormatRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the canonical format for the given layout
    pub fn register(&self, spec: FormatSpec) -> Arc<VertexFormat> {
        let mut formats = self.formats.lock();
        if let Some(existing) = formats.get(&spec) {
            return Arc::clone(existing);
        }

        let format = Arc::new(VertexFormat::from_spec(self.ids.allocate(), &spec));
        log::debug!("Registered vertex {}", format);
        formats.insert(spec, Arc::clone(&format));
        format
    }

    /// Number of distinct formats registered
    pub fn len(&self) -> usize {
        self.formats.lock().len()
    }

    /// Whether no formats were registered yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position only
    pub fn v3(&self) -> Arc<VertexFormat> {
        self.register(FormatSpec::new().column(VERTEX, 3, NumericType::F32, Contents::Point))
    }

    /// Position plus RGBA color
    pub fn v3c4(&self) -> Arc<VertexFormat> {
        self.register(
            FormatSpec::new()
                .column(VERTEX, 3, NumericType::F32, Contents::Point)
                .column(COLOR, 4, NumericType::U8, Contents::Color),
        )
    }

    /// Position, normal and one texture coordinate set
    pub fn v3n3t2(&self) -> Arc<VertexFormat> {
        self.register(
            FormatSpec::new()
                .column(VERTEX, 3, NumericType::F32, Contents::Point)
                .column(NORMAL, 3, NumericType::F32, Contents::Normal)
                .column(TEXCOORD, 2, NumericType::F32, Contents::TexCoord),
        )
    }

    /// Cached single-column index format of the given type
    pub fn index_format(&self, index_type: NumericType) -> Arc<VertexFormat> {
        self.register(FormatSpec::new().column(INDEX, 1, index_type, Contents::Index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_interns_by_content() {
        let registry = FormatRegistry::new();
        let a = registry.v3c4();
        let b = registry.v3c4();
        assert!(Arc::ptr_eq(&a, &b));
        assert_ne!(a.id(), registry.v3().id());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_columns_are_packed() {
        let registry = FormatRegistry::new();
        let format = registry.v3n3t2();
        assert_eq!(format.stride(), 32);
        assert_eq!(format.column(NORMAL).map(VertexColumn::start), Some(12));
        assert_eq!(format.column(TEXCOORD).map(VertexColumn::start), Some(24));
        assert!(!format.has_column(COLOR));
    }

    #[test]
    fn test_index_format_is_cached() {
        let registry = FormatRegistry::new();
        let a = registry.index_format(NumericType::U16);
        let b = registry.index_format(NumericType::U16);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.stride(), 2);
    }
}
