//! Vertex row storage and cursors
//!
//! [`VertexData`] owns the interleaved rows for one [`VertexFormat`].
//! [`VertexWriter`] and [`VertexReader`] are column cursors that advance one
//! row per call, the way geometry producers fill and inspect vertex tables.

use std::sync::Arc;

use super::{Contents, GeomError, GeomResult, NumericType, UsageHint, VertexColumn, VertexFormat};
use crate::foundation::math::Point3;

/// Interleaved vertex rows of a single format
#[derive(Debug, Clone)]
pub struct VertexData {
    name: String,
    format: Arc<VertexFormat>,
    usage_hint: UsageHint,
    num_rows: usize,
    bytes: Vec<u8>,
    modified: u64,
}

impl VertexData {
    /// Create an empty table
    pub fn new(name: impl Into<String>, format: Arc<VertexFormat>, usage_hint: UsageHint) -> Self {
        Self {
            name: name.into(),
            format,
            usage_hint,
            num_rows: 0,
            bytes: Vec::new(),
            modified: 0,
        }
    }

    /// Debug name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Row layout
    pub fn format(&self) -> &Arc<VertexFormat> {
        &self.format
    }

    /// Usage hint given at construction
    pub const fn usage_hint(&self) -> UsageHint {
        self.usage_hint
    }

    /// Number of rows
    pub const fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Modification counter, bumped by every write
    pub const fn modified(&self) -> u64 {
        self.modified
    }

    /// Total bytes of row storage
    pub fn data_size_bytes(&self) -> usize {
        self.bytes.len()
    }

    /// Resize the table; new rows are zeroed
    pub fn set_num_rows(&mut self, num_rows: usize) {
        self.bytes.resize(num_rows * self.format.stride(), 0);
        self.num_rows = num_rows;
        self.touch();
    }

    /// Resize the table without promising anything about new row contents
    ///
    /// Used for fixed-capacity tables that are overwritten before drawing.
    pub fn unclean_set_num_rows(&mut self, num_rows: usize) {
        let needed = num_rows * self.format.stride();
        if self.bytes.len() < needed {
            self.bytes.reserve_exact(needed - self.bytes.len());
        }
        self.bytes.resize(needed, 0);
        self.num_rows = num_rows;
        self.touch();
    }

    /// Raw bytes of one row
    pub fn row_bytes(&self, row: usize) -> GeomResult<&[u8]> {
        if row >= self.num_rows {
            return Err(GeomError::RowOutOfRange { row, limit: self.num_rows });
        }
        let stride = self.format.stride();
        Ok(&self.bytes[row * stride..(row + 1) * stride])
    }

    /// Copy one row from `source` into `dest_row`, growing this table if needed
    pub fn copy_row_from(&mut self, dest_row: usize, source: &VertexData, source_row: usize) -> GeomResult<()> {
        if self.format.id() != source.format.id() {
            return Err(GeomError::FormatMismatch {
                source_format: source.format.id(),
                dest_format: self.format.id(),
            });
        }
        let row = source.row_bytes(source_row)?;
        if dest_row >= self.num_rows {
            self.set_num_rows(dest_row + 1);
        }
        let stride = self.format.stride();
        self.bytes[dest_row * stride..(dest_row + 1) * stride].copy_from_slice(row);
        self.touch();
        Ok(())
    }

    /// Growable writer for a column, starting at row 0
    pub fn writer(&mut self, column: &str) -> GeomResult<VertexWriter<'_>> {
        let column = self.lookup(column)?;
        Ok(VertexWriter {
            data: self,
            column,
            row: 0,
            start: 0,
            limit: None,
        })
    }

    /// Writer restricted to the rows `start..end`
    pub fn writer_in_range(&mut self, column: &str, start: usize, end: usize) -> GeomResult<VertexWriter<'_>> {
        let column = self.lookup(column)?;
        if end > self.num_rows {
            return Err(GeomError::RowOutOfRange { row: end, limit: self.num_rows });
        }
        Ok(VertexWriter {
            data: self,
            column,
            row: start,
            start,
            limit: Some(end),
        })
    }

    /// Reader for a column, starting at row 0
    pub fn reader(&self, column: &str) -> GeomResult<VertexReader<'_>> {
        let column = self.lookup(column)?;
        Ok(VertexReader {
            data: self,
            column,
            row: 0,
        })
    }

    fn lookup(&self, column: &str) -> GeomResult<VertexColumn> {
        self.format
            .column(column)
            .cloned()
            .ok_or_else(|| GeomError::UnknownColumn(column.to_string()))
    }

    fn touch(&mut self) {
        self.modified += 1;
    }

    fn component_offset(&self, column: &VertexColumn, row: usize, component: usize) -> usize {
        row * self.format.stride() + column.start() + component * column.numeric_type().size_bytes()
    }

    fn write_component(&mut self, column: &VertexColumn, row: usize, component: usize, value: f32) {
        let offset = self.component_offset(column, row, component);
        let bytes = &mut self.bytes[offset..offset + column.numeric_type().size_bytes()];
        match (column.numeric_type(), column.contents()) {
            (NumericType::F32, _) => bytes.copy_from_slice(bytemuck::bytes_of(&value)),
            (NumericType::U8, Contents::Color) => bytes[0] = (value.clamp(0.0, 1.0) * 255.0).round() as u8,
            (NumericType::U8, _) => bytes[0] = value as u8,
            (NumericType::U16, _) => bytes.copy_from_slice(bytemuck::bytes_of(&(value as u16))),
            (NumericType::U32, _) => bytes.copy_from_slice(bytemuck::bytes_of(&(value as u32))),
        }
    }

    fn read_component(&self, column: &VertexColumn, row: usize, component: usize) -> f32 {
        let offset = self.component_offset(column, row, component);
        let bytes = &self.bytes[offset..offset + column.numeric_type().size_bytes()];
        match (column.numeric_type(), column.contents()) {
            (NumericType::F32, _) => bytemuck::pod_read_unaligned::<f32>(bytes),
            (NumericType::U8, Contents::Color) => f32::from(bytes[0]) / 255.0,
            (NumericType::U8, _) => f32::from(bytes[0]),
            (NumericType::U16, _) => f32::from(bytemuck::pod_read_unaligned::<u16>(bytes)),
            (NumericType::U32, _) => bytemuck::pod_read_unaligned::<u32>(bytes) as f32,
        }
    }
}

/// Column cursor that writes one row per `add_*` call
#[derive(Debug)]
pub struct VertexWriter<'a> {
    data: &'a mut VertexData,
    column: VertexColumn,
    row: usize,
    start: usize,
    limit: Option<usize>,
}

impl VertexWriter<'_> {
    /// Row the next `add_*` call writes
    pub const fn row(&self) -> usize {
        self.row
    }

    /// Number of rows written since the writer was created or repositioned
    pub const fn rows_written(&self) -> usize {
        self.row - self.start
    }

    /// Reposition the cursor
    pub fn set_row(&mut self, row: usize) {
        self.row = row;
        self.start = row;
    }

    /// Whether the cursor reached the end of its writable range
    pub fn is_at_end(&self) -> bool {
        self.limit.is_some_and(|limit| self.row >= limit)
    }

    /// Write up to four components to the current row and advance
    ///
    /// Missing trailing components are filled with 0 (1 for the fourth
    /// component of colors).
    pub fn add_data(&mut self, values: &[f32]) -> GeomResult<()> {
        let expected = self.column.num_components();
        if values.len() > expected {
            return Err(GeomError::ComponentCount {
                column: self.column.name().to_string(),
                expected,
                actual: values.len(),
            });
        }

        match self.limit {
            Some(limit) if self.row >= limit => {
                return Err(GeomError::RowOutOfRange { row: self.row, limit });
            }
            None if self.row >= self.data.num_rows() => {
                self.data.set_num_rows(self.row + 1);
            }
            _ => {}
        }

        for component in 0..expected {
            let value = values.get(component).copied().unwrap_or({
                if component == 3 && self.column.contents() == Contents::Color {
                    1.0
                } else {
                    0.0
                }
            });
            self.data.write_component(&self.column, self.row, component, value);
        }
        self.data.touch();
        self.row += 1;
        Ok(())
    }

    /// Write an integer value to a single-component column and advance
    pub fn add_data1i(&mut self, value: u32) -> GeomResult<()> {
        self.add_data(&[value as f32])
    }

    /// Write two components and advance
    pub fn add_data2f(&mut self, x: f32, y: f32) -> GeomResult<()> {
        self.add_data(&[x, y])
    }

    /// Write three components and advance
    pub fn add_data3f(&mut self, x: f32, y: f32, z: f32) -> GeomResult<()> {
        self.add_data(&[x, y, z])
    }

    /// Write a point and advance
    pub fn add_point(&mut self, point: &Point3) -> GeomResult<()> {
        self.add_data(&[point.x, point.y, point.z])
    }

    /// Write four components and advance
    pub fn add_data4f(&mut self, x: f32, y: f32, z: f32, w: f32) -> GeomResult<()> {
        self.add_data(&[x, y, z, w])
    }
}

/// Column cursor that reads one row per `get_*` call
#[derive(Debug, Clone)]
pub struct VertexReader<'a> {
    data: &'a VertexData,
    column: VertexColumn,
    row: usize,
}

impl VertexReader<'_> {
    /// Reposition the cursor
    pub fn set_row(&mut self, row: usize) {
        self.row = row;
    }

    /// Row the next `get_*` call reads
    pub const fn row(&self) -> usize {
        self.row
    }

    /// Whether all rows were read
    pub const fn is_at_end(&self) -> bool {
        self.row >= self.data.num_rows()
    }

    /// Read all components of the current row and advance
    pub fn get_data(&mut self) -> GeomResult<Vec<f32>> {
        if self.row >= self.data.num_rows() {
            return Err(GeomError::RowOutOfRange { row: self.row, limit: self.data.num_rows() });
        }
        let values = (0..self.column.num_components())
            .map(|component| self.data.read_component(&self.column, self.row, component))
            .collect();
        self.row += 1;
        Ok(values)
    }

    /// Read the first three components of the current row as a point and advance
    pub fn get_point(&mut self) -> GeomResult<Point3> {
        let values = self.get_data()?;
        let component = |i: usize| values.get(i).copied().unwrap_or(0.0);
        Ok(Point3::new(component(0), component(1), component(2)))
    }

    /// Read the first component of the current row as an integer and advance
    pub fn get_data1i(&mut self) -> GeomResult<u32> {
        let values = self.get_data()?;
        Ok(values.first().copied().unwrap_or(0.0) as u32)
    }
}
