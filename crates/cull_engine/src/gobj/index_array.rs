//! Byte-encoded vertex index storage

use super::{GeomError, GeomResult, NumericType};

/// Index column stored at the width of its numeric type
///
/// Values are kept encoded exactly as a backend would upload them;
/// changing the width is an explicit [`IndexArray::reencode`] pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexArray {
    index_type: NumericType,
    bytes: Vec<u8>,
}

impl Default for IndexArray {
    fn default() -> Self {
        Self {
            index_type: NumericType::U16,
            bytes: Vec::new(),
        }
    }
}

impl IndexArray {
    /// Create an empty array of the given index type
    pub fn new(index_type: NumericType) -> GeomResult<Self> {
        if !index_type.is_index_type() {
            return Err(GeomError::NotAnIndexType(index_type));
        }
        Ok(Self {
            index_type,
            bytes: Vec::new(),
        })
    }

    /// Build an array from values, using the given index type
    pub fn from_values(index_type: NumericType, values: impl IntoIterator<Item = u32>) -> GeomResult<Self> {
        let mut array = Self::new(index_type)?;
        for value in values {
            array.push(value)?;
        }
        Ok(array)
    }

    /// Storage type of each index
    pub const fn index_type(&self) -> NumericType {
        self.index_type
    }

    /// Number of indices
    pub fn len(&self) -> usize {
        self.bytes.len() / self.index_type.size_bytes()
    }

    /// Whether the array holds no indices
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Encoded size in bytes
    pub fn data_size_bytes(&self) -> usize {
        self.bytes.len()
    }

    /// Raw encoded bytes, as uploaded to an index buffer
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Index at position `i`
    pub fn get(&self, i: usize) -> Option<u32> {
        let size = self.index_type.size_bytes();
        let bytes = self.bytes.get(i * size..(i + 1) * size)?;
        Some(match self.index_type {
            NumericType::U8 => u32::from(bytes[0]),
            NumericType::U16 => u32::from(bytemuck::pod_read_unaligned::<u16>(bytes)),
            _ => bytemuck::pod_read_unaligned::<u32>(bytes),
        })
    }

    /// Append an index; fails without side effects if it does not fit
    pub fn push(&mut self, value: u32) -> GeomResult<()> {
        self.check_fits(value)?;
        self.encode_into_tail(value);
        Ok(())
    }

    /// Overwrite the index at position `i`
    pub fn set(&mut self, i: usize, value: u32) -> GeomResult<()> {
        if i >= self.len() {
            return Err(GeomError::VertexOutOfRange { index: i, count: self.len() });
        }
        self.check_fits(value)?;
        let size = self.index_type.size_bytes();
        let slot = &mut self.bytes[i * size..(i + 1) * size];
        match self.index_type {
            NumericType::U8 => slot[0] = value as u8,
            NumericType::U16 => slot.copy_from_slice(bytemuck::bytes_of(&(value as u16))),
            _ => slot.copy_from_slice(bytemuck::bytes_of(&value)),
        }
        Ok(())
    }

    /// Remove every index
    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    /// Iterate over the decoded indices
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }

    /// Rewrite every index at a new width
    ///
    /// Fails without side effects if any stored index does not fit.
    pub fn reencode(&self, index_type: NumericType) -> GeomResult<Self> {
        let mut out = Self::new(index_type)?;
        out.bytes.reserve(self.len() * index_type.size_bytes());
        for value in self.iter() {
            out.push(value)?;
        }
        Ok(out)
    }

    /// Append a value, widening the storage first if it does not fit
    ///
    /// Returns true when the array had to be re-encoded.
    pub fn push_widening(&mut self, value: u32) -> bool {
        let widened = value > self.index_type.max_index();
        if widened {
            let values: Vec<u32> = self.iter().collect();
            self.index_type = NumericType::smallest_index_type_for(value);
            self.bytes.clear();
            for existing in values {
                self.encode_into_tail(existing);
            }
        }
        self.encode_into_tail(value);
        widened
    }

    fn check_fits(&self, value: u32) -> GeomResult<()> {
        if value > self.index_type.max_index() {
            return Err(GeomError::IndexOverflow {
                value,
                index_type: self.index_type,
            });
        }
        Ok(())
    }

    fn encode_into_tail(&mut self, value: u32) {
        match self.index_type {
            NumericType::U8 => self.bytes.push(value as u8),
            NumericType::U16 => self.bytes.extend_from_slice(bytemuck::bytes_of(&(value as u16))),
            _ => self.bytes.extend_from_slice(bytemuck::bytes_of(&value)),
        }
    }
}
