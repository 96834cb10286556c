//! Backend-side residency of index buffers
//!
//! A [`PreparedObjects`] table stands for one backend context. Primitives
//! are either queued for upload at the start of the next frame or prepared
//! immediately, producing an [`IndexBufferContext`]. Tables and primitives
//! only know each other by id, and a primitive releases every context it
//! still holds when it is dropped.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

use crate::foundation::collections::IdAllocator;

static TABLE_IDS: IdAllocator = IdAllocator::new();

/// Backend handle of one uploaded index buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexBufferContext {
    /// Id of the primitive whose indices were uploaded
    pub primitive_id: u64,
    /// Bytes uploaded
    pub data_size_bytes: usize,
    /// Modification stamp of the primitive at upload time
    pub modified: u64,
}

#[derive(Debug, Default)]
struct Residency {
    queued: HashSet<u64>,
    index_buffers: HashMap<u64, IndexBufferContext>,
    total_uploads: u64,
}

/// Index buffers resident on one backend context
#[derive(Debug)]
pub struct PreparedObjects {
    id: u64,
    name: String,
    residency: Mutex<Residency>,
}

impl PreparedObjects {
    /// Create an empty table
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TABLE_IDS.allocate(),
            name: name.into(),
            residency: Mutex::new(Residency::default()),
        }
    }

    /// Unique id of this table
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Debug name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a primitive for upload at the start of the next frame
    pub fn enqueue_index_buffer(&self, primitive_id: u64) {
        self.residency.lock().queued.insert(primitive_id);
    }

    /// Remove a primitive from the upload queue; false if it was not queued
    pub fn dequeue_index_buffer(&self, primitive_id: u64) -> bool {
        self.residency.lock().queued.remove(&primitive_id)
    }

    /// Whether the primitive waits in the upload queue
    pub fn is_index_buffer_queued(&self, primitive_id: u64) -> bool {
        self.residency.lock().queued.contains(&primitive_id)
    }

    /// Whether the primitive currently has an uploaded index buffer
    pub fn is_index_buffer_prepared(&self, primitive_id: u64) -> bool {
        self.residency.lock().index_buffers.contains_key(&primitive_id)
    }

    /// Number of resident index buffers
    pub fn num_prepared_index_buffers(&self) -> usize {
        self.residency.lock().index_buffers.len()
    }

    /// Number of uploads performed, including re-uploads of modified data
    pub fn total_uploads(&self) -> u64 {
        self.residency.lock().total_uploads
    }

    /// Upload (or re-upload if stale) and return the resident context
    pub(crate) fn prepare_index_buffer_now(
        &self,
        primitive_id: u64,
        data_size_bytes: usize,
        modified: u64,
    ) -> IndexBufferContext {
        let mut residency = self.residency.lock();
        residency.queued.remove(&primitive_id);
        if let Some(existing) = residency.index_buffers.get(&primitive_id) {
            if existing.modified == modified {
                return *existing;
            }
        }
        let context = IndexBufferContext {
            primitive_id,
            data_size_bytes,
            modified,
        };
        residency.index_buffers.insert(primitive_id, context);
        residency.total_uploads += 1;
        log::trace!(
            "{}: uploaded index buffer for primitive {} ({} bytes)",
            self.name,
            primitive_id,
            data_size_bytes
        );
        context
    }

    /// Free the primitive's index buffer; false if none was resident
    pub(crate) fn release_index_buffer(&self, primitive_id: u64) -> bool {
        self.residency.lock().index_buffers.remove(&primitive_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_reuses_fresh_context() {
        let table = PreparedObjects::new("test");
        let first = table.prepare_index_buffer_now(7, 12, 1);
        let again = table.prepare_index_buffer_now(7, 12, 1);
        assert_eq!(first, again);
        assert_eq!(table.total_uploads(), 1);

        let updated = table.prepare_index_buffer_now(7, 18, 2);
        assert_eq!(updated.data_size_bytes, 18);
        assert_eq!(table.total_uploads(), 2);
        assert_eq!(table.num_prepared_index_buffers(), 1);
    }

    #[test]
    fn test_prepare_now_clears_queue_entry() {
        let table = PreparedObjects::new("test");
        table.enqueue_index_buffer(3);
        assert!(table.is_index_buffer_queued(3));
        table.prepare_index_buffer_now(3, 6, 1);
        assert!(!table.is_index_buffer_queued(3));
        assert!(table.release_index_buffer(3));
        assert!(!table.release_index_buffer(3));
    }
}
