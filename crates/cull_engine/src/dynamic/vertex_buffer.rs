//! Frame-reset vertex storage shared by every mesh of one format

use std::sync::Arc;

use super::{DynamicError, DynamicResult};
use crate::gobj::{UsageHint, VertexData, VertexFormat, VertexWriter};

/// Rows handed to the current writer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    /// First reserved row
    pub first_vertex: u32,
    /// Number of reserved rows
    pub num_vertices: usize,
}

/// Fixed-capacity vertex storage rewound every frame
///
/// Capacity is the byte budget divided by the format's stride and never
/// grows. Rows are handed out front to back; `position` only advances when
/// a write session is closed.
///
/// The rows live in an `Arc<VertexData>` that emitted geoms share. Writing
/// after a geom from an earlier frame still holds the rows clones them
/// first, so older readers keep their snapshot.
#[derive(Debug)]
pub struct DynamicVertexBuffer {
    data: Arc<VertexData>,
    capacity: usize,
    position: usize,
    locked: Option<Reservation>,
}

impl DynamicVertexBuffer {
    /// Create an empty buffer for `format` within `budget_bytes`
    pub fn new(format: Arc<VertexFormat>, budget_bytes: usize) -> Self {
        let capacity = budget_bytes / format.stride().max(1);
        log::debug!(
            "Creating dynamic vertex buffer for {} ({} rows, {} byte stride)",
            format,
            capacity,
            format.stride()
        );
        Self {
            data: Arc::new(VertexData::new("dynamic", format, UsageHint::Stream)),
            capacity,
            position: 0,
            locked: None,
        }
    }

    /// Vertex format of the rows
    pub fn format(&self) -> &Arc<VertexFormat> {
        self.data.format()
    }

    /// Row capacity
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Next free row
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Rows still available this frame
    pub const fn remaining(&self) -> usize {
        self.capacity - self.position
    }

    /// Whether a write session is open
    pub const fn is_locked(&self) -> bool {
        self.locked.is_some()
    }

    /// The open session's rows
    pub const fn reservation(&self) -> Option<Reservation> {
        self.locked
    }

    /// Shared handle to the rows, for drawing
    pub fn vertex_data(&self) -> &Arc<VertexData> {
        &self.data
    }

    /// Open a write session for `num_vertices` rows
    ///
    /// Returns the first reserved row, or `None` without side effects when
    /// a session is already open or the rows do not fit.
    pub fn lock(&mut self, num_vertices: usize) -> Option<u32> {
        if self.locked.is_some() || num_vertices > self.remaining() {
            return None;
        }
        let first_vertex = u32::try_from(self.position).ok()?;
        let end = self.position + num_vertices;
        if self.data.num_rows() < end {
            Arc::make_mut(&mut self.data).set_num_rows(end);
        }
        self.locked = Some(Reservation {
            first_vertex,
            num_vertices,
        });
        Some(first_vertex)
    }

    /// Writer over the reserved rows of one column
    pub fn writer(&mut self, column: &str) -> DynamicResult<VertexWriter<'_>> {
        let reservation = self.locked.ok_or(DynamicError::NotLocked)?;
        let start = reservation.first_vertex as usize;
        let data = Arc::make_mut(&mut self.data);
        Ok(data.writer_in_range(column, start, start + reservation.num_vertices)?)
    }

    /// Close the write session and keep its rows
    ///
    /// Returns the closed reservation; does nothing when no session is open.
    pub fn unlock(&mut self) -> Option<Reservation> {
        let reservation = self.locked.take()?;
        self.position += reservation.num_vertices;
        Some(reservation)
    }

    /// Close the write session and give its rows back
    pub fn abandon(&mut self) -> Option<Reservation> {
        self.locked.take()
    }

    /// Rewind to the first row
    pub fn reset(&mut self) -> DynamicResult<()> {
        if self.locked.is_some() {
            return Err(DynamicError::ResetWhileLocked);
        }
        self.position = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gobj::{FormatRegistry, VERTEX};
    use approx::assert_relative_eq;

    fn buffer(rows: usize) -> DynamicVertexBuffer {
        let formats = FormatRegistry::new();
        let format = formats.v3();
        let budget = rows * format.stride();
        DynamicVertexBuffer::new(format, budget)
    }

    #[test]
    fn test_capacity_from_byte_budget() {
        let formats = FormatRegistry::new();
        let buffer = DynamicVertexBuffer::new(formats.v3(), 1_572_864);
        assert_eq!(buffer.capacity(), 1_572_864 / 12);
    }

    #[test]
    fn test_second_lock_fails_without_side_effects() {
        let mut buffer = buffer(16);
        assert_eq!(buffer.lock(4), Some(0));
        assert_eq!(buffer.lock(2), None);
        assert_eq!(buffer.reservation().map(|r| r.num_vertices), Some(4));
        assert_eq!(buffer.position(), 0);

        buffer.unlock();
        assert_eq!(buffer.position(), 4);
        assert_eq!(buffer.lock(2), Some(4));
    }

    #[test]
    fn test_lock_fails_exactly_past_capacity() {
        let mut buffer = buffer(10);
        assert_eq!(buffer.lock(6), Some(0));
        buffer.unlock();

        assert_eq!(buffer.lock(5), None);
        assert!(!buffer.is_locked());
        assert_eq!(buffer.position(), 6);

        assert_eq!(buffer.lock(4), Some(6));
        buffer.unlock();
        assert_eq!(buffer.remaining(), 0);
        assert_eq!(buffer.lock(0), Some(10));
    }

    #[test]
    fn test_unlock_without_lock_is_a_no_op() {
        let mut buffer = buffer(4);
        assert_eq!(buffer.unlock(), None);
        assert_eq!(buffer.position(), 0);
    }

    #[test]
    fn test_reset_rewinds_and_refuses_while_locked() {
        let mut buffer = buffer(8);
        buffer.lock(3);
        assert!(matches!(buffer.reset(), Err(DynamicError::ResetWhileLocked)));
        buffer.unlock();

        for _ in 0..3 {
            buffer.reset().unwrap();
            assert_eq!(buffer.position(), 0);
        }
    }

    #[test]
    fn test_writer_requires_lock_and_stays_in_range() {
        let mut buffer = buffer(8);
        assert!(matches!(buffer.writer(VERTEX), Err(DynamicError::NotLocked)));

        buffer.lock(2);
        buffer.unlock();
        buffer.lock(2);
        {
            let mut writer = buffer.writer(VERTEX).unwrap();
            writer.add_data3f(1.0, 2.0, 3.0).unwrap();
            writer.add_data3f(4.0, 5.0, 6.0).unwrap();
            assert!(writer.add_data3f(7.0, 8.0, 9.0).is_err());
        }
        buffer.unlock();

        let mut reader = buffer.vertex_data().reader(VERTEX).unwrap();
        reader.set_row(3);
        let point = reader.get_point().unwrap();
        assert_relative_eq!(point.x, 4.0);
    }

    #[test]
    fn test_writes_do_not_disturb_shared_snapshot() {
        let mut buffer = buffer(4);
        buffer.lock(1);
        buffer.writer(VERTEX).unwrap().add_data3f(1.0, 1.0, 1.0).unwrap();
        buffer.unlock();
        let snapshot = Arc::clone(buffer.vertex_data());

        buffer.reset().unwrap();
        buffer.lock(1);
        buffer.writer(VERTEX).unwrap().add_data3f(9.0, 9.0, 9.0).unwrap();
        buffer.unlock();

        let old = snapshot.reader(VERTEX).unwrap().get_point().unwrap();
        let new = buffer.vertex_data().reader(VERTEX).unwrap().get_point().unwrap();
        assert_relative_eq!(old.x, 1.0);
        assert_relative_eq!(new.x, 9.0);
    }
}
