//! Undo history: snapshots of the raster taken before each destructive edit.
//!
//! The stack is bounded. Once `capacity` snapshots are held, pushing another
//! evicts the oldest one. There is no redo; a popped snapshot is gone.

use serde::Serialize;
use std::collections::VecDeque;
use crate::raster::RasterBuffer;

/// Default number of undo steps kept per session
pub const DEFAULT_HISTORY_CAPACITY: usize = 20;

/// Metadata of a stored snapshot
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotInfo {
    /// SHA-256 of the snapshot's pixels
    pub digest: String,
    /// Creation timestamp (RFC 3339)
    pub created: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
struct Snapshot {
    info: SnapshotInfo,
    buffer: RasterBuffer,
}

#[derive(Debug, Clone)]
pub struct HistoryStack {
    snapshots: VecDeque<Snapshot>,
    capacity: usize,
}

impl Default for HistoryStack {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl HistoryStack {
    /// A capacity of 0 is treated as 1
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            snapshots: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Store a deep copy of `buffer`
    pub fn push(&mut self, buffer: &RasterBuffer) {
        self.push_owned(buffer.clone());
    }

    /// Store `buffer` itself, for callers that are done with it
    pub fn push_owned(&mut self, buffer: RasterBuffer) {
        let info = SnapshotInfo {
            digest: buffer.digest(),
            created: chrono::Utc::now().to_rfc3339(),
            width: buffer.width(),
            height: buffer.height(),
        };

        if self.snapshots.len() == self.capacity {
            if let Some(evicted) = self.snapshots.pop_front() {
                tracing::debug!(digest = %evicted.info.digest, "Evicted oldest undo snapshot");
            }
        }

        tracing::debug!(digest = %info.digest, depth = self.snapshots.len() + 1, "Pushed undo snapshot");
        self.snapshots.push_back(Snapshot { info, buffer });
    }

    pub fn can_undo(&self) -> bool {
        !self.snapshots.is_empty()
    }

    /// Remove and return the most recent snapshot, `None` when empty
    pub fn pop(&mut self) -> Option<RasterBuffer> {
        let snapshot = self.snapshots.pop_back()?;
        tracing::debug!(
            digest = %snapshot.info.digest,
            created = %snapshot.info.created,
            depth = self.snapshots.len(),
            "Popped undo snapshot"
        );
        Some(snapshot.buffer)
    }

    pub fn peek(&self) -> Option<&SnapshotInfo> {
        self.snapshots.back().map(|s| &s.info)
    }

    /// Snapshot metadata, oldest first
    pub fn entries(&self) -> impl Iterator<Item = &SnapshotInfo> {
        self.snapshots.iter().map(|s| &s.info)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(v: u8) -> RasterBuffer {
        RasterBuffer::filled(2, 2, [v, v, v, 255])
    }

    #[test]
    fn test_pop_empty_is_none() {
        let mut history = HistoryStack::default();
        assert!(!history.can_undo());
        assert!(history.pop().is_none());
    }

    #[test]
    fn test_lifo_order() {
        let mut history = HistoryStack::default();
        history.push(&solid(1));
        history.push(&solid(2));
        assert!(history.can_undo());
        assert_eq!(history.pop().unwrap(), solid(2));
        assert_eq!(history.pop().unwrap(), solid(1));
        assert!(!history.can_undo());
    }

    #[test]
    fn test_push_copies() {
        let mut history = HistoryStack::default();
        let mut buf = solid(5);
        history.push(&buf);
        buf.as_bytes_mut()[0] = 99;
        assert_eq!(history.pop().unwrap(), solid(5));
    }

    #[test]
    fn test_evicts_oldest_at_capacity() {
        let mut history = HistoryStack::with_capacity(3);
        for v in 1..=5 {
            history.push(&solid(v));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.pop().unwrap(), solid(5));
        assert_eq!(history.pop().unwrap(), solid(4));
        assert_eq!(history.pop().unwrap(), solid(3));
        assert!(history.pop().is_none());
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut history = HistoryStack::with_capacity(0);
        assert_eq!(history.capacity(), 1);
        history.push(&solid(1));
        history.push(&solid(2));
        assert_eq!(history.len(), 1);
        assert_eq!(history.pop().unwrap(), solid(2));
    }

    #[test]
    fn test_snapshot_metadata() {
        let mut history = HistoryStack::default();
        let buf = solid(7);
        history.push(&buf);

        let info = history.peek().unwrap();
        assert_eq!(info.digest, buf.digest());
        assert_eq!((info.width, info.height), (2, 2));
        assert!(chrono::DateTime::parse_from_rfc3339(&info.created).is_ok());
        assert_eq!(history.entries().count(), 1);

        history.clear();
        assert!(history.is_empty());
    }
}
