//! Per-stream buffering snapshots.
//!
//! The decode pipeline publishes one `CapacitySnapshot` per active stream.
//! Readers must see each snapshot whole, so producers publish through a
//! `CapacityCell`, which swaps the entire value in one store.

use std::sync::Arc;

use crossbeam::atomic::AtomicCell;

use crate::core::media_type::MediaType;
use crate::core::time::Seconds;

/// Buffering state of one stream at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapacitySnapshot {
    pub media_type: MediaType,
    /// Undecoded packets pending
    pub packet_count: usize,
    /// Decoded frames pending
    pub frame_count: usize,
    /// Seconds of buffered, not yet consumed media
    pub loaded_time: Seconds,
    pub is_end_of_file: bool,
}

impl CapacitySnapshot {
    /// An empty, still-loading stream.
    pub fn empty(media_type: MediaType) -> Self {
        Self {
            media_type,
            packet_count: 0,
            frame_count: 0,
            loaded_time: 0.0,
            is_end_of_file: false,
        }
    }

    /// True once the stream hit end-of-file and every packet was decoded.
    pub fn is_drained(&self) -> bool {
        self.is_end_of_file && self.packet_count == 0
    }
}

/// Synchronous accessor for a stream's current snapshot.
pub trait Capacity {
    fn snapshot(&self) -> CapacitySnapshot;
}

impl Capacity for CapacitySnapshot {
    fn snapshot(&self) -> CapacitySnapshot {
        *self
    }
}

/// Shared publish slot: the decode thread stores, the render thread loads.
#[derive(Clone)]
pub struct CapacityCell {
    inner: Arc<AtomicCell<CapacitySnapshot>>,
}

impl CapacityCell {
    pub fn new(media_type: MediaType) -> Self {
        Self {
            inner: Arc::new(AtomicCell::new(CapacitySnapshot::empty(media_type))),
        }
    }

    /// Replace the published snapshot.
    pub fn publish(&self, snapshot: CapacitySnapshot) {
        self.inner.store(snapshot);
    }

    /// Apply `update` to a copy of the current snapshot and publish it.
    /// Only the owning decode thread should call this.
    pub fn update(&self, update: impl FnOnce(&mut CapacitySnapshot)) {
        let mut snapshot = self.inner.load();
        update(&mut snapshot);
        self.inner.store(snapshot);
    }

    pub fn media_type(&self) -> MediaType {
        self.inner.load().media_type
    }
}

impl Capacity for CapacityCell {
    fn snapshot(&self) -> CapacitySnapshot {
        self.inner.load()
    }
}

/// Take one snapshot from each accessor, preserving order.
pub fn collect_snapshots<C: Capacity>(streams: &[C]) -> Vec<CapacitySnapshot> {
    streams.iter().map(Capacity::snapshot).collect()
}
