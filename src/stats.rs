//! Connection and buffer counters.
//!
//! Every [`Server`](crate::server::Server) owns one [`Counters`] instance and
//! hands it to its connections, so two servers in one process (or two tests)
//! never see each other's numbers. The values are advisory only.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::buffer::BufferObserver;

#[derive(Debug, Default)]
pub struct Counters {
    bytes_received: AtomicI64,
    bytes_sent: AtomicI64,
    total_connections: AtomicI64,
    active_connections: AtomicI64,
    buffer_allocations: AtomicI64,
    buffer_reallocations: AtomicI64,
    buffer_frees: AtomicI64,
    buffer_bytes_reallocated: AtomicI64,
}

/// Point-in-time copy of [`Counters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountersSnapshot {
    pub bytes_received: i64,
    pub bytes_sent: i64,
    pub total_connections: i64,
    pub active_connections: i64,
    pub buffer_allocations: i64,
    pub buffer_reallocations: i64,
    pub buffer_frees: i64,
    pub buffer_bytes_reallocated: i64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a finished connection along with its traffic. Called once per
    /// opened connection, including when its handler panicked.
    pub fn connection_closed(&self, bytes_sent: u64, bytes_received: u64) {
        self.bytes_sent.fetch_add(to_i64(bytes_sent), Ordering::Relaxed);
        self.bytes_received
            .fetch_add(to_i64(bytes_received), Ordering::Relaxed);
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            buffer_allocations: self.buffer_allocations.load(Ordering::Relaxed),
            buffer_reallocations: self.buffer_reallocations.load(Ordering::Relaxed),
            buffer_frees: self.buffer_frees.load(Ordering::Relaxed),
            buffer_bytes_reallocated: self.buffer_bytes_reallocated.load(Ordering::Relaxed),
        }
    }
}

impl BufferObserver for Counters {
    fn on_allocation(&self, capacity: usize) {
        self.buffer_allocations.fetch_add(1, Ordering::Relaxed);
        self.buffer_bytes_reallocated
            .fetch_add(to_i64(capacity as u64), Ordering::Relaxed);
    }

    fn on_reallocation(&self, capacity: usize) {
        self.buffer_reallocations.fetch_add(1, Ordering::Relaxed);
        self.buffer_bytes_reallocated
            .fetch_add(to_i64(capacity as u64), Ordering::Relaxed);
    }

    fn on_free(&self) {
        self.buffer_frees.fetch_add(1, Ordering::Relaxed);
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
