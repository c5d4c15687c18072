//! Opaque handle types and the ownership table that validates them.
//!
//! The original driver cast `void*` pointers straight to device-buffer
//! pointers; the Design Notes call that out as a pattern to re-architect.
//! Here a [`BufferHandle`] is a plain `u64` id, and [`HandleTable`] is the
//! single place that knows which gpu slot and byte length it maps to.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque handle to a device-side allocation. Never dereferenced directly;
/// always looked up through a [`HandleTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u64);

#[derive(Debug, Clone, Copy)]
pub struct BufferMeta {
    pub gpu_index: u32,
    pub size_bytes: u64,
}

/// Tracks every outstanding [`BufferHandle`] and the slot/size it belongs to.
///
/// Every public entry point that accepts a handle must validate it here
/// before touching the underlying OpenCL buffer.
#[derive(Debug, Default)]
pub struct HandleTable {
    next: AtomicU64,
    live: HashMap<BufferHandle, BufferMeta>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            live: HashMap::new(),
        }
    }

    pub fn insert(&mut self, gpu_index: u32, size_bytes: u64) -> BufferHandle {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        let handle = BufferHandle(id);
        self.live.insert(
            handle,
            BufferMeta {
                gpu_index,
                size_bytes,
            },
        );
        handle
    }

    pub fn get(&self, handle: BufferHandle) -> Option<&BufferMeta> {
        self.live.get(&handle)
    }

    pub fn remove(&mut self, handle: BufferHandle) -> Option<BufferMeta> {
        self.live.remove(&handle)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_unique_and_validated() {
        let mut table = HandleTable::new();
        let a = table.insert(0, 1024);
        let b = table.insert(0, 2048);
        assert_ne!(a, b);
        assert_eq!(table.get(a).unwrap().size_bytes, 1024);
        assert_eq!(table.get(b).unwrap().size_bytes, 2048);
        table.remove(a);
        assert!(table.get(a).is_none());
        assert_eq!(table.len(), 1);
    }
}
