//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! The two-tier descriptor-heap allocator.
//!
//! *Staging* heaps are CPU-only and device-lifetime: views are written into
//! them when resources are created and copied out during binding flushes.
//! Allocation uses a LIFO free list for locality, falling back to a bump
//! cursor.
//!
//! *GPU* heaps are shader-visible and pooled per kind. A command buffer
//! acquires one view heap and one sampler heap for the duration of one
//! recording; reuse after return is safe because the pool is only refilled
//! from retired command buffers.
use crate::native::{DescriptorHeapRef, DescriptorPayload};

/// An invalid slot index. Returned when a staging heap is exhausted; callers
/// must check before writing a payload through the descriptor.
pub const INVALID_DESCRIPTOR_INDEX: u32 = u32::MAX;

/// Identifies one of the four staging heaps.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub(crate) enum StagingKind {
    View,
    Sampler,
    Rtv,
    Dsv,
}

/// A slot in a CPU staging heap: the heap, the slot index, and nothing else —
/// heaps are stable for the device lifetime, so a handle does not own the
/// heap.
#[derive(Debug, Clone)]
pub(crate) struct CpuDescriptor {
    pub(crate) heap: DescriptorHeapRef,
    pub(crate) kind: StagingKind,
    pub(crate) index: u32,
}

impl CpuDescriptor {
    pub(crate) fn is_valid(&self) -> bool {
        self.index != INVALID_DESCRIPTOR_INDEX
    }

    /// Write a payload through this descriptor. Silently dropped when the
    /// descriptor is the invalid sentinel.
    pub(crate) fn write(&self, payload: DescriptorPayload) {
        if self.is_valid() {
            self.heap.write(self.index, payload);
        }
    }
}

/// Allocator state of one CPU staging heap.
#[derive(Debug)]
pub(crate) struct StagingHeap {
    native: DescriptorHeapRef,
    kind: StagingKind,
    current_descriptor_index: u32,
    inactive_descriptor_indices: Vec<u32>,
}

impl StagingHeap {
    pub(crate) fn new(kind: StagingKind, native: DescriptorHeapRef) -> Self {
        Self {
            native,
            kind,
            current_descriptor_index: 0,
            inactive_descriptor_indices: Vec::new(),
        }
    }

    pub(crate) fn allocate(&mut self) -> CpuDescriptor {
        let index = if let Some(index) = self.inactive_descriptor_indices.pop() {
            index
        } else if self.current_descriptor_index < self.native.capacity() {
            let index = self.current_descriptor_index;
            self.current_descriptor_index += 1;
            index
        } else {
            log::error!(
                "out of staging descriptors in the {:?} heap; raise the heap capacity",
                self.kind
            );
            INVALID_DESCRIPTOR_INDEX
        };
        CpuDescriptor {
            heap: self.native.clone(),
            kind: self.kind,
            index,
        }
    }

    pub(crate) fn release(&mut self, descriptor: &CpuDescriptor) {
        debug_assert!(descriptor.is_valid(), "releasing an invalid descriptor");
        descriptor.heap.clear(descriptor.index);
        self.inactive_descriptor_indices.push(descriptor.index);
    }

    /// The number of slots currently on the free list.
    pub(crate) fn num_inactive(&self) -> usize {
        self.inactive_descriptor_indices.len()
    }
}

/// The four staging heaps, guarded together by the device's single staging
/// lock.
#[derive(Debug)]
pub(crate) struct StagingHeaps {
    pub(crate) view: StagingHeap,
    pub(crate) sampler: StagingHeap,
    pub(crate) rtv: StagingHeap,
    pub(crate) dsv: StagingHeap,
}

impl StagingHeaps {
    pub(crate) fn heap_mut(&mut self, kind: StagingKind) -> &mut StagingHeap {
        match kind {
            StagingKind::View => &mut self.view,
            StagingKind::Sampler => &mut self.sampler,
            StagingKind::Rtv => &mut self.rtv,
            StagingKind::Dsv => &mut self.dsv,
        }
    }

    pub(crate) fn allocate(&mut self, kind: StagingKind) -> CpuDescriptor {
        self.heap_mut(kind).allocate()
    }

    pub(crate) fn release(&mut self, descriptor: &CpuDescriptor) {
        self.heap_mut(descriptor.kind).release(descriptor);
    }
}

/// A shader-visible heap acquired by one command buffer for one recording.
#[derive(Debug)]
pub(crate) struct GpuHeap {
    native: DescriptorHeapRef,
    current_descriptor_index: u32,
}

impl GpuHeap {
    pub(crate) fn new(native: DescriptorHeapRef) -> Self {
        Self {
            native,
            current_descriptor_index: 0,
        }
    }

    pub(crate) fn native(&self) -> &DescriptorHeapRef {
        &self.native
    }

    /// Reset the cursor. Called when the heap is drawn from the pool.
    pub(crate) fn reset(&mut self) {
        self.current_descriptor_index = 0;
    }

    /// Reserve `count` contiguous slots at the cursor.
    pub(crate) fn reserve(&mut self, count: u32) -> Option<u32> {
        if self.current_descriptor_index + count > self.native.capacity() {
            return None;
        }
        let start = self.current_descriptor_index;
        self.current_descriptor_index += count;
        Some(start)
    }
}

/// Copy one staging descriptor into a GPU heap slot.
pub(crate) fn copy_descriptor(src: &CpuDescriptor, dst: &GpuHeap, dst_index: u32) {
    if src.is_valid() {
        src.heap.copy_to(src.index, dst.native(), dst_index);
    } else {
        // An exhausted staging heap was reported at allocation time; the
        // binding stays empty and the runtime flags it if it is ever read.
        dst.native().write(dst_index, DescriptorPayload::Empty);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::{DescriptorHeap, DescriptorHeapKind};
    use std::sync::Arc;

    fn heap(capacity: u32) -> StagingHeap {
        StagingHeap::new(
            StagingKind::View,
            Arc::new(DescriptorHeap::new(DescriptorHeapKind::View, capacity, false)),
        )
    }

    #[test]
    fn staging_allocates_from_cursor_then_free_list() {
        let mut heap = heap(4);
        let a = heap.allocate();
        let b = heap.allocate();
        assert_eq!((a.index, b.index), (0, 1));

        heap.release(&a);
        heap.release(&b);
        assert_eq!(heap.num_inactive(), 2);

        // LIFO reuse.
        assert_eq!(heap.allocate().index, 1);
        assert_eq!(heap.allocate().index, 0);
        assert_eq!(heap.allocate().index, 2);
    }

    #[test]
    fn staging_exhaustion_returns_invalid() {
        let mut heap = heap(1);
        let a = heap.allocate();
        assert!(a.is_valid());
        let b = heap.allocate();
        assert!(!b.is_valid());
    }

    #[test]
    fn gpu_heap_reserve() {
        let native = Arc::new(DescriptorHeap::new(DescriptorHeapKind::View, 8, true));
        let mut heap = GpuHeap::new(native);
        assert_eq!(heap.reserve(5), Some(0));
        assert_eq!(heap.reserve(3), Some(5));
        assert_eq!(heap.reserve(1), None);
        heap.reset();
        assert_eq!(heap.reserve(8), Some(0));
    }
}
