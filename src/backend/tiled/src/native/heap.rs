//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Descriptor heaps of the software runtime.
//!
//! A heap is a fixed-capacity array of descriptor payloads addressed by
//! (heap, slot index). Descriptor writes and single-slot copies happen
//! immediately on the CPU timeline, like their native counterparts.
use parking_lot::Mutex;
use std::sync::Arc;

use ringfx_base::SamplerDesc;

use super::resource::ResourceRef;

/// The native descriptor kinds. `View` covers CBV/SRV/UAV.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub(crate) enum DescriptorHeapKind {
    View,
    Sampler,
    Rtv,
    Dsv,
}

/// The contents of one descriptor slot.
#[derive(Debug, Clone)]
pub(crate) enum DescriptorPayload {
    Empty,
    /// A shader-resource view. `first_subresource`/`num_subresources` select
    /// the visible range; buffers use `0..1`.
    Srv {
        resource: ResourceRef,
        first_subresource: u32,
        num_subresources: u32,
    },
    Uav {
        resource: ResourceRef,
        subresource: u32,
    },
    Cbv {
        resource: ResourceRef,
    },
    Rtv {
        resource: ResourceRef,
        subresource: u32,
    },
    Dsv {
        resource: ResourceRef,
        subresource: u32,
    },
    Sampler(SamplerDesc),
}

/// A native descriptor heap.
#[derive(Debug)]
pub(crate) struct DescriptorHeap {
    pub(crate) kind: DescriptorHeapKind,
    pub(crate) shader_visible: bool,
    slots: Mutex<Vec<DescriptorPayload>>,
}

pub(crate) type DescriptorHeapRef = Arc<DescriptorHeap>;

impl DescriptorHeap {
    pub(crate) fn new(kind: DescriptorHeapKind, capacity: u32, shader_visible: bool) -> Self {
        Self {
            kind,
            shader_visible,
            slots: Mutex::new(vec![DescriptorPayload::Empty; capacity as usize]),
        }
    }

    pub(crate) fn capacity(&self) -> u32 {
        self.slots.lock().len() as u32
    }

    pub(crate) fn write(&self, index: u32, payload: DescriptorPayload) {
        self.slots.lock()[index as usize] = payload;
    }

    /// Invalidate a slot. The slot may be handed out again later.
    pub(crate) fn clear(&self, index: u32) {
        self.slots.lock()[index as usize] = DescriptorPayload::Empty;
    }

    pub(crate) fn read(&self, index: u32) -> DescriptorPayload {
        self.slots.lock()[index as usize].clone()
    }

    /// Single-slot descriptor copy, the primitive the binding flush is built
    /// from.
    pub(crate) fn copy_to(&self, src_index: u32, dst: &DescriptorHeap, dst_index: u32) {
        debug_assert_eq!(self.kind, dst.kind, "descriptor heap kind mismatch");
        let payload = self.read(src_index);
        dst.write(dst_index, payload);
    }
}
