//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! A software model of an explicit-state, tiled-resource desktop GPU
//! runtime.
//!
//! This module stands in for the native driver: committed resources with
//! per-sub-resource access states, CPU/GPU descriptor heaps, retained
//! command lists, an asynchronous execution queue with value fences, and a
//! flip-model presentation engine. The engine layered on top of it records
//! the exact command sequences it would record against the real API; the
//! runtime validates them (transitions, operand states, binding layouts) and
//! actually performs copies, clears, and fence signals so the frame-resource
//! machinery can be exercised end to end without a device.
//!
//! Shader bytecode is treated as an opaque blob and never interpreted.
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

pub(crate) mod heap;
pub(crate) mod list;
pub(crate) mod pipeline;
pub(crate) mod queue;
pub(crate) mod resource;
pub(crate) mod swapchain;

pub(crate) use self::heap::{DescriptorHeap, DescriptorHeapKind, DescriptorHeapRef, DescriptorPayload};
pub(crate) use self::list::{Cmd, CmdList};
pub(crate) use self::pipeline::{
    IndirectSignature, PipelineKind, PipelineState, PipelineStateRef, RootParam, RootSignature,
    RootSignatureRef, TableKind,
};
pub(crate) use self::queue::{wait_fences, Fence, FenceEvent, FenceRef, Queue};
pub(crate) use self::resource::{
    HeapClass, NativeTextureDesc, Resource, ResourceRef, ResourceState,
};
pub(crate) use self::swapchain::{Swapchain, SwapchainDesc};

/// Where the executor reports state violations. Violations are always
/// logged; they are retained for [`crate::Device::take_debug_messages`] only
/// when the device was created with debugging enabled.
#[derive(Debug, Clone)]
pub(crate) struct DebugSink {
    enabled: bool,
    messages: Arc<Mutex<Vec<String>>>,
}

impl DebugSink {
    fn new(enabled: bool) -> Self {
        Self {
            enabled,
            messages: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn report(&self, message: String) {
        log::error!("[tiled runtime] {}", message);
        if self.enabled {
            self.messages.lock().push(message);
        }
    }

    pub(crate) fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.messages.lock())
    }
}

/// Resolves GPU virtual addresses back to resources on the execution thread.
pub(crate) type VaMap = Arc<Mutex<BTreeMap<u64, Weak<Resource>>>>;

/// The base of the fake virtual-address space. Non-zero so a null address
/// never resolves.
const VA_BASE: u64 = 0x1_0000_0000;

/// The alignment of each resource's virtual-address range.
const VA_ALIGN: u64 = 0x1_0000;

/// The native device of the software runtime.
#[derive(Debug)]
pub(crate) struct NativeDevice {
    debug: DebugSink,
    va_map: VaMap,
    next_va: AtomicU64,
    fence_event: Arc<FenceEvent>,
}

impl NativeDevice {
    pub(crate) fn new(debug: bool) -> Self {
        Self {
            debug: DebugSink::new(debug),
            va_map: Arc::new(Mutex::new(BTreeMap::new())),
            next_va: AtomicU64::new(VA_BASE),
            fence_event: Arc::new(FenceEvent::default()),
        }
    }

    /// Drain the validation messages accumulated so far.
    pub(crate) fn take_debug_messages(&self) -> Vec<String> {
        self.debug.take()
    }

    pub(crate) fn create_queue(&self) -> Queue {
        Queue::new(self.debug.clone(), self.va_map.clone())
    }

    fn allocate_va(&self, size: u64) -> u64 {
        let aligned = ringfx_common::align_up(size.max(1), VA_ALIGN);
        self.next_va.fetch_add(aligned, Ordering::Relaxed)
    }

    fn register_va(&self, resource: &ResourceRef) {
        self.va_map
            .lock()
            .insert(resource.gpu_va, Arc::downgrade(resource));
    }

    pub(crate) fn create_buffer(
        &self,
        size: u64,
        heap_class: HeapClass,
        initial_state: ResourceState,
    ) -> ResourceRef {
        let va = self.allocate_va(size);
        let resource = Arc::new(Resource::new_buffer(size, heap_class, initial_state, va));
        self.register_va(&resource);
        resource
    }

    pub(crate) fn create_texture(
        &self,
        desc: NativeTextureDesc,
        initial_state: ResourceState,
    ) -> ResourceRef {
        let va = self.allocate_va(1);
        Arc::new(Resource::new_texture(desc, initial_state, va))
    }

    pub(crate) fn create_descriptor_heap(
        &self,
        kind: DescriptorHeapKind,
        capacity: u32,
        shader_visible: bool,
    ) -> DescriptorHeapRef {
        Arc::new(DescriptorHeap::new(kind, capacity, shader_visible))
    }

    pub(crate) fn create_fence(&self) -> FenceRef {
        Arc::new(Fence::new(self.fence_event.clone()))
    }

    pub(crate) fn create_pipeline_state(
        &self,
        root_signature: RootSignatureRef,
        kind: PipelineKind,
        bytecode: Vec<Vec<u8>>,
    ) -> PipelineStateRef {
        Arc::new(PipelineState::new(root_signature, kind, bytecode))
    }

    pub(crate) fn create_swapchain(&self, desc: SwapchainDesc) -> Arc<Swapchain> {
        Arc::new(Swapchain::new(desc, |size| self.allocate_va(size)))
    }

    /// Recreate a swapchain's ring after a resize or a parameter change.
    pub(crate) fn recreate_swapchain(
        &self,
        swapchain: &Arc<Swapchain>,
        width: u32,
        height: u32,
        format: ringfx_base::TextureFormat,
    ) {
        swapchain.recreate(width, height, format, |size| self.allocate_va(size));
    }
}
