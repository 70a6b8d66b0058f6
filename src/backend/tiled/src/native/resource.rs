//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Committed resources of the software runtime.
//!
//! Every resource owns host memory standing in for the device allocation.
//! Buffers are flat byte ranges; textures store each sub-resource as a
//! tightly packed run of block rows. Upload- and readback-class resources
//! expose stable raw map pointers the way a persistently mapped allocation
//! would.
use parking_lot::Mutex;
use snowflake::ProcessUniqueId;
use std::cell::UnsafeCell;
use std::sync::Arc;

use ringfx_base::TextureFormat;

/// The access state of a sub-resource on the device timeline.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ResourceState {
    /// The initial state. Promotes to any state on first use and is the state
    /// back buffers decay to after a present.
    Common,
    VertexAndConstantBuffer,
    IndexBuffer,
    RenderTarget,
    UnorderedAccess,
    DepthWrite,
    NonPixelShaderResource,
    AllShaderResource,
    IndirectArgument,
    CopyDest,
    CopySource,
    Present,
}

/// The memory class a resource is committed in.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum HeapClass {
    /// Device-local. Participates in state transitions.
    Default,
    /// Host-visible write-combined memory. Always readable by the device;
    /// never transitioned.
    Upload,
    /// Host-visible readback memory. Always writable by copy commands;
    /// never transitioned.
    Readback,
}

/// Host memory standing in for a device allocation.
///
/// The pointer returned by [`HostMemory::ptr`] is stable for the lifetime of
/// the resource. Synchronization between the client and the execution thread
/// is the caller's responsibility, exactly as it is for a real mapped
/// allocation.
#[derive(Debug)]
pub(crate) struct HostMemory {
    bytes: UnsafeCell<Box<[u8]>>,
}

unsafe impl Send for HostMemory {}
unsafe impl Sync for HostMemory {}

impl HostMemory {
    fn new(len: usize) -> Self {
        Self {
            bytes: UnsafeCell::new(vec![0u8; len].into_boxed_slice()),
        }
    }

    pub(crate) fn ptr(&self) -> *mut u8 {
        unsafe { (*self.bytes.get()).as_mut_ptr() }
    }

    pub(crate) fn len(&self) -> usize {
        unsafe { (&*self.bytes.get()).len() }
    }

    /// Copy `len` bytes from `src_offset` of `src` to `dst_offset` of `self`.
    ///
    /// Bounds must have been validated by the caller.
    pub(crate) unsafe fn copy_from(
        &self,
        dst_offset: usize,
        src: &HostMemory,
        src_offset: usize,
        len: usize,
    ) {
        std::ptr::copy(src.ptr().add(src_offset), self.ptr().add(dst_offset), len);
    }
}

/// The description of a texture resource.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NativeTextureDesc {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub layer_count: u32,
    pub level_count: u32,
    pub format: TextureFormat,
    pub sample_count: u32,
}

impl NativeTextureDesc {
    pub(crate) fn num_subresources(&self) -> u32 {
        self.layer_count * self.level_count
    }

    pub(crate) fn level_extent(&self, level: u32) -> (u32, u32, u32) {
        (
            (self.width >> level).max(1),
            (self.height >> level).max(1),
            (self.depth >> level).max(1),
        )
    }

    /// The tightly packed byte size of one sub-resource at `level`.
    pub(crate) fn subresource_size(&self, level: u32) -> u64 {
        let (w, h, d) = self.level_extent(level);
        let (bw, bh) = self.format.block_dim();
        let blocks_w = (w + bw - 1) / bw;
        let blocks_h = (h + bh - 1) / bh;
        blocks_w as u64 * blocks_h as u64 * d as u64 * self.format.texel_block_size() as u64
    }

    /// The tight row pitch (one block row) of a sub-resource at `level`.
    pub(crate) fn row_pitch(&self, level: u32) -> u64 {
        let (w, _, _) = self.level_extent(level);
        let (bw, _) = self.format.block_dim();
        let blocks_w = (w + bw - 1) / bw;
        blocks_w as u64 * self.format.texel_block_size() as u64
    }
}

#[derive(Debug)]
pub(crate) enum ResourceKind {
    Buffer { size: u64 },
    Texture(NativeTextureDesc),
}

/// A committed resource of the software runtime.
#[derive(Debug)]
pub(crate) struct Resource {
    pub(crate) id: ProcessUniqueId,
    pub(crate) heap_class: HeapClass,
    pub(crate) kind: ResourceKind,
    pub(crate) memory: HostMemory,
    /// Byte offset of each sub-resource within `memory`. One entry for
    /// buffers.
    subresource_offsets: Vec<u64>,
    /// The actual state of every sub-resource, maintained by the execution
    /// thread.
    pub(crate) states: Mutex<Vec<ResourceState>>,
    /// The base of the virtual-address range assigned to the resource.
    pub(crate) gpu_va: u64,
    label: Mutex<Option<String>>,
    map_count: Mutex<u32>,
}

pub(crate) type ResourceRef = Arc<Resource>;

impl Resource {
    pub(crate) fn new_buffer(
        size: u64,
        heap_class: HeapClass,
        initial_state: ResourceState,
        gpu_va: u64,
    ) -> Self {
        Self {
            id: ProcessUniqueId::new(),
            heap_class,
            kind: ResourceKind::Buffer { size },
            memory: HostMemory::new(size as usize),
            subresource_offsets: vec![0],
            states: Mutex::new(vec![initial_state]),
            gpu_va,
            label: Mutex::new(None),
            map_count: Mutex::new(0),
        }
    }

    pub(crate) fn new_texture(
        desc: NativeTextureDesc,
        initial_state: ResourceState,
        gpu_va: u64,
    ) -> Self {
        let mut offsets = Vec::with_capacity(desc.num_subresources() as usize);
        let mut total = 0u64;
        for _layer in 0..desc.layer_count {
            for level in 0..desc.level_count {
                offsets.push(total);
                total += desc.subresource_size(level);
            }
        }
        Self {
            id: ProcessUniqueId::new(),
            // Textures are always committed in the default heap.
            heap_class: HeapClass::Default,
            kind: ResourceKind::Texture(desc),
            memory: HostMemory::new(total as usize),
            subresource_offsets: offsets,
            states: Mutex::new(vec![initial_state; desc.num_subresources() as usize]),
            gpu_va,
            label: Mutex::new(None),
            map_count: Mutex::new(0),
        }
    }

    pub(crate) fn buffer_size(&self) -> u64 {
        match self.kind {
            ResourceKind::Buffer { size } => size,
            ResourceKind::Texture(_) => panic!("not a buffer"),
        }
    }

    pub(crate) fn texture_desc(&self) -> &NativeTextureDesc {
        match self.kind {
            ResourceKind::Texture(ref desc) => desc,
            ResourceKind::Buffer { .. } => panic!("not a texture"),
        }
    }

    pub(crate) fn num_subresources(&self) -> u32 {
        self.subresource_offsets.len() as u32
    }

    pub(crate) fn subresource_offset(&self, index: u32) -> u64 {
        self.subresource_offsets[index as usize]
    }

    /// Map the resource. Only meaningful for host-visible heap classes.
    pub(crate) fn map(&self) -> *mut u8 {
        debug_assert!(self.heap_class != HeapClass::Default);
        *self.map_count.lock() += 1;
        self.memory.ptr()
    }

    pub(crate) fn unmap(&self) {
        let mut count = self.map_count.lock();
        debug_assert!(*count > 0, "unbalanced unmap");
        *count = count.saturating_sub(1);
    }

    pub(crate) fn set_label(&self, label: &str) {
        *self.label.lock() = Some(label.to_owned());
    }

    pub(crate) fn label(&self) -> Option<String> {
        self.label.lock().clone()
    }
}

