//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Command list recording for the software runtime.
//!
//! A command list is a retained stream of commands. Recording is not
//! synchronized — a list belongs to a single thread until it is closed and
//! handed to the queue, matching the native model.
use ringfx_common::{Extent3D, Offset3D, Rect2D};

use ringfx_base::{IndexFormat, PrimitiveTopology, Viewport};

use super::heap::DescriptorHeapRef;
use super::pipeline::{IndirectSignature, PipelineStateRef, RootSignatureRef};
use super::resource::{ResourceRef, ResourceState};

#[derive(Debug)]
pub(crate) enum Cmd {
    Transition {
        resource: ResourceRef,
        /// `None` targets every sub-resource.
        subresource: Option<u32>,
        from: ResourceState,
        to: ResourceState,
    },
    UavBarrier {
        resource: ResourceRef,
    },
    ClearRtv {
        resource: ResourceRef,
        subresource: u32,
        value: [f32; 4],
    },
    ClearDsv {
        resource: ResourceRef,
        subresource: u32,
        depth: Option<f32>,
        stencil: Option<u8>,
    },
    SetRenderTargets {
        colors: Vec<(ResourceRef, u32)>,
        depth_stencil: Option<(ResourceRef, u32)>,
    },
    SetViewport(Viewport),
    SetScissor(Rect2D<u32>),
    SetDescriptorHeaps {
        view: DescriptorHeapRef,
        sampler: DescriptorHeapRef,
    },
    SetGraphicsRootSignature(RootSignatureRef),
    SetComputeRootSignature(RootSignatureRef),
    SetPipelineState(PipelineStateRef),
    SetPrimitiveTopology(PrimitiveTopology),
    SetBlendFactor([f32; 4]),
    SetStencilReference(u32),
    SetGraphicsRootTable {
        index: u32,
        heap: DescriptorHeapRef,
        start: u32,
    },
    SetComputeRootTable {
        index: u32,
        heap: DescriptorHeapRef,
        start: u32,
    },
    SetGraphicsRootCbv {
        index: u32,
        address: u64,
    },
    SetComputeRootCbv {
        index: u32,
        address: u64,
    },
    SetVertexBuffer {
        slot: u32,
        resource: ResourceRef,
        offset: u64,
        stride: u32,
    },
    SetIndexBuffer {
        resource: ResourceRef,
        offset: u64,
        format: IndexFormat,
    },
    Draw {
        num_vertices: u32,
        num_instances: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    DrawIndexed {
        num_indices: u32,
        num_instances: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    },
    Dispatch {
        x: u32,
        y: u32,
        z: u32,
    },
    ExecuteIndirect {
        signature: IndirectSignature,
        resource: ResourceRef,
        offset: u64,
    },
    CopyBufferRegion {
        src: ResourceRef,
        src_offset: u64,
        dst: ResourceRef,
        dst_offset: u64,
        size: u64,
    },
    /// Buffer → texture sub-resource with a placed footprint.
    CopyBufferToTexture {
        src: ResourceRef,
        src_offset: u64,
        src_row_pitch: u64,
        src_rows_per_slice: u32,
        dst: ResourceRef,
        dst_subresource: u32,
        dst_origin: Offset3D,
        extent: Extent3D,
    },
    /// Texture sub-resource → buffer with a placed footprint.
    CopyTextureToBuffer {
        src: ResourceRef,
        src_subresource: u32,
        src_origin: Offset3D,
        extent: Extent3D,
        dst: ResourceRef,
        dst_offset: u64,
        dst_row_pitch: u64,
    },
    CopyTextureRegion {
        src: ResourceRef,
        src_subresource: u32,
        src_origin: Offset3D,
        dst: ResourceRef,
        dst_subresource: u32,
        dst_origin: Offset3D,
        extent: Extent3D,
    },
    Marker(String),
    BeginGroup(String),
    EndGroup,
}

/// A command list of the software runtime.
#[derive(Debug, Default)]
pub(crate) struct CmdList {
    cmds: Vec<Cmd>,
    closed: bool,
}

impl CmdList {
    pub(crate) fn new() -> Self {
        Default::default()
    }

    pub(crate) fn push(&mut self, cmd: Cmd) {
        debug_assert!(!self.closed, "recording into a closed command list");
        self.cmds.push(cmd);
    }

    /// End recording. Returns the retained command stream; the list is left
    /// closed until `reset`.
    pub(crate) fn close(&mut self) -> Vec<Cmd> {
        debug_assert!(!self.closed, "command list is already closed");
        self.closed = true;
        std::mem::take(&mut self.cmds)
    }

    /// Make the list recordable again. The allocator equivalent — any
    /// retained stream must have finished executing.
    pub(crate) fn reset(&mut self) {
        self.cmds.clear();
        self.closed = false;
    }

    // Typed recording helpers. These mirror the native command verbs so the
    // engine code above reads like command recording, not enum construction.

    pub(crate) fn transition(
        &mut self,
        resource: &ResourceRef,
        subresource: Option<u32>,
        from: ResourceState,
        to: ResourceState,
    ) {
        self.push(Cmd::Transition {
            resource: resource.clone(),
            subresource,
            from,
            to,
        });
    }

    pub(crate) fn uav_barrier(&mut self, resource: &ResourceRef) {
        self.push(Cmd::UavBarrier {
            resource: resource.clone(),
        });
    }

    pub(crate) fn clear_rtv(&mut self, resource: &ResourceRef, subresource: u32, value: [f32; 4]) {
        self.push(Cmd::ClearRtv {
            resource: resource.clone(),
            subresource,
            value,
        });
    }

    pub(crate) fn clear_dsv(
        &mut self,
        resource: &ResourceRef,
        subresource: u32,
        depth: Option<f32>,
        stencil: Option<u8>,
    ) {
        self.push(Cmd::ClearDsv {
            resource: resource.clone(),
            subresource,
            depth,
            stencil,
        });
    }
}
