//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Command buffers.
//!
//! A command buffer lives in the device's available pool between uses. On
//! acquisition it is stamped with freshly acquired shader-visible heaps and
//! zeroed binding state; recording happens through the pass encoders; and
//! `commit` consumes the buffer, which makes use-after-submit
//! unrepresentable. Between retirement and the next acquisition the buffer
//! holds no references to any resource.
//!
//! Binding follows the stage/flush model: `bind_*` calls stage CPU
//! descriptors into per-stage slot arrays and set needs-rebind flags; the
//! draw/dispatch path copies the dirty groups into the command buffer's GPU
//! heaps and binds the resulting tables, and stamps uniform slots as root
//! constant-buffer views.
use std::sync::atomic::Ordering;
use std::sync::Arc;

use ringfx_base::error::Result;
use ringfx_base::limits::{
    MAX_STORAGE_BUFFERS_PER_STAGE, MAX_STORAGE_TEXTURES_PER_STAGE, MAX_TEXTURE_SAMPLERS_PER_STAGE,
    MAX_UNIFORM_BUFFERS_PER_STAGE, MAX_VERTEX_BUFFERS, UNIFORM_BUFFER_ALIGNMENT,
};
use ringfx_base::{ColorValue, DepthStencilValue, Filter, LoadOp, ShaderStage, StoreOp};
use ringfx_common::align_up;

use crate::buffer::{Buffer, ConcreteBuffer};
use crate::cmd::enc_compute::ComputeEncoder;
use crate::cmd::enc_copy::CopyEncoder;
use crate::cmd::enc_render::RenderEncoder;
use crate::cmd::fence::{Fence, FenceInner};
use crate::descriptor::{copy_descriptor, CpuDescriptor, GpuHeap};
use crate::device::DeviceRef;
use crate::native;
use crate::native::{Cmd, DescriptorHeapKind, DescriptorPayload, ResourceState};
use crate::pipeline::{ComputePipeline, GraphicsPipeline};
use crate::resstate;
use crate::rootsig::StageRootIndices;
use crate::sampler::Sampler;
use crate::shader::ShaderResourceCounts;
use crate::swapchain::WindowData;
use crate::texture::{ConcreteTexture, Texture};
use crate::uniform::UniformBuffer;

/// A texture-sampler pair bound to one sampler slot.
#[derive(Debug, Clone, Copy)]
pub struct TextureSamplerBinding<'a> {
    pub texture: &'a Texture,
    pub sampler: &'a Sampler,
}

/// One sub-resource of a texture, the unit storage textures are bound at.
#[derive(Debug, Clone, Copy)]
pub struct TextureSlice<'a> {
    pub texture: &'a Texture,
    pub layer: u32,
    pub level: u32,
}

/// A vertex buffer and a starting offset.
#[derive(Debug, Clone, Copy)]
pub struct BufferBinding<'a> {
    pub buffer: &'a Buffer,
    pub offset: u64,
}

/// A read-write storage buffer bound at compute-pass begin.
#[derive(Debug, Clone, Copy)]
pub struct StorageBufferReadWriteBinding<'a> {
    pub buffer: &'a Buffer,
    pub cycle: bool,
}

/// A read-write storage texture sub-resource bound at compute-pass begin.
#[derive(Debug, Clone, Copy)]
pub struct StorageTextureReadWriteBinding<'a> {
    pub texture: &'a Texture,
    pub layer: u32,
    pub level: u32,
    pub cycle: bool,
}

/// A color attachment of a render pass.
#[derive(Debug, Clone, Copy)]
pub struct ColorAttachmentInfo<'a> {
    pub texture: &'a Texture,
    pub layer: u32,
    pub level: u32,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub clear_color: ColorValue,
    /// Rotate the sub-resource away from in-flight data. Forced off when
    /// `load_op` is `Load`.
    pub cycle: bool,
}

/// The depth-stencil attachment of a render pass.
#[derive(Debug, Clone, Copy)]
pub struct DepthStencilAttachmentInfo<'a> {
    pub texture: &'a Texture,
    pub layer: u32,
    pub level: u32,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,
    pub clear_value: DepthStencilValue,
    pub cycle: bool,
}

/// A command buffer.
///
/// Single-thread only: all recording must happen on the acquiring thread.
/// Dropping an uncommitted buffer rolls back its swapchain acquisitions and
/// returns it to the pool.
#[derive(Debug)]
pub struct CmdBuffer {
    inner: Option<Box<CbInner>>,
}

impl CmdBuffer {
    pub(crate) fn new(inner: Box<CbInner>) -> Self {
        Self { inner: Some(inner) }
    }

    pub(crate) fn inner_mut(&mut self) -> &mut CbInner {
        self.inner.as_mut().expect("command buffer was committed")
    }

    /// Begin a render pass. The pass ends when the returned encoder is
    /// dropped; every attachment is then transitioned back to its default
    /// state.
    pub fn encode_render<'a>(
        &'a mut self,
        color_attachments: &[ColorAttachmentInfo<'_>],
        depth_stencil_attachment: Option<&DepthStencilAttachmentInfo<'_>>,
    ) -> RenderEncoder<'a> {
        RenderEncoder::begin(self.inner_mut(), color_attachments, depth_stencil_attachment)
    }

    /// Begin a compute pass, binding the read-write storage resources for its
    /// duration.
    pub fn encode_compute<'a>(
        &'a mut self,
        storage_texture_bindings: &[StorageTextureReadWriteBinding<'_>],
        storage_buffer_bindings: &[StorageBufferReadWriteBinding<'_>],
    ) -> ComputeEncoder<'a> {
        ComputeEncoder::begin(
            self.inner_mut(),
            storage_texture_bindings,
            storage_buffer_bindings,
        )
    }

    /// Begin a copy pass.
    pub fn encode_copy(&mut self) -> CopyEncoder<'_> {
        CopyEncoder::begin(self.inner_mut())
    }

    /// Push uniform data to a vertex-stage slot. The data is visible to every
    /// draw recorded after this call, until the next push to the same slot.
    pub fn push_vertex_uniform_data(&mut self, slot: u32, data: &[u8]) {
        self.inner_mut()
            .push_uniform_data(ShaderStage::Vertex, slot, data);
    }

    pub fn push_fragment_uniform_data(&mut self, slot: u32, data: &[u8]) {
        self.inner_mut()
            .push_uniform_data(ShaderStage::Fragment, slot, data);
    }

    pub fn push_compute_uniform_data(&mut self, slot: u32, data: &[u8]) {
        self.inner_mut()
            .push_uniform_data(ShaderStage::Compute, slot, data);
    }

    /// Blit a region of one texture onto a region of another through the
    /// internal fullscreen-triangle pipeline.
    pub fn blit(
        &mut self,
        source: &crate::blit::BlitRegion<'_>,
        destination: &crate::blit::BlitRegion<'_>,
        filter: Filter,
        cycle: bool,
    ) {
        crate::blit::blit(self.inner_mut(), source, destination, filter, cycle);
    }

    pub fn insert_debug_label(&mut self, label: &str) {
        self.inner_mut().list.push(Cmd::Marker(label.to_owned()));
    }

    pub fn push_debug_group(&mut self, label: &str) {
        self.inner_mut().list.push(Cmd::BeginGroup(label.to_owned()));
    }

    pub fn pop_debug_group(&mut self) {
        self.inner_mut().list.push(Cmd::EndGroup);
    }

    /// Submit the command buffer. The fence tracking it is released back to
    /// the pool automatically on retirement.
    pub fn commit(mut self) -> Result<()> {
        let inner = self.inner.take().expect("command buffer was committed");
        let device = inner.device().clone();
        device.submit(inner, true)?;
        Ok(())
    }

    /// Submit the command buffer and take ownership of its fence. The caller
    /// releases the fence when done with it.
    pub fn commit_and_acquire_fence(mut self) -> Result<Fence> {
        let inner = self.inner.take().expect("command buffer was committed");
        let device = inner.device().clone();
        let fence = device.submit(inner, false)?;
        Ok(Fence::new(fence, device))
    }
}

impl Drop for CmdBuffer {
    fn drop(&mut self) {
        if let Some(mut inner) = self.inner.take() {
            inner.abandon();
            let device = inner.device().clone();
            device.return_abandoned(inner);
        }
    }
}

/// A window presentation queued on a command buffer.
#[derive(Debug)]
pub(crate) struct PresentEntry {
    pub(crate) window: Arc<WindowData>,
    pub(crate) swapchain_index: u32,
}

/// A deferred texture-download fixup, applied when the command buffer
/// retires.
#[derive(Debug)]
pub(crate) struct TextureDownload {
    pub(crate) temp: native::ResourceRef,
    pub(crate) dst: Arc<ConcreteBuffer>,
    pub(crate) dst_offset: u64,
    pub(crate) row_pitch: u64,
    pub(crate) aligned_row_pitch: u64,
    pub(crate) rows_per_slice: u32,
    pub(crate) num_rows: u32,
    pub(crate) depth: u32,
}

#[derive(Debug, Clone)]
struct SamplerPairSlot {
    sampler_cpu: CpuDescriptor,
    texture_cpu: CpuDescriptor,
}

/// Binding slots and needs-rebind flags for one graphics stage.
#[derive(Debug)]
pub(crate) struct GraphicsStageBindings {
    samplers: [Option<SamplerPairSlot>; MAX_TEXTURE_SAMPLERS_PER_STAGE],
    storage_textures: [Option<CpuDescriptor>; MAX_STORAGE_TEXTURES_PER_STAGE],
    storage_buffers: [Option<CpuDescriptor>; MAX_STORAGE_BUFFERS_PER_STAGE],
    uniform_index: [Option<usize>; MAX_UNIFORM_BUFFERS_PER_STAGE],
    need_sampler_bind: bool,
    need_storage_texture_bind: bool,
    need_storage_buffer_bind: bool,
    need_uniform_bind: [bool; MAX_UNIFORM_BUFFERS_PER_STAGE],
}

impl GraphicsStageBindings {
    fn new() -> Self {
        Self {
            samplers: std::array::from_fn(|_| None),
            storage_textures: std::array::from_fn(|_| None),
            storage_buffers: std::array::from_fn(|_| None),
            uniform_index: [None; MAX_UNIFORM_BUFFERS_PER_STAGE],
            need_sampler_bind: false,
            need_storage_texture_bind: false,
            need_storage_buffer_bind: false,
            need_uniform_bind: [false; MAX_UNIFORM_BUFFERS_PER_STAGE],
        }
    }

    fn mark_all_dirty(&mut self) {
        self.need_sampler_bind = true;
        self.need_storage_texture_bind = true;
        self.need_storage_buffer_bind = true;
        self.need_uniform_bind = [true; MAX_UNIFORM_BUFFERS_PER_STAGE];
    }
}

/// Binding slots and needs-rebind flags for the compute stage.
#[derive(Debug)]
pub(crate) struct ComputeBindings {
    readonly_storage_textures: [Option<CpuDescriptor>; MAX_STORAGE_TEXTURES_PER_STAGE],
    readonly_storage_buffers: [Option<CpuDescriptor>; MAX_STORAGE_BUFFERS_PER_STAGE],
    readwrite_storage_textures: [Option<CpuDescriptor>; MAX_STORAGE_TEXTURES_PER_STAGE],
    readwrite_storage_buffers: [Option<CpuDescriptor>; MAX_STORAGE_BUFFERS_PER_STAGE],
    uniform_index: [Option<usize>; MAX_UNIFORM_BUFFERS_PER_STAGE],
    need_readonly_storage_texture_bind: bool,
    need_readonly_storage_buffer_bind: bool,
    need_readwrite_storage_texture_bind: bool,
    need_readwrite_storage_buffer_bind: bool,
    need_uniform_bind: [bool; MAX_UNIFORM_BUFFERS_PER_STAGE],
}

impl ComputeBindings {
    fn new() -> Self {
        Self {
            readonly_storage_textures: std::array::from_fn(|_| None),
            readonly_storage_buffers: std::array::from_fn(|_| None),
            readwrite_storage_textures: std::array::from_fn(|_| None),
            readwrite_storage_buffers: std::array::from_fn(|_| None),
            uniform_index: [None; MAX_UNIFORM_BUFFERS_PER_STAGE],
            need_readonly_storage_texture_bind: false,
            need_readonly_storage_buffer_bind: false,
            need_readwrite_storage_texture_bind: false,
            need_readwrite_storage_buffer_bind: false,
            need_uniform_bind: [false; MAX_UNIFORM_BUFFERS_PER_STAGE],
        }
    }

    fn mark_all_dirty(&mut self) {
        self.need_readonly_storage_texture_bind = true;
        self.need_readonly_storage_buffer_bind = true;
        self.need_readwrite_storage_texture_bind = true;
        self.need_readwrite_storage_buffer_bind = true;
        self.need_uniform_bind = [true; MAX_UNIFORM_BUFFERS_PER_STAGE];
    }
}

#[derive(Debug)]
pub(crate) struct BindingState {
    pub(crate) graphics_pipeline: Option<GraphicsPipeline>,
    pub(crate) compute_pipeline: Option<ComputePipeline>,
    vertex: GraphicsStageBindings,
    fragment: GraphicsStageBindings,
    compute: ComputeBindings,
    vertex_buffers: [Option<(Arc<ConcreteBuffer>, u64)>; MAX_VERTEX_BUFFERS],
    need_vertex_buffer_bind: bool,
}

impl BindingState {
    fn new() -> Self {
        Self {
            graphics_pipeline: None,
            compute_pipeline: None,
            vertex: GraphicsStageBindings::new(),
            fragment: GraphicsStageBindings::new(),
            compute: ComputeBindings::new(),
            vertex_buffers: std::array::from_fn(|_| None),
            need_vertex_buffer_bind: false,
        }
    }
}

/// Tracked resources, deduplicated by linear scan. An insertion increments
/// the resource's in-flight count; retirement decrements it.
#[derive(Debug, Default)]
pub(crate) struct TrackedLists {
    texture_subresources: Vec<(Arc<ConcreteTexture>, u32)>,
    buffers: Vec<Arc<ConcreteBuffer>>,
    samplers: Vec<Sampler>,
    graphics_pipelines: Vec<GraphicsPipeline>,
    compute_pipelines: Vec<ComputePipeline>,
    pub(crate) used_uniform_buffers: Vec<Box<UniformBuffer>>,
}

#[derive(Debug)]
pub(crate) struct CbInner {
    /// Present from acquisition to retirement; a pooled buffer holds no
    /// reference to the device.
    pub(crate) device: Option<DeviceRef>,
    pub(crate) list: native::CmdList,
    pub(crate) view_heap: Option<GpuHeap>,
    pub(crate) sampler_heap: Option<GpuHeap>,
    pub(crate) fence: Option<Arc<FenceInner>>,
    pub(crate) auto_release_fence: bool,
    pub(crate) bind: BindingState,
    pub(crate) track: TrackedLists,
    pub(crate) present_entries: Vec<PresentEntry>,
    pub(crate) downloads: Vec<TextureDownload>,
    /// Staging descriptors created for this recording only (the blit path's
    /// per-sub-resource views). Released at retirement.
    pub(crate) transient_views: Vec<CpuDescriptor>,
}

impl CbInner {
    pub(crate) fn new() -> Box<Self> {
        Box::new(Self {
            device: None,
            list: native::CmdList::new(),
            view_heap: None,
            sampler_heap: None,
            fence: None,
            auto_release_fence: true,
            bind: BindingState::new(),
            track: Default::default(),
            present_entries: Vec::new(),
            downloads: Vec::new(),
            transient_views: Vec::new(),
        })
    }

    pub(crate) fn device(&self) -> &DeviceRef {
        self.device
            .as_ref()
            .expect("command buffer is not in the recording state")
    }

    /// Stamp the buffer with fresh GPU heaps and zeroed binding state.
    pub(crate) fn begin_recording(&mut self, device: DeviceRef) {
        self.device = Some(device);
        let view_heap = self.device().acquire_gpu_heap(DescriptorHeapKind::View);
        let sampler_heap = self.device().acquire_gpu_heap(DescriptorHeapKind::Sampler);
        self.list.push(Cmd::SetDescriptorHeaps {
            view: view_heap.native().clone(),
            sampler: sampler_heap.native().clone(),
        });
        self.view_heap = Some(view_heap);
        self.sampler_heap = Some(sampler_heap);
        self.bind = BindingState::new();
        self.fence = None;
        self.auto_release_fence = true;
    }

    // ---------------------------------------------------------------
    // Resource tracking

    pub(crate) fn track_texture_subresource(&mut self, concrete: &Arc<ConcreteTexture>, index: u32) {
        let seen = self
            .track
            .texture_subresources
            .iter()
            .any(|(c, i)| Arc::ptr_eq(c, concrete) && *i == index);
        if !seen {
            concrete.subresources[index as usize]
                .in_flight
                .fetch_add(1, Ordering::AcqRel);
            self.track
                .texture_subresources
                .push((concrete.clone(), index));
        }
    }

    pub(crate) fn track_buffer(&mut self, concrete: &Arc<ConcreteBuffer>) {
        if !self.track.buffers.iter().any(|c| Arc::ptr_eq(c, concrete)) {
            concrete.in_flight.fetch_add(1, Ordering::AcqRel);
            self.track.buffers.push(concrete.clone());
        }
    }

    pub(crate) fn track_sampler(&mut self, sampler: &Sampler) {
        if !self
            .track
            .samplers
            .iter()
            .any(|s| Arc::ptr_eq(&s.inner, &sampler.inner))
        {
            sampler.inner.in_flight.fetch_add(1, Ordering::AcqRel);
            self.track.samplers.push(sampler.clone());
        }
    }

    pub(crate) fn track_graphics_pipeline(&mut self, pipeline: &GraphicsPipeline) {
        if !self
            .track
            .graphics_pipelines
            .iter()
            .any(|p| Arc::ptr_eq(&p.inner, &pipeline.inner))
        {
            pipeline.inner.in_flight.fetch_add(1, Ordering::AcqRel);
            self.track.graphics_pipelines.push(pipeline.clone());
        }
    }

    pub(crate) fn track_compute_pipeline(&mut self, pipeline: &ComputePipeline) {
        if !self
            .track
            .compute_pipelines
            .iter()
            .any(|p| Arc::ptr_eq(&p.inner, &pipeline.inner))
        {
            pipeline.inner.in_flight.fetch_add(1, Ordering::AcqRel);
            self.track.compute_pipelines.push(pipeline.clone());
        }
    }

    fn release_tracked_lists(&mut self) {
        for (concrete, index) in self.track.texture_subresources.drain(..) {
            concrete.subresources[index as usize]
                .in_flight
                .fetch_sub(1, Ordering::AcqRel);
        }
        for concrete in self.track.buffers.drain(..) {
            concrete.in_flight.fetch_sub(1, Ordering::AcqRel);
        }
        for sampler in self.track.samplers.drain(..) {
            sampler.inner.in_flight.fetch_sub(1, Ordering::AcqRel);
        }
        for pipeline in self.track.graphics_pipelines.drain(..) {
            pipeline.inner.in_flight.fetch_sub(1, Ordering::AcqRel);
        }
        for pipeline in self.track.compute_pipelines.drain(..) {
            pipeline.inner.in_flight.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Retirement-side bookkeeping shared with abandonment.
    pub(crate) fn release_tracked(&mut self) {
        self.release_tracked_lists();
        self.present_entries.clear();
        self.bind = BindingState::new();
    }

    // ---------------------------------------------------------------
    // Binding state

    pub(crate) fn bind_graphics_pipeline(&mut self, pipeline: &GraphicsPipeline) {
        {
            let p = &pipeline.inner;
            self.list
                .push(Cmd::SetGraphicsRootSignature(p.root.native.clone()));
            self.list.push(Cmd::SetPipelineState(p.pso.clone()));
            self.list.push(Cmd::SetPrimitiveTopology(p.topology));
            self.list.push(Cmd::SetBlendFactor(p.blend_constants));
            self.list.push(Cmd::SetStencilReference(p.stencil_reference));
            self.bind.vertex.mark_all_dirty();
            self.bind.fragment.mark_all_dirty();
            self.bind.need_vertex_buffer_bind = true;
        }
        // Every declared uniform slot has a wrapper before the first draw.
        let (vertex_uniforms, fragment_uniforms) = (
            pipeline.inner.vertex_counts.num_uniform_buffers,
            pipeline.inner.fragment_counts.num_uniform_buffers,
        );
        for slot in 0..vertex_uniforms {
            self.ensure_uniform_buffer(ShaderStage::Vertex, slot);
        }
        for slot in 0..fragment_uniforms {
            self.ensure_uniform_buffer(ShaderStage::Fragment, slot);
        }
        self.track_graphics_pipeline(pipeline);
        self.bind.graphics_pipeline = Some(pipeline.clone());
    }

    pub(crate) fn bind_compute_pipeline(&mut self, pipeline: &ComputePipeline) {
        {
            let p = &pipeline.inner;
            self.list
                .push(Cmd::SetComputeRootSignature(p.root.native.clone()));
            self.list.push(Cmd::SetPipelineState(p.pso.clone()));
            self.bind.compute.mark_all_dirty();
        }
        for slot in 0..pipeline.inner.counts.num_uniform_buffers {
            self.ensure_uniform_buffer(ShaderStage::Compute, slot);
        }
        self.track_compute_pipeline(pipeline);
        self.bind.compute_pipeline = Some(pipeline.clone());
    }

    pub(crate) fn stage_bindings_mut(&mut self, stage: ShaderStage) -> &mut GraphicsStageBindings {
        match stage {
            ShaderStage::Vertex => &mut self.bind.vertex,
            ShaderStage::Fragment => &mut self.bind.fragment,
            ShaderStage::Compute => panic!("not a graphics stage"),
        }
    }

    pub(crate) fn bind_samplers(
        &mut self,
        stage: ShaderStage,
        first_slot: u32,
        bindings: &[TextureSamplerBinding<'_>],
    ) {
        for (i, binding) in bindings.iter().enumerate() {
            let concrete = binding.texture.container.active();
            let texture_cpu = concrete
                .whole_srv
                .clone()
                .expect("texture has no sampler usage");
            let slot = SamplerPairSlot {
                sampler_cpu: binding.sampler.inner.cpu.clone(),
                texture_cpu,
            };
            // Sampling uses the whole texture: every sub-resource is busy.
            for index in 0..concrete.subresources.len() as u32 {
                self.track_texture_subresource(&concrete, index);
            }
            self.track_sampler(binding.sampler);
            self.stage_bindings_mut(stage).samplers[first_slot as usize + i] = Some(slot);
        }
        self.stage_bindings_mut(stage).need_sampler_bind = true;
    }

    /// Bind one sampler slot with an explicitly supplied texture view rather
    /// than the whole-texture SRV. Tracking is the caller's responsibility.
    pub(crate) fn bind_sampler_pair(
        &mut self,
        stage: ShaderStage,
        slot: u32,
        sampler: &Sampler,
        texture_cpu: CpuDescriptor,
    ) {
        self.track_sampler(sampler);
        let bindings = self.stage_bindings_mut(stage);
        bindings.samplers[slot as usize] = Some(SamplerPairSlot {
            sampler_cpu: sampler.inner.cpu.clone(),
            texture_cpu,
        });
        bindings.need_sampler_bind = true;
    }

    pub(crate) fn take_transient_views(&mut self) -> Vec<CpuDescriptor> {
        std::mem::take(&mut self.transient_views)
    }

    pub(crate) fn bind_storage_textures(
        &mut self,
        stage: ShaderStage,
        first_slot: u32,
        slices: &[TextureSlice<'_>],
    ) {
        for (i, slice) in slices.iter().enumerate() {
            let container = &slice.texture.container;
            let concrete = container.active();
            let index = slice.layer * container.info.level_count + slice.level;
            let cpu = concrete.subresources[index as usize]
                .srv
                .clone()
                .expect("texture has no storage-read usage");
            self.track_texture_subresource(&concrete, index);
            self.stage_bindings_mut(stage).storage_textures[first_slot as usize + i] = Some(cpu);
        }
        self.stage_bindings_mut(stage).need_storage_texture_bind = true;
    }

    pub(crate) fn bind_storage_buffers(&mut self, stage: ShaderStage, first_slot: u32, buffers: &[&Buffer]) {
        for (i, buffer) in buffers.iter().enumerate() {
            let concrete = buffer.container.active();
            let cpu = concrete
                .srv
                .clone()
                .expect("buffer has no storage-read usage");
            self.track_buffer(&concrete);
            self.stage_bindings_mut(stage).storage_buffers[first_slot as usize + i] = Some(cpu);
        }
        self.stage_bindings_mut(stage).need_storage_buffer_bind = true;
    }

    pub(crate) fn bind_vertex_buffers(&mut self, first_slot: u32, bindings: &[BufferBinding<'_>]) {
        for (i, binding) in bindings.iter().enumerate() {
            let concrete = binding.buffer.container.active();
            self.track_buffer(&concrete);
            self.bind.vertex_buffers[first_slot as usize + i] = Some((concrete, binding.offset));
        }
        self.bind.need_vertex_buffer_bind = true;
    }

    pub(crate) fn set_compute_readonly_storage_texture(&mut self, slot: u32, cpu: CpuDescriptor) {
        self.bind.compute.readonly_storage_textures[slot as usize] = Some(cpu);
        self.bind.compute.need_readonly_storage_texture_bind = true;
    }

    pub(crate) fn set_compute_readonly_storage_buffer(&mut self, slot: u32, cpu: CpuDescriptor) {
        self.bind.compute.readonly_storage_buffers[slot as usize] = Some(cpu);
        self.bind.compute.need_readonly_storage_buffer_bind = true;
    }

    pub(crate) fn set_compute_readwrite_storage_texture(&mut self, slot: u32, cpu: CpuDescriptor) {
        self.bind.compute.readwrite_storage_textures[slot as usize] = Some(cpu);
        self.bind.compute.need_readwrite_storage_texture_bind = true;
    }

    pub(crate) fn set_compute_readwrite_storage_buffer(&mut self, slot: u32, cpu: CpuDescriptor) {
        self.bind.compute.readwrite_storage_buffers[slot as usize] = Some(cpu);
        self.bind.compute.need_readwrite_storage_buffer_bind = true;
    }

    // ---------------------------------------------------------------
    // Uniforms

    fn uniform_slots_mut(
        &mut self,
        stage: ShaderStage,
    ) -> (
        &mut [Option<usize>; MAX_UNIFORM_BUFFERS_PER_STAGE],
        &mut [bool; MAX_UNIFORM_BUFFERS_PER_STAGE],
    ) {
        match stage {
            ShaderStage::Vertex => (
                &mut self.bind.vertex.uniform_index,
                &mut self.bind.vertex.need_uniform_bind,
            ),
            ShaderStage::Fragment => (
                &mut self.bind.fragment.uniform_index,
                &mut self.bind.fragment.need_uniform_bind,
            ),
            ShaderStage::Compute => (
                &mut self.bind.compute.uniform_index,
                &mut self.bind.compute.need_uniform_bind,
            ),
        }
    }

    /// Acquire a pooled wrapper for `(stage, slot)` when none is assigned.
    fn ensure_uniform_buffer(&mut self, stage: ShaderStage, slot: u32) {
        let (indices, _) = self.uniform_slots_mut(stage);
        if indices[slot as usize].is_some() {
            return;
        }
        match self.device().acquire_uniform_buffer() {
            Ok(ub) => {
                self.track.used_uniform_buffers.push(ub);
                let index = self.track.used_uniform_buffers.len() - 1;
                let (indices, need_bind) = self.uniform_slots_mut(stage);
                indices[slot as usize] = Some(index);
                need_bind[slot as usize] = true;
            }
            Err(error) => {
                log::error!("failed to acquire a uniform buffer: {}", error);
            }
        }
    }

    pub(crate) fn push_uniform_data(&mut self, stage: ShaderStage, slot: u32, data: &[u8]) {
        self.ensure_uniform_buffer(stage, slot);
        let (indices, _) = self.uniform_slots_mut(stage);
        let Some(mut index) = indices[slot as usize] else {
            return;
        };

        let block = align_up(data.len() as u64, UNIFORM_BUFFER_ALIGNMENT);
        if self.track.used_uniform_buffers[index].remaining() < block {
            // The wrapper is exhausted. It stays on the used list (it may
            // still be referenced by earlier draws); a fresh one takes over
            // the slot.
            match self.device().acquire_uniform_buffer() {
                Ok(ub) => {
                    self.track.used_uniform_buffers.push(ub);
                    index = self.track.used_uniform_buffers.len() - 1;
                    let (indices, _) = self.uniform_slots_mut(stage);
                    indices[slot as usize] = Some(index);
                }
                Err(error) => {
                    log::error!("failed to acquire a uniform buffer: {}", error);
                    return;
                }
            }
        }

        self.track.used_uniform_buffers[index].push(data);
        let (_, need_bind) = self.uniform_slots_mut(stage);
        need_bind[slot as usize] = true;
    }

    pub(crate) fn unmap_uniform_buffers(&mut self) {
        for ub in &self.track.used_uniform_buffers {
            ub.concrete.resource.unmap();
        }
    }

    pub(crate) fn take_uniform_buffers(&mut self) -> Vec<Box<UniformBuffer>> {
        std::mem::take(&mut self.track.used_uniform_buffers)
    }

    // ---------------------------------------------------------------
    // Binding flush

    /// Copy every dirty graphics binding group into the GPU heaps and bind
    /// the resulting tables and root CBVs. Called before each draw.
    pub(crate) fn flush_graphics_bindings(&mut self) {
        let Some(pipeline) = self.bind.graphics_pipeline.clone() else {
            log::error!("draw without a bound graphics pipeline");
            return;
        };
        let p = &pipeline.inner;

        if self.bind.need_vertex_buffer_bind {
            for slot in 0..MAX_VERTEX_BUFFERS {
                if let Some((ref concrete, offset)) = self.bind.vertex_buffers[slot] {
                    self.list.push(Cmd::SetVertexBuffer {
                        slot: slot as u32,
                        resource: concrete.resource.clone(),
                        offset,
                        stride: p.vertex_strides[slot],
                    });
                }
            }
            self.bind.need_vertex_buffer_bind = false;
        }

        let CbInner {
            ref mut list,
            ref mut view_heap,
            ref mut sampler_heap,
            ref mut bind,
            ref track,
            ..
        } = *self;
        let view_heap = view_heap.as_mut().expect("no view heap");
        let sampler_heap = sampler_heap.as_mut().expect("no sampler heap");

        flush_graphics_stage(
            list,
            view_heap,
            sampler_heap,
            &mut bind.vertex,
            &p.vertex_counts,
            &p.root.vertex,
            &track.used_uniform_buffers,
        );
        flush_graphics_stage(
            list,
            view_heap,
            sampler_heap,
            &mut bind.fragment,
            &p.fragment_counts,
            &p.root.fragment,
            &track.used_uniform_buffers,
        );
    }

    /// The compute-side flush. Called before each dispatch.
    pub(crate) fn flush_compute_bindings(&mut self) {
        let Some(pipeline) = self.bind.compute_pipeline.clone() else {
            log::error!("dispatch without a bound compute pipeline");
            return;
        };
        let p = &pipeline.inner;

        let CbInner {
            ref mut list,
            ref mut view_heap,
            ref mut bind,
            ref track,
            ..
        } = *self;
        let view_heap = view_heap.as_mut().expect("no view heap");
        let compute = &mut bind.compute;

        if compute.need_readonly_storage_texture_bind {
            if p.counts.num_readonly_storage_textures > 0 {
                bind_view_table(
                    list,
                    view_heap,
                    &compute.readonly_storage_textures,
                    p.counts.num_readonly_storage_textures,
                    p.root.readonly_storage_texture_table,
                    true,
                );
            }
            compute.need_readonly_storage_texture_bind = false;
        }
        if compute.need_readonly_storage_buffer_bind {
            if p.counts.num_readonly_storage_buffers > 0 {
                bind_view_table(
                    list,
                    view_heap,
                    &compute.readonly_storage_buffers,
                    p.counts.num_readonly_storage_buffers,
                    p.root.readonly_storage_buffer_table,
                    true,
                );
            }
            compute.need_readonly_storage_buffer_bind = false;
        }
        if compute.need_readwrite_storage_texture_bind {
            if p.counts.num_readwrite_storage_textures > 0 {
                bind_view_table(
                    list,
                    view_heap,
                    &compute.readwrite_storage_textures,
                    p.counts.num_readwrite_storage_textures,
                    p.root.readwrite_storage_texture_table,
                    true,
                );
            }
            compute.need_readwrite_storage_texture_bind = false;
        }
        if compute.need_readwrite_storage_buffer_bind {
            if p.counts.num_readwrite_storage_buffers > 0 {
                bind_view_table(
                    list,
                    view_heap,
                    &compute.readwrite_storage_buffers,
                    p.counts.num_readwrite_storage_buffers,
                    p.root.readwrite_storage_buffer_table,
                    true,
                );
            }
            compute.need_readwrite_storage_buffer_bind = false;
        }
        for slot in 0..p.counts.num_uniform_buffers as usize {
            if compute.need_uniform_bind[slot] {
                if let Some(index) = compute.uniform_index[slot] {
                    list.push(Cmd::SetComputeRootCbv {
                        index: p.root.uniform[slot] as u32,
                        address: track.used_uniform_buffers[index].draw_address(),
                    });
                }
                compute.need_uniform_bind[slot] = false;
            }
        }
    }

    // ---------------------------------------------------------------
    // Submission support

    /// Transition every queued back buffer to the present state. Called at
    /// submit, after recording has ended.
    pub(crate) fn transition_present_entries(&mut self) {
        let CbInner {
            ref mut list,
            ref present_entries,
            ..
        } = *self;
        for entry in present_entries {
            let concrete = entry.window.container(entry.swapchain_index).active();
            resstate::transition_texture_from_default(list, &concrete, 0, ResourceState::Present);
        }
    }

    pub(crate) fn take_present_entries(&mut self) -> Vec<PresentEntry> {
        std::mem::take(&mut self.present_entries)
    }

    /// Apply the queued texture-download fixups. Called at retirement, when
    /// the source data is known to be on the host.
    pub(crate) fn apply_texture_downloads(&mut self) {
        for download in self.downloads.drain(..) {
            let dst_ptr = download.dst.resource.map();
            let src_ptr = download.temp.memory.ptr();
            for z in 0..download.depth as u64 {
                for row in 0..download.num_rows as u64 {
                    let src_offset = z * download.aligned_row_pitch * download.num_rows as u64
                        + row * download.aligned_row_pitch;
                    let dst_offset = download.dst_offset
                        + z * download.row_pitch * download.rows_per_slice as u64
                        + row * download.row_pitch;
                    unsafe {
                        std::ptr::copy_nonoverlapping(
                            src_ptr.add(src_offset as usize),
                            dst_ptr.add(dst_offset as usize),
                            download.row_pitch as usize,
                        );
                    }
                }
            }
            download.dst.resource.unmap();
        }
    }

    /// Roll back an uncommitted recording: cancel swapchain acquisitions,
    /// release the tracked resources, and return pooled objects.
    pub(crate) fn abandon(&mut self) {
        let device = self.device().clone();
        for entry in &self.present_entries {
            entry.window.cancel_pending_slot();
        }
        for view in self.take_transient_views() {
            if view.is_valid() {
                device.staging.lock().release(&view);
            }
        }
        self.unmap_uniform_buffers();
        let uniforms = self.take_uniform_buffers();
        for ub in uniforms {
            device.return_uniform_buffer(ub);
        }
        if let Some(heap) = self.view_heap.take() {
            device.return_gpu_heap(DescriptorHeapKind::View, heap);
        }
        if let Some(heap) = self.sampler_heap.take() {
            device.return_gpu_heap(DescriptorHeapKind::Sampler, heap);
        }
        self.downloads.clear();
        self.release_tracked();
        self.list.reset();
    }
}

/// Copy one dirty view group into the view heap and bind it.
fn bind_view_table(
    list: &mut native::CmdList,
    view_heap: &mut GpuHeap,
    slots: &[Option<CpuDescriptor>],
    count: u32,
    root_index: i32,
    compute: bool,
) {
    if root_index < 0 {
        return;
    }
    let Some(start) = view_heap.reserve(count) else {
        log::error!("out of GPU view descriptors for this command buffer");
        return;
    };
    for i in 0..count {
        match slots[i as usize] {
            Some(ref cpu) => copy_descriptor(cpu, view_heap, start + i),
            None => {
                log::error!("binding slot {} was never set", i);
                view_heap.native().write(start + i, DescriptorPayload::Empty);
            }
        }
    }
    let cmd = if compute {
        Cmd::SetComputeRootTable {
            index: root_index as u32,
            heap: view_heap.native().clone(),
            start,
        }
    } else {
        Cmd::SetGraphicsRootTable {
            index: root_index as u32,
            heap: view_heap.native().clone(),
            start,
        }
    };
    list.push(cmd);
}

fn flush_graphics_stage(
    list: &mut native::CmdList,
    view_heap: &mut GpuHeap,
    sampler_heap: &mut GpuHeap,
    stage: &mut GraphicsStageBindings,
    counts: &ShaderResourceCounts,
    indices: &StageRootIndices,
    used_uniforms: &[Box<UniformBuffer>],
) {
    if stage.need_sampler_bind {
        if counts.num_samplers > 0 && indices.sampler_table >= 0 {
            // Samplers and their paired texture SRVs go to separate heaps.
            if let Some(start) = sampler_heap.reserve(counts.num_samplers) {
                for i in 0..counts.num_samplers {
                    match stage.samplers[i as usize] {
                        Some(ref pair) => copy_descriptor(&pair.sampler_cpu, sampler_heap, start + i),
                        None => {
                            log::error!("sampler slot {} was never set", i);
                            sampler_heap
                                .native()
                                .write(start + i, DescriptorPayload::Empty);
                        }
                    }
                }
                list.push(Cmd::SetGraphicsRootTable {
                    index: indices.sampler_table as u32,
                    heap: sampler_heap.native().clone(),
                    start,
                });
            } else {
                log::error!("out of GPU sampler descriptors for this command buffer");
            }

            if let Some(start) = view_heap.reserve(counts.num_samplers) {
                for i in 0..counts.num_samplers {
                    match stage.samplers[i as usize] {
                        Some(ref pair) => copy_descriptor(&pair.texture_cpu, view_heap, start + i),
                        None => {
                            view_heap.native().write(start + i, DescriptorPayload::Empty);
                        }
                    }
                }
                list.push(Cmd::SetGraphicsRootTable {
                    index: indices.sampled_texture_table as u32,
                    heap: view_heap.native().clone(),
                    start,
                });
            } else {
                log::error!("out of GPU view descriptors for this command buffer");
            }
        }
        stage.need_sampler_bind = false;
    }

    if stage.need_storage_texture_bind {
        if counts.num_storage_textures > 0 {
            bind_view_table(
                list,
                view_heap,
                &stage.storage_textures,
                counts.num_storage_textures,
                indices.storage_texture_table,
                false,
            );
        }
        stage.need_storage_texture_bind = false;
    }

    if stage.need_storage_buffer_bind {
        if counts.num_storage_buffers > 0 {
            bind_view_table(
                list,
                view_heap,
                &stage.storage_buffers,
                counts.num_storage_buffers,
                indices.storage_buffer_table,
                false,
            );
        }
        stage.need_storage_buffer_bind = false;
    }

    for slot in 0..counts.num_uniform_buffers as usize {
        if stage.need_uniform_bind[slot] {
            if let Some(index) = stage.uniform_index[slot] {
                list.push(Cmd::SetGraphicsRootCbv {
                    index: indices.uniform[slot] as u32,
                    address: used_uniforms[index].draw_address(),
                });
            }
            stage.need_uniform_bind[slot] = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Device, DeviceOptions};
    use crate::UNIFORM_BUFFER_POOL_ELEMENT_SIZE;

    fn device() -> Device {
        Device::new(&DeviceOptions::default()).unwrap()
    }

    /// The data a draw would read from a uniform slot is the data of the most
    /// recent push to that slot: every push snapshots its own draw offset,
    /// and slots never share a block.
    #[test]
    fn uniform_pushes_snapshot_draw_offsets() {
        let device = device();
        let mut cmd_buffer = device.acquire_cmd_buffer().unwrap();
        let inner = cmd_buffer.inner_mut();

        inner.push_uniform_data(ShaderStage::Vertex, 0, &[0xaa; 16]);
        inner.push_uniform_data(ShaderStage::Vertex, 0, &[0xbb; 16]);
        inner.push_uniform_data(ShaderStage::Vertex, 1, &[0xcc; 16]);

        let slot0 = inner.bind.vertex.uniform_index[0].unwrap();
        let slot1 = inner.bind.vertex.uniform_index[1].unwrap();
        assert_ne!(slot0, slot1, "slots share a wrapper");

        let ub0 = &inner.track.used_uniform_buffers[slot0];
        assert_eq!(ub0.draw_offset, 256, "second push did not snapshot");
        assert_eq!(ub0.write_offset, 512);
        let bytes =
            unsafe { std::slice::from_raw_parts(ub0.concrete.resource.memory.ptr(), 512) };
        assert!(bytes[0..16].iter().all(|&b| b == 0xaa));
        assert!(bytes[256..272].iter().all(|&b| b == 0xbb));

        let ub1 = &inner.track.used_uniform_buffers[slot1];
        assert_eq!(ub1.draw_offset, 0);
    }

    /// An exhausted wrapper stays on the used list; a fresh one takes over
    /// the slot with reset offsets.
    #[test]
    fn uniform_exhaustion_rolls_to_a_new_wrapper() {
        let device = device();
        let mut cmd_buffer = device.acquire_cmd_buffer().unwrap();
        let inner = cmd_buffer.inner_mut();

        let pushes = UNIFORM_BUFFER_POOL_ELEMENT_SIZE / 1024;
        for _ in 0..pushes {
            inner.push_uniform_data(ShaderStage::Compute, 0, &[1u8; 1024]);
        }
        assert_eq!(inner.track.used_uniform_buffers.len(), 1);

        inner.push_uniform_data(ShaderStage::Compute, 0, &[2u8; 1024]);
        assert_eq!(inner.track.used_uniform_buffers.len(), 2);

        let index = inner.bind.compute.uniform_index[0].unwrap();
        let current = &inner.track.used_uniform_buffers[index];
        assert_eq!(current.draw_offset, 0);
        assert_eq!(current.write_offset, 1024);
    }

    /// A retired command buffer returns its wrappers to the device pool, and
    /// the next acquisition reuses them with reset offsets.
    #[test]
    fn uniform_wrappers_return_to_the_pool() {
        let device = device();

        let mut cmd_buffer = device.acquire_cmd_buffer().unwrap();
        cmd_buffer.push_vertex_uniform_data(0, &[3u8; 64]);
        cmd_buffer.commit().unwrap();
        device.wait_idle();

        let mut cmd_buffer = device.acquire_cmd_buffer().unwrap();
        let inner = cmd_buffer.inner_mut();
        inner.push_uniform_data(ShaderStage::Vertex, 0, &[4u8; 64]);
        let index = inner.bind.vertex.uniform_index[0].unwrap();
        let ub = &inner.track.used_uniform_buffers[index];
        assert_eq!(ub.draw_offset, 0, "pooled wrapper kept stale offsets");
    }
}
