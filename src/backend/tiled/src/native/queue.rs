//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! The execution queue of the software runtime.
//!
//! Commands execute on a dedicated worker thread to model the asynchronous
//! device timeline. The executor maintains the *actual* state of every
//! sub-resource, checks each recorded transition and operand state against
//! it, applies copy commands to resource memory, and signals fences. State
//! violations are reported through the device's debug-message channel — the
//! software equivalent of a debug layer.
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::Arc;
use std::thread;

use ringfx_base::IndexFormat;
use ringfx_common::{Extent3D, Offset3D};

use super::list::Cmd;
use super::pipeline::{IndirectSignature, PipelineKind, PipelineStateRef, RootParam, RootSignatureRef, TableKind};
use super::resource::{HeapClass, ResourceRef, ResourceState};
use super::swapchain::Swapchain;
use super::{DebugSink, VaMap};

/// A fence of the software runtime: a monotonically increasing 64-bit value
/// plus a process-wide event used for blocking waits.
#[derive(Debug)]
pub(crate) struct Fence {
    value: AtomicU64,
    event: Arc<FenceEvent>,
}

/// The event the device's fences share. A single condvar is enough because
/// waits re-check fence values after every wakeup.
#[derive(Debug, Default)]
pub(crate) struct FenceEvent {
    mutex: Mutex<()>,
    condvar: Condvar,
}

pub(crate) type FenceRef = Arc<Fence>;

impl Fence {
    pub(crate) fn new(event: Arc<FenceEvent>) -> Self {
        Self {
            value: AtomicU64::new(0),
            event,
        }
    }

    pub(crate) fn completed_value(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }

    pub(crate) fn signal(&self, value: u64) {
        self.value.fetch_max(value, Ordering::AcqRel);
        let _guard = self.event.mutex.lock();
        self.event.condvar.notify_all();
    }

    /// Reset to the unsignalled value. Only valid while no wait is pending.
    pub(crate) fn reset(&self) {
        self.value.store(0, Ordering::Release);
    }

    pub(crate) fn wait_value(&self, value: u64) {
        let mut guard = self.event.mutex.lock();
        while self.completed_value() < value {
            self.event.condvar.wait(&mut guard);
        }
    }
}

/// Block until one (`wait_all == false`) or all of `fences` reach `value`.
pub(crate) fn wait_fences(fences: &[&Fence], wait_all: bool, value: u64) {
    let Some(first) = fences.first() else {
        return;
    };
    let event = &first.event;
    let mut guard = event.mutex.lock();
    loop {
        let reached = fences.iter().filter(|f| f.completed_value() >= value).count();
        let done = if wait_all {
            reached == fences.len()
        } else {
            reached > 0
        };
        if done {
            return;
        }
        event.condvar.wait(&mut guard);
    }
}

pub(crate) enum Task {
    Execute(Vec<Cmd>),
    Signal(FenceRef, u64),
    Present(Arc<Swapchain>, u32),
    /// Run a completion callback on the execution thread, after everything
    /// queued before it.
    Callback(Box<dyn FnOnce() + Send>),
}

/// The execution queue. Dropping the queue hangs up the channel and joins the
/// worker thread.
#[derive(Debug)]
pub(crate) struct Queue {
    sender: Mutex<Option<SyncSender<Task>>>,
    join_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Queue {
    pub(crate) fn new(debug: DebugSink, va_map: VaMap) -> Self {
        let (sender, receiver) = sync_channel(64);
        let join_handle = thread::Builder::new()
            .name("ringfx-tiled queue".to_owned())
            .spawn(move || executor_thread(receiver, debug, va_map))
            .expect("failed to spawn the queue thread");
        Self {
            sender: Mutex::new(Some(sender)),
            join_handle: Mutex::new(Some(join_handle)),
        }
    }

    fn send(&self, task: Task) {
        let guard = self.sender.lock();
        let sender = guard.as_ref().expect("queue is shut down");
        sender.send(task).expect("queue thread is gone");
    }

    pub(crate) fn execute(&self, cmds: Vec<Cmd>) {
        self.send(Task::Execute(cmds));
    }

    pub(crate) fn signal(&self, fence: &FenceRef, value: u64) {
        self.send(Task::Signal(fence.clone(), value));
    }

    pub(crate) fn present(&self, swapchain: &Arc<Swapchain>, index: u32) {
        self.send(Task::Present(swapchain.clone(), index));
    }

    pub(crate) fn after_signal(&self, callback: Box<dyn FnOnce() + Send>) {
        self.send(Task::Callback(callback));
    }
}

impl Drop for Queue {
    fn drop(&mut self) {
        *self.sender.lock() = None;
        let join_handle = self.join_handle.lock().take();
        if let Some(handle) = join_handle {
            if thread::current().id() != handle.thread().id() {
                let _ = handle.join();
            }
        }
    }
}

fn executor_thread(receiver: Receiver<Task>, debug: DebugSink, va_map: VaMap) {
    for task in receiver.iter() {
        match task {
            Task::Execute(cmds) => {
                let mut exec = Executor {
                    debug: &debug,
                    va_map: &va_map,
                    state: ExecState::default(),
                };
                for cmd in &cmds {
                    exec.run(cmd);
                }
            }
            Task::Signal(fence, value) => {
                fence.signal(value);
            }
            Task::Present(swapchain, index) => {
                swapchain.do_present(index, &debug);
            }
            Task::Callback(callback) => {
                callback();
            }
        }
    }
}

/// Transient bound state of one command-list execution. Native lists start
/// from a clean slate.
#[derive(Default)]
struct ExecState {
    graphics_root: Option<RootSignatureRef>,
    compute_root: Option<RootSignatureRef>,
    pipeline: Option<PipelineStateRef>,
    heaps_set: bool,
    render_targets: Vec<(ResourceRef, u32)>,
    depth_stencil: Option<(ResourceRef, u32)>,
    viewport_set: bool,
    scissor_set: bool,
    graphics_tables: HashMap<u32, (super::heap::DescriptorHeapRef, u32)>,
    compute_tables: HashMap<u32, (super::heap::DescriptorHeapRef, u32)>,
    graphics_cbvs: HashMap<u32, u64>,
    compute_cbvs: HashMap<u32, u64>,
    vertex_buffers: HashMap<u32, (ResourceRef, u64, u32)>,
    index_buffer: Option<(ResourceRef, u64, IndexFormat)>,
}

struct Executor<'a> {
    debug: &'a DebugSink,
    va_map: &'a VaMap,
    state: ExecState,
}

impl<'a> Executor<'a> {
    fn report(&self, message: String) {
        self.debug.report(message);
    }

    fn resource_name(resource: &ResourceRef) -> String {
        resource
            .label()
            .unwrap_or_else(|| format!("unnamed resource {:?}", resource.id))
    }

    fn actual_state(&self, resource: &ResourceRef, subresource: u32) -> ResourceState {
        resource.states.lock()[subresource as usize]
    }

    /// Check that a sub-resource can be accessed in one of `required` states.
    /// `Common` promotes; upload and readback resources have fixed access
    /// rights independent of barriers.
    fn check_state(
        &self,
        resource: &ResourceRef,
        subresource: u32,
        required: &[ResourceState],
        what: &str,
    ) {
        match resource.heap_class {
            HeapClass::Upload => {
                let readable = required.iter().any(|s| {
                    matches!(
                        s,
                        ResourceState::CopySource
                            | ResourceState::VertexAndConstantBuffer
                            | ResourceState::IndexBuffer
                            | ResourceState::AllShaderResource
                            | ResourceState::NonPixelShaderResource
                            | ResourceState::IndirectArgument
                    )
                });
                if !readable {
                    self.report(format!("{}: upload-heap resource used for writing", what));
                }
            }
            HeapClass::Readback => {
                if !required.contains(&ResourceState::CopyDest) {
                    self.report(format!(
                        "{}: readback-heap resource used for anything but copy writes",
                        what
                    ));
                }
            }
            HeapClass::Default => {
                let actual = self.actual_state(resource, subresource);
                if actual != ResourceState::Common && !required.contains(&actual) {
                    self.report(format!(
                        "{}: sub-resource {} of {} is in state {:?}, required one of {:?}",
                        what,
                        subresource,
                        Self::resource_name(resource),
                        actual,
                        required
                    ));
                }
            }
        }
    }

    fn run(&mut self, cmd: &Cmd) {
        match cmd {
            Cmd::Transition {
                resource,
                subresource,
                from,
                to,
            } => self.transition(resource, *subresource, *from, *to),
            Cmd::UavBarrier { .. } => {}
            Cmd::ClearRtv {
                resource,
                subresource,
                value,
            } => {
                self.check_state(resource, *subresource, &[ResourceState::RenderTarget], "clear");
                clear_color(resource, *subresource, *value);
            }
            Cmd::ClearDsv {
                resource,
                subresource,
                depth,
                stencil,
            } => {
                self.check_state(resource, *subresource, &[ResourceState::DepthWrite], "clear");
                clear_depth_stencil(resource, *subresource, *depth, *stencil);
            }
            Cmd::SetRenderTargets {
                colors,
                depth_stencil,
            } => {
                self.state.render_targets = colors.clone();
                self.state.depth_stencil = depth_stencil.clone();
            }
            Cmd::SetViewport(_) => self.state.viewport_set = true,
            Cmd::SetScissor(_) => self.state.scissor_set = true,
            Cmd::SetDescriptorHeaps { view, sampler } => {
                if !view.shader_visible || !sampler.shader_visible {
                    self.report("non-shader-visible heap bound for shading".to_owned());
                }
                self.state.heaps_set = true;
            }
            Cmd::SetGraphicsRootSignature(sig) => {
                self.state.graphics_root = Some(sig.clone());
                self.state.graphics_tables.clear();
                self.state.graphics_cbvs.clear();
            }
            Cmd::SetComputeRootSignature(sig) => {
                self.state.compute_root = Some(sig.clone());
                self.state.compute_tables.clear();
                self.state.compute_cbvs.clear();
            }
            Cmd::SetPipelineState(pso) => self.state.pipeline = Some(pso.clone()),
            Cmd::SetPrimitiveTopology(_)
            | Cmd::SetBlendFactor(_)
            | Cmd::SetStencilReference(_)
            | Cmd::Marker(_)
            | Cmd::BeginGroup(_)
            | Cmd::EndGroup => {}
            Cmd::SetGraphicsRootTable { index, heap, start } => {
                self.state
                    .graphics_tables
                    .insert(*index, (heap.clone(), *start));
            }
            Cmd::SetComputeRootTable { index, heap, start } => {
                self.state
                    .compute_tables
                    .insert(*index, (heap.clone(), *start));
            }
            Cmd::SetGraphicsRootCbv { index, address } => {
                self.state.graphics_cbvs.insert(*index, *address);
            }
            Cmd::SetComputeRootCbv { index, address } => {
                self.state.compute_cbvs.insert(*index, *address);
            }
            Cmd::SetVertexBuffer {
                slot,
                resource,
                offset,
                stride,
            } => {
                self.state
                    .vertex_buffers
                    .insert(*slot, (resource.clone(), *offset, *stride));
            }
            Cmd::SetIndexBuffer {
                resource,
                offset,
                format,
            } => {
                self.state.index_buffer = Some((resource.clone(), *offset, *format));
            }
            Cmd::Draw { .. } | Cmd::DrawIndexed { .. } => self.validate_draw(matches!(cmd, Cmd::DrawIndexed { .. })),
            Cmd::Dispatch { .. } => self.validate_dispatch(),
            Cmd::ExecuteIndirect {
                signature,
                resource,
                offset,
            } => self.execute_indirect(*signature, resource, *offset),
            Cmd::CopyBufferRegion {
                src,
                src_offset,
                dst,
                dst_offset,
                size,
            } => self.copy_buffer_region(src, *src_offset, dst, *dst_offset, *size),
            Cmd::CopyBufferToTexture {
                src,
                src_offset,
                src_row_pitch,
                src_rows_per_slice,
                dst,
                dst_subresource,
                dst_origin,
                extent,
            } => self.copy_buffer_to_texture(
                src,
                *src_offset,
                *src_row_pitch,
                *src_rows_per_slice,
                dst,
                *dst_subresource,
                *dst_origin,
                *extent,
            ),
            Cmd::CopyTextureToBuffer {
                src,
                src_subresource,
                src_origin,
                extent,
                dst,
                dst_offset,
                dst_row_pitch,
            } => self.copy_texture_to_buffer(
                src,
                *src_subresource,
                *src_origin,
                *extent,
                dst,
                *dst_offset,
                *dst_row_pitch,
            ),
            Cmd::CopyTextureRegion {
                src,
                src_subresource,
                src_origin,
                dst,
                dst_subresource,
                dst_origin,
                extent,
            } => self.copy_texture_region(
                src,
                *src_subresource,
                *src_origin,
                dst,
                *dst_subresource,
                *dst_origin,
                *extent,
            ),
        }
    }

    fn transition(
        &mut self,
        resource: &ResourceRef,
        subresource: Option<u32>,
        from: ResourceState,
        to: ResourceState,
    ) {
        if resource.heap_class != HeapClass::Default {
            self.report("transition on an upload/readback-heap resource".to_owned());
            return;
        }
        let mut states = resource.states.lock();
        let range = match subresource {
            Some(index) => {
                if index as usize >= states.len() {
                    self.report(format!("transition: sub-resource {} out of bounds", index));
                    return;
                }
                index as usize..index as usize + 1
            }
            None => 0..states.len(),
        };
        for i in range {
            let actual = states[i];
            if actual != from && actual != ResourceState::Common {
                self.report(format!(
                    "transition: sub-resource {} of {} is in state {:?}, barrier claims {:?}",
                    i,
                    Self::resource_name(resource),
                    actual,
                    from
                ));
            }
            states[i] = to;
        }
    }

    fn validate_draw(&mut self, indexed: bool) {
        let Some(pipeline) = self.state.pipeline.clone() else {
            self.report("draw without a bound pipeline".to_owned());
            return;
        };
        match pipeline.kind {
            PipelineKind::Graphics {
                num_color_targets,
                has_depth_stencil,
                ..
            } => {
                if self.state.render_targets.len() != num_color_targets as usize {
                    self.report(format!(
                        "draw: pipeline expects {} color targets, {} bound",
                        num_color_targets,
                        self.state.render_targets.len()
                    ));
                }
                if has_depth_stencil && self.state.depth_stencil.is_none() {
                    self.report("draw: pipeline expects a depth-stencil target".to_owned());
                }
            }
            PipelineKind::Compute => {
                self.report("draw with a compute pipeline bound".to_owned());
                return;
            }
        }
        if !self.state.viewport_set || !self.state.scissor_set {
            self.report("draw without viewport/scissor".to_owned());
        }
        for (resource, subresource) in self.state.render_targets.clone() {
            self.check_state(
                &resource,
                subresource,
                &[ResourceState::RenderTarget],
                "draw color target",
            );
        }
        if let Some((resource, subresource)) = self.state.depth_stencil.clone() {
            self.check_state(
                &resource,
                subresource,
                &[ResourceState::DepthWrite],
                "draw depth-stencil target",
            );
        }
        for (resource, _, _) in self.state.vertex_buffers.clone().into_values() {
            self.check_state(
                &resource,
                0,
                &[ResourceState::VertexAndConstantBuffer],
                "draw vertex buffer",
            );
        }
        if indexed {
            match self.state.index_buffer.clone() {
                Some((resource, _, _)) => self.check_state(
                    &resource,
                    0,
                    &[ResourceState::IndexBuffer],
                    "draw index buffer",
                ),
                None => self.report("indexed draw without an index buffer".to_owned()),
            }
        }
        let root = self.state.graphics_root.clone();
        self.validate_root_bindings(root.as_deref(), &pipeline, false);
    }

    fn validate_dispatch(&mut self) {
        let Some(pipeline) = self.state.pipeline.clone() else {
            self.report("dispatch without a bound pipeline".to_owned());
            return;
        };
        if !matches!(pipeline.kind, PipelineKind::Compute) {
            self.report("dispatch with a graphics pipeline bound".to_owned());
            return;
        }
        let root = self.state.compute_root.clone();
        self.validate_root_bindings(root.as_deref(), &pipeline, true);
    }

    fn validate_root_bindings(
        &mut self,
        root: Option<&super::pipeline::RootSignature>,
        pipeline: &PipelineStateRef,
        compute: bool,
    ) {
        let what = if compute { "dispatch" } else { "draw" };
        let Some(root) = root else {
            self.report(format!("{}: no root signature bound", what));
            return;
        };
        if root.id != pipeline.root_signature.id {
            self.report(format!(
                "{}: bound root signature does not match the pipeline's",
                what
            ));
        }
        let (tables, cbvs) = if compute {
            (&self.state.compute_tables, &self.state.compute_cbvs)
        } else {
            (&self.state.graphics_tables, &self.state.graphics_cbvs)
        };
        let mut problems = Vec::new();
        for (index, param) in root.params.iter().enumerate() {
            match *param {
                RootParam::Table { kind, count } => {
                    let Some((heap, start)) = tables.get(&(index as u32)) else {
                        problems.push(format!(
                            "{}: root table {} ({:?}) not bound",
                            what, index, kind
                        ));
                        continue;
                    };
                    if !self.state.heaps_set {
                        problems.push(format!("{}: no descriptor heaps set", what));
                    }
                    for slot in 0..count {
                        let payload = heap.read(start + slot);
                        self.validate_table_slot(kind, &payload, compute, &mut problems, what);
                    }
                }
                RootParam::Cbv => {
                    let Some(address) = cbvs.get(&(index as u32)) else {
                        problems.push(format!("{}: root CBV {} not bound", what, index));
                        continue;
                    };
                    match self.resolve_va(*address) {
                        Some((resource, offset)) => {
                            if resource.heap_class != HeapClass::Upload {
                                problems.push(format!(
                                    "{}: root CBV {} does not point at an upload-heap resource",
                                    what, index
                                ));
                            }
                            if offset >= resource.buffer_size() {
                                problems.push(format!(
                                    "{}: root CBV {} offset {} out of bounds",
                                    what, index, offset
                                ));
                            }
                        }
                        None => problems.push(format!(
                            "{}: root CBV {} address {:#x} resolves to no resource",
                            what, index, address
                        )),
                    }
                }
            }
        }
        for problem in problems {
            self.report(problem);
        }
    }

    fn validate_table_slot(
        &self,
        kind: TableKind,
        payload: &super::heap::DescriptorPayload,
        compute: bool,
        problems: &mut Vec<String>,
        what: &str,
    ) {
        use super::heap::DescriptorPayload as P;
        match (kind, payload) {
            (TableKind::Sampler, P::Sampler(_)) => {}
            (
                TableKind::Srv,
                P::Srv {
                    resource,
                    first_subresource,
                    num_subresources,
                },
            ) => {
                let required: &[ResourceState] = if compute {
                    &[
                        ResourceState::NonPixelShaderResource,
                        ResourceState::AllShaderResource,
                    ]
                } else {
                    &[ResourceState::AllShaderResource]
                };
                for sub in *first_subresource..*first_subresource + *num_subresources {
                    self.check_state(resource, sub, required, what);
                }
            }
            (
                TableKind::Uav,
                P::Uav {
                    resource,
                    subresource,
                },
            ) => {
                self.check_state(
                    resource,
                    *subresource,
                    &[ResourceState::UnorderedAccess],
                    what,
                );
            }
            (_, P::Empty) => {
                problems.push(format!("{}: uninitialized descriptor in a bound table", what));
            }
            _ => {
                problems.push(format!(
                    "{}: descriptor payload does not match table kind {:?}",
                    what, kind
                ));
            }
        }
    }

    fn resolve_va(&self, address: u64) -> Option<(ResourceRef, u64)> {
        let map = self.va_map.lock();
        let (base, weak) = map.range(..=address).next_back()?;
        let resource = weak.upgrade()?;
        let offset = address - base;
        if offset < resource.buffer_size() {
            Some((resource, offset))
        } else {
            None
        }
    }

    fn execute_indirect(&mut self, signature: IndirectSignature, resource: &ResourceRef, offset: u64) {
        self.check_state(resource, 0, &[ResourceState::IndirectArgument], "indirect");
        let end = offset + signature.stride();
        if end > resource.buffer_size() {
            self.report("indirect: argument range out of bounds".to_owned());
            return;
        }
        match signature {
            IndirectSignature::Draw | IndirectSignature::DrawIndexed => {
                self.validate_draw(signature == IndirectSignature::DrawIndexed)
            }
            IndirectSignature::Dispatch => self.validate_dispatch(),
        }
    }

    fn copy_buffer_region(
        &mut self,
        src: &ResourceRef,
        src_offset: u64,
        dst: &ResourceRef,
        dst_offset: u64,
        size: u64,
    ) {
        self.check_state(src, 0, &[ResourceState::CopySource], "copy source");
        self.check_state(dst, 0, &[ResourceState::CopyDest], "copy destination");
        if src_offset + size > src.buffer_size() || dst_offset + size > dst.buffer_size() {
            self.report("buffer copy out of bounds".to_owned());
            return;
        }
        unsafe {
            dst.memory
                .copy_from(dst_offset as usize, &src.memory, src_offset as usize, size as usize);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn copy_buffer_to_texture(
        &mut self,
        src: &ResourceRef,
        src_offset: u64,
        src_row_pitch: u64,
        src_rows_per_slice: u32,
        dst: &ResourceRef,
        dst_subresource: u32,
        dst_origin: Offset3D,
        extent: Extent3D,
    ) {
        self.check_state(src, 0, &[ResourceState::CopySource], "copy source");
        self.check_state(dst, dst_subresource, &[ResourceState::CopyDest], "copy destination");
        self.copy_texture_rows(
            src,
            src_offset,
            src_row_pitch,
            src_rows_per_slice,
            dst,
            dst_subresource,
            dst_origin,
            extent,
            true,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn copy_texture_to_buffer(
        &mut self,
        src: &ResourceRef,
        src_subresource: u32,
        src_origin: Offset3D,
        extent: Extent3D,
        dst: &ResourceRef,
        dst_offset: u64,
        dst_row_pitch: u64,
    ) {
        self.check_state(src, src_subresource, &[ResourceState::CopySource], "copy source");
        self.check_state(dst, 0, &[ResourceState::CopyDest], "copy destination");
        let (_, bh) = src.texture_desc().format.block_dim();
        self.copy_texture_rows(
            dst,
            dst_offset,
            dst_row_pitch,
            (extent.height + bh - 1) / bh,
            src,
            src_subresource,
            src_origin,
            extent,
            false,
        );
    }

    /// The footprint copy shared by both buffer↔texture directions.
    /// `buffer_to_texture` selects which side is the destination.
    #[allow(clippy::too_many_arguments)]
    fn copy_texture_rows(
        &mut self,
        buffer: &ResourceRef,
        buffer_offset: u64,
        buffer_row_pitch: u64,
        buffer_rows_per_slice: u32,
        texture: &ResourceRef,
        subresource: u32,
        origin: Offset3D,
        extent: Extent3D,
        buffer_to_texture: bool,
    ) {
        let desc = *texture.texture_desc();
        let level = subresource % desc.level_count;
        let (level_w, level_h, level_d) = desc.level_extent(level);
        if origin.x + extent.width > level_w
            || origin.y + extent.height > level_h
            || origin.z + extent.depth > level_d
        {
            self.report("texture copy region out of bounds".to_owned());
            return;
        }
        let (bw, bh) = desc.format.block_dim();
        if origin.x % bw != 0 || origin.y % bh != 0 {
            self.report("texture copy origin is not block aligned".to_owned());
            return;
        }
        let block_size = desc.format.texel_block_size() as u64;
        let copy_blocks_w = ((extent.width + bw - 1) / bw) as u64;
        let copy_blocks_h = (extent.height + bh - 1) / bh;
        let level_blocks_h = ((level_h + bh - 1) / bh) as u64;
        let level_row_pitch = desc.row_pitch(level);
        let sub_base = texture.subresource_offset(subresource);
        let row_bytes = copy_blocks_w * block_size;

        for z in 0..extent.depth {
            for row in 0..copy_blocks_h {
                let buffer_row = buffer_offset
                    + z as u64 * buffer_row_pitch * buffer_rows_per_slice as u64
                    + row as u64 * buffer_row_pitch;
                let texture_row = sub_base
                    + ((origin.z + z) as u64 * level_blocks_h
                        + (origin.y / bh + row) as u64)
                        * level_row_pitch
                    + (origin.x / bw) as u64 * block_size;
                let buffer_end = buffer_row + row_bytes;
                let texture_end = texture_row + row_bytes;
                if buffer_end > buffer.memory.len() as u64 || texture_end > texture.memory.len() as u64
                {
                    self.report("texture copy row out of bounds".to_owned());
                    return;
                }
                unsafe {
                    if buffer_to_texture {
                        texture.memory.copy_from(
                            texture_row as usize,
                            &buffer.memory,
                            buffer_row as usize,
                            row_bytes as usize,
                        );
                    } else {
                        buffer.memory.copy_from(
                            buffer_row as usize,
                            &texture.memory,
                            texture_row as usize,
                            row_bytes as usize,
                        );
                    }
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn copy_texture_region(
        &mut self,
        src: &ResourceRef,
        src_subresource: u32,
        src_origin: Offset3D,
        dst: &ResourceRef,
        dst_subresource: u32,
        dst_origin: Offset3D,
        extent: Extent3D,
    ) {
        self.check_state(src, src_subresource, &[ResourceState::CopySource], "copy source");
        self.check_state(dst, dst_subresource, &[ResourceState::CopyDest], "copy destination");
        let src_desc = *src.texture_desc();
        let dst_desc = *dst.texture_desc();
        if src_desc.format.texel_block_size() != dst_desc.format.texel_block_size()
            || src_desc.format.block_dim() != dst_desc.format.block_dim()
        {
            self.report("texture copy between incompatible formats".to_owned());
            return;
        }
        // Route through a scratch footprint so overlapping rows stay simple.
        let (bw, bh) = src_desc.format.block_dim();
        let blocks_w = ((extent.width + bw - 1) / bw) as u64;
        let blocks_h = (extent.height + bh - 1) / bh;
        let row_pitch = blocks_w * src_desc.format.texel_block_size() as u64;
        let scratch = super::resource::Resource::new_buffer(
            row_pitch * blocks_h as u64 * extent.depth as u64,
            HeapClass::Default,
            ResourceState::Common,
            0,
        );
        let scratch = Arc::new(scratch);
        {
            let mut states = scratch.states.lock();
            states[0] = ResourceState::CopyDest;
        }
        self.copy_texture_rows(
            &scratch,
            0,
            row_pitch,
            blocks_h,
            src,
            src_subresource,
            src_origin,
            extent,
            false,
        );
        {
            let mut states = scratch.states.lock();
            states[0] = ResourceState::CopySource;
        }
        self.copy_texture_rows(
            &scratch,
            0,
            row_pitch,
            blocks_h,
            dst,
            dst_subresource,
            dst_origin,
            extent,
            true,
        );
    }
}

fn clear_color(resource: &ResourceRef, subresource: u32, value: [f32; 4]) {
    let desc = *resource.texture_desc();
    let level = subresource % desc.level_count;
    let size = desc.subresource_size(level) as usize;
    let base = resource.subresource_offset(subresource) as usize;
    let to_unorm = |x: f32| (x.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
    use ringfx_base::TextureFormat::*;
    let texel: Option<[u8; 4]> = match desc.format {
        R8G8B8A8Unorm | R8G8B8A8UnormSrgb => Some([
            to_unorm(value[0]),
            to_unorm(value[1]),
            to_unorm(value[2]),
            to_unorm(value[3]),
        ]),
        B8G8R8A8Unorm | B8G8R8A8UnormSrgb => Some([
            to_unorm(value[2]),
            to_unorm(value[1]),
            to_unorm(value[0]),
            to_unorm(value[3]),
        ]),
        _ => None,
    };
    unsafe {
        let ptr = resource.memory.ptr().add(base);
        match texel {
            Some(texel) => {
                for i in 0..size / 4 {
                    std::ptr::copy_nonoverlapping(texel.as_ptr(), ptr.add(i * 4), 4);
                }
            }
            None => {
                // Formats without a byte-exact software clear are zero filled.
                std::ptr::write_bytes(ptr, 0, size);
            }
        }
    }
}

fn clear_depth_stencil(
    resource: &ResourceRef,
    subresource: u32,
    depth: Option<f32>,
    stencil: Option<u8>,
) {
    let desc = *resource.texture_desc();
    let level = subresource % desc.level_count;
    let size = desc.subresource_size(level) as usize;
    let base = resource.subresource_offset(subresource) as usize;
    use ringfx_base::TextureFormat::*;
    unsafe {
        let ptr = resource.memory.ptr().add(base);
        match desc.format {
            D32Float => {
                if let Some(depth) = depth {
                    let bits = depth.to_le_bytes();
                    for i in 0..size / 4 {
                        std::ptr::copy_nonoverlapping(bits.as_ptr(), ptr.add(i * 4), 4);
                    }
                }
            }
            D16Unorm => {
                if let Some(depth) = depth {
                    let bits = ((depth.clamp(0.0, 1.0) * 65535.0) as u16).to_le_bytes();
                    for i in 0..size / 2 {
                        std::ptr::copy_nonoverlapping(bits.as_ptr(), ptr.add(i * 2), 2);
                    }
                }
            }
            D24UnormS8Uint => {
                let depth_bits = ((depth.unwrap_or(0.0).clamp(0.0, 1.0) * 16777215.0) as u32)
                    .to_le_bytes();
                for i in 0..size / 4 {
                    let texel = ptr.add(i * 4);
                    if depth.is_some() {
                        std::ptr::copy_nonoverlapping(depth_bits.as_ptr(), texel, 3);
                    }
                    if let Some(stencil) = stencil {
                        *texel.add(3) = stencil;
                    }
                }
            }
            _ => {}
        }
    }
}
