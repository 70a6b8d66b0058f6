//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! The device: object creation, the pools, and the submission engine.
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock, Weak};

use ringfx_base::error::Result;
use ringfx_base::{Backend, SamplerDesc};

use crate::blit::BlitPipelines;
use crate::buffer::{BufferBuilder, TransferBufferBuilder};
use crate::cmd::buffer::{CbInner, CmdBuffer};
use crate::cmd::fence::{Fence, FenceInner};
use crate::descriptor::{GpuHeap, StagingHeap, StagingHeaps, StagingKind};
use crate::limits::DeviceCaps;
use crate::native;
use crate::native::DescriptorHeapKind;
use crate::pipeline::{ComputePipelineBuilder, GraphicsPipelineBuilder};
use crate::sampler::Sampler;
use crate::shader::ShaderBuilder;
use crate::swapchain::WindowData;
use crate::texture::TextureBuilder;
use crate::uniform::UniformBuffer;
use crate::{
    FENCE_SIGNALED_VALUE, SAMPLER_GPU_DESCRIPTOR_COUNT, TARGET_STAGING_DESCRIPTOR_COUNT,
    VIEW_GPU_DESCRIPTOR_COUNT, VIEW_SAMPLER_STAGING_DESCRIPTOR_COUNT,
};

/// Options for device creation.
#[derive(Debug, Clone)]
pub struct DeviceOptions {
    /// Enable the runtime's validation reporting.
    pub debug: bool,
    /// Prefer a low-power adapter where there is a choice.
    pub prefer_low_power: bool,
    /// The default vertex-input semantic name consumed by shader reflection.
    pub vertex_semantic_name: String,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self {
            debug: false,
            prefer_low_power: false,
            vertex_semantic_name: "TEXCOORD".to_owned(),
        }
    }
}

/// Free-list and pool depths, exposed for capacity planning and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceDiagnostics {
    pub view_staging_inactive: usize,
    pub sampler_staging_inactive: usize,
    pub rtv_staging_inactive: usize,
    pub dsv_staging_inactive: usize,
    /// The number of fences resting in the device's pool.
    pub fence_pool_size: usize,
}

/// The device handle. Cloning is cheap; all clones refer to the same device.
#[derive(Debug, Clone)]
pub struct Device {
    pub(crate) shared: DeviceRef,
}

pub(crate) type DeviceRef = Arc<DeviceShared>;

#[derive(Debug)]
pub(crate) struct DeviceShared {
    pub(crate) native: native::NativeDevice,
    pub(crate) queue: native::Queue,
    pub(crate) caps: DeviceCaps,
    pub(crate) options: DeviceOptions,

    /// All four staging allocators behind the single staging lock. Shared
    /// with every live resource so descriptor release does not need the
    /// device itself.
    pub(crate) staging: Arc<Mutex<StagingHeaps>>,
    gpu_view_heap_pool: Mutex<Vec<GpuHeap>>,
    gpu_sampler_heap_pool: Mutex<Vec<GpuHeap>>,

    cb_pool: Mutex<Vec<Box<CbInner>>>,
    submitted: Mutex<Vec<Box<CbInner>>>,
    fence_pool: Mutex<Vec<Arc<FenceInner>>>,
    uniform_pool: Mutex<Vec<Box<UniformBuffer>>>,

    /// Serializes submissions and the retirement sweep that follows them.
    submit_lock: Mutex<()>,
    /// Claimed windows. Ownership stays with the surfaces.
    pub(crate) windows: Mutex<Vec<Weak<WindowData>>>,

    blit: OnceLock<BlitPipelines>,
}

impl Device {
    /// Create a device.
    ///
    /// Returns `Err` when the runtime cannot be initialized. The caller must
    /// not proceed with a failed device.
    pub fn new(options: &DeviceOptions) -> Result<Device> {
        let native = native::NativeDevice::new(options.debug);
        let queue = native.create_queue();

        let staging = StagingHeaps {
            view: StagingHeap::new(
                StagingKind::View,
                native.create_descriptor_heap(
                    DescriptorHeapKind::View,
                    VIEW_SAMPLER_STAGING_DESCRIPTOR_COUNT,
                    false,
                ),
            ),
            sampler: StagingHeap::new(
                StagingKind::Sampler,
                native.create_descriptor_heap(
                    DescriptorHeapKind::Sampler,
                    VIEW_SAMPLER_STAGING_DESCRIPTOR_COUNT,
                    false,
                ),
            ),
            rtv: StagingHeap::new(
                StagingKind::Rtv,
                native.create_descriptor_heap(
                    DescriptorHeapKind::Rtv,
                    TARGET_STAGING_DESCRIPTOR_COUNT,
                    false,
                ),
            ),
            dsv: StagingHeap::new(
                StagingKind::Dsv,
                native.create_descriptor_heap(
                    DescriptorHeapKind::Dsv,
                    TARGET_STAGING_DESCRIPTOR_COUNT,
                    false,
                ),
            ),
        };

        let shared = Arc::new(DeviceShared {
            native,
            queue,
            caps: DeviceCaps::new(),
            options: options.clone(),
            staging: Arc::new(Mutex::new(staging)),
            gpu_view_heap_pool: Mutex::new(Vec::new()),
            gpu_sampler_heap_pool: Mutex::new(Vec::new()),
            cb_pool: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            fence_pool: Mutex::new(Vec::new()),
            uniform_pool: Mutex::new(Vec::new()),
            submit_lock: Mutex::new(()),
            windows: Mutex::new(Vec::new()),
            blit: OnceLock::new(),
        });

        let device = Device { shared };
        let blit = BlitPipelines::new(&device)?;
        let _ = device.shared.blit.set(blit);
        Ok(device)
    }

    pub fn backend(&self) -> Backend {
        Backend::Tiled
    }

    pub fn caps(&self) -> &DeviceCaps {
        &self.shared.caps
    }

    pub fn options(&self) -> &DeviceOptions {
        &self.shared.options
    }

    pub fn build_buffer(&self) -> BufferBuilder {
        BufferBuilder::new(self.shared.clone())
    }

    pub fn build_transfer_buffer(&self) -> TransferBufferBuilder {
        TransferBufferBuilder::new(self.shared.clone())
    }

    pub fn build_texture(&self) -> TextureBuilder {
        TextureBuilder::new(self.shared.clone())
    }

    pub fn build_shader(&self) -> ShaderBuilder {
        ShaderBuilder::new()
    }

    pub fn build_graphics_pipeline(&self) -> GraphicsPipelineBuilder {
        GraphicsPipelineBuilder::new(self.shared.clone())
    }

    pub fn build_compute_pipeline(&self) -> ComputePipelineBuilder {
        ComputePipelineBuilder::new(self.shared.clone())
    }

    pub fn new_sampler(&self, desc: &SamplerDesc) -> Result<Sampler> {
        Sampler::new(self.shared.clone(), desc)
    }

    /// Draw a command buffer from the pool and begin recording on the calling
    /// thread.
    pub fn acquire_cmd_buffer(&self) -> Result<CmdBuffer> {
        let mut inner = {
            let mut pool = self.shared.cb_pool.lock();
            pool.pop()
        }
        .unwrap_or_else(CbInner::new);
        inner.begin_recording(self.shared.clone());
        Ok(CmdBuffer::new(inner))
    }

    /// Block until every submitted command buffer has finished executing,
    /// then retire them all.
    pub fn wait_idle(&self) {
        self.shared.wait_idle();
    }

    /// Block until one (`wait_all == false`) or all of `fences` signal, then
    /// sweep retired command buffers.
    pub fn wait_for_fences(&self, fences: &[&Fence], wait_all: bool) {
        let natives: Vec<&native::Fence> = fences.iter().map(|f| &**f.native()).collect();
        native::wait_fences(&natives, wait_all, FENCE_SIGNALED_VALUE);
        let _guard = self.shared.submit_lock.lock();
        self.shared.sweep_locked();
    }

    /// Release a fence obtained from
    /// [`crate::CmdBuffer::commit_and_acquire_fence`]. Equivalent to dropping
    /// the handle.
    pub fn release_fence(&self, fence: Fence) {
        fence.release();
    }

    /// Drain the validation messages reported by the runtime so far. Empty in
    /// a well-behaved application.
    pub fn take_debug_messages(&self) -> Vec<String> {
        self.shared.native.take_debug_messages()
    }

    pub fn diagnostics(&self) -> DeviceDiagnostics {
        let staging = self.shared.staging.lock();
        DeviceDiagnostics {
            view_staging_inactive: staging.view.num_inactive(),
            sampler_staging_inactive: staging.sampler.num_inactive(),
            rtv_staging_inactive: staging.rtv.num_inactive(),
            dsv_staging_inactive: staging.dsv.num_inactive(),
            fence_pool_size: self.shared.fence_pool.lock().len(),
        }
    }

}

impl DeviceShared {
    pub(crate) fn blit_pipelines(&self) -> &BlitPipelines {
        self.blit.get().expect("blit pipelines are built at device creation")
    }

    pub(crate) fn acquire_gpu_heap(&self, kind: DescriptorHeapKind) -> GpuHeap {
        let (pool, capacity) = match kind {
            DescriptorHeapKind::View => (&self.gpu_view_heap_pool, VIEW_GPU_DESCRIPTOR_COUNT),
            DescriptorHeapKind::Sampler => {
                (&self.gpu_sampler_heap_pool, SAMPLER_GPU_DESCRIPTOR_COUNT)
            }
            _ => panic!("not a pooled heap kind"),
        };
        let mut pool = pool.lock();
        if let Some(mut heap) = pool.pop() {
            heap.reset();
            heap
        } else {
            GpuHeap::new(self.native.create_descriptor_heap(kind, capacity, true))
        }
    }

    pub(crate) fn return_gpu_heap(&self, kind: DescriptorHeapKind, heap: GpuHeap) {
        let pool = match kind {
            DescriptorHeapKind::View => &self.gpu_view_heap_pool,
            DescriptorHeapKind::Sampler => &self.gpu_sampler_heap_pool,
            _ => panic!("not a pooled heap kind"),
        };
        pool.lock().push(heap);
    }

    pub(crate) fn acquire_uniform_buffer(self: &Arc<Self>) -> Result<Box<UniformBuffer>> {
        let pooled = self.uniform_pool.lock().pop();
        let mut ub = match pooled {
            Some(ub) => ub,
            None => UniformBuffer::new(self)?,
        };
        ub.begin();
        Ok(ub)
    }

    pub(crate) fn return_uniform_buffer(&self, ub: Box<UniformBuffer>) {
        self.uniform_pool.lock().push(ub);
    }

    pub(crate) fn acquire_fence(&self) -> Arc<FenceInner> {
        let pooled = self.fence_pool.lock().pop();
        match pooled {
            Some(fence) => {
                fence.native.reset();
                fence
            }
            None => Arc::new(FenceInner {
                native: self.native.create_fence(),
            }),
        }
    }

    /// Return a fence to the pool if this was the last reference to it.
    pub(crate) fn recycle_fence(&self, fence: Arc<FenceInner>) {
        let mut pool = self.fence_pool.lock();
        if Arc::strong_count(&fence) == 1 {
            fence.native.reset();
            pool.push(fence);
        }
    }

    /// Submit a recorded command buffer: close and execute the list, signal a
    /// fresh fence, present, and sweep whatever retired meanwhile.
    pub(crate) fn submit(
        self: &Arc<Self>,
        mut inner: Box<CbInner>,
        auto_release_fence: bool,
    ) -> Result<Arc<FenceInner>> {
        let _guard = self.submit_lock.lock();

        inner.unmap_uniform_buffers();
        inner.transition_present_entries();

        let cmds = inner.list.close();
        self.queue.execute(cmds);

        let fence = self.acquire_fence();
        self.queue.signal(&fence.native, FENCE_SIGNALED_VALUE);

        inner.fence = Some(fence.clone());
        inner.auto_release_fence = auto_release_fence;

        // Present and record the fence on each presented window's frame slot.
        for entry in inner.take_present_entries() {
            self.queue
                .present(&entry.window.swapchain, entry.swapchain_index);
            entry.window.swapchain.advance();
            entry.window.record_presented_fence(fence.clone());
        }

        self.submitted.lock().push(inner);

        // Retire from the execution thread once the signal lands, so command
        // buffers come back to the pool even when the application stops
        // calling in.
        let weak = Arc::downgrade(self);
        self.queue.after_signal(Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.try_sweep_retired();
            }
        }));

        self.sweep_locked();
        Ok(fence)
    }

    /// Acquire the submit lock and retire whatever has finished.
    pub(crate) fn sweep_retired(&self) {
        let _guard = self.submit_lock.lock();
        self.sweep_locked();
    }

    /// The sweep flavor run on the execution thread. Never blocks on the
    /// submit lock — whoever holds it sweeps on release anyway.
    pub(crate) fn try_sweep_retired(&self) {
        if let Some(_guard) = self.submit_lock.try_lock() {
            self.sweep_locked();
        }
    }

    /// Retire every submitted command buffer whose fence has signalled.
    /// The caller holds the submit lock.
    pub(crate) fn sweep_locked(&self) {
        let retired: Vec<Box<CbInner>> = {
            let mut submitted = self.submitted.lock();
            let mut retired = Vec::new();
            let mut i = 0;
            while i < submitted.len() {
                let done = submitted[i]
                    .fence
                    .as_ref()
                    .map_or(true, |f| f.native.completed_value() >= FENCE_SIGNALED_VALUE);
                if done {
                    retired.push(submitted.swap_remove(i));
                } else {
                    i += 1;
                }
            }
            retired
        };
        for inner in retired {
            self.retire(inner);
        }
    }

    /// Drive a retired command buffer back to the available pool.
    fn retire(&self, mut inner: Box<CbInner>) {
        inner.apply_texture_downloads();
        inner.list.reset();

        if let Some(heap) = inner.view_heap.take() {
            self.return_gpu_heap(DescriptorHeapKind::View, heap);
        }
        if let Some(heap) = inner.sampler_heap.take() {
            self.return_gpu_heap(DescriptorHeapKind::Sampler, heap);
        }

        for ub in inner.take_uniform_buffers() {
            self.return_uniform_buffer(ub);
        }

        for view in inner.take_transient_views() {
            if view.is_valid() {
                self.staging.lock().release(&view);
            }
        }

        inner.release_tracked();

        if let Some(fence) = inner.fence.take() {
            if inner.auto_release_fence {
                self.recycle_fence(fence);
            }
        }

        // The pooled buffer must not keep the device alive.
        inner.device = None;
        self.cb_pool.lock().push(inner);
    }

    /// Return an abandoned (dropped-without-commit) command buffer to the
    /// pool. Its rollback has already run.
    pub(crate) fn return_abandoned(&self, mut inner: Box<CbInner>) {
        inner.device = None;
        self.cb_pool.lock().push(inner);
    }

    pub(crate) fn wait_idle(&self) {
        // A fresh fence signalled at the queue's tail: when it fires, every
        // previously queued submission has executed.
        let fence = self.acquire_fence();
        self.queue.signal(&fence.native, FENCE_SIGNALED_VALUE);
        fence.native.wait_value(FENCE_SIGNALED_VALUE);
        self.recycle_fence(fence);

        let _guard = self.submit_lock.lock();
        self.sweep_locked();
    }
}

impl Drop for DeviceShared {
    fn drop(&mut self) {
        // Drain outstanding work so retirement bookkeeping runs before the
        // pools are torn down.
        let fence = self.acquire_fence();
        self.queue.signal(&fence.native, FENCE_SIGNALED_VALUE);
        fence.native.wait_value(FENCE_SIGNALED_VALUE);
        self.sweep_locked();
    }
}
