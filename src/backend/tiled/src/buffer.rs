//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Buffer containers and their concrete buffers.
//!
//! A `Buffer` (and a `TransferBuffer`) is a cheap cloneable handle to a
//! *container*: an ordered list of identically shaped concrete buffers with
//! exactly one of them active. Writers that pass `cycle = true` rotate the
//! active buffer away from in-flight data instead of waiting on it; the
//! contents of a freshly cycled buffer are undefined.
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use ringfx_base::error::Result;
use ringfx_base::{BufferType, BufferUsageFlags, TransferUsage};

use crate::descriptor::{CpuDescriptor, StagingHeaps, StagingKind};
use crate::device::DeviceRef;
use crate::native;
use crate::native::{DescriptorPayload, HeapClass, ResourceState};
use crate::resstate;

/// A GPU buffer handle.
#[derive(Debug, Clone)]
pub struct Buffer {
    pub(crate) container: Arc<BufferContainer>,
}

impl Buffer {
    pub fn size(&self) -> u64 {
        self.container.size
    }

    pub fn usage(&self) -> BufferUsageFlags {
        self.container.usage
    }

    /// Set a debug name, propagated to every concrete buffer of the
    /// container, present and future.
    pub fn set_name(&self, name: &str) {
        self.container.set_label(name);
    }
}

/// A host-visible transfer buffer handle. Upload transfer buffers are
/// persistently mapped; readback buffers are mapped on demand.
#[derive(Debug, Clone)]
pub struct TransferBuffer {
    pub(crate) container: Arc<BufferContainer>,
}

impl TransferBuffer {
    pub fn size(&self) -> u64 {
        self.container.size
    }

    /// Map the active concrete buffer, cycling first when `cycle` is true and
    /// the active buffer is still referenced by an unretired command buffer.
    ///
    /// The returned pointer stays valid until the buffer handle is dropped.
    /// Synchronizing host access against device access is the caller's
    /// responsibility.
    pub fn map(&self, cycle: bool) -> *mut u8 {
        let concrete = self.container.prepare_for_host_write(cycle);
        concrete.resource.map()
    }

    pub fn unmap(&self) {
        self.container.active().resource.unmap();
    }
}

/// The shared container behind `Buffer` and `TransferBuffer`.
#[derive(Debug)]
pub(crate) struct BufferContainer {
    pub(crate) device: DeviceRef,
    pub(crate) usage: BufferUsageFlags,
    pub(crate) size: u64,
    pub(crate) ty: BufferType,
    state: Mutex<ContainerState>,
}

#[derive(Debug)]
struct ContainerState {
    concretes: Vec<Arc<ConcreteBuffer>>,
    active: usize,
    label: Option<String>,
}

impl BufferContainer {
    pub(crate) fn new(
        device: DeviceRef,
        usage: BufferUsageFlags,
        size: u64,
        ty: BufferType,
    ) -> Result<Arc<Self>> {
        let first = ConcreteBuffer::new(&device, usage, size, ty, None)?;
        Ok(Arc::new(Self {
            device,
            usage,
            size,
            ty,
            state: Mutex::new(ContainerState {
                concretes: vec![first],
                active: 0,
                label: None,
            }),
        }))
    }

    pub(crate) fn active(&self) -> Arc<ConcreteBuffer> {
        let state = self.state.lock();
        state.concretes[state.active].clone()
    }

    fn set_label(&self, label: &str) {
        let mut state = self.state.lock();
        state.label = Some(label.to_owned());
        for concrete in &state.concretes {
            concrete.resource.set_label(label);
        }
    }

    /// Rotate the active buffer to one that is not in flight, growing the
    /// list when every existing buffer is referenced.
    fn cycle_active(&self, state: &mut ContainerState) {
        for (i, concrete) in state.concretes.iter().enumerate() {
            if concrete.in_flight.load(Ordering::Acquire) == 0 {
                state.active = i;
                return;
            }
        }
        match ConcreteBuffer::new(
            &self.device,
            self.usage,
            self.size,
            self.ty,
            state.label.as_deref(),
        ) {
            Ok(concrete) => {
                state.concretes.push(concrete);
                state.active = state.concretes.len() - 1;
            }
            Err(error) => {
                // Keep the current buffer active; the caller overwrites
                // in-flight data, which is its stated risk on failure.
                log::error!("failed to cycle a buffer: {}", error);
            }
        }
    }

    /// Cycle if requested and needed; no transition. The host-write flavor
    /// used by transfer-buffer mapping.
    pub(crate) fn prepare_for_host_write(&self, cycle: bool) -> Arc<ConcreteBuffer> {
        let mut state = self.state.lock();
        let active = state.concretes[state.active].clone();
        if cycle && active.in_flight.load(Ordering::Acquire) > 0 {
            self.cycle_active(&mut state);
        }
        state.concretes[state.active].clone()
    }

    /// Cycle if requested and needed, then transition the selected buffer
    /// from its default state to `destination`. Host-visible classes are
    /// never transitioned.
    pub(crate) fn prepare_for_write(
        &self,
        list: &mut native::CmdList,
        cycle: bool,
        destination: ResourceState,
    ) -> Arc<ConcreteBuffer> {
        let concrete = self.prepare_for_host_write(cycle);
        if self.ty == BufferType::Gpu {
            resstate::transition_buffer_from_default(list, &concrete, destination);
        }
        concrete
    }
}

/// One native allocation of a container.
#[derive(Debug)]
pub(crate) struct ConcreteBuffer {
    /// Shared with the device; descriptor release must not require the
    /// device to still exist.
    staging: Arc<Mutex<StagingHeaps>>,
    pub(crate) resource: native::ResourceRef,
    pub(crate) usage: BufferUsageFlags,
    pub(crate) ty: BufferType,
    pub(crate) srv: Option<CpuDescriptor>,
    pub(crate) uav: Option<CpuDescriptor>,
    pub(crate) cbv: Option<CpuDescriptor>,
    /// The number of submitted-but-unretired command buffers referencing this
    /// buffer.
    pub(crate) in_flight: AtomicUsize,
    /// False until the first transition away from the initial common state.
    pub(crate) transitioned: AtomicBool,
}

impl ConcreteBuffer {
    pub(crate) fn new(
        device: &DeviceRef,
        usage: BufferUsageFlags,
        size: u64,
        ty: BufferType,
        label: Option<&str>,
    ) -> Result<Arc<Self>> {
        let heap_class = match ty {
            BufferType::Gpu => HeapClass::Default,
            BufferType::Uniform | BufferType::Upload => HeapClass::Upload,
            BufferType::Readback => HeapClass::Readback,
        };
        let resource = device
            .native
            .create_buffer(size, heap_class, ResourceState::Common);
        if let Some(label) = label {
            resource.set_label(label);
        }
        if ty == BufferType::Upload {
            // Upload transfer buffers stay mapped for their whole lifetime.
            resource.map();
        }

        let mut srv = None;
        let mut uav = None;
        let mut cbv = None;
        {
            let mut staging = device.staging.lock();
            if usage.is_storage_readable() {
                let descriptor = staging.allocate(StagingKind::View);
                descriptor.write(DescriptorPayload::Srv {
                    resource: resource.clone(),
                    first_subresource: 0,
                    num_subresources: 1,
                });
                srv = Some(descriptor);
            }
            if usage.is_storage_writable() {
                let descriptor = staging.allocate(StagingKind::View);
                descriptor.write(DescriptorPayload::Uav {
                    resource: resource.clone(),
                    subresource: 0,
                });
                uav = Some(descriptor);
            }
            if ty == BufferType::Uniform {
                let descriptor = staging.allocate(StagingKind::View);
                descriptor.write(DescriptorPayload::Cbv {
                    resource: resource.clone(),
                });
                cbv = Some(descriptor);
            }
        }

        Ok(Arc::new(Self {
            staging: device.staging.clone(),
            resource,
            usage,
            ty,
            srv,
            uav,
            cbv,
            in_flight: AtomicUsize::new(0),
            transitioned: AtomicBool::new(false),
        }))
    }

    pub(crate) fn gpu_va(&self) -> u64 {
        self.resource.gpu_va
    }
}

impl Drop for ConcreteBuffer {
    fn drop(&mut self) {
        if self.ty == BufferType::Upload {
            self.resource.unmap();
        }
        let mut staging = self.staging.lock();
        for descriptor in [&self.srv, &self.uav, &self.cbv].into_iter().flatten() {
            if descriptor.is_valid() {
                staging.release(descriptor);
            }
        }
    }
}

/// Builder for GPU buffers.
#[derive(Debug)]
pub struct BufferBuilder {
    device: DeviceRef,
    size: Option<u64>,
    usage: BufferUsageFlags,
    label: Option<String>,
}

impl BufferBuilder {
    pub(crate) fn new(device: DeviceRef) -> Self {
        Self {
            device,
            size: None,
            usage: BufferUsageFlags::empty(),
            label: None,
        }
    }

    /// Set the buffer size in bytes. Mandatory.
    pub fn size(&mut self, v: u64) -> &mut Self {
        self.size = Some(v);
        self
    }

    /// Set the usage flags. Mandatory; must be non-empty.
    pub fn usage(&mut self, v: BufferUsageFlags) -> &mut Self {
        self.usage = v;
        self
    }

    pub fn label(&mut self, v: &str) -> &mut Self {
        self.label = Some(v.to_owned());
        self
    }

    pub fn build(&mut self) -> Result<Buffer> {
        let size = self.size.expect("size");
        assert!(!self.usage.is_empty(), "usage");
        let container = BufferContainer::new(self.device.clone(), self.usage, size, BufferType::Gpu)?;
        let buffer = Buffer { container };
        if let Some(ref label) = self.label {
            buffer.set_name(label);
        }
        Ok(buffer)
    }
}

/// Builder for transfer buffers.
#[derive(Debug)]
pub struct TransferBufferBuilder {
    device: DeviceRef,
    size: Option<u64>,
    usage: TransferUsage,
    label: Option<String>,
}

impl TransferBufferBuilder {
    pub(crate) fn new(device: DeviceRef) -> Self {
        Self {
            device,
            size: None,
            usage: TransferUsage::Upload,
            label: None,
        }
    }

    /// Set the buffer size in bytes. Mandatory.
    pub fn size(&mut self, v: u64) -> &mut Self {
        self.size = Some(v);
        self
    }

    /// Set the transfer direction. Defaults to upload.
    pub fn usage(&mut self, v: TransferUsage) -> &mut Self {
        self.usage = v;
        self
    }

    pub fn label(&mut self, v: &str) -> &mut Self {
        self.label = Some(v.to_owned());
        self
    }

    pub fn build(&mut self) -> Result<TransferBuffer> {
        let size = self.size.expect("size");
        let ty = match self.usage {
            TransferUsage::Upload => BufferType::Upload,
            TransferUsage::Download => BufferType::Readback,
        };
        let container =
            BufferContainer::new(self.device.clone(), BufferUsageFlags::empty(), size, ty)?;
        if let Some(ref label) = self.label {
            container.set_label(label);
        }
        Ok(TransferBuffer { container })
    }
}
