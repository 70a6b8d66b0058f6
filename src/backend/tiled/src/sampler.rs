//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Sampler objects.
use parking_lot::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use ringfx_base::error::Result;
use ringfx_base::SamplerDesc;

use crate::descriptor::{CpuDescriptor, StagingHeaps, StagingKind};
use crate::device::DeviceRef;
use crate::native::DescriptorPayload;

/// A sampler handle.
#[derive(Debug, Clone)]
pub struct Sampler {
    pub(crate) inner: Arc<SamplerInner>,
}

#[derive(Debug)]
pub(crate) struct SamplerInner {
    staging: Arc<Mutex<StagingHeaps>>,
    pub(crate) cpu: CpuDescriptor,
    pub(crate) desc: SamplerDesc,
    pub(crate) in_flight: AtomicUsize,
}

impl Sampler {
    pub(crate) fn new(device: DeviceRef, desc: &SamplerDesc) -> Result<Self> {
        let cpu = {
            let mut staging = device.staging.lock();
            let descriptor = staging.allocate(StagingKind::Sampler);
            descriptor.write(DescriptorPayload::Sampler(*desc));
            descriptor
        };
        Ok(Self {
            inner: Arc::new(SamplerInner {
                staging: device.staging.clone(),
                cpu,
                desc: *desc,
                in_flight: AtomicUsize::new(0),
            }),
        })
    }

    pub fn desc(&self) -> &SamplerDesc {
        &self.inner.desc
    }
}

impl Drop for SamplerInner {
    fn drop(&mut self) {
        if self.cpu.is_valid() {
            self.staging.lock().release(&self.cpu);
        }
    }
}
