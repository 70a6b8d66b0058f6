//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Fences.
//!
//! A fence starts unsignalled and is signalled to 1 when the submission it
//! was acquired for finishes executing. Fences are pooled by the device;
//! releasing (or dropping) the last handle returns the fence to the pool
//! once neither a command buffer nor a window frame slot holds it.
use std::sync::Arc;

use crate::device::DeviceRef;
use crate::native;
use crate::FENCE_SIGNALED_VALUE;

/// A fence handle returned by [`crate::CmdBuffer::commit_and_acquire_fence`].
///
/// The caller owns the fence and must release it — explicitly via
/// [`Fence::release`] (or [`crate::Device::release_fence`]), or implicitly by
/// dropping the handle, which does the same thing. The device recycles the
/// underlying fence once every internal reference is gone.
#[derive(Debug, Clone)]
pub struct Fence {
    inner: Option<Arc<FenceInner>>,
    device: DeviceRef,
}

#[derive(Debug)]
pub(crate) struct FenceInner {
    pub(crate) native: native::FenceRef,
}

impl Fence {
    pub(crate) fn new(inner: Arc<FenceInner>, device: DeviceRef) -> Self {
        Self {
            inner: Some(inner),
            device,
        }
    }

    pub(crate) fn native(&self) -> &native::FenceRef {
        &self
            .inner
            .as_ref()
            .expect("fence handle was already released")
            .native
    }

    /// Query the fence without blocking.
    pub fn is_signaled(&self) -> bool {
        self.native().completed_value() >= FENCE_SIGNALED_VALUE
    }

    /// Release the fence. It returns to the device's pool as soon as no
    /// submission or window frame slot references it.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(inner) = self.inner.take() {
            self.device.recycle_fence(inner);
        }
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        self.release_inner();
    }
}
