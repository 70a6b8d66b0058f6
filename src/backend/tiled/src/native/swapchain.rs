//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! The presentation engine of the software runtime.
//!
//! A swapchain owns a ring of back-buffer resources. Present advances the
//! ring on the execution thread, after validating that the presented buffer
//! reached the `Present` state; the buffer then decays to `Common`, the same
//! way flip-model back buffers do.
use parking_lot::Mutex;
use std::sync::Arc;

use ringfx_base::TextureFormat;

use super::resource::{NativeTextureDesc, Resource, ResourceRef, ResourceState};
use super::DebugSink;

#[derive(Debug, Clone, Copy)]
pub(crate) struct SwapchainDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub buffer_count: u32,
}

#[derive(Debug)]
pub(crate) struct Swapchain {
    state: Mutex<SwapchainState>,
}

#[derive(Debug)]
struct SwapchainState {
    desc: SwapchainDesc,
    buffers: Vec<ResourceRef>,
    current: u32,
}

impl Swapchain {
    pub(crate) fn new(desc: SwapchainDesc, mut allocate_va: impl FnMut(u64) -> u64) -> Self {
        let buffers = Self::make_buffers(&desc, &mut allocate_va);
        Self {
            state: Mutex::new(SwapchainState {
                desc,
                buffers,
                current: 0,
            }),
        }
    }

    fn make_buffers(
        desc: &SwapchainDesc,
        allocate_va: &mut impl FnMut(u64) -> u64,
    ) -> Vec<ResourceRef> {
        (0..desc.buffer_count)
            .map(|_| {
                let tex_desc = NativeTextureDesc {
                    width: desc.width,
                    height: desc.height,
                    depth: 1,
                    layer_count: 1,
                    level_count: 1,
                    format: desc.format,
                    sample_count: 1,
                };
                let size = tex_desc.subresource_size(0);
                Arc::new(Resource::new_texture(
                    tex_desc,
                    ResourceState::Common,
                    allocate_va(size),
                ))
            })
            .collect()
    }

    pub(crate) fn desc(&self) -> SwapchainDesc {
        self.state.lock().desc
    }

    pub(crate) fn buffer(&self, index: u32) -> ResourceRef {
        self.state.lock().buffers[index as usize].clone()
    }

    pub(crate) fn current_back_buffer_index(&self) -> u32 {
        self.state.lock().current
    }

    /// Destroy and recreate the ring with new properties. The device must be
    /// idle; the engine enforces that with a full wait.
    pub(crate) fn recreate(
        &self,
        width: u32,
        height: u32,
        format: TextureFormat,
        mut allocate_va: impl FnMut(u64) -> u64,
    ) {
        let mut state = self.state.lock();
        state.desc.width = width;
        state.desc.height = height;
        state.desc.format = format;
        let desc = state.desc;
        state.buffers = Self::make_buffers(&desc, &mut allocate_va);
        state.current = 0;
    }

    /// Advance the back-buffer index. Happens on the presenting thread —
    /// the flip index is CPU-visible immediately, ahead of execution.
    pub(crate) fn advance(&self) {
        let mut state = self.state.lock();
        state.current = (state.current + 1) % state.desc.buffer_count;
    }

    /// The execution-timeline half of a present: check the presented buffer
    /// reached the `Present` state and let it decay.
    pub(crate) fn do_present(&self, index: u32, debug: &DebugSink) {
        let state = self.state.lock();
        let buffer = &state.buffers[index as usize];
        let mut states = buffer.states.lock();
        if states[0] != ResourceState::Present {
            debug.report(format!(
                "present: back buffer {} is in state {:?}, expected Present",
                index, states[0]
            ));
        }
        // Flip-model decay.
        states[0] = ResourceState::Common;
    }
}
