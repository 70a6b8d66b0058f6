//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! The uniform-buffer sub-allocator.
//!
//! Push-uniform data is bump-allocated out of pooled, persistently mapped
//! upload buffers in 256-byte blocks. The *draw offset* snapshots the start
//! of the most recent push; the binder stamps `virtual address + draw offset`
//! into a root CBV, so every push between two draws gets its own snapshot and
//! uniform updates stay O(1) at record time.
use ringfx_base::error::Result;
use ringfx_base::limits::UNIFORM_BUFFER_ALIGNMENT;
use ringfx_base::{BufferType, BufferUsageFlags};
use ringfx_common::align_up;
use std::sync::Arc;

use crate::buffer::ConcreteBuffer;
use crate::device::DeviceRef;
use crate::UNIFORM_BUFFER_POOL_ELEMENT_SIZE;

#[derive(Debug)]
pub(crate) struct UniformBuffer {
    pub(crate) concrete: Arc<ConcreteBuffer>,
    pub(crate) write_offset: u64,
    pub(crate) draw_offset: u64,
    pub(crate) current_block_size: u64,
}

impl UniformBuffer {
    pub(crate) fn new(device: &DeviceRef) -> Result<Box<Self>> {
        let concrete = ConcreteBuffer::new(
            device,
            BufferUsageFlags::empty(),
            UNIFORM_BUFFER_POOL_ELEMENT_SIZE,
            BufferType::Uniform,
            Some("uniform pool buffer"),
        )?;
        Ok(Box::new(Self {
            concrete,
            write_offset: 0,
            draw_offset: 0,
            current_block_size: 0,
        }))
    }

    /// Reset the offsets and pin the map pointer. Called when the wrapper is
    /// drawn from the pool.
    pub(crate) fn begin(&mut self) {
        self.write_offset = 0;
        self.draw_offset = 0;
        self.current_block_size = 0;
        self.concrete.resource.map();
    }

    /// The number of bytes still available behind the write cursor.
    pub(crate) fn remaining(&self) -> u64 {
        UNIFORM_BUFFER_POOL_ELEMENT_SIZE - self.write_offset
    }

    /// Copy `data` into the next aligned block and snapshot the draw offset.
    ///
    /// The caller has checked that the block fits.
    pub(crate) fn push(&mut self, data: &[u8]) {
        let block = align_up(data.len() as u64, UNIFORM_BUFFER_ALIGNMENT);
        debug_assert!(self.write_offset + block <= UNIFORM_BUFFER_POOL_ELEMENT_SIZE);
        self.draw_offset = self.write_offset;
        self.current_block_size = block;
        unsafe {
            let dst = self
                .concrete
                .resource
                .memory
                .ptr()
                .add(self.write_offset as usize);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
        }
        self.write_offset += block;
    }

    /// The address the binder stamps into the root CBV.
    pub(crate) fn draw_address(&self) -> u64 {
        debug_assert!(self.draw_offset + self.current_block_size <= UNIFORM_BUFFER_POOL_ELEMENT_SIZE);
        self.concrete.gpu_va() + self.draw_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_rounding() {
        assert_eq!(align_up(1, UNIFORM_BUFFER_ALIGNMENT), 256);
        assert_eq!(align_up(256, UNIFORM_BUFFER_ALIGNMENT), 256);
        assert_eq!(align_up(257, UNIFORM_BUFFER_ALIGNMENT), 512);
    }
}
