//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! The compute pass encoder.
//!
//! Read-write storage resources are bound for the whole pass at begin time,
//! where their cycle flags are honored. Read-only storage resources may be
//! bound during the pass; they are transitioned to the non-pixel shader
//! state on bind and return to their default state when the pass ends.
use std::sync::Arc;

use ringfx_base::ShaderStage;

use crate::buffer::{Buffer, ConcreteBuffer};
use crate::cmd::buffer::{
    CbInner, StorageBufferReadWriteBinding, StorageTextureReadWriteBinding, TextureSlice,
};
use crate::native::{Cmd, IndirectSignature, ResourceState};
use crate::pipeline::ComputePipeline;
use crate::resstate;
use crate::texture::ConcreteTexture;

/// Records dispatches into a compute pass. Dropping the encoder ends the
/// pass and transitions every storage binding back to its default state.
#[derive(Debug)]
pub struct ComputeEncoder<'a> {
    cb: &'a mut CbInner,
    readwrite_textures: Vec<(Arc<ConcreteTexture>, u32)>,
    readwrite_buffers: Vec<Arc<ConcreteBuffer>>,
    readonly_textures: Vec<(Arc<ConcreteTexture>, u32)>,
    readonly_buffers: Vec<Arc<ConcreteBuffer>>,
}

impl<'a> ComputeEncoder<'a> {
    pub(crate) fn begin(
        cb: &'a mut CbInner,
        storage_texture_bindings: &[StorageTextureReadWriteBinding<'_>],
        storage_buffer_bindings: &[StorageBufferReadWriteBinding<'_>],
    ) -> Self {
        let mut readwrite_textures = Vec::with_capacity(storage_texture_bindings.len());
        for (slot, binding) in storage_texture_bindings.iter().enumerate() {
            let container = &binding.texture.container;
            let (concrete, index) = container.prepare_subresource_for_write(
                &mut cb.list,
                binding.layer,
                binding.level,
                binding.cycle,
                ResourceState::UnorderedAccess,
            );
            let cpu = concrete.subresources[index as usize]
                .uav
                .clone()
                .expect("texture has no compute-storage-write usage");
            cb.set_compute_readwrite_storage_texture(slot as u32, cpu);
            cb.track_texture_subresource(&concrete, index);
            readwrite_textures.push((concrete, index));
        }

        let mut readwrite_buffers = Vec::with_capacity(storage_buffer_bindings.len());
        for (slot, binding) in storage_buffer_bindings.iter().enumerate() {
            let concrete = binding.buffer.container.prepare_for_write(
                &mut cb.list,
                binding.cycle,
                ResourceState::UnorderedAccess,
            );
            let cpu = concrete
                .uav
                .clone()
                .expect("buffer has no compute-storage-write usage");
            cb.set_compute_readwrite_storage_buffer(slot as u32, cpu);
            cb.track_buffer(&concrete);
            readwrite_buffers.push(concrete);
        }

        Self {
            cb,
            readwrite_textures,
            readwrite_buffers,
            readonly_textures: Vec::new(),
            readonly_buffers: Vec::new(),
        }
    }

    pub fn bind_pipeline(&mut self, pipeline: &ComputePipeline) {
        self.cb.bind_compute_pipeline(pipeline);
    }

    /// Bind read-only storage textures starting at `first_slot`.
    pub fn bind_storage_textures(&mut self, first_slot: u32, slices: &[TextureSlice<'_>]) {
        for (i, slice) in slices.iter().enumerate() {
            let container = &slice.texture.container;
            let concrete = container.active();
            let index = slice.layer * container.info.level_count + slice.level;
            resstate::transition_texture_from_default(
                &mut self.cb.list,
                &concrete,
                index,
                ResourceState::NonPixelShaderResource,
            );
            let cpu = concrete.subresources[index as usize]
                .srv
                .clone()
                .expect("texture has no storage-read usage");
            self.cb
                .set_compute_readonly_storage_texture(first_slot + i as u32, cpu);
            self.cb.track_texture_subresource(&concrete, index);
            self.readonly_textures.push((concrete, index));
        }
    }

    /// Bind read-only storage buffers starting at `first_slot`.
    pub fn bind_storage_buffers(&mut self, first_slot: u32, buffers: &[&Buffer]) {
        for (i, buffer) in buffers.iter().enumerate() {
            let concrete = buffer.container.active();
            resstate::transition_buffer_from_default(
                &mut self.cb.list,
                &concrete,
                ResourceState::NonPixelShaderResource,
            );
            let cpu = concrete
                .srv
                .clone()
                .expect("buffer has no storage-read usage");
            self.cb
                .set_compute_readonly_storage_buffer(first_slot + i as u32, cpu);
            self.cb.track_buffer(&concrete);
            self.readonly_buffers.push(concrete);
        }
    }

    pub fn push_uniform_data(&mut self, slot: u32, data: &[u8]) {
        self.cb.push_uniform_data(ShaderStage::Compute, slot, data);
    }

    pub fn dispatch(&mut self, group_count_x: u32, group_count_y: u32, group_count_z: u32) {
        self.cb.flush_compute_bindings();
        self.cb.list.push(Cmd::Dispatch {
            x: group_count_x,
            y: group_count_y,
            z: group_count_z,
        });
    }

    /// Dispatch with parameters read from `buffer` at `offset`, laid out as
    /// [`ringfx_base::DispatchIndirectArgs`].
    pub fn dispatch_indirect(&mut self, buffer: &Buffer, offset: u64) {
        let concrete = buffer.container.active();
        self.cb.track_buffer(&concrete);
        self.cb.flush_compute_bindings();
        self.cb.list.push(Cmd::ExecuteIndirect {
            signature: IndirectSignature::Dispatch,
            resource: concrete.resource.clone(),
            offset,
        });
    }
}

impl Drop for ComputeEncoder<'_> {
    fn drop(&mut self) {
        for (concrete, index) in &self.readwrite_textures {
            resstate::transition_texture_to_default(
                &mut self.cb.list,
                concrete,
                *index,
                ResourceState::UnorderedAccess,
            );
        }
        for concrete in &self.readwrite_buffers {
            resstate::transition_buffer_to_default(
                &mut self.cb.list,
                concrete,
                ResourceState::UnorderedAccess,
            );
        }
        for (concrete, index) in &self.readonly_textures {
            resstate::transition_texture_to_default(
                &mut self.cb.list,
                concrete,
                *index,
                ResourceState::NonPixelShaderResource,
            );
        }
        for concrete in &self.readonly_buffers {
            resstate::transition_buffer_to_default(
                &mut self.cb.list,
                concrete,
                ResourceState::NonPixelShaderResource,
            );
        }
        self.cb.bind.compute_pipeline = None;
    }
}
