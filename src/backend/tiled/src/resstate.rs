//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! The automatic resource-state tracker.
//!
//! Every resource spends its life in a *default* state derived from its usage
//! flags. Operations that need a different state bracket themselves with a
//! transition from the default state at the start and a transition back at
//! the end, so no state leaks across operations. Resources with a writable
//! compute-storage usage get a UAV barrier on every access to order
//! back-to-back device writes.
use std::sync::atomic::Ordering;

use ringfx_base::{BufferUsageFlags, TextureUsageFlags};

use crate::buffer::ConcreteBuffer;
use crate::native::{CmdList, ResourceState};
use crate::texture::ConcreteTexture;

/// The state a texture rests in between operations. The order of the checks
/// matters.
pub(crate) fn texture_default_state(usage: TextureUsageFlags) -> ResourceState {
    if usage.contains(TextureUsageFlags::SAMPLER) {
        ResourceState::AllShaderResource
    } else if usage.contains(TextureUsageFlags::GRAPHICS_STORAGE_READ) {
        ResourceState::AllShaderResource
    } else if usage.contains(TextureUsageFlags::COLOR_TARGET) {
        ResourceState::RenderTarget
    } else if usage.contains(TextureUsageFlags::DEPTH_STENCIL_TARGET) {
        ResourceState::DepthWrite
    } else if usage.contains(TextureUsageFlags::COMPUTE_STORAGE_READ) {
        ResourceState::NonPixelShaderResource
    } else if usage.contains(TextureUsageFlags::COMPUTE_STORAGE_WRITE) {
        ResourceState::UnorderedAccess
    } else {
        log::error!("texture has no default usage mode");
        ResourceState::AllShaderResource
    }
}

/// The state a buffer rests in between operations.
pub(crate) fn buffer_default_state(usage: BufferUsageFlags) -> ResourceState {
    if usage.contains(BufferUsageFlags::VERTEX) {
        ResourceState::VertexAndConstantBuffer
    } else if usage.contains(BufferUsageFlags::INDEX) {
        ResourceState::IndexBuffer
    } else if usage.contains(BufferUsageFlags::INDIRECT) {
        ResourceState::IndirectArgument
    } else if usage.contains(BufferUsageFlags::GRAPHICS_STORAGE_READ) {
        ResourceState::AllShaderResource
    } else if usage.contains(BufferUsageFlags::COMPUTE_STORAGE_READ) {
        ResourceState::NonPixelShaderResource
    } else if usage.contains(BufferUsageFlags::COMPUTE_STORAGE_WRITE) {
        ResourceState::UnorderedAccess
    } else {
        log::error!("buffer has no default usage mode");
        ResourceState::VertexAndConstantBuffer
    }
}

/// Emit the barriers for one texture sub-resource transition.
pub(crate) fn texture_subresource_barrier(
    list: &mut CmdList,
    texture: &ConcreteTexture,
    subresource: u32,
    from: ResourceState,
    to: ResourceState,
) {
    if from != to {
        list.transition(&texture.resource, Some(subresource), from, to);
    }
    if texture.usage.contains(TextureUsageFlags::COMPUTE_STORAGE_WRITE) {
        list.uav_barrier(&texture.resource);
    }
}

pub(crate) fn transition_texture_from_default(
    list: &mut CmdList,
    texture: &ConcreteTexture,
    subresource: u32,
    destination: ResourceState,
) {
    texture_subresource_barrier(
        list,
        texture,
        subresource,
        texture_default_state(texture.usage),
        destination,
    );
}

pub(crate) fn transition_texture_to_default(
    list: &mut CmdList,
    texture: &ConcreteTexture,
    subresource: u32,
    source: ResourceState,
) {
    texture_subresource_barrier(
        list,
        texture,
        subresource,
        source,
        texture_default_state(texture.usage),
    );
}

/// Emit the barriers for a whole-buffer transition.
///
/// A just-created buffer is still in the common state whatever its recorded
/// default says; the first barrier is issued against common and the
/// `transitioned` flag flips.
pub(crate) fn buffer_barrier(
    list: &mut CmdList,
    buffer: &ConcreteBuffer,
    from: ResourceState,
    to: ResourceState,
) {
    let from = if buffer.transitioned.swap(true, Ordering::AcqRel) {
        from
    } else {
        ResourceState::Common
    };
    if from != to {
        list.transition(&buffer.resource, Some(0), from, to);
    }
    if buffer.usage.contains(BufferUsageFlags::COMPUTE_STORAGE_WRITE) {
        list.uav_barrier(&buffer.resource);
    }
}

pub(crate) fn transition_buffer_from_default(
    list: &mut CmdList,
    buffer: &ConcreteBuffer,
    destination: ResourceState,
) {
    buffer_barrier(list, buffer, buffer_default_state(buffer.usage), destination);
}

pub(crate) fn transition_buffer_to_default(
    list: &mut CmdList,
    buffer: &ConcreteBuffer,
    source: ResourceState,
) {
    buffer_barrier(list, buffer, source, buffer_default_state(buffer.usage));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_default_priority() {
        assert_eq!(
            texture_default_state(TextureUsageFlags::SAMPLER | TextureUsageFlags::COLOR_TARGET),
            ResourceState::AllShaderResource
        );
        assert_eq!(
            texture_default_state(TextureUsageFlags::COLOR_TARGET),
            ResourceState::RenderTarget
        );
        assert_eq!(
            texture_default_state(TextureUsageFlags::DEPTH_STENCIL_TARGET),
            ResourceState::DepthWrite
        );
        assert_eq!(
            texture_default_state(TextureUsageFlags::COMPUTE_STORAGE_READ),
            ResourceState::NonPixelShaderResource
        );
        assert_eq!(
            texture_default_state(
                TextureUsageFlags::COMPUTE_STORAGE_READ | TextureUsageFlags::COMPUTE_STORAGE_WRITE
            ),
            ResourceState::NonPixelShaderResource
        );
        assert_eq!(
            texture_default_state(TextureUsageFlags::COMPUTE_STORAGE_WRITE),
            ResourceState::UnorderedAccess
        );
    }

    #[test]
    fn buffer_default_priority() {
        assert_eq!(
            buffer_default_state(BufferUsageFlags::VERTEX | BufferUsageFlags::INDEX),
            ResourceState::VertexAndConstantBuffer
        );
        assert_eq!(
            buffer_default_state(BufferUsageFlags::INDEX),
            ResourceState::IndexBuffer
        );
        assert_eq!(
            buffer_default_state(BufferUsageFlags::INDIRECT),
            ResourceState::IndirectArgument
        );
        assert_eq!(
            buffer_default_state(BufferUsageFlags::GRAPHICS_STORAGE_READ),
            ResourceState::AllShaderResource
        );
        assert_eq!(
            buffer_default_state(BufferUsageFlags::COMPUTE_STORAGE_WRITE),
            ResourceState::UnorderedAccess
        );
    }
}
