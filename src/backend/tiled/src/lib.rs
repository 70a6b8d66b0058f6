//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! RinGFX Tiled Backend — the reference backend, built on an explicit-state,
//! tiled-resource desktop GPU runtime.
//!
//! This backend implements the RinGFX frame-resource contracts in their most
//! explicit form: automatic resource-state transitions, sub-resource cycling,
//! two-tier descriptor heaps, root-signature binding, a pooled uniform-buffer
//! sub-allocator, and fence-tracked command-buffer retirement. The other
//! backends obey the same contracts with backend-specific primitives; this
//! one is the reference both for semantics and for tests.
//!
//! The native layer is the in-crate [`native`] software runtime, which models
//! the device timeline (states, descriptor heaps, copies, fences, flip-model
//! presentation) faithfully enough that the engine above it can be driven and
//! validated end to end without a physical device. See the module
//! documentation of `native` for what is and is not modeled.
//!
//! # Threading
//!
//! The [`Device`] is thread-safe. A command buffer must be recorded and
//! submitted by the thread that acquired it. Resource creation and release
//! may happen on any thread.
pub mod buffer;
pub mod cmd;
pub mod descriptor;
pub mod device;
pub mod limits;
mod blit;
mod native;
pub mod pipeline;
mod resstate;
mod rootsig;
pub mod sampler;
pub mod shader;
pub mod swapchain;
pub mod texture;
mod uniform;

pub use crate::buffer::{Buffer, TransferBuffer};
pub use crate::cmd::buffer::{
    BufferBinding, CmdBuffer, ColorAttachmentInfo, DepthStencilAttachmentInfo,
    StorageBufferReadWriteBinding, StorageTextureReadWriteBinding, TextureSamplerBinding,
    TextureSlice,
};
pub use crate::cmd::enc_compute::ComputeEncoder;
pub use crate::cmd::enc_copy::{CopyEncoder, TextureRegion, TextureTransferInfo};
pub use crate::cmd::enc_render::RenderEncoder;
pub use crate::cmd::fence::Fence;
pub use crate::device::{Device, DeviceDiagnostics, DeviceOptions};
pub use crate::limits::DeviceCaps;
pub use crate::pipeline::{ComputePipeline, ComputeResourceCounts, GraphicsPipeline};
pub use crate::sampler::Sampler;
pub use crate::shader::{Shader, ShaderResourceCounts};
pub use crate::swapchain::Surface;
pub use crate::texture::{Texture, TextureInfo};
pub use crate::blit::BlitRegion;

/// The capacity of a shader-visible view (CBV/SRV/UAV) heap.
pub const VIEW_GPU_DESCRIPTOR_COUNT: u32 = 65536;

/// The capacity of a shader-visible sampler heap.
pub const SAMPLER_GPU_DESCRIPTOR_COUNT: u32 = 2048;

/// The capacity of the CPU staging heaps for views and samplers.
pub const VIEW_SAMPLER_STAGING_DESCRIPTOR_COUNT: u32 = 1_000_000;

/// The capacity of the CPU staging heaps for render-target and depth-stencil
/// views.
pub const TARGET_STAGING_DESCRIPTOR_COUNT: u32 = 1_000_000;

/// The size of one pooled uniform upload buffer.
pub const UNIFORM_BUFFER_POOL_ELEMENT_SIZE: u64 = 1 << 20;

/// The value fences rest at until their submission executes.
pub const FENCE_UNSIGNALED_VALUE: u64 = 0;

/// The value a queue signal raises a fence to.
pub const FENCE_SIGNALED_VALUE: u64 = 1;
