//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! # RinGFX – Mid-Level Graphics Backend
//!
//! RinGFX is a cross-backend, mid-level GPU abstraction: a command-buffer
//! oriented API that compiles the same application code against several
//! native graphics runtimes. Applications author shaders in
//! backend-appropriate binary formats, describe pipelines and resources
//! through uniform descriptor structures, record commands into transient
//! command buffers, and submit them to a device queue. The library handles
//! resource state transitions, descriptor allocation, swapchain acquisition,
//! and inter-frame synchronization.
//!
//! The heart of every backend is the *frame-resource engine*: fence-tracked
//! command-buffer retirement, sub-resource cycling in place of fine-grained
//! hazard barriers, a two-tier descriptor-heap allocator, a pooled
//! uniform-buffer sub-allocator, and per-window frame pacing. The reference
//! backend ([`backend_tiled`]) implements these contracts in their most
//! explicit form, against a tiled-resource desktop runtime model.
//!
//! # Terminology
//!
//! ## Mappings with other APIs
//!
//! |        RinGFX       |        D3D12            |        Vulkan         |        Metal 2         |
//! | ------------------- | ----------------------- | --------------------- | ---------------------- |
//! | buffer              | resource (buffer)       | buffer                | buffer                 |
//! | texture             | resource (texture)      | image + image views   | texture                |
//! | sub-resource        | subresource             | image subresource     | (slice, level)         |
//! | sampler             | sampler descriptor      | sampler               | sampler state          |
//! | staging descriptor  | CPU descriptor          | —                     | —                      |
//! | descriptor table    | descriptor table        | descriptor set        | argument buffer        |
//! | root signature      | root signature          | pipeline layout       | —                      |
//! | uniform push        | root CBV                | push descriptor       | `setBytes`             |
//! | command buffer      | allocator + list        | command buffer        | command buffer         |
//! | fence               | fence (value 0 → 1)     | fence                 | shared event           |
//! | surface             | window + swapchain      | surface + swapchain   | layer + drawable       |
//!
//! Note: the mappings shown in this table are rough. In most cases a concept
//! from one API does not translate exactly to another.
//!
//! ## Abbreviations
//!
//! - **Cbv** - constant-buffer view
//! - **Cmd** - command
//! - **Cmp** - compare
//! - **DS** - depth and/or stencil
//! - **Dst** - destination
//! - **Dsv** - depth-stencil view
//! - **Fn** - function
//! - **Frag** - fragment
//! - **Mag** - magnification
//! - **Min** - minification
//! - **Mip** - mipmap, mipmapping
//! - **Ref** - reference
//! - **Res** - resource
//! - **Rtv** - render-target view
//! - **Src** - source
//! - **Srv** - shader-resource view
//! - **Uav** - unordered-access view
//!
//! # Implementation Details
//!
//! ## Flags
//!
//! Types representing a subset of predetermined values are defined using the
//! [`bitflags`] crate. Such types have `Flags` as suffix in their names
//! (e.g., [`base::TextureUsageFlags`]).
//!
//! ## Handles
//!
//! Backend objects are reified as cheap cloneable handles (`Buffer`,
//! `Texture`, `Sampler`, pipelines, `Fence`, `Surface`): cloning a handle
//! clones the reference, never the object. The exception is the command
//! buffer, which is unsynchronized — it belongs to the thread that acquired
//! it and is consumed by submission, so reuse after submit is
//! unrepresentable.
//!
//! ## Cycling
//!
//! For frequently updated data the library versions contents instead of
//! inserting fine-grained barriers: a write with `cycle = true` rotates the
//! handle's active allocation away from any in-flight one. The contents of a
//! freshly cycled allocation are undefined; callers are expected to fully
//! write it before reading. Cycled data may be overwritten freely, while
//! barriered data must be preserved — backends must not substitute one
//! strategy for the other.
//!
//! [`bitflags`]: https://docs.rs/bitflags
pub use ringfx_base as base;
pub use ringfx_common as common;
pub use ringfx_tiled as backend_tiled;
