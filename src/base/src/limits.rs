//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! API-level limits shared by all backends.
//!
//! These are contract values — backends may support more internally, but the
//! binding model exposed to applications is sized by these constants.

/// The depth of the per-window frame pipeline. A window never has more than
/// this many presented-but-unretired frames.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// The maximum number of color attachments in a render pass.
pub const MAX_COLOR_TARGETS: usize = 4;

/// The maximum number of texture-sampler pairs bound to one shader stage.
pub const MAX_TEXTURE_SAMPLERS_PER_STAGE: usize = 16;

/// The maximum number of storage textures bound to one shader stage.
pub const MAX_STORAGE_TEXTURES_PER_STAGE: usize = 8;

/// The maximum number of storage buffers bound to one shader stage.
pub const MAX_STORAGE_BUFFERS_PER_STAGE: usize = 8;

/// The maximum number of uniform-buffer slots per shader stage.
pub const MAX_UNIFORM_BUFFERS_PER_STAGE: usize = 4;

/// The maximum number of bound vertex buffers.
pub const MAX_VERTEX_BUFFERS: usize = 16;

/// The required alignment of constant-buffer view offsets, and the block
/// granularity of the uniform-buffer sub-allocator.
pub const UNIFORM_BUFFER_ALIGNMENT: u64 = 256;

/// The row-pitch alignment required by texture copy operations.
pub const TEXTURE_ROW_PITCH_ALIGNMENT: u64 = 256;

/// The buffer-offset alignment required by texture copy operations.
pub const TEXTURE_PLACEMENT_ALIGNMENT: u64 = 512;
