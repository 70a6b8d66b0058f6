//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
use bitflags::bitflags;

bitflags! {
    /// Specifies the operations a texture participates in.
    ///
    /// The usage set is fixed at creation and drives both native resource
    /// flags and the texture's default access state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsageFlags: u32 {
        /// The texture can be sampled from a shader.
        const SAMPLER = 0b0000001;
        /// The texture can be bound as a color render target.
        const COLOR_TARGET = 0b0000010;
        /// The texture can be bound as a depth-stencil target.
        const DEPTH_STENCIL_TARGET = 0b0000100;
        /// The texture can be read as storage from graphics shaders.
        const GRAPHICS_STORAGE_READ = 0b0001000;
        /// The texture can be written as storage from graphics shaders.
        const GRAPHICS_STORAGE_WRITE = 0b0010000;
        /// The texture can be read as storage from compute shaders.
        const COMPUTE_STORAGE_READ = 0b0100000;
        /// The texture can be written as storage from compute shaders.
        const COMPUTE_STORAGE_WRITE = 0b1000000;
    }
}

bitflags! {
    /// Specifies the operations a buffer participates in.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsageFlags: u32 {
        /// The buffer can be bound as a vertex buffer.
        const VERTEX = 0b0000001;
        /// The buffer can be bound as an index buffer.
        const INDEX = 0b0000010;
        /// The buffer can supply indirect draw/dispatch arguments.
        const INDIRECT = 0b0000100;
        /// The buffer can be read as storage from graphics shaders.
        const GRAPHICS_STORAGE_READ = 0b0001000;
        /// The buffer can be written as storage from graphics shaders.
        const GRAPHICS_STORAGE_WRITE = 0b0010000;
        /// The buffer can be read as storage from compute shaders.
        const COMPUTE_STORAGE_READ = 0b0100000;
        /// The buffer can be written as storage from compute shaders.
        const COMPUTE_STORAGE_WRITE = 0b1000000;
    }
}

impl BufferUsageFlags {
    /// Return `true` if any writable-storage usage is included.
    pub fn is_storage_writable(&self) -> bool {
        self.intersects(Self::GRAPHICS_STORAGE_WRITE | Self::COMPUTE_STORAGE_WRITE)
    }

    /// Return `true` if any readable-storage usage is included.
    pub fn is_storage_readable(&self) -> bool {
        self.intersects(Self::GRAPHICS_STORAGE_READ | Self::COMPUTE_STORAGE_READ)
    }
}

impl TextureUsageFlags {
    /// Return `true` if any storage-read usage is included.
    pub fn is_storage_readable(&self) -> bool {
        self.intersects(Self::GRAPHICS_STORAGE_READ | Self::COMPUTE_STORAGE_READ)
    }
}

bitflags! {
    /// Specifies a set of color channels.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorComponentFlags: u8 {
        const RED = 0b0001;
        const GREEN = 0b0010;
        const BLUE = 0b0100;
        const ALPHA = 0b1000;
    }
}

impl ColorComponentFlags {
    pub fn rgba() -> Self {
        Self::all()
    }
}

/// Identifies a programmable pipeline stage.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

/// The memory class a buffer lives in.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum BufferType {
    /// Device-local memory. Not host-visible.
    Gpu,
    /// The persistently mapped upload class used by the uniform-buffer
    /// sub-allocator.
    Uniform,
    /// Host-visible upload memory, persistently mapped.
    Upload,
    /// Host-visible readback memory, mapped on demand.
    Readback,
}

/// The direction of a transfer buffer.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum TransferUsage {
    Upload,
    Download,
}
