//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Wire layouts of indirect command arguments.
//!
//! Applications that record indirect draws and dispatches write these
//! structures into an `INDIRECT`-usage buffer. The layouts match the native
//! indirect-argument signatures of the reference backend: 16 bytes for a
//! draw, 20 bytes for an indexed draw, and 12 bytes for a dispatch.

/// The data layout for indirect draw calls.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawIndirectArgs {
    /// The number of vertices to draw.
    pub num_vertices: u32,
    /// The number of instances to draw.
    pub num_instances: u32,
    /// The first vertex index to draw.
    pub first_vertex: u32,
    /// The first instance index to draw.
    pub first_instance: u32,
}

/// The data layout for indexed indirect draw calls.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawIndexedIndirectArgs {
    /// The number of indices to draw.
    pub num_indices: u32,
    /// The number of instances to draw.
    pub num_instances: u32,
    /// The first index within the index buffer.
    pub first_index: u32,
    /// The value added before indexing into the vertex buffers.
    pub vertex_offset: i32,
    /// The first instance index to draw.
    pub first_instance: u32,
}

/// The data layout for indirect dispatch calls.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchIndirectArgs {
    pub group_count_x: u32,
    pub group_count_y: u32,
    pub group_count_z: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn wire_sizes() {
        assert_eq!(size_of::<DrawIndirectArgs>(), 16);
        assert_eq!(size_of::<DrawIndexedIndirectArgs>(), 20);
        assert_eq!(size_of::<DispatchIndirectArgs>(), 12);
    }
}
