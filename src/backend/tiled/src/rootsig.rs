//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Root-signature construction.
//!
//! The layout is computed from the resource counts the shaders declare,
//! skipping any group with a count of zero. For graphics the vertex stage's
//! groups come first, then the fragment stage's; each stage gets a disjoint
//! register space so registers do not clobber across stages. Uniform slots
//! use root constant-buffer views rather than a table so the bound address
//! can change between draws in O(1).
//!
//! For every logical bind point the builder records the root-parameter index
//! it resolved to; a negative index means "this stage has no such group" and
//! the binder skips it.
use ringfx_base::limits::MAX_UNIFORM_BUFFERS_PER_STAGE;

use crate::native::{RootParam, RootSignature, RootSignatureRef, TableKind};
use crate::pipeline::ComputeResourceCounts;
use crate::shader::ShaderResourceCounts;

/// "This stage has no such group."
pub(crate) const NO_ROOT_PARAM: i32 = -1;

/// Where each bind group of one graphics stage landed in the root signature.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StageRootIndices {
    pub(crate) sampler_table: i32,
    pub(crate) sampled_texture_table: i32,
    pub(crate) storage_texture_table: i32,
    pub(crate) storage_buffer_table: i32,
    pub(crate) uniform: [i32; MAX_UNIFORM_BUFFERS_PER_STAGE],
}

impl StageRootIndices {
    fn none() -> Self {
        Self {
            sampler_table: NO_ROOT_PARAM,
            sampled_texture_table: NO_ROOT_PARAM,
            storage_texture_table: NO_ROOT_PARAM,
            storage_buffer_table: NO_ROOT_PARAM,
            uniform: [NO_ROOT_PARAM; MAX_UNIFORM_BUFFERS_PER_STAGE],
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct GraphicsRootSignature {
    pub(crate) native: RootSignatureRef,
    pub(crate) vertex: StageRootIndices,
    pub(crate) fragment: StageRootIndices,
}

#[derive(Debug, Clone)]
pub(crate) struct ComputeRootSignature {
    pub(crate) native: RootSignatureRef,
    pub(crate) readonly_storage_texture_table: i32,
    pub(crate) readonly_storage_buffer_table: i32,
    pub(crate) readwrite_storage_texture_table: i32,
    pub(crate) readwrite_storage_buffer_table: i32,
    pub(crate) uniform: [i32; MAX_UNIFORM_BUFFERS_PER_STAGE],
}

fn push_stage(params: &mut Vec<RootParam>, counts: &ShaderResourceCounts) -> StageRootIndices {
    let mut indices = StageRootIndices::none();
    if counts.num_samplers > 0 {
        indices.sampler_table = params.len() as i32;
        params.push(RootParam::Table {
            kind: TableKind::Sampler,
            count: counts.num_samplers,
        });
        indices.sampled_texture_table = params.len() as i32;
        params.push(RootParam::Table {
            kind: TableKind::Srv,
            count: counts.num_samplers,
        });
    }
    if counts.num_storage_textures > 0 {
        indices.storage_texture_table = params.len() as i32;
        params.push(RootParam::Table {
            kind: TableKind::Srv,
            count: counts.num_storage_textures,
        });
    }
    if counts.num_storage_buffers > 0 {
        indices.storage_buffer_table = params.len() as i32;
        params.push(RootParam::Table {
            kind: TableKind::Srv,
            count: counts.num_storage_buffers,
        });
    }
    for slot in 0..counts.num_uniform_buffers.min(MAX_UNIFORM_BUFFERS_PER_STAGE as u32) {
        indices.uniform[slot as usize] = params.len() as i32;
        params.push(RootParam::Cbv);
    }
    indices
}

pub(crate) fn build_graphics(
    vertex: &ShaderResourceCounts,
    fragment: &ShaderResourceCounts,
) -> GraphicsRootSignature {
    let mut params = Vec::new();
    let vertex_indices = push_stage(&mut params, vertex);
    let fragment_indices = push_stage(&mut params, fragment);
    GraphicsRootSignature {
        native: std::sync::Arc::new(RootSignature::new(params)),
        vertex: vertex_indices,
        fragment: fragment_indices,
    }
}

pub(crate) fn build_compute(counts: &ComputeResourceCounts) -> ComputeRootSignature {
    let mut params = Vec::new();
    let mut sig = ComputeRootSignature {
        native: std::sync::Arc::new(RootSignature::new(Vec::new())),
        readonly_storage_texture_table: NO_ROOT_PARAM,
        readonly_storage_buffer_table: NO_ROOT_PARAM,
        readwrite_storage_texture_table: NO_ROOT_PARAM,
        readwrite_storage_buffer_table: NO_ROOT_PARAM,
        uniform: [NO_ROOT_PARAM; MAX_UNIFORM_BUFFERS_PER_STAGE],
    };
    if counts.num_readonly_storage_textures > 0 {
        sig.readonly_storage_texture_table = params.len() as i32;
        params.push(RootParam::Table {
            kind: TableKind::Srv,
            count: counts.num_readonly_storage_textures,
        });
    }
    if counts.num_readonly_storage_buffers > 0 {
        sig.readonly_storage_buffer_table = params.len() as i32;
        params.push(RootParam::Table {
            kind: TableKind::Srv,
            count: counts.num_readonly_storage_buffers,
        });
    }
    if counts.num_readwrite_storage_textures > 0 {
        sig.readwrite_storage_texture_table = params.len() as i32;
        params.push(RootParam::Table {
            kind: TableKind::Uav,
            count: counts.num_readwrite_storage_textures,
        });
    }
    if counts.num_readwrite_storage_buffers > 0 {
        sig.readwrite_storage_buffer_table = params.len() as i32;
        params.push(RootParam::Table {
            kind: TableKind::Uav,
            count: counts.num_readwrite_storage_buffers,
        });
    }
    for slot in 0..counts.num_uniform_buffers.min(MAX_UNIFORM_BUFFERS_PER_STAGE as u32) {
        sig.uniform[slot as usize] = params.len() as i32;
        params.push(RootParam::Cbv);
    }
    sig.native = std::sync::Arc::new(RootSignature::new(params));
    sig
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graphics_layout_skips_empty_groups() {
        let vs = ShaderResourceCounts {
            num_samplers: 0,
            num_storage_textures: 0,
            num_storage_buffers: 0,
            num_uniform_buffers: 1,
        };
        let fs = ShaderResourceCounts {
            num_samplers: 2,
            num_storage_textures: 0,
            num_storage_buffers: 1,
            num_uniform_buffers: 0,
        };
        let sig = build_graphics(&vs, &fs);

        assert_eq!(sig.vertex.sampler_table, NO_ROOT_PARAM);
        assert_eq!(sig.vertex.uniform[0], 0);
        assert_eq!(sig.vertex.uniform[1], NO_ROOT_PARAM);

        assert_eq!(sig.fragment.sampler_table, 1);
        assert_eq!(sig.fragment.sampled_texture_table, 2);
        assert_eq!(sig.fragment.storage_texture_table, NO_ROOT_PARAM);
        assert_eq!(sig.fragment.storage_buffer_table, 3);

        assert_eq!(sig.native.params.len(), 4);
    }

    #[test]
    fn compute_layout_orders_ro_before_rw() {
        let counts = ComputeResourceCounts {
            num_readonly_storage_textures: 1,
            num_readonly_storage_buffers: 0,
            num_readwrite_storage_textures: 2,
            num_readwrite_storage_buffers: 1,
            num_uniform_buffers: 2,
        };
        let sig = build_compute(&counts);
        assert_eq!(sig.readonly_storage_texture_table, 0);
        assert_eq!(sig.readonly_storage_buffer_table, NO_ROOT_PARAM);
        assert_eq!(sig.readwrite_storage_texture_table, 1);
        assert_eq!(sig.readwrite_storage_buffer_table, 2);
        assert_eq!(sig.uniform[0], 3);
        assert_eq!(sig.uniform[1], 4);
        assert_eq!(sig.native.params.len(), 5);
    }
}
