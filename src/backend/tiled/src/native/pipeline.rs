//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Root signatures, pipeline state objects, and indirect-command signatures
//! of the software runtime.
//!
//! Shader bytecode is retained but never interpreted — the runtime validates
//! binding state, not shading results.
use snowflake::ProcessUniqueId;
use std::sync::Arc;

use ringfx_base::PrimitiveTopology;

/// The kind of a descriptor table root parameter.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub(crate) enum TableKind {
    Sampler,
    Srv,
    Uav,
}

/// One root parameter of a root signature.
#[derive(Debug, Clone, Copy)]
pub(crate) enum RootParam {
    /// A descriptor table of `count` contiguous slots.
    Table { kind: TableKind, count: u32 },
    /// A root constant-buffer view bound by GPU virtual address.
    Cbv,
}

/// A serialized root signature.
#[derive(Debug)]
pub(crate) struct RootSignature {
    pub(crate) id: ProcessUniqueId,
    pub(crate) params: Vec<RootParam>,
}

pub(crate) type RootSignatureRef = Arc<RootSignature>;

impl RootSignature {
    pub(crate) fn new(params: Vec<RootParam>) -> Self {
        Self {
            id: ProcessUniqueId::new(),
            params,
        }
    }
}

#[derive(Debug)]
pub(crate) enum PipelineKind {
    Graphics {
        num_color_targets: u32,
        has_depth_stencil: bool,
        topology: PrimitiveTopology,
    },
    Compute,
}

/// A compiled pipeline state object.
#[derive(Debug)]
pub(crate) struct PipelineState {
    pub(crate) root_signature: RootSignatureRef,
    pub(crate) kind: PipelineKind,
    /// Opaque shader blobs, retained for the lifetime of the pipeline.
    #[allow(dead_code)]
    pub(crate) bytecode: Vec<Vec<u8>>,
}

pub(crate) type PipelineStateRef = Arc<PipelineState>;

impl PipelineState {
    pub(crate) fn new(
        root_signature: RootSignatureRef,
        kind: PipelineKind,
        bytecode: Vec<Vec<u8>>,
    ) -> Self {
        Self {
            root_signature,
            kind,
            bytecode,
        }
    }
}

/// The indirect-argument layout an `execute_indirect` command decodes.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub(crate) enum IndirectSignature {
    /// 16-byte draw arguments.
    Draw,
    /// 20-byte indexed-draw arguments.
    DrawIndexed,
    /// 12-byte dispatch arguments.
    Dispatch,
}

impl IndirectSignature {
    pub(crate) fn stride(&self) -> u64 {
        match *self {
            IndirectSignature::Draw => 16,
            IndirectSignature::DrawIndexed => 20,
            IndirectSignature::Dispatch => 12,
        }
    }
}
