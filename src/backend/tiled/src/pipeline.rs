//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Graphics and compute pipeline objects.
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use ringfx_base::error::Result;
use ringfx_base::limits::{MAX_COLOR_TARGETS, MAX_VERTEX_BUFFERS};
use ringfx_base::{
    ColorTargetState, DepthStencilState, MultisampleState, PrimitiveTopology, RasterizerState,
    ShaderStage, TextureFormat, VertexAttribute, VertexBinding,
};

use crate::device::DeviceRef;
use crate::native::{PipelineKind, PipelineStateRef};
use crate::rootsig::{self, ComputeRootSignature, GraphicsRootSignature};
use crate::shader::{Shader, ShaderResourceCounts};

/// A graphics pipeline handle.
#[derive(Debug, Clone)]
pub struct GraphicsPipeline {
    pub(crate) inner: Arc<GraphicsPipelineInner>,
}

#[derive(Debug)]
pub(crate) struct GraphicsPipelineInner {
    pub(crate) pso: PipelineStateRef,
    pub(crate) root: GraphicsRootSignature,
    pub(crate) vertex_counts: ShaderResourceCounts,
    pub(crate) fragment_counts: ShaderResourceCounts,
    pub(crate) topology: PrimitiveTopology,
    pub(crate) blend_constants: [f32; 4],
    pub(crate) stencil_reference: u32,
    pub(crate) vertex_strides: [u32; MAX_VERTEX_BUFFERS],
    pub(crate) rasterizer: RasterizerState,
    pub(crate) depth_stencil: DepthStencilState,
    pub(crate) multisample: MultisampleState,
    pub(crate) vertex_bindings: Vec<VertexBinding>,
    pub(crate) vertex_attributes: Vec<VertexAttribute>,
    pub(crate) in_flight: AtomicUsize,
}

impl GraphicsPipeline {
    pub fn topology(&self) -> PrimitiveTopology {
        self.inner.topology
    }

    pub fn vertex_bindings(&self) -> &[VertexBinding] {
        &self.inner.vertex_bindings
    }

    pub fn vertex_attributes(&self) -> &[VertexAttribute] {
        &self.inner.vertex_attributes
    }

    pub fn rasterizer_state(&self) -> &RasterizerState {
        &self.inner.rasterizer
    }

    pub fn depth_stencil_state(&self) -> &DepthStencilState {
        &self.inner.depth_stencil
    }

    pub fn multisample_state(&self) -> &MultisampleState {
        &self.inner.multisample
    }
}

/// A compute pipeline handle.
#[derive(Debug, Clone)]
pub struct ComputePipeline {
    pub(crate) inner: Arc<ComputePipelineInner>,
}

#[derive(Debug)]
pub(crate) struct ComputePipelineInner {
    pub(crate) pso: PipelineStateRef,
    pub(crate) root: ComputeRootSignature,
    pub(crate) counts: ComputeResourceCounts,
    pub(crate) entry_point: String,
    pub(crate) workgroup_size: (u32, u32, u32),
    pub(crate) in_flight: AtomicUsize,
}

impl ComputePipeline {
    pub fn resource_counts(&self) -> ComputeResourceCounts {
        self.inner.counts
    }

    pub fn entry_point(&self) -> &str {
        &self.inner.entry_point
    }

    /// The workgroup dimensions the shader was compiled with.
    pub fn workgroup_size(&self) -> (u32, u32, u32) {
        self.inner.workgroup_size
    }
}

/// The resource slot counts a compute shader declares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComputeResourceCounts {
    pub num_readonly_storage_textures: u32,
    pub num_readonly_storage_buffers: u32,
    pub num_readwrite_storage_textures: u32,
    pub num_readwrite_storage_buffers: u32,
    pub num_uniform_buffers: u32,
}

/// Builder for graphics pipelines.
#[derive(Debug)]
pub struct GraphicsPipelineBuilder {
    device: DeviceRef,
    vertex_shader: Option<Shader>,
    fragment_shader: Option<Shader>,
    color_targets: Vec<ColorTargetState>,
    depth_stencil_format: Option<TextureFormat>,
    depth_stencil: DepthStencilState,
    rasterizer: RasterizerState,
    multisample: MultisampleState,
    topology: PrimitiveTopology,
    blend_constants: [f32; 4],
    vertex_bindings: Vec<VertexBinding>,
    vertex_attributes: Vec<VertexAttribute>,
}

impl GraphicsPipelineBuilder {
    pub(crate) fn new(device: DeviceRef) -> Self {
        Self {
            device,
            vertex_shader: None,
            fragment_shader: None,
            color_targets: Vec::new(),
            depth_stencil_format: None,
            depth_stencil: Default::default(),
            rasterizer: Default::default(),
            multisample: Default::default(),
            topology: PrimitiveTopology::TriangleList,
            blend_constants: [0.0; 4],
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
        }
    }

    /// Set the vertex shader. Mandatory.
    pub fn vertex_shader(&mut self, v: &Shader) -> &mut Self {
        assert_eq!(v.stage(), ShaderStage::Vertex, "bad shader stage");
        self.vertex_shader = Some(v.clone());
        self
    }

    /// Set the fragment shader. Mandatory.
    pub fn fragment_shader(&mut self, v: &Shader) -> &mut Self {
        assert_eq!(v.stage(), ShaderStage::Fragment, "bad shader stage");
        self.fragment_shader = Some(v.clone());
        self
    }

    /// Define the color attachment slots. At least one attachment (color or
    /// depth-stencil) is required.
    pub fn color_targets(&mut self, v: &[ColorTargetState]) -> &mut Self {
        assert!(v.len() <= MAX_COLOR_TARGETS, "too many color targets");
        self.color_targets = v.to_vec();
        self
    }

    /// Attach a depth-stencil target slot of the given format.
    pub fn depth_stencil_format(&mut self, v: TextureFormat) -> &mut Self {
        self.depth_stencil_format = Some(v);
        self
    }

    pub fn depth_stencil(&mut self, v: DepthStencilState) -> &mut Self {
        self.depth_stencil = v;
        self
    }

    pub fn rasterizer(&mut self, v: RasterizerState) -> &mut Self {
        self.rasterizer = v;
        self
    }

    pub fn multisample(&mut self, v: MultisampleState) -> &mut Self {
        self.multisample = v;
        self
    }

    /// Set the primitive topology. Defaults to a triangle list.
    pub fn topology(&mut self, v: PrimitiveTopology) -> &mut Self {
        self.topology = v;
        self
    }

    /// Set the blend constants baked into the pipeline.
    pub fn blend_constants(&mut self, v: [f32; 4]) -> &mut Self {
        self.blend_constants = v;
        self
    }

    pub fn vertex_bindings(&mut self, v: &[VertexBinding]) -> &mut Self {
        assert!(v.len() <= MAX_VERTEX_BUFFERS, "too many vertex bindings");
        self.vertex_bindings = v.to_vec();
        self
    }

    pub fn vertex_attributes(&mut self, v: &[VertexAttribute]) -> &mut Self {
        self.vertex_attributes = v.to_vec();
        self
    }

    pub fn build(&mut self) -> Result<GraphicsPipeline> {
        let vertex_shader = self.vertex_shader.clone().expect("vertex_shader");
        let fragment_shader = self.fragment_shader.clone().expect("fragment_shader");
        assert!(
            !self.color_targets.is_empty() || self.depth_stencil_format.is_some(),
            "no attachments"
        );

        let vertex_counts = vertex_shader.resource_counts();
        let fragment_counts = fragment_shader.resource_counts();
        let root = rootsig::build_graphics(&vertex_counts, &fragment_counts);

        let mut vertex_strides = [0u32; MAX_VERTEX_BUFFERS];
        for binding in &self.vertex_bindings {
            vertex_strides[binding.binding as usize] = binding.stride;
        }

        let pso = self.device.native.create_pipeline_state(
            root.native.clone(),
            PipelineKind::Graphics {
                num_color_targets: self.color_targets.len() as u32,
                has_depth_stencil: self.depth_stencil_format.is_some(),
                topology: self.topology,
            },
            vec![
                vertex_shader.inner.bytecode.clone(),
                fragment_shader.inner.bytecode.clone(),
            ],
        );

        Ok(GraphicsPipeline {
            inner: Arc::new(GraphicsPipelineInner {
                pso,
                root,
                vertex_counts,
                fragment_counts,
                topology: self.topology,
                blend_constants: self.blend_constants,
                stencil_reference: self.depth_stencil.reference as u32,
                vertex_strides,
                rasterizer: self.rasterizer,
                depth_stencil: self.depth_stencil,
                multisample: self.multisample,
                vertex_bindings: std::mem::take(&mut self.vertex_bindings),
                vertex_attributes: std::mem::take(&mut self.vertex_attributes),
                in_flight: AtomicUsize::new(0),
            }),
        })
    }
}

/// Builder for compute pipelines.
#[derive(Debug)]
pub struct ComputePipelineBuilder {
    device: DeviceRef,
    bytecode: Vec<u8>,
    entry_point: String,
    counts: ComputeResourceCounts,
    workgroup_size: (u32, u32, u32),
}

impl ComputePipelineBuilder {
    pub(crate) fn new(device: DeviceRef) -> Self {
        Self {
            device,
            bytecode: Vec::new(),
            entry_point: "main".to_owned(),
            counts: Default::default(),
            workgroup_size: (1, 1, 1),
        }
    }

    /// Set the compute shader bytecode. Mandatory; must be non-empty.
    pub fn code(&mut self, v: &[u8]) -> &mut Self {
        self.bytecode = v.to_owned();
        self
    }

    /// Set the entry point name. Defaults to `"main"`.
    pub fn entry_point(&mut self, v: &str) -> &mut Self {
        self.entry_point = v.to_owned();
        self
    }

    /// Declare the shader's resource slot counts. Defaults to all zero.
    pub fn resource_counts(&mut self, v: ComputeResourceCounts) -> &mut Self {
        self.counts = v;
        self
    }

    /// Set the workgroup dimensions the shader was compiled with.
    pub fn workgroup_size(&mut self, x: u32, y: u32, z: u32) -> &mut Self {
        assert!(x > 0 && y > 0 && z > 0, "workgroup_size");
        self.workgroup_size = (x, y, z);
        self
    }

    pub fn build(&mut self) -> Result<ComputePipeline> {
        assert!(!self.bytecode.is_empty(), "code");
        let root = rootsig::build_compute(&self.counts);
        let pso = self.device.native.create_pipeline_state(
            root.native.clone(),
            PipelineKind::Compute,
            vec![std::mem::take(&mut self.bytecode)],
        );
        Ok(ComputePipeline {
            inner: Arc::new(ComputePipelineInner {
                pso,
                root,
                counts: self.counts,
                entry_point: std::mem::take(&mut self.entry_point),
                workgroup_size: self.workgroup_size,
                in_flight: AtomicUsize::new(0),
            }),
        })
    }
}
