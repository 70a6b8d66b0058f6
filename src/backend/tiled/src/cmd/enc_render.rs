//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! The render pass encoder.
use arrayvec::ArrayVec;
use std::sync::Arc;

use ringfx_base::limits::MAX_COLOR_TARGETS;
use ringfx_base::{IndexFormat, LoadOp, Rect2D, Viewport};
use ringfx_common::cgmath::Vector2;

use crate::buffer::Buffer;
use crate::cmd::buffer::{
    BufferBinding, CbInner, ColorAttachmentInfo, DepthStencilAttachmentInfo, TextureSamplerBinding,
    TextureSlice,
};
use crate::native::{Cmd, IndirectSignature, ResourceState};
use crate::pipeline::GraphicsPipeline;
use crate::resstate;
use crate::texture::ConcreteTexture;
use ringfx_base::ShaderStage;

/// Records draws into a render pass. Dropping the encoder ends the pass and
/// transitions every attachment back to its default state.
#[derive(Debug)]
pub struct RenderEncoder<'a> {
    cb: &'a mut CbInner,
    color_subresources: ArrayVec<(Arc<ConcreteTexture>, u32), MAX_COLOR_TARGETS>,
    depth_stencil_subresource: Option<(Arc<ConcreteTexture>, u32)>,
}

impl<'a> RenderEncoder<'a> {
    pub(crate) fn begin(
        cb: &'a mut CbInner,
        color_attachments: &[ColorAttachmentInfo<'_>],
        depth_stencil_attachment: Option<&DepthStencilAttachmentInfo<'_>>,
    ) -> Self {
        assert!(
            color_attachments.len() <= MAX_COLOR_TARGETS,
            "too many color attachments"
        );
        assert!(
            !color_attachments.is_empty() || depth_stencil_attachment.is_some(),
            "no attachments"
        );

        let mut color_subresources = ArrayVec::new();
        let mut min_width = u32::MAX;
        let mut min_height = u32::MAX;

        for attachment in color_attachments {
            let container = &attachment.texture.container;
            // Loading existing contents and cycling are mutually exclusive.
            let cycle = attachment.cycle && attachment.load_op != LoadOp::Load;
            let (concrete, index) = container.prepare_subresource_for_write(
                &mut cb.list,
                attachment.layer,
                attachment.level,
                cycle,
                ResourceState::RenderTarget,
            );
            if attachment.load_op == LoadOp::Clear {
                cb.list
                    .clear_rtv(&concrete.resource, index, attachment.clear_color);
            }
            cb.track_texture_subresource(&concrete, index);
            color_subresources.push((concrete, index));

            let info = container.info;
            min_width = min_width.min((info.width >> attachment.level).max(1));
            min_height = min_height.min((info.height >> attachment.level).max(1));
        }

        let depth_stencil_subresource = depth_stencil_attachment.map(|attachment| {
            let container = &attachment.texture.container;
            let cycle = attachment.cycle
                && attachment.load_op != LoadOp::Load
                && attachment.stencil_load_op != LoadOp::Load;
            let (concrete, index) = container.prepare_subresource_for_write(
                &mut cb.list,
                attachment.layer,
                attachment.level,
                cycle,
                ResourceState::DepthWrite,
            );
            let clear_depth =
                (attachment.load_op == LoadOp::Clear).then_some(attachment.clear_value.depth);
            let clear_stencil = (attachment.stencil_load_op == LoadOp::Clear)
                .then_some(attachment.clear_value.stencil as u8);
            if clear_depth.is_some() || clear_stencil.is_some() {
                cb.list
                    .clear_dsv(&concrete.resource, index, clear_depth, clear_stencil);
            }
            cb.track_texture_subresource(&concrete, index);

            let info = container.info;
            min_width = min_width.min((info.width >> attachment.level).max(1));
            min_height = min_height.min((info.height >> attachment.level).max(1));

            (concrete, index)
        });

        cb.list.push(Cmd::SetRenderTargets {
            colors: color_subresources
                .iter()
                .map(|(concrete, index)| (concrete.resource.clone(), *index))
                .collect(),
            depth_stencil: depth_stencil_subresource
                .as_ref()
                .map(|(concrete, index)| (concrete.resource.clone(), *index)),
        });

        // A default viewport and scissor covering the smallest attachment.
        let mut encoder = Self {
            cb,
            color_subresources,
            depth_stencil_subresource,
        };
        encoder.set_viewport(&Viewport {
            x: 0.0,
            y: 0.0,
            width: min_width as f32,
            height: min_height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        });
        encoder.set_scissor(&Rect2D::new(
            Vector2::new(0, 0),
            Vector2::new(min_width, min_height),
        ));
        encoder
    }

    /// Set the pipeline state and flag every binding group of both stages for
    /// rebinding.
    pub fn bind_pipeline(&mut self, pipeline: &GraphicsPipeline) {
        self.cb.bind_graphics_pipeline(pipeline);
    }

    pub fn set_viewport(&mut self, viewport: &Viewport) {
        self.cb.list.push(Cmd::SetViewport(*viewport));
    }

    pub fn set_scissor(&mut self, scissor: &Rect2D<u32>) {
        self.cb.list.push(Cmd::SetScissor(*scissor));
    }

    pub fn bind_vertex_buffers(&mut self, first_slot: u32, bindings: &[BufferBinding<'_>]) {
        self.cb.bind_vertex_buffers(first_slot, bindings);
    }

    pub fn bind_index_buffer(&mut self, buffer: &Buffer, offset: u64, format: IndexFormat) {
        let concrete = buffer.container.active();
        self.cb.track_buffer(&concrete);
        self.cb.list.push(Cmd::SetIndexBuffer {
            resource: concrete.resource.clone(),
            offset,
            format,
        });
    }

    pub fn bind_vertex_samplers(&mut self, first_slot: u32, bindings: &[TextureSamplerBinding<'_>]) {
        self.cb.bind_samplers(ShaderStage::Vertex, first_slot, bindings);
    }

    pub fn bind_vertex_storage_textures(&mut self, first_slot: u32, slices: &[TextureSlice<'_>]) {
        self.cb
            .bind_storage_textures(ShaderStage::Vertex, first_slot, slices);
    }

    pub fn bind_vertex_storage_buffers(&mut self, first_slot: u32, buffers: &[&Buffer]) {
        self.cb
            .bind_storage_buffers(ShaderStage::Vertex, first_slot, buffers);
    }

    pub fn bind_fragment_samplers(
        &mut self,
        first_slot: u32,
        bindings: &[TextureSamplerBinding<'_>],
    ) {
        self.cb
            .bind_samplers(ShaderStage::Fragment, first_slot, bindings);
    }

    pub fn bind_fragment_storage_textures(&mut self, first_slot: u32, slices: &[TextureSlice<'_>]) {
        self.cb
            .bind_storage_textures(ShaderStage::Fragment, first_slot, slices);
    }

    pub fn bind_fragment_storage_buffers(&mut self, first_slot: u32, buffers: &[&Buffer]) {
        self.cb
            .bind_storage_buffers(ShaderStage::Fragment, first_slot, buffers);
    }

    pub fn push_vertex_uniform_data(&mut self, slot: u32, data: &[u8]) {
        self.cb.push_uniform_data(ShaderStage::Vertex, slot, data);
    }

    pub fn push_fragment_uniform_data(&mut self, slot: u32, data: &[u8]) {
        self.cb.push_uniform_data(ShaderStage::Fragment, slot, data);
    }

    pub fn draw(
        &mut self,
        num_vertices: u32,
        num_instances: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        self.cb.flush_graphics_bindings();
        self.cb.list.push(Cmd::Draw {
            num_vertices,
            num_instances,
            first_vertex,
            first_instance,
        });
    }

    pub fn draw_indexed(
        &mut self,
        num_indices: u32,
        num_instances: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        self.cb.flush_graphics_bindings();
        self.cb.list.push(Cmd::DrawIndexed {
            num_indices,
            num_instances,
            first_index,
            vertex_offset,
            first_instance,
        });
    }

    /// Draw with parameters read from `buffer` at `offset`, laid out as
    /// [`ringfx_base::DrawIndirectArgs`].
    pub fn draw_indirect(&mut self, buffer: &Buffer, offset: u64) {
        let concrete = buffer.container.active();
        self.cb.track_buffer(&concrete);
        self.cb.flush_graphics_bindings();
        self.cb.list.push(Cmd::ExecuteIndirect {
            signature: IndirectSignature::Draw,
            resource: concrete.resource.clone(),
            offset,
        });
    }

    pub fn draw_indexed_indirect(&mut self, buffer: &Buffer, offset: u64) {
        let concrete = buffer.container.active();
        self.cb.track_buffer(&concrete);
        self.cb.flush_graphics_bindings();
        self.cb.list.push(Cmd::ExecuteIndirect {
            signature: IndirectSignature::DrawIndexed,
            resource: concrete.resource.clone(),
            offset,
        });
    }
}

impl Drop for RenderEncoder<'_> {
    fn drop(&mut self) {
        for (concrete, index) in &self.color_subresources {
            resstate::transition_texture_to_default(
                &mut self.cb.list,
                concrete,
                *index,
                ResourceState::RenderTarget,
            );
        }
        if let Some((ref concrete, index)) = self.depth_stencil_subresource {
            resstate::transition_texture_to_default(
                &mut self.cb.list,
                concrete,
                index,
                ResourceState::DepthWrite,
            );
        }
        self.cb.bind.graphics_pipeline = None;
        self.cb.list.push(Cmd::SetRenderTargets {
            colors: Vec::new(),
            depth_stencil: None,
        });
    }
}
