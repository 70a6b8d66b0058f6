//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! The internal blit helper.
//!
//! Blits are rendered: a fullscreen triangle samples the source region and
//! writes it to the destination through one of four pipelines chosen by the
//! source dimensionality (2D, 2D array, 3D, cube). The fragment uniform
//! carries the source region normalized to the source dimensions.
//!
//! The shader blobs below are in the runtime's opaque bytecode container;
//! the software runtime retains them without interpreting them.
use ringfx_base::error::Result;
use ringfx_base::{
    AddressMode, ColorTargetBlendState, ColorTargetState, Filter, LoadOp, MipmapMode, Rect2D,
    SamplerDesc, ShaderStage, StoreOp, TextureFormat, TextureUsageFlags, Viewport,
};
use ringfx_common::cgmath::Vector2;

use crate::cmd::buffer::{CbInner, ColorAttachmentInfo};
use crate::cmd::enc_render::RenderEncoder;
use crate::descriptor::StagingKind;
use crate::device::Device;
use crate::native::DescriptorPayload;
use crate::pipeline::GraphicsPipeline;
use crate::sampler::Sampler;
use crate::shader::ShaderResourceCounts;
use crate::texture::Texture;

static FULLSCREEN_VERT: &[u8] = b"RGFX\x01FullscreenVert";
static BLIT_FROM_2D_FRAG: &[u8] = b"RGFX\x01BlitFrom2D";
static BLIT_FROM_2D_ARRAY_FRAG: &[u8] = b"RGFX\x01BlitFrom2DArray";
static BLIT_FROM_3D_FRAG: &[u8] = b"RGFX\x01BlitFrom3D";
static BLIT_FROM_CUBE_FRAG: &[u8] = b"RGFX\x01BlitFromCube";

/// A region of one texture layer (or depth plane, for 3D sources).
#[derive(Debug, Clone, Copy)]
pub struct BlitRegion<'a> {
    pub texture: &'a Texture,
    pub layer_or_depth_plane: u32,
    pub level: u32,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// The pipelines and samplers built once at device initialization.
#[derive(Debug)]
pub(crate) struct BlitPipelines {
    from_2d: GraphicsPipeline,
    from_2d_array: GraphicsPipeline,
    from_3d: GraphicsPipeline,
    from_cube: GraphicsPipeline,
    nearest: Sampler,
    linear: Sampler,
}

impl BlitPipelines {
    pub(crate) fn new(device: &Device) -> Result<Self> {
        let vertex = device
            .build_shader()
            .stage(ShaderStage::Vertex)
            .code(FULLSCREEN_VERT)
            .entry_point("FullscreenVert")
            .build()?;

        let fragment_counts = ShaderResourceCounts {
            num_samplers: 1,
            num_storage_textures: 0,
            num_storage_buffers: 0,
            num_uniform_buffers: 1,
        };
        let make_pipeline = |code: &[u8], entry: &str| -> Result<GraphicsPipeline> {
            let fragment = device
                .build_shader()
                .stage(ShaderStage::Fragment)
                .code(code)
                .entry_point(entry)
                .resource_counts(fragment_counts)
                .build()?;
            device
                .build_graphics_pipeline()
                .vertex_shader(&vertex)
                .fragment_shader(&fragment)
                .color_targets(&[ColorTargetState {
                    format: TextureFormat::B8G8R8A8Unorm,
                    blend: ColorTargetBlendState::default(),
                }])
                .build()
        };

        let nearest = SamplerDesc {
            mag_filter: Filter::Nearest,
            min_filter: Filter::Nearest,
            mipmap_mode: MipmapMode::Nearest,
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
            ..Default::default()
        };
        let linear = SamplerDesc {
            mag_filter: Filter::Linear,
            min_filter: Filter::Linear,
            mipmap_mode: MipmapMode::Nearest,
            ..nearest
        };

        Ok(Self {
            from_2d: make_pipeline(BLIT_FROM_2D_FRAG, "BlitFrom2D")?,
            from_2d_array: make_pipeline(BLIT_FROM_2D_ARRAY_FRAG, "BlitFrom2DArray")?,
            from_3d: make_pipeline(BLIT_FROM_3D_FRAG, "BlitFrom3D")?,
            from_cube: make_pipeline(BLIT_FROM_CUBE_FRAG, "BlitFromCube")?,
            nearest: device.new_sampler(&nearest)?,
            linear: device.new_sampler(&linear)?,
        })
    }

    fn pipeline_for(&self, texture: &Texture) -> &GraphicsPipeline {
        let info = texture.info();
        if info.cube {
            &self.from_cube
        } else if info.depth > 1 {
            &self.from_3d
        } else if info.layer_count > 1 {
            &self.from_2d_array
        } else {
            &self.from_2d
        }
    }

    fn sampler_for(&self, filter: Filter) -> &Sampler {
        match filter {
            Filter::Nearest => &self.nearest,
            Filter::Linear => &self.linear,
        }
    }
}

/// Record a region-to-region blit.
pub(crate) fn blit(
    cb: &mut CbInner,
    source: &BlitRegion<'_>,
    destination: &BlitRegion<'_>,
    filter: Filter,
    cycle: bool,
) {
    let src_info = *source.texture.info();
    let dst_info = *destination.texture.info();
    if !src_info.usage.contains(TextureUsageFlags::SAMPLER) {
        log::error!("blit source must have sampler usage");
        return;
    }
    if !dst_info.usage.contains(TextureUsageFlags::COLOR_TARGET) {
        log::error!("blit destination must have color-target usage");
        return;
    }

    let device = cb.device().clone();
    let pipelines = device.blit_pipelines();
    let pipeline = pipelines.pipeline_for(source.texture).clone();
    let sampler = pipelines.sampler_for(filter).clone();

    // Clearing is cheaper than loading when the write covers everything.
    let dst_width = (dst_info.width >> destination.level).max(1);
    let dst_height = (dst_info.height >> destination.level).max(1);
    let full_coverage = destination.x == 0
        && destination.y == 0
        && destination.w == dst_width
        && destination.h == dst_height;
    let load_op = if full_coverage { LoadOp::Clear } else { LoadOp::Load };

    let src_width = (src_info.width >> source.level).max(1) as f32;
    let src_height = (src_info.height >> source.level).max(1) as f32;
    let region = [
        source.x as f32 / src_width,
        source.y as f32 / src_height,
        source.w as f32 / src_width,
        source.h as f32 / src_height,
    ];
    let mut uniform = [0u8; 16];
    for (i, value) in region.iter().enumerate() {
        uniform[i * 4..i * 4 + 4].copy_from_slice(&value.to_le_bytes());
    }

    // The source is sampled through a transient per-sub-resource view so the
    // destination level of the same texture can be a render target meanwhile
    // (the mipmap-generation case).
    let src_concrete = source.texture.container.active();
    let src_index =
        source.layer_or_depth_plane * source.texture.container.info.level_count + source.level;
    let src_view = {
        let mut staging = device.staging.lock();
        let descriptor = staging.allocate(StagingKind::View);
        descriptor.write(DescriptorPayload::Srv {
            resource: src_concrete.resource.clone(),
            first_subresource: src_index,
            num_subresources: 1,
        });
        descriptor
    };
    cb.track_texture_subresource(&src_concrete, src_index);
    cb.bind_sampler_pair(ShaderStage::Fragment, 0, &sampler, src_view.clone());
    cb.transient_views.push(src_view);

    let attachment = ColorAttachmentInfo {
        texture: destination.texture,
        layer: destination.layer_or_depth_plane,
        level: destination.level,
        load_op,
        store_op: StoreOp::Store,
        clear_color: [0.0; 4],
        cycle,
    };
    let mut encoder = RenderEncoder::begin(cb, &[attachment], None);
    encoder.bind_pipeline(&pipeline);
    encoder.push_fragment_uniform_data(0, &uniform);
    encoder.set_viewport(&Viewport {
        x: destination.x as f32,
        y: destination.y as f32,
        width: destination.w as f32,
        height: destination.h as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    });
    encoder.set_scissor(&Rect2D::new(
        Vector2::new(destination.x, destination.y),
        Vector2::new(destination.x + destination.w, destination.y + destination.h),
    ));
    encoder.draw(3, 1, 0, 0);
}

/// Regenerate every mipmap level of `texture` from level 0, one blit per
/// level, sampling the level above.
pub(crate) fn generate_mipmaps(cb: &mut CbInner, texture: &Texture) {
    let info = *texture.info();
    if !info.usage.contains(TextureUsageFlags::SAMPLER)
        || !info.usage.contains(TextureUsageFlags::COLOR_TARGET)
    {
        log::error!("mipmap generation needs sampler and color-target usage");
        return;
    }
    for layer in 0..info.layer_count {
        for level in 1..info.level_count {
            let source = BlitRegion {
                texture,
                layer_or_depth_plane: layer,
                level: level - 1,
                x: 0,
                y: 0,
                w: (info.width >> (level - 1)).max(1),
                h: (info.height >> (level - 1)).max(1),
            };
            let destination = BlitRegion {
                texture,
                layer_or_depth_plane: layer,
                level,
                x: 0,
                y: 0,
                w: (info.width >> level).max(1),
                h: (info.height >> level).max(1),
            };
            blit(cb, &source, &destination, Filter::Linear, false);
        }
    }
}
