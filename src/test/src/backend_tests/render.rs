//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
use super::TestDriver;
use crate::utils;
use ringfx_base::{
    ColorTargetBlendState, ColorTargetState, CmpFn, DepthStencilState, DepthStencilValue, Filter,
    LoadOp, ShaderStage, StoreOp, TextureFormat, TextureUsageFlags, TransferUsage,
};
use ringfx_tiled::{
    BlitRegion, ColorAttachmentInfo, DepthStencilAttachmentInfo, ShaderResourceCounts,
    TextureRegion, TextureTransferInfo,
};

static NULL_VERTEX: &[u8] = b"RGFX\x01PassthroughVert";
static NULL_FRAGMENT: &[u8] = b"RGFX\x01SolidFrag";

pub fn render_clear_offscreen<T: TestDriver>(driver: T) {
    utils::init_logger();
    driver.for_each_device(&mut |device| {
        println!("- Creating the render target");
        let target = device
            .build_texture()
            .extents(&[64, 64])
            .format(TextureFormat::B8G8R8A8Unorm)
            .usage(TextureUsageFlags::COLOR_TARGET | TextureUsageFlags::SAMPLER)
            .build()
            .unwrap();
        let readback = device
            .build_transfer_buffer()
            .size(64 * 64 * 4)
            .usage(TransferUsage::Download)
            .build()
            .unwrap();

        println!("- Clearing to opaque red");
        let mut cmd_buffer = device.acquire_cmd_buffer().unwrap();
        {
            let _pass = cmd_buffer.encode_render(
                &[ColorAttachmentInfo {
                    texture: &target,
                    layer: 0,
                    level: 0,
                    load_op: LoadOp::Clear,
                    store_op: StoreOp::Store,
                    clear_color: [1.0, 0.0, 0.0, 1.0],
                    cycle: true,
                }],
                None,
            );
        }
        {
            let mut copy = cmd_buffer.encode_copy();
            copy.download_from_texture(
                &TextureRegion {
                    texture: &target,
                    layer: 0,
                    level: 0,
                    x: 0,
                    y: 0,
                    z: 0,
                    w: 64,
                    h: 64,
                    d: 1,
                },
                &readback,
                &TextureTransferInfo::default(),
            );
        }
        let fence = cmd_buffer.commit_and_acquire_fence().unwrap();
        device.wait_for_fences(&[&fence], true);

        println!("- Checking the texels");
        let texels = utils::read_transfer(&readback, 64 * 64 * 4);
        for texel in texels.chunks_exact(4) {
            // B8G8R8A8: red lands in the third byte.
            assert_eq!(texel, [0, 0, 255, 255]);
        }
        utils::expect_no_validation_errors(device);
    });
}

pub fn render_triangle_uniforms<T: TestDriver>(driver: T) {
    utils::init_logger();
    driver.for_each_device(&mut |device| {
        println!("- Creating shaders and the pipeline");
        let vertex_shader = device
            .build_shader()
            .stage(ShaderStage::Vertex)
            .code(NULL_VERTEX)
            .resource_counts(ShaderResourceCounts {
                num_uniform_buffers: 1,
                ..Default::default()
            })
            .build()
            .unwrap();
        let fragment_shader = device
            .build_shader()
            .stage(ShaderStage::Fragment)
            .code(NULL_FRAGMENT)
            .build()
            .unwrap();
        let pipeline = device
            .build_graphics_pipeline()
            .vertex_shader(&vertex_shader)
            .fragment_shader(&fragment_shader)
            .color_targets(&[ColorTargetState {
                format: TextureFormat::B8G8R8A8Unorm,
                blend: ColorTargetBlendState::default(),
            }])
            .build()
            .unwrap();

        let target = device
            .build_texture()
            .extents(&[640, 480])
            .format(TextureFormat::B8G8R8A8Unorm)
            .usage(TextureUsageFlags::COLOR_TARGET | TextureUsageFlags::SAMPLER)
            .build()
            .unwrap();

        println!("- Recording the frame");
        let mut cmd_buffer = device.acquire_cmd_buffer().unwrap();
        {
            let mut pass = cmd_buffer.encode_render(
                &[ColorAttachmentInfo {
                    texture: &target,
                    layer: 0,
                    level: 0,
                    load_op: LoadOp::Clear,
                    store_op: StoreOp::Store,
                    clear_color: [0.0, 0.0, 0.0, 1.0],
                    cycle: true,
                }],
                None,
            );
            pass.bind_pipeline(&pipeline);
            let matrix = [0u8; 64];
            pass.push_vertex_uniform_data(0, &matrix);
            pass.draw(3, 1, 0, 0);
        }

        println!("- Submitting and waiting on the fence");
        let fence = cmd_buffer.commit_and_acquire_fence().unwrap();
        device.wait_for_fences(&[&fence], true);
        assert!(fence.is_signaled());
        utils::expect_no_validation_errors(device);
    });
}

pub fn render_depth_stencil_roundtrip<T: TestDriver>(driver: T) {
    utils::init_logger();
    driver.for_each_device(&mut |device| {
        let vertex_shader = device
            .build_shader()
            .stage(ShaderStage::Vertex)
            .code(NULL_VERTEX)
            .build()
            .unwrap();
        let fragment_shader = device
            .build_shader()
            .stage(ShaderStage::Fragment)
            .code(NULL_FRAGMENT)
            .build()
            .unwrap();
        let pipeline = device
            .build_graphics_pipeline()
            .vertex_shader(&vertex_shader)
            .fragment_shader(&fragment_shader)
            .color_targets(&[ColorTargetState {
                format: TextureFormat::B8G8R8A8Unorm,
                blend: ColorTargetBlendState::default(),
            }])
            .depth_stencil_format(TextureFormat::D32Float)
            .depth_stencil(DepthStencilState {
                depth_test_enable: true,
                depth_write_enable: true,
                compare: CmpFn::LessEqual,
                ..Default::default()
            })
            .build()
            .unwrap();

        let color = device
            .build_texture()
            .extents(&[128, 128])
            .format(TextureFormat::B8G8R8A8Unorm)
            .usage(TextureUsageFlags::COLOR_TARGET)
            .build()
            .unwrap();
        let depth = device
            .build_texture()
            .extents(&[128, 128])
            .format(TextureFormat::D32Float)
            .usage(TextureUsageFlags::DEPTH_STENCIL_TARGET)
            .build()
            .unwrap();

        let mut cmd_buffer = device.acquire_cmd_buffer().unwrap();
        {
            let mut pass = cmd_buffer.encode_render(
                &[ColorAttachmentInfo {
                    texture: &color,
                    layer: 0,
                    level: 0,
                    load_op: LoadOp::Clear,
                    store_op: StoreOp::Store,
                    clear_color: [0.0; 4],
                    cycle: true,
                }],
                Some(&DepthStencilAttachmentInfo {
                    texture: &depth,
                    layer: 0,
                    level: 0,
                    load_op: LoadOp::Clear,
                    store_op: StoreOp::Store,
                    stencil_load_op: LoadOp::DontCare,
                    stencil_store_op: StoreOp::DontCare,
                    clear_value: DepthStencilValue {
                        depth: 1.0,
                        stencil: 0,
                    },
                    cycle: true,
                }),
            );
            pass.bind_pipeline(&pipeline);
            pass.draw(3, 1, 0, 0);
        }
        cmd_buffer.commit().unwrap();
        device.wait_idle();
        utils::expect_no_validation_errors(device);
    });
}

pub fn render_blit_and_mipmaps<T: TestDriver>(driver: T) {
    utils::init_logger();
    driver.for_each_device(&mut |device| {
        let source = device
            .build_texture()
            .extents(&[64, 64])
            .level_count(3)
            .format(TextureFormat::B8G8R8A8Unorm)
            .usage(TextureUsageFlags::SAMPLER | TextureUsageFlags::COLOR_TARGET)
            .build()
            .unwrap();
        let destination = device
            .build_texture()
            .extents(&[32, 32])
            .format(TextureFormat::B8G8R8A8Unorm)
            .usage(TextureUsageFlags::SAMPLER | TextureUsageFlags::COLOR_TARGET)
            .build()
            .unwrap();

        let mut cmd_buffer = device.acquire_cmd_buffer().unwrap();
        {
            let mut copy = cmd_buffer.encode_copy();
            copy.generate_mipmaps(&source);
        }
        cmd_buffer.blit(
            &BlitRegion {
                texture: &source,
                layer_or_depth_plane: 0,
                level: 0,
                x: 16,
                y: 16,
                w: 32,
                h: 32,
            },
            &BlitRegion {
                texture: &destination,
                layer_or_depth_plane: 0,
                level: 0,
                x: 0,
                y: 0,
                w: 32,
                h: 32,
            },
            Filter::Linear,
            false,
        );
        cmd_buffer.commit().unwrap();
        device.wait_idle();
        utils::expect_no_validation_errors(device);
    });
}
