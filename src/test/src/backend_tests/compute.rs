//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
use super::TestDriver;
use crate::utils;
use ringfx_base::{BufferUsageFlags, DispatchIndirectArgs, TextureFormat, TextureUsageFlags, TransferUsage};
use ringfx_tiled::{
    ComputeResourceCounts, StorageBufferReadWriteBinding, TextureSlice,
};

static NULL_COMPUTE: &[u8] = b"RGFX\x01FillIndices";

pub fn compute_dispatch_storage_buffer<T: TestDriver>(driver: T) {
    utils::init_logger();
    driver.for_each_device(&mut |device| {
        println!("- Creating resources");
        let buffer = device
            .build_buffer()
            .size(4096)
            .usage(BufferUsageFlags::COMPUTE_STORAGE_WRITE)
            .build()
            .unwrap();
        let upload = device
            .build_transfer_buffer()
            .size(4096)
            .usage(TransferUsage::Upload)
            .build()
            .unwrap();
        let readback = device
            .build_transfer_buffer()
            .size(4096)
            .usage(TransferUsage::Download)
            .build()
            .unwrap();

        println!("- Creating a compute pipeline");
        let pipeline = device
            .build_compute_pipeline()
            .code(NULL_COMPUTE)
            .resource_counts(ComputeResourceCounts {
                num_readwrite_storage_buffers: 1,
                ..Default::default()
            })
            .workgroup_size(64, 1, 1)
            .build()
            .unwrap();

        println!("- Dispatching over the buffer");
        let mut cmd_buffer = device.acquire_cmd_buffer().unwrap();
        {
            let mut pass = cmd_buffer.encode_compute(
                &[],
                &[StorageBufferReadWriteBinding {
                    buffer: &buffer,
                    cycle: true,
                }],
            );
            pass.bind_pipeline(&pipeline);
            pass.dispatch(64, 1, 1);
        }
        let fence = cmd_buffer.commit_and_acquire_fence().unwrap();
        device.wait_for_fences(&[&fence], true);
        assert!(fence.is_signaled());
        utils::expect_no_validation_errors(device);

        println!("- Round-tripping data through the storage buffer");
        let data: Vec<u8> = (0..1024u32).flat_map(|i| i.to_le_bytes()).collect();
        utils::write_transfer(&upload, false, &data);
        let mut cmd_buffer = device.acquire_cmd_buffer().unwrap();
        {
            let mut copy = cmd_buffer.encode_copy();
            copy.upload_to_buffer(&upload, 0, &buffer, 0, 4096, true);
            copy.download_from_buffer(&buffer, 0, &readback, 0, 4096);
        }
        let fence = cmd_buffer.commit_and_acquire_fence().unwrap();
        device.wait_for_fences(&[&fence], true);

        let result = utils::read_transfer(&readback, 4096);
        for (i, word) in result.chunks_exact(4).enumerate() {
            assert_eq!(u32::from_le_bytes(word.try_into().unwrap()), i as u32);
        }
        utils::expect_no_validation_errors(device);
    });
}

pub fn compute_dispatch_indirect<T: TestDriver>(driver: T) {
    utils::init_logger();
    driver.for_each_device(&mut |device| {
        let args_buffer = device
            .build_buffer()
            .size(12)
            .usage(BufferUsageFlags::INDIRECT)
            .build()
            .unwrap();
        let storage = device
            .build_buffer()
            .size(256)
            .usage(BufferUsageFlags::COMPUTE_STORAGE_WRITE)
            .build()
            .unwrap();
        let upload = device
            .build_transfer_buffer()
            .size(12)
            .usage(TransferUsage::Upload)
            .build()
            .unwrap();

        let args = DispatchIndirectArgs {
            group_count_x: 4,
            group_count_y: 1,
            group_count_z: 1,
        };
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&args.group_count_x.to_le_bytes());
        bytes.extend_from_slice(&args.group_count_y.to_le_bytes());
        bytes.extend_from_slice(&args.group_count_z.to_le_bytes());
        utils::write_transfer(&upload, false, &bytes);

        let pipeline = device
            .build_compute_pipeline()
            .code(NULL_COMPUTE)
            .resource_counts(ComputeResourceCounts {
                num_readwrite_storage_buffers: 1,
                ..Default::default()
            })
            .workgroup_size(64, 1, 1)
            .build()
            .unwrap();

        let mut cmd_buffer = device.acquire_cmd_buffer().unwrap();
        {
            let mut copy = cmd_buffer.encode_copy();
            copy.upload_to_buffer(&upload, 0, &args_buffer, 0, 12, false);
        }
        {
            let mut pass = cmd_buffer.encode_compute(
                &[],
                &[StorageBufferReadWriteBinding {
                    buffer: &storage,
                    cycle: false,
                }],
            );
            pass.bind_pipeline(&pipeline);
            pass.dispatch_indirect(&args_buffer, 0);
        }
        cmd_buffer.commit().unwrap();
        device.wait_idle();
        utils::expect_no_validation_errors(device);
    });
}

pub fn compute_readonly_storage_bindings<T: TestDriver>(driver: T) {
    utils::init_logger();
    driver.for_each_device(&mut |device| {
        let input_buffer = device
            .build_buffer()
            .size(1024)
            .usage(BufferUsageFlags::COMPUTE_STORAGE_READ)
            .build()
            .unwrap();
        let input_texture = device
            .build_texture()
            .extents(&[16, 16])
            .format(TextureFormat::R32Float)
            .usage(TextureUsageFlags::COMPUTE_STORAGE_READ)
            .build()
            .unwrap();
        let output = device
            .build_buffer()
            .size(1024)
            .usage(BufferUsageFlags::COMPUTE_STORAGE_WRITE)
            .build()
            .unwrap();

        let pipeline = device
            .build_compute_pipeline()
            .code(NULL_COMPUTE)
            .resource_counts(ComputeResourceCounts {
                num_readonly_storage_textures: 1,
                num_readonly_storage_buffers: 1,
                num_readwrite_storage_buffers: 1,
                ..Default::default()
            })
            .workgroup_size(8, 8, 1)
            .build()
            .unwrap();

        let mut cmd_buffer = device.acquire_cmd_buffer().unwrap();
        {
            let mut pass = cmd_buffer.encode_compute(
                &[],
                &[StorageBufferReadWriteBinding {
                    buffer: &output,
                    cycle: false,
                }],
            );
            pass.bind_pipeline(&pipeline);
            pass.bind_storage_textures(
                0,
                &[TextureSlice {
                    texture: &input_texture,
                    layer: 0,
                    level: 0,
                }],
            );
            pass.bind_storage_buffers(0, &[&input_buffer]);
            pass.dispatch(2, 2, 1);
        }
        cmd_buffer.commit().unwrap();
        device.wait_idle();
        utils::expect_no_validation_errors(device);
    });
}
