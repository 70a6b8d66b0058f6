//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
use super::TestDriver;
use crate::utils;
use ringfx_base::{BufferUsageFlags, TextureFormat, TextureUsageFlags, TransferUsage};
use ringfx_tiled::{TextureRegion, TextureTransferInfo};

pub fn copy_buffer_roundtrip<T: TestDriver>(driver: T) {
    utils::init_logger();
    driver.for_each_device(&mut |device| {
        println!("- Creating buffers");
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
        let buffer = device
            .build_buffer()
            .size(4096)
            .usage(BufferUsageFlags::GRAPHICS_STORAGE_READ)
            .label("roundtrip buffer")
            .build()
            .unwrap();

        println!("- Storing the input");
        let data: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        utils::write_transfer(&upload, false, &data);

        println!("- Encoding the copy pass");
        let mut cmd_buffer = device.acquire_cmd_buffer().unwrap();
        {
            let mut copy = cmd_buffer.encode_copy();
            copy.upload_to_buffer(&upload, 0, &buffer, 0, 4096, false);
            copy.download_from_buffer(&buffer, 0, &readback, 0, 4096);
        }

        println!("- Committing and waiting");
        let fence = cmd_buffer.commit_and_acquire_fence().unwrap();
        device.wait_for_fences(&[&fence], true);
        assert!(fence.is_signaled());

        println!("- Comparing the result");
        assert_eq!(utils::read_transfer(&readback, 4096), data);
        utils::expect_no_validation_errors(device);
    });
}

pub fn copy_buffer_to_buffer<T: TestDriver>(driver: T) {
    utils::init_logger();
    driver.for_each_device(&mut |device| {
        let upload = device
            .build_transfer_buffer()
            .size(1024)
            .usage(TransferUsage::Upload)
            .build()
            .unwrap();
        let readback = device
            .build_transfer_buffer()
            .size(1024)
            .usage(TransferUsage::Download)
            .build()
            .unwrap();
        let buffer_a = device
            .build_buffer()
            .size(1024)
            .usage(BufferUsageFlags::GRAPHICS_STORAGE_READ)
            .build()
            .unwrap();
        let buffer_b = device
            .build_buffer()
            .size(1024)
            .usage(BufferUsageFlags::VERTEX)
            .build()
            .unwrap();

        let data: Vec<u8> = (0..1024u32).map(|i| (i * 7 % 256) as u8).collect();
        utils::write_transfer(&upload, false, &data);

        let mut cmd_buffer = device.acquire_cmd_buffer().unwrap();
        {
            let mut copy = cmd_buffer.encode_copy();
            copy.upload_to_buffer(&upload, 0, &buffer_a, 0, 1024, false);
            copy.copy_buffer_to_buffer(&buffer_a, 0, &buffer_b, 0, 1024, false);
            copy.download_from_buffer(&buffer_b, 0, &readback, 0, 1024);
        }
        let fence = cmd_buffer.commit_and_acquire_fence().unwrap();
        device.wait_for_fences(&[&fence], true);

        assert_eq!(utils::read_transfer(&readback, 1024), data);
        utils::expect_no_validation_errors(device);
    });
}

pub fn copy_texture_roundtrip<T: TestDriver>(driver: T) {
    utils::init_logger();
    driver.for_each_device(&mut |device| {
        // 64 texels * 4 bytes = 256-byte rows: no realignment needed.
        let texture = device
            .build_texture()
            .extents(&[64, 64])
            .format(TextureFormat::R8G8B8A8Unorm)
            .usage(TextureUsageFlags::SAMPLER)
            .build()
            .unwrap();
        let upload = device
            .build_transfer_buffer()
            .size(64 * 64 * 4)
            .usage(TransferUsage::Upload)
            .build()
            .unwrap();
        let readback = device
            .build_transfer_buffer()
            .size(64 * 64 * 4)
            .usage(TransferUsage::Download)
            .build()
            .unwrap();

        let data: Vec<u8> = (0..64 * 64 * 4u32).map(|i| (i % 253) as u8).collect();
        utils::write_transfer(&upload, false, &data);

        let region = TextureRegion {
            texture: &texture,
            layer: 0,
            level: 0,
            x: 0,
            y: 0,
            z: 0,
            w: 64,
            h: 64,
            d: 1,
        };
        let mut cmd_buffer = device.acquire_cmd_buffer().unwrap();
        {
            let mut copy = cmd_buffer.encode_copy();
            copy.upload_to_texture(&upload, &TextureTransferInfo::default(), &region, false);
            copy.download_from_texture(&region, &readback, &TextureTransferInfo::default());
        }
        let fence = cmd_buffer.commit_and_acquire_fence().unwrap();
        device.wait_for_fences(&[&fence], true);

        assert_eq!(utils::read_transfer(&readback, 64 * 64 * 4), data);
        utils::expect_no_validation_errors(device);
    });
}

pub fn copy_texture_roundtrip_misaligned<T: TestDriver>(driver: T) {
    utils::init_logger();
    driver.for_each_device(&mut |device| {
        // 10 texels * 4 bytes = 40-byte rows: forces the temporary-buffer
        // re-layout on both the upload and the download.
        let texture = device
            .build_texture()
            .extents(&[10, 7])
            .format(TextureFormat::R8G8B8A8Unorm)
            .usage(TextureUsageFlags::SAMPLER)
            .build()
            .unwrap();
        let size = 10 * 7 * 4usize;
        let upload = device
            .build_transfer_buffer()
            .size(size as u64)
            .usage(TransferUsage::Upload)
            .build()
            .unwrap();
        let readback = device
            .build_transfer_buffer()
            .size(size as u64)
            .usage(TransferUsage::Download)
            .build()
            .unwrap();

        let data: Vec<u8> = (0..size as u32).map(|i| (i * 3 % 256) as u8).collect();
        utils::write_transfer(&upload, false, &data);

        let region = TextureRegion {
            texture: &texture,
            layer: 0,
            level: 0,
            x: 0,
            y: 0,
            z: 0,
            w: 10,
            h: 7,
            d: 1,
        };
        let mut cmd_buffer = device.acquire_cmd_buffer().unwrap();
        {
            let mut copy = cmd_buffer.encode_copy();
            copy.upload_to_texture(&upload, &TextureTransferInfo::default(), &region, false);
            copy.download_from_texture(&region, &readback, &TextureTransferInfo::default());
        }
        let fence = cmd_buffer.commit_and_acquire_fence().unwrap();
        device.wait_for_fences(&[&fence], true);

        assert_eq!(utils::read_transfer(&readback, size), data);
        utils::expect_no_validation_errors(device);
    });
}

pub fn copy_texture_to_texture<T: TestDriver>(driver: T) {
    utils::init_logger();
    driver.for_each_device(&mut |device| {
        let make_texture = || {
            device
                .build_texture()
                .extents(&[32, 32])
                .format(TextureFormat::R8G8B8A8Unorm)
                .usage(TextureUsageFlags::SAMPLER)
                .build()
                .unwrap()
        };
        let texture_a = make_texture();
        let texture_b = make_texture();
        let size = 32 * 32 * 4usize;
        let upload = device
            .build_transfer_buffer()
            .size(size as u64)
            .usage(TransferUsage::Upload)
            .build()
            .unwrap();
        let readback = device
            .build_transfer_buffer()
            .size(size as u64)
            .usage(TransferUsage::Download)
            .build()
            .unwrap();

        let data: Vec<u8> = (0..size as u32).map(|i| (i % 250) as u8).collect();
        utils::write_transfer(&upload, false, &data);

        let region_a = TextureRegion {
            texture: &texture_a,
            layer: 0,
            level: 0,
            x: 0,
            y: 0,
            z: 0,
            w: 32,
            h: 32,
            d: 1,
        };
        let region_b = TextureRegion {
            texture: &texture_b,
            ..region_a
        };
        let mut cmd_buffer = device.acquire_cmd_buffer().unwrap();
        {
            let mut copy = cmd_buffer.encode_copy();
            copy.upload_to_texture(&upload, &TextureTransferInfo::default(), &region_a, false);
            copy.copy_texture_to_texture(&region_a, &region_b, false);
            copy.download_from_texture(&region_b, &readback, &TextureTransferInfo::default());
        }
        let fence = cmd_buffer.commit_and_acquire_fence().unwrap();
        device.wait_for_fences(&[&fence], true);

        assert_eq!(utils::read_transfer(&readback, size), data);
        utils::expect_no_validation_errors(device);
    });
}
