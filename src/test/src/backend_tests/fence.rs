//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
use super::TestDriver;
use crate::utils;
use ringfx_base::{BufferUsageFlags, TransferUsage};

pub fn fence_lifecycle<T: TestDriver>(driver: T) {
    utils::init_logger();
    driver.for_each_device(&mut |device| {
        let upload = device
            .build_transfer_buffer()
            .size(64)
            .usage(TransferUsage::Upload)
            .build()
            .unwrap();
        let buffer = device
            .build_buffer()
            .size(64)
            .usage(BufferUsageFlags::VERTEX)
            .build()
            .unwrap();
        utils::write_transfer(&upload, false, &[7u8; 64]);

        println!("- Submitting with an acquired fence");
        let mut cmd_buffer = device.acquire_cmd_buffer().unwrap();
        {
            let mut copy = cmd_buffer.encode_copy();
            copy.upload_to_buffer(&upload, 0, &buffer, 0, 64, false);
        }
        let fence = cmd_buffer.commit_and_acquire_fence().unwrap();
        device.wait_for_fences(&[&fence], true);
        assert!(fence.is_signaled());

        println!("- Releasing the fence returns it to the pool");
        let pool_before_release = device.diagnostics().fence_pool_size;
        fence.release();
        assert_eq!(
            device.diagnostics().fence_pool_size,
            pool_before_release + 1,
            "the released fence did not come back to the pool"
        );

        println!("- A dropped handle releases the fence too");
        let mut cmd_buffer = device.acquire_cmd_buffer().unwrap();
        {
            let mut copy = cmd_buffer.encode_copy();
            copy.upload_to_buffer(&upload, 0, &buffer, 0, 64, true);
        }
        let fence = cmd_buffer.commit_and_acquire_fence().unwrap();
        device.wait_for_fences(&[&fence], true);
        let pool_before_drop = device.diagnostics().fence_pool_size;
        drop(fence);
        assert_eq!(
            device.diagnostics().fence_pool_size,
            pool_before_drop + 1,
            "the dropped fence did not come back to the pool"
        );

        println!("- Submitting with an auto-released fence");
        let mut cmd_buffer = device.acquire_cmd_buffer().unwrap();
        {
            let mut copy = cmd_buffer.encode_copy();
            copy.upload_to_buffer(&upload, 0, &buffer, 0, 64, true);
        }
        cmd_buffer.commit().unwrap();
        device.wait_idle();
        assert!(
            device.diagnostics().fence_pool_size >= 1,
            "retirement did not recycle the auto-released fence"
        );
        utils::expect_no_validation_errors(device);
    });
}

pub fn fence_multi_wait<T: TestDriver>(driver: T) {
    utils::init_logger();
    driver.for_each_device(&mut |device| {
        let upload = device
            .build_transfer_buffer()
            .size(64)
            .usage(TransferUsage::Upload)
            .build()
            .unwrap();
        let buffer = device
            .build_buffer()
            .size(64)
            .usage(BufferUsageFlags::VERTEX)
            .build()
            .unwrap();
        utils::write_transfer(&upload, false, &[42u8; 64]);

        println!("- Submitting four command buffers");
        let fences: Vec<_> = (0..4)
            .map(|_| {
                let mut cmd_buffer = device.acquire_cmd_buffer().unwrap();
                {
                    let mut copy = cmd_buffer.encode_copy();
                    copy.upload_to_buffer(&upload, 0, &buffer, 0, 64, true);
                }
                cmd_buffer.commit_and_acquire_fence().unwrap()
            })
            .collect();
        let fence_refs: Vec<_> = fences.iter().collect();

        println!("- Waiting for any");
        device.wait_for_fences(&fence_refs, false);
        assert!(fences.iter().any(|f| f.is_signaled()));

        println!("- Waiting for all");
        device.wait_for_fences(&fence_refs, true);
        for fence in &fences {
            assert!(fence.is_signaled());
        }

        println!("- Releasing every fence");
        let pool_before = device.diagnostics().fence_pool_size;
        for fence in fences {
            device.release_fence(fence);
        }
        assert_eq!(
            device.diagnostics().fence_pool_size,
            pool_before + 4,
            "released fences did not come back to the pool"
        );
        utils::expect_no_validation_errors(device);
    });
}
