//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
use super::TestDriver;
use crate::utils;
use ringfx_base::{BufferUsageFlags, TransferUsage};

/// Submit a stream of cycled uploads without ever waiting, then check that
/// every iteration's data survived in its own concrete buffer.
pub fn cycle_upload_without_hazard<T: TestDriver>(driver: T) {
    utils::init_logger();
    driver.for_each_device(&mut |device| {
        let upload = device
            .build_transfer_buffer()
            .size(1024)
            .usage(TransferUsage::Upload)
            .build()
            .unwrap();
        let buffer = device
            .build_buffer()
            .size(1024)
            .usage(BufferUsageFlags::VERTEX)
            .build()
            .unwrap();

        let iterations = 64u32;
        let readbacks: Vec<_> = (0..iterations)
            .map(|_| {
                device
                    .build_transfer_buffer()
                    .size(1024)
                    .usage(TransferUsage::Download)
                    .build()
                    .unwrap()
            })
            .collect();

        println!("- Submitting {} cycled uploads without waiting", iterations);
        for iteration in 0..iterations {
            let data: Vec<u8> = (0..1024u32)
                .map(|i| (iteration + i) as u8)
                .collect();
            utils::write_transfer(&upload, true, &data);

            let mut cmd_buffer = device.acquire_cmd_buffer().unwrap();
            {
                let mut copy = cmd_buffer.encode_copy();
                copy.upload_to_buffer(&upload, 0, &buffer, 0, 1024, true);
                copy.download_from_buffer(
                    &buffer,
                    0,
                    &readbacks[iteration as usize],
                    0,
                    1024,
                );
            }
            cmd_buffer.commit().unwrap();
        }

        println!("- Waiting for the device to go idle");
        device.wait_idle();

        println!("- Comparing every iteration's data");
        for iteration in 0..iterations {
            let expected: Vec<u8> = (0..1024u32)
                .map(|i| (iteration + i) as u8)
                .collect();
            assert_eq!(
                utils::read_transfer(&readbacks[iteration as usize], 1024),
                expected,
                "iteration {} was clobbered",
                iteration
            );
        }
        utils::expect_no_validation_errors(device);
    });
}

/// Cycling must select a different concrete buffer while the active one is
/// referenced by an unretired command buffer, and must not move otherwise.
pub fn cycle_leaves_in_flight_data_alone<T: TestDriver>(driver: T) {
    utils::init_logger();
    driver.for_each_device(&mut |device| {
        let upload = device
            .build_transfer_buffer()
            .size(256)
            .usage(TransferUsage::Upload)
            .build()
            .unwrap();
        let buffer = device
            .build_buffer()
            .size(256)
            .usage(BufferUsageFlags::VERTEX)
            .build()
            .unwrap();

        let idle_ptr = upload.map(false);
        upload.unmap();
        let still_idle_ptr = upload.map(true);
        upload.unmap();
        assert_eq!(
            idle_ptr, still_idle_ptr,
            "cycling moved an idle buffer for no reason"
        );

        // Recording alone puts the transfer buffer in flight.
        let mut cmd_buffer = device.acquire_cmd_buffer().unwrap();
        {
            let mut copy = cmd_buffer.encode_copy();
            copy.upload_to_buffer(&upload, 0, &buffer, 0, 256, false);
        }

        let cycled_ptr = upload.map(true);
        upload.unmap();
        assert_ne!(
            idle_ptr, cycled_ptr,
            "cycling reused a buffer that is still in flight"
        );

        // Dropping the recording releases the reference; the original buffer
        // becomes eligible again.
        drop(cmd_buffer);
        utils::expect_no_validation_errors(device);
    });
}
