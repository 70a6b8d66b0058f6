//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
use super::TestDriver;
use crate::utils;
use ringfx_base::{LoadOp, PresentMode, StoreOp, SwapchainComposition, TextureFormat};
use ringfx_tiled::{ColorAttachmentInfo, Device, Surface, Texture};

fn clear_and_present(device: &Device, surface: &Surface) -> Option<(u32, u32)> {
    let mut cmd_buffer = device.acquire_cmd_buffer().unwrap();
    let acquired = cmd_buffer.acquire_swapchain_texture(surface).unwrap();
    let Some((texture, width, height)) = acquired else {
        return None;
    };
    record_clear(&mut cmd_buffer, &texture);
    cmd_buffer.commit().unwrap();
    Some((width, height))
}

fn record_clear(cmd_buffer: &mut ringfx_tiled::CmdBuffer, texture: &Texture) {
    let _pass = cmd_buffer.encode_render(
        &[ColorAttachmentInfo {
            texture,
            layer: 0,
            level: 0,
            load_op: LoadOp::Clear,
            store_op: StoreOp::Store,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            cycle: false,
        }],
        None,
    );
}

pub fn swapchain_present_loop<T: TestDriver>(driver: T) {
    utils::init_logger();
    driver.for_each_device(&mut |device| {
        let surface = Surface::new(640, 480);
        device
            .claim_surface(&surface, SwapchainComposition::SdrSrgb, PresentMode::Vsync)
            .unwrap();
        assert_eq!(
            device.swapchain_format(&surface).unwrap(),
            TextureFormat::B8G8R8A8UnormSrgb
        );

        println!("- Presenting five frames");
        for frame in 0..5 {
            let (width, height) =
                clear_and_present(device, &surface).expect("vsync acquisition never skips");
            assert_eq!((width, height), (640, 480), "frame {}", frame);
        }
        device.wait_idle();
        device.unclaim_surface(&surface);
        utils::expect_no_validation_errors(device);
    });
}

pub fn swapchain_resize<T: TestDriver>(driver: T) {
    utils::init_logger();
    driver.for_each_device(&mut |device| {
        let surface = Surface::new(800, 600);
        device
            .claim_surface(&surface, SwapchainComposition::Sdr, PresentMode::Vsync)
            .unwrap();

        println!("- Presenting three frames at 800x600");
        for _ in 0..3 {
            let (width, height) = clear_and_present(device, &surface).unwrap();
            assert_eq!((width, height), (800, 600));
        }

        println!("- Resizing the window to 1024x768");
        surface.set_extent(1024, 768);
        let (width, height) = clear_and_present(device, &surface).unwrap();
        assert_eq!((width, height), (1024, 768));

        device.wait_idle();
        device.unclaim_surface(&surface);
        utils::expect_no_validation_errors(device);
    });
}

pub fn swapchain_mailbox_out_of_slots<T: TestDriver>(driver: T) {
    utils::init_logger();
    driver.for_each_device(&mut |device| {
        let surface = Surface::new(320, 240);
        device
            .claim_surface(&surface, SwapchainComposition::Sdr, PresentMode::Mailbox)
            .unwrap();

        println!("- Acquiring a back buffer without submitting");
        let mut first = device.acquire_cmd_buffer().unwrap();
        let (first_texture, _, _) = first
            .acquire_swapchain_texture(&surface)
            .unwrap()
            .expect("the first acquisition succeeds");

        println!("- A second acquisition must skip the frame, not block");
        let mut second = device.acquire_cmd_buffer().unwrap();
        assert!(
            second.acquire_swapchain_texture(&surface).unwrap().is_none(),
            "the frame slot is pending and unfenced"
        );

        println!("- Submitting the first frame frees the pipeline");
        record_clear(&mut first, &first_texture);
        first.commit().unwrap();

        let mut acquired = None;
        for _ in 0..1000 {
            acquired = second.acquire_swapchain_texture(&surface).unwrap();
            if acquired.is_some() {
                break;
            }
            std::thread::yield_now();
        }
        let (second_texture, _, _) = acquired.expect("acquisition succeeds after the submit");
        record_clear(&mut second, &second_texture);
        second.commit().unwrap();

        device.wait_idle();
        device.unclaim_surface(&surface);
        utils::expect_no_validation_errors(device);
    });
}

pub fn swapchain_unclaim_releases_views<T: TestDriver>(driver: T) {
    utils::init_logger();
    driver.for_each_device(&mut |device| {
        let before = device.diagnostics();

        let surface = Surface::new(256, 256);
        device
            .claim_surface(&surface, SwapchainComposition::Sdr, PresentMode::Immediate)
            .unwrap();
        clear_and_present(device, &surface).unwrap();
        device.wait_idle();
        device.unclaim_surface(&surface);

        // Every back buffer owned one whole-texture SRV and one RTV; their
        // slots are back on the free lists now.
        let after = device.diagnostics();
        assert!(
            after.rtv_staging_inactive >= before.rtv_staging_inactive + 2,
            "render-target views were not released: {:?} -> {:?}",
            before,
            after
        );
        assert!(
            after.view_staging_inactive >= before.view_staging_inactive + 2,
            "shader-resource views were not released: {:?} -> {:?}",
            before,
            after
        );
        utils::expect_no_validation_errors(device);
    });
}
