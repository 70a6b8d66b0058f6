//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Tests for RinGFX backend implementations.
use ringfx_tiled::Device;

pub trait TestDriver {
    fn for_each_device(&self, runner: &mut dyn FnMut(&Device));
}

/// Generates test cases given a test driver.
#[macro_export]
macro_rules! ringfx_generate_backend_tests {
    ($driver:expr) => {
        $crate::ringfx_test_single! { create_device, $driver }

        $crate::ringfx_test_single! { copy_buffer_roundtrip, $driver }
        $crate::ringfx_test_single! { copy_buffer_to_buffer, $driver }
        $crate::ringfx_test_single! { copy_texture_roundtrip, $driver }
        $crate::ringfx_test_single! { copy_texture_roundtrip_misaligned, $driver }
        $crate::ringfx_test_single! { copy_texture_to_texture, $driver }

        $crate::ringfx_test_single! { cycle_upload_without_hazard, $driver }
        $crate::ringfx_test_single! { cycle_leaves_in_flight_data_alone, $driver }

        $crate::ringfx_test_single! { compute_dispatch_storage_buffer, $driver }
        $crate::ringfx_test_single! { compute_dispatch_indirect, $driver }
        $crate::ringfx_test_single! { compute_readonly_storage_bindings, $driver }

        $crate::ringfx_test_single! { render_clear_offscreen, $driver }
        $crate::ringfx_test_single! { render_triangle_uniforms, $driver }
        $crate::ringfx_test_single! { render_depth_stencil_roundtrip, $driver }
        $crate::ringfx_test_single! { render_blit_and_mipmaps, $driver }

        $crate::ringfx_test_single! { fence_lifecycle, $driver }
        $crate::ringfx_test_single! { fence_multi_wait, $driver }

        $crate::ringfx_test_single! { swapchain_present_loop, $driver }
        $crate::ringfx_test_single! { swapchain_resize, $driver }
        $crate::ringfx_test_single! { swapchain_mailbox_out_of_slots, $driver }
        $crate::ringfx_test_single! { swapchain_unclaim_releases_views, $driver }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! ringfx_test_single {
    ($(#[$m:meta])* $name:ident, $driver:expr) => {
        $(#[$m])*
        #[test]
        fn $name() {
            $crate::backend_tests::$name($driver);
        }
    };
}

pub fn create_device<T: TestDriver>(driver: T) {
    crate::utils::init_logger();
    driver.for_each_device(&mut |device| {
        assert_eq!(device.backend(), ringfx_base::Backend::Tiled);
        crate::utils::expect_no_validation_errors(device);
    });
}

mod compute;
pub use self::compute::*;

mod copy;
pub use self::copy::*;

mod cycle;
pub use self::cycle::*;

mod fence;
pub use self::fence::*;

mod render;
pub use self::render::*;

mod swapchain;
pub use self::swapchain::*;
