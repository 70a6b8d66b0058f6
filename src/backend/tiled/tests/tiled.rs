//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Runs the backend test suite against the software device.
use ringfx_test::backend_tests::TestDriver;
use ringfx_tiled::{Device, DeviceOptions};

struct SoftwareDriver;

impl TestDriver for SoftwareDriver {
    fn for_each_device(&self, runner: &mut dyn FnMut(&Device)) {
        let options = DeviceOptions {
            debug: true,
            ..Default::default()
        };
        let device = Device::new(&options).expect("failed to create the software device");
        runner(&device);
    }
}

ringfx_test::ringfx_generate_backend_tests! { SoftwareDriver }
