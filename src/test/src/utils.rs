//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Helpers shared by the backend tests.
use ringfx_tiled::{Device, TransferBuffer};

/// Install the test logger. Safe to call from every test.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Assert that the runtime's debug layer stayed silent.
pub fn expect_no_validation_errors(device: &Device) {
    let messages = device.take_debug_messages();
    assert!(
        messages.is_empty(),
        "the runtime reported validation errors:\n{}",
        messages.join("\n")
    );
}

/// Write `data` into a mapped transfer buffer.
pub fn write_transfer(buffer: &TransferBuffer, cycle: bool, data: &[u8]) {
    assert!(data.len() as u64 <= buffer.size());
    let ptr = buffer.map(cycle);
    unsafe {
        std::ptr::copy_nonoverlapping(data.as_ptr(), ptr, data.len());
    }
    buffer.unmap();
}

/// Read `len` bytes out of a mapped transfer buffer.
pub fn read_transfer(buffer: &TransferBuffer, len: usize) -> Vec<u8> {
    assert!(len as u64 <= buffer.size());
    let ptr = buffer.map(false);
    let data = unsafe { std::slice::from_raw_parts(ptr, len) }.to_vec();
    buffer.unmap();
    data
}
