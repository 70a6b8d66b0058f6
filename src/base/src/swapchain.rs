//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Swapchain parameters.

/// Controls when a presented frame becomes visible and how back-buffer
/// acquisition behaves under load.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum PresentMode {
    /// Present with a sync interval of zero. Tearing is allowed when the
    /// device supports it. Acquisition never blocks; it fails when the
    /// frame pipeline is full.
    Immediate,
    /// Present with a sync interval of one. Acquisition blocks until the
    /// least recently presented frame for the slot retires.
    Vsync,
    /// Present with a sync interval of zero without tearing. Acquisition
    /// never blocks; it fails when the frame pipeline is full, allowing the
    /// caller to skip the frame.
    Mailbox,
}

/// The pixel encoding of the back buffers.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum SwapchainComposition {
    /// 8-bit non-linear.
    Sdr,
    /// 8-bit non-linear storage read through a linear render-target view.
    SdrSrgb,
    /// 16-bit float scRGB, linear.
    HdrLinear,
    /// 10-bit non-linear (PQ).
    Hdr10,
}
