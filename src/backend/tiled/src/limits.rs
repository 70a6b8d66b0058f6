//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Capabilities of the software device.
use ringfx_base::{PresentMode, SwapchainComposition, TextureFormat};

/// Device-wide feature flags. The software runtime shares memory with the
/// host, so it reports itself as a cache-coherent UMA device.
#[derive(Debug, Clone, Copy)]
pub struct DeviceCaps {
    /// Unified memory architecture.
    pub uma: bool,
    /// UMA with CPU-coherent caches.
    pub uma_cache_coherent: bool,
    /// Whether immediate-mode presents may tear.
    pub supports_tearing: bool,
    /// Whether the fast uniform-upload heap path is available.
    pub fast_uniform_upload: bool,
}

impl DeviceCaps {
    pub(crate) fn new() -> Self {
        Self {
            uma: true,
            uma_cache_coherent: true,
            supports_tearing: true,
            fast_uniform_upload: true,
        }
    }

    /// Whether `format` can be created on this device.
    pub fn supports_texture_format(&self, _format: TextureFormat) -> bool {
        // The software runtime stores every format declared in the API.
        true
    }

    pub fn supports_present_mode(&self, mode: PresentMode) -> bool {
        matches!(
            mode,
            PresentMode::Immediate | PresentMode::Vsync | PresentMode::Mailbox
        )
    }

    pub fn supports_swapchain_composition(&self, composition: SwapchainComposition) -> bool {
        matches!(
            composition,
            SwapchainComposition::Sdr
                | SwapchainComposition::SdrSrgb
                | SwapchainComposition::HdrLinear
                | SwapchainComposition::Hdr10
        )
    }

    /// The highest supported sample count for a render target of `format`,
    /// starting the search at `desired`.
    pub fn best_sample_count(&self, _format: TextureFormat, desired: u32) -> u32 {
        // The software runtime stores multisampled targets for every format;
        // only the API ceiling applies.
        desired.max(1).next_power_of_two().min(8)
    }
}
