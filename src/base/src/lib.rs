//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! This crate is a part of RinGFX and provides the backend-independent
//! vocabulary shared by all backend implementations: usage-flag sets, texture
//! and vertex formats, pipeline state descriptors, swapchain parameters, the
//! generic error type, and device limits.
//!
//! Resource handle types are intentionally *not* defined here. Handles are
//! cheap cloneable objects defined by each backend; the structures defined in
//! this crate are plain data and carry no references to device objects.
extern crate ringfx_common as common;

pub mod command;
pub mod error;
mod flags;
pub use self::flags::*;
pub mod formats;
pub mod limits;
pub mod pass;
pub mod pipeline;
pub mod sampler;
pub mod swapchain;

/// Represents a device memory size and offset value.
pub type DeviceSize = u64;

/// Identifies a backend implementation.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Backend {
    /// The reference desktop backend, built on an explicit-state
    /// tiled-resource runtime.
    Tiled,
}

#[doc(no_inline)]
pub use crate::{
    command::*, error::*, formats::*, limits::*, pass::*, pipeline::*, sampler::*, swapchain::*,
};

#[doc(no_inline)]
pub use crate::common::{Extent3D, Offset3D, Rect2D};
