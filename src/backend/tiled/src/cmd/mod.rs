//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Command buffers, pass encoders, and fences.
pub mod buffer;
pub mod enc_compute;
pub mod enc_copy;
pub mod enc_render;
pub mod fence;
