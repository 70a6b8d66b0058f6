//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! # RinGFX Common: Utilities
pub extern crate cgmath;

mod align;
mod geom;
pub use self::align::*;
pub use self::geom::*;
