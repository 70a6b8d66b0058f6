//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Test framework for RinGFX backend implementations.
//!
//! A backend crate implements [`backend_tests::TestDriver`] in its
//! integration tests and instantiates the whole suite with
//! [`ringfx_generate_backend_tests!`].
pub mod backend_tests;
pub mod utils;
