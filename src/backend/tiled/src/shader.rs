//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Shader objects.
//!
//! Bytecode is accepted in the backend's native binary format and passed
//! through opaquely. The resource counts declared here drive root-signature
//! layout; they must match what the shader was compiled against.
use std::sync::Arc;

use ringfx_base::error::Result;
use ringfx_base::ShaderStage;

/// The number of resource slots a shader consumes, per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShaderResourceCounts {
    pub num_samplers: u32,
    pub num_storage_textures: u32,
    pub num_storage_buffers: u32,
    pub num_uniform_buffers: u32,
}

/// A compiled shader handle.
#[derive(Debug, Clone)]
pub struct Shader {
    pub(crate) inner: Arc<ShaderInner>,
}

#[derive(Debug)]
pub(crate) struct ShaderInner {
    pub(crate) stage: ShaderStage,
    pub(crate) bytecode: Vec<u8>,
    pub(crate) entry_point: String,
    pub(crate) counts: ShaderResourceCounts,
}

impl Shader {
    pub fn stage(&self) -> ShaderStage {
        self.inner.stage
    }

    pub fn entry_point(&self) -> &str {
        &self.inner.entry_point
    }

    pub fn resource_counts(&self) -> ShaderResourceCounts {
        self.inner.counts
    }
}

/// Builder for shaders.
///
/// Shaders are plain bytecode containers; they are not device objects, so
/// the builder is free standing.
#[derive(Debug)]
pub struct ShaderBuilder {
    stage: Option<ShaderStage>,
    bytecode: Vec<u8>,
    entry_point: String,
    counts: ShaderResourceCounts,
}

impl ShaderBuilder {
    pub(crate) fn new() -> Self {
        Self {
            stage: None,
            bytecode: Vec::new(),
            entry_point: "main".to_owned(),
            counts: Default::default(),
        }
    }

    /// Set the pipeline stage. Mandatory.
    pub fn stage(&mut self, v: ShaderStage) -> &mut Self {
        self.stage = Some(v);
        self
    }

    /// Set the shader bytecode. Mandatory; must be non-empty.
    pub fn code(&mut self, v: &[u8]) -> &mut Self {
        self.bytecode = v.to_owned();
        self
    }

    /// Set the entry point name. Defaults to `"main"`.
    pub fn entry_point(&mut self, v: &str) -> &mut Self {
        self.entry_point = v.to_owned();
        self
    }

    /// Declare the shader's resource slot counts. Defaults to all zero.
    pub fn resource_counts(&mut self, v: ShaderResourceCounts) -> &mut Self {
        self.counts = v;
        self
    }

    pub fn build(&mut self) -> Result<Shader> {
        let stage = self.stage.expect("stage");
        assert!(!self.bytecode.is_empty(), "code");
        Ok(Shader {
            inner: Arc::new(ShaderInner {
                stage,
                bytecode: std::mem::take(&mut self.bytecode),
                entry_point: std::mem::take(&mut self.entry_point),
                counts: self.counts,
            }),
        })
    }
}
