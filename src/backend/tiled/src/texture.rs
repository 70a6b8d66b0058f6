//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Texture containers, concrete textures, and sub-resources.
//!
//! Sub-resource `i` of a concrete texture corresponds to
//! `(layer = i / level_count, level = i % level_count)`. Each sub-resource
//! owns up to four CPU descriptors — only the ones its usage flags call for —
//! and an in-flight reference count, which is the unit the cycling engine
//! inspects. Swapchain textures have `can_be_cycled = false` and carry only a
//! whole-texture SRV and a single RTV.
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ringfx_base::error::Result;
use ringfx_base::{TextureFormat, TextureUsageFlags};

use crate::descriptor::{CpuDescriptor, StagingHeaps, StagingKind};
use crate::device::DeviceRef;
use crate::native;
use crate::native::{DescriptorPayload, NativeTextureDesc, ResourceState};
use crate::resstate;

/// The complete shape of a texture, fixed at creation.
#[derive(Debug, Clone, Copy)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub layer_count: u32,
    pub level_count: u32,
    pub cube: bool,
    pub format: TextureFormat,
    pub usage: TextureUsageFlags,
    pub sample_count: u32,
}

impl TextureInfo {
    pub(crate) fn native_desc(&self) -> NativeTextureDesc {
        NativeTextureDesc {
            width: self.width,
            height: self.height,
            depth: self.depth,
            layer_count: self.layer_count,
            level_count: self.level_count,
            format: self.format,
            sample_count: self.sample_count,
        }
    }
}

/// A texture handle.
#[derive(Debug, Clone)]
pub struct Texture {
    pub(crate) container: Arc<TextureContainer>,
}

impl Texture {
    pub fn info(&self) -> &TextureInfo {
        &self.container.info
    }

    /// Set a debug name, propagated to every concrete texture of the
    /// container, present and future.
    pub fn set_name(&self, name: &str) {
        self.container.set_label(name);
    }
}

#[derive(Debug)]
pub(crate) struct TextureContainer {
    pub(crate) device: DeviceRef,
    pub(crate) info: TextureInfo,
    pub(crate) can_be_cycled: bool,
    state: Mutex<ContainerState>,
}

#[derive(Debug)]
struct ContainerState {
    concretes: Vec<Arc<ConcreteTexture>>,
    active: usize,
    label: Option<String>,
}

impl TextureContainer {
    pub(crate) fn new(device: DeviceRef, info: TextureInfo) -> Result<Arc<Self>> {
        let first = ConcreteTexture::new(&device, &info, None)?;
        Ok(Arc::new(Self {
            device,
            info,
            can_be_cycled: true,
            state: Mutex::new(ContainerState {
                concretes: vec![first],
                active: 0,
                label: None,
            }),
        }))
    }

    /// Wrap a swapchain back buffer. Never cycles.
    pub(crate) fn new_for_swapchain(
        device: DeviceRef,
        resource: native::ResourceRef,
        format: TextureFormat,
    ) -> Result<Arc<Self>> {
        let native_desc = *resource.texture_desc();
        let info = TextureInfo {
            width: native_desc.width,
            height: native_desc.height,
            depth: 1,
            layer_count: 1,
            level_count: 1,
            cube: false,
            format,
            usage: TextureUsageFlags::COLOR_TARGET | TextureUsageFlags::SAMPLER,
            sample_count: 1,
        };
        let concrete = ConcreteTexture::for_swapchain(&device, resource, &info)?;
        Ok(Arc::new(Self {
            device,
            info,
            can_be_cycled: false,
            state: Mutex::new(ContainerState {
                concretes: vec![concrete],
                active: 0,
                label: None,
            }),
        }))
    }

    pub(crate) fn active(&self) -> Arc<ConcreteTexture> {
        let state = self.state.lock();
        state.concretes[state.active].clone()
    }

    fn set_label(&self, label: &str) {
        let mut state = self.state.lock();
        state.label = Some(label.to_owned());
        for concrete in &state.concretes {
            concrete.resource.set_label(label);
        }
    }

    /// Rotate the active texture to one with no in-flight sub-resources,
    /// growing the list when all are referenced.
    fn cycle_active(&self, state: &mut ContainerState) {
        debug_assert!(self.can_be_cycled);
        for (i, concrete) in state.concretes.iter().enumerate() {
            if concrete.total_in_flight() == 0 {
                state.active = i;
                return;
            }
        }
        match ConcreteTexture::new(&self.device, &self.info, state.label.as_deref()) {
            Ok(concrete) => {
                state.concretes.push(concrete);
                state.active = state.concretes.len() - 1;
            }
            Err(error) => {
                log::error!("failed to cycle a texture: {}", error);
            }
        }
    }

    /// Fetch `(layer, level)` of the active texture, cycling first when
    /// requested and the sub-resource is in flight, then transition it from
    /// its default state to `destination`.
    pub(crate) fn prepare_subresource_for_write(
        &self,
        list: &mut native::CmdList,
        layer: u32,
        level: u32,
        cycle: bool,
        destination: ResourceState,
    ) -> (Arc<ConcreteTexture>, u32) {
        let index = layer * self.info.level_count + level;
        let concrete = {
            let mut state = self.state.lock();
            let active = &state.concretes[state.active];
            let subresource = &active.subresources[index as usize];
            debug_assert!(
                subresource.layer == layer
                    && subresource.level == level
                    && subresource.index == index
            );
            let in_flight = subresource.in_flight.load(Ordering::Acquire);
            if cycle && self.can_be_cycled && in_flight > 0 {
                self.cycle_active(&mut state);
            }
            state.concretes[state.active].clone()
        };
        resstate::transition_texture_from_default(list, &concrete, index, destination);
        (concrete, index)
    }
}

/// One native texture of a container.
#[derive(Debug)]
pub(crate) struct ConcreteTexture {
    /// Shared with the device; descriptor release must not require the
    /// device to still exist.
    staging: Arc<Mutex<StagingHeaps>>,
    pub(crate) resource: native::ResourceRef,
    pub(crate) usage: TextureUsageFlags,
    /// The whole-resource SRV, present when the texture can be sampled.
    pub(crate) whole_srv: Option<CpuDescriptor>,
    pub(crate) subresources: Vec<TextureSubresource>,
}

#[derive(Debug)]
pub(crate) struct TextureSubresource {
    pub(crate) layer: u32,
    pub(crate) level: u32,
    pub(crate) index: u32,
    pub(crate) rtv: Option<CpuDescriptor>,
    pub(crate) dsv: Option<CpuDescriptor>,
    pub(crate) srv: Option<CpuDescriptor>,
    pub(crate) uav: Option<CpuDescriptor>,
    pub(crate) in_flight: AtomicUsize,
}

impl ConcreteTexture {
    fn new(device: &DeviceRef, info: &TextureInfo, label: Option<&str>) -> Result<Arc<Self>> {
        let initial = resstate::texture_default_state(info.usage);
        let resource = device.native.create_texture(info.native_desc(), initial);
        if let Some(label) = label {
            resource.set_label(label);
        }
        Ok(Arc::new(Self::with_views(
            device, resource, info, /* swapchain */ false,
        )))
    }

    fn for_swapchain(
        device: &DeviceRef,
        resource: native::ResourceRef,
        info: &TextureInfo,
    ) -> Result<Arc<Self>> {
        Ok(Arc::new(Self::with_views(device, resource, info, true)))
    }

    fn with_views(
        device: &DeviceRef,
        resource: native::ResourceRef,
        info: &TextureInfo,
        swapchain: bool,
    ) -> Self {
        let mut staging = device.staging.lock();
        let num_subresources = info.layer_count * info.level_count;

        let whole_srv = if info.usage.contains(TextureUsageFlags::SAMPLER) {
            let descriptor = staging.allocate(StagingKind::View);
            descriptor.write(DescriptorPayload::Srv {
                resource: resource.clone(),
                first_subresource: 0,
                num_subresources,
            });
            Some(descriptor)
        } else {
            None
        };

        let mut subresources = Vec::with_capacity(num_subresources as usize);
        for layer in 0..info.layer_count {
            for level in 0..info.level_count {
                let index = layer * info.level_count + level;

                let rtv = if info.usage.contains(TextureUsageFlags::COLOR_TARGET) {
                    let descriptor = staging.allocate(StagingKind::Rtv);
                    descriptor.write(DescriptorPayload::Rtv {
                        resource: resource.clone(),
                        subresource: index,
                    });
                    Some(descriptor)
                } else {
                    None
                };

                let dsv = if info.usage.contains(TextureUsageFlags::DEPTH_STENCIL_TARGET) {
                    let descriptor = staging.allocate(StagingKind::Dsv);
                    descriptor.write(DescriptorPayload::Dsv {
                        resource: resource.clone(),
                        subresource: index,
                    });
                    Some(descriptor)
                } else {
                    None
                };

                // Swapchain sub-resources hold only the whole-texture SRV and
                // the RTV above.
                let srv = if !swapchain && info.usage.is_storage_readable() {
                    let descriptor = staging.allocate(StagingKind::View);
                    descriptor.write(DescriptorPayload::Srv {
                        resource: resource.clone(),
                        first_subresource: index,
                        num_subresources: 1,
                    });
                    Some(descriptor)
                } else {
                    None
                };

                let uav = if !swapchain
                    && info
                        .usage
                        .contains(TextureUsageFlags::COMPUTE_STORAGE_WRITE)
                {
                    let descriptor = staging.allocate(StagingKind::View);
                    descriptor.write(DescriptorPayload::Uav {
                        resource: resource.clone(),
                        subresource: index,
                    });
                    Some(descriptor)
                } else {
                    None
                };

                subresources.push(TextureSubresource {
                    layer,
                    level,
                    index,
                    rtv,
                    dsv,
                    srv,
                    uav,
                    in_flight: AtomicUsize::new(0),
                });
            }
        }

        Self {
            staging: device.staging.clone(),
            resource,
            usage: info.usage,
            whole_srv,
            subresources,
        }
    }

    pub(crate) fn subresource(&self, layer: u32, level: u32, level_count: u32) -> &TextureSubresource {
        &self.subresources[(layer * level_count + level) as usize]
    }

    /// The sum of every sub-resource's in-flight count.
    pub(crate) fn total_in_flight(&self) -> usize {
        self.subresources
            .iter()
            .map(|s| s.in_flight.load(Ordering::Acquire))
            .sum()
    }
}

impl Drop for ConcreteTexture {
    fn drop(&mut self) {
        let mut staging = self.staging.lock();
        if let Some(ref descriptor) = self.whole_srv {
            if descriptor.is_valid() {
                staging.release(descriptor);
            }
        }
        for subresource in &self.subresources {
            for descriptor in [
                &subresource.rtv,
                &subresource.dsv,
                &subresource.srv,
                &subresource.uav,
            ]
            .into_iter()
            .flatten()
            {
                if descriptor.is_valid() {
                    staging.release(descriptor);
                }
            }
        }
    }
}

/// Builder for textures.
#[derive(Debug)]
pub struct TextureBuilder {
    device: DeviceRef,
    extents: Option<[u32; 3]>,
    layer_count: u32,
    level_count: u32,
    cube: bool,
    format: Option<TextureFormat>,
    usage: TextureUsageFlags,
    sample_count: u32,
    label: Option<String>,
}

impl TextureBuilder {
    pub(crate) fn new(device: DeviceRef) -> Self {
        Self {
            device,
            extents: None,
            layer_count: 1,
            level_count: 1,
            cube: false,
            format: None,
            usage: TextureUsageFlags::empty(),
            sample_count: 1,
            label: None,
        }
    }

    /// Set the texture extents. `v` has one, two, or three elements matching
    /// the dimensionality. Mandatory.
    pub fn extents(&mut self, v: &[u32]) -> &mut Self {
        self.extents = Some(match *v {
            [x] => [x, 1, 1],
            [x, y] => [x, y, 1],
            [x, y, z] => [x, y, z],
            _ => panic!("invalid number of elements"),
        });
        self
    }

    /// Set the number of array layers. Defaults to `1`. Cube textures pass
    /// the face count times the cube count here.
    pub fn layer_count(&mut self, v: u32) -> &mut Self {
        self.layer_count = v;
        self
    }

    /// Set the number of mipmap levels. Defaults to `1`.
    pub fn level_count(&mut self, v: u32) -> &mut Self {
        self.level_count = v;
        self
    }

    /// Mark the texture as a cube map.
    pub fn cube(&mut self) -> &mut Self {
        self.cube = true;
        self
    }

    /// Set the texture format. Mandatory.
    pub fn format(&mut self, v: TextureFormat) -> &mut Self {
        self.format = Some(v);
        self
    }

    /// Set the usage flags. Mandatory; must be non-empty.
    pub fn usage(&mut self, v: TextureUsageFlags) -> &mut Self {
        self.usage = v;
        self
    }

    /// Set the sample count. Defaults to `1`.
    pub fn sample_count(&mut self, v: u32) -> &mut Self {
        self.sample_count = v;
        self
    }

    pub fn label(&mut self, v: &str) -> &mut Self {
        self.label = Some(v.to_owned());
        self
    }

    pub fn build(&mut self) -> Result<Texture> {
        let extents = self.extents.expect("extents");
        let format = self.format.expect("format");
        assert!(!self.usage.is_empty(), "usage");
        let layer_count = if self.cube {
            self.layer_count * 6
        } else {
            self.layer_count
        };
        let info = TextureInfo {
            width: extents[0],
            height: extents[1],
            depth: extents[2],
            layer_count,
            level_count: self.level_count,
            cube: self.cube,
            format,
            usage: self.usage,
            sample_count: self.sample_count,
        };
        let container = TextureContainer::new(self.device.clone(), info)?;
        let texture = Texture { container };
        if let Some(ref label) = self.label {
            texture.set_name(label);
        }
        Ok(texture)
    }
}
