//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Surfaces and the per-window swapchain manager.
//!
//! A [`Surface`] is a headless presentation target with a client-controlled
//! extent; the windowing layer above the library owns the real window and
//! mirrors its size into the surface. Claiming a surface builds a back-buffer
//! ring of [`MAX_FRAMES_IN_FLIGHT`] texture containers (which never cycle)
//! and an equal number of frame slots tracking the fence that last presented
//! each position in the ring.
//!
//! A frame slot walks `Free → Pending → InFlight(fence) → Free`: *pending*
//! between acquisition and submit, *in flight* from submit until a later
//! acquisition observes the fence signalled.
use parking_lot::Mutex;
use std::sync::Arc;

use ringfx_base::error::{Error, ErrorKind, Result};
use ringfx_base::limits::MAX_FRAMES_IN_FLIGHT;
use ringfx_base::{PresentMode, SwapchainComposition, TextureFormat};

use crate::cmd::buffer::{CmdBuffer, PresentEntry};
use crate::cmd::fence::FenceInner;
use crate::device::{Device, DeviceRef};
use crate::native;
use crate::texture::{Texture, TextureContainer};
use crate::FENCE_SIGNALED_VALUE;

/// A presentation target.
#[derive(Debug, Clone)]
pub struct Surface {
    pub(crate) inner: Arc<SurfaceInner>,
}

#[derive(Debug)]
pub(crate) struct SurfaceInner {
    extent: Mutex<(u32, u32)>,
    pub(crate) window: Mutex<Option<Arc<WindowData>>>,
}

impl Surface {
    /// Create a surface with the given client extent.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            inner: Arc::new(SurfaceInner {
                extent: Mutex::new((width, height)),
                window: Mutex::new(None),
            }),
        }
    }

    /// Change the client extent, as a window resize would. The swapchain
    /// follows on the next acquisition.
    pub fn set_extent(&self, width: u32, height: u32) {
        *self.inner.extent.lock() = (width, height);
    }

    pub fn extent(&self) -> (u32, u32) {
        *self.inner.extent.lock()
    }
}

/// The state of one frame slot.
#[derive(Debug)]
pub(crate) enum SlotState {
    Free,
    /// Acquired into a command buffer that has not been submitted yet.
    Pending,
    /// Presented; the fence signals when the frame's submission retires.
    InFlight(Arc<FenceInner>),
}

#[derive(Debug)]
pub(crate) struct WindowData {
    pub(crate) swapchain: Arc<native::Swapchain>,
    pub(crate) present_mode: PresentMode,
    pub(crate) composition: SwapchainComposition,
    pub(crate) format: TextureFormat,
    state: Mutex<WindowState>,
}

#[derive(Debug)]
struct WindowState {
    containers: Vec<Texture>,
    slots: Vec<SlotState>,
    frame_counter: usize,
}

pub(crate) fn composition_format(composition: SwapchainComposition) -> TextureFormat {
    match composition {
        SwapchainComposition::Sdr => TextureFormat::B8G8R8A8Unorm,
        SwapchainComposition::SdrSrgb => TextureFormat::B8G8R8A8UnormSrgb,
        SwapchainComposition::HdrLinear => TextureFormat::R16G16B16A16Float,
        SwapchainComposition::Hdr10 => TextureFormat::R10G10B10A2Unorm,
    }
}

impl WindowData {
    fn new(
        device: &DeviceRef,
        width: u32,
        height: u32,
        composition: SwapchainComposition,
        present_mode: PresentMode,
    ) -> Result<Arc<Self>> {
        let format = composition_format(composition);
        let swapchain = device.native.create_swapchain(native::SwapchainDesc {
            width,
            height,
            format,
            buffer_count: MAX_FRAMES_IN_FLIGHT as u32,
        });
        let containers = Self::make_containers(device, &swapchain, format)?;
        Ok(Arc::new(Self {
            swapchain,
            present_mode,
            composition,
            format,
            state: Mutex::new(WindowState {
                containers,
                slots: (0..MAX_FRAMES_IN_FLIGHT).map(|_| SlotState::Free).collect(),
                frame_counter: 0,
            }),
        }))
    }

    fn make_containers(
        device: &DeviceRef,
        swapchain: &native::Swapchain,
        format: TextureFormat,
    ) -> Result<Vec<Texture>> {
        (0..MAX_FRAMES_IN_FLIGHT as u32)
            .map(|i| {
                let container = TextureContainer::new_for_swapchain(
                    device.clone(),
                    swapchain.buffer(i),
                    format,
                )?;
                Ok(Texture { container })
            })
            .collect()
    }

    pub(crate) fn texture(&self, index: u32) -> Texture {
        self.state.lock().containers[index as usize].clone()
    }

    pub(crate) fn container(&self, index: u32) -> Arc<TextureContainer> {
        self.state.lock().containers[index as usize].container.clone()
    }

    /// Drop the per-back-buffer views and rebuild the ring at a new size.
    /// The device must be idle.
    fn rebuild(&self, device: &DeviceRef, width: u32, height: u32) -> Result<()> {
        let mut state = self.state.lock();
        // Release the old views before the native buffers go away.
        state.containers.clear();
        device
            .native
            .recreate_swapchain(&self.swapchain, width, height, self.format);
        state.containers = Self::make_containers(device, &self.swapchain, self.format)?;
        Ok(())
    }

    /// Record the submission fence on the slot the presented frame occupied
    /// and advance the frame counter.
    pub(crate) fn record_presented_fence(&self, fence: Arc<FenceInner>) {
        let mut state = self.state.lock();
        let counter = state.frame_counter;
        state.slots[counter] = SlotState::InFlight(fence);
        state.frame_counter = (counter + 1) % MAX_FRAMES_IN_FLIGHT;
    }

    /// Roll a pending acquisition back to free. Used when a command buffer is
    /// dropped without being submitted.
    pub(crate) fn cancel_pending_slot(&self) {
        let mut state = self.state.lock();
        let counter = state.frame_counter;
        if matches!(state.slots[counter], SlotState::Pending) {
            state.slots[counter] = SlotState::Free;
        }
    }
}

impl Device {
    /// Claim a surface for presentation, creating its swapchain.
    pub fn claim_surface(
        &self,
        surface: &Surface,
        composition: SwapchainComposition,
        present_mode: PresentMode,
    ) -> Result<()> {
        if !self.caps().supports_swapchain_composition(composition)
            || !self.caps().supports_present_mode(present_mode)
        {
            log::error!("unsupported swapchain composition or present mode");
            return Err(Error::new(ErrorKind::NotSupported));
        }
        let mut claimed = surface.inner.window.lock();
        if claimed.is_some() {
            log::warn!("surface is already claimed");
            return Ok(());
        }
        let (width, height) = surface.extent();
        let window = WindowData::new(&self.shared, width, height, composition, present_mode)?;
        self.shared.windows.lock().push(Arc::downgrade(&window));
        *claimed = Some(window);
        Ok(())
    }

    /// Release a surface's swapchain. Waits for the device to go idle first.
    pub fn unclaim_surface(&self, surface: &Surface) {
        let window = surface.inner.window.lock().take();
        if let Some(window) = window {
            self.shared.wait_idle();
            self.shared
                .windows
                .lock()
                .retain(|w| w.upgrade().is_some_and(|w| !Arc::ptr_eq(&w, &window)));
        }
    }

    /// Change a claimed surface's composition or present mode. Returns
    /// `false` without touching the existing swapchain when the request is
    /// unsupported or the surface is not claimed.
    pub fn set_swapchain_parameters(
        &self,
        surface: &Surface,
        composition: SwapchainComposition,
        present_mode: PresentMode,
    ) -> bool {
        if !self.caps().supports_swapchain_composition(composition)
            || !self.caps().supports_present_mode(present_mode)
        {
            return false;
        }
        let mut claimed = surface.inner.window.lock();
        let Some(old) = claimed.take() else {
            return false;
        };
        self.shared.wait_idle();
        let (width, height) = surface.extent();
        match WindowData::new(&self.shared, width, height, composition, present_mode) {
            Ok(window) => {
                let mut windows = self.shared.windows.lock();
                windows.retain(|w| w.upgrade().is_some_and(|w| !Arc::ptr_eq(&w, &old)));
                windows.push(Arc::downgrade(&window));
                *claimed = Some(window);
                true
            }
            Err(error) => {
                log::error!("failed to recreate the swapchain: {}", error);
                *claimed = Some(old);
                false
            }
        }
    }

    /// The texture format of a claimed surface's back buffers.
    pub fn swapchain_format(&self, surface: &Surface) -> Result<TextureFormat> {
        surface
            .inner
            .window
            .lock()
            .as_ref()
            .map(|w| w.format)
            .ok_or_else(|| Error::new(ErrorKind::Other))
    }
}

impl CmdBuffer {
    /// Acquire the surface's current back buffer for rendering in this
    /// command buffer and queue it for presentation at submit.
    ///
    /// Returns `Ok(None)` when the frame pipeline is full and the present
    /// mode forbids blocking — the caller is expected to skip the frame.
    pub fn acquire_swapchain_texture(
        &mut self,
        surface: &Surface,
    ) -> Result<Option<(Texture, u32, u32)>> {
        let window = surface
            .inner
            .window
            .lock()
            .clone()
            .ok_or_else(|| Error::new(ErrorKind::Other))?;
        let inner = self.inner_mut();
        let device = inner.device().clone();

        // Resize the swapchain when the client area no longer matches it.
        let (width, height) = surface.extent();
        let desc = window.swapchain.desc();
        if (width, height) != (desc.width, desc.height) {
            device.wait_idle();
            window.rebuild(&device, width, height)?;
        }

        // Frame pacing: the slot about to be used must be free. Waits happen
        // outside the window lock so submission can progress meanwhile.
        loop {
            let unsignalled = {
                let mut state = window.state.lock();
                let counter = state.frame_counter;
                match std::mem::replace(&mut state.slots[counter], SlotState::Free) {
                    SlotState::Free => None,
                    SlotState::Pending => {
                        // An earlier acquisition has not been submitted yet;
                        // there is no fence to wait on in any mode.
                        state.slots[counter] = SlotState::Pending;
                        return Ok(None);
                    }
                    SlotState::InFlight(fence) => {
                        if fence.native.completed_value() >= FENCE_SIGNALED_VALUE {
                            device.recycle_fence(fence);
                            None
                        } else if window.present_mode == PresentMode::Vsync {
                            state.slots[counter] = SlotState::InFlight(fence.clone());
                            Some(fence)
                        } else {
                            state.slots[counter] = SlotState::InFlight(fence);
                            return Ok(None);
                        }
                    }
                }
            };
            match unsignalled {
                Some(fence) => {
                    // Block until the least recently presented frame for this
                    // slot is done, then retire whatever finished.
                    fence.native.wait_value(FENCE_SIGNALED_VALUE);
                    device.sweep_retired();
                }
                None => break,
            }
        }

        let (index, texture) = {
            let mut state = window.state.lock();
            let counter = state.frame_counter;
            let index = window.swapchain.current_back_buffer_index();
            state.slots[counter] = SlotState::Pending;
            (index, state.containers[index as usize].clone())
        };
        inner.present_entries.push(PresentEntry {
            window: window.clone(),
            swapchain_index: index,
        });
        Ok(Some((texture, width, height)))
    }
}
