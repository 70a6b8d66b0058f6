//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! The copy pass encoder.
//!
//! Texture copies have two native alignment rules: row pitches are padded to
//! 256 bytes and buffer offsets to 512 bytes. Rather than leaking those into
//! the transfer-buffer layout, misaligned copies are re-laid-out through a
//! temporary buffer — uploads on the record thread, downloads as a fixup
//! applied when the command buffer retires. The extra copy is logged so the
//! caller can align manually.
use ringfx_base::limits::{TEXTURE_PLACEMENT_ALIGNMENT, TEXTURE_ROW_PITCH_ALIGNMENT};
use ringfx_common::{align_up, Extent3D, Offset3D};

use crate::buffer::{Buffer, TransferBuffer};
use crate::cmd::buffer::{CbInner, TextureDownload};
use crate::native::{Cmd, HeapClass, ResourceState};
use crate::texture::Texture;

/// A region of one texture sub-resource.
#[derive(Debug, Clone, Copy)]
pub struct TextureRegion<'a> {
    pub texture: &'a Texture,
    pub layer: u32,
    pub level: u32,
    pub x: u32,
    pub y: u32,
    pub z: u32,
    pub w: u32,
    pub h: u32,
    pub d: u32,
}

impl TextureRegion<'_> {
    fn origin(&self) -> Offset3D {
        Offset3D::new(self.x, self.y, self.z)
    }

    fn extent(&self) -> Extent3D {
        Extent3D::new(self.w, self.h, self.d)
    }
}

/// The layout of texture data inside a transfer buffer. Zero values default
/// to a tight layout for the region being copied.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextureTransferInfo {
    pub offset: u64,
    /// The stride between rows, in texels.
    pub pixels_per_row: u32,
    /// The stride between depth slices, in rows.
    pub rows_per_slice: u32,
}

/// Records transfer commands into a copy pass.
#[derive(Debug)]
pub struct CopyEncoder<'a> {
    cb: &'a mut CbInner,
}

impl<'a> CopyEncoder<'a> {
    pub(crate) fn begin(cb: &'a mut CbInner) -> Self {
        Self { cb }
    }

    /// Copy `size` bytes from an upload transfer buffer into a GPU buffer.
    pub fn upload_to_buffer(
        &mut self,
        source: &TransferBuffer,
        source_offset: u64,
        destination: &Buffer,
        destination_offset: u64,
        size: u64,
        cycle: bool,
    ) {
        let src = source.container.active();
        let dst = destination.container.prepare_for_write(
            &mut self.cb.list,
            cycle,
            ResourceState::CopyDest,
        );
        self.cb.list.push(Cmd::CopyBufferRegion {
            src: src.resource.clone(),
            src_offset: source_offset,
            dst: dst.resource.clone(),
            dst_offset: destination_offset,
            size,
        });
        crate::resstate::transition_buffer_to_default(
            &mut self.cb.list,
            &dst,
            ResourceState::CopyDest,
        );
        self.cb.track_buffer(&src);
        self.cb.track_buffer(&dst);
    }

    /// Copy `size` bytes from a GPU buffer into a readback transfer buffer.
    pub fn download_from_buffer(
        &mut self,
        source: &Buffer,
        source_offset: u64,
        destination: &TransferBuffer,
        destination_offset: u64,
        size: u64,
    ) {
        let src = source.container.active();
        crate::resstate::transition_buffer_from_default(
            &mut self.cb.list,
            &src,
            ResourceState::CopySource,
        );
        let dst = destination.container.active();
        self.cb.list.push(Cmd::CopyBufferRegion {
            src: src.resource.clone(),
            src_offset: source_offset,
            dst: dst.resource.clone(),
            dst_offset: destination_offset,
            size,
        });
        crate::resstate::transition_buffer_to_default(
            &mut self.cb.list,
            &src,
            ResourceState::CopySource,
        );
        self.cb.track_buffer(&src);
        self.cb.track_buffer(&dst);
    }

    pub fn copy_buffer_to_buffer(
        &mut self,
        source: &Buffer,
        source_offset: u64,
        destination: &Buffer,
        destination_offset: u64,
        size: u64,
        cycle: bool,
    ) {
        let src = source.container.active();
        let dst = destination.container.prepare_for_write(
            &mut self.cb.list,
            cycle,
            ResourceState::CopyDest,
        );
        crate::resstate::transition_buffer_from_default(
            &mut self.cb.list,
            &src,
            ResourceState::CopySource,
        );
        self.cb.list.push(Cmd::CopyBufferRegion {
            src: src.resource.clone(),
            src_offset: source_offset,
            dst: dst.resource.clone(),
            dst_offset: destination_offset,
            size,
        });
        crate::resstate::transition_buffer_to_default(
            &mut self.cb.list,
            &src,
            ResourceState::CopySource,
        );
        crate::resstate::transition_buffer_to_default(
            &mut self.cb.list,
            &dst,
            ResourceState::CopyDest,
        );
        self.cb.track_buffer(&src);
        self.cb.track_buffer(&dst);
    }

    /// Copy texture data from an upload transfer buffer into a texture
    /// region.
    pub fn upload_to_texture(
        &mut self,
        source: &TransferBuffer,
        source_info: &TextureTransferInfo,
        destination: &TextureRegion<'_>,
        cycle: bool,
    ) {
        let container = &destination.texture.container;
        let format = container.info.format;
        let (bw, bh) = format.block_dim();
        let block_size = format.texel_block_size() as u64;

        let pixels_per_row = if source_info.pixels_per_row == 0 {
            destination.w
        } else {
            source_info.pixels_per_row
        };
        let rows_per_slice = if source_info.rows_per_slice == 0 {
            destination.h
        } else {
            source_info.rows_per_slice
        };

        let row_pitch = ((pixels_per_row + bw - 1) / bw) as u64 * block_size;
        let aligned_row_pitch = align_up(row_pitch, TEXTURE_ROW_PITCH_ALIGNMENT);
        let copy_rows = (destination.h + bh - 1) / bh;
        let src_rows_per_slice = (rows_per_slice + bh - 1) / bh;
        let copy_row_bytes = ((destination.w + bw - 1) / bw) as u64 * block_size;

        let needs_realignment = rows_per_slice != destination.h || row_pitch != aligned_row_pitch;
        let needs_placement_copy = source_info.offset % TEXTURE_PLACEMENT_ALIGNMENT != 0;

        let src = source.container.active();
        let (dst, dst_subresource) = container.prepare_subresource_for_write(
            &mut self.cb.list,
            destination.layer,
            destination.level,
            cycle,
            ResourceState::CopyDest,
        );

        if needs_realignment || needs_placement_copy {
            log::warn!(
                "texture upload was re-laid-out into a temporary buffer; align row pitches to {} bytes and offsets to {} bytes to avoid the extra copy",
                TEXTURE_ROW_PITCH_ALIGNMENT,
                TEXTURE_PLACEMENT_ALIGNMENT
            );
            let temp_size = aligned_row_pitch * copy_rows as u64 * destination.d as u64;
            let temp = self.cb.device().native.create_buffer(
                temp_size,
                HeapClass::Upload,
                ResourceState::Common,
            );
            // Re-lay-out on the record thread, row by row, slice by slice.
            unsafe {
                let src_ptr = src.resource.memory.ptr();
                let temp_ptr = temp.memory.ptr();
                for z in 0..destination.d as u64 {
                    for row in 0..copy_rows as u64 {
                        let src_offset = source_info.offset
                            + z * row_pitch * src_rows_per_slice as u64
                            + row * row_pitch;
                        let temp_offset = z * aligned_row_pitch * copy_rows as u64
                            + row * aligned_row_pitch;
                        std::ptr::copy_nonoverlapping(
                            src_ptr.add(src_offset as usize),
                            temp_ptr.add(temp_offset as usize),
                            copy_row_bytes as usize,
                        );
                    }
                }
            }
            self.cb.list.push(Cmd::CopyBufferToTexture {
                src: temp,
                src_offset: 0,
                src_row_pitch: aligned_row_pitch,
                src_rows_per_slice: copy_rows,
                dst: dst.resource.clone(),
                dst_subresource,
                dst_origin: destination.origin(),
                extent: destination.extent(),
            });
        } else {
            self.cb.list.push(Cmd::CopyBufferToTexture {
                src: src.resource.clone(),
                src_offset: source_info.offset,
                src_row_pitch: row_pitch,
                src_rows_per_slice,
                dst: dst.resource.clone(),
                dst_subresource,
                dst_origin: destination.origin(),
                extent: destination.extent(),
            });
        }

        crate::resstate::transition_texture_to_default(
            &mut self.cb.list,
            &dst,
            dst_subresource,
            ResourceState::CopyDest,
        );
        self.cb.track_buffer(&src);
        self.cb.track_texture_subresource(&dst, dst_subresource);
    }

    /// Copy a texture region into a readback transfer buffer. Misaligned
    /// destinations are serviced through a temporary buffer whose contents
    /// are copied out when the command buffer retires.
    pub fn download_from_texture(
        &mut self,
        source: &TextureRegion<'_>,
        destination: &TransferBuffer,
        destination_info: &TextureTransferInfo,
    ) {
        let container = &source.texture.container;
        let format = container.info.format;
        let (bw, bh) = format.block_dim();
        let block_size = format.texel_block_size() as u64;

        let pixels_per_row = if destination_info.pixels_per_row == 0 {
            source.w
        } else {
            destination_info.pixels_per_row
        };
        let rows_per_slice = if destination_info.rows_per_slice == 0 {
            source.h
        } else {
            destination_info.rows_per_slice
        };

        let row_pitch = ((pixels_per_row + bw - 1) / bw) as u64 * block_size;
        let aligned_row_pitch = align_up(row_pitch, TEXTURE_ROW_PITCH_ALIGNMENT);
        let copy_rows = (source.h + bh - 1) / bh;
        let dst_rows_per_slice = (rows_per_slice + bh - 1) / bh;

        let needs_realignment = rows_per_slice != source.h || row_pitch != aligned_row_pitch;
        let needs_placement_copy = destination_info.offset % TEXTURE_PLACEMENT_ALIGNMENT != 0;

        let src = container.active();
        let src_subresource = source.layer * container.info.level_count + source.level;
        crate::resstate::transition_texture_from_default(
            &mut self.cb.list,
            &src,
            src_subresource,
            ResourceState::CopySource,
        );

        let dst = destination.container.active();

        if needs_realignment || needs_placement_copy {
            log::warn!(
                "texture download was re-laid-out through a temporary buffer; align row pitches to {} bytes and offsets to {} bytes to avoid the extra copy",
                TEXTURE_ROW_PITCH_ALIGNMENT,
                TEXTURE_PLACEMENT_ALIGNMENT
            );
            let temp_size = aligned_row_pitch * copy_rows as u64 * source.d as u64;
            let temp = self.cb.device().native.create_buffer(
                temp_size,
                HeapClass::Readback,
                ResourceState::Common,
            );
            self.cb.list.push(Cmd::CopyTextureToBuffer {
                src: src.resource.clone(),
                src_subresource,
                src_origin: source.origin(),
                extent: source.extent(),
                dst: temp.clone(),
                dst_offset: 0,
                dst_row_pitch: aligned_row_pitch,
            });
            self.cb.downloads.push(TextureDownload {
                temp,
                dst: dst.clone(),
                dst_offset: destination_info.offset,
                row_pitch,
                aligned_row_pitch,
                rows_per_slice: dst_rows_per_slice,
                num_rows: copy_rows,
                depth: source.d,
            });
        } else {
            self.cb.list.push(Cmd::CopyTextureToBuffer {
                src: src.resource.clone(),
                src_subresource,
                src_origin: source.origin(),
                extent: source.extent(),
                dst: dst.resource.clone(),
                dst_offset: destination_info.offset,
                dst_row_pitch: row_pitch,
            });
        }

        crate::resstate::transition_texture_to_default(
            &mut self.cb.list,
            &src,
            src_subresource,
            ResourceState::CopySource,
        );
        self.cb.track_texture_subresource(&src, src_subresource);
        self.cb.track_buffer(&dst);
    }

    /// Region-to-region copy between two textures of compatible formats.
    pub fn copy_texture_to_texture(
        &mut self,
        source: &TextureRegion<'_>,
        destination: &TextureRegion<'_>,
        cycle: bool,
    ) {
        let src_container = &source.texture.container;
        let src = src_container.active();
        let src_subresource = source.layer * src_container.info.level_count + source.level;

        let dst_container = &destination.texture.container;
        let (dst, dst_subresource) = dst_container.prepare_subresource_for_write(
            &mut self.cb.list,
            destination.layer,
            destination.level,
            cycle,
            ResourceState::CopyDest,
        );

        crate::resstate::transition_texture_from_default(
            &mut self.cb.list,
            &src,
            src_subresource,
            ResourceState::CopySource,
        );
        self.cb.list.push(Cmd::CopyTextureRegion {
            src: src.resource.clone(),
            src_subresource,
            src_origin: source.origin(),
            dst: dst.resource.clone(),
            dst_subresource,
            dst_origin: destination.origin(),
            extent: source.extent(),
        });
        crate::resstate::transition_texture_to_default(
            &mut self.cb.list,
            &src,
            src_subresource,
            ResourceState::CopySource,
        );
        crate::resstate::transition_texture_to_default(
            &mut self.cb.list,
            &dst,
            dst_subresource,
            ResourceState::CopyDest,
        );
        self.cb.track_texture_subresource(&src, src_subresource);
        self.cb.track_texture_subresource(&dst, dst_subresource);
    }

    /// Regenerate levels `1..level_count` of `texture` from level 0 with the
    /// internal blit pipeline.
    pub fn generate_mipmaps(&mut self, texture: &Texture) {
        crate::blit::generate_mipmaps(self.cb, texture);
    }
}
