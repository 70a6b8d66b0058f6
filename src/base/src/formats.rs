//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Texture, vertex, and index formats.

/// Texture formats supported by the API surface. A backend reports the subset
/// it actually supports through its capability queries.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum TextureFormat {
    R8Unorm,
    R8G8Unorm,
    R8G8B8A8Unorm,
    R8G8B8A8UnormSrgb,
    B8G8R8A8Unorm,
    B8G8R8A8UnormSrgb,
    R10G10B10A2Unorm,
    R16G16B16A16Float,
    R32Float,
    R32Uint,
    R32G32B32A32Float,
    D16Unorm,
    D24UnormS8Uint,
    D32Float,
    Bc1Unorm,
    Bc2Unorm,
    Bc3Unorm,
}

impl TextureFormat {
    /// The size in bytes of one texel block.
    ///
    /// For uncompressed formats a block is a single texel; for the
    /// block-compressed formats it is a 4×4 texel tile.
    pub fn texel_block_size(&self) -> u32 {
        match *self {
            TextureFormat::R8Unorm => 1,
            TextureFormat::R8G8Unorm => 2,
            TextureFormat::R8G8B8A8Unorm
            | TextureFormat::R8G8B8A8UnormSrgb
            | TextureFormat::B8G8R8A8Unorm
            | TextureFormat::B8G8R8A8UnormSrgb
            | TextureFormat::R10G10B10A2Unorm
            | TextureFormat::R32Float
            | TextureFormat::R32Uint => 4,
            TextureFormat::R16G16B16A16Float => 8,
            TextureFormat::R32G32B32A32Float => 16,
            TextureFormat::D16Unorm => 2,
            TextureFormat::D24UnormS8Uint | TextureFormat::D32Float => 4,
            TextureFormat::Bc1Unorm => 8,
            TextureFormat::Bc2Unorm | TextureFormat::Bc3Unorm => 16,
        }
    }

    /// The texel dimensions of one block. `(1, 1)` except for the
    /// block-compressed formats.
    pub fn block_dim(&self) -> (u32, u32) {
        match *self {
            TextureFormat::Bc1Unorm | TextureFormat::Bc2Unorm | TextureFormat::Bc3Unorm => (4, 4),
            _ => (1, 1),
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.block_dim() != (1, 1)
    }

    pub fn has_depth(&self) -> bool {
        matches!(
            *self,
            TextureFormat::D16Unorm | TextureFormat::D24UnormS8Uint | TextureFormat::D32Float
        )
    }

    pub fn has_stencil(&self) -> bool {
        matches!(*self, TextureFormat::D24UnormS8Uint)
    }

    pub fn has_color(&self) -> bool {
        !self.has_depth()
    }
}

/// Formats of vertex attributes.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum VertexFormat {
    Float,
    Float2,
    Float3,
    Float4,
    Uint,
    Uint2,
    Uint4,
    Ubyte4Norm,
}

impl VertexFormat {
    /// The size in bytes of one attribute of this format.
    pub fn size(&self) -> u32 {
        match *self {
            VertexFormat::Float | VertexFormat::Uint | VertexFormat::Ubyte4Norm => 4,
            VertexFormat::Float2 | VertexFormat::Uint2 => 8,
            VertexFormat::Float3 => 12,
            VertexFormat::Float4 | VertexFormat::Uint4 => 16,
        }
    }
}

/// Formats of index buffer elements.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum IndexFormat {
    U16,
    U32,
}

impl IndexFormat {
    pub fn size(&self) -> u32 {
        match *self {
            IndexFormat::U16 => 2,
            IndexFormat::U32 => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_sizes() {
        assert_eq!(TextureFormat::B8G8R8A8Unorm.texel_block_size(), 4);
        assert_eq!(TextureFormat::R16G16B16A16Float.texel_block_size(), 8);
        assert_eq!(TextureFormat::Bc1Unorm.texel_block_size(), 8);
        assert_eq!(TextureFormat::Bc3Unorm.texel_block_size(), 16);
        assert_eq!(TextureFormat::Bc1Unorm.block_dim(), (4, 4));
    }

    #[test]
    fn aspect_queries() {
        assert!(TextureFormat::D24UnormS8Uint.has_depth());
        assert!(TextureFormat::D24UnormS8Uint.has_stencil());
        assert!(!TextureFormat::D32Float.has_stencil());
        assert!(TextureFormat::R8G8B8A8Unorm.has_color());
    }
}
