//! Resource type tags, bind flags, and the other small enumerations the
//! command payloads reference (`spec.md` §3, §6).

use bitflags::bitflags;

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Texture1d = 1,
    Texture2d = 2,
    Texture3d = 3,
    Buffer = 4,
    VertexShader = 5,
    PixelShader = 6,
    GeometryShader = 7,
    HullShader = 8,
    DomainShader = 9,
    ComputeShader = 10,
    InputLayout = 11,
    BlendState = 12,
    RasterizerState = 13,
    DepthStencilState = 14,
    SamplerState = 15,
    RenderTargetView = 16,
    DepthStencilView = 17,
    ShaderResourceView = 18,
    UnorderedAccessView = 19,
}

impl ResourceType {
    pub fn from_u32(v: u32) -> Option<Self> {
        Some(match v {
            1 => Self::Texture1d,
            2 => Self::Texture2d,
            3 => Self::Texture3d,
            4 => Self::Buffer,
            5 => Self::VertexShader,
            6 => Self::PixelShader,
            7 => Self::GeometryShader,
            8 => Self::HullShader,
            9 => Self::DomainShader,
            10 => Self::ComputeShader,
            11 => Self::InputLayout,
            12 => Self::BlendState,
            13 => Self::RasterizerState,
            14 => Self::DepthStencilState,
            15 => Self::SamplerState,
            16 => Self::RenderTargetView,
            17 => Self::DepthStencilView,
            18 => Self::ShaderResourceView,
            19 => Self::UnorderedAccessView,
            _ => return None,
        })
    }

    pub fn is_shader(self) -> bool {
        matches!(
            self,
            Self::VertexShader
                | Self::PixelShader
                | Self::GeometryShader
                | Self::HullShader
                | Self::DomainShader
                | Self::ComputeShader
        )
    }

    pub fn is_texture(self) -> bool {
        matches!(self, Self::Texture1d | Self::Texture2d | Self::Texture3d)
    }
}

bitflags! {
    /// Matches `D3D11_BIND_FLAG` numerically (`spec.md` §3).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BindFlags: u32 {
        const VERTEX_BUFFER    = 1 << 0;
        const INDEX_BUFFER     = 1 << 1;
        const CONSTANT_BUFFER  = 1 << 2;
        const SHADER_RESOURCE  = 1 << 3;
        const RENDER_TARGET    = 1 << 4;
        const DEPTH_STENCIL    = 1 << 5;
        const UNORDERED_ACCESS = 1 << 6;
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex = 0,
    Pixel = 1,
    Geometry = 2,
    Hull = 3,
    Domain = 4,
    Compute = 5,
}

pub const SHADER_STAGE_COUNT: usize = 6;

impl ShaderStage {
    pub fn from_u32(v: u32) -> Option<Self> {
        Some(match v {
            0 => Self::Vertex,
            1 => Self::Pixel,
            2 => Self::Geometry,
            3 => Self::Hull,
            4 => Self::Domain,
            5 => Self::Compute,
            _ => return None,
        })
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapType {
    Read = 1,
    Write = 2,
    ReadWrite = 3,
    WriteDiscard = 4,
    WriteNoOverwrite = 5,
}

impl MapType {
    pub fn from_u32(v: u32) -> Option<Self> {
        Some(match v {
            1 => Self::Read,
            2 => Self::Write,
            3 => Self::ReadWrite,
            4 => Self::WriteDiscard,
            5 => Self::WriteNoOverwrite,
            _ => return None,
        })
    }

    /// Read and read-write maps require the backend to have written resource
    /// contents into the heap before the pointer is handed back
    /// (`spec.md` §4.5 Map/Unmap: "turns the map into a synchronous round-trip").
    pub fn is_read(self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClearFlags: u32 {
        const DEPTH   = 1 << 0;
        const STENCIL = 1 << 1;
    }
}

/// A practical subset of `DXGI_FORMAT`, sufficient for the resource/capability
/// surface this spec covers (`spec.md` §4.6, §9 map-pitch note).
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DxgiFormat {
    Unknown = 0,
    R32g32b32a32Float = 2,
    R32g32b32Float = 6,
    R16g16b16a16Float = 10,
    R16g16b16a16Unorm = 11,
    R32g32Float = 16,
    R8g8b8a8Unorm = 28,
    R8g8b8a8UnormSrgb = 29,
    R16g16Float = 34,
    R32Float = 41,
    D32Float = 40,
    R16Float = 54,
    D24UnormS8Uint = 45,
    D16Unorm = 55,
    R16Uint = 57,
    R8Uint = 62,
    B8g8r8a8Unorm = 87,
    B8g8r8a8UnormSrgb = 91,
    Bc1Unorm = 71,
    Bc3Unorm = 77,
    Bc7Unorm = 98,
    R32Uint = 42,
}

impl DxgiFormat {
    pub fn from_u32(v: u32) -> Option<Self> {
        Some(match v {
            0 => Self::Unknown,
            2 => Self::R32g32b32a32Float,
            6 => Self::R32g32b32Float,
            10 => Self::R16g16b16a16Float,
            11 => Self::R16g16b16a16Unorm,
            16 => Self::R32g32Float,
            28 => Self::R8g8b8a8Unorm,
            29 => Self::R8g8b8a8UnormSrgb,
            34 => Self::R16g16Float,
            40 => Self::D32Float,
            41 => Self::R32Float,
            42 => Self::R32Uint,
            45 => Self::D24UnormS8Uint,
            54 => Self::R16Float,
            55 => Self::D16Unorm,
            57 => Self::R16Uint,
            62 => Self::R8Uint,
            71 => Self::Bc1Unorm,
            77 => Self::Bc3Unorm,
            87 => Self::B8g8r8a8Unorm,
            91 => Self::B8g8r8a8UnormSrgb,
            98 => Self::Bc7Unorm,
            _ => return None,
        })
    }

    /// Uncompressed bytes per pixel, or `None` for block-compressed formats
    /// (which must be sized via `block_bytes_per_4x4`).
    ///
    /// `spec.md` §9 flags the original's `width * 4` map-pitch shortcut as
    /// format-incorrect and asks for a real table; this is that table.
    pub fn bytes_per_pixel(self) -> Option<u32> {
        match self {
            Self::R32g32b32a32Float => Some(16),
            Self::R32g32b32Float => Some(12),
            Self::R16g16b16a16Float | Self::R16g16b16a16Unorm => Some(8),
            Self::R32g32Float => Some(8),
            Self::R8g8b8a8Unorm
            | Self::R8g8b8a8UnormSrgb
            | Self::B8g8r8a8Unorm
            | Self::B8g8r8a8UnormSrgb
            | Self::D24UnormS8Uint
            | Self::R32Float
            | Self::R32Uint
            | Self::D32Float => Some(4),
            Self::R16g16Float => Some(4),
            Self::R16Float | Self::R16Uint | Self::D16Unorm => Some(2),
            Self::R8Uint => Some(1),
            Self::Unknown | Self::Bc1Unorm | Self::Bc3Unorm | Self::Bc7Unorm => None,
        }
    }

    /// Bytes per 4x4 texel block, for block-compressed formats.
    pub fn block_bytes_per_4x4(self) -> Option<u32> {
        match self {
            Self::Bc1Unorm => Some(8),
            Self::Bc3Unorm | Self::Bc7Unorm => Some(16),
            _ => None,
        }
    }

    pub fn is_block_compressed(self) -> bool {
        self.block_bytes_per_4x4().is_some()
    }

    pub fn is_depth(self) -> bool {
        matches!(self, Self::D16Unorm | Self::D24UnormS8Uint | Self::D32Float)
    }
}

/// Row pitch in bytes for a given width, following the format's real texel
/// layout rather than the original's fixed `width * 4` assumption.
pub fn row_pitch(format: DxgiFormat, width: u32) -> u32 {
    if let Some(block) = format.block_bytes_per_4x4() {
        let blocks_wide = width.div_ceil(4);
        blocks_wide * block
    } else {
        let bpp = format.bytes_per_pixel().unwrap_or(4);
        width * bpp
    }
}

/// `D3D11_PRIMITIVE_TOPOLOGY` values actually reachable through this protocol.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    Undefined = 0,
    PointList = 1,
    LineList = 2,
    LineStrip = 3,
    TriangleList = 4,
    TriangleStrip = 5,
}

impl PrimitiveTopology {
    pub fn from_u32(v: u32) -> Option<Self> {
        Some(match v {
            0 => Self::Undefined,
            1 => Self::PointList,
            2 => Self::LineList,
            3 => Self::LineStrip,
            4 => Self::TriangleList,
            5 => Self::TriangleStrip,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_pitch_uses_real_bpp_not_flat_times_4() {
        // R8Uint is 1 byte per pixel; the original's `width * 4` shortcut would
        // overstate this by 4x.
        assert_eq!(row_pitch(DxgiFormat::R8Uint, 256), 256);
        assert_eq!(row_pitch(DxgiFormat::B8g8r8a8Unorm, 256), 1024);
    }

    #[test]
    fn row_pitch_block_compressed_rounds_up_to_4x4() {
        // 257 wide -> 65 blocks of 4, at 8 bytes/block for BC1.
        assert_eq!(row_pitch(DxgiFormat::Bc1Unorm, 257), 65 * 8);
    }

    #[test]
    fn resource_type_roundtrip() {
        for v in 1..=19u32 {
            let rt = ResourceType::from_u32(v).unwrap();
            assert_eq!(rt as u32, v);
        }
        assert!(ResourceType::from_u32(0).is_none());
        assert!(ResourceType::from_u32(20).is_none());
    }
}
