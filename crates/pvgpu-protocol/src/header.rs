//! The 16-byte command header every ring entry begins with (`spec.md` §3, §6).

use crate::error::ProtocolError;
use crate::wire::{get_u32, need, put_u32, WireStruct};
use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CommandFlags: u32 {
        /// Caller wants to wait for completion (advisory; synchronization is
        /// still done via explicit fence commands).
        const SYNC = 1 << 0;
        /// Do not signal a fence for this command.
        const NO_FENCE = 1 << 1;
    }
}

/// `command_type` field values (`spec.md` §6 category ranges).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandType {
    // Resource: 0x0001-0x00FF
    CreateResource,
    DestroyResource,
    MapResource,
    UnmapResource,
    UpdateResource,
    CopyResource,
    CopyResourceRegion,
    OpenResource,

    // State-object create/destroy: 0x0010-0x002F
    CreateBlendState,
    DestroyBlendState,
    CreateRasterizerState,
    DestroyRasterizerState,
    CreateDepthStencilState,
    DestroyDepthStencilState,
    CreateSamplerState,
    DestroySamplerState,
    CreateInputLayout,
    DestroyInputLayout,
    CreateRenderTargetView,
    DestroyRenderTargetView,
    CreateDepthStencilView,
    DestroyDepthStencilView,
    CreateShaderResourceView,
    DestroyShaderResourceView,
    CreateUnorderedAccessView,
    DestroyUnorderedAccessView,

    // Shader create/destroy: 0x0030-0x003F
    CreateShader,
    DestroyShader,

    // State-set: 0x0100-0x01FF
    SetRenderTarget,
    SetViewport,
    SetScissor,
    SetBlendState,
    SetRasterizerState,
    SetDepthStencil,
    SetShader,
    SetSampler,
    SetConstantBuffer,
    SetVertexBuffer,
    SetIndexBuffer,
    SetInputLayout,
    SetPrimitiveTopology,
    SetShaderResource,

    // Draw: 0x0200-0x02FF
    Draw,
    DrawIndexed,
    DrawInstanced,
    DrawIndexedInstanced,
    Dispatch,
    ClearRenderTarget,
    ClearDepthStencil,

    // Sync: 0x0300-0x03FF
    Fence,
    Present,
    Flush,
    WaitFence,
    ResizeBuffers,

    /// Forward-compatible fallback: an unrecognized `command_type`. The
    /// backend drops these (`spec.md` §7: `INVALID_COMMAND`) but a reader
    /// can still skip over the payload using `command_size`.
    Unknown(u32),
}

impl CommandType {
    pub const CREATE_RESOURCE: u32 = 0x0001;
    pub const DESTROY_RESOURCE: u32 = 0x0002;
    pub const MAP_RESOURCE: u32 = 0x0003;
    pub const UNMAP_RESOURCE: u32 = 0x0004;
    pub const UPDATE_RESOURCE: u32 = 0x0005;
    pub const COPY_RESOURCE: u32 = 0x0006;
    pub const COPY_RESOURCE_REGION: u32 = 0x0007;
    pub const OPEN_RESOURCE: u32 = 0x0008;

    pub const CREATE_BLEND_STATE: u32 = 0x0010;
    pub const DESTROY_BLEND_STATE: u32 = 0x0011;
    pub const CREATE_RASTERIZER_STATE: u32 = 0x0012;
    pub const DESTROY_RASTERIZER_STATE: u32 = 0x0013;
    pub const CREATE_DEPTH_STENCIL_STATE: u32 = 0x0014;
    pub const DESTROY_DEPTH_STENCIL_STATE: u32 = 0x0015;
    pub const CREATE_SAMPLER_STATE: u32 = 0x0016;
    pub const DESTROY_SAMPLER_STATE: u32 = 0x0017;
    pub const CREATE_INPUT_LAYOUT: u32 = 0x0018;
    pub const DESTROY_INPUT_LAYOUT: u32 = 0x0019;
    pub const CREATE_RENDER_TARGET_VIEW: u32 = 0x001A;
    pub const DESTROY_RENDER_TARGET_VIEW: u32 = 0x001B;
    pub const CREATE_DEPTH_STENCIL_VIEW: u32 = 0x001C;
    pub const DESTROY_DEPTH_STENCIL_VIEW: u32 = 0x001D;
    pub const CREATE_SHADER_RESOURCE_VIEW: u32 = 0x001E;
    pub const DESTROY_SHADER_RESOURCE_VIEW: u32 = 0x001F;
    pub const CREATE_UNORDERED_ACCESS_VIEW: u32 = 0x0020;
    pub const DESTROY_UNORDERED_ACCESS_VIEW: u32 = 0x0021;

    pub const CREATE_SHADER: u32 = 0x0030;
    pub const DESTROY_SHADER: u32 = 0x0031;

    pub const SET_RENDER_TARGET: u32 = 0x0101;
    pub const SET_VIEWPORT: u32 = 0x0102;
    pub const SET_SCISSOR: u32 = 0x0103;
    pub const SET_BLEND_STATE: u32 = 0x0104;
    pub const SET_RASTERIZER_STATE: u32 = 0x0105;
    pub const SET_DEPTH_STENCIL: u32 = 0x0106;
    pub const SET_SHADER: u32 = 0x0107;
    pub const SET_SAMPLER: u32 = 0x0108;
    pub const SET_CONSTANT_BUFFER: u32 = 0x0109;
    pub const SET_VERTEX_BUFFER: u32 = 0x010A;
    pub const SET_INDEX_BUFFER: u32 = 0x010B;
    pub const SET_INPUT_LAYOUT: u32 = 0x010C;
    pub const SET_PRIMITIVE_TOPOLOGY: u32 = 0x010D;
    pub const SET_SHADER_RESOURCE: u32 = 0x010E;

    pub const DRAW: u32 = 0x0201;
    pub const DRAW_INDEXED: u32 = 0x0202;
    pub const DRAW_INSTANCED: u32 = 0x0203;
    pub const DRAW_INDEXED_INSTANCED: u32 = 0x0204;
    pub const DISPATCH: u32 = 0x0205;
    pub const CLEAR_RENDER_TARGET: u32 = 0x0206;
    pub const CLEAR_DEPTH_STENCIL: u32 = 0x0207;

    pub const FENCE: u32 = 0x0301;
    pub const PRESENT: u32 = 0x0302;
    pub const FLUSH: u32 = 0x0303;
    pub const WAIT_FENCE: u32 = 0x0304;
    pub const RESIZE_BUFFERS: u32 = 0x0305;

    pub fn from_u32(v: u32) -> Self {
        match v {
            Self::CREATE_RESOURCE => Self::CreateResource,
            Self::DESTROY_RESOURCE => Self::DestroyResource,
            Self::MAP_RESOURCE => Self::MapResource,
            Self::UNMAP_RESOURCE => Self::UnmapResource,
            Self::UPDATE_RESOURCE => Self::UpdateResource,
            Self::COPY_RESOURCE => Self::CopyResource,
            Self::COPY_RESOURCE_REGION => Self::CopyResourceRegion,
            Self::OPEN_RESOURCE => Self::OpenResource,

            Self::CREATE_BLEND_STATE => Self::CreateBlendState,
            Self::DESTROY_BLEND_STATE => Self::DestroyBlendState,
            Self::CREATE_RASTERIZER_STATE => Self::CreateRasterizerState,
            Self::DESTROY_RASTERIZER_STATE => Self::DestroyRasterizerState,
            Self::CREATE_DEPTH_STENCIL_STATE => Self::CreateDepthStencilState,
            Self::DESTROY_DEPTH_STENCIL_STATE => Self::DestroyDepthStencilState,
            Self::CREATE_SAMPLER_STATE => Self::CreateSamplerState,
            Self::DESTROY_SAMPLER_STATE => Self::DestroySamplerState,
            Self::CREATE_INPUT_LAYOUT => Self::CreateInputLayout,
            Self::DESTROY_INPUT_LAYOUT => Self::DestroyInputLayout,
            Self::CREATE_RENDER_TARGET_VIEW => Self::CreateRenderTargetView,
            Self::DESTROY_RENDER_TARGET_VIEW => Self::DestroyRenderTargetView,
            Self::CREATE_DEPTH_STENCIL_VIEW => Self::CreateDepthStencilView,
            Self::DESTROY_DEPTH_STENCIL_VIEW => Self::DestroyDepthStencilView,
            Self::CREATE_SHADER_RESOURCE_VIEW => Self::CreateShaderResourceView,
            Self::DESTROY_SHADER_RESOURCE_VIEW => Self::DestroyShaderResourceView,
            Self::CREATE_UNORDERED_ACCESS_VIEW => Self::CreateUnorderedAccessView,
            Self::DESTROY_UNORDERED_ACCESS_VIEW => Self::DestroyUnorderedAccessView,

            Self::CREATE_SHADER => Self::CreateShader,
            Self::DESTROY_SHADER => Self::DestroyShader,

            Self::SET_RENDER_TARGET => Self::SetRenderTarget,
            Self::SET_VIEWPORT => Self::SetViewport,
            Self::SET_SCISSOR => Self::SetScissor,
            Self::SET_BLEND_STATE => Self::SetBlendState,
            Self::SET_RASTERIZER_STATE => Self::SetRasterizerState,
            Self::SET_DEPTH_STENCIL => Self::SetDepthStencil,
            Self::SET_SHADER => Self::SetShader,
            Self::SET_SAMPLER => Self::SetSampler,
            Self::SET_CONSTANT_BUFFER => Self::SetConstantBuffer,
            Self::SET_VERTEX_BUFFER => Self::SetVertexBuffer,
            Self::SET_INDEX_BUFFER => Self::SetIndexBuffer,
            Self::SET_INPUT_LAYOUT => Self::SetInputLayout,
            Self::SET_PRIMITIVE_TOPOLOGY => Self::SetPrimitiveTopology,
            Self::SET_SHADER_RESOURCE => Self::SetShaderResource,

            Self::DRAW => Self::Draw,
            Self::DRAW_INDEXED => Self::DrawIndexed,
            Self::DRAW_INSTANCED => Self::DrawInstanced,
            Self::DRAW_INDEXED_INSTANCED => Self::DrawIndexedInstanced,
            Self::DISPATCH => Self::Dispatch,
            Self::CLEAR_RENDER_TARGET => Self::ClearRenderTarget,
            Self::CLEAR_DEPTH_STENCIL => Self::ClearDepthStencil,

            Self::FENCE => Self::Fence,
            Self::PRESENT => Self::Present,
            Self::FLUSH => Self::Flush,
            Self::WAIT_FENCE => Self::WaitFence,
            Self::RESIZE_BUFFERS => Self::ResizeBuffers,

            other => Self::Unknown(other),
        }
    }

    pub fn as_u32(self) -> u32 {
        match self {
            Self::CreateResource => Self::CREATE_RESOURCE,
            Self::DestroyResource => Self::DESTROY_RESOURCE,
            Self::MapResource => Self::MAP_RESOURCE,
            Self::UnmapResource => Self::UNMAP_RESOURCE,
            Self::UpdateResource => Self::UPDATE_RESOURCE,
            Self::CopyResource => Self::COPY_RESOURCE,
            Self::CopyResourceRegion => Self::COPY_RESOURCE_REGION,
            Self::OpenResource => Self::OPEN_RESOURCE,

            Self::CreateBlendState => Self::CREATE_BLEND_STATE,
            Self::DestroyBlendState => Self::DESTROY_BLEND_STATE,
            Self::CreateRasterizerState => Self::CREATE_RASTERIZER_STATE,
            Self::DestroyRasterizerState => Self::DESTROY_RASTERIZER_STATE,
            Self::CreateDepthStencilState => Self::CREATE_DEPTH_STENCIL_STATE,
            Self::DestroyDepthStencilState => Self::DESTROY_DEPTH_STENCIL_STATE,
            Self::CreateSamplerState => Self::CREATE_SAMPLER_STATE,
            Self::DestroySamplerState => Self::DESTROY_SAMPLER_STATE,
            Self::CreateInputLayout => Self::CREATE_INPUT_LAYOUT,
            Self::DestroyInputLayout => Self::DESTROY_INPUT_LAYOUT,
            Self::CreateRenderTargetView => Self::CREATE_RENDER_TARGET_VIEW,
            Self::DestroyRenderTargetView => Self::DESTROY_RENDER_TARGET_VIEW,
            Self::CreateDepthStencilView => Self::CREATE_DEPTH_STENCIL_VIEW,
            Self::DestroyDepthStencilView => Self::DESTROY_DEPTH_STENCIL_VIEW,
            Self::CreateShaderResourceView => Self::CREATE_SHADER_RESOURCE_VIEW,
            Self::DestroyShaderResourceView => Self::DESTROY_SHADER_RESOURCE_VIEW,
            Self::CreateUnorderedAccessView => Self::CREATE_UNORDERED_ACCESS_VIEW,
            Self::DestroyUnorderedAccessView => Self::DESTROY_UNORDERED_ACCESS_VIEW,

            Self::CreateShader => Self::CREATE_SHADER,
            Self::DestroyShader => Self::DESTROY_SHADER,

            Self::SetRenderTarget => Self::SET_RENDER_TARGET,
            Self::SetViewport => Self::SET_VIEWPORT,
            Self::SetScissor => Self::SET_SCISSOR,
            Self::SetBlendState => Self::SET_BLEND_STATE,
            Self::SetRasterizerState => Self::SET_RASTERIZER_STATE,
            Self::SetDepthStencil => Self::SET_DEPTH_STENCIL,
            Self::SetShader => Self::SET_SHADER,
            Self::SetSampler => Self::SET_SAMPLER,
            Self::SetConstantBuffer => Self::SET_CONSTANT_BUFFER,
            Self::SetVertexBuffer => Self::SET_VERTEX_BUFFER,
            Self::SetIndexBuffer => Self::SET_INDEX_BUFFER,
            Self::SetInputLayout => Self::SET_INPUT_LAYOUT,
            Self::SetPrimitiveTopology => Self::SET_PRIMITIVE_TOPOLOGY,
            Self::SetShaderResource => Self::SET_SHADER_RESOURCE,

            Self::Draw => Self::DRAW,
            Self::DrawIndexed => Self::DRAW_INDEXED,
            Self::DrawInstanced => Self::DRAW_INSTANCED,
            Self::DrawIndexedInstanced => Self::DRAW_INDEXED_INSTANCED,
            Self::Dispatch => Self::DISPATCH,
            Self::ClearRenderTarget => Self::CLEAR_RENDER_TARGET,
            Self::ClearDepthStencil => Self::CLEAR_DEPTH_STENCIL,

            Self::Fence => Self::FENCE,
            Self::Present => Self::PRESENT,
            Self::Flush => Self::FLUSH,
            Self::WaitFence => Self::WAIT_FENCE,
            Self::ResizeBuffers => Self::RESIZE_BUFFERS,

            Self::Unknown(v) => v,
        }
    }
}

/// `PvgpuCommandHeader`: 16 bytes, precedes every command payload on the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandHeader {
    pub command_type: u32,
    /// Total size including this header; always a multiple of 16.
    pub command_size: u32,
    pub resource_id: u32,
    pub flags: CommandFlags,
}

impl CommandHeader {
    pub fn new(command_type: u32, command_size: u32, resource_id: u32, flags: CommandFlags) -> Self {
        Self {
            command_type,
            command_size,
            resource_id,
            flags,
        }
    }

    pub fn kind(&self) -> CommandType {
        CommandType::from_u32(self.command_type)
    }

    /// Validates the alignment/minimum-size invariants from `spec.md` §3.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.command_size % crate::consts::COMMAND_ALIGN != 0 {
            return Err(ProtocolError::Misaligned(self.command_size));
        }
        if (self.command_size as usize) < Self::SIZE_BYTES {
            return Err(ProtocolError::CommandTooSmall {
                declared: self.command_size,
                min: Self::SIZE_BYTES as u32,
            });
        }
        Ok(())
    }
}

impl WireStruct for CommandHeader {
    const SIZE_BYTES: usize = 16;

    fn write_le(&self, out: &mut [u8]) -> Result<(), ProtocolError> {
        need(out.len(), Self::SIZE_BYTES)?;
        put_u32(out, 0, self.command_type);
        put_u32(out, 4, self.command_size);
        put_u32(out, 8, self.resource_id);
        put_u32(out, 12, self.flags.bits());
        Ok(())
    }

    fn read_le(buf: &[u8]) -> Result<Self, ProtocolError> {
        need(buf.len(), Self::SIZE_BYTES)?;
        Ok(Self {
            command_type: get_u32(buf, 0),
            command_size: get_u32(buf, 4),
            resource_id: get_u32(buf, 8),
            flags: CommandFlags::from_bits_truncate(get_u32(buf, 12)),
        })
    }
}
