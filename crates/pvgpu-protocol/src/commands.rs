//! Fixed-size payloads that follow a [`CommandHeader`](crate::header::CommandHeader)
//! on the ring (`spec.md` §3, §6). Variable-length tails (shader bytecode,
//! `UpdateResource` pixel data, `CreateInputLayout` element descriptors) are
//! not modeled here — callers read them directly out of the ring using
//! `command_size` once the fixed payload has been decoded, the same way the
//! teacher's command processor treats inline data blobs as raw byte ranges
//! rather than typed fields.
//!
//! A few command kinds that only ever carry a resource handle, or a
//! (stage, slot, resource) triple, share one payload type instead of each
//! getting a bespoke one-field struct — `DestroyHandle` stands in for every
//! `Destroy*` command, `CreateViewCommand` for the four view-creation
//! commands, `SetStateCommand` for the handle-only state binds, and
//! `SetStageSlotResourceCommand` for the three per-stage resource binds.

use crate::error::ProtocolError;
use crate::wire::{get_f32, get_i32, get_u32, get_u64, need, put_f32, put_i32, put_u32, put_u64, WireStruct};

macro_rules! impl_wire_struct {
    ($ty:ident, $size:expr, |$s:ident, $out:ident| $write:block, |$buf:ident| $read:block) => {
        impl WireStruct for $ty {
            const SIZE_BYTES: usize = $size;

            fn write_le(&self, $out: &mut [u8]) -> Result<(), ProtocolError> {
                need($out.len(), Self::SIZE_BYTES)?;
                let $s = self;
                $write
                Ok(())
            }

            fn read_le($buf: &[u8]) -> Result<Self, ProtocolError> {
                need($buf.len(), Self::SIZE_BYTES)?;
                Ok($read)
            }
        }
    };
}

// ---------------------------------------------------------------------
// Resource lifecycle
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateResource {
    pub resource_id: u32,
    pub resource_type: u32,
    pub bind_flags: u32,
    pub format: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mip_levels: u32,
    pub array_size: u32,
    pub sample_count: u32,
    pub byte_width: u32,
}

impl_wire_struct!(
    CreateResource,
    44,
    |s, out| {
        put_u32(out, 0, s.resource_id);
        put_u32(out, 4, s.resource_type);
        put_u32(out, 8, s.bind_flags);
        put_u32(out, 12, s.format);
        put_u32(out, 16, s.width);
        put_u32(out, 20, s.height);
        put_u32(out, 24, s.depth);
        put_u32(out, 28, s.mip_levels);
        put_u32(out, 32, s.array_size);
        put_u32(out, 36, s.sample_count);
        put_u32(out, 40, s.byte_width);
    },
    |buf| {
        CreateResource {
            resource_id: get_u32(buf, 0),
            resource_type: get_u32(buf, 4),
            bind_flags: get_u32(buf, 8),
            format: get_u32(buf, 12),
            width: get_u32(buf, 16),
            height: get_u32(buf, 20),
            depth: get_u32(buf, 24),
            mip_levels: get_u32(buf, 28),
            array_size: get_u32(buf, 32),
            sample_count: get_u32(buf, 36),
            byte_width: get_u32(buf, 40),
        }
    }
);

/// Shared by every `Destroy*` command (`spec.md` §6): a single resource handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestroyHandle {
    pub resource_id: u32,
}

impl_wire_struct!(
    DestroyHandle,
    4,
    |s, out| { put_u32(out, 0, s.resource_id); },
    |buf| { DestroyHandle { resource_id: get_u32(buf, 0) } }
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapResource {
    pub resource_id: u32,
    pub map_type: u32,
    pub subresource: u32,
}

impl_wire_struct!(
    MapResource,
    12,
    |s, out| {
        put_u32(out, 0, s.resource_id);
        put_u32(out, 4, s.map_type);
        put_u32(out, 8, s.subresource);
    },
    |buf| {
        MapResource {
            resource_id: get_u32(buf, 0),
            map_type: get_u32(buf, 4),
            subresource: get_u32(buf, 8),
        }
    }
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnmapResource {
    pub resource_id: u32,
    pub subresource: u32,
}

impl_wire_struct!(
    UnmapResource,
    8,
    |s, out| {
        put_u32(out, 0, s.resource_id);
        put_u32(out, 4, s.subresource);
    },
    |buf| {
        UnmapResource {
            resource_id: get_u32(buf, 0),
            subresource: get_u32(buf, 4),
        }
    }
);

/// Fixed header for `UPDATE_RESOURCE`; the updated bytes themselves follow
/// immediately after this struct in the ring, sized by `data_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateResource {
    pub resource_id: u32,
    pub subresource: u32,
    pub dst_x: u32,
    pub dst_y: u32,
    pub dst_z: u32,
    pub row_pitch: u32,
    pub depth_pitch: u32,
    pub data_size: u32,
}

impl_wire_struct!(
    UpdateResource,
    32,
    |s, out| {
        put_u32(out, 0, s.resource_id);
        put_u32(out, 4, s.subresource);
        put_u32(out, 8, s.dst_x);
        put_u32(out, 12, s.dst_y);
        put_u32(out, 16, s.dst_z);
        put_u32(out, 20, s.row_pitch);
        put_u32(out, 24, s.depth_pitch);
        put_u32(out, 28, s.data_size);
    },
    |buf| {
        UpdateResource {
            resource_id: get_u32(buf, 0),
            subresource: get_u32(buf, 4),
            dst_x: get_u32(buf, 8),
            dst_y: get_u32(buf, 12),
            dst_z: get_u32(buf, 16),
            row_pitch: get_u32(buf, 20),
            depth_pitch: get_u32(buf, 24),
            data_size: get_u32(buf, 28),
        }
    }
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyResource {
    pub dst_resource_id: u32,
    pub src_resource_id: u32,
}

impl_wire_struct!(
    CopyResource,
    8,
    |s, out| {
        put_u32(out, 0, s.dst_resource_id);
        put_u32(out, 4, s.src_resource_id);
    },
    |buf| {
        CopyResource {
            dst_resource_id: get_u32(buf, 0),
            src_resource_id: get_u32(buf, 4),
        }
    }
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyResourceRegion {
    pub dst_resource_id: u32,
    pub dst_subresource: u32,
    pub dst_x: u32,
    pub dst_y: u32,
    pub dst_z: u32,
    pub src_resource_id: u32,
    pub src_subresource: u32,
    pub src_x: u32,
    pub src_y: u32,
    pub src_z: u32,
    pub src_width: u32,
    pub src_height: u32,
    pub src_depth: u32,
}

impl_wire_struct!(
    CopyResourceRegion,
    52,
    |s, out| {
        put_u32(out, 0, s.dst_resource_id);
        put_u32(out, 4, s.dst_subresource);
        put_u32(out, 8, s.dst_x);
        put_u32(out, 12, s.dst_y);
        put_u32(out, 16, s.dst_z);
        put_u32(out, 20, s.src_resource_id);
        put_u32(out, 24, s.src_subresource);
        put_u32(out, 28, s.src_x);
        put_u32(out, 32, s.src_y);
        put_u32(out, 36, s.src_z);
        put_u32(out, 40, s.src_width);
        put_u32(out, 44, s.src_height);
        put_u32(out, 48, s.src_depth);
    },
    |buf| {
        CopyResourceRegion {
            dst_resource_id: get_u32(buf, 0),
            dst_subresource: get_u32(buf, 4),
            dst_x: get_u32(buf, 8),
            dst_y: get_u32(buf, 12),
            dst_z: get_u32(buf, 16),
            src_resource_id: get_u32(buf, 20),
            src_subresource: get_u32(buf, 24),
            src_x: get_u32(buf, 28),
            src_y: get_u32(buf, 32),
            src_z: get_u32(buf, 36),
            src_width: get_u32(buf, 40),
            src_height: get_u32(buf, 44),
            src_depth: get_u32(buf, 48),
        }
    }
);

/// Opens a resource shared by another guest context (`spec.md` §6 handle
/// capability notes) by its cross-process shared token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenResource {
    pub resource_id: u32,
    pub shared_token: u64,
}

impl_wire_struct!(
    OpenResource,
    12,
    |s, out| {
        put_u32(out, 0, s.resource_id);
        put_u64(out, 4, s.shared_token);
    },
    |buf| {
        OpenResource {
            resource_id: get_u32(buf, 0),
            shared_token: get_u64(buf, 4),
        }
    }
);

// ---------------------------------------------------------------------
// State object creation
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CreateBlendState {
    pub resource_id: u32,
    pub blend_enable: u32,
    pub src_blend: u32,
    pub dst_blend: u32,
    pub blend_op: u32,
    pub src_blend_alpha: u32,
    pub dst_blend_alpha: u32,
    pub blend_op_alpha: u32,
    pub render_target_write_mask: u32,
}

impl_wire_struct!(
    CreateBlendState,
    36,
    |s, out| {
        put_u32(out, 0, s.resource_id);
        put_u32(out, 4, s.blend_enable);
        put_u32(out, 8, s.src_blend);
        put_u32(out, 12, s.dst_blend);
        put_u32(out, 16, s.blend_op);
        put_u32(out, 20, s.src_blend_alpha);
        put_u32(out, 24, s.dst_blend_alpha);
        put_u32(out, 28, s.blend_op_alpha);
        put_u32(out, 32, s.render_target_write_mask);
    },
    |buf| {
        CreateBlendState {
            resource_id: get_u32(buf, 0),
            blend_enable: get_u32(buf, 4),
            src_blend: get_u32(buf, 8),
            dst_blend: get_u32(buf, 12),
            blend_op: get_u32(buf, 16),
            src_blend_alpha: get_u32(buf, 20),
            dst_blend_alpha: get_u32(buf, 24),
            blend_op_alpha: get_u32(buf, 28),
            render_target_write_mask: get_u32(buf, 32),
        }
    }
);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CreateRasterizerState {
    pub resource_id: u32,
    pub fill_mode: u32,
    pub cull_mode: u32,
    pub front_counter_clockwise: u32,
    pub depth_bias: i32,
    pub depth_bias_clamp: f32,
    pub slope_scaled_depth_bias: f32,
    pub depth_clip_enable: u32,
    pub scissor_enable: u32,
    pub multisample_enable: u32,
    pub antialiased_line_enable: u32,
}

impl_wire_struct!(
    CreateRasterizerState,
    44,
    |s, out| {
        put_u32(out, 0, s.resource_id);
        put_u32(out, 4, s.fill_mode);
        put_u32(out, 8, s.cull_mode);
        put_u32(out, 12, s.front_counter_clockwise);
        put_i32(out, 16, s.depth_bias);
        put_f32(out, 20, s.depth_bias_clamp);
        put_f32(out, 24, s.slope_scaled_depth_bias);
        put_u32(out, 28, s.depth_clip_enable);
        put_u32(out, 32, s.scissor_enable);
        put_u32(out, 36, s.multisample_enable);
        put_u32(out, 40, s.antialiased_line_enable);
    },
    |buf| {
        CreateRasterizerState {
            resource_id: get_u32(buf, 0),
            fill_mode: get_u32(buf, 4),
            cull_mode: get_u32(buf, 8),
            front_counter_clockwise: get_u32(buf, 12),
            depth_bias: get_i32(buf, 16),
            depth_bias_clamp: get_f32(buf, 20),
            slope_scaled_depth_bias: get_f32(buf, 24),
            depth_clip_enable: get_u32(buf, 28),
            scissor_enable: get_u32(buf, 32),
            multisample_enable: get_u32(buf, 36),
            antialiased_line_enable: get_u32(buf, 40),
        }
    }
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateDepthStencilState {
    pub resource_id: u32,
    pub depth_enable: u32,
    pub depth_write_mask: u32,
    pub depth_func: u32,
    pub stencil_enable: u32,
    pub stencil_read_mask: u32,
    pub stencil_write_mask: u32,
}

impl_wire_struct!(
    CreateDepthStencilState,
    28,
    |s, out| {
        put_u32(out, 0, s.resource_id);
        put_u32(out, 4, s.depth_enable);
        put_u32(out, 8, s.depth_write_mask);
        put_u32(out, 12, s.depth_func);
        put_u32(out, 16, s.stencil_enable);
        put_u32(out, 20, s.stencil_read_mask);
        put_u32(out, 24, s.stencil_write_mask);
    },
    |buf| {
        CreateDepthStencilState {
            resource_id: get_u32(buf, 0),
            depth_enable: get_u32(buf, 4),
            depth_write_mask: get_u32(buf, 8),
            depth_func: get_u32(buf, 12),
            stencil_enable: get_u32(buf, 16),
            stencil_read_mask: get_u32(buf, 20),
            stencil_write_mask: get_u32(buf, 24),
        }
    }
);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CreateSamplerState {
    pub resource_id: u32,
    pub filter: u32,
    pub address_u: u32,
    pub address_v: u32,
    pub address_w: u32,
    pub mip_lod_bias: f32,
    pub max_anisotropy: u32,
    pub comparison_func: u32,
    pub min_lod: f32,
    pub max_lod: f32,
}

impl_wire_struct!(
    CreateSamplerState,
    40,
    |s, out| {
        put_u32(out, 0, s.resource_id);
        put_u32(out, 4, s.filter);
        put_u32(out, 8, s.address_u);
        put_u32(out, 12, s.address_v);
        put_u32(out, 16, s.address_w);
        put_f32(out, 20, s.mip_lod_bias);
        put_u32(out, 24, s.max_anisotropy);
        put_u32(out, 28, s.comparison_func);
        put_f32(out, 32, s.min_lod);
        put_f32(out, 36, s.max_lod);
    },
    |buf| {
        CreateSamplerState {
            resource_id: get_u32(buf, 0),
            filter: get_u32(buf, 4),
            address_u: get_u32(buf, 8),
            address_v: get_u32(buf, 12),
            address_w: get_u32(buf, 16),
            mip_lod_bias: get_f32(buf, 20),
            max_anisotropy: get_u32(buf, 24),
            comparison_func: get_u32(buf, 28),
            min_lod: get_f32(buf, 32),
            max_lod: get_f32(buf, 36),
        }
    }
);

/// Element descriptors follow out-of-band, `element_count` of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateInputLayout {
    pub resource_id: u32,
    pub element_count: u32,
    pub shader_id: u32,
}

impl_wire_struct!(
    CreateInputLayout,
    12,
    |s, out| {
        put_u32(out, 0, s.resource_id);
        put_u32(out, 4, s.element_count);
        put_u32(out, 8, s.shader_id);
    },
    |buf| {
        CreateInputLayout {
            resource_id: get_u32(buf, 0),
            element_count: get_u32(buf, 4),
            shader_id: get_u32(buf, 8),
        }
    }
);

/// Shared shape for the four view-creation commands (RTV/DSV/SRV/UAV):
/// a view handle over a subrange of an existing resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateViewCommand {
    pub resource_id: u32,
    pub target_resource_id: u32,
    pub format: u32,
    pub mip_slice: u32,
    pub first_array_slice: u32,
    pub array_size: u32,
}

impl_wire_struct!(
    CreateViewCommand,
    24,
    |s, out| {
        put_u32(out, 0, s.resource_id);
        put_u32(out, 4, s.target_resource_id);
        put_u32(out, 8, s.format);
        put_u32(out, 12, s.mip_slice);
        put_u32(out, 16, s.first_array_slice);
        put_u32(out, 20, s.array_size);
    },
    |buf| {
        CreateViewCommand {
            resource_id: get_u32(buf, 0),
            target_resource_id: get_u32(buf, 4),
            format: get_u32(buf, 8),
            mip_slice: get_u32(buf, 12),
            first_array_slice: get_u32(buf, 16),
            array_size: get_u32(buf, 20),
        }
    }
);

/// Bytecode follows out-of-band, `bytecode_size` bytes of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateShader {
    pub resource_id: u32,
    pub stage: u32,
    pub bytecode_size: u32,
}

impl_wire_struct!(
    CreateShader,
    12,
    |s, out| {
        put_u32(out, 0, s.resource_id);
        put_u32(out, 4, s.stage);
        put_u32(out, 8, s.bytecode_size);
    },
    |buf| {
        CreateShader {
            resource_id: get_u32(buf, 0),
            stage: get_u32(buf, 4),
            bytecode_size: get_u32(buf, 8),
        }
    }
);

// ---------------------------------------------------------------------
// Pipeline state binds
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetRenderTarget {
    pub rtv_resource_id: u32,
    pub dsv_resource_id: u32,
}

impl_wire_struct!(
    SetRenderTarget,
    8,
    |s, out| {
        put_u32(out, 0, s.rtv_resource_id);
        put_u32(out, 4, s.dsv_resource_id);
    },
    |buf| {
        SetRenderTarget {
            rtv_resource_id: get_u32(buf, 0),
            dsv_resource_id: get_u32(buf, 4),
        }
    }
);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetViewport {
    pub top_left_x: f32,
    pub top_left_y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl_wire_struct!(
    SetViewport,
    24,
    |s, out| {
        put_f32(out, 0, s.top_left_x);
        put_f32(out, 4, s.top_left_y);
        put_f32(out, 8, s.width);
        put_f32(out, 12, s.height);
        put_f32(out, 16, s.min_depth);
        put_f32(out, 20, s.max_depth);
    },
    |buf| {
        SetViewport {
            top_left_x: get_f32(buf, 0),
            top_left_y: get_f32(buf, 4),
            width: get_f32(buf, 8),
            height: get_f32(buf, 12),
            min_depth: get_f32(buf, 16),
            max_depth: get_f32(buf, 20),
        }
    }
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetScissor {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl_wire_struct!(
    SetScissor,
    16,
    |s, out| {
        put_i32(out, 0, s.left);
        put_i32(out, 4, s.top);
        put_i32(out, 8, s.right);
        put_i32(out, 12, s.bottom);
    },
    |buf| {
        SetScissor {
            left: get_i32(buf, 0),
            top: get_i32(buf, 4),
            right: get_i32(buf, 8),
            bottom: get_i32(buf, 12),
        }
    }
);

/// Shared by every state bind that only needs a handle: `SET_BLEND_STATE`,
/// `SET_RASTERIZER_STATE`, `SET_INPUT_LAYOUT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetStateCommand {
    pub resource_id: u32,
}

impl_wire_struct!(
    SetStateCommand,
    4,
    |s, out| { put_u32(out, 0, s.resource_id); },
    |buf| { SetStateCommand { resource_id: get_u32(buf, 0) } }
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetDepthStencil {
    pub resource_id: u32,
    pub stencil_ref: u32,
}

impl_wire_struct!(
    SetDepthStencil,
    8,
    |s, out| {
        put_u32(out, 0, s.resource_id);
        put_u32(out, 4, s.stencil_ref);
    },
    |buf| {
        SetDepthStencil {
            resource_id: get_u32(buf, 0),
            stencil_ref: get_u32(buf, 4),
        }
    }
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetShader {
    pub stage: u32,
    pub resource_id: u32,
}

impl_wire_struct!(
    SetShader,
    8,
    |s, out| {
        put_u32(out, 0, s.stage);
        put_u32(out, 4, s.resource_id);
    },
    |buf| {
        SetShader {
            stage: get_u32(buf, 0),
            resource_id: get_u32(buf, 4),
        }
    }
);

/// Shared by `SET_SAMPLER`, `SET_CONSTANT_BUFFER`, `SET_SHADER_RESOURCE`:
/// bind a resource to a (stage, slot) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetStageSlotResourceCommand {
    pub stage: u32,
    pub slot: u32,
    pub resource_id: u32,
}

impl_wire_struct!(
    SetStageSlotResourceCommand,
    12,
    |s, out| {
        put_u32(out, 0, s.stage);
        put_u32(out, 4, s.slot);
        put_u32(out, 8, s.resource_id);
    },
    |buf| {
        SetStageSlotResourceCommand {
            stage: get_u32(buf, 0),
            slot: get_u32(buf, 4),
            resource_id: get_u32(buf, 8),
        }
    }
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetVertexBuffer {
    pub slot: u32,
    pub resource_id: u32,
    pub stride: u32,
    pub offset: u32,
}

impl_wire_struct!(
    SetVertexBuffer,
    16,
    |s, out| {
        put_u32(out, 0, s.slot);
        put_u32(out, 4, s.resource_id);
        put_u32(out, 8, s.stride);
        put_u32(out, 12, s.offset);
    },
    |buf| {
        SetVertexBuffer {
            slot: get_u32(buf, 0),
            resource_id: get_u32(buf, 4),
            stride: get_u32(buf, 8),
            offset: get_u32(buf, 12),
        }
    }
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetIndexBuffer {
    pub resource_id: u32,
    pub format: u32,
    pub offset: u32,
}

impl_wire_struct!(
    SetIndexBuffer,
    12,
    |s, out| {
        put_u32(out, 0, s.resource_id);
        put_u32(out, 4, s.format);
        put_u32(out, 8, s.offset);
    },
    |buf| {
        SetIndexBuffer {
            resource_id: get_u32(buf, 0),
            format: get_u32(buf, 4),
            offset: get_u32(buf, 8),
        }
    }
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetPrimitiveTopology {
    pub topology: u32,
}

impl_wire_struct!(
    SetPrimitiveTopology,
    4,
    |s, out| { put_u32(out, 0, s.topology); },
    |buf| { SetPrimitiveTopology { topology: get_u32(buf, 0) } }
);

// ---------------------------------------------------------------------
// Draw / dispatch / clear
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Draw {
    pub vertex_count: u32,
    pub start_vertex_location: u32,
}

impl_wire_struct!(
    Draw,
    8,
    |s, out| {
        put_u32(out, 0, s.vertex_count);
        put_u32(out, 4, s.start_vertex_location);
    },
    |buf| {
        Draw {
            vertex_count: get_u32(buf, 0),
            start_vertex_location: get_u32(buf, 4),
        }
    }
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawIndexed {
    pub index_count: u32,
    pub start_index_location: u32,
    pub base_vertex_location: i32,
}

impl_wire_struct!(
    DrawIndexed,
    12,
    |s, out| {
        put_u32(out, 0, s.index_count);
        put_u32(out, 4, s.start_index_location);
        put_i32(out, 8, s.base_vertex_location);
    },
    |buf| {
        DrawIndexed {
            index_count: get_u32(buf, 0),
            start_index_location: get_u32(buf, 4),
            base_vertex_location: get_i32(buf, 8),
        }
    }
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawInstanced {
    pub vertex_count_per_instance: u32,
    pub instance_count: u32,
    pub start_vertex_location: u32,
    pub start_instance_location: u32,
}

impl_wire_struct!(
    DrawInstanced,
    16,
    |s, out| {
        put_u32(out, 0, s.vertex_count_per_instance);
        put_u32(out, 4, s.instance_count);
        put_u32(out, 8, s.start_vertex_location);
        put_u32(out, 12, s.start_instance_location);
    },
    |buf| {
        DrawInstanced {
            vertex_count_per_instance: get_u32(buf, 0),
            instance_count: get_u32(buf, 4),
            start_vertex_location: get_u32(buf, 8),
            start_instance_location: get_u32(buf, 12),
        }
    }
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawIndexedInstanced {
    pub index_count_per_instance: u32,
    pub instance_count: u32,
    pub start_index_location: u32,
    pub base_vertex_location: i32,
    pub start_instance_location: u32,
}

impl_wire_struct!(
    DrawIndexedInstanced,
    20,
    |s, out| {
        put_u32(out, 0, s.index_count_per_instance);
        put_u32(out, 4, s.instance_count);
        put_u32(out, 8, s.start_index_location);
        put_i32(out, 12, s.base_vertex_location);
        put_u32(out, 16, s.start_instance_location);
    },
    |buf| {
        DrawIndexedInstanced {
            index_count_per_instance: get_u32(buf, 0),
            instance_count: get_u32(buf, 4),
            start_index_location: get_u32(buf, 8),
            base_vertex_location: get_i32(buf, 12),
            start_instance_location: get_u32(buf, 16),
        }
    }
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch {
    pub thread_group_count_x: u32,
    pub thread_group_count_y: u32,
    pub thread_group_count_z: u32,
}

impl_wire_struct!(
    Dispatch,
    12,
    |s, out| {
        put_u32(out, 0, s.thread_group_count_x);
        put_u32(out, 4, s.thread_group_count_y);
        put_u32(out, 8, s.thread_group_count_z);
    },
    |buf| {
        Dispatch {
            thread_group_count_x: get_u32(buf, 0),
            thread_group_count_y: get_u32(buf, 4),
            thread_group_count_z: get_u32(buf, 8),
        }
    }
);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearRenderTarget {
    pub resource_id: u32,
    pub color: [f32; 4],
}

impl_wire_struct!(
    ClearRenderTarget,
    20,
    |s, out| {
        put_u32(out, 0, s.resource_id);
        put_f32(out, 4, s.color[0]);
        put_f32(out, 8, s.color[1]);
        put_f32(out, 12, s.color[2]);
        put_f32(out, 16, s.color[3]);
    },
    |buf| {
        ClearRenderTarget {
            resource_id: get_u32(buf, 0),
            color: [
                get_f32(buf, 4),
                get_f32(buf, 8),
                get_f32(buf, 12),
                get_f32(buf, 16),
            ],
        }
    }
);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearDepthStencil {
    pub resource_id: u32,
    pub flags: u32,
    pub depth: f32,
    pub stencil: u32,
}

impl_wire_struct!(
    ClearDepthStencil,
    16,
    |s, out| {
        put_u32(out, 0, s.resource_id);
        put_u32(out, 4, s.flags);
        put_f32(out, 8, s.depth);
        put_u32(out, 12, s.stencil);
    },
    |buf| {
        ClearDepthStencil {
            resource_id: get_u32(buf, 0),
            flags: get_u32(buf, 4),
            depth: get_f32(buf, 8),
            stencil: get_u32(buf, 12),
        }
    }
);

// ---------------------------------------------------------------------
// Sync
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fence {
    pub fence_value: u64,
}

impl_wire_struct!(
    Fence,
    8,
    |s, out| { put_u64(out, 0, s.fence_value); },
    |buf| { Fence { fence_value: get_u64(buf, 0) } }
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Present {
    pub sync_interval: u32,
    pub flags: u32,
}

impl_wire_struct!(
    Present,
    8,
    |s, out| {
        put_u32(out, 0, s.sync_interval);
        put_u32(out, 4, s.flags);
    },
    |buf| {
        Present {
            sync_interval: get_u32(buf, 0),
            flags: get_u32(buf, 4),
        }
    }
);

/// `FLUSH` carries no payload: a header with `command_size == CommandHeader::SIZE_BYTES` suffices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flush;

impl WireStruct for Flush {
    const SIZE_BYTES: usize = 0;

    fn write_le(&self, _out: &mut [u8]) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn read_le(_buf: &[u8]) -> Result<Self, ProtocolError> {
        Ok(Flush)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitFence {
    pub fence_value: u64,
}

impl_wire_struct!(
    WaitFence,
    8,
    |s, out| { put_u64(out, 0, s.fence_value); },
    |buf| { WaitFence { fence_value: get_u64(buf, 0) } }
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeBuffers {
    pub width: u32,
    pub height: u32,
    pub format: u32,
    pub buffer_count: u32,
}

impl_wire_struct!(
    ResizeBuffers,
    16,
    |s, out| {
        put_u32(out, 0, s.width);
        put_u32(out, 4, s.height);
        put_u32(out, 8, s.format);
        put_u32(out, 12, s.buffer_count);
    },
    |buf| {
        ResizeBuffers {
            width: get_u32(buf, 0),
            height: get_u32(buf, 4),
            format: get_u32(buf, 8),
            buffer_count: get_u32(buf, 12),
        }
    }
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_resource_roundtrip() {
        let c = CreateResource {
            resource_id: 1,
            resource_type: 2,
            bind_flags: 0x18,
            format: 87,
            width: 1920,
            height: 1080,
            depth: 1,
            mip_levels: 1,
            array_size: 1,
            sample_count: 1,
            byte_width: 0,
        };
        let bytes = c.to_bytes();
        assert_eq!(bytes.len(), CreateResource::SIZE_BYTES);
        assert_eq!(CreateResource::read_le(&bytes).unwrap(), c);
    }

    #[test]
    fn copy_resource_region_roundtrip() {
        let c = CopyResourceRegion {
            dst_resource_id: 1,
            dst_subresource: 0,
            dst_x: 4,
            dst_y: 8,
            dst_z: 0,
            src_resource_id: 2,
            src_subresource: 0,
            src_x: 0,
            src_y: 0,
            src_z: 0,
            src_width: 64,
            src_height: 64,
            src_depth: 1,
        };
        let bytes = c.to_bytes();
        assert_eq!(CopyResourceRegion::read_le(&bytes).unwrap(), c);
    }

    #[test]
    fn flush_is_zero_sized() {
        assert_eq!(Flush::SIZE_BYTES, 0);
        let bytes = Flush.to_bytes();
        assert!(bytes.is_empty());
        assert_eq!(Flush::read_le(&[]).unwrap(), Flush);
    }

    #[test]
    fn clear_render_target_roundtrip() {
        let c = ClearRenderTarget {
            resource_id: 3,
            color: [0.1, 0.2, 0.3, 1.0],
        };
        let bytes = c.to_bytes();
        assert_eq!(ClearRenderTarget::read_le(&bytes).unwrap(), c);
    }

    #[test]
    fn buffer_too_small_is_rejected() {
        let short = [0u8; 4];
        assert!(matches!(
            CopyResource::read_le(&short),
            Err(ProtocolError::BufferTooSmall { .. })
        ));
    }
}
