//! Pipeline shadow state (`spec.md` §4.5): every "set" DDI call updates this
//! in addition to emitting its `PVGPU_CMD_SET_*` command. Draw/Dispatch/Clear
//! do *not* re-emit a state prolog — they trust the shadow was already
//! flushed to the ring by prior sets.

use pvgpu_protocol::resource::{PrimitiveTopology, SHADER_STAGE_COUNT};

#[derive(Debug, Clone, Copy, Default)]
pub struct BoundVertexBuffer {
    pub resource_id: u32,
    pub stride: u32,
    pub offset: u32,
}

#[derive(Debug, Clone)]
pub struct PipelineShadow {
    pub render_target: Option<u32>,
    pub depth_stencil_view: Option<u32>,
    pub viewport: Option<(f32, f32, f32, f32, f32, f32)>,
    pub scissor: Option<(i32, i32, i32, i32)>,
    pub blend_state: Option<u32>,
    pub rasterizer_state: Option<u32>,
    pub depth_stencil_state: Option<(u32, u32)>,
    pub input_layout: Option<u32>,
    pub primitive_topology: PrimitiveTopology,
    pub shaders: [Option<u32>; SHADER_STAGE_COUNT],
    pub vertex_buffers: [Option<BoundVertexBuffer>; 16],
    pub index_buffer: Option<(u32, u32, u32)>,
}

impl Default for PipelineShadow {
    fn default() -> Self {
        Self {
            render_target: None,
            depth_stencil_view: None,
            viewport: None,
            scissor: None,
            blend_state: None,
            rasterizer_state: None,
            depth_stencil_state: None,
            input_layout: None,
            primitive_topology: PrimitiveTopology::Undefined,
            shaders: [None; SHADER_STAGE_COUNT],
            vertex_buffers: [None; 16],
            index_buffer: None,
        }
    }
}

impl PipelineShadow {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_shadow_has_no_bindings() {
        let shadow = PipelineShadow::new();
        assert!(shadow.render_target.is_none());
        assert!(shadow.vertex_buffers.iter().all(Option::is_none));
        assert_eq!(shadow.primitive_topology, PrimitiveTopology::Undefined);
    }
}
