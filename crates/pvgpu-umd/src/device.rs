//! The guest user-mode driver's device object (`spec.md` §4.5): DDI calls
//! land here, update the pipeline shadow, and stage commands for the ring.
//!
//! Mirrors the teacher's split between a thin DDI-facing object and the
//! actual command encoding living in small, independently testable modules
//! ([`crate::staging`], [`crate::shadow`], [`crate::resource`]) rather than
//! one monolithic `impl` — the same shape as the miniport's `Miniport`
//! delegating to `escape::dispatch`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use pvgpu_protocol::commands::{
    ClearDepthStencil, ClearRenderTarget, CreateResource, DestroyHandle, Dispatch, Draw, DrawIndexed,
    DrawIndexedInstanced, DrawInstanced, Fence, MapResource, Present, SetDepthStencil, SetIndexBuffer,
    SetPrimitiveTopology, SetRenderTarget, SetScissor, SetShader, SetStageSlotResourceCommand, SetStateCommand,
    SetVertexBuffer, SetViewport, UnmapResource,
};
use pvgpu_protocol::escape::{
    AllocHeapRequest, AllocHeapResponse, CapsResponse, EscapeCode, FreeHeapRequest, WaitFenceRequest, WaitFenceResponse,
};
use pvgpu_protocol::header::{CommandFlags, CommandType};
use pvgpu_protocol::resource::{BindFlags, ClearFlags, DxgiFormat, MapType, PrimitiveTopology, ResourceType, ShaderStage};
use pvgpu_protocol::wire::WireStruct;

use crate::caps::{format_support, FormatSupport};
use crate::error::UmdError;
use crate::escape_client::EscapeClient;
use crate::handles::HandleAllocator;
use crate::resource::ResourceRecord;
use crate::shadow::{BoundVertexBuffer, PipelineShadow};
use crate::staging::{StagingBuffer, DEFAULT_STAGING_CAPACITY};

/// Result of a successful `Map`: a heap byte range the backend has (for
/// read maps) already copied the resource's current contents into. The
/// actual `heap_base + heap_offset` pointer arithmetic happens one layer up,
/// wherever the heap region is mapped into this process's address space.
#[derive(Debug, Clone, Copy)]
pub struct MappedRegion {
    pub heap_offset: u32,
    pub size: u32,
    pub row_pitch: u32,
    pub depth_pitch: u32,
}

struct State {
    staging: StagingBuffer,
    shadow: PipelineShadow,
    resources: HashMap<u32, ResourceRecord>,
}

pub struct Device {
    client: Option<Arc<dyn EscapeClient>>,
    state: Mutex<State>,
    handles: HandleAllocator,
    fence_counter: AtomicU64,
    present_fence: Mutex<Option<u64>>,
}

impl Device {
    pub fn new(client: Arc<dyn EscapeClient>) -> Self {
        Self::with_client(Some(client))
    }

    /// Constructs a driver instance that never obtained shared memory
    /// (`spec.md` §4.5 flush fallback): it remains fully callable, but every
    /// flush silently discards its batch.
    pub fn new_detached() -> Self {
        Self::with_client(None)
    }

    fn with_client(client: Option<Arc<dyn EscapeClient>>) -> Self {
        Self {
            client,
            state: Mutex::new(State {
                staging: StagingBuffer::new(DEFAULT_STAGING_CAPACITY),
                shadow: PipelineShadow::new(),
                resources: HashMap::new(),
            }),
            handles: HandleAllocator::new(),
            fence_counter: AtomicU64::new(0),
            present_fence: Mutex::new(None),
        }
    }

    fn client_ref(&self) -> Option<&dyn EscapeClient> {
        self.client.as_deref()
    }

    fn next_fence(&self) -> u64 {
        self.fence_counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn wait_fence(&self, fence_value: u64, timeout_ms: u32) -> Result<(), UmdError> {
        let Some(client) = &self.client else {
            return Ok(());
        };
        let req = WaitFenceRequest { fence_value, timeout_ms };
        let bytes = client.call(EscapeCode::WaitFence, &req.to_bytes(), None)?;
        let resp = WaitFenceResponse::read_le(&bytes)?;
        if resp.is_completed() {
            Ok(())
        } else {
            Err(UmdError::Timeout { timeout_ms })
        }
    }

    // -----------------------------------------------------------------
    // Resource lifecycle
    // -----------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub fn create_resource(
        &self,
        resource_type: ResourceType,
        format: DxgiFormat,
        bind_flags: BindFlags,
        width: u32,
        height: u32,
        depth: u32,
        mip_levels: u32,
        array_size: u32,
        sample_count: u32,
        byte_width: u32,
    ) -> Result<u32, UmdError> {
        let handle = self.handles.alloc();
        let cmd = CreateResource {
            resource_id: handle,
            resource_type: resource_type as u32,
            bind_flags: bind_flags.bits(),
            format: format as u32,
            width,
            height,
            depth,
            mip_levels,
            array_size,
            sample_count,
            byte_width,
        };
        let mut state = self.state.lock().unwrap();
        state
            .staging
            .write_command(self.client_ref(), CommandType::CREATE_RESOURCE, handle, CommandFlags::empty(), &cmd.to_bytes())?;
        state.resources.insert(
            handle,
            ResourceRecord {
                resource_type,
                format,
                width,
                height,
                depth,
                byte_width,
            },
        );
        Ok(handle)
    }

    pub fn destroy_resource(&self, handle: u32) -> Result<(), UmdError> {
        let mut state = self.state.lock().unwrap();
        if state.resources.remove(&handle).is_none() {
            return Err(UmdError::ResourceNotFound(handle));
        }
        let cmd = DestroyHandle { resource_id: handle };
        state
            .staging
            .write_command(self.client_ref(), CommandType::DESTROY_RESOURCE, handle, CommandFlags::empty(), &cmd.to_bytes())
    }

    // -----------------------------------------------------------------
    // Pipeline state sets — each updates the shadow and emits its command.
    // -----------------------------------------------------------------

    pub fn set_render_target(&self, rtv: Option<u32>, dsv: Option<u32>) -> Result<(), UmdError> {
        let mut state = self.state.lock().unwrap();
        state.shadow.render_target = rtv;
        state.shadow.depth_stencil_view = dsv;
        let cmd = SetRenderTarget {
            rtv_resource_id: rtv.unwrap_or(0),
            dsv_resource_id: dsv.unwrap_or(0),
        };
        state
            .staging
            .write_command(self.client_ref(), CommandType::SET_RENDER_TARGET, 0, CommandFlags::empty(), &cmd.to_bytes())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_viewport(&self, x: f32, y: f32, w: f32, h: f32, min_depth: f32, max_depth: f32) -> Result<(), UmdError> {
        let mut state = self.state.lock().unwrap();
        state.shadow.viewport = Some((x, y, w, h, min_depth, max_depth));
        let cmd = SetViewport {
            top_left_x: x,
            top_left_y: y,
            width: w,
            height: h,
            min_depth,
            max_depth,
        };
        state
            .staging
            .write_command(self.client_ref(), CommandType::SET_VIEWPORT, 0, CommandFlags::empty(), &cmd.to_bytes())
    }

    pub fn set_scissor(&self, left: i32, top: i32, right: i32, bottom: i32) -> Result<(), UmdError> {
        let mut state = self.state.lock().unwrap();
        state.shadow.scissor = Some((left, top, right, bottom));
        let cmd = SetScissor { left, top, right, bottom };
        state
            .staging
            .write_command(self.client_ref(), CommandType::SET_SCISSOR, 0, CommandFlags::empty(), &cmd.to_bytes())
    }

    pub fn set_blend_state(&self, handle: u32) -> Result<(), UmdError> {
        let mut state = self.state.lock().unwrap();
        state.shadow.blend_state = Some(handle);
        let cmd = SetStateCommand { resource_id: handle };
        state
            .staging
            .write_command(self.client_ref(), CommandType::SET_BLEND_STATE, handle, CommandFlags::empty(), &cmd.to_bytes())
    }

    pub fn set_rasterizer_state(&self, handle: u32) -> Result<(), UmdError> {
        let mut state = self.state.lock().unwrap();
        state.shadow.rasterizer_state = Some(handle);
        let cmd = SetStateCommand { resource_id: handle };
        state.staging.write_command(
            self.client_ref(),
            CommandType::SET_RASTERIZER_STATE,
            handle,
            CommandFlags::empty(),
            &cmd.to_bytes(),
        )
    }

    pub fn set_depth_stencil(&self, handle: u32, stencil_ref: u32) -> Result<(), UmdError> {
        let mut state = self.state.lock().unwrap();
        state.shadow.depth_stencil_state = Some((handle, stencil_ref));
        let cmd = SetDepthStencil {
            resource_id: handle,
            stencil_ref,
        };
        state
            .staging
            .write_command(self.client_ref(), CommandType::SET_DEPTH_STENCIL, handle, CommandFlags::empty(), &cmd.to_bytes())
    }

    pub fn set_input_layout(&self, handle: u32) -> Result<(), UmdError> {
        let mut state = self.state.lock().unwrap();
        state.shadow.input_layout = Some(handle);
        let cmd = SetStateCommand { resource_id: handle };
        state
            .staging
            .write_command(self.client_ref(), CommandType::SET_INPUT_LAYOUT, handle, CommandFlags::empty(), &cmd.to_bytes())
    }

    pub fn set_shader(&self, stage: ShaderStage, handle: u32) -> Result<(), UmdError> {
        let mut state = self.state.lock().unwrap();
        state.shadow.shaders[stage as usize] = Some(handle);
        let cmd = SetShader {
            stage: stage as u32,
            resource_id: handle,
        };
        state
            .staging
            .write_command(self.client_ref(), CommandType::SET_SHADER, handle, CommandFlags::empty(), &cmd.to_bytes())
    }

    pub fn set_sampler(&self, stage: ShaderStage, slot: u32, handle: u32) -> Result<(), UmdError> {
        self.set_stage_slot(CommandType::SET_SAMPLER, stage, slot, handle)
    }

    pub fn set_constant_buffer(&self, stage: ShaderStage, slot: u32, handle: u32) -> Result<(), UmdError> {
        self.set_stage_slot(CommandType::SET_CONSTANT_BUFFER, stage, slot, handle)
    }

    pub fn set_shader_resource(&self, stage: ShaderStage, slot: u32, handle: u32) -> Result<(), UmdError> {
        self.set_stage_slot(CommandType::SET_SHADER_RESOURCE, stage, slot, handle)
    }

    fn set_stage_slot(&self, command_type: u32, stage: ShaderStage, slot: u32, handle: u32) -> Result<(), UmdError> {
        let cmd = SetStageSlotResourceCommand {
            stage: stage as u32,
            slot,
            resource_id: handle,
        };
        let mut state = self.state.lock().unwrap();
        state
            .staging
            .write_command(self.client_ref(), command_type, handle, CommandFlags::empty(), &cmd.to_bytes())
    }

    pub fn set_vertex_buffer(&self, slot: u32, handle: u32, stride: u32, offset: u32) -> Result<(), UmdError> {
        let mut state = self.state.lock().unwrap();
        if let Some(slot_ref) = state.shadow.vertex_buffers.get_mut(slot as usize) {
            *slot_ref = Some(BoundVertexBuffer {
                resource_id: handle,
                stride,
                offset,
            });
        }
        let cmd = SetVertexBuffer {
            slot,
            resource_id: handle,
            stride,
            offset,
        };
        state
            .staging
            .write_command(self.client_ref(), CommandType::SET_VERTEX_BUFFER, handle, CommandFlags::empty(), &cmd.to_bytes())
    }

    pub fn set_index_buffer(&self, handle: u32, format: u32, offset: u32) -> Result<(), UmdError> {
        let mut state = self.state.lock().unwrap();
        state.shadow.index_buffer = Some((handle, format, offset));
        let cmd = SetIndexBuffer {
            resource_id: handle,
            format,
            offset,
        };
        state
            .staging
            .write_command(self.client_ref(), CommandType::SET_INDEX_BUFFER, handle, CommandFlags::empty(), &cmd.to_bytes())
    }

    pub fn set_primitive_topology(&self, topology: PrimitiveTopology) -> Result<(), UmdError> {
        let mut state = self.state.lock().unwrap();
        state.shadow.primitive_topology = topology;
        let cmd = SetPrimitiveTopology {
            topology: topology as u32,
        };
        state.staging.write_command(
            self.client_ref(),
            CommandType::SET_PRIMITIVE_TOPOLOGY,
            0,
            CommandFlags::empty(),
            &cmd.to_bytes(),
        )
    }

    // -----------------------------------------------------------------
    // Draw / dispatch / clear — no state prolog; rely on prior sets.
    // -----------------------------------------------------------------

    pub fn draw(&self, vertex_count: u32, start_vertex_location: u32) -> Result<(), UmdError> {
        let cmd = Draw {
            vertex_count,
            start_vertex_location,
        };
        self.stage(CommandType::DRAW, 0, &cmd.to_bytes())
    }

    pub fn draw_indexed(&self, index_count: u32, start_index_location: u32, base_vertex_location: i32) -> Result<(), UmdError> {
        let cmd = DrawIndexed {
            index_count,
            start_index_location,
            base_vertex_location,
        };
        self.stage(CommandType::DRAW_INDEXED, 0, &cmd.to_bytes())
    }

    pub fn draw_instanced(
        &self,
        vertex_count_per_instance: u32,
        instance_count: u32,
        start_vertex_location: u32,
        start_instance_location: u32,
    ) -> Result<(), UmdError> {
        let cmd = DrawInstanced {
            vertex_count_per_instance,
            instance_count,
            start_vertex_location,
            start_instance_location,
        };
        self.stage(CommandType::DRAW_INSTANCED, 0, &cmd.to_bytes())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn draw_indexed_instanced(
        &self,
        index_count_per_instance: u32,
        instance_count: u32,
        start_index_location: u32,
        base_vertex_location: i32,
        start_instance_location: u32,
    ) -> Result<(), UmdError> {
        let cmd = DrawIndexedInstanced {
            index_count_per_instance,
            instance_count,
            start_index_location,
            base_vertex_location,
            start_instance_location,
        };
        self.stage(CommandType::DRAW_INDEXED_INSTANCED, 0, &cmd.to_bytes())
    }

    pub fn dispatch(&self, x: u32, y: u32, z: u32) -> Result<(), UmdError> {
        let cmd = Dispatch {
            thread_group_count_x: x,
            thread_group_count_y: y,
            thread_group_count_z: z,
        };
        self.stage(CommandType::DISPATCH, 0, &cmd.to_bytes())
    }

    pub fn clear_render_target(&self, handle: u32, color: [f32; 4]) -> Result<(), UmdError> {
        let cmd = ClearRenderTarget { resource_id: handle, color };
        self.stage(CommandType::CLEAR_RENDER_TARGET, handle, &cmd.to_bytes())
    }

    pub fn clear_depth_stencil(&self, handle: u32, flags: ClearFlags, depth: f32, stencil: u32) -> Result<(), UmdError> {
        let cmd = ClearDepthStencil {
            resource_id: handle,
            flags: flags.bits(),
            depth,
            stencil,
        };
        self.stage(CommandType::CLEAR_DEPTH_STENCIL, handle, &cmd.to_bytes())
    }

    fn stage(&self, command_type: u32, resource_id: u32, payload: &[u8]) -> Result<(), UmdError> {
        let mut state = self.state.lock().unwrap();
        state
            .staging
            .write_command(self.client_ref(), command_type, resource_id, CommandFlags::empty(), payload)
    }

    // -----------------------------------------------------------------
    // Sync
    // -----------------------------------------------------------------

    /// `Flush`: reserves a fence value and pushes every staged command.
    pub fn flush(&self) -> Result<u64, UmdError> {
        let fence = self.next_fence();
        let mut state = self.state.lock().unwrap();
        state.staging.flush(self.client_ref(), fence)?;
        Ok(fence)
    }

    // -----------------------------------------------------------------
    // Map / Unmap (`spec.md` §4.5)
    // -----------------------------------------------------------------

    pub fn map(&self, handle: u32, subresource: u32, map_type: MapType) -> Result<MappedRegion, UmdError> {
        let layout = {
            let state = self.state.lock().unwrap();
            let record = state.resources.get(&handle).copied().ok_or(UmdError::ResourceNotFound(handle))?;
            record.map_layout()
        };

        let heap_offset = match &self.client {
            Some(client) => {
                let req = AllocHeapRequest {
                    size: layout.size.max(1),
                    align: 256,
                };
                let bytes = client.call(EscapeCode::AllocHeap, &req.to_bytes(), None)?;
                let resp = AllocHeapResponse::read_le(&bytes)?;
                if resp.is_failure() {
                    return Err(UmdError::HeapExhausted { size: layout.size });
                }
                resp.offset
            }
            None => 0,
        };

        let map_cmd = MapResource {
            resource_id: handle,
            map_type: map_type as u32,
            subresource,
        };
        let mut fence_value = None;
        {
            let mut state = self.state.lock().unwrap();
            state
                .staging
                .write_command(self.client_ref(), CommandType::MAP_RESOURCE, handle, CommandFlags::empty(), &map_cmd.to_bytes())?;

            if map_type.is_read() {
                // Turns the map into a synchronous round-trip: the backend
                // must have copied the resource's contents into the heap
                // range before this call returns (`spec.md` §4.5).
                let fence = self.next_fence();
                let fence_cmd = Fence { fence_value: fence };
                state
                    .staging
                    .write_command(self.client_ref(), CommandType::FENCE, 0, CommandFlags::empty(), &fence_cmd.to_bytes())?;
                state.staging.flush(self.client_ref(), fence)?;
                fence_value = Some(fence);
            } else {
                state.staging.flush(self.client_ref(), 0)?;
            }
        }

        if let Some(fence) = fence_value {
            self.wait_fence(fence, 5_000)?;
        }

        Ok(MappedRegion {
            heap_offset,
            size: layout.size,
            row_pitch: layout.row_pitch,
            depth_pitch: layout.depth_pitch,
        })
    }

    pub fn unmap(&self, handle: u32, subresource: u32, heap_offset: u32) -> Result<(), UmdError> {
        {
            let state = self.state.lock().unwrap();
            if !state.resources.contains_key(&handle) {
                return Err(UmdError::ResourceNotFound(handle));
            }
        }
        let cmd = UnmapResource {
            resource_id: handle,
            subresource,
        };
        {
            let mut state = self.state.lock().unwrap();
            state
                .staging
                .write_command(self.client_ref(), CommandType::UNMAP_RESOURCE, handle, CommandFlags::empty(), &cmd.to_bytes())?;
            // Flush so the backend copies any writes back before the heap
            // space underneath them is reclaimed.
            state.staging.flush(self.client_ref(), 0)?;
        }
        if let Some(client) = &self.client {
            let free_req = FreeHeapRequest { offset: heap_offset };
            client.call(EscapeCode::FreeHeap, &free_req.to_bytes(), None)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Present pacing (`spec.md` §4.5 "double-buffered fence")
    // -----------------------------------------------------------------

    pub fn present(&self, sync_interval: u32, flags: u32) -> Result<(), UmdError> {
        let previous_fence = *self.present_fence.lock().unwrap();
        if sync_interval != 0 {
            if let Some(prev_fence) = previous_fence {
                let hint = self.client.as_ref().map(|c| c.fence_completed_hint()).unwrap_or(u64::MAX);
                if hint < prev_fence {
                    self.wait_fence(prev_fence, 100)?;
                }
            }
        }

        let fence = self.next_fence();
        {
            let mut state = self.state.lock().unwrap();
            let present_cmd = Present { sync_interval, flags };
            state
                .staging
                .write_command(self.client_ref(), CommandType::PRESENT, 0, CommandFlags::empty(), &present_cmd.to_bytes())?;
            let fence_cmd = Fence { fence_value: fence };
            state
                .staging
                .write_command(self.client_ref(), CommandType::FENCE, 0, CommandFlags::empty(), &fence_cmd.to_bytes())?;
            state.staging.flush(self.client_ref(), fence)?;
        }
        *self.present_fence.lock().unwrap() = Some(fence);
        Ok(())
    }

    // -----------------------------------------------------------------
    // Capabilities (`spec.md` §4.6)
    // -----------------------------------------------------------------

    pub fn get_caps(&self) -> Result<CapsResponse, UmdError> {
        match &self.client {
            Some(client) => {
                let bytes = client.call(EscapeCode::GetCaps, &[], None)?;
                Ok(CapsResponse::read_le(&bytes)?)
            }
            None => Ok(CapsResponse {
                features: 0,
                max_texture_dimension: 0,
                max_render_targets: 0,
                max_vertex_buffers: 0,
                max_constant_buffers: 0,
            }),
        }
    }

    pub fn query_format_support(&self, format: DxgiFormat) -> FormatSupport {
        format_support(format)
    }
}
