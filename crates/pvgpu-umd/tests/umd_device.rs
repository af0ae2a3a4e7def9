//! Drives `pvgpu-umd::Device` against a real `pvgpu-miniport::Miniport`
//! backed by an in-process `PvgpuDevice`, the same three-layer stack a real
//! guest process would have minus the VMM (`spec.md` §4.5, §8).

use std::sync::atomic::Ordering;
use std::sync::Arc;

use pvgpu_emulator::{CountingIrqSink, PvgpuDevice};
use pvgpu_miniport::bar0::Bar0Port;
use pvgpu_miniport::Miniport;
use pvgpu_protocol::consts::MIN_SHMEM_SIZE;
use pvgpu_protocol::header::CommandType;
use pvgpu_protocol::resource::{BindFlags, DxgiFormat, MapType, ResourceType};
use pvgpu_shmem::ring::CommandRing;
use pvgpu_umd::{Device, MiniportEscapeClient};

struct DeviceBar0(Arc<PvgpuDevice>);

impl Bar0Port for DeviceBar0 {
    fn read(&self, offset: u64) -> u32 {
        self.0.read_bar0(offset)
    }

    fn write(&self, offset: u64, val: u32) {
        self.0.write_bar0(offset, val)
    }
}

fn setup() -> (Arc<PvgpuDevice>, Device) {
    let sink = Arc::new(CountingIrqSink::default());
    let backend = Arc::new(PvgpuDevice::realize_with_vec_region(MIN_SHMEM_SIZE, sink).unwrap());
    let bar0 = Arc::new(DeviceBar0(backend.clone()));
    let miniport = Arc::new(Miniport::attach(backend.region_arc(), bar0).unwrap());
    let client = Arc::new(MiniportEscapeClient::new(miniport));
    let umd = Device::new(client);
    (backend, umd)
}

fn ring<'a>(backend: &'a PvgpuDevice) -> CommandRing<'a> {
    let control = backend.control();
    CommandRing::new(
        backend.region(),
        control,
        control.ring_offset.load(Ordering::Relaxed),
        backend.ring_size(),
    )
    .unwrap()
}

#[test]
fn create_resource_lands_on_the_ring_and_returns_a_monotonic_handle() {
    let (backend, umd) = setup();
    let handle = umd
        .create_resource(
            ResourceType::Texture2d,
            DxgiFormat::B8g8r8a8Unorm,
            BindFlags::RENDER_TARGET,
            1920,
            1080,
            1,
            1,
            1,
            1,
            0,
        )
        .unwrap();
    assert_eq!(handle, 1);
    umd.flush().unwrap();

    let ring = ring(&backend);
    let header = ring.peek_header().unwrap();
    assert_eq!(header.command_type, CommandType::CREATE_RESOURCE);
    assert_eq!(header.resource_id, handle);

    let second = umd
        .create_resource(
            ResourceType::Buffer,
            DxgiFormat::Unknown,
            BindFlags::VERTEX_BUFFER,
            0,
            0,
            0,
            1,
            1,
            1,
            4096,
        )
        .unwrap();
    assert_eq!(second, 2);
}

#[test]
fn destroy_unknown_resource_is_rejected() {
    let (_backend, umd) = setup();
    let err = umd.destroy_resource(42).unwrap_err();
    assert!(matches!(err, pvgpu_umd::UmdError::ResourceNotFound(42)));
}

#[test]
fn draw_calls_stage_without_a_state_prolog() {
    let (backend, umd) = setup();
    umd.set_primitive_topology(pvgpu_protocol::resource::PrimitiveTopology::TriangleList)
        .unwrap();
    umd.draw(3, 0).unwrap();
    umd.flush().unwrap();

    let ring = ring(&backend);
    let first = ring.peek_header().unwrap();
    assert_eq!(first.command_type, CommandType::SET_PRIMITIVE_TOPOLOGY);
    let first_len = first.command_size as usize;
    ring.pop(first_len);

    let second = ring.peek_header().unwrap();
    assert_eq!(second.command_type, CommandType::DRAW);
}

#[test]
fn write_discard_map_does_not_wait_on_a_fence() {
    let (_backend, umd) = setup();
    let handle = umd
        .create_resource(
            ResourceType::Buffer,
            DxgiFormat::Unknown,
            BindFlags::CONSTANT_BUFFER,
            0,
            0,
            0,
            1,
            1,
            1,
            256,
        )
        .unwrap();
    // WriteDiscard never blocks on host_fence_completed: this would hang if
    // the implementation mistakenly waited on it, since nothing advances
    // the fence counter in this test.
    let region = umd.map(handle, 0, MapType::WriteDiscard).unwrap();
    assert_eq!(region.size, 256);
    umd.unmap(handle, 0, region.heap_offset).unwrap();
}

#[test]
fn read_map_waits_for_the_backend_fence() {
    let (backend, umd) = setup();
    let handle = umd
        .create_resource(
            ResourceType::Buffer,
            DxgiFormat::Unknown,
            BindFlags::SHADER_RESOURCE,
            0,
            0,
            0,
            1,
            1,
            1,
            1024,
        )
        .unwrap();

    let waiter = std::thread::spawn({
        let backend = backend.clone();
        move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            backend
                .control()
                .host_fence_completed
                .value
                .store(u64::MAX, Ordering::Release);
        }
    });

    let region = umd.map(handle, 0, MapType::Read).unwrap();
    assert_eq!(region.size, 1024);
    waiter.join().unwrap();
}

#[test]
fn detached_device_stages_commands_but_discards_on_flush() {
    let umd = Device::new_detached();
    let handle = umd
        .create_resource(
            ResourceType::Buffer,
            DxgiFormat::Unknown,
            BindFlags::VERTEX_BUFFER,
            0,
            0,
            0,
            1,
            1,
            1,
            64,
        )
        .unwrap();
    assert_eq!(handle, 1);
    // No escape client attached: flush silently discards rather than panicking.
    umd.flush().unwrap();
    umd.present(1, 0).unwrap();
}

#[test]
fn get_caps_reports_feature_level_11_0_limits() {
    let (_backend, umd) = setup();
    let caps = umd.get_caps().unwrap();
    assert_eq!(caps.max_texture_dimension, 16384);
    assert_eq!(caps.max_render_targets, 8);
    assert_eq!(caps.max_vertex_buffers, 16);
}

#[test]
fn format_support_distinguishes_depth_from_color() {
    let (_backend, umd) = setup();
    let color = umd.query_format_support(DxgiFormat::B8g8r8a8Unorm);
    let depth = umd.query_format_support(DxgiFormat::D32Float);
    assert!(color.contains(pvgpu_umd::caps::FormatSupport::BLENDABLE));
    assert!(!depth.contains(pvgpu_umd::caps::FormatSupport::BLENDABLE));
    assert!(depth.contains(pvgpu_umd::caps::FormatSupport::DEPTH_STENCIL));
}
