//! Drives `pvgpu-miniport` against a real in-process [`PvgpuDevice`]: the
//! same shared memory backs both sides, and a thin [`Bar0Port`] adapter
//! forwards register access to the device's BAR0 model, so these tests
//! exercise the miniport's escape handling the way a real guest/host pair
//! would, minus an actual VMM (`spec.md` §4.4, §8).

use std::sync::Arc;

use pvgpu_emulator::{CountingIrqSink, PvgpuDevice};
use pvgpu_miniport::bar0::Bar0Port;
use pvgpu_miniport::escape;
use pvgpu_miniport::Miniport;
use pvgpu_protocol::consts::{MIN_SHMEM_SIZE, MSIX_VECTOR_FENCE_COMPLETE, REG_IRQ_MASK};
use pvgpu_protocol::escape::{AllocHeapRequest, AllocHeapResponse, EscapeCode, SetDisplayModeRequest, SubmitCommandsRequest, WaitFenceRequest, WaitFenceResponse};
use pvgpu_protocol::header::{CommandFlags, CommandHeader, CommandType};
use pvgpu_protocol::wire::WireStruct;

struct DeviceBar0(Arc<PvgpuDevice>);

impl Bar0Port for DeviceBar0 {
    fn read(&self, offset: u64) -> u32 {
        self.0.read_bar0(offset)
    }

    fn write(&self, offset: u64, val: u32) {
        self.0.write_bar0(offset, val)
    }
}

fn setup() -> (Arc<PvgpuDevice>, Miniport) {
    let sink = Arc::new(CountingIrqSink::default());
    let device = Arc::new(PvgpuDevice::realize_with_vec_region(MIN_SHMEM_SIZE, sink).unwrap());
    device.write_bar0(REG_IRQ_MASK, 0xFFFF_FFFF);
    let bar0 = Arc::new(DeviceBar0(device.clone()));
    let miniport = Miniport::attach(device.region_arc(), bar0).unwrap();
    (device, miniport)
}

fn flush_command() -> Vec<u8> {
    let size = pvgpu_protocol::consts::align16(CommandHeader::SIZE_BYTES as u32);
    CommandHeader::new(CommandType::FLUSH, size, 0, CommandFlags::empty()).to_bytes()
}

#[test]
fn submit_commands_lands_on_the_ring_device_observes() {
    let (device, miniport) = setup();
    let cmd = flush_command();

    let req = SubmitCommandsRequest {
        byte_count: cmd.len() as u32,
        fence_value: 1,
    };
    let resp_bytes = escape::dispatch(&miniport, EscapeCode::SubmitCommands, &req.to_bytes(), Some(&cmd)).unwrap();
    assert_eq!(resp_bytes.len(), 8);
    assert_eq!(device.doorbell_count(), 1);

    let control = device.control();
    let ring = pvgpu_shmem::CommandRing::new(device.region(), control, control.ring_offset.load(std::sync::atomic::Ordering::Relaxed), device.ring_size()).unwrap();
    let header = ring.peek_header().unwrap();
    assert_eq!(header.kind(), CommandType::Flush);
}

#[test]
fn wait_fence_unblocks_once_host_completes_it() {
    let (device, miniport) = setup();

    let control = device.control();
    control.host_fence_completed.value.store(0, std::sync::atomic::Ordering::Release);

    let waiter = std::thread::spawn({
        let device = device.clone();
        move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            device
                .control()
                .host_fence_completed
                .value
                .store(5, std::sync::atomic::Ordering::Release);
        }
    });

    let req = WaitFenceRequest { fence_value: 5, timeout_ms: 1000 };
    let resp_bytes = escape::dispatch(&miniport, EscapeCode::WaitFence, &req.to_bytes(), None).unwrap();
    let resp = WaitFenceResponse::read_le(&resp_bytes).unwrap();
    assert!(resp.is_completed());

    waiter.join().unwrap();
}

#[test]
fn wait_fence_times_out_without_reaching_fence() {
    let (_device, miniport) = setup();
    let req = WaitFenceRequest { fence_value: 999, timeout_ms: 30 };
    let resp_bytes = escape::dispatch(&miniport, EscapeCode::WaitFence, &req.to_bytes(), None).unwrap();
    let resp = WaitFenceResponse::read_le(&resp_bytes).unwrap();
    assert!(!resp.is_completed());
}

#[test]
fn wait_fence_aborts_immediately_on_device_lost() {
    let (device, miniport) = setup();
    device.mark_device_lost();

    let req = WaitFenceRequest { fence_value: 1, timeout_ms: 5000 };
    let start = std::time::Instant::now();
    let err = miniport.wait_fence(req.fence_value, req.timeout_ms).unwrap_err();
    assert!(start.elapsed() < std::time::Duration::from_millis(500));
    assert!(matches!(err, pvgpu_miniport::MiniportError::DeviceRemoved { .. }));
}

#[test]
fn irq_ack_surfaces_fence_completion_and_clears_status() {
    let (device, miniport) = setup();
    let control = device.control();
    control
        .host_fence_completed
        .value
        .store(42, std::sync::atomic::Ordering::Release);
    device.raise_irq(1 << MSIX_VECTOR_FENCE_COMPLETE, MSIX_VECTOR_FENCE_COMPLETE);

    let notification = miniport.handle_irq().unwrap();
    assert_eq!(notification.fence_low, 42);
    assert_eq!(device.read_bar0(pvgpu_protocol::consts::REG_IRQ_STATUS), 0);
    assert!(miniport.handle_irq().is_none());
}

#[test]
fn set_display_mode_rejects_zero_dimensions() {
    let (_device, miniport) = setup();
    let req = SetDisplayModeRequest { width: 0, height: 1080, refresh: 60, format: 87 };
    let err = miniport.set_display_mode(req).unwrap_err();
    assert!(matches!(err, pvgpu_miniport::MiniportError::InvalidDisplayMode));
}

#[test]
fn alloc_heap_exhaustion_surfaces_as_failure_sentinel() {
    let (_device, miniport) = setup();
    let huge = AllocHeapRequest { size: u32::MAX, align: 4096 };
    let resp_bytes = escape::dispatch(&miniport, EscapeCode::AllocHeap, &huge.to_bytes(), None).unwrap();
    let resp = AllocHeapResponse::read_le(&resp_bytes).unwrap();
    assert!(resp.is_failure());
}
