//! The device-side half of the backend IPC loop (`spec.md` §4.3): performs
//! the handshake, then forwards guest doorbells to the backend and backend
//! IRQ/shutdown notices back into the device, for as long as the connection
//! lasts.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixStream;

use pvgpu_protocol::consts::PVGPU_VERSION;
use pvgpu_protocol::control_region::Features;
use pvgpu_protocol::ipc::{
    HandshakeAckPayload, HandshakePayload, IpcHeader, IpcMessageType, IrqPayload,
};
use pvgpu_protocol::wire::WireStruct;

use crate::device::PvgpuDevice;
use crate::error::EmulatorError;

pub async fn write_message<W: AsyncWrite + Unpin>(
    w: &mut W,
    msg_type: IpcMessageType,
    payload: &[u8],
) -> Result<(), EmulatorError> {
    let header = IpcHeader {
        msg_type: msg_type as u32,
        payload_size: payload.len() as u32,
    };
    let mut frame = header.to_bytes();
    frame.extend_from_slice(payload);
    w.write_all(&frame).await?;
    w.flush().await?;
    Ok(())
}

pub async fn read_message<R: AsyncRead + Unpin>(
    r: &mut R,
) -> Result<(IpcMessageType, Vec<u8>), EmulatorError> {
    let mut header_buf = [0u8; IpcHeader::SIZE_BYTES];
    r.read_exact(&mut header_buf)
        .await
        .map_err(|_| EmulatorError::BackendDisconnected)?;
    let header = IpcHeader::read_le(&header_buf)?;

    let mut payload = vec![0u8; header.payload_size as usize];
    if !payload.is_empty() {
        r.read_exact(&mut payload)
            .await
            .map_err(|_| EmulatorError::BackendDisconnected)?;
    }
    let msg_type = IpcMessageType::from_u32(header.msg_type).ok_or(
        pvgpu_protocol::error::ProtocolError::OutOfRange {
            field: "msg_type",
            value: header.msg_type as u64,
        },
    )?;
    Ok((msg_type, payload))
}

/// Drives the handshake and then the steady-state forwarding loop over
/// `stream` until the backend disconnects or sends `SHUTDOWN`. Runs until
/// then — callers `tokio::spawn` this per accepted connection.
pub async fn run(device: Arc<PvgpuDevice>, stream: UnixStream) -> Result<(), EmulatorError> {
    let (mut rd, mut wr) = tokio::io::split(stream);

    let hello = HandshakePayload {
        shmem_size: device.shmem_size(),
        shmem_name: device.shmem_name().to_string(),
    };
    write_message(&mut wr, IpcMessageType::Handshake, &hello.to_bytes()).await?;

    let (msg_type, bytes) = read_message(&mut rd).await?;
    if msg_type != IpcMessageType::HandshakeAck {
        return Err(EmulatorError::HandshakeRejected { ours: PVGPU_VERSION });
    }
    let ack = HandshakeAckPayload::read_le(&bytes)?;
    let backend_features = Features::from_bits_truncate(ack.features);
    if !backend_features.contains(Features::D3D11) {
        // spec.md §4.3: missing FEATURE_D3D11 means no GPU acceleration, not
        // a fatal connection — the device simply stays non-connected.
        tracing::warn!(
            backend_features = ack.features,
            "backend handshake missing FEATURE_D3D11, staying non-connected"
        );
        return Err(EmulatorError::HandshakeMissingD3d11 {
            backend_features: ack.features,
        });
    }
    let negotiated = device.control().features() & backend_features;
    device.control().features.store(negotiated.bits(), Ordering::Relaxed);
    device.set_backend_connected(true);
    tracing::info!(features = negotiated.bits(), "backend handshake complete");

    loop {
        tokio::select! {
            _ = device.wait_doorbell() => {
                write_message(&mut wr, IpcMessageType::Doorbell, &[]).await?;
            }
            msg = read_message(&mut rd) => {
                match msg {
                    Ok((IpcMessageType::Irq, payload)) => {
                        let irq = IrqPayload::read_le(&payload)?;
                        device.raise_irq(1u32 << irq.vector, irq.vector);
                    }
                    Ok((IpcMessageType::Shutdown, _)) => {
                        tracing::info!("backend requested shutdown");
                        device.mark_device_lost();
                        return Ok(());
                    }
                    Ok((other, _)) => {
                        tracing::warn!(?other, "unexpected message from backend");
                    }
                    Err(err) => {
                        tracing::warn!(%err, "backend channel error, marking device lost");
                        device.mark_device_lost();
                        return Err(err);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::irq::CountingIrqSink;
    use pvgpu_protocol::consts::MIN_SHMEM_SIZE;
    use pvgpu_protocol::ipc::ShutdownPayload;

    async fn backend_side_ack(mut stream: UnixStream) {
        let (mut rd, mut wr) = tokio::io::split(&mut stream);
        let (msg_type, bytes) = read_message(&mut rd).await.unwrap();
        assert_eq!(msg_type, IpcMessageType::Handshake);
        let hello = HandshakePayload::read_le(&bytes).unwrap();
        assert_eq!(hello.shmem_size, MIN_SHMEM_SIZE);
        let ack = HandshakeAckPayload {
            features: (Features::D3D11 | Features::COMPUTE).bits(),
        };
        write_message(&mut wr, IpcMessageType::HandshakeAck, &ack.to_bytes())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn handshake_marks_backend_connected() {
        let (guest, backend) = UnixStream::pair().unwrap();
        let sink = Arc::new(CountingIrqSink::default());
        let device = Arc::new(PvgpuDevice::realize_with_vec_region(MIN_SHMEM_SIZE, sink).unwrap());

        let backend_task = tokio::spawn(async move {
            backend_side_ack(backend).await;
        });
        let device_for_loop = device.clone();
        let loop_task = tokio::spawn(async move {
            // The loop runs until shutdown/disconnect; for this test we just
            // race it against a timeout and check state afterward.
            let _ = tokio::time::timeout(
                std::time::Duration::from_millis(200),
                run(device_for_loop, guest),
            )
            .await;
        });

        backend_task.await.unwrap();
        // Give the handshake a moment to land before we assert.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(device.is_backend_connected());
        assert_eq!(device.control().features(), Features::D3D11 | Features::COMPUTE);
        loop_task.abort();
    }

    #[tokio::test]
    async fn handshake_without_d3d11_stays_non_connected() {
        let (guest, mut backend) = UnixStream::pair().unwrap();
        let sink = Arc::new(CountingIrqSink::default());
        let device = Arc::new(PvgpuDevice::realize_with_vec_region(MIN_SHMEM_SIZE, sink).unwrap());

        let backend_task = tokio::spawn(async move {
            let (mut rd, mut wr) = tokio::io::split(&mut backend);
            let _ = read_message(&mut rd).await.unwrap(); // handshake
            let ack = HandshakeAckPayload {
                features: Features::COMPUTE.bits(),
            };
            write_message(&mut wr, IpcMessageType::HandshakeAck, &ack.to_bytes())
                .await
                .unwrap();
        });

        let result = run(device.clone(), guest).await;
        assert!(matches!(result, Err(EmulatorError::HandshakeMissingD3d11 { .. })));
        assert!(!device.is_backend_connected());
        backend_task.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_message_marks_device_lost() {
        let (guest, mut backend) = UnixStream::pair().unwrap();
        let sink = Arc::new(CountingIrqSink::default());
        let device = Arc::new(PvgpuDevice::realize_with_vec_region(MIN_SHMEM_SIZE, sink).unwrap());

        let backend_task = tokio::spawn(async move {
            let (mut rd, mut wr) = tokio::io::split(&mut backend);
            let _ = read_message(&mut rd).await.unwrap(); // handshake
            let ack = HandshakeAckPayload {
                features: (Features::D3D11 | Features::COMPUTE).bits(),
            };
            write_message(&mut wr, IpcMessageType::HandshakeAck, &ack.to_bytes())
                .await
                .unwrap();
            write_message(&mut wr, IpcMessageType::Shutdown, &ShutdownPayload.to_bytes())
                .await
                .unwrap();
        });

        let result = run(device.clone(), guest).await;
        assert!(result.is_ok());
        assert!(!device.is_backend_connected());
        backend_task.await.unwrap();
    }
}
