//! Manual bring-up and integration-testing front-end for the host-side
//! device emulator (`spec.md` §6 CLI/config): binds a Unix-socket listener
//! a backend process connects to, and forwards doorbell/IRQ traffic between
//! them for as long as the process runs.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::UnixListener;

use pvgpu_emulator::{backend_loop, IrqSink, PvgpuDevice};
use pvgpu_protocol::consts::MIN_SHMEM_SIZE;

#[derive(Parser)]
#[command(name = "pvgpu-emulator", about = "Host-side paravirtual GPU device emulator")]
struct Cli {
    /// Shared-memory region size in bytes (control region + command ring + heap).
    #[arg(long, default_value_t = MIN_SHMEM_SIZE)]
    shmem_size: u64,

    /// Unix socket the backend process connects to.
    #[arg(long, default_value = "/tmp/pvgpu-backend.sock")]
    backend_pipe: PathBuf,
}

/// Routes raised vectors to `tracing` instead of just counting them, so a
/// human watching the CLI's output can see interrupt activity.
#[derive(Default)]
struct LoggingIrqSink;

impl IrqSink for LoggingIrqSink {
    fn raise(&self, vector: u16) {
        tracing::debug!(vector, "irq raised");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    if cli.backend_pipe.exists() {
        std::fs::remove_file(&cli.backend_pipe)?;
    }
    let listener = UnixListener::bind(&cli.backend_pipe)?;
    tracing::info!(
        shmem_size = cli.shmem_size,
        backend_pipe = %cli.backend_pipe.display(),
        "pvgpu emulator listening for backend connections"
    );

    let device = Arc::new(PvgpuDevice::realize_named(
        cli.shmem_size,
        Arc::new(LoggingIrqSink),
    )?);
    tracing::info!(shmem_name = device.shmem_name(), "shared memory provisioned");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, _addr) = accepted?;
                tracing::info!("backend connected");
                let device = device.clone();
                tokio::spawn(async move {
                    if let Err(err) = backend_loop::run(device, stream).await {
                        tracing::warn!(%err, "backend connection ended");
                    }
                });
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down on ctrl-c");
                break;
            }
        }
    }

    let _ = std::fs::remove_file(&cli.backend_pipe);
    Ok(())
}
