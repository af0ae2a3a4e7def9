//! Spawns the real binary and checks it comes up and accepts a connection,
//! the way `aero-machine-cli`'s process-level smoke test exercises its CLI.

use std::io::Read;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::process::{Child, Command};
use std::time::{Duration, Instant};

struct Guard(Child);

impl Drop for Guard {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn binary_path() -> PathBuf {
    let target_dir = std::env::var_os("CARGO_TARGET_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target"));
    let exe_name = format!("pvgpu-emulator{}", std::env::consts::EXE_SUFFIX);
    let debug = target_dir.join("debug").join(&exe_name);
    if debug.exists() {
        return debug;
    }
    target_dir.join("release").join(exe_name)
}

#[test]
fn accepts_a_backend_connection_on_the_configured_socket() {
    let exe = binary_path();
    assert!(exe.exists(), "expected pvgpu-emulator binary at {}", exe.display());

    let socket_path = std::env::temp_dir().join(format!("pvgpu-emulator-cli-test-{}.sock", std::process::id()));
    let _ = std::fs::remove_file(&socket_path);

    let child = Command::new(&exe)
        .args(["--backend-pipe", socket_path.to_str().unwrap()])
        .spawn()
        .expect("failed to spawn pvgpu-emulator");
    let _guard = Guard(child);

    let deadline = Instant::now() + Duration::from_secs(5);
    let stream = loop {
        if let Ok(stream) = UnixStream::connect(&socket_path) {
            break stream;
        }
        if Instant::now() > deadline {
            panic!("pvgpu-emulator never opened {}", socket_path.display());
        }
        std::thread::sleep(Duration::from_millis(20));
    };

    // The device sends a HANDSHAKE frame immediately on connect; just
    // confirm bytes arrive rather than fully decoding the protocol here.
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let mut buf = [0u8; 8];
    let mut stream = stream;
    let n = stream.read(&mut buf).expect("expected a handshake frame from the device");
    assert!(n > 0);

    drop(stream);
    let _ = std::fs::remove_file(&socket_path);
}
