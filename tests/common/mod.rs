// tests/common/mod.rs
// Shared test utilities for integration tests
#![allow(dead_code)]

use std::io::Write;
use std::process::{Command, Stdio};

use geoimport::PipelineConfig;

pub const HEADER: &str = "ip,country_code,country,city,latitude,longitude,mystery_value";

/// Build a dump from a header and data lines.
pub fn dump(lines: &[&str]) -> String {
    let mut out = String::from(HEADER);
    out.push('\n');
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// A valid data line whose IP and coordinates are unique for every `i`
/// below 1.8 million.
pub fn unique_line(i: usize) -> String {
    format!(
        "10.{}.{}.{},SI,Nepal,City{},12.5,{}.{:04},{}",
        (i >> 16) & 0xFF,
        (i >> 8) & 0xFF,
        i & 0xFF,
        i,
        (i / 10_000) % 180,
        i % 10_000,
        i
    )
}

/// A dump of `count` unique valid lines.
pub fn unique_dump(count: usize) -> String {
    let lines: Vec<String> = (0..count).map(unique_line).collect();
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    dump(&refs)
}

/// Small queues and chunks so tests exercise every stage boundary.
pub fn small_config() -> PipelineConfig {
    PipelineConfig {
        workers: 3,
        chunk_size: 256,
        batch_size: 16,
        queue_capacity: 8,
        max_in_flight_batches: 2,
    }
}

/// Run the geoimport binary with `args`, feeding `input` on stdin.
///
/// Config files and `GEOIMPORT_DATABASE` from the environment are ignored.
pub fn run_geoimport_with_input(args: &[&str], input: &[u8]) -> (String, String, i32) {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_geoimport"))
        .args(args)
        .arg("--ignore-config")
        .env_remove("GEOIMPORT_DATABASE")
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to start geoimport");

    if let Some(mut stdin) = cmd.stdin.take() {
        // The child may exit (e.g. on a config error) before reading stdin.
        if let Err(e) = stdin.write_all(input) {
            assert_eq!(e.kind(), std::io::ErrorKind::BrokenPipe, "Failed to write to stdin: {e}");
        }
    }

    let output = cmd.wait_with_output().expect("Failed to read output");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}
