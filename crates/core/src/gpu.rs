//! GPU probing through vendor command-line tools.
//!
//! Every probe degrades to an empty result when the tool is missing or its
//! output cannot be parsed.

use serde::Serialize;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GpuVendor {
    Nvidia,
    Amd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GpuBackend {
    None,
    Cuda,
    Rocm,
    Mixed,
}

impl std::fmt::Display for GpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GpuBackend::None => write!(f, "None"),
            GpuBackend::Cuda => write!(f, "CUDA"),
            GpuBackend::Rocm => write!(f, "ROCm"),
            GpuBackend::Mixed => write!(f, "Mixed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpuDevice {
    pub index: u32,
    pub vendor: GpuVendor,
    pub name: String,
    pub vram_gb: u64,
    pub vram_free_gb: u64,
    pub utilization_pct: Option<u32>,
    pub compute_capability: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpuStatus {
    pub backend: GpuBackend,
    pub available: bool,
    pub devices: Vec<GpuDevice>,
}

impl GpuStatus {
    pub fn from_devices(devices: Vec<GpuDevice>) -> Self {
        let nvidia = devices.iter().any(|d| d.vendor == GpuVendor::Nvidia);
        let amd = devices.iter().any(|d| d.vendor == GpuVendor::Amd);
        let backend = match (nvidia, amd) {
            (true, true) => GpuBackend::Mixed,
            (true, false) => GpuBackend::Cuda,
            (false, true) => GpuBackend::Rocm,
            (false, false) => GpuBackend::None,
        };
        Self {
            backend,
            available: !devices.is_empty(),
            devices,
        }
    }
}

/// Live utilisation sample for one NVIDIA card
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpuSample {
    pub index: u32,
    pub name: String,
    pub vendor: &'static str,
    pub util_pct: u32,
    /// MiB
    pub vram_used: u64,
    /// MiB
    pub vram_total: u64,
    pub temp_c: Option<u32>,
}

const NVIDIA_DEVICE_QUERY: &str =
    "--query-gpu=index,name,memory.total,memory.free,utilization.gpu,compute_cap";
const NVIDIA_SAMPLE_QUERY: &str =
    "--query-gpu=index,name,utilization.gpu,memory.used,memory.total,temperature.gpu";

/// How long a vendor tool may run before it is killed
pub const TOOL_TIMEOUT: Duration = Duration::from_secs(5);

fn run_tool(program: &str, args: &[&str]) -> Option<String> {
    run_tool_with_deadline(program, args, TOOL_TIMEOUT)
}

/// Run `program`, killing it if it outlives `timeout`. Output is small enough
/// to fit the pipe buffer, so it is collected after exit.
fn run_tool_with_deadline(program: &str, args: &[&str], timeout: Duration) -> Option<String> {
    let mut child = Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .ok()?;

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => break,
            Ok(None) if Instant::now() >= deadline => {
                tracing::warn!("{} did not finish within {:?}, killing it", program, timeout);
                let _ = child.kill();
                let _ = child.wait();
                return None;
            }
            Ok(None) => std::thread::sleep(Duration::from_millis(20)),
            Err(e) => {
                tracing::debug!("Failed to wait for {}: {}", program, e);
                return None;
            }
        }
    }

    let output = child.wait_with_output().ok()?;
    if !output.status.success() {
        tracing::debug!("{} exited with {}", program, output.status);
        return None;
    }

    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn csv_fields(line: &str) -> Vec<&str> {
    line.split(',').map(str::trim).collect()
}

/// Parse `nvidia-smi` device query output (csv, noheader, nounits)
pub fn parse_nvidia_devices(output: &str) -> Vec<GpuDevice> {
    output
        .lines()
        .filter_map(|line| {
            let p = csv_fields(line);
            if p.len() < 6 {
                return None;
            }
            Some(GpuDevice {
                index: p[0].parse().ok()?,
                vendor: GpuVendor::Nvidia,
                name: p[1].to_string(),
                vram_gb: p[2].parse::<u64>().ok()? / 1024,
                vram_free_gb: p[3].parse::<u64>().ok()? / 1024,
                utilization_pct: p[4].parse().ok(),
                compute_capability: Some(p[5].to_string()),
            })
        })
        .collect()
}

/// Parse `nvidia-smi` sample query output (csv, noheader, nounits)
pub fn parse_nvidia_samples(output: &str) -> Vec<GpuSample> {
    output
        .lines()
        .filter_map(|line| {
            let p = csv_fields(line);
            if p.len() < 6 {
                return None;
            }
            Some(GpuSample {
                index: p[0].parse().ok()?,
                name: p[1].to_string(),
                vendor: "NVIDIA",
                util_pct: p[2].parse().unwrap_or(0),
                vram_used: p[3].parse().unwrap_or(0),
                vram_total: p[4].parse().unwrap_or(0),
                temp_c: p[5].parse().ok(),
            })
        })
        .collect()
}

/// Detect GPUs. Blocking; run it off the async executor.
pub fn detect_gpus() -> GpuStatus {
    let mut devices = run_tool("nvidia-smi", &[NVIDIA_DEVICE_QUERY, "--format=csv,noheader,nounits"])
        .map(|out| parse_nvidia_devices(&out))
        .unwrap_or_default();

    // rocm-smi output is not parsed; its presence is enough to report a card.
    if devices.is_empty() && run_tool("rocm-smi", &["--version"]).is_some() {
        devices.push(GpuDevice {
            index: 0,
            vendor: GpuVendor::Amd,
            name: "AMD GPU (ROCm)".to_string(),
            vram_gb: 0,
            vram_free_gb: 0,
            utilization_pct: None,
            compute_capability: None,
        });
    }

    GpuStatus::from_devices(devices)
}

/// Sample NVIDIA utilisation. Blocking.
pub fn sample_gpus() -> Vec<GpuSample> {
    run_tool("nvidia-smi", &[NVIDIA_SAMPLE_QUERY, "--format=csv,noheader,nounits"])
        .map(|out| parse_nvidia_samples(&out))
        .unwrap_or_default()
}
