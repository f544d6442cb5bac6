use ai4all_core::gpu;
use anyhow::Result;

pub async fn execute() -> Result<()> {
    let status = tokio::task::spawn_blocking(gpu::detect_gpus).await?;

    if !status.available {
        println!("No GPU detected.");
        println!("Inference will run on CPU, which is much slower.");
        return Ok(());
    }

    println!("Backend: {}\n", status.backend);
    for device in &status.devices {
        println!("[{}] {} ({:?})", device.index, device.name, device.vendor);
        println!("    VRAM: {} GB ({} GB free)", device.vram_gb, device.vram_free_gb);
        if let Some(util) = device.utilization_pct {
            println!("    Utilization: {}%", util);
        }
        if let Some(cc) = &device.compute_capability {
            println!("    Compute capability: {}", cc);
        }
    }

    Ok(())
}
