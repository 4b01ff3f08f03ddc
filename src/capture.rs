use anyhow::Context;
use chrono::Local;

use nanocap_shared::{CaptureConfig, Channel, DeviceKind};

use crate::screenshot;

pub fn command_capture<C: Channel>(
    link: &mut C,
    device: DeviceKind,
    config: &CaptureConfig,
    scale: f32,
    out: Option<String>,
) -> anyhow::Result<()> {
    log::info!("Capturing {} screen", device);

    let capture = nanocap_shared::capture(link, device.geometry(), config)
        .with_context(|| format!("capture from {} failed", device))?;

    if capture.geometry != device.geometry() {
        log::warn!(
            "Device sent {} but {} has a {} screen",
            capture.geometry,
            device,
            device.geometry()
        );
    }

    log::info!(
        "Got {} {} capture, {} bytes in {:.2?} ({:.1} kB/s)",
        capture.geometry,
        capture.format,
        capture.byte_count,
        capture.elapsed,
        capture.throughput() / 1000.0,
    );

    let base = out.unwrap_or_else(|| screenshot::default_base_name(device, &Local::now()));
    let (path, inverted) = screenshot::save(&capture.frame, scale, &base)?;

    log::info!("Wrote {} and {}", path.display(), inverted.display());

    Ok(())
}
