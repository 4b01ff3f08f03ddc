use std::time::Duration;

use crate::codec::RgbFrame;
use crate::config::CaptureConfig;
use crate::error::Result;
use crate::link::Channel;
use crate::protocol::{Format, Geometry};
use crate::transport::Transport;

/// A decoded screen capture
#[derive(Debug)]
pub struct Capture {
    pub geometry: Geometry,
    pub format: Format,
    pub frame: RgbFrame,
    /// Time spent in the bulk transfer
    pub elapsed: Duration,
    /// Payload size on the wire, header included
    pub byte_count: usize,
}

impl Capture {
    /// Bytes per second over the bulk transfer
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.byte_count as f64 / secs
        } else {
            0.0
        }
    }
}

/// Run one pause, capture, resume transaction.
///
/// `declared` is used unless the device sends a bitmap header with its own
/// size. The resume command goes out in the same write as the capture
/// request, so a device that was paused is resumed even if the capture fails.
/// Nothing is retried.
pub fn capture<C: Channel>(
    channel: &mut C,
    declared: Geometry,
    config: &CaptureConfig,
) -> Result<Capture> {
    let mut transport = Transport::new(channel, config);

    transport.pause()?;
    let probe = transport.probe(declared)?;
    let transfer = transport.transfer(probe)?;
    let pixels = transport.finish(&transfer)?;

    Ok(Capture {
        geometry: transfer.geometry,
        format: transfer.payload.format(),
        frame: RgbFrame::from_packed(transfer.geometry, &pixels),
        elapsed: transfer.elapsed,
        byte_count: transfer.bytes.len(),
    })
}
