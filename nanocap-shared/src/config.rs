use std::time::Duration;

use crate::protocol::{CaptureRequest, Geometry, Payload};

pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(1);
/// Compressed captures are assumed to be at most a quarter of the raw size
pub const DEFAULT_RLE_TIMEOUT_DIVISOR: u32 = 4;

/// Settings for one capture transaction
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Line rate used to budget the bulk transfer
    pub baud_rate: u32,
    /// Deadline for the pause handshake, the capture echo and the header probe
    pub handshake_timeout: Duration,
    pub rle_timeout_divisor: u32,
    pub request: CaptureRequest,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        CaptureConfig {
            baud_rate: DEFAULT_BAUD_RATE,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            rle_timeout_divisor: DEFAULT_RLE_TIMEOUT_DIVISOR,
            request: CaptureRequest::Raw,
        }
    }
}

impl CaptureConfig {
    /// Time budget for the bulk transfer: ten bit times per byte of a raw
    /// dump, divided down for compressed captures. Never shorter than the
    /// handshake timeout.
    pub fn transfer_timeout(&self, payload: &Payload, geometry: Geometry) -> Duration {
        let bits = geometry.raw_len() as u64 * 10;
        let mut micros = bits * 1_000_000 / u64::from(self.baud_rate.max(1));

        if let Payload::Rle(_) = payload {
            micros /= u64::from(self.rle_timeout_divisor.max(1));
        }

        Duration::from_micros(micros).max(self.handshake_timeout)
    }
}
