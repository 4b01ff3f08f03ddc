use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CaptureError>;

/// Everything that can end a capture transaction
#[derive(Error, Debug)]
pub enum CaptureError {
    /// Nothing at all came back from the initial pause
    #[error("device not responding")]
    DeviceNotResponding,

    /// The device answered, but not with the expected echo
    #[error("protocol mismatch: expected {expected:?}, got {got:?}")]
    ProtocolMismatch { expected: String, got: String },

    #[error("unsupported bitmap format: {bits_per_pixel} bits per pixel")]
    UnsupportedFormat { bits_per_pixel: u8 },

    /// Bulk transfer deadline elapsed before the terminator was seen
    #[error("communications timeout after {received} bytes")]
    CommunicationsTimeout { received: usize },

    #[error("size mismatch: expected {expected} bytes, got {got}")]
    SizeMismatch { expected: usize, got: usize },

    #[error("corrupt stream: {0}")]
    CorruptStream(&'static str),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl CaptureError {
    pub(crate) fn mismatch(expected: &[u8], got: &[u8]) -> Self {
        CaptureError::ProtocolMismatch {
            expected: String::from_utf8_lossy(expected).into_owned(),
            got: String::from_utf8_lossy(got).into_owned(),
        }
    }
}
