//! Screen capture from NanoVNA, tinySA and tinyPFA devices over their USB
//! serial console.

pub mod capture;
pub mod codec;
pub mod config;
pub mod device;
pub mod error;
pub mod link;
pub mod protocol;
pub mod transport;

pub use capture::{capture, Capture};
pub use codec::RgbFrame;
pub use config::CaptureConfig;
pub use device::DeviceKind;
pub use error::{CaptureError, Result};
pub use link::{Channel, Link};
pub use protocol::{CaptureRequest, Format, Geometry};

#[cfg(feature = "utils")]
pub use link::SerialLink;
