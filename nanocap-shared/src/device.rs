use std::fmt;
use std::str::FromStr;

use crate::protocol::Geometry;

/// ChibiOS/RT virtual COM port
pub const USB_VID: u16 = 0x0483;
pub const USB_PID: u16 = 0x5740;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DeviceKind {
    TinySa,
    TinySaUltra,
    NanoVnaH,
    /// 2.8" screen
    NanoVnaH4,
    TinyPfa,
}

impl DeviceKind {
    pub const ALL: [DeviceKind; 5] = [
        DeviceKind::TinySa,
        DeviceKind::TinySaUltra,
        DeviceKind::NanoVnaH,
        DeviceKind::NanoVnaH4,
        DeviceKind::TinyPfa,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DeviceKind::TinySa => "tinysa",
            DeviceKind::TinySaUltra => "tinysaultra",
            DeviceKind::NanoVnaH => "nanovnah",
            DeviceKind::NanoVnaH4 => "nanovnah4",
            DeviceKind::TinyPfa => "tinypfa",
        }
    }

    /// Screen size used unless the device sends its own
    pub fn geometry(self) -> Geometry {
        match self {
            DeviceKind::NanoVnaH4 => Geometry::QVGA,
            _ => Geometry::HVGA,
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct UnknownDevice(pub String);

impl fmt::Display for UnknownDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let known: Vec<_> = DeviceKind::ALL.iter().map(|d| d.name()).collect();
        write!(f, "unknown device type '{}', expected one of: {}", self.0, known.join(", "))
    }
}

impl std::error::Error for UnknownDevice {}

impl FromStr for DeviceKind {
    type Err = UnknownDevice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        DeviceKind::ALL
            .iter()
            .copied()
            .find(|d| d.name() == lower)
            .ok_or_else(|| UnknownDevice(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_table() {
        assert_eq!(DeviceKind::NanoVnaH4.geometry(), Geometry::new(320, 240).unwrap());
        assert_eq!(Geometry::HVGA, Geometry::new(480, 320).unwrap());
        for kind in [DeviceKind::TinySa, DeviceKind::TinySaUltra, DeviceKind::NanoVnaH, DeviceKind::TinyPfa] {
            assert_eq!(kind.geometry(), Geometry::new(480, 320).unwrap());
        }
    }

    #[test]
    fn parse_names() {
        for kind in DeviceKind::ALL.iter() {
            assert_eq!(kind.name().parse::<DeviceKind>(), Ok(*kind));
        }
        assert_eq!("TinySA".parse::<DeviceKind>(), Ok(DeviceKind::TinySa));

        let err = "nanovna".parse::<DeviceKind>().unwrap_err();
        assert!(err.to_string().contains("nanovnah4"));
    }
}
