use std::path::PathBuf;

use anyhow::{anyhow, Context};
use chrono::{DateTime, TimeZone};
use image::imageops::{self, FilterType};
use image::RgbImage;

use nanocap_shared::{DeviceKind, RgbFrame};

/// `<device>_<date>_<time>`, used when no output name is given
pub fn default_base_name<Tz: TimeZone>(device: DeviceKind, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}_{}", device, now.format("%Y%m%d_%H%M%S"))
}

pub fn to_image(frame: &RgbFrame) -> anyhow::Result<RgbImage> {
    let geometry = frame.geometry();
    RgbImage::from_raw(
        u32::from(geometry.width()),
        u32::from(geometry.height()),
        frame.as_bytes().to_vec(),
    )
    .ok_or_else(|| anyhow!("frame does not match its {} geometry", geometry))
}

/// Resize by `scale`, keeping the aspect ratio
pub fn scale_image(image: &RgbImage, scale: f32) -> anyhow::Result<RgbImage> {
    if scale.is_nan() || scale <= 0.0 {
        return Err(anyhow!("invalid scale factor {}", scale));
    }
    if (scale - 1.0).abs() < f32::EPSILON {
        return Ok(image.clone());
    }

    let width = ((image.width() as f32 * scale) as u32).max(1);
    let height = ((image.height() as f32 * scale) as u32).max(1);

    Ok(imageops::resize(image, width, height, FilterType::CatmullRom))
}

/// Write `<base>.png` and a colour inverted `<base>i.png` for printing.
/// Returns the two paths.
pub fn save(frame: &RgbFrame, scale: f32, base: &str) -> anyhow::Result<(PathBuf, PathBuf)> {
    let mut image = scale_image(&to_image(frame)?, scale)?;

    let path = PathBuf::from(format!("{}.png", base));
    image
        .save(&path)
        .with_context(|| format!("writing {}", path.display()))?;

    imageops::invert(&mut image);

    let inverted_path = PathBuf::from(format!("{}i.png", base));
    image
        .save(&inverted_path)
        .with_context(|| format!("writing {}", inverted_path.display()))?;

    Ok((path, inverted_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;
    use nanocap_shared::Geometry;

    fn frame() -> RgbFrame {
        let geometry = Geometry::new(2, 1).unwrap();
        RgbFrame::from_packed(geometry, &[0xF800, 0x001F])
    }

    #[test]
    fn base_name() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            default_base_name(DeviceKind::TinySaUltra, &now),
            "tinysaultra_20240309_140507"
        );
    }

    #[test]
    fn scaled_size() {
        let image = to_image(&frame()).unwrap();
        let scaled = scale_image(&image, 2.0).unwrap();
        assert_eq!(scaled.dimensions(), (4, 2));
        assert!(scale_image(&image, 0.0).is_err());
    }

    #[test]
    fn writes_plain_and_inverted() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("shot");

        let (path, inverted) = save(&frame(), 1.0, base.to_str().unwrap()).unwrap();
        assert_eq!(path, dir.path().join("shot.png"));
        assert_eq!(inverted, dir.path().join("shoti.png"));

        let plain = image::open(&path).unwrap().to_rgb8();
        assert_eq!(plain.get_pixel(0, 0).0, [0xF8, 0x00, 0x00]);
        assert_eq!(plain.get_pixel(1, 0).0, [0x00, 0x00, 0xF8]);

        let inverted = image::open(&inverted).unwrap().to_rgb8();
        assert_eq!(inverted.get_pixel(0, 0).0, [0x07, 0xFF, 0xFF]);
        assert_eq!(inverted.get_pixel(1, 0).0, [0xFF, 0xFF, 0x07]);
    }
}
