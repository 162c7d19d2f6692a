use std::path::Path;

use anyhow::Context;
use image::{DynamicImage, ExtendedColorType};
use log::info;

/// Flat pixel data as handed over by the codec, row-major, channel-minor.
#[derive(Debug)]
pub struct DecodedImage {
    pub pixels: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub channels: usize,
}

/// Decode an image file, preserving its native channel count where the
/// source is already 8 bits per channel.
pub fn decode(path: &Path) -> anyhow::Result<DecodedImage> {
    let image = image::open(path)
        .with_context(|| format!("Failed to load image from {}", path.display()))?;

    let width = image.width() as usize;
    let height = image.height() as usize;

    let (pixels, channels) = match image {
        DynamicImage::ImageLuma8(buf) => (buf.into_raw(), 1),
        DynamicImage::ImageLumaA8(buf) => (buf.into_raw(), 2),
        DynamicImage::ImageRgb8(buf) => (buf.into_raw(), 3),
        DynamicImage::ImageRgba8(buf) => (buf.into_raw(), 4),
        // 16-bit and float formats are normalized to 8-bit RGB.
        other => (other.into_rgb8().into_raw(), 3),
    };

    info!(
        "decoded {} ({}x{}, {} channels)",
        path.display(),
        width,
        height,
        channels
    );

    Ok(DecodedImage {
        pixels,
        width,
        height,
        channels,
    })
}

/// Encode a flat pixel buffer to `path`; the format is inferred from the
/// file extension.
pub fn encode(
    path: &Path,
    pixels: &[u8],
    width: usize,
    height: usize,
    channels: usize,
) -> anyhow::Result<()> {
    let color = match channels {
        1 => ExtendedColorType::L8,
        2 => ExtendedColorType::La8,
        3 => ExtendedColorType::Rgb8,
        4 => ExtendedColorType::Rgba8,
        _ => anyhow::bail!("unsupported channel count: {}", channels),
    };

    image::save_buffer(path, pixels, width as u32, height as u32, color)
        .with_context(|| format!("Failed to save image to {}", path.display()))?;

    info!("saved image to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_round_trip_preserves_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("round_trip.png");

        let pixels: Vec<u8> = (0..4 * 2 * 3).map(|i| (i * 11 % 256) as u8).collect();
        encode(&path, &pixels, 4, 2, 3).unwrap();

        let decoded = decode(&path).unwrap();
        assert_eq!((decoded.width, decoded.height, decoded.channels), (4, 2, 3));
        assert_eq!(decoded.pixels, pixels);
    }

    #[test]
    fn test_decode_missing_file_reports_path() {
        let err = decode(Path::new("does_not_exist.png")).unwrap_err();
        assert!(err.to_string().contains("does_not_exist.png"));
    }

    #[test]
    fn test_encode_rejects_odd_channel_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.png");
        assert!(encode(&path, &[0; 10], 2, 1, 5).is_err());
    }
}
