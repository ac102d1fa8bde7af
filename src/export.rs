//! Lossless export of rendered captures.

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Local};
use image::RgbaImage;

use crate::error::ExportError;

fn write_png<W: io::Write>(w: W, image: &RgbaImage) -> Result<(), png::EncodingError> {
    let mut encoder = png::Encoder::new(w, image.width(), image.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(image.as_raw())
}

fn ensure_not_empty(image: &RgbaImage) -> Result<(), ExportError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(ExportError::EmptyImage {
            width: image.width(),
            height: image.height(),
        });
    }
    Ok(())
}

/// Encode as 8-bit RGBA PNG.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ExportError> {
    ensure_not_empty(image)?;
    let mut data = Vec::new();
    write_png(&mut data, image)?;
    Ok(data)
}

pub fn save_png(image: &RgbaImage, path: &Path) -> Result<(), ExportError> {
    ensure_not_empty(image)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = BufWriter::new(File::create(path)?);
    write_png(file, image)?;
    log::info!("[export] saved {}x{} to {:?}", image.width(), image.height(), path);
    Ok(())
}

/// `screenshot_YYYYMMDD_HHMMSS.png`
pub fn timestamped_filename(at: DateTime<Local>) -> String {
    format!("screenshot_{}.png", at.format("%Y%m%d_%H%M%S"))
}

/// Save under `dir` with a timestamped name. A `_N` suffix is added when the name is taken.
pub fn save_capture(image: &RgbaImage, dir: &Path, at: DateTime<Local>) -> Result<PathBuf, ExportError> {
    let name = timestamped_filename(at);
    let mut path = dir.join(&name);
    let stem = name.trim_end_matches(".png");
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{stem}_{n}.png"));
        n += 1;
    }
    save_png(image, &path)?;
    Ok(path)
}

/// `data:image/png;base64,...` preview for UI and clipboard collaborators.
pub fn to_data_url(image: &RgbaImage) -> Result<String, ExportError> {
    let png_data = encode_png(image)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(&png_data)))
}

/// Downscale by `factor`, clamped to `0.1..=1.0`. Factors within 1% of 1.0 return a copy.
pub fn scale_image(image: &RgbaImage, factor: f32) -> RgbaImage {
    let factor = factor.clamp(0.1, 1.0);
    if (factor - 1.0).abs() <= 0.01 {
        return image.clone();
    }
    let new_w = ((image.width() as f32 * factor) as u32).max(1);
    let new_h = ((image.height() as f32 * factor) as u32).max(1);
    image::imageops::resize(image, new_w, new_h, image::imageops::FilterType::Lanczos3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use image::Rgba;

    fn sample() -> RgbaImage {
        RgbaImage::from_fn(8, 6, |x, y| Rgba([x as u8 * 30, y as u8 * 40, 7, 255]))
    }

    #[test]
    fn png_is_lossless() {
        let image = sample();
        let data = encode_png(&image).unwrap();
        assert_eq!(&data[..8], b"\x89PNG\r\n\x1a\n");
        let decoded = image::load_from_memory(&data).unwrap().to_rgba8();
        assert_eq!(decoded.as_raw(), image.as_raw());
    }

    #[test]
    fn empty_image_is_rejected() {
        assert!(matches!(
            encode_png(&RgbaImage::new(0, 5)),
            Err(ExportError::EmptyImage { width: 0, height: 5 })
        ));
    }

    #[test]
    fn filename_format() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(timestamped_filename(at), "screenshot_20240309_140507.png");
    }

    #[test]
    fn save_capture_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let first = save_capture(&sample(), dir.path(), at).unwrap();
        let second = save_capture(&sample(), dir.path(), at).unwrap();
        assert_ne!(first, second);
        assert!(second.ends_with("screenshot_20240309_140507_1.png"));
        assert!(first.exists() && second.exists());
    }

    #[test]
    fn data_url_prefix() {
        let url = to_data_url(&sample()).unwrap();
        assert!(url.starts_with("data:image/png;base64,iVBORw0KGgo"));
    }

    #[test]
    fn scale_clamps_factor() {
        let image = RgbaImage::new(100, 50);
        assert_eq!(scale_image(&image, 0.5).dimensions(), (50, 25));
        assert_eq!(scale_image(&image, 0.01).dimensions(), (10, 5));
        assert_eq!(scale_image(&image, 3.0).dimensions(), (100, 50));
    }
}
