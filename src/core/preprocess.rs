//! Image preparation ahead of OCR: upscale, grayscale, autocontrast.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage};

/// Upscaling never pushes the longer side beyond this many pixels.
pub const MAX_OCR_SIDE: u32 = 5000;

/// Share of darkest and brightest pixels ignored by [`autocontrast`], in percent.
pub const AUTOCONTRAST_CUTOFF: f64 = 1.0;

pub fn preprocess(image: &DynamicImage, upscale: u32) -> GrayImage {
    let factor = effective_upscale(image.width(), image.height(), upscale);

    let gray = if factor > 1 {
        image
            .resize_exact(
                image.width() * factor,
                image.height() * factor,
                FilterType::Lanczos3,
            )
            .to_luma8()
    } else {
        image.to_luma8()
    };

    autocontrast(&gray, AUTOCONTRAST_CUTOFF)
}

fn effective_upscale(width: u32, height: u32, requested: u32) -> u32 {
    let longest = width.max(height).max(1);
    requested.clamp(1, (MAX_OCR_SIDE / longest).max(1))
}

/// Linearly stretches intensities so the `cutoff` percent darkest pixels map
/// to 0 and the `cutoff` percent brightest map to 255.
///
/// An image whose remaining range is a single level is returned unchanged.
pub fn autocontrast(image: &GrayImage, cutoff: f64) -> GrayImage {
    let mut histogram = [0u64; 256];
    for pixel in image.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return image.clone();
    }
    let cut = (total as f64 * cutoff / 100.0) as u64;

    let mut low = 0usize;
    let mut seen = 0u64;
    for (level, count) in histogram.iter().enumerate() {
        seen += count;
        if seen > cut {
            low = level;
            break;
        }
    }

    let mut high = 255usize;
    seen = 0;
    for (level, count) in histogram.iter().enumerate().rev() {
        seen += count;
        if seen > cut {
            high = level;
            break;
        }
    }

    if high <= low {
        return image.clone();
    }

    let scale = 255.0 / (high - low) as f64;
    let mut lut = [0u8; 256];
    for (level, slot) in lut.iter_mut().enumerate() {
        let stretched = (level as f64 - low as f64) * scale;
        *slot = stretched.round().clamp(0.0, 255.0) as u8;
    }

    let mut output = image.clone();
    for pixel in output.pixels_mut() {
        pixel.0[0] = lut[pixel.0[0] as usize];
    }
    output
}
