//! Bitmap preprocessing ahead of OCR.
//!
//! Scanned training material is often stamped with a light diagonal
//! watermark. Raising contrast pushes the watermark towards white while
//! keeping dark text dark; a mild sharpen restores stroke edges softened by
//! the scan; a small median filter removes isolated speckles without
//! blurring glyph outlines the way a box or gaussian blur would.
//!
//! Contrast and sharpness are expressed as enhancement factors: `1.0` is the
//! identity, `0.0` yields the degenerate image (flat mean grey, or the
//! smoothed copy), values above `1.0` extrapolate away from it.

use crate::config::PreprocessOptions;
use image::{imageops, DynamicImage, RgbImage};
use imageproc::filter::median_filter;
use tracing::debug;

/// 3×3 smoothing kernel, normalised to sum to one.
const SMOOTH_KERNEL: [f32; 9] = [
    1.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
    5.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
];

/// Enhance a rendered page for OCR. Returns a new RGB image.
pub fn preprocess(img: &DynamicImage, opts: &PreprocessOptions) -> DynamicImage {
    let rgb = img.to_rgb8();
    let rgb = enhance_contrast(&rgb, opts.contrast);
    let rgb = enhance_sharpness(&rgb, opts.sharpness);
    let rgb = if opts.median_radius > 0 {
        median_filter(&rgb, opts.median_radius, opts.median_radius)
    } else {
        rgb
    };
    debug!(
        "Preprocessed {}x{} px (contrast {}, sharpness {}, median r={})",
        rgb.width(),
        rgb.height(),
        opts.contrast,
        opts.sharpness,
        opts.median_radius
    );
    DynamicImage::ImageRgb8(rgb)
}

/// Scale every channel away from the image's mean grey level.
pub fn enhance_contrast(img: &RgbImage, factor: f32) -> RgbImage {
    let mean = mean_luma(img);
    let mut out = img.clone();
    for px in out.pixels_mut() {
        for c in px.0.iter_mut() {
            *c = blend(mean, f32::from(*c), factor);
        }
    }
    out
}

/// Scale every channel away from a smoothed copy of the image.
///
/// The 1-pixel border has no full 3×3 neighbourhood and is left as is.
pub fn enhance_sharpness(img: &RgbImage, factor: f32) -> RgbImage {
    let (width, height) = img.dimensions();
    let smooth: RgbImage = imageops::filter3x3(img, &SMOOTH_KERNEL);
    let mut out = img.clone();
    for (x, y, px) in out.enumerate_pixels_mut() {
        if x == 0 || y == 0 || x + 1 >= width || y + 1 >= height {
            continue;
        }
        let sm = smooth.get_pixel(x, y);
        for (c, s) in px.0.iter_mut().zip(sm.0.iter()) {
            *c = blend(f32::from(*s), f32::from(*c), factor);
        }
    }
    out
}

/// `degenerate + factor · (value − degenerate)`, rounded into `0..=255`.
fn blend(degenerate: f32, value: f32, factor: f32) -> u8 {
    (degenerate + factor * (value - degenerate))
        .round()
        .clamp(0.0, 255.0) as u8
}

/// Mean ITU-R 601 luma, rounded to a whole grey level.
fn mean_luma(img: &RgbImage) -> f32 {
    let n = u64::from(img.width()) * u64::from(img.height());
    if n == 0 {
        return 0.0;
    }
    let sum: f64 = img
        .pixels()
        .map(|p| {
            let [r, g, b] = p.0;
            (299.0 * f64::from(r) + 587.0 * f64::from(g) + 114.0 * f64::from(b)) / 1000.0
        })
        .sum();
    (sum / n as f64).round() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb};

    fn identity() -> PreprocessOptions {
        PreprocessOptions {
            contrast: 1.0,
            sharpness: 1.0,
            median_radius: 0,
        }
    }

    #[test]
    fn keeps_dimensions_and_returns_rgb() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(40, 25, Luma([90])));
        let out = preprocess(&img, &PreprocessOptions::default());
        assert_eq!((out.width(), out.height()), (40, 25));
        assert!(matches!(out, DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn uniform_image_stays_uniform() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([128, 128, 128])));
        let out = preprocess(&img, &PreprocessOptions::default()).to_rgb8();
        for px in out.pixels() {
            for c in px.0 {
                assert!((127..=129).contains(&c), "got {c}");
            }
        }
    }

    #[test]
    fn contrast_spreads_around_mean() {
        let img = RgbImage::from_fn(10, 10, |x, _| {
            if x < 5 {
                Rgb([100, 100, 100])
            } else {
                Rgb([200, 200, 200])
            }
        });
        let out = enhance_contrast(&img, 1.5);
        assert_eq!(out.get_pixel(0, 0).0, [75, 75, 75]);
        assert_eq!(out.get_pixel(9, 9).0, [225, 225, 225]);
    }

    #[test]
    fn contrast_clamps() {
        let img = RgbImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        });
        let out = enhance_contrast(&img, 3.0);
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(out.get_pixel(1, 0).0, [255, 255, 255]);
    }

    #[test]
    fn unit_factors_are_identity() {
        let img = RgbImage::from_fn(8, 8, |x, y| Rgb([(x * 30) as u8, (y * 30) as u8, 77]));
        let out = preprocess(&DynamicImage::ImageRgb8(img.clone()), &identity()).to_rgb8();
        assert_eq!(out, img);
    }

    #[test]
    fn median_filter_removes_speckle() {
        let mut img = RgbImage::from_pixel(9, 9, Rgb([0, 0, 0]));
        img.put_pixel(4, 4, Rgb([255, 255, 255]));
        let opts = PreprocessOptions {
            median_radius: 1,
            ..identity()
        };
        let out = preprocess(&DynamicImage::ImageRgb8(img), &opts).to_rgb8();
        assert_eq!(out.get_pixel(4, 4).0, [0, 0, 0]);
    }

    #[test]
    fn sharpness_leaves_uniform_border_untouched() {
        let img = RgbImage::from_pixel(6, 6, Rgb([128, 128, 128]));
        let out = enhance_sharpness(&img, 1.3);
        assert_eq!(out.get_pixel(0, 0).0, [128, 128, 128]);
        assert_eq!(out.get_pixel(5, 3).0, [128, 128, 128]);
        assert_eq!(out, img);
    }

    #[test]
    fn sharpness_keeps_border_of_non_uniform_image() {
        let img = RgbImage::from_fn(5, 5, |x, y| Rgb([(x * 40) as u8, (y * 40) as u8, 90]));
        let out = enhance_sharpness(&img, 2.0);
        for x in 0..5 {
            assert_eq!(out.get_pixel(x, 0), img.get_pixel(x, 0));
            assert_eq!(out.get_pixel(x, 4), img.get_pixel(x, 4));
        }
    }

    #[test]
    fn sharpness_boosts_edges() {
        let img = RgbImage::from_fn(9, 9, |x, _| {
            if x < 4 {
                Rgb([60, 60, 60])
            } else {
                Rgb([180, 180, 180])
            }
        });
        let out = enhance_sharpness(&img, 2.0);
        // Dark side of the edge gets darker, light side lighter.
        assert!(out.get_pixel(3, 4).0[0] < 60);
        assert!(out.get_pixel(4, 4).0[0] > 180);
    }
}
