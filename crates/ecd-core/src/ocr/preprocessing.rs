//! Image normalization ahead of recognition.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, GrayImage, Luma};
use imageproc::filter::{gaussian_blur_f32, median_filter};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use tracing::debug;

use crate::error::OcrError;
use crate::models::config::{Binarization, PreprocessOptions};

/// Longest side of the copy used for skew estimation.
const SKEW_SAMPLE_SIZE: u32 = 800;

/// Pixels darker than this count as ink during skew estimation.
const INK_LEVEL: u8 = 128;

/// Image preprocessor for the OCR pipeline.
///
/// Stages run in a fixed order: grayscale, contrast, sharpness, deskew,
/// denoise, binarization. The input image is never modified.
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    options: PreprocessOptions,
}

impl ImagePreprocessor {
    /// Create a new preprocessor with default settings.
    pub fn new() -> Self {
        Self {
            options: PreprocessOptions::default(),
        }
    }

    /// Replace the normalization options.
    pub fn with_options(mut self, options: PreprocessOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &PreprocessOptions {
        &self.options
    }

    /// Decode an encoded page image.
    pub fn decode(bytes: &[u8]) -> Result<DynamicImage, OcrError> {
        image::load_from_memory(bytes).map_err(|e| OcrError::InvalidImage(e.to_string()))
    }

    /// Decode and normalize an encoded page image.
    pub fn process_bytes(&self, bytes: &[u8]) -> Result<DynamicImage, OcrError> {
        let image = Self::decode(bytes)?;
        self.process(&image)
    }

    /// Normalize with the configured options.
    pub fn process(&self, image: &DynamicImage) -> Result<DynamicImage, OcrError> {
        Self::normalize(image, &self.options)
    }

    /// Normalize an image for recognition.
    pub fn normalize(
        image: &DynamicImage,
        options: &PreprocessOptions,
    ) -> Result<DynamicImage, OcrError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(OcrError::InvalidImage(format!(
                "image has zero size ({}x{})",
                width, height
            )));
        }
        debug!("Normalizing {}x{} image", width, height);

        let mut gray = if options.grayscale {
            let mut gray = image.to_luma8();
            let mean = mean_luma(&gray);
            apply_contrast(&mut gray, mean, options.contrast_factor);
            let blurred = gaussian_blur_f32(&gray, 1.0);
            apply_sharpness(&mut gray, &blurred, options.sharpness_factor);
            gray
        } else {
            // Enhance the color channels, then reduce to luminance for the
            // geometric and thresholding stages.
            let mut rgb = image.to_rgb8();
            let mean = mean_luma(&image.to_luma8());
            apply_contrast(&mut rgb, mean, options.contrast_factor);
            let blurred = gaussian_blur_f32(&rgb, 1.0);
            apply_sharpness(&mut rgb, &blurred, options.sharpness_factor);
            DynamicImage::ImageRgb8(rgb).to_luma8()
        };

        if options.deskew {
            let skew = detect_skew(&gray, options.max_skew_degrees, options.skew_step_degrees);
            if skew.abs() > options.skew_threshold_degrees {
                debug!("Correcting skew of {:.2} degrees", skew);
                gray = rotate_expanded(&gray, -skew);
            } else {
                debug!("Skew {:.2} degrees within threshold, not rotating", skew);
            }
        }

        if options.denoise {
            gray = median_filter(&gray, 1, 1);
        }

        let binary = match options.binarization {
            Binarization::Fixed { threshold } => fixed_threshold(&gray, threshold),
            Binarization::Adaptive {
                block_radius,
                offset,
            } => adaptive_threshold(&gray, block_radius, offset),
        };

        Ok(DynamicImage::ImageLuma8(binary))
    }
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

fn mean_luma(gray: &GrayImage) -> f32 {
    let count = gray.len().max(1) as f64;
    let sum: u64 = gray.iter().map(|&v| v as u64).sum();
    (sum as f64 / count) as f32
}

/// Blend every channel away from the mean luminance.
fn apply_contrast<P>(image: &mut image::ImageBuffer<P, Vec<u8>>, mean: f32, factor: f32)
where
    P: image::Pixel<Subpixel = u8>,
{
    if (factor - 1.0).abs() < f32::EPSILON {
        return;
    }
    for value in image.iter_mut() {
        *value = blend(mean, *value as f32, factor);
    }
}

/// Blend every channel away from its blurred counterpart.
fn apply_sharpness<P>(
    image: &mut image::ImageBuffer<P, Vec<u8>>,
    blurred: &image::ImageBuffer<P, Vec<u8>>,
    factor: f32,
) where
    P: image::Pixel<Subpixel = u8>,
{
    if (factor - 1.0).abs() < f32::EPSILON {
        return;
    }
    for (value, &soft) in image.iter_mut().zip(blurred.iter()) {
        *value = blend(soft as f32, *value as f32, factor);
    }
}

fn blend(base: f32, value: f32, factor: f32) -> u8 {
    (base + factor * (value - base)).round().clamp(0.0, 255.0) as u8
}

/// Estimate page skew in degrees (positive = clockwise).
///
/// Projection-profile search: for each candidate angle the ink pixels are
/// projected onto the axis perpendicular to that angle and the energy of the
/// resulting histogram is measured. Text lines collapse into sharp peaks at
/// the true skew, which maximizes the energy.
pub fn detect_skew(gray: &GrayImage, max_degrees: f32, step_degrees: f32) -> f32 {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 || max_degrees <= 0.0 || step_degrees <= 0.0 {
        return 0.0;
    }

    let scale = (SKEW_SAMPLE_SIZE as f32 / width.max(height) as f32).min(1.0);
    let sample = if scale < 1.0 {
        let w = ((width as f32 * scale) as u32).max(1);
        let h = ((height as f32 * scale) as u32).max(1);
        imageops::resize(gray, w, h, FilterType::Triangle)
    } else {
        gray.clone()
    };

    let ink: Vec<(f32, f32)> = sample
        .enumerate_pixels()
        .filter(|(_, _, p)| p[0] < INK_LEVEL)
        .map(|(x, y, _)| (x as f32, y as f32))
        .collect();
    if ink.is_empty() {
        return 0.0;
    }

    let (sw, sh) = sample.dimensions();
    let max_shift = (sw as f32 * max_degrees.to_radians().tan()).ceil() as i64 + 1;
    let bins = sh as i64 + 2 * max_shift + 1;

    let steps = (max_degrees / step_degrees).round() as i32;
    let mut best_angle = 0.0f32;
    let mut best_energy = 0u64;
    let mut histogram = vec![0u64; bins as usize];

    for i in -steps..=steps {
        let angle = i as f32 * step_degrees;
        let slope = angle.to_radians().tan();
        histogram.iter_mut().for_each(|b| *b = 0);

        for &(x, y) in &ink {
            let bin = (y - x * slope).round() as i64 + max_shift;
            if (0..bins).contains(&bin) {
                histogram[bin as usize] += 1;
            }
        }

        let energy: u64 = histogram.iter().map(|&c| c * c).sum();
        // Ties go to the smaller rotation.
        if energy > best_energy || (energy == best_energy && angle.abs() < best_angle.abs()) {
            best_energy = energy;
            best_angle = angle;
        }
    }

    best_angle
}

/// Rotate clockwise by `degrees` on a canvas large enough to keep every
/// source pixel. Uncovered areas are white.
fn rotate_expanded(gray: &GrayImage, degrees: f32) -> GrayImage {
    let (width, height) = gray.dimensions();
    let radians = degrees.to_radians();
    let (sin, cos) = (radians.sin().abs(), radians.cos().abs());
    let new_width = (width as f32 * cos + height as f32 * sin).ceil() as u32;
    let new_height = (width as f32 * sin + height as f32 * cos).ceil() as u32;

    let mut canvas = GrayImage::from_pixel(new_width.max(width), new_height.max(height), Luma([255]));
    let x = ((canvas.width() - width) / 2) as i64;
    let y = ((canvas.height() - height) / 2) as i64;
    imageops::overlay(&mut canvas, gray, x, y);

    rotate_about_center(&canvas, radians, Interpolation::Bilinear, Luma([255]))
}

fn fixed_threshold(gray: &GrayImage, threshold: u8) -> GrayImage {
    let mut output = gray.clone();
    for value in output.iter_mut() {
        *value = if *value >= threshold { 255 } else { 0 };
    }
    output
}

fn adaptive_threshold(gray: &GrayImage, block_radius: u32, offset: i32) -> GrayImage {
    let (width, height) = gray.dimensions();
    let integral = integral_image(gray);
    let stride = (width + 1) as usize;
    let mut output = GrayImage::new(width, height);

    for y in 0..height {
        for x in 0..width {
            let x1 = x.saturating_sub(block_radius) as usize;
            let y1 = y.saturating_sub(block_radius) as usize;
            let x2 = ((x + block_radius + 1) as usize).min(width as usize);
            let y2 = ((y + block_radius + 1) as usize).min(height as usize);
            let area = ((x2 - x1) * (y2 - y1)) as f64;

            let sum = integral[y2 * stride + x2] as f64 - integral[y1 * stride + x2] as f64
                - integral[y2 * stride + x1] as f64
                + integral[y1 * stride + x1] as f64;

            let threshold = ((sum / area) as i32 - offset).clamp(0, 255);
            let value = gray.get_pixel(x, y)[0] as i32;
            let binary = if value < threshold { 0u8 } else { 255u8 };
            output.put_pixel(x, y, Luma([binary]));
        }
    }

    output
}

/// Summed-area table with a zero border: `(width + 1) x (height + 1)`.
fn integral_image(gray: &GrayImage) -> Vec<u64> {
    let (w, h) = gray.dimensions();
    let stride = (w + 1) as usize;
    let mut table = vec![0u64; stride * (h + 1) as usize];

    for y in 0..h {
        let mut row_sum = 0u64;
        for x in 0..w {
            row_sum += gray.get_pixel(x, y)[0] as u64;
            let idx = (y + 1) as usize * stride + (x + 1) as usize;
            table[idx] = row_sum + table[y as usize * stride + (x + 1) as usize];
        }
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    /// White page with evenly spaced black text-like bars.
    fn ruled_page(width: u32, height: u32) -> GrayImage {
        let mut page = GrayImage::from_pixel(width, height, Luma([255]));
        for row in (40..height - 40).step_by(24) {
            for y in row..row + 4 {
                for x in 60..width - 60 {
                    page.put_pixel(x, y, Luma([0]));
                }
            }
        }
        page
    }

    fn skewed(page: &GrayImage, degrees: f32) -> GrayImage {
        rotate_about_center(page, degrees.to_radians(), Interpolation::Bilinear, Luma([255]))
    }

    #[test]
    fn test_detects_known_skew() {
        let page = skewed(&ruled_page(600, 400), 1.2);
        let detected = detect_skew(&page, 5.0, 0.1);
        assert!((detected - 1.2).abs() < 0.25, "detected {}", detected);
    }

    #[test]
    fn test_straight_page_has_no_skew() {
        let detected = detect_skew(&ruled_page(600, 400), 5.0, 0.1);
        assert!(detected.abs() < 0.15, "detected {}", detected);
    }

    #[test]
    fn test_small_skew_is_left_alone() {
        let page = DynamicImage::ImageLuma8(skewed(&ruled_page(600, 400), 0.3));
        let out = ImagePreprocessor::new().process(&page).unwrap();
        assert_eq!(out.dimensions(), (600, 400));
    }

    #[test]
    fn test_large_skew_is_corrected_with_white_corners() {
        let page = DynamicImage::ImageLuma8(skewed(&ruled_page(600, 400), 1.2));
        let out = ImagePreprocessor::new().process(&page).unwrap().to_luma8();

        assert!(out.width() > 600 && out.height() > 400);
        assert_eq!(out.get_pixel(0, 0)[0], 255);
        assert_eq!(out.get_pixel(out.width() - 1, out.height() - 1)[0], 255);

        let residual = detect_skew(&out, 5.0, 0.1);
        assert!(residual.abs() < 0.35, "residual {}", residual);
    }

    #[test]
    fn test_input_is_not_mutated() {
        let page = DynamicImage::ImageLuma8(skewed(&ruled_page(300, 200), 2.0));
        let before = page.clone();
        let _ = ImagePreprocessor::new().process(&page).unwrap();
        assert_eq!(page.as_bytes(), before.as_bytes());
    }

    #[test]
    fn test_output_is_binary() {
        let mut page = GrayImage::new(64, 64);
        for (x, y, p) in page.enumerate_pixels_mut() {
            *p = Luma([((x + y) * 2) as u8]);
        }
        let options = PreprocessOptions {
            binarization: Binarization::Adaptive {
                block_radius: 7,
                offset: 5,
            },
            deskew: false,
            denoise: true,
            ..Default::default()
        };
        let out = ImagePreprocessor::normalize(&DynamicImage::ImageLuma8(page), &options)
            .unwrap()
            .to_luma8();
        assert!(out.iter().all(|&v| v == 0 || v == 255));
    }

    #[test]
    fn test_zero_size_is_invalid() {
        let empty = DynamicImage::ImageLuma8(GrayImage::new(0, 0));
        let err = ImagePreprocessor::new().process(&empty).unwrap_err();
        assert!(matches!(err, OcrError::InvalidImage(_)));
    }

    #[test]
    fn test_undecodable_bytes_are_invalid() {
        let err = ImagePreprocessor::decode(b"not an image").unwrap_err();
        assert!(matches!(err, OcrError::InvalidImage(_)));
    }

    #[test]
    fn test_adaptive_threshold_follows_local_background() {
        // Dark left half, light right half, one faint mark on each.
        let mut page = GrayImage::from_fn(64, 16, |x, _| Luma([if x < 32 { 60 } else { 220 }]));
        page.put_pixel(10, 8, Luma([20]));
        page.put_pixel(50, 8, Luma([180]));

        let out = adaptive_threshold(&page, 3, 5);
        assert_eq!(out.get_pixel(5, 8)[0], 255);
        assert_eq!(out.get_pixel(45, 8)[0], 255);
        assert_eq!(out.get_pixel(10, 8)[0], 0);
        assert_eq!(out.get_pixel(50, 8)[0], 0);

        // A single global cut cannot keep both backgrounds white and both marks black.
        let fixed = fixed_threshold(&page, 128);
        assert_eq!(fixed.get_pixel(5, 8)[0], 0);
        assert_eq!(fixed.get_pixel(50, 8)[0], 255);
    }

    #[test]
    fn test_fixed_threshold_boundary() {
        let page = GrayImage::from_fn(3, 1, |x, _| Luma([[179u8, 180, 181][x as usize]]));
        let out = fixed_threshold(&page, 180);
        assert_eq!(out.as_raw(), &vec![0, 255, 255]);
    }
}
