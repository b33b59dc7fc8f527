//! Violation frame annotation
//!
//! Renders evidence overlays onto the frame that triggered a violation and
//! re-encodes it twice: a full-resolution copy for file storage and a
//! smaller inline copy for embedding in violation records.
//!
//! Overlays: the offending hand's bounding box in red with a violation
//! label, the ROI outline in yellow, a timestamp in the top-left corner and
//! a severity banner along the bottom edge.

use ab_glyph::{FontRef, PxScale};
use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use scooper_watch_common::{BoundingBox, Severity};
use thiserror::Error;
use tracing::debug;

/// JPEG quality for the stored file copy
const FILE_JPEG_QUALITY: u8 = 85;
/// JPEG quality for the inline copy
const INLINE_JPEG_QUALITY: u8 = 70;
/// Maximum dimensions of the inline copy
const INLINE_MAX_SIZE: (u32, u32) = (800, 600);

const VIOLATION_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const ROI_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Errors that can occur while annotating a frame
#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error("Failed to decode frame: {0}")]
    Decode(String),

    #[error("Failed to encode frame: {0}")]
    Encode(String),
}

/// Rendering options
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationStyle {
    /// Line thickness for the hand bounding box
    pub violation_thickness: u32,
    /// Line thickness for the ROI outline
    pub roi_thickness: u32,
    /// Font scale for labels
    pub font_scale: f32,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            violation_thickness: 3,
            roi_thickness: 2,
            font_scale: 18.0,
        }
    }
}

/// What to draw on a violation frame
#[derive(Debug, Clone)]
pub struct ViolationOverlay {
    /// Bounding box of the offending hand
    pub hand_bbox: BoundingBox,
    /// Label next to the hand box, e.g. `hand_without_scooper (0.87)`
    pub label: String,
    pub roi_name: String,
    /// Axis-aligned ROI envelope
    pub roi_bounds: BoundingBox,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

/// Result of annotating one frame
#[derive(Debug, Clone)]
pub struct AnnotatedFrame {
    /// Full-resolution JPEG (quality 85) for file storage
    pub full_jpeg: Vec<u8>,
    /// Resized JPEG (quality 70, at most 800x600) for inline embedding
    pub inline_jpeg: Vec<u8>,
    /// Dimensions of the source frame
    pub width: u32,
    pub height: u32,
}

fn severity_color(severity: Severity) -> Rgb<u8> {
    match severity {
        Severity::Low => Rgb([0, 200, 0]),
        Severity::Medium => Rgb([255, 165, 0]),
        Severity::High => Rgb([255, 0, 0]),
    }
}

fn font() -> FontRef<'static> {
    let font_data = include_bytes!("../assets/DejaVuSansMono.ttf");
    FontRef::try_from_slice(font_data).expect("embedded font is valid")
}

/// Annotate the violation frame and produce both JPEG copies
pub fn annotate_violation_frame(
    jpeg_bytes: &[u8],
    overlay: &ViolationOverlay,
    style: &AnnotationStyle,
) -> Result<AnnotatedFrame, AnnotateError> {
    let decoded = image::load_from_memory(jpeg_bytes)
        .map_err(|e| AnnotateError::Decode(e.to_string()))?;
    let mut img = decoded.to_rgb8();
    let (width, height) = img.dimensions();

    let font = font();
    let scale = PxScale::from(style.font_scale);

    draw_roi_outline(&mut img, overlay, style, &font, scale);
    draw_hand_box(&mut img, overlay, style, &font, scale);
    draw_timestamp(&mut img, overlay.timestamp, &font, scale);
    draw_severity_banner(&mut img, overlay.severity, &font, scale);

    let full_jpeg = encode_jpeg(&img, FILE_JPEG_QUALITY)?;
    let inline = fit_within(&img, INLINE_MAX_SIZE);
    let inline_jpeg = encode_jpeg(&inline, INLINE_JPEG_QUALITY)?;

    debug!(
        width,
        height,
        full_bytes = full_jpeg.len(),
        inline_bytes = inline_jpeg.len(),
        "violation frame annotated"
    );

    Ok(AnnotatedFrame {
        full_jpeg,
        inline_jpeg,
        width,
        height,
    })
}

/// Clamp a bounding box to image bounds, returning `None` when it lies
/// entirely outside
fn clamp_rect(bbox: BoundingBox, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    let x = (bbox.x.max(0.0) as u32).min(width.saturating_sub(1));
    let y = (bbox.y.max(0.0) as u32).min(height.saturating_sub(1));
    let w = (bbox.width.max(0.0) as u32).min(width.saturating_sub(x));
    let h = (bbox.height.max(0.0) as u32).min(height.saturating_sub(y));
    if w == 0 || h == 0 {
        return None;
    }
    Some((x, y, w, h))
}

fn draw_thick_hollow_rect(
    img: &mut RgbImage,
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    thickness: u32,
    color: Rgb<u8>,
) {
    for t in 0..thickness {
        let inner_w = w.saturating_sub(2 * t);
        let inner_h = h.saturating_sub(2 * t);
        if inner_w > 0 && inner_h > 0 {
            let rect = Rect::at((x + t) as i32, (y + t) as i32).of_size(inner_w, inner_h);
            draw_hollow_rect_mut(img, rect, color);
        }
    }
}

fn draw_label(
    img: &mut RgbImage,
    text: &str,
    x: u32,
    y: u32,
    bg_color: Rgb<u8>,
    font: &FontRef<'_>,
    scale: PxScale,
) {
    let (width, height) = img.dimensions();
    let bg_w = (text.len() as u32 * (scale.x * 0.6) as u32).min(width.saturating_sub(x));
    let bg_h = (scale.y as u32 + 4).min(height.saturating_sub(y));
    if bg_w == 0 || bg_h == 0 {
        return;
    }
    draw_filled_rect_mut(
        img,
        Rect::at(x as i32, y as i32).of_size(bg_w, bg_h),
        bg_color,
    );
    draw_text_mut(img, TEXT_COLOR, x as i32 + 2, y as i32 + 2, scale, font, text);
}

fn draw_hand_box(
    img: &mut RgbImage,
    overlay: &ViolationOverlay,
    style: &AnnotationStyle,
    font: &FontRef<'_>,
    scale: PxScale,
) {
    let (width, height) = img.dimensions();
    let Some((x, y, w, h)) = clamp_rect(overlay.hand_bbox, width, height) else {
        return;
    };
    draw_thick_hollow_rect(img, x, y, w, h, style.violation_thickness, VIOLATION_COLOR);

    let label_h = scale.y as u32 + 4;
    let label_y = if y > label_h { y - label_h } else { y + h + 2 };
    draw_label(img, &overlay.label, x, label_y, VIOLATION_COLOR, font, scale);
}

fn draw_roi_outline(
    img: &mut RgbImage,
    overlay: &ViolationOverlay,
    style: &AnnotationStyle,
    font: &FontRef<'_>,
    scale: PxScale,
) {
    let (width, height) = img.dimensions();
    let Some((x, y, w, h)) = clamp_rect(overlay.roi_bounds, width, height) else {
        return;
    };
    draw_thick_hollow_rect(img, x, y, w, h, style.roi_thickness, ROI_COLOR);

    let text = format!("ROI: {}", overlay.roi_name);
    let label_h = scale.y as u32 + 4;
    let label_y = if y > label_h { y - label_h } else { y };
    draw_text_mut(img, ROI_COLOR, x as i32, label_y as i32, scale, font, &text);
}

fn draw_timestamp(img: &mut RgbImage, timestamp: DateTime<Utc>, font: &FontRef<'_>, scale: PxScale) {
    let text = timestamp.format("%Y-%m-%d %H:%M:%S").to_string();
    draw_text_mut(img, TEXT_COLOR, 10, 10, scale, font, &text);
}

fn draw_severity_banner(
    img: &mut RgbImage,
    severity: Severity,
    font: &FontRef<'_>,
    scale: PxScale,
) {
    let (_, height) = img.dimensions();
    let text = format!("SEVERITY: {}", severity.as_str().to_uppercase());
    let y = height.saturating_sub(scale.y as u32 + 10);
    draw_text_mut(
        img,
        severity_color(severity),
        10,
        y as i32,
        scale,
        font,
        &text,
    );
}

/// Downscale to fit within `max`, preserving aspect ratio. Images already
/// within bounds are returned unchanged.
fn fit_within(img: &RgbImage, max: (u32, u32)) -> RgbImage {
    let (width, height) = img.dimensions();
    let scale = (max.0 as f32 / width as f32).min(max.1 as f32 / height as f32);
    if scale >= 1.0 {
        return img.clone();
    }
    let new_width = ((width as f32 * scale) as u32).max(1);
    let new_height = ((height as f32 * scale) as u32).max(1);
    imageops::resize(img, new_width, new_height, imageops::FilterType::Triangle)
}

fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>, AnnotateError> {
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, quality);
    img.write_with_encoder(encoder)
        .map_err(|e| AnnotateError::Encode(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_frame(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, _| {
            if x % 2 == 0 {
                Rgb([90, 90, 90])
            } else {
                Rgb([120, 120, 120])
            }
        });
        encode_jpeg(&img, 90).unwrap()
    }

    fn overlay() -> ViolationOverlay {
        ViolationOverlay {
            hand_bbox: BoundingBox::new(500.0, 400.0, 60.0, 60.0),
            label: "hand_without_scooper (0.87)".to_string(),
            roi_name: "sauce_station".to_string(),
            roi_bounds: BoundingBox::new(450.0, 350.0, 200.0, 200.0),
            severity: Severity::High,
            timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_annotate_keeps_full_resolution() {
        let jpeg = test_frame(1280, 720);
        let result =
            annotate_violation_frame(&jpeg, &overlay(), &AnnotationStyle::default()).unwrap();

        assert_eq!((result.width, result.height), (1280, 720));
        let full = image::load_from_memory(&result.full_jpeg).unwrap();
        assert_eq!((full.width(), full.height()), (1280, 720));
    }

    #[test]
    fn test_inline_copy_fits_bounds() {
        let jpeg = test_frame(1920, 1080);
        let result =
            annotate_violation_frame(&jpeg, &overlay(), &AnnotationStyle::default()).unwrap();

        let inline = image::load_from_memory(&result.inline_jpeg).unwrap();
        assert!(inline.width() <= 800);
        assert!(inline.height() <= 600);
        // Aspect ratio preserved
        let ratio = inline.width() as f32 / inline.height() as f32;
        assert!((ratio - 1920.0 / 1080.0).abs() < 0.05);
    }

    #[test]
    fn test_small_frame_not_upscaled() {
        let jpeg = test_frame(640, 480);
        let result =
            annotate_violation_frame(&jpeg, &overlay(), &AnnotationStyle::default()).unwrap();

        let inline = image::load_from_memory(&result.inline_jpeg).unwrap();
        assert_eq!((inline.width(), inline.height()), (640, 480));
    }

    #[test]
    fn test_overlay_changes_pixels() {
        let jpeg = test_frame(1280, 720);
        let result =
            annotate_violation_frame(&jpeg, &overlay(), &AnnotationStyle::default()).unwrap();

        let original = image::load_from_memory(&jpeg).unwrap().to_rgb8();
        let annotated = image::load_from_memory(&result.full_jpeg).unwrap().to_rgb8();
        // The hand box edge must now be strongly red
        let px = annotated.get_pixel(530, 400);
        let orig = original.get_pixel(530, 400);
        assert!(px.0[0] > orig.0[0], "expected red channel boost at box edge");
    }

    #[test]
    fn test_out_of_bounds_boxes_are_clamped() {
        let jpeg = test_frame(320, 240);
        // Boxes far outside the frame must not panic
        let overlay = ViolationOverlay {
            hand_bbox: BoundingBox::new(5000.0, 5000.0, 50.0, 50.0),
            roi_bounds: BoundingBox::new(-100.0, -100.0, 150.0, 150.0),
            ..self::overlay()
        };
        let result =
            annotate_violation_frame(&jpeg, &overlay, &AnnotationStyle::default()).unwrap();
        assert!(!result.full_jpeg.is_empty());
    }

    #[test]
    fn test_invalid_jpeg_rejected() {
        let result = annotate_violation_frame(
            &[0x00, 0x01, 0x02],
            &overlay(),
            &AnnotationStyle::default(),
        );
        assert!(matches!(result, Err(AnnotateError::Decode(_))));
    }
}
