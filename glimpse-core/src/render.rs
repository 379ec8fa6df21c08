//! Overlay rendering for detection results.
//!
//! Each detection gets a colored box plus a confidence label drawn on a
//! filled background above the box's top-left corner. Colors come from a
//! fixed palette indexed by detection order, so the same slot keeps the same
//! color from frame to frame.

use image::{Rgb, RgbImage};
use imageproc::{
    drawing::{draw_filled_rect_mut, draw_hollow_rect_mut},
    rect::Rect,
};

use crate::detect::DetectionBox;
use crate::frame::Frame;

mod glyphs;

const PALETTE_SIZE: usize = 10;
const BOX_THICKNESS: i32 = 2;
const LABEL_PADDING: i32 = 5;

/// Draws detection overlays onto captured frames.
#[derive(Debug, Clone)]
pub struct Renderer {
    palette: [Rgb<u8>; PALETTE_SIZE],
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            palette: [
                Rgb([230, 25, 75]),
                Rgb([60, 180, 75]),
                Rgb([255, 225, 25]),
                Rgb([0, 130, 200]),
                Rgb([245, 130, 48]),
                Rgb([145, 30, 180]),
                Rgb([70, 240, 240]),
                Rgb([240, 50, 230]),
                Rgb([210, 245, 60]),
                Rgb([250, 190, 212]),
            ],
        }
    }

    /// Render the frame with every detection's box and confidence label.
    ///
    /// Boxes are assumed to be in frame coordinates already; anything that
    /// would land outside the image is skipped or clipped rather than
    /// reported as an error.
    pub fn draw(&self, frame: &Frame, detections: &[DetectionBox]) -> RgbImage {
        let mut display = frame.to_rgb_image();
        let (img_w, img_h) = display.dimensions();
        if img_w == 0 || img_h == 0 {
            return display;
        }

        for (index, detection) in detections.iter().enumerate() {
            let color = self.palette[index % PALETTE_SIZE];
            draw_box(&mut display, detection, color);
            draw_label(&mut display, detection, color);
        }

        display
    }
}

/// Hollow rectangle thickened by drawing nested one-pixel outlines.
fn draw_box(image: &mut RgbImage, detection: &DetectionBox, color: Rgb<u8>) {
    let (img_w, img_h) = image.dimensions();
    for inset in 0..BOX_THICKNESS {
        let x1 = detection.x1 + inset;
        let y1 = detection.y1 + inset;
        let x2 = detection.x2 - inset;
        let y2 = detection.y2 - inset;
        if x2 <= x1 || y2 <= y1 {
            break;
        }
        let rect = clipped_rect(x1, y1, x2, y2, img_w, img_h);
        if let Some(rect) = rect {
            draw_hollow_rect_mut(image, rect, color);
        }
    }
}

/// Confidence text on a filled strip above the box, clamped into the image.
fn draw_label(image: &mut RgbImage, detection: &DetectionBox, color: Rgb<u8>) {
    let (img_w, img_h) = image.dimensions();
    let text = format!("{:.2}", detection.confidence);
    let (text_w, text_h) = glyphs::text_size(&text);

    let x = detection.x1.clamp(0, img_w as i32 - 1);
    let mut top = detection.y1 - text_h as i32 - LABEL_PADDING;
    if top < 0 {
        // Not enough room above the box, draw inside it instead.
        top = detection.y1 + BOX_THICKNESS;
    }
    let top = top.clamp(0, (img_h as i32 - 1).max(0));

    let strip_w = (text_w as i32 + LABEL_PADDING).min(img_w as i32 - x);
    let strip_h = (text_h as i32 + LABEL_PADDING).min(img_h as i32 - top);
    if strip_w <= 0 || strip_h <= 0 {
        return;
    }
    draw_filled_rect_mut(
        image,
        Rect::at(x, top).of_size(strip_w as u32, strip_h as u32),
        color,
    );

    glyphs::draw_text(
        image,
        &text,
        x + LABEL_PADDING / 2,
        top + LABEL_PADDING / 2,
        Rgb([255, 255, 255]),
    );
}

fn clipped_rect(x1: i32, y1: i32, x2: i32, y2: i32, img_w: u32, img_h: u32) -> Option<Rect> {
    let max_x = img_w as i32 - 1;
    let max_y = img_h as i32 - 1;
    let cx1 = x1.clamp(0, max_x);
    let cy1 = y1.clamp(0, max_y);
    let cx2 = x2.clamp(0, max_x);
    let cy2 = y2.clamp(0, max_y);
    if cx2 <= cx1 || cy2 <= cy1 {
        return None;
    }
    Some(Rect::at(cx1, cy1).of_size((cx2 - cx1 + 1) as u32, (cy2 - cy1 + 1) as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(x1: i32, y1: i32, x2: i32, y2: i32, confidence: f32) -> DetectionBox {
        DetectionBox {
            x1,
            y1,
            x2,
            y2,
            confidence,
        }
    }

    #[test]
    fn no_detections_leaves_frame_untouched() {
        let frame = Frame::zeroed(32, 32);
        let display = Renderer::new().draw(&frame, &[]);
        assert!(display.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn first_detection_uses_first_palette_color() {
        let frame = Frame::zeroed(64, 64);
        let renderer = Renderer::new();
        let display = renderer.draw(&frame, &[boxed(30, 30, 50, 50, 0.9)]);
        assert_eq!(display.get_pixel(30, 30).0, [230, 25, 75]);
        // Second ring of the 2px outline.
        assert_eq!(display.get_pixel(31, 31).0, [230, 25, 75]);
    }

    #[test]
    fn palette_wraps_after_ten_detections() {
        let frame = Frame::zeroed(200, 200);
        let renderer = Renderer::new();
        let detections: Vec<DetectionBox> = (0..11)
            .map(|i| {
                let y = 20 + i * 15;
                boxed(5, y, 190, y + 10, 0.9)
            })
            .collect();
        let display = renderer.draw(&frame, &detections);
        // Detection 10 reuses color 0.
        assert_eq!(display.get_pixel(5, 170).0, [230, 25, 75]);
    }

    #[test]
    fn label_near_top_edge_does_not_panic() {
        let frame = Frame::zeroed(64, 64);
        let display = Renderer::new().draw(&frame, &[boxed(0, 0, 20, 20, 0.75)]);
        assert_eq!(display.dimensions(), (64, 64));
    }

    #[test]
    fn box_partially_outside_image_is_clipped() {
        let frame = Frame::zeroed(40, 40);
        let display = Renderer::new().draw(&frame, &[boxed(-10, -10, 100, 100, 0.8)]);
        assert_eq!(display.dimensions(), (40, 40));
    }
}
