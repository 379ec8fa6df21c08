//! Frame and capture-region primitives shared across the pipeline.

use image::RgbImage;

/// Rectangular screen region in virtual-screen coordinates.
///
/// `top`/`left` may be negative on multi-monitor layouts where a display sits
/// above or to the left of the primary one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRegion {
    pub top: i32,
    pub left: i32,
    pub width: u32,
    pub height: u32,
}

impl CaptureRegion {
    pub fn new(top: i32, left: i32, width: u32, height: u32) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// One captured frame in packed BGR layout, three bytes per pixel.
///
/// BGR matches the layout the detector's preprocessing expects, so the
/// conversion from the capture backend's RGBA happens exactly once per cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl Frame {
    /// Allocate a zero-filled (black) frame of the given dimensions.
    pub fn zeroed(width: u32, height: u32) -> Self {
        Self {
            data: vec![0; width as usize * height as usize * 3],
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Copy another frame's pixels into this one without reallocating when
    /// the dimensions already match.
    pub fn copy_from(&mut self, other: &Frame) {
        if self.width == other.width && self.height == other.height {
            self.data.copy_from_slice(&other.data);
        } else {
            self.data = other.data.clone();
            self.width = other.width;
            self.height = other.height;
        }
    }

    /// Overwrite this frame from a packed RGBA buffer of matching dimensions,
    /// dropping the alpha channel and swapping to BGR in one pass.
    pub(crate) fn fill_from_rgba(&mut self, rgba: &[u8]) {
        debug_assert_eq!(rgba.len(), self.data.len() / 3 * 4);
        for (bgr, px) in self.data.chunks_exact_mut(3).zip(rgba.chunks_exact(4)) {
            bgr[0] = px[2];
            bgr[1] = px[1];
            bgr[2] = px[0];
        }
    }

    /// Convert to an [`RgbImage`] for annotation and encoding.
    pub fn to_rgb_image(&self) -> RgbImage {
        let mut rgb = Vec::with_capacity(self.data.len());
        for bgr in self.data.chunks_exact(3) {
            rgb.extend_from_slice(&[bgr[2], bgr[1], bgr[0]]);
        }
        RgbImage::from_raw(self.width, self.height, rgb)
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_frame_is_black() {
        let frame = Frame::zeroed(4, 2);
        assert_eq!(frame.width(), 4);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.data().len(), 4 * 2 * 3);
        assert!(frame.data().iter().all(|&b| b == 0));
        assert!(!frame.is_empty());
    }

    #[test]
    fn rgba_fill_swaps_channels_and_drops_alpha() {
        let mut frame = Frame::zeroed(2, 1);
        // Pixel 0 pure red, pixel 1 pure blue, both fully opaque.
        let rgba = [255, 0, 0, 255, 0, 0, 255, 255];
        frame.fill_from_rgba(&rgba);
        assert_eq!(frame.data(), &[0, 0, 255, 255, 0, 0]);
    }

    #[test]
    fn rgb_conversion_restores_channel_order() {
        let mut frame = Frame::zeroed(1, 1);
        frame.fill_from_rgba(&[10, 20, 30, 255]);
        let rgb = frame.to_rgb_image();
        assert_eq!(rgb.get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn copy_from_handles_dimension_change() {
        let mut dst = Frame::zeroed(2, 2);
        let mut src = Frame::zeroed(1, 1);
        src.fill_from_rgba(&[1, 2, 3, 255]);
        dst.copy_from(&src);
        assert_eq!(dst.width(), 1);
        assert_eq!(dst.height(), 1);
        assert_eq!(dst.data(), src.data());
    }

    #[test]
    fn empty_region_reports_empty() {
        assert!(CaptureRegion::new(0, 0, 0, 5).is_empty());
        assert!(!CaptureRegion::new(-10, -10, 5, 5).is_empty());
        assert_eq!(CaptureRegion::new(0, 0, 3, 4).pixel_count(), 12);
    }
}
