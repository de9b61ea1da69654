// SPDX-License-Identifier: LGPL-3.0-only

//! Rendered code images.

use image::RgbaImage;
use std::sync::Arc;

/// A rectangle in image pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Region {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Region {
    /// Create a new region.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Whether the pixel at `(px, py)` lies inside the region.
    pub fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x && py >= self.y && px < self.x + self.width && py < self.y + self.height
    }
}

/// A rendered payment code.
///
/// Holds RGBA pixels plus the target regions the view tints. Cloning only
/// bumps reference counts. Two renders of the same content compare equal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeImage {
    /// Raw RGBA pixel data, row-major.
    pub data: Arc<Vec<u8>>,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Marker regions (the finder patterns of a QR code).
    pub targets: Arc<Vec<Region>>,
}

impl CodeImage {
    /// Wrap a rendered bitmap and its target regions.
    pub fn new(image: RgbaImage, targets: Vec<Region>) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: Arc::new(image.into_raw()),
            width,
            height,
            targets: Arc::new(targets),
        }
    }

    /// The RGBA value of one pixel, or [None] when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = ((y as usize) * (self.width as usize) + x as usize) * 4;
        let px = self.data.get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Copy the pixels into an owned [RgbaImage].
    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data.as_ref().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn pixel_lookup_matches_source() {
        let mut source = RgbaImage::from_pixel(3, 2, Rgba([255, 255, 255, 255]));
        source.put_pixel(2, 1, Rgba([1, 2, 3, 4]));

        let image = CodeImage::new(source.clone(), vec![Region::new(0, 0, 1, 1)]);
        assert_eq!(image.pixel(2, 1), Some([1, 2, 3, 4]));
        assert_eq!(image.pixel(3, 0), None);
        assert_eq!(image.to_rgba_image(), Some(source));
    }

    #[test]
    fn region_bounds_are_half_open() {
        let region = Region::new(2, 2, 3, 3);
        assert!(region.contains(2, 2));
        assert!(region.contains(4, 4));
        assert!(!region.contains(5, 4));
        assert!(!region.contains(1, 3));
    }
}
