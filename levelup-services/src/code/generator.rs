// SPDX-License-Identifier: LGPL-3.0-only

//! Code generators.

use crate::code::error::CodeError;
use crate::code::image::{CodeImage, Region};
use image::{Rgba, RgbaImage};
use levelup_core::config::LoaderConfig;
use qrcode::{Color, EcLevel, QrCode};

/// Edge length of a QR finder pattern, in modules.
const FINDER_MODULES: u32 = 7;

/// Largest image edge the generator will allocate, in pixels.
const MAX_SIDE_PIXELS: u32 = 16_384;

const DARK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const LIGHT: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Renders content strings into images.
///
/// Generators are stateless and may be slow; loaders only call them off the
/// main thread.
pub trait CodeGenerator<T>: Send + Sync {
    /// Render `content`.
    fn generate(&self, content: &str) -> Result<T, CodeError>;
}

impl<T, F> CodeGenerator<T> for F
where
    F: Fn(&str) -> Result<T, CodeError> + Send + Sync,
{
    fn generate(&self, content: &str) -> Result<T, CodeError> {
        self(content)
    }
}

/// Renders payment codes as QR codes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QrCodeGenerator {
    module_pixels: u32,
    quiet_zone: u32,
}

impl QrCodeGenerator {
    /// Create a generator with the given module size and quiet zone width.
    pub fn new(module_pixels: u32, quiet_zone: u32) -> Self {
        Self {
            module_pixels: module_pixels.max(1),
            quiet_zone,
        }
    }

    /// Create a generator from the loader configuration.
    pub fn from_config(config: &LoaderConfig) -> Self {
        Self::new(config.module_pixels, config.quiet_zone)
    }

    /// Pixel offset of module `index`, counting the quiet zone.
    fn offset(&self, index: u32) -> Option<u32> {
        self.quiet_zone.checked_add(index)?.checked_mul(self.module_pixels)
    }

    /// Edge length of the whole image for a code `modules` wide.
    fn side(&self, modules: u32) -> Result<u32, CodeError> {
        let side = self
            .quiet_zone
            .checked_mul(2)
            .and_then(|zone| zone.checked_add(modules))
            .and_then(|total| total.checked_mul(self.module_pixels))
            .filter(|side| *side <= MAX_SIDE_PIXELS);

        side.ok_or_else(|| {
            CodeError::GenerationFailed(format!(
                "{} modules at {}px with a {}-module quiet zone exceed {}px",
                modules, self.module_pixels, self.quiet_zone, MAX_SIDE_PIXELS
            ))
        })
    }

    // Only called once `side` accepted the dimensions, so nothing here overflows.
    fn finder_regions(&self, modules: u32) -> Vec<Region> {
        let px = self.module_pixels;
        let side = FINDER_MODULES * px;
        let near = self.quiet_zone * px;
        let far = (self.quiet_zone + modules - FINDER_MODULES) * px;

        vec![
            Region::new(near, near, side, side),
            Region::new(far, near, side, side),
            Region::new(near, far, side, side),
        ]
    }
}

impl Default for QrCodeGenerator {
    fn default() -> Self {
        Self::from_config(&LoaderConfig::default())
    }
}

impl CodeGenerator<CodeImage> for QrCodeGenerator {
    fn generate(&self, content: &str) -> Result<CodeImage, CodeError> {
        if content.is_empty() {
            return Err(CodeError::EmptyContent);
        }

        let code = QrCode::with_error_correction_level(content.as_bytes(), EcLevel::M)
            .map_err(|e| CodeError::GenerationFailed(e.to_string()))?;

        let modules = code.width() as u32;
        let px = self.module_pixels;
        let side = self.side(modules)?;
        let mut image = RgbaImage::from_pixel(side, side, LIGHT);

        for (index, color) in code.to_colors().into_iter().enumerate() {
            if color != Color::Dark {
                continue;
            }
            let index = index as u32;
            let (Some(left), Some(top)) = (self.offset(index % modules), self.offset(index / modules))
            else {
                continue;
            };
            for y in top..top + px {
                for x in left..left + px {
                    image.put_pixel(x, y, DARK);
                }
            }
        }

        log::debug!("Rendered {}x{} code ({} modules)", side, side, modules);

        Ok(CodeImage::new(image, self.finder_regions(modules)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_with_quiet_zone_and_finders() {
        let generator = QrCodeGenerator::new(2, 4);
        let image = generator.generate("LU02000TESTTESTTEST030000LU").unwrap();

        assert_eq!(image.width, image.height);
        assert_eq!(image.width % 2, 0);
        assert_eq!(image.targets.len(), 3);

        // quiet zone is light
        assert_eq!(image.pixel(0, 0), Some(LIGHT.0));
        // top-left corner of the first finder pattern is dark
        let finder = image.targets[0];
        assert_eq!((finder.x, finder.y, finder.width), (8, 8, 14));
        assert_eq!(image.pixel(finder.x, finder.y), Some(DARK.0));
        // the finder's 1-module light ring
        assert_eq!(image.pixel(finder.x + 2, finder.y + 2), Some(LIGHT.0));
    }

    #[test]
    fn same_content_renders_equal_images() {
        let generator = QrCodeGenerator::new(1, 0);
        assert_eq!(generator.generate("foo"), generator.generate("foo"));
        assert_ne!(generator.generate("foo"), generator.generate("bar"));
    }

    #[test]
    fn empty_content_is_rejected() {
        assert_eq!(
            QrCodeGenerator::default().generate(""),
            Err(CodeError::EmptyContent)
        );
    }

    #[test]
    fn oversized_modules_fail_instead_of_overflowing() {
        let result = QrCodeGenerator::new(200_000_000, 4).generate("foo");
        assert!(matches!(result, Err(CodeError::GenerationFailed(_))));

        let result = QrCodeGenerator::new(8, u32::MAX).generate("foo");
        assert!(matches!(result, Err(CodeError::GenerationFailed(_))));
    }

    #[test]
    fn largest_configured_code_still_renders() {
        use levelup_core::config::{MAX_MODULE_PIXELS, MAX_QUIET_ZONE};

        let image = QrCodeGenerator::new(MAX_MODULE_PIXELS, MAX_QUIET_ZONE)
            .generate("LU02000TESTTESTTEST030000LU")
            .unwrap();
        assert_eq!(image.targets.len(), 3);
        assert!(image.width <= MAX_SIDE_PIXELS);
    }

    #[test]
    fn closures_are_generators() {
        let generator = |content: &str| Ok::<usize, CodeError>(content.len());
        assert_eq!(CodeGenerator::generate(&generator, "abcd"), Ok(4));
    }
}
