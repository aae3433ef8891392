//! Source image access: dimension probing and margin-aware cropping.

use std::io::Cursor;

use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};

use crate::error::FigureError;
use crate::geometry::{Rect, RectExpander};

/// A raster that figure crops are cut from.
pub trait RasterSource: Sync {
    /// Pixel dimensions as (width, height).
    fn dimensions(&self) -> (u32, u32);

    /// Crop `rect` (normalized) with the expander's margin re-applied, as PNG bytes.
    fn crop(&self, rect: &Rect, expander: &RectExpander) -> Result<Vec<u8>, FigureError>;
}

/// Read pixel dimensions from an encoded image header.
pub fn probe_dimensions(bytes: &[u8]) -> Result<(u32, u32), FigureError> {
    let (width, height) = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| FigureError::Decode(e.to_string()))?
        .into_dimensions()
        .map_err(|e| FigureError::Decode(e.to_string()))?;

    if width == 0 || height == 0 {
        return Err(FigureError::InvalidDimensions { width, height });
    }

    Ok((width, height))
}

/// An in-memory decoded page image.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    image: DynamicImage,
}

impl DecodedImage {
    /// Wrap an already decoded image.
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    /// Decode an encoded image.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FigureError> {
        let image =
            image::load_from_memory(bytes).map_err(|e| FigureError::Decode(e.to_string()))?;
        Ok(Self::new(image))
    }

    /// The underlying image.
    pub fn image(&self) -> &DynamicImage {
        &self.image
    }
}

impl RasterSource for DecodedImage {
    fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn crop(&self, rect: &Rect, expander: &RectExpander) -> Result<Vec<u8>, FigureError> {
        let (width, height) = self.image.dimensions();
        let region = expander.crop_box(rect, width, height).ok_or_else(|| {
            FigureError::Crop(format!(
                "empty crop region for [{}, {}, {}, {}]",
                rect.ymin, rect.xmin, rect.ymax, rect.xmax
            ))
        })?;

        let cropped = self
            .image
            .crop_imm(region.x, region.y, region.width, region.height);

        let mut buf = Cursor::new(Vec::new());
        cropped
            .write_to(&mut buf, ImageFormat::Png)
            .map_err(|e| FigureError::Crop(e.to_string()))?;

        Ok(buf.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use pretty_assertions::assert_eq;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([255, 255, 255])))
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_probe_dimensions() {
        assert_eq!(probe_dimensions(&png(320, 200)).unwrap(), (320, 200));
    }

    #[test]
    fn test_probe_garbage() {
        assert!(matches!(
            probe_dimensions(b"definitely not an image"),
            Err(FigureError::Decode(_))
        ));
    }

    #[test]
    fn test_crop_applies_margin() {
        let raster = DecodedImage::from_bytes(&png(1000, 1000)).unwrap();
        let bytes = raster
            .crop(&Rect::new(100.0, 100.0, 300.0, 300.0), &RectExpander::new())
            .unwrap();

        let cropped = image::load_from_memory(&bytes).unwrap();
        assert_eq!(cropped.dimensions(), (248, 248));
    }

    #[test]
    fn test_crop_clamped_at_edge() {
        let raster = DecodedImage::from_bytes(&png(500, 500)).unwrap();
        let bytes = raster
            .crop(&Rect::new(0.0, 0.0, 200.0, 200.0), &RectExpander::new())
            .unwrap();

        // 100 px + 24 px margin on the far side only
        let cropped = image::load_from_memory(&bytes).unwrap();
        assert_eq!(cropped.dimensions(), (124, 124));
    }

    #[test]
    fn test_crop_outside_image_fails() {
        let raster = DecodedImage::new(DynamicImage::new_rgb8(10, 10));
        let expander = RectExpander::new().with_margin_bounds(0.0, 0.0);
        let result = raster.crop(&Rect::new(500.0, 500.0, 400.0, 400.0), &expander);
        assert!(matches!(result, Err(FigureError::Crop(_))));
    }
}
