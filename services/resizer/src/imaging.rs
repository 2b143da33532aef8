use crate::config::ResizeConfig;
use crate::error::ResizeError;
use crate::sizes::{SizeSet, SourceDimensions};
use bytes::Bytes;
use fast_image_resize::{images::Image, FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::codecs::jpeg::JpegEncoder;
use image::buffer::ConvertBuffer;
use image::{DynamicImage, ImageFormat, ImageReader, RgbImage, RgbaImage};
use serde::Deserialize;
use std::io::Cursor;
use tracing::debug;

/// Resampling filter for downscaling and upscaling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    Nearest,
    Bilinear,
    CatmullRom,
    Mitchell,
    #[default]
    Lanczos3,
}

impl ResizeFilter {
    fn algorithm(&self) -> ResizeAlg {
        match self {
            Self::Nearest => ResizeAlg::Nearest,
            Self::Bilinear => ResizeAlg::Convolution(FilterType::Bilinear),
            Self::CatmullRom => ResizeAlg::Convolution(FilterType::CatmullRom),
            Self::Mitchell => ResizeAlg::Convolution(FilterType::Mitchell),
            Self::Lanczos3 => ResizeAlg::Convolution(FilterType::Lanczos3),
        }
    }
}

/// Encoded format of a derivative
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Gif,
}

impl OutputFormat {
    /// Derivatives keep the source format; anything else is written as PNG
    pub fn for_source(format: Option<ImageFormat>) -> Self {
        match format {
            Some(ImageFormat::Jpeg) => Self::Jpeg,
            Some(ImageFormat::WebP) => Self::WebP,
            Some(ImageFormat::Gif) => Self::Gif,
            _ => Self::Png,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
            Self::Gif => "image/gif",
        }
    }
}

/// One encoded derivative, in the same position as its target size
#[derive(Debug, Clone)]
pub struct ResizedImage {
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
    pub data: Bytes,
}

/// Image decoding and resizing backend
#[cfg_attr(test, mockall::automock)]
pub trait ImageEngine: Send + Sync {
    /// Read intrinsic dimensions without decoding pixel data
    fn read_dimensions(&self, data: &[u8]) -> Result<SourceDimensions, ResizeError>;

    /// Produce one derivative per target, in target order
    fn resize(&self, data: &[u8], sizes: &SizeSet) -> Result<Vec<ResizedImage>, ResizeError>;
}

/// `image` + `fast_image_resize` backed engine
#[derive(Debug, Clone)]
pub struct RasterEngine {
    config: ResizeConfig,
}

impl RasterEngine {
    pub fn new(config: ResizeConfig) -> Self {
        Self { config }
    }

    fn decode(&self, data: &[u8]) -> Result<(DynamicImage, Option<ImageFormat>), ResizeError> {
        let reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| ResizeError::Decode(format!("failed to guess format: {e}")))?;

        let format = reader.format();
        let img = reader
            .decode()
            .map_err(|e| ResizeError::Decode(e.to_string()))?;

        let img = match read_orientation(data) {
            Some(orientation) => apply_orientation(img, orientation),
            None => img,
        };

        Ok((img, format))
    }

    fn resize_one(
        &self,
        resizer: &mut Resizer,
        src: &Image<'_>,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, ResizeError> {
        let total_pixels = width as u64 * height as u64;
        if total_pixels > self.config.max_pixels {
            return Err(ResizeError::Transform(format!(
                "output resolution {width}x{height} exceeds {} pixels",
                self.config.max_pixels
            )));
        }

        let mut dst = Image::new(width, height, PixelType::U8x4);
        resizer
            .resize(
                src,
                &mut dst,
                &ResizeOptions::new().resize_alg(self.config.filter.algorithm()),
            )
            .map_err(|e| ResizeError::Transform(format!("resize failed: {e}")))?;

        RgbaImage::from_raw(width, height, dst.into_vec()).ok_or_else(|| {
            ResizeError::Transform("resized buffer does not match target size".to_string())
        })
    }

    fn encode(&self, img: &RgbaImage, format: OutputFormat) -> Result<Vec<u8>, ResizeError> {
        let mut buf = Cursor::new(Vec::new());

        let result = match format {
            OutputFormat::Jpeg => {
                let encoder = JpegEncoder::new_with_quality(&mut buf, self.config.jpeg_quality);
                let rgb: RgbImage = img.convert();
                rgb.write_with_encoder(encoder)
            }
            OutputFormat::Png => img.write_to(&mut buf, ImageFormat::Png),
            // image only ships a lossless WebP encoder
            OutputFormat::WebP => img.write_to(&mut buf, ImageFormat::WebP),
            OutputFormat::Gif => img.write_to(&mut buf, ImageFormat::Gif),
        };

        result.map_err(|e| ResizeError::Transform(format!("{format:?} encode failed: {e}")))?;
        Ok(buf.into_inner())
    }
}

impl ImageEngine for RasterEngine {
    fn read_dimensions(&self, data: &[u8]) -> Result<SourceDimensions, ResizeError> {
        let (width, height) = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| ResizeError::Decode(format!("failed to guess format: {e}")))?
            .into_dimensions()
            .map_err(|e| ResizeError::Decode(e.to_string()))?;

        // Quarter turns swap the displayed sides
        let (width, height) = match read_orientation(data) {
            Some(o) if o.swaps_dimensions() => (height, width),
            _ => (width, height),
        };

        SourceDimensions::new(width, height)
    }

    fn resize(&self, data: &[u8], sizes: &SizeSet) -> Result<Vec<ResizedImage>, ResizeError> {
        let (img, source_format) = self.decode(data)?;
        let format = OutputFormat::for_source(source_format);

        let rgba = img.to_rgba8();
        let (src_w, src_h) = rgba.dimensions();
        let src = Image::from_vec_u8(src_w, src_h, rgba.into_raw(), PixelType::U8x4)
            .map_err(|e| ResizeError::Transform(format!("invalid source buffer: {e}")))?;

        let mut resizer = Resizer::new();
        let mut outputs = Vec::with_capacity(sizes.len());

        for target in sizes.targets() {
            let resized = self.resize_one(&mut resizer, &src, target.width, target.height)?;
            let encoded = self.encode(&resized, format)?;

            debug!(
                label = target.label,
                width = target.width,
                height = target.height,
                format = ?format,
                size_bytes = encoded.len(),
                "Encoded derivative"
            );

            outputs.push(ResizedImage {
                width: target.width,
                height: target.height,
                format,
                data: Bytes::from(encoded),
            });
        }

        Ok(outputs)
    }
}

/// EXIF orientation tag values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Normal,
    FlipHorizontal,
    Rotate180,
    FlipVertical,
    Transpose,
    Rotate90,
    Transverse,
    Rotate270,
}

impl Orientation {
    pub fn from_exif(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Normal),
            2 => Some(Self::FlipHorizontal),
            3 => Some(Self::Rotate180),
            4 => Some(Self::FlipVertical),
            5 => Some(Self::Transpose),
            6 => Some(Self::Rotate90),
            7 => Some(Self::Transverse),
            8 => Some(Self::Rotate270),
            _ => None,
        }
    }

    pub fn swaps_dimensions(&self) -> bool {
        matches!(
            self,
            Self::Transpose | Self::Rotate90 | Self::Transverse | Self::Rotate270
        )
    }
}

fn apply_orientation(img: DynamicImage, orientation: Orientation) -> DynamicImage {
    match orientation {
        Orientation::Normal => img,
        Orientation::FlipHorizontal => img.fliph(),
        Orientation::Rotate180 => img.rotate180(),
        Orientation::FlipVertical => img.flipv(),
        Orientation::Transpose => img.rotate90().fliph(),
        Orientation::Rotate90 => img.rotate90(),
        Orientation::Transverse => img.rotate270().fliph(),
        Orientation::Rotate270 => img.rotate270(),
    }
}

fn read_orientation(data: &[u8]) -> Option<Orientation> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(data))
        .ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;

    Orientation::from_exif(field.value.get_uint(0)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{Profile, TransformMode};
    use crate::sizes::compute_sizes;

    fn engine() -> RasterEngine {
        RasterEngine::new(ResizeConfig::default())
    }

    fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = DynamicImage::new_rgb8(width, height);
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    fn sizes_for(width: u32, height: u32, mode: TransformMode) -> SizeSet {
        let profile = Profile {
            transform_mode: mode,
            ..Profile::default()
        };
        compute_sizes(SourceDimensions::new(width, height).unwrap(), &profile).unwrap()
    }

    #[test]
    fn test_read_dimensions() {
        let data = encoded(120, 80, ImageFormat::Png);
        let dims = engine().read_dimensions(&data).unwrap();

        assert_eq!(dims, SourceDimensions { width: 120, height: 80 });
    }

    #[test]
    fn test_read_dimensions_rejects_garbage() {
        let result = engine().read_dimensions(b"definitely not an image");
        assert!(matches!(result, Err(ResizeError::Decode(_))));
    }

    #[test]
    fn test_resize_png_keeps_order_and_format() {
        let data = encoded(120, 80, ImageFormat::Png);
        let sizes = sizes_for(120, 80, TransformMode::Sizes);

        let outputs = engine().resize(&data, &sizes).unwrap();

        assert_eq!(outputs.len(), 6);
        for (output, target) in outputs.iter().zip(sizes.targets()) {
            assert_eq!(output.format, OutputFormat::Png);
            let decoded = image::load_from_memory(&output.data).unwrap();
            assert_eq!(decoded.width(), target.width);
            assert_eq!(decoded.height(), target.height);
        }
    }

    #[test]
    fn test_resize_jpeg_upscales_in_responsive_mode() {
        let data = encoded(40, 20, ImageFormat::Jpeg);
        let sizes = sizes_for(40, 20, TransformMode::Responsive);

        let outputs = engine().resize(&data, &sizes).unwrap();

        let widths: Vec<_> = outputs.iter().map(|o| o.width).collect();
        assert_eq!(widths, vec![40, 60, 80, 120]);
        assert!(outputs.iter().all(|o| o.format == OutputFormat::Jpeg));
        // JPEG magic number
        assert_eq!(&outputs[3].data[0..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_resize_rejects_oversized_output() {
        let engine = RasterEngine::new(ResizeConfig {
            max_pixels: 100,
            ..ResizeConfig::default()
        });
        let data = encoded(40, 20, ImageFormat::Png);
        let sizes = sizes_for(40, 20, TransformMode::Responsive);

        assert!(matches!(
            engine.resize(&data, &sizes),
            Err(ResizeError::Transform(_))
        ));
    }

    #[test]
    fn test_output_format_for_source() {
        assert_eq!(OutputFormat::for_source(Some(ImageFormat::Jpeg)), OutputFormat::Jpeg);
        assert_eq!(OutputFormat::for_source(Some(ImageFormat::WebP)), OutputFormat::WebP);
        assert_eq!(OutputFormat::for_source(Some(ImageFormat::Bmp)), OutputFormat::Png);
        assert_eq!(OutputFormat::for_source(None), OutputFormat::Png);
        assert_eq!(OutputFormat::Gif.content_type(), "image/gif");
    }

    #[test]
    fn test_orientation() {
        assert_eq!(Orientation::from_exif(6), Some(Orientation::Rotate90));
        assert_eq!(Orientation::from_exif(9), None);
        assert!(Orientation::Rotate270.swaps_dimensions());
        assert!(!Orientation::Rotate180.swaps_dimensions());

        let rotated = apply_orientation(DynamicImage::new_rgb8(10, 20), Orientation::Rotate90);
        assert_eq!((rotated.width(), rotated.height()), (20, 10));
    }
}
