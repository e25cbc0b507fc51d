//! Page raster codec.
//!
//! Decoding applies EXIF orientation, then normalizes to RGB `f32` samples in
//! `[0.0, 1.0]` laid out as `(1, height, width, 3)`, plus an
//! opacity-complement mask of shape `(height, width)`. Encoding reverses the
//! RGB part into PNG, JPEG or WebP bytes.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader, RgbImage};
use miette::Diagnostic;
use ndarray::{Array2, Array4, Axis};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::PageImage;

/// Errors from the raster codec.
#[derive(Debug, Error, Diagnostic)]
pub enum RasterError {
    #[error("cannot decode image: {message}")]
    #[diagnostic(
        code(cbz::raster::decode),
        help("The entry is not a readable jpg/png/webp/bmp/gif/tiff image.")
    )]
    Decode { message: String },

    #[error("cannot encode {format} image: {message}")]
    #[diagnostic(code(cbz::raster::encode))]
    Encode { format: RasterFormat, message: String },

    #[error("unexpected pixel tensor shape {shape:?}, expected (1, height, width, 3)")]
    #[diagnostic(
        code(cbz::raster::shape),
        help("Each page must carry exactly one RGB image with a leading batch dimension of 1.")
    )]
    Shape { shape: Vec<usize> },
}

pub type RasterResult<T> = std::result::Result<T, RasterError>;

/// Output raster format for re-encoded pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterFormat {
    /// Lossless.
    #[default]
    Png,
    /// Lossy, honours quality.
    Jpeg,
    /// Lossy, honours quality.
    Webp,
}

impl RasterFormat {
    /// File extension (without the dot) used for entries of this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
        }
    }

    pub fn is_lossy(&self) -> bool {
        !matches!(self, Self::Png)
    }
}

impl std::fmt::Display for RasterFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Webp => "webp",
        })
    }
}

impl std::str::FromStr for RasterFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::Webp),
            other => Err(format!("unknown raster format \"{other}\" (png, jpeg, webp)")),
        }
    }
}

/// Decode an in-archive image entry.
///
/// The format is sniffed from the bytes; `filename` is only used as a
/// fallback hint when sniffing fails.
pub fn decode_page(bytes: &[u8], filename: &str) -> RasterResult<PageImage> {
    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(decode_error)?;
    if reader.format().is_none() {
        if let Ok(format) = ImageFormat::from_path(filename) {
            reader.set_format(format);
        }
    }

    let mut decoder = reader.into_decoder().map_err(decode_error)?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut image = DynamicImage::from_decoder(decoder).map_err(decode_error)?;
    image.apply_orientation(orientation);

    to_page_image(&image)
}

/// Convert an already-decoded image into the tensor layout.
pub fn to_page_image(image: &DynamicImage) -> RasterResult<PageImage> {
    let rgb = image.to_rgb8();
    let (width, height) = (rgb.width() as usize, rgb.height() as usize);

    let samples = rgb.into_raw().into_iter().map(normalize).collect();
    let pixels =
        Array4::from_shape_vec((1, height, width, 3), samples).map_err(|_| RasterError::Shape {
            shape: vec![1, height, width, 3],
        })?;

    let mask = if image.color().has_alpha() {
        let alpha = image
            .to_rgba8()
            .pixels()
            .map(|p| 1.0 - normalize(p[3]))
            .collect();
        Array2::from_shape_vec((height, width), alpha).map_err(|_| RasterError::Shape {
            shape: vec![height, width],
        })?
    } else {
        Array2::zeros((height, width))
    };

    Ok(PageImage { pixels, mask })
}

/// Quantize the RGB tensor back into an 8-bit image. Samples are clamped to
/// `[0.0, 1.0]` first.
pub fn to_rgb_image(page: &PageImage) -> RasterResult<RgbImage> {
    let shape = page.pixels.shape();
    if shape.len() != 4 || shape[0] != 1 || shape[3] != 3 {
        return Err(RasterError::Shape {
            shape: shape.to_vec(),
        });
    }
    let (height, width) = (shape[1], shape[2]);

    let raw: Vec<u8> = page
        .pixels
        .index_axis(Axis(0), 0)
        .iter()
        .map(|&v| quantize(v))
        .collect();

    RgbImage::from_raw(width as u32, height as u32, raw).ok_or_else(|| RasterError::Shape {
        shape: shape.to_vec(),
    })
}

/// Encode a page into `format`. `quality` (1..=100) applies to lossy formats.
pub fn encode_page(page: &PageImage, format: RasterFormat, quality: u8) -> RasterResult<Vec<u8>> {
    let rgb = to_rgb_image(page)?;
    let quality = quality.clamp(1, 100);
    let encode_error = |e: image::ImageError| RasterError::Encode {
        format,
        message: e.to_string(),
    };

    let mut buf = Vec::new();
    match format {
        RasterFormat::Png => {
            rgb.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
                .map_err(encode_error)?;
        }
        RasterFormat::Jpeg => {
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))
                .map_err(encode_error)?;
        }
        RasterFormat::Webp => {
            let encoded = webp::Encoder::from_rgb(rgb.as_raw(), rgb.width(), rgb.height())
                .encode_simple(false, f32::from(quality))
                .map_err(|e| RasterError::Encode {
                    format,
                    message: format!("{e:?}"),
                })?;
            buf.extend_from_slice(&encoded);
        }
    }
    Ok(buf)
}

fn normalize(v: u8) -> f32 {
    f32::from(v) / 255.0
}

fn quantize(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn decode_error(e: impl std::fmt::Display) -> RasterError {
    RasterError::Decode {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgba, RgbaImage};

    fn png_bytes(image: &DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn decode_rgb_layout_and_zero_mask() {
        let mut img = RgbImage::new(3, 2);
        img.put_pixel(2, 1, Rgb([255, 0, 51]));
        let bytes = png_bytes(&DynamicImage::ImageRgb8(img));

        let page = decode_page(&bytes, "p.png").unwrap();
        assert_eq!(page.pixels.shape(), &[1, 2, 3, 3]);
        assert_eq!(page.mask.shape(), &[2, 3]);
        assert_eq!(page.pixels[[0, 1, 2, 0]], 1.0);
        assert_eq!(page.pixels[[0, 1, 2, 1]], 0.0);
        assert!((page.pixels[[0, 1, 2, 2]] - 0.2).abs() < 1e-6);
        assert!(page.mask.iter().all(|&v| v == 0.0));
    }

    /// JPEG with an APP1 Exif segment carrying only an Orientation tag,
    /// spliced in right after SOI.
    fn jpeg_with_orientation(image: &RgbImage, orientation: u16) -> Vec<u8> {
        let mut jpeg = Vec::new();
        image
            .write_with_encoder(JpegEncoder::new_with_quality(&mut jpeg, 100))
            .unwrap();

        let mut exif = b"Exif\0\0II*\0".to_vec();
        exif.extend_from_slice(&8u32.to_le_bytes());
        exif.extend_from_slice(&1u16.to_le_bytes());
        exif.extend_from_slice(&0x0112u16.to_le_bytes());
        exif.extend_from_slice(&3u16.to_le_bytes());
        exif.extend_from_slice(&1u32.to_le_bytes());
        exif.extend_from_slice(&orientation.to_le_bytes());
        exif.extend_from_slice(&[0, 0]);
        exif.extend_from_slice(&0u32.to_le_bytes());

        let mut segment = vec![0xff, 0xe1];
        segment.extend_from_slice(&((exif.len() + 2) as u16).to_be_bytes());
        segment.extend_from_slice(&exif);

        let mut out = jpeg[..2].to_vec();
        out.extend_from_slice(&segment);
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    #[test]
    fn exif_orientation_is_applied_before_normalizing() {
        // 32x16, left half red, right half blue.
        let img = RgbImage::from_fn(32, 16, |x, _| {
            if x < 16 { Rgb([255, 0, 0]) } else { Rgb([0, 0, 255]) }
        });

        let plain = decode_page(&jpeg_with_orientation(&img, 1), "p.jpg").unwrap();
        assert_eq!(plain.pixels.shape(), &[1, 16, 32, 3]);
        assert!(plain.pixels[[0, 8, 28, 2]] > 0.8);

        // Orientation 6: rotate 90 degrees clockwise, the left half ends up on top.
        let rotated = decode_page(&jpeg_with_orientation(&img, 6), "p.jpg").unwrap();
        assert_eq!(rotated.pixels.shape(), &[1, 32, 16, 3]);
        assert_eq!(rotated.mask.shape(), &[32, 16]);
        assert!(rotated.pixels[[0, 4, 8, 0]] > 0.8);
        assert!(rotated.pixels[[0, 4, 8, 2]] < 0.2);
        assert!(rotated.pixels[[0, 28, 8, 0]] < 0.2);
        assert!(rotated.pixels[[0, 28, 8, 2]] > 0.8);
    }

    #[test]
    fn alpha_becomes_opacity_complement() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, Rgba([10, 20, 30, 255]));
        img.put_pixel(1, 0, Rgba([10, 20, 30, 0]));
        let bytes = png_bytes(&DynamicImage::ImageRgba8(img));

        let page = decode_page(&bytes, "p.png").unwrap();
        assert_eq!(page.mask[[0, 0]], 0.0);
        assert_eq!(page.mask[[0, 1]], 1.0);
    }

    #[test]
    fn garbage_fails_to_decode() {
        let err = decode_page(b"definitely not an image", "p.jpg").unwrap_err();
        assert!(matches!(err, RasterError::Decode { .. }));
    }

    #[test]
    fn png_encode_is_lossless() {
        let mut img = RgbImage::new(4, 4);
        img.put_pixel(1, 3, Rgb([7, 128, 250]));
        let page = to_page_image(&DynamicImage::ImageRgb8(img.clone())).unwrap();

        let bytes = encode_page(&page, RasterFormat::Png, 100).unwrap();
        let back = decode_page(&bytes, "p.png").unwrap();
        assert_eq!(to_rgb_image(&back).unwrap(), img);
    }

    #[test]
    fn lossy_formats_produce_decodable_output() {
        let page = to_page_image(&DynamicImage::ImageRgb8(RgbImage::new(8, 6))).unwrap();
        for format in [RasterFormat::Jpeg, RasterFormat::Webp] {
            let bytes = encode_page(&page, format, 80).unwrap();
            let back = decode_page(&bytes, "x").unwrap();
            assert_eq!(back.pixels.shape(), &[1, 6, 8, 3]);
        }
    }

    #[test]
    fn oversized_webp_page_is_an_encode_error() {
        let page = PageImage {
            pixels: Array4::zeros((1, 17000, 4, 3)),
            mask: Array2::zeros((17000, 4)),
        };
        let err = encode_page(&page, RasterFormat::Webp, 80).unwrap_err();
        assert!(matches!(
            err,
            RasterError::Encode {
                format: RasterFormat::Webp,
                ..
            }
        ));
    }

    #[test]
    fn out_of_range_samples_are_clamped() {
        let mut page = to_page_image(&DynamicImage::ImageRgb8(RgbImage::new(1, 1))).unwrap();
        page.pixels[[0, 0, 0, 0]] = 1.7;
        page.pixels[[0, 0, 0, 1]] = -0.3;
        let rgb = to_rgb_image(&page).unwrap();
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn wrong_batch_dimension_is_rejected() {
        let page = PageImage {
            pixels: Array4::zeros((2, 1, 1, 3)),
            mask: Array2::zeros((1, 1)),
        };
        assert!(matches!(
            to_rgb_image(&page),
            Err(RasterError::Shape { .. })
        ));
    }

    #[test]
    fn format_names() {
        assert_eq!("JPG".parse::<RasterFormat>().unwrap(), RasterFormat::Jpeg);
        assert_eq!(RasterFormat::Jpeg.extension(), "jpg");
        assert!(RasterFormat::Webp.is_lossy());
        assert!(!RasterFormat::Png.is_lossy());
        assert!("gif".parse::<RasterFormat>().is_err());
    }
}
