// src/engine/convert.rs
//
// Explicit pixel-layout conversion between the host framework's image modes
// and the interleaved 8-bit layouts the native codec understands.

use crate::codecs::{EncodeFrame, NativeImage, PixelLayout};
use crate::engine::common::EngineResult;
use crate::error::HeifError;
use image::{ColorType, DynamicImage, ImageBuffer};
use std::borrow::Cow;

/// Tightly packed decoded pixels in a host-framework color type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub color_type: ColorType,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    /// Copy into an owned `DynamicImage`.
    pub fn to_dynamic_image(&self) -> EngineResult<DynamicImage> {
        self.clone().into_dynamic_image()
    }

    pub fn into_dynamic_image(self) -> EngineResult<DynamicImage> {
        let (width, height) = (self.width, self.height);
        let mismatch = || HeifError::decode_failed("pixel buffer does not match its dimensions");
        let image = match self.color_type {
            ColorType::L8 => DynamicImage::ImageLuma8(
                ImageBuffer::from_raw(width, height, self.data).ok_or_else(mismatch)?,
            ),
            ColorType::Rgb8 => DynamicImage::ImageRgb8(
                ImageBuffer::from_raw(width, height, self.data).ok_or_else(mismatch)?,
            ),
            ColorType::Rgba8 => DynamicImage::ImageRgba8(
                ImageBuffer::from_raw(width, height, self.data).ok_or_else(mismatch)?,
            ),
            other => return Err(HeifError::unsupported_pixel_mode(format!("{other:?}"))),
        };
        Ok(image)
    }
}

/// Host color type produced for a native layout.
pub fn color_type_for(layout: PixelLayout) -> ColorType {
    match layout {
        PixelLayout::Mono8 => ColorType::L8,
        PixelLayout::Rgb8 => ColorType::Rgb8,
        PixelLayout::Rgba8 => ColorType::Rgba8,
    }
}

/// Map a decoded native image back to the host framework.
///
/// Row padding is removed; a buffer shorter than `stride * height` is a
/// decode failure rather than a partial image.
pub fn from_native(native: NativeImage) -> EngineResult<PixelBuffer> {
    let row_bytes = native.width as usize * native.layout.channels();
    let height = native.height as usize;
    if native.stride < row_bytes {
        return Err(HeifError::decode_failed(format!(
            "native stride {} is smaller than a row of {row_bytes} bytes",
            native.stride
        )));
    }
    let required = match height {
        0 => 0,
        rows => native.stride * (rows - 1) + row_bytes,
    };
    if native.data.len() < required {
        return Err(HeifError::decode_failed(format!(
            "native decoder returned {} bytes, expected at least {required}",
            native.data.len()
        )));
    }

    let data = if native.stride == row_bytes {
        let mut data = native.data;
        data.truncate(row_bytes * height);
        data
    } else {
        let mut packed = Vec::with_capacity(row_bytes * height);
        for row in native.data.chunks(native.stride).take(height) {
            packed.extend_from_slice(&row[..row_bytes]);
        }
        packed
    };

    Ok(PixelBuffer {
        color_type: color_type_for(native.layout),
        width: native.width,
        height: native.height,
        data,
    })
}

/// Prepare a host image for the encoder.
///
/// | host mode          | encoder layout | note                     |
/// |--------------------|----------------|--------------------------|
/// | L8                 | Mono8          |                          |
/// | La8                | Rgba8          | gray copied to R, G, B   |
/// | Rgb8, Rgba8        | same           | borrowed, no copy        |
/// | L16, La16          | Mono8, Rgba8   | high byte kept           |
/// | Rgb16, Rgba16      | Rgb8, Rgba8    | high byte kept           |
/// | anything else      | rejected       | `UnsupportedPixelMode`   |
pub fn to_encode_frame(image: &DynamicImage) -> EngineResult<EncodeFrame<'_>> {
    let (width, height) = (image.width(), image.height());
    let (layout, data) = match image {
        DynamicImage::ImageLuma8(buf) => (PixelLayout::Mono8, Cow::Borrowed(buf.as_raw().as_slice())),
        DynamicImage::ImageRgb8(buf) => (PixelLayout::Rgb8, Cow::Borrowed(buf.as_raw().as_slice())),
        DynamicImage::ImageRgba8(buf) => {
            (PixelLayout::Rgba8, Cow::Borrowed(buf.as_raw().as_slice()))
        }
        DynamicImage::ImageLumaA8(buf) => (PixelLayout::Rgba8, Cow::Owned(gray_alpha_to_rgba(buf.as_raw()))),
        DynamicImage::ImageLuma16(buf) => (PixelLayout::Mono8, Cow::Owned(high_bytes(buf.as_raw()))),
        DynamicImage::ImageLumaA16(buf) => (
            PixelLayout::Rgba8,
            Cow::Owned(gray_alpha_to_rgba(&high_bytes(buf.as_raw()))),
        ),
        DynamicImage::ImageRgb16(buf) => (PixelLayout::Rgb8, Cow::Owned(high_bytes(buf.as_raw()))),
        DynamicImage::ImageRgba16(buf) => {
            (PixelLayout::Rgba8, Cow::Owned(high_bytes(buf.as_raw())))
        }
        other => {
            return Err(HeifError::unsupported_pixel_mode(format!(
                "{:?}",
                other.color()
            )))
        }
    };
    Ok(EncodeFrame {
        layout,
        width,
        height,
        data,
    })
}

fn gray_alpha_to_rgba(samples: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for pixel in samples.chunks_exact(2) {
        let (luma, alpha) = (pixel[0], pixel[1]);
        out.extend_from_slice(&[luma, luma, luma, alpha]);
    }
    out
}

fn high_bytes(samples: &[u16]) -> Vec<u8> {
    samples.iter().map(|&v| (v >> 8) as u8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayAlphaImage, GrayImage, Rgb32FImage, RgbImage, Rgba};

    #[test]
    fn rgb8_is_borrowed() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 3, image::Rgb([1, 2, 3])));
        let frame = to_encode_frame(&image).unwrap();
        assert_eq!(frame.layout, PixelLayout::Rgb8);
        assert!(matches!(frame.data, Cow::Borrowed(_)));
        assert_eq!(frame.data.len(), 4 * 3 * 3);
    }

    #[test]
    fn gray_maps_to_mono() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(2, 2, image::Luma([9])));
        let frame = to_encode_frame(&image).unwrap();
        assert_eq!(frame.layout, PixelLayout::Mono8);
        assert_eq!(&*frame.data, &[9, 9, 9, 9]);
    }

    #[test]
    fn gray_alpha_expands_to_rgba() {
        let image =
            DynamicImage::ImageLumaA8(GrayAlphaImage::from_pixel(1, 2, image::LumaA([50, 200])));
        let frame = to_encode_frame(&image).unwrap();
        assert_eq!(frame.layout, PixelLayout::Rgba8);
        assert_eq!(&*frame.data, &[50, 50, 50, 200, 50, 50, 50, 200]);
    }

    #[test]
    fn sixteen_bit_keeps_high_byte() {
        let mut buf = image::ImageBuffer::<image::Rgba<u16>, Vec<u16>>::new(1, 1);
        buf.put_pixel(0, 0, Rgba([0xABCD, 0x1200, 0x00FF, 0xFFFF]));
        let image = DynamicImage::ImageRgba16(buf);
        let frame = to_encode_frame(&image).unwrap();
        assert_eq!(frame.layout, PixelLayout::Rgba8);
        assert_eq!(&*frame.data, &[0xAB, 0x12, 0x00, 0xFF]);
    }

    #[test]
    fn float_images_are_rejected() {
        let image = DynamicImage::ImageRgb32F(Rgb32FImage::new(2, 2));
        let err = to_encode_frame(&image).unwrap_err();
        assert!(matches!(err, HeifError::UnsupportedPixelMode { .. }));
        assert!(err.to_string().contains("Rgb32F"));
    }

    #[test]
    fn from_native_strips_row_padding() {
        let native = NativeImage {
            layout: PixelLayout::Rgb8,
            width: 2,
            height: 2,
            stride: 8,
            data: vec![1, 2, 3, 4, 5, 6, 0, 0, 7, 8, 9, 10, 11, 12, 0, 0],
        };
        let pixels = from_native(native).unwrap();
        assert_eq!(pixels.color_type, ColorType::Rgb8);
        assert_eq!(pixels.data, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn from_native_accepts_short_last_row() {
        let native = NativeImage {
            layout: PixelLayout::Mono8,
            width: 3,
            height: 2,
            stride: 4,
            data: vec![1, 2, 3, 0, 4, 5, 6],
        };
        let pixels = from_native(native).unwrap();
        assert_eq!(pixels.color_type, ColorType::L8);
        assert_eq!(pixels.data, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn from_native_rejects_truncated_data() {
        let native = NativeImage {
            layout: PixelLayout::Rgba8,
            width: 4,
            height: 4,
            stride: 16,
            data: vec![0; 40],
        };
        assert!(matches!(
            from_native(native).unwrap_err(),
            HeifError::DecodeFailed { .. }
        ));
    }

    #[test]
    fn from_native_rejects_narrow_stride() {
        let native = NativeImage {
            layout: PixelLayout::Rgb8,
            width: 4,
            height: 1,
            stride: 8,
            data: vec![0; 12],
        };
        assert!(from_native(native).is_err());
    }

    #[test]
    fn pixel_buffer_round_trips_into_dynamic_image() {
        let buffer = PixelBuffer {
            color_type: ColorType::Rgba8,
            width: 1,
            height: 1,
            data: vec![1, 2, 3, 4],
        };
        let image = buffer.into_dynamic_image().unwrap();
        assert_eq!(image.color(), ColorType::Rgba8);
        assert_eq!(image.as_bytes(), &[1, 2, 3, 4]);
    }
}
