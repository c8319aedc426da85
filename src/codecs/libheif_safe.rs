// src/codecs/libheif_safe.rs
//
// libheif backend. libheif-rs already wraps every native handle in RAII
// types; this module maps them onto the codec seam and keeps the one open
// context per opened image.

use super::{
    Capabilities, ColorProfile, ContainerHeader, EncodeFrame, EncodeInput, HeifCodec,
    NativeContext, NativeError, NativeErrorKind, NativeImage, PixelLayout,
};
use crate::engine::metadata;
use crate::engine::{ChromaDownsampling, Compression, SaveOptions};
use image::metadata::Orientation;
use libheif_rs::color_profile_types::{PROF, R_ICC};
use libheif_rs::{
    Channel, ChromaDownsamplingAlgorithm, ColorProfile as _, ColorProfileRaw, ColorSpace,
    CompressionFormat, Encoder, EncoderParameterValue, EncoderQuality, EncodingOptions,
    HeifContext, HeifError as LibHeifError, HeifErrorCode, Image, ImageHandle, ItemId, LibHeif,
    RgbChroma, StreamReader,
};
use once_cell::sync::Lazy;
use std::io::Cursor;
#[cfg(test)]
use std::{cell::Cell, thread_local};
use tracing::debug;

static LIB_HEIF: Lazy<LibHeif> = Lazy::new(LibHeif::new);

#[cfg(test)]
thread_local! {
    static LIVE_CONTEXTS: Cell<usize> = const { Cell::new(0) };
}

fn native_error(err: LibHeifError) -> NativeError {
    let kind = match err.code {
        HeifErrorCode::InvalidInput => NativeErrorKind::InvalidInput,
        HeifErrorCode::UnsupportedFileType => NativeErrorKind::UnsupportedFiletype,
        HeifErrorCode::UnsupportedFeature => NativeErrorKind::UnsupportedFeature,
        HeifErrorCode::MemoryAllocationError => NativeErrorKind::MemoryAllocation,
        HeifErrorCode::DecoderPluginError => NativeErrorKind::DecoderPlugin,
        HeifErrorCode::EncoderPluginError => NativeErrorKind::EncoderPlugin,
        HeifErrorCode::UsageError => NativeErrorKind::Usage,
        _ => NativeErrorKind::Other,
    };
    NativeError::new(kind, err.to_string())
}

/// Codec backed by the system libheif.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibHeifCodec;

impl LibHeifCodec {
    pub fn new() -> Self {
        Self
    }
}

/// An open libheif context and its primary image handle.
pub struct LibHeifContext {
    primary: ImageHandle,
    context: HeifContext<'static>,
}

impl LibHeifContext {
    fn new(context: HeifContext<'static>, primary: ImageHandle) -> Self {
        #[cfg(test)]
        LIVE_CONTEXTS.with(|c| c.set(c.get() + 1));
        Self { primary, context }
    }

    fn exif(&self) -> Option<Vec<u8>> {
        let count = self.primary.number_of_metadata_blocks(b"Exif");
        if count <= 0 {
            return None;
        }
        let mut ids: Vec<ItemId> = vec![0; count as usize];
        let found = self.primary.metadata_block_ids(&mut ids, b"Exif");
        ids.truncate(found);
        ids.into_iter().find_map(|id| {
            let raw = self.primary.metadata(id).ok()?;
            strip_tiff_offset(&raw).map(<[u8]>::to_vec)
        })
    }

    fn color_profile(&self) -> Option<ColorProfile> {
        let raw = self.primary.color_profile_raw()?;
        let profile = match raw.profile_type() {
            PROF => ColorProfile::Icc(raw.data),
            R_ICC => ColorProfile::RestrictedIcc(raw.data),
            _ => ColorProfile::Nclx,
        };
        Some(profile)
    }
}

impl Drop for LibHeifContext {
    fn drop(&mut self) {
        #[cfg(test)]
        LIVE_CONTEXTS.with(|c| c.set(c.get().saturating_sub(1)));
    }
}

/// HEIF EXIF items start with a 4-byte big-endian offset to the TIFF header.
fn strip_tiff_offset(raw: &[u8]) -> Option<&[u8]> {
    let prefix: [u8; 4] = raw.get(..4)?.try_into().ok()?;
    let offset = u32::from_be_bytes(prefix) as usize;
    raw.get(4usize.checked_add(offset)?..)
        .filter(|payload| !payload.is_empty())
}

impl NativeContext for LibHeifContext {
    fn header(&self) -> Result<ContainerHeader, NativeError> {
        let layout = if self.primary.has_alpha_channel() {
            PixelLayout::Rgba8
        } else {
            PixelLayout::Rgb8
        };
        let exif = self.exif();
        // libheif-rs exposes no irot/imir query on the handle.
        let orientation = exif
            .as_deref()
            .and_then(metadata::exif_orientation)
            .unwrap_or(Orientation::NoTransforms);
        Ok(ContainerHeader {
            width: self.primary.width(),
            height: self.primary.height(),
            layout,
            luma_bit_depth: self.primary.luma_bits_per_pixel(),
            orientation,
            top_level_images: self.context.number_of_top_level_images(),
            exif,
            color_profile: self.color_profile(),
        })
    }

    fn decode(&mut self) -> Result<NativeImage, NativeError> {
        let (layout, chroma) = if self.primary.has_alpha_channel() {
            (PixelLayout::Rgba8, RgbChroma::Rgba)
        } else {
            (PixelLayout::Rgb8, RgbChroma::Rgb)
        };
        let image = LIB_HEIF
            .decode(&self.primary, ColorSpace::Rgb(chroma), None)
            .map_err(native_error)?;
        let planes = image.planes();
        let plane = planes.interleaved.ok_or_else(|| {
            NativeError::new(NativeErrorKind::Other, "decoded image has no interleaved plane")
        })?;
        Ok(NativeImage {
            layout,
            width: plane.width,
            height: plane.height,
            stride: plane.stride,
            data: plane.data.to_vec(),
        })
    }
}

fn compression_format(compression: Compression) -> CompressionFormat {
    match compression {
        Compression::Hevc => CompressionFormat::Hevc,
        Compression::Av1 => CompressionFormat::Av1,
    }
}

fn new_encoder(options: &SaveOptions) -> Result<Encoder<'static>, NativeError> {
    let format = compression_format(options.compression());
    let mut encoder = match options.encoder() {
        Some(name) => {
            let descriptor = LIB_HEIF
                .encoder_descriptors(1, Some(format), Some(name))
                .into_iter()
                .next()
                .ok_or_else(|| {
                    NativeError::new(
                        NativeErrorKind::EncoderPlugin,
                        format!("No {name} encoder available for {}", options.compression().as_str()),
                    )
                })?;
            LIB_HEIF.encoder(descriptor).map_err(native_error)?
        }
        None => LIB_HEIF.encoder_for_format(format).map_err(native_error)?,
    };

    if options.lossless() {
        encoder
            .set_quality(EncoderQuality::LossLess)
            .map_err(native_error)?;
    } else if let Some(quality) = options.quality() {
        let quality = u8::try_from(quality).unwrap_or(100);
        encoder
            .set_quality(EncoderQuality::Lossy(quality))
            .map_err(native_error)?;
    }
    if let Some(subsampling) = options.subsampling() {
        encoder
            .set_parameter_value(
                "chroma",
                EncoderParameterValue::String(subsampling.as_param().to_string()),
            )
            .map_err(native_error)?;
    }
    if let Some(speed) = options.speed() {
        encoder
            .set_parameter_value("speed", int_param("speed", speed)?)
            .map_err(native_error)?;
    }
    if let Some(threads) = options.concurrency() {
        encoder
            .set_parameter_value("threads", int_param("threads", threads)?)
            .map_err(native_error)?;
    }
    Ok(encoder)
}

fn int_param(name: &str, value: u32) -> Result<EncoderParameterValue, NativeError> {
    i32::try_from(value)
        .map(EncoderParameterValue::Int)
        .map_err(|_| {
            NativeError::new(
                NativeErrorKind::Usage,
                format!("{name} value {value} is out of range"),
            )
        })
}

fn encoding_options(options: &SaveOptions) -> Result<Option<EncodingOptions>, NativeError> {
    let Some(downsampling) = options.downsampling() else {
        return Ok(None);
    };
    let mut encoding = EncodingOptions::new().map_err(native_error)?;
    let mut conversion = encoding.color_conversion_options();
    conversion.preferred_chroma_downsampling_algorithm = match downsampling {
        ChromaDownsampling::NearestNeighbor => ChromaDownsamplingAlgorithm::NearestNeighbor,
        ChromaDownsampling::Average => ChromaDownsamplingAlgorithm::Average,
        ChromaDownsampling::SharpYuv => ChromaDownsamplingAlgorithm::SharpYuv,
    };
    conversion.only_use_preferred_chroma_algorithm = true;
    encoding.set_color_conversion_options(conversion);
    Ok(Some(encoding))
}

fn build_image(frame: &EncodeFrame<'_>, icc_profile: Option<&[u8]>) -> Result<Image, NativeError> {
    let (color_space, channel) = match frame.layout {
        PixelLayout::Mono8 => (ColorSpace::Monochrome, Channel::Y),
        PixelLayout::Rgb8 => (ColorSpace::Rgb(RgbChroma::Rgb), Channel::Interleaved),
        PixelLayout::Rgba8 => (ColorSpace::Rgb(RgbChroma::Rgba), Channel::Interleaved),
    };
    let mut image = Image::new(frame.width, frame.height, color_space).map_err(native_error)?;
    image
        .create_plane(channel, frame.width, frame.height, 8)
        .map_err(native_error)?;

    let row_bytes = frame.width as usize * frame.layout.channels();
    {
        let planes = image.planes_mut();
        let plane = match frame.layout {
            PixelLayout::Mono8 => planes.y,
            PixelLayout::Rgb8 | PixelLayout::Rgba8 => planes.interleaved,
        }
        .ok_or_else(|| NativeError::new(NativeErrorKind::Other, "Failed to allocate image plane"))?;
        let stride = plane.stride;
        for (dst, src) in plane
            .data
            .chunks_mut(stride)
            .zip(frame.data.chunks_exact(row_bytes))
        {
            dst[..row_bytes].copy_from_slice(src);
        }
    }

    if let Some(icc) = icc_profile {
        let profile = ColorProfileRaw::new(PROF, icc.to_vec());
        image
            .set_color_profile_raw(&profile)
            .map_err(native_error)?;
    }
    Ok(image)
}

impl HeifCodec for LibHeifCodec {
    type Context = LibHeifContext;

    fn name(&self) -> &'static str {
        "libheif"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::DETECT | Capabilities::DECODE | Capabilities::ENCODE
    }

    fn open(&self, data: Vec<u8>) -> Result<Self::Context, NativeError> {
        let len = data.len() as u64;
        let reader = StreamReader::new(Cursor::new(data), len);
        let context = HeifContext::read_from_reader(Box::new(reader)).map_err(native_error)?;
        let primary = context.primary_image_handle().map_err(native_error)?;
        Ok(LibHeifContext::new(context, primary))
    }

    fn encode(&self, input: &EncodeInput<'_>) -> Result<Vec<u8>, NativeError> {
        let mut encoder = new_encoder(input.options)?;
        let mut context = HeifContext::new().map_err(native_error)?;
        for (index, frame) in input.frames.iter().enumerate() {
            let image = build_image(frame, input.icc_profile)?;
            let handle = context
                .encode_image(&image, &mut encoder, encoding_options(input.options)?)
                .map_err(native_error)?;
            if index == 0 {
                if let Some(exif) = input.exif {
                    context
                        .add_exif_metadata(&handle, exif)
                        .map_err(native_error)?;
                }
            }
        }
        let bytes = context.write_to_bytes().map_err(native_error)?;
        debug!(
            frames = input.frames.len(),
            bytes = bytes.len(),
            "libheif encode finished"
        );
        Ok(bytes)
    }
}
