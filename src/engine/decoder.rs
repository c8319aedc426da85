// src/engine/decoder.rs
//
// Opened HEIF images and the host-framework decoder built on top of them.
// Pixels are decoded lazily on the first load; the native context is
// released as soon as the pixels are materialized, or when the image is dropped.

use crate::codecs::{ContainerHeader, NativeContext, NativeError, NativeErrorKind};
use crate::engine::common::{run_native, EngineResult};
use crate::engine::convert::{self, PixelBuffer};
use crate::engine::format::Signature;
use crate::engine::metadata::{self, Metadata};
use crate::error::HeifError;
use image::error::{ParameterError, ParameterErrorKind};
use image::metadata::Orientation;
use image::{ColorType, DynamicImage, ImageDecoder, ImageError, ImageResult, LimitSupport};
use tracing::debug;

/// Header facts known from `open`, before any pixels are decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub color_type: ColorType,
    pub luma_bit_depth: u8,
    /// Orientation reported by the codec backend before the EXIF tag is
    /// reset. The libheif backend reads it from the EXIF Orientation tag, not
    /// from the `irot`/`imir` properties. Load applies the container
    /// transforms, so decoded pixels are always upright.
    pub container_orientation: Orientation,
    pub top_level_images: usize,
    pub signature: Signature,
}

enum LoadState<Ctx> {
    Opened(Ctx),
    Loaded(PixelBuffer),
}

/// Decoded pixels together with the image metadata.
#[derive(Debug, Clone, Copy)]
pub struct LoadedImage<'a> {
    pub pixels: &'a PixelBuffer,
    pub metadata: &'a Metadata,
}

/// An opened HEIF image.
///
/// Holds exactly one native context until `load` succeeds or the value is
/// dropped, whichever comes first.
pub struct HeifImage<Ctx: NativeContext> {
    info: ImageInfo,
    metadata: Metadata,
    state: LoadState<Ctx>,
}

impl<Ctx: NativeContext> HeifImage<Ctx> {
    pub(crate) fn from_context(context: Ctx, signature: Signature, header: ContainerHeader) -> Self {
        let color_type = convert::color_type_for(header.layout);
        let exif = header.exif.as_deref().and_then(|raw| {
            let exif = metadata::normalize_exif(raw)?;
            metadata::reset_exif_orientation(exif).map(|reset| reset.into_owned())
        });
        let icc_profile = header
            .color_profile
            .as_ref()
            .and_then(|profile| profile.icc_bytes())
            .map(|icc| {
                metadata::inspect_icc_profile(icc, "decode");
                icc.to_vec()
            });

        debug!(
            width = header.width,
            height = header.height,
            ?color_type,
            top_level_images = header.top_level_images,
            has_exif = exif.is_some(),
            has_icc = icc_profile.is_some(),
            "opened HEIF image"
        );

        Self {
            info: ImageInfo {
                width: header.width,
                height: header.height,
                color_type,
                luma_bit_depth: header.luma_bit_depth,
                container_orientation: header.orientation,
                top_level_images: header.top_level_images,
                signature,
            },
            metadata: Metadata { exif, icc_profile },
            state: LoadState::Opened(context),
        }
    }

    pub fn info(&self) -> &ImageInfo {
        &self.info
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.info.width, self.info.height)
    }

    pub fn color_type(&self) -> ColorType {
        self.info.color_type
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, LoadState::Loaded(_))
    }

    /// Decode the primary image once; later calls return the cached result
    /// without touching the native codec again.
    ///
    /// On failure the context stays open, so a retry decodes again.
    pub fn load(&mut self) -> EngineResult<LoadedImage<'_>> {
        if let LoadState::Opened(context) = &mut self.state {
            let pixels = decode_context(context, &self.info)?;
            // Replacing the state drops the context.
            self.state = LoadState::Loaded(pixels);
        }
        match &self.state {
            LoadState::Loaded(pixels) => Ok(LoadedImage {
                pixels,
                metadata: &self.metadata,
            }),
            LoadState::Opened(_) => Err(HeifError::internal_panic(
                "decoded pixels missing after a successful load",
            )),
        }
    }

    /// Load and hand the pixels over as an owned host image.
    pub fn into_dynamic_image(mut self) -> EngineResult<DynamicImage> {
        self.load()?;
        match self.state {
            LoadState::Loaded(pixels) => pixels.into_dynamic_image(),
            LoadState::Opened(_) => Err(HeifError::internal_panic(
                "decoded pixels missing after a successful load",
            )),
        }
    }
}

fn decode_context<Ctx: NativeContext>(
    context: &mut Ctx,
    info: &ImageInfo,
) -> EngineResult<PixelBuffer> {
    let native = run_native("decode", || context.decode())?.map_err(map_decode_error)?;
    let pixels = convert::from_native(native)?;
    if (pixels.width, pixels.height) != (info.width, info.height)
        || pixels.color_type != info.color_type
    {
        return Err(HeifError::decode_failed(format!(
            "decoder produced {}x{} {:?}, header announced {}x{} {:?}",
            pixels.width,
            pixels.height,
            pixels.color_type,
            info.width,
            info.height,
            info.color_type
        )));
    }
    debug!(
        width = pixels.width,
        height = pixels.height,
        bytes = pixels.data.len(),
        "decoded HEIF primary image"
    );
    Ok(pixels)
}

fn map_decode_error(err: NativeError) -> HeifError {
    match err.kind {
        NativeErrorKind::UnsupportedFeature => HeifError::unsupported_variant(err.message),
        _ => HeifError::decode_failed(err.message),
    }
}

/// `ImageDecoder` over an opened HEIF image.
///
/// Orientation is applied while decoding, so `orientation` reports no
/// transforms and the EXIF block carries a reset Orientation tag.
pub struct HeifDecoder<Ctx: NativeContext> {
    image: HeifImage<Ctx>,
}

impl<Ctx: NativeContext> HeifDecoder<Ctx> {
    pub fn new(image: HeifImage<Ctx>) -> Self {
        Self { image }
    }

    pub fn image(&self) -> &HeifImage<Ctx> {
        &self.image
    }

    pub fn into_inner(self) -> HeifImage<Ctx> {
        self.image
    }
}

impl<Ctx: NativeContext> ImageDecoder for HeifDecoder<Ctx> {
    fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn color_type(&self) -> ColorType {
        self.image.color_type()
    }

    fn icc_profile(&mut self) -> ImageResult<Option<Vec<u8>>> {
        Ok(self.image.metadata().icc_profile.clone())
    }

    fn exif_metadata(&mut self) -> ImageResult<Option<Vec<u8>>> {
        Ok(self.image.metadata().exif.clone())
    }

    fn orientation(&mut self) -> ImageResult<Orientation> {
        Ok(Orientation::NoTransforms)
    }

    fn set_limits(&mut self, mut limits: image::Limits) -> ImageResult<()> {
        limits.check_support(&LimitSupport::default())?;
        let (width, height) = self.dimensions();
        limits.check_dimensions(width, height)?;
        limits.reserve(self.total_bytes())?;
        Ok(())
    }

    fn read_image(mut self, buf: &mut [u8]) -> ImageResult<()> {
        let loaded = self.image.load()?;
        let data = &loaded.pixels.data;
        if buf.len() != data.len() {
            return Err(ImageError::Parameter(ParameterError::from_kind(
                ParameterErrorKind::DimensionMismatch,
            )));
        }
        buf.copy_from_slice(data);
        Ok(())
    }

    fn read_image_boxed(self: Box<Self>, buf: &mut [u8]) -> ImageResult<()> {
        (*self).read_image(buf)
    }
}
