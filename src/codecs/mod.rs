// src/codecs/mod.rs
//
// The seam between the adapter and the native HEIF codec.
// The adapter only ever talks to a `HeifCodec`; the codec owns every
// bitstream, container and color-conversion concern.

#[cfg(feature = "libheif")]
pub mod libheif_safe;

#[cfg(feature = "libheif")]
pub use libheif_safe::LibHeifCodec;

use crate::engine::SaveOptions;
use bitflags::bitflags;
use image::metadata::Orientation;
use std::borrow::Cow;
use thiserror::Error;

bitflags! {
    /// Operations a codec backend can perform.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        const DETECT = 1 << 0;
        const DECODE = 1 << 1;
        const ENCODE = 1 << 2;
    }
}

/// Interleaved 8-bit pixel layouts exchanged with the native codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelLayout {
    Mono8,
    Rgb8,
    Rgba8,
}

impl PixelLayout {
    pub fn channels(self) -> usize {
        match self {
            PixelLayout::Mono8 => 1,
            PixelLayout::Rgb8 => 3,
            PixelLayout::Rgba8 => 4,
        }
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, PixelLayout::Rgba8)
    }
}

/// Color profile attached to the primary image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorProfile {
    /// Unrestricted ICC profile (`prof`)
    Icc(Vec<u8>),
    /// Restricted ICC profile (`rICC`)
    RestrictedIcc(Vec<u8>),
    /// Coded color parameters (`nclx`); carries no ICC payload
    Nclx,
}

impl ColorProfile {
    /// ICC bytes for either ICC flavour.
    pub fn icc_bytes(&self) -> Option<&[u8]> {
        match self {
            ColorProfile::Icc(data) | ColorProfile::RestrictedIcc(data) => Some(data),
            ColorProfile::Nclx => None,
        }
    }
}

/// Container-level facts available without decoding pixels.
#[derive(Debug, Clone)]
pub struct ContainerHeader {
    /// Width after the container's transformations.
    pub width: u32,
    /// Height after the container's transformations.
    pub height: u32,
    /// Layout `NativeContext::decode` will produce.
    pub layout: PixelLayout,
    pub luma_bit_depth: u8,
    /// Orientation the backend reports for the primary image. Backends without
    /// a transform query report the EXIF Orientation tag. `decode` applies the
    /// container transforms either way.
    pub orientation: Orientation,
    pub top_level_images: usize,
    /// EXIF payload with the HEIF TIFF-offset prefix already removed.
    pub exif: Option<Vec<u8>>,
    pub color_profile: Option<ColorProfile>,
}

/// Decoded primary image as handed back by the native library.
///
/// Rows may be padded: `stride >= width * layout.channels()`.
#[derive(Debug, Clone)]
pub struct NativeImage {
    pub layout: PixelLayout,
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub data: Vec<u8>,
}

/// One tightly packed frame ready for the encoder.
#[derive(Debug, Clone)]
pub struct EncodeFrame<'a> {
    pub layout: PixelLayout,
    pub width: u32,
    pub height: u32,
    pub data: Cow<'a, [u8]>,
}

/// Everything the native encode call receives.
///
/// The first frame becomes the primary image.
#[derive(Debug)]
pub struct EncodeInput<'a> {
    pub frames: Vec<EncodeFrame<'a>>,
    pub options: &'a SaveOptions,
    pub exif: Option<&'a [u8]>,
    pub icc_profile: Option<&'a [u8]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeErrorKind {
    InvalidInput,
    UnsupportedFiletype,
    UnsupportedFeature,
    MemoryAllocation,
    DecoderPlugin,
    EncoderPlugin,
    Usage,
    Other,
}

/// Failure reported by the native library, message kept verbatim.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct NativeError {
    pub kind: NativeErrorKind,
    pub message: String,
}

impl NativeError {
    pub fn new(kind: NativeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// An open native decoding context. Dropping it releases the native resources.
pub trait NativeContext {
    /// Header facts; must not decode pixel data.
    fn header(&self) -> Result<ContainerHeader, NativeError>;

    /// Decode the primary image with the container's transformations applied.
    fn decode(&mut self) -> Result<NativeImage, NativeError>;
}

/// A native HEIF codec backend.
pub trait HeifCodec: Send + Sync {
    type Context: NativeContext;

    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    /// Parse the container and return an open context. Takes ownership of the
    /// bytes so the context can outlive the caller's stream.
    fn open(&self, data: Vec<u8>) -> Result<Self::Context, NativeError>;

    fn encode(&self, input: &EncodeInput<'_>) -> Result<Vec<u8>, NativeError>;
}
