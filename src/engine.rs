// src/engine.rs
//
// The core of heif-image-plugin. An adapter that:
// 1. Sniffs HEIF signatures without touching the native codec
// 2. Opens containers into one native context, decoding pixels only on load
// 3. Validates save requests before handing them to the native encoder
//
// This file is a facade over the modules in engine/

// =============================================================================
// SECURITY LIMITS
// =============================================================================

/// Maximum allowed image dimension (width or height).
/// Images larger than 32768x32768 are rejected to prevent decompression bombs.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum allowed total pixels (width * height).
/// 100 megapixels = 400MB uncompressed RGBA.
pub const MAX_PIXELS: u64 = 100_000_000;

/// Format name reported to the host framework.
pub const FORMAT_NAME: &str = "HEIF";

// =============================================================================
// MODULE DECOMPOSITION
// =============================================================================

mod common;
pub mod convert;
mod decoder;
mod encoder;
pub mod format;
pub mod metadata;
mod options;
mod plugin;

pub use convert::PixelBuffer;
pub use decoder::{HeifDecoder, HeifImage, ImageInfo, LoadedImage};
pub use encoder::{encode_frames, write_frames};
pub use format::{detect, Brand, Signature, DETECT_WINDOW};
pub use metadata::Metadata;
pub use options::{
    ChromaDownsampling, ChromaSubsampling, Compression, DecodeOptions, Limits, SaveOptions,
    SequencePolicy,
};
pub use plugin::{register, HeifPlugin, Registration};
