// lib.rs
//
// heif-image-plugin: HEIF/HEIC support for the `image` crate
//
// Design goals:
// - The native codec owns every bitstream and container concern
// - Opening is cheap; pixels are decoded on first load only
// - One native context per open, released exactly once
// - Registration is an explicit call, never an import side effect

pub mod codecs;
pub mod engine;
pub mod error;

pub use codecs::{Capabilities, HeifCodec, NativeContext};
pub use engine::{
    detect, register, ChromaDownsampling, ChromaSubsampling, Compression, DecodeOptions,
    HeifDecoder, HeifImage, HeifPlugin, Limits, Metadata, PixelBuffer, Registration,
    SaveOptions, SequencePolicy,
};
pub use error::{ErrorCategory, HeifError, Result};

#[cfg(feature = "libheif")]
pub use codecs::LibHeifCodec;

/// Plugin backed by the system libheif.
#[cfg(feature = "libheif")]
pub fn libheif_plugin() -> HeifPlugin<LibHeifCodec> {
    HeifPlugin::new(LibHeifCodec::new())
}

/// Get library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Extensions the plugin reads.
pub fn supported_input_formats() -> Vec<&'static str> {
    engine::format::DECODE_EXTENSIONS.to_vec()
}

/// Extensions the plugin writes.
pub fn supported_output_formats() -> Vec<&'static str> {
    engine::format::SAVE_EXTENSIONS.to_vec()
}
