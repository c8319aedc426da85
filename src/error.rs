// src/error.rs
//
// Unified error handling for heif-image-plugin
// Uses thiserror for simple, type-safe error handling
//
// Error Taxonomy:
// - UserError: Invalid input or configuration, recoverable
// - CodecError: Format/decoding/encoding issues reported by the codec
// - ResourceLimit: Dimension limits and stream I/O
// - InternalBug: Library bugs (should not happen)

use image::error::{
    DecodingError, EncodingError, ImageFormatHint, LimitError, LimitErrorKind, ParameterError,
    ParameterErrorKind, UnsupportedError, UnsupportedErrorKind,
};
use image::ImageError;
use std::borrow::Cow;
use thiserror::Error;

/// Error taxonomy used by callers to decide how to react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCategory {
    /// Invalid input, recoverable by the caller
    UserError,
    /// Format/decoding/encoding issues
    CodecError,
    /// Dimension limits and stream I/O
    ResourceLimit,
    /// Library bugs (should not happen)
    InternalBug,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::UserError => "UserError",
            ErrorCategory::CodecError => "CodecError",
            ErrorCategory::ResourceLimit => "ResourceLimit",
            ErrorCategory::InternalBug => "InternalBug",
        }
    }
}

/// heif-image-plugin error types
///
/// Every variant that originates in the native codec carries the codec's
/// diagnostic message verbatim.
#[derive(Debug, Error)]
pub enum HeifError {
    // Open Errors
    #[error("Not a HEIF/HEIC stream: leading bytes do not carry a HEIF ftyp signature")]
    UnrecognizedFormat,

    #[error("Unreadable HEIF container: {message}")]
    UnreadableFormat { message: Cow<'static, str> },

    #[error("Unsupported HEIF variant: {feature}")]
    UnsupportedVariant { feature: Cow<'static, str> },

    // Decode Errors
    #[error("Failed to decode HEIF image: {message}")]
    DecodeFailed { message: Cow<'static, str> },

    // Encode Errors
    #[error("Failed to encode as {format}: {message}")]
    EncodeFailed {
        format: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    #[error("Cannot write pixel mode {mode} as HEIF")]
    UnsupportedPixelMode { mode: Cow<'static, str> },

    // Configuration Errors
    #[error("Invalid value for {name}: {value}. {reason}")]
    InvalidConfiguration {
        name: Cow<'static, str>,
        value: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    #[error("Codec does not provide the {capability} capability")]
    MissingCapability { capability: Cow<'static, str> },

    // Size Limit Errors
    #[error("Image dimension {dimension} exceeds maximum {max}")]
    DimensionExceedsLimit { dimension: u32, max: u32 },

    #[error("Image pixel count {pixels} exceeds maximum {max}")]
    PixelCountExceedsLimit { pixels: u64, max: u64 },

    // Stream Errors
    #[error("Failed to read HEIF stream: {source}")]
    StreamReadFailed {
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write HEIF stream: {source}")]
    StreamWriteFailed {
        #[source]
        source: std::io::Error,
    },

    // Internal Errors
    #[error("Internal error: {message}")]
    InternalPanic { message: Cow<'static, str> },
}

// Constructor Helpers
impl HeifError {
    pub fn unrecognized_format() -> Self {
        Self::UnrecognizedFormat
    }

    pub fn unreadable_format(message: impl Into<Cow<'static, str>>) -> Self {
        Self::UnreadableFormat {
            message: message.into(),
        }
    }

    pub fn unsupported_variant(feature: impl Into<Cow<'static, str>>) -> Self {
        Self::UnsupportedVariant {
            feature: feature.into(),
        }
    }

    pub fn decode_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn encode_failed(
        format: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn unsupported_pixel_mode(mode: impl Into<Cow<'static, str>>) -> Self {
        Self::UnsupportedPixelMode { mode: mode.into() }
    }

    pub fn invalid_configuration(
        name: impl Into<Cow<'static, str>>,
        value: impl Into<Cow<'static, str>>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidConfiguration {
            name: name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_capability(capability: impl Into<Cow<'static, str>>) -> Self {
        Self::MissingCapability {
            capability: capability.into(),
        }
    }

    pub fn dimension_exceeds_limit(dimension: u32, max: u32) -> Self {
        Self::DimensionExceedsLimit { dimension, max }
    }

    pub fn pixel_count_exceeds_limit(pixels: u64, max: u64) -> Self {
        Self::PixelCountExceedsLimit { pixels, max }
    }

    pub fn stream_read_failed(source: std::io::Error) -> Self {
        Self::StreamReadFailed { source }
    }

    pub fn stream_write_failed(source: std::io::Error) -> Self {
        Self::StreamWriteFailed { source }
    }

    pub fn internal_panic(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InternalPanic {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable (caller can fix it)
    ///
    /// Consistent with category(): UserError and ResourceLimit are recoverable,
    /// CodecError and InternalBug are not.
    pub fn is_recoverable(&self) -> bool {
        match self.category() {
            ErrorCategory::UserError | ErrorCategory::ResourceLimit => true,
            ErrorCategory::CodecError | ErrorCategory::InternalBug => false,
        }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnrecognizedFormat
            | Self::InvalidConfiguration { .. }
            | Self::UnsupportedPixelMode { .. }
            | Self::MissingCapability { .. } => ErrorCategory::UserError,

            Self::UnreadableFormat { .. }
            | Self::UnsupportedVariant { .. }
            | Self::DecodeFailed { .. }
            | Self::EncodeFailed { .. } => ErrorCategory::CodecError,

            Self::DimensionExceedsLimit { .. }
            | Self::PixelCountExceedsLimit { .. }
            | Self::StreamReadFailed { .. }
            | Self::StreamWriteFailed { .. } => ErrorCategory::ResourceLimit,

            Self::InternalPanic { .. } => ErrorCategory::InternalBug,
        }
    }
}

fn format_hint() -> ImageFormatHint {
    ImageFormatHint::Name(crate::engine::FORMAT_NAME.to_string())
}

// Conversion into the host framework's error type, used by the decoding hook
// and the ImageDecoder implementation.
impl From<HeifError> for ImageError {
    fn from(err: HeifError) -> Self {
        match err {
            HeifError::StreamReadFailed { source } | HeifError::StreamWriteFailed { source } => {
                ImageError::IoError(source)
            }
            HeifError::UnsupportedVariant { .. }
            | HeifError::UnsupportedPixelMode { .. }
            | HeifError::MissingCapability { .. } => {
                ImageError::Unsupported(UnsupportedError::from_format_and_kind(
                    format_hint(),
                    UnsupportedErrorKind::GenericFeature(err.to_string()),
                ))
            }
            HeifError::InvalidConfiguration { .. } => ImageError::Parameter(
                ParameterError::from_kind(ParameterErrorKind::Generic(err.to_string())),
            ),
            HeifError::DimensionExceedsLimit { .. } | HeifError::PixelCountExceedsLimit { .. } => {
                ImageError::Limits(LimitError::from_kind(LimitErrorKind::DimensionError))
            }
            HeifError::EncodeFailed { .. } => {
                ImageError::Encoding(EncodingError::new(format_hint(), err))
            }
            HeifError::UnrecognizedFormat
            | HeifError::UnreadableFormat { .. }
            | HeifError::DecodeFailed { .. }
            | HeifError::InternalPanic { .. } => {
                ImageError::Decoding(DecodingError::new(format_hint(), err))
            }
        }
    }
}

// Result type alias
pub type Result<T> = std::result::Result<T, HeifError>;
