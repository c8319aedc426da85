// src/engine/options.rs
//
// Save and decode configuration.
// SaveOptions is immutable once built and validated before any native call.

use crate::engine::common::EngineResult;
use crate::error::HeifError;
use std::path::Path;
use tracing::debug;

/// Compression backend inside the HEIF container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {
    /// HEVC (`.heic`)
    Hevc,
    /// AV1 (`.avif`)
    Av1,
}

impl Compression {
    pub fn as_str(self) -> &'static str {
        match self {
            Compression::Hevc => "heic",
            Compression::Av1 => "avif",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "heic" | "heif" | "hif" => Some(Compression::Hevc),
            "avif" => Some(Compression::Av1),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChromaSubsampling {
    Yuv444,
    Yuv422,
    Yuv420,
}

impl ChromaSubsampling {
    /// Value for the encoder's `chroma` parameter.
    pub fn as_param(self) -> &'static str {
        match self {
            ChromaSubsampling::Yuv444 => "444",
            ChromaSubsampling::Yuv422 => "422",
            ChromaSubsampling::Yuv420 => "420",
        }
    }

    /// Accepts `4:2:0`, `420`, or the numeric indices 0/1/2 used by other
    /// encoders. Anything else is `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "0" | "444" | "4:4:4" => Some(ChromaSubsampling::Yuv444),
            "1" | "422" | "4:2:2" => Some(ChromaSubsampling::Yuv422),
            "2" | "420" | "4:2:0" => Some(ChromaSubsampling::Yuv420),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChromaDownsampling {
    NearestNeighbor,
    Average,
    SharpYuv,
}

impl ChromaDownsampling {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "nn" | "nearest-neighbor" => Some(ChromaDownsampling::NearestNeighbor),
            "average" => Some(ChromaDownsampling::Average),
            "sharp-yuv" | "sharpyuv" => Some(ChromaDownsampling::SharpYuv),
            _ => None,
        }
    }
}

/// Encoder configuration for one save.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveOptions {
    quality: Option<u32>,
    lossless: bool,
    subsampling: Option<ChromaSubsampling>,
    downsampling: Option<ChromaDownsampling>,
    compression: Option<Compression>,
    encoder: Option<String>,
    speed: Option<u32>,
    concurrency: Option<u32>,
    save_all_frames: bool,
    exif: Option<Vec<u8>>,
    icc_profile: Option<Vec<u8>>,
}

impl SaveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lossy quality 0..=100. Out-of-range values are rejected by `validate`.
    pub fn with_quality(mut self, quality: u32) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_lossless(mut self, lossless: bool) -> Self {
        self.lossless = lossless;
        self
    }

    pub fn with_subsampling(mut self, subsampling: ChromaSubsampling) -> Self {
        self.subsampling = Some(subsampling);
        self
    }

    pub fn with_downsampling(mut self, downsampling: ChromaDownsampling) -> Self {
        self.downsampling = Some(downsampling);
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }

    /// Ask for a specific native encoder plugin by id (e.g. `x265`, `aom`).
    pub fn with_encoder(mut self, encoder: impl Into<String>) -> Self {
        self.encoder = Some(encoder.into());
        self
    }

    pub fn with_speed(mut self, speed: u32) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_concurrency(mut self, threads: u32) -> Self {
        self.concurrency = Some(threads);
        self
    }

    pub fn with_save_all_frames(mut self, save_all: bool) -> Self {
        self.save_all_frames = save_all;
        self
    }

    /// EXIF block (TIFF header first) to embed instead of the source image's.
    pub fn with_exif(mut self, exif: Vec<u8>) -> Self {
        self.exif = Some(exif);
        self
    }

    pub fn with_icc_profile(mut self, icc: Vec<u8>) -> Self {
        self.icc_profile = Some(icc);
        self
    }

    /// Fill in the compression from the file extension unless one was chosen.
    pub fn for_path(mut self, path: &Path) -> Self {
        if self.compression.is_none() {
            self.compression = path
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(Compression::from_extension);
        }
        self
    }

    /// Build options from string key/value pairs as a host application would
    /// pass them through. Unknown keys are ignored.
    pub fn from_params<I, K, V>(params: I) -> EngineResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut options = SaveOptions::default();
        for (key, value) in params {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "quality" => options.quality = Some(parse_number("quality", value)?),
                "lossless" => options.lossless = parse_flag("lossless", value)?,
                "subsampling" => {
                    options.subsampling = Some(ChromaSubsampling::parse(value).ok_or_else(|| {
                        HeifError::invalid_configuration(
                            "subsampling",
                            value.to_string(),
                            "expected 4:4:4, 4:2:2 or 4:2:0",
                        )
                    })?)
                }
                "downsampling" => {
                    options.downsampling =
                        Some(ChromaDownsampling::parse(value).ok_or_else(|| {
                            HeifError::invalid_configuration(
                                "downsampling",
                                value.to_string(),
                                "expected nn, average or sharp-yuv",
                            )
                        })?)
                }
                "encoder" => options.encoder = Some(value.to_string()),
                "speed" => options.speed = Some(parse_number("speed", value)?),
                "concurrency" => options.concurrency = Some(parse_number("concurrency", value)?),
                "avif" => {
                    if parse_flag("avif", value)? {
                        options.compression = Some(Compression::Av1);
                    }
                }
                "save_all" => options.save_all_frames = parse_flag("save_all", value)?,
                other => debug!(key = other, "ignoring unknown save option"),
            }
        }
        Ok(options)
    }

    /// Reject values the encoder would refuse. Runs before any native call.
    pub fn validate(&self) -> EngineResult<()> {
        if let Some(quality) = self.quality {
            if quality > 100 {
                return Err(HeifError::invalid_configuration(
                    "quality",
                    quality.to_string(),
                    "Quality must be between 0 and 100",
                ));
            }
        }
        for (name, value) in [("speed", self.speed), ("concurrency", self.concurrency)] {
            if let Some(value) = value {
                if i32::try_from(value).is_err() {
                    return Err(HeifError::invalid_configuration(
                        name,
                        value.to_string(),
                        "Value does not fit an encoder integer parameter",
                    ));
                }
            }
        }
        if self.concurrency == Some(0) {
            return Err(HeifError::invalid_configuration(
                "concurrency",
                "0",
                "At least one encoder thread is required",
            ));
        }
        if let Some(encoder) = &self.encoder {
            if encoder.trim().is_empty() {
                return Err(HeifError::invalid_configuration(
                    "encoder",
                    encoder.clone(),
                    "Encoder id must not be empty",
                ));
            }
        }
        Ok(())
    }

    pub fn quality(&self) -> Option<u32> {
        self.quality
    }

    pub fn lossless(&self) -> bool {
        self.lossless
    }

    pub fn subsampling(&self) -> Option<ChromaSubsampling> {
        self.subsampling
    }

    pub fn downsampling(&self) -> Option<ChromaDownsampling> {
        self.downsampling
    }

    /// Effective compression; HEVC unless AV1 was asked for.
    pub fn compression(&self) -> Compression {
        self.compression.unwrap_or(Compression::Hevc)
    }

    pub fn encoder(&self) -> Option<&str> {
        self.encoder.as_deref()
    }

    pub fn speed(&self) -> Option<u32> {
        self.speed
    }

    pub fn concurrency(&self) -> Option<u32> {
        self.concurrency
    }

    pub fn save_all_frames(&self) -> bool {
        self.save_all_frames
    }

    pub fn exif(&self) -> Option<&[u8]> {
        self.exif.as_deref()
    }

    pub fn icc_profile(&self) -> Option<&[u8]> {
        self.icc_profile.as_deref()
    }
}

fn parse_number(name: &'static str, value: &str) -> EngineResult<u32> {
    value.trim().parse::<u32>().map_err(|_| {
        HeifError::invalid_configuration(name, value.to_string(), "expected a non-negative integer")
    })
}

fn parse_flag(name: &'static str, value: &str) -> EngineResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(HeifError::invalid_configuration(
            name,
            value.to_string(),
            "expected a boolean",
        )),
    }
}

/// How to treat containers whose brand marks them as image sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequencePolicy {
    /// Fail `open` with `UnsupportedVariant`.
    #[default]
    Reject,
    /// Open the primary still image and ignore the tracks.
    PrimaryImage,
}

/// Upper bounds checked against the header before any pixels are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_dimension: u32,
    pub max_pixels: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_dimension: super::MAX_DIMENSION,
            max_pixels: super::MAX_PIXELS,
        }
    }
}

impl Limits {
    pub fn check(&self, width: u32, height: u32) -> EngineResult<()> {
        if width > self.max_dimension || height > self.max_dimension {
            return Err(HeifError::dimension_exceeds_limit(
                width.max(height),
                self.max_dimension,
            ));
        }
        let pixels = width as u64 * height as u64;
        if pixels > self.max_pixels {
            return Err(HeifError::pixel_count_exceeds_limit(pixels, self.max_pixels));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodeOptions {
    pub sequence_policy: SequencePolicy,
    pub limits: Limits,
}
