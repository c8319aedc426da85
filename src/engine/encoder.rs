// src/engine/encoder.rs
//
// Save path: validate options, convert pixel layouts, then one native encode.
// Nothing reaches the native codec until the whole request has been checked.

use crate::codecs::{Capabilities, EncodeInput, HeifCodec};
use crate::engine::common::{run_native, EngineResult};
use crate::engine::convert;
use crate::engine::metadata::{self, Metadata};
use crate::engine::options::SaveOptions;
use crate::error::HeifError;
use image::DynamicImage;
use std::io::Write;
use tracing::debug;

/// Encode `frames` into a complete HEIF container.
///
/// Only the first frame is written unless `save_all_frames` is set. EXIF and
/// ICC come from `options` first, then from `source`.
pub fn encode_frames<C: HeifCodec>(
    codec: &C,
    frames: &[DynamicImage],
    source: Option<&Metadata>,
    options: &SaveOptions,
) -> EngineResult<Vec<u8>> {
    if !codec.capabilities().contains(Capabilities::ENCODE) {
        return Err(HeifError::missing_capability("ENCODE"));
    }
    options.validate()?;

    let frames = match frames {
        [] => {
            return Err(HeifError::invalid_configuration(
                "frames",
                "0",
                "At least one frame is required",
            ))
        }
        [first, ..] if !options.save_all_frames() => std::slice::from_ref(first),
        all => all,
    };

    let frames = frames
        .iter()
        .map(convert::to_encode_frame)
        .collect::<EngineResult<Vec<_>>>()?;

    let exif = options
        .exif()
        .or_else(|| source.and_then(|meta| meta.exif.as_deref()))
        .and_then(metadata::normalize_exif);
    let icc_profile = options
        .icc_profile()
        .or_else(|| source.and_then(|meta| meta.icc_profile.as_deref()));
    if let Some(icc) = icc_profile {
        metadata::inspect_icc_profile(icc, "encode");
    }

    let format = options.compression().as_str();
    debug!(
        format,
        frames = frames.len(),
        quality = ?options.quality(),
        lossless = options.lossless(),
        encoder = ?options.encoder(),
        "encoding HEIF"
    );

    let input = EncodeInput {
        frames,
        options,
        exif,
        icc_profile,
    };
    let encoded = run_native("encode", || codec.encode(&input))?
        .map_err(|err| HeifError::encode_failed(format, err.message))?;
    if encoded.is_empty() {
        return Err(HeifError::encode_failed(
            format,
            "native encoder returned no data",
        ));
    }
    Ok(encoded)
}

/// Encode and write the container to `writer`.
pub fn write_frames<C: HeifCodec, W: Write>(
    codec: &C,
    frames: &[DynamicImage],
    source: Option<&Metadata>,
    options: &SaveOptions,
    writer: &mut W,
) -> EngineResult<()> {
    let encoded = encode_frames(codec, frames, source, options)?;
    writer
        .write_all(&encoded)
        .map_err(HeifError::stream_write_failed)?;
    writer.flush().map_err(HeifError::stream_write_failed)?;
    debug!(bytes = encoded.len(), "wrote HEIF container");
    Ok(())
}
