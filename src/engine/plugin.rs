// src/engine/plugin.rs
//
// The plugin object and its explicit registration with the host framework.

use crate::codecs::{Capabilities, HeifCodec, NativeContext, NativeError, NativeErrorKind};
use crate::engine::common::{run_native, EngineResult};
use crate::engine::decoder::{HeifDecoder, HeifImage};
use crate::engine::encoder;
use crate::engine::format::{self, DECODE_EXTENSIONS, DETECTION_MASK, DETECTION_SIGNATURES};
use crate::engine::metadata::Metadata;
use crate::engine::options::{DecodeOptions, SaveOptions, SequencePolicy};
use crate::engine::FORMAT_NAME;
use crate::error::HeifError;
use image::hooks::{
    decoding_hook_registered, register_decoding_hook, register_format_detection_hook,
};
use image::DynamicImage;
use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// HEIF/HEIC format adapter over a native codec backend.
pub struct HeifPlugin<C: HeifCodec> {
    codec: Arc<C>,
    decode_options: DecodeOptions,
}

impl<C: HeifCodec> Clone for HeifPlugin<C> {
    fn clone(&self) -> Self {
        Self {
            codec: Arc::clone(&self.codec),
            decode_options: self.decode_options,
        }
    }
}

impl<C: HeifCodec> HeifPlugin<C> {
    pub fn new(codec: C) -> Self {
        Self {
            codec: Arc::new(codec),
            decode_options: DecodeOptions::default(),
        }
    }

    pub fn with_decode_options(mut self, options: DecodeOptions) -> Self {
        self.decode_options = options;
        self
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn capabilities(&self) -> Capabilities {
        self.codec.capabilities()
    }

    pub fn decode_options(&self) -> &DecodeOptions {
        &self.decode_options
    }

    /// Cheap signature check on a stream prefix. Never fails.
    pub fn detect(&self, prefix: &[u8]) -> bool {
        self.capabilities().contains(Capabilities::DETECT) && format::detect(prefix)
    }

    /// Read the whole stream and open it.
    pub fn open<R: Read>(&self, mut reader: R) -> EngineResult<HeifImage<C::Context>> {
        let mut data = Vec::new();
        reader
            .read_to_end(&mut data)
            .map_err(HeifError::stream_read_failed)?;
        self.open_bytes(data)
    }

    pub fn open_path(&self, path: impl AsRef<Path>) -> EngineResult<HeifImage<C::Context>> {
        let file = File::open(path.as_ref()).map_err(HeifError::stream_read_failed)?;
        self.open(BufReader::new(file))
    }

    /// Parse the container header and acquire one native context.
    ///
    /// Every failure after the context is created drops it before returning.
    pub fn open_bytes(&self, data: Vec<u8>) -> EngineResult<HeifImage<C::Context>> {
        if !self.capabilities().contains(Capabilities::DECODE) {
            return Err(HeifError::missing_capability("DECODE"));
        }
        let signature = format::sniff(&data).ok_or_else(HeifError::unrecognized_format)?;
        if signature.is_sequence() && self.decode_options.sequence_policy == SequencePolicy::Reject
        {
            return Err(HeifError::unsupported_variant(format!(
                "image sequence (brand {})",
                String::from_utf8_lossy(&signature.major_brand)
            )));
        }
        if signature.has_sequence_brand() {
            debug!(brands = ?signature.brands, "ignoring sequence tracks, opening primary image");
        }

        let codec = &self.codec;
        let context = run_native("open", move || codec.open(data))?.map_err(map_open_error)?;
        let header = run_native("header", || context.header())?.map_err(map_open_error)?;
        self.decode_options
            .limits
            .check(header.width, header.height)?;

        debug!(
            codec = self.codec.name(),
            brands = ?signature.brands,
            "opened native context"
        );
        Ok(HeifImage::from_context(context, signature, header))
    }

    /// Open a stream and wrap it in an `ImageDecoder`.
    pub fn decoder<R: Read>(&self, reader: R) -> EngineResult<HeifDecoder<C::Context>> {
        self.open(reader).map(HeifDecoder::new)
    }

    /// Open and fully decode in one call.
    pub fn decode<R: Read>(&self, reader: R) -> EngineResult<DynamicImage> {
        self.open(reader)?.into_dynamic_image()
    }

    pub fn encode(&self, image: &DynamicImage, options: &SaveOptions) -> EngineResult<Vec<u8>> {
        encoder::encode_frames(&*self.codec, std::slice::from_ref(image), None, options)
    }

    pub fn save<W: Write>(
        &self,
        image: &DynamicImage,
        options: &SaveOptions,
        writer: &mut W,
    ) -> EngineResult<()> {
        encoder::write_frames(
            &*self.codec,
            std::slice::from_ref(image),
            None,
            options,
            writer,
        )
    }

    /// Save, embedding `metadata` unless `options` carries its own blobs.
    pub fn save_with_metadata<W: Write>(
        &self,
        image: &DynamicImage,
        metadata: &Metadata,
        options: &SaveOptions,
        writer: &mut W,
    ) -> EngineResult<()> {
        encoder::write_frames(
            &*self.codec,
            std::slice::from_ref(image),
            Some(metadata),
            options,
            writer,
        )
    }

    /// Save several frames as top-level images when `save_all_frames` is set.
    pub fn save_all<W: Write>(
        &self,
        frames: &[DynamicImage],
        options: &SaveOptions,
        writer: &mut W,
    ) -> EngineResult<()> {
        encoder::write_frames(&*self.codec, frames, None, options, writer)
    }

    /// Save to a file; `.avif` selects AV1 unless the options chose otherwise.
    pub fn save_to_path(
        &self,
        image: &DynamicImage,
        path: impl AsRef<Path>,
        options: &SaveOptions,
    ) -> EngineResult<()> {
        let path = path.as_ref();
        let options = options.clone().for_path(path);
        // Encode first so a rejected request leaves no file behind.
        let encoded =
            encoder::encode_frames(&*self.codec, std::slice::from_ref(image), None, &options)?;
        let file = File::create(path).map_err(HeifError::stream_write_failed)?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(&encoded)
            .map_err(HeifError::stream_write_failed)?;
        writer.flush().map_err(HeifError::stream_write_failed)
    }
}

fn map_open_error(err: NativeError) -> HeifError {
    match err.kind {
        NativeErrorKind::UnsupportedFiletype | NativeErrorKind::UnsupportedFeature => {
            HeifError::unsupported_variant(err.message)
        }
        _ => HeifError::unreadable_format(err.message),
    }
}

/// What `register` installed into the host framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub format: &'static str,
    pub mime_types: &'static [&'static str],
    pub save_extensions: &'static [&'static str],
    pub detect_extensions: &'static [&'static str],
    pub capabilities: Capabilities,
    /// Extensions whose decoding hook this call installed. Empty when another
    /// registration got there first.
    pub decoding_hooks: Vec<&'static str>,
    pub detection_signatures: usize,
}

/// Register the plugin with the host framework.
///
/// Installs `ftyp` detection patterns and decoding hooks for `.heic`,
/// `.heif` and `.hif`. Calling it again is harmless: hooks already present
/// are left alone. Saving goes through the plugin's own methods because the
/// host framework has no encoder hooks.
pub fn register<C>(plugin: HeifPlugin<C>) -> EngineResult<Registration>
where
    C: HeifCodec + 'static,
    C::Context: 'static,
{
    let capabilities = plugin.capabilities();
    if capabilities.is_empty() {
        return Err(HeifError::missing_capability("DETECT | DECODE | ENCODE"));
    }

    let already_registered = DECODE_EXTENSIONS
        .iter()
        .any(|ext| decoding_hook_registered(OsStr::new(ext)));

    let mut detection_signatures = 0;
    if capabilities.contains(Capabilities::DETECT) && !already_registered {
        for signature in DETECTION_SIGNATURES {
            register_format_detection_hook(
                OsString::from(DECODE_EXTENSIONS[0]),
                *signature,
                Some(DETECTION_MASK),
            );
            detection_signatures += 1;
        }
    }

    let mut decoding_hooks = Vec::new();
    if capabilities.contains(Capabilities::DECODE) {
        let plugin = Arc::new(plugin);
        for ext in DECODE_EXTENSIONS {
            let hook_plugin = Arc::clone(&plugin);
            let installed = register_decoding_hook(
                OsString::from(*ext),
                Box::new(move |reader| {
                    let decoder = hook_plugin.decoder(reader)?;
                    Ok(Box::new(decoder))
                }),
            );
            if installed {
                decoding_hooks.push(*ext);
            }
        }
    }

    info!(
        format = FORMAT_NAME,
        ?capabilities,
        ?decoding_hooks,
        detection_signatures,
        "registered HEIF plugin"
    );
    Ok(Registration {
        format: FORMAT_NAME,
        mime_types: format::MIME_TYPES,
        save_extensions: format::SAVE_EXTENSIONS,
        detect_extensions: format::DETECT_EXTENSIONS,
        capabilities,
        decoding_hooks,
        detection_signatures,
    })
}
