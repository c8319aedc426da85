#![no_main]

//! Arbitrary bytes through open + load on the libheif backend.

use heif_image_plugin::{libheif_plugin, DecodeOptions, Limits, SequencePolicy};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let plugin = libheif_plugin().with_decode_options(DecodeOptions {
        sequence_policy: SequencePolicy::PrimaryImage,
        limits: Limits {
            max_dimension: 4096,
            max_pixels: 4096 * 4096,
        },
    });
    if let Ok(mut image) = plugin.open_bytes(data.to_vec()) {
        let _ = image.load();
    }
});
