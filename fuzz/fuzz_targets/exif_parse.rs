#![no_main]

//! EXIF normalization and Orientation reset on arbitrary data.

use heif_image_plugin::engine::metadata::{exif_orientation, normalize_exif, reset_exif_orientation};
use image::metadata::Orientation;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some(exif) = normalize_exif(data) else {
        return;
    };
    let _ = exif_orientation(exif);
    if let Some(reset) = reset_exif_orientation(exif) {
        let orientation = exif_orientation(&reset);
        assert!(matches!(orientation, None | Some(Orientation::NoTransforms)));
    }
});
