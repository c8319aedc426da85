#![no_main]

use heif_image_plugin::engine::format::{detect, sniff};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let detected = detect(data);
    assert_eq!(detected, sniff(data).is_some());
});
