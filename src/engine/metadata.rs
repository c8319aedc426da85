// src/engine/metadata.rs
//
// EXIF and ICC handling. Both blobs are carried verbatim except for the
// EXIF Orientation tag, which is reset once the decoder has applied it.

use exif::{Field, In, Reader, Tag, Value};
use image::metadata::Orientation;
use std::borrow::Cow;
use std::io::Cursor;
use tracing::warn;

/// Prefix some writers leave in front of the TIFF header.
const EXIF_PREFIX: &[u8] = b"Exif\0\0";

/// Metadata attached to an opened or saved image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    /// EXIF block starting at the TIFF header.
    pub exif: Option<Vec<u8>>,
    pub icc_profile: Option<Vec<u8>>,
}

/// Strip an `Exif\0\0` prefix and require a TIFF header.
pub fn normalize_exif(raw: &[u8]) -> Option<&[u8]> {
    let data = raw.strip_prefix(EXIF_PREFIX).unwrap_or(raw);
    if data.starts_with(b"II*\0") || data.starts_with(b"MM\0*") {
        Some(data)
    } else {
        warn!(len = raw.len(), "dropping EXIF block without a TIFF header");
        None
    }
}

/// Orientation tag of the primary IFD, if present and valid.
pub fn exif_orientation(exif: &[u8]) -> Option<Orientation> {
    let parsed = Reader::new().read_raw(exif.to_vec()).ok()?;
    let value = parsed
        .get_field(Tag::Orientation, In::PRIMARY)?
        .value
        .get_uint(0)?;
    Orientation::from_exif(u8::try_from(value).ok()?)
}

/// Rewrite the EXIF block so its Orientation tag reads 1 (top-left).
///
/// Returns the block untouched when there is nothing to reset, and `None` when
/// the rewrite fails. Thumbnail (IFD1) fields are not carried over.
pub fn reset_exif_orientation(exif: &[u8]) -> Option<Cow<'_, [u8]>> {
    let parsed = match Reader::new().read_raw(exif.to_vec()) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(error = %err, "keeping unparsable EXIF block as-is");
            return Some(Cow::Borrowed(exif));
        }
    };
    let current = parsed
        .get_field(Tag::Orientation, In::PRIMARY)
        .and_then(|field| field.value.get_uint(0));
    if matches!(current, None | Some(1)) {
        return Some(Cow::Borrowed(exif));
    }

    let reset = Field {
        tag: Tag::Orientation,
        ifd_num: In::PRIMARY,
        value: Value::Short(vec![1]),
    };
    let mut writer = exif::experimental::Writer::new();
    for field in parsed.fields() {
        if field.ifd_num != In::PRIMARY || is_pointer_tag(field.tag) {
            continue;
        }
        if field.tag == Tag::Orientation {
            writer.push_field(&reset);
        } else {
            writer.push_field(field);
        }
    }

    let mut out = Cursor::new(Vec::new());
    match writer.write(&mut out, parsed.little_endian()) {
        Ok(()) => Some(Cow::Owned(out.into_inner())),
        Err(err) => {
            warn!(error = %err, "dropping EXIF block whose orientation could not be reset");
            None
        }
    }
}

// The writer lays out sub-IFDs itself.
fn is_pointer_tag(tag: Tag) -> bool {
    tag == Tag::ExifIFDPointer || tag == Tag::GPSInfoIFDPointer || tag == Tag::InteropIFDPointer
}

/// Validate an ICC profile header
/// ICC profiles must start with a 128-byte header containing specific fields
pub fn validate_icc_profile(icc_data: &[u8]) -> bool {
    if icc_data.len() < 128 {
        return false;
    }

    // Declared profile size (bytes 0-3, big-endian) must match
    let profile_size =
        u32::from_be_bytes([icc_data[0], icc_data[1], icc_data[2], icc_data[3]]) as usize;
    if profile_size != icc_data.len() {
        return false;
    }

    // Major version (byte 8) is 2, 4 or 5 in practice
    if icc_data[8] > 10 {
        return false;
    }

    // CMM type, device class, color space and PCS are four-character codes
    let signature_ranges = [4..8, 12..16, 16..20, 20..24];
    signature_ranges.into_iter().all(|range| {
        icc_data[range]
            .iter()
            .all(|&byte| (32..=126).contains(&byte) || byte == 0)
    })
}

/// Log suspicious profiles; the bytes are still passed through untouched.
pub(crate) fn inspect_icc_profile(icc_data: &[u8], direction: &'static str) {
    if !validate_icc_profile(icc_data) {
        warn!(
            len = icc_data.len(),
            direction, "ICC profile header looks malformed; passing it through unchanged"
        );
    }
}
