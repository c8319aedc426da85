// src/engine/format.rs
//
// HEIF signature sniffing: brands, extensions and MIME types.

/// Number of leading bytes `detect` is allowed to look at.
pub const DETECT_WINDOW: usize = 32;

pub const MIME_TYPES: &[&str] = &["image/heif", "image/heic"];

/// Extensions the plugin writes.
pub const SAVE_EXTENSIONS: &[&str] = &["heic", "avif"];

/// Extensions recognized for reading only.
pub const DETECT_EXTENSIONS: &[&str] = &["heif", "hif"];

/// Extensions routed to the plugin by the host framework's decoding hooks.
/// `avif` is left to the host framework's own AVIF support.
pub const DECODE_EXTENSIONS: &[&str] = &["heic", "heif", "hif"];

/// ISOBMFF brands that identify HEIF content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Brand {
    Heic,
    Heix,
    Heim,
    Heis,
    Hevc,
    Hevx,
    Hevm,
    Hevs,
    Mif1,
    Msf1,
    Avif,
    Avis,
}

impl Brand {
    pub const ALL: [Brand; 12] = [
        Brand::Heic,
        Brand::Heix,
        Brand::Heim,
        Brand::Heis,
        Brand::Hevc,
        Brand::Hevx,
        Brand::Hevm,
        Brand::Hevs,
        Brand::Mif1,
        Brand::Msf1,
        Brand::Avif,
        Brand::Avis,
    ];

    pub fn fourcc(self) -> &'static [u8; 4] {
        match self {
            Brand::Heic => b"heic",
            Brand::Heix => b"heix",
            Brand::Heim => b"heim",
            Brand::Heis => b"heis",
            Brand::Hevc => b"hevc",
            Brand::Hevx => b"hevx",
            Brand::Hevm => b"hevm",
            Brand::Hevs => b"hevs",
            Brand::Mif1 => b"mif1",
            Brand::Msf1 => b"msf1",
            Brand::Avif => b"avif",
            Brand::Avis => b"avis",
        }
    }

    pub fn from_fourcc(code: &[u8]) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|brand| brand.fourcc().as_slice() == code)
    }

    /// Brands for image sequences (tracks) rather than still image items.
    pub fn is_sequence(self) -> bool {
        matches!(
            self,
            Brand::Hevc | Brand::Hevx | Brand::Hevm | Brand::Hevs | Brand::Msf1 | Brand::Avis
        )
    }

    pub fn is_av1(self) -> bool {
        matches!(self, Brand::Avif | Brand::Avis)
    }
}

/// What the leading `ftyp` box says about a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub major_brand: [u8; 4],
    /// HEIF brands found among the major and compatible brands, in order.
    pub brands: Vec<Brand>,
}

impl Signature {
    pub fn major(&self) -> Option<Brand> {
        Brand::from_fourcc(&self.major_brand)
    }

    /// A stream is a sequence only when none of its HEIF brands is a
    /// still-image brand. `msf1` files that also list `mif1` or `heic` carry a
    /// primary item and open as stills.
    pub fn is_sequence(&self) -> bool {
        self.brands.iter().all(|brand| brand.is_sequence())
    }

    /// A sequence brand appears somewhere, even if a still image is present too.
    pub fn has_sequence_brand(&self) -> bool {
        self.brands.iter().any(|brand| brand.is_sequence())
    }
}

/// Parse the `ftyp` box inside the first `DETECT_WINDOW` bytes.
///
/// Layout: 4-byte box size, `ftyp`, major brand, minor version, then
/// compatible brands until the end of the box (or of the window).
pub fn sniff(prefix: &[u8]) -> Option<Signature> {
    let window = &prefix[..prefix.len().min(DETECT_WINDOW)];
    if window.len() < 12 || &window[4..8] != b"ftyp" {
        return None;
    }

    let box_size = u32::from_be_bytes([window[0], window[1], window[2], window[3]]) as usize;
    // 0 means "to end of file"; 1 announces a 64-bit size, which no real ftyp uses.
    let end = match box_size {
        0 => window.len(),
        1..=11 => return None,
        size => size.min(window.len()),
    };

    let mut major_brand = [0u8; 4];
    major_brand.copy_from_slice(&window[8..12]);

    let mut brands = Vec::new();
    if let Some(brand) = Brand::from_fourcc(&major_brand) {
        brands.push(brand);
    }
    let mut offset = 16;
    while offset + 4 <= end {
        if let Some(brand) = Brand::from_fourcc(&window[offset..offset + 4]) {
            if !brands.contains(&brand) {
                brands.push(brand);
            }
        }
        offset += 4;
    }

    if brands.is_empty() {
        return None;
    }
    Some(Signature {
        major_brand,
        brands,
    })
}

/// Does this prefix start a HEIF/HEIC container?
pub fn detect(prefix: &[u8]) -> bool {
    sniff(prefix).is_some()
}

/// Mask for host-framework detection hooks: ignore the box size.
pub const DETECTION_MASK: &[u8] = b"\x00\x00\x00\x00\xff\xff\xff\xff\xff\xff\xff\xff";

/// `ftyp` + major brand patterns registered with the host framework. AV1
/// brands are absent because the host framework claims them itself.
pub const DETECTION_SIGNATURES: &[&[u8]] = &[
    b"\x00\x00\x00\x00ftypheic",
    b"\x00\x00\x00\x00ftypheix",
    b"\x00\x00\x00\x00ftypheim",
    b"\x00\x00\x00\x00ftypheis",
    b"\x00\x00\x00\x00ftyphevc",
    b"\x00\x00\x00\x00ftyphevx",
    b"\x00\x00\x00\x00ftyphevm",
    b"\x00\x00\x00\x00ftyphevs",
    b"\x00\x00\x00\x00ftypmif1",
    b"\x00\x00\x00\x00ftypmsf1",
];
