// tests/common/mod.rs
//
// A counting fake codec. It stores raw pixels behind a real HEIF `ftyp` box
// and counts every native context it hands out and releases.

#![allow(dead_code)]

use heif_image_plugin::codecs::{
    Capabilities, ColorProfile, ContainerHeader, EncodeInput, HeifCodec, NativeContext,
    NativeError, NativeErrorKind, NativeImage, PixelLayout,
};
use heif_image_plugin::{Compression, SaveOptions};
use image::metadata::Orientation;
use image::{DynamicImage, RgbImage};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const MARKER: &[u8; 4] = b"FAKE";

#[derive(Debug, Default)]
pub struct FakeState {
    pub opened: AtomicUsize,
    pub released: AtomicUsize,
    pub decodes: AtomicUsize,
    pub encodes: AtomicUsize,
    pub fail_open: AtomicBool,
    pub fail_header: AtomicBool,
    pub fail_decode: AtomicBool,
    pub panic_decode: AtomicBool,
    pub fail_encode: AtomicBool,
    pub unsupported_feature: AtomicBool,
    /// Options handed to the most recent `encode` call.
    pub last_options: Mutex<Option<SaveOptions>>,
}

impl FakeState {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.opened() - self.released()
    }

    pub fn decodes(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }

    pub fn encodes(&self) -> usize {
        self.encodes.load(Ordering::SeqCst)
    }

    pub fn last_options(&self) -> Option<SaveOptions> {
        self.last_options.lock().unwrap().clone()
    }

    pub fn set(&self, flag: &AtomicBool, value: bool) {
        flag.store(value, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
pub struct FakeCodec {
    pub state: Arc<FakeState>,
    pub capabilities: Capabilities,
}

impl FakeCodec {
    pub fn new() -> Self {
        Self::with_capabilities(Capabilities::all())
    }

    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        Self {
            state: Arc::new(FakeState::default()),
            capabilities,
        }
    }
}

pub struct FakeContext {
    header: ContainerHeader,
    pixels: Vec<u8>,
    state: Arc<FakeState>,
}

impl Drop for FakeContext {
    fn drop(&mut self) {
        self.state.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl NativeContext for FakeContext {
    fn header(&self) -> Result<ContainerHeader, NativeError> {
        if self.state.fail_header.load(Ordering::SeqCst) {
            return Err(NativeError::new(
                NativeErrorKind::InvalidInput,
                "Invalid input: No 'meta' box",
            ));
        }
        Ok(self.header.clone())
    }

    fn decode(&mut self) -> Result<NativeImage, NativeError> {
        self.state.decodes.fetch_add(1, Ordering::SeqCst);
        if self.state.panic_decode.load(Ordering::SeqCst) {
            panic!("fake decoder exploded");
        }
        if self.state.fail_decode.load(Ordering::SeqCst) {
            return Err(NativeError::new(
                NativeErrorKind::InvalidInput,
                "Invalid input: Unspecified: End of data reached",
            ));
        }
        let row = self.header.width as usize * self.header.layout.channels();
        Ok(NativeImage {
            layout: self.header.layout,
            width: self.header.width,
            height: self.header.height,
            stride: row,
            data: self.pixels.clone(),
        })
    }
}

fn layout_code(layout: PixelLayout) -> u8 {
    match layout {
        PixelLayout::Mono8 => 0,
        PixelLayout::Rgb8 => 1,
        PixelLayout::Rgba8 => 2,
    }
}

fn layout_from_code(code: u8) -> Option<PixelLayout> {
    match code {
        0 => Some(PixelLayout::Mono8),
        1 => Some(PixelLayout::Rgb8),
        2 => Some(PixelLayout::Rgba8),
        _ => None,
    }
}

/// Build a fake container directly.
pub struct ContainerBuilder {
    pub major_brand: [u8; 4],
    pub compatible: Vec<[u8; 4]>,
    pub layout: PixelLayout,
    pub width: u32,
    pub height: u32,
    pub orientation: u8,
    pub frames: u32,
    pub exif: Vec<u8>,
    pub icc: Vec<u8>,
    pub pixels: Vec<u8>,
}

impl ContainerBuilder {
    pub fn rgb(width: u32, height: u32) -> Self {
        Self {
            major_brand: *b"heic",
            compatible: vec![*b"mif1", *b"heic"],
            layout: PixelLayout::Rgb8,
            width,
            height,
            orientation: 1,
            frames: 1,
            exif: Vec::new(),
            icc: Vec::new(),
            pixels: vec![0x80; (width * height * 3) as usize],
        }
    }

    pub fn brand(mut self, major: &[u8; 4], compatible: &[&[u8; 4]]) -> Self {
        self.major_brand = *major;
        self.compatible = compatible.iter().map(|b| **b).collect();
        self
    }

    pub fn exif(mut self, exif: Vec<u8>) -> Self {
        self.exif = exif;
        self
    }

    pub fn orientation(mut self, orientation: u8) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let ftyp_size = 16 + 4 * self.compatible.len() as u32;
        let mut out = Vec::new();
        out.extend_from_slice(&ftyp_size.to_be_bytes());
        out.extend_from_slice(b"ftyp");
        out.extend_from_slice(&self.major_brand);
        out.extend_from_slice(&[0, 0, 0, 0]);
        for brand in &self.compatible {
            out.extend_from_slice(brand);
        }
        out.extend_from_slice(MARKER);
        out.extend_from_slice(&self.width.to_be_bytes());
        out.extend_from_slice(&self.height.to_be_bytes());
        out.push(layout_code(self.layout));
        out.push(self.orientation);
        out.extend_from_slice(&self.frames.to_be_bytes());
        out.extend_from_slice(&(self.exif.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.exif);
        out.extend_from_slice(&(self.icc.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.icc);
        out.extend_from_slice(&self.pixels);
        out
    }
}

/// What the fake container carries besides pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed {
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    pub orientation: u8,
    pub frames: u32,
    pub exif: Vec<u8>,
    pub icc: Vec<u8>,
    pub pixels: Vec<u8>,
}

fn invalid(message: &str) -> NativeError {
    NativeError::new(NativeErrorKind::InvalidInput, message)
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], NativeError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| invalid("Invalid input: Unspecified: End of data reached"))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32, NativeError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn u8(&mut self) -> Result<u8, NativeError> {
        Ok(self.take(1)?[0])
    }
}

pub fn parse(data: &[u8]) -> Result<Parsed, NativeError> {
    if data.len() < 8 {
        return Err(invalid("Invalid input: No ftyp box"));
    }
    let ftyp_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    let mut cursor = Cursor {
        data,
        pos: ftyp_size,
    };
    if cursor.take(4)? != MARKER {
        return Err(invalid("Invalid input: No 'meta' box"));
    }
    let width = cursor.u32()?;
    let height = cursor.u32()?;
    let layout = layout_from_code(cursor.u8()?)
        .ok_or_else(|| invalid("Invalid input: unknown pixel layout"))?;
    let orientation = cursor.u8()?;
    let frames = cursor.u32()?;
    let exif_len = cursor.u32()? as usize;
    let exif = cursor.take(exif_len)?.to_vec();
    let icc_len = cursor.u32()? as usize;
    let icc = cursor.take(icc_len)?.to_vec();
    let pixel_len = width as usize * height as usize * layout.channels();
    let pixels = cursor.take(pixel_len)?.to_vec();
    Ok(Parsed {
        width,
        height,
        layout,
        orientation,
        frames,
        exif,
        icc,
        pixels,
    })
}

impl HeifCodec for FakeCodec {
    type Context = FakeContext;

    fn name(&self) -> &'static str {
        "fake"
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn open(&self, data: Vec<u8>) -> Result<FakeContext, NativeError> {
        if self.state.fail_open.load(Ordering::SeqCst) {
            return Err(invalid("Invalid input: Unspecified: End of data reached"));
        }
        if self.state.unsupported_feature.load(Ordering::SeqCst) {
            return Err(NativeError::new(
                NativeErrorKind::UnsupportedFeature,
                "Unsupported feature: Unsupported codec",
            ));
        }
        let parsed = parse(&data)?;
        let orientation =
            Orientation::from_exif(parsed.orientation).unwrap_or(Orientation::NoTransforms);
        let header = ContainerHeader {
            width: parsed.width,
            height: parsed.height,
            layout: parsed.layout,
            luma_bit_depth: 8,
            orientation,
            top_level_images: parsed.frames as usize,
            exif: (!parsed.exif.is_empty()).then(|| parsed.exif.clone()),
            color_profile: if parsed.icc.is_empty() {
                Some(ColorProfile::Nclx)
            } else {
                Some(ColorProfile::Icc(parsed.icc.clone()))
            },
        };
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(FakeContext {
            header,
            pixels: parsed.pixels,
            state: Arc::clone(&self.state),
        })
    }

    fn encode(&self, input: &EncodeInput<'_>) -> Result<Vec<u8>, NativeError> {
        self.state.encodes.fetch_add(1, Ordering::SeqCst);
        *self.state.last_options.lock().unwrap() = Some(input.options.clone());
        if self.state.fail_encode.load(Ordering::SeqCst) {
            return Err(NativeError::new(
                NativeErrorKind::EncoderPlugin,
                "Encoder plugin generated an error: Unsupported image type",
            ));
        }
        let first = input
            .frames
            .first()
            .ok_or_else(|| NativeError::new(NativeErrorKind::Usage, "no frames"))?;
        let major = match input.options.compression() {
            Compression::Hevc => *b"heic",
            Compression::Av1 => *b"avif",
        };
        let exif = input.exif.map(<[u8]>::to_vec).unwrap_or_default();
        let orientation = heif_image_plugin::engine::metadata::exif_orientation(&exif)
            .map(|o| o.to_exif())
            .unwrap_or(1);
        let builder = ContainerBuilder {
            major_brand: major,
            compatible: vec![*b"mif1", major],
            layout: first.layout,
            width: first.width,
            height: first.height,
            orientation,
            frames: input.frames.len() as u32,
            exif,
            icc: input.icc_profile.map(<[u8]>::to_vec).unwrap_or_default(),
            pixels: first.data.to_vec(),
        };
        Ok(builder.build())
    }
}

pub fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }))
}

/// Little-endian EXIF block carrying only an Orientation tag.
pub fn exif_with_orientation(orientation: u16) -> Vec<u8> {
    let field = exif::Field {
        tag: exif::Tag::Orientation,
        ifd_num: exif::In::PRIMARY,
        value: exif::Value::Short(vec![orientation]),
    };
    let mut writer = exif::experimental::Writer::new();
    writer.push_field(&field);
    let mut out = std::io::Cursor::new(Vec::new());
    writer.write(&mut out, true).unwrap();
    out.into_inner()
}

/// Smallest ICC profile whose header passes validation.
pub fn minimal_icc() -> Vec<u8> {
    let mut data = vec![0u8; 128];
    data[..4].copy_from_slice(&128u32.to_be_bytes());
    data[4..8].copy_from_slice(b"lcms");
    data[8] = 4;
    data[12..16].copy_from_slice(b"mntr");
    data[16..20].copy_from_slice(b"RGB ");
    data[20..24].copy_from_slice(b"XYZ ");
    data
}
