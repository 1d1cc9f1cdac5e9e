//! Image codec collaborator.
//!
//! `ImageCodec` is the seam the validator talks to; `ImageRsCodec` backs
//! it with the `image` crate. Calls are blocking and are run on the
//! blocking pool by the caller.
//!
//! Animated input keeps every frame: GIF is decoded and re-encoded one
//! frame at a time under a work budget, and APNG is stripped at the chunk
//! level without decoding. Animated WebP is left to the caller's fallback.

use std::io::Cursor;

use bulwark_common::{DetectedMime, Dimensions};
use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPDecoder;
use image::metadata::Orientation;
use image::{AnimationDecoder, DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use thiserror::Error;

const JPEG_QUALITY: u8 = 90;

/// Ceiling on decoding work for one animated re-encode
#[derive(Debug, Clone, Copy)]
struct AnimationBudget {
    max_frames: usize,
    /// Sum of canvas pixels over all decoded frames
    max_pixels: u64,
}

const ANIMATION_BUDGET: AnimationBudget = AnimationBudget {
    max_frames: 1_000,
    max_pixels: 512 * 1024 * 1024,
};

const PNG_SIGNATURE_LEN: usize = 8;

/// Chunks that survive APNG stripping. Everything else, including eXIf,
/// tEXt, zTXt, iTXt and tIME, is dropped.
const PNG_KEPT_CHUNKS: &[&[u8; 4]] = &[
    b"IHDR", b"PLTE", b"IDAT", b"IEND", b"tRNS", b"acTL", b"fcTL", b"fdAT", b"gAMA", b"cHRM",
    b"sRGB", b"iCCP", b"sBIT", b"bKGD",
];

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("{0} is not supported by this codec")]
    Unsupported(String),

    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),

    #[error("codec task failed: {0}")]
    Task(String),

    #[error("malformed {0}")]
    Malformed(&'static str),
}

/// Re-encode settings. Metadata is never written back, so every re-encode strips it.
#[derive(Debug, Clone, Copy)]
pub struct ReencodeOptions {
    /// Bake the EXIF orientation into the pixels before dropping the tag
    pub auto_orient: bool,
}

impl Default for ReencodeOptions {
    fn default() -> Self {
        Self { auto_orient: true }
    }
}

pub trait ImageCodec: Send + Sync + 'static {
    /// Read width and height from the header
    fn decode_metadata(&self, bytes: &[u8], format: DetectedMime) -> Result<Dimensions, CodecError>;

    /// Decode and encode again in the same format, without metadata
    fn reencode(
        &self,
        bytes: &[u8],
        format: DetectedMime,
        options: ReencodeOptions,
    ) -> Result<Vec<u8>, CodecError>;
}

/// `image`-crate codec
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageRsCodec;

impl ImageCodec for ImageRsCodec {
    fn decode_metadata(&self, bytes: &[u8], format: DetectedMime) -> Result<Dimensions, CodecError> {
        let mut reader = ImageReader::new(Cursor::new(bytes));
        reader.set_format(image_format(format));
        let (width, height) = reader.into_dimensions()?;
        Ok(Dimensions::new(width, height))
    }

    fn reencode(
        &self,
        bytes: &[u8],
        format: DetectedMime,
        options: ReencodeOptions,
    ) -> Result<Vec<u8>, CodecError> {
        match format {
            DetectedMime::Gif => reencode_gif(bytes, ANIMATION_BUDGET),
            DetectedMime::Png if png_is_animated(bytes)? => strip_png_chunks(bytes),
            DetectedMime::WebP if webp_is_animated(bytes)? => {
                Err(CodecError::Unsupported("animated image/webp".to_string()))
            }
            _ => reencode_still(bytes, format, options),
        }
    }
}

fn image_format(mime: DetectedMime) -> ImageFormat {
    match mime {
        DetectedMime::Jpeg => ImageFormat::Jpeg,
        DetectedMime::Png => ImageFormat::Png,
        DetectedMime::Gif => ImageFormat::Gif,
        DetectedMime::WebP => ImageFormat::WebP,
        DetectedMime::Ico => ImageFormat::Ico,
        DetectedMime::Avif => ImageFormat::Avif,
    }
}

fn reencode_still(
    bytes: &[u8],
    format: DetectedMime,
    options: ReencodeOptions,
) -> Result<Vec<u8>, CodecError> {
    let mut reader = ImageReader::new(Cursor::new(bytes));
    reader.set_format(image_format(format));

    let mut decoder = reader.into_decoder()?;
    let orientation = if options.auto_orient {
        decoder.orientation()?
    } else {
        Orientation::NoTransforms
    };

    let mut image = DynamicImage::from_decoder(decoder)?;
    image.apply_orientation(orientation);

    encode(image, format)
}

fn encode(image: DynamicImage, format: DetectedMime) -> Result<Vec<u8>, CodecError> {
    let mut out = Cursor::new(Vec::new());

    match format {
        // JPEG has no alpha channel
        DetectedMime::Jpeg => {
            let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY))?;
        }
        other => image.write_to(&mut out, image_format(other))?,
    }

    Ok(out.into_inner())
}

/// Every frame and its delay survive; extension blocks do not. Frames
/// are streamed into the encoder so only one canvas is held at a time.
fn reencode_gif(bytes: &[u8], budget: AnimationBudget) -> Result<Vec<u8>, CodecError> {
    let decoder = GifDecoder::new(Cursor::new(bytes))?;
    let (width, height) = decoder.dimensions();
    let canvas = u64::from(width) * u64::from(height);

    let mut out = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut out);
        encoder.set_repeat(Repeat::Infinite)?;

        let mut decoded_pixels: u64 = 0;
        for (index, frame) in decoder.into_frames().enumerate() {
            decoded_pixels = decoded_pixels.saturating_add(canvas);
            if index >= budget.max_frames || decoded_pixels > budget.max_pixels {
                return Err(CodecError::Unsupported(format!(
                    "animated image/gif beyond {} frames or {} pixels",
                    budget.max_frames, budget.max_pixels
                )));
            }
            encoder.encode_frame(frame?)?;
        }
    }
    Ok(out)
}

/// Raw chunks (length, type, data, CRC) after the signature, through IEND
fn png_chunks(bytes: &[u8]) -> Result<Vec<([u8; 4], &[u8])>, CodecError> {
    let mut chunks = Vec::new();
    let mut pos = PNG_SIGNATURE_LEN;

    loop {
        let header = bytes
            .get(pos..pos + 8)
            .ok_or(CodecError::Malformed("PNG chunk header"))?;
        let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let kind = [header[4], header[5], header[6], header[7]];

        let end = len
            .checked_add(12)
            .and_then(|total| pos.checked_add(total))
            .ok_or(CodecError::Malformed("PNG chunk length"))?;
        let chunk = bytes
            .get(pos..end)
            .ok_or(CodecError::Malformed("PNG chunk"))?;

        chunks.push((kind, chunk));
        pos = end;

        if &kind == b"IEND" {
            return Ok(chunks);
        }
    }
}

/// APNG announces itself with acTL before the first IDAT
fn png_is_animated(bytes: &[u8]) -> Result<bool, CodecError> {
    Ok(png_chunks(bytes)?
        .iter()
        .map(|(kind, _)| kind)
        .take_while(|kind| *kind != b"IDAT")
        .any(|kind| kind == b"acTL"))
}

/// Copy the signature and every kept chunk verbatim, frames included
fn strip_png_chunks(bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
    let chunks = png_chunks(bytes)?;
    let mut out = Vec::with_capacity(bytes.len());
    out.extend_from_slice(&bytes[..PNG_SIGNATURE_LEN]);

    for (kind, raw) in chunks {
        if PNG_KEPT_CHUNKS.contains(&&kind) {
            out.extend_from_slice(raw);
        }
    }
    Ok(out)
}

fn webp_is_animated(bytes: &[u8]) -> Result<bool, CodecError> {
    let decoder = WebPDecoder::new(Cursor::new(bytes))?;
    Ok(decoder.has_animation())
}
