//! Image dimension detection from header bytes.
//!
//! Reads only as much of a file as needed to learn its pixel size, so that a
//! multi-gigabyte source can be rejected (e.g. for not being square) before it
//! is ever decoded.
//!
//! Detection reads one byte at a time into a magic-byte buffer and checks the
//! buffer against an ordered table of signatures after every byte. The first
//! match dispatches to that format's header decoder.
//!
//! | Format | Signature                 | Dimensions                           |
//! |--------|---------------------------|--------------------------------------|
//! | BMP    | `42 4D`                   | LE i32 width/height at offset 18     |
//! | GIF    | `GIF87a` / `GIF89a`       | LE u16 width/height after signature  |
//! | PNG    | `89 50 4E 47 0D 0A 1A 0A` | BE u32 width/height in IHDR          |
//! | JPEG   | `FF D8`                   | BE u16 height/width in SOF0 segment  |

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_square(&self) -> bool {
        self.width == self.height
    }
}

/// Header could not be interpreted.
///
/// A truncated stream is reported the same way as an unknown signature.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Could not recognise image format")]
pub struct FormatError;

impl From<io::Error> for FormatError {
    fn from(_: io::Error) -> Self {
        FormatError
    }
}

type DecodeFn = fn(&mut dyn Read) -> Result<Dimensions, FormatError>;

const SIGNATURES: &[(&[u8], DecodeFn)] = &[
    (&[0x42, 0x4D], decode_bmp),
    (&[0x47, 0x49, 0x46, 0x38, 0x37, 0x61], decode_gif),
    (&[0x47, 0x49, 0x46, 0x38, 0x39, 0x61], decode_gif),
    (&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A], decode_png),
    (&[0xFF, 0xD8], decode_jpeg),
];

const JPEG_SOF0: u8 = 0xC0;

fn max_signature_len() -> usize {
    SIGNATURES
        .iter()
        .map(|(magic, _)| magic.len())
        .max()
        .unwrap_or(0)
}

/// Reads image dimensions from the start of a byte stream.
pub fn read_dimensions<R: Read>(reader: &mut R) -> Result<Dimensions, FormatError> {
    let max_len = max_signature_len();
    let mut magic = Vec::with_capacity(max_len);

    while magic.len() < max_len {
        magic.push(read_u8(reader)?);

        if let Some((_, decode)) = SIGNATURES
            .iter()
            .find(|(signature, _)| magic.starts_with(signature))
        {
            return decode(reader);
        }
    }

    Err(FormatError)
}

/// Reads the dimensions of the image at `path`.
///
/// Returns `None` if the file does not exist or its header is not understood;
/// callers treat both as "cannot validate".
pub fn dimensions_of(path: &Path) -> Option<Dimensions> {
    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    match read_dimensions(&mut reader) {
        Ok(dims) => Some(dims),
        Err(e) => {
            debug!(path = %path.display(), "{}", e);
            None
        }
    }
}

fn read_u8(reader: &mut (impl Read + ?Sized)) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_array<const N: usize>(reader: &mut (impl Read + ?Sized)) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

fn skip(reader: &mut (impl Read + ?Sized), count: u64) -> io::Result<()> {
    let copied = io::copy(&mut (&mut *reader).take(count), &mut io::sink())?;
    if copied < count {
        return Err(io::ErrorKind::UnexpectedEof.into());
    }
    Ok(())
}

fn positive(value: i64) -> Result<u32, FormatError> {
    u32::try_from(value.unsigned_abs()).map_err(|_| FormatError)
}

fn decode_bmp(reader: &mut dyn Read) -> Result<Dimensions, FormatError> {
    skip(reader, 16)?;
    let width = i32::from_le_bytes(read_array(reader)?);
    let height = i32::from_le_bytes(read_array(reader)?);
    Ok(Dimensions::new(
        positive(width as i64)?,
        positive(height as i64)?,
    ))
}

fn decode_gif(reader: &mut dyn Read) -> Result<Dimensions, FormatError> {
    let width = u16::from_le_bytes(read_array(reader)?);
    let height = u16::from_le_bytes(read_array(reader)?);
    Ok(Dimensions::new(width as u32, height as u32))
}

fn decode_png(reader: &mut dyn Read) -> Result<Dimensions, FormatError> {
    // IHDR chunk length and type
    skip(reader, 8)?;
    let width = u32::from_be_bytes(read_array(reader)?);
    let height = u32::from_be_bytes(read_array(reader)?);
    Ok(Dimensions::new(width, height))
}

fn decode_jpeg(reader: &mut dyn Read) -> Result<Dimensions, FormatError> {
    loop {
        if read_u8(reader)? != 0xFF {
            return Err(FormatError);
        }

        let mut marker = read_u8(reader)?;
        while marker == 0xFF {
            marker = read_u8(reader)?;
        }

        let length = u16::from_be_bytes(read_array(reader)?);
        if marker == JPEG_SOF0 {
            // sample precision
            read_u8(reader)?;
            let height = u16::from_be_bytes(read_array(reader)?);
            let width = u16::from_be_bytes(read_array(reader)?);
            return Ok(Dimensions::new(width as u32, height as u32));
        }

        if length < 2 {
            return Err(FormatError);
        }
        skip(reader, length as u64 - 2)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;

    fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }));
        let img = if format == ImageFormat::Gif {
            DynamicImage::ImageRgba8(img.to_rgba8())
        } else {
            img
        };
        let mut bytes = Cursor::new(Vec::new());
        img.write_to(&mut bytes, format).unwrap();
        bytes.into_inner()
    }

    fn detect(bytes: &[u8]) -> Result<Dimensions, FormatError> {
        read_dimensions(&mut Cursor::new(bytes))
    }

    #[test]
    fn test_png_dimensions() {
        let bytes = encode(37, 21, ImageFormat::Png);
        assert_eq!(detect(&bytes), Ok(Dimensions::new(37, 21)));
    }

    #[test]
    fn test_bmp_dimensions() {
        let bytes = encode(64, 48, ImageFormat::Bmp);
        assert_eq!(detect(&bytes), Ok(Dimensions::new(64, 48)));
    }

    #[test]
    fn test_gif_dimensions() {
        let bytes = encode(300, 17, ImageFormat::Gif);
        assert_eq!(detect(&bytes), Ok(Dimensions::new(300, 17)));
    }

    #[test]
    fn test_jpeg_dimensions() {
        let bytes = encode(129, 257, ImageFormat::Jpeg);
        assert_eq!(detect(&bytes), Ok(Dimensions::new(129, 257)));
    }

    #[test]
    fn test_jpeg_skips_segments_before_sof() {
        let mut bytes = vec![0xFF, 0xD8];
        // APP0 with 4 payload bytes
        bytes.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x06, 1, 2, 3, 4]);
        // fill byte before the next marker
        bytes.extend_from_slice(&[0xFF, 0xFF, 0xC0, 0x00, 0x11, 0x08, 0x02, 0x00, 0x04, 0x00]);
        assert_eq!(detect(&bytes), Ok(Dimensions::new(1024, 512)));
    }

    #[test]
    fn test_jpeg_without_sof_is_rejected() {
        let bytes = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x04, 0, 0];
        assert_eq!(detect(&bytes), Err(FormatError));
    }

    #[test]
    fn test_bmp_negative_height() {
        let mut bytes = vec![0x42, 0x4D];
        bytes.extend_from_slice(&[0u8; 16]);
        bytes.extend_from_slice(&512i32.to_le_bytes());
        bytes.extend_from_slice(&(-512i32).to_le_bytes());
        assert_eq!(detect(&bytes), Ok(Dimensions::new(512, 512)));
    }

    #[test]
    fn test_unknown_signature() {
        assert_eq!(detect(b"not an image at all"), Err(FormatError));
    }

    #[test]
    fn test_truncated_header() {
        let bytes = encode(10, 10, ImageFormat::Png);
        assert_eq!(detect(&bytes[..12]), Err(FormatError));
        assert_eq!(detect(&[0x89, 0x50]), Err(FormatError));
        assert_eq!(detect(&[]), Err(FormatError));
    }

    #[test]
    fn test_dimensions_of_missing_file() {
        assert_eq!(dimensions_of(Path::new("/nonexistent/tile.png")), None);
    }

    #[test]
    fn test_dimensions_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.png");
        std::fs::write(&path, encode(256, 256, ImageFormat::Png)).unwrap();

        let dims = dimensions_of(&path).unwrap();
        assert!(dims.is_square());
        assert_eq!(dims.width, 256);
    }
}
