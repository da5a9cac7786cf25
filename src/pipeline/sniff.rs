//! Format sniffing: classify a byte buffer by its magic-number signature.
//!
//! Only the first 8 bytes are inspected. Extensions are never consulted:
//! scanned folders routinely contain `.jpg` files that are really PNGs, and
//! archive entries may have no extension at all.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of leading bytes the sniffer needs to classify a buffer.
pub const SNIFF_LEN: usize = 8;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const ZIP_SIGNATURE: [u8; 4] = [b'P', b'K', 0x03, 0x04];
const RAR_SIGNATURE: [u8; 7] = [b'R', b'a', b'r', b'!', 0x1A, 0x07, 0x00];
const RAR5_SIGNATURE: [u8; 7] = [b'R', b'a', b'r', b'!', 0x1A, 0x07, 0x01];
const SEVEN_ZIP_SIGNATURE: [u8; 6] = [b'7', b'z', 0xBC, 0xAF, 0x27, 0x1C];

/// Closed set of byte-signature classes the pipeline recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormatTag {
    Jpeg,
    Png,
    Bmp,
    Gif,
    Tiff,
    Webp,
    Zip,
    Rar,
    SevenZip,
    Unknown,
}

impl FormatTag {
    /// Every tag, in sniffing priority order (containers last).
    pub const ALL: [FormatTag; 10] = [
        FormatTag::Jpeg,
        FormatTag::Bmp,
        FormatTag::Gif,
        FormatTag::Webp,
        FormatTag::Png,
        FormatTag::Tiff,
        FormatTag::Zip,
        FormatTag::Rar,
        FormatTag::SevenZip,
        FormatTag::Unknown,
    ];

    /// `true` for archive containers (ZIP, RAR, 7-Zip).
    pub fn is_container(self) -> bool {
        matches!(self, FormatTag::Zip | FormatTag::Rar | FormatTag::SevenZip)
    }

    /// `true` for image formats.
    pub fn is_image(self) -> bool {
        !self.is_container() && self != FormatTag::Unknown
    }

    /// The matching `image` crate format, if this is an image tag.
    pub fn image_format(self) -> Option<image::ImageFormat> {
        match self {
            FormatTag::Jpeg => Some(image::ImageFormat::Jpeg),
            FormatTag::Png => Some(image::ImageFormat::Png),
            FormatTag::Bmp => Some(image::ImageFormat::Bmp),
            FormatTag::Gif => Some(image::ImageFormat::Gif),
            FormatTag::Tiff => Some(image::ImageFormat::Tiff),
            FormatTag::Webp => Some(image::ImageFormat::WebP),
            _ => None,
        }
    }

    /// Conventional file extension, used when writing pages to disk.
    pub fn extension(self) -> &'static str {
        match self {
            FormatTag::Jpeg => "jpg",
            FormatTag::Png => "png",
            FormatTag::Bmp => "bmp",
            FormatTag::Gif => "gif",
            FormatTag::Tiff => "tif",
            FormatTag::Webp => "webp",
            FormatTag::Zip => "zip",
            FormatTag::Rar => "rar",
            FormatTag::SevenZip => "7z",
            FormatTag::Unknown => "bin",
        }
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormatTag::Jpeg => "JPEG",
            FormatTag::Png => "PNG",
            FormatTag::Bmp => "BMP",
            FormatTag::Gif => "GIF",
            FormatTag::Tiff => "TIFF",
            FormatTag::Webp => "WEBP",
            FormatTag::Zip => "ZIP",
            FormatTag::Rar => "RAR",
            FormatTag::SevenZip => "7Z",
            FormatTag::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Options for [`classify_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SniffOptions {
    /// Recognise ZIP/RAR/7-Zip signatures. When off they classify as `Unknown`.
    pub detect_archives: bool,
}

impl Default for SniffOptions {
    fn default() -> Self {
        Self {
            detect_archives: true,
        }
    }
}

/// Classify `bytes` with archive detection enabled.
pub fn classify(bytes: &[u8]) -> FormatTag {
    classify_with(bytes, SniffOptions::default())
}

/// Classify `bytes` by signature.
///
/// Buffers shorter than [`SNIFF_LEN`] are always `Unknown`, even when a
/// shorter signature (`FF D8`) would match: a truncated header cannot be a
/// decodable image.
pub fn classify_with(bytes: &[u8], options: SniffOptions) -> FormatTag {
    let Some(b) = bytes.get(..SNIFF_LEN) else {
        return FormatTag::Unknown;
    };

    if b[0] == 0xFF && b[1] == 0xD8 {
        FormatTag::Jpeg
    } else if b.starts_with(b"BM") {
        FormatTag::Bmp
    } else if b.starts_with(b"GIF") {
        FormatTag::Gif
    } else if b.starts_with(b"RIFF") {
        FormatTag::Webp
    } else if b == PNG_SIGNATURE {
        FormatTag::Png
    } else if b.starts_with(&[b'I', b'I', 0x2A, 0x00]) || b.starts_with(&[b'M', b'M', 0x00, 0x2A]) {
        FormatTag::Tiff
    } else if options.detect_archives {
        classify_container(b)
    } else {
        FormatTag::Unknown
    }
}

fn classify_container(b: &[u8]) -> FormatTag {
    if b.starts_with(&ZIP_SIGNATURE) {
        FormatTag::Zip
    } else if b.starts_with(&RAR_SIGNATURE) || b.starts_with(&RAR5_SIGNATURE) {
        FormatTag::Rar
    } else if b.starts_with(&SEVEN_ZIP_SIGNATURE) {
        FormatTag::SevenZip
    } else {
        FormatTag::Unknown
    }
}
