//! Reads the text description embedded in the remote title image.
//!
//! The image crate hands back the raw Exif block; the TIFF directory walk below
//! pulls out `ImageDescription` (IFD0) or, failing that, the Exif `UserComment`.

use std::{io::Cursor, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::{ImageDecoder, ImageReader};

const ENABLE_LOGS: bool = true;

use crate::log_warn;

const TAG_IMAGE_DESCRIPTION: u16 = 0x010E;
const TAG_EXIF_IFD_POINTER: u16 = 0x8769;
const TAG_USER_COMMENT: u16 = 0x9286;

const TYPE_ASCII: u16 = 2;
const TYPE_LONG: u16 = 4;
const TYPE_UNDEFINED: u16 = 7;

const EXIF_PREFIX: &[u8] = b"Exif\0\0";
const IFD_ENTRY_LEN: usize = 12;

/// Source of the operator-controlled description string.
#[async_trait]
pub trait DescriptionSource: Send + Sync {
    /// `None` when the fetch fails or the image carries no description.
    async fn fetch_description(&self) -> Option<String>;
}

/// Downloads an image over HTTP(S) and reads its embedded description.
pub struct RemoteImageDescription {
    client: reqwest::Client,
    url: String,
}

impl RemoteImageDescription {
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client, url })
    }

    async fn download(&self) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.url))?
            .error_for_status()
            .context("title image request returned an error status")?;

        let bytes = response
            .bytes()
            .await
            .context("failed to read title image body")?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl DescriptionSource for RemoteImageDescription {
    async fn fetch_description(&self) -> Option<String> {
        match self.download().await {
            Ok(bytes) => description_from_image(&bytes),
            Err(err) => {
                log_warn!("title image fetch failed: {err:#}");
                None
            }
        }
    }
}

/// Decodes the image container just far enough to read its Exif block.
pub fn description_from_image(bytes: &[u8]) -> Option<String> {
    let exif = match read_exif_block(bytes) {
        Ok(Some(exif)) => exif,
        Ok(None) => return None,
        Err(err) => {
            log_warn!("title image metadata unreadable: {err:#}");
            return None;
        }
    };
    parse_exif_description(&exif)
}

fn read_exif_block(bytes: &[u8]) -> Result<Option<Vec<u8>>> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .context("failed to sniff image format")?;
    let mut decoder = reader.into_decoder().context("unsupported image format")?;
    decoder
        .exif_metadata()
        .context("failed to read exif metadata")
}

#[derive(Clone, Copy)]
enum ByteOrder {
    Little,
    Big,
}

struct Tiff<'a> {
    data: &'a [u8],
    order: ByteOrder,
}

struct IfdEntry {
    tag: u16,
    kind: u16,
    count: u32,
    /// Offset of the 4-byte value/offset field within the TIFF data.
    value_at: usize,
}

impl<'a> Tiff<'a> {
    fn new(data: &'a [u8]) -> Option<Self> {
        let order = match data.get(0..2)? {
            b"II" => ByteOrder::Little,
            b"MM" => ByteOrder::Big,
            _ => return None,
        };
        let tiff = Self { data, order };
        (tiff.u16_at(2)? == 42).then_some(tiff)
    }

    /// `len` bytes at `offset`; `None` when out of range or when the end overflows.
    fn slice(&self, offset: usize, len: usize) -> Option<&'a [u8]> {
        self.data.get(offset..offset.checked_add(len)?)
    }

    fn u16_at(&self, offset: usize) -> Option<u16> {
        let bytes: [u8; 2] = self.slice(offset, 2)?.try_into().ok()?;
        Some(match self.order {
            ByteOrder::Little => u16::from_le_bytes(bytes),
            ByteOrder::Big => u16::from_be_bytes(bytes),
        })
    }

    fn u32_at(&self, offset: usize) -> Option<u32> {
        let bytes: [u8; 4] = self.slice(offset, 4)?.try_into().ok()?;
        Some(match self.order {
            ByteOrder::Little => u32::from_le_bytes(bytes),
            ByteOrder::Big => u32::from_be_bytes(bytes),
        })
    }

    /// A 4-byte offset field read as an index into the TIFF data.
    fn offset_at(&self, offset: usize) -> Option<usize> {
        usize::try_from(self.u32_at(offset)?).ok()
    }

    fn first_ifd(&self) -> Option<usize> {
        self.offset_at(4)
    }

    fn entries(&self, ifd_offset: usize) -> Vec<IfdEntry> {
        let Some(count) = self.u16_at(ifd_offset) else {
            return Vec::new();
        };
        (0..usize::from(count))
            .map_while(|index| {
                let at = ifd_offset
                    .checked_add(2)?
                    .checked_add(index.checked_mul(IFD_ENTRY_LEN)?)?;
                Some(IfdEntry {
                    tag: self.u16_at(at)?,
                    kind: self.u16_at(at.checked_add(2)?)?,
                    count: self.u32_at(at.checked_add(4)?)?,
                    value_at: at.checked_add(8)?,
                })
            })
            .collect()
    }

    fn find(&self, ifd_offset: usize, tag: u16) -> Option<IfdEntry> {
        self.entries(ifd_offset)
            .into_iter()
            .find(|entry| entry.tag == tag)
    }

    /// Payload bytes of an ASCII/UNDEFINED entry: inline when they fit in 4 bytes.
    fn bytes_of(&self, entry: &IfdEntry) -> Option<&'a [u8]> {
        let len = usize::try_from(entry.count).ok()?;
        let start = if len <= 4 {
            entry.value_at
        } else {
            self.offset_at(entry.value_at)?
        };
        self.slice(start, len)
    }
}

/// Extracts the description from a raw Exif block (TIFF header, optionally preceded
/// by `Exif\0\0`). Empty values are treated as absent.
pub fn parse_exif_description(exif: &[u8]) -> Option<String> {
    let data = exif.strip_prefix(EXIF_PREFIX).unwrap_or(exif);
    let tiff = Tiff::new(data)?;
    let ifd0 = tiff.first_ifd()?;

    if let Some(description) = tiff
        .find(ifd0, TAG_IMAGE_DESCRIPTION)
        .filter(|entry| entry.kind == TYPE_ASCII)
        .and_then(|entry| tiff.bytes_of(&entry))
        .and_then(decode_ascii)
    {
        return Some(description);
    }

    let exif_ifd = tiff
        .find(ifd0, TAG_EXIF_IFD_POINTER)
        .filter(|entry| entry.kind == TYPE_LONG)
        .and_then(|entry| tiff.offset_at(entry.value_at))?;

    tiff.find(exif_ifd, TAG_USER_COMMENT)
        .filter(|entry| entry.kind == TYPE_UNDEFINED || entry.kind == TYPE_ASCII)
        .and_then(|entry| tiff.bytes_of(&entry))
        .and_then(|bytes| decode_user_comment(bytes, tiff.order))
}

fn decode_ascii(bytes: &[u8]) -> Option<String> {
    non_empty(String::from_utf8_lossy(bytes).into_owned())
}

/// UserComment starts with an 8-byte character code (`ASCII\0\0\0`, `UNICODE\0`,
/// or all zeros for undefined).
fn decode_user_comment(bytes: &[u8], order: ByteOrder) -> Option<String> {
    if bytes.len() < 8 {
        return decode_ascii(bytes);
    }
    let (code, text) = bytes.split_at(8);

    if code == b"UNICODE\0" {
        let units: Vec<u16> = text
            .chunks_exact(2)
            .map(|pair| match order {
                ByteOrder::Little => u16::from_le_bytes([pair[0], pair[1]]),
                ByteOrder::Big => u16::from_be_bytes([pair[0], pair[1]]),
            })
            .collect();
        return non_empty(String::from_utf16_lossy(&units));
    }

    decode_ascii(text)
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
