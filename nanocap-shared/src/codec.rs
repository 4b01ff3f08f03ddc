//! RGB565 unpacking and the device's run length encoding

use std::iter;

use crate::error::{CaptureError, Result};
use crate::protocol::{BitmapHeader, Geometry};

/// Expand a RGB565 word to 8 bits per channel.
///
/// This is a plain shift, the low bits of each channel are left at zero.
pub fn unpack_color(word: u16) -> (u8, u8, u8) {
    let r = (word & 0xF800) >> 8;
    let g = (word & 0x07E0) >> 3;
    let b = (word & 0x001F) << 3;
    (r as u8, g as u8, b as u8)
}

/// Split an uncompressed capture into big endian RGB565 words
pub fn unpack_raw(payload: &[u8], geometry: Geometry) -> Result<Vec<u16>> {
    if payload.len() != geometry.raw_len() {
        return Err(CaptureError::SizeMismatch {
            expected: geometry.raw_len(),
            got: payload.len(),
        });
    }

    Ok(payload
        .chunks_exact(2)
        .map(|w| u16::from_be_bytes([w[0], w[1]]))
        .collect())
}

/// Palette and row data of a compressed capture
#[derive(Debug)]
pub struct RleBitmap<'a> {
    pub palette: Vec<u16>,
    pub body: &'a [u8],
}

impl<'a> RleBitmap<'a> {
    /// Parse the palette that follows the header. `bytes` starts right after the header.
    pub fn split(header: &BitmapHeader, bytes: &'a [u8]) -> Result<RleBitmap<'a>> {
        let mut reader = Reader::new(bytes);

        let palette = (0..header.palette_size)
            .map(|_| reader.u16_le())
            .collect::<Result<Vec<_>>>()?;

        Ok(RleBitmap {
            palette,
            body: reader.rest(),
        })
    }

    pub fn decode(&self, geometry: Geometry) -> Result<Vec<u16>> {
        decode_rle8(self.body, geometry, &self.palette)
    }
}

/// Decode run length encoded, palette indexed rows.
///
/// Each row is a little endian `u16` byte count followed by runs. A negative
/// count byte repeats the next index `1 - count` times, a positive one is
/// followed by `count + 1` literal indices.
pub fn decode_rle8(body: &[u8], geometry: Geometry, palette: &[u16]) -> Result<Vec<u16>> {
    let width = usize::from(geometry.width());
    let height = usize::from(geometry.height());

    // Every row needs at least its length prefix
    if body.len() < 2 * height {
        return Err(CaptureError::CorruptStream("fewer row blocks than screen height"));
    }

    // The header geometry is untrusted, two bytes expand to at most 129 pixels
    let mut pixels = Vec::with_capacity(geometry.pixel_count().min(body.len() / 2 * 129));
    let mut reader = Reader::new(body);

    for _ in 0..geometry.height() {
        let block_len = usize::from(reader.u16_le()?);
        let mut row = Reader::new(reader.take(block_len)?);
        let row_start = pixels.len();

        while !row.is_empty() {
            let count = row.u8()? as i8;

            if count < 0 {
                let color = lookup(palette, row.u8()?)?;
                let run = (1 - i16::from(count)) as usize;
                pixels.extend(iter::repeat(color).take(run));
            } else {
                for &index in row.take(count as usize + 1)? {
                    pixels.push(lookup(palette, index)?);
                }
            }

            if pixels.len() - row_start > width {
                return Err(CaptureError::CorruptStream("row longer than screen width"));
            }
        }

        if pixels.len() - row_start != width {
            return Err(CaptureError::CorruptStream("row shorter than screen width"));
        }
    }

    if !reader.is_empty() {
        return Err(CaptureError::CorruptStream("trailing bytes after last row"));
    }

    Ok(pixels)
}

fn lookup(palette: &[u16], index: u8) -> Result<u16> {
    palette
        .get(usize::from(index))
        .copied()
        .ok_or(CaptureError::CorruptStream("palette index out of range"))
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Reader { buf }
    }

    fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.buf.len() {
            return Err(CaptureError::CorruptStream("unexpected end of data"));
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16_le(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn rest(self) -> &'a [u8] {
        self.buf
    }
}

/// Row major RGB888 image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbFrame {
    geometry: Geometry,
    data: Vec<u8>,
}

impl RgbFrame {
    pub fn from_packed(geometry: Geometry, pixels: &[u16]) -> RgbFrame {
        let data = pixels
            .iter()
            .flat_map(|&w| {
                let (r, g, b) = unpack_color(w);
                [r, g, b]
            })
            .collect();

        RgbFrame { geometry, data }
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn pixel(&self, x: u16, y: u16) -> Option<[u8; 3]> {
        if x >= self.geometry.width() || y >= self.geometry.height() {
            return None;
        }
        let i = 3 * (usize::from(y) * usize::from(self.geometry.width()) + usize::from(x));
        Some([self.data[i], self.data[i + 1], self.data[i + 2]])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}
