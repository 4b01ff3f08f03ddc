use std::fmt;

/// Prompt the device shell prints when it is ready for the next command
pub const PROMPT: &[u8] = b"ch> ";
pub const CRLF: &[u8] = b"\r\n";

/// Length of the bitmap header that precedes a compressed capture
pub const HEADER_LEN: usize = 10;
/// "BM", little endian
pub const BITMAP_MAGIC: u16 = 0x4D42;

/// Room for the longest line, the capture terminator
const LINE_CAPACITY: usize = 32;

pub type Line = heapless::Vec<u8, LINE_CAPACITY>;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Command {
    /// Stop screen updates
    Pause,
    /// Raw RGB565 screen dump
    Capture,
    /// Run length compressed, palette indexed screen dump
    CaptureRle,
    /// Restart screen updates
    Resume,
}

impl Command {
    pub fn name(self) -> &'static [u8] {
        match self {
            Command::Pause => b"pause",
            Command::Capture => b"capture",
            Command::CaptureRle => b"capture rle",
            Command::Resume => b"resume",
        }
    }

    /// The command as sent on the wire, `\r` terminated
    pub fn line(self) -> Line {
        concat(&[self.name(), &b"\r"[..]])
    }

    /// What the device prints back when it accepts the command
    pub fn echo(self) -> Line {
        concat(&[self.name(), CRLF])
    }

    /// Echo followed by the prompt, i.e. the command has completed
    pub fn completion(self) -> Line {
        concat(&[self.name(), CRLF, PROMPT])
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.name()))
    }
}

/// Several commands packed into a single write
pub fn request(cmds: &[Command]) -> Option<heapless::Vec<u8, 64>> {
    let mut req = heapless::Vec::new();
    for cmd in cmds {
        req.extend_from_slice(&cmd.line()).ok()?;
    }
    Some(req)
}

/// Marks the end of a capture: the prompt after the dump, then the echo of
/// the resume that was queued behind the capture request, then the prompt again.
pub fn capture_terminator() -> Line {
    concat(&[PROMPT, &Command::Resume.completion()[..]])
}

fn concat(parts: &[&[u8]]) -> Line {
    let mut line = Line::new();
    for part in parts {
        let fits = line.extend_from_slice(part).is_ok();
        debug_assert!(fits, "line longer than {} bytes", LINE_CAPACITY);
    }
    line
}

/// Which capture command to ask for
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CaptureRequest {
    Raw,
    Rle,
}

impl CaptureRequest {
    pub fn command(self) -> Command {
        match self {
            CaptureRequest::Raw => Command::Capture,
            CaptureRequest::Rle => Command::CaptureRle,
        }
    }
}

impl Default for CaptureRequest {
    fn default() -> Self {
        CaptureRequest::Raw
    }
}

/// Screen size in pixels. Both dimensions are non-zero.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct Geometry {
    width: u16,
    height: u16,
}

impl Geometry {
    /// 320x240, the 2.8" screens
    pub const QVGA: Geometry = Geometry { width: 320, height: 240 };
    /// 480x320, the 4" screens
    pub const HVGA: Geometry = Geometry { width: 480, height: 320 };

    pub const fn new(width: u16, height: u16) -> Option<Geometry> {
        if width == 0 || height == 0 {
            None
        } else {
            Some(Geometry { width, height })
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        usize::from(self.width) * usize::from(self.height)
    }

    /// Size of an uncompressed RGB565 dump
    pub fn raw_len(&self) -> usize {
        2 * self.pixel_count()
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Header sent ahead of a run length compressed capture
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct BitmapHeader {
    pub magic: u16,
    pub width: u16,
    pub height: u16,
    pub bits_per_pixel: u8,
    pub compression: u8,
    pub palette_size: u16,
}

impl BitmapHeader {
    /// Parse a header, `None` if the magic doesn't match
    pub fn parse(bytes: &[u8; HEADER_LEN]) -> Option<BitmapHeader> {
        let le = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);

        let header = BitmapHeader {
            magic: le(0),
            width: le(2),
            height: le(4),
            bits_per_pixel: bytes[6],
            compression: bytes[7],
            palette_size: le(8),
        };

        if header.magic == BITMAP_MAGIC {
            Some(header)
        } else {
            None
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0; HEADER_LEN];
        out[0..2].copy_from_slice(&self.magic.to_le_bytes());
        out[2..4].copy_from_slice(&self.width.to_le_bytes());
        out[4..6].copy_from_slice(&self.height.to_le_bytes());
        out[6] = self.bits_per_pixel;
        out[7] = self.compression;
        out[8..10].copy_from_slice(&self.palette_size.to_le_bytes());
        out
    }

    pub fn geometry(&self) -> Option<Geometry> {
        Geometry::new(self.width, self.height)
    }
}

/// Wire format of a capture, decided once from its first bytes
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Payload {
    /// Big endian RGB565, the probed bytes are the first pixels
    Raw,
    /// Bitmap header, palette and run length encoded rows
    Rle(BitmapHeader),
}

impl Payload {
    pub fn probe(head: &[u8; HEADER_LEN]) -> Payload {
        match BitmapHeader::parse(head) {
            Some(header) => Payload::Rle(header),
            None => Payload::Raw,
        }
    }

    pub fn format(&self) -> Format {
        match self {
            Payload::Raw => Format::Raw,
            Payload::Rle(_) => Format::Rle,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Format {
    Raw,
    Rle,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Raw => f.write_str("raw"),
            Format::Rle => f.write_str("rle"),
        }
    }
}
