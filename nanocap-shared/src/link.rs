use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

#[cfg(feature = "utils")]
use std::path::Path;

#[cfg(feature = "utils")]
use serialport::{SerialPort, SerialPortInfo, SerialPortType};

/// Byte oriented connection to a single device.
///
/// The reads return whatever arrived before the timeout. A short result, one
/// that is missing bytes or does not end with the delimiter, means the
/// deadline elapsed.
pub trait Channel {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    fn read_exact(&mut self, n: usize, timeout: Duration) -> io::Result<Vec<u8>>;

    fn read_until(&mut self, delimiter: &[u8], timeout: Duration) -> io::Result<Vec<u8>>;
}

/// A stream with a configurable read timeout, i.e. a serial port
pub trait Port: io::Read + io::Write {
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()>;
}

#[cfg(feature = "utils")]
impl Port for Box<dyn SerialPort> {
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.set_timeout(timeout).map_err(io::Error::from)
    }
}

/// Longest single blocking read, so deadlines are checked regularly
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Buffers the port so reads can stop exactly at a delimiter
pub struct Link<P> {
    port: P,
    pending: Vec<u8>,
}

impl<P: Port> Link<P> {
    pub fn new(port: P) -> Self {
        Link {
            port,
            pending: Vec::new(),
        }
    }

    pub fn into_inner(self) -> P {
        self.port
    }

    /// Read one chunk into the buffer. Returns false once the deadline has passed.
    fn fill(&mut self, deadline: Instant) -> io::Result<bool> {
        let now = Instant::now();
        if now >= deadline {
            return Ok(false);
        }

        self.port.set_read_timeout((deadline - now).min(POLL_INTERVAL))?;

        let mut chunk = [0; 4096];
        match self.port.read(&mut chunk) {
            Ok(readlen) => {
                self.pending.extend_from_slice(&chunk[..readlen]);
            }
            Err(ref e) if e.kind() == io::ErrorKind::TimedOut => (),
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => (),
            Err(e) => return Err(e),
        }

        Ok(true)
    }
}

impl<P: Port> Channel for Link<P> {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        log::trace!("write {:?}", String::from_utf8_lossy(bytes));
        self.port.write_all(bytes)?;
        self.port.flush()
    }

    fn read_exact(&mut self, n: usize, timeout: Duration) -> io::Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;

        while self.pending.len() < n {
            if !self.fill(deadline)? {
                break;
            }
        }

        let n = n.min(self.pending.len());
        Ok(self.pending.drain(..n).collect())
    }

    fn read_until(&mut self, delimiter: &[u8], timeout: Duration) -> io::Result<Vec<u8>> {
        if delimiter.is_empty() {
            return Ok(Vec::new());
        }

        let deadline = Instant::now() + timeout;
        let mut scanned = 0;

        loop {
            if let Some(pos) = find(&self.pending[scanned..], delimiter) {
                let end = scanned + pos + delimiter.len();
                return Ok(self.pending.drain(..end).collect());
            }

            // The delimiter may straddle the next chunk
            scanned = self.pending.len().saturating_sub(delimiter.len() - 1);

            if !self.fill(deadline)? {
                log::trace!("read_until timed out with {} bytes", self.pending.len());
                return Ok(self.pending.drain(..).collect());
            }
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(feature = "utils")]
pub type SerialLink = Link<Box<dyn SerialPort>>;

#[cfg(feature = "utils")]
impl Link<Box<dyn SerialPort>> {
    pub fn list_ports() -> Result<Vec<SerialPortInfo>, serialport::Error> {
        serialport::available_ports()
    }

    /// Name of the first USB serial port with the given vendor and product id
    pub fn find_port(vid: u16, pid: u16) -> Result<Option<String>, serialport::Error> {
        let port = Self::list_ports()?
            .into_iter()
            .find(|port| match &port.port_type {
                SerialPortType::UsbPort(usb) => usb.vid == vid && usb.pid == pid,
                _ => false,
            })
            .map(|port| port.port_name);

        Ok(port)
    }

    pub fn connect<T: AsRef<Path>>(path: T, baud_rate: u32) -> Result<Self, serialport::Error> {
        let path = path.as_ref().to_string_lossy();
        let port = serialport::new(path, baud_rate)
            .timeout(POLL_INTERVAL)
            .open()?;

        Ok(Link::new(port))
    }
}
