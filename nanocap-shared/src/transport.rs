//! Command/response handshake of a single capture transaction

use std::io;
use std::time::{Duration, Instant};

use crate::codec::{unpack_raw, RleBitmap};
use crate::config::CaptureConfig;
use crate::error::{CaptureError, Result};
use crate::link::Channel;
use crate::protocol::{self, Command, Geometry, Payload, HEADER_LEN};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum State {
    Idle,
    Paused,
    FormatProbed,
    Transferring,
    Resumed,
    Done,
    Failed,
}

/// Outcome of peeking at the first bytes of the capture
#[derive(Debug)]
pub struct Probe {
    pub payload: Payload,
    pub geometry: Geometry,
    head: [u8; HEADER_LEN],
}

/// Complete payload with the terminator stripped
#[derive(Debug)]
pub struct Transfer {
    pub payload: Payload,
    pub geometry: Geometry,
    pub bytes: Vec<u8>,
    pub elapsed: Duration,
}

pub struct Transport<'a, C> {
    channel: &'a mut C,
    config: &'a CaptureConfig,
    state: State,
}

impl<'a, C: Channel> Transport<'a, C> {
    pub fn new(channel: &'a mut C, config: &'a CaptureConfig) -> Self {
        Transport {
            channel,
            config,
            state: State::Idle,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Stop screen updates and wait for the prompt
    pub(crate) fn pause(&mut self) -> Result<()> {
        self.step(State::Idle, State::Paused, |t| {
            let cmd = Command::Pause;
            let expected = cmd.completion();

            t.channel.write(&cmd.line())?;
            let echo = t.channel.read_until(&expected, t.config.handshake_timeout)?;

            log::debug!("pause echo: {:?}", String::from_utf8_lossy(&echo));

            if echo.is_empty() {
                Err(CaptureError::DeviceNotResponding)
            } else if !echo.ends_with(&expected) {
                Err(CaptureError::mismatch(&expected, &echo))
            } else {
                Ok(())
            }
        })
    }

    /// Request the capture, with resume queued right behind it, and look at
    /// the first bytes to find out what format the device chose.
    pub(crate) fn probe(&mut self, declared: Geometry) -> Result<Probe> {
        self.step(State::Paused, State::FormatProbed, |t| {
            let cmd = t.config.request.command();
            let req = protocol::request(&[cmd, Command::Resume]).ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "capture request too long")
            })?;

            t.channel.write(&req)?;

            let expected = cmd.echo();
            let echo = t.channel.read_until(&expected, t.config.handshake_timeout)?;
            if !echo.ends_with(&expected) {
                return Err(CaptureError::mismatch(&expected, &echo));
            }

            let head = t.channel.read_exact(HEADER_LEN, t.config.handshake_timeout)?;
            let head: [u8; HEADER_LEN] = head[..]
                .try_into()
                .map_err(|_| CaptureError::CommunicationsTimeout { received: head.len() })?;

            let payload = Payload::probe(&head);
            let geometry = match payload {
                Payload::Raw => declared,
                Payload::Rle(header) => header
                    .geometry()
                    .ok_or(CaptureError::CorruptStream("bitmap header with zero size"))?,
            };

            log::debug!("probed {} capture, {}", payload.format(), geometry);

            Ok(Probe {
                payload,
                geometry,
                head,
            })
        })
    }

    /// Read the rest of the capture up to the resume echo
    pub(crate) fn transfer(&mut self, probe: Probe) -> Result<Transfer> {
        self.step(State::FormatProbed, State::Resumed, |t| {
            t.state = State::Transferring;

            let terminator = protocol::capture_terminator();
            let timeout = t.config.transfer_timeout(&probe.payload, probe.geometry);

            log::debug!("transfer timeout {:?}", timeout);

            // A raw dump shorter than the probe leaves the start of the
            // terminator in the probed bytes
            let carried = match probe.payload {
                Payload::Raw if probe.geometry.raw_len() < HEADER_LEN => {
                    overlap(&probe.head, &terminator)
                }
                _ => 0,
            };

            let start = Instant::now();
            let data = t.channel.read_until(&terminator[carried..], timeout)?;
            let elapsed = start.elapsed();

            let mut bytes = Vec::with_capacity(HEADER_LEN + data.len());
            bytes.extend_from_slice(&probe.head);
            bytes.extend_from_slice(&data);

            if !bytes.ends_with(&terminator) {
                return Err(CaptureError::CommunicationsTimeout {
                    received: bytes.len(),
                });
            }
            bytes.truncate(bytes.len() - terminator.len());

            Ok(Transfer {
                payload: probe.payload,
                geometry: probe.geometry,
                bytes,
                elapsed,
            })
        })
    }

    /// Validate and decode the payload into RGB565 pixels
    pub(crate) fn finish(&mut self, transfer: &Transfer) -> Result<Vec<u16>> {
        self.step(State::Resumed, State::Done, |_| match transfer.payload {
            Payload::Raw => unpack_raw(&transfer.bytes, transfer.geometry),
            Payload::Rle(header) => {
                if header.bits_per_pixel != 8 {
                    return Err(CaptureError::UnsupportedFormat {
                        bits_per_pixel: header.bits_per_pixel,
                    });
                }
                RleBitmap::split(&header, &transfer.bytes[HEADER_LEN..])?.decode(transfer.geometry)
            }
        })
    }

    fn step<T>(
        &mut self,
        from: State,
        to: State,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        if self.state != from {
            let msg = format!("capture step {:?} -> {:?} called in {:?}", from, to, self.state);
            return Err(io::Error::new(io::ErrorKind::Other, msg).into());
        }

        match f(self) {
            Ok(value) => {
                self.state = to;
                Ok(value)
            }
            Err(e) => {
                log::debug!("capture failed in {:?}: {}", self.state, e);
                self.state = State::Failed;
                Err(e)
            }
        }
    }
}

/// Length of the longest suffix of `head` that starts `terminator`
fn overlap(head: &[u8], terminator: &[u8]) -> usize {
    (1..=head.len().min(terminator.len()))
        .rev()
        .find(|&k| head.ends_with(&terminator[..k]))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;

    /// Replies are queued up front, reads never wait
    struct Canned {
        input: VecDeque<u8>,
        written: Vec<u8>,
    }

    impl Canned {
        fn new(input: &[u8]) -> Self {
            Canned {
                input: input.iter().copied().collect(),
                written: Vec::new(),
            }
        }
    }

    impl Channel for Canned {
        fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.written.extend_from_slice(bytes);
            Ok(())
        }

        fn read_exact(&mut self, n: usize, _timeout: Duration) -> io::Result<Vec<u8>> {
            let n = n.min(self.input.len());
            Ok(self.input.drain(..n).collect())
        }

        fn read_until(&mut self, delimiter: &[u8], _timeout: Duration) -> io::Result<Vec<u8>> {
            let mut out = Vec::new();
            while let Some(b) = self.input.pop_front() {
                out.push(b);
                if out.ends_with(delimiter) {
                    break;
                }
            }
            Ok(out)
        }
    }

    #[test]
    fn states_follow_the_transaction() {
        let mut input = b"pause\r\nch> capture\r\n".to_vec();
        input.extend_from_slice(&[0u8; 8]);
        input.extend_from_slice(b"ch> resume\r\nch> ");

        let mut channel = Canned::new(&input);
        let config = CaptureConfig::default();
        let mut transport = Transport::new(&mut channel, &config);
        let geometry = Geometry::new(2, 2).unwrap();

        assert_eq!(transport.state(), State::Idle);
        transport.pause().unwrap();
        assert_eq!(transport.state(), State::Paused);

        // Only 8 bytes of pixels, the probe also takes "ch" of the terminator
        let probe = transport.probe(geometry).unwrap();
        assert_eq!(transport.state(), State::FormatProbed);
        assert_eq!(probe.payload, Payload::Raw);

        let transfer = transport.transfer(probe).unwrap();
        assert_eq!(transport.state(), State::Resumed);
        assert_eq!(transfer.bytes, [0u8; 8]);

        assert_eq!(transport.finish(&transfer).unwrap(), [0u16; 4]);
        assert_eq!(transport.state(), State::Done);

        drop(transport);
        assert_eq!(channel.written, b"pause\rcapture\rresume\r");
    }

    #[test]
    fn short_dump_for_a_tiny_screen() {
        let mut input = b"pause\r\nch> capture\r\n".to_vec();
        input.extend_from_slice(&[0xF8, 0x00, 0x00, 0x1F]);
        input.extend_from_slice(b"ch> resume\r\nch> ");

        let mut channel = Canned::new(&input);
        let config = CaptureConfig::default();
        let mut transport = Transport::new(&mut channel, &config);
        let geometry = Geometry::new(2, 2).unwrap();

        transport.pause().unwrap();
        let probe = transport.probe(geometry).unwrap();
        let transfer = transport.transfer(probe).unwrap();
        assert_eq!(transfer.bytes, [0xF8, 0x00, 0x00, 0x1F]);

        match transport.finish(&transfer) {
            Err(CaptureError::SizeMismatch { expected: 8, got: 4 }) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn terminator_overlap() {
        let terminator = protocol::capture_terminator();
        assert_eq!(overlap(b"\0\0\0\0\0\0\0\0ch", &terminator), 2);
        assert_eq!(overlap(b"\0\0\0\0\0\0ch> ", &terminator), 4);
        assert_eq!(overlap(b"\0\0\0\0\0\0\0\0\0\0", &terminator), 0);
    }

    #[test]
    fn steps_out_of_order() {
        let mut channel = Canned::new(b"pause\r\nch> ");
        let config = CaptureConfig::default();
        let mut transport = Transport::new(&mut channel, &config);

        assert!(matches!(
            transport.probe(Geometry::QVGA),
            Err(CaptureError::Io(_))
        ));
        assert_eq!(transport.state(), State::Idle);

        transport.pause().unwrap();
        assert!(matches!(transport.pause(), Err(CaptureError::Io(_))));
        assert_eq!(transport.state(), State::Paused);

        drop(transport);
        assert_eq!(channel.written, b"pause\r");
    }

    #[test]
    fn garbled_pause_echo() {
        let mut channel = Canned::new(b"?? pause\r\n");
        let config = CaptureConfig::default();
        let mut transport = Transport::new(&mut channel, &config);

        assert!(matches!(
            transport.pause(),
            Err(CaptureError::ProtocolMismatch { .. })
        ));
        assert_eq!(transport.state(), State::Failed);
    }

    #[test]
    fn missing_capture_echo() {
        let mut channel = Canned::new(b"pause\r\nch> capture: unknown command\r\nch> ");
        let config = CaptureConfig::default();
        let mut transport = Transport::new(&mut channel, &config);

        transport.pause().unwrap();
        assert!(matches!(
            transport.probe(Geometry::new(2, 2).unwrap()),
            Err(CaptureError::ProtocolMismatch { .. })
        ));
    }
}
