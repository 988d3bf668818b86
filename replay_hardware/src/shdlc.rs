//! Sensirion SHDLC framing.
//!
//! Request (MOSI):  `7E | ADR | CMD | LEN | DATA.. | CHK | 7E`
//! Response (MISO): `7E | ADR | CMD | STATE | LEN | DATA.. | CHK | 7E`
//!
//! `CHK` is the inverted low byte of the sum of every byte between the
//! delimiters. `7E`, `7D`, `11` and `13` inside a frame are escaped as
//! `7D, byte ^ 0x20`.

use std::io::{ErrorKind, Read, Write};

use tracing::trace;

use crate::error::{HwError, Result};

pub const FRAME_DELIMITER: u8 = 0x7E;
const ESCAPE: u8 = 0x7D;
const ESCAPE_XOR: u8 = 0x20;
pub const MAX_DATA_LEN: usize = 255;

/// A decoded response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub address: u8,
    pub command: u8,
    pub state: u8,
    pub data: Vec<u8>,
}

/// A decoded request frame (used by device simulators and tests).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub address: u8,
    pub command: u8,
    pub data: Vec<u8>,
}

#[inline]
pub fn checksum(bytes: &[u8]) -> u8 {
    !bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

#[inline]
fn needs_escape(b: u8) -> bool {
    matches!(b, 0x7E | 0x7D | 0x11 | 0x13)
}

fn stuff(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len() + 4);
    out.push(FRAME_DELIMITER);
    for &b in raw {
        if needs_escape(b) {
            out.push(ESCAPE);
            out.push(b ^ ESCAPE_XOR);
        } else {
            out.push(b);
        }
    }
    out.push(FRAME_DELIMITER);
    out
}

fn unstuff(frame: &[u8]) -> Result<Vec<u8>> {
    let inner = match frame {
        [FRAME_DELIMITER, inner @ .., FRAME_DELIMITER] => inner,
        _ => return Err(HwError::Frame("missing frame delimiters".into())),
    };
    let mut out = Vec::with_capacity(inner.len());
    let mut it = inner.iter();
    while let Some(&b) = it.next() {
        if b == ESCAPE {
            let Some(&next) = it.next() else {
                return Err(HwError::Frame("dangling escape byte".into()));
            };
            out.push(next ^ ESCAPE_XOR);
        } else {
            out.push(b);
        }
    }
    Ok(out)
}

fn split_checked(raw: &[u8], header_len: usize) -> Result<&[u8]> {
    if raw.len() < header_len + 1 {
        return Err(HwError::Frame(format!("frame too short ({} bytes)", raw.len())));
    }
    let declared = raw[header_len - 1] as usize;
    if raw.len() != header_len + declared + 1 {
        return Err(HwError::Frame(format!(
            "length byte says {declared} data bytes, frame carries {}",
            raw.len().saturating_sub(header_len + 1)
        )));
    }
    let (body, chk) = raw.split_at(raw.len() - 1);
    let expected = checksum(body);
    if chk[0] != expected {
        return Err(HwError::Checksum {
            expected,
            actual: chk[0],
        });
    }
    Ok(&body[header_len..])
}

pub fn encode_request(address: u8, command: u8, data: &[u8]) -> Result<Vec<u8>> {
    if data.len() > MAX_DATA_LEN {
        return Err(HwError::Frame(format!("payload of {} bytes", data.len())));
    }
    let mut raw = Vec::with_capacity(data.len() + 4);
    raw.extend_from_slice(&[address, command, data.len() as u8]);
    raw.extend_from_slice(data);
    raw.push(checksum(&raw));
    Ok(stuff(&raw))
}

pub fn encode_response(address: u8, command: u8, state: u8, data: &[u8]) -> Result<Vec<u8>> {
    if data.len() > MAX_DATA_LEN {
        return Err(HwError::Frame(format!("payload of {} bytes", data.len())));
    }
    let mut raw = Vec::with_capacity(data.len() + 5);
    raw.extend_from_slice(&[address, command, state, data.len() as u8]);
    raw.extend_from_slice(data);
    raw.push(checksum(&raw));
    Ok(stuff(&raw))
}

pub fn decode_request(frame: &[u8]) -> Result<Request> {
    let raw = unstuff(frame)?;
    let data = split_checked(&raw, 3)?.to_vec();
    Ok(Request {
        address: raw[0],
        command: raw[1],
        data,
    })
}

pub fn decode_response(frame: &[u8]) -> Result<Response> {
    let raw = unstuff(frame)?;
    let data = split_checked(&raw, 4)?.to_vec();
    Ok(Response {
        address: raw[0],
        command: raw[1],
        state: raw[2],
        data,
    })
}

/// Request/response channel to one SHDLC slave over any byte transport.
pub struct ShdlcPort<T> {
    transport: T,
    address: u8,
}

impl<T: Read + Write> ShdlcPort<T> {
    pub fn new(transport: T, address: u8) -> Self {
        Self { transport, address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Send one command and return the response payload.
    pub fn transceive(&mut self, command: u8, data: &[u8]) -> Result<Vec<u8>> {
        let frame = encode_request(self.address, command, data)?;
        self.transport.write_all(&frame)?;
        self.transport.flush()?;
        let reply = self.read_frame()?;
        let resp = decode_response(&reply)?;
        trace!(cmd = command, state = resp.state, len = resp.data.len(), "shdlc response");
        if resp.address != self.address || resp.command != command {
            return Err(HwError::Frame(format!(
                "response for adr {:#04x} cmd {:#04x}, expected adr {:#04x} cmd {command:#04x}",
                resp.address, resp.command, self.address
            )));
        }
        let code = resp.state & 0x7F;
        if code != 0 {
            return Err(HwError::Device { cmd: command, code });
        }
        if resp.state & 0x80 != 0 {
            tracing::warn!(cmd = command, "device error flag set");
        }
        Ok(resp.data)
    }

    fn read_byte(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        loop {
            match self.transport.read(&mut b) {
                Ok(0) => return Err(HwError::Timeout),
                Ok(_) => return Ok(b[0]),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    return Err(HwError::Timeout);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn read_frame(&mut self) -> Result<Vec<u8>> {
        // Skip line noise until the opening delimiter.
        while self.read_byte()? != FRAME_DELIMITER {}
        let mut frame = vec![FRAME_DELIMITER];
        loop {
            let b = self.read_byte()?;
            if b == FRAME_DELIMITER {
                if frame.len() == 1 {
                    // Back-to-back delimiters: treat the second as the real start.
                    continue;
                }
                frame.push(b);
                return Ok(frame);
            }
            frame.push(b);
            if frame.len() > 2 * (MAX_DATA_LEN + 6) {
                return Err(HwError::Frame("unterminated frame".into()));
            }
        }
    }

    pub fn into_inner(self) -> T {
        self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_reserved_bytes() {
        // data contains every reserved byte
        let frame = encode_request(0, 0x00, &[0x7E, 0x7D, 0x11, 0x13]).unwrap();
        let inner = &frame[1..frame.len() - 1];
        assert!(!inner.contains(&FRAME_DELIMITER));
        let req = decode_request(&frame).unwrap();
        assert_eq!(req.data, vec![0x7E, 0x7D, 0x11, 0x13]);
    }

    #[test]
    fn checksum_matches_reference_frame() {
        // Get device information (product name): 7E 00 D0 01 01 2D 7E
        let frame = encode_request(0x00, 0xD0, &[0x01]).unwrap();
        assert_eq!(frame, vec![0x7E, 0x00, 0xD0, 0x01, 0x01, 0x2D, 0x7E]);
    }

    #[test]
    fn detects_corrupted_checksum() {
        let mut frame = encode_response(0, 0x08, 0, &[1, 2, 3, 4]).unwrap();
        let n = frame.len();
        frame[n - 2] ^= 0x01;
        match decode_response(&frame) {
            Err(HwError::Checksum { .. }) => {}
            other => panic!("expected checksum error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_length_mismatch() {
        let raw = [0x00, 0x08, 0x00, 0x05, 0x01];
        let mut body = raw.to_vec();
        body.push(checksum(&raw));
        let frame = stuff(&body);
        assert!(matches!(decode_response(&frame), Err(HwError::Frame(_))));
    }

    #[test]
    fn rejects_dangling_escape() {
        assert!(matches!(
            unstuff(&[FRAME_DELIMITER, 0x00, ESCAPE, FRAME_DELIMITER]),
            Err(HwError::Frame(_))
        ));
    }
}
