//! Raw serial TTY setup for SHDLC (8N1, no flow control, read timeout via VTIME).

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::time::Duration;

use nix::sys::termios::{self, BaudRate, FlushArg, SetArg, SpecialCharacterIndices};

use crate::error::{HwError, Result};

fn baud(rate: u32) -> Result<BaudRate> {
    Ok(match rate {
        9_600 => BaudRate::B9600,
        19_200 => BaudRate::B19200,
        38_400 => BaudRate::B38400,
        57_600 => BaudRate::B57600,
        115_200 => BaudRate::B115200,
        230_400 => BaudRate::B230400,
        460_800 => BaudRate::B460800,
        other => return Err(HwError::Serial(format!("unsupported baud rate {other}"))),
    })
}

/// VTIME is in deciseconds and capped at 255.
fn vtime(timeout: Duration) -> u8 {
    let ds = timeout.as_millis().div_ceil(100);
    ds.clamp(1, 255) as u8
}

pub fn open_tty(path: &Path, baud_rate: u32, read_timeout: Duration) -> Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| HwError::Serial(format!("open {}: {e}", path.display())))?;

    let serial = |e: nix::Error| HwError::Serial(format!("{}: {e}", path.display()));
    let mut tio = termios::tcgetattr(&file).map_err(serial)?;
    termios::cfmakeraw(&mut tio);
    termios::cfsetspeed(&mut tio, baud(baud_rate)?).map_err(serial)?;
    tio.control_chars[SpecialCharacterIndices::VMIN as usize] = 0;
    tio.control_chars[SpecialCharacterIndices::VTIME as usize] = vtime(read_timeout);
    termios::tcsetattr(&file, SetArg::TCSANOW, &tio).map_err(serial)?;
    termios::tcflush(&file, FlushArg::TCIOFLUSH).map_err(serial)?;
    tracing::debug!(port = %path.display(), baud_rate, "tty configured");
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vtime_rounds_up_and_clamps() {
        assert_eq!(vtime(Duration::from_millis(0)), 1);
        assert_eq!(vtime(Duration::from_millis(150)), 2);
        assert_eq!(vtime(Duration::from_secs(60)), 255);
    }

    #[test]
    fn rejects_odd_baud() {
        assert!(baud(12_345).is_err());
        assert!(baud(115_200).is_ok());
    }
}
