use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("serial port error: {0}")]
    Serial(String),
    #[error("shdlc response timeout")]
    Timeout,
    #[error("malformed shdlc frame: {0}")]
    Frame(String),
    #[error("shdlc checksum mismatch (expected {expected:#04x}, got {actual:#04x})")]
    Checksum { expected: u8, actual: u8 },
    #[error("device reported error state {code:#04x} for command {cmd:#04x}")]
    Device { cmd: u8, code: u8 },
    #[error("device already closed")]
    Closed,
    #[error("simulated fault: {0}")]
    Injected(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
