use thiserror::Error;

#[derive(Error, Debug)]
pub enum WireError {
    #[error("bad HDLC address {0:#04x}")]
    BadAddress(u8),
    #[error("frame header checksum mismatch: header says {want}, computed {got}")]
    BadChecksum { want: u16, got: u16 },
    #[error("unknown frame command {0}")]
    BadCommand(u8),
    #[error("product definition header too short: {0} bytes")]
    PdhTooShort(u16),
    #[error("product header sizes inconsistent: total {total} < pdh {size}")]
    PdhSizeMismatch { total: u16, size: u16 },
    #[error("frame of {0} bytes exceeds the frame size cap")]
    Oversize(usize),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
