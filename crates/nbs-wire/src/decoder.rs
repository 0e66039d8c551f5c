use std::io::{self, Read};

use tracing::warn;

use crate::{FH_SIZE, Frame, FrameHeader, MAX_FRAME_SIZE, PDH_FIXED_SIZE, Pdh, SYNC_BYTE, WireError};

/// Counters the decoder keeps while chewing through a byte stream.
#[derive(Clone, Copy, Debug, Default)]
pub struct DecoderStats {
    /// Desync episodes: runs of discarded bytes, however long.
    pub resync_episodes: u64,
    /// Header windows that failed validation.
    pub bad_headers: u64,
    /// Frames rejected for exceeding the size cap.
    pub oversize_frames: u64,
    /// Frames whose PSH length and option bit disagreed.
    pub psh_skips: u64,
}

/// Incremental SBN frame decoder over a blocking byte stream.
///
/// Corrupt input never surfaces as an error: the decoder slides forward one
/// byte at a time until the next 16-byte window validates as a frame header
/// (address byte and checksum), then reads the rest of the frame. Only real
/// I/O failures propagate to the caller.
///
/// Length fields are never trusted before the header checksum passes.
pub struct FrameDecoder {
    fh_buf: [u8; FH_SIZE],
    synced: bool,
    stats: DecoderStats,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self { fh_buf: [0; FH_SIZE], synced: true, stats: DecoderStats::default() }
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Blocks until the next valid frame is fully read.
    pub fn next_frame<R: Read>(&mut self, src: &mut R) -> io::Result<Frame> {
        loop {
            let header = self.read_header(src)?;
            match self.read_body(src, header) {
                Ok(frame) => return Ok(frame),
                Err(WireError::Io(err)) => return Err(err),
                Err(err) => self.begin_resync(&err),
            }
        }
    }

    /// Reads bytes until a 16-byte window validates as a frame header.
    fn read_header<R: Read>(&mut self, src: &mut R) -> io::Result<FrameHeader> {
        if self.synced {
            src.read_exact(&mut self.fh_buf)?;
            match FrameHeader::decode(&self.fh_buf) {
                Ok(header) => return Ok(header),
                Err(err) => self.begin_resync(&err),
            }
        }

        loop {
            self.fh_buf.copy_within(1.., 0);
            src.read_exact(&mut self.fh_buf[FH_SIZE - 1..])?;
            if self.fh_buf[0] != SYNC_BYTE {
                continue;
            }
            if let Ok(header) = FrameHeader::decode(&self.fh_buf) {
                self.synced = true;
                return Ok(header);
            }
            self.stats.bad_headers += 1;
        }
    }

    /// Reads PDH, optional PSH and the data block for a validated header.
    fn read_body<R: Read>(&mut self, src: &mut R, header: FrameHeader) -> Result<Frame, WireError> {
        let mut bytes = Vec::with_capacity(FH_SIZE + PDH_FIXED_SIZE);
        bytes.extend_from_slice(&self.fh_buf);

        let mut pdh_fixed = [0u8; PDH_FIXED_SIZE];
        src.read_exact(&mut pdh_fixed)?;
        bytes.extend_from_slice(&pdh_fixed);
        let pdh = Pdh::decode(&pdh_fixed)?;

        let psh_len = match (pdh.total_size > pdh.size, pdh.has_option_header()) {
            (true, true) => usize::from(pdh.total_size - pdh.size),
            (false, false) => 0,
            (trailing, bit) => {
                warn!(
                    total_size = pdh.total_size,
                    pdh_size = pdh.size,
                    option_bit = bit,
                    trailing_bytes = trailing,
                    "psh length and option bit disagree, not reading a psh"
                );
                self.stats.psh_skips += 1;
                0
            }
        };

        // Size the whole frame before committing to any further read.
        let frame_len =
            FH_SIZE + usize::from(pdh.size) + psh_len + usize::from(pdh.data_block_size);
        if frame_len > MAX_FRAME_SIZE {
            self.stats.oversize_frames += 1;
            return Err(WireError::Oversize(frame_len));
        }

        read_into(src, &mut bytes, usize::from(pdh.size) - PDH_FIXED_SIZE)?;
        read_into(src, &mut bytes, psh_len)?;
        read_into(src, &mut bytes, usize::from(pdh.data_block_size))?;

        Ok(Frame::new(bytes, header, pdh))
    }

    /// One notice per desync episode; every discarded window after that is
    /// silent until framing is found again.
    fn begin_resync(&mut self, err: &WireError) {
        self.stats.bad_headers += 1;
        if self.synced {
            warn!(%err, "synchronizing with the frame stream");
            self.stats.resync_episodes += 1;
            self.synced = false;
        }
    }
}

fn read_into<R: Read>(src: &mut R, bytes: &mut Vec<u8>, n: usize) -> io::Result<()> {
    if n == 0 {
        return Ok(());
    }
    let start = bytes.len();
    bytes.resize(start + n, 0);
    src.read_exact(&mut bytes[start..])
}
