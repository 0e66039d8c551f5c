use std::io;

use tracing::{error, trace};

use crate::{buffer::BlendBuffer, sink::Sink};

/// Drain the buffer in key order into the sink until the buffer closes.
///
/// A sink error is unrecoverable at this layer (the downstream consumer is
/// gone) and is returned for the caller to terminate the process.
pub fn run_writer(buffer: &BlendBuffer, sink: &mut dyn Sink) -> io::Result<()> {
    while let Some(frame) = buffer.next_frame() {
        if let Err(err) = sink.write_frame(frame.bytes()) {
            error!(%err, "sink: write failed, downstream consumer unreachable");
            return Err(err);
        }
        trace!(
            len = frame.len(),
            seq = frame.header().sequence_number,
            block = frame.pdh().block_number,
            "frame emitted"
        );
    }
    Ok(())
}
