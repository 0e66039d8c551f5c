use std::{
    io::ErrorKind,
    net::{Shutdown, SocketAddr, TcpStream},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread,
    time::Duration,
};

use nbs_wire::FrameDecoder;
use tracing::{info, warn};

use crate::buffer::BlendBuffer;

/// Wall time between reconnect attempts to a lost fanout server.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(60);

/// Counters one reader keeps about its upstream. Shared so the supervisor
/// and tests can watch them while the reader runs.
#[derive(Debug, Default)]
pub struct ReaderStats {
    pub frames: AtomicU64,
    pub disconnects: AtomicU64,
    pub resync_episodes: AtomicU64,
}

/// The reader's live socket, reachable from outside the reader thread.
///
/// A blocking read only returns early if someone shuts the socket down, so
/// the supervisor holds one of these per reader for termination.
#[derive(Clone, Default)]
pub struct SocketSlot(Arc<Mutex<Option<TcpStream>>>);

impl SocketSlot {
    fn put(&self, stream: &TcpStream) {
        match stream.try_clone() {
            Ok(dup) => *self.0.lock().expect("socket slot poisoned") = Some(dup),
            Err(err) => warn!(%err, "couldn't retain socket handle for shutdown"),
        }
    }

    fn clear(&self) {
        *self.0.lock().expect("socket slot poisoned") = None;
    }

    /// Shuts the current socket down, unblocking a read in progress.
    pub fn shutdown(&self) {
        if let Some(stream) = self.0.lock().expect("socket slot poisoned").as_ref() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

/// One TCP reader bound to one upstream fanout server.
///
/// Runs forever: connect, decode frames into the shared buffer, and on any
/// connection loss wait out [`RECONNECT_DELAY`] and reconnect. Corrupt
/// bytes are the decoder's problem; only the stop flag ends the loop.
pub struct FanoutReader {
    addr: SocketAddr,
    buffer: Arc<BlendBuffer>,
    stop: Arc<AtomicBool>,
    slot: SocketSlot,
    stats: Arc<ReaderStats>,
}

impl FanoutReader {
    pub fn new(addr: SocketAddr, buffer: Arc<BlendBuffer>, stop: Arc<AtomicBool>) -> Self {
        Self {
            addr,
            buffer,
            stop,
            slot: SocketSlot::default(),
            stats: Arc::new(ReaderStats::default()),
        }
    }

    pub fn socket_slot(&self) -> SocketSlot {
        self.slot.clone()
    }

    pub fn stats(&self) -> Arc<ReaderStats> {
        Arc::clone(&self.stats)
    }

    /// Blocking loop; returns only once the stop flag is raised.
    pub fn run(self) {
        loop {
            if self.stop.load(Ordering::Relaxed) {
                return;
            }
            match TcpStream::connect(self.addr) {
                Ok(stream) => {
                    info!(addr = %self.addr, "fanout: connected");
                    self.slot.put(&stream);
                    self.read_stream(stream);
                    self.slot.clear();
                    self.stats.disconnects.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => warn!(addr = %self.addr, %err, "fanout: connect failed"),
            }
            if self.stop.load(Ordering::Relaxed) {
                return;
            }
            thread::sleep(RECONNECT_DELAY);
        }
    }

    fn read_stream(&self, mut stream: TcpStream) {
        let mut decoder = FrameDecoder::new();
        loop {
            if self.stop.load(Ordering::Relaxed) {
                break;
            }
            match decoder.next_frame(&mut stream) {
                Ok(frame) => {
                    self.stats.frames.fetch_add(1, Ordering::Relaxed);
                    // Late and duplicate outcomes are counted by the buffer.
                    self.buffer.add(frame);
                }
                Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                    info!(addr = %self.addr, "fanout: stream closed");
                    break;
                }
                Err(err) => {
                    warn!(addr = %self.addr, %err, "fanout: read failed");
                    break;
                }
            }
        }
        self.stats.resync_episodes.fetch_add(decoder.stats().resync_episodes, Ordering::Relaxed);
    }
}
