use std::{
    ffi::CString,
    fs::{File, OpenOptions},
    io::{self, Stdout, Write},
    path::Path,
};

use tracing::info;

/// Downstream byte sink fed by the writer thread. One frame per call, no
/// extra framing: the consumer sees the raw SBN stream back-to-back.
pub trait Sink: Send {
    fn write_frame(&mut self, bytes: &[u8]) -> io::Result<()>;
}

/// POSIX named pipe feeding the ingester.
pub struct FifoSink {
    file: File,
}

impl FifoSink {
    /// Creates the FIFO (mode 0644) if missing and opens it write-only.
    /// The open blocks until the consumer opens its end of the pipe.
    pub fn open(path: &Path) -> io::Result<Self> {
        mkfifo(path)?;
        let file = OpenOptions::new().write(true).open(path)?;
        info!(path = %path.display(), "sink: pipe open");
        Ok(Self { file })
    }
}

impl Sink for FifoSink {
    fn write_frame(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file.write_all(bytes)?;
        self.file.flush()
    }
}

pub struct StdoutSink {
    out: Stdout,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self { out: io::stdout() }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for StdoutSink {
    fn write_frame(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut out = self.out.lock();
        out.write_all(bytes)?;
        out.flush()
    }
}

fn mkfifo(path: &Path) -> io::Result<()> {
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "nul byte in pipe path"))?;
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o644) };
    if rc == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    // A pre-existing pipe is reused as-is.
    if err.kind() == io::ErrorKind::AlreadyExists { Ok(()) } else { Err(err) }
}
