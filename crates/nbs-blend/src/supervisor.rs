use std::{
    io, process,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use signal_hook::{
    consts::{SIGINT, SIGTERM, SIGUSR1, SIGUSR2},
    iterator::Signals,
};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
    buffer::BlendBuffer,
    config::{Config, SinkConfig},
    reader::FanoutReader,
    sink::{FifoSink, Sink, StdoutSink},
    thread::{ThreadPriority, thread_boot},
    writer::run_writer,
};

/// Startup failure that must take the process down with a non-zero code.
#[derive(Debug, Error)]
pub enum BlendError {
    #[error("couldn't open sink: {0}")]
    Sink(#[source] io::Error),
    #[error("couldn't spawn {0} thread: {1}")]
    Spawn(&'static str, #[source] io::Error),
    #[error("couldn't register signal handlers: {0}")]
    Signals(#[source] io::Error),
}

/// Owns the blender lifecycle: sink, buffer, reader and writer threads,
/// signal-driven shutdown.
pub struct Blender {
    config: Config,
}

impl Blender {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Runs until SIGTERM or SIGINT, then shuts down for a zero exit.
    /// A sink write failure terminates the process from the writer thread
    /// with exit code 2 instead.
    pub fn run(self) -> Result<(), BlendError> {
        let mut sink: Box<dyn Sink> = match &self.config.sink {
            SinkConfig::Pipe(path) => Box::new(FifoSink::open(path).map_err(BlendError::Sink)?),
            SinkConfig::Stdout => Box::new(StdoutSink::new()),
        };

        let buffer = Arc::new(BlendBuffer::new(self.config.timeout));
        let stop = Arc::new(AtomicBool::new(false));

        // The writer comes up before any reader can fill the buffer.
        let writer = {
            let buffer = Arc::clone(&buffer);
            thread::Builder::new()
                .name("writer".into())
                .spawn(move || {
                    thread_boot(ThreadPriority::Writer);
                    if run_writer(&buffer, sink.as_mut()).is_err() {
                        // The output stream is torn; nothing downstream of
                        // this process can recover it.
                        process::exit(2);
                    }
                })
                .map_err(|err| BlendError::Spawn("writer", err))?
        };

        let mut slots = Vec::with_capacity(self.config.fanout.len());
        for (i, addr) in self.config.fanout.iter().copied().enumerate() {
            let reader = FanoutReader::new(addr, Arc::clone(&buffer), Arc::clone(&stop));
            slots.push(reader.socket_slot());
            thread::Builder::new()
                .name(format!("fanout-{i}"))
                .spawn(move || {
                    thread_boot(ThreadPriority::Reader);
                    reader.run();
                })
                .map_err(|err| BlendError::Spawn("fanout reader", err))?;
        }

        info!(
            upstreams = self.config.fanout.len(),
            timeout_ms = self.config.timeout.as_millis() as u64,
            "blender running"
        );

        let mut signals =
            Signals::new([SIGTERM, SIGINT, SIGUSR1, SIGUSR2]).map_err(BlendError::Signals)?;
        for signal in signals.forever() {
            match signal {
                SIGTERM | SIGINT => {
                    info!(signal, "shutting down");
                    break;
                }
                // Reserved for log-level adjustment.
                other => debug!(signal = other, "ignoring signal"),
            }
        }

        stop.store(true, Ordering::Relaxed);
        for slot in &slots {
            slot.shutdown();
        }
        buffer.close();
        // Readers may be mid-backoff and are not joined; process exit
        // collects them. The writer drains promptly once the buffer closes.
        if writer.join().is_err() {
            error!("writer thread panicked during shutdown");
        }

        let stats = buffer.stats();
        info!(
            emitted = stats.emitted,
            late = stats.late,
            duplicate = stats.duplicate,
            timed_out = stats.timed_out,
            "blender stopped"
        );
        Ok(())
    }
}
