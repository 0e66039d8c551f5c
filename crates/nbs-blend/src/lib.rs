mod buffer;
mod config;
mod key;
mod reader;
mod sink;
mod supervisor;
mod thread;
mod writer;

pub use buffer::{AddOutcome, BlendBuffer, BufferStats};
pub use config::{Cli, Config, ConfigError, DEFAULT_PIPE, MAX_FANOUT, SinkConfig};
pub use key::OrderingKey;
pub use reader::{FanoutReader, RECONNECT_DELAY, ReaderStats, SocketSlot};
pub use sink::{FifoSink, Sink, StdoutSink};
pub use supervisor::{BlendError, Blender};
pub use thread::{ThreadPriority, thread_boot};
pub use writer::run_writer;
