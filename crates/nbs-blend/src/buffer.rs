use std::{
    collections::BTreeMap,
    sync::{Condvar, Mutex},
    time::{Duration, Instant},
};

use nbs_wire::Frame;
use tracing::{debug, warn};

use crate::key::OrderingKey;

/// Classification returned by [`BlendBuffer::add`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddOutcome {
    Accepted,
    /// Ordered strictly before the last emitted frame; dropped.
    Late,
    /// Same slot as a queued or just-emitted frame; dropped.
    Duplicate,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BufferStats {
    pub accepted: u64,
    pub duplicate: u64,
    pub late: u64,
    pub emitted: u64,
    /// Emissions that sat out their full reveal timeout first.
    pub timed_out: u64,
}

struct Pending {
    frame: Frame,
    reveal_at: Instant,
}

struct State {
    frames: BTreeMap<OrderingKey, Pending>,
    last_emitted: Option<OrderingKey>,
    last_source: Option<u8>,
    uplink: u64,
    stats: BufferStats,
    depth_warned: bool,
    closed: bool,
}

/// Frames the consumer may not see yet. Crossing it logs a warning once per
/// excursion; the reveal timeout, not this value, bounds residency.
const DEPTH_WARN_THRESHOLD: usize = 1024;

/// Shared blending buffer: N producing readers, one consuming writer.
///
/// All state lives under one mutex; the condvar wakes the consumer on
/// insertion and shutdown. Frames are keyed by [`OrderingKey`], so the map
/// minimum is always the next emission candidate and gap skipping falls out
/// of the ordering.
pub struct BlendBuffer {
    state: Mutex<State>,
    readable: Condvar,
    timeout: Duration,
}

impl BlendBuffer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: Mutex::new(State {
                frames: BTreeMap::new(),
                last_emitted: None,
                last_source: None,
                uplink: 0,
                stats: BufferStats::default(),
                depth_warned: false,
                closed: false,
            }),
            readable: Condvar::new(),
            timeout,
        }
    }

    /// Classify and enqueue one decoded frame.
    ///
    /// The uplink counter advances on any change of the frame-header
    /// source, including a revert to an earlier value, before
    /// classification, so even dropped frames move the era forward.
    pub fn add(&self, frame: Frame) -> AddOutcome {
        let mut state = self.state.lock().expect("blend buffer mutex poisoned");

        let source = frame.header().source;
        if state.last_source != Some(source) {
            if state.last_source.is_some() {
                state.uplink += 1;
                debug!(source, uplink = state.uplink, "uplink source changed");
            }
            state.last_source = Some(source);
        }

        let key = OrderingKey::new(state.uplink, &frame);

        if state.frames.contains_key(&key) {
            state.stats.duplicate += 1;
            return AddOutcome::Duplicate;
        }
        if let Some(last) = state.last_emitted {
            if key == last {
                state.stats.duplicate += 1;
                return AddOutcome::Duplicate;
            }
            if key < last {
                state.stats.late += 1;
                debug!(?key, "frame arrived after its slot was emitted");
                return AddOutcome::Late;
            }
        }

        state.stats.accepted += 1;
        let reveal_at = Instant::now() + self.timeout;
        state.frames.insert(key, Pending { frame, reveal_at });

        let depth = state.frames.len();
        if depth > DEPTH_WARN_THRESHOLD && !state.depth_warned {
            warn!(depth, "blend buffer backing up; frame latency exceeds consumer throughput");
            state.depth_warned = true;
        } else if state.depth_warned && depth <= DEPTH_WARN_THRESHOLD / 2 {
            state.depth_warned = false;
        }

        self.readable.notify_one();
        AddOutcome::Accepted
    }

    /// Block until the next frame in key order may be emitted, or `None`
    /// after [`Self::close`].
    ///
    /// The smallest key is emitted immediately when it directly succeeds the
    /// last emitted key (or nothing has been emitted yet). Otherwise the
    /// wait runs to that frame's reveal deadline and is re-armed from
    /// scratch whenever an earlier frame arrives, so a filled gap is emitted
    /// as soon as it lands.
    pub fn next_frame(&self) -> Option<Frame> {
        let mut state = self.state.lock().expect("blend buffer mutex poisoned");
        loop {
            if state.closed {
                return None;
            }

            let (key, reveal_at) = match state.frames.first_key_value() {
                Some((key, pending)) => (*key, pending.reveal_at),
                None => {
                    state = self.readable.wait(state).expect("blend buffer mutex poisoned");
                    continue;
                }
            };

            let fast = match state.last_emitted {
                None => true,
                Some(last) => key.is_successor_of(&last),
            };
            let now = Instant::now();
            if fast || now >= reveal_at {
                if !fast {
                    state.stats.timed_out += 1;
                }
                let (key, pending) = state.frames.pop_first().expect("map checked non-empty");
                state.last_emitted = Some(key);
                state.stats.emitted += 1;
                return Some(pending.frame);
            }

            let (guard, _) = self
                .readable
                .wait_timeout(state, reveal_at - now)
                .expect("blend buffer mutex poisoned");
            state = guard;
        }
    }

    /// Wakes the consumer for shutdown. Frames still queued are dropped
    /// with the buffer; shutdown does not drain.
    pub fn close(&self) {
        let mut state = self.state.lock().expect("blend buffer mutex poisoned");
        state.closed = true;
        self.readable.notify_all();
    }

    pub fn stats(&self) -> BufferStats {
        self.state.lock().expect("blend buffer mutex poisoned").stats
    }

    pub fn depth(&self) -> usize {
        self.state.lock().expect("blend buffer mutex poisoned").frames.len()
    }

    /// Current uplink era, for diagnostics.
    pub fn uplink(&self) -> u64 {
        self.state.lock().expect("blend buffer mutex poisoned").uplink
    }
}
