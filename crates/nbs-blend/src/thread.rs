#[cfg(target_os = "linux")]
use libc::{SCHED_FIFO, sched_param, sched_setscheduler};
use tracing::warn;

/// Any variant other than `OSDefault` requests `SCHED_FIFO` realtime
/// scheduling if the process has permission (CAP_SYS_NICE). If setting the
/// policy fails, the thread continues under the OS default.
///
/// The writer outranks the readers: a starved reader only deepens the blend
/// buffer, which the reveal timeout bounds, while a starved writer stalls
/// the whole output stream.
#[derive(Clone, Copy, Debug)]
pub enum ThreadPriority {
    OSDefault,
    /// Fanout reader threads.
    Reader,
    /// The single writer thread.
    Writer,
    Custom(i32),
}

#[cfg(target_os = "linux")]
impl ThreadPriority {
    fn to_sched_param(self) -> Option<sched_param> {
        let prio = match self {
            Self::OSDefault => return None,
            Self::Reader => 50,
            Self::Writer => 60,
            Self::Custom(p) => p,
        };
        Some(sched_param { sched_priority: prio })
    }
}

/// Called at thread entry, before any work.
#[cfg(target_os = "linux")]
pub fn thread_boot(prio: ThreadPriority) {
    if let Some(param) = prio.to_sched_param() {
        let code = unsafe { sched_setscheduler(0, SCHED_FIFO, &param) };
        if code != 0 {
            warn!(
                %code,
                prio = param.sched_priority,
                "couldn't set realtime priority, continuing at default"
            );
        }
    }
}

#[cfg(not(target_os = "linux"))]
pub fn thread_boot(prio: ThreadPriority) {
    if !matches!(prio, ThreadPriority::OSDefault) {
        warn!(?prio, "thread priority setting only supported on linux");
    }
}
