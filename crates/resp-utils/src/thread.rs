#[cfg(target_os = "linux")]
use libc::{SCHED_FIFO, sched_param, sched_setscheduler};
use tracing::warn;

/// Any variant other than `OSDefault` requests `SCHED_FIFO` realtime scheduling
/// if the process has permission (CAP_SYS_NICE).
/// If setting the policy fails, execution continues under the OS default (CFS).
#[derive(Clone, Copy, Debug)]
pub enum ThreadPriority {
    OSDefault,
    Low,
    Medium,
    High,
}

#[cfg(target_os = "linux")]
impl ThreadPriority {
    fn to_sched_param(self) -> Option<sched_param> {
        let prio = match self {
            ThreadPriority::OSDefault => return None,
            ThreadPriority::Low => 10,
            ThreadPriority::Medium => 20,
            ThreadPriority::High => 30,
        };
        Some(sched_param { sched_priority: prio })
    }
}

#[cfg(target_os = "linux")]
fn set_thread_prio(prio: ThreadPriority) {
    if let Some(param) = prio.to_sched_param() {
        unsafe {
            let code = sched_setscheduler(0, SCHED_FIFO, &param);
            if code != 0 {
                warn!(%code, ?param, "couldn't set worker thread priority");
            }
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn set_thread_prio(prio: ThreadPriority) {
    if !matches!(prio, ThreadPriority::OSDefault) {
        warn!(?prio, "thread priority setting only supported on linux");
    }
}

/// Applies scheduling policy for the calling thread. Called once at the top
/// of each worker thread's entry point.
pub fn thread_boot(prio: ThreadPriority) {
    set_thread_prio(prio);
}
