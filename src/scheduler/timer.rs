use std::collections::{BTreeMap, HashMap};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::foundation::error::{StoryError, StoryResult};

pub(crate) type TimerTask = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a scheduled task, used to cancel it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

enum TimerCommand {
    Schedule {
        id: TimerId,
        deadline: Instant,
        task: TimerTask,
    },
    Cancel(TimerId),
    Shutdown,
}

/// Cancellable delayed tasks run in deadline order on one background thread.
pub(crate) struct TimerQueue {
    tx: Sender<TimerCommand>,
    next_id: AtomicU64,
    join: Option<JoinHandle<()>>,
}

impl TimerQueue {
    pub(crate) fn spawn(name: &str) -> StoryResult<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let join = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run(rx))
            .map_err(|e| {
                StoryError::context_unavailable(format!("failed to spawn timer thread: {e}"))
            })?;
        Ok(Self {
            tx,
            next_id: AtomicU64::new(1),
            join: Some(join),
        })
    }

    pub(crate) fn schedule(&self, delay: Duration, task: TimerTask) -> StoryResult<TimerId> {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.tx
            .send(TimerCommand::Schedule {
                id,
                deadline: Instant::now() + delay,
                task,
            })
            .map_err(|_| StoryError::context_unavailable("timer thread is not running"))?;
        Ok(id)
    }

    /// Cancel a task. Tasks that already ran are unaffected.
    pub(crate) fn cancel(&self, id: TimerId) {
        let _ = self.tx.send(TimerCommand::Cancel(id));
    }

    pub(crate) fn shutdown(&mut self) {
        let _ = self.tx.send(TimerCommand::Shutdown);
        if let Some(join) = self.join.take() {
            if join.thread().id() == std::thread::current().id() {
                return;
            }
            if join.join().is_err() {
                tracing::warn!("timer thread panicked");
            }
        }
    }
}

impl Drop for TimerQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(rx: Receiver<TimerCommand>) {
    let mut due: BTreeMap<(Instant, TimerId), TimerTask> = BTreeMap::new();
    let mut deadlines: HashMap<TimerId, Instant> = HashMap::new();

    loop {
        let next = due.keys().next().map(|&(deadline, _)| deadline);
        let cmd = match next {
            Some(deadline) => match rx.recv_deadline(deadline) {
                Ok(cmd) => Some(cmd),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match rx.recv() {
                Ok(cmd) => Some(cmd),
                Err(_) => break,
            },
        };

        match cmd {
            Some(TimerCommand::Schedule { id, deadline, task }) => {
                deadlines.insert(id, deadline);
                due.insert((deadline, id), task);
            }
            Some(TimerCommand::Cancel(id)) => {
                if let Some(deadline) = deadlines.remove(&id) {
                    due.remove(&(deadline, id));
                }
            }
            Some(TimerCommand::Shutdown) => break,
            None => {}
        }

        let now = Instant::now();
        while let Some(entry) = due.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let ((_, id), task) = entry.remove_entry();
            deadlines.remove(&id);
            if catch_unwind(AssertUnwindSafe(task)).is_err() {
                tracing::warn!(timer = id.0, "timer task panicked");
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scheduler/timer.rs"]
mod tests;
