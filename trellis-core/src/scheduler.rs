//! Batch Scheduler
//!
//! The scheduler collects update jobs (component re-renders) and runs them
//! together on the next turn, so that a burst of state writes causes at most
//! one re-render per component.
//!
//! # Algorithm
//!
//! 1. `queue_job` appends a job unless a job with the same id is already
//!    queued. The first enqueue since the last flush schedules a flush through
//!    the installed flush hook.
//! 2. A flush takes the whole queue (snapshot-and-clear) and runs each job in
//!    insertion order.
//! 3. Jobs queued while a flush runs land in the fresh queue and schedule the
//!    next flush; they never join the flush in progress.
//!
//! # Driving flushes
//!
//! Without a hook, nothing runs until [`flush_jobs`] is called. Hosts install
//! a hook with [`set_flush_hook`]; [`install_tokio_flush`] installs one that
//! spawns the flush onto the current `tokio` `LocalSet`.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use tracing::{debug, trace};

/// Identity of a scheduled job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(u64);

impl JobId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job#{}", self.0)
    }
}

/// A unit of deferred work. Clones share the same identity.
#[derive(Clone)]
pub struct Job {
    id: JobId,
    run: Rc<dyn Fn()>,
}

impl Job {
    pub fn new(run: impl Fn() + 'static) -> Self {
        Self {
            id: JobId::next(),
            run: Rc::new(run),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    /// Run the job now, outside the queue.
    pub fn run(&self) {
        (self.run)()
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Job").field(&self.id).finish()
    }
}

#[derive(Default)]
struct Queue {
    jobs: IndexMap<JobId, Job>,
    flush_pending: bool,
    flushing: bool,
    hook: Option<Rc<dyn Fn()>>,
}

thread_local! {
    static QUEUE: RefCell<Queue> = RefCell::new(Queue::default());
}

/// Add `job` to the queue unless it is already queued.
pub fn queue_job(job: &Job) {
    let hook = QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        if queue.jobs.contains_key(&job.id) {
            trace!(job = %job.id, "job already queued");
            return None;
        }

        trace!(job = %job.id, "job queued");
        queue.jobs.insert(job.id, job.clone());

        if queue.flush_pending {
            return None;
        }
        queue.flush_pending = true;
        queue.hook.clone()
    });

    if let Some(hook) = hook {
        hook();
    }
}

/// Remove a queued job; returns whether it was queued.
pub fn invalidate_job(id: JobId) -> bool {
    QUEUE.with(|queue| queue.borrow_mut().jobs.shift_remove(&id).is_some())
}

/// Run every job queued so far, in insertion order. Returns the number run.
///
/// Calling this from inside a running flush does nothing.
pub fn flush_jobs() -> usize {
    let jobs = QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        if queue.flushing {
            return None;
        }
        queue.flushing = true;
        queue.flush_pending = false;
        Some(std::mem::take(&mut queue.jobs))
    });

    let Some(jobs) = jobs else {
        return 0;
    };

    let _guard = FlushGuard;
    let count = jobs.len();
    debug!(jobs = count, "flushing jobs");
    for job in jobs.into_values() {
        job.run();
    }
    count
}

/// Flush repeatedly until nothing is queued. Returns the total number run.
pub fn flush_until_idle() -> usize {
    let mut total = 0;
    while pending_jobs() > 0 && !is_flushing() {
        total += flush_jobs();
    }
    total
}

/// Clears the flushing flag on every exit path.
struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        let _ = QUEUE.try_with(|queue| {
            if let Ok(mut queue) = queue.try_borrow_mut() {
                queue.flushing = false;
            }
        });
    }
}

/// Number of jobs waiting for the next flush.
pub fn pending_jobs() -> usize {
    QUEUE.with(|queue| queue.borrow().jobs.len())
}

pub fn is_flushing() -> bool {
    QUEUE.with(|queue| queue.borrow().flushing)
}

/// Whether a flush has been requested and not yet run.
pub fn is_flush_pending() -> bool {
    QUEUE.with(|queue| queue.borrow().flush_pending)
}

/// Install the callback used to request a flush on the next turn.
///
/// The hook is called once per batch, on the first enqueue since the last
/// flush. It must arrange for [`flush_jobs`] to be called later; calling it
/// synchronously turns the scheduler into an immediate one.
pub fn set_flush_hook(hook: impl Fn() + 'static) {
    QUEUE.with(|queue| queue.borrow_mut().hook = Some(Rc::new(hook)));
}

pub fn clear_flush_hook() {
    QUEUE.with(|queue| queue.borrow_mut().hook = None);
}

/// Flush on the current `tokio` `LocalSet`.
///
/// Each batch spawns one local task that runs [`flush_jobs`]. Writes must
/// then happen inside `LocalSet::run_until` (or a task spawned on it).
pub fn install_tokio_flush() {
    set_flush_hook(|| {
        tokio::task::spawn_local(async {
            flush_jobs();
        });
    });
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
