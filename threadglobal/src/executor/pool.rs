//! A configurable worker thread pool.

use super::{Executor, ExecutorService, Job};
use crate::config::{PoolConfig, RejectionPolicy};
use crate::errors::{RejectedError, TaskError, ThreadGlobalError};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, field, trace, trace_span, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum RunState {
    Running,
    /// No new jobs; queued jobs still run.
    Shutdown,
    /// No new jobs; queued jobs were discarded.
    Stop,
    Terminated,
}

struct PoolState {
    queue: VecDeque<Job>,
    workers: usize,
    idle: usize,
    run_state: RunState,
    completed: u64,
}

struct PoolShared {
    config: PoolConfig,
    state: Mutex<PoolState>,
    work_available: Condvar,
    terminated: Condvar,
    next_worker_id: AtomicUsize,
}

/// A thread pool with core/maximum sizing, a FIFO work queue and a
/// rejection policy.
///
/// Up to `core_threads` workers are started on demand, one per submission.
/// Further jobs are queued. When the queue is bounded and full, extra
/// workers are started up to `max_threads`; those exit after `keep_alive`
/// without work. When no worker can be started either, the rejection policy
/// decides.
///
/// Workers start with empty globals: nothing is inherited from the thread
/// that happened to trigger their creation. Wrap the pool in a
/// [`PropagatingExecutor`](super::PropagatingExecutor) to carry globals into
/// jobs.
///
/// Dropping the pool shuts it down gracefully.
pub struct WorkerPool {
    shared: Arc<PoolShared>,
}

impl WorkerPool {
    /// Creates a pool. No threads are started until work arrives.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the configuration is invalid.
    pub fn new(config: PoolConfig) -> Result<Self, ThreadGlobalError> {
        config.validate()?;
        debug!(
            core_threads = config.core_threads,
            max_threads = config.max_threads,
            queue = ?config.queue,
            rejection = ?config.rejection,
            "Creating worker pool"
        );
        Ok(Self {
            shared: Arc::new(PoolShared {
                config,
                state: Mutex::new(PoolState {
                    queue: VecDeque::new(),
                    workers: 0,
                    idle: 0,
                    run_state: RunState::Running,
                    completed: 0,
                }),
                work_available: Condvar::new(),
                terminated: Condvar::new(),
                next_worker_id: AtomicUsize::new(0),
            }),
        })
    }

    /// Creates a pool of exactly `threads` workers over an unbounded queue.
    ///
    /// # Errors
    ///
    /// Returns `Config` if `threads` is zero.
    pub fn fixed(threads: usize) -> Result<Self, ThreadGlobalError> {
        Self::new(PoolConfig::fixed(threads))
    }

    /// Returns the pool's configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Returns the number of live worker threads.
    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.shared.state.lock().workers
    }

    /// Returns the number of workers currently running a job.
    #[must_use]
    pub fn active_count(&self) -> usize {
        let state = self.shared.state.lock();
        state.workers - state.idle
    }

    /// Returns the number of queued jobs.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// Returns the number of jobs that have finished running.
    #[must_use]
    pub fn completed_count(&self) -> u64 {
        self.shared.state.lock().completed
    }

    /// Starts every core worker ahead of demand. Returns how many were
    /// started.
    ///
    /// # Errors
    ///
    /// Returns the OS error if a thread cannot be created.
    pub fn prestart_core_threads(&self) -> Result<usize, ThreadGlobalError> {
        let mut state = self.shared.state.lock();
        let mut started = 0;
        while state.run_state == RunState::Running && state.workers < self.shared.config.core_threads {
            self.shared.spawn_worker(&mut state, None)?;
            started += 1;
        }
        Ok(started)
    }
}

impl PoolShared {
    /// Starts a worker. Must be called with the state lock held.
    fn spawn_worker(self: &Arc<Self>, state: &mut PoolState, first: Option<Job>) -> std::io::Result<()> {
        let id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
        let mut builder =
            std::thread::Builder::new().name(format!("{}-{id}", self.config.thread_name_prefix));
        if let Some(size) = self.config.stack_size {
            builder = builder.stack_size(size);
        }

        let shared = Arc::clone(self);
        builder.spawn(move || shared.run_worker(id, first))?;
        state.workers += 1;
        debug!(worker = id, workers = state.workers, "Worker started");
        Ok(())
    }

    fn run_worker(&self, id: usize, mut first: Option<Job>) {
        while let Some(job) = first.take().or_else(|| self.next_job()) {
            let span = trace_span!("job", worker = id, duration_ms = field::Empty);
            let _entered = span.enter();
            let started = Instant::now();
            if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
                let err = TaskError::from_panic(payload.as_ref());
                warn!(error = %err, "Job panicked");
            }
            span.record("duration_ms", started.elapsed().as_secs_f64() * 1000.0);
            trace!("Job finished");
            self.state.lock().completed += 1;
        }
        debug!(worker = id, "Worker exiting");
    }

    /// Waits for the next job. Returns `None` when this worker should exit,
    /// having already removed itself from the worker count.
    fn next_job(&self) -> Option<Job> {
        let mut state = self.state.lock();
        loop {
            if state.run_state < RunState::Stop {
                if let Some(job) = state.queue.pop_front() {
                    return Some(job);
                }
            }
            if state.run_state != RunState::Running {
                break;
            }

            let timed = state.workers > self.config.core_threads;
            state.idle += 1;
            let timed_out = if timed {
                self.work_available
                    .wait_for(&mut state, self.config.keep_alive())
                    .timed_out()
            } else {
                self.work_available.wait(&mut state);
                false
            };
            state.idle -= 1;

            if timed_out && state.queue.is_empty() && state.workers > self.config.core_threads {
                break;
            }
        }

        state.workers -= 1;
        if state.workers == 0 && state.run_state != RunState::Running {
            state.run_state = RunState::Terminated;
            self.terminated.notify_all();
            debug!("Worker pool terminated");
        }
        None
    }

    fn queue_has_room(&self, state: &PoolState) -> bool {
        match self.config.queue_capacity() {
            None => true,
            // Idle workers count as room so a zero-capacity queue still
            // hands jobs to waiting threads.
            Some(capacity) => state.queue.len() < capacity || state.queue.len() < state.idle,
        }
    }

    fn try_spawn(self: &Arc<Self>, state: &mut PoolState, job: Job) -> Result<(), RejectedError> {
        self.spawn_worker(state, Some(job)).map_err(|e| {
            error!(error = %e, "Failed to start worker thread");
            RejectedError::spawn_failed()
        })
    }

    fn reject(&self, mut state: MutexGuard<'_, PoolState>, job: Job) -> Result<(), RejectedError> {
        let shutting_down = state.run_state != RunState::Running;
        match self.config.rejection {
            RejectionPolicy::Abort => {
                warn!(shutting_down, "Job rejected");
                drop(state);
                drop(job);
                Err(if shutting_down {
                    RejectedError::shutdown()
                } else {
                    RejectedError::queue_full()
                })
            }
            RejectionPolicy::CallerRuns => {
                drop(state);
                if shutting_down {
                    debug!("Pool shut down, dropping job instead of running on caller");
                } else {
                    trace!("Running rejected job on the submitting thread");
                    job();
                }
                Ok(())
            }
            RejectionPolicy::Discard => {
                debug!(shutting_down, "Discarding rejected job");
                drop(state);
                drop(job);
                Ok(())
            }
            RejectionPolicy::DiscardOldest => {
                if shutting_down {
                    drop(state);
                    drop(job);
                    return Ok(());
                }
                let oldest = state.queue.pop_front();
                if oldest.is_some() {
                    state.queue.push_back(job);
                    self.work_available.notify_one();
                    debug!("Discarded oldest queued job");
                    drop(state);
                    drop(oldest);
                } else {
                    debug!("Queue has no capacity, discarding job");
                    drop(state);
                    drop(job);
                }
                Ok(())
            }
        }
    }
}

impl Executor for WorkerPool {
    fn execute(&self, job: Job) -> Result<(), RejectedError> {
        let shared = &self.shared;
        let mut state = shared.state.lock();

        if state.run_state != RunState::Running {
            return shared.reject(state, job);
        }

        if state.workers < shared.config.core_threads {
            return shared.try_spawn(&mut state, job);
        }

        if shared.queue_has_room(&state) {
            state.queue.push_back(job);
            if state.workers == 0 {
                // core_threads == 0: somebody has to drain the queue.
                if let Err(e) = shared.spawn_worker(&mut state, None) {
                    error!(error = %e, "Failed to start worker thread");
                    let job = state.queue.pop_back();
                    drop(state);
                    drop(job);
                    return Err(RejectedError::spawn_failed());
                }
            } else {
                shared.work_available.notify_one();
            }
            trace!(queued = state.queue.len(), "Job queued");
            return Ok(());
        }

        if state.workers < shared.config.max_threads {
            return shared.try_spawn(&mut state, job);
        }

        shared.reject(state, job)
    }
}

impl ExecutorService for WorkerPool {
    fn shutdown(&self) {
        let mut state = self.shared.state.lock();
        if state.run_state == RunState::Running {
            state.run_state = RunState::Shutdown;
            debug!(queued = state.queue.len(), "Worker pool shutting down");
        }
        if state.workers == 0 && state.run_state != RunState::Terminated {
            state.run_state = RunState::Terminated;
            self.shared.terminated.notify_all();
        }
        self.shared.work_available.notify_all();
    }

    fn shutdown_now(&self) -> usize {
        let drained: Vec<Job> = {
            let mut state = self.shared.state.lock();
            if state.run_state < RunState::Stop {
                state.run_state = RunState::Stop;
            }
            let drained = state.queue.drain(..).collect();
            if state.workers == 0 && state.run_state != RunState::Terminated {
                state.run_state = RunState::Terminated;
                self.shared.terminated.notify_all();
            }
            self.shared.work_available.notify_all();
            drained
        };
        let count = drained.len();
        debug!(discarded = count, "Worker pool stopped");
        drop(drained);
        count
    }

    fn is_shutdown(&self) -> bool {
        self.shared.state.lock().run_state != RunState::Running
    }

    fn is_terminated(&self) -> bool {
        self.shared.state.lock().run_state == RunState::Terminated
    }

    fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while state.run_state != RunState::Terminated {
            if self
                .shared
                .terminated
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return state.run_state == RunState::Terminated;
            }
        }
        true
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("WorkerPool")
            .field("workers", &state.workers)
            .field("idle", &state.idle)
            .field("queued", &state.queue.len())
            .field("run_state", &state.run_state)
            .finish()
    }
}
