//! A fixed-size pool of worker threads draining a priority-ordered task queue.
//!
//! Workers and callers coordinate through one mutex and two condition variables:
//! `new_work` wakes idle workers when a task is queued (or the pool stops), and
//! `task_done` wakes callers blocked in [`ThreadPool::wait_all`] or
//! [`ThreadPool::wait_for`] whenever a worker finishes a task.
//!
//! # Example
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use rs_starfield::threading::{Priority, ThreadPool};
//!
//! let pool = ThreadPool::new(4).expect("Failed to start pool");
//! let counter = Arc::new(AtomicUsize::new(0));
//! for _ in 0..16 {
//!     let counter = Arc::clone(&counter);
//!     pool.submit(move || { counter.fetch_add(1, Ordering::SeqCst); }, Priority::Medium)
//!         .expect("Failed to submit");
//! }
//! pool.wait_all();
//! assert_eq!(counter.load(Ordering::SeqCst), 16);
//! ```
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use log::{error, info, trace};

use crate::threading::task::{Priority, Task, TaskId, TaskQueue};
use crate::utils::SimError;

struct PoolState {
    pending: TaskQueue,
    executing: HashSet<TaskId>,
    stop: bool,
}

impl PoolState {
    fn is_tracked(&self, id: TaskId) -> bool {
        self.executing.contains(&id) || self.pending.contains(id)
    }
}

struct Shared {
    state: Mutex<PoolState>,
    new_work: Condvar,
    task_done: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        // Tasks run outside the lock, so a poisoned mutex still guards consistent state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Starts `n_threads` workers. They idle until work is submitted.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] for a pool of zero threads and
    /// [`SimError::ThreadSpawn`] if a worker cannot be started.
    pub fn new(n_threads: usize) -> Result<Self, SimError> {
        if n_threads == 0 {
            return Err(SimError::InvalidConfig("thread pool needs at least one thread".to_string()));
        }
        let shared = Arc::new(Shared {
            state: Mutex::new(PoolState {
                pending: TaskQueue::new(),
                executing: HashSet::new(),
                stop: false,
            }),
            new_work: Condvar::new(),
            task_done: Condvar::new(),
        });

        let mut pool = ThreadPool { shared, workers: Vec::with_capacity(n_threads) };
        for i in 0..n_threads {
            let shared = Arc::clone(&pool.shared);
            let handle = thread::Builder::new()
                .name(format!("starfield-worker-{}", i))
                .spawn(move || worker_loop(&shared))
                .map_err(|e| SimError::ThreadSpawn(e.to_string()))?;
            pool.workers.push(handle);
        }
        info!("Thread pool started with {} workers", n_threads);
        Ok(pool)
    }

    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    /// Queues `work` and wakes one idle worker.
    pub fn submit<F>(&self, work: F, priority: Priority) -> Result<TaskId, SimError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit_task(Task::new(Box::new(work), priority))
    }

    /// Queues an already constructed task. Executed tasks are refused.
    pub fn submit_task(&self, task: Task) -> Result<TaskId, SimError> {
        let id = task.id();
        let mut state = self.shared.lock();
        if state.stop {
            return Err(SimError::PoolShutDown);
        }
        if !state.pending.insert(task) {
            return Err(SimError::InvalidConfig(format!("{} was already executed", id)));
        }
        self.shared.new_work.notify_one();
        Ok(id)
    }

    /// Blocks until no task is pending or executing.
    ///
    /// Must not be called from inside a task: the calling worker would wait on itself.
    pub fn wait_all(&self) {
        let mut state = self.shared.lock();
        while !state.pending.is_empty() || !state.executing.is_empty() {
            state = self.shared.task_done.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Blocks until the given task is neither pending nor executing.
    pub fn wait_for(&self, id: TaskId) {
        let mut state = self.shared.lock();
        while state.is_tracked(id) {
            state = self.shared.task_done.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// True once the task has finished. Also true for ids this pool never saw.
    pub fn is_done(&self, id: TaskId) -> bool {
        !self.shared.lock().is_tracked(id)
    }

    pub fn pending(&self) -> usize {
        self.shared.lock().pending.len()
    }

    pub fn executing(&self) -> usize {
        self.shared.lock().executing.len()
    }

    /// Waits for all queued work, stops the workers and joins them.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.wait_all();
        {
            let mut state = self.shared.lock();
            state.stop = true;
            self.shared.new_work.notify_all();
        }
        let n = self.workers.len();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("Worker thread exited with a panic");
            }
        }
        info!("Thread pool stopped, joined {} workers", n);
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let mut task = {
            let mut state = shared.lock();
            loop {
                if state.stop {
                    return;
                }
                if let Some(task) = state.pending.pop() {
                    state.executing.insert(task.id());
                    break task;
                }
                state = shared.new_work.wait(state).unwrap_or_else(PoisonError::into_inner);
            }
        };

        let id = task.id();
        if panic::catch_unwind(AssertUnwindSafe(|| task.execute())).is_err() {
            error!("{} panicked; the worker continues", id);
        }
        drop(task);

        let mut state = shared.lock();
        state.executing.remove(&id);
        trace!("{} done, {} pending", id, state.pending.len());
        shared.task_done.notify_all();
    }
}
