use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::error::PoolError;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Queue {
    jobs: VecDeque<Job>,
    stopped: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    available: Condvar,
}

/// Fixed-size worker pool fed by an unbounded FIFO queue.
///
/// Workers sleep on the queue's condition variable, run one task at a time
/// outside the lock, and exit only once shutdown was requested *and* the
/// queue is empty, so everything submitted before `shutdown()` still runs.
pub struct TaskPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

/// Future-like handle to one submitted task's result.
#[derive(Debug)]
pub struct TaskHandle<T> {
    result: Receiver<Result<T, String>>,
}

impl<T> TaskHandle<T> {
    /// Block until the task has run.
    pub fn wait(self) -> Result<T, PoolError> {
        match self.result.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(message)) => Err(PoolError::TaskPanicked(message)),
            Err(_) => Err(PoolError::ResultLost),
        }
    }
}

impl TaskPool {
    /// Start `workers` threads. A count of 0 is raised to 1.
    pub fn new(workers: usize) -> Result<Self, PoolError> {
        let size = workers.max(1);
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                jobs: VecDeque::new(),
                stopped: false,
            }),
            available: Condvar::new(),
        });

        let mut handles = Vec::with_capacity(size);
        for index in 0..size {
            let worker_shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(format!("graph-vis-pool-{index}"))
                .spawn(move || worker_loop(&worker_shared))
                .map_err(PoolError::Spawn);
            match handle {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    // Release the workers that did start before bailing out
                    shared.queue.lock().stopped = true;
                    shared.available.notify_all();
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(err);
                }
            }
        }

        info!(workers = size, "task pool started");
        Ok(Self {
            shared,
            workers: Mutex::new(handles),
            size,
        })
    }

    /// One worker per logical CPU.
    pub fn with_default_size() -> Result<Self, PoolError> {
        Self::new(num_cpus::get())
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Queue `task` and return a handle to its result.
    ///
    /// Fails with [`PoolError::ShutDown`] once shutdown was requested; the
    /// task is never silently dropped.
    pub fn submit<F, T>(&self, task: F) -> Result<TaskHandle<T>, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx): (Sender<Result<T, String>>, Receiver<Result<T, String>>) =
            crossbeam_channel::bounded(1);
        let job: Job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(task)).map_err(panic_message);
            if let Err(message) = &outcome {
                warn!(panic = %message, "pool task panicked");
            }
            // The caller may have dropped the handle; that is not an error here
            let _ = tx.send(outcome);
        });

        {
            let mut queue = self.shared.queue.lock();
            if queue.stopped {
                return Err(PoolError::ShutDown);
            }
            queue.jobs.push_back(job);
        }
        self.shared.available.notify_one();
        Ok(TaskHandle { result: rx })
    }

    /// Stop accepting tasks, let workers drain the queue, and join them.
    ///
    /// Idempotent. Must not be called from inside a pool task.
    pub fn shutdown(&self) {
        self.shared.queue.lock().stopped = true;
        self.shared.available.notify_all();

        let workers = std::mem::take(&mut *self.workers.lock());
        if workers.is_empty() {
            return;
        }
        for worker in workers {
            if worker.join().is_err() {
                warn!("pool worker exited by panic");
            }
        }
        info!(workers = self.size, "task pool shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.queue.lock().stopped
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let job = {
            let mut queue = shared.queue.lock();
            loop {
                if let Some(job) = queue.jobs.pop_front() {
                    break job;
                }
                if queue.stopped {
                    debug!("pool worker exiting");
                    return;
                }
                shared.available.wait(&mut queue);
            }
        };
        job();
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
