//! Fixed set of named worker threads sharing one job channel.
//!
//! Unlike a per-worker channel with round-robin dispatch, every worker pulls
//! from the same queue, so a long build never holds up the jobs behind it
//! while another worker sits idle.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Sender};
use log::{error, info, warn};

use crate::error::PipelineError;

pub type Job = Box<dyn FnOnce() + Send>;

pub struct WorkerPool {
    sender: Mutex<Option<Sender<(&'static str, Job)>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawns `count` threads named `{name}-{i}`.
    pub fn new(name: &str, count: usize) -> Result<Self, PipelineError> {
        let (sender, receiver) = unbounded::<(&'static str, Job)>();
        let mut workers = Vec::with_capacity(count);

        for i in 0..count {
            let receiver = receiver.clone();
            let thread_name = format!("{}-{}", name, i);

            let worker = thread::Builder::new()
                .name(thread_name.clone())
                .spawn(move || {
                    while let Ok((label, job)) = receiver.recv() {
                        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                            error!("Job '{}' panicked outside of task handling", label);
                        }
                    }
                })
                .map_err(|source| PipelineError::ThreadSpawn {
                    name: thread_name,
                    source,
                })?;
            workers.push(worker);
        }

        info!("Started {} '{}' workers", count, name);

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
        })
    }

    /// Queues a job. After shutdown the job is handed back instead.
    pub fn submit(&self, label: &'static str, job: Job) -> Result<(), Job> {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match sender.as_ref() {
            Some(sender) => sender.send((label, job)).map_err(|rejected| rejected.into_inner().1),
            None => Err(job),
        }
    }

    /// Stops accepting jobs, lets the workers finish everything already queued,
    /// and joins them.
    pub fn shutdown(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let workers: Vec<_> = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        let current = thread::current().id();
        for worker in workers {
            if worker.thread().id() == current {
                continue;
            }
            if worker.join().is_err() {
                warn!("Worker thread terminated by a panic");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn shutdown_runs_queued_jobs() {
        let pool = WorkerPool::new("test-worker", 2).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..20 {
            let counter = counter.clone();
            let job: Job = Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            assert!(pool.submit("count", job).is_ok());
        }
        pool.shutdown();

        assert_eq!(counter.load(Ordering::SeqCst), 20);
        assert!(pool.submit("late", Box::new(|| {})).is_err());
    }

    #[test]
    fn panicking_job_does_not_kill_the_worker() {
        let pool = WorkerPool::new("test-worker", 1).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        assert!(pool.submit("boom", Box::new(|| panic!("boom"))).is_ok());
        let after = counter.clone();
        assert!(pool
            .submit(
                "after",
                Box::new(move || {
                    after.fetch_add(1, Ordering::SeqCst);
                })
            )
            .is_ok());
        pool.shutdown();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
