//! # Serial Mailbox
//!
//! A single-consumer actor: one dedicated thread owns a piece of state `S` and
//! runs every job posted to it, strictly in the order the jobs were posted.
//! Jobs are plain closures receiving `&mut S`, so the state needs no lock even
//! though any number of threads post work to it.
//!
//! The section coordinator uses this as its serial context: the scheduler and
//! buffer pool live inside the mailbox and are only ever touched from jobs.

use std::sync::Mutex;
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::{debug, warn};

use crate::error::PipelineError;

type Job<S> = Box<dyn FnOnce(&mut S) + Send>;

enum Message<S> {
    Run(Job<S>),
    Shutdown,
}

/// Handle to a mailbox thread. Cheap to share behind an `Arc`.
pub struct SerialExecutor<S> {
    name: String,
    sender: Sender<Message<S>>,
    thread_id: ThreadId,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<S: Send + 'static> SerialExecutor<S> {
    /// Spawns the mailbox thread, moving `state` onto it.
    ///
    /// # Errors
    /// Returns [`PipelineError::ThreadSpawn`] if the OS refuses to create the thread.
    pub fn spawn(name: &str, mut state: S) -> Result<Self, PipelineError> {
        let (sender, receiver): (Sender<Message<S>>, Receiver<Message<S>>) = unbounded();

        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while let Ok(message) = receiver.recv() {
                    match message {
                        Message::Run(job) => job(&mut state),
                        Message::Shutdown => break,
                    }
                }
            })
            .map_err(|source| PipelineError::ThreadSpawn {
                name: name.to_string(),
                source,
            })?;

        debug!("Spawned serial mailbox '{}'", name);

        Ok(Self {
            name: name.to_string(),
            sender,
            thread_id: worker.thread().id(),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Posts a job. Returns `false` if the mailbox has already shut down, in which
    /// case the job is dropped without running.
    pub fn send<F>(&self, job: F) -> bool
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.sender.send(Message::Run(Box::new(job))).is_ok()
    }

    /// Blocks until every job posted before this call has run.
    ///
    /// Calling this from inside a job would wait on itself, so it returns
    /// immediately in that case.
    pub fn flush(&self) -> bool {
        if self.is_current_thread() {
            return true;
        }

        let (done_tx, done_rx) = bounded::<()>(1);
        if !self.send(move |_| {
            let _ = done_tx.send(());
        }) {
            return false;
        }
        done_rx.recv().is_ok()
    }

    /// Returns true when called from a job running on this mailbox.
    pub fn is_current_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Runs every job already posted, then stops the thread and joins it.
    /// Jobs posted afterwards are dropped.
    pub fn shutdown(&self) {
        let _ = self.sender.send(Message::Shutdown);

        if self.is_current_thread() {
            return;
        }

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                warn!("Serial mailbox '{}' terminated by a panic", self.name);
            }
        }
    }
}
