//! # Task Management
//!
//! The `SectionCoordinator` schedules section rebuilds and sorts onto a pool of
//! worker threads while keeping memory bounded and every scheduling decision
//! serialized.
//!
//! ## Architecture Overview
//!
//! - A serial mailbox thread owns the `SectionTaskScheduler`, the `BufferPool`
//!   and the set of running tasks. Nothing else touches them.
//! - `send` posts the task into the mailbox, which queues it and runs the
//!   scheduling loop.
//! - The scheduling loop pops the nearest pending task for as long as the pool
//!   has a free scratch buffer set, and hands task plus buffers to a worker.
//! - When a task finishes, its scratch buffers and outcome are posted back to
//!   the mailbox as a continuation, which recycles the buffers, reports any
//!   failure and runs the scheduling loop again.
//! - GPU work queued by tasks runs on the render thread in `upload`, once per
//!   frame.
//!
//! ## Task Lifecycle
//! 1. `BuiltSection::create_rebuild_task` / `schedule_sort` create the task
//! 2. `send` queues it (`Pending`)
//! 3. The scheduling loop dispatches it to a worker (`Running`)
//! 4. The worker builds or sorts, then queues an upload
//! 5. `upload` runs the upload on the render thread and publishes the result
//! 6. The continuation marks the task finished and frees its buffers
//!
//! No thread ever blocks waiting on a task. Cancellation is cooperative and
//! checked at every step; a cancelled task never publishes render data.

pub mod execution;
pub mod scheduler;
pub mod services;
pub mod task;
pub mod worker_pool;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use cgmath::Point3;
use log::{debug, info, trace};

use crate::buffer_state::{BufferPool, GpuDevice, SectionBuffers, UploadQueue};
use crate::config::PipelineConfig;
use crate::core::{MtResource, SerialExecutor};
use crate::diagnostics::{CrashReport, DiagnosticsSink};
use crate::error::PipelineError;
use crate::section::{BuiltSection, RenderData};
use crate::voxels::region::RegionSource;

use execution::TaskContext;
pub use scheduler::SectionTaskScheduler;
pub use services::{CoordinatorServices, SectionListener};
pub use task::{
    CompletionRoute, RebuildTask, SectionTask, SortTask, TaskHandle, TaskKind, TaskOutcome,
    TaskResult, TaskState, TaskTarget,
};
use worker_pool::WorkerPool;

/// Id of the coordinator's dedicated scratch buffers for synchronous rebuilds.
const INLINE_BUFFERS_ID: usize = usize::MAX;

/// State owned by the coordinator's mailbox thread.
struct CoordinatorState {
    scheduler: SectionTaskScheduler,
    pool: BufferPool,
    in_flight: HashMap<u64, TaskTarget>,
}

struct Shared {
    mailbox: SerialExecutor<CoordinatorState>,
    workers: WorkerPool,
    ctx: Arc<TaskContext>,
    device: Arc<dyn GpuDevice>,
    diagnostics: Arc<dyn DiagnosticsSink>,
    inline_buffers: Mutex<Option<SectionBuffers>>,
    scratch_capacity: (usize, usize),
    pending_tasks: AtomicUsize,
    free_buffers: AtomicUsize,
    running_tasks: AtomicUsize,
}

impl Shared {
    /// Dispatches pending tasks until the queue is empty, the pool is exhausted
    /// or the coordinator stops. Runs only on the mailbox thread.
    fn schedule_run_tasks(self: &Arc<Self>, state: &mut CoordinatorState) {
        while !self.ctx.is_stopped() && !state.pool.has_no_available_builder() {
            let Some(task) = state.scheduler.dequeue_nearest(self.ctx.camera_position()) else {
                break;
            };
            self.pending_tasks.fetch_sub(1, Ordering::SeqCst);

            let Some(buffers) = state.pool.acquire() else {
                state.scheduler.enqueue(task);
                self.pending_tasks.fetch_add(1, Ordering::SeqCst);
                break;
            };

            let target = task.target().clone();
            let label = target.handle.name();
            target.handle.set_state(TaskState::Running);
            state.in_flight.insert(target.handle.id(), target.clone());
            self.sync_counters(state);
            trace!(
                "Dispatching {} #{} for section {}",
                label,
                target.handle.id(),
                target.section.key()
            );

            let route = self.pooled_route(target);
            let ctx = Arc::clone(&self.ctx);
            let job = Box::new(move || task.run(buffers, &ctx, route));
            if let Err(job) = self.workers.submit(label, job) {
                job();
            }
        }
    }

    /// Completion route for pool-dispatched tasks: posts the continuation back
    /// into the mailbox.
    fn pooled_route(self: &Arc<Self>, target: TaskTarget) -> CompletionRoute {
        let shared = Arc::clone(self);
        Box::new(move |buffers, outcome| {
            let coordinator = Arc::clone(&shared);
            shared.mailbox.send(move |state: &mut CoordinatorState| {
                coordinator.finish_task(state, target, buffers, outcome)
            });
        })
    }

    /// Completion route for synchronous rebuilds: hands the dedicated scratch
    /// buffers back without touching the pool.
    fn inline_route(self: &Arc<Self>, target: TaskTarget) -> CompletionRoute {
        let shared = Arc::clone(self);
        Box::new(move |mut buffers, outcome| {
            shared.complete(&target, &mut buffers, outcome, "Rebuilding section");
            if buffers.id() == INLINE_BUFFERS_ID {
                *shared
                    .inline_buffers
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(buffers);
            }
        })
    }

    fn finish_task(
        self: &Arc<Self>,
        state: &mut CoordinatorState,
        target: TaskTarget,
        mut buffers: SectionBuffers,
        outcome: TaskOutcome,
    ) {
        state.in_flight.remove(&target.handle.id());
        self.complete(&target, &mut buffers, outcome, "Batching sections");
        state.pool.release(buffers);
        self.sync_counters(state);
        self.schedule_run_tasks(state);
    }

    /// Records the outcome on the task and recycles its scratch buffers:
    /// cleared after success, reset otherwise.
    fn complete(
        &self,
        target: &TaskTarget,
        buffers: &mut SectionBuffers,
        outcome: TaskOutcome,
        title: &'static str,
    ) {
        let handle = &target.handle;
        match outcome {
            Ok(TaskResult::Successful) => {
                buffers.clear();
                handle.set_state(TaskState::Successful);
                debug!("{} #{} finished for section {}", handle.name(), handle.id(), target.section.key());
            }
            Ok(TaskResult::Cancelled) => {
                buffers.reset();
                handle.set_state(TaskState::Cancelled);
                trace!("{} #{} cancelled", handle.name(), handle.id());
            }
            Err(error) => {
                buffers.reset();
                handle.set_state(TaskState::Failed);
                self.diagnostics.report(CrashReport {
                    title,
                    section: target.section.key(),
                    task: handle.kind(),
                    error,
                });
            }
        }
    }

    fn sync_counters(&self, state: &CoordinatorState) {
        self.free_buffers
            .store(state.pool.available_count(), Ordering::SeqCst);
        self.running_tasks
            .store(state.in_flight.len(), Ordering::SeqCst);
    }

    fn cancel_all_tasks(self: &Arc<Self>) {
        let shared = Arc::clone(self);
        self.mailbox.send(move |state: &mut CoordinatorState| {
            let cancelled = state.scheduler.cancel_all();
            shared.pending_tasks.fetch_sub(cancelled, Ordering::SeqCst);
            for target in state.in_flight.values() {
                target.cancel();
            }
            if cancelled > 0 || !state.in_flight.is_empty() {
                debug!(
                    "Cancelled {} queued and {} running section tasks",
                    cancelled,
                    state.in_flight.len()
                );
            }
        });
    }

    fn upload(&self) -> usize {
        self.ctx.uploads.drain(self.device.as_ref())
    }
}

/// Schedules section rebuilds and sorts; see the module docs.
pub struct SectionCoordinator {
    shared: Arc<Shared>,
}

impl SectionCoordinator {
    /// Starts the mailbox and worker threads.
    ///
    /// # Errors
    /// Returns an error if the config is invalid or a thread cannot be spawned.
    pub fn new(
        config: &PipelineConfig,
        services: CoordinatorServices,
    ) -> Result<Self, PipelineError> {
        config.validate()?;

        let state = CoordinatorState {
            scheduler: SectionTaskScheduler::new(),
            pool: BufferPool::new(
                config.buffer_pool_capacity,
                config.scratch_vertex_capacity,
                config.scratch_index_capacity,
            ),
            in_flight: HashMap::new(),
        };

        let shared = Arc::new(Shared {
            mailbox: SerialExecutor::spawn("section-coordinator", state)?,
            workers: WorkerPool::new("section-worker", config.worker_threads)?,
            ctx: Arc::new(TaskContext {
                geometry: services.geometry,
                listener: services.listener,
                uploads: Arc::new(UploadQueue::new()),
                camera: MtResource::new(Point3::new(0.0, 0.0, 0.0)),
                stopped: AtomicBool::new(false),
            }),
            device: services.device,
            diagnostics: services.diagnostics,
            inline_buffers: Mutex::new(Some(SectionBuffers::new(
                INLINE_BUFFERS_ID,
                config.scratch_vertex_capacity,
                config.scratch_index_capacity,
            ))),
            scratch_capacity: (config.scratch_vertex_capacity, config.scratch_index_capacity),
            pending_tasks: AtomicUsize::new(0),
            free_buffers: AtomicUsize::new(config.buffer_pool_capacity),
            running_tasks: AtomicUsize::new(0),
        });

        let initial = Arc::clone(&shared);
        shared
            .mailbox
            .send(move |state: &mut CoordinatorState| initial.schedule_run_tasks(state));

        info!(
            "Section coordinator started: {} workers, {} scratch buffer sets",
            config.worker_threads, config.buffer_pool_capacity
        );

        Ok(Self { shared })
    }

    /// Queues a task. Once the coordinator has stopped the task is only marked
    /// cancelled and never runs.
    pub fn send(&self, task: SectionTask) {
        if self.shared.ctx.is_stopped() {
            task.cancel_and_finish();
            return;
        }

        self.shared.pending_tasks.fetch_add(1, Ordering::SeqCst);
        let shared = Arc::clone(&self.shared);
        let posted = self.shared.mailbox.send(move |state: &mut CoordinatorState| {
            if shared.ctx.is_stopped() {
                task.cancel_and_finish();
                shared.pending_tasks.fetch_sub(1, Ordering::SeqCst);
                return;
            }
            state.scheduler.enqueue(task);
            shared.schedule_run_tasks(state);
        });
        if !posted {
            self.shared.pending_tasks.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Builds `section` on the calling thread using the coordinator's dedicated
    /// scratch buffers. The upload still goes through the upload queue.
    pub fn rebuild(&self, section: &Arc<BuiltSection>, source: &dyn RegionSource) {
        let task = section.create_rebuild_task(source);
        let buffers = self
            .shared
            .inline_buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_else(|| {
                let (vertices, indices) = self.shared.scratch_capacity;
                debug!("Dedicated scratch buffers busy, allocating temporary ones");
                SectionBuffers::new(INLINE_BUFFERS_ID - 1, vertices, indices)
            });

        task.handle().set_state(TaskState::Running);
        let route = self.shared.inline_route(task.target().clone());
        task.run(buffers, &self.shared.ctx, route);
    }

    /// Moves the point pending tasks are ordered by. Takes effect at the next
    /// dispatch.
    pub fn set_camera_position(&self, position: Point3<f64>) {
        self.shared.ctx.camera.replace(position);
    }

    pub fn camera_position(&self) -> Point3<f64> {
        self.shared.ctx.camera_position()
    }

    /// Cancels every queued and running task without waiting for them.
    pub fn cancel_all_tasks(&self) {
        self.shared.cancel_all_tasks();
    }

    /// Permanently stops scheduling, cancels everything and drains the upload
    /// queue. Later calls do nothing.
    pub fn stop(&self) {
        if self.shared.ctx.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Stopping section coordinator");
        self.shared.cancel_all_tasks();
        self.shared.upload();
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.ctx.is_stopped()
    }

    /// Runs queued GPU uploads, then queued disposals. Call once per frame from
    /// the render thread. Returns the number of uploads run.
    pub fn upload(&self) -> usize {
        self.shared.upload()
    }

    /// Queues render data to be closed on the next `upload`.
    pub fn dispose(&self, render_data: Arc<RenderData>) {
        self.shared.ctx.uploads.dispose(render_data);
    }

    /// True when no task is waiting to be dispatched and nothing is waiting to
    /// be uploaded or disposed.
    pub fn is_empty(&self) -> bool {
        self.scheduled_task_count() == 0 && self.shared.ctx.uploads.is_empty()
    }

    /// Blocks until every message posted to the coordinator before this call
    /// has been handled.
    pub fn flush(&self) -> bool {
        self.shared.mailbox.flush()
    }

    pub fn scheduled_task_count(&self) -> usize {
        self.shared.pending_tasks.load(Ordering::SeqCst)
    }

    pub fn pending_upload_count(&self) -> usize {
        self.shared.ctx.uploads.len()
    }

    pub fn free_buffer_count(&self) -> usize {
        self.shared.free_buffers.load(Ordering::SeqCst)
    }

    pub fn in_flight_count(&self) -> usize {
        self.shared.running_tasks.load(Ordering::SeqCst)
    }

    /// One-line status: pending tasks, pending uploads, available buffers.
    pub fn debug_string(&self) -> String {
        format!(
            "pC: {:03}, pU: {:02}, aB: {:02}",
            self.scheduled_task_count(),
            self.pending_upload_count(),
            self.free_buffer_count()
        )
    }
}

impl Drop for SectionCoordinator {
    fn drop(&mut self) {
        self.stop();
        self.shared.workers.shutdown();
        self.shared.upload();
        self.shared.mailbox.shutdown();
        debug!("Section coordinator shut down");
    }
}
