//! # Section Tasks
//!
//! The two kinds of work the coordinator schedules against a section:
//!
//! - `RebuildTask`: builds the section's geometry from a captured region and
//!   uploads it as fresh `RenderData`.
//! - `SortTask`: re-orders the translucent layer of the section's current
//!   `RenderData` for a new camera position and uploads only the index buffer.
//!
//! ## Task Lifecycle
//! 1. A `BuiltSection` creates the task, recording its handle as the section's
//!    active task of that kind (cancelling the previous one)
//! 2. The task is sent to the coordinator and queued (`Pending`)
//! 3. The coordinator hands it a scratch buffer set and a worker (`Running`)
//! 4. The worker part ends by either finishing early or queueing an upload
//! 5. The outcome is routed back to the coordinator, which recycles the
//!    scratch buffers and marks the task `Finished`
//!
//! Cancellation is cooperative: the flag can be set from any thread at any
//! time and is checked at every step that would publish something.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use num_derive::FromPrimitive;

use crate::buffer_state::SectionBuffers;
use crate::error::TaskError;
use crate::section::{BuiltSection, RenderData};
use crate::voxels::region::SectionRegion;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Rebuild,
    Sort,
}

impl TaskKind {
    /// Name used in logs and thread work labels.
    pub fn name(self) -> &'static str {
        match self {
            TaskKind::Rebuild => "section_rebuild",
            TaskKind::Sort => "section_sort",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
pub enum TaskState {
    Pending,
    Running,
    Successful,
    Cancelled,
    Failed,
}

impl TaskState {
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            TaskState::Successful | TaskState::Cancelled | TaskState::Failed
        )
    }
}

/// How a task ended when it did not fail.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TaskResult {
    Successful,
    Cancelled,
}

pub type TaskOutcome = Result<TaskResult, TaskError>;

/// Hands a task's scratch buffers and outcome back to whoever dispatched it.
/// Called exactly once per run.
pub type CompletionRoute = Box<dyn FnOnce(SectionBuffers, TaskOutcome) + Send>;

/// Shared identity and status of one task.
#[derive(Debug)]
pub struct TaskHandle {
    id: u64,
    kind: TaskKind,
    prioritized: bool,
    cancelled: AtomicBool,
    state: AtomicU8,
}

impl TaskHandle {
    pub fn new(kind: TaskKind, prioritized: bool) -> Self {
        Self {
            id: NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            prioritized,
            cancelled: AtomicBool::new(false),
            state: AtomicU8::new(TaskState::Pending as u8),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn is_prioritized(&self) -> bool {
        self.prioritized
    }

    /// Sets the cancellation flag. Returns true only for the call that set it.
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> TaskState {
        num_traits::FromPrimitive::from_u8(self.state.load(Ordering::SeqCst))
            .unwrap_or(TaskState::Pending)
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_finished()
    }

    pub(crate) fn set_state(&self, state: TaskState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}

/// A task handle together with the section it works on.
#[derive(Clone)]
pub struct TaskTarget {
    pub handle: Arc<TaskHandle>,
    pub section: Arc<BuiltSection>,
}

impl TaskTarget {
    pub fn new(handle: Arc<TaskHandle>, section: Arc<BuiltSection>) -> Self {
        Self { handle, section }
    }

    /// Cancels the task. The first cancellation of a rebuild flags the section
    /// for another one.
    pub fn cancel(&self) {
        if self.handle.cancel() && self.handle.kind() == TaskKind::Rebuild {
            self.section.schedule_rebuild(false);
        }
    }
}

impl std::fmt::Debug for TaskTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskTarget")
            .field("task", &self.handle.name())
            .field("id", &self.handle.id())
            .field("section", &self.section.key())
            .finish()
    }
}

/// Full geometry build of a section from a region snapshot.
pub struct RebuildTask {
    pub(crate) target: TaskTarget,
    pub(crate) region: SectionRegion,
}

impl RebuildTask {
    pub fn new(target: TaskTarget, region: SectionRegion) -> Self {
        Self { target, region }
    }
}

/// Re-sort of the translucent layer of existing render data.
pub struct SortTask {
    pub(crate) target: TaskTarget,
    pub(crate) render_data: Arc<RenderData>,
}

impl SortTask {
    pub fn new(target: TaskTarget, render_data: Arc<RenderData>) -> Self {
        Self {
            target,
            render_data,
        }
    }
}

pub enum SectionTask {
    Rebuild(RebuildTask),
    Sort(SortTask),
}

impl SectionTask {
    pub fn target(&self) -> &TaskTarget {
        match self {
            SectionTask::Rebuild(task) => &task.target,
            SectionTask::Sort(task) => &task.target,
        }
    }

    pub fn handle(&self) -> &Arc<TaskHandle> {
        &self.target().handle
    }

    pub fn cancel(&self) {
        self.target().cancel();
    }

    /// Cancels a task that will never be dispatched and marks it finished.
    pub(crate) fn cancel_and_finish(self) {
        self.cancel();
        self.handle().set_state(TaskState::Cancelled);
    }
}

impl std::fmt::Debug for SectionTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.target().fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::SectionKey;

    #[test]
    fn cancel_reports_first_call_only() {
        let handle = TaskHandle::new(TaskKind::Sort, true);

        assert!(handle.cancel());
        assert!(!handle.cancel());
        assert!(handle.is_cancelled());
        assert_eq!(handle.state(), TaskState::Pending);
    }

    #[test]
    fn cancelling_a_rebuild_flags_the_section_once() {
        let section = Arc::new(BuiltSection::new(0, SectionKey::new(0, 0, 0)));
        section.cancel_rebuild();
        let target = TaskTarget::new(Arc::new(TaskHandle::new(TaskKind::Rebuild, false)), section.clone());

        target.cancel();
        assert!(section.needs_rebuild());

        section.cancel_rebuild();
        target.cancel();
        assert!(!section.needs_rebuild());
    }

    #[test]
    fn cancelling_a_sort_leaves_the_section_alone() {
        let section = Arc::new(BuiltSection::new(0, SectionKey::new(0, 0, 0)));
        section.cancel_rebuild();
        let target = TaskTarget::new(Arc::new(TaskHandle::new(TaskKind::Sort, true)), section.clone());

        target.cancel();

        assert!(target.handle.is_cancelled());
        assert!(!section.needs_rebuild());
    }

    #[test]
    fn undispatched_task_finishes_cancelled() {
        let key = SectionKey::new(0, 0, 0);
        let section = Arc::new(BuiltSection::new(0, key));
        section.cancel_rebuild();
        let handle = Arc::new(TaskHandle::new(TaskKind::Rebuild, false));
        let task = SectionTask::Rebuild(RebuildTask::new(
            TaskTarget::new(handle.clone(), section.clone()),
            SectionRegion::empty(key),
        ));

        task.cancel_and_finish();

        assert!(handle.is_cancelled());
        assert_eq!(handle.state(), TaskState::Cancelled);
        assert!(section.needs_rebuild());
    }

    #[test]
    fn state_round_trips_through_the_atomic() {
        let handle = TaskHandle::new(TaskKind::Rebuild, false);
        handle.set_state(TaskState::Running);
        assert!(!handle.is_finished());

        handle.set_state(TaskState::Failed);
        assert_eq!(handle.state(), TaskState::Failed);
        assert!(handle.is_finished());
    }
}
