//! # Built Sections
//!
//! A `BuiltSection` is the long-lived record for one slot of the render grid.
//! It holds what the section currently renders, the section's active rebuild
//! and sort tasks, and its rebuild flags. Slots are reused as the viewer moves:
//! `set_section_key` clears the slot and points it at another section.
//!
//! ## Invariants
//! - At most one rebuild task and one sort task are active per section.
//!   Creating a new task cancels the previous one first.
//! - The current render state is only ever replaced with `swap`, and every
//!   `RenderData` swapped out is queued for disposal exactly once.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use cgmath::Point3;

use super::{Aabb, RenderData, SectionKey, SectionRenderState};
use crate::buffer_state::UploadQueue;
use crate::core::{MtResource, SwapCell};
use crate::task_management::{
    RebuildTask, SectionCoordinator, SectionTask, SortTask, TaskHandle, TaskKind, TaskTarget,
};
use crate::voxels::region::RegionSource;

#[derive(Debug)]
struct SectionState {
    rebuild_task: Option<Arc<TaskHandle>>,
    sort_task: Option<Arc<TaskHandle>>,
    needs_rebuild: bool,
    needs_important_rebuild: bool,
}

impl SectionState {
    fn new() -> Self {
        Self {
            rebuild_task: None,
            sort_task: None,
            needs_rebuild: true,
            needs_important_rebuild: false,
        }
    }

    fn schedule_rebuild(&mut self, important: bool) {
        let was_important = self.needs_rebuild && self.needs_important_rebuild;
        self.needs_rebuild = true;
        self.needs_important_rebuild = important || was_important;
    }

    fn cancel_tasks(&mut self) {
        if let Some(rebuild) = self.rebuild_task.take() {
            if rebuild.cancel() {
                self.schedule_rebuild(false);
            }
        }
        if let Some(sort) = self.sort_task.take() {
            sort.cancel();
        }
    }
}

pub struct BuiltSection {
    index: usize,
    key: AtomicI64,
    current: SwapCell<SectionRenderState>,
    state: MtResource<SectionState>,
}

impl BuiltSection {
    /// A section slot that renders nothing yet and needs a rebuild.
    pub fn new(index: usize, key: SectionKey) -> Self {
        Self {
            index,
            key: AtomicI64::new(key.packed()),
            current: SwapCell::new(SectionRenderState::Hidden),
            state: MtResource::new(SectionState::new()),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn key(&self) -> SectionKey {
        SectionKey::from_packed(self.key.load(Ordering::SeqCst))
    }

    pub fn origin(&self) -> Point3<i32> {
        self.key().origin()
    }

    pub fn bounding_box(&self) -> Aabb {
        self.key().bounding_box()
    }

    /// What the section renders right now.
    pub fn render_state(&self) -> Arc<SectionRenderState> {
        self.current.load()
    }

    pub fn current_render_data(&self) -> Option<Arc<RenderData>> {
        self.current.load().render_data().cloned()
    }

    /// Flags the section for a rebuild. An important rebuild stays important
    /// until the flag is cleared.
    pub fn schedule_rebuild(&self, important: bool) {
        self.state.get_mut().schedule_rebuild(important);
    }

    /// Clears both rebuild flags. A task that is already running is left alone.
    pub fn cancel_rebuild(&self) {
        let mut state = self.state.get_mut();
        state.needs_rebuild = false;
        state.needs_important_rebuild = false;
    }

    pub fn needs_rebuild(&self) -> bool {
        self.state.get().needs_rebuild
    }

    pub fn needs_important_rebuild(&self) -> bool {
        let state = self.state.get();
        state.needs_rebuild && state.needs_important_rebuild
    }

    pub fn has_translucent_layer(&self) -> bool {
        self.current.load().has_translucent_layer()
    }

    /// True while a sort task for this section has not finished.
    pub fn is_currently_sorting(&self) -> bool {
        self.state
            .get()
            .sort_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Cancels the active rebuild and sort tasks, if any.
    pub fn cancel_tasks(&self) {
        self.state.get_mut().cancel_tasks();
    }

    /// Cancels the section's tasks, captures its blocks from `source` and
    /// returns a rebuild task for them. The task is prioritized when the
    /// section already shows something.
    ///
    /// Cancelling a previous rebuild flags the section again, so callers clear
    /// the flag with [`BuiltSection::cancel_rebuild`] after submitting.
    pub fn create_rebuild_task(self: &Arc<Self>, source: &dyn RegionSource) -> SectionTask {
        let mut state = self.state.get_mut();
        state.cancel_tasks();

        let region = source.capture(self.key());
        let prioritized = !self.current.load().is_hidden();
        let handle = Arc::new(TaskHandle::new(TaskKind::Rebuild, prioritized));
        state.rebuild_task = Some(Arc::clone(&handle));

        SectionTask::Rebuild(RebuildTask::new(
            TaskTarget::new(handle, Arc::clone(self)),
            region,
        ))
    }

    /// Sends a sort task for the current render data. Returns false, without
    /// sending anything, when the section has no render data.
    pub fn schedule_sort(self: &Arc<Self>, coordinator: &SectionCoordinator) -> bool {
        let Some(render_data) = self.current_render_data() else {
            return false;
        };

        let handle = Arc::new(TaskHandle::new(TaskKind::Sort, true));
        {
            let mut state = self.state.get_mut();
            if let Some(previous) = state.sort_task.replace(Arc::clone(&handle)) {
                previous.cancel();
            }
        }

        coordinator.send(SectionTask::Sort(SortTask::new(
            TaskTarget::new(handle, Arc::clone(self)),
            render_data,
        )));
        true
    }

    /// Swaps in render data built by the rebuild task `handle`, unless that
    /// task was cancelled or is no longer the section's active rebuild. Holds
    /// the state lock across the check and the swap, so a concurrent `clear`
    /// either hides the new data or stops it from being installed.
    ///
    /// Returns false without touching `render_data` when it was not installed.
    pub(crate) fn publish_rebuild(
        &self,
        handle: &Arc<TaskHandle>,
        render_data: Arc<RenderData>,
        uploads: &UploadQueue,
    ) -> bool {
        let state = self.state.get_mut();
        let is_active = state
            .rebuild_task
            .as_ref()
            .is_some_and(|active| Arc::ptr_eq(active, handle));
        if handle.is_cancelled() || !is_active {
            return false;
        }

        self.set_render_state(SectionRenderState::Built(render_data), uploads);
        true
    }

    /// Installs a new render state, queueing the render data it replaces for
    /// disposal.
    pub(crate) fn set_render_state(&self, render_state: SectionRenderState, uploads: &UploadQueue) {
        let previous = self.current.swap(render_state);
        if let Some(render_data) = previous.render_data() {
            uploads.dispose(Arc::clone(render_data));
        }
    }

    /// Cancels the section's tasks, hides it, queues its render data for
    /// disposal and flags it for a rebuild.
    pub fn clear(&self, coordinator: &SectionCoordinator) {
        let mut state = self.state.get_mut();
        state.cancel_tasks();

        let previous = self.current.swap(SectionRenderState::Hidden);
        if let Some(render_data) = previous.render_data() {
            coordinator.dispose(Arc::clone(render_data));
        }

        state.needs_rebuild = true;
    }

    /// Points the slot at another section. Does nothing if the key is unchanged.
    pub fn set_section_key(&self, key: SectionKey, coordinator: &SectionCoordinator) {
        if self.key() == key {
            return;
        }

        self.clear(coordinator);
        *self.state.get_mut() = SectionState::new();
        self.key.store(key.packed(), Ordering::SeqCst);
    }
}

impl std::fmt::Debug for BuiltSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltSection")
            .field("index", &self.index)
            .field("key", &self.key())
            .field("state", &*self.state.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meshing::occlusion::OcclusionTable;
    use crate::section::RelativeSortPos;
    use crate::voxels::region::SectionRegion;

    fn empty_region(key: SectionKey) -> SectionRegion {
        SectionRegion::empty(key)
    }

    #[test]
    fn new_section_needs_a_plain_rebuild() {
        let section = BuiltSection::new(3, SectionKey::new(1, 2, 3));

        assert!(section.needs_rebuild());
        assert!(!section.needs_important_rebuild());
        assert!(section.render_state().is_hidden());
        assert_eq!(section.origin(), Point3::new(16, 32, 48));
    }

    #[test]
    fn importance_sticks_until_cleared() {
        let section = BuiltSection::new(0, SectionKey::new(0, 0, 0));
        section.schedule_rebuild(true);
        section.schedule_rebuild(false);
        assert!(section.needs_important_rebuild());

        section.cancel_rebuild();
        assert!(!section.needs_rebuild());
        section.schedule_rebuild(false);
        assert!(!section.needs_important_rebuild());
    }

    #[test]
    fn new_rebuild_task_cancels_the_previous_one() {
        let section = Arc::new(BuiltSection::new(0, SectionKey::new(0, 0, 0)));

        let first = section.create_rebuild_task(&empty_region);
        section.cancel_rebuild();
        let second = section.create_rebuild_task(&empty_region);

        assert!(first.handle().is_cancelled());
        assert!(!second.handle().is_cancelled());
        assert!(section.needs_rebuild());
    }

    #[test]
    fn rebuild_priority_follows_visibility() {
        let section = Arc::new(BuiltSection::new(0, SectionKey::new(0, 0, 0)));
        assert!(!section.create_rebuild_task(&empty_region).handle().is_prioritized());

        let uploads = UploadQueue::new();
        section.set_render_state(SectionRenderState::Ready, &uploads);
        assert!(section.create_rebuild_task(&empty_region).handle().is_prioritized());
    }

    fn render_data() -> Arc<RenderData> {
        Arc::new(RenderData::new(
            RelativeSortPos::new(0, 0, 0),
            OcclusionTable::all_visible(),
            None,
        ))
    }

    #[test]
    fn only_the_active_rebuild_publishes() {
        let section = Arc::new(BuiltSection::new(0, SectionKey::new(0, 0, 0)));
        let uploads = UploadQueue::new();

        let first = section.create_rebuild_task(&empty_region);
        let second = section.create_rebuild_task(&empty_region);
        assert!(!section.publish_rebuild(first.handle(), render_data(), &uploads));
        assert!(section.render_state().is_hidden());

        assert!(section.publish_rebuild(second.handle(), render_data(), &uploads));
        assert!(section.current_render_data().is_some());
    }

    #[test]
    fn cleared_section_refuses_the_pending_rebuild() {
        let section = Arc::new(BuiltSection::new(0, SectionKey::new(0, 0, 0)));
        let uploads = UploadQueue::new();
        let task = section.create_rebuild_task(&empty_region);

        section.cancel_tasks();

        assert!(!section.publish_rebuild(task.handle(), render_data(), &uploads));
        assert!(section.render_state().is_hidden());
        assert_eq!(uploads.pending_disposals(), 0);
    }

    #[test]
    fn replaced_render_data_is_queued_for_disposal() {
        let section = BuiltSection::new(0, SectionKey::new(0, 0, 0));
        let uploads = UploadQueue::new();
        let data = Arc::new(RenderData::new(
            RelativeSortPos::new(0, 0, 0),
            OcclusionTable::all_visible(),
            None,
        ));

        section.set_render_state(SectionRenderState::Built(data.clone()), &uploads);
        assert_eq!(uploads.pending_disposals(), 0);
        assert!(Arc::ptr_eq(&section.current_render_data().unwrap(), &data));

        section.set_render_state(SectionRenderState::Ready, &uploads);
        assert_eq!(uploads.pending_disposals(), 1);
        assert!(section.current_render_data().is_none());
    }
}
