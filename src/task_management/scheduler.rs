//! Pending-task queue ordered by distance to the camera.
//!
//! Distances change every time the camera moves, so nothing is kept sorted:
//! each dequeue scans the queue against the current camera position. Ties go
//! to the lowest packed section key, then to the task queued first.

use cgmath::Point3;

use super::task::SectionTask;

#[derive(Default)]
pub struct SectionTaskScheduler {
    queue: Vec<(u64, SectionTask)>,
    next_sequence: u64,
}

impl SectionTaskScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, task: SectionTask) {
        self.queue.push((self.next_sequence, task));
        self.next_sequence += 1;
    }

    /// Removes and returns the task whose section centre is nearest `camera`.
    pub fn dequeue_nearest(&mut self, camera: Point3<f64>) -> Option<SectionTask> {
        let nearest = self
            .queue
            .iter()
            .enumerate()
            .min_by(|(_, (seq_a, a)), (_, (seq_b, b))| {
                let key_a = a.target().section.key();
                let key_b = b.target().section.key();
                key_a
                    .distance_squared_to(camera)
                    .total_cmp(&key_b.distance_squared_to(camera))
                    .then(key_a.packed().cmp(&key_b.packed()))
                    .then(seq_a.cmp(seq_b))
            })
            .map(|(index, _)| index)?;

        Some(self.queue.swap_remove(nearest).1)
    }

    /// Cancels every queued task, marks it finished and drops it. Returns how
    /// many there were.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.queue.len();
        for (_, task) in self.queue.drain(..) {
            task.cancel_and_finish();
        }
        count
    }

    pub fn size(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
