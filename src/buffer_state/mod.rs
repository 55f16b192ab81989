//! # Buffer State Module
//!
//! Everything between a finished geometry build and the GPU: the bounded pool
//! of scratch buffers tasks build into, the device seam, and the upload queue
//! the render thread drains once per frame.
//!
//! ## Upload Queue
//!
//! Worker threads never touch the device. A task that wants to write geometry
//! pushes an `UploadCommand` whose action runs later on the render thread, and
//! render data that is no longer needed is pushed onto a separate disposal
//! queue. `drain` runs all pending uploads first and then closes all pending
//! disposals, each in the order they were queued.

use std::fmt::Debug;
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::trace;

use crate::section::{RenderData, SectionKey};

pub mod buffer_pool;
pub mod gpu;
pub mod section_buffers;

pub use buffer_pool::BufferPool;
pub use gpu::{BufferUsage, GpuBufferHandle, GpuDevice, MemoryDevice, WgpuDevice};
pub use section_buffers::{LayerBuilder, SectionBuffers};

/// Deferred GPU work for one section.
pub struct UploadCommand {
    /// Descriptive name for the command (for debugging)
    pub name: &'static str,
    /// Section the upload belongs to
    pub section: SectionKey,
    /// Runs on the render thread with the device
    pub action: Box<dyn FnOnce(&dyn GpuDevice) + Send>,
}

impl UploadCommand {
    pub fn new(
        name: &'static str,
        section: SectionKey,
        action: impl FnOnce(&dyn GpuDevice) + Send + 'static,
    ) -> Self {
        Self {
            name,
            section,
            action: Box::new(action),
        }
    }
}

impl Debug for UploadCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadCommand")
            .field("name", &self.name)
            .field("section", &self.section)
            .finish()
    }
}

/// Multi-producer, render-thread-consumed queue of uploads and disposals.
pub struct UploadQueue {
    uploads: (Sender<UploadCommand>, Receiver<UploadCommand>),
    disposals: (Sender<Arc<RenderData>>, Receiver<Arc<RenderData>>),
}

impl UploadQueue {
    pub fn new() -> Self {
        Self {
            uploads: unbounded(),
            disposals: unbounded(),
        }
    }

    pub fn push(&self, command: UploadCommand) {
        // Both ends live in `self`, so the channel cannot be disconnected.
        let _ = self.uploads.0.send(command);
    }

    /// Queues render data to be closed on the next drain.
    pub fn dispose(&self, data: Arc<RenderData>) {
        let _ = self.disposals.0.send(data);
    }

    /// Pending uploads, not counting disposals.
    pub fn len(&self) -> usize {
        self.uploads.1.len()
    }

    pub fn pending_disposals(&self) -> usize {
        self.disposals.1.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uploads.1.is_empty() && self.disposals.1.is_empty()
    }

    /// Runs every queued upload, then closes every queued disposal. Work queued
    /// by the uploads themselves is picked up in the same drain. Returns the
    /// number of uploads run.
    pub fn drain(&self, device: &dyn GpuDevice) -> usize {
        let mut uploaded = 0;
        while let Ok(command) = self.uploads.1.try_recv() {
            trace!("Uploading {} for section {}", command.name, command.section);
            (command.action)(device);
            uploaded += 1;
        }

        while let Ok(data) = self.disposals.1.try_recv() {
            data.close(device);
        }

        uploaded
    }
}

impl Default for UploadQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::meshing::occlusion::OcclusionTable;
    use crate::section::{RelativeSortPos, RenderLayer};

    #[test]
    fn drain_runs_uploads_in_order_then_disposals() {
        let queue = UploadQueue::new();
        let device = MemoryDevice::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let key = SectionKey::new(0, 0, 0);

        let data = Arc::new(RenderData::new(
            RelativeSortPos::new(0, 0, 0),
            OcclusionTable::all_visible(),
            None,
        ));
        data.upload_layer(&device, key, RenderLayer::Solid, &[0; 24], None, 6)
            .unwrap();
        queue.dispose(data.clone());

        for n in 0..3 {
            let order = order.clone();
            queue.push(UploadCommand::new("test", key, move |_| {
                order.lock().unwrap().push(n)
            }));
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pending_disposals(), 1);

        assert_eq!(queue.drain(&device), 3);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        assert!(data.is_disposed());
        assert!(queue.is_empty());
        assert_eq!(device.live_buffer_count(), 0);
    }

    #[test]
    fn uploads_can_queue_disposals_for_the_same_drain() {
        let queue = Arc::new(UploadQueue::new());
        let device = MemoryDevice::new();
        let data = Arc::new(RenderData::new(
            RelativeSortPos::new(0, 0, 0),
            OcclusionTable::all_visible(),
            None,
        ));

        let inner = queue.clone();
        let disposed = data.clone();
        queue.push(UploadCommand::new("dispose", SectionKey::new(0, 0, 0), move |_| {
            inner.dispose(disposed)
        }));

        queue.drain(&device);
        assert!(data.is_disposed());
        assert!(queue.is_empty());
    }
}
