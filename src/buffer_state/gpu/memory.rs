//! In-memory `GpuDevice` used by tests and headless runs.
//!
//! Buffers are plain byte vectors. The device keeps analytics much like a real
//! buffer registry would (creations, writes, closes, live bytes) and counts any
//! attempt to close or write a buffer it does not know, which is how tests catch
//! a double dispose.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use log::{error, trace};

use super::{BufferUsage, GpuBufferHandle, GpuDevice};
use crate::core::MtResource;
use crate::error::GpuError;

#[derive(Debug)]
struct MemoryBuffer {
    label: String,
    data: Vec<u8>,
}

#[derive(Default)]
pub struct MemoryDevice {
    buffers: MtResource<HashMap<u64, MemoryBuffer>>,
    next_id: AtomicU64,
    created: AtomicU64,
    closed: AtomicU64,
    writes: AtomicU64,
    invalid_closes: AtomicU64,
    fail_next_create: AtomicBool,
}

impl MemoryDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `create_buffer` call fail, for exercising error paths.
    pub fn fail_next_create(&self) {
        self.fail_next_create.store(true, Ordering::SeqCst);
    }

    pub fn created_count(&self) -> u64 {
        self.created.load(Ordering::SeqCst)
    }

    pub fn closed_count(&self) -> u64 {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Closes of unknown (already closed) buffers.
    pub fn invalid_close_count(&self) -> u64 {
        self.invalid_closes.load(Ordering::SeqCst)
    }

    pub fn live_buffer_count(&self) -> usize {
        self.buffers.get().len()
    }

    pub fn live_bytes(&self) -> u64 {
        self.buffers
            .get()
            .values()
            .fold(0, |acc, buffer| acc + buffer.data.len() as u64)
    }

    /// Copy of a live buffer's contents.
    pub fn contents(&self, buffer: &GpuBufferHandle) -> Option<Vec<u8>> {
        self.buffers.get().get(&buffer.id()).map(|b| b.data.clone())
    }

    pub fn label(&self, buffer: &GpuBufferHandle) -> Option<String> {
        self.buffers.get().get(&buffer.id()).map(|b| b.label.clone())
    }
}

impl GpuDevice for MemoryDevice {
    fn create_buffer(
        &self,
        label: &str,
        usage: BufferUsage,
        contents: &[u8],
    ) -> Result<GpuBufferHandle, GpuError> {
        if self.fail_next_create.swap(false, Ordering::SeqCst) {
            return Err(GpuError::CreateFailed {
                label: label.to_string(),
                reason: "injected failure".to_string(),
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.buffers.get_mut().insert(
            id,
            MemoryBuffer {
                label: label.to_string(),
                data: contents.to_vec(),
            },
        );
        self.created.fetch_add(1, Ordering::SeqCst);
        trace!("Created buffer #{} '{}' ({} bytes)", id, label, contents.len());

        Ok(GpuBufferHandle::new(id, contents.len() as u64, usage))
    }

    fn write_buffer(&self, buffer: &GpuBufferHandle, data: &[u8]) -> Result<(), GpuError> {
        let mut buffers = self.buffers.get_mut();
        let target = buffers
            .get_mut(&buffer.id())
            .ok_or(GpuError::UnknownBuffer(buffer.id()))?;

        if data.len() as u64 > buffer.size() {
            return Err(GpuError::WriteOutOfBounds {
                id: buffer.id(),
                len: data.len() as u64,
                size: buffer.size(),
            });
        }

        target.data[..data.len()].copy_from_slice(data);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close_buffer(&self, buffer: GpuBufferHandle) {
        if self.buffers.get_mut().remove(&buffer.id()).is_some() {
            self.closed.fetch_add(1, Ordering::SeqCst);
        } else {
            self.invalid_closes.fetch_add(1, Ordering::SeqCst);
            error!("Closed unknown buffer {:?}", buffer);
        }
    }
}
