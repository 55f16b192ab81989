//! # GPU Device Seam
//!
//! The pipeline only ever needs three things from a graphics API: create a
//! buffer from bytes, overwrite a buffer's contents, and release a buffer. The
//! `GpuDevice` trait captures exactly that, so the same upload code drives a
//! real `wgpu` device in the demo and an in-memory device in tests.
//!
//! Buffers are referred to by `GpuBufferHandle`, a plain id plus size. Handles
//! are deliberately not `Clone`: `close_buffer` consumes the handle, so the
//! type system enforces that every buffer is released at most once.

use std::fmt;

use crate::error::GpuError;

pub mod memory;
pub mod wgpu_device;

pub use memory::MemoryDevice;
pub use wgpu_device::WgpuDevice;

/// What a buffer will be bound as.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    Vertex,
    Index,
}

/// Owning reference to a buffer created by a [`GpuDevice`].
#[derive(PartialEq, Eq)]
pub struct GpuBufferHandle {
    id: u64,
    size: u64,
    usage: BufferUsage,
}

impl GpuBufferHandle {
    /// Devices mint handles; nothing else should.
    pub fn new(id: u64, size: u64, usage: BufferUsage) -> Self {
        Self { id, size, usage }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Capacity of the buffer in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }
}

impl fmt::Debug for GpuBufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GpuBuffer#{}({:?}, {} bytes)", self.id, self.usage, self.size)
    }
}

/// Buffer primitives the upload step relies on.
///
/// Implementations are called only from the render thread while the upload
/// queue is drained, but are shared with the coordinator and so must be
/// `Send + Sync`.
pub trait GpuDevice: Send + Sync {
    /// Creates a buffer holding exactly `contents`.
    fn create_buffer(
        &self,
        label: &str,
        usage: BufferUsage,
        contents: &[u8],
    ) -> Result<GpuBufferHandle, GpuError>;

    /// Writes `data` to the start of an existing buffer.
    fn write_buffer(&self, buffer: &GpuBufferHandle, data: &[u8]) -> Result<(), GpuError>;

    /// Releases a buffer.
    fn close_buffer(&self, buffer: GpuBufferHandle);
}

/// Debug label in the form the GPU tooling shows for section buffers.
pub fn buffer_label(kind: &str, layer: &str, section: crate::section::SectionKey) -> String {
    format!(
        "Section {} buffer - layer: {}; cords: {}, {}, {}",
        kind,
        layer,
        section.x(),
        section.y(),
        section.z()
    )
}
