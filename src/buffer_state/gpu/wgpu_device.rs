//! # wgpu Device
//!
//! `GpuDevice` backed by a real `wgpu::Device`/`wgpu::Queue` pair.
//!
//! ## Architecture
//!
//! The device acts as a registry of live section buffers keyed by handle id,
//! along with per-buffer analytics (allocated bytes, bytes written, write count)
//! so the memory held by section meshes can be inspected at runtime.
//!
//! Buffers are created with `create_buffer_init` and `COPY_DST` usage so later
//! uploads can overwrite them in place with `queue.write_buffer`. Closing a
//! handle destroys the GPU buffer immediately rather than waiting for the last
//! reference to drop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{info, trace};
use wgpu::util::DeviceExt;

use super::{BufferUsage, GpuBufferHandle, GpuDevice};
use crate::core::MtResource;
use crate::error::GpuError;

/// Analytics data for a GPU buffer
#[derive(Debug)]
struct BufferAnalytics {
    /// Total memory allocated for the buffer in bytes
    allocated_memory: u64,
    /// Highest byte written so far
    used_memory: u64,
    /// Number of times the buffer has been written to
    times_written: u64,
}

pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    buffers: MtResource<HashMap<u64, (wgpu::Buffer, BufferAnalytics)>>,
    next_id: AtomicU64,
}

impl WgpuDevice {
    /// Wraps an existing device and queue.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            buffers: MtResource::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Requests an adapter and device without a surface, blocking on the
    /// async wgpu calls with `pollster`.
    ///
    /// # Errors
    /// Returns [`GpuError::AdapterUnavailable`] or [`GpuError::DeviceUnavailable`]
    /// when no usable GPU is present.
    pub fn new_headless() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags: wgpu::InstanceFlags::empty(),
            backend_options: wgpu::BackendOptions::from_env_or_default(),
        });

        pollster::block_on(async {
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::default(),
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await
                .map_err(|e| GpuError::AdapterUnavailable(e.to_string()))?;

            info!("Using adapter {:?}", adapter.get_info().name);

            let (device, queue) = adapter
                .request_device(&wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults(),
                    label: Some("section pipeline device"),
                    memory_hints: wgpu::MemoryHints::MemoryUsage,
                    trace: wgpu::Trace::Off,
                })
                .await
                .map_err(|e| GpuError::DeviceUnavailable(e.to_string()))?;

            Ok(Self::new(device, queue))
        })
    }

    /// Total memory allocated across live section buffers.
    pub fn total_allocated_memory(&self) -> u64 {
        self.buffers
            .get()
            .values()
            .fold(0, |acc, (_, analytics)| acc + analytics.allocated_memory)
    }

    /// Total memory written across live section buffers.
    pub fn total_used_memory(&self) -> u64 {
        self.buffers
            .get()
            .values()
            .fold(0, |acc, (_, analytics)| acc + analytics.used_memory)
    }

    pub fn total_writes(&self) -> u64 {
        self.buffers
            .get()
            .values()
            .fold(0, |acc, (_, analytics)| acc + analytics.times_written)
    }

    pub fn live_buffer_count(&self) -> usize {
        self.buffers.get().len()
    }
}

impl GpuDevice for WgpuDevice {
    fn create_buffer(
        &self,
        label: &str,
        usage: BufferUsage,
        contents: &[u8],
    ) -> Result<GpuBufferHandle, GpuError> {
        let usages = match usage {
            BufferUsage::Vertex => wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            BufferUsage::Index => wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
        };

        if contents.len() as u64 % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            return Err(GpuError::CreateFailed {
                label: label.to_string(),
                reason: format!(
                    "{} bytes is not a multiple of {}",
                    contents.len(),
                    wgpu::COPY_BUFFER_ALIGNMENT
                ),
            });
        }

        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: usages,
            });

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let analytics = BufferAnalytics {
            allocated_memory: contents.len() as u64,
            used_memory: contents.len() as u64,
            times_written: 1,
        };
        self.buffers.get_mut().insert(id, (buffer, analytics));
        trace!("Created wgpu buffer #{} '{}'", id, label);

        Ok(GpuBufferHandle::new(id, contents.len() as u64, usage))
    }

    fn write_buffer(&self, buffer: &GpuBufferHandle, data: &[u8]) -> Result<(), GpuError> {
        let mut buffers = self.buffers.get_mut();
        let (target, analytics) = buffers
            .get_mut(&buffer.id())
            .ok_or(GpuError::UnknownBuffer(buffer.id()))?;

        let data_size = data.len() as u64;
        if data_size > analytics.allocated_memory {
            return Err(GpuError::WriteOutOfBounds {
                id: buffer.id(),
                len: data_size,
                size: analytics.allocated_memory,
            });
        }

        self.queue.write_buffer(target, 0, data);
        analytics.used_memory = analytics.used_memory.max(data_size);
        analytics.times_written += 1;
        Ok(())
    }

    fn close_buffer(&self, buffer: GpuBufferHandle) {
        if let Some((target, _)) = self.buffers.get_mut().remove(&buffer.id()) {
            target.destroy();
        }
    }
}
