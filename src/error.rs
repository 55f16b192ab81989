//! Error types for the section pipeline.
//!
//! Cancellation and pool backpressure are not errors and never show up here.
//! `TaskError` is what a failed task hands to its continuation, which reports it
//! to the diagnostics sink; `PipelineError` covers setup failures.

use std::path::PathBuf;

use thiserror::Error;

use crate::section::SectionKey;

/// Failure inside the CPU side of a task.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("geometry build failed for section {section}: {reason}")]
    Geometry { section: SectionKey, reason: String },

    #[error("worker panicked while running {task}: {message}")]
    WorkerPanicked { task: &'static str, message: String },
}

/// Failure reported by a [`crate::buffer_state::gpu::GpuDevice`].
#[derive(Debug, Error)]
pub enum GpuError {
    #[error("no suitable GPU adapter: {0}")]
    AdapterUnavailable(String),

    #[error("GPU device request failed: {0}")]
    DeviceUnavailable(String),

    #[error("could not create buffer '{label}': {reason}")]
    CreateFailed { label: String, reason: String },

    #[error("buffer {0} is not known to the device")]
    UnknownBuffer(u64),

    #[error("write of {len} bytes exceeds buffer {id} of {size} bytes")]
    WriteOutOfBounds { id: u64, len: u64, size: u64 },
}

/// Any failure a task can finish with.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Gpu(#[from] GpuError),
}

/// Failure setting up or loading the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to spawn thread '{name}': {source}")]
    ThreadSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Gpu(#[from] GpuError),
}
