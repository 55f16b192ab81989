#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel Section Pipeline
//!
//! A concurrent build pipeline that turns 16x16x16 sections of voxel world data
//! into GPU vertex and index buffers, re-sorts translucent geometry as the
//! camera moves, and keeps memory bounded while doing so.
//!
//! ## Key Modules
//!
//! * `task_management` - The `SectionCoordinator`, its scheduler, worker pool and tasks
//! * `section` - Section addressing, per-section state and render data
//! * `buffer_state` - Scratch buffer pool, upload queue and the GPU device seam
//! * `meshing` - The geometry-build seam and a reference face-culling builder
//! * `voxels` - Block types, region snapshots and a procedural world
//! * `core` - Concurrency primitives shared by the rest of the crate
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use voxel_section_pipeline::{
//!     BuiltSection, CoordinatorServices, FaceCullingBuilder, MemoryDevice, NoiseWorld,
//!     PipelineConfig, SectionCoordinator, SectionKey,
//! };
//!
//! let services = CoordinatorServices::new(
//!     Arc::new(MemoryDevice::new()),
//!     Arc::new(FaceCullingBuilder::new()),
//! );
//! let coordinator = SectionCoordinator::new(&PipelineConfig::default(), services).unwrap();
//! let world = NoiseWorld::new(42, 0);
//!
//! let section = Arc::new(BuiltSection::new(0, SectionKey::new(0, 0, 0)));
//! coordinator.send(section.create_rebuild_task(&world));
//! section.cancel_rebuild();
//!
//! // once per frame, on the render thread
//! coordinator.upload();
//! ```

pub mod buffer_state;
pub mod config;
pub mod core;
pub mod diagnostics;
pub mod error;
pub mod meshing;
pub mod section;
pub mod task_management;
pub mod voxels;

use log::info;

pub use buffer_state::{GpuDevice, MemoryDevice, UploadQueue, WgpuDevice};
pub use config::PipelineConfig;
pub use diagnostics::{CrashReport, DiagnosticsSink, LogDiagnostics};
pub use error::{BuildError, GpuError, PipelineError, TaskError};
pub use meshing::{FaceCullingBuilder, GeometryBuilder, SectionMesh};
pub use section::{BuiltSection, RenderData, RenderLayer, SectionKey, SectionRenderState};
pub use task_management::{CoordinatorServices, SectionCoordinator, SectionListener, SectionTask};
pub use voxels::{NoiseWorld, RegionSource, SectionRegion};

/// Initializes `env_logger` from `RUST_LOG`, defaulting to `info`. Safe to call
/// more than once.
pub fn init_logging() {
    let initialized = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stdout)
        .try_init()
        .is_ok();

    if initialized {
        info!("Logger initialized");
    }
}
