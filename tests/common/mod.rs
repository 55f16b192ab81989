#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use cgmath::Point3;
use crossbeam_channel::{unbounded, Receiver, Sender};

use voxel_section_pipeline::buffer_state::SectionBuffers;
use voxel_section_pipeline::voxels::BlockType;
use voxel_section_pipeline::{
    BuildError, BuiltSection, CoordinatorServices, CrashReport, DiagnosticsSink,
    FaceCullingBuilder, GeometryBuilder, MemoryDevice, PipelineConfig, SectionCoordinator,
    SectionKey, SectionListener, SectionMesh, SectionRegion,
};

pub const WAIT: Duration = Duration::from_secs(5);

/// Face-culling builder that announces each build and then holds it until the
/// gate opens. Dropping the gate sender opens it for good.
pub struct GatedBuilder {
    inner: FaceCullingBuilder,
    gate: Receiver<()>,
    started: Sender<SectionKey>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl GatedBuilder {
    pub fn new() -> (Arc<Self>, Sender<()>, Receiver<SectionKey>) {
        let (gate_tx, gate_rx) = unbounded();
        let (started_tx, started_rx) = unbounded();
        let builder = Arc::new(Self {
            inner: FaceCullingBuilder::new(),
            gate: gate_rx,
            started: started_tx,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        });
        (builder, gate_tx, started_rx)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

impl GeometryBuilder for GatedBuilder {
    fn build(
        &self,
        region: &SectionRegion,
        sort_origin: Point3<f32>,
        buffers: &mut SectionBuffers,
    ) -> Result<SectionMesh, BuildError> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        let _ = self.started.send(region.key());
        let _ = self.gate.recv();

        let result = self.inner.build(region, sort_origin, buffers);
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

pub struct FailingBuilder;

impl GeometryBuilder for FailingBuilder {
    fn build(
        &self,
        region: &SectionRegion,
        _sort_origin: Point3<f32>,
        _buffers: &mut SectionBuffers,
    ) -> Result<SectionMesh, BuildError> {
        Err(BuildError::Geometry {
            section: region.key(),
            reason: "unsupported block".to_string(),
        })
    }
}

pub struct PanickingBuilder;

impl GeometryBuilder for PanickingBuilder {
    fn build(
        &self,
        _region: &SectionRegion,
        _sort_origin: Point3<f32>,
        _buffers: &mut SectionBuffers,
    ) -> Result<SectionMesh, BuildError> {
        panic!("mesher exploded")
    }
}

#[derive(Default)]
pub struct RecordingListener {
    built: Mutex<Vec<SectionKey>>,
}

impl RecordingListener {
    pub fn built(&self) -> Vec<SectionKey> {
        self.built.lock().unwrap().clone()
    }
}

impl SectionListener for RecordingListener {
    fn section_built(&self, section: &Arc<BuiltSection>) {
        self.built.lock().unwrap().push(section.key());
    }
}

#[derive(Default)]
pub struct RecordingDiagnostics {
    reports: Mutex<Vec<CrashReport>>,
}

impl RecordingDiagnostics {
    pub fn take(&self) -> Vec<CrashReport> {
        std::mem::take(&mut *self.reports.lock().unwrap())
    }
}

impl DiagnosticsSink for RecordingDiagnostics {
    fn report(&self, report: CrashReport) {
        self.reports.lock().unwrap().push(report);
    }
}

pub struct Harness {
    pub coordinator: SectionCoordinator,
    pub device: Arc<MemoryDevice>,
    pub listener: Arc<RecordingListener>,
    pub diagnostics: Arc<RecordingDiagnostics>,
}

impl Harness {
    pub fn new(workers: usize, capacity: usize, geometry: Arc<dyn GeometryBuilder>) -> Self {
        let config = PipelineConfig {
            worker_threads: workers,
            buffer_pool_capacity: capacity,
            scratch_vertex_capacity: 256,
            scratch_index_capacity: 384,
        };
        let device = Arc::new(MemoryDevice::new());
        let listener = Arc::new(RecordingListener::default());
        let diagnostics = Arc::new(RecordingDiagnostics::default());

        let services = CoordinatorServices::new(device.clone(), geometry)
            .with_listener(listener.clone())
            .with_diagnostics(diagnostics.clone());
        let coordinator = SectionCoordinator::new(&config, services).unwrap();

        Self {
            coordinator,
            device,
            listener,
            diagnostics,
        }
    }

    /// Drives the coordinator like a render loop until nothing is queued,
    /// running or waiting for upload.
    pub fn settle(&self) {
        for _ in 0..5000 {
            self.coordinator.flush();
            self.coordinator.upload();
            self.coordinator.flush();
            if self.coordinator.is_empty() && self.coordinator.in_flight_count() == 0 {
                return;
            }
            thread::sleep(Duration::from_millis(1));
        }
        panic!("pipeline did not settle: {}", self.coordinator.debug_string());
    }
}

pub fn section(x: i32, y: i32, z: i32) -> Arc<BuiltSection> {
    Arc::new(BuiltSection::new(0, SectionKey::new(x, y, z)))
}

/// A dirt floor with nothing above it.
pub fn solid_region(key: SectionKey) -> SectionRegion {
    let mut region = SectionRegion::empty(key);
    for z in 0..16 {
        for x in 0..16 {
            region.set_block(x, 0, z, BlockType::DIRT);
        }
    }
    region
}

/// A dirt floor with a shallow pool of water on it.
pub fn water_region(key: SectionKey) -> SectionRegion {
    let mut region = solid_region(key);
    for z in 4..8 {
        for x in 4..8 {
            region.set_block(x, 1, z, BlockType::WATER);
            region.set_block(x, 2, z, BlockType::WATER);
        }
    }
    region
}

pub fn wait_started(started: &Receiver<SectionKey>) -> SectionKey {
    started.recv_timeout(WAIT).expect("build did not start")
}
