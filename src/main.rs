//! # Section Pipeline Demo
//!
//! Flies a camera over a procedural world and keeps a ring of sections around
//! it built, driving the coordinator the way a renderer would: reassign slots
//! as the camera moves, submit rebuilds and sorts, and drain uploads once per
//! frame.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=debug cargo run --release -- [config.json]
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cgmath::Point3;
use log::{info, warn};
use web_time::Instant;

use voxel_section_pipeline::{
    init_logging, BuiltSection, CoordinatorServices, FaceCullingBuilder, GpuDevice, MemoryDevice,
    NoiseWorld, PipelineConfig, PipelineError, SectionCoordinator, SectionKey, WgpuDevice,
};

const SEED: u32 = 1337;
const WATER_LEVEL: i32 = 12;
/// Sections kept around the camera on the horizontal axes.
const HORIZONTAL_RADIUS: i32 = 3;
/// Sections kept around the camera vertically.
const VERTICAL_RADIUS: i32 = 1;
const FRAMES: u32 = 240;
const FRAME_TIME: Duration = Duration::from_millis(16);
const CAMERA_SPEED: f64 = 0.75;
const IDLE_TIMEOUT: Duration = Duration::from_secs(10);

const HORIZONTAL_DIAMETER: i32 = HORIZONTAL_RADIUS * 2 + 1;
const VERTICAL_DIAMETER: i32 = VERTICAL_RADIUS * 2 + 1;

/// Slot a section key occupies. Keys that stay in view keep their slot when
/// the camera moves.
fn slot_index(key: SectionKey) -> usize {
    let x = key.x().rem_euclid(HORIZONTAL_DIAMETER);
    let y = key.y().rem_euclid(VERTICAL_DIAMETER);
    let z = key.z().rem_euclid(HORIZONTAL_DIAMETER);
    (x + z * HORIZONTAL_DIAMETER + y * HORIZONTAL_DIAMETER * HORIZONTAL_DIAMETER) as usize
}

fn visible_keys(center: SectionKey) -> Vec<SectionKey> {
    let mut keys = Vec::new();
    for dy in -VERTICAL_RADIUS..=VERTICAL_RADIUS {
        for dz in -HORIZONTAL_RADIUS..=HORIZONTAL_RADIUS {
            for dx in -HORIZONTAL_RADIUS..=HORIZONTAL_RADIUS {
                keys.push(SectionKey::new(center.x() + dx, center.y() + dy, center.z() + dz));
            }
        }
    }
    keys
}

fn create_device() -> Arc<dyn GpuDevice> {
    match WgpuDevice::new_headless() {
        Ok(device) => {
            info!("Using wgpu device");
            Arc::new(device)
        }
        Err(e) => {
            warn!("{}; falling back to in-memory buffers", e);
            Arc::new(MemoryDevice::new())
        }
    }
}

fn main() -> Result<(), PipelineError> {
    init_logging();

    let config = match std::env::args().nth(1) {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    info!("{:?}", config);

    let built = Arc::new(AtomicUsize::new(0));
    let listener_count = Arc::clone(&built);
    let services = CoordinatorServices::new(create_device(), Arc::new(FaceCullingBuilder::new()))
        .with_listener(Arc::new(move |_: &Arc<BuiltSection>| {
            listener_count.fetch_add(1, Ordering::Relaxed);
        }));
    let coordinator = SectionCoordinator::new(&config, services)?;
    let world = NoiseWorld::new(SEED, WATER_LEVEL);

    let start = SectionKey::new(0, 0, 0);
    let mut sections: Vec<Option<Arc<BuiltSection>>> =
        vec![None; (HORIZONTAL_DIAMETER * HORIZONTAL_DIAMETER * VERTICAL_DIAMETER) as usize];
    for key in visible_keys(start) {
        let index = slot_index(key);
        sections[index] = Some(Arc::new(BuiltSection::new(index, key)));
    }
    let sections: Vec<Arc<BuiltSection>> = sections.into_iter().flatten().collect();

    let started = Instant::now();
    for frame in 0..FRAMES {
        let camera = Point3::new(frame as f64 * CAMERA_SPEED, 8.0, 8.0 + frame as f64 * 0.2);
        coordinator.set_camera_position(camera);
        let center = SectionKey::containing(camera);

        for key in visible_keys(center) {
            let section = &sections[slot_index(key)];
            section.set_section_key(key, &coordinator);
            if key == center && section.needs_rebuild() {
                section.schedule_rebuild(true);
            }
        }

        for section in &sections {
            if section.needs_important_rebuild() {
                coordinator.rebuild(section, &world);
                section.cancel_rebuild();
            } else if section.needs_rebuild() {
                coordinator.send(section.create_rebuild_task(&world));
                section.cancel_rebuild();
            } else if section.has_translucent_layer() && !section.is_currently_sorting() {
                section.schedule_sort(&coordinator);
            }
        }

        coordinator.upload();
        if frame % 30 == 0 {
            info!("frame {:03}: {}", frame, coordinator.debug_string());
        }
        thread::sleep(FRAME_TIME);
    }

    let deadline = Instant::now() + IDLE_TIMEOUT;
    while !(coordinator.is_empty() && coordinator.in_flight_count() == 0) {
        if Instant::now() > deadline {
            warn!("Pipeline still busy after {:?}: {}", IDLE_TIMEOUT, coordinator.debug_string());
            break;
        }
        coordinator.flush();
        coordinator.upload();
        thread::sleep(Duration::from_millis(1));
    }

    for section in &sections {
        section.clear(&coordinator);
    }
    coordinator.stop();

    info!(
        "Built {} sections in {:?} ({})",
        built.load(Ordering::Relaxed),
        started.elapsed(),
        coordinator.debug_string()
    );
    Ok(())
}
