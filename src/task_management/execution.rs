//! Worker-side bodies of rebuild and sort tasks, and the upload steps they
//! queue for the render thread.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cgmath::Point3;
use log::{debug, trace};
use web_time::Instant;

use super::services::SectionListener;
use super::task::{
    CompletionRoute, RebuildTask, SectionTask, SortTask, TaskOutcome, TaskResult, TaskTarget,
};
use crate::buffer_state::{GpuDevice, SectionBuffers, UploadCommand, UploadQueue};
use crate::core::MtResource;
use crate::error::{BuildError, TaskError};
use crate::meshing::GeometryBuilder;
use crate::section::{RelativeSortPos, RenderData, RenderLayer, SectionKey};

/// What running tasks share with the coordinator.
pub(crate) struct TaskContext {
    pub geometry: Arc<dyn GeometryBuilder>,
    pub listener: Arc<dyn SectionListener>,
    pub uploads: Arc<UploadQueue>,
    pub camera: MtResource<Point3<f64>>,
    pub stopped: AtomicBool,
}

impl TaskContext {
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn camera_position(&self) -> Point3<f64> {
        self.camera.snapshot()
    }
}

/// Camera position relative to the section's minimum corner.
fn sort_origin(camera: Point3<f64>, key: SectionKey) -> Point3<f32> {
    let min = key.min_corner();
    Point3::new(
        (camera.x - min.x) as f32,
        (camera.y - min.y) as f32,
        (camera.z - min.z) as f32,
    )
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}

impl SectionTask {
    /// Runs the worker part of the task. `done` is called exactly once, either
    /// from here or from the upload this queues.
    pub(crate) fn run(self, buffers: SectionBuffers, ctx: &Arc<TaskContext>, done: CompletionRoute) {
        match self {
            SectionTask::Rebuild(task) => task.run(buffers, ctx, done),
            SectionTask::Sort(task) => task.run(buffers, ctx, done),
        }
    }
}

impl RebuildTask {
    fn run(self, mut buffers: SectionBuffers, ctx: &Arc<TaskContext>, done: CompletionRoute) {
        let RebuildTask { target, region } = self;
        let key = region.key();

        if target.handle.is_cancelled() || key != target.section.key() {
            return done(buffers, Ok(TaskResult::Cancelled));
        }

        let camera = ctx.camera_position();
        let started = Instant::now();
        let built = panic::catch_unwind(AssertUnwindSafe(|| {
            ctx.geometry
                .build(&region, sort_origin(camera, key), &mut buffers)
        }));
        let mesh = match built {
            Ok(Ok(mesh)) => mesh,
            Ok(Err(error)) => return done(buffers, Err(error.into())),
            Err(payload) => {
                let error = BuildError::WorkerPanicked {
                    task: target.handle.name(),
                    message: panic_message(payload.as_ref()),
                };
                return done(buffers, Err(error.into()));
            }
        };
        debug!("Built section {} in {:?}", key, started.elapsed());

        let position = RelativeSortPos::of(camera, key);
        if target.handle.is_cancelled() {
            return done(buffers, Ok(TaskResult::Cancelled));
        }

        let render_data = Arc::new(RenderData::new(position, mesh.occlusion, mesh.sort_state));
        if ctx.is_stopped() {
            ctx.uploads.dispose(render_data);
            return done(buffers, Ok(TaskResult::Cancelled));
        }

        let upload_ctx = Arc::clone(ctx);
        ctx.uploads.push(UploadCommand::new(
            target.handle.name(),
            key,
            move |device| {
                let outcome = publish_rebuild(&upload_ctx, &target, render_data, &buffers, device);
                done(buffers, outcome)
            },
        ));
    }
}

/// Render-thread half of a rebuild: uploads every layer, then swaps the new
/// render data into the section unless the task was cancelled meanwhile.
fn publish_rebuild(
    ctx: &TaskContext,
    target: &TaskTarget,
    render_data: Arc<RenderData>,
    buffers: &SectionBuffers,
    device: &dyn GpuDevice,
) -> TaskOutcome {
    if ctx.is_stopped() {
        ctx.uploads.dispose(render_data);
        return Ok(TaskResult::Cancelled);
    }

    let key = target.section.key();
    for layer in RenderLayer::all() {
        let builder = buffers.layer(layer);
        if builder.is_empty() {
            continue;
        }

        let (indices, index_count) = match layer {
            RenderLayer::Translucent => (Some(builder.index_bytes()), builder.indices.len()),
            _ => (None, builder.quad_count() * 6),
        };
        let uploaded = render_data.upload_layer(
            device,
            key,
            layer,
            builder.vertex_bytes(),
            indices,
            index_count as u32,
        );
        if let Err(error) = uploaded {
            ctx.uploads.dispose(render_data);
            return Err(TaskError::Gpu(error));
        }
    }

    if ctx.is_stopped()
        || !target
            .section
            .publish_rebuild(&target.handle, Arc::clone(&render_data), &ctx.uploads)
    {
        ctx.uploads.dispose(render_data);
        return Ok(TaskResult::Cancelled);
    }

    ctx.listener.section_built(&target.section);
    Ok(TaskResult::Successful)
}

impl SortTask {
    fn run(self, mut buffers: SectionBuffers, ctx: &Arc<TaskContext>, done: CompletionRoute) {
        let SortTask {
            target,
            render_data,
        } = self;

        if target.handle.is_cancelled() || render_data.is_disposed() {
            return done(buffers, Ok(TaskResult::Cancelled));
        }
        let Some(sort_state) = render_data.sort_state() else {
            return done(buffers, Ok(TaskResult::Cancelled));
        };
        if !render_data.has_translucent_layer() {
            return done(buffers, Ok(TaskResult::Cancelled));
        }

        let key = target.section.key();
        let camera = ctx.camera_position();
        let position = RelativeSortPos::of(camera, key);
        if !render_data.sort_position_changed(position) && !position.is_on_camera_axis() {
            return done(buffers, Ok(TaskResult::Cancelled));
        }

        let written = sort_state.sort_into(
            sort_origin(camera, key),
            &mut buffers.layer_mut(RenderLayer::Translucent).indices,
        );
        if written == 0 || target.handle.is_cancelled() || ctx.is_stopped() {
            return done(buffers, Ok(TaskResult::Cancelled));
        }
        trace!("Sorted {} translucent indices for section {}", written, key);

        let upload_ctx = Arc::clone(ctx);
        ctx.uploads.push(UploadCommand::new(
            target.handle.name(),
            key,
            move |device| {
                let outcome = publish_sort(&upload_ctx, &target, &render_data, position, &buffers, device);
                done(buffers, outcome)
            },
        ));
    }
}

/// Render-thread half of a sort: replaces the translucent index buffer.
fn publish_sort(
    ctx: &TaskContext,
    target: &TaskTarget,
    render_data: &RenderData,
    position: RelativeSortPos,
    buffers: &SectionBuffers,
    device: &dyn GpuDevice,
) -> TaskOutcome {
    if ctx.is_stopped() || render_data.is_disposed() {
        return Ok(TaskResult::Cancelled);
    }

    render_data.upload_index_buffer(
        device,
        target.section.key(),
        RenderLayer::Translucent,
        buffers.layer(RenderLayer::Translucent).index_bytes(),
    )?;

    if target.handle.is_cancelled() {
        return Ok(TaskResult::Cancelled);
    }
    render_data.set_sort_position(position);
    Ok(TaskResult::Successful)
}
