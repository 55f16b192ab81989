//! Collaborators injected into a `SectionCoordinator`.

use std::sync::Arc;

use crate::buffer_state::GpuDevice;
use crate::diagnostics::{DiagnosticsSink, LogDiagnostics};
use crate::meshing::GeometryBuilder;
use crate::section::BuiltSection;

/// Told about every section whose new render data has just been swapped in.
/// Called on the render thread while the upload queue is drained.
pub trait SectionListener: Send + Sync {
    fn section_built(&self, section: &Arc<BuiltSection>);
}

impl<F> SectionListener for F
where
    F: Fn(&Arc<BuiltSection>) + Send + Sync,
{
    fn section_built(&self, section: &Arc<BuiltSection>) {
        self(section)
    }
}

#[derive(Clone)]
pub struct CoordinatorServices {
    pub device: Arc<dyn GpuDevice>,
    pub geometry: Arc<dyn GeometryBuilder>,
    pub listener: Arc<dyn SectionListener>,
    pub diagnostics: Arc<dyn DiagnosticsSink>,
}

impl CoordinatorServices {
    /// Services with no listener and log-only diagnostics.
    pub fn new(device: Arc<dyn GpuDevice>, geometry: Arc<dyn GeometryBuilder>) -> Self {
        Self {
            device,
            geometry,
            listener: Arc::new(|_: &Arc<BuiltSection>| {}),
            diagnostics: Arc::new(LogDiagnostics),
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn SectionListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}
