//! Fatal task failure reporting.
//!
//! A task that fails (geometry error, worker panic, device error) is not
//! retried. Its continuation packages the failure into a `CrashReport` and
//! hands it to the coordinator's `DiagnosticsSink`.

use std::fmt;

use log::error;

use crate::error::TaskError;
use crate::section::SectionKey;
use crate::task_management::task::TaskKind;

#[derive(Debug)]
pub struct CrashReport {
    pub title: &'static str,
    pub section: SectionKey,
    pub task: TaskKind,
    pub error: TaskError,
}

impl fmt::Display for CrashReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} failed for section {}: {}",
            self.title,
            self.task.name(),
            self.section,
            self.error
        )
    }
}

pub trait DiagnosticsSink: Send + Sync {
    fn report(&self, report: CrashReport);
}

/// Writes every report to the log at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDiagnostics;

impl DiagnosticsSink for LogDiagnostics {
    fn report(&self, report: CrashReport) {
        error!("{}", report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BuildError;

    #[test]
    fn report_names_task_and_section() {
        let report = CrashReport {
            title: "Batching sections",
            section: SectionKey::new(1, 2, 3),
            task: TaskKind::Rebuild,
            error: TaskError::Build(BuildError::Geometry {
                section: SectionKey::new(1, 2, 3),
                reason: "bad block".to_string(),
            }),
        };

        let line = report.to_string();
        assert!(line.starts_with("Batching sections: section_rebuild failed for section [1, 2, 3]"));
        assert!(line.ends_with("bad block"));
    }
}
