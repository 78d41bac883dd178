//! Per-run export orchestration.
//!
//! Ties the pipeline together for one run (graph → summary lookup →
//! document → file) and drives the all-runs path, which derives one output
//! file per run from the `--output` template.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;
use tracing::warn;

use crate::dag::{DagError, TaskDag};
use crate::monitoring::MonitoringData;
use crate::wfformat::{self, DocumentError};

#[derive(Debug, Error, Diagnostic)]
pub enum ExportError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Dag(#[from] DagError),

    #[error("run {run_id} has task rows but no workflow summary")]
    #[diagnostic(
        code(wfexport::export::summary_not_found),
        help("only runs with zero failed tasks keep their workflow row after filtering")
    )]
    SummaryNotFound { run_id: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Document(#[from] DocumentError),
}

/// Exports one run to `output`.
///
/// Builds the run's task graph, pairs it with the run's workflow summary,
/// and writes the interchange document. Prints one confirmation line per
/// written file on stdout.
pub fn export_run(data: &MonitoringData, run_id: &str, output: &Path) -> Result<(), ExportError> {
    let dag = TaskDag::build(run_id, &data.tasks)?;
    let run = data
        .runs
        .iter()
        .find(|r| r.run_id == run_id)
        .ok_or_else(|| ExportError::SummaryNotFound {
            run_id: run_id.to_string(),
        })?;

    let document = wfformat::assemble(&dag, run);
    wfformat::write_document(&document, output)?;
    println!("Workflow {run_id} written to {}", output.display());
    Ok(())
}

/// Exports every run in the store, one document per run, in load order.
///
/// A run whose task rows were all dropped during cleaning is logged and
/// skipped; any other failure aborts the batch. Returns the number of
/// documents written.
pub fn export_all(data: &MonitoringData, template: &Path) -> Result<usize, ExportError> {
    let mut written = 0;
    for run in &data.runs {
        let output = output_path_for_run(template, &run.run_id);
        match export_run(data, &run.run_id, &output) {
            Ok(()) => written += 1,
            Err(ExportError::Dag(DagError::RunNotFound { run_id })) => {
                warn!(%run_id, "skipping run with no surviving task rows");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(written)
}

/// Derives the per-run output path by inserting `_<run_id>` before the
/// template's extension (or appending it when there is none).
///
/// ```
/// use std::path::{Path, PathBuf};
/// use wfexport::export::output_path_for_run;
///
/// let out = output_path_for_run(Path::new("out/wf.json"), "abc");
/// assert_eq!(out, PathBuf::from("out/wf_abc.json"));
/// ```
pub fn output_path_for_run(template: &Path, run_id: &str) -> PathBuf {
    let stem = template
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match template.extension() {
        Some(ext) => {
            template.with_file_name(format!("{stem}_{run_id}.{}", ext.to_string_lossy()))
        }
        None => template.with_file_name(format!("{stem}_{run_id}")),
    }
}
