/*!
WfCommons interchange document: model, assembly, and writing.

The output is one JSON document per run in the WfCommons 1.5 shape:

```json
{
    "name": "wf1",
    "description": "TOBEFILLED",
    "createdAt": "2021-06-16 11:45:05",
    "schemaVersion": "1.5",
    "workflow": {
        "specification": {
            "tasks": [
                {"name": "source", "id": "-1", "parents": [], "children": ["1"]}
            ],
            "files": []
        },
        "execution": {
            "makespanInSeconds": 6.0,
            "executedAt": "2021-06-16 11:45:05",
            "tasks": [
                {"name": "source", "id": "-1", "runtimeInSeconds": 0.0}
            ]
        }
    },
    "author": {"name": "TOBEFILLED", "...": "..."},
    "runtimeSystem": {"name": "Parsl", "url": "https://parsl-project.org/", "version": "1.2"}
}
```

Task identifiers are stringified in both task lists. Authorship fields are
fixed placeholders; the runtime system block names the Parsl version the
monitoring schema corresponds to. Documents are written with 4-space
indentation, matching the tooling around this format.
*/

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use thiserror::Error;

use crate::dag::TaskDag;
use crate::monitoring::WorkflowRun;

pub const SCHEMA_VERSION: &str = "1.5";

/// Value of the metadata fields the exporter cannot know.
pub const PLACEHOLDER: &str = "TOBEFILLED";

const RUNTIME_SYSTEM_NAME: &str = "Parsl";
const RUNTIME_SYSTEM_URL: &str = "https://parsl-project.org/";
const RUNTIME_SYSTEM_VERSION: &str = "1.2";

#[derive(Debug, Error, Diagnostic)]
pub enum DocumentError {
    #[error("failed to serialize interchange document: {source}")]
    #[diagnostic(code(wfexport::wfformat::serialize))]
    Serialize {
        #[from]
        source: serde_json::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    #[diagnostic(
        code(wfexport::wfformat::io),
        help("check that the output directory exists and is writable")
    )]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Root of the interchange document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub name: String,
    pub description: String,
    pub created_at: String,
    pub schema_version: String,
    pub workflow: Workflow,
    pub author: Author,
    pub runtime_system: RuntimeSystem,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub specification: Specification,
    pub execution: Execution,
}

/// Static structure: the task graph, identifiers stringified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Specification {
    pub tasks: Vec<SpecTask>,
    /// Always empty; file provenance is not recorded by the monitoring store.
    pub files: Vec<serde_json::Value>,
}

/// Observed execution: per-task runtimes and the run's makespan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub makespan_in_seconds: f64,
    pub executed_at: String,
    pub tasks: Vec<ExecTask>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecTask {
    pub name: String,
    pub id: String,
    pub parents: Vec<String>,
    pub children: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecTask {
    pub name: String,
    pub id: String,
    pub runtime_in_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub email: String,
    pub institution: String,
    pub country: String,
}

impl Author {
    fn placeholder() -> Self {
        Self {
            name: PLACEHOLDER.to_string(),
            email: PLACEHOLDER.to_string(),
            institution: PLACEHOLDER.to_string(),
            country: PLACEHOLDER.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSystem {
    pub name: String,
    pub url: String,
    pub version: String,
}

impl RuntimeSystem {
    fn parsl() -> Self {
        Self {
            name: RUNTIME_SYSTEM_NAME.to_string(),
            url: RUNTIME_SYSTEM_URL.to_string(),
            version: RUNTIME_SYSTEM_VERSION.to_string(),
        }
    }
}

/// Assembles the document for one run.
///
/// Walks the graph in node-insertion order (endpoints included) and emits
/// one specification entry and one execution entry per node. `createdAt` and
/// `executedAt` are the run's begin timestamp rendered as a display string;
/// the makespan is the run's total runtime in seconds.
pub fn assemble(dag: &TaskDag, run: &WorkflowRun) -> Document {
    let created_at = run.time_began.to_string();

    let mut spec_tasks = Vec::with_capacity(dag.len());
    let mut exec_tasks = Vec::with_capacity(dag.len());
    for node in dag.nodes() {
        spec_tasks.push(SpecTask {
            name: node.name.clone(),
            id: node.id.to_string(),
            parents: dag.parent_ids(node.id).iter().map(i64::to_string).collect(),
            children: dag.child_ids(node.id).iter().map(i64::to_string).collect(),
        });
        exec_tasks.push(ExecTask {
            name: node.name.clone(),
            id: node.id.to_string(),
            runtime_in_seconds: node.runtime_seconds,
        });
    }

    Document {
        name: run.workflow_name.clone(),
        description: PLACEHOLDER.to_string(),
        created_at: created_at.clone(),
        schema_version: SCHEMA_VERSION.to_string(),
        workflow: Workflow {
            specification: Specification {
                tasks: spec_tasks,
                files: Vec::new(),
            },
            execution: Execution {
                makespan_in_seconds: run.runtime_seconds,
                executed_at: created_at,
                tasks: exec_tasks,
            },
        },
        author: Author::placeholder(),
        runtime_system: RuntimeSystem::parsl(),
    }
}

/// Renders the document as UTF-8 JSON with 4-space indentation.
pub fn render(doc: &Document) -> Result<Vec<u8>, DocumentError> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    doc.serialize(&mut serializer)?;
    Ok(buf)
}

/// Writes the rendered document to `path`, overwriting any existing file.
pub fn write_document(doc: &Document, path: &Path) -> Result<(), DocumentError> {
    let bytes = render(doc)?;
    std::fs::write(path, bytes).map_err(|source| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    })
}
