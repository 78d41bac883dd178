mod common;
use common::*;

use tempfile::TempDir;
use wfexport::dag::{TaskDag, SINK_ID, SOURCE_ID};
use wfexport::monitoring::{self, MonitoringData};
use wfexport::wfformat::{self, Document};

async fn load_linear_run(dir: &TempDir) -> MonitoringData {
    let pool = create_store(&dir.path().join("monitoring.db")).await;
    seed_linear_run(&pool, "run-a", "wf1").await;
    pool.close().await;
    monitoring::load(Some(dir.path()), Some("monitoring.db"))
        .await
        .expect("load")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn linear_run_assembles_expected_document() {
    let dir = TempDir::new().expect("tempdir");
    let data = load_linear_run(&dir).await;

    let dag = TaskDag::build("run-a", &data.tasks).expect("build dag");
    let ids: Vec<i64> = dag.nodes().map(|n| n.id).collect();
    assert_eq!(ids, vec![1, 2, SOURCE_ID, SINK_ID]);

    let doc = wfformat::assemble(&dag, &data.runs[0]);
    assert_eq!(doc.name, "wf1");
    assert_eq!(doc.description, "TOBEFILLED");
    assert_eq!(doc.created_at, "2021-06-16 11:45:05");
    assert_eq!(doc.schema_version, "1.5");
    assert_eq!(doc.author.institution, "TOBEFILLED");
    assert_eq!(doc.runtime_system.name, "Parsl");
    assert_eq!(doc.runtime_system.version, "1.2");

    let spec = &doc.workflow.specification;
    assert!(spec.files.is_empty());
    assert_eq!(spec.tasks.len(), 4);
    assert_eq!(spec.tasks[0].id, "1");
    assert_eq!(spec.tasks[0].parents, vec!["-1"]);
    assert_eq!(spec.tasks[0].children, vec!["2"]);
    assert_eq!(spec.tasks[1].parents, vec!["1"]);
    assert_eq!(spec.tasks[1].children, vec!["-2"]);
    assert_eq!(spec.tasks[2].name, "source");
    assert!(spec.tasks[2].parents.is_empty());
    assert_eq!(spec.tasks[3].name, "sink");
    assert!(spec.tasks[3].children.is_empty());

    let exec = &doc.workflow.execution;
    assert_eq!(exec.makespan_in_seconds, 6.0);
    assert_eq!(exec.executed_at, doc.created_at);
    assert_eq!(exec.tasks.len(), 4);
    assert_eq!(exec.tasks[0].runtime_in_seconds, 2.0);
    assert_eq!(exec.tasks[1].runtime_in_seconds, 3.0);
    // Synthetic endpoints consume no time.
    assert_eq!(exec.tasks[2].runtime_in_seconds, 0.0);
    assert_eq!(exec.tasks[3].runtime_in_seconds, 0.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn every_node_appears_once_in_both_task_lists() {
    let dir = TempDir::new().expect("tempdir");
    let data = load_linear_run(&dir).await;
    let dag = TaskDag::build("run-a", &data.tasks).expect("build dag");
    let doc = wfformat::assemble(&dag, &data.runs[0]);

    let node_ids: Vec<String> = dag.nodes().map(|n| n.id.to_string()).collect();
    let spec_ids: Vec<String> = doc
        .workflow
        .specification
        .tasks
        .iter()
        .map(|t| t.id.clone())
        .collect();
    let exec_ids: Vec<String> = doc
        .workflow
        .execution
        .tasks
        .iter()
        .map(|t| t.id.clone())
        .collect();

    assert_eq!(spec_ids, node_ids);
    assert_eq!(exec_ids, node_ids);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn identical_input_renders_identical_bytes() {
    let dir = TempDir::new().expect("tempdir");
    let data = load_linear_run(&dir).await;

    let render = |data: &MonitoringData| {
        let dag = TaskDag::build("run-a", &data.tasks).expect("build dag");
        wfformat::render(&wfformat::assemble(&dag, &data.runs[0])).expect("render")
    };
    assert_eq!(render(&data), render(&data.clone()));

    // A fresh load of the same store must also be byte-identical.
    let reloaded = monitoring::load(Some(dir.path()), Some("monitoring.db"))
        .await
        .expect("reload");
    assert_eq!(render(&data), render(&reloaded));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rendered_json_is_four_space_indented_and_round_trips() {
    let dir = TempDir::new().expect("tempdir");
    let data = load_linear_run(&dir).await;
    let dag = TaskDag::build("run-a", &data.tasks).expect("build dag");
    let doc = wfformat::assemble(&dag, &data.runs[0]);

    let bytes = wfformat::render(&doc).expect("render");
    let text = String::from_utf8(bytes.clone()).expect("utf-8");
    assert!(text.starts_with("{\n    \"name\""));
    assert!(text.contains("\n    \"schemaVersion\": \"1.5\","));
    assert!(text.contains("\"makespanInSeconds\": 6.0,"));
    assert!(text.contains("\"runtimeInSeconds\""));
    assert!(!text.ends_with('\n'));

    let parsed: Document = serde_json::from_slice(&bytes).expect("parse");
    assert_eq!(parsed, doc);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn write_document_overwrites_existing_file() {
    let dir = TempDir::new().expect("tempdir");
    let data = load_linear_run(&dir).await;
    let dag = TaskDag::build("run-a", &data.tasks).expect("build dag");
    let doc = wfformat::assemble(&dag, &data.runs[0]);

    let out = dir.path().join("wf.json");
    std::fs::write(&out, "stale").expect("seed stale file");
    wfformat::write_document(&doc, &out).expect("write");

    let parsed: Document =
        serde_json::from_slice(&std::fs::read(&out).expect("read back")).expect("parse");
    assert_eq!(parsed.name, "wf1");
}
