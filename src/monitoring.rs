/*!
Monitoring store loader.

Parsl's monitoring subsystem records one row per task invocation in the
`task` table and one row per workflow run in the `workflow` table of an
SQLite database (`monitoring.db` by default, under `./runinfo`). This module
opens that store read-only, fetches both tables, and cleans them into
[`TaskRecord`] / [`WorkflowRun`] values ready for graph construction.

## Cleaning rules

- Task rows must carry both timestamps; rows with a NULL or unparseable
  `task_time_invoked`/`task_time_returned` are dropped, as are rows whose
  derived runtime is negative.
- Workflow rows go through the same timestamp pipeline over
  `time_began`/`time_completed`, and additionally require
  `tasks_failed_count == 0`.

## Failure taxonomy

[`LoadError`] distinguishes the three ways a load can fail: the resolved
file does not exist, the store exists but cannot be read (connection
failure, missing column, wrong column type), or no rows survive cleaning.
The caller decides how to surface each; all three terminate the CLI with a
non-zero status.

The connection pool is scoped to the load and closed on every exit path.
*/

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use miette::Diagnostic;
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use tracing::{debug, instrument};

/// Directory searched for the monitoring database when `--path` is absent.
pub const DEFAULT_RUN_DIR: &str = "./runinfo";

/// Database filename used when neither `--input` nor `MONITORING_DB` is set.
pub const DEFAULT_DB_FILENAME: &str = "monitoring.db";

/// Timestamp formats Parsl writes (space- and `T`-separated, optional
/// fractional seconds).
const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

const TASK_QUERY: &str = "SELECT task_id, run_id, task_func_name, task_depends, \
     task_time_invoked, task_time_returned FROM task";

const WORKFLOW_QUERY: &str = "SELECT run_id, workflow_name, time_began, time_completed, \
     tasks_failed_count FROM workflow";

#[derive(Debug, Error, Diagnostic)]
pub enum LoadError {
    #[error("monitoring database not found at {}", path.display())]
    #[diagnostic(
        code(wfexport::monitoring::not_found),
        help("pass --path/--input, or run from a directory containing ./runinfo/monitoring.db")
    )]
    StoreNotFound { path: PathBuf },

    #[error("monitoring database could not be read: {source}")]
    #[diagnostic(
        code(wfexport::monitoring::unreadable),
        help("the file must be a Parsl monitoring database with `task` and `workflow` tables")
    )]
    StoreUnreadable {
        #[from]
        source: sqlx::Error,
    },

    #[error("no usable rows survive filtering in {}", path.display())]
    #[diagnostic(
        code(wfexport::monitoring::empty),
        help("only completed tasks and runs with zero failed tasks are exportable")
    )]
    NoUsableRows { path: PathBuf },
}

/// One cleaned row of the `task` table.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    /// Task identifier, unique within its run.
    pub task_id: i64,
    /// Identifier of the owning run.
    pub run_id: String,
    /// Name of the invoked app function.
    pub func_name: String,
    pub time_invoked: NaiveDateTime,
    pub time_returned: NaiveDateTime,
    /// Raw comma-separated parent task ids, possibly empty.
    pub depends: String,
    /// `time_returned - time_invoked`, non-negative by construction.
    pub runtime_seconds: f64,
}

/// One cleaned row of the `workflow` table.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowRun {
    pub run_id: String,
    pub workflow_name: String,
    pub time_began: NaiveDateTime,
    pub time_completed: NaiveDateTime,
    /// Makespan of the run, non-negative by construction.
    pub runtime_seconds: f64,
}

/// Both cleaned record sets of one monitoring store.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoringData {
    pub tasks: Vec<TaskRecord>,
    pub runs: Vec<WorkflowRun>,
}

/// Loads and cleans a monitoring store.
///
/// `path` defaults to [`DEFAULT_RUN_DIR`]; `filename` defaults to the
/// `MONITORING_DB` environment variable (read via dotenvy) and then to
/// [`DEFAULT_DB_FILENAME`].
pub async fn load(
    path: Option<&Path>,
    filename: Option<&str>,
) -> Result<MonitoringData, LoadError> {
    let db_file = resolve_db_file(path, filename);
    if !db_file.exists() {
        return Err(LoadError::StoreNotFound { path: db_file });
    }
    load_store(&db_file).await
}

#[instrument(skip_all, fields(db = %db_file.display()))]
async fn load_store(db_file: &Path) -> Result<MonitoringData, LoadError> {
    let options = SqliteConnectOptions::new()
        .filename(db_file)
        .read_only(true);
    let pool = SqlitePool::connect_with(options).await?;

    // Close the pool before inspecting the result so the store is released
    // on the error paths too.
    let fetched = fetch_cleaned(&pool).await;
    pool.close().await;
    let (tasks, runs) = fetched?;

    debug!(
        tasks = tasks.len(),
        runs = runs.len(),
        "cleaned monitoring rows"
    );
    if tasks.is_empty() || runs.is_empty() {
        return Err(LoadError::NoUsableRows {
            path: db_file.to_path_buf(),
        });
    }
    Ok(MonitoringData { tasks, runs })
}

async fn fetch_cleaned(
    pool: &SqlitePool,
) -> Result<(Vec<TaskRecord>, Vec<WorkflowRun>), LoadError> {
    let task_rows = sqlx::query(TASK_QUERY).fetch_all(pool).await?;
    let mut tasks = Vec::with_capacity(task_rows.len());
    for row in &task_rows {
        if let Some(record) = clean_task_row(row)? {
            tasks.push(record);
        }
    }

    let workflow_rows = sqlx::query(WORKFLOW_QUERY).fetch_all(pool).await?;
    let mut runs = Vec::with_capacity(workflow_rows.len());
    for row in &workflow_rows {
        if let Some(run) = clean_workflow_row(row)? {
            runs.push(run);
        }
    }

    Ok((tasks, runs))
}

fn clean_task_row(row: &SqliteRow) -> Result<Option<TaskRecord>, sqlx::Error> {
    let Some(run_id) = row.try_get::<Option<String>, _>("run_id")? else {
        return Ok(None);
    };
    let invoked_raw: Option<String> = row.try_get("task_time_invoked")?;
    let returned_raw: Option<String> = row.try_get("task_time_returned")?;
    let (Some(invoked_raw), Some(returned_raw)) = (invoked_raw, returned_raw) else {
        return Ok(None);
    };
    let (Some(time_invoked), Some(time_returned)) =
        (parse_timestamp(&invoked_raw), parse_timestamp(&returned_raw))
    else {
        return Ok(None);
    };
    let Some(runtime_seconds) = runtime_seconds(time_invoked, time_returned) else {
        return Ok(None);
    };

    let func_name: Option<String> = row.try_get("task_func_name")?;
    let depends: Option<String> = row.try_get("task_depends")?;
    Ok(Some(TaskRecord {
        task_id: row.try_get("task_id")?,
        run_id,
        func_name: func_name.unwrap_or_default(),
        time_invoked,
        time_returned,
        depends: depends.unwrap_or_default(),
        runtime_seconds,
    }))
}

fn clean_workflow_row(row: &SqliteRow) -> Result<Option<WorkflowRun>, sqlx::Error> {
    let Some(run_id) = row.try_get::<Option<String>, _>("run_id")? else {
        return Ok(None);
    };
    if row.try_get::<Option<i64>, _>("tasks_failed_count")? != Some(0) {
        return Ok(None);
    }
    let began_raw: Option<String> = row.try_get("time_began")?;
    let completed_raw: Option<String> = row.try_get("time_completed")?;
    let (Some(began_raw), Some(completed_raw)) = (began_raw, completed_raw) else {
        return Ok(None);
    };
    let (Some(time_began), Some(time_completed)) =
        (parse_timestamp(&began_raw), parse_timestamp(&completed_raw))
    else {
        return Ok(None);
    };
    let Some(runtime_seconds) = runtime_seconds(time_began, time_completed) else {
        return Ok(None);
    };

    let workflow_name: Option<String> = row.try_get("workflow_name")?;
    Ok(Some(WorkflowRun {
        run_id,
        workflow_name: workflow_name.unwrap_or_default(),
        time_began,
        time_completed,
        runtime_seconds,
    }))
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

fn runtime_seconds(begin: NaiveDateTime, end: NaiveDateTime) -> Option<f64> {
    let micros = end.signed_duration_since(begin).num_microseconds()?;
    let seconds = micros as f64 / 1_000_000.0;
    (seconds >= 0.0).then_some(seconds)
}

fn resolve_db_file(path: Option<&Path>, filename: Option<&str>) -> PathBuf {
    let dir = match path {
        Some(p) => p.to_path_buf(),
        None => PathBuf::from(DEFAULT_RUN_DIR),
    };
    dir.join(resolve_db_filename(filename))
}

fn resolve_db_filename(provided: Option<&str>) -> String {
    if let Some(name) = provided {
        return name.to_string();
    }
    dotenvy::dotenv().ok();
    std::env::var("MONITORING_DB").unwrap_or_else(|_| DEFAULT_DB_FILENAME.to_string())
}
