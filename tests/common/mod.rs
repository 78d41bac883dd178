use std::path::Path;

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;

/// Creates an empty monitoring store with the `task` and `workflow` tables.
pub async fn create_store(path: &Path) -> SqlitePool {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(options)
        .await
        .expect("create store");

    sqlx::query(
        "CREATE TABLE task (
            task_id INTEGER,
            run_id TEXT,
            task_func_name TEXT,
            task_depends TEXT,
            task_time_invoked TEXT,
            task_time_returned TEXT
        )",
    )
    .execute(&pool)
    .await
    .expect("create task table");

    sqlx::query(
        "CREATE TABLE workflow (
            run_id TEXT,
            workflow_name TEXT,
            time_began TEXT,
            time_completed TEXT,
            tasks_failed_count INTEGER
        )",
    )
    .execute(&pool)
    .await
    .expect("create workflow table");

    pool
}

pub async fn insert_task(
    pool: &SqlitePool,
    task_id: i64,
    run_id: &str,
    func_name: &str,
    depends: &str,
    invoked: Option<&str>,
    returned: Option<&str>,
) {
    sqlx::query("INSERT INTO task VALUES (?, ?, ?, ?, ?, ?)")
        .bind(task_id)
        .bind(run_id)
        .bind(func_name)
        .bind(depends)
        .bind(invoked)
        .bind(returned)
        .execute(pool)
        .await
        .expect("insert task row");
}

pub async fn insert_workflow(
    pool: &SqlitePool,
    run_id: &str,
    workflow_name: &str,
    began: &str,
    completed: &str,
    tasks_failed_count: i64,
) {
    sqlx::query("INSERT INTO workflow VALUES (?, ?, ?, ?, ?)")
        .bind(run_id)
        .bind(workflow_name)
        .bind(began)
        .bind(completed)
        .bind(tasks_failed_count)
        .execute(pool)
        .await
        .expect("insert workflow row");
}

/// Seeds the two-task linear run used by several tests: task 2 depends on
/// task 1, makespan 6 seconds.
pub async fn seed_linear_run(pool: &SqlitePool, run_id: &str, workflow_name: &str) {
    insert_task(
        pool,
        1,
        run_id,
        "fetch",
        "",
        Some("2021-06-16 11:45:05"),
        Some("2021-06-16 11:45:07"),
    )
    .await;
    insert_task(
        pool,
        2,
        run_id,
        "merge",
        "1",
        Some("2021-06-16 11:45:07"),
        Some("2021-06-16 11:45:10"),
    )
    .await;
    insert_workflow(
        pool,
        run_id,
        workflow_name,
        "2021-06-16 11:45:05",
        "2021-06-16 11:45:11",
        0,
    )
    .await;
}
