/*!
Per-run task graph construction.

A [`TaskDag`] is rebuilt from the flat `task` rows of one run: one node per
task, one edge per declared dependency (the comma-separated `task_depends`
column), plus two synthetic endpoints so the graph has a single entry and
exit: a `source` node (id -1) feeding every task with no parents, and a
`sink` node (id -2) fed by every task with no children.

The graph is an arena: nodes live in a `Vec` in insertion order (tasks
ascending by id, then source, then sink), an id-to-index map resolves
lookups, and parent/child adjacency lists hold edges in insertion order.
Construction is three passes (all nodes, then all edges, then one
endpoint-attachment pass), so the final edge structure never depends on
declaration order.

Invariant after construction: the source has no incoming edges, the sink has
no outgoing edges, and every task node lies on a source→sink path.
*/

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::monitoring::TaskRecord;

/// Reserved id of the synthetic entry node.
pub const SOURCE_ID: i64 = -1;

/// Reserved id of the synthetic exit node.
pub const SINK_ID: i64 = -2;

#[derive(Debug, Error, Diagnostic)]
pub enum DagError {
    #[error("run {run_id} has no task rows")]
    #[diagnostic(
        code(wfexport::dag::run_not_found),
        help("check the run id against the workflow table; tasks without valid timestamps are dropped during loading")
    )]
    RunNotFound { run_id: String },

    #[error("task {task_id} declares malformed dependency {token:?}")]
    #[diagnostic(code(wfexport::dag::bad_dependency))]
    BadDependency { task_id: i64, token: String },

    #[error("task {task_id} depends on task {parent}, which has no usable row")]
    #[diagnostic(
        code(wfexport::dag::unknown_dependency),
        help("the parent row may have failed timestamp cleaning or belong to another run")
    )]
    UnknownDependency { task_id: i64, parent: i64 },
}

/// One node of the task graph: a task of the run, or a synthetic endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskNode {
    pub id: i64,
    pub name: String,
    pub runtime_seconds: f64,
    /// Invocation timestamp display string; `None` for the endpoints.
    pub time_invoked: Option<String>,
}

impl TaskNode {
    fn endpoint(id: i64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            runtime_seconds: 0.0,
            time_invoked: None,
        }
    }
}

/// Directed acyclic task graph of one run, endpoints included.
#[derive(Debug, Clone, Default)]
pub struct TaskDag {
    nodes: Vec<TaskNode>,
    index: FxHashMap<i64, usize>,
    children: Vec<Vec<usize>>,
    parents: Vec<Vec<usize>>,
}

impl TaskDag {
    /// Builds the graph for `run_id` from the cleaned task record set.
    ///
    /// Records of other runs are ignored. Fails with
    /// [`DagError::RunNotFound`] when no record matches, and with
    /// [`DagError::BadDependency`]/[`DagError::UnknownDependency`] when the
    /// dependency column cannot be resolved against the run's tasks.
    pub fn build(run_id: &str, tasks: &[TaskRecord]) -> Result<TaskDag, DagError> {
        let mut rows: Vec<&TaskRecord> = tasks.iter().filter(|t| t.run_id == run_id).collect();
        if rows.is_empty() {
            return Err(DagError::RunNotFound {
                run_id: run_id.to_string(),
            });
        }
        rows.sort_by_key(|t| t.task_id);

        let mut dag = TaskDag::with_capacity(rows.len() + 2);
        for row in &rows {
            dag.push_node(TaskNode {
                id: row.task_id,
                name: row.func_name.clone(),
                runtime_seconds: row.runtime_seconds,
                time_invoked: Some(row.time_invoked.to_string()),
            });
        }

        for row in &rows {
            let child = dag.index[&row.task_id];
            for token in row.depends.split(',') {
                let token = token.trim();
                if token.is_empty() {
                    continue;
                }
                let parent_id: i64 = token.parse().map_err(|_| DagError::BadDependency {
                    task_id: row.task_id,
                    token: token.to_string(),
                })?;
                let Some(&parent) = dag.index.get(&parent_id) else {
                    return Err(DagError::UnknownDependency {
                        task_id: row.task_id,
                        parent: parent_id,
                    });
                };
                dag.add_edge(parent, child);
            }
        }

        dag.attach_endpoints();
        Ok(dag)
    }

    /// Number of nodes, endpoints included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Total number of distinct edges.
    pub fn edge_count(&self) -> usize {
        self.children.iter().map(Vec::len).sum()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.index.contains_key(&id)
    }

    pub fn node(&self, id: i64) -> Option<&TaskNode> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    /// Nodes in insertion order: tasks ascending by id, then source, then sink.
    pub fn nodes(&self) -> impl Iterator<Item = &TaskNode> {
        self.nodes.iter()
    }

    /// Ids of the direct predecessors of `id`, in edge insertion order.
    pub fn parent_ids(&self, id: i64) -> Vec<i64> {
        self.neighbor_ids(&self.parents, id)
    }

    /// Ids of the direct successors of `id`, in edge insertion order.
    pub fn child_ids(&self, id: i64) -> Vec<i64> {
        self.neighbor_ids(&self.children, id)
    }

    fn neighbor_ids(&self, adjacency: &[Vec<usize>], id: i64) -> Vec<i64> {
        match self.index.get(&id) {
            Some(&i) => adjacency[i].iter().map(|&n| self.nodes[n].id).collect(),
            None => Vec::new(),
        }
    }

    fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            index: FxHashMap::default(),
            children: Vec::with_capacity(capacity),
            parents: Vec::with_capacity(capacity),
        }
    }

    fn push_node(&mut self, node: TaskNode) -> usize {
        if let Some(&existing) = self.index.get(&node.id) {
            // Duplicate id: last row wins, position is kept.
            self.nodes[existing] = node;
            return existing;
        }
        let i = self.nodes.len();
        self.index.insert(node.id, i);
        self.nodes.push(node);
        self.children.push(Vec::new());
        self.parents.push(Vec::new());
        i
    }

    fn add_edge(&mut self, from: usize, to: usize) {
        if self.children[from].contains(&to) {
            return; // edges form a set
        }
        self.children[from].push(to);
        self.parents[to].push(from);
    }

    /// Appends the source/sink endpoints and wires them to every task that
    /// had no parents or no children. Runs exactly once, after all task
    /// nodes and dependency edges exist.
    fn attach_endpoints(&mut self) {
        let real = self.nodes.len();
        let sources: Vec<usize> = (0..real).filter(|&i| self.parents[i].is_empty()).collect();
        let sinks: Vec<usize> = (0..real).filter(|&i| self.children[i].is_empty()).collect();

        let source = self.push_node(TaskNode::endpoint(SOURCE_ID, "source"));
        let sink = self.push_node(TaskNode::endpoint(SINK_ID, "sink"));
        for s in sources {
            self.add_edge(source, s);
        }
        for t in sinks {
            self.add_edge(t, sink);
        }
    }
}
