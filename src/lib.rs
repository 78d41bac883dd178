//! # wfexport: Parsl monitoring → WfCommons interchange documents
//!
//! `wfexport` reads the SQLite monitoring database that Parsl writes while
//! executing a workflow, reconstructs each run's task graph, and emits one
//! WfCommons 1.5 JSON document per run: the static task structure
//! (specification) plus the observed per-task runtimes and overall makespan
//! (execution).
//!
//! The pipeline is a single pass over static data:
//!
//! 1. [`monitoring`] loads and cleans the `task` and `workflow` tables.
//! 2. [`dag`] rebuilds one run's dependency graph and attaches synthetic
//!    source/sink endpoints so the graph has a single entry and exit.
//! 3. [`wfformat`] assembles and writes the interchange document.
//! 4. [`export`] wires those together per run and derives per-run output
//!    names when every run in the store is exported.
//!
//! ## Module Guide
//!
//! - [`monitoring`] - database loading and row cleaning
//! - [`dag`] - per-run task graph construction
//! - [`wfformat`] - WfCommons document model, assembly, and writing
//! - [`export`] - per-run orchestration and output naming
//! - [`telemetry`] - tracing bootstrap for the CLI

pub mod dag;
pub mod export;
pub mod monitoring;
pub mod telemetry;
pub mod wfformat;
