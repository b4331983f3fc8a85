//! tasktracker - File-backed Task Store Library
//!
//! This library provides the storage layer behind the `tasktracker` CLI:
//! task records, their dependency graph and an archive, persisted as JSON
//! under `<root>/.tasktracker/` with crash-safe writes.
//!
//! # Core Concepts
//!
//! - **Atomic writes**: every file is staged to `<path>.tmp` and renamed over
//!   the target, so readers see either the old or the new content
//! - **File cache**: TTL-bounded reads and hash-based skipping of no-op writes
//! - **Batches**: multi-file changes that roll back to the prior bytes when a
//!   write fails
//! - **Archive**: retired tasks moved out of the active store and back
//!
//! # Module Organization
//!
//! - `archive`: Archive collection, archive/restore and archive listing
//! - `atomic`: Temp-file-then-rename writes
//! - `batch`: Batch transactions with rollback
//! - `cache`: Whole-file JSON cache with content hashing
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `.tasktracker/config.json`
//! - `dependency`: Dependency graph side index
//! - `error`: Error types and result aliases
//! - `output`: Shared JSON/human output for CLI commands
//! - `storage`: On-disk layout
//! - `store`: The `TaskStore` and task CRUD
//! - `task`: Task records, patches and filters
//! - `validate`: Field sanitization and path normalization
//!
//! # Example
//!
//! ```no_run
//! use tasktracker::{NewTask, TaskStore};
//!
//! let mut store = TaskStore::init("/path/to/project")?;
//! let first = store.create_task(NewTask::new("Write the parser"))?;
//! let second = store.create_task(NewTask::new("Test the parser"))?;
//! store.add_dependency(second.id, first.id)?;
//! assert_eq!(store.get_blocked_by(first.id)?, vec![second.id]);
//! # Ok::<(), tasktracker::Error>(())
//! ```

pub mod archive;
pub mod atomic;
pub mod batch;
pub mod cache;
pub mod cli;
pub mod config;
pub mod dependency;
pub mod error;
pub mod output;
pub mod storage;
pub mod store;
pub mod task;
pub mod validate;

pub use archive::{ArchiveCollection, ArchiveFilter};
pub use dependency::{DanglingReference, DependencyGraph};
pub use error::{Error, Result};
pub use store::{StoreWarning, TaskStore};
pub use task::{NewTask, Task, TaskCollection, TaskFilter, TaskPatch};
