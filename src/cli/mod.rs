//! Command-line interface for tasktracker
//!
//! This module defines the CLI structure using clap derive macros. Each
//! subcommand maps onto one store operation and lives in its own submodule.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::output::{emit_success, Message, OutputOptions};
use crate::store::TaskStore;

mod archive;
mod dep;
mod init;
mod task;

/// tasktracker - local task records with crash-safe storage
#[derive(Parser, Debug)]
#[command(name = "tasktracker")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Project root containing `.tasktracker/` (defaults to current directory)
    #[arg(long, global = true, env = "TASKTRACKER_ROOT")]
    pub root: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create `.tasktracker/` with a default config and empty stores
    Init,

    /// Create a task
    Add {
        /// Task title
        title: String,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(short, long)]
        category: Option<String>,

        #[arg(short, long)]
        status: Option<String>,

        #[arg(short, long)]
        priority: Option<String>,

        #[arg(short, long)]
        effort: Option<String>,

        /// Related file (repeatable)
        #[arg(short = 'f', long = "file")]
        files: Vec<String>,
    },

    /// Show one task
    Show {
        id: u64,

        /// Look the id up in the archive instead
        #[arg(long)]
        archived: bool,
    },

    /// Update fields of a task
    Update {
        id: u64,

        #[arg(long)]
        title: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(short, long)]
        category: Option<String>,

        #[arg(short, long)]
        status: Option<String>,

        #[arg(short, long)]
        priority: Option<String>,

        #[arg(short, long, conflicts_with = "clear_effort")]
        effort: Option<String>,

        /// Remove the effort estimate
        #[arg(long)]
        clear_effort: bool,

        /// Replace related files (repeatable)
        #[arg(short = 'f', long = "file")]
        files: Vec<String>,
    },

    /// Delete a task
    Rm { id: u64 },

    /// List tasks, optionally filtered
    List {
        #[arg(short, long)]
        status: Option<String>,

        #[arg(short, long)]
        category: Option<String>,

        #[arg(short, long)]
        priority: Option<String>,

        /// Case-insensitive match on title, description or comments
        #[arg(short, long)]
        text: Option<String>,
    },

    /// Add a comment to a task
    Comment {
        id: u64,

        text: String,

        #[arg(short, long, env = "TASKTRACKER_AUTHOR")]
        author: Option<String>,
    },

    /// Dependency graph commands
    #[command(subcommand)]
    Dep(DepCommands),

    /// Move a task into the archive
    Archive {
        id: u64,

        #[arg(short, long, default_value = "")]
        reason: String,
    },

    /// Move an archived task back into the active store
    Restore { id: u64 },

    /// List archived tasks
    Archived {
        #[arg(short, long)]
        status: Option<String>,

        #[arg(short, long)]
        category: Option<String>,

        #[arg(short, long)]
        priority: Option<String>,

        #[arg(short, long)]
        text: Option<String>,

        /// Archived on or after (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        since: Option<String>,

        /// Archived on or before (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        until: Option<String>,
    },
}

/// Dependency subcommands
#[derive(Subcommand, Debug)]
pub enum DepCommands {
    /// Record that TASK depends on DEPENDS_ON
    Add { task: u64, depends_on: u64 },

    /// Remove a dependency edge
    Rm { task: u64, depends_on: u64 },

    /// Show dependencies of one task, or every edge
    Ls { task: Option<u64> },
}

impl Commands {
    /// Label used as `command` in JSON envelopes, e.g. `dep add`
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Init => "init",
            Commands::Add { .. } => "add",
            Commands::Show { .. } => "show",
            Commands::Update { .. } => "update",
            Commands::Rm { .. } => "rm",
            Commands::List { .. } => "list",
            Commands::Comment { .. } => "comment",
            Commands::Dep(DepCommands::Add { .. }) => "dep add",
            Commands::Dep(DepCommands::Rm { .. }) => "dep rm",
            Commands::Dep(DepCommands::Ls { .. }) => "dep ls",
            Commands::Archive { .. } => "archive",
            Commands::Restore { .. } => "restore",
            Commands::Archived { .. } => "archived",
        }
    }
}

/// Flags shared by every subcommand, plus the running command's label
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
    pub command: &'static str,
}

impl GlobalOptions {
    pub fn output(&self) -> OutputOptions {
        OutputOptions {
            json: self.json,
            quiet: self.quiet,
        }
    }

    pub fn resolve_root(&self) -> Result<PathBuf> {
        match &self.root {
            Some(path) => Ok(path.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    /// Open the store, refusing roots that were never initialized
    pub fn open_store(&self) -> Result<TaskStore> {
        let root = self.resolve_root()?;
        let store = TaskStore::open(&root)?;
        if !store.storage().is_initialized() {
            return Err(Error::InvalidArgument(format!(
                "no .tasktracker directory under {}; run `tasktracker init`",
                root.display()
            )));
        }
        Ok(store)
    }

    /// Print the command result along with whatever the store repaired
    pub fn reply<T: Serialize>(
        &self,
        store: &mut TaskStore,
        data: &T,
        message: &Message,
    ) -> Result<()> {
        let warnings = store.take_warnings();
        emit_success(self.output(), self.command, data, message, &warnings)
    }
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let global = GlobalOptions {
            root: self.root,
            json: self.json,
            quiet: self.quiet,
            command: self.command.name(),
        };

        match self.command {
            Commands::Init => init::run(&global),
            Commands::Add {
                title,
                description,
                category,
                status,
                priority,
                effort,
                files,
            } => task::run_add(
                &global,
                task::AddOptions {
                    title,
                    description,
                    category,
                    status,
                    priority,
                    effort,
                    files,
                },
            ),
            Commands::Show { id, archived } => task::run_show(&global, id, archived),
            Commands::Update {
                id,
                title,
                description,
                category,
                status,
                priority,
                effort,
                clear_effort,
                files,
            } => task::run_update(
                &global,
                task::UpdateOptions {
                    id,
                    title,
                    description,
                    category,
                    status,
                    priority,
                    effort,
                    clear_effort,
                    files,
                },
            ),
            Commands::Rm { id } => task::run_rm(&global, id),
            Commands::List {
                status,
                category,
                priority,
                text,
            } => task::run_list(
                &global,
                task::ListOptions {
                    status,
                    category,
                    priority,
                    text,
                },
            ),
            Commands::Comment { id, text, author } => {
                task::run_comment(&global, id, author.as_deref(), &text)
            }
            Commands::Dep(cmd) => match cmd {
                DepCommands::Add { task, depends_on } => dep::run_add(&global, task, depends_on),
                DepCommands::Rm { task, depends_on } => dep::run_rm(&global, task, depends_on),
                DepCommands::Ls { task } => dep::run_ls(&global, task),
            },
            Commands::Archive { id, reason } => archive::run_archive(&global, id, &reason),
            Commands::Restore { id } => archive::run_restore(&global, id),
            Commands::Archived {
                status,
                category,
                priority,
                text,
                since,
                until,
            } => archive::run_archived(
                &global,
                archive::ArchivedOptions {
                    status,
                    category,
                    priority,
                    text,
                    since,
                    until,
                },
            ),
        }
    }
}
