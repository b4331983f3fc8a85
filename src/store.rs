//! The task store
//!
//! [`TaskStore`] owns one project root, its configuration and the file cache
//! every operation reads and writes through. Dependency and archive
//! operations live in [`crate::dependency`] and [`crate::archive`] as further
//! `impl TaskStore` blocks.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::archive::ArchiveCollection;
use crate::cache::{FileCache, WriteOptions, WriteOutcome};
use crate::config::Config;
use crate::dependency::DependencyGraph;
use crate::error::{Error, Result};
use crate::storage::Storage;
use crate::task::{
    Checklist, ChecklistItem, Comment, NewTask, Task, TaskCollection, TaskFilter, TaskPatch,
};
use crate::validate;

/// Something the store repaired on its own while serving a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreWarning {
    /// An unreadable file was moved aside and replaced by an empty collection
    CorruptFileRecovered {
        path: PathBuf,
        backup: PathBuf,
        reason: String,
    },
    /// `lastId` was behind the highest stored id
    LastIdRepaired { path: PathBuf, from: u64, to: u64 },
}

impl fmt::Display for StoreWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreWarning::CorruptFileRecovered { path, backup, reason } => write!(
                f,
                "{} was unreadable ({reason}); moved to {} and reset",
                path.display(),
                backup.display()
            ),
            StoreWarning::LastIdRepaired { path, from, to } => {
                write!(f, "{}: lastId {from} raised to {to}", path.display())
            }
        }
    }
}

/// File-backed store for one project
#[derive(Debug)]
pub struct TaskStore {
    pub(crate) storage: Storage,
    pub(crate) config: Config,
    pub(crate) cache: FileCache,
    warnings: Vec<StoreWarning>,
}

impl TaskStore {
    /// Open the store rooted at `root`
    ///
    /// Missing data files are treated as empty collections and created on
    /// the first write.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let root = if root.exists() {
            root.canonicalize()?
        } else {
            root.to_path_buf()
        };
        let config = Config::load_from_root(&root);
        Ok(Self {
            storage: Storage::new(root),
            config,
            cache: FileCache::new(),
            warnings: Vec::new(),
        })
    }

    /// Create `.tasktracker/` with a default config and empty collections
    ///
    /// Existing files are left untouched.
    pub fn init(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root)?;
        let storage = Storage::new(root.canonicalize()?);
        storage.ensure_data_dir()?;

        let config_path = storage.config_file();
        if !config_path.exists() {
            Config::default().save(&config_path)?;
        }

        let mut store = Self::open(storage.root())?;
        store.init_file(&storage.tasks_file(), &TaskCollection::default())?;
        store.init_file(&storage.archives_file(), &ArchiveCollection::default())?;
        store.init_file(&storage.dependencies_file(), &DependencyGraph::default())?;
        debug!(root = %store.storage.root().display(), "store initialized");
        Ok(store)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn root(&self) -> &Path {
        self.storage.root()
    }

    /// Drain the warnings recorded since the last call
    pub fn take_warnings(&mut self) -> Vec<StoreWarning> {
        std::mem::take(&mut self.warnings)
    }

    pub(crate) fn ttl(&self) -> Duration {
        self.config.cache_ttl()
    }

    // =========================================================================
    // Collection loading
    // =========================================================================

    fn init_file<T: Serialize>(&mut self, path: &Path, empty: &T) -> Result<()> {
        if path.exists() {
            return Ok(());
        }
        self.cache.write(path, empty, WriteOptions::forced())?;
        Ok(())
    }

    /// Read a collection, recovering from unreadable content
    ///
    /// A missing file yields `T::default()`. A corrupt one is copied to a
    /// `.corrupt-<timestamp>` sibling and replaced by `T::default()`.
    pub(crate) fn load_collection<T>(&mut self, path: &Path) -> Result<T>
    where
        T: DeserializeOwned + Serialize + Default,
    {
        let ttl = self.ttl();
        match self.cache.read_or_init::<T>(path, ttl) {
            Ok(collection) => Ok(collection),
            Err(Error::CorruptData { reason, .. }) => self.quarantine(path, reason),
            Err(err) => Err(err),
        }
    }

    fn quarantine<T>(&mut self, path: &Path, reason: String) -> Result<T>
    where
        T: Serialize + Default,
    {
        let backup = self.storage.backup_path(path, Utc::now());
        fs::copy(path, &backup)?;
        self.cache.invalidate(Some(path));

        let empty = T::default();
        self.cache.write(path, &empty, WriteOptions::forced())?;

        warn!(
            path = %path.display(),
            backup = %backup.display(),
            reason = %reason,
            "corrupt data file quarantined and reset"
        );
        self.warnings.push(StoreWarning::CorruptFileRecovered {
            path: path.to_path_buf(),
            backup,
            reason,
        });
        Ok(empty)
    }

    pub(crate) fn load_tasks(&mut self) -> Result<TaskCollection> {
        let path = self.storage.tasks_file();
        let mut collection: TaskCollection = self.load_collection(&path)?;
        check_unique_ids(&path, collection.tasks.iter())?;

        let max_id = collection.max_id();
        if collection.last_id < max_id {
            warn!(
                path = %path.display(),
                last_id = collection.last_id,
                max_id,
                "lastId behind stored ids, repairing"
            );
            let warning = StoreWarning::LastIdRepaired {
                path,
                from: collection.last_id,
                to: max_id,
            };
            // Repeated loads before the next save see the same stale value.
            if !self.warnings.contains(&warning) {
                self.warnings.push(warning);
            }
            collection.last_id = max_id;
        }
        Ok(collection)
    }

    pub(crate) fn load_archives(&mut self) -> Result<ArchiveCollection> {
        let path = self.storage.archives_file();
        let collection: ArchiveCollection = self.load_collection(&path)?;
        check_unique_ids(&path, collection.archives.iter())?;
        Ok(collection)
    }

    pub(crate) fn save_tasks(&mut self, collection: &TaskCollection) -> Result<WriteOutcome> {
        let path = self.storage.tasks_file();
        self.cache.write(&path, collection, WriteOptions::default())
    }

    // =========================================================================
    // Task CRUD
    // =========================================================================

    pub fn create_task(&mut self, new: NewTask) -> Result<Task> {
        let title = validate::sanitize_title(&new.title)?;
        let description = match new.description.as_deref() {
            Some(raw) => validate::sanitize_description(raw)?,
            None => String::new(),
        };
        let category = self.check_field(
            "category",
            new.category.as_deref(),
            &self.config.default_category,
            &self.config.task_categories,
        )?;
        let status = self.check_field(
            "status",
            new.status.as_deref(),
            &self.config.default_status,
            &self.config.task_statuses,
        )?;
        let priority = self.check_field(
            "priority",
            new.priority.as_deref(),
            &self.config.default_priority,
            &self.config.priority_levels,
        )?;
        let effort = self.check_effort(new.effort.as_deref())?;
        let related_files = self.normalize_paths(&new.related_files)?;

        let mut tasks = self.load_tasks()?;
        let archives = self.load_archives()?;
        let id = tasks
            .last_id
            .max(tasks.max_id())
            .max(archives.max_id())
            .checked_add(1)
            .ok_or_else(|| Error::Conflict("no task ids left: lastId is at its maximum".into()))?;

        let now = Utc::now();
        let task = Task {
            id,
            title,
            description,
            category,
            status,
            priority,
            effort,
            created: now,
            last_updated: now,
            related_files,
            comments: Vec::new(),
            checklists: Vec::new(),
            archived: None,
        };
        tasks.tasks.push(task.clone());
        tasks.last_id = id;
        self.save_tasks(&tasks)?;

        debug!(id, "task created");
        Ok(task)
    }

    pub fn get_task(&mut self, id: u64) -> Result<Task> {
        self.load_tasks()?
            .find(id)
            .cloned()
            .ok_or(Error::TaskNotFound(id))
    }

    pub fn list_tasks(&mut self) -> Result<Vec<Task>> {
        Ok(self.load_tasks()?.tasks)
    }

    /// Tasks matching every predicate of `filter`, in stored order
    pub fn filter_tasks(&mut self, filter: &TaskFilter) -> Result<Vec<Task>> {
        Ok(self
            .load_tasks()?
            .tasks
            .into_iter()
            .filter(|task| filter.matches(task))
            .collect())
    }

    /// Apply the supplied fields of `patch`; others stay as they are
    pub fn update_task(&mut self, id: u64, patch: TaskPatch) -> Result<Task> {
        if patch.is_empty() {
            return Err(Error::validation("patch", "no fields to update"));
        }

        let title = patch
            .title
            .as_deref()
            .map(validate::sanitize_title)
            .transpose()?;
        let description = patch
            .description
            .as_deref()
            .map(validate::sanitize_description)
            .transpose()?;
        let category = patch
            .category
            .as_deref()
            .map(|value| validate::check_enum("category", value, &self.config.task_categories))
            .transpose()?;
        let status = patch
            .status
            .as_deref()
            .map(|value| validate::check_enum("status", value, &self.config.task_statuses))
            .transpose()?;
        let priority = patch
            .priority
            .as_deref()
            .map(|value| validate::check_enum("priority", value, &self.config.priority_levels))
            .transpose()?;
        let effort = match patch.effort {
            Some(effort) => Some(self.check_effort(effort.as_deref())?),
            None => None,
        };
        let related_files = patch
            .related_files
            .as_deref()
            .map(|paths| self.normalize_paths(paths))
            .transpose()?;

        self.mutate_task(id, move |task| {
            if let Some(title) = title {
                task.title = title;
            }
            if let Some(description) = description {
                task.description = description;
            }
            if let Some(category) = category {
                task.category = category;
            }
            if let Some(status) = status {
                task.status = status;
            }
            if let Some(priority) = priority {
                task.priority = priority;
            }
            if let Some(effort) = effort {
                task.effort = effort;
            }
            if let Some(related_files) = related_files {
                task.related_files = related_files;
            }
            Ok(())
        })
    }

    /// Remove a task and return it
    ///
    /// Dependency edges that mention it are kept; see
    /// [`TaskStore::dangling_dependencies`].
    pub fn delete_task(&mut self, id: u64) -> Result<Task> {
        let mut tasks = self.load_tasks()?;
        let removed = tasks.remove(id).ok_or(Error::TaskNotFound(id))?;
        self.save_tasks(&tasks)?;
        debug!(id, "task deleted");
        Ok(removed)
    }

    // =========================================================================
    // Task detail mutations
    // =========================================================================

    pub fn add_comment(&mut self, id: u64, author: Option<&str>, text: &str) -> Result<Task> {
        let author = validate::sanitize_author(author)?;
        let text = validate::sanitize_comment(text)?;
        self.mutate_task(id, move |task| {
            task.comments.push(Comment {
                author,
                timestamp: Utc::now(),
                text,
            });
            Ok(())
        })
    }

    pub fn add_checklist<S: AsRef<str>>(
        &mut self,
        id: u64,
        title: &str,
        items: &[S],
    ) -> Result<Task> {
        let title = validate::sanitize_checklist_text("checklist", title)?;
        let items = items
            .iter()
            .map(|item| {
                validate::sanitize_checklist_text("checklistItem", item.as_ref()).map(|text| {
                    ChecklistItem {
                        text,
                        completed: false,
                    }
                })
            })
            .collect::<Result<Vec<_>>>()?;
        self.mutate_task(id, move |task| {
            task.checklists.push(Checklist { title, items });
            Ok(())
        })
    }

    /// Append one item to the checklist at index `list`
    pub fn add_checklist_item(&mut self, id: u64, list: usize, text: &str) -> Result<Task> {
        let text = validate::sanitize_checklist_text("checklistItem", text)?;
        self.mutate_task(id, move |task| {
            let checklist = checklist_at(task, list)?;
            checklist.items.push(ChecklistItem {
                text,
                completed: false,
            });
            Ok(())
        })
    }

    /// Mark item `item` of checklist `list` (both zero-based)
    pub fn set_checklist_item(
        &mut self,
        id: u64,
        list: usize,
        item: usize,
        completed: bool,
    ) -> Result<Task> {
        self.mutate_task(id, move |task| {
            let checklist = checklist_at(task, list)?;
            let entry = checklist.items.get_mut(item).ok_or_else(|| {
                Error::validation("checklistItem", format!("no item at index {item}"))
            })?;
            entry.completed = completed;
            Ok(())
        })
    }

    pub fn add_related_files<S: AsRef<str>>(&mut self, id: u64, paths: &[S]) -> Result<Task> {
        let additions = self.normalize_paths(paths)?;
        self.mutate_task(id, move |task| {
            validate::merge_paths(&mut task.related_files, additions);
            Ok(())
        })
    }

    pub fn remove_related_file(&mut self, id: u64, path: &str) -> Result<Task> {
        let target = validate::normalize_path(path, self.root(), &[])?;
        self.mutate_task(id, move |task| {
            let before = task.related_files.len();
            task.related_files.retain(|existing| *existing != target);
            if task.related_files.len() == before {
                return Err(Error::validation(
                    "relatedFiles",
                    format!("'{target}' is not linked to task {}", task.id),
                ));
            }
            Ok(())
        })
    }

    /// Load, edit one task in place, stamp `lastUpdated`, save
    fn mutate_task<F>(&mut self, id: u64, f: F) -> Result<Task>
    where
        F: FnOnce(&mut Task) -> Result<()>,
    {
        let mut tasks = self.load_tasks()?;
        let task = tasks.find_mut(id).ok_or(Error::TaskNotFound(id))?;
        f(task)?;
        task.last_updated = Utc::now();
        let updated = task.clone();
        self.save_tasks(&tasks)?;
        Ok(updated)
    }

    // =========================================================================
    // Field checks
    // =========================================================================

    fn check_field(
        &self,
        field: &str,
        value: Option<&str>,
        default: &str,
        allowed: &[String],
    ) -> Result<String> {
        validate::check_enum(field, value.unwrap_or(default), allowed)
    }

    fn check_effort(&self, effort: Option<&str>) -> Result<Option<String>> {
        effort
            .map(|value| validate::check_enum("effort", value, &self.config.effort_estimation))
            .transpose()
    }

    fn normalize_paths<S: AsRef<str>>(&self, paths: &[S]) -> Result<Vec<String>> {
        validate::normalize_paths(paths, self.root(), &self.config.disallowed_file_extensions)
    }
}

fn checklist_at(task: &mut Task, list: usize) -> Result<&mut Checklist> {
    task.checklists
        .get_mut(list)
        .ok_or_else(|| Error::validation("checklist", format!("no checklist at index {list}")))
}

fn check_unique_ids<'a>(path: &Path, tasks: impl Iterator<Item = &'a Task>) -> Result<()> {
    let mut seen = HashSet::new();
    for task in tasks {
        if !seen.insert(task.id) {
            return Err(Error::Conflict(format!(
                "duplicate task id {} in {}",
                task.id,
                path.display()
            )));
        }
    }
    Ok(())
}
