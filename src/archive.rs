//! Archive store
//!
//! Archived tasks live in `.tasktracker/archives.json` as `{ "archives" }`,
//! each carrying an `archived` block. Moving a task between the two files
//! is one [`Batch`] with an update per file, so a failed write restores
//! both.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::batch::{edit, Batch};
use crate::error::{Error, Result};
use crate::store::TaskStore;
use crate::task::{ArchiveInfo, Task, TaskCollection, TaskFilter};
use crate::validate;

/// Root of `archives.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveCollection {
    #[serde(default)]
    pub archives: Vec<Task>,
}

impl ArchiveCollection {
    pub fn find(&self, id: u64) -> Option<&Task> {
        self.archives.iter().find(|task| task.id == id)
    }

    pub fn remove(&mut self, id: u64) -> Option<Task> {
        let idx = self.archives.iter().position(|task| task.id == id)?;
        Some(self.archives.remove(idx))
    }

    pub fn max_id(&self) -> u64 {
        self.archives.iter().map(|task| task.id).max().unwrap_or(0)
    }
}

/// Predicates for [`TaskStore::list_archived`]; date bounds are inclusive
#[derive(Debug, Clone, Default)]
pub struct ArchiveFilter {
    pub status: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub text: Option<String>,
    pub archived_since: Option<DateTime<Utc>>,
    pub archived_until: Option<DateTime<Utc>>,
}

impl ArchiveFilter {
    pub fn matches(&self, task: &Task) -> bool {
        let fields = TaskFilter {
            status: self.status.clone(),
            category: self.category.clone(),
            priority: self.priority.clone(),
            text: self.text.clone(),
            ..TaskFilter::default()
        };
        if !fields.matches(task) {
            return false;
        }

        if self.archived_since.is_none() && self.archived_until.is_none() {
            return true;
        }
        let Some(info) = &task.archived else {
            return false;
        };
        self.archived_since.map_or(true, |since| info.date >= since)
            && self.archived_until.map_or(true, |until| info.date <= until)
    }
}

impl TaskStore {
    /// Move an active task into the archive
    pub fn archive_task(&mut self, id: u64, reason: &str) -> Result<Task> {
        let reason = validate::sanitize_reason(reason)?;
        let tasks = self.load_tasks()?;
        let archives = self.load_archives()?;

        let mut archived = tasks.find(id).cloned().ok_or(Error::TaskNotFound(id))?;
        if archives.find(id).is_some() {
            return Err(Error::Conflict(format!("task {id} is already archived")));
        }
        archived.archived = Some(ArchiveInfo {
            date: Utc::now(),
            reason,
        });

        let tasks_file = self.storage.tasks_file();
        let archives_file = self.storage.archives_file();
        let empty_archive = serde_json::to_value(ArchiveCollection::default())?;

        let record = archived.clone();
        let batch = Batch::new()
            .with_ttl(self.ttl())
            .update(&tasks_file, move |value| {
                edit::<TaskCollection, _>(value, |collection| {
                    collection.remove(id).ok_or(Error::TaskNotFound(id))?;
                    Ok(())
                })
            })
            .update_or_init(&archives_file, empty_archive, move |value| {
                edit::<ArchiveCollection, _>(value, |collection| {
                    collection.archives.push(record);
                    Ok(())
                })
            });
        batch.execute(&mut self.cache)?;

        info!(id, "task archived");
        Ok(archived)
    }

    /// Move an archived task back into the active store
    ///
    /// Nothing is written when the id is already taken by an active task.
    pub fn restore_task(&mut self, id: u64) -> Result<Task> {
        let tasks = self.load_tasks()?;
        let archives = self.load_archives()?;

        let mut restored = archives
            .find(id)
            .cloned()
            .ok_or(Error::ArchivedTaskNotFound(id))?;
        if tasks.find(id).is_some() {
            return Err(Error::Conflict(format!(
                "cannot restore task {id}: an active task already uses that id"
            )));
        }
        restored.archived = None;

        let tasks_file = self.storage.tasks_file();
        let archives_file = self.storage.archives_file();
        let empty_tasks = serde_json::to_value(TaskCollection::default())?;

        let record = restored.clone();
        let batch = Batch::new()
            .with_ttl(self.ttl())
            .update(&archives_file, move |value| {
                edit::<ArchiveCollection, _>(value, |collection| {
                    collection
                        .remove(id)
                        .ok_or(Error::ArchivedTaskNotFound(id))?;
                    Ok(())
                })
            })
            .update_or_init(&tasks_file, empty_tasks, move |value| {
                edit::<TaskCollection, _>(value, |collection| {
                    collection.last_id = collection.last_id.max(id);
                    collection.tasks.push(record);
                    Ok(())
                })
            });
        batch.execute(&mut self.cache)?;

        info!(id, "task restored");
        Ok(restored)
    }

    /// Archived tasks matching `filter`, sorted by id
    pub fn list_archived(&mut self, filter: &ArchiveFilter) -> Result<Vec<Task>> {
        let mut matched: Vec<Task> = self
            .load_archives()?
            .archives
            .into_iter()
            .filter(|task| filter.matches(task))
            .collect();
        matched.sort_by_key(|task| task.id);
        Ok(matched)
    }

    pub fn get_archived(&mut self, id: u64) -> Result<Task> {
        self.load_archives()?
            .find(id)
            .cloned()
            .ok_or(Error::ArchivedTaskNotFound(id))
    }
}
