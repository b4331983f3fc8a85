//! Task records and the predicates used to select them.
//!
//! Tasks live in `.tasktracker/tasks.json` as `{ "lastId", "tasks" }` and,
//! once archived, in `.tasktracker/archives.json` with an `archived` block.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checklist {
    pub title: String,
    #[serde(default)]
    pub items: Vec<ChecklistItem>,
}

impl Checklist {
    pub fn completed_count(&self) -> usize {
        self.items.iter().filter(|item| item.completed).count()
    }
}

/// Provenance attached while a task lives in the archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveInfo {
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub status: String,
    pub priority: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort: Option<String>,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub related_files: Vec<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub checklists: Vec<Checklist>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived: Option<ArchiveInfo>,
}

/// Root of `tasks.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCollection {
    #[serde(default)]
    pub last_id: u64,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl TaskCollection {
    pub fn find(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn find_mut(&mut self, id: u64) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|task| task.id == id)
    }

    pub fn remove(&mut self, id: u64) -> Option<Task> {
        let idx = self.tasks.iter().position(|task| task.id == id)?;
        Some(self.tasks.remove(idx))
    }

    pub fn max_id(&self) -> u64 {
        self.tasks.iter().map(|task| task.id).max().unwrap_or(0)
    }
}

/// Fields accepted by `create_task`; unset enums take the configured defaults
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub effort: Option<String>,
    pub related_files: Vec<String>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    pub fn effort(mut self, effort: impl Into<String>) -> Self {
        self.effort = Some(effort.into());
        self
    }

    pub fn related_file(mut self, path: impl Into<String>) -> Self {
        self.related_files.push(path.into());
        self
    }
}

/// Partial update; `None` leaves a field untouched
///
/// `effort: Some(None)` clears the estimate. `related_files` replaces the
/// whole list when set.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub effort: Option<Option<String>>,
    pub related_files: Option<Vec<String>>,
}

impl TaskPatch {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    pub fn effort(mut self, effort: Option<String>) -> Self {
        self.effort = Some(effort);
        self
    }

    pub fn related_files(mut self, files: Vec<String>) -> Self {
        self.related_files = Some(files);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.effort.is_none()
            && self.related_files.is_none()
    }
}

/// Field predicates combined with AND
///
/// Enum fields match exactly; text fields match case-insensitive substrings.
/// `text` matches if any of title, description or comment text contains it.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub comment: Option<String>,
    pub text: Option<String>,
}

impl TaskFilter {
    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    pub fn title(mut self, needle: impl Into<String>) -> Self {
        self.title = Some(needle.into());
        self
    }

    pub fn description(mut self, needle: impl Into<String>) -> Self {
        self.description = Some(needle.into());
        self
    }

    pub fn comment(mut self, needle: impl Into<String>) -> Self {
        self.comment = Some(needle.into());
        self
    }

    pub fn text(mut self, needle: impl Into<String>) -> Self {
        self.text = Some(needle.into());
        self
    }

    pub fn matches(&self, task: &Task) -> bool {
        if !equals(&self.status, &task.status)
            || !equals(&self.category, &task.category)
            || !equals(&self.priority, &task.priority)
        {
            return false;
        }
        if let Some(needle) = &self.title {
            if !contains(&task.title, needle) {
                return false;
            }
        }
        if let Some(needle) = &self.description {
            if !contains(&task.description, needle) {
                return false;
            }
        }
        if let Some(needle) = &self.comment {
            if !comments_contain(task, needle) {
                return false;
            }
        }
        if let Some(needle) = &self.text {
            if !contains(&task.title, needle)
                && !contains(&task.description, needle)
                && !comments_contain(task, needle)
            {
                return false;
            }
        }
        true
    }
}

fn equals(expected: &Option<String>, actual: &str) -> bool {
    expected
        .as_deref()
        .map(|value| value.trim() == actual)
        .unwrap_or(true)
}

pub(crate) fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn comments_contain(task: &Task, needle: &str) -> bool {
    task.comments
        .iter()
        .any(|comment| contains(&comment.text, needle))
}
