//! Task commands: add, show, update, rm, list, comment

use crate::cli::GlobalOptions;
use crate::dependency::DanglingReference;
use crate::error::Result;
use crate::output::Message;
use crate::task::{NewTask, Task, TaskFilter, TaskPatch};

/// Options for `tasktracker add`
pub struct AddOptions {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub effort: Option<String>,
    pub files: Vec<String>,
}

/// Options for `tasktracker update`
pub struct UpdateOptions {
    pub id: u64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub effort: Option<String>,
    pub clear_effort: bool,
    pub files: Vec<String>,
}

/// Options for `tasktracker list`
pub struct ListOptions {
    pub status: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub text: Option<String>,
}

#[derive(serde::Serialize)]
struct ListReport {
    total: usize,
    tasks: Vec<Task>,
}

#[derive(serde::Serialize)]
struct RemovedReport {
    task: Task,
    /// Edges that now point at the removed id
    dangling: Vec<DanglingReference>,
}

pub fn run_add(global: &GlobalOptions, options: AddOptions) -> Result<()> {
    let mut store = global.open_store()?;

    let new = NewTask {
        title: options.title,
        description: options.description,
        category: options.category,
        status: options.status,
        priority: options.priority,
        effort: options.effort,
        related_files: options.files,
    };
    let task = store.create_task(new)?;

    let mut message = task_message(format!("Created task {}", task.id), &task);
    message.hint(format!("tasktracker show {}", task.id));
    global.reply(&mut store, &task, &message)
}

pub fn run_show(global: &GlobalOptions, id: u64, archived: bool) -> Result<()> {
    let mut store = global.open_store()?;
    let task = if archived {
        store.get_archived(id)?
    } else {
        store.get_task(id)?
    };

    let mut message = task_message(format!("Task {}: {}", task.id, task.title), &task);
    if !task.description.is_empty() {
        message.line(task.description.clone());
    }
    for comment in &task.comments {
        message.line(format!(
            "[{}] {}: {}",
            comment.timestamp.format("%Y-%m-%d %H:%M"),
            comment.author,
            comment.text
        ));
    }
    for checklist in &task.checklists {
        message.line(format!(
            "{} ({}/{})",
            checklist.title,
            checklist.completed_count(),
            checklist.items.len()
        ));
    }
    global.reply(&mut store, &task, &message)
}

pub fn run_update(global: &GlobalOptions, options: UpdateOptions) -> Result<()> {
    let mut store = global.open_store()?;

    let mut patch = TaskPatch {
        title: options.title,
        description: options.description,
        category: options.category,
        status: options.status,
        priority: options.priority,
        ..TaskPatch::default()
    };
    if options.clear_effort {
        patch.effort = Some(None);
    } else if let Some(effort) = options.effort {
        patch.effort = Some(Some(effort));
    }
    if !options.files.is_empty() {
        patch.related_files = Some(options.files);
    }

    let task = store.update_task(options.id, patch)?;
    let message = task_message(format!("Updated task {}", task.id), &task);
    global.reply(&mut store, &task, &message)
}

pub fn run_rm(global: &GlobalOptions, id: u64) -> Result<()> {
    let mut store = global.open_store()?;
    let task = store.delete_task(id)?;
    let dangling: Vec<DanglingReference> = store
        .dangling_dependencies()?
        .into_iter()
        .filter(|edge| edge.missing.contains(&id))
        .collect();

    let mut message = Message::new(format!("Deleted task {}: {}", task.id, task.title));
    if !dangling.is_empty() {
        message
            .note(format!("{} dependency edge(s) now reference task {id}", dangling.len()))
            .hint("tasktracker dep ls");
    }

    let report = RemovedReport { task, dangling };
    global.reply(&mut store, &report, &message)
}

pub fn run_list(global: &GlobalOptions, options: ListOptions) -> Result<()> {
    let mut store = global.open_store()?;

    let filter = TaskFilter {
        status: options.status,
        category: options.category,
        priority: options.priority,
        text: options.text,
        ..TaskFilter::default()
    };
    let tasks = store.filter_tasks(&filter)?;

    let mut message = Message::new(format!("{} task(s)", tasks.len()));
    for task in &tasks {
        message.line(task_line(task));
    }
    if tasks.is_empty() {
        message.hint("tasktracker add \"<title>\"");
    }

    let report = ListReport {
        total: tasks.len(),
        tasks,
    };
    global.reply(&mut store, &report, &message)
}

pub fn run_comment(
    global: &GlobalOptions,
    id: u64,
    author: Option<&str>,
    text: &str,
) -> Result<()> {
    let mut store = global.open_store()?;
    let task = store.add_comment(id, author, text)?;

    let mut message = Message::new(format!("Commented on task {}", task.id));
    if let Some(comment) = task.comments.last() {
        message
            .field("author", comment.author.clone())
            .field("comments", task.comments.len().to_string());
    }
    global.reply(&mut store, &task, &message)
}

pub(crate) fn task_line(task: &Task) -> String {
    format!(
        "#{} [{}] {} ({}, {})",
        task.id, task.status, task.title, task.category, task.priority
    )
}

fn task_message(headline: String, task: &Task) -> Message {
    let mut message = Message::new(headline);
    message
        .field("title", task.title.clone())
        .field("status", task.status.clone())
        .field("category", task.category.clone())
        .field("priority", task.priority.clone());
    if let Some(effort) = &task.effort {
        message.field("effort", effort.clone());
    }
    if !task.related_files.is_empty() {
        message.field("files", task.related_files.join(", "));
    }
    message
}
