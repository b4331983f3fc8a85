//! Archive commands: archive, restore, archived

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::archive::ArchiveFilter;
use crate::cli::task::task_line;
use crate::cli::GlobalOptions;
use crate::error::{Error, Result};
use crate::output::Message;
use crate::task::Task;

/// Options for `tasktracker archived`
pub struct ArchivedOptions {
    pub status: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub text: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
}

#[derive(serde::Serialize)]
struct ArchivedReport {
    total: usize,
    tasks: Vec<Task>,
}

pub fn run_archive(global: &GlobalOptions, id: u64, reason: &str) -> Result<()> {
    let mut store = global.open_store()?;
    let task = store.archive_task(id, reason)?;

    let mut message = Message::new(format!("Archived task {}: {}", task.id, task.title));
    if let Some(info) = task.archived.as_ref().filter(|info| !info.reason.is_empty()) {
        message.field("reason", info.reason.clone());
    }
    message.hint(format!("tasktracker restore {}", task.id));
    global.reply(&mut store, &task, &message)
}

pub fn run_restore(global: &GlobalOptions, id: u64) -> Result<()> {
    let mut store = global.open_store()?;
    let task = store.restore_task(id)?;

    let message = Message::new(format!("Restored task {}: {}", task.id, task.title));
    global.reply(&mut store, &task, &message)
}

pub fn run_archived(global: &GlobalOptions, options: ArchivedOptions) -> Result<()> {
    let filter = ArchiveFilter {
        status: options.status,
        category: options.category,
        priority: options.priority,
        text: options.text,
        archived_since: options
            .since
            .as_deref()
            .map(|raw| parse_bound(raw, false))
            .transpose()?,
        archived_until: options
            .until
            .as_deref()
            .map(|raw| parse_bound(raw, true))
            .transpose()?,
    };

    let mut store = global.open_store()?;
    let tasks = store.list_archived(&filter)?;

    let mut message = Message::new(format!("{} archived task(s)", tasks.len()));
    for task in &tasks {
        let date = task
            .archived
            .as_ref()
            .map(|info| info.date.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        message.line(format!("{} archived {date}", task_line(task)));
    }

    let report = ArchivedReport {
        total: tasks.len(),
        tasks,
    };
    global.reply(&mut store, &report, &message)
}

/// Parse an RFC 3339 timestamp or a bare date
///
/// A bare date as an upper bound covers the whole day.
fn parse_bound(raw: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        Error::InvalidArgument(format!("invalid date '{raw}' (expected YYYY-MM-DD or RFC 3339)"))
    })?;
    let time = if end_of_day {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .ok_or_else(|| Error::InvalidArgument(format!("invalid date '{raw}'")))?;

    Ok(date.and_time(time).and_utc())
}
