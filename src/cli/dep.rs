//! Dependency commands: dep add, dep rm, dep ls

use crate::cli::GlobalOptions;
use crate::dependency::DanglingReference;
use crate::error::Result;
use crate::output::Message;

#[derive(serde::Serialize)]
struct EdgeReport {
    task: u64,
    depends_on: u64,
    changed: bool,
}

#[derive(serde::Serialize)]
struct TaskDepsReport {
    task: u64,
    dependencies: Vec<u64>,
    blocked_by: Vec<u64>,
}

#[derive(serde::Serialize)]
struct GraphReport {
    edges: Vec<(u64, u64)>,
    dangling: Vec<DanglingReference>,
}

pub fn run_add(global: &GlobalOptions, task: u64, depends_on: u64) -> Result<()> {
    let mut store = global.open_store()?;
    let changed = store.add_dependency(task, depends_on)?;

    let header = if changed {
        format!("Task {task} now depends on {depends_on}")
    } else {
        format!("Task {task} already depends on {depends_on}")
    };
    let report = EdgeReport {
        task,
        depends_on,
        changed,
    };
    global.reply(&mut store, &report, &Message::new(header))
}

pub fn run_rm(global: &GlobalOptions, task: u64, depends_on: u64) -> Result<()> {
    let mut store = global.open_store()?;
    let changed = store.remove_dependency(task, depends_on)?;

    let header = if changed {
        format!("Task {task} no longer depends on {depends_on}")
    } else {
        format!("Task {task} did not depend on {depends_on}")
    };
    let report = EdgeReport {
        task,
        depends_on,
        changed,
    };
    global.reply(&mut store, &report, &Message::new(header))
}

pub fn run_ls(global: &GlobalOptions, task: Option<u64>) -> Result<()> {
    let mut store = global.open_store()?;

    if let Some(task) = task {
        let report = TaskDepsReport {
            task,
            dependencies: store.get_dependencies(task)?,
            blocked_by: store.get_blocked_by(task)?,
        };
        let mut message = Message::new(format!("Dependencies of task {task}"));
        message
            .field("depends on", join_ids(&report.dependencies))
            .field("blocks", join_ids(&report.blocked_by));
        return global.reply(&mut store, &report, &message);
    }

    let report = GraphReport {
        edges: store.dependency_graph()?.edges().collect(),
        dangling: store.dangling_dependencies()?,
    };
    let mut message = Message::new(format!("{} dependency edge(s)", report.edges.len()));
    for (task, depends_on) in &report.edges {
        message.line(format!("{task} -> {depends_on}"));
    }
    for edge in &report.dangling {
        message.note(format!(
            "{} -> {} references missing task(s) {}",
            edge.task_id,
            edge.depends_on_id,
            join_ids(&edge.missing)
        ));
    }
    global.reply(&mut store, &report, &message)
}

fn join_ids(ids: &[u64]) -> String {
    if ids.is_empty() {
        return "none".to_string();
    }
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
