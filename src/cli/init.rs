//! tasktracker init command implementation
//!
//! Creates `.tasktracker/` with a default config and empty collections.

use std::path::PathBuf;

use crate::cli::GlobalOptions;
use crate::error::Result;
use crate::output::Message;
use crate::store::TaskStore;

#[derive(serde::Serialize)]
struct InitReport {
    root: PathBuf,
    data_dir: PathBuf,
    created: bool,
}

pub fn run(global: &GlobalOptions) -> Result<()> {
    let root = global.resolve_root()?;
    let existed = root.join(crate::storage::DATA_DIR).is_dir();

    let mut store = TaskStore::init(&root)?;
    let report = InitReport {
        root: store.root().to_path_buf(),
        data_dir: store.storage().data_dir(),
        created: !existed,
    };

    let header = if existed {
        "tasktracker init: already initialized"
    } else {
        "tasktracker init: created store"
    };
    let mut message = Message::new(header);
    message
        .field("root", report.root.display().to_string())
        .field("data", report.data_dir.display().to_string())
        .hint("tasktracker add \"<title>\"");
    global.reply(&mut store, &report, &message)
}
