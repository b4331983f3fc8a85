//! Dependency graph side index
//!
//! Stored in `.tasktracker/dependencies.json`:
//!
//! ```text
//! { "dependencies": { "2": ["1"] }, "blockedBy": { "1": ["2"] } }
//! ```
//!
//! Ids are written as decimal strings; lists holding plain JSON numbers are
//! read as well.
//!
//! `dependencies[a]` lists what `a` depends on; `blockedBy[b]` lists what
//! waits on `b`. Both maps change together. Edges may reference ids that no
//! longer exist; they are reported by [`TaskStore::dangling_dependencies`]
//! and never removed automatically. Cycles are allowed.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::WriteOptions;
use crate::error::{Error, Result};
use crate::store::TaskStore;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyGraph {
    #[serde(default, with = "id_lists")]
    pub dependencies: BTreeMap<u64, Vec<u64>>,
    #[serde(default, with = "id_lists")]
    pub blocked_by: BTreeMap<u64, Vec<u64>>,
}

/// `{ "<id>": ["<id>", ...] }` adjacency maps
mod id_lists {
    use std::collections::BTreeMap;

    use serde::de::Error as _;
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(u64),
        Text(String),
    }

    pub fn serialize<S>(map: &BTreeMap<u64, Vec<u64>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut out = serializer.serialize_map(Some(map.len()))?;
        for (key, ids) in map {
            let ids: Vec<String> = ids.iter().map(u64::to_string).collect();
            out.serialize_entry(&key.to_string(), &ids)?;
        }
        out.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<u64, Vec<u64>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<u64, Vec<RawId>>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(key, ids)| -> Result<(u64, Vec<u64>), D::Error> {
                let ids = ids
                    .into_iter()
                    .map(|id| match id {
                        RawId::Number(id) => Ok(id),
                        RawId::Text(text) => text
                            .trim()
                            .parse::<u64>()
                            .map_err(|_| D::Error::custom(format!("invalid task id {text:?}"))),
                    })
                    .collect::<Result<Vec<u64>, D::Error>>()?;
                Ok((key, ids))
            })
            .collect()
    }
}

impl DependencyGraph {
    /// Record that `task` depends on `depends_on`
    ///
    /// Returns `false` when the edge was already present.
    pub fn add_edge(&mut self, task: u64, depends_on: u64) -> Result<bool> {
        if task == 0 || depends_on == 0 {
            return Err(Error::validation("dependsOn", "task ids must be positive"));
        }
        if task == depends_on {
            return Err(Error::validation(
                "dependsOn",
                format!("task {task} cannot depend on itself"),
            ));
        }

        let added = insert(&mut self.dependencies, task, depends_on);
        insert(&mut self.blocked_by, depends_on, task);
        Ok(added)
    }

    /// Returns `false` when there was no such edge
    pub fn remove_edge(&mut self, task: u64, depends_on: u64) -> bool {
        let removed = remove(&mut self.dependencies, task, depends_on);
        remove(&mut self.blocked_by, depends_on, task);
        removed
    }

    /// Ids `task` depends on, in insertion order
    pub fn dependencies_of(&self, task: u64) -> &[u64] {
        self.dependencies.get(&task).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ids waiting on `task`, in insertion order
    pub fn dependents_of(&self, task: u64) -> &[u64] {
        self.blocked_by.get(&task).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every `(task, depends_on)` pair
    pub fn edges(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.dependencies
            .iter()
            .flat_map(|(task, targets)| targets.iter().map(move |target| (*task, *target)))
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty() && self.blocked_by.is_empty()
    }
}

fn insert(map: &mut BTreeMap<u64, Vec<u64>>, key: u64, value: u64) -> bool {
    let list = map.entry(key).or_default();
    if list.contains(&value) {
        return false;
    }
    list.push(value);
    true
}

fn remove(map: &mut BTreeMap<u64, Vec<u64>>, key: u64, value: u64) -> bool {
    let Some(list) = map.get_mut(&key) else {
        return false;
    };
    let before = list.len();
    list.retain(|existing| *existing != value);
    let removed = list.len() != before;
    if list.is_empty() {
        map.remove(&key);
    }
    removed
}

/// An edge endpoint found in neither the active nor the archived tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DanglingReference {
    pub task_id: u64,
    pub depends_on_id: u64,
    /// The id(s) of the pair that do not resolve
    pub missing: Vec<u64>,
}

impl TaskStore {
    fn load_graph(&mut self) -> Result<DependencyGraph> {
        let path = self.storage.dependencies_file();
        self.load_collection(&path)
    }

    fn save_graph(&mut self, graph: &DependencyGraph) -> Result<()> {
        let path = self.storage.dependencies_file();
        self.cache.write(&path, graph, WriteOptions::default())?;
        Ok(())
    }

    /// Returns `true` when a new edge was recorded
    pub fn add_dependency(&mut self, task: u64, depends_on: u64) -> Result<bool> {
        let mut graph = self.load_graph()?;
        let added = graph.add_edge(task, depends_on)?;
        if added {
            self.save_graph(&graph)?;
            debug!(task, depends_on, "dependency added");
        }
        Ok(added)
    }

    /// Returns `true` when an edge was removed
    pub fn remove_dependency(&mut self, task: u64, depends_on: u64) -> Result<bool> {
        let mut graph = self.load_graph()?;
        let removed = graph.remove_edge(task, depends_on);
        if removed {
            self.save_graph(&graph)?;
            debug!(task, depends_on, "dependency removed");
        }
        Ok(removed)
    }

    pub fn get_dependencies(&mut self, task: u64) -> Result<Vec<u64>> {
        Ok(self.load_graph()?.dependencies_of(task).to_vec())
    }

    pub fn get_blocked_by(&mut self, task: u64) -> Result<Vec<u64>> {
        Ok(self.load_graph()?.dependents_of(task).to_vec())
    }

    pub fn dependency_graph(&mut self) -> Result<DependencyGraph> {
        self.load_graph()
    }

    /// Edges whose endpoints resolve to no active or archived task
    pub fn dangling_dependencies(&mut self) -> Result<Vec<DanglingReference>> {
        let graph = self.load_graph()?;
        if graph.is_empty() {
            return Ok(Vec::new());
        }

        let tasks = self.load_tasks()?;
        let archives = self.load_archives()?;
        let known: HashSet<u64> = tasks
            .tasks
            .iter()
            .chain(archives.archives.iter())
            .map(|task| task.id)
            .collect();

        Ok(graph
            .edges()
            .filter_map(|(task_id, depends_on_id)| {
                let missing: Vec<u64> = [task_id, depends_on_id]
                    .into_iter()
                    .filter(|id| !known.contains(id))
                    .collect();
                (!missing.is_empty()).then_some(DanglingReference {
                    task_id,
                    depends_on_id,
                    missing,
                })
            })
            .collect())
    }
}
