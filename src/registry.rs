use crate::constants::{
    DEFAULT_BRANCH, DEFAULT_BRANCH_PREFIX, DEFAULT_WORKTREES_DIR, REGISTRY_DIR, REGISTRY_FILE,
};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One tracked unit of work: a worktree, its branch, and optional ticket
/// metadata. Immutable once created; the registry only appends and removes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Task {
    pub(crate) id: String,
    pub(crate) description: String,
    pub(crate) worktree: PathBuf,
    pub(crate) branch: String,
    pub(crate) repo_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) connector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) ticket_key: Option<String>,
    pub(crate) created: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ConnectorConfig {
    #[serde(default)]
    pub(crate) url: String,
    #[serde(default)]
    pub(crate) email: String,
    #[serde(default)]
    pub(crate) api_token: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub(crate) project: String,
}

/// The persisted document: scalar settings first, then tables, so the TOML
/// serializer emits a valid layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct RegistryState {
    worktrees_base: PathBuf,
    default_branch: String,
    branch_prefix: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    default_agent: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    agent_aliases: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    connectors: BTreeMap<String, ConnectorConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tasks: Vec<Task>,
}

impl Default for RegistryState {
    fn default() -> Self {
        let worktrees_base = dirs::home_dir()
            .map(|home| home.join(DEFAULT_WORKTREES_DIR))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_WORKTREES_DIR));
        Self {
            worktrees_base,
            default_branch: DEFAULT_BRANCH.to_string(),
            branch_prefix: DEFAULT_BRANCH_PREFIX.to_string(),
            default_agent: String::new(),
            agent_aliases: BTreeMap::new(),
            connectors: BTreeMap::new(),
            tasks: Vec::new(),
        }
    }
}

/// Durable task registry. Every mutating call persists before returning, so
/// the in-memory and on-disk views never diverge after success. The mutex
/// serializes mutations within this process; concurrent invocations of the
/// binary against the same file are out of scope.
#[derive(Debug)]
pub(crate) struct Registry {
    path: PathBuf,
    state: Mutex<RegistryState>,
}

impl Registry {
    pub(crate) fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| Error::Validation("cannot determine config directory".to_string()))?;
        Ok(dir.join(REGISTRY_DIR).join(REGISTRY_FILE))
    }

    pub(crate) fn load() -> Result<Self> {
        Self::load_from(Self::default_path()?)
    }

    /// Reads persisted state, or starts from defaults if none exists yet.
    pub(crate) fn load_from(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|source| Error::Io {
                operation: "failed to read registry file",
                path: path.clone(),
                source,
            })?;
            toml::from_str(&raw).map_err(|err| Error::CorruptRegistry {
                path: path.clone(),
                detail: err.to_string(),
            })?
        } else {
            RegistryState::default()
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// All-or-nothing persist: serialize, write a sibling temp file, rename
    /// over the target. A failure leaves the previous on-disk state intact.
    fn save(&self, state: &RegistryState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| Error::Io {
                operation: "failed to create registry directory",
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let rendered = toml::to_string_pretty(state).map_err(|err| Error::Validation(format!(
            "failed to serialize registry: {err}"
        )))?;
        let tmp = self.path.with_extension("toml.tmp");
        fs::write(&tmp, rendered).map_err(|source| Error::Io {
            operation: "failed to write registry file",
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| Error::Io {
            operation: "failed to replace registry file",
            path: self.path.clone(),
            source,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryState> {
        // A poisoned lock means another thread panicked mid-mutation; the
        // state it guards was never persisted, so continuing is safe.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn add_task(&self, task: Task) -> Result<()> {
        let mut state = self.lock();
        if state.tasks.iter().any(|existing| existing.id == task.id) {
            return Err(Error::Validation(format!(
                "task id `{}` is already registered",
                task.id
            )));
        }
        if let Some(existing) = state
            .tasks
            .iter()
            .find(|existing| paths_equal(&existing.worktree, &task.worktree))
        {
            return Err(Error::WorktreeInUse {
                path: task.worktree,
                task_id: existing.id.clone(),
            });
        }
        state.tasks.push(task);
        if let Err(err) = self.save(&state) {
            state.tasks.pop();
            return Err(err);
        }
        Ok(())
    }

    pub(crate) fn remove_task(&self, id: &str) -> Result<Task> {
        let mut state = self.lock();
        let index = state
            .tasks
            .iter()
            .position(|task| task.id == id)
            .ok_or_else(|| Error::TaskNotFound { id: id.to_string() })?;
        let removed = state.tasks.remove(index);
        if let Err(err) = self.save(&state) {
            state.tasks.insert(index, removed);
            return Err(err);
        }
        Ok(removed)
    }

    pub(crate) fn find_task(&self, id: &str) -> Result<Task> {
        self.lock()
            .tasks
            .iter()
            .find(|task| task.id == id)
            .cloned()
            .ok_or_else(|| Error::TaskNotFound { id: id.to_string() })
    }

    pub(crate) fn find_task_by_worktree(&self, dir: &Path) -> Result<Task> {
        self.lock()
            .tasks
            .iter()
            .find(|task| paths_equal(&task.worktree, dir))
            .cloned()
            .ok_or_else(|| Error::NoTaskForWorktree {
                path: dir.to_path_buf(),
            })
    }

    pub(crate) fn tasks(&self) -> Vec<Task> {
        self.lock().tasks.clone()
    }

    pub(crate) fn worktrees_base(&self) -> PathBuf {
        self.lock().worktrees_base.clone()
    }

    pub(crate) fn branch_prefix(&self) -> String {
        self.lock().branch_prefix.clone()
    }

    pub(crate) fn default_branch(&self) -> String {
        self.lock().default_branch.clone()
    }

    pub(crate) fn default_agent(&self) -> String {
        self.lock().default_agent.clone()
    }

    pub(crate) fn agent_aliases(&self) -> BTreeMap<String, String> {
        self.lock().agent_aliases.clone()
    }

    pub(crate) fn connector(&self, name: &str) -> Option<ConnectorConfig> {
        self.lock().connectors.get(name).cloned()
    }

    pub(crate) fn connector_names(&self) -> Vec<String> {
        self.lock().connectors.keys().cloned().collect()
    }

    pub(crate) fn set_connector(&self, name: &str, config: ConnectorConfig) -> Result<()> {
        let mut state = self.lock();
        let previous = state.connectors.insert(name.to_string(), config);
        if let Err(err) = self.save(&state) {
            match previous {
                Some(value) => {
                    state.connectors.insert(name.to_string(), value);
                }
                None => {
                    state.connectors.remove(name);
                }
            }
            return Err(err);
        }
        Ok(())
    }

    pub(crate) fn get_value(&self, key: &str) -> Result<String> {
        let state = self.lock();
        match key {
            "worktrees_base" => Ok(state.worktrees_base.display().to_string()),
            "default_branch" => Ok(state.default_branch.clone()),
            "branch_prefix" => Ok(state.branch_prefix.clone()),
            "default_agent" => Ok(state.default_agent.clone()),
            _ => Err(Error::Validation(format!("unknown config key: {key}"))),
        }
    }

    pub(crate) fn set_value(&self, key: &str, value: &str) -> Result<()> {
        let mut state = self.lock();
        let previous = match key {
            "worktrees_base" => {
                let old = std::mem::replace(&mut state.worktrees_base, PathBuf::from(value));
                old.display().to_string()
            }
            "default_branch" => std::mem::replace(&mut state.default_branch, value.to_string()),
            "branch_prefix" => std::mem::replace(&mut state.branch_prefix, value.to_string()),
            "default_agent" => std::mem::replace(&mut state.default_agent, value.to_string()),
            _ => return Err(Error::Validation(format!("unknown config key: {key}"))),
        };
        if let Err(err) = self.save(&state) {
            match key {
                "worktrees_base" => state.worktrees_base = PathBuf::from(previous),
                "default_branch" => state.default_branch = previous,
                "branch_prefix" => state.branch_prefix = previous,
                "default_agent" => state.default_agent = previous,
                _ => {}
            }
            return Err(err);
        }
        Ok(())
    }
}

fn paths_equal(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(ca), Ok(cb)) => ca == cb,
        _ => false,
    }
}
