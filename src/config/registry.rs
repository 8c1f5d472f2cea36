// src/config/registry.rs

//! Task registry: identifier → resolved [`TaskDefinition`].
//!
//! The registry is built once (two phases: collect every task descriptor,
//! then validate and freeze) and is read-only afterwards, so the engine never
//! depends on initialisation order.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::loader::{config_root_dir, load_and_validate};
use crate::config::model::{ConfigFile, ConfigSection, RawConfigFile, TaskConfig};
use crate::config::vars::expand_vars;
use crate::engine::TaskId;
use crate::errors::{Result, TaskweaveError};
use crate::types::TaskMode;

/// A task with global variables expanded and defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDefinition {
    pub id: TaskId,
    pub name: String,
    pub description: Option<String>,
    pub mode: TaskMode,
    /// Command template for `single` tasks (`${var}` already expanded,
    /// `{{ data }}` placeholders still present).
    pub command: Option<String>,
    pub cwd: Option<PathBuf>,
    pub children: Vec<TaskId>,
    pub parallel: bool,
    pub workers: usize,
    pub continue_on_error: bool,
    pub interactive: bool,
    pub pre_run: Vec<TaskId>,
    pub post_run: Vec<TaskId>,
    pub pre_msg: Option<String>,
    pub on_error: Option<String>,
}

impl TaskDefinition {
    /// Body is a child list rather than a command.
    pub fn is_composite(&self) -> bool {
        self.mode.is_composite() || !self.children.is_empty()
    }

    /// Body runs on the worker pool.
    pub fn runs_on_pool(&self) -> bool {
        self.mode == TaskMode::Batch && self.parallel
    }
}

/// Read-only lookup surface over a validated (or explicitly unchecked) task
/// document.
#[derive(Debug, Clone)]
pub struct TaskRegistry {
    settings: ConfigSection,
    vars: BTreeMap<String, String>,
    tasks: BTreeMap<TaskId, TaskConfig>,
    root_dir: PathBuf,
    source: Option<PathBuf>,
}

impl TaskRegistry {
    /// Load and validate a task file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let cfg = load_and_validate(path)?;
        Ok(Self::from_config(cfg, config_root_dir(path)).with_source(path))
    }

    /// Wrap an already-validated config. Relative `cwd` values are resolved
    /// against `root_dir`.
    pub fn from_config(cfg: ConfigFile, root_dir: impl Into<PathBuf>) -> Self {
        Self {
            settings: cfg.config,
            vars: cfg.vars,
            tasks: cfg.task,
            root_dir: root_dir.into(),
            source: None,
        }
    }

    fn with_source(mut self, path: &Path) -> Self {
        self.source = Some(path.to_path_buf());
        self
    }

    pub fn settings(&self) -> &ConfigSection {
        &self.settings
    }

    /// Path of the task file this registry was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// All task identifiers in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(|s| s.as_str())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Resolve an identifier into a [`TaskDefinition`].
    ///
    /// `${name}` placeholders in `command` and `cwd` are substituted here;
    /// template placeholders are left for the executor.
    pub fn resolve(&self, id: &str) -> Result<TaskDefinition> {
        let task = self
            .tasks
            .get(id)
            .ok_or_else(|| TaskweaveError::TaskNotFound(id.to_string()))?;

        let command = task
            .command
            .as_deref()
            .map(|c| expand_vars(c, &self.vars));

        let cwd = task
            .cwd
            .as_deref()
            .map(|c| expand_vars(c, &self.vars))
            .filter(|c| !c.is_empty() && c != ".")
            .map(|c| {
                let p = PathBuf::from(c);
                if p.is_absolute() { p } else { self.root_dir.join(p) }
            });

        let def = TaskDefinition {
            id: id.to_string(),
            name: task.name.clone().unwrap_or_else(|| id.to_string()),
            description: task.description.clone(),
            mode: task.effective_mode(),
            command,
            cwd,
            children: task.tasks.clone(),
            parallel: task.parallel,
            workers: task.effective_workers(self.settings.workers),
            continue_on_error: task.continue_on_error,
            interactive: task.interactive,
            pre_run: task.pre_run.clone(),
            post_run: task.post_run.clone(),
            pre_msg: task.pre_msg.clone(),
            on_error: task.on_error.clone(),
        };

        debug!(task = %id, mode = %def.mode, "resolved task definition");
        Ok(def)
    }
}

/// Two-phase builder: collect settings, variables and task descriptors, then
/// validate and construct the registry once.
#[derive(Debug, Clone)]
pub struct RegistryBuilder {
    raw: RawConfigFile,
    root_dir: PathBuf,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            raw: RawConfigFile {
                config: ConfigSection::default(),
                vars: BTreeMap::new(),
                task: BTreeMap::new(),
            },
            root_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    pub fn settings(mut self, settings: ConfigSection) -> Self {
        self.raw.config = settings;
        self
    }

    pub fn var(mut self, name: &str, value: &str) -> Self {
        self.raw.vars.insert(name.to_string(), value.to_string());
        self
    }

    pub fn task(mut self, id: &str, task: TaskConfig) -> Self {
        self.raw.task.insert(id.to_string(), task);
        self
    }

    pub fn root_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.root_dir = dir.into();
        self
    }

    /// Validate everything collected so far and freeze it.
    pub fn build(self) -> Result<TaskRegistry> {
        let cfg = ConfigFile::try_from(self.raw)?;
        Ok(TaskRegistry::from_config(cfg, self.root_dir))
    }

    /// Freeze without validation. Cycles are then only defused at run time
    /// by the orchestrator's visited set.
    pub fn build_unchecked(self) -> TaskRegistry {
        let RawConfigFile { config, vars, task } = self.raw;
        TaskRegistry::from_config(ConfigFile::new_unchecked(config, vars, task), self.root_dir)
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
