// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::{NestedIsolation, TaskMode};

/// Top-level task document as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// workers = 3
///
/// [vars]
/// web = "apps/web"
///
/// [task.lint]
/// name = "Lint"
/// command = "npm run lint"
/// cwd = "${web}"
///
/// [task.ci]
/// mode = "batch"
/// tasks = ["lint", "test"]
/// parallel = true
/// ```
///
/// All sections except `[task.*]` are optional.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Engine settings from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Global `${name}` variables from `[vars]`.
    #[serde(default)]
    pub vars: BTreeMap<String, String>,

    /// All tasks from `[task.<id>]`, keyed by identifier.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// A validated task document.
///
/// Only constructed through `TryFrom<RawConfigFile>` (which validates) or
/// [`ConfigFile::new_unchecked`].
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub vars: BTreeMap<String, String>,
    pub task: BTreeMap<String, TaskConfig>,
}

impl ConfigFile {
    /// Build a config without running validation.
    ///
    /// Hook cycles and unknown references are then only caught at run time
    /// (by the visited set and by `TaskNotFound`).
    pub fn new_unchecked(
        config: ConfigSection,
        vars: BTreeMap<String, String>,
        task: BTreeMap<String, TaskConfig>,
    ) -> Self {
        Self { config, vars, task }
    }
}

/// `[config]` section: engine-wide settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// Worker count for parallel batches that do not set `workers`.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Time between SIGTERM and SIGKILL when cancelling a process group.
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    /// Redraw interval of the live status renderer.
    #[serde(default = "default_render_tick_ms")]
    pub render_tick_ms: u64,

    /// Number of trailing output lines kept per running task.
    #[serde(default = "default_tail_lines")]
    pub tail_lines: usize,

    /// Successful output up to this many lines is echoed in a summary box.
    #[serde(default = "default_short_output_lines")]
    pub short_output_lines: usize,

    /// Shell used to run commands (`<shell> -c <command>`).
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Reject `${name}` references that have no entry in `[vars]`.
    #[serde(default)]
    pub strict_vars: bool,

    /// How composite members of a parallel batch are executed.
    #[serde(default)]
    pub nested_isolation: NestedIsolation,
}

fn default_workers() -> usize {
    3
}

fn default_grace_period_ms() -> u64 {
    2000
}

fn default_render_tick_ms() -> u64 {
    80
}

fn default_tail_lines() -> usize {
    5
}

fn default_short_output_lines() -> usize {
    12
}

fn default_shell() -> String {
    "sh".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            grace_period_ms: default_grace_period_ms(),
            render_tick_ms: default_render_tick_ms(),
            tail_lines: default_tail_lines(),
            short_output_lines: default_short_output_lines(),
            shell: default_shell(),
            strict_vars: false,
            nested_isolation: NestedIsolation::default(),
        }
    }
}

/// `[task.<id>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    /// Human-readable name; defaults to the identifier.
    #[serde(default)]
    pub name: Option<String>,

    /// Longer description shown by `--list`.
    #[serde(default)]
    pub description: Option<String>,

    /// `single`, `batch` or `sequential`.
    ///
    /// If omitted, a task with `tasks = [...]` is `sequential` and any other
    /// task is `single`.
    #[serde(default, alias = "type")]
    pub mode: Option<TaskMode>,

    /// Shell command for `single` tasks. May contain `${var}` and
    /// `{{ data }}` placeholders.
    #[serde(default)]
    pub command: Option<String>,

    /// Child identifiers for `batch` / `sequential` tasks.
    #[serde(default)]
    pub tasks: Vec<String>,

    /// Working directory, relative to the config file's directory.
    #[serde(default)]
    pub cwd: Option<String>,

    /// Tasks run before this task's body.
    #[serde(default)]
    pub pre_run: Vec<String>,

    /// Tasks run after this task's body.
    #[serde(default)]
    pub post_run: Vec<String>,

    /// Run a `batch` on the worker pool.
    #[serde(default)]
    pub parallel: bool,

    /// Worker count for a parallel batch; falls back to `[config].workers`.
    #[serde(default)]
    pub workers: Option<usize>,

    /// Keep starting batch members after one of them failed.
    #[serde(default)]
    pub continue_on_error: bool,

    /// Attach the command directly to the terminal.
    #[serde(default)]
    pub interactive: bool,

    /// Message printed before the task starts.
    #[serde(default)]
    pub pre_msg: Option<String>,

    /// Message printed above the failure log when the task fails.
    #[serde(default)]
    pub on_error: Option<String>,
}

impl TaskConfig {
    /// Effective mode, inferring it from the body when not given.
    pub fn effective_mode(&self) -> TaskMode {
        match self.mode {
            Some(mode) => mode,
            None if !self.tasks.is_empty() => TaskMode::Sequential,
            None => TaskMode::Single,
        }
    }

    /// Effective worker count given the default from `[config]`.
    pub fn effective_workers(&self, default_workers: usize) -> usize {
        self.workers.unwrap_or(default_workers)
    }

    /// All identifiers this task refers to: hooks first, then children.
    pub fn references(&self) -> impl Iterator<Item = &String> {
        self.pre_run
            .iter()
            .chain(self.tasks.iter())
            .chain(self.post_run.iter())
    }
}
