// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile, TaskConfig};
use crate::config::vars::unresolved_vars;
use crate::errors::{Result, TaskweaveError};
use crate::types::TaskMode;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = TaskweaveError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.vars, raw.task))
    }
}

/// Run every validation pass over a raw task document.
pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    for (id, task) in cfg.task.iter() {
        validate_task_body(id, task)?;
    }
    validate_references(cfg)?;
    validate_graph(cfg)?;
    if cfg.config.strict_vars {
        validate_vars(cfg)?;
    }
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(TaskweaveError::ConfigError(
            "config must contain at least one [task.<id>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    let c = &cfg.config;

    if c.workers == 0 {
        return Err(TaskweaveError::ConfigError(
            "[config].workers must be >= 1 (got 0)".to_string(),
        ));
    }
    if c.render_tick_ms == 0 {
        return Err(TaskweaveError::ConfigError(
            "[config].render_tick_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if c.shell.trim().is_empty() {
        return Err(TaskweaveError::ConfigError(
            "[config].shell must not be empty".to_string(),
        ));
    }

    Ok(())
}

/// Exactly one of `command` / `tasks` is meaningful per mode.
fn validate_task_body(id: &str, task: &TaskConfig) -> Result<()> {
    let has_command = task
        .command
        .as_deref()
        .is_some_and(|c| !c.trim().is_empty());

    match task.effective_mode() {
        TaskMode::Single => {
            if !has_command {
                return Err(TaskweaveError::ConfigError(format!(
                    "task '{id}' is a single task but has no `command`"
                )));
            }
            if !task.tasks.is_empty() {
                return Err(TaskweaveError::ConfigError(format!(
                    "task '{id}' is a single task but lists child `tasks`"
                )));
            }
        }
        mode @ (TaskMode::Batch | TaskMode::Sequential) => {
            if task.tasks.is_empty() {
                return Err(TaskweaveError::ConfigError(format!(
                    "task '{id}' is a {mode} task but has no child `tasks`"
                )));
            }
            if has_command {
                return Err(TaskweaveError::ConfigError(format!(
                    "task '{id}' is a {mode} task but also sets `command`"
                )));
            }
        }
    }

    if task.workers == Some(0) {
        return Err(TaskweaveError::ConfigError(format!(
            "task '{id}' has `workers = 0`; it must be >= 1"
        )));
    }

    Ok(())
}

fn validate_references(cfg: &RawConfigFile) -> Result<()> {
    for (id, task) in cfg.task.iter() {
        let lists = [
            ("tasks", &task.tasks),
            ("pre_run", &task.pre_run),
            ("post_run", &task.post_run),
        ];
        for (field, refs) in lists {
            for dep in refs.iter() {
                if !cfg.task.contains_key(dep) {
                    return Err(TaskweaveError::ConfigError(format!(
                        "task '{id}' has unknown task '{dep}' in `{field}`"
                    )));
                }
                if dep == id {
                    return Err(TaskweaveError::ConfigError(format!(
                        "task '{id}' cannot reference itself in `{field}`"
                    )));
                }
            }
        }
    }
    Ok(())
}

fn validate_graph(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: task -> referenced task (hook or child).
    // A legitimate repeated reference (two tasks sharing a setup hook) is a
    // diamond, not a cycle, and passes.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for id in cfg.task.keys() {
        graph.add_node(id.as_str());
    }

    for (id, task) in cfg.task.iter() {
        for dep in task.references() {
            graph.add_edge(id.as_str(), dep.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            Err(TaskweaveError::TaskCycle(format!(
                "hooks or children of task '{}' lead back to itself",
                node
            )))
        }
    }
}

fn validate_vars(cfg: &RawConfigFile) -> Result<()> {
    for (id, task) in cfg.task.iter() {
        let fields = [("command", task.command.as_deref()), ("cwd", task.cwd.as_deref())];
        for (field, value) in fields {
            let Some(value) = value else { continue };
            let missing = unresolved_vars(value, &cfg.vars);
            if let Some(name) = missing.first() {
                return Err(TaskweaveError::ConfigError(format!(
                    "task '{id}' references undefined variable '${{{name}}}' in `{field}`"
                )));
            }
        }
    }
    Ok(())
}
