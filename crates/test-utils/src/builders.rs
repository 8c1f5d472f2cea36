#![allow(dead_code)]

use taskweave::config::{ConfigSection, RegistryBuilder, TaskConfig, TaskDefinition, TaskRegistry};
use taskweave::engine::QueueMember;
use taskweave::types::TaskMode;

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    /// Atomic task running `command`.
    pub fn single(command: &str) -> Self {
        Self {
            task: TaskConfig {
                mode: Some(TaskMode::Single),
                command: Some(command.to_string()),
                ..TaskConfig::default()
            },
        }
    }

    /// Batch over `children` (sequential unless `.parallel(true)`).
    pub fn batch(children: &[&str]) -> Self {
        Self::composite(TaskMode::Batch, children)
    }

    pub fn sequential(children: &[&str]) -> Self {
        Self::composite(TaskMode::Sequential, children)
    }

    fn composite(mode: TaskMode, children: &[&str]) -> Self {
        Self {
            task: TaskConfig {
                mode: Some(mode),
                tasks: children.iter().map(|c| c.to_string()).collect(),
                ..TaskConfig::default()
            },
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.task.name = Some(name.to_string());
        self
    }

    pub fn pre_run(mut self, id: &str) -> Self {
        self.task.pre_run.push(id.to_string());
        self
    }

    pub fn post_run(mut self, id: &str) -> Self {
        self.task.post_run.push(id.to_string());
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.task.parallel = parallel;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.task.workers = Some(workers);
        self
    }

    pub fn continue_on_error(mut self, val: bool) -> Self {
        self.task.continue_on_error = val;
        self
    }

    pub fn interactive(mut self, val: bool) -> Self {
        self.task.interactive = val;
        self
    }

    pub fn cwd(mut self, cwd: &str) -> Self {
        self.task.cwd = Some(cwd.to_string());
        self
    }

    pub fn on_error(mut self, msg: &str) -> Self {
        self.task.on_error = Some(msg.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

/// Settings with a short grace period and fast render tick.
pub fn fast_settings() -> ConfigSection {
    ConfigSection {
        grace_period_ms: 300,
        render_tick_ms: 20,
        ..ConfigSection::default()
    }
}

/// Validated registry from `(id, task)` pairs using [`fast_settings`].
pub fn registry(tasks: Vec<(&str, TaskConfig)>) -> TaskRegistry {
    tasks
        .into_iter()
        .fold(RegistryBuilder::new().settings(fast_settings()), |b, (id, t)| {
            b.task(id, t)
        })
        .build()
        .expect("Failed to build valid registry from builder")
}

/// Atomic definition for driving the worker pool directly.
pub fn atomic_definition(id: &str, command: &str) -> TaskDefinition {
    TaskDefinition {
        id: id.to_string(),
        name: id.to_string(),
        description: None,
        mode: TaskMode::Single,
        command: Some(command.to_string()),
        cwd: None,
        children: Vec::new(),
        parallel: false,
        workers: 1,
        continue_on_error: false,
        interactive: false,
        pre_run: Vec::new(),
        post_run: Vec::new(),
        pre_msg: None,
        on_error: None,
    }
}

/// Queue member whose command is `true`; the fake runner decides the outcome.
pub fn member(id: &str) -> QueueMember {
    QueueMember::new(atomic_definition(id, "true"), Some("true".to_string()))
}
