// src/exec/template.rs

//! Per-invocation command templates.
//!
//! Commands may contain `{{ field }}` placeholders that are expanded against
//! caller-supplied JSON data right before execution. Without data the
//! command is passed through untouched, so shell text that happens to contain
//! braces is never reinterpreted.

use minijinja::Environment;
use serde_json::Value;

use crate::errors::{Result, TaskweaveError};

/// Expand `template` for task `task` against `data`.
pub fn render_command(task: &str, template: &str, data: Option<&Value>) -> Result<String> {
    let Some(data) = data else {
        return Ok(template.to_string());
    };
    if template.is_empty() {
        return Ok(String::new());
    }

    let env = Environment::new();
    env.render_str(template, data)
        .map_err(|e| TaskweaveError::Template {
            task: task.to_string(),
            message: e.to_string(),
        })
}
