// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod report;
pub mod types;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{TaskRegistry, default_config_path};
use crate::engine::{NESTED_ENV, Orchestrator, VisitedSet, spawn_interrupt_handler};
use crate::errors::{Result, TaskweaveError};
use crate::types::RenderMode;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - task file loading and validation
/// - `--list` / `--dry-run` inspection
/// - render mode selection
/// - Ctrl-C handling
/// - the orchestrator for the requested task
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args
        .config
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);
    let registry = Arc::new(TaskRegistry::load(&config_path)?);

    if args.list {
        print_task_list(&registry);
        return Ok(());
    }

    let Some(task) = args.task.as_deref() else {
        return Err(TaskweaveError::ConfigError(
            "no task given (use --list to see available tasks)".to_string(),
        ));
    };

    let data = parse_data(args.data.as_deref())?;

    if args.dry_run {
        for line in describe_tree(&registry, task)? {
            println!("{line}");
        }
        debug!("dry-run complete (no execution)");
        return Ok(());
    }

    let mode = render_mode(args.plain);

    // Ctrl-C → graceful cancellation, second Ctrl-C → hard exit.
    let cancel = CancellationToken::new();
    let _interrupts = spawn_interrupt_handler(cancel.clone());

    let orchestrator = Orchestrator::new(registry, cancel)
        .with_render_mode(mode)
        .with_show_tail(!args.quiet);

    info!(task, ?mode, config = %config_path.display(), "starting run");

    let mut visited = VisitedSet::new();
    orchestrator.run(task, data.as_ref(), &mut visited).await
}

/// Plain output for nested runs, `--plain` and non-terminal stdout; live
/// frames otherwise.
pub fn render_mode(force_plain: bool) -> RenderMode {
    let nested = std::env::var(NESTED_ENV).is_ok_and(|v| v == "1");
    if force_plain || nested || !std::io::stdout().is_terminal() {
        RenderMode::Plain
    } else {
        RenderMode::Live
    }
}

/// Parse the `--data` argument.
pub fn parse_data(raw: Option<&str>) -> Result<Option<Value>> {
    raw.map(|s| {
        serde_json::from_str(s)
            .map_err(|e| TaskweaveError::ConfigError(format!("invalid --data JSON: {e}")))
    })
    .transpose()
}

/// Hook/child tree of `id` as indented lines, without executing anything.
///
/// Repeated identifiers are shown once and marked, the same way the
/// orchestrator's visited set skips them at run time.
pub fn describe_tree(registry: &TaskRegistry, id: &str) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    let mut visited = VisitedSet::new();
    describe_into(registry, id, 0, "", &mut visited, &mut lines)?;
    Ok(lines)
}

fn describe_into(
    registry: &TaskRegistry,
    id: &str,
    depth: usize,
    role: &str,
    visited: &mut VisitedSet,
    lines: &mut Vec<String>,
) -> Result<()> {
    let indent = "  ".repeat(depth);
    if !visited.insert(id) {
        lines.push(format!("{indent}{role}{id} (already visited)"));
        return Ok(());
    }

    let def = registry.resolve(id)?;
    let shape = if def.runs_on_pool() {
        format!(
            "{}, parallel, workers={}{}",
            def.mode,
            def.workers,
            if def.continue_on_error { ", continue_on_error" } else { "" }
        )
    } else {
        def.mode.to_string()
    };
    lines.push(format!("{indent}{role}{id} [{shape}]"));

    if let Some(cmd) = &def.command {
        lines.push(format!("{indent}    $ {cmd}"));
    }
    if let Some(cwd) = &def.cwd {
        lines.push(format!("{indent}    cwd: {}", cwd.display()));
    }

    for hook in &def.pre_run {
        describe_into(registry, hook, depth + 1, "pre: ", visited, lines)?;
    }
    for child in &def.children {
        describe_into(registry, child, depth + 1, "", visited, lines)?;
    }
    for hook in &def.post_run {
        describe_into(registry, hook, depth + 1, "post: ", visited, lines)?;
    }
    Ok(())
}

fn print_task_list(registry: &TaskRegistry) {
    for id in registry.ids() {
        let label = match registry.resolve(id) {
            Ok(def) => def.description.unwrap_or(def.name),
            Err(_) => String::new(),
        };
        println!("  {id:<24} {label}");
    }
}
