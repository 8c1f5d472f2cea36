use clap::Parser;

use taskweave::cli::{CliArgs, LogLevel};
use taskweave::logging::build_filter;

#[test]
fn parses_task_and_flags() {
    let args = CliArgs::try_parse_from([
        "taskweave",
        "ci",
        "--config",
        "ci/Taskweave.toml",
        "--data",
        r#"{"env":"prod"}"#,
        "--plain",
        "-q",
        "--log-level",
        "debug",
    ])
    .unwrap();

    assert_eq!(args.task.as_deref(), Some("ci"));
    assert_eq!(args.config.as_deref(), Some("ci/Taskweave.toml"));
    assert_eq!(args.data.as_deref(), Some(r#"{"env":"prod"}"#));
    assert!(args.plain);
    assert!(args.quiet);
    assert!(!args.dry_run);
    assert!(matches!(args.log_level, Some(LogLevel::Debug)));
}

#[test]
fn list_needs_no_task() {
    let args = CliArgs::try_parse_from(["taskweave", "--list"]).unwrap();
    assert!(args.list);
    assert!(args.task.is_none());
}

#[test]
fn rejects_unknown_log_levels() {
    assert!(CliArgs::try_parse_from(["taskweave", "ci", "--log-level", "loud"]).is_err());
}

#[test]
fn log_filter_prefers_the_flag_then_the_environment() {
    assert_eq!(build_filter(None, None).to_string(), "warn");
    assert_eq!(build_filter(None, Some("  ")).to_string(), "warn");
    assert_eq!(
        build_filter(Some(LogLevel::Info), Some("trace")).to_string(),
        "info"
    );
    assert!(
        build_filter(None, Some("taskweave=debug"))
            .to_string()
            .contains("taskweave=debug")
    );
}
