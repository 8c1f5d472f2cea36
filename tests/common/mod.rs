#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

pub use taskweave_test_utils::{
    FakeRunner, Script, SharedBuffer, TaskConfigBuilder, fast_settings, init_tracing, member,
    registry, with_timeout,
};

/// Write `contents` as `Taskweave.toml` inside `dir` and return its path.
pub fn write_config(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("Taskweave.toml");
    fs::write(&path, contents).expect("write test config");
    path
}

/// Shell snippet appending `tag` to the file at `log`.
pub fn append_cmd(log: &Path, tag: &str) -> String {
    format!("echo {tag} >> '{}'", log.display())
}

/// Lines of the file at `log`, or nothing if it was never written.
pub fn read_log(log: &Path) -> Vec<String> {
    fs::read_to_string(log)
        .map(|s| s.lines().map(str::to_string).collect())
        .unwrap_or_default()
}
