// src/config/vars.rs

//! `${name}` substitution from the `[vars]` table.
//!
//! Unknown names expand to the empty string. `strict_vars = true` turns them
//! into a validation error instead (see `validate.rs`).

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static VAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_.-]*)\}").expect("valid variable regex")
});

/// Replace every `${name}` in `input` with its value from `vars`.
pub fn expand_vars(input: &str, vars: &BTreeMap<String, String>) -> String {
    VAR_RE
        .replace_all(input, |caps: &Captures<'_>| {
            vars.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

/// Names referenced as `${name}` in `input` that have no entry in `vars`,
/// in order of first appearance.
pub fn unresolved_vars(input: &str, vars: &BTreeMap<String, String>) -> Vec<String> {
    let mut missing: Vec<String> = Vec::new();
    for caps in VAR_RE.captures_iter(input) {
        let name = &caps[1];
        if !vars.contains_key(name) && !missing.iter().any(|m| m == name) {
            missing.push(name.to_string());
        }
    }
    missing
}
