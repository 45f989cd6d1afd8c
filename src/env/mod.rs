// src/env/mod.rs

//! Environment resolution for build processes.
//!
//! - [`resolve`] merges a base environment with overrides and expands
//!   variable references in every value.
//! - [`search_path`] scopes a temporary `PATH` override around process
//!   spawning.

pub mod search_path;

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::types::Platform;

pub use search_path::SearchPathScope;

/// Variable name -> value.
pub type EnvMap = BTreeMap<String, String>;

static POSIX_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:\{([^}]*)\}|([A-Za-z_][A-Za-z0-9_]*))").expect("static regex")
});

static WINDOWS_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:\{([^}]*)\}|([A-Za-z_][A-Za-z0-9_]*))|%([^%]+)%").expect("static regex")
});

/// Snapshot of the current process environment.
///
/// Entries whose name or value is not valid unicode are skipped.
pub fn process_env() -> EnvMap {
    std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}

/// Merge `overrides` over `base`, then expand variable references in every
/// value using the merged map as the substitution source.
///
/// References are resolved against the merged values *before* expansion, so
/// an override like `PATH = "/opt/bin:$PATH"` sees the inherited `PATH`.
/// Unresolved references are kept verbatim.
pub fn resolve(base: &EnvMap, overrides: &EnvMap) -> EnvMap {
    resolve_for(base, overrides, Platform::current())
}

pub fn resolve_for(base: &EnvMap, overrides: &EnvMap, platform: Platform) -> EnvMap {
    let mut merged = base.clone();
    merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));

    merged
        .iter()
        .map(|(key, value)| {
            let expanded = expand_vars_for(value, platform, |name| merged.get(name).cloned());
            (key.clone(), expanded)
        })
        .collect()
}

/// Expand `$VAR` / `${VAR}` (and `%VAR%` on Windows) in `value`.
pub fn expand_vars(value: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    expand_vars_for(value, Platform::current(), lookup)
}

pub fn expand_vars_for(
    value: &str,
    platform: Platform,
    lookup: impl Fn(&str) -> Option<String>,
) -> String {
    if !value.contains('$') && !(platform.is_windows() && value.contains('%')) {
        return value.to_string();
    }

    let re = if platform.is_windows() {
        &*WINDOWS_VAR
    } else {
        &*POSIX_VAR
    };

    re.replace_all(value, |caps: &Captures<'_>| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))
            .map(|m| m.as_str())
            .unwrap_or_default();
        lookup(name).unwrap_or_else(|| caps[0].to_string())
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> EnvMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn overrides_win_and_can_reference_base() {
        let base = env(&[("PATH", "/usr/bin"), ("HOME", "/home/u")]);
        let overrides = env(&[("PATH", "/opt/tool/bin:$PATH"), ("OUT", "${HOME}/out")]);

        let resolved = resolve_for(&base, &overrides, Platform::Linux);

        assert_eq!(resolved["PATH"], "/opt/tool/bin:/usr/bin");
        assert_eq!(resolved["OUT"], "/home/u/out");
        assert_eq!(resolved["HOME"], "/home/u");
    }

    #[test]
    fn unresolved_references_pass_through() {
        let resolved = resolve_for(
            &EnvMap::new(),
            &env(&[("A", "x-$MISSING-${ALSO_MISSING}-$")]),
            Platform::Linux,
        );
        assert_eq!(resolved["A"], "x-$MISSING-${ALSO_MISSING}-$");
    }

    #[test]
    fn percent_syntax_only_on_windows() {
        let base = env(&[("ROOT", "C:\\sdk")]);
        let overrides = env(&[("BIN", "%ROOT%\\bin")]);

        let win = resolve_for(&base, &overrides, Platform::Windows);
        assert_eq!(win["BIN"], "C:\\sdk\\bin");

        let linux = resolve_for(&base, &overrides, Platform::Linux);
        assert_eq!(linux["BIN"], "%ROOT%\\bin");
    }
}
