// src/env/search_path.rs

//! Scoped `PATH` override used while spawning the terminal process.

use std::ffi::OsString;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::expand_vars;

/// Serialises every spawn that may touch `PATH`.
static SPAWN_LOCK: Mutex<()> = Mutex::new(());

/// Holds the process-wide spawn lock and, when a search path was given, an
/// overridden `PATH` that is restored on drop.
///
/// Acquire it immediately before building the child environment and drop
/// it right after the spawn call returns, whether the spawn succeeded or
/// not.
pub struct SearchPathScope {
    previous: Option<OsString>,
    applied: bool,
    _lock: MutexGuard<'static, ()>,
}

impl SearchPathScope {
    /// Take the spawn lock and apply `path` (with `$VAR` references expanded
    /// against the current environment) as the process `PATH`.
    ///
    /// `None` or an empty string only takes the lock.
    pub fn acquire(path: Option<&str>) -> Self {
        let lock = SPAWN_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = std::env::var_os("PATH");

        let applied = match path.filter(|p| !p.is_empty()) {
            Some(path) => {
                let expanded = expand_vars(path, |name| std::env::var(name).ok());
                debug!(path = %expanded, "applying temporary search path");
                // SAFETY: every writer of PATH in this crate holds SPAWN_LOCK.
                unsafe { std::env::set_var("PATH", &expanded) };
                true
            }
            None => false,
        };

        Self {
            previous,
            applied,
            _lock: lock,
        }
    }

    pub fn is_applied(&self) -> bool {
        self.applied
    }
}

impl Drop for SearchPathScope {
    fn drop(&mut self) {
        if !self.applied {
            return;
        }
        // SAFETY: SPAWN_LOCK is still held; it is released after this body.
        unsafe {
            match self.previous.take() {
                Some(previous) => std::env::set_var("PATH", previous),
                None => std::env::remove_var("PATH"),
            }
        }
        debug!("restored search path");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_is_restored_when_scope_ends() {
        let before = std::env::var_os("PATH");
        {
            let scope = SearchPathScope::acquire(Some("/scoped/bin:$PATH"));
            assert!(scope.is_applied());
            let during = std::env::var("PATH").unwrap_or_default();
            assert!(during.starts_with("/scoped/bin"));
        }
        assert_eq!(std::env::var_os("PATH"), before);
    }

    #[test]
    fn empty_path_leaves_environment_untouched() {
        let before = std::env::var_os("PATH");
        let scope = SearchPathScope::acquire(Some(""));
        assert!(!scope.is_applied());
        drop(scope);
        assert_eq!(std::env::var_os("PATH"), before);
    }
}
