#![allow(dead_code)]

use std::path::Path;

use buildterm::config::{RawSettings, Settings};
use buildterm::exec::{CommandValue, RunRequest};
use buildterm::types::ExitPolicy;

/// Builder for `Settings` to simplify test setup.
///
/// Defaults to headless runs that close as soon as the command ends.
pub struct SettingsBuilder {
    raw: RawSettings,
}

impl SettingsBuilder {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            raw: RawSettings {
                headless: true,
                terminal_exit: ExitPolicy::Auto,
                cache_dir: Some(cache_dir.to_path_buf()),
                ..RawSettings::default()
            },
        }
    }

    pub fn hide_panel_without_errors(mut self, val: bool) -> Self {
        self.raw.hide_panel_without_errors = val;
        self
    }

    pub fn show_errors_inline(mut self, val: bool) -> Self {
        self.raw.show_errors_inline = val;
        self
    }

    pub fn tee_path(mut self, path: &str) -> Self {
        self.raw.tee_path.linux = path.to_string();
        self.raw.tee_path.osx = path.to_string();
        self.raw.tee_path.windows = path.to_string();
        self
    }

    pub fn build(self) -> Settings {
        Settings::try_from(self.raw).expect("Failed to build valid settings from builder")
    }
}

/// Builder for `RunRequest`.
pub struct RunRequestBuilder {
    request: RunRequest,
}

impl RunRequestBuilder {
    pub fn shell(line: &str) -> Self {
        Self {
            request: RunRequest::shell(line),
        }
    }

    pub fn argv(argv: &[&str]) -> Self {
        Self {
            request: RunRequest {
                cmd: Some(CommandValue::Argv(
                    argv.iter().map(|s| s.to_string()).collect(),
                )),
                ..RunRequest::default()
            },
        }
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.request.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn working_dir(mut self, dir: &Path) -> Self {
        self.request.working_dir = Some(dir.to_path_buf());
        self
    }

    pub fn file_regex(mut self, re: &str) -> Self {
        self.request.file_regex = re.to_string();
        self
    }

    pub fn line_regex(mut self, re: &str) -> Self {
        self.request.line_regex = re.to_string();
        self
    }

    pub fn quiet(mut self) -> Self {
        self.request.quiet = true;
        self
    }

    pub fn no_tee(mut self) -> Self {
        self.request.tee = false;
        self
    }

    pub fn terminal_exit(mut self, policy: ExitPolicy) -> Self {
        self.request.terminal_exit = Some(policy);
        self
    }

    pub fn path(mut self, path: &str) -> Self {
        self.request.path = Some(path.to_string());
        self
    }

    pub fn build(self) -> RunRequest {
        self.request
    }
}
