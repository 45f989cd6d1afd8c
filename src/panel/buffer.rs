// src/panel/buffer.rs

use std::io::Write;
use std::path::{Path, PathBuf};

use regex::{Captures, Regex};
use tracing::warn;

use super::{ErrorIndex, ResultMatch, ResultsPanel};

/// In-memory results panel.
///
/// Result matching follows the usual build-system conventions:
/// - `file_regex` captures `(file, line, column, message)`; line, column and
///   message are optional.
/// - A `file_regex` match without a line only sets the current file;
///   subsequent `line_regex` matches `(line, column, message)` use it.
/// - Relative file names are joined onto the configured base directory.
#[derive(Debug, Default)]
pub struct BufferPanel {
    text: String,
    file_regex: Option<Regex>,
    line_regex: Option<Regex>,
    base_dir: Option<PathBuf>,
    echo: bool,
    status: Option<String>,
    visible: bool,
    annotations: ErrorIndex,
}

impl BufferPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A panel that also writes everything appended to stdout.
    pub fn echoing() -> Self {
        Self {
            echo: true,
            ..Self::default()
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Errors currently annotated inline.
    pub fn annotations(&self) -> &ErrorIndex {
        &self.annotations
    }

    fn resolve_file(&self, file: &str) -> String {
        match &self.base_dir {
            Some(base) if Path::new(file).is_relative() => {
                base.join(file).to_string_lossy().into_owned()
            }
            _ => file.to_string(),
        }
    }
}

fn compile(kind: &str, pattern: &str) -> Option<Regex> {
    if pattern.is_empty() {
        return None;
    }
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(kind, pattern, error = %e, "invalid result regex; ignoring");
            None
        }
    }
}

fn group<'t>(caps: &Captures<'t>, i: usize) -> Option<&'t str> {
    caps.get(i).map(|m| m.as_str()).filter(|s| !s.is_empty())
}

fn number(caps: &Captures<'_>, i: usize) -> Option<u32> {
    group(caps, i).and_then(|s| s.trim().parse().ok())
}

impl ResultsPanel for BufferPanel {
    fn configure(&mut self, file_regex: &str, line_regex: &str, base_dir: Option<&Path>) {
        self.text.clear();
        self.file_regex = compile("file_regex", file_regex);
        self.line_regex = compile("line_regex", line_regex);
        self.base_dir = base_dir.map(Path::to_path_buf);
    }

    fn append(&mut self, text: &str) {
        self.text.push_str(text);
        if self.echo {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(text.as_bytes());
            let _ = stdout.flush();
        }
    }

    fn find_all_results(&self) -> Vec<ResultMatch> {
        let Some(file_re) = &self.file_regex else {
            return Vec::new();
        };

        let mut results = Vec::new();
        let mut current_file: Option<String> = None;

        for line in self.text.lines() {
            if let Some(caps) = file_re.captures(line) {
                let Some(file) = group(&caps, 1) else {
                    continue;
                };
                let file = self.resolve_file(file);
                if let Some(line_no) = number(&caps, 2) {
                    results.push(ResultMatch {
                        file: file.clone(),
                        line: line_no,
                        column: number(&caps, 3).unwrap_or(1),
                        message: group(&caps, 4).unwrap_or_default().to_string(),
                    });
                }
                current_file = Some(file);
                continue;
            }

            if let (Some(line_re), Some(file)) = (&self.line_regex, &current_file) {
                if let Some(caps) = line_re.captures(line) {
                    if let Some(line_no) = number(&caps, 1) {
                        results.push(ResultMatch {
                            file: file.clone(),
                            line: line_no,
                            column: number(&caps, 2).unwrap_or(1),
                            message: group(&caps, 3).unwrap_or_default().to_string(),
                        });
                    }
                }
            }
        }

        results
    }

    fn set_status(&mut self, message: &str) {
        self.status = Some(message.to_string());
    }

    fn show(&mut self) {
        self.visible = true;
    }

    fn hide(&mut self) {
        self.visible = false;
    }

    fn render_errors(&mut self, index: &ErrorIndex) {
        self.annotations = index.clone();
    }

    fn clear_errors(&mut self, _index: &ErrorIndex) {
        self.annotations.clear();
    }
}
