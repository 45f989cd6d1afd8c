// src/panel/mod.rs

//! The results panel that build output is mirrored into.
//!
//! The panel is an external collaborator: the orchestrator only needs to
//! append text, ask it which lines match the configured result patterns,
//! and drive its visibility / status / inline error annotations.
//! [`BufferPanel`] is the in-memory implementation used by the CLI and tests.

pub mod buffer;
pub mod index;

use std::path::Path;

pub use buffer::BufferPanel;
pub use index::{ErrorEntry, ErrorIndex};

/// One result found in the panel text. Line and column are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultMatch {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

pub trait ResultsPanel: Send {
    /// Reset the panel for a new build with the given result patterns.
    fn configure(&mut self, file_regex: &str, line_regex: &str, base_dir: Option<&Path>);

    /// Append delivered output.
    fn append(&mut self, text: &str);

    /// All results found in the accumulated text, in order.
    fn find_all_results(&self) -> Vec<ResultMatch>;

    fn set_status(&mut self, _message: &str) {}

    fn show(&mut self) {}

    fn hide(&mut self) {}

    /// Display inline annotations for `index`.
    fn render_errors(&mut self, _index: &ErrorIndex) {}

    /// Remove annotations previously rendered for `index`.
    fn clear_errors(&mut self, _index: &ErrorIndex) {}
}
