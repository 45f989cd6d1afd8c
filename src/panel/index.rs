// src/panel/index.rs

use std::collections::BTreeMap;

use super::ResultMatch;

/// A single error annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEntry {
    pub line: u32,
    pub column: u32,
    pub message: String,
}

/// Errors found in the build output, grouped by file.
///
/// Always rebuilt from the full set of panel results, never patched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorIndex {
    by_file: BTreeMap<String, Vec<ErrorEntry>>,
}

impl ErrorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_results(results: impl IntoIterator<Item = ResultMatch>) -> Self {
        let mut by_file: BTreeMap<String, Vec<ErrorEntry>> = BTreeMap::new();
        for r in results {
            by_file.entry(r.file).or_default().push(ErrorEntry {
                line: r.line,
                column: r.column,
                message: r.message,
            });
        }
        Self { by_file }
    }

    pub fn get(&self, file: &str) -> Option<&[ErrorEntry]> {
        self.by_file.get(file).map(Vec::as_slice)
    }

    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.by_file.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ErrorEntry])> {
        self.by_file.iter().map(|(f, e)| (f.as_str(), e.as_slice()))
    }

    /// Total number of entries across all files.
    pub fn len(&self) -> usize {
        self.by_file.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_file.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_file.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(file: &str, line: u32, msg: &str) -> ResultMatch {
        ResultMatch {
            file: file.to_string(),
            line,
            column: 1,
            message: msg.to_string(),
        }
    }

    #[test]
    fn groups_by_file_keeping_order() {
        let index = ErrorIndex::from_results(vec![
            m("b.rs", 9, "late"),
            m("a.rs", 3, "first"),
            m("b.rs", 2, "early"),
        ]);

        assert_eq!(index.len(), 3);
        assert_eq!(index.files().collect::<Vec<_>>(), vec!["a.rs", "b.rs"]);
        let b: Vec<_> = index.get("b.rs").unwrap().iter().map(|e| e.line).collect();
        assert_eq!(b, vec![9, 2]);
    }
}
