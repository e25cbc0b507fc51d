//! Debug passthroughs: human-readable summaries of values flowing through a
//! pipeline run, collected into a preview log owned by the caller.

use std::path::PathBuf;

use crate::model::ArchiveId;
use crate::payload::Payload;

/// Preview lines accumulated during one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewLog {
    entries: Vec<String>,
}

impl PreviewLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, text: impl Into<String>) {
        self.entries.push(text.into());
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop everything shown so far.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Numbered listing of archive paths.
pub fn describe_paths(paths: &[PathBuf]) -> String {
    let mut text = format!("Found {} CBZ files:\n\n", paths.len());
    for (i, path) in paths.iter().enumerate() {
        text.push_str(&format!("{}. {}\n", i + 1, path.display()));
    }
    text
}

/// Page counts per archive id, in first-seen order.
pub fn count_by_archive(ids: &[ArchiveId]) -> Vec<(ArchiveId, usize)> {
    let mut counts: Vec<(ArchiveId, usize)> = Vec::new();
    for id in ids {
        match counts.iter_mut().find(|(seen, _)| seen == id) {
            Some((_, n)) => *n += 1,
            None => counts.push((id.clone(), 1)),
        }
    }
    counts
}

/// Summary of a path payload that may be a single value or a (nested) list.
pub fn describe_payload(payload: &Payload) -> String {
    match payload {
        Payload::Sequence(_) => {
            let items = payload.flatten_strings();
            let mut text = format!("{} entries:\n", items.len());
            for (i, item) in items.iter().enumerate() {
                text.push_str(&format!("  [{i}]: {item}\n"));
            }
            text
        }
        Payload::Absent => "(absent)\n".to_string(),
        Payload::Structured(map) => format!("structured value with {} keys\n", map.len()),
        scalar => format!("single value: {}\n", scalar.flatten_strings().join("")),
    }
}
