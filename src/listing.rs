//! Directory listing parser and explorer path helpers
//!
//! The shell's `ls -a` prints a table:
//!
//! ```text
//! fileName | uid | owner | access | creation time       | modified time
//! ..       | 0   | root  | drwx   | 2024-01-01 10:00:00 | 2024-01-01 10:00:00
//! notes    | 3   | root  | frw-   | 2024-01-02 09:30:00 | 2024-01-02 09:31:00
//! ```
//!
//! [`parse_listing`] turns the captured output of a `ListDirectory`
//! request into [`FileEntry`] values for an explorer panel.

use crate::terminal::prompt::ROOT_MARKER;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*fileName\s*\|\s*uid\s*\|").expect("header regex is valid"));

static ROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?P<name>.*?)\s*\|\s*(?P<uid>\d+)\s*\|\s*(?P<owner>.*?)\s*\|\s*(?P<access>[fdrwx\-]+)\s*\|\s*(?P<created>[\d\-\s:]+?)\s*\|\s*(?P<modified>[\d\-\s:]+?)\s*$",
    )
    .expect("row regex is valid")
});

static PROMPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"FileSystem@[\w.-]+:.*?\$").expect("prompt regex is valid"));

/// One row of a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub uid: u32,
    pub owner: String,
    /// Access string, `d` prefix for directories
    pub access: String,
    pub created: String,
    pub modified: String,
}

impl FileEntry {
    pub fn is_directory(&self) -> bool {
        self.name == ".." || self.access.starts_with('d')
    }

    pub fn is_file(&self) -> bool {
        self.access.starts_with('-') || self.access.starts_with('f')
    }
}

/// Parse `ls -a` output.
///
/// Rows before the header and from the next shell prompt on are ignored,
/// as are rows that do not fit the table. The `.` entry is dropped.
/// Directories sort first, then names case-insensitively.
pub fn parse_listing(output: &str) -> Vec<FileEntry> {
    let mut entries = Vec::new();
    let mut in_table = false;

    for line in output.lines() {
        let line = line.trim();
        if !in_table {
            in_table = HEADER.is_match(line);
            continue;
        }
        if PROMPT.is_match(line) {
            break;
        }
        if line.is_empty() {
            continue;
        }

        let Some(caps) = ROW.captures(line) else {
            trace!("Skipping unparsable listing row: {}", line);
            continue;
        };
        let Ok(uid) = caps["uid"].parse::<u32>() else {
            continue;
        };
        let name = caps["name"].trim().to_string();
        if name == "." {
            continue;
        }

        entries.push(FileEntry {
            name,
            uid,
            owner: caps["owner"].trim().to_string(),
            access: caps["access"].trim().to_string(),
            created: caps["created"].trim().to_string(),
            modified: caps["modified"].trim().to_string(),
        });
    }

    entries.sort_by_key(|e| (!e.is_directory(), e.name.to_lowercase()));
    entries
}

/// Logical path of `name` inside `current`
pub fn child_path(current: &str, name: &str) -> String {
    match name {
        "." => current.to_string(),
        ".." => parent_path(current),
        _ => match current {
            ROOT_MARKER => format!("{}/{}", ROOT_MARKER, name),
            "/" => format!("/{}", name),
            _ => format!("{}/{}", current.trim_end_matches('/'), name),
        },
    }
}

/// Logical parent of `current`; the root stays the root
pub fn parent_path(current: &str) -> String {
    if current == "/" {
        return current.to_string();
    }
    let trimmed = current.strip_suffix('/').unwrap_or(current);
    let mut parts: Vec<&str> = trimmed.split('/').collect();
    if parts.len() <= 1 {
        return ROOT_MARKER.to_string();
    }
    parts.pop();
    let parent = parts.join("/");
    if parent.is_empty() {
        "/".to_string()
    } else {
        parent
    }
}
