//! Background command builders
//!
//! Collaborator operations are expressed as a [`BackgroundCommand`]: the
//! request kind plus the ordered shell commands that implement it. Most
//! requests are a single command; writing a file decomposes its content
//! into one `echo` per line.

use crate::error::{Error, Result};
use crate::models::RequestKind;
use crate::terminal::prompt::normalize_path;
use std::collections::VecDeque;

/// A request kind and the shell commands that carry it out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundCommand {
    kind: RequestKind,
    commands: VecDeque<String>,
}

impl BackgroundCommand {
    /// Build from explicit commands; at least one non-empty command is required
    pub fn new<I, S>(kind: RequestKind, commands: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let commands: VecDeque<String> = commands
            .into_iter()
            .map(Into::into)
            .filter(|c: &String| !c.trim().is_empty())
            .collect();
        if commands.is_empty() {
            return Err(Error::Other("background command cannot be empty".to_string()));
        }
        Ok(Self { kind, commands })
    }

    /// Arbitrary single command
    pub fn other(command: &str) -> Result<Self> {
        Self::new(RequestKind::Other, [command.trim()])
    }

    /// `ls -a` in the current directory
    pub fn list_directory() -> Self {
        Self::single(RequestKind::ListDirectory, "ls -a".to_string())
    }

    /// `cd <path>`
    pub fn change_directory(path: &str) -> Self {
        Self::single(
            RequestKind::ChangeDirectory,
            format!("cd {}", normalize_path(path)),
        )
    }

    /// `cat "<path>"`
    pub fn read_file(path: &str) -> Result<Self> {
        Ok(Self::single(
            RequestKind::ReadFile(path.to_string()),
            format!("cat \"{}\"", quotable(path)?),
        ))
    }

    /// One `echo` per line; the first truncates, the rest append
    pub fn write_file(path: &str, content: &str) -> Result<Self> {
        let target = quotable(path)?;
        let mut lines: Vec<&str> = content.split('\n').map(|l| l.trim_end_matches('\r')).collect();
        // A trailing newline does not start another line
        if lines.len() > 1 && lines.last() == Some(&"") {
            lines.pop();
        }

        let commands: VecDeque<String> = lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                let redirect = if i == 0 { ">" } else { ">>" };
                Ok(format!("echo \"{}\" {} \"{}\"", quotable(line)?, redirect, target))
            })
            .collect::<Result<_>>()?;

        Ok(Self {
            kind: RequestKind::WriteFile(path.to_string()),
            commands,
        })
    }

    fn single(kind: RequestKind, command: String) -> Self {
        Self {
            kind,
            commands: VecDeque::from([command]),
        }
    }

    pub fn kind(&self) -> &RequestKind {
        &self.kind
    }

    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn into_parts(self) -> (RequestKind, VecDeque<String>) {
        (self.kind, self.commands)
    }
}

/// The peer shell ends a quoted token at the next `"` and has no escape
/// character, so text with a double quote cannot be passed at all.
/// Backslashes are taken literally.
fn quotable(text: &str) -> Result<&str> {
    if text.contains('"') {
        return Err(Error::UnquotableArgument {
            text: text.to_string(),
        });
    }
    Ok(text)
}
