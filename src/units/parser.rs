//! INI-style unit file parser
//!
//! Parses unit files into sections of key/value entries. Keys are case
//! insensitive; a key may repeat and every occurrence is kept in order.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// A section contains key-value pairs, where each key can have multiple values
/// The u32 is the order the value appeared (for stable ordering)
pub type ParsedSection = HashMap<String, Vec<(u32, String)>>;

/// A parsed unit file is a map of section names to their contents
pub type ParsedFile = HashMap<String, ParsedSection>;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Section '{0}' appears more than once")]
    DuplicateSection(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing required setting {1} in {0}")]
    MissingSetting(String, String),

    #[error("Invalid shell quoting in: {0}")]
    InvalidQuoting(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Parse a unit file from a string
pub fn parse_file(content: &str) -> Result<ParsedFile, ParseError> {
    let mut sections = HashMap::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in content.lines().map(str::trim) {
        if line.starts_with('[') {
            if let Some((name, lines)) = current.take() {
                insert_section(&mut sections, name, &lines)?;
            }
            current = Some((line.to_string(), Vec::new()));
        } else if let Some((_, lines)) = current.as_mut() {
            lines.push(line);
        }
        // Lines before the first section are ignored
    }

    if let Some((name, lines)) = current {
        insert_section(&mut sections, name, &lines)?;
    }

    Ok(sections)
}

fn insert_section(
    sections: &mut ParsedFile,
    name: String,
    lines: &[&str],
) -> Result<(), ParseError> {
    if sections.contains_key(&name) {
        return Err(ParseError::DuplicateSection(name));
    }
    sections.insert(name, parse_section(lines));
    Ok(())
}

/// Parse a single section's lines into key-value pairs
fn parse_section(lines: &[&str]) -> ParsedSection {
    let mut entries: ParsedSection = HashMap::new();

    for (entry_number, line) in (0u32..).zip(lines) {
        // Skip comments and empty lines
        if line.starts_with('#') || line.starts_with(';') || line.is_empty() {
            continue;
        }

        let Some((name, value)) = line.split_once('=') else {
            continue;
        };

        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        entries
            .entry(name.trim().to_uppercase())
            .or_default()
            .push((entry_number, value.to_string()));
    }

    entries
}

/// Parse a unit file from disk
pub async fn parse_unit_file(path: &Path) -> Result<ParsedFile, ParseError> {
    let content = tokio::fs::read_to_string(path).await?;
    parse_file(&content)
}

/// Parse Environment= values using shell-like quoting
pub fn parse_environment(raw: &str) -> Result<Vec<(String, String)>, ParseError> {
    let parts = shlex::split(raw).ok_or_else(|| ParseError::InvalidQuoting(raw.to_string()))?;

    Ok(parts
        .into_iter()
        .filter_map(|pair| {
            pair.split_once('=')
                .map(|(key, value)| (key.to_string(), value.to_string()))
        })
        .collect())
}

/// Split a command line into program and arguments
pub fn parse_command(raw: &str) -> Result<Vec<String>, ParseError> {
    let parts = shlex::split(raw).ok_or_else(|| ParseError::InvalidQuoting(raw.to_string()))?;
    if parts.is_empty() {
        return Err(ParseError::InvalidQuoting(raw.to_string()));
    }
    Ok(parts)
}

/// Parse a time span like `5s`, `100ms`, `2min` or `1h`. A bare number is seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();

    if let Some(n) = s.strip_suffix("ms") {
        n.trim().parse().ok().map(Duration::from_millis)
    } else if let Some(n) = s.strip_suffix("min") {
        n.trim().parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else if let Some(n) = s.strip_suffix('s') {
        n.trim().parse().ok().map(Duration::from_secs)
    } else if let Some(n) = s.strip_suffix('h') {
        n.trim().parse::<u64>().ok().map(|h| Duration::from_secs(h * 3600))
    } else {
        s.parse().ok().map(Duration::from_secs)
    }
}
