//! Append-only framed transcript
//!
//! Each message is one frame:
//!
//! ```text
//! ================================================================================
//! [<index>] <author>
//! --------------------------------------------------------------------------------
//! <content>
//!
//! ```
//!
//! A frame starts at a line that is exactly the separator and whose next line
//! is a well-formed header. Counting and parsing share that rule, so a header
//! quoted inside message content is never mistaken for a real one. Content
//! lines equal to the separator are indented by one space on append, so only
//! real frames ever start with one.

use super::{read_optional, remove_if_exists, StoreError, StoreResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const SEPARATOR: &str =
    "================================================================================";
pub const SUBSEPARATOR: &str =
    "--------------------------------------------------------------------------------";
/// Author name reserved for the human participant
pub const USER_AUTHOR: &str = "User";

const SUBMARKER_PREFIX: &str = "----------";
const UNKNOWN_AUTHOR: &str = "Unknown";

fn header_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\[(\d+)\]\s+(.+)$").expect("header regex must compile"))
}

/// Parse a frame header line into `(index, author)`
fn parse_header(line: &str) -> Option<(u64, String)> {
    let caps = header_pattern().captures(line)?;
    let index = caps.get(1)?.as_str().parse::<u64>().ok()?;
    let author = caps.get(2)?.as_str().trim();
    if author.is_empty() {
        return None;
    }
    Some((index, author.to_string()))
}

/// One committed transcript entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub index: u64,
    pub author: String,
    pub content: String,
}

/// Render one frame exactly as it is written to disk
pub fn format_frame(index: u64, author: &str, content: &str) -> String {
    format!("{SEPARATOR}\n[{index}] {author}\n{SUBSEPARATOR}\n{content}\n\n")
}

/// Number of frame starts in `text`
pub fn count_frames(text: &str) -> usize {
    let lines: Vec<&str> = text.lines().collect();
    lines
        .windows(2)
        .filter(|pair| pair[0] == SEPARATOR && parse_header(pair[1]).is_some())
        .count()
}

/// Author of the last frame in `text`
pub fn last_author_in(text: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();
    lines.windows(2).rev().find_map(|pair| {
        if pair[0] == SEPARATOR {
            parse_header(pair[1]).map(|(_, author)| author)
        } else {
            None
        }
    })
}

/// Split `text` into messages, silently dropping malformed blocks
pub fn parse(text: &str) -> Vec<Message> {
    let mut blocks: Vec<Vec<&str>> = Vec::new();
    let mut current: Option<Vec<&str>> = None;

    for line in text.lines() {
        if line == SEPARATOR {
            if let Some(block) = current.take() {
                blocks.push(block);
            }
            current = Some(Vec::new());
        } else if let Some(block) = current.as_mut() {
            block.push(line);
        }
        // Text before the first separator is preamble and ignored
    }
    if let Some(block) = current {
        blocks.push(block);
    }

    blocks.into_iter().filter_map(|block| parse_block(&block)).collect()
}

fn parse_block(lines: &[&str]) -> Option<Message> {
    let (header, rest) = lines.split_first()?;
    let (index, author) = parse_header(header)?;

    let body = match rest.split_first() {
        Some((marker, body)) if marker.starts_with(SUBMARKER_PREFIX) => body,
        _ => rest,
    };

    Some(Message {
        index,
        author,
        content: trim_blank_lines(body),
    })
}

fn trim_blank_lines(lines: &[&str]) -> String {
    let is_blank = |line: &&str| line.trim().is_empty();
    let start = lines.iter().position(|l| !is_blank(l)).unwrap_or(lines.len());
    let end = lines.iter().rposition(|l| !is_blank(l)).map_or(start, |i| i + 1);
    lines[start..end].join("\n")
}

/// Rough token estimate used for the panel's running total
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

fn is_separator_line(line: &str) -> bool {
    line.strip_suffix('\r').unwrap_or(line) == SEPARATOR
}

/// Content as it is stored: separator lines indented so they cannot open a frame
pub fn neutralize_separators(content: &str) -> Cow<'_, str> {
    if !content.split('\n').any(is_separator_line) {
        return Cow::Borrowed(content);
    }
    let lines: Vec<Cow<'_, str>> = content
        .split('\n')
        .map(|line| {
            if is_separator_line(line) {
                Cow::Owned(format!(" {line}"))
            } else {
                Cow::Borrowed(line)
            }
        })
        .collect();
    Cow::Owned(lines.join("\n"))
}

/// Authors land on the header line, so they must be a single non-empty line
fn normalize_author(author: &str) -> String {
    let joined = author.split_whitespace().collect::<Vec<_>>().join(" ");
    if joined.is_empty() {
        UNKNOWN_AUTHOR.to_string()
    } else {
        joined
    }
}

/// The transcript file of a session
#[derive(Debug, Clone)]
pub struct TranscriptFile {
    path: PathBuf,
}

impl TranscriptFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Full raw text, empty when the transcript does not exist yet
    pub fn read(&self) -> StoreResult<String> {
        Ok(read_optional(&self.path)?.unwrap_or_default())
    }

    pub fn count(&self) -> StoreResult<usize> {
        Ok(count_frames(&self.read()?))
    }

    pub fn last_author(&self) -> StoreResult<Option<String>> {
        Ok(last_author_in(&self.read()?))
    }

    /// Count and last author from a single read
    pub fn observe(&self) -> StoreResult<(usize, Option<String>)> {
        let text = self.read()?;
        Ok((count_frames(&text), last_author_in(&text)))
    }

    pub fn messages(&self) -> StoreResult<Vec<Message>> {
        Ok(parse(&self.read()?))
    }

    /// Append one frame with a single write and return what was written
    pub fn append(&self, author: &str, content: &str) -> StoreResult<Message> {
        let index = self.count()? as u64 + 1;
        let author = normalize_author(author);
        let content = neutralize_separators(content);
        let frame = format_frame(index, &author, &content);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::io(&self.path, e))?;
        file.write_all(frame.as_bytes())
            .map_err(|e| StoreError::io(&self.path, e))?;

        Ok(Message {
            index,
            author,
            content: content.into_owned(),
        })
    }

    /// Delete the transcript; a missing transcript is already deleted
    pub fn remove(&self) -> StoreResult<()> {
        remove_if_exists(&self.path)
    }
}
