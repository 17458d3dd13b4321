use std::collections::VecDeque;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::TranscriptError;
use crate::schema::{Role, Turn};

/// Maximum number of turns kept in a conversation window.
pub const TRANSCRIPT_CAPACITY: usize = 30;

/// Bounded ring of turns in chronological order.
///
/// Appending to a full transcript drops the oldest turn first, so `len()` never
/// exceeds `capacity()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    turns: VecDeque<Turn>,
    capacity: usize,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(TRANSCRIPT_CAPACITY)
    }

    /// Creates a transcript holding at most `capacity` turns (minimum one).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            turns: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a turn, returning the evicted oldest turn when the window was full.
    pub fn append(&mut self, role: Role, content: impl Into<String>) -> Option<Turn> {
        self.push(Turn::new(role, content))
    }

    pub fn push(&mut self, turn: Turn) -> Option<Turn> {
        let evicted = if self.turns.len() == self.capacity {
            self.turns.pop_front()
        } else {
            None
        };
        self.turns.push_back(turn);
        evicted
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Turn> + '_ {
        self.turns.iter()
    }

    /// Owned snapshot of the window, oldest first.
    #[must_use]
    pub fn turns(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    #[must_use]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.back()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Parses a transcript from either a JSON array or JSON-Lines text.
    ///
    /// Text whose first non-blank character is `[` must be a valid JSON array;
    /// anything else is read line by line and malformed lines are skipped.
    /// Entries that are not `{role, content}` objects with a known role are
    /// dropped in both forms. Only the newest `TRANSCRIPT_CAPACITY` turns are
    /// kept.
    pub fn from_json_str(source: &str) -> Result<Self, TranscriptError> {
        let mut transcript = Self::new();
        transcript.extend_from_json_str(source)?;
        Ok(transcript)
    }

    /// Appends every turn found in `source` through the normal eviction path.
    pub fn extend_from_json_str(&mut self, source: &str) -> Result<usize, TranscriptError> {
        let raw = source.trim();
        if raw.is_empty() {
            return Ok(0);
        }

        let entries = if raw.starts_with('[') {
            match serde_json::from_str::<Value>(raw).map_err(TranscriptError::parse)? {
                Value::Array(entries) => entries,
                other => vec![other],
            }
        } else {
            parse_json_lines(raw)
        };

        let mut appended = 0;
        for entry in entries {
            if let Some(turn) = turn_from_value(entry) {
                self.push(turn);
                appended += 1;
            }
        }
        Ok(appended)
    }

    /// Loads a transcript file. A missing file yields an empty transcript.
    pub fn load(path: &Path) -> Result<Self, TranscriptError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(source) if source.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "transcript file missing; starting empty");
                return Ok(Self::new());
            }
            Err(source) => {
                return Err(TranscriptError::io("reading transcript", path, source));
            }
        };

        let transcript = Self::from_json_str(&raw)?;
        debug!(path = %path.display(), turns = transcript.len(), "loaded transcript");
        Ok(transcript)
    }

    /// Renders the window as an indented JSON array of `{role, content}`.
    pub fn to_json_pretty(&self) -> Result<String, TranscriptError> {
        serde_json::to_string_pretty(&self.turns)
            .map_err(|source| TranscriptError::Serialize { source })
    }

    pub fn save(&self, path: &Path) -> Result<(), TranscriptError> {
        let rendered = self.to_json_pretty()?;
        fs::write(path, rendered)
            .map_err(|source| TranscriptError::io("writing transcript", path, source))?;
        debug!(path = %path.display(), turns = self.len(), "saved transcript");
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Turn;
    type IntoIter = std::collections::vec_deque::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}

fn parse_json_lines(raw: &str) -> Vec<Value> {
    let mut entries = Vec::new();
    for (line_index, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(value) => entries.push(value),
            Err(error) => {
                warn!(line = line_index + 1, %error, "skipping malformed transcript line");
            }
        }
    }
    entries
}

fn turn_from_value(value: Value) -> Option<Turn> {
    let Value::Object(mut fields) = value else {
        return None;
    };
    let role = fields.get("role").and_then(Value::as_str).and_then(Role::parse)?;
    let content = match fields.remove("content")? {
        Value::String(text) => text,
        other => other.to_string(),
    };
    Some(Turn::new(role, content))
}
