use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Who produced a transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Author {
    /// The caller that started the run.
    Caller,
    /// A swarm node, by identifier.
    Node(String),
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Caller => f.write_str("user"),
            Self::Node(id) => f.write_str(id),
        }
    }
}

/// One turn of the shared transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub author: Author,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ContextEntry {
    pub fn new(author: Author, message: impl Into<String>) -> Self {
        Self {
            author,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// The append-only transcript shared by every node of a run.
///
/// There is one writer (the dispatcher, through `&mut self`) and any number of
/// readers holding [`ContextSnapshot`]s. Snapshots share the backing buffer;
/// an append while a snapshot is alive copies it first, so a snapshot never
/// observes a later append.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    entries: Arc<Vec<ContextEntry>>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context whose first entry is the caller's message.
    pub fn seeded(initial_message: impl Into<String>) -> Self {
        let mut context = Self::new();
        context.append(ContextEntry::new(Author::Caller, initial_message));
        context
    }

    /// Add an entry to the end of the transcript.
    pub fn append(&mut self, entry: ContextEntry) {
        Arc::make_mut(&mut self.entries).push(entry);
    }

    /// Immutable, fully ordered view of everything appended so far.
    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            entries: Arc::clone(&self.entries),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A frozen view of an [`ExecutionContext`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextSnapshot {
    entries: Arc<Vec<ContextEntry>>,
}

impl ContextSnapshot {
    pub fn entries(&self) -> &[ContextEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Text of the most recent entry.
    pub fn last_message(&self) -> Option<&str> {
        self.entries.last().map(|e| e.message.as_str())
    }

    /// Messages written by one node, oldest first.
    pub fn messages_from<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |e| matches!(&e.author, Author::Node(id) if id == node_id))
            .map(|e| e.message.as_str())
    }

    /// True when every entry of `self` appears, in order, at the start of `later`.
    pub fn is_prefix_of(&self, later: &ContextSnapshot) -> bool {
        self.len() <= later.len()
            && self
                .entries
                .iter()
                .zip(later.entries.iter())
                .all(|(a, b)| a == b)
    }

    /// Plain-text transcript, one `[author]` block per entry.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("[{}]\n{}", e.author, e.message))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl Serialize for ContextSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entries.iter())
    }
}
