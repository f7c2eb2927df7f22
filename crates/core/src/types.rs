//! Common record types spoken by every adapter and consumer.
//!
//! All records are derived, read-only snapshots of on-disk state. Adapters
//! recreate them on every scan; nothing in this layer mutates an adapter's
//! files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Identifies the AI coding assistant that created a record.
///
/// String-backed so new adapters can be registered without touching this
/// crate. Global uniqueness of a project or session is `(Source, id)`.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Source(String);

impl Source {
    pub const CLAUDE: &'static str = "claude";
    pub const CODEX: &'static str = "codex";

    pub fn new(tag: impl Into<String>) -> Self {
        Source(tag.into())
    }

    pub fn claude() -> Self {
        Source::new(Self::CLAUDE)
    }

    pub fn codex() -> Self {
        Source::new(Self::CODEX)
    }

    pub fn as_str(&self) -> &str {
        if self.0.is_empty() {
            "unknown"
        } else {
            &self.0
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.0.is_empty()
    }

    /// Human-readable description for source listings.
    pub fn description(&self) -> String {
        match self.0.as_str() {
            Self::CLAUDE => "Claude Code sessions (~/.claude)".to_string(),
            Self::CODEX => "Codex CLI sessions (~/.codex)".to_string(),
            "" => "unknown source".to_string(),
            other => format!("{other} sessions"),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Source {
    fn from(tag: &str) -> Self {
        Source::new(tag)
    }
}

/// Identifies a machine/host where sessions originate. One per [`crate::Store`]
/// instance, immutable after construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Workspace {
    /// Best-effort stable device identifier, falling back to hostname.
    pub id: String,
    /// Human-readable name, usually the hostname.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hostname: String,
    pub source: Source,
    /// Root storage path for this source (e.g. `~/.claude`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<PathBuf>,
}

/// Message role within a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    Tool,
    System,
    Summary,
    Progress,
    /// State recovery markers (file-history snapshots and the like).
    Checkpoint,
}

/// A piece of content within an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
    Media {
        media_type: String,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        data: String,
    },
}

/// Token consumption counters for a single entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
}

/// A single turn in a conversation. Immutable once produced by an adapter;
/// ordering is the adapter's emission order and is preserved end-to-end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub uuid: String,
    /// Parent entry for branching conversations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_uuid: Option<String>,
    pub role: Role,
    pub timestamp: DateTime<Utc>,

    // Provenance.
    #[serde(default, skip_serializing_if = "Source::is_unknown")]
    pub source: Source,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub workspace_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub agent_id: String,

    // Content: blocks, or the plain-text shortcut used by simple formats.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content_blocks: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub git_branch: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cwd: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_sidechain: bool,
}

impl Entry {
    /// The text content of this entry: the `text` shortcut if set, otherwise
    /// the joined text blocks.
    pub fn text_content(&self) -> String {
        if !self.text.is_empty() {
            return self.text.clone();
        }
        let texts: Vec<&str> = self
            .content_blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } if !text.is_empty() => Some(text.as_str()),
                _ => None,
            })
            .collect();
        texts.join("\n")
    }

    pub fn has_thinking(&self) -> bool {
        self.content_blocks.iter().any(|b| {
            matches!(b, ContentBlock::Thinking { thinking, .. } if !thinking.is_empty())
        })
    }

    pub fn is_user_prompt(&self) -> bool {
        self.role == Role::User && !self.text_content().is_empty()
    }

    /// Estimated displayable content size in bytes (text, thinking, and tool
    /// results; not raw file bytes). Drives the lazy loader's byte budgets.
    pub fn estimate_content_size(&self) -> usize {
        let mut size = self.text.len();
        for block in &self.content_blocks {
            size += match block {
                ContentBlock::Text { text } => text.len(),
                ContentBlock::Thinking { thinking, .. } => thinking.len(),
                ContentBlock::ToolResult { content, .. } => content.len(),
                _ => 0,
            };
        }
        size
    }
}

/// Lightweight session descriptor. Never holds full message content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMeta {
    pub id: String,
    /// Normalized project path this session belongs to.
    pub project_path: PathBuf,
    /// Path to the session file.
    pub full_path: PathBuf,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub first_prompt: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    pub entry_count: usize,
    /// Size of the session file in bytes.
    pub file_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub git_branch: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,
    pub source: Source,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub workspace_id: String,
    /// Number of files backing the session: 0 = unknown, 1 = single file,
    /// 2+ = chunked across multiple files.
    pub chunk_count: u32,
}

/// A complete conversation: metadata plus the full ordered entry sequence.
/// Only materialized on demand; transcripts can be arbitrarily large.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub meta: SessionMeta,
    pub entries: Vec<Entry>,
}

impl Session {
    pub fn user_prompts(&self) -> Vec<&Entry> {
        self.entries.iter().filter(|e| e.is_user_prompt()).collect()
    }

    pub fn entry_by_uuid(&self, uuid: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.uuid == uuid)
    }

    /// Time span from first to last entry.
    pub fn duration(&self) -> chrono::Duration {
        match (self.entries.first(), self.entries.last()) {
            (Some(first), Some(last)) if self.entries.len() >= 2 => {
                last.timestamp - first.timestamp
            }
            _ => chrono::Duration::zero(),
        }
    }

    pub fn total_token_usage(&self) -> TokenUsage {
        let mut total = TokenUsage::default();
        for entry in &self.entries {
            if let Some(usage) = entry.usage {
                total.input_tokens += usage.input_tokens;
                total.output_tokens += usage.output_tokens;
                total.cache_creation_input_tokens += usage.cache_creation_input_tokens;
                total.cache_read_input_tokens += usage.cache_read_input_tokens;
            }
        }
        total
    }
}

/// A working directory that owns zero or more sessions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Project {
    /// Adapter-defined identifier, unique within a single source.
    pub id: String,
    /// Display name, usually the final path segment.
    pub name: String,
    /// Canonical filesystem path of the working directory.
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_path: String,
    /// Denormalized by the adapter; not recomputed by this layer.
    pub session_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    pub source: Source,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub workspace_id: String,
    /// Whether the directory still exists on disk. Computed fresh by the
    /// registry at listing time, never cached.
    pub path_exists: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(role: Role, text: &str) -> Entry {
        Entry {
            uuid: "u".to_string(),
            parent_uuid: None,
            role,
            timestamp: Utc::now(),
            source: Source::default(),
            workspace_id: String::new(),
            agent_id: String::new(),
            content_blocks: Vec::new(),
            text: text.to_string(),
            model: String::new(),
            usage: None,
            git_branch: String::new(),
            cwd: String::new(),
            is_sidechain: false,
        }
    }

    #[test]
    fn text_content_prefers_shortcut() {
        let mut e = entry(Role::User, "shortcut");
        e.content_blocks.push(ContentBlock::Text {
            text: "block".to_string(),
        });
        assert_eq!(e.text_content(), "shortcut");
    }

    #[test]
    fn text_content_joins_text_blocks() {
        let mut e = entry(Role::Assistant, "");
        e.content_blocks.push(ContentBlock::Text {
            text: "one".to_string(),
        });
        e.content_blocks.push(ContentBlock::Thinking {
            thinking: "hidden".to_string(),
            signature: None,
        });
        e.content_blocks.push(ContentBlock::Text {
            text: "two".to_string(),
        });
        assert_eq!(e.text_content(), "one\ntwo");
    }

    #[test]
    fn estimate_content_size_counts_displayable_bytes() {
        let mut e = entry(Role::Assistant, "");
        e.content_blocks.push(ContentBlock::Text {
            text: "12345".to_string(),
        });
        e.content_blocks.push(ContentBlock::Thinking {
            thinking: "123".to_string(),
            signature: None,
        });
        e.content_blocks.push(ContentBlock::ToolResult {
            tool_use_id: "t1".to_string(),
            content: "12".to_string(),
            is_error: false,
        });
        e.content_blocks.push(ContentBlock::ToolUse {
            id: "t1".to_string(),
            name: "Read".to_string(),
            input: serde_json::json!({"path": "ignored for sizing"}),
        });
        assert_eq!(e.estimate_content_size(), 10);
    }

    #[test]
    fn user_prompt_requires_user_role_and_text() {
        assert!(entry(Role::User, "hi").is_user_prompt());
        assert!(!entry(Role::User, "").is_user_prompt());
        assert!(!entry(Role::Assistant, "hi").is_user_prompt());
    }

    #[test]
    fn total_token_usage_sums_entries() {
        let mut a = entry(Role::Assistant, "x");
        a.usage = Some(TokenUsage {
            input_tokens: 10,
            output_tokens: 5,
            ..Default::default()
        });
        let mut b = entry(Role::Assistant, "y");
        b.usage = Some(TokenUsage {
            input_tokens: 1,
            output_tokens: 2,
            ..Default::default()
        });
        let session = Session {
            meta: SessionMeta::default(),
            entries: vec![a, b],
        };
        let total = session.total_token_usage();
        assert_eq!(total.input_tokens, 11);
        assert_eq!(total.output_tokens, 7);
    }

    #[test]
    fn source_display_and_description() {
        assert_eq!(Source::claude().to_string(), "claude");
        assert_eq!(Source::default().to_string(), "unknown");
        assert!(Source::new("goose").description().contains("goose"));
    }
}
