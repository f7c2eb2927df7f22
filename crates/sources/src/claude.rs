//! Claude Code adapter.
//!
//! Layout on disk: `~/.claude/projects/<encoded-dir>/<session-uuid>.jsonl`,
//! where the encoded directory name is the project path with separators
//! replaced by `-`. Each session file is JSONL with one entry per line; a
//! `sessions-index.json` beside the transcripts, when present, carries
//! precomputed listing metadata.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use sessionhub_core::pathcheck::validate_session_path;
use sessionhub_core::{
    ContentBlock, Entry, Project, Result, Role, SessionMeta, SessionReader, Source, Store,
    StoreCache, StoreError, StoreFactory, TokenUsage, Workspace,
};

use crate::hostname;
use crate::jsonl::LineReader;

/// Environment override for the storage root, mainly for tests and unusual
/// installs.
pub const BASE_DIR_ENV: &str = "SESSIONHUB_CLAUDE_DIR";

/// How many leading lines to inspect when backfilling first-prompt/model
/// metadata from a transcript.
const HINT_SCAN_LINES: usize = 50;

pub struct ClaudeStore {
    base_dir: PathBuf,
    cache: StoreCache,
    workspace_id: OnceLock<String>,
}

impl ClaudeStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        ClaudeStore {
            base_dir: base_dir.into(),
            cache: StoreCache::new(),
            workspace_id: OnceLock::new(),
        }
    }

    /// Store rooted at `$SESSIONHUB_CLAUDE_DIR`, or `~/.claude`.
    pub fn from_env() -> Self {
        Self::new(default_base_dir())
    }

    pub fn set_cache_ttl(&self, ttl: Duration) {
        self.cache.set_name(Source::CLAUDE);
        self.cache.set_ttl(ttl);
    }

    /// Drop all cached listings, forcing the next calls to rescan.
    pub fn reset_cache(&self) {
        self.cache.clear();
    }

    fn projects_dir(&self) -> PathBuf {
        self.base_dir.join("projects")
    }

    /// Stable device identifier: the statsig `stable_id` file when present,
    /// otherwise the hostname, otherwise a random UUID. Computed once.
    fn workspace_id(&self) -> &str {
        self.workspace_id.get_or_init(|| {
            let pattern = self
                .base_dir
                .join("statsig")
                .join("statsig.stable_id.*")
                .to_string_lossy()
                .into_owned();
            if let Ok(matches) = glob::glob(&pattern) {
                for path in matches.flatten() {
                    if let Ok(data) = fs::read_to_string(&path) {
                        let id = data.trim().to_string();
                        if !id.is_empty() {
                            return id;
                        }
                    }
                }
            }
            let host = hostname();
            if host.is_empty() {
                uuid::Uuid::new_v4().to_string()
            } else {
                host
            }
        })
    }

    fn scan_projects(&self) -> Result<Vec<Project>> {
        let dir = self.projects_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::Io(format!("read {}: {err}", dir.display()))),
        };

        let home = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf());
        let workspace_id = self.workspace_id().to_string();

        let mut projects = Vec::new();
        for entry in entries.flatten() {
            if !entry.path().is_dir() {
                continue;
            }
            let dir_path = entry.path();
            let dir_name = entry.file_name().to_string_lossy().into_owned();
            let (mut name, mut full_path) = decode_dir_name(&dir_name);

            // The index's original path, when recorded, beats the decoded one.
            if let Some(index) = read_index(&dir_path) {
                if !index.original_path.is_empty() {
                    full_path = PathBuf::from(&index.original_path);
                    name = basename(&full_path);
                }
            }
            if full_path.as_os_str().is_empty() {
                let Some(home) = home.clone() else { continue };
                full_path = home;
            }
            // Sessions started in the home directory itself are not projects.
            if home.as_deref() == Some(full_path.as_path()) {
                continue;
            }

            let (session_count, last_modified) = count_transcripts(&dir_path);
            if session_count == 0 {
                continue;
            }

            projects.push(Project {
                id: dir_path.to_string_lossy().into_owned(),
                name,
                display_path: full_path.to_string_lossy().into_owned(),
                path_exists: full_path.is_dir(),
                path: full_path,
                session_count,
                last_modified,
                source: Source::claude(),
                workspace_id: workspace_id.clone(),
            });
        }

        projects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(projects)
    }

    fn scan_sessions(&self, project_dir: &Path) -> Result<Vec<SessionMeta>> {
        let entries = match fs::read_dir(project_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(StoreError::Io(format!(
                    "read {}: {err}",
                    project_dir.display()
                )))
            }
        };
        let workspace_id = self.workspace_id().to_string();
        let index = read_index(project_dir);

        let mut sessions = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() || path.extension().is_none_or(|ext| ext != "jsonl") {
                continue;
            }
            let id = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();

            let mut meta = SessionMeta {
                id,
                project_path: project_dir.to_path_buf(),
                full_path: path.clone(),
                source: Source::claude(),
                workspace_id: workspace_id.clone(),
                chunk_count: 1,
                ..Default::default()
            };
            if let Ok(info) = entry.metadata() {
                meta.file_size = info.len();
                let mtime = info.modified().ok().map(DateTime::<Utc>::from);
                meta.modified_at = mtime;
                // Best guess without richer metadata.
                meta.created_at = mtime;
            }
            if let Some(index) = &index {
                enrich_from_index(&mut meta, index);
            }
            if meta.first_prompt.is_empty() || meta.model.is_empty() {
                let (prompt, model) = extract_session_hints(&path);
                if meta.first_prompt.is_empty() {
                    meta.first_prompt = prompt;
                }
                if meta.model.is_empty() {
                    meta.model = model;
                }
            }
            sessions.push(meta);
        }

        sessions.sort_by_key(|s| s.created_at);
        Ok(sessions)
    }

    fn meta_for_path(&self, path: &Path) -> Result<Option<SessionMeta>> {
        if validate_session_path(path, &self.base_dir).is_err() {
            return Ok(None);
        }
        let Ok(info) = fs::metadata(path) else {
            return Ok(None);
        };
        let project_dir = path.parent().unwrap_or(Path::new("")).to_path_buf();

        if let Some(index) = read_index(&project_dir) {
            let file_name = path.file_name().unwrap_or_default().to_string_lossy();
            for entry in &index.entries {
                if format!("{}.jsonl", entry.session_id) == file_name {
                    let mut meta = SessionMeta {
                        id: entry.session_id.clone(),
                        project_path: project_dir.clone(),
                        full_path: path.to_path_buf(),
                        source: Source::claude(),
                        workspace_id: self.workspace_id().to_string(),
                        chunk_count: 1,
                        file_size: info.len(),
                        ..Default::default()
                    };
                    enrich_from_index(&mut meta, &index);
                    return Ok(Some(meta));
                }
            }
        }

        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Some(SessionMeta {
            id,
            project_path: project_dir,
            full_path: path.to_path_buf(),
            file_size: info.len(),
            modified_at: info.modified().ok().map(DateTime::<Utc>::from),
            source: Source::claude(),
            workspace_id: self.workspace_id().to_string(),
            chunk_count: 1,
            ..Default::default()
        }))
    }
}

impl Store for ClaudeStore {
    fn source(&self) -> Source {
        Source::claude()
    }

    fn workspace(&self) -> Workspace {
        let host = hostname();
        Workspace {
            id: self.workspace_id().to_string(),
            name: host.clone(),
            hostname: host,
            source: Source::claude(),
            base_path: Some(self.base_dir.clone()),
        }
    }

    fn list_projects(&self) -> Result<Vec<Project>> {
        self.cache.load_projects(|| self.scan_projects())
    }

    fn list_sessions(&self, project_id: &str) -> Result<Vec<SessionMeta>> {
        self.cache
            .load_sessions(project_id, || self.scan_sessions(Path::new(project_id)))
    }

    fn get_session_meta(&self, session_id: &str) -> Result<Option<SessionMeta>> {
        let path = Path::new(session_id);
        if path.is_absolute() {
            return self.meta_for_path(path);
        }
        for project in self.list_projects()? {
            for session in self.list_sessions(&project.id)? {
                if session.id == session_id {
                    return Ok(Some(session));
                }
            }
        }
        Ok(None)
    }

    fn open_session(&self, session_id: &str) -> Result<Box<dyn SessionReader>> {
        let meta = self
            .get_session_meta(session_id)?
            .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))?;
        let reader = LineReader::open(&meta.full_path)?;
        Ok(Box::new(ClaudeReader {
            lines: reader,
            workspace_id: meta.workspace_id.clone(),
            meta,
        }))
    }
}

/// Registers a Claude store when `~/.claude` (or its override) exists.
#[derive(Default)]
pub struct ClaudeFactory;

impl StoreFactory for ClaudeFactory {
    fn source(&self) -> Source {
        Source::claude()
    }

    fn is_available(&self) -> bool {
        default_base_dir().join("projects").is_dir()
    }

    fn create(&self) -> Result<Option<Arc<dyn Store>>> {
        Ok(Some(Arc::new(ClaudeStore::from_env())))
    }
}

fn default_base_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(BASE_DIR_ENV) {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".claude"))
        .unwrap_or_else(|| PathBuf::from(".claude"))
}

// ── Directory name decoding ─────────────────────────────────────────────────

/// Decode an encoded project directory name back to `(display name, path)`.
///
/// The encoding replaces path separators with `-`, which is ambiguous for
/// directories whose names themselves contain hyphens. The naive decode is
/// checked against the filesystem first; when it does not exist, the path is
/// rebuilt greedily, keeping a `-` literal whenever the separator split does
/// not name an existing directory.
pub fn decode_dir_name(dir_name: &str) -> (String, PathBuf) {
    if dir_name == "-" {
        return ("~".to_string(), PathBuf::new());
    }

    let (prefix, rest) = match dir_name.strip_prefix('-') {
        Some(rest) => ("/".to_string(), rest),
        None => (String::new(), dir_name),
    };
    let segments: Vec<&str> = rest.split('-').collect();
    if segments.is_empty() {
        return (dir_name.to_string(), PathBuf::new());
    }

    let naive = format!("{prefix}{}", segments.join("/"));
    if fs::metadata(&naive).is_ok() {
        let path = PathBuf::from(naive);
        return (basename(&path), path);
    }

    let mut rebuilt = format!("{prefix}{}", segments[0]);
    for segment in &segments[1..] {
        let with_sep = format!("{rebuilt}/{segment}");
        let with_hyphen = format!("{rebuilt}-{segment}");
        if fs::metadata(&with_sep).is_ok() {
            rebuilt = with_sep;
        } else if fs::metadata(&with_hyphen).is_ok() {
            rebuilt = with_hyphen;
        } else {
            rebuilt = with_sep;
        }
    }
    let path = PathBuf::from(rebuilt);
    (basename(&path), path)
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn count_transcripts(dir: &Path) -> (usize, Option<DateTime<Utc>>) {
    let mut count = 0;
    let mut last_modified: Option<DateTime<Utc>> = None;
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() || path.extension().is_none_or(|ext| ext != "jsonl") {
                continue;
            }
            count += 1;
            if let Ok(info) = entry.metadata() {
                if let Ok(mtime) = info.modified() {
                    let mtime = DateTime::<Utc>::from(mtime);
                    if last_modified.is_none_or(|prev| mtime > prev) {
                        last_modified = Some(mtime);
                    }
                }
            }
        }
    }
    (count, last_modified)
}

// ── sessions-index.json ─────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct SessionsIndex {
    #[serde(default)]
    entries: Vec<IndexEntry>,
    #[serde(default, rename = "originalPath")]
    original_path: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexEntry {
    #[serde(default)]
    session_id: String,
    #[serde(default)]
    first_prompt: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    message_count: usize,
    #[serde(default)]
    git_branch: String,
    #[serde(default)]
    created: String,
    #[serde(default)]
    modified: String,
    #[serde(default)]
    file_mtime: i64,
}

fn read_index(project_dir: &Path) -> Option<SessionsIndex> {
    let data = fs::read(project_dir.join("sessions-index.json")).ok()?;
    serde_json::from_slice(&data).ok()
}

fn enrich_from_index(meta: &mut SessionMeta, index: &SessionsIndex) {
    let Some(entry) = index.entries.iter().find(|e| e.session_id == meta.id) else {
        return;
    };
    if let Some(created) = parse_rfc3339(&entry.created) {
        meta.created_at = Some(created);
    }
    if let Some(modified) = parse_rfc3339(&entry.modified) {
        meta.modified_at = Some(modified);
    } else if entry.file_mtime > 0 {
        meta.modified_at = DateTime::<Utc>::from_timestamp_millis(entry.file_mtime);
    }
    if !entry.first_prompt.is_empty() {
        meta.first_prompt = entry.first_prompt.clone();
    }
    if !entry.summary.is_empty() {
        meta.summary = entry.summary.clone();
    }
    if !entry.model.is_empty() {
        meta.model = entry.model.clone();
    }
    if !entry.git_branch.is_empty() {
        meta.git_branch = entry.git_branch.clone();
    }
    if entry.message_count > 0 {
        meta.entry_count = entry.message_count;
    }
}

/// First user prompt and first model from the head of a transcript, bounded
/// to keep listings cheap on huge files.
fn extract_session_hints(path: &Path) -> (String, String) {
    let mut first_prompt = String::new();
    let mut model = String::new();

    let Ok(mut reader) = LineReader::open(path) else {
        return (first_prompt, model);
    };
    for _ in 0..HINT_SCAN_LINES {
        let Ok(Some(line)) = reader.next_line() else {
            break;
        };
        let Ok(raw) = serde_json::from_slice::<RawLine>(line) else {
            continue;
        };
        match raw.kind.as_str() {
            "user" if first_prompt.is_empty() => {
                if let Some(message) = &raw.message {
                    first_prompt = message.text();
                }
            }
            "assistant" if model.is_empty() => {
                if let Some(message) = &raw.message {
                    model = message.model.clone();
                }
            }
            _ => {}
        }
        if !first_prompt.is_empty() && !model.is_empty() {
            break;
        }
    }
    (first_prompt, model)
}

// ── Transcript line shapes ──────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLine {
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    uuid: String,
    #[serde(default)]
    parent_uuid: Option<String>,
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    git_branch: String,
    #[serde(default)]
    cwd: String,
    #[serde(default)]
    is_sidechain: bool,
    #[serde(default)]
    agent_id: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    message: Option<RawMessage>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMessage {
    #[serde(default)]
    model: String,
    #[serde(default)]
    content: Option<RawContent>,
    #[serde(default)]
    usage: Option<RawUsage>,
}

impl RawMessage {
    fn text(&self) -> String {
        match &self.content {
            Some(RawContent::Text(text)) => text.clone(),
            Some(RawContent::Blocks(blocks)) => {
                let texts: Vec<&str> = blocks
                    .iter()
                    .filter_map(|b| match b {
                        RawBlock::Text { text } if !text.is_empty() => Some(text.as_str()),
                        _ => None,
                    })
                    .collect();
                texts.join("\n")
            }
            None => String::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawContent {
    Text(String),
    Blocks(Vec<RawBlock>),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    Thinking {
        #[serde(default)]
        thinking: String,
        #[serde(default)]
        signature: Option<String>,
    },
    ToolUse {
        #[serde(default)]
        id: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    ToolResult {
        #[serde(default)]
        tool_use_id: String,
        #[serde(default)]
        content: serde_json::Value,
        #[serde(default)]
        is_error: bool,
    },
    Image {
        #[serde(default)]
        source: Option<RawMediaSource>,
    },
    Document {
        #[serde(default)]
        source: Option<RawMediaSource>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Default, Deserialize)]
struct RawMediaSource {
    #[serde(default)]
    media_type: String,
    #[serde(default)]
    data: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
    #[serde(default)]
    cache_creation_input_tokens: u64,
    #[serde(default)]
    cache_read_input_tokens: u64,
}

fn convert_role(kind: &str) -> Option<Role> {
    match kind {
        "user" => Some(Role::User),
        "assistant" => Some(Role::Assistant),
        "system" => Some(Role::System),
        "summary" => Some(Role::Summary),
        "progress" => Some(Role::Progress),
        "file-history-snapshot" => Some(Role::Checkpoint),
        _ => None,
    }
}

fn convert_block(block: RawBlock) -> Option<ContentBlock> {
    match block {
        RawBlock::Text { text } => Some(ContentBlock::Text { text }),
        RawBlock::Thinking {
            thinking,
            signature,
        } => Some(ContentBlock::Thinking {
            thinking,
            signature,
        }),
        RawBlock::ToolUse { id, name, input } => Some(ContentBlock::ToolUse { id, name, input }),
        RawBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => Some(ContentBlock::ToolResult {
            tool_use_id,
            content: stringify_tool_content(content),
            is_error,
        }),
        RawBlock::Image { source } | RawBlock::Document { source } => {
            let source = source.unwrap_or_default();
            Some(ContentBlock::Media {
                media_type: source.media_type,
                data: source.data,
            })
        }
        RawBlock::Unknown => None,
    }
}

/// Tool results arrive either as a plain string or as nested content blocks;
/// flatten both to display text.
fn stringify_tool_content(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        serde_json::Value::Array(items) => {
            let texts: Vec<String> = items
                .into_iter()
                .filter_map(|item| {
                    item.get("text")
                        .and_then(|t| t.as_str())
                        .map(str::to_string)
                })
                .collect();
            texts.join("\n")
        }
        other => other.to_string(),
    }
}

fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn convert_entry(raw: RawLine, workspace_id: &str) -> Option<Entry> {
    let role = convert_role(&raw.kind)?;
    let mut entry = Entry {
        uuid: raw.uuid,
        parent_uuid: raw.parent_uuid,
        role,
        timestamp: parse_rfc3339(&raw.timestamp).unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        source: Source::claude(),
        workspace_id: workspace_id.to_string(),
        agent_id: raw.agent_id,
        content_blocks: Vec::new(),
        text: String::new(),
        model: String::new(),
        usage: None,
        git_branch: raw.git_branch,
        cwd: raw.cwd,
        is_sidechain: raw.is_sidechain,
    };

    if role == Role::Summary {
        entry.text = raw.summary;
        return Some(entry);
    }

    if let Some(message) = raw.message {
        entry.model = message.model.clone();
        if let Some(usage) = &message.usage {
            entry.usage = Some(TokenUsage {
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
                cache_creation_input_tokens: usage.cache_creation_input_tokens,
                cache_read_input_tokens: usage.cache_read_input_tokens,
            });
        }
        match message.content {
            Some(RawContent::Text(text)) => entry.text = text,
            Some(RawContent::Blocks(blocks)) => {
                entry.content_blocks = blocks.into_iter().filter_map(convert_block).collect();
            }
            None => {}
        }
    }
    Some(entry)
}

struct ClaudeReader {
    lines: LineReader<fs::File>,
    meta: SessionMeta,
    workspace_id: String,
}

impl SessionReader for ClaudeReader {
    fn metadata(&self) -> SessionMeta {
        self.meta.clone()
    }

    fn read_next(&mut self) -> Result<Option<Entry>> {
        while let Some(line) = self.lines.next_line()? {
            let raw: RawLine = match serde_json::from_slice(line) {
                Ok(raw) => raw,
                Err(err) => {
                    tracing::debug!(line = self.lines.line_no(), error = %err, "skipping malformed line");
                    continue;
                }
            };
            if let Some(entry) = convert_entry(raw, &self.workspace_id) {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_session(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.join(format!("{name}.jsonl"));
        fs::write(&path, lines.join("\n")).unwrap();
        path
    }

    fn fixture_store(tmp: &tempfile::TempDir) -> (ClaudeStore, PathBuf) {
        let base = tmp.path().join("claude-home");
        let project_dir = base.join("projects").join("-work-demo");
        fs::create_dir_all(&project_dir).unwrap();
        write_session(
            &project_dir,
            "11111111-aaaa",
            &[
                r#"{"type":"user","uuid":"u1","timestamp":"2026-01-02T10:00:00Z","cwd":"/work/demo","message":{"role":"user","content":"fix the bug"}}"#,
                "this line is not json",
                r#"{"type":"assistant","uuid":"a1","parentUuid":"u1","timestamp":"2026-01-02T10:00:05Z","message":{"role":"assistant","model":"some-model","content":[{"type":"thinking","thinking":"hmm"},{"type":"text","text":"done"}],"usage":{"input_tokens":12,"output_tokens":3}}}"#,
                r#"{"type":"assistant","uuid":"a2","timestamp":"2026-01-02T10:00:06Z","message":{"role":"assistant","content":[{"type":"tool_use","id":"t1","name":"Read","input":{"path":"x"}}]}}"#,
                r#"{"type":"user","uuid":"u2","timestamp":"2026-01-02T10:00:07Z","message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"t1","content":[{"type":"text","text":"file body"}]}]}}"#,
            ],
        );
        (ClaudeStore::new(&base), project_dir)
    }

    #[test]
    fn decode_dir_name_validates_against_filesystem() {
        let tmp = tempfile::tempdir().unwrap();
        let hyphenated = tmp.path().join("my-app");
        fs::create_dir_all(&hyphenated).unwrap();

        let encoded = tmp
            .path()
            .join("my-app")
            .to_string_lossy()
            .replace('/', "-");
        let (name, path) = decode_dir_name(&encoded);
        assert_eq!(path, hyphenated);
        assert_eq!(name, "my-app");
    }

    #[test]
    fn decode_dir_name_naive_for_plain_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let plain = tmp.path().join("plain");
        fs::create_dir_all(&plain).unwrap();

        let encoded = plain.to_string_lossy().replace('/', "-");
        let (name, path) = decode_dir_name(&encoded);
        assert_eq!(path, plain);
        assert_eq!(name, "plain");
    }

    #[test]
    fn lists_projects_with_session_counts() {
        let tmp = tempfile::tempdir().unwrap();
        let (store, _) = fixture_store(&tmp);

        let projects = store.list_projects().unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, "demo");
        assert_eq!(projects[0].session_count, 1);
        assert_eq!(projects[0].source, Source::claude());
    }

    #[test]
    fn empty_project_directories_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let (store, _) = fixture_store(&tmp);
        fs::create_dir_all(tmp.path().join("claude-home/projects/-work-empty")).unwrap();

        let projects = store.list_projects().unwrap();
        assert_eq!(projects.len(), 1);
    }

    #[test]
    fn session_listing_extracts_first_prompt_and_model() {
        let tmp = tempfile::tempdir().unwrap();
        let (store, project_dir) = fixture_store(&tmp);

        let sessions = store
            .list_sessions(&project_dir.to_string_lossy())
            .unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, "11111111-aaaa");
        assert_eq!(sessions[0].first_prompt, "fix the bug");
        assert_eq!(sessions[0].model, "some-model");
        assert!(sessions[0].file_size > 0);
    }

    #[test]
    fn reader_preserves_order_and_skips_malformed_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let (store, _) = fixture_store(&tmp);

        let mut reader = store.open_session("11111111-aaaa").unwrap();
        let mut entries = Vec::new();
        while let Some(entry) = reader.read_next().unwrap() {
            entries.push(entry);
        }

        let uuids: Vec<&str> = entries.iter().map(|e| e.uuid.as_str()).collect();
        assert_eq!(uuids, vec!["u1", "a1", "a2", "u2"]);
        assert_eq!(entries[0].text, "fix the bug");
        assert!(entries[1].has_thinking());
        assert_eq!(entries[1].usage.unwrap().input_tokens, 12);
        assert!(matches!(
            &entries[3].content_blocks[0],
            ContentBlock::ToolResult { content, .. } if content == "file body"
        ));
    }

    #[test]
    fn absolute_path_lookup_stays_inside_base_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let (store, project_dir) = fixture_store(&tmp);

        let inside = project_dir.join("11111111-aaaa.jsonl");
        assert!(store
            .get_session_meta(&inside.to_string_lossy())
            .unwrap()
            .is_some());

        let outside = tmp.path().join("elsewhere.jsonl");
        fs::write(&outside, "{}").unwrap();
        assert!(store
            .get_session_meta(&outside.to_string_lossy())
            .unwrap()
            .is_none());
    }

    #[test]
    fn index_metadata_enriches_listings() {
        let tmp = tempfile::tempdir().unwrap();
        let (store, project_dir) = fixture_store(&tmp);
        fs::write(
            project_dir.join("sessions-index.json"),
            r#"{"version":1,"entries":[{"sessionId":"11111111-aaaa","summary":"Bug hunt","gitBranch":"main","messageCount":4,"created":"2026-01-02T10:00:00Z","modified":"2026-01-02T10:00:07Z"}]}"#,
        )
        .unwrap();

        let sessions = store
            .list_sessions(&project_dir.to_string_lossy())
            .unwrap();
        assert_eq!(sessions[0].summary, "Bug hunt");
        assert_eq!(sessions[0].git_branch, "main");
        assert_eq!(sessions[0].entry_count, 4);
    }
}
