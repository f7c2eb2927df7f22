//! Codex CLI adapter.
//!
//! Layout on disk: `~/.codex/sessions/YYYY/MM/DD/rollout-*.jsonl`. There is
//! no project directory structure; projects are inferred by grouping sessions
//! on the working directory recorded in their `session_meta` line. Rollout
//! files interleave `event_msg` lines (UI events) with `response_item` lines
//! (the model-facing transcript); the two often duplicate each other, so the
//! reader drops an event when the matching response item follows it.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use sessionhub_core::pathcheck::validate_session_path;
use sessionhub_core::{
    ContentBlock, Entry, Project, Result, Role, SessionMeta, SessionReader, Source, Store,
    StoreCache, StoreError, StoreFactory, Workspace,
};

use crate::hostname;
use crate::jsonl::LineReader;

pub const BASE_DIR_ENV: &str = "SESSIONHUB_CODEX_DIR";

/// Project key for sessions whose rollout never records a working directory.
const UNKNOWN_PROJECT: &str = "unknown";

pub struct CodexStore {
    base_dir: PathBuf,
    cache: StoreCache,
}

impl CodexStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        CodexStore {
            base_dir: base_dir.into(),
            cache: StoreCache::new(),
        }
    }

    /// Store rooted at `$SESSIONHUB_CODEX_DIR`, or `~/.codex`.
    pub fn from_env() -> Self {
        Self::new(default_base_dir())
    }

    pub fn set_cache_ttl(&self, ttl: Duration) {
        self.cache.set_name(Source::CODEX);
        self.cache.set_ttl(ttl);
    }

    pub fn reset_cache(&self) {
        self.cache.clear();
    }

    fn workspace_id(&self) -> String {
        format!("codex-cli-{}", hostname())
    }

    /// Every rollout file under the sessions tree, newest first.
    fn scan_sessions(&self) -> Result<Vec<SessionMeta>> {
        let root = self.base_dir.join("sessions");
        if !root.is_dir() {
            return Ok(Vec::new());
        }

        let pattern = root.join("**").join("*.jsonl").to_string_lossy().into_owned();
        let paths = glob::glob(&pattern)
            .map_err(|err| StoreError::Other(format!("bad session glob: {err}")))?;

        let workspace_id = self.workspace_id();
        let mut sessions = Vec::new();
        for path in paths.flatten() {
            match read_session_meta(&path, &workspace_id) {
                Ok(Some(meta)) => sessions.push(meta),
                Ok(None) => {}
                Err(err) => {
                    tracing::debug!(path = %path.display(), error = %err, "skipping unreadable rollout");
                }
            }
        }
        sessions.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));
        Ok(sessions)
    }
}

impl Store for CodexStore {
    fn source(&self) -> Source {
        Source::codex()
    }

    fn workspace(&self) -> Workspace {
        let host = hostname();
        Workspace {
            id: self.workspace_id(),
            name: "Codex CLI".to_string(),
            hostname: host,
            source: Source::codex(),
            base_path: Some(self.base_dir.clone()),
        }
    }

    fn list_projects(&self) -> Result<Vec<Project>> {
        self.cache.load_projects(|| {
            let sessions = self.scan_sessions()?;
            let workspace_id = self.workspace_id();

            let mut by_path: HashMap<PathBuf, Project> = HashMap::new();
            for session in &sessions {
                let project_path = if session.project_path.as_os_str().is_empty() {
                    PathBuf::from(UNKNOWN_PROJECT)
                } else {
                    session.project_path.clone()
                };

                let project = by_path.entry(project_path.clone()).or_insert_with(|| {
                    let name = project_path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .filter(|n| !n.is_empty())
                        .unwrap_or_else(|| UNKNOWN_PROJECT.to_string());
                    Project {
                        id: project_path.to_string_lossy().into_owned(),
                        name,
                        display_path: project_path.to_string_lossy().into_owned(),
                        path_exists: project_path.is_dir(),
                        path: project_path,
                        source: Source::codex(),
                        workspace_id: workspace_id.clone(),
                        ..Default::default()
                    }
                });
                project.session_count += 1;
                if session.modified_at > project.last_modified {
                    project.last_modified = session.modified_at;
                }
            }

            let mut projects: Vec<Project> = by_path.into_values().collect();
            projects.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
            Ok(projects)
        })
    }

    fn list_sessions(&self, project_id: &str) -> Result<Vec<SessionMeta>> {
        self.cache.load_sessions(project_id, || {
            let sessions = self.scan_sessions()?;
            Ok(sessions
                .into_iter()
                .filter(|s| s.project_path.as_os_str() == project_id)
                .collect())
        })
    }

    fn get_session_meta(&self, session_id: &str) -> Result<Option<SessionMeta>> {
        let path = Path::new(session_id);
        if path.is_absolute() {
            if validate_session_path(path, &self.base_dir).is_err() || !path.is_file() {
                return Ok(None);
            }
            return read_session_meta(path, &self.workspace_id());
        }
        Ok(self
            .scan_sessions()?
            .into_iter()
            .find(|s| s.id == session_id))
    }

    fn open_session(&self, session_id: &str) -> Result<Box<dyn SessionReader>> {
        let meta = self
            .get_session_meta(session_id)?
            .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))?;
        let lines = LineReader::open(&meta.full_path)?;
        Ok(Box::new(CodexReader {
            lines,
            session_id: meta.id.clone(),
            workspace_id: meta.workspace_id.clone(),
            meta,
            pending: None,
            queued: None,
        }))
    }
}

/// Registers a Codex store when `~/.codex/sessions` (or its override) exists.
#[derive(Default)]
pub struct CodexFactory;

impl StoreFactory for CodexFactory {
    fn source(&self) -> Source {
        Source::codex()
    }

    fn is_available(&self) -> bool {
        default_base_dir().join("sessions").is_dir()
    }

    fn create(&self) -> Result<Option<Arc<dyn Store>>> {
        Ok(Some(Arc::new(CodexStore::from_env())))
    }
}

fn default_base_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(BASE_DIR_ENV) {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".codex"))
        .unwrap_or_else(|| PathBuf::from(".codex"))
}

// ── Rollout line shapes ─────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct LogLine {
    #[serde(default)]
    timestamp: String,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Default, Deserialize)]
struct SessionMetaPayload {
    #[serde(default)]
    id: String,
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    cwd: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    model_provider: String,
    #[serde(default)]
    git: GitPayload,
}

#[derive(Debug, Default, Deserialize)]
struct GitPayload {
    #[serde(default)]
    branch: String,
}

/// One pass over a rollout file, collecting listing metadata without
/// materializing entries.
fn read_session_meta(path: &Path, workspace_id: &str) -> Result<Option<SessionMeta>> {
    let info = fs::metadata(path).map_err(|err| StoreError::Io(err.to_string()))?;

    let mut meta = SessionMeta {
        id: path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
        full_path: path.to_path_buf(),
        file_size: info.len(),
        modified_at: info.modified().ok().map(DateTime::<Utc>::from),
        source: Source::codex(),
        workspace_id: workspace_id.to_string(),
        chunk_count: 1,
        ..Default::default()
    };

    let mut reader = LineReader::open(path)?;
    while let Some(line) = reader.next_line()? {
        let Ok(log) = serde_json::from_slice::<LogLine>(line) else {
            continue;
        };
        if meta.created_at.is_none() {
            meta.created_at = parse_rfc3339(&log.timestamp);
        }

        match log.kind.as_str() {
            "session_meta" => {
                let Ok(payload) = serde_json::from_value::<SessionMetaPayload>(log.payload) else {
                    continue;
                };
                if !payload.id.is_empty() {
                    meta.id = payload.id;
                }
                if !payload.cwd.is_empty() {
                    meta.project_path = PathBuf::from(payload.cwd);
                }
                if !payload.model.is_empty() {
                    meta.model = payload.model;
                } else if meta.model.is_empty() && !payload.model_provider.is_empty() {
                    meta.model = payload.model_provider;
                }
                if !payload.git.branch.is_empty() {
                    meta.git_branch = payload.git.branch;
                }
                if meta.created_at.is_none() {
                    meta.created_at = parse_rfc3339(&payload.timestamp);
                }
            }
            "event_msg" => match read_str(&log.payload, "type") {
                "user_message" => {
                    meta.entry_count += 1;
                    if meta.first_prompt.is_empty() {
                        meta.first_prompt = read_str(&log.payload, "message").to_string();
                    }
                }
                "agent_message" | "agent_reasoning" => meta.entry_count += 1,
                "turn_context" => {
                    if meta.project_path.as_os_str().is_empty() {
                        meta.project_path = PathBuf::from(read_str(&log.payload, "cwd"));
                    }
                    if meta.model.is_empty() {
                        meta.model = read_str(&log.payload, "model").to_string();
                    }
                }
                _ => {}
            },
            "response_item" => match read_str(&log.payload, "type") {
                "message" => {
                    let role = read_str(&log.payload, "role");
                    if role == "user" || role == "assistant" {
                        meta.entry_count += 1;
                    }
                    if meta.first_prompt.is_empty() && role == "user" {
                        meta.first_prompt = extract_message_text(log.payload.get("content"));
                    }
                }
                "reasoning" | "function_call" | "function_call_output" | "custom_tool_call"
                | "custom_tool_call_output" => meta.entry_count += 1,
                _ => {}
            },
            _ => {}
        }
    }

    if meta.created_at.is_none() {
        meta.created_at = meta.modified_at;
    }
    if meta.project_path.as_os_str().is_empty() {
        meta.project_path = PathBuf::from(UNKNOWN_PROJECT);
    }
    Ok(Some(meta))
}

// ── Streaming reader ────────────────────────────────────────────────────────

struct Parsed {
    entry: Entry,
    kind: &'static str,
    from_event: bool,
}

struct CodexReader {
    lines: LineReader<fs::File>,
    meta: SessionMeta,
    session_id: String,
    workspace_id: String,
    /// Event-channel entry held back until the next line decides whether a
    /// response item duplicates it.
    pending: Option<Parsed>,
    queued: Option<Entry>,
}

impl SessionReader for CodexReader {
    fn metadata(&self) -> SessionMeta {
        self.meta.clone()
    }

    fn read_next(&mut self) -> Result<Option<Entry>> {
        if let Some(entry) = self.queued.take() {
            return Ok(Some(entry));
        }

        loop {
            // Copied out so the parse can borrow `self` again.
            let Some(line) = self.lines.next_line()?.map(<[u8]>::to_vec) else {
                break;
            };
            let line_no = self.lines.line_no();
            let Some(parsed) = self.convert_line(&line, line_no) else {
                continue;
            };

            let Some(pending) = self.pending.take() else {
                if parsed.from_event {
                    self.pending = Some(parsed);
                    continue;
                }
                return Ok(Some(parsed.entry));
            };

            if is_duplicate_pair(&pending, &parsed) {
                return Ok(Some(parsed.entry));
            }

            if parsed.from_event {
                self.pending = Some(parsed);
            } else {
                self.queued = Some(parsed.entry);
            }
            return Ok(Some(pending.entry));
        }

        Ok(self.pending.take().map(|p| p.entry))
    }
}

impl CodexReader {
    fn convert_line(&self, line: &[u8], line_no: usize) -> Option<Parsed> {
        let log: LogLine = serde_json::from_slice(line).ok()?;
        let timestamp = parse_rfc3339(&log.timestamp).unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        match log.kind.as_str() {
            "event_msg" => self.convert_event(&log.payload, timestamp, line_no),
            "response_item" => self.convert_response_item(&log.payload, timestamp, line_no),
            _ => None,
        }
    }

    fn convert_event(&self, payload: &Value, timestamp: DateTime<Utc>, line_no: usize) -> Option<Parsed> {
        match read_str(payload, "type") {
            "user_message" => {
                let text = read_str(payload, "message");
                if text.is_empty() {
                    return None;
                }
                Some(Parsed {
                    entry: self.new_entry(Role::User, timestamp, line_no, "user_message", text),
                    kind: "user_message",
                    from_event: true,
                })
            }
            "agent_message" => {
                let text = read_str(payload, "message");
                if text.is_empty() {
                    return None;
                }
                Some(Parsed {
                    entry: self.new_entry(Role::Assistant, timestamp, line_no, "agent_message", text),
                    kind: "agent_message",
                    from_event: true,
                })
            }
            "agent_reasoning" => {
                let thinking = read_str(payload, "text");
                if thinking.is_empty() {
                    return None;
                }
                let mut entry =
                    self.new_entry(Role::Assistant, timestamp, line_no, "agent_reasoning", "");
                entry.content_blocks = vec![ContentBlock::Thinking {
                    thinking: thinking.to_string(),
                    signature: None,
                }];
                Some(Parsed {
                    entry,
                    kind: "agent_reasoning",
                    from_event: true,
                })
            }
            _ => None,
        }
    }

    fn convert_response_item(
        &self,
        payload: &Value,
        timestamp: DateTime<Utc>,
        line_no: usize,
    ) -> Option<Parsed> {
        match read_str(payload, "type") {
            "message" => {
                let role = match read_str(payload, "role") {
                    "user" => Role::User,
                    "assistant" => Role::Assistant,
                    _ => Role::System,
                };
                let text = extract_message_text(payload.get("content"));
                if text.is_empty() {
                    return None;
                }
                Some(Parsed {
                    entry: self.new_entry(role, timestamp, line_no, "message", &text),
                    kind: "message",
                    from_event: false,
                })
            }
            "reasoning" => {
                let thinking = extract_reasoning_text(payload);
                if thinking.is_empty() {
                    return None;
                }
                let mut entry = self.new_entry(Role::Assistant, timestamp, line_no, "reasoning", "");
                entry.content_blocks = vec![ContentBlock::Thinking {
                    thinking,
                    signature: None,
                }];
                Some(Parsed {
                    entry,
                    kind: "reasoning",
                    from_event: false,
                })
            }
            kind @ ("function_call" | "custom_tool_call") => {
                let call_id = read_str(payload, "call_id").to_string();
                let name = read_str(payload, "name").to_string();
                if call_id.is_empty() && name.is_empty() {
                    return None;
                }
                let kind: &'static str = if kind == "function_call" {
                    "function_call"
                } else {
                    "custom_tool_call"
                };
                let mut entry = self.new_entry(Role::Assistant, timestamp, line_no, kind, "");
                entry.uuid = format!("{}:{}", entry.uuid, call_id);
                entry.content_blocks = vec![ContentBlock::ToolUse {
                    id: call_id,
                    name,
                    input: parse_tool_input(payload),
                }];
                Some(Parsed {
                    entry,
                    kind,
                    from_event: false,
                })
            }
            kind @ ("function_call_output" | "custom_tool_call_output") => {
                let call_id = read_str(payload, "call_id").to_string();
                let output = normalize_tool_output(payload.get("output"));
                if call_id.is_empty() && output.is_empty() {
                    return None;
                }
                let kind: &'static str = if kind == "function_call_output" {
                    "function_call_output"
                } else {
                    "custom_tool_call_output"
                };
                let mut entry = self.new_entry(Role::Tool, timestamp, line_no, kind, "");
                entry.uuid = format!("{}:{}", entry.uuid, call_id);
                entry.content_blocks = vec![ContentBlock::ToolResult {
                    tool_use_id: call_id,
                    content: output,
                    is_error: false,
                }];
                Some(Parsed {
                    entry,
                    kind,
                    from_event: false,
                })
            }
            _ => None,
        }
    }

    fn new_entry(
        &self,
        role: Role,
        timestamp: DateTime<Utc>,
        line_no: usize,
        kind: &str,
        text: &str,
    ) -> Entry {
        Entry {
            // Rollout lines carry no IDs; synthesize stable ones from
            // position so re-reads produce identical entries.
            uuid: format!("{}:{line_no:06}:{kind}", self.session_id),
            parent_uuid: None,
            role,
            timestamp,
            source: Source::codex(),
            workspace_id: self.workspace_id.clone(),
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
}

/// Whether `current` is the response-channel copy of the held-back event.
fn is_duplicate_pair(event: &Parsed, current: &Parsed) -> bool {
    if current.from_event || event.entry.role != current.entry.role {
        return false;
    }
    let event_text = comparable_text(&event.entry);
    let current_text = comparable_text(&current.entry);
    if event_text.is_empty() || event_text != current_text {
        return false;
    }
    match event.kind {
        "user_message" | "agent_message" => current.kind == "message",
        "agent_reasoning" => current.kind == "reasoning",
        _ => false,
    }
}

fn comparable_text(entry: &Entry) -> String {
    let text = entry.text.trim();
    if !text.is_empty() {
        return text.to_string();
    }
    for block in &entry.content_blocks {
        if let ContentBlock::Thinking { thinking, .. } = block {
            let thinking = thinking.trim();
            if !thinking.is_empty() {
                return thinking.to_string();
            }
        }
    }
    String::new()
}

// ── Payload helpers ─────────────────────────────────────────────────────────

fn read_str<'a>(payload: &'a Value, key: &str) -> &'a str {
    payload.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Join the text parts of a response message's content array. Input variants
/// use `input_text`/`output_text` instead of `text`.
fn extract_message_text(content: Option<&Value>) -> String {
    let Some(Value::Array(items)) = content else {
        return String::new();
    };
    let mut parts = Vec::new();
    for item in items {
        for key in ["text", "input_text", "output_text"] {
            let text = read_str(item, key);
            if !text.is_empty() {
                parts.push(text);
                break;
            }
        }
    }
    parts.join("\n").trim().to_string()
}

fn extract_reasoning_text(payload: &Value) -> String {
    if let Some(Value::Array(summary)) = payload.get("summary") {
        let parts: Vec<&str> = summary
            .iter()
            .filter(|item| read_str(item, "type") == "summary_text")
            .map(|item| read_str(item, "text"))
            .filter(|text| !text.is_empty())
            .collect();
        if !parts.is_empty() {
            return parts.join("\n").trim().to_string();
        }
    }
    read_str(payload, "text").trim().to_string()
}

/// `function_call` carries JSON-in-a-string under `arguments`;
/// `custom_tool_call` carries raw text under `input`.
fn parse_tool_input(payload: &Value) -> Value {
    let args = read_str(payload, "arguments");
    if !args.is_empty() {
        return serde_json::from_str(args).unwrap_or_else(|_| Value::String(args.to_string()));
    }
    let input = read_str(payload, "input");
    if !input.is_empty() {
        return Value::String(input.to_string());
    }
    Value::Null
}

fn normalize_tool_output(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return String::new();
            }
            // Output is often itself a JSON object with an "output" field.
            if let Ok(wrapped) = serde_json::from_str::<Value>(trimmed) {
                let inner = read_str(&wrapped, "output");
                if !inner.is_empty() {
                    return inner.to_string();
                }
            }
            s.clone()
        }
        Some(other) => other.to_string(),
    }
}

fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
