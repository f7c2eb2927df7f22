//! Security-sensitive path containment checks.
//!
//! Destructive and outward-facing operations (delete, open-in) must only
//! touch directories the user plausibly owns: the home directory plus every
//! project path known to the registry. The checks here must not be fooled by
//! symlinks, `..` segments, or platform path-syntax differences, and they
//! fail closed: anything unresolvable is treated as not contained.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::error::{Result, StoreError};
use crate::registry::StoreRegistry;

// ── Pure path canonicalization ──────────────────────────────────────────────

/// Lexically clean a path: collapse `.` and empty segments, resolve `..`
/// against preceding segments where possible. No filesystem access.
pub fn lexical_clean(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(
                    cleaned.components().next_back(),
                    Some(Component::Normal(_))
                ) && cleaned.pop();
                if !popped && !matches!(cleaned.components().next_back(), Some(Component::RootDir))
                {
                    cleaned.push("..");
                }
            }
            other => cleaned.push(other),
        }
    }
    if cleaned.as_os_str().is_empty() {
        cleaned.push(".");
    }
    cleaned
}

/// Whether two paths refer to the same location after lexical cleaning.
pub fn same_path(a: &Path, b: &Path) -> bool {
    if a.as_os_str().is_empty() || b.as_os_str().is_empty() {
        return false;
    }
    lexical_clean(a) == lexical_clean(b)
}

/// Canonicalize a path string for containment comparison, isolating all
/// platform syntax differences in one pure function.
///
/// Windows-style inputs get their separators normalized to `/`, a drive
/// letter (`C:`) lowercased, and for UNC paths (`//server/share/...`) the
/// server and share segments lowercased. POSIX-style inputs are lexically
/// cleaned. No filesystem access.
pub fn normalize_for_comparison(path: &str) -> String {
    let slashed = path.replace('\\', "/");
    let bytes = slashed.as_bytes();

    let (mut prefix, rest) = if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic()
    {
        // Drive letter: case-insensitive on Windows.
        (
            format!("{}:", slashed[..1].to_ascii_lowercase()),
            &slashed[2..],
        )
    } else if slashed.starts_with("//") {
        // UNC: //server/share is case-insensitive; the rest is not.
        let mut segments = slashed[2..].splitn(3, '/');
        let server = segments.next().unwrap_or("").to_ascii_lowercase();
        let share = segments.next().unwrap_or("").to_ascii_lowercase();
        let tail = segments.next().unwrap_or("");
        // Reborrow the tail with its leading slash so it cleans like a
        // rooted remainder.
        let rest = if tail.is_empty() {
            ""
        } else {
            &slashed[slashed.len() - tail.len() - 1..]
        };
        (format!("//{server}/{share}"), rest)
    } else {
        (String::new(), slashed.as_str())
    };

    // Lexical clean of the remainder.
    let rooted = rest.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|s| *s != "..") {
                    segments.pop();
                } else if !rooted && prefix.is_empty() {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }

    if rooted {
        prefix.push('/');
    }
    let joined = segments.join("/");
    let mut result = format!("{prefix}{joined}");
    if result.is_empty() {
        result.push('.');
    }
    // Drop a trailing separator left by an empty remainder, except for roots.
    if result.len() > 1 && result.ends_with('/') && !result.ends_with("//") {
        result.pop();
    }
    result
}

/// Whether `path` equals `base` or lies strictly inside it, after
/// canonicalization. Appending a trailing separator before the prefix check
/// is what keeps `/foo/barbaz` from matching base `/foo/bar`.
pub fn is_path_within(path: &str, base: &str) -> bool {
    let path = normalize_for_comparison(path);
    let base = normalize_for_comparison(base);
    if path == base {
        return true;
    }
    let base_with_sep = if base.ends_with('/') {
        base
    } else {
        format!("{base}/")
    };
    format!("{path}/").starts_with(&base_with_sep)
}

/// Whether `path` is contained by any of the allowed base directories.
pub fn is_path_within_any(path: &Path, bases: &[PathBuf]) -> bool {
    let path = path.to_string_lossy();
    bases
        .iter()
        .any(|base| is_path_within(&path, &base.to_string_lossy()))
}

// ── Session file containment (used by adapters) ─────────────────────────────

/// Verify that a session file path lies under a store's base directory,
/// resisting `..` traversal and symlink redirection. The base must exist;
/// the candidate is resolved to its real path when possible and lexically
/// cleaned otherwise.
pub fn validate_session_path(path: &Path, base_dir: &Path) -> Result<()> {
    let base_real = fs::canonicalize(base_dir)
        .map_err(|err| StoreError::Io(format!("resolve base dir: {err}")))?;

    let abs = absolutize(path)?;
    // Resolve symlinks when the file exists; fall back to a lexical clean so
    // nonexistent targets (e.g. pre-delete checks) are still traversal-safe.
    let real = fs::canonicalize(&abs).unwrap_or_else(|_| lexical_clean(&abs));

    if real.starts_with(&base_real) {
        Ok(())
    } else {
        Err(StoreError::PathNotAllowed(
            path.to_string_lossy().into_owned(),
        ))
    }
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|err| StoreError::Io(err.to_string()))?;
    Ok(cwd.join(path))
}

// ── Shell metacharacter screening ───────────────────────────────────────────

const SHELL_METACHARACTERS: &[char] = &[
    ';', '|', '&', '$', '`', '(', ')', '{', '}', '<', '>', '"', '\'', '\\', '\n', '\r', '\t',
    '*', '?', '[', ']', '#', '!',
];

/// Reject paths containing characters that could reach a shell or bypass
/// later filters. Run before any filesystem access.
pub fn ensure_no_shell_metacharacters(path: &str) -> Result<()> {
    if path.contains('\0') {
        return Err(StoreError::PathNotAllowed(
            "path contains null byte".to_string(),
        ));
    }
    if let Some(bad) = path.chars().find(|c| SHELL_METACHARACTERS.contains(c)) {
        return Err(StoreError::PathNotAllowed(format!(
            "path contains invalid character: {bad:?}"
        )));
    }
    if path.trim_start().starts_with('-') {
        return Err(StoreError::PathNotAllowed(
            "path cannot start with '-'".to_string(),
        ));
    }
    Ok(())
}

// ── Validator over the registry's allow-list ────────────────────────────────

/// Decides whether a candidate directory is safely reachable for
/// filesystem-affecting operations.
pub struct PathValidator {
    registry: Arc<StoreRegistry>,
    /// Extra allowed bases, primarily for tests.
    pub additional_bases: Vec<PathBuf>,
}

impl PathValidator {
    pub fn new(registry: Arc<StoreRegistry>) -> Self {
        PathValidator {
            registry,
            additional_bases: Vec::new(),
        }
    }

    /// Validate a user-supplied directory path: it must exist, be a
    /// directory, contain no shell metacharacters, and lie within an
    /// allowed base once all symlinks are resolved. Returns the resolved
    /// real path.
    pub fn validate_directory(&self, raw: &str) -> Result<PathBuf> {
        ensure_no_shell_metacharacters(raw)?;

        let abs = absolutize(Path::new(raw))?;
        let metadata = fs::metadata(&abs)
            .map_err(|_| StoreError::Io(format!("path does not exist: {}", abs.display())))?;
        if !metadata.is_dir() {
            return Err(StoreError::PathNotAllowed(format!(
                "path is not a directory: {}",
                abs.display()
            )));
        }

        let real = fs::canonicalize(&abs)
            .map_err(|err| StoreError::Io(format!("cannot resolve path: {err}")))?;

        let bases = self.allowed_base_directories();
        if !is_path_within_any(&real, &bases) {
            return Err(StoreError::PathNotAllowed(format!(
                "path is outside allowed directories: {}",
                real.display()
            )));
        }
        Ok(real)
    }

    /// The allow-list: home directory plus every project path currently
    /// known to the registry, each symlink-resolved so a base that is
    /// itself a symlink cannot be bypassed.
    pub fn allowed_base_directories(&self) -> Vec<PathBuf> {
        let mut bases = Vec::new();
        let mut add = |path: &Path| {
            if path.as_os_str().is_empty() {
                return;
            }
            bases.push(fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()));
        };

        for base in &self.additional_bases {
            add(base);
        }
        if let Some(dirs) = directories::BaseDirs::new() {
            add(dirs.home_dir());
        }
        for project in self.registry.list_all_projects() {
            add(&project.path);
        }
        bases
    }
}
