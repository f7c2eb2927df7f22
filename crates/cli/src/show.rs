use anyhow::{Context, Result};
use sessionhub_core::{resolve_project, resolve_session, ContentBlock, Entry, StoreRegistry};

use crate::util::{format_time, role_label};

/// Content budget for one `load_more` step when paging to the end.
const PAGE_CONTENT_BYTES: usize = 256 * 1024;

pub fn run(registry: &StoreRegistry, query: &str, project: Option<&str>, all: bool) -> Result<()> {
    let scope = match project {
        Some(query) => Some(resolve_project(registry, query)?),
        None => None,
    };
    let (_, meta) = resolve_session(registry, scope.as_ref(), query)?;

    let mut lazy = registry
        .open_lazy_session_by_path(&meta.full_path)
        .with_context(|| format!("open {}", meta.full_path.display()))?;
    // The listing record usually carries hints (model, first prompt) the
    // streaming reader does not discover on its own.
    lazy.backfill_metadata(&meta);
    if all {
        while !lazy.is_fully_loaded() {
            if lazy.load_more(PAGE_CONTENT_BYTES)? == 0 && !lazy.is_fully_loaded() {
                break;
            }
        }
    }

    let meta = lazy.metadata();
    println!("session {} [{}]", meta.id, meta.source);
    if !meta.model.is_empty() {
        println!("model:    {}", meta.model);
    }
    if !meta.git_branch.is_empty() {
        println!("branch:   {}", meta.git_branch);
    }
    println!("file:     {}", meta.full_path.display());
    println!("modified: {}", format_time(meta.modified_at));
    println!();

    for entry in lazy.entries() {
        print_entry(&entry);
    }

    if !lazy.is_fully_loaded() {
        let percent = (lazy.progress() * 100.0).round() as u32;
        println!("... preview only ({percent}% loaded; rerun with --all for the full transcript)");
    }
    Ok(())
}

fn print_entry(entry: &Entry) {
    let text = entry.text_content();
    if !text.is_empty() {
        println!("[{}] {}", role_label(entry.role), text);
    }
    for block in &entry.content_blocks {
        match block {
            ContentBlock::Thinking { thinking, .. } if !thinking.is_empty() => {
                println!("[{} thinking] {}", role_label(entry.role), thinking);
            }
            ContentBlock::ToolUse { name, .. } => {
                println!("[tool use] {name}");
            }
            ContentBlock::ToolResult { content, is_error, .. } if !content.is_empty() => {
                let label = if *is_error { "tool error" } else { "tool result" };
                println!("[{label}] {content}");
            }
            _ => {}
        }
    }
}
