use anyhow::{anyhow, Context, Result};
use sessionhub_core::{resolve_project, Project, StoreRegistry};

use crate::util::{format_size, format_time, preview};

pub fn run(registry: &StoreRegistry, query: Option<&str>, json: bool) -> Result<()> {
    let project = match query {
        Some(query) => resolve_project(registry, query)?,
        None => current_dir_project(registry)?,
    };

    let store = registry
        .get(&project.source)
        .ok_or_else(|| anyhow!("source {} is no longer registered", project.source))?;
    let mut sessions = store
        .list_sessions(&project.id)
        .with_context(|| format!("list sessions for {}", project.path.display()))?;
    sessions.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    println!(
        "{} session(s) in {} [{}]",
        sessions.len(),
        project.path.display(),
        project.source,
    );
    for meta in &sessions {
        let prompt = if meta.first_prompt.is_empty() {
            meta.summary.as_str()
        } else {
            meta.first_prompt.as_str()
        };
        println!(
            "  {}  {}  {}  {}",
            meta.id,
            format_time(meta.modified_at),
            format_size(meta.file_size),
            preview(prompt, 60),
        );
    }
    Ok(())
}

/// Scope to the project owning the current directory, the way git scopes to
/// the enclosing repository.
fn current_dir_project(registry: &StoreRegistry) -> Result<Project> {
    let cwd = std::env::current_dir().context("determine current directory")?;
    registry.find_project_for_path(&cwd).ok_or_else(|| {
        anyhow!(
            "no project found for {} (pass a project name or path)",
            cwd.display()
        )
    })
}
