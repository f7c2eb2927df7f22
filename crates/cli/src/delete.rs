use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use sessionhub_core::{resolve_session, PathValidator, StoreRegistry};

/// Delete a session's transcript file, after validating the target lives in
/// a directory this tool is allowed to touch.
pub fn run(registry: &Arc<StoreRegistry>, query: &str, force: bool) -> Result<()> {
    let (_, meta) = resolve_session(registry, None, query)?;
    let path = &meta.full_path;

    let parent = path
        .parent()
        .with_context(|| format!("no parent directory for {}", path.display()))?;
    let validator = PathValidator::new(registry.clone());
    validator
        .validate_directory(&parent.to_string_lossy())
        .with_context(|| format!("refusing to delete from {}", parent.display()))?;

    if !force && !confirm(&format!("Delete {}? [y/N] ", path.display()))? {
        println!("Aborted.");
        return Ok(());
    }

    std::fs::remove_file(path).with_context(|| format!("delete {}", path.display()))?;
    println!("Deleted {}", path.display());
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt}");
    std::io::stdout().flush()?;

    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer)? == 0 {
        bail!("no confirmation on stdin (use --force for non-interactive use)");
    }
    let answer = answer.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}
