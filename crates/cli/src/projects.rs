use anyhow::Result;
use sessionhub_core::{Source, StoreRegistry};

use crate::util::format_time;

pub fn run(registry: &StoreRegistry, source: Option<&str>, json: bool) -> Result<()> {
    let mut projects = registry.list_all_projects();
    if let Some(source) = source {
        let source = Source::new(source);
        projects.retain(|p| p.source == source);
    }
    projects.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));

    if json {
        println!("{}", serde_json::to_string_pretty(&projects)?);
        return Ok(());
    }

    if projects.is_empty() {
        println!("No projects found.");
        return Ok(());
    }

    for project in &projects {
        let missing = if project.path_exists { "" } else { " (missing)" };
        println!(
            "{}  [{}] {} session(s), last {}",
            project.name,
            project.source,
            project.session_count,
            format_time(project.last_modified),
        );
        println!("    {}{missing}", project.path.display());
    }
    Ok(())
}
