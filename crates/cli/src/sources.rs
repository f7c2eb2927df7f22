use anyhow::Result;
use sessionhub_core::StoreRegistry;

/// List every registered source with its availability and project count.
pub fn run(registry: &StoreRegistry, json: bool) -> Result<()> {
    let status = registry.source_status();

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    if status.is_empty() {
        println!("No session sources found on this machine.");
        println!();
        println!("Supported tools: Claude Code (~/.claude), Codex CLI (~/.codex)");
        return Ok(());
    }

    for info in &status {
        let marker = if info.available { "+" } else { "-" };
        println!("[{marker}] {} - {}", info.name, info.description);
        if let Some(base) = &info.base_path {
            println!("    base: {}", base.display());
        }
        println!("    projects: {}", info.project_count);
    }
    Ok(())
}
