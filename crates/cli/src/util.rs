use chrono::{DateTime, Utc};
use sessionhub_core::Role;

pub fn format_time(t: Option<DateTime<Utc>>) -> String {
    t.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

pub fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
        Role::System => "system",
        Role::Summary => "summary",
        Role::Progress => "progress",
        Role::Checkpoint => "checkpoint",
    }
}

/// First line of a prompt, shortened for table display.
pub fn preview(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or("").trim();
    if first_line.chars().count() <= max_chars {
        return first_line.to_string();
    }
    let shortened: String = first_line.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{shortened}\u{2026}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_shortens_to_first_line() {
        assert_eq!(preview("hello\nworld", 20), "hello");
        assert_eq!(preview("abcdef", 4), "abc\u{2026}");
        assert_eq!(preview("", 10), "");
    }

    #[test]
    fn format_size_scales_units() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }
}
