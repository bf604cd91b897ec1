use anyhow::Result;

use commentql::db::Database;

use crate::commands::project;

pub fn run(db: &Database, project_key: Option<&str>) -> Result<()> {
    let project_id = match project_key {
        Some(key) => Some(project::require(db, key)?.id),
        None => None,
    };
    let issues = db.list_issues(project_id)?;

    if issues.is_empty() {
        println!("No issues found.");
        return Ok(());
    }

    for issue in issues {
        println!(
            "#{:<4} {:<40} {:<12} {}",
            issue.id,
            truncate(&issue.title, 40),
            truncate(&issue.reporter, 12),
            issue.updated_at.format("%Y-%m-%d")
        );
    }

    Ok(())
}

pub fn truncate(s: &str, max_chars: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}
