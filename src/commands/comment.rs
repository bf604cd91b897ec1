use anyhow::{bail, Result};

use commentql::db::Database;

pub fn run(db: &Database, issue_id: i64, author: &str, text: &str) -> Result<()> {
    if text.trim().is_empty() {
        bail!("Comment text cannot be empty");
    }
    if db.get_issue(issue_id)?.is_none() {
        bail!("Issue #{} not found", issue_id);
    }

    let id = db.add_comment(issue_id, author, text)?;
    println!("Added comment {} to issue #{}", id, issue_id);
    Ok(())
}
