use anyhow::{bail, Result};

use commentql::db::Database;

pub fn run(db: &Database, id: i64, title: Option<&str>, description: Option<&str>) -> Result<()> {
    if title.is_none() && description.is_none() {
        bail!("Nothing to update. Use --title or --description");
    }
    if title.is_some_and(|t| t.trim().is_empty()) {
        bail!("Issue title cannot be empty");
    }

    if db.update_issue(id, title, description)? {
        println!("Updated issue #{}", id);
    } else {
        bail!("Issue #{} not found", id);
    }

    Ok(())
}
