use anyhow::{bail, Result};

use commentql::db::Database;

use crate::commands::project;

pub fn run(
    db: &Database,
    project_key: &str,
    title: &str,
    description: Option<&str>,
    reporter: &str,
) -> Result<()> {
    if title.trim().is_empty() {
        bail!("Issue title cannot be empty");
    }
    let project = project::require(db, project_key)?;

    let id = db.create_issue(project.id, title, description, reporter)?;
    println!("Created issue #{} in {} (reporter: {})", id, project.key, reporter);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn setup_test_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(&db_path).unwrap();
        (db, dir)
    }

    #[test]
    fn test_create_sets_reporter() {
        let (db, _dir) = setup_test_db();
        let pid = db.create_project("ABC", "Alpha").unwrap();
        run(&db, "ABC", "Crash on save", Some("stack trace"), "ann").unwrap();

        let issues = db.list_issues(Some(pid)).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].reporter, "ann");
        assert_eq!(issues[0].description.as_deref(), Some("stack trace"));
    }

    #[test]
    fn test_create_unknown_project() {
        let (db, _dir) = setup_test_db();
        let err = run(&db, "NOPE", "Title", None, "ann").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_create_blank_title() {
        let (db, _dir) = setup_test_db();
        db.create_project("ABC", "Alpha").unwrap();
        assert!(run(&db, "ABC", "   ", None, "ann").is_err());
    }
}
