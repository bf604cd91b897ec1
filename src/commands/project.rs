use anyhow::{bail, Result};

use commentql::db::Database;
use commentql::models::Project;

/// Keys look like `ABC` or `WEB2`: an uppercase letter, then uppercase
/// letters, digits or underscores.
pub fn validate_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) if first.is_ascii_uppercase() => {
            chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
        }
        _ => false,
    }
}

pub fn require(db: &Database, key: &str) -> Result<Project> {
    match db.get_project_by_key(key)? {
        Some(p) => Ok(p),
        None => bail!("Project {} not found", key),
    }
}

pub fn add(db: &Database, key: &str, name: &str) -> Result<()> {
    if !validate_key(key) {
        bail!(
            "Invalid project key '{}'. Use uppercase letters, digits and underscores, starting with a letter",
            key
        );
    }
    if db.get_project_by_key(key)?.is_some() {
        bail!("Project {} already exists", key);
    }

    let id = db.create_project(key, name)?;
    println!("Created project {} (#{})", key, id);
    Ok(())
}

pub fn list(db: &Database) -> Result<()> {
    let projects = db.list_projects()?;

    if projects.is_empty() {
        println!("No projects found.");
        return Ok(());
    }

    for project in projects {
        println!(
            "{:<10} {:<40} {}",
            project.key,
            project.name,
            project.created_at.format("%Y-%m-%d")
        );
    }
    Ok(())
}

pub fn grant(db: &Database, key: &str, user: &str) -> Result<()> {
    let project = require(db, key)?;
    if db.grant_browse(project.id, user)? {
        println!("{} can now browse {}", user, key);
    } else {
        println!("{} could already browse {}", user, key);
    }
    Ok(())
}

pub fn revoke(db: &Database, key: &str, user: &str) -> Result<()> {
    let project = require(db, key)?;
    if db.revoke_browse(project.id, user)? {
        println!("{} can no longer browse {}", user, key);
    } else {
        println!("{} had no access to {}", user, key);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn setup_test_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(&db_path).unwrap();
        (db, dir)
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("ABC"));
        assert!(validate_key("WEB2"));
        assert!(validate_key("A_B"));
        assert!(!validate_key(""));
        assert!(!validate_key("abc"));
        assert!(!validate_key("1AB"));
        assert!(!validate_key("AB-C"));
    }

    #[test]
    fn test_add_and_duplicate() {
        let (db, _dir) = setup_test_db();
        assert!(add(&db, "ABC", "Alpha").is_ok());
        let err = add(&db, "ABC", "Again").unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_add_invalid_key() {
        let (db, _dir) = setup_test_db();
        let err = add(&db, "abc", "Alpha").unwrap_err();
        assert!(err.to_string().contains("Invalid project key"));
    }

    #[test]
    fn test_grant_and_revoke() {
        let (db, _dir) = setup_test_db();
        add(&db, "ABC", "Alpha").unwrap();
        grant(&db, "ABC", "ann").unwrap();
        let pid = db.get_project_by_key("ABC").unwrap().unwrap().id;
        assert!(db.has_browse(pid, "ann").unwrap());
        revoke(&db, "ABC", "ann").unwrap();
        assert!(!db.has_browse(pid, "ann").unwrap());
    }

    #[test]
    fn test_grant_unknown_project() {
        let (db, _dir) = setup_test_db();
        assert!(grant(&db, "NOPE", "ann").is_err());
    }

    #[test]
    fn test_list_empty_and_full() {
        let (db, _dir) = setup_test_db();
        assert!(list(&db).is_ok());
        add(&db, "ABC", "Alpha").unwrap();
        assert!(list(&db).is_ok());
    }

    proptest! {
        #[test]
        fn prop_valid_keys_accepted(key in "[A-Z][A-Z0-9_]{0,9}") {
            prop_assert!(validate_key(&key));
        }

        #[test]
        fn prop_lowercase_start_rejected(key in "[a-z][A-Za-z0-9_]{0,9}") {
            prop_assert!(!validate_key(&key));
        }
    }
}
