use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use tracing::debug;

use crate::host::{CommentSource, IssueQuery, IssueSearch, PermissionChecker, ProjectDirectory};
use crate::models::{Comment, Issue, Project};

const SCHEMA_VERSION: i32 = 1;

const BROWSE: &str = "browse";

const ISSUE_COLUMNS: &str =
    "i.id, i.project_id, i.title, i.description, i.reporter, i.created_at, i.updated_at";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open database")?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        let version: i32 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap_or(0);

        if version < SCHEMA_VERSION {
            self.conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS projects (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    key TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                -- Who may see what
                CREATE TABLE IF NOT EXISTS project_permissions (
                    project_id INTEGER NOT NULL,
                    username TEXT NOT NULL,
                    permission TEXT NOT NULL,
                    PRIMARY KEY (project_id, username, permission),
                    FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
                );

                CREATE TABLE IF NOT EXISTS issues (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    project_id INTEGER NOT NULL,
                    title TEXT NOT NULL,
                    description TEXT,
                    reporter TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
                );

                CREATE TABLE IF NOT EXISTS comments (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    issue_id INTEGER NOT NULL,
                    author TEXT NOT NULL,
                    content TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    FOREIGN KEY (issue_id) REFERENCES issues(id) ON DELETE CASCADE
                );

                CREATE INDEX IF NOT EXISTS idx_issues_project ON issues(project_id);
                CREATE INDEX IF NOT EXISTS idx_comments_issue ON comments(issue_id);
                CREATE INDEX IF NOT EXISTS idx_comments_author ON comments(issue_id, author);
                "#,
            )?;

            self.conn
                .execute(&format!("PRAGMA user_version = {}", SCHEMA_VERSION), [])?;
        }

        self.conn.execute("PRAGMA foreign_keys = ON", [])?;

        Ok(())
    }

    // Projects
    pub fn create_project(&self, key: &str, name: &str) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO projects (key, name, created_at) VALUES (?1, ?2, ?3)",
                params![key, name, timestamp(Utc::now())],
            )
            .with_context(|| format!("Failed to create project {}", key))?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_project_by_key(&self, key: &str) -> Result<Option<Project>> {
        let project = self
            .conn
            .query_row(
                "SELECT id, key, name, created_at FROM projects WHERE key = ?1",
                [key],
                project_from_row,
            )
            .optional()?;
        Ok(project)
    }

    pub fn list_projects(&self) -> Result<Vec<Project>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, key, name, created_at FROM projects ORDER BY key")?;
        let projects = stmt
            .query_map([], project_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(projects)
    }

    // Permissions
    pub fn grant_browse(&self, project_id: i64, username: &str) -> Result<bool> {
        let rows = self.conn.execute(
            "INSERT OR IGNORE INTO project_permissions (project_id, username, permission) VALUES (?1, ?2, ?3)",
            params![project_id, username, BROWSE],
        )?;
        Ok(rows > 0)
    }

    pub fn revoke_browse(&self, project_id: i64, username: &str) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM project_permissions WHERE project_id = ?1 AND username = ?2 AND permission = ?3",
            params![project_id, username, BROWSE],
        )?;
        Ok(rows > 0)
    }

    pub fn has_browse(&self, project_id: i64, username: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM project_permissions WHERE project_id = ?1 AND username = ?2 AND permission = ?3",
                params![project_id, username, BROWSE],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    // Issues
    pub fn create_issue(
        &self,
        project_id: i64,
        title: &str,
        description: Option<&str>,
        reporter: &str,
    ) -> Result<i64> {
        self.create_issue_at(project_id, title, description, reporter, Utc::now())
    }

    pub fn create_issue_at(
        &self,
        project_id: i64,
        title: &str,
        description: Option<&str>,
        reporter: &str,
        at: DateTime<Utc>,
    ) -> Result<i64> {
        let now = timestamp(at);
        self.conn.execute(
            "INSERT INTO issues (project_id, title, description, reporter, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![project_id, title, description, reporter, now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_issue(&self, id: i64) -> Result<Option<Issue>> {
        let sql = format!("SELECT {} FROM issues i WHERE i.id = ?1", ISSUE_COLUMNS);
        let issue = self.conn.query_row(&sql, [id], issue_from_row).optional()?;
        Ok(issue)
    }

    pub fn list_issues(&self, project_id: Option<i64>) -> Result<Vec<Issue>> {
        let mut sql = format!("SELECT {} FROM issues i", ISSUE_COLUMNS);
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(project_id) = project_id {
            sql.push_str(" WHERE i.project_id = ?1");
            params_vec.push(Box::new(project_id));
        }
        sql.push_str(" ORDER BY i.id DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();

        let issues = stmt
            .query_map(params_refs.as_slice(), issue_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(issues)
    }

    /// Issues in a project that `username` may browse, updated strictly after
    /// `updated_after` when given.
    pub fn search_issues(
        &self,
        username: &str,
        project_id: i64,
        updated_after: Option<DateTime<Utc>>,
    ) -> Result<Vec<Issue>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM issues i
            JOIN project_permissions p ON p.project_id = i.project_id
            WHERE i.project_id = ?1 AND p.username = ?2 AND p.permission = ?3
            ORDER BY i.id
            "#,
            ISSUE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let issues = stmt
            .query_map(params![project_id, username, BROWSE], issue_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // Compared as instants; stored strings stop sorting correctly at the
        // far ends of the calendar.
        let issues: Vec<Issue> = match updated_after {
            Some(threshold) => issues
                .into_iter()
                .filter(|i| i.updated_at > threshold)
                .collect(),
            None => issues,
        };

        debug!(project_id, username, count = issues.len(), "issue search");
        Ok(issues)
    }

    pub fn update_issue(&self, id: i64, title: Option<&str>, description: Option<&str>) -> Result<bool> {
        self.update_issue_at(id, title, description, Utc::now())
    }

    pub fn update_issue_at(
        &self,
        id: i64,
        title: Option<&str>,
        description: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut updates = vec!["updated_at = ?1".to_string()];
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(timestamp(at))];

        if let Some(t) = title {
            updates.push(format!("title = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(t.to_string()));
        }

        if let Some(d) = description {
            updates.push(format!("description = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(d.to_string()));
        }

        params_vec.push(Box::new(id));
        let sql = format!(
            "UPDATE issues SET {} WHERE id = ?{}",
            updates.join(", "),
            params_vec.len()
        );

        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        let rows = self.conn.execute(&sql, params_refs.as_slice())?;
        Ok(rows > 0)
    }

    // Comments
    pub fn add_comment(&self, issue_id: i64, author: &str, content: &str) -> Result<i64> {
        self.add_comment_at(issue_id, author, content, Utc::now())
    }

    /// Adding a comment also counts as an update of the issue.
    pub fn add_comment_at(
        &self,
        issue_id: i64,
        author: &str,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<i64> {
        let now = timestamp(at);
        self.conn.execute(
            "INSERT INTO comments (issue_id, author, content, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![issue_id, author, content, now],
        )?;
        let id = self.conn.last_insert_rowid();
        self.conn.execute(
            "UPDATE issues SET updated_at = ?1 WHERE id = ?2 AND updated_at < ?1",
            params![now, issue_id],
        )?;
        Ok(id)
    }

    pub fn get_comments(&self, issue_id: i64) -> Result<Vec<Comment>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, issue_id, author, content, created_at FROM comments WHERE issue_id = ?1 ORDER BY created_at, id",
        )?;
        let comments = stmt
            .query_map([issue_id], comment_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(comments)
    }

    pub fn get_comments_by(&self, issue_id: i64, author: &str) -> Result<Vec<Comment>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, issue_id, author, content, created_at FROM comments WHERE issue_id = ?1 AND author = ?2 ORDER BY created_at, id",
        )?;
        let comments = stmt
            .query_map(params![issue_id, author], comment_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(comments)
    }
}

impl ProjectDirectory for Database {
    fn project_by_key(&self, key: &str) -> Result<Option<Project>> {
        self.get_project_by_key(key)
    }
}

impl PermissionChecker for Database {
    fn can_browse(&self, project: &Project, user: &str) -> Result<bool> {
        self.has_browse(project.id, user)
    }
}

impl IssueSearch for Database {
    fn search(&self, user: &str, query: &IssueQuery) -> Result<Vec<Issue>> {
        self.search_issues(user, query.project_id, query.updated_after)
    }
}

impl CommentSource for Database {
    fn comments(&self, issue: &Issue) -> Result<Vec<Comment>> {
        self.get_comments(issue.id)
    }

    fn comments_by(&self, issue: &Issue, author: &str) -> Result<Vec<Comment>> {
        self.get_comments_by(issue.id, author)
    }
}

/// Fixed-width UTC form so stored timestamps sort as text.
fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(idx: usize, s: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        key: row.get(1)?,
        name: row.get(2)?,
        created_at: parse_datetime(3, row.get(3)?)?,
    })
}

fn issue_from_row(row: &Row<'_>) -> rusqlite::Result<Issue> {
    Ok(Issue {
        id: row.get(0)?,
        project_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        reporter: row.get(4)?,
        created_at: parse_datetime(5, row.get(5)?)?,
        updated_at: parse_datetime(6, row.get(6)?)?,
    })
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        issue_id: row.get(1)?,
        author: row.get(2)?,
        content: row.get(3)?,
        created_at: parse_datetime(4, row.get(4)?)?,
    })
}
