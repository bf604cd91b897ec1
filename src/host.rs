//! Capabilities the query functions borrow from the issue tracker.
//!
//! The functions never reach for global state: every lookup goes through one
//! of these traits, handed in at construction. [`crate::db::Database`]
//! implements all of them.

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::models::{Comment, Issue, Project};

pub trait ProjectDirectory {
    fn project_by_key(&self, key: &str) -> Result<Option<Project>>;
}

pub trait PermissionChecker {
    fn can_browse(&self, project: &Project, user: &str) -> Result<bool>;
}

/// Issues visible to `user` in a project, optionally only those updated
/// strictly after `updated_after`. No ordering is promised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueQuery {
    pub project_id: i64,
    pub updated_after: Option<DateTime<Utc>>,
}

impl IssueQuery {
    pub fn project(project_id: i64) -> Self {
        IssueQuery {
            project_id,
            updated_after: None,
        }
    }

    pub fn updated_after(mut self, threshold: DateTime<Utc>) -> Self {
        self.updated_after = Some(threshold);
        self
    }
}

pub trait IssueSearch {
    fn search(&self, user: &str, query: &IssueQuery) -> Result<Vec<Issue>>;
}

/// Comment lists in chronological order.
pub trait CommentSource {
    fn comments(&self, issue: &Issue) -> Result<Vec<Comment>>;
    fn comments_by(&self, issue: &Issue, author: &str) -> Result<Vec<Comment>>;
}

/// Borrowed collaborators shared by every query function.
#[derive(Clone, Copy)]
pub struct Services<'a> {
    pub projects: &'a dyn ProjectDirectory,
    pub permissions: &'a dyn PermissionChecker,
    pub search: &'a dyn IssueSearch,
    pub comments: &'a dyn CommentSource,
}

impl<'a> Services<'a> {
    /// Use one tracker for every capability.
    pub fn from_tracker<T>(tracker: &'a T) -> Self
    where
        T: ProjectDirectory + PermissionChecker + IssueSearch + CommentSource,
    {
        Services {
            projects: tracker,
            permissions: tracker,
            search: tracker,
            comments: tracker,
        }
    }
}
