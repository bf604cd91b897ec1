//! Query-language functions that expand to lists of issue ids.

pub mod last_commented;
pub mod last_commentator;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error};

use crate::config::Config;
use crate::error::ValidationError;
use crate::host::{IssueQuery, Services};
use crate::models::{Issue, Project};
use crate::validation::Validation;

pub use last_commented::LastCommented;
pub use last_commentator::{CommentatorType, LastCommentator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Issue,
}

/// One value a function expands to: an issue id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct QueryLiteral(pub i64);

/// Who is asking, and when "now" is.
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub user: String,
    pub now: DateTime<Utc>,
}

impl QueryContext {
    pub fn new(user: impl Into<String>) -> Self {
        QueryContext::at(user, Utc::now())
    }

    pub fn at(user: impl Into<String>, now: DateTime<Utc>) -> Self {
        QueryContext {
            user: user.into(),
            now,
        }
    }
}

pub trait QueryFunction {
    fn name(&self) -> &'static str;

    fn min_args(&self) -> usize;

    fn data_type(&self) -> DataType {
        DataType::Issue
    }

    fn is_list(&self) -> bool {
        true
    }

    /// Check `args` for `user` without touching the search index.
    fn validate(&self, user: &str, args: &[String]) -> Validation;

    /// Expand the call. Never fails: lookups that go wrong are logged and
    /// contribute nothing.
    fn values(&self, ctx: &QueryContext, args: &[String]) -> Vec<QueryLiteral>;
}

/// Every function this crate provides, wired to `services`.
pub fn registry<'a>(services: Services<'a>, config: Config) -> Vec<Box<dyn QueryFunction + 'a>> {
    vec![
        Box::new(LastCommentator::new(services, config)),
        Box::new(LastCommented::new(services, config)),
    ]
}

pub fn find<'a>(
    name: &str,
    services: Services<'a>,
    config: Config,
) -> Option<Box<dyn QueryFunction + 'a>> {
    registry(services, config)
        .into_iter()
        .find(|f| f.name().eq_ignore_ascii_case(name))
}

/// Resolve `key` and confirm `user` may browse it.
fn check_project_access(
    services: &Services<'_>,
    key: &str,
    user: &str,
) -> Result<Project, ValidationError> {
    let project = services
        .projects
        .project_by_key(key)
        .map_err(|e| ValidationError::LookupFailed(format!("{:#}", e)))?
        .ok_or_else(|| ValidationError::ProjectNotFound(key.to_string()))?;

    let allowed = services
        .permissions
        .can_browse(&project, user)
        .map_err(|e| ValidationError::LookupFailed(format!("{:#}", e)))?;
    if !allowed {
        return Err(ValidationError::PermissionDenied);
    }
    Ok(project)
}

fn resolve_project(services: &Services<'_>, function: &str, key: &str) -> Option<Project> {
    match services.projects.project_by_key(key) {
        Ok(Some(project)) => Some(project),
        Ok(None) => {
            error!(function, key, "project disappeared after validation");
            None
        }
        Err(e) => {
            error!(function, key, error = %e, "project lookup failed");
            None
        }
    }
}

/// Search once; a failing search is an empty result.
fn search_or_empty(services: &Services<'_>, user: &str, query: &IssueQuery) -> Vec<Issue> {
    match services.search.search(user, query) {
        Ok(issues) => {
            debug!(?query, count = issues.len(), "search returned");
            issues
        }
        Err(e) => {
            error!(?query, error = %e, "issue search failed, returning no issues");
            Vec::new()
        }
    }
}
