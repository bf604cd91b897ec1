//! `lastCommentator(projectKey, type[, type...])`
//!
//! Issues whose most recent comment was written by their own reporter. The
//! `author` type only looks at issues touched within the lookback window;
//! `yourmommy` looks at the whole project.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::{
    check_project_access, resolve_project, search_or_empty, QueryContext, QueryFunction,
    QueryLiteral,
};
use crate::config::Config;
use crate::duration::{offset, CalendarUnit};
use crate::error::ValidationError;
use crate::host::{IssueQuery, Services};
use crate::models::{Comment, Issue, Project};
use crate::validation::Validation;

pub const NAME: &str = "lastCommentator";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentatorType {
    /// Reporter commented last, issue updated within the lookback window.
    Author,
    /// Reporter commented last, any time.
    AllTime,
}

impl CommentatorType {
    pub const ALL: [CommentatorType; 2] = [CommentatorType::Author, CommentatorType::AllTime];

    pub fn keyword(&self) -> &'static str {
        match self {
            CommentatorType::Author => "author",
            CommentatorType::AllTime => "yourmommy",
        }
    }

    /// Comma-separated keywords, for messages.
    pub fn accepted() -> String {
        CommentatorType::ALL
            .iter()
            .map(|t| t.keyword())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for CommentatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for CommentatorType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommentatorType::ALL
            .into_iter()
            .find(|t| t.keyword().eq_ignore_ascii_case(s))
            .ok_or_else(|| ValidationError::IllegalCommentatorType {
                given: s.to_string(),
                accepted: CommentatorType::accepted(),
            })
    }
}

/// True when the last comment in `comments` is by `issue`'s reporter.
pub fn reporter_commented_last(issue: &Issue, comments: &[Comment]) -> bool {
    comments
        .last()
        .is_some_and(|last| last.author == issue.reporter)
}

pub struct LastCommentator<'a> {
    services: Services<'a>,
    lookback_days: i64,
}

impl<'a> LastCommentator<'a> {
    pub fn new(services: Services<'a>, config: Config) -> Self {
        LastCommentator {
            services,
            lookback_days: config.author_lookback_days.max(0),
        }
    }

    fn query_for(&self, project: &Project, kind: CommentatorType, now: DateTime<Utc>) -> IssueQuery {
        match kind {
            CommentatorType::Author => {
                let since = offset(now, self.lookback_days.saturating_neg(), CalendarUnit::Day);
                IssueQuery::project(project.id).updated_after(since)
            }
            CommentatorType::AllTime => IssueQuery::project(project.id),
        }
    }

    /// Issues of `project` visible to `user` whose last commentator is the
    /// reporter, under the window `kind` selects.
    pub fn matching_issues(
        &self,
        project: &Project,
        kind: CommentatorType,
        user: &str,
        now: DateTime<Utc>,
    ) -> Vec<Issue> {
        let query = self.query_for(project, kind, now);
        let candidates = search_or_empty(&self.services, user, &query);

        let matched: Vec<Issue> = candidates
            .into_iter()
            .filter(|issue| match self.services.comments.comments(issue) {
                Ok(comments) => reporter_commented_last(issue, &comments),
                Err(e) => {
                    warn!(issue = issue.id, error = %e, "skipping issue, comments unavailable");
                    false
                }
            })
            .collect();

        debug!(project = %project.key, %kind, matched = matched.len(), "lastCommentator");
        matched
    }
}

impl QueryFunction for LastCommentator<'_> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn min_args(&self) -> usize {
        2
    }

    fn validate(&self, user: &str, args: &[String]) -> Validation {
        let mut validation = Validation::new();

        let distinct: HashSet<&String> = args.iter().collect();
        if distinct.len() != args.len() {
            validation.add(ValidationError::DuplicateArgs);
        }
        if args.len() < 2 {
            validation.add(ValidationError::NotEnoughArgs {
                accepted: CommentatorType::accepted(),
            });
            return validation;
        }

        if let Err(e) = check_project_access(&self.services, &args[0], user) {
            validation.add(e);
            return validation;
        }

        if let Some(Err(e)) = args[1..]
            .iter()
            .map(|arg| arg.parse::<CommentatorType>())
            .find(|parsed| parsed.is_err())
        {
            validation.add(e);
        }

        validation
    }

    fn values(&self, ctx: &QueryContext, args: &[String]) -> Vec<QueryLiteral> {
        let Some((key, types)) = args.split_first() else {
            warn!("lastCommentator evaluated without arguments");
            return Vec::new();
        };
        let Some(project) = resolve_project(&self.services, NAME, key) else {
            return Vec::new();
        };

        let mut literals = Vec::new();
        for raw in types {
            let kind = match raw.parse::<CommentatorType>() {
                Ok(kind) => kind,
                Err(e) => {
                    warn!(error = %e, "ignoring commentator type");
                    continue;
                }
            };
            literals.extend(
                self.matching_issues(&project, kind, &ctx.user, ctx.now)
                    .iter()
                    .map(|issue| QueryLiteral(issue.id)),
            );
        }
        literals
    }
}
