//! `lastCommented(projectKey, duration)`
//!
//! Issues updated after `now - |duration|` whose reporter has not commented
//! since then. The two conditions are checked separately: the search keeps
//! recently updated issues, then the reporter's own last comment must be
//! older than the same threshold.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::{
    check_project_access, resolve_project, search_or_empty, QueryContext, QueryFunction,
    QueryLiteral,
};
use crate::config::Config;
use crate::duration::{self, CalendarUnit, DurationSpec};
use crate::error::ValidationError;
use crate::host::{IssueQuery, Services};
use crate::models::{Comment, Issue, Project};
use crate::validation::Validation;

pub const NAME: &str = "lastCommented";

const MIN_EXPECTED_ARGS: usize = 2;
const MAX_EXPECTED_ARGS: usize = 2;

/// True when the reporter's latest comment exists and predates `threshold`.
pub fn reporter_silent_since(reporter_comments: &[Comment], threshold: DateTime<Utc>) -> bool {
    reporter_comments
        .last()
        .is_some_and(|last| last.created_at < threshold)
}

pub struct LastCommented<'a> {
    services: Services<'a>,
    default_unit: CalendarUnit,
}

impl<'a> LastCommented<'a> {
    pub fn new(services: Services<'a>, config: Config) -> Self {
        LastCommented {
            services,
            default_unit: config.default_duration_unit,
        }
    }

    pub fn threshold(&self, spec: &DurationSpec, now: DateTime<Utc>) -> DateTime<Utc> {
        spec.lookback_from(now, self.default_unit)
    }

    pub fn matching_issues(
        &self,
        project: &Project,
        spec: &DurationSpec,
        user: &str,
        now: DateTime<Utc>,
    ) -> Vec<Issue> {
        let threshold = self.threshold(spec, now);
        let query = IssueQuery::project(project.id).updated_after(threshold);
        let candidates = search_or_empty(&self.services, user, &query);

        let matched: Vec<Issue> = candidates
            .into_iter()
            .filter(|issue| match self.services.comments.comments_by(issue, &issue.reporter) {
                Ok(comments) => reporter_silent_since(&comments, threshold),
                Err(e) => {
                    warn!(issue = issue.id, error = %e, "skipping issue, comments unavailable");
                    false
                }
            })
            .collect();

        debug!(project = %project.key, %threshold, matched = matched.len(), "lastCommented");
        matched
    }
}

impl QueryFunction for LastCommented<'_> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn min_args(&self) -> usize {
        MIN_EXPECTED_ARGS
    }

    fn validate(&self, user: &str, args: &[String]) -> Validation {
        let mut validation = Validation::new();

        if args.len() < MIN_EXPECTED_ARGS || args.len() > MAX_EXPECTED_ARGS {
            validation.add(ValidationError::WrongArgCount {
                min: MIN_EXPECTED_ARGS,
                max: MAX_EXPECTED_ARGS,
            });
            return validation;
        }

        if !duration::matches(&args[1]) {
            validation.add(ValidationError::InvalidDuration {
                function: NAME.to_string(),
                duration: args[1].clone(),
            });
        }

        if let Err(e) = check_project_access(&self.services, &args[0], user) {
            validation.add(e);
        }

        validation
    }

    fn values(&self, ctx: &QueryContext, args: &[String]) -> Vec<QueryLiteral> {
        let [key, raw_duration] = args else {
            warn!(count = args.len(), "lastCommented evaluated with wrong argument count");
            return Vec::new();
        };
        let Some(project) = resolve_project(&self.services, NAME, key) else {
            return Vec::new();
        };
        let spec = match duration::parse(raw_duration) {
            Ok(spec) => spec,
            Err(e) => {
                warn!(error = %e, "lastCommented evaluated with a bad duration");
                return Vec::new();
            }
        };

        self.matching_issues(&project, &spec, &ctx.user, ctx.now)
            .iter()
            .map(|issue| QueryLiteral(issue.id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::functions::fixtures::FakeTracker;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn setup_test_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(&db_path).unwrap();
        (db, dir)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 20, 12, 0, 0).unwrap()
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn setup_project(db: &Database) -> i64 {
        let pid = db.create_project("ABC", "Alpha").unwrap();
        db.grant_browse(pid, "viewer").unwrap();
        pid
    }

    fn eval(db: &Database, duration: &str) -> Vec<i64> {
        let services = Services::from_tracker(db);
        let f = LastCommented::new(services, Config::default());
        let mut ids: Vec<i64> = f
            .values(&QueryContext::at("viewer", now()), &args(&["ABC", duration]))
            .iter()
            .map(|l| l.0)
            .collect();
        ids.sort_unstable();
        ids
    }

    // ==================== Predicate ====================

    #[test]
    fn test_silent_requires_a_comment() {
        assert!(!reporter_silent_since(&[], now()));
    }

    // ==================== Evaluation ====================

    #[test]
    fn test_reporter_quiet_while_others_comment() {
        let (db, _dir) = setup_test_db();
        let pid = setup_project(&db);
        let id = db
            .create_issue_at(pid, "Waiting", None, "rep", now() - Duration::days(20))
            .unwrap();
        db.add_comment_at(id, "rep", "any news?", now() - Duration::days(15)).unwrap();
        db.add_comment_at(id, "dev", "looking", now() - Duration::days(1)).unwrap();

        assert_eq!(eval(&db, "-10d"), vec![id]);
    }

    #[test]
    fn test_reporter_commented_after_threshold_excluded() {
        let (db, _dir) = setup_test_db();
        let pid = setup_project(&db);
        let id = db
            .create_issue_at(pid, "Active", None, "rep", now() - Duration::days(20))
            .unwrap();
        db.add_comment_at(id, "rep", "old", now() - Duration::days(15)).unwrap();
        db.add_comment_at(id, "rep", "new", now() - Duration::days(2)).unwrap();

        assert!(eval(&db, "-10d").is_empty());
    }

    #[test]
    fn test_reporter_never_commented_excluded() {
        let (db, _dir) = setup_test_db();
        let pid = setup_project(&db);
        let id = db
            .create_issue_at(pid, "Silent", None, "rep", now() - Duration::days(20))
            .unwrap();
        db.add_comment_at(id, "dev", "ping", now() - Duration::days(1)).unwrap();

        assert!(eval(&db, "-10d").is_empty());
        assert!(eval(&db, "-1y").is_empty());
    }

    #[test]
    fn test_stale_issue_not_updated_since_threshold_excluded() {
        let (db, _dir) = setup_test_db();
        let pid = setup_project(&db);
        let id = db
            .create_issue_at(pid, "Dormant", None, "rep", now() - Duration::days(40))
            .unwrap();
        db.add_comment_at(id, "rep", "hello", now() - Duration::days(30)).unwrap();

        assert!(eval(&db, "-10d").is_empty());
    }

    #[test]
    fn test_non_comment_update_counts_for_search() {
        let (db, _dir) = setup_test_db();
        let pid = setup_project(&db);
        let id = db
            .create_issue_at(pid, "Edited", None, "rep", now() - Duration::days(40))
            .unwrap();
        db.add_comment_at(id, "rep", "hello", now() - Duration::days(30)).unwrap();
        db.update_issue_at(id, Some("Edited again"), None, now() - Duration::hours(3))
            .unwrap();

        assert_eq!(eval(&db, "-10d"), vec![id]);
    }

    #[test]
    fn test_sign_is_ignored() {
        let (db, _dir) = setup_test_db();
        let pid = setup_project(&db);
        let id = db
            .create_issue_at(pid, "Waiting", None, "rep", now() - Duration::days(20))
            .unwrap();
        db.add_comment_at(id, "rep", "?", now() - Duration::days(15)).unwrap();
        db.add_comment_at(id, "dev", "!", now() - Duration::days(1)).unwrap();

        assert_eq!(eval(&db, "+10d"), vec![id]);
        assert_eq!(eval(&db, "10d"), vec![id]);
        assert_eq!(eval(&db, "2w"), vec![id]);
    }

    #[test]
    fn test_missing_unit_uses_configured_default() {
        let mut tracker = FakeTracker::with_project("ABC", "viewer");
        tracker.issue(1, "rep", now() - Duration::minutes(5));
        tracker.comment(1, "rep", now() - Duration::hours(3));
        let services = Services::from_tracker(&tracker);
        let ctx = QueryContext::at("viewer", now());

        // Days: threshold now-2d, reporter commented 3h ago, not silent.
        let days = LastCommented::new(services, Config::default());
        assert!(days.values(&ctx, &args(&["ABC", "2"])).is_empty());

        // Hours: threshold now-2h, reporter silent for 3h.
        let hours = LastCommented::new(
            services,
            Config {
                default_duration_unit: CalendarUnit::Hour,
                ..Config::default()
            },
        );
        assert_eq!(hours.values(&ctx, &args(&["ABC", "2"])), vec![QueryLiteral(1)]);
    }

    #[test]
    fn test_threshold_uses_calendar_months() {
        let tracker = FakeTracker::with_project("ABC", "viewer");
        let services = Services::from_tracker(&tracker);
        let f = LastCommented::new(services, Config::default());
        let spec = duration::parse("1M").unwrap();
        assert_eq!(
            f.threshold(&spec, now()),
            Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_search_failure_yields_nothing() {
        let mut tracker = FakeTracker::with_project("ABC", "viewer");
        tracker.issue(1, "rep", now());
        tracker.comment(1, "rep", now() - Duration::days(30));
        tracker.fail_search = true;
        let services = Services::from_tracker(&tracker);
        let f = LastCommented::new(services, Config::default());

        let result = f.values(&QueryContext::at("viewer", now()), &args(&["ABC", "-10d"]));
        assert!(result.is_empty());
        assert_eq!(tracker.searches.get(), 1);
    }

    #[test]
    fn test_bad_input_after_failed_validation_yields_nothing() {
        let tracker = FakeTracker::with_project("ABC", "viewer");
        let services = Services::from_tracker(&tracker);
        let f = LastCommented::new(services, Config::default());
        let ctx = QueryContext::at("viewer", now());

        assert!(f.values(&ctx, &args(&["ABC"])).is_empty());
        assert!(f.values(&ctx, &args(&["ABC", "soon"])).is_empty());
        assert!(f.values(&ctx, &args(&["XYZ", "-1d"])).is_empty());
        assert_eq!(tracker.searches.get(), 0);
    }

    // ==================== Validation ====================

    #[test]
    fn test_validate_arg_count() {
        let tracker = FakeTracker::with_project("ABC", "viewer");
        let services = Services::from_tracker(&tracker);
        let f = LastCommented::new(services, Config::default());

        for bad in [args(&["ABC"]), args(&["ABC", "-1d", "extra"]), Vec::new()] {
            let v = f.validate("viewer", &bad);
            assert_eq!(
                v.errors(),
                &[ValidationError::WrongArgCount { min: 2, max: 2 }]
            );
        }
    }

    #[test]
    fn test_validate_bad_duration_and_unknown_project() {
        let tracker = FakeTracker::with_project("ABC", "viewer");
        let services = Services::from_tracker(&tracker);
        let f = LastCommented::new(services, Config::default());

        let v = f.validate("viewer", &args(&["XYZ", "ten days"]));
        assert!(v.has("invalid_duration"));
        assert!(v.has("project_not_found"));
        assert_eq!(v.errors().len(), 2);
    }

    #[test]
    fn test_validate_permission() {
        let tracker = FakeTracker::with_project("ABC", "viewer");
        let services = Services::from_tracker(&tracker);
        let f = LastCommented::new(services, Config::default());

        assert!(f.validate("viewer", &args(&["ABC", "-3w"])).is_valid());
        assert!(f.validate("viewer", &args(&["ABC", "5"])).is_valid());
        let v = f.validate("stranger", &args(&["ABC", "-3w"]));
        assert_eq!(v.errors(), &[ValidationError::PermissionDenied]);
    }

    proptest! {
        #[test]
        fn prop_matches_only_silent_reporters(
            reporter_ages in proptest::collection::vec(proptest::option::of(1i64..30), 0..6),
            window in 1i64..30
        ) {
            let mut tracker = FakeTracker::with_project("ABC", "viewer");
            for (idx, age) in reporter_ages.iter().enumerate() {
                let id = idx as i64 + 1;
                // Every issue was touched recently by someone else.
                tracker.issue(id, "rep", now() - Duration::minutes(1));
                if let Some(days) = age {
                    tracker.comment(id, "rep", now() - Duration::days(*days));
                }
                tracker.comment(id, "dev", now() - Duration::minutes(1));
            }
            let services = Services::from_tracker(&tracker);
            let f = LastCommented::new(services, Config::default());
            let duration = format!("-{}d", window);
            let result: Vec<i64> = f
                .values(&QueryContext::at("viewer", now()), &args(&["ABC", duration.as_str()]))
                .iter()
                .map(|l| l.0)
                .collect();

            let expected: Vec<i64> = reporter_ages
                .iter()
                .enumerate()
                .filter(|(_, age)| matches!(age, Some(days) if *days > window))
                .map(|(i, _)| i as i64 + 1)
                .collect();
            prop_assert_eq!(result, expected);
        }
    }
}
