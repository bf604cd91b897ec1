use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use commentql::config::Config;
use commentql::db::Database;
use commentql::functions::{self, QueryContext, QueryFunction, QueryLiteral};
use commentql::host::Services;

#[derive(Serialize)]
struct EvalOutput<'a> {
    function: &'static str,
    args: &'a [String],
    user: &'a str,
    issues: Vec<QueryLiteral>,
}

fn lookup<'a>(db: &'a Database, config: Config, name: &str) -> Result<Box<dyn QueryFunction + 'a>> {
    functions::find(name, Services::from_tracker(db), config).ok_or_else(|| {
        anyhow!(
            "Unknown function '{}'. Run 'commentql functions' to list them",
            name
        )
    })
}

pub fn list_functions(db: &Database, config: Config) -> Result<()> {
    for f in functions::registry(Services::from_tracker(db), config) {
        println!(
            "{:<16} min args: {}  returns: {:?}{}",
            f.name(),
            f.min_args(),
            f.data_type(),
            if f.is_list() { " list" } else { "" }
        );
    }
    Ok(())
}

pub fn validate(db: &Database, config: Config, name: &str, args: &[String], user: &str) -> Result<()> {
    let f = lookup(db, config, name)?;
    let validation = f.validate(user, args);

    if validation.is_valid() {
        println!("{}: arguments OK", f.name());
        return Ok(());
    }
    for msg in validation.messages() {
        println!("[{}] {}", msg.code, msg.message);
    }
    bail!("{} rejected its arguments", f.name())
}

/// Validate, then expand. Refuses to evaluate a call that fails validation.
pub fn evaluate(
    f: &dyn QueryFunction,
    args: &[String],
    user: &str,
    now: DateTime<Utc>,
) -> Result<Vec<QueryLiteral>> {
    let validation = f.validate(user, args);
    if !validation.is_valid() {
        let reasons: Vec<String> = validation.messages().into_iter().map(|m| m.message).collect();
        bail!("{}: {}", f.name(), reasons.join("; "));
    }
    Ok(f.values(&QueryContext::at(user, now), args))
}

pub fn run(
    db: &Database,
    config: Config,
    name: &str,
    args: &[String],
    user: &str,
    json: bool,
) -> Result<()> {
    let f = lookup(db, config, name)?;
    let literals = evaluate(f.as_ref(), args, user, Utc::now())?;

    if json {
        let output = EvalOutput {
            function: f.name(),
            args,
            user,
            issues: literals,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if literals.is_empty() {
        println!("No issues matched.");
        return Ok(());
    }
    for literal in &literals {
        match db.get_issue(literal.0)? {
            Some(issue) => println!("#{:<4} {}", issue.id, issue.title),
            None => println!("#{}", literal.0),
        }
    }
    Ok(())
}
