mod commands;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::env;
use std::path::PathBuf;
use tracing::debug;

use commentql::config::Config;
use commentql::db::Database;

use commands::init::{DATA_DIR, DB_FILE};

#[derive(Parser)]
#[command(name = "commentql")]
#[command(about = "Query issues by who commented last, and when")]
#[command(version)]
struct Cli {
    /// Acting user: reporter of new issues, author of comments, searcher
    #[arg(short, long, global = true, env = "COMMENTQL_USER", default_value = "anonymous")]
    user: String,

    /// Log filter, e.g. "warn" or "commentql=debug"
    #[arg(long, global = true, env = "COMMENTQL_LOG", default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize commentql in the current directory
    Init,

    /// Project management
    Project {
        #[command(subcommand)]
        action: ProjectCommands,
    },

    /// Allow a user to browse a project's issues
    Grant {
        /// Project key
        key: String,
        /// User name
        username: String,
    },

    /// Take away a user's browse permission
    Revoke {
        /// Project key
        key: String,
        /// User name
        username: String,
    },

    /// Create a new issue reported by the acting user
    Create {
        /// Project key
        key: String,
        /// Issue title
        title: String,
        /// Issue description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Comment on an issue as the acting user
    Comment {
        /// Issue ID
        id: i64,
        /// Comment text
        text: String,
    },

    /// Update an issue
    Update {
        /// Issue ID
        id: i64,
        /// New title
        #[arg(short, long)]
        title: Option<String>,
        /// New description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// List issues
    List {
        /// Only issues of this project
        #[arg(short, long)]
        project: Option<String>,
    },

    /// Show issue details
    Show {
        /// Issue ID
        id: i64,
    },

    /// List available query functions
    Functions,

    /// Check a function call's arguments
    Validate {
        /// Function name, e.g. lastCommented
        function: String,
        /// Function arguments
        #[arg(allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Evaluate a function call and print matching issues
    Eval {
        /// Function name, e.g. lastCommentator
        function: String,
        /// Function arguments
        #[arg(allow_hyphen_values = true)]
        args: Vec<String>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// Create a project
    Add {
        /// Project key, e.g. ABC
        key: String,
        /// Display name
        name: String,
    },
    /// List projects
    List,
}

fn find_data_dir() -> Result<PathBuf> {
    let mut current = env::current_dir()?;

    loop {
        let candidate = current.join(DATA_DIR);
        if candidate.is_dir() {
            return Ok(candidate);
        }

        if !current.pop() {
            bail!("Not a commentql directory (or any parent). Run 'commentql init' first.");
        }
    }
}

fn get_db() -> Result<Database> {
    let data_dir = find_data_dir()?;
    let db_path = data_dir.join(DB_FILE);
    debug!(path = %db_path.display(), "opening database");
    Database::open(&db_path).context("Failed to open database")
}

fn get_config() -> Result<Config> {
    let data_dir = find_data_dir()?;
    Config::load(&data_dir)
}

/// Pull `--json` out of trailing function arguments, where clap leaves it
/// because the argument list accepts hyphenated values. Any other `--` word
/// is a misplaced option, not a query argument.
fn take_json_flag(args: Vec<String>) -> Result<(Vec<String>, bool)> {
    let mut json = false;
    let mut rest = Vec::with_capacity(args.len());
    for arg in args {
        if arg == "--json" {
            json = true;
        } else if arg.starts_with("--") {
            bail!("Unexpected option '{}' among function arguments", arg);
        } else {
            rest.push(arg);
        }
    }
    Ok((rest, json))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    commentql::logging::init(&cli.log_level, cli.log_json)?;
    let user = cli.user.as_str();

    match cli.command {
        Commands::Init => {
            let cwd = env::current_dir()?;
            commands::init::run(&cwd)
        }

        Commands::Project { action } => {
            let db = get_db()?;
            match action {
                ProjectCommands::Add { key, name } => commands::project::add(&db, &key, &name),
                ProjectCommands::List => commands::project::list(&db),
            }
        }

        Commands::Grant { key, username } => {
            let db = get_db()?;
            commands::project::grant(&db, &key, &username)
        }

        Commands::Revoke { key, username } => {
            let db = get_db()?;
            commands::project::revoke(&db, &key, &username)
        }

        Commands::Create {
            key,
            title,
            description,
        } => {
            let db = get_db()?;
            commands::create::run(&db, &key, &title, description.as_deref(), user)
        }

        Commands::Comment { id, text } => {
            let db = get_db()?;
            commands::comment::run(&db, id, user, &text)
        }

        Commands::Update {
            id,
            title,
            description,
        } => {
            let db = get_db()?;
            commands::update::run(&db, id, title.as_deref(), description.as_deref())
        }

        Commands::List { project } => {
            let db = get_db()?;
            commands::list::run(&db, project.as_deref())
        }

        Commands::Show { id } => {
            let db = get_db()?;
            commands::show::run(&db, id)
        }

        Commands::Functions => {
            let db = get_db()?;
            commands::eval::list_functions(&db, get_config()?)
        }

        Commands::Validate { function, args } => {
            let (args, json) = take_json_flag(args)?;
            if json {
                bail!("'validate' has no --json option");
            }
            let db = get_db()?;
            commands::eval::validate(&db, get_config()?, &function, &args, user)
        }

        Commands::Eval {
            function,
            args,
            json,
        } => {
            let (args, trailing_json) = take_json_flag(args)?;
            let db = get_db()?;
            commands::eval::run(&db, get_config()?, &function, &args, user, json || trailing_json)
        }
    }
}
