use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use commentql::config::{Config, CONFIG_FILE};
use commentql::db::Database;

pub const DATA_DIR: &str = ".commentql";
pub const DB_FILE: &str = "issues.db";

pub fn run(path: &Path) -> Result<()> {
    let data_dir = path.join(DATA_DIR);

    let existed = data_dir.exists();
    fs::create_dir_all(&data_dir).context("Failed to create .commentql directory")?;

    let db_path = data_dir.join(DB_FILE);
    Database::open(&db_path)?;

    if !data_dir.join(CONFIG_FILE).exists() {
        Config::default().save(&data_dir)?;
    }

    if existed {
        println!("Already initialized at {}", data_dir.display());
    } else {
        println!("Initialized commentql in {}", data_dir.display());
    }
    Ok(())
}
