//! `sb init` — create the `.storyboard/` directory and an empty store.

use anyhow::{Context as _, Result};
use clap::Args;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use storyboard_core::config::{self, CONFIG_FILE, STORYBOARD_DIR};
use storyboard_core::db::{self, query};

use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Rewrite the config template even if `.storyboard/` already exists.
    /// The store itself is kept.
    #[arg(long)]
    pub force: bool,
}

const CONFIG_TOML: &str = "[store]\n\
    path = \"storyboard.db\"\n\
    \n\
    [i18n]\n\
    language = \"en\"\n\
    \n\
    [i18n.catalog]\n\
    \n\
    [export]\n\
    delimiter = \",\"\n";

const GITIGNORE: &str = "storyboard.db\nstoryboard.db-wal\nstoryboard.db-shm\n";

#[derive(Debug, Serialize)]
struct InitReport {
    config: String,
    store: String,
    schema_version: u32,
}

/// Execute `sb init`. Creates the project skeleton:
///
/// ```text
/// .storyboard/
///   config.toml     (default project config template)
///   .gitignore      (store file and its WAL companions)
///   storyboard.db   (migrated SQLite store)
/// ```
///
/// # Errors
///
/// Returns an error if `.storyboard/` already exists and `--force` is not
/// set, or if any filesystem or store operation fails.
pub fn run_init(args: &InitArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let dir = project_root.join(STORYBOARD_DIR);

    if dir.exists() && !args.force {
        anyhow::bail!(".storyboard/ already exists. Use `sb init --force` to reinitialize.");
    }

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let config_path = dir.join(CONFIG_FILE);
    std::fs::write(&config_path, CONFIG_TOML)
        .with_context(|| format!("Failed to write config: {}", config_path.display()))?;

    let gitignore_path = dir.join(".gitignore");
    std::fs::write(&gitignore_path, GITIGNORE)
        .with_context(|| format!("Failed to write .gitignore: {}", gitignore_path.display()))?;

    let project_config = config::load_project_config(project_root)?;
    let store_path = project_config.store_path(project_root);
    let conn = db::open_store(&store_path)?;
    let schema_version = query::schema_version(&conn)?;
    tracing::info!(store = %store_path.display(), schema_version, "initialized store");

    let report = InitReport {
        config: config_path.display().to_string(),
        store: store_path.display().to_string(),
        schema_version,
    };

    render_mode(
        output,
        &report,
        |r, w| writeln!(w, "{}\t{}", r.store, r.schema_version),
        |r, w| {
            pretty_section(w, "Initialized .storyboard/")?;
            pretty_kv(w, "Config", &r.config)?;
            pretty_kv(w, "Store", &r.store)?;
            pretty_kv(w, "Schema", r.schema_version.to_string())?;
            writeln!(w)?;
            writeln!(w, "Next steps:")?;
            writeln!(w, "  sb project create \"My project\"")?;
            writeln!(w, "  sb status add -p my-project New")
        },
    )
}
