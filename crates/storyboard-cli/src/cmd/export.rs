//! `sb export` — write a project's stories as CSV.

use anyhow::{Context as _, Result, bail};
use clap::Args;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use storyboard_core::export::write_stories_csv;

use super::{FilterArgs, ProjectArg, Workspace};

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[command(flatten)]
    pub project: ProjectArg,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Write to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Field delimiter; overrides `[export] delimiter` in the config.
    #[arg(long)]
    pub delimiter: Option<char>,
}

/// Execute `sb export`. CSV is written regardless of the output mode; the
/// row count goes to the log.
///
/// # Errors
///
/// Returns an error if the selection does not resolve, a query fails, or
/// the destination cannot be written.
pub fn run_export(args: &ExportArgs, ws: &Workspace) -> Result<()> {
    let delimiter = args.delimiter.unwrap_or(ws.config.export.delimiter);
    if matches!(delimiter, '"' | '\r' | '\n') || !delimiter.is_ascii() {
        bail!("--delimiter must be a single ASCII character other than a quote or newline");
    }

    let project = ws.project(&args.project.project)?;
    let filter = args.filter.to_filter(&ws.conn, project.id)?;

    let rows = match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("create export file {}", path.display()))?;
            let mut out = BufWriter::new(file);
            write_stories_csv(&ws.conn, project.id, &filter, delimiter, &mut out)?
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            write_stories_csv(&ws.conn, project.id, &filter, delimiter, &mut out)?
        }
    };

    tracing::debug!(project = %project.slug, rows, "export finished");
    Ok(())
}
