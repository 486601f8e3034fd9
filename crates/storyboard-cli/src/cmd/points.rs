//! `sb points add` — estimation values of a project.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use std::io::Write;
use storyboard_core::db::{query, write};

use super::{ProjectArg, Workspace};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Subcommand, Debug)]
pub enum PointsCommand {
    /// Add an estimation value.
    Add(PointsAddArgs),
}

#[derive(Args, Debug)]
pub struct PointsAddArgs {
    #[command(flatten)]
    pub project: ProjectArg,

    /// Label shown to users, e.g. `3` or `?`.
    pub name: String,

    /// Numeric value; omit for points without a value.
    #[arg(long)]
    pub value: Option<f64>,
}

pub fn run_points(command: &PointsCommand, output: OutputMode, ws: &Workspace) -> Result<()> {
    let PointsCommand::Add(args) = command;
    if args.value.is_some_and(|v| !v.is_finite()) {
        bail!("points value must be a finite number");
    }
    let project = ws.project(&args.project.project)?;
    let order = i64::try_from(query::list_points(&ws.conn, project.id)?.len())? + 1;
    let points = write::add_points(&ws.conn, project.id, args.name.trim(), args.value, order)?;

    render_mode(
        output,
        &points,
        |p, w| {
            let value = p.value.map(|v| v.to_string()).unwrap_or_default();
            writeln!(w, "{}\t{}\t{value}", p.id, p.name)
        },
        |p, w| {
            pretty_section(w, "Added points")?;
            pretty_kv(w, "ID", p.id.to_string())?;
            pretty_kv(w, "Name", &p.name)?;
            pretty_kv(w, "Value", p.value.map_or_else(|| "-".to_string(), |v| v.to_string()))
        },
    )
}
