//! `sb role add`.

use anyhow::Result;
use clap::{Args, Subcommand};
use std::io::Write;
use storyboard_core::db::{query, write};

use super::{ProjectArg, Workspace, slugify};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Subcommand, Debug)]
pub enum RoleCommand {
    /// Add a project role.
    Add(RoleAddArgs),
}

#[derive(Args, Debug)]
pub struct RoleAddArgs {
    #[command(flatten)]
    pub project: ProjectArg,

    pub name: String,

    /// Defaults to a slug of the name.
    #[arg(long)]
    pub slug: Option<String>,

    /// The role carries estimation points (adds an export column).
    #[arg(long)]
    pub computable: bool,
}

pub fn run_role(command: &RoleCommand, output: OutputMode, ws: &Workspace) -> Result<()> {
    let RoleCommand::Add(args) = command;
    let project = ws.project(&args.project.project)?;
    let slug = args.slug.clone().unwrap_or_else(|| slugify(&args.name));
    let order = i64::try_from(query::list_roles(&ws.conn, project.id, false)?.len())? + 1;
    let role = write::add_role(
        &ws.conn,
        project.id,
        args.name.trim(),
        &slug,
        args.computable,
        order,
    )?;
    tracing::info!(role_id = role.id, slug = %role.slug, "added role");

    render_mode(
        output,
        &role,
        |r, w| writeln!(w, "{}\t{}\t{}", r.id, r.slug, r.computable),
        |r, w| {
            pretty_section(w, "Added role")?;
            pretty_kv(w, "ID", r.id.to_string())?;
            pretty_kv(w, "Slug", &r.slug)?;
            pretty_kv(w, "Computable", r.computable.to_string())
        },
    )
}
