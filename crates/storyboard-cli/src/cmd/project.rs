//! `sb project` — create and list projects.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use std::io::Write;
use storyboard_core::db::{query, write};

use super::{Workspace, slugify};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// Create a project.
    Create(ProjectCreateArgs),
    /// List projects.
    List,
}

#[derive(Args, Debug)]
pub struct ProjectCreateArgs {
    /// Display name.
    pub name: String,

    /// URL-safe key; defaults to a slug of the name.
    #[arg(long)]
    pub slug: Option<String>,
}

pub fn run_project(command: &ProjectCommand, output: OutputMode, ws: &Workspace) -> Result<()> {
    match command {
        ProjectCommand::Create(args) => {
            let slug = args.slug.clone().unwrap_or_else(|| slugify(&args.name));
            if slug.is_empty() {
                bail!("cannot derive a slug from '{}'; pass --slug", args.name);
            }
            let project = write::create_project(&ws.conn, args.name.trim(), &slug)?;
            tracing::info!(project_id = project.id, slug = %project.slug, "created project");

            render_mode(
                output,
                &project,
                |p, w| writeln!(w, "{}\t{}\t{}", p.id, p.slug, p.name),
                |p, w| {
                    pretty_section(w, "Created project")?;
                    pretty_kv(w, "ID", p.id.to_string())?;
                    pretty_kv(w, "Slug", &p.slug)?;
                    pretty_kv(w, "Name", &p.name)
                },
            )
        }
        ProjectCommand::List => {
            let projects = query::list_projects(&ws.conn)?;
            render_mode(
                output,
                &projects,
                |list, w| {
                    for p in list {
                        writeln!(w, "{}\t{}\t{}", p.id, p.slug, p.name)?;
                    }
                    Ok(())
                },
                |list, w| {
                    pretty_section(w, &format!("Projects ({})", list.len()))?;
                    for p in list {
                        writeln!(w, "{:>4}  {:<20} {}", p.id, p.slug, p.name)?;
                    }
                    Ok(())
                },
            )
        }
    }
}
