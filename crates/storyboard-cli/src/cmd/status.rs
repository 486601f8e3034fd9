//! `sb status` and `sb task-status` — workflow statuses of a project.

use anyhow::Result;
use clap::{Args, Subcommand};
use std::io::Write;
use storyboard_core::db::{query, write};
use storyboard_core::model::project::Status;

use super::{ProjectArg, Workspace};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Subcommand, Debug)]
pub enum StatusCommand {
    /// Add a story status.
    Add(StatusAddArgs),
    /// List story statuses in board order.
    List(ProjectArg),
}

#[derive(Subcommand, Debug)]
pub enum TaskStatusCommand {
    /// Add a task status.
    Add(StatusAddArgs),
}

#[derive(Args, Debug)]
pub struct StatusAddArgs {
    #[command(flatten)]
    pub project: ProjectArg,

    /// Status name, unique within the project.
    pub name: String,

    #[arg(long, default_value = "#999999")]
    pub color: String,

    /// Board position; defaults to after the last status.
    #[arg(long)]
    pub order: Option<i64>,

    /// Stories (or tasks) in this status count as closed.
    #[arg(long)]
    pub closed: bool,
}

pub fn run_status(command: &StatusCommand, output: OutputMode, ws: &Workspace) -> Result<()> {
    match command {
        StatusCommand::Add(args) => {
            let project = ws.project(&args.project.project)?;
            let existing = query::list_story_statuses(&ws.conn, project.id)?;
            let order = args.order.unwrap_or_else(|| next_order(&existing));
            let status = write::add_story_status(
                &ws.conn,
                project.id,
                args.name.trim(),
                &args.color,
                order,
                args.closed,
            )?;
            render_added(output, "Added story status", &status)
        }
        StatusCommand::List(args) => {
            let project = ws.project(&args.project)?;
            let statuses = query::list_story_statuses(&ws.conn, project.id)?;
            render_mode(
                output,
                &statuses,
                |list, w| {
                    for s in list {
                        writeln!(w, "{}\t{}\t{}\t{}", s.id, s.order, s.name, s.is_closed)?;
                    }
                    Ok(())
                },
                |list, w| {
                    pretty_section(w, &format!("Statuses of {}", project.slug))?;
                    for s in list {
                        let closed = if s.is_closed { "closed" } else { "" };
                        writeln!(w, "{:>4}  {:<24} {:<8} {closed}", s.id, s.name, s.color)?;
                    }
                    Ok(())
                },
            )
        }
    }
}

pub fn run_task_status(
    command: &TaskStatusCommand,
    output: OutputMode,
    ws: &Workspace,
) -> Result<()> {
    let TaskStatusCommand::Add(args) = command;
    let project = ws.project(&args.project.project)?;
    let existing = query::list_task_statuses(&ws.conn, project.id)?;
    let order = args.order.unwrap_or_else(|| next_order(&existing));
    let status = write::add_task_status(
        &ws.conn,
        project.id,
        args.name.trim(),
        &args.color,
        order,
        args.closed,
    )?;
    render_added(output, "Added task status", &status)
}

fn next_order(existing: &[Status]) -> i64 {
    existing.iter().map(|s| s.order).max().map_or(1, |max| max + 1)
}

fn render_added(output: OutputMode, heading: &str, status: &Status) -> Result<()> {
    tracing::info!(status_id = status.id, name = %status.name, "{heading}");
    render_mode(
        output,
        status,
        |s, w| writeln!(w, "{}\t{}\t{}", s.id, s.order, s.name),
        |s, w| {
            pretty_section(w, heading)?;
            pretty_kv(w, "ID", s.id.to_string())?;
            pretty_kv(w, "Name", &s.name)?;
            pretty_kv(w, "Order", s.order.to_string())?;
            pretty_kv(w, "Closed", s.is_closed.to_string())
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(order: i64) -> Status {
        Status {
            id: order,
            project_id: 1,
            name: format!("S{order}"),
            color: String::new(),
            order,
            is_closed: false,
        }
    }

    #[test]
    fn next_order_appends() {
        assert_eq!(next_order(&[]), 1);
        assert_eq!(next_order(&[status(1), status(5), status(3)]), 6);
    }
}
