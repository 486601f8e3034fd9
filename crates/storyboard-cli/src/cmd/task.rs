//! `sb task` — tasks of a story. Task changes refresh the story's closed
//! flag.

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use std::io::Write;
use storyboard_core::db::query;
use storyboard_core::model::story::{NewTask, Task};
use storyboard_core::stories;

use super::{ProjectArg, Workspace};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Create a task, optionally under a story.
    Create(TaskCreateArgs),
    /// Change a task's status; `none` clears it.
    Status(TaskStatusArgs),
}

#[derive(Args, Debug)]
pub struct TaskCreateArgs {
    #[command(flatten)]
    pub project: ProjectArg,

    pub subject: String,

    /// Parent story id.
    #[arg(long)]
    pub story: Option<i64>,

    /// Task status name or id.
    #[arg(long)]
    pub status: Option<String>,

    #[arg(long)]
    pub owner: Option<String>,

    #[arg(long)]
    pub assign: Option<String>,
}

#[derive(Args, Debug)]
pub struct TaskStatusArgs {
    /// Task id.
    pub id: i64,

    /// Task status name or id, or `none`.
    pub status: String,
}

pub fn run_task(command: &TaskCommand, output: OutputMode, ws: &mut Workspace) -> Result<()> {
    let (heading, task) = match command {
        TaskCommand::Create(args) => {
            let project = ws.project(&args.project.project)?;
            let status_id = args
                .status
                .as_deref()
                .map(|key| query::resolve_task_status(&ws.conn, project.id, key).map(|s| s.id))
                .transpose()?;
            let owner_id = args
                .owner
                .as_deref()
                .map(|key| query::resolve_person(&ws.conn, key).map(|p| p.id))
                .transpose()?;
            let assigned_to_id = args
                .assign
                .as_deref()
                .map(|key| query::resolve_person(&ws.conn, key).map(|p| p.id))
                .transpose()?;

            let new = NewTask {
                subject: args.subject.clone(),
                story_id: args.story,
                status_id,
                owner_id,
                assigned_to_id,
            };
            ("Created task", stories::add_task(&mut ws.conn, project.id, &new)?)
        }
        TaskCommand::Status(args) => {
            let task = query::get_task(&ws.conn, args.id)?
                .with_context(|| format!("task {} not found", args.id))?;
            let status_id = if args.status.trim().eq_ignore_ascii_case("none") {
                None
            } else {
                Some(query::resolve_task_status(&ws.conn, task.project_id, &args.status)?.id)
            };
            (
                "Changed task status",
                stories::change_task_status(&mut ws.conn, task.id, status_id)?,
            )
        }
    };

    render_task(output, heading, &task)
}

fn render_task(output: OutputMode, heading: &str, task: &Task) -> Result<()> {
    render_mode(
        output,
        task,
        |t, w| {
            let story = t.story_id.map(|id| id.to_string()).unwrap_or_default();
            writeln!(w, "{}\t{}\t{story}\t{}", t.reference, t.id, t.subject)
        },
        |t, w| {
            pretty_section(w, heading)?;
            pretty_kv(w, "Ref", format!("#{}", t.reference))?;
            pretty_kv(w, "ID", t.id.to_string())?;
            pretty_kv(w, "Subject", &t.subject)?;
            pretty_kv(
                w,
                "Story",
                t.story_id.map_or_else(|| "-".to_string(), |id| id.to_string()),
            )
        },
    )
}
