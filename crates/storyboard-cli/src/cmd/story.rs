//! `sb story` — create, list, edit and reorder user stories.

use anyhow::{Context as _, Result, anyhow};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::io::{Read as _, Write};
use std::path::PathBuf;
use storyboard_core::db::query::{self, StorySort};
use storyboard_core::db::write;
use storyboard_core::model::story::{NewStory, OrderField, UserStory};
use storyboard_core::{Assignee, stories};

use super::{FilterArgs, ProjectArg, Workspace, resolve_assignee};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Subcommand, Debug)]
pub enum StoryCommand {
    /// Create one story.
    Create(StoryCreateArgs),
    /// List stories matching a selection.
    List(StoryListArgs),
    /// Create one story per non-blank input line.
    Bulk(StoryBulkArgs),
    /// Mark a story closed.
    Close(StoryIdArgs),
    /// Mark a story open again.
    Reopen(StoryIdArgs),
    /// Recompute the closed flag from status and tasks.
    Refresh(StoryIdArgs),
    /// Set one board order for many stories at once.
    Order(StoryOrderArgs),
    /// Move a story to another status.
    Move(StoryMoveArgs),
    /// Assign a story, or `none` to unassign.
    Assign(StoryAssignArgs),
    /// Estimate a story for one role.
    Points(StoryPointsArgs),
}

#[derive(Args, Debug)]
pub struct StoryIdArgs {
    /// Story id.
    pub id: i64,
}

#[derive(Args, Debug)]
pub struct StoryCreateArgs {
    #[command(flatten)]
    pub project: ProjectArg,

    pub subject: String,

    #[arg(long, default_value = "")]
    pub description: String,

    /// Status name or id; defaults to the project's first status.
    #[arg(long)]
    pub status: Option<String>,

    /// Owner username or id.
    #[arg(long)]
    pub owner: Option<String>,

    /// Assignee username or id.
    #[arg(long)]
    pub assign: Option<String>,

    /// Tag (repeatable).
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    #[arg(long)]
    pub milestone: Option<String>,

    #[arg(long)]
    pub client_requirement: bool,

    #[arg(long)]
    pub team_requirement: bool,

    #[arg(long)]
    pub external_reference: Option<String>,
}

#[derive(Args, Debug)]
pub struct StoryListArgs {
    #[command(flatten)]
    pub project: ProjectArg,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// One of: ref, backlog, sprint, kanban, recent.
    #[arg(long, default_value = "ref")]
    pub sort: String,
}

#[derive(Args, Debug)]
pub struct StoryBulkArgs {
    #[command(flatten)]
    pub project: ProjectArg,

    /// Read subjects from this file instead of stdin.
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Owner username or id of every created story.
    #[arg(long)]
    pub owner: Option<String>,
}

#[derive(Args, Debug)]
pub struct StoryOrderArgs {
    #[command(flatten)]
    pub project: ProjectArg,

    /// One of: backlog, sprint, kanban.
    #[arg(long, default_value = "backlog")]
    pub field: String,

    /// `STORY_ID=ORDER` pairs.
    #[arg(required = true, value_name = "ID=ORDER")]
    pub orders: Vec<String>,
}

#[derive(Args, Debug)]
pub struct StoryMoveArgs {
    pub id: i64,

    /// Target status name or id.
    pub status: String,
}

#[derive(Args, Debug)]
pub struct StoryAssignArgs {
    pub id: i64,

    /// Username or id, or `none`.
    pub person: String,
}

#[derive(Args, Debug)]
pub struct StoryPointsArgs {
    pub id: i64,

    /// Computable role slug.
    #[arg(long)]
    pub role: String,

    /// Points name, e.g. `3` or `?`.
    pub points: String,
}

#[derive(Debug, Serialize)]
struct OrderReport {
    field: OrderField,
    updated: usize,
}

pub fn run_story(command: &StoryCommand, output: OutputMode, ws: &mut Workspace) -> Result<()> {
    match command {
        StoryCommand::Create(args) => create(args, output, ws),
        StoryCommand::List(args) => list(args, output, ws),
        StoryCommand::Bulk(args) => bulk(args, output, ws),
        StoryCommand::Close(args) => {
            let story = stories::close_story(&ws.conn, args.id)?;
            render_story(output, "Closed story", &story)
        }
        StoryCommand::Reopen(args) => {
            let story = stories::open_story(&ws.conn, args.id)?;
            render_story(output, "Reopened story", &story)
        }
        StoryCommand::Refresh(args) => {
            let story = stories::refresh_closed_state(&ws.conn, args.id)?;
            render_story(output, "Refreshed story", &story)
        }
        StoryCommand::Order(args) => reorder(args, output, ws),
        StoryCommand::Move(args) => {
            let story = query::require_story(&ws.conn, args.id)?;
            let status = query::resolve_story_status(&ws.conn, story.project_id, &args.status)?;
            let story = stories::change_story_status(&mut ws.conn, args.id, status.id)?;
            render_story(output, &format!("Moved story to {}", status.name), &story)
        }
        StoryCommand::Assign(args) => {
            let person = match resolve_assignee(&ws.conn, &args.person)? {
                Assignee::Unassigned => None,
                Assignee::Person(id) => Some(id),
            };
            write::assign_story(&ws.conn, args.id, person)?;
            let story = query::require_story(&ws.conn, args.id)?;
            render_story(output, "Assigned story", &story)
        }
        StoryCommand::Points(args) => {
            let story = query::require_story(&ws.conn, args.id)?;
            let role = query::resolve_role(&ws.conn, story.project_id, &args.role)?;
            let points = query::list_points(&ws.conn, story.project_id)?
                .into_iter()
                .find(|p| p.name == args.points.trim())
                .ok_or_else(|| anyhow!("no points named '{}' in this project", args.points))?;
            write::set_role_points(&ws.conn, story.id, role.id, points.id)?;
            render_story(
                output,
                &format!("Estimated {} as {}", role.slug, points.name),
                &story,
            )
        }
    }
}

fn create(args: &StoryCreateArgs, output: OutputMode, ws: &Workspace) -> Result<()> {
    let project = ws.project(&args.project.project)?;
    let status_id = args
        .status
        .as_deref()
        .map(|key| query::resolve_story_status(&ws.conn, project.id, key).map(|s| s.id))
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

    let new = NewStory {
        description: args.description.clone(),
        status_id,
        owner_id,
        assigned_to_id,
        milestone: args.milestone.clone(),
        tags: args.tags.clone(),
        client_requirement: args.client_requirement,
        team_requirement: args.team_requirement,
        external_reference: args.external_reference.clone(),
        ..NewStory::with_subject(args.subject.clone())
    };
    let story = write::create_story(&ws.conn, project.id, &new)?;
    tracing::info!(story_id = story.id, reference = story.reference, "created story");
    render_story(output, "Created story", &story)
}

fn list(args: &StoryListArgs, output: OutputMode, ws: &Workspace) -> Result<()> {
    let project = ws.project(&args.project.project)?;
    let sort: StorySort = args.sort.parse()?;
    let filter = args.filter.to_filter(&ws.conn, project.id)?;
    let found = query::list_stories(&ws.conn, project.id, &filter, sort)?;

    render_mode(
        output,
        &found,
        |list, w| {
            for s in list {
                writeln!(w, "{}\t{}\t{}\t{}", s.reference, s.id, s.is_closed, s.subject)?;
            }
            Ok(())
        },
        |list, w| {
            pretty_section(w, &format!("Stories of {} ({})", project.slug, list.len()))?;
            for s in list {
                let mark = if s.is_closed { "x" } else { " " };
                writeln!(w, "[{mark}] #{:<5} {}", s.reference, s.subject)?;
            }
            Ok(())
        },
    )
}

fn bulk(args: &StoryBulkArgs, output: OutputMode, ws: &mut Workspace) -> Result<()> {
    let project = ws.project(&args.project.project)?;
    let owner_id = args
        .owner
        .as_deref()
        .map(|key| query::resolve_person(&ws.conn, key).map(|p| p.id))
        .transpose()?;

    let text = match &args.file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("read bulk input {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("read bulk input from stdin")?;
            buf
        }
    };

    let created = stories::create_stories_in_bulk(&mut ws.conn, project.id, &text, owner_id)?;
    render_mode(
        output,
        &created,
        |list, w| {
            for s in list {
                writeln!(w, "{}\t{}\t{}", s.reference, s.id, s.subject)?;
            }
            Ok(())
        },
        |list, w| {
            pretty_section(w, &format!("Created {} stories", list.len()))?;
            for s in list {
                writeln!(w, "#{:<5} {}", s.reference, s.subject)?;
            }
            Ok(())
        },
    )
}

fn reorder(args: &StoryOrderArgs, output: OutputMode, ws: &mut Workspace) -> Result<()> {
    let project = ws.project(&args.project.project)?;
    let field: OrderField = args.field.parse()?;
    let updates = args
        .orders
        .iter()
        .map(String::as_str)
        .map(parse_order_pair)
        .collect::<Result<Vec<_>>>()?;

    let updated = stories::update_orders_in_bulk(&mut ws.conn, project.id, field, &updates)?;
    render_mode(
        output,
        &OrderReport { field, updated },
        |r, w| writeln!(w, "{}\t{}", r.field, r.updated),
        |r, w| pretty_kv(w, "Reordered", format!("{} stories by {}", r.updated, r.field)),
    )
}

fn parse_order_pair(pair: &str) -> Result<(i64, i64)> {
    let (id, order) = pair
        .split_once('=')
        .ok_or_else(|| anyhow!("expected STORY_ID=ORDER, got '{pair}'"))?;
    let id = id
        .trim()
        .parse()
        .with_context(|| format!("invalid story id in '{pair}'"))?;
    let order = order
        .trim()
        .parse()
        .with_context(|| format!("invalid order in '{pair}'"))?;
    Ok((id, order))
}

fn render_story(output: OutputMode, heading: &str, story: &UserStory) -> Result<()> {
    render_mode(
        output,
        story,
        |s, w| writeln!(w, "{}\t{}\t{}\t{}", s.reference, s.id, s.is_closed, s.subject),
        |s, w| {
            pretty_section(w, heading)?;
            pretty_kv(w, "Ref", format!("#{}", s.reference))?;
            pretty_kv(w, "ID", s.id.to_string())?;
            pretty_kv(w, "Subject", &s.subject)?;
            pretty_kv(w, "Closed", s.is_closed.to_string())
        },
    )
}
