//! `sb member add` — project memberships and pending invitations.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use std::io::Write;
use storyboard_core::db::{query, write};

use super::{ProjectArg, Workspace};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Subcommand, Debug)]
pub enum MemberCommand {
    /// Add a person to a project, or invite an email address.
    Add(MemberAddArgs),
}

#[derive(Args, Debug)]
pub struct MemberAddArgs {
    #[command(flatten)]
    pub project: ProjectArg,

    /// Username or id of the person; omit with `--email` for an invitation.
    pub person: Option<String>,

    /// Role slug.
    #[arg(long)]
    pub role: Option<String>,

    #[arg(long, default_value = "")]
    pub email: String,
}

pub fn run_member(command: &MemberCommand, output: OutputMode, ws: &Workspace) -> Result<()> {
    let MemberCommand::Add(args) = command;
    if args.person.is_none() && args.email.trim().is_empty() {
        bail!("pass a person or --email for an invitation");
    }

    let project = ws.project(&args.project.project)?;
    let person = args
        .person
        .as_deref()
        .map(|key| query::resolve_person(&ws.conn, key))
        .transpose()?;
    let role = args
        .role
        .as_deref()
        .map(|slug| query::resolve_role(&ws.conn, project.id, slug))
        .transpose()?;

    let membership = write::add_membership(
        &ws.conn,
        project.id,
        person.as_ref().map(|p| p.id),
        role.as_ref().map(|r| r.id),
        args.email.trim(),
    )?;
    tracing::info!(
        project_id = project.id,
        person_id = ?membership.person_id,
        "added membership"
    );

    let who = person.map_or_else(|| format!("invitation <{}>", membership.email), |p| p.username);
    render_mode(
        output,
        &membership,
        |m, w| writeln!(w, "{}\t{who}", m.id),
        |m, w| {
            pretty_section(w, &format!("Added member to {}", project.slug))?;
            pretty_kv(w, "ID", m.id.to_string())?;
            pretty_kv(w, "Member", &who)?;
            pretty_kv(w, "Role", role.as_ref().map_or("-", |r| r.slug.as_str()))
        },
    )
}
