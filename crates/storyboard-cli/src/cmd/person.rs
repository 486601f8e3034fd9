//! `sb person add`.

use anyhow::Result;
use clap::{Args, Subcommand};
use std::io::Write;
use storyboard_core::db::write;

use super::Workspace;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Subcommand, Debug)]
pub enum PersonCommand {
    /// Register a person.
    Add(PersonAddArgs),
}

#[derive(Args, Debug)]
pub struct PersonAddArgs {
    /// Unique login name.
    pub username: String,

    /// Display name used in facets; defaults to the username.
    #[arg(long)]
    pub full_name: Option<String>,

    #[arg(long, default_value = "")]
    pub email: String,

    /// Register an automation account (created inactive).
    #[arg(long)]
    pub system: bool,
}

pub fn run_person(command: &PersonCommand, output: OutputMode, ws: &Workspace) -> Result<()> {
    let PersonCommand::Add(args) = command;
    let full_name = args.full_name.as_deref().unwrap_or(&args.username);
    let person = write::add_person(&ws.conn, &args.username, full_name, &args.email, args.system)?;
    tracing::info!(person_id = person.id, username = %person.username, "added person");

    render_mode(
        output,
        &person,
        |p, w| writeln!(w, "{}\t{}\t{}", p.id, p.username, p.full_name),
        |p, w| {
            pretty_section(w, "Added person")?;
            pretty_kv(w, "ID", p.id.to_string())?;
            pretty_kv(w, "Username", &p.username)?;
            pretty_kv(w, "Name", &p.full_name)?;
            pretty_kv(w, "System", p.is_system.to_string())
        },
    )
}
