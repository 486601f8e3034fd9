//! Command handlers for `sb`.
//!
//! Every handler that touches the store goes through [`Workspace::open`],
//! which maps a missing store to `E1001` and an unreadable one to `E3001`.

pub mod completions;
pub mod export;
pub mod filters;
pub mod init;
pub mod member;
pub mod person;
pub mod points;
pub mod project;
pub mod role;
pub mod status;
pub mod story;
pub mod task;

use anyhow::{Context as _, Result};
use clap::Args;
use rusqlite::Connection;
use std::path::Path;
use storyboard_core::config::{ProjectConfig, STORYBOARD_DIR};
use storyboard_core::db::{self, query};
use storyboard_core::error::StoreError;
use storyboard_core::model::project::Project;
use storyboard_core::{Assignee, StoryFilter};

/// An opened project directory: its config and a store connection.
pub struct Workspace {
    pub config: ProjectConfig,
    pub conn: Connection,
}

impl Workspace {
    /// Open the store configured for `root`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotInitialized`] when the store file is missing
    /// and [`StoreError::CorruptStore`] when it is not a readable store.
    pub fn open(root: &Path, config: ProjectConfig) -> Result<Self> {
        let path = config.store_path(root);
        if !path.exists() {
            return Err(StoreError::NotInitialized(root.join(STORYBOARD_DIR)).into());
        }
        let conn = db::try_open_store(&path)?.ok_or(StoreError::CorruptStore(path))?;

        Ok(Self { config, conn })
    }

    /// Resolve a `--project` value (id or slug).
    pub fn project(&self, key: &str) -> Result<Project> {
        query::resolve_project(&self.conn, key).context("resolve --project")
    }
}

/// The `--project` selector shared by project-scoped commands.
#[derive(Args, Debug, Clone)]
pub struct ProjectArg {
    /// Project id or slug.
    #[arg(short, long, value_name = "PROJECT")]
    pub project: String,
}

/// Story selection flags shared by `story list`, `filters` and `export`.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Status name or id (repeatable, any-of).
    #[arg(long = "status", value_name = "STATUS")]
    pub statuses: Vec<String>,

    /// Assignee username or id; `none` selects unassigned stories
    /// (repeatable, any-of).
    #[arg(long = "assigned-to", value_name = "PERSON")]
    pub assigned_to: Vec<String>,

    /// Owner username or id (repeatable, any-of).
    #[arg(long = "owner", value_name = "PERSON")]
    pub owners: Vec<String>,

    /// Tag the story must carry (repeatable, all-of).
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Only closed stories.
    #[arg(long, conflicts_with = "open")]
    pub closed: bool,

    /// Only open stories.
    #[arg(long)]
    pub open: bool,

    /// Case-insensitive text the subject must contain.
    #[arg(long, value_name = "TEXT")]
    pub search: Option<String>,
}

impl FilterArgs {
    /// Resolve names into a [`StoryFilter`] for `project_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if a status or person does not resolve.
    pub fn to_filter(&self, conn: &Connection, project_id: i64) -> Result<StoryFilter> {
        let statuses = self
            .statuses
            .iter()
            .map(|key| query::resolve_story_status(conn, project_id, key).map(|s| s.id))
            .collect::<Result<Vec<_>>>()?;

        let assigned_to = self
            .assigned_to
            .iter()
            .map(|key| resolve_assignee(conn, key))
            .collect::<Result<Vec<_>>>()?;

        let owners = self
            .owners
            .iter()
            .map(|key| query::resolve_person(conn, key).map(|p| p.id))
            .collect::<Result<Vec<_>>>()?;

        let is_closed = match (self.closed, self.open) {
            (true, _) => Some(true),
            (false, true) => Some(false),
            (false, false) => None,
        };

        Ok(StoryFilter {
            statuses,
            assigned_to,
            owners,
            tags: self.tags.iter().map(|t| t.trim().to_string()).collect(),
            is_closed,
            subject_contains: self.search.clone(),
        })
    }
}

/// `none`, `null` or `unassigned` select stories without assignee; anything
/// else must name a person.
pub fn resolve_assignee(conn: &Connection, key: &str) -> Result<Assignee> {
    if Assignee::is_unassigned_keyword(key) {
        return Ok(Assignee::Unassigned);
    }
    Ok(Assignee::Person(query::resolve_person(conn, key)?.id))
}

/// Lowercase, dash-separated slug of a display name.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
