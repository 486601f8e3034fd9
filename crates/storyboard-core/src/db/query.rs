//! `SQLite` query helpers for the story store.
//!
//! Typed structs and read functions for the common access patterns:
//! resolve projects, list statuses/roles/members, fetch and filter stories,
//! and read the multi-valued tag/task/points relationships.
//!
//! All functions take a shared `&Connection` reference and return
//! `anyhow::Result<T>` with typed structs (never raw rows).

use anyhow::{Context, Result, bail};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;
use crate::filter::StoryFilter;
use crate::model::project::{Membership, Person, Points, Project, Role, Status};
use crate::model::story::{Task, UserStory};

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

/// Sort order for story listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorySort {
    /// Project reference number, ascending.
    #[default]
    Ref,
    /// Backlog order, then ref.
    Backlog,
    /// Sprint order, then ref.
    Sprint,
    /// Kanban order, then ref.
    Kanban,
    /// Most recently modified first.
    ModifiedDesc,
}

impl StorySort {
    const fn sql_clause(self) -> &'static str {
        match self {
            Self::Ref => "ORDER BY s.ref ASC",
            Self::Backlog => "ORDER BY s.backlog_order ASC, s.ref ASC",
            Self::Sprint => "ORDER BY s.sprint_order ASC, s.ref ASC",
            Self::Kanban => "ORDER BY s.kanban_order ASC, s.ref ASC",
            Self::ModifiedDesc => "ORDER BY s.modified_at_us DESC, s.ref ASC",
        }
    }
}

impl fmt::Display for StorySort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ref => f.write_str("ref"),
            Self::Backlog => f.write_str("backlog"),
            Self::Sprint => f.write_str("sprint"),
            Self::Kanban => f.write_str("kanban"),
            Self::ModifiedDesc => f.write_str("modified_desc"),
        }
    }
}

impl FromStr for StorySort {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ref" => Ok(Self::Ref),
            "backlog" => Ok(Self::Backlog),
            "sprint" => Ok(Self::Sprint),
            "kanban" => Ok(Self::Kanban),
            "modified_desc" | "modified-desc" | "recent" => Ok(Self::ModifiedDesc),
            other => bail!(
                "unknown sort order '{other}': expected one of ref, backlog, sprint, kanban, modified_desc"
            ),
        }
    }
}

const STORY_COLUMNS: &str = "s.id, s.project_id, s.ref, s.subject, s.description, \
     s.status_id, s.owner_id, s.assigned_to_id, s.milestone, s.is_closed, \
     s.backlog_order, s.sprint_order, s.kanban_order, s.client_requirement, \
     s.team_requirement, s.external_reference, s.created_at_us, s.modified_at_us, \
     s.finish_at_us";

// ---------------------------------------------------------------------------
// Store metadata
// ---------------------------------------------------------------------------

/// Schema version recorded in `store_meta`.
///
/// # Errors
///
/// Returns an error if the metadata row is missing or unreadable.
pub fn schema_version(conn: &Connection) -> Result<u32> {
    let version: i64 = conn
        .query_row(
            "SELECT schema_version FROM store_meta WHERE id = 1",
            [],
            |row| row.get(0),
        )
        .context("read store schema version")?;
    u32::try_from(version).context("schema version out of range")
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

/// Fetch a project by id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_project(conn: &Connection, project_id: i64) -> Result<Option<Project>> {
    conn.query_row(
        "SELECT id, name, slug, created_at_us FROM projects WHERE id = ?1",
        params![project_id],
        row_to_project,
    )
    .optional()
    .with_context(|| format!("get_project for {project_id}"))
}

/// Fetch a project by slug.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_project_by_slug(conn: &Connection, slug: &str) -> Result<Option<Project>> {
    conn.query_row(
        "SELECT id, name, slug, created_at_us FROM projects WHERE slug = ?1",
        params![slug],
        row_to_project,
    )
    .optional()
    .with_context(|| format!("get_project_by_slug for '{slug}'"))
}

/// Resolve a project from a numeric id or a slug.
///
/// # Errors
///
/// Returns [`StoreError::ProjectNotFound`] when nothing matches, or an
/// error if the query fails.
pub fn resolve_project(conn: &Connection, key: &str) -> Result<Project> {
    let key = key.trim();
    let by_id = match key.parse::<i64>() {
        Ok(id) => get_project(conn, id)?,
        Err(_) => None,
    };

    match by_id {
        Some(project) => Ok(project),
        None => get_project_by_slug(conn, key)?
            .ok_or_else(|| StoreError::ProjectNotFound(key.to_string()).into()),
    }
}

/// List all projects by id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_projects(conn: &Connection) -> Result<Vec<Project>> {
    let mut stmt = conn
        .prepare("SELECT id, name, slug, created_at_us FROM projects ORDER BY id")
        .context("prepare list_projects")?;
    let rows = stmt
        .query_map([], row_to_project)
        .context("execute list_projects")?;

    let mut projects = Vec::new();
    for row in rows {
        projects.push(row.context("read project row")?);
    }
    Ok(projects)
}

// ---------------------------------------------------------------------------
// People and memberships
// ---------------------------------------------------------------------------

/// Fetch a person by id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_person(conn: &Connection, person_id: i64) -> Result<Option<Person>> {
    conn.query_row(
        "SELECT id, username, email, full_name, is_active, is_system \
         FROM persons WHERE id = ?1",
        params![person_id],
        row_to_person,
    )
    .optional()
    .with_context(|| format!("get_person for {person_id}"))
}

/// Resolve a person from a numeric id or a username.
///
/// # Errors
///
/// Returns [`StoreError::PersonNotFound`] when nothing matches, or an
/// error if the query fails.
pub fn resolve_person(conn: &Connection, key: &str) -> Result<Person> {
    let key = key.trim();
    let by_id = match key.parse::<i64>() {
        Ok(id) => get_person(conn, id)?,
        Err(_) => None,
    };
    if let Some(person) = by_id {
        return Ok(person);
    }

    conn.query_row(
        "SELECT id, username, email, full_name, is_active, is_system \
         FROM persons WHERE username = ?1",
        params![key],
        row_to_person,
    )
    .optional()
    .with_context(|| format!("resolve_person for '{key}'"))?
    .ok_or_else(|| StoreError::PersonNotFound(key.to_string()).into())
}

/// List system accounts (automation owners).
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_system_persons(conn: &Connection) -> Result<Vec<Person>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, username, email, full_name, is_active, is_system \
             FROM persons WHERE is_system = 1 ORDER BY id",
        )
        .context("prepare list_system_persons")?;
    let rows = stmt
        .query_map([], row_to_person)
        .context("execute list_system_persons")?;

    let mut people = Vec::new();
    for row in rows {
        people.push(row.context("read system person row")?);
    }
    Ok(people)
}

/// List a project's memberships, including pending invitations.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_memberships(conn: &Connection, project_id: i64) -> Result<Vec<Membership>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, project_id, person_id, role_id, email \
             FROM memberships WHERE project_id = ?1 ORDER BY id",
        )
        .context("prepare list_memberships")?;
    let rows = stmt
        .query_map(params![project_id], |row| {
            Ok(Membership {
                id: row.get(0)?,
                project_id: row.get(1)?,
                person_id: row.get(2)?,
                role_id: row.get(3)?,
                email: row.get(4)?,
            })
        })
        .context("execute list_memberships")?;

    let mut memberships = Vec::new();
    for row in rows {
        memberships.push(row.context("read membership row")?);
    }
    Ok(memberships)
}

/// True when the person holds a membership in the project.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn is_member(conn: &Connection, project_id: i64, person_id: i64) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM memberships WHERE project_id = ?1 AND person_id = ?2)",
        params![project_id, person_id],
        |row| row.get(0),
    )
    .context("check is_member")
}

// ---------------------------------------------------------------------------
// Statuses, roles, points
// ---------------------------------------------------------------------------

/// List a project's story statuses in declared order.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_story_statuses(conn: &Connection, project_id: i64) -> Result<Vec<Status>> {
    list_statuses(conn, "story_statuses", project_id)
}

/// List a project's task statuses in declared order.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_task_statuses(conn: &Connection, project_id: i64) -> Result<Vec<Status>> {
    list_statuses(conn, "task_statuses", project_id)
}

/// Fetch one story status by id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_story_status(conn: &Connection, status_id: i64) -> Result<Option<Status>> {
    conn.query_row(
        "SELECT id, project_id, name, color, sort_order, is_closed \
         FROM story_statuses WHERE id = ?1",
        params![status_id],
        row_to_status,
    )
    .optional()
    .with_context(|| format!("get_story_status for {status_id}"))
}

/// Resolve a project's story status from an id or a name.
///
/// # Errors
///
/// Returns [`StoreError::StatusNotFound`] when nothing in the project
/// matches, or an error if the query fails.
pub fn resolve_story_status(conn: &Connection, project_id: i64, key: &str) -> Result<Status> {
    resolve_status(conn, "story_statuses", project_id, key)
}

/// Resolve a project's task status from an id or a name.
///
/// # Errors
///
/// Returns [`StoreError::StatusNotFound`] when nothing in the project
/// matches, or an error if the query fails.
pub fn resolve_task_status(conn: &Connection, project_id: i64, key: &str) -> Result<Status> {
    resolve_status(conn, "task_statuses", project_id, key)
}

/// The status new stories start in: the lowest declared order.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn default_story_status(conn: &Connection, project_id: i64) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM story_statuses WHERE project_id = ?1 \
         ORDER BY sort_order ASC, id ASC LIMIT 1",
        params![project_id],
        |row| row.get(0),
    )
    .optional()
    .context("read default story status")
}

/// List a project's roles ordered by name.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_roles(conn: &Connection, project_id: i64, computable_only: bool) -> Result<Vec<Role>> {
    let sql = if computable_only {
        "SELECT id, project_id, name, slug, computable, sort_order FROM roles \
         WHERE project_id = ?1 AND computable = 1 ORDER BY name, id"
    } else {
        "SELECT id, project_id, name, slug, computable, sort_order FROM roles \
         WHERE project_id = ?1 ORDER BY name, id"
    };

    let mut stmt = conn.prepare(sql).context("prepare list_roles")?;
    let rows = stmt
        .query_map(params![project_id], |row| {
            Ok(Role {
                id: row.get(0)?,
                project_id: row.get(1)?,
                name: row.get(2)?,
                slug: row.get(3)?,
                computable: row.get(4)?,
                order: row.get(5)?,
            })
        })
        .context("execute list_roles")?;

    let mut roles = Vec::new();
    for row in rows {
        roles.push(row.context("read role row")?);
    }
    Ok(roles)
}

/// Resolve a project's role by slug.
///
/// # Errors
///
/// Returns [`StoreError::RoleNotFound`] when the slug is unknown, or an
/// error if the query fails.
pub fn resolve_role(conn: &Connection, project_id: i64, slug: &str) -> Result<Role> {
    list_roles(conn, project_id, false)?
        .into_iter()
        .find(|role| role.slug == slug)
        .ok_or_else(|| StoreError::RoleNotFound(slug.to_string()).into())
}

/// List a project's points values in declared order.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_points(conn: &Connection, project_id: i64) -> Result<Vec<Points>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, project_id, name, value, sort_order FROM points \
             WHERE project_id = ?1 ORDER BY sort_order, id",
        )
        .context("prepare list_points")?;
    let rows = stmt
        .query_map(params![project_id], |row| {
            Ok(Points {
                id: row.get(0)?,
                project_id: row.get(1)?,
                name: row.get(2)?,
                value: row.get(3)?,
                order: row.get(4)?,
            })
        })
        .context("execute list_points")?;

    let mut points = Vec::new();
    for row in rows {
        points.push(row.context("read points row")?);
    }
    Ok(points)
}

/// Points value assigned per role on one story: `(role_id, value)`.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn story_role_points(conn: &Connection, story_id: i64) -> Result<Vec<(i64, Option<f64>)>> {
    let mut stmt = conn
        .prepare(
            "SELECT rp.role_id, p.value FROM role_points rp \
             INNER JOIN points p ON p.id = rp.points_id \
             WHERE rp.story_id = ?1 ORDER BY rp.role_id",
        )
        .context("prepare story_role_points")?;
    let rows = stmt
        .query_map(params![story_id], |row| Ok((row.get(0)?, row.get(1)?)))
        .context("execute story_role_points")?;

    let mut points = Vec::new();
    for row in rows {
        points.push(row.context("read role points row")?);
    }
    Ok(points)
}

// ---------------------------------------------------------------------------
// Stories
// ---------------------------------------------------------------------------

/// Fetch a single story by id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_story(conn: &Connection, story_id: i64) -> Result<Option<UserStory>> {
    let sql = format!("SELECT {STORY_COLUMNS} FROM user_stories s WHERE s.id = ?1");
    conn.query_row(&sql, params![story_id], row_to_story)
        .optional()
        .with_context(|| format!("get_story for {story_id}"))
}

/// Fetch a story or fail with [`StoreError::StoryNotFound`].
///
/// # Errors
///
/// Returns an error if the story is missing or the query fails.
pub fn require_story(conn: &Connection, story_id: i64) -> Result<UserStory> {
    get_story(conn, story_id)?.ok_or_else(|| StoreError::StoryNotFound(story_id).into())
}

/// List a project's stories matching `filter`.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_stories(
    conn: &Connection,
    project_id: i64,
    filter: &StoryFilter,
    sort: StorySort,
) -> Result<Vec<UserStory>> {
    let predicate = filter.to_predicate();
    let sql = format!(
        "SELECT {STORY_COLUMNS} FROM user_stories s \
         WHERE s.project_id = ? AND ({}) {}",
        predicate.clause(),
        sort.sql_clause()
    );

    let mut values = vec![Value::Integer(project_id)];
    values.extend_from_slice(predicate.params());

    let mut stmt = conn
        .prepare(&sql)
        .with_context(|| format!("prepare list_stories query: {sql}"))?;
    let rows = stmt
        .query_map(params_from_iter(values.iter()), row_to_story)
        .context("execute list_stories query")?;

    let mut stories = Vec::new();
    for row in rows {
        stories.push(row.context("read list_stories row")?);
    }
    Ok(stories)
}

/// Count a project's stories matching `filter`.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn count_stories(conn: &Connection, project_id: i64, filter: &StoryFilter) -> Result<u64> {
    let predicate = filter.to_predicate();
    let sql = format!(
        "SELECT COUNT(*) FROM user_stories s WHERE s.project_id = ? AND ({})",
        predicate.clause()
    );

    let mut values = vec![Value::Integer(project_id)];
    values.extend_from_slice(predicate.params());

    let count: i64 = conn
        .query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))
        .with_context(|| format!("execute count_stories: {sql}"))?;

    Ok(u64::try_from(count).unwrap_or(0))
}

/// Tags of one story, sorted.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_story_tags(conn: &Connection, story_id: i64) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT tag FROM story_tags WHERE story_id = ?1 ORDER BY tag")
        .context("prepare get_story_tags")?;
    let rows = stmt
        .query_map(params![story_id], |row| row.get(0))
        .context("execute get_story_tags")?;

    let mut tags = Vec::new();
    for row in rows {
        tags.push(row.context("read tag row")?);
    }
    Ok(tags)
}

/// Tasks attached to one story, by ref.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_story_tasks(conn: &Connection, story_id: i64) -> Result<Vec<Task>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, project_id, story_id, ref, subject, status_id, owner_id, \
             assigned_to_id, created_at_us, modified_at_us, finished_at_us \
             FROM tasks WHERE story_id = ?1 ORDER BY ref, id",
        )
        .context("prepare list_story_tasks")?;
    let rows = stmt
        .query_map(params![story_id], row_to_task)
        .context("execute list_story_tasks")?;

    let mut tasks = Vec::new();
    for row in rows {
        tasks.push(row.context("read task row")?);
    }
    Ok(tasks)
}

/// Fetch a single task by id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_task(conn: &Connection, task_id: i64) -> Result<Option<Task>> {
    conn.query_row(
        "SELECT id, project_id, story_id, ref, subject, status_id, owner_id, \
         assigned_to_id, created_at_us, modified_at_us, finished_at_us \
         FROM tasks WHERE id = ?1",
        params![task_id],
        row_to_task,
    )
    .optional()
    .with_context(|| format!("get_task for {task_id}"))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn list_statuses(conn: &Connection, table: &'static str, project_id: i64) -> Result<Vec<Status>> {
    let sql = format!(
        "SELECT id, project_id, name, color, sort_order, is_closed FROM {table} \
         WHERE project_id = ?1 ORDER BY sort_order, id"
    );
    let mut stmt = conn
        .prepare(&sql)
        .with_context(|| format!("prepare list {table}"))?;
    let rows = stmt
        .query_map(params![project_id], row_to_status)
        .with_context(|| format!("execute list {table}"))?;

    let mut statuses = Vec::new();
    for row in rows {
        statuses.push(row.context("read status row")?);
    }
    Ok(statuses)
}

fn resolve_status(
    conn: &Connection,
    table: &'static str,
    project_id: i64,
    key: &str,
) -> Result<Status> {
    let key = key.trim();
    let wanted_id = key.parse::<i64>().ok();
    list_statuses(conn, table, project_id)?
        .into_iter()
        .find(|status| Some(status.id) == wanted_id || status.name == key)
        .ok_or_else(|| StoreError::StatusNotFound(key.to_string()).into())
}

fn row_to_project(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        created_at_us: row.get(3)?,
    })
}

fn row_to_person(row: &rusqlite::Row<'_>) -> rusqlite::Result<Person> {
    Ok(Person {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        full_name: row.get(3)?,
        is_active: row.get(4)?,
        is_system: row.get(5)?,
    })
}

fn row_to_status(row: &rusqlite::Row<'_>) -> rusqlite::Result<Status> {
    Ok(Status {
        id: row.get(0)?,
        project_id: row.get(1)?,
        name: row.get(2)?,
        color: row.get(3)?,
        order: row.get(4)?,
        is_closed: row.get(5)?,
    })
}

fn row_to_story(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserStory> {
    Ok(UserStory {
        id: row.get(0)?,
        project_id: row.get(1)?,
        reference: row.get(2)?,
        subject: row.get(3)?,
        description: row.get(4)?,
        status_id: row.get(5)?,
        owner_id: row.get(6)?,
        assigned_to_id: row.get(7)?,
        milestone: row.get(8)?,
        is_closed: row.get(9)?,
        backlog_order: row.get(10)?,
        sprint_order: row.get(11)?,
        kanban_order: row.get(12)?,
        client_requirement: row.get(13)?,
        team_requirement: row.get(14)?,
        external_reference: row.get(15)?,
        created_at_us: row.get(16)?,
        modified_at_us: row.get(17)?,
        finish_at_us: row.get(18)?,
    })
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        project_id: row.get(1)?,
        story_id: row.get(2)?,
        reference: row.get(3)?,
        subject: row.get(4)?,
        status_id: row.get(5)?,
        owner_id: row.get(6)?,
        assigned_to_id: row.get(7)?,
        created_at_us: row.get(8)?,
        modified_at_us: row.get(9)?,
        finished_at_us: row.get(10)?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
