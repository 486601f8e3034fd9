//! Mutation helpers for the story store.
//!
//! Each function performs one logical write. Multi-row writes (a story and
//! its tags) are not wrapped in their own transaction: callers pass a
//! [`rusqlite::Transaction`] (which derefs to `Connection`) when several
//! writes must land together.

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, params};

use super::query;
use crate::error::StoreError;
use crate::model::project::{Membership, Person, Points, Project, Role, Status};
use crate::model::story::{NewStory, NewTask, Task, UserStory};

/// Current wall-clock time in microseconds since the Unix epoch.
#[must_use]
pub fn now_us() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

// ---------------------------------------------------------------------------
// Projects and people
// ---------------------------------------------------------------------------

/// Create a project.
///
/// # Errors
///
/// Returns an error if the slug is taken or the insert fails.
pub fn create_project(conn: &Connection, name: &str, slug: &str) -> Result<Project> {
    let created_at_us = now_us();
    conn.execute(
        "INSERT INTO projects (name, slug, created_at_us) VALUES (?1, ?2, ?3)",
        params![name.trim(), slug.trim(), created_at_us],
    )
    .with_context(|| format!("insert project '{slug}'"))?;

    Ok(Project {
        id: conn.last_insert_rowid(),
        name: name.trim().to_string(),
        slug: slug.trim().to_string(),
        created_at_us,
    })
}

/// Register a person. System accounts are created inactive.
///
/// # Errors
///
/// Returns an error if the username is taken or the insert fails.
pub fn add_person(
    conn: &Connection,
    username: &str,
    full_name: &str,
    email: &str,
    is_system: bool,
) -> Result<Person> {
    let is_active = !is_system;
    conn.execute(
        "INSERT INTO persons (username, email, full_name, is_active, is_system, created_at_us) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![username.trim(), email, full_name, is_active, is_system, now_us()],
    )
    .with_context(|| format!("insert person '{username}'"))?;

    Ok(Person {
        id: conn.last_insert_rowid(),
        username: username.trim().to_string(),
        email: email.to_string(),
        full_name: full_name.to_string(),
        is_active,
        is_system,
    })
}

/// Add a role to a project.
///
/// # Errors
///
/// Returns an error if the slug is taken in the project or the insert fails.
pub fn add_role(
    conn: &Connection,
    project_id: i64,
    name: &str,
    slug: &str,
    computable: bool,
    order: i64,
) -> Result<Role> {
    conn.execute(
        "INSERT INTO roles (project_id, name, slug, computable, sort_order) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![project_id, name, slug, computable, order],
    )
    .with_context(|| format!("insert role '{slug}'"))?;

    Ok(Role {
        id: conn.last_insert_rowid(),
        project_id,
        name: name.to_string(),
        slug: slug.to_string(),
        computable,
        order,
    })
}

/// Add a membership. A `None` person records a pending invitation.
///
/// # Errors
///
/// Returns an error if the person is already a member or the insert fails.
pub fn add_membership(
    conn: &Connection,
    project_id: i64,
    person_id: Option<i64>,
    role_id: Option<i64>,
    email: &str,
) -> Result<Membership> {
    conn.execute(
        "INSERT INTO memberships (project_id, person_id, role_id, email, created_at_us) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![project_id, person_id, role_id, email, now_us()],
    )
    .with_context(|| format!("insert membership in project {project_id}"))?;

    Ok(Membership {
        id: conn.last_insert_rowid(),
        project_id,
        person_id,
        role_id,
        email: email.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Statuses and points
// ---------------------------------------------------------------------------

/// Add a story status.
///
/// # Errors
///
/// Returns an error if the name is taken in the project or the insert fails.
pub fn add_story_status(
    conn: &Connection,
    project_id: i64,
    name: &str,
    color: &str,
    order: i64,
    is_closed: bool,
) -> Result<Status> {
    insert_status(conn, "story_statuses", project_id, name, color, order, is_closed)
}

/// Add a task status.
///
/// # Errors
///
/// Returns an error if the name is taken in the project or the insert fails.
pub fn add_task_status(
    conn: &Connection,
    project_id: i64,
    name: &str,
    color: &str,
    order: i64,
    is_closed: bool,
) -> Result<Status> {
    insert_status(conn, "task_statuses", project_id, name, color, order, is_closed)
}

fn insert_status(
    conn: &Connection,
    table: &'static str,
    project_id: i64,
    name: &str,
    color: &str,
    order: i64,
    is_closed: bool,
) -> Result<Status> {
    let sql = format!(
        "INSERT INTO {table} (project_id, name, color, sort_order, is_closed) \
         VALUES (?1, ?2, ?3, ?4, ?5)"
    );
    conn.execute(&sql, params![project_id, name, color, order, is_closed])
        .with_context(|| format!("insert into {table} '{name}'"))?;

    Ok(Status {
        id: conn.last_insert_rowid(),
        project_id,
        name: name.to_string(),
        color: color.to_string(),
        order,
        is_closed,
    })
}

/// Add an estimation value.
///
/// # Errors
///
/// Returns an error if the name is taken in the project or the insert fails.
pub fn add_points(
    conn: &Connection,
    project_id: i64,
    name: &str,
    value: Option<f64>,
    order: i64,
) -> Result<Points> {
    conn.execute(
        "INSERT INTO points (project_id, name, value, sort_order) VALUES (?1, ?2, ?3, ?4)",
        params![project_id, name, value, order],
    )
    .with_context(|| format!("insert points '{name}'"))?;

    Ok(Points {
        id: conn.last_insert_rowid(),
        project_id,
        name: name.to_string(),
        value,
        order,
    })
}

// ---------------------------------------------------------------------------
// Stories
// ---------------------------------------------------------------------------

/// Create a story with the next free ref in its project.
///
/// A missing status defaults to the project's first status. The board
/// orders start at the ref so new stories land at the end. The closed flag
/// follows the status, since a new story has no tasks.
///
/// # Errors
///
/// Returns an error if the subject is blank, the status belongs to another
/// project, or an insert fails.
pub fn create_story(conn: &Connection, project_id: i64, new: &NewStory) -> Result<UserStory> {
    let subject = new.subject.trim();
    if subject.is_empty() {
        bail!("story subject must not be empty");
    }

    let status_id = match new.status_id {
        Some(id) => Some(require_story_status(conn, project_id, id)?.id),
        None => query::default_story_status(conn, project_id)?,
    };
    let is_closed = match status_id {
        Some(id) => query::get_story_status(conn, id)?.is_some_and(|status| status.is_closed),
        None => false,
    };

    let reference = next_ref(conn, "user_stories", project_id)?;
    let now = now_us();
    let finish_at_us = is_closed.then_some(now);

    conn.execute(
        "INSERT INTO user_stories (
            project_id, ref, subject, description, status_id, owner_id,
            assigned_to_id, milestone, is_closed, backlog_order, sprint_order,
            kanban_order, client_requirement, team_requirement,
            external_reference, created_at_us, modified_at_us, finish_at_us
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10, ?10, ?11, ?12, ?13, ?14, ?14, ?15)",
        params![
            project_id,
            reference,
            subject,
            new.description,
            status_id,
            new.owner_id,
            new.assigned_to_id,
            new.milestone,
            is_closed,
            reference,
            new.client_requirement,
            new.team_requirement,
            new.external_reference,
            now,
            finish_at_us,
        ],
    )
    .with_context(|| format!("insert story '{subject}'"))?;

    let story_id = conn.last_insert_rowid();
    insert_tags(conn, story_id, &new.tags)?;

    tracing::debug!(project_id, story_id, reference, "created story");
    query::require_story(conn, story_id)
}

/// Replace the tag set of a story.
///
/// # Errors
///
/// Returns an error if the story is missing or a write fails.
pub fn set_story_tags(conn: &Connection, story_id: i64, tags: &[String]) -> Result<()> {
    touch_story(conn, story_id)?;
    conn.execute("DELETE FROM story_tags WHERE story_id = ?1", params![story_id])
        .with_context(|| format!("clear tags of story {story_id}"))?;
    insert_tags(conn, story_id, tags)
}

/// Set or clear a story's assignee.
///
/// # Errors
///
/// Returns [`StoreError::StoryNotFound`] if the story is missing, or an
/// error if the update fails.
pub fn assign_story(conn: &Connection, story_id: i64, person_id: Option<i64>) -> Result<()> {
    let changed = conn
        .execute(
            "UPDATE user_stories SET assigned_to_id = ?1, modified_at_us = ?2 WHERE id = ?3",
            params![person_id, now_us(), story_id],
        )
        .with_context(|| format!("assign story {story_id}"))?;
    ensure_changed(changed, story_id)
}

/// Set or clear a story's status column. Closed state is not recomputed.
///
/// # Errors
///
/// Returns [`StoreError::StoryNotFound`] if the story is missing, or an
/// error if the update fails.
pub fn set_story_status(conn: &Connection, story_id: i64, status_id: Option<i64>) -> Result<()> {
    let changed = conn
        .execute(
            "UPDATE user_stories SET status_id = ?1, modified_at_us = ?2 WHERE id = ?3",
            params![status_id, now_us(), story_id],
        )
        .with_context(|| format!("set status of story {story_id}"))?;
    ensure_changed(changed, story_id)
}

/// Persist the closed flag and finish time of a story.
///
/// # Errors
///
/// Returns [`StoreError::StoryNotFound`] if the story is missing, or an
/// error if the update fails.
pub fn set_story_closed(
    conn: &Connection,
    story_id: i64,
    is_closed: bool,
    finish_at_us: Option<i64>,
) -> Result<()> {
    let changed = conn
        .execute(
            "UPDATE user_stories SET is_closed = ?1, finish_at_us = ?2, modified_at_us = ?3 \
             WHERE id = ?4",
            params![is_closed, finish_at_us, now_us(), story_id],
        )
        .with_context(|| format!("set closed state of story {story_id}"))?;
    ensure_changed(changed, story_id)
}

/// Assign a points value for one role on a story, replacing any previous one.
///
/// # Errors
///
/// Returns an error if the upsert fails.
pub fn set_role_points(conn: &Connection, story_id: i64, role_id: i64, points_id: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO role_points (story_id, role_id, points_id) VALUES (?1, ?2, ?3) \
         ON CONFLICT (story_id, role_id) DO UPDATE SET points_id = excluded.points_id",
        params![story_id, role_id, points_id],
    )
    .with_context(|| format!("set role points on story {story_id}"))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Create a task with the next free task ref in its project.
///
/// # Errors
///
/// Returns an error if the subject is blank or the insert fails.
pub fn create_task(conn: &Connection, project_id: i64, new: &NewTask) -> Result<Task> {
    let subject = new.subject.trim();
    if subject.is_empty() {
        bail!("task subject must not be empty");
    }

    let reference = next_ref(conn, "tasks", project_id)?;
    let now = now_us();
    conn.execute(
        "INSERT INTO tasks (
            project_id, story_id, ref, subject, status_id, owner_id,
            assigned_to_id, created_at_us, modified_at_us
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            project_id,
            new.story_id,
            reference,
            subject,
            new.status_id,
            new.owner_id,
            new.assigned_to_id,
            now,
        ],
    )
    .with_context(|| format!("insert task '{subject}'"))?;

    let task_id = conn.last_insert_rowid();
    query::get_task(conn, task_id)?.with_context(|| format!("task {task_id} vanished after insert"))
}

/// Set or clear a task's status.
///
/// # Errors
///
/// Returns an error if the task is missing or the update fails.
pub fn set_task_status(conn: &Connection, task_id: i64, status_id: Option<i64>) -> Result<()> {
    let changed = conn
        .execute(
            "UPDATE tasks SET status_id = ?1, modified_at_us = ?2 WHERE id = ?3",
            params![status_id, now_us(), task_id],
        )
        .with_context(|| format!("set status of task {task_id}"))?;
    if changed == 0 {
        bail!("task {task_id} not found");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn next_ref(conn: &Connection, table: &'static str, project_id: i64) -> Result<i64> {
    let sql = format!("SELECT COALESCE(MAX(ref), 0) + 1 FROM {table} WHERE project_id = ?1");
    conn.query_row(&sql, params![project_id], |row| row.get(0))
        .with_context(|| format!("allocate next ref in {table}"))
}

fn require_story_status(conn: &Connection, project_id: i64, status_id: i64) -> Result<Status> {
    query::get_story_status(conn, status_id)?
        .filter(|status| status.project_id == project_id)
        .ok_or_else(|| StoreError::StatusNotFound(status_id.to_string()).into())
}

fn insert_tags(conn: &Connection, story_id: i64, tags: &[String]) -> Result<()> {
    let mut stmt = conn
        .prepare("INSERT OR IGNORE INTO story_tags (story_id, tag) VALUES (?1, ?2)")
        .context("prepare tag insert")?;
    for tag in tags.iter().map(|tag| tag.trim()).filter(|tag| !tag.is_empty()) {
        stmt.execute(params![story_id, tag])
            .with_context(|| format!("tag story {story_id} with '{tag}'"))?;
    }
    Ok(())
}

fn touch_story(conn: &Connection, story_id: i64) -> Result<()> {
    let changed = conn
        .execute(
            "UPDATE user_stories SET modified_at_us = ?1 WHERE id = ?2",
            params![now_us(), story_id],
        )
        .with_context(|| format!("touch story {story_id}"))?;
    ensure_changed(changed, story_id)
}

fn ensure_changed(changed: usize, story_id: i64) -> Result<()> {
    if changed == 0 {
        return Err(StoreError::StoryNotFound(story_id).into());
    }
    Ok(())
}
