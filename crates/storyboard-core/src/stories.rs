//! Story services: bulk creation, board reordering and closed-state upkeep.
//!
//! Multi-story writes run in one transaction each and either land fully or
//! not at all.

use anyhow::{Context, Result};
use rusqlite::{Connection, params};

use crate::db::{query, write};
use crate::error::StoreError;
use crate::model::story::{NewStory, NewTask, OrderField, Task, UserStory};

/// Split bulk text into story subjects: one per non-blank line, trimmed.
#[must_use]
pub fn stories_from_bulk(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Create one story per non-blank line of `text`.
///
/// Stories get the project's default status and are returned in input
/// order.
///
/// # Errors
///
/// Returns [`StoreError::EmptyBulkInput`] when no line carries a subject,
/// or an error if any insert fails (nothing is written in that case).
pub fn create_stories_in_bulk(
    conn: &mut Connection,
    project_id: i64,
    text: &str,
    owner_id: Option<i64>,
) -> Result<Vec<UserStory>> {
    let subjects = stories_from_bulk(text);
    if subjects.is_empty() {
        return Err(StoreError::EmptyBulkInput.into());
    }

    let tx = conn.transaction().context("begin bulk create")?;
    let mut created = Vec::with_capacity(subjects.len());
    for subject in subjects {
        let new = NewStory {
            owner_id,
            ..NewStory::with_subject(subject)
        };
        created.push(write::create_story(&tx, project_id, &new)?);
    }
    tx.commit().context("commit bulk create")?;

    tracing::info!(project_id, stories = created.len(), "bulk created stories");
    Ok(created)
}

/// Set one board order for many stories of a project.
///
/// `updates` holds `(story_id, order)` pairs. Returns the number of stories
/// updated.
///
/// # Errors
///
/// Returns [`StoreError::StoryNotFound`] for an unknown id or
/// [`StoreError::ForeignStory`] for a story of another project; nothing is
/// written in either case.
pub fn update_orders_in_bulk(
    conn: &mut Connection,
    project_id: i64,
    field: OrderField,
    updates: &[(i64, i64)],
) -> Result<usize> {
    let tx = conn.transaction().context("begin bulk order update")?;
    let sql = format!(
        "UPDATE user_stories SET {} = ?1 WHERE id = ?2 AND project_id = ?3",
        field.column()
    );

    {
        let mut stmt = tx.prepare(&sql).context("prepare order update")?;
        for &(story_id, order) in updates {
            let changed = stmt
                .execute(params![order, story_id, project_id])
                .with_context(|| format!("update {field} order of story {story_id}"))?;
            if changed == 0 {
                query::require_story(&tx, story_id)?;
                return Err(StoreError::ForeignStory {
                    story_id,
                    project_id,
                }
                .into());
            }
        }
    }

    tx.commit().context("commit bulk order update")?;
    tracing::info!(project_id, %field, stories = updates.len(), "updated story orders");
    Ok(updates.len())
}

/// Whether a story should be closed given its status and tasks.
///
/// A story without status is open. Without tasks it follows its status.
/// With tasks it is closed only when every task sits in a closed task
/// status; tasks without a status count as open.
///
/// # Errors
///
/// Returns an error if a query fails.
pub fn calculate_is_closed(conn: &Connection, story: &UserStory) -> Result<bool> {
    let Some(status_id) = story.status_id else {
        return Ok(false);
    };

    let (total, closed): (i64, i64) = conn
        .query_row(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN ts.is_closed = 1 THEN 1 ELSE 0 END), 0)
             FROM tasks t
             LEFT JOIN task_statuses ts ON ts.id = t.status_id
             WHERE t.story_id = ?1",
            params![story.id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .with_context(|| format!("count tasks of story {}", story.id))?;

    if total == 0 {
        return Ok(query::get_story_status(conn, status_id)?.is_some_and(|s| s.is_closed));
    }
    Ok(closed == total)
}

/// Mark a story closed and stamp its finish time. Already closed stories
/// are left untouched.
///
/// # Errors
///
/// Returns [`StoreError::StoryNotFound`] if the story is missing, or an
/// error if the update fails.
pub fn close_story(conn: &Connection, story_id: i64) -> Result<UserStory> {
    let story = query::require_story(conn, story_id)?;
    if story.is_closed {
        return Ok(story);
    }
    write::set_story_closed(conn, story_id, true, Some(write::now_us()))?;
    tracing::debug!(story_id, "closed story");
    query::require_story(conn, story_id)
}

/// Mark a story open and clear its finish time. Already open stories are
/// left untouched.
///
/// # Errors
///
/// Returns [`StoreError::StoryNotFound`] if the story is missing, or an
/// error if the update fails.
pub fn open_story(conn: &Connection, story_id: i64) -> Result<UserStory> {
    let story = query::require_story(conn, story_id)?;
    if !story.is_closed {
        return Ok(story);
    }
    write::set_story_closed(conn, story_id, false, None)?;
    tracing::debug!(story_id, "reopened story");
    query::require_story(conn, story_id)
}

/// Recompute the closed flag of a story and persist it when it changed.
///
/// # Errors
///
/// Returns [`StoreError::StoryNotFound`] if the story is missing, or an
/// error if a query fails.
pub fn refresh_closed_state(conn: &Connection, story_id: i64) -> Result<UserStory> {
    let story = query::require_story(conn, story_id)?;
    if calculate_is_closed(conn, &story)? {
        close_story(conn, story_id)
    } else {
        open_story(conn, story_id)
    }
}

/// Move a story to another status of its project and refresh its closed
/// flag.
///
/// # Errors
///
/// Returns [`StoreError::StatusNotFound`] if the status belongs to another
/// project, or an error if a write fails.
pub fn change_story_status(conn: &mut Connection, story_id: i64, status_id: i64) -> Result<UserStory> {
    let tx = conn.transaction().context("begin status change")?;
    let story = query::require_story(&tx, story_id)?;
    let status = query::get_story_status(&tx, status_id)?
        .filter(|status| status.project_id == story.project_id)
        .ok_or_else(|| StoreError::StatusNotFound(status_id.to_string()))?;

    write::set_story_status(&tx, story_id, Some(status.id))?;
    let story = refresh_closed_state(&tx, story_id)?;
    tx.commit().context("commit status change")?;
    Ok(story)
}

/// Create a task and refresh the closed flag of its story.
///
/// # Errors
///
/// Returns an error if the task's story is missing or a write fails.
pub fn add_task(conn: &mut Connection, project_id: i64, new: &NewTask) -> Result<Task> {
    let tx = conn.transaction().context("begin task create")?;
    if let Some(story_id) = new.story_id {
        let story = query::require_story(&tx, story_id)?;
        if story.project_id != project_id {
            return Err(StoreError::ForeignStory {
                story_id,
                project_id,
            }
            .into());
        }
    }

    let task = write::create_task(&tx, project_id, new)?;
    if let Some(story_id) = task.story_id {
        refresh_closed_state(&tx, story_id)?;
    }
    tx.commit().context("commit task create")?;
    Ok(task)
}

/// Change a task's status and refresh the closed flag of its story.
///
/// # Errors
///
/// Returns an error if the task is missing or a write fails.
pub fn change_task_status(conn: &mut Connection, task_id: i64, status_id: Option<i64>) -> Result<Task> {
    let tx = conn.transaction().context("begin task status change")?;
    write::set_task_status(&tx, task_id, status_id)?;
    let task = query::get_task(&tx, task_id)?
        .with_context(|| format!("task {task_id} vanished after update"))?;
    if let Some(story_id) = task.story_id {
        refresh_closed_state(&tx, story_id)?;
    }
    tx.commit().context("commit task status change")?;
    Ok(task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::error::ErrorCode;

    struct Setup {
        conn: Connection,
        project: i64,
        open: i64,
        closed: i64,
        task_open: i64,
        task_closed: i64,
    }

    fn setup() -> Setup {
        let conn = open_in_memory().unwrap();
        let project = write::create_project(&conn, "Web", "web").unwrap().id;
        let open = write::add_story_status(&conn, project, "New", "#aaa", 1, false)
            .unwrap()
            .id;
        let closed = write::add_story_status(&conn, project, "Done", "#0f0", 2, true)
            .unwrap()
            .id;
        let task_open = write::add_task_status(&conn, project, "Doing", "#aaa", 1, false)
            .unwrap()
            .id;
        let task_closed = write::add_task_status(&conn, project, "Finished", "#0f0", 2, true)
            .unwrap()
            .id;
        Setup {
            conn,
            project,
            open,
            closed,
            task_open,
            task_closed,
        }
    }

    fn story(s: &Setup, status: Option<i64>) -> UserStory {
        let new = NewStory {
            status_id: status,
            ..NewStory::with_subject("story")
        };
        write::create_story(&s.conn, s.project, &new).unwrap()
    }

    fn task(s: &mut Setup, story_id: i64, status: Option<i64>) -> Task {
        let project = s.project;
        add_task(
            &mut s.conn,
            project,
            &NewTask {
                subject: "task".to_string(),
                story_id: Some(story_id),
                status_id: status,
                ..NewTask::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn bulk_text_drops_blank_lines_and_trims() {
        assert_eq!(
            stories_from_bulk("  First  \n\n\t\nSecond\r\n   third"),
            ["First", "Second", "third"]
        );
        assert!(stories_from_bulk(" \n \n").is_empty());
    }

    #[test]
    fn bulk_create_keeps_input_order_and_default_status() {
        let mut s = setup();
        let project = s.project;
        let created = create_stories_in_bulk(&mut s.conn, project, "one\n\ntwo\nthree", None).unwrap();

        let subjects: Vec<&str> = created.iter().map(|st| st.subject.as_str()).collect();
        assert_eq!(subjects, ["one", "two", "three"]);
        assert!(created.iter().all(|st| st.status_id == Some(s.open)));
        let refs: Vec<i64> = created.iter().map(|st| st.reference).collect();
        assert_eq!(refs, [1, 2, 3]);
    }

    #[test]
    fn bulk_create_rejects_empty_input() {
        let mut s = setup();
        let project = s.project;
        let err = create_stories_in_bulk(&mut s.conn, project, "\n  \n", None).unwrap_err();
        let store = err.downcast_ref::<StoreError>().expect("typed error");
        assert_eq!(store.code(), ErrorCode::EmptyBulkInput);
    }

    #[test]
    fn order_update_is_atomic() {
        let mut s = setup();
        let a = story(&s, None);
        let b = story(&s, None);
        let other = write::create_project(&s.conn, "Other", "other").unwrap().id;
        let foreign = write::create_story(&s.conn, other, &NewStory::with_subject("x")).unwrap();

        let project = s.project;
        let err = update_orders_in_bulk(
            &mut s.conn,
            project,
            OrderField::Kanban,
            &[(a.id, 10), (foreign.id, 20), (b.id, 30)],
        )
        .unwrap_err();
        let store = err.downcast_ref::<StoreError>().expect("typed error");
        assert_eq!(store.code(), ErrorCode::ForeignStory);
        assert_eq!(
            query::require_story(&s.conn, a.id).unwrap().kanban_order,
            a.kanban_order
        );

        let err = update_orders_in_bulk(&mut s.conn, project, OrderField::Kanban, &[(9999, 1)])
            .unwrap_err();
        let store = err.downcast_ref::<StoreError>().expect("typed error");
        assert_eq!(store.code(), ErrorCode::StoryNotFound);
    }

    #[test]
    fn order_update_touches_only_the_chosen_field() {
        let mut s = setup();
        let a = story(&s, None);
        let project = s.project;
        let n = update_orders_in_bulk(&mut s.conn, project, OrderField::Sprint, &[(a.id, 42)]).unwrap();
        assert_eq!(n, 1);

        let after = query::require_story(&s.conn, a.id).unwrap();
        assert_eq!(after.sprint_order, 42);
        assert_eq!(after.backlog_order, a.backlog_order);
        assert_eq!(after.kanban_order, a.kanban_order);
    }

    #[test]
    fn story_without_status_is_open() {
        let s = setup();
        let mut st = story(&s, Some(s.closed));
        st.status_id = None;
        assert!(!calculate_is_closed(&s.conn, &st).unwrap());
    }

    #[test]
    fn story_without_tasks_follows_status() {
        let s = setup();
        let open = story(&s, Some(s.open));
        let done = story(&s, Some(s.closed));
        assert!(!calculate_is_closed(&s.conn, &open).unwrap());
        assert!(calculate_is_closed(&s.conn, &done).unwrap());
    }

    #[test]
    fn tasks_decide_when_present() {
        let mut s = setup();
        let st = story(&s, Some(s.open));
        let (task_open, task_closed) = (s.task_open, s.task_closed);

        let first = task(&mut s, st.id, Some(task_closed));
        assert!(query::require_story(&s.conn, st.id).unwrap().is_closed);

        let second = task(&mut s, st.id, None);
        assert!(!query::require_story(&s.conn, st.id).unwrap().is_closed);

        change_task_status(&mut s.conn, second.id, Some(task_closed)).unwrap();
        let closed = query::require_story(&s.conn, st.id).unwrap();
        assert!(closed.is_closed);
        assert!(closed.finish_at_us.is_some());

        change_task_status(&mut s.conn, first.id, Some(task_open)).unwrap();
        let reopened = query::require_story(&s.conn, st.id).unwrap();
        assert!(!reopened.is_closed);
        assert!(reopened.finish_at_us.is_none());
    }

    #[test]
    fn close_and_open_are_idempotent() {
        let s = setup();
        let st = story(&s, Some(s.open));

        let closed = close_story(&s.conn, st.id).unwrap();
        let again = close_story(&s.conn, st.id).unwrap();
        assert!(closed.is_closed);
        assert_eq!(closed.finish_at_us, again.finish_at_us);

        let opened = open_story(&s.conn, st.id).unwrap();
        assert!(!opened.is_closed);
        assert!(opened.finish_at_us.is_none());
        assert_eq!(open_story(&s.conn, st.id).unwrap(), opened);
    }

    #[test]
    fn status_change_refreshes_closed_flag() {
        let mut s = setup();
        let st = story(&s, Some(s.open));
        let closed = s.closed;
        let after = change_story_status(&mut s.conn, st.id, closed).unwrap();
        assert!(after.is_closed);

        let other = write::create_project(&s.conn, "Other", "other").unwrap().id;
        let foreign = write::add_story_status(&s.conn, other, "New", "#fff", 1, false)
            .unwrap()
            .id;
        assert!(change_story_status(&mut s.conn, st.id, foreign).is_err());
    }

    #[test]
    fn missing_story_is_typed() {
        let s = setup();
        let err = refresh_closed_state(&s.conn, 404).unwrap_err();
        let store = err.downcast_ref::<StoreError>().expect("typed error");
        assert_eq!(store.code(), ErrorCode::StoryNotFound);
    }
}
