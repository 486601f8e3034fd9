//! CSV export of a project's stories.
//!
//! One header row, then one row per story matching the filter, by ref.
//! Estimation columns are dynamic: one `{role-slug}-points` column per
//! computable role of the project, ordered by role name.

use anyhow::{Context, Result};
use chrono::{SecondsFormat, TimeZone, Utc};
use rusqlite::Connection;
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Write;

use crate::db::query::{self, StorySort};
use crate::filter::StoryFilter;
use crate::model::project::{Person, Role};
use crate::model::story::UserStory;

const LEADING_COLUMNS: [&str; 10] = [
    "ref",
    "subject",
    "description",
    "milestone",
    "owner",
    "owner_full_name",
    "assigned_to",
    "assigned_to_full_name",
    "status",
    "is_closed",
];

const TRAILING_COLUMNS: [&str; 11] = [
    "backlog_order",
    "sprint_order",
    "kanban_order",
    "created_date",
    "modified_date",
    "finish_date",
    "client_requirement",
    "team_requirement",
    "external_reference",
    "tasks",
    "tags",
];

/// Column names for a project with the given computable roles.
#[must_use]
pub fn csv_header(roles: &[Role]) -> Vec<String> {
    let mut header: Vec<String> = LEADING_COLUMNS.iter().map(ToString::to_string).collect();
    header.extend(roles.iter().map(|role| format!("{}-points", role.slug)));
    header.push("total-points".to_string());
    header.extend(TRAILING_COLUMNS.iter().map(ToString::to_string));
    header
}

/// Write the stories of a project matching `filter` as CSV.
///
/// Returns the number of story rows written.
///
/// # Errors
///
/// Returns an error if a query fails or the writer rejects output.
pub fn write_stories_csv<W: Write>(
    conn: &Connection,
    project_id: i64,
    filter: &StoryFilter,
    delimiter: char,
    out: &mut W,
) -> Result<usize> {
    let roles = query::list_roles(conn, project_id, true)?;
    let statuses: HashMap<i64, String> = query::list_story_statuses(conn, project_id)?
        .into_iter()
        .map(|status| (status.id, status.name))
        .collect();
    let stories = query::list_stories(conn, project_id, filter, StorySort::Ref)?;

    write_record(out, delimiter, &csv_header(&roles))?;

    let mut people = PersonCache::default();
    for story in &stories {
        let row = story_row(conn, story, &roles, &statuses, &mut people)
            .with_context(|| format!("build export row for story #{}", story.reference))?;
        write_record(out, delimiter, &row)?;
    }
    out.flush().context("flush csv output")?;

    tracing::info!(project_id, rows = stories.len(), "exported stories to csv");
    Ok(stories.len())
}

fn story_row(
    conn: &Connection,
    story: &UserStory,
    roles: &[Role],
    statuses: &HashMap<i64, String>,
    people: &mut PersonCache,
) -> Result<Vec<String>> {
    let owner = people.get(conn, story.owner_id)?;
    let assignee = people.get(conn, story.assigned_to_id)?;

    let mut row = vec![
        story.reference.to_string(),
        story.subject.clone(),
        story.description.clone(),
        story.milestone.clone().unwrap_or_default(),
        owner.as_ref().map(|p| p.username.clone()).unwrap_or_default(),
        owner.map(|p| p.full_name).unwrap_or_default(),
        assignee.as_ref().map(|p| p.username.clone()).unwrap_or_default(),
        assignee.map(|p| p.full_name).unwrap_or_default(),
        story
            .status_id
            .and_then(|id| statuses.get(&id).cloned())
            .unwrap_or_default(),
        story.is_closed.to_string(),
    ];

    let points: HashMap<i64, Option<f64>> = query::story_role_points(conn, story.id)?
        .into_iter()
        .collect();
    for role in roles {
        row.push(match points.get(&role.id) {
            Some(Some(value)) => format_points(*value),
            Some(None) => String::new(),
            None => "0".to_string(),
        });
    }
    let total: f64 = points.values().flatten().sum();
    row.push(format_points(total));

    let tasks: Vec<String> = query::list_story_tasks(conn, story.id)?
        .iter()
        .map(|task| task.reference.to_string())
        .collect();
    let tags = query::get_story_tags(conn, story.id)?;

    row.extend([
        story.backlog_order.to_string(),
        story.sprint_order.to_string(),
        story.kanban_order.to_string(),
        format_timestamp(story.created_at_us),
        format_timestamp(story.modified_at_us),
        story.finish_at_us.map(format_timestamp).unwrap_or_default(),
        story.client_requirement.to_string(),
        story.team_requirement.to_string(),
        story.external_reference.clone().unwrap_or_default(),
        tasks.join(","),
        tags.join(","),
    ]);

    Ok(row)
}

#[derive(Default)]
struct PersonCache {
    people: HashMap<i64, Option<Person>>,
}

impl PersonCache {
    fn get(&mut self, conn: &Connection, id: Option<i64>) -> Result<Option<Person>> {
        let Some(id) = id else {
            return Ok(None);
        };
        if let Some(cached) = self.people.get(&id) {
            return Ok(cached.clone());
        }
        let person = query::get_person(conn, id)?;
        self.people.insert(id, person.clone());
        Ok(person)
    }
}

fn format_points(value: f64) -> String {
    format!("{value}")
}

fn format_timestamp(us: i64) -> String {
    Utc.timestamp_micros(us)
        .single()
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Micros, true))
        .unwrap_or_default()
}

fn write_record<W: Write>(out: &mut W, delimiter: char, fields: &[String]) -> Result<()> {
    let mut line = String::new();
    for (idx, field) in fields.iter().enumerate() {
        if idx > 0 {
            line.push(delimiter);
        }
        line.push_str(&escape_field(field, delimiter));
    }
    line.push_str("\r\n");
    out.write_all(line.as_bytes()).context("write csv record")
}

/// Quote a field when it contains the delimiter, a quote, CR or LF.
/// Embedded quotes are doubled.
fn escape_field(field: &str, delimiter: char) -> Cow<'_, str> {
    let needs_quotes = field
        .chars()
        .any(|c| c == delimiter || c == '"' || c == '\r' || c == '\n');
    if needs_quotes {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{open_in_memory, write};
    use crate::model::story::{NewStory, NewTask};

    fn export(conn: &Connection, project_id: i64, filter: &StoryFilter) -> String {
        let mut buf = Vec::new();
        write_stories_csv(conn, project_id, filter, ',', &mut buf).expect("export");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn escape_quotes_only_when_needed() {
        assert_eq!(escape_field("plain", ','), "plain");
        assert_eq!(escape_field("a,b", ','), "\"a,b\"");
        assert_eq!(escape_field("a,b", ';'), "a,b");
        assert_eq!(escape_field("say \"hi\"", ','), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_field("two\nlines", ','), "\"two\nlines\"");
    }

    #[test]
    fn header_places_role_columns_before_total() {
        let conn = open_in_memory().unwrap();
        let p = write::create_project(&conn, "Web", "web").unwrap().id;
        write::add_role(&conn, p, "UX", "ux", true, 1).unwrap();
        write::add_role(&conn, p, "Back", "back", true, 2).unwrap();
        write::add_role(&conn, p, "Stakeholder", "stakeholder", false, 3).unwrap();

        let roles = query::list_roles(&conn, p, true).unwrap();
        let header = csv_header(&roles);
        assert_eq!(header[9], "is_closed");
        assert_eq!(header[10], "back-points");
        assert_eq!(header[11], "ux-points");
        assert_eq!(header[12], "total-points");
        assert_eq!(header.last().map(String::as_str), Some("tags"));
        assert_eq!(header.len(), 10 + 2 + 1 + 11);
    }

    #[test]
    fn rows_render_people_points_tasks_and_tags() {
        let conn = open_in_memory().unwrap();
        let p = write::create_project(&conn, "Web", "web").unwrap().id;
        let status = write::add_story_status(&conn, p, "New", "#aaa", 1, false).unwrap();
        let ux = write::add_role(&conn, p, "UX", "ux", true, 1).unwrap();
        write::add_role(&conn, p, "Back", "back", true, 2).unwrap();
        let three = write::add_points(&conn, p, "3", Some(3.0), 1).unwrap();
        let alice = write::add_person(&conn, "alice", "Alice Doe", "a@example.com", false).unwrap();

        let story = write::create_story(
            &conn,
            p,
            &NewStory {
                description: "line one\nline two".to_string(),
                owner_id: Some(alice.id),
                tags: vec!["ui".to_string(), "bug".to_string()],
                ..NewStory::with_subject("Login, then logout")
            },
        )
        .unwrap();
        write::set_role_points(&conn, story.id, ux.id, three.id).unwrap();
        write::create_task(
            &conn,
            p,
            &NewTask {
                subject: "t".to_string(),
                story_id: Some(story.id),
                ..NewTask::default()
            },
        )
        .unwrap();

        let csv = export(&conn, p, &StoryFilter::default());
        let expected_prefix = "1,\"Login, then logout\",\"line one\nline two\",,alice,Alice Doe,,,New,false,0,3,3,1,1,1,";
        let body = csv.split_once("\r\n").expect("header line").1;
        assert!(body.starts_with(expected_prefix), "unexpected row: {body}");
        assert!(body.ends_with(",false,false,,1,\"bug,ui\"\r\n"), "unexpected row: {body}");
        assert_eq!(status.name, "New");
    }

    #[test]
    fn filter_limits_rows_and_dates_are_rfc3339() {
        let conn = open_in_memory().unwrap();
        let p = write::create_project(&conn, "Web", "web").unwrap().id;
        write::create_story(&conn, p, &NewStory::with_subject("first")).unwrap();
        let mut tagged = NewStory::with_subject("second");
        tagged.tags = vec!["bug".to_string()];
        write::create_story(&conn, p, &tagged).unwrap();

        let filter = StoryFilter {
            tags: vec!["bug".to_string()],
            ..StoryFilter::default()
        };
        let csv = export(&conn, p, &filter);
        let lines: Vec<&str> = csv.split("\r\n").filter(|l| !l.is_empty()).collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("2,second,"));
        assert!(lines[1].contains('T') && lines[1].contains('Z'));
    }

    #[test]
    fn timestamps_use_utc_micros() {
        assert_eq!(format_timestamp(0), "1970-01-01T00:00:00.000000Z");
        assert_eq!(format_points(2.5), "2.5");
        assert_eq!(format_points(3.0), "3");
    }
}
