//! Filter-facet aggregation over a project's stories.
//!
//! [`compute_filters`] answers "how many stories would I get for each value
//! of each filter dimension". Every dimension runs one grouped `COUNT`
//! query over its own filtered base collection, joined to the dimension's
//! domain so that values with no matching stories can still be reported
//! where the facet calls for it:
//!
//! | dimension     | domain                              | zero counts |
//! |---------------|-------------------------------------|-------------|
//! | `statuses`    | every status of the project         | kept        |
//! | `assigned_to` | unassigned bucket + linked members  | kept        |
//! | `owners`      | members and system accounts         | dropped     |
//! | `tags`        | tags present in the collection      | n/a         |
//!
//! The four reads share one connection and take no explicit transaction.

use anyhow::{Context, Result};
use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use std::time::Instant;

use crate::filter::{Dimension, FacetSources, StoryFilter};
use crate::i18n::Translate;
use crate::model::facet::{PersonFacet, StatusFacet, StoryFilters, TagFacet};

/// Compute all four facets for a project.
///
/// Each dimension counts over its own filter from `sources`; use
/// [`FacetSources::from_selection`] to derive them from one user selection.
/// Status names go through `translator`.
///
/// # Errors
///
/// Returns an error naming the failing dimension if any of the four
/// queries fails. No partial result is returned.
pub fn compute_filters(
    conn: &Connection,
    project_id: i64,
    sources: &FacetSources,
    translator: &dyn Translate,
) -> Result<StoryFilters> {
    let started = Instant::now();

    let statuses = status_facets(conn, project_id, &sources.statuses, translator)
        .with_context(|| format!("compute {} facet", Dimension::Statuses))?;
    let assigned_to = assignee_facets(conn, project_id, &sources.assigned_to)
        .with_context(|| format!("compute {} facet", Dimension::AssignedTo))?;
    let owners = owner_facets(conn, project_id, &sources.owners)
        .with_context(|| format!("compute {} facet", Dimension::Owners))?;
    let tags = tag_facets(conn, project_id, &sources.tags)
        .with_context(|| format!("compute {} facet", Dimension::Tags))?;

    tracing::debug!(
        project_id,
        statuses = statuses.len(),
        assigned_to = assigned_to.len(),
        owners = owners.len(),
        tags = tags.len(),
        elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX),
        "computed story facets"
    );

    Ok(StoryFilters {
        statuses,
        assigned_to,
        owners,
        tags,
    })
}

/// Every status of the project with its story count, in status order.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn status_facets(
    conn: &Connection,
    project_id: i64,
    filter: &StoryFilter,
    translator: &dyn Translate,
) -> Result<Vec<StatusFacet>> {
    let predicate = filter.to_predicate();
    let sql = format!(
        "WITH counts AS (
            SELECT s.status_id AS status_id, COUNT(*) AS n
            FROM user_stories s
            WHERE s.project_id = ? AND ({})
            GROUP BY s.status_id
        )
        SELECT ss.id, ss.name, ss.color, ss.sort_order, COALESCE(c.n, 0)
        FROM story_statuses ss
        LEFT JOIN counts c ON c.status_id = ss.id
        WHERE ss.project_id = ?
        ORDER BY ss.sort_order ASC, ss.id ASC",
        predicate.clause()
    );
    let values = bind(project_id, predicate.params(), Some(project_id));

    let mut stmt = conn
        .prepare(&sql)
        .context("prepare status facet query")?;
    let rows = stmt
        .query_map(params_from_iter(values.iter()), |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })
        .context("execute status facet query")?;

    let mut facets = Vec::new();
    for row in rows {
        let (id, name, color, order, n) = row.context("read status facet row")?;
        facets.push(StatusFacet {
            id,
            name: translator.translate(&name).into_owned(),
            color,
            order,
            count: to_count(n)?,
        });
    }

    tracing::debug!(project_id, dimension = %Dimension::Statuses, values = facets.len(), "facet");
    Ok(facets)
}

/// The unassigned bucket plus every linked member, with story counts.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn assignee_facets(
    conn: &Connection,
    project_id: i64,
    filter: &StoryFilter,
) -> Result<Vec<PersonFacet>> {
    let predicate = filter.to_predicate();
    let sql = format!(
        "WITH counts AS (
            SELECT s.assigned_to_id AS person_id, COUNT(*) AS n
            FROM user_stories s
            WHERE s.project_id = ? AND ({})
            GROUP BY s.assigned_to_id
        )
        SELECT NULL, '', COALESCE((SELECT n FROM counts WHERE person_id IS NULL), 0)
        UNION ALL
        SELECT p.id, p.full_name, COALESCE(c.n, 0)
        FROM memberships m
        INNER JOIN persons p ON p.id = m.person_id
        LEFT JOIN counts c ON c.person_id = p.id
        WHERE m.project_id = ?",
        predicate.clause()
    );
    let values = bind(project_id, predicate.params(), Some(project_id));

    let mut facets = person_rows(conn, &sql, &values, "assignee")?;
    sort_by_label(&mut facets);

    tracing::debug!(project_id, dimension = %Dimension::AssignedTo, values = facets.len(), "facet");
    Ok(facets)
}

/// Owners of matching stories who are members or system accounts.
///
/// Only owners with at least one matching story appear.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn owner_facets(
    conn: &Connection,
    project_id: i64,
    filter: &StoryFilter,
) -> Result<Vec<PersonFacet>> {
    let predicate = filter.to_predicate();
    let sql = format!(
        "WITH counts AS (
            SELECT s.owner_id AS person_id, COUNT(*) AS n
            FROM user_stories s
            WHERE s.project_id = ? AND ({})
            GROUP BY s.owner_id
        )
        SELECT p.id, p.full_name, c.n
        FROM counts c
        INNER JOIN persons p ON p.id = c.person_id
        WHERE p.is_system = 1
           OR EXISTS (
               SELECT 1 FROM memberships m
               WHERE m.project_id = ? AND m.person_id = p.id
           )",
        predicate.clause()
    );
    let values = bind(project_id, predicate.params(), Some(project_id));

    let mut facets = person_rows(conn, &sql, &values, "owner")?;
    sort_by_label(&mut facets);

    tracing::debug!(project_id, dimension = %Dimension::Owners, values = facets.len(), "facet");
    Ok(facets)
}

/// Distinct tags of matching stories with the number of stories carrying each.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn tag_facets(conn: &Connection, project_id: i64, filter: &StoryFilter) -> Result<Vec<TagFacet>> {
    let predicate = filter.to_predicate();
    let sql = format!(
        "SELECT st.tag, COUNT(*)
        FROM story_tags st
        INNER JOIN user_stories s ON s.id = st.story_id
        WHERE s.project_id = ? AND ({})
        GROUP BY st.tag",
        predicate.clause()
    );
    let values = bind(project_id, predicate.params(), None);

    let mut stmt = conn.prepare(&sql).context("prepare tag facet query")?;
    let rows = stmt
        .query_map(params_from_iter(values.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })
        .context("execute tag facet query")?;

    let mut facets = Vec::new();
    for row in rows {
        let (name, n) = row.context("read tag facet row")?;
        facets.push(TagFacet {
            name,
            count: to_count(n)?,
        });
    }
    facets.sort_by(|a, b| a.name.cmp(&b.name));

    tracing::debug!(project_id, dimension = %Dimension::Tags, values = facets.len(), "facet");
    Ok(facets)
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Parameters in placeholder order: project, predicate values, then an
/// optional trailing project id for the domain side of the query.
fn bind(project_id: i64, predicate: &[Value], domain_project: Option<i64>) -> Vec<Value> {
    let mut values = Vec::with_capacity(predicate.len() + 2);
    values.push(Value::Integer(project_id));
    values.extend_from_slice(predicate);
    if let Some(id) = domain_project {
        values.push(Value::Integer(id));
    }
    values
}

fn person_rows(
    conn: &Connection,
    sql: &str,
    values: &[Value],
    label: &str,
) -> Result<Vec<PersonFacet>> {
    let mut stmt = conn
        .prepare(sql)
        .with_context(|| format!("prepare {label} facet query"))?;
    let rows = stmt
        .query_map(params_from_iter(values.iter()), |row| {
            Ok((
                row.get::<_, Option<i64>>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })
        .with_context(|| format!("execute {label} facet query"))?;

    let mut facets = Vec::new();
    for row in rows {
        let (id, full_name, n) = row.with_context(|| format!("read {label} facet row"))?;
        facets.push(PersonFacet {
            id,
            full_name,
            count: to_count(n)?,
        });
    }
    Ok(facets)
}

/// Code-point order on the label; the unassigned bucket's empty label
/// sorts first. Ties fall back to id.
fn sort_by_label(facets: &mut [PersonFacet]) {
    facets.sort_by(|a, b| a.full_name.cmp(&b.full_name).then(a.id.cmp(&b.id)));
}

fn to_count(n: i64) -> Result<usize> {
    usize::try_from(n).with_context(|| format!("invalid facet count {n}"))
}
