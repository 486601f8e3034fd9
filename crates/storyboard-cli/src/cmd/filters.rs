//! `sb filters` — facet counts for a story selection.
//!
//! Each dimension is counted over the stories matching the selection on
//! every other dimension, so picking a status never hides the other
//! statuses.

use anyhow::Result;
use clap::Args;
use std::io::{self, Write};
use storyboard_core::model::facet::PersonFacet;
use storyboard_core::{FacetSources, StoryFilters, compute_filters};

use super::{FilterArgs, ProjectArg, Workspace};
use crate::output::{OutputMode, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct FiltersArgs {
    #[command(flatten)]
    pub project: ProjectArg,

    #[command(flatten)]
    pub filter: FilterArgs,
}

pub fn run_filters(args: &FiltersArgs, output: OutputMode, ws: &Workspace) -> Result<()> {
    let project = ws.project(&args.project.project)?;
    let selection = args.filter.to_filter(&ws.conn, project.id)?;
    let catalog = ws.config.i18n.catalog();

    let facets = compute_filters(
        &ws.conn,
        project.id,
        &FacetSources::from_selection(&selection),
        &catalog,
    )?;

    render_mode(output, &facets, write_text, write_pretty)
}

fn write_text(facets: &StoryFilters, w: &mut dyn Write) -> io::Result<()> {
    for s in &facets.statuses {
        writeln!(w, "statuses\t{}\t{}\t{}", s.id, s.count, s.name)?;
    }
    for p in &facets.assigned_to {
        writeln!(w, "assigned_to\t{}\t{}\t{}", person_id(p), p.count, p.full_name)?;
    }
    for p in &facets.owners {
        writeln!(w, "owners\t{}\t{}\t{}", person_id(p), p.count, p.full_name)?;
    }
    for t in &facets.tags {
        writeln!(w, "tags\t\t{}\t{}", t.count, t.name)?;
    }
    Ok(())
}

fn write_pretty(facets: &StoryFilters, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, "Statuses")?;
    for s in &facets.statuses {
        writeln!(w, "  {:<28} {:>5}", s.name, s.count)?;
    }
    writeln!(w)?;

    pretty_section(w, "Assigned to")?;
    for p in &facets.assigned_to {
        let label = if p.id.is_none() { "(unassigned)" } else { p.full_name.as_str() };
        writeln!(w, "  {label:<28} {:>5}", p.count)?;
    }
    writeln!(w)?;

    pretty_section(w, "Owners")?;
    for p in &facets.owners {
        writeln!(w, "  {:<28} {:>5}", p.full_name, p.count)?;
    }
    writeln!(w)?;

    pretty_section(w, "Tags")?;
    if facets.tags.is_empty() {
        writeln!(w, "  (none)")?;
    }
    for t in &facets.tags {
        writeln!(w, "  {:<28} {:>5}", t.name, t.count)?;
    }
    Ok(())
}

fn person_id(p: &PersonFacet) -> String {
    p.id.map(|id| id.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyboard_core::model::facet::{StatusFacet, TagFacet};

    fn sample() -> StoryFilters {
        StoryFilters {
            statuses: vec![StatusFacet {
                id: 1,
                name: "New".to_string(),
                color: "#999999".to_string(),
                order: 1,
                count: 3,
            }],
            assigned_to: vec![
                PersonFacet {
                    id: None,
                    full_name: String::new(),
                    count: 1,
                },
                PersonFacet {
                    id: Some(7),
                    full_name: "Alice".to_string(),
                    count: 2,
                },
            ],
            owners: vec![],
            tags: vec![TagFacet {
                name: "bug".to_string(),
                count: 2,
            }],
        }
    }

    #[test]
    fn text_rows_are_tab_separated_per_dimension() {
        let mut buf = Vec::new();
        write_text(&sample(), &mut buf).expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            [
                "statuses\t1\t3\tNew",
                "assigned_to\t\t1\t",
                "assigned_to\t7\t2\tAlice",
                "tags\t\t2\tbug",
            ]
        );
    }

    #[test]
    fn pretty_labels_the_unassigned_bucket() {
        let mut buf = Vec::new();
        write_pretty(&sample(), &mut buf).expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("(unassigned)"));
        assert!(text.contains("Owners"));
    }
}
