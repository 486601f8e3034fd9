//! Property tests: SQL facet counts agree with a straightforward in-memory
//! count over the same stories and selection.

use proptest::prelude::*;
use rusqlite::Connection;
use std::collections::BTreeMap;
use storyboard_core::db::{self, query, write};
use storyboard_core::i18n::Identity;
use storyboard_core::model::story::NewStory;
use storyboard_core::{Assignee, FacetSources, StoryFilter, compute_filters};

const TAGS: [&str; 3] = ["api", "bug", "ui"];
const STATUS_COUNT: usize = 3;
/// Persons 0 and 1 are members, 2 is an outsider, 3 is the system account.
const PERSON_COUNT: usize = 4;

#[derive(Debug, Clone)]
struct StorySpec {
    status: usize,
    owner: usize,
    assignee: Option<usize>,
    tags: Vec<usize>,
}

#[derive(Debug, Clone, Default)]
struct SelectionSpec {
    statuses: Vec<usize>,
    assigned_to: Vec<Option<usize>>,
    owners: Vec<usize>,
    tags: Vec<usize>,
}

fn arb_story() -> impl Strategy<Value = StorySpec> {
    (
        0..STATUS_COUNT,
        0..PERSON_COUNT,
        proptest::option::of(0..PERSON_COUNT),
        proptest::collection::btree_set(0..TAGS.len(), 0..=TAGS.len()),
    )
        .prop_map(|(status, owner, assignee, tags)| StorySpec {
            status,
            owner,
            assignee,
            tags: tags.into_iter().collect(),
        })
}

fn arb_selection() -> impl Strategy<Value = SelectionSpec> {
    (
        proptest::collection::vec(0..STATUS_COUNT, 0..=2),
        proptest::collection::vec(proptest::option::of(0..PERSON_COUNT), 0..=2),
        proptest::collection::vec(0..PERSON_COUNT, 0..=2),
        proptest::collection::vec(0..TAGS.len(), 0..=1),
    )
        .prop_map(|(statuses, assigned_to, owners, tags)| SelectionSpec {
            statuses,
            assigned_to,
            owners,
            tags,
        })
}

struct Store {
    conn: Connection,
    project: i64,
    statuses: Vec<i64>,
    people: Vec<i64>,
}

fn store(stories: &[StorySpec]) -> Store {
    let conn = db::open_in_memory().expect("open store");
    let project = write::create_project(&conn, "P", "p").expect("project").id;

    let statuses: Vec<i64> = (0..STATUS_COUNT)
        .map(|idx| {
            let order = i64::try_from(idx).expect("small");
            write::add_story_status(&conn, project, &format!("S{idx}"), "#999999", order, false)
                .expect("status")
                .id
        })
        .collect();

    let mut people = Vec::new();
    for idx in 0..2 {
        let id = write::add_person(&conn, &format!("m{idx}"), &format!("Member {idx}"), "", false)
            .expect("member")
            .id;
        write::add_membership(&conn, project, Some(id), None, "").expect("membership");
        people.push(id);
    }
    people.push(
        write::add_person(&conn, "outsider", "Outsider", "", false)
            .expect("outsider")
            .id,
    );
    people.push(
        query::list_system_persons(&conn)
            .expect("system persons")
            .first()
            .expect("seeded system account")
            .id,
    );

    for spec in stories {
        let new = NewStory {
            status_id: Some(statuses[spec.status]),
            owner_id: Some(people[spec.owner]),
            assigned_to_id: spec.assignee.map(|idx| people[idx]),
            tags: spec.tags.iter().map(|&idx| TAGS[idx].to_string()).collect(),
            ..NewStory::with_subject("story")
        };
        write::create_story(&conn, project, &new).expect("create story");
    }

    Store {
        conn,
        project,
        statuses,
        people,
    }
}

fn to_filter(store: &Store, selection: &SelectionSpec) -> StoryFilter {
    StoryFilter {
        statuses: selection.statuses.iter().map(|&i| store.statuses[i]).collect(),
        assigned_to: selection
            .assigned_to
            .iter()
            .map(|a| a.map_or(Assignee::Unassigned, |i| Assignee::Person(store.people[i])))
            .collect(),
        owners: selection.owners.iter().map(|&i| store.people[i]).collect(),
        tags: selection.tags.iter().map(|&i| TAGS[i].to_string()).collect(),
        ..StoryFilter::default()
    }
}

/// Reference matcher over specs, with one dimension optionally ignored.
fn matches(story: &StorySpec, sel: &SelectionSpec, ignore: &str) -> bool {
    let status_ok = ignore == "statuses" || sel.statuses.is_empty() || sel.statuses.contains(&story.status);
    let assignee_ok = ignore == "assigned_to"
        || sel.assigned_to.is_empty()
        || sel.assigned_to.contains(&story.assignee);
    let owner_ok = ignore == "owners" || sel.owners.is_empty() || sel.owners.contains(&story.owner);
    let tags_ok = ignore == "tags" || sel.tags.iter().all(|t| story.tags.contains(t));
    status_ok && assignee_ok && owner_ok && tags_ok
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn facet_counts_match_reference(
        stories in proptest::collection::vec(arb_story(), 0..24),
        selection in arb_selection(),
    ) {
        let store = store(&stories);
        let filter = to_filter(&store, &selection);
        let facets = compute_filters(
            &store.conn,
            store.project,
            &FacetSources::from_selection(&filter),
            &Identity,
        )
        .expect("compute filters");

        // Statuses: every status, counted over stories matching the rest.
        prop_assert_eq!(facets.statuses.len(), STATUS_COUNT);
        for (idx, facet) in facets.statuses.iter().enumerate() {
            let expected = stories
                .iter()
                .filter(|s| s.status == idx && matches(s, &selection, "statuses"))
                .count();
            prop_assert_eq!(facet.id, store.statuses[idx]);
            prop_assert_eq!(facet.count, expected);
        }

        // Assignees: unassigned bucket plus both members, zero counts kept.
        prop_assert_eq!(facets.assigned_to.len(), 3);
        for facet in &facets.assigned_to {
            let person = facet.id.map(|id| store.people.iter().position(|&p| p == id).expect("known person"));
            let expected = stories
                .iter()
                .filter(|s| s.assignee == person && matches(s, &selection, "assigned_to"))
                .count();
            prop_assert_eq!(facet.count, expected);
        }

        // Owners: members and the system account with at least one story.
        let mut expected_owners = BTreeMap::new();
        for s in stories.iter().filter(|s| s.owner != 2 && matches(s, &selection, "owners")) {
            *expected_owners.entry(store.people[s.owner]).or_insert(0_usize) += 1;
        }
        let actual_owners: BTreeMap<i64, usize> = facets
            .owners
            .iter()
            .map(|p| (p.id.expect("owners have ids"), p.count))
            .collect();
        prop_assert_eq!(actual_owners, expected_owners);

        // Tags: stories carrying each tag.
        let mut expected_tags = BTreeMap::new();
        for s in stories.iter().filter(|s| matches(s, &selection, "tags")) {
            for &t in &s.tags {
                *expected_tags.entry(TAGS[t].to_string()).or_insert(0_usize) += 1;
            }
        }
        let actual_tags: BTreeMap<String, usize> = facets
            .tags
            .iter()
            .map(|t| (t.name.clone(), t.count))
            .collect();
        prop_assert_eq!(actual_tags, expected_tags);
    }

    #[test]
    fn person_facets_are_sorted_by_label(
        stories in proptest::collection::vec(arb_story(), 0..16),
    ) {
        let store = store(&stories);
        let facets = compute_filters(
            &store.conn,
            store.project,
            &FacetSources::default(),
            &Identity,
        )
        .expect("compute filters");

        for list in [&facets.assigned_to, &facets.owners] {
            prop_assert!(list.windows(2).all(|w| w[0].full_name <= w[1].full_name));
            prop_assert!(list.iter().all(|p| p.id.is_none() || !p.full_name.is_empty()));
        }
        prop_assert!(facets.owners.iter().all(|p| p.count > 0));
        prop_assert_eq!(facets.assigned_to[0].full_name.as_str(), "");
        prop_assert!(facets.tags.windows(2).all(|w| w[0].name < w[1].name));
    }
}
