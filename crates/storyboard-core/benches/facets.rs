use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rusqlite::Connection;
use storyboard_core::db::{self, write};
use storyboard_core::i18n::Identity;
use storyboard_core::model::story::NewStory;
use storyboard_core::{FacetSources, StoryFilter, compute_filters};

const TIERS: [(&str, usize); 3] = [("small", 100), ("medium", 2_000), ("large", 20_000)];
const TAGS: [&str; 8] = ["api", "bug", "checkout", "docs", "infra", "mobile", "perf", "ui"];

struct Board {
    conn: Connection,
    project: i64,
    first_status: i64,
}

fn build_board(stories: usize, seed: u64) -> Board {
    let mut conn = db::open_in_memory().expect("open store");
    let project = write::create_project(&conn, "Bench", "bench").expect("project").id;

    let statuses: Vec<i64> = (0..6)
        .map(|idx| {
            write::add_story_status(&conn, project, &format!("Status {idx}"), "#999999", idx, idx == 5)
                .expect("status")
                .id
        })
        .collect();
    let people: Vec<i64> = (0..12)
        .map(|idx| {
            let id = write::add_person(&conn, &format!("user{idx}"), &format!("User {idx}"), "", false)
                .expect("person")
                .id;
            write::add_membership(&conn, project, Some(id), None, "").expect("membership");
            id
        })
        .collect();

    // Deterministic xorshift so tiers are comparable between runs.
    let mut state = seed;
    let mut next = move |bound: usize| {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        usize::try_from(state % bound as u64).unwrap_or(0)
    };

    let tx = conn.transaction().expect("begin");
    for idx in 0..stories {
        let assignee = next(people.len() + 1);
        let new = NewStory {
            status_id: Some(statuses[next(statuses.len())]),
            owner_id: Some(people[next(people.len())]),
            assigned_to_id: people.get(assignee).copied(),
            tags: (0..next(3)).map(|_| TAGS[next(TAGS.len())].to_string()).collect(),
            ..NewStory::with_subject(format!("Story {idx}"))
        };
        write::create_story(&tx, project, &new).expect("create story");
    }
    tx.commit().expect("commit");

    Board {
        conn,
        project,
        first_status: statuses[0],
    }
}

fn bench_compute_filters(c: &mut Criterion) {
    let mut group = c.benchmark_group("facets.compute_filters");

    for (name, count) in TIERS {
        let board = build_board(count, 0x5EED_u64 + count as u64);
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("unfiltered", name), &board, |b, board| {
            let sources = FacetSources::default();
            b.iter(|| {
                black_box(
                    compute_filters(&board.conn, board.project, &sources, &Identity)
                        .expect("compute"),
                )
            });
        });

        group.bench_with_input(BenchmarkId::new("selection", name), &board, |b, board| {
            let selection = StoryFilter {
                statuses: vec![board.first_status],
                tags: vec!["bug".to_string()],
                ..StoryFilter::default()
            };
            let sources = FacetSources::from_selection(&selection);
            b.iter(|| {
                black_box(
                    compute_filters(&board.conn, board.project, &sources, &Identity)
                        .expect("compute"),
                )
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compute_filters);
criterion_main!(benches);
