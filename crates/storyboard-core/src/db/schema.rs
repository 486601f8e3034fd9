//! Canonical SQLite schema for the story store.
//!
//! The schema is normalized for facet queries:
//! - `user_stories` keeps scalar story fields, with nullable foreign keys
//!   for status, owner and assignee
//! - `story_tags` and `role_points` model multi-valued relationships
//! - `memberships` links people to projects; a null `person_id` is a
//!   pending invitation that only carries an email
//! - `store_meta` tracks the applied schema version

/// Migration v1: core tables, read-path indexes and store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS persons (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE CHECK (length(trim(username)) > 0),
    email TEXT NOT NULL DEFAULT '',
    full_name TEXT NOT NULL DEFAULT '',
    is_active INTEGER NOT NULL DEFAULT 1 CHECK (is_active IN (0, 1)),
    is_system INTEGER NOT NULL DEFAULT 0 CHECK (is_system IN (0, 1)),
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS projects (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL CHECK (length(trim(name)) > 0),
    slug TEXT NOT NULL UNIQUE CHECK (length(trim(slug)) > 0),
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS roles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    slug TEXT NOT NULL,
    computable INTEGER NOT NULL DEFAULT 1 CHECK (computable IN (0, 1)),
    sort_order INTEGER NOT NULL DEFAULT 10,
    UNIQUE (project_id, slug)
);

CREATE TABLE IF NOT EXISTS memberships (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    person_id INTEGER REFERENCES persons(id) ON DELETE SET NULL,
    role_id INTEGER REFERENCES roles(id) ON DELETE SET NULL,
    email TEXT NOT NULL DEFAULT '',
    created_at_us INTEGER NOT NULL,
    UNIQUE (project_id, person_id)
);

CREATE TABLE IF NOT EXISTS story_statuses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    name TEXT NOT NULL CHECK (length(trim(name)) > 0),
    color TEXT NOT NULL DEFAULT '#999999',
    sort_order INTEGER NOT NULL DEFAULT 10,
    is_closed INTEGER NOT NULL DEFAULT 0 CHECK (is_closed IN (0, 1)),
    UNIQUE (project_id, name)
);

CREATE TABLE IF NOT EXISTS task_statuses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    name TEXT NOT NULL CHECK (length(trim(name)) > 0),
    color TEXT NOT NULL DEFAULT '#999999',
    sort_order INTEGER NOT NULL DEFAULT 10,
    is_closed INTEGER NOT NULL DEFAULT 0 CHECK (is_closed IN (0, 1)),
    UNIQUE (project_id, name)
);

CREATE TABLE IF NOT EXISTS points (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    value REAL,
    sort_order INTEGER NOT NULL DEFAULT 10,
    UNIQUE (project_id, name)
);

CREATE TABLE IF NOT EXISTS user_stories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    ref INTEGER NOT NULL,
    subject TEXT NOT NULL CHECK (length(trim(subject)) > 0),
    description TEXT NOT NULL DEFAULT '',
    status_id INTEGER REFERENCES story_statuses(id) ON DELETE SET NULL,
    owner_id INTEGER REFERENCES persons(id) ON DELETE SET NULL,
    assigned_to_id INTEGER REFERENCES persons(id) ON DELETE SET NULL,
    milestone TEXT,
    is_closed INTEGER NOT NULL DEFAULT 0 CHECK (is_closed IN (0, 1)),
    backlog_order INTEGER NOT NULL DEFAULT 1,
    sprint_order INTEGER NOT NULL DEFAULT 1,
    kanban_order INTEGER NOT NULL DEFAULT 1,
    client_requirement INTEGER NOT NULL DEFAULT 0 CHECK (client_requirement IN (0, 1)),
    team_requirement INTEGER NOT NULL DEFAULT 0 CHECK (team_requirement IN (0, 1)),
    external_reference TEXT,
    created_at_us INTEGER NOT NULL,
    modified_at_us INTEGER NOT NULL,
    finish_at_us INTEGER,
    UNIQUE (project_id, ref)
);

CREATE TABLE IF NOT EXISTS story_tags (
    story_id INTEGER NOT NULL REFERENCES user_stories(id) ON DELETE CASCADE,
    tag TEXT NOT NULL CHECK (length(trim(tag)) > 0),
    PRIMARY KEY (story_id, tag)
);

CREATE TABLE IF NOT EXISTS role_points (
    story_id INTEGER NOT NULL REFERENCES user_stories(id) ON DELETE CASCADE,
    role_id INTEGER NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
    points_id INTEGER NOT NULL REFERENCES points(id) ON DELETE CASCADE,
    PRIMARY KEY (story_id, role_id)
);

CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    story_id INTEGER REFERENCES user_stories(id) ON DELETE SET NULL,
    ref INTEGER NOT NULL,
    subject TEXT NOT NULL CHECK (length(trim(subject)) > 0),
    status_id INTEGER REFERENCES task_statuses(id) ON DELETE SET NULL,
    owner_id INTEGER REFERENCES persons(id) ON DELETE SET NULL,
    assigned_to_id INTEGER REFERENCES persons(id) ON DELETE SET NULL,
    created_at_us INTEGER NOT NULL,
    modified_at_us INTEGER NOT NULL,
    finished_at_us INTEGER
);

CREATE INDEX IF NOT EXISTS idx_user_stories_project_status
    ON user_stories(project_id, status_id);

CREATE INDEX IF NOT EXISTS idx_user_stories_project_assigned
    ON user_stories(project_id, assigned_to_id);

CREATE INDEX IF NOT EXISTS idx_user_stories_project_owner
    ON user_stories(project_id, owner_id);

CREATE INDEX IF NOT EXISTS idx_story_tags_tag
    ON story_tags(tag, story_id);

CREATE INDEX IF NOT EXISTS idx_memberships_person
    ON memberships(person_id, project_id);

CREATE INDEX IF NOT EXISTS idx_tasks_story
    ON tasks(story_id);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    created_at_us INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO store_meta (id, schema_version, created_at_us)
VALUES (1, 1, CAST(strftime('%s', 'now') AS INTEGER) * 1000000);
";

/// Migration v2: seed the inactive "Github" system account.
///
/// The username and email carry a random hex suffix so the seed never
/// collides with a real account. The `NOT EXISTS` guard keeps the seed
/// single even if the statement is replayed.
pub const MIGRATION_V2_SQL: &str = r"
INSERT INTO persons (username, email, full_name, is_active, is_system, created_at_us)
SELECT
    'github-' || seed.hash,
    'github-' || seed.hash || '@storyboard.local',
    'Github',
    0,
    1,
    CAST(strftime('%s', 'now') AS INTEGER) * 1000000
FROM (SELECT lower(hex(randomblob(16))) AS hash) AS seed
WHERE NOT EXISTS (
    SELECT 1 FROM persons WHERE is_system = 1 AND full_name = 'Github'
);

UPDATE store_meta
SET schema_version = 2
WHERE id = 1;
";

/// Full name of the seeded system account.
pub const GITHUB_SYSTEM_FULL_NAME: &str = "Github";

/// Indexes expected by facet and listing query paths.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_user_stories_project_status",
    "idx_user_stories_project_assigned",
    "idx_user_stories_project_owner",
    "idx_story_tags_tag",
    "idx_memberships_person",
    "idx_tasks_story",
];
