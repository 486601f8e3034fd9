use serde::Serialize;

/// A project scoping statuses, roles, memberships and stories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub created_at_us: i64,
}

/// A person who can own or be assigned stories.
///
/// System accounts (`is_system`) stand for automation, e.g. the seeded
/// Github account that owns stories created from webhooks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Person {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub is_active: bool,
    pub is_system: bool,
}

/// A project role. Computable roles carry estimation points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Role {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub slug: String,
    pub computable: bool,
    pub order: i64,
}

/// Membership of a person in a project.
///
/// `person_id` is `None` for invitations that were not accepted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Membership {
    pub id: i64,
    pub project_id: i64,
    pub person_id: Option<i64>,
    pub role_id: Option<i64>,
    pub email: String,
}

/// A workflow status for stories or tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub color: String,
    pub order: i64,
    pub is_closed: bool,
}

/// An estimation value; `value` is `None` for "?"-style points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Points {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub value: Option<f64>,
    pub order: i64,
}
