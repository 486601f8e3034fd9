use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::StoreError;

/// A stored user story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserStory {
    pub id: i64,
    pub project_id: i64,
    #[serde(rename = "ref")]
    pub reference: i64,
    pub subject: String,
    pub description: String,
    pub status_id: Option<i64>,
    pub owner_id: Option<i64>,
    pub assigned_to_id: Option<i64>,
    pub milestone: Option<String>,
    pub is_closed: bool,
    pub backlog_order: i64,
    pub sprint_order: i64,
    pub kanban_order: i64,
    pub client_requirement: bool,
    pub team_requirement: bool,
    pub external_reference: Option<String>,
    pub created_at_us: i64,
    pub modified_at_us: i64,
    pub finish_at_us: Option<i64>,
}

/// Fields for creating a story. Unset optional fields stay null.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewStory {
    pub subject: String,
    pub description: String,
    pub status_id: Option<i64>,
    pub owner_id: Option<i64>,
    pub assigned_to_id: Option<i64>,
    pub milestone: Option<String>,
    pub tags: Vec<String>,
    pub client_requirement: bool,
    pub team_requirement: bool,
    pub external_reference: Option<String>,
}

impl NewStory {
    /// A story with only a subject set.
    pub fn with_subject(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Self::default()
        }
    }
}

/// A task, optionally attached to a story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub id: i64,
    pub project_id: i64,
    pub story_id: Option<i64>,
    #[serde(rename = "ref")]
    pub reference: i64,
    pub subject: String,
    pub status_id: Option<i64>,
    pub owner_id: Option<i64>,
    pub assigned_to_id: Option<i64>,
    pub created_at_us: i64,
    pub modified_at_us: i64,
    pub finished_at_us: Option<i64>,
}

/// Fields for creating a task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    pub subject: String,
    pub story_id: Option<i64>,
    pub status_id: Option<i64>,
    pub owner_id: Option<i64>,
    pub assigned_to_id: Option<i64>,
}

/// Which of the three board orders a bulk reorder targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderField {
    Backlog,
    Sprint,
    Kanban,
}

impl OrderField {
    /// Column holding this order in `user_stories`.
    pub(crate) const fn column(self) -> &'static str {
        match self {
            Self::Backlog => "backlog_order",
            Self::Sprint => "sprint_order",
            Self::Kanban => "kanban_order",
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::Sprint => "sprint",
            Self::Kanban => "kanban",
        }
    }
}

impl fmt::Display for OrderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "backlog" | "backlog_order" => Ok(Self::Backlog),
            "sprint" | "sprint_order" => Ok(Self::Sprint),
            "kanban" | "kanban_order" => Ok(Self::Kanban),
            other => Err(StoreError::InvalidOrderField(other.to_string()).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::OrderField;
    use crate::error::{ErrorCode, StoreError};

    #[test]
    fn order_field_parses_short_and_column_names() {
        assert_eq!("kanban".parse::<OrderField>().unwrap(), OrderField::Kanban);
        assert_eq!(
            " Backlog_Order ".parse::<OrderField>().unwrap(),
            OrderField::Backlog
        );
        assert_eq!(OrderField::Sprint.column(), "sprint_order");
        assert_eq!(OrderField::Sprint.to_string(), "sprint");
    }

    #[test]
    fn unknown_order_field_is_typed_error() {
        let err = "priority".parse::<OrderField>().unwrap_err();
        let store = err.downcast_ref::<StoreError>().expect("store error");
        assert_eq!(store.code(), ErrorCode::InvalidOrderField);
    }
}
