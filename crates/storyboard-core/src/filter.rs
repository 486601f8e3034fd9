//! Composable story predicates for listings, exports and facet counts.
//!
//! A [`StoryFilter`] is a typed description of "which stories": it never
//! carries SQL. [`StoryFilter::to_predicate`] compiles it into a
//! [`Predicate`], a `WHERE` fragment over the `user_stories` table aliased
//! as `s` whose values are all bound parameters.
//!
//! Facet counting needs one filter per dimension: when the caller has
//! selected status `New`, the status facet must still count the other
//! statuses. [`FacetSources::from_selection`] derives those four filters by
//! dropping each dimension's own selection.

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Alias under which predicates reference the `user_stories` table.
pub const STORY_ALIAS: &str = "s";

// ---------------------------------------------------------------------------
// Dimensions
// ---------------------------------------------------------------------------

/// A facet dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Statuses,
    AssignedTo,
    Owners,
    Tags,
}

impl Dimension {
    /// All dimensions in output order.
    pub const ALL: [Self; 4] = [Self::Statuses, Self::AssignedTo, Self::Owners, Self::Tags];

    /// Key used for this dimension in serialized facet output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Statuses => "statuses",
            Self::AssignedTo => "assigned_to",
            Self::Owners => "owners",
            Self::Tags => "tags",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Assignee selection
// ---------------------------------------------------------------------------

/// One selected value of the assignee dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Assignee {
    /// Stories with no assignee.
    Unassigned,
    /// Stories assigned to the person with this id.
    Person(i64),
}

impl Assignee {
    /// Words that select stories without assignee (case-insensitive).
    pub const UNASSIGNED_KEYWORDS: [&'static str; 3] = ["none", "null", "unassigned"];

    /// True when `key` is one of [`Self::UNASSIGNED_KEYWORDS`].
    #[must_use]
    pub fn is_unassigned_keyword(key: &str) -> bool {
        let key = key.trim();
        Self::UNASSIGNED_KEYWORDS
            .iter()
            .any(|word| word.eq_ignore_ascii_case(key))
    }
}

// ---------------------------------------------------------------------------
// StoryFilter
// ---------------------------------------------------------------------------

/// Filter criteria for stories.
///
/// All fields are optional; empty lists and `None` do not constrain.
/// Lists are any-of within a field, except `tags` which requires every
/// listed tag. Fields combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryFilter {
    /// Status ids (any-of).
    pub statuses: Vec<i64>,
    /// Assignees (any-of); [`Assignee::Unassigned`] matches a null assignee.
    pub assigned_to: Vec<Assignee>,
    /// Owner ids (any-of).
    pub owners: Vec<i64>,
    /// Tags the story must all carry. Surrounding whitespace is ignored and
    /// blank entries do not constrain, as when tags are written.
    pub tags: Vec<String>,
    /// Closed flag.
    pub is_closed: Option<bool>,
    /// Case-insensitive substring of the subject (Unicode lowercase).
    pub subject_contains: Option<String>,
}

impl StoryFilter {
    /// A copy of this filter with one dimension's selection cleared.
    #[must_use]
    pub fn without(&self, dimension: Dimension) -> Self {
        let mut filter = self.clone();
        match dimension {
            Dimension::Statuses => filter.statuses.clear(),
            Dimension::AssignedTo => filter.assigned_to.clear(),
            Dimension::Owners => filter.owners.clear(),
            Dimension::Tags => filter.tags.clear(),
        }
        filter
    }

    /// Compile into a `WHERE` fragment over `user_stories` aliased `s`.
    #[must_use]
    pub fn to_predicate(&self) -> Predicate {
        let mut predicate = Predicate::default();
        let s = STORY_ALIAS;

        if !self.statuses.is_empty() {
            let list = predicate.bind_list(self.statuses.iter().map(|id| Value::Integer(*id)));
            predicate.push(format!("{s}.status_id IN ({list})"));
        }

        if !self.assigned_to.is_empty() {
            let wants_unassigned = self.assigned_to.contains(&Assignee::Unassigned);
            let people: Vec<Value> = self
                .assigned_to
                .iter()
                .filter_map(|assignee| match assignee {
                    Assignee::Person(id) => Some(Value::Integer(*id)),
                    Assignee::Unassigned => None,
                })
                .collect();

            let mut alternatives = Vec::new();
            if wants_unassigned {
                alternatives.push(format!("{s}.assigned_to_id IS NULL"));
            }
            if !people.is_empty() {
                let list = predicate.bind_list(people);
                alternatives.push(format!("{s}.assigned_to_id IN ({list})"));
            }
            predicate.push(format!("({})", alternatives.join(" OR ")));
        }

        if !self.owners.is_empty() {
            let list = predicate.bind_list(self.owners.iter().map(|id| Value::Integer(*id)));
            predicate.push(format!("{s}.owner_id IN ({list})"));
        }

        for tag in self.tags.iter().map(|tag| tag.trim()).filter(|tag| !tag.is_empty()) {
            predicate.params.push(Value::Text(tag.to_string()));
            predicate.push(format!(
                "EXISTS (SELECT 1 FROM story_tags tg WHERE tg.story_id = {s}.id AND tg.tag = ?)"
            ));
        }

        if let Some(closed) = self.is_closed {
            predicate.params.push(Value::Integer(i64::from(closed)));
            predicate.push(format!("{s}.is_closed = ?"));
        }

        if let Some(ref needle) = self.subject_contains {
            predicate.params.push(Value::Text(needle.to_lowercase()));
            predicate.push(format!("instr(casefold({s}.subject), ?) > 0"));
        }

        predicate
    }
}

// ---------------------------------------------------------------------------
// Predicate
// ---------------------------------------------------------------------------

/// A compiled `WHERE` fragment plus its positional parameters.
///
/// The clause only contains column references and anonymous `?`
/// placeholders; `params` are listed in placeholder order. An
/// unconstrained filter compiles to `1 = 1`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    conditions: Vec<String>,
    params: Vec<Value>,
}

impl Predicate {
    /// The fragment, suitable for `WHERE ... AND (<clause>)`.
    #[must_use]
    pub fn clause(&self) -> String {
        if self.conditions.is_empty() {
            "1 = 1".to_string()
        } else {
            self.conditions.join(" AND ")
        }
    }

    /// Parameters in placeholder order.
    #[must_use]
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    fn push(&mut self, condition: String) {
        self.conditions.push(condition);
    }

    fn bind_list(&mut self, values: impl IntoIterator<Item = Value>) -> String {
        let mut list = String::new();
        for (idx, value) in values.into_iter().enumerate() {
            if idx > 0 {
                list.push_str(", ");
            }
            list.push('?');
            self.params.push(value);
        }
        list
    }
}

// ---------------------------------------------------------------------------
// FacetSources
// ---------------------------------------------------------------------------

/// The filtered base collection for each facet dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacetSources {
    pub statuses: StoryFilter,
    pub assigned_to: StoryFilter,
    pub owners: StoryFilter,
    pub tags: StoryFilter,
}

impl FacetSources {
    /// Use the same filter for every dimension.
    #[must_use]
    pub fn uniform(filter: &StoryFilter) -> Self {
        Self {
            statuses: filter.clone(),
            assigned_to: filter.clone(),
            owners: filter.clone(),
            tags: filter.clone(),
        }
    }

    /// Derive per-dimension filters from the current selection: each
    /// dimension is filtered by every selection except its own.
    #[must_use]
    pub fn from_selection(selection: &StoryFilter) -> Self {
        Self {
            statuses: selection.without(Dimension::Statuses),
            assigned_to: selection.without(Dimension::AssignedTo),
            owners: selection.without(Dimension::Owners),
            tags: selection.without(Dimension::Tags),
        }
    }
}
