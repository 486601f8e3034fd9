//! Facet records returned by [`crate::facets::compute_filters`].
//!
//! These are transient: built per call and serialized by the caller.

use serde::Serialize;

/// Count of stories in one status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusFacet {
    pub id: i64,
    /// Display name after localisation.
    pub name: String,
    pub color: String,
    pub order: i64,
    pub count: usize,
}

/// Count of stories assigned to or owned by one person.
///
/// The unassigned bucket has `id: None` and an empty `full_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersonFacet {
    pub id: Option<i64>,
    pub full_name: String,
    pub count: usize,
}

/// Count of stories carrying one tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagFacet {
    pub name: String,
    pub count: usize,
}

/// All four facets for a project.
///
/// Field order is the serialized key order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoryFilters {
    pub statuses: Vec<StatusFacet>,
    pub assigned_to: Vec<PersonFacet>,
    pub owners: Vec<PersonFacet>,
    pub tags: Vec<TagFacet>,
}
