//! storyboard-core library.
//!
//! A user-story store on embedded SQLite, centred on facet aggregation:
//! given a project and a filter selection, [`facets::compute_filters`]
//! reports how many stories fall under each status, assignee, owner and
//! tag.
//!
//! # Conventions
//!
//! - **Errors**: Use `anyhow::Result` for return types; domain failures are
//!   [`error::StoreError`] values carried inside the `anyhow::Error`.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).
//! - **SQL**: Caller values are always bound parameters; see [`filter`].

pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod facets;
pub mod filter;
pub mod i18n;
pub mod model;
pub mod stories;

pub use facets::compute_filters;
pub use filter::{Assignee, Dimension, FacetSources, StoryFilter};
pub use model::facet::StoryFilters;
