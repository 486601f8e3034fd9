pub mod facet;
pub mod project;
pub mod story;
