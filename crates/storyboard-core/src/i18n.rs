//! Display-name localisation.
//!
//! Status names are stored as message ids and localised when facets are
//! built. The lookup is an explicit service handed to the caller, not
//! process-wide state.

use std::borrow::Cow;
use std::collections::BTreeMap;

/// Looks up the display text for a message id.
pub trait Translate {
    /// Localised text for `msgid`, or `msgid` itself when unknown.
    fn translate<'a>(&'a self, msgid: &'a str) -> Cow<'a, str>;
}

/// Returns every message id unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Translate for Identity {
    fn translate<'a>(&'a self, msgid: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(msgid)
    }
}

/// A static message catalog for one language.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    language: String,
    messages: BTreeMap<String, String>,
}

impl Catalog {
    /// Build a catalog from `msgid -> text` pairs.
    pub fn new(language: impl Into<String>, messages: BTreeMap<String, String>) -> Self {
        Self {
            language: language.into(),
            messages,
        }
    }

    /// Language tag this catalog translates into.
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Number of known message ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True when the catalog has no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Translate for Catalog {
    fn translate<'a>(&'a self, msgid: &'a str) -> Cow<'a, str> {
        self.messages
            .get(msgid)
            .filter(|text| !text.is_empty())
            .map_or(Cow::Borrowed(msgid), |text| Cow::Borrowed(text.as_str()))
    }
}
