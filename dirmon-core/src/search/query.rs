//! `src/search/query.rs`
//!
//! What a search looks for and where.

use std::path::Path;

use compact_str::CompactString;
use smallvec::SmallVec;

use crate::model::uri::Uri;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Free text; every whitespace separated word must occur in the name.
    pub text: String,
    /// Where to search. Must be a `file` URI.
    pub location: Uri,
    /// Accepted content types, `image/png` or `image/*`. Empty accepts all.
    pub mime_types: Vec<CompactString>,
    pub show_hidden: bool,
}

impl Query {
    #[must_use]
    pub fn new(text: impl Into<String>, location: Uri) -> Self {
        Self {
            text: text.into(),
            location,
            mime_types: Vec::new(),
            show_hidden: false,
        }
    }

    #[must_use]
    pub fn with_mime_types<I, S>(mut self, mime_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        self.mime_types = mime_types.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub const fn with_hidden(mut self, show_hidden: bool) -> Self {
        self.show_hidden = show_hidden;
        self
    }

    /// Lower-cased search words.
    #[must_use]
    pub fn words(&self) -> SmallVec<[String; 4]> {
        self.text
            .split_whitespace()
            .map(str::to_lowercase)
            .collect()
    }

    /// A query with neither words nor a type filter matches nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.mime_types.is_empty()
    }

    /// Name test, given pre-computed [`Query::words`].
    #[must_use]
    pub fn name_matches(words: &[String], name: &str) -> bool {
        let name = name.to_lowercase();

        words.iter().all(|w| name.contains(w.as_str()))
    }

    /// Content type test against the configured filter.
    #[must_use]
    pub fn mime_matches(&self, path: &Path) -> bool {
        if self.mime_types.is_empty() {
            return true;
        }

        let guess = mime_guess::from_path(path).first_or_octet_stream();
        let essence = guess.essence_str();

        self.mime_types.iter().any(|wanted| {
            wanted
                .strip_suffix("/*")
                .map_or(wanted.as_str() == essence, |major| {
                    guess.type_().as_str() == major
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn query(text: &str) -> Query {
        Query::new(text, Uri::from_path(Path::new("/home")).unwrap())
    }

    #[test]
    fn all_words_must_match_case_insensitively() {
        let q = query("Richard  hult");
        let words = q.words();

        assert!(Query::name_matches(&words, "richard-hult-notes.txt"));
        assert!(Query::name_matches(&words, "HULT_RICHARD.pdf"));
        assert!(!Query::name_matches(&words, "richard.txt"));
    }

    #[test]
    fn mime_filter_supports_wildcards() {
        let q = query("").with_mime_types(["image/*"]);

        assert!(q.mime_matches(&PathBuf::from("a.png")));
        assert!(q.mime_matches(&PathBuf::from("b.jpeg")));
        assert!(!q.mime_matches(&PathBuf::from("c.txt")));

        let exact = query("").with_mime_types(["text/plain"]);
        assert!(exact.mime_matches(&PathBuf::from("c.txt")));
    }

    #[test]
    fn empty_query_is_detected() {
        assert!(query("   ").is_empty());
        assert!(!query("x").is_empty());
        assert!(!query("").with_mime_types(["image/*"]).is_empty());
    }
}
