//! `src/model/uri.rs`
//!
//! Location identifiers. Two schemes are understood: `file` for real
//! directories and `x-baul-search` for virtual search directories.

use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use url::Url;

use crate::error::{CoreError, CoreResult};

pub const FILE_SCHEME: &str = "file";
pub const SEARCH_SCHEME: &str = "x-baul-search";

/// Normalised, cheaply comparable location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uri(Url);

impl Uri {
    /// Parse and normalise. `file` URIs lose any trailing slash (except the
    /// root) so `file:///tmp` and `file:///tmp/` name the same directory.
    pub fn parse(text: &str) -> CoreResult<Self> {
        let url = Url::parse(text).map_err(|e| CoreError::invalid_uri(text, &e.to_string()))?;

        match url.scheme() {
            FILE_SCHEME => {
                let path = url
                    .to_file_path()
                    .map_err(|()| CoreError::invalid_uri(text, "not a local path"))?;

                Self::from_path(&path)
            }

            SEARCH_SCHEME => Ok(Self(url)),

            other => Err(CoreError::UnsupportedScheme(other.into())),
        }
    }

    /// Build a `file` URI from an absolute path.
    pub fn from_path(path: &Path) -> CoreResult<Self> {
        let display = path.to_string_lossy();

        if !path.is_absolute() {
            return Err(CoreError::invalid_uri(&display, "path must be absolute"));
        }

        let trimmed: PathBuf = path.components().collect();

        Url::from_file_path(&trimmed)
            .map(Self)
            .map_err(|()| CoreError::invalid_uri(&display, "cannot express path as URI"))
    }

    /// Search directory number `id`, e.g. `x-baul-search://0/`.
    #[must_use]
    pub fn search(id: u32) -> Self {
        let text = format!("{SEARCH_SCHEME}://{id}/");

        Self(Url::parse(&text).unwrap_or_else(|_| unreachable!("search URIs are always valid")))
    }

    #[must_use]
    pub fn scheme(&self) -> &str {
        self.0.scheme()
    }

    #[must_use]
    pub fn is_search(&self) -> bool {
        self.0.scheme() == SEARCH_SCHEME
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Local path for `file` URIs.
    #[must_use]
    pub fn to_file_path(&self) -> Option<PathBuf> {
        (self.0.scheme() == FILE_SCHEME)
            .then(|| self.0.to_file_path().ok())
            .flatten()
    }

    /// URI of the child `name` of a `file` directory.
    pub fn child(&self, name: &str) -> CoreResult<Self> {
        let path = self
            .to_file_path()
            .ok_or_else(|| CoreError::invalid_uri(self.as_str(), "only file URIs have children"))?;

        Self::from_path(&path.join(name))
    }

    /// Last path segment, used as a display name.
    #[must_use]
    pub fn file_name(&self) -> Option<String> {
        self.to_file_path()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
    }
}

impl FromStr for Uri {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_normalised() {
        let a = Uri::parse("file:///tmp/photos").unwrap();
        let b = Uri::parse("file:///tmp/photos/").unwrap();

        assert_eq!(a, b);
        assert_eq!(a.to_file_path().unwrap(), PathBuf::from("/tmp/photos"));
    }

    #[test]
    fn search_scheme_is_recognised() {
        let uri = Uri::parse("x-baul-search://0/").unwrap();

        assert!(uri.is_search());
        assert_eq!(uri, Uri::search(0));
        assert!(uri.to_file_path().is_none());
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        assert!(matches!(
            Uri::parse("smb://server/share"),
            Err(CoreError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn child_appends_a_segment() {
        let dir = Uri::from_path(Path::new("/srv/data")).unwrap();
        let child = dir.child("notes.txt").unwrap();

        assert_eq!(child.to_file_path().unwrap(), PathBuf::from("/srv/data/notes.txt"));
        assert_eq!(child.file_name().as_deref(), Some("notes.txt"));
    }
}
