//! `src/model/attributes.rs`
//!
//! Bitset of metadata kinds a client can ask the engine to keep loaded.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

bitflags! {
    /// Set of trackable file attributes. Closed under union; [`FileAttributes::ALL`]
    /// is the maximal element. The file name is part of identity and needs no bit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct FileAttributes: u32 {
        /// Kind, size, modification time, permissions.
        const INFO                 = 1 << 0;
        /// Content type guessed from the name.
        const MIME_TYPE            = 1 << 1;
        /// Target of a symbolic link.
        const LINK_INFO            = 1 << 2;
        /// Number of direct children of a directory.
        const DIRECTORY_ITEM_COUNT = 1 << 3;
        /// Recursive file / directory / byte totals of a directory.
        const DEEP_COUNTS          = 1 << 4;

        const ALL = Self::INFO.bits()
            | Self::MIME_TYPE.bits()
            | Self::LINK_INFO.bits()
            | Self::DIRECTORY_ITEM_COUNT.bits()
            | Self::DEEP_COUNTS.bits();
    }
}

impl FileAttributes {
    /// True when an entity holding `self` needs nothing more to serve `wanted`.
    #[inline]
    #[must_use]
    pub const fn satisfies(self, wanted: Self) -> bool {
        self.contains(wanted)
    }

    /// Attributes of `wanted` still missing from `self`.
    #[inline]
    #[must_use]
    pub const fn missing(self, wanted: Self) -> Self {
        wanted.difference(self)
    }

    /// Parse a comma separated list such as `info,mime,count`.
    pub fn parse_list(list: &str) -> Result<Self, CoreError> {
        list.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .try_fold(Self::empty(), |acc, part| {
                let attr = match part.to_ascii_lowercase().as_str() {
                    "info" => Self::INFO,
                    "mime" | "mime_type" => Self::MIME_TYPE,
                    "link" | "link_info" => Self::LINK_INFO,
                    "count" | "item_count" => Self::DIRECTORY_ITEM_COUNT,
                    "deep" | "deep_counts" => Self::DEEP_COUNTS,
                    "all" => Self::ALL,
                    other => {
                        return Err(CoreError::Config(compact_str::format_compact!(
                            "unknown attribute '{other}'"
                        )));
                    }
                };

                Ok(acc | attr)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn superset_satisfies_subset() {
        let cached = FileAttributes::INFO | FileAttributes::MIME_TYPE;

        assert!(cached.satisfies(FileAttributes::INFO));
        assert!(cached.satisfies(FileAttributes::empty()));
        assert!(!cached.satisfies(FileAttributes::DEEP_COUNTS));
        assert!(FileAttributes::ALL.satisfies(cached));
    }

    #[test]
    fn missing_is_set_difference() {
        let cached = FileAttributes::INFO;
        let wanted = FileAttributes::INFO | FileAttributes::LINK_INFO;

        assert_eq!(cached.missing(wanted), FileAttributes::LINK_INFO);
        assert!(wanted.missing(cached).is_empty());
    }

    #[test]
    fn parses_attribute_lists() {
        assert_eq!(
            FileAttributes::parse_list("info, mime").unwrap(),
            FileAttributes::INFO | FileAttributes::MIME_TYPE
        );
        assert_eq!(FileAttributes::parse_list("all").unwrap(), FileAttributes::ALL);
        assert!(FileAttributes::parse_list("icon").is_err());
    }
}
