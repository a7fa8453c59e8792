//! Shared primitives for the ms plugin crates.
//!
//! Identity types handed in by the host, content hashing and a handful of
//! string helpers that the digging and resource pack crates both rely on.

pub mod hash;
pub mod id;

pub use hash::{name_uuid_from_bytes, sha1_hex, sha1_hex_reader, to_hex, HASH_BUFFER_SIZE, SHA1_HEX_LEN};
pub use id::{BlockPos, PlayerId};

/// Returns true if the string is absent, empty or whitespace only.
#[inline]
pub fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |s| s.trim().is_empty())
}

/// Returns the string if it carries any non-whitespace content.
#[inline]
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_helpers() {
        assert!(is_blank(None));
        assert!(is_blank(Some("")));
        assert!(is_blank(Some(" \t\n")));
        assert!(!is_blank(Some(" a ")));

        assert_eq!(non_blank(Some("  ")), None);
        assert_eq!(non_blank(Some("tag")), Some("tag"));
    }
}
