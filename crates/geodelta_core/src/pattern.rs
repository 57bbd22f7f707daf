//! Wildcard name filters.
//!
//! In case of doubt about glob syntax, consult
//! <https://docs.rs/globset/latest/globset/#syntax>.

use globset::{GlobBuilder, GlobMatcher};
use std::fmt;
use std::str::FromStr;

/// A case-insensitive glob over container or collection names.
///
/// `*` matches any run of characters and `?` exactly one; character classes
/// such as `[AB]*` are accepted too.
///
/// ```
/// use geodelta_core::NamePattern;
///
/// let pattern = NamePattern::new("hydro*").unwrap();
/// assert!(pattern.matches("HYDRO_WELLS"));
/// assert!(!pattern.matches("ROADS"));
/// assert!(NamePattern::any().matches("anything"));
/// ```
#[derive(Debug, Clone)]
pub struct NamePattern {
    raw: String,
    /// `None` for the match-all pattern.
    matcher: Option<GlobMatcher>,
}

impl NamePattern {
    /// Compiles a pattern.
    ///
    /// # Errors
    ///
    /// Returns the glob error for malformed patterns such as an unclosed
    /// character class.
    pub fn new(pattern: impl Into<String>) -> Result<Self, globset::Error> {
        let raw = pattern.into();
        if raw == "*" {
            return Ok(Self::any());
        }
        let matcher = GlobBuilder::new(&raw)
            .case_insensitive(true)
            .build()?
            .compile_matcher();
        Ok(Self {
            raw,
            matcher: Some(matcher),
        })
    }

    /// The pattern that matches every name.
    #[must_use]
    pub fn any() -> Self {
        Self {
            raw: "*".to_string(),
            matcher: None,
        }
    }

    /// Returns true if the pattern is a bare `*`.
    #[must_use]
    pub fn is_any(&self) -> bool {
        self.matcher.is_none()
    }

    /// Tests a name against the pattern.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.matcher.as_ref().map_or(true, |m| m.is_match(name))
    }

    /// Returns the pattern as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl Default for NamePattern {
    fn default() -> Self {
        Self::any()
    }
}

impl PartialEq for NamePattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for NamePattern {}

impl FromStr for NamePattern {
    type Err = globset::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(p: &str) -> NamePattern {
        NamePattern::new(p).unwrap()
    }

    #[test]
    fn literal_match_is_case_insensitive() {
        let p = pattern("Parcels");
        assert!(p.matches("PARCELS"));
        assert!(p.matches("parcels"));
        assert!(!p.matches("PARCELS_OLD"));
    }

    #[test]
    fn star_positions() {
        assert!(pattern("*_OLD").matches("PARCELS_OLD"));
        assert!(pattern("P*S").matches("PARCELS"));
        assert!(pattern("P*S").matches("PS"));
        assert!(!pattern("P*S").matches("PARCEL"));
        assert!(pattern("*A*B*").matches("xxAyyBzz"));
        assert!(!pattern("*A*B*").matches("xxByyAzz"));
    }

    #[test]
    fn classes_and_single_characters() {
        assert!(pattern("[pr]*").matches("ROADS"));
        assert!(!pattern("[pr]*").matches("WELLS"));
        assert!(pattern("LOT?").matches("lot7"));
        assert!(!pattern("LOT?").matches("LOT77"));
    }

    #[test]
    fn any_matches_empty() {
        assert!(NamePattern::any().is_any());
        assert!(pattern("*").is_any());
        assert!(NamePattern::any().matches(""));
        assert!(!pattern("A").matches(""));
    }

    #[test]
    fn malformed_pattern_is_an_error() {
        assert!(NamePattern::new("PARCELS[").is_err());
        assert!("[a-".parse::<NamePattern>().is_err());
    }
}
