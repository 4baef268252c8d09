//! Client-requested attribute projection.

use std::collections::HashSet;

/// The set of attributes a client asked the server to return.
///
/// Parsed from the request's projection parameter. Matching is
/// case-insensitive, and names that no resource kind declares are accepted
/// silently; they simply never match a produced attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeSelection {
    /// Every attribute is requested.
    All,
    /// Only the named attributes are requested. An empty set requests only
    /// the `id` pseudo-attribute.
    Named(HashSet<String>),
}

impl AttributeSelection {
    /// Creates a selection that requests every attribute.
    #[must_use]
    pub const fn all() -> Self {
        Self::All
    }

    /// Creates a selection from explicitly listed attribute names.
    #[must_use]
    pub fn named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::Named(
            names
                .into_iter()
                .map(|name| name.as_ref().trim().to_ascii_lowercase())
                .filter(|name| !name.is_empty())
                .collect(),
        )
    }

    /// Parses the projection query parameter.
    ///
    /// An absent parameter selects all attributes; a present parameter is a
    /// comma-separated list of attribute names.
    #[must_use]
    pub fn from_query(parameter: Option<&str>) -> Self {
        match parameter {
            None => Self::All,
            Some(list) => Self::named(list.split(',')),
        }
    }

    /// Returns true when the named attribute should be included in the
    /// response.
    #[must_use]
    pub fn is_requested(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Named(names) => {
                if names.is_empty() {
                    return name.eq_ignore_ascii_case("id");
                }
                names.contains(&name.to_ascii_lowercase())
            }
        }
    }
}

impl Default for AttributeSelection {
    fn default() -> Self {
        Self::All
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_requests_everything() {
        let selection = AttributeSelection::all();
        assert!(selection.is_requested("id"));
        assert!(selection.is_requested("userName"));
        assert!(selection.is_requested("anything"));
    }

    #[test]
    fn named_matching_is_case_insensitive() {
        let selection = AttributeSelection::from_query(Some("username,good night + good luck?"));
        assert!(selection.is_requested("userName"));
        assert!(selection.is_requested("USERNAME"));
        assert!(!selection.is_requested("id"));
        assert!(!selection.is_requested("name"));
    }

    #[test]
    fn empty_selection_requests_only_id() {
        let selection = AttributeSelection::from_query(Some(""));
        assert!(selection.is_requested("id"));
        assert!(!selection.is_requested("userName"));
    }

    #[test]
    fn absent_parameter_selects_all() {
        assert_eq!(AttributeSelection::from_query(None), AttributeSelection::All);
    }

    #[test]
    fn unknown_names_are_accepted() {
        let selection = AttributeSelection::named(["no such attribute"]);
        assert!(!selection.is_requested("userName"));
    }
}
