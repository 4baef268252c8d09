//! Distinguished-name parsing and composition.
//!
//! Resource identifiers in this system are directory distinguished names.
//! Parsing is intentionally strict so malformed identifiers surface as
//! client errors before any directory round-trip.

use scim_core::error::Error as CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur when parsing or manipulating distinguished names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DnError {
    /// The distinguished name was empty.
    #[error("distinguished name cannot be empty")]
    Empty,
    /// A component in the distinguished name was invalid.
    #[error("invalid distinguished name component: {0}")]
    InvalidComponent(String),
    /// A component was missing the attribute name to the left of the `=`.
    #[error("distinguished name component missing attribute: {0}")]
    MissingAttribute(String),
    /// A component was missing the value to the right of the `=`.
    #[error("distinguished name component missing value for attribute {0}")]
    MissingValue(String),
    /// The distinguished name ended with an escape character.
    #[error("distinguished name contains an unterminated escape sequence")]
    UnterminatedEscape,
}

impl From<DnError> for CoreError {
    fn from(err: DnError) -> Self {
        CoreError::MalformedValue(err.to_string())
    }
}

/// A relative distinguished name: one or more attribute/value pairs
/// (multiple pairs are `+`-joined in the string form).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rdn {
    pairs: Vec<(String, String)>,
}

impl Rdn {
    /// Creates an RDN from a single attribute/value pair.
    #[must_use]
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            pairs: vec![(attribute.into(), value.into())],
        }
    }

    /// Appends an additional attribute/value pair, forming a multi-valued RDN.
    #[must_use]
    pub fn and(mut self, attribute: impl Into<String>, value: impl Into<String>) -> Self {
        self.pairs.push((attribute.into(), value.into()));
        self
    }

    /// The attribute/value pairs of this RDN, in order.
    #[must_use]
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Returns the value for the given attribute (case-insensitive).
    #[must_use]
    pub fn value_of(&self, attribute: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(attribute))
            .map(|(_, value)| value.as_str())
    }
}

impl fmt::Display for Rdn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (attribute, value)) in self.pairs.iter().enumerate() {
            if idx > 0 {
                f.write_str("+")?;
            }
            write!(f, "{attribute}={}", escape_value(value))?;
        }
        Ok(())
    }
}

/// A parsed distinguished name.
///
/// Keeps the canonical string form alongside the parsed RDN sequence, most
/// specific component first.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct Dn {
    raw: String,
    rdns: Vec<Rdn>,
}

impl Dn {
    /// Parses a distinguished name from its string form.
    ///
    /// # Errors
    ///
    /// Returns [`DnError`] when the input is empty or syntactically invalid.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, DnError> {
        let input = input.as_ref().trim();
        if input.is_empty() {
            return Err(DnError::Empty);
        }

        let mut rdns = Vec::new();
        for component in split_unescaped(input, ',')? {
            if component.is_empty() {
                return Err(DnError::InvalidComponent(input.to_string()));
            }

            let mut pairs = Vec::new();
            for part in split_unescaped(&component, '+')? {
                if part.is_empty() {
                    return Err(DnError::InvalidComponent(component.clone()));
                }
                pairs.push(parse_pair(&part)?);
            }

            rdns.push(Rdn { pairs });
        }

        Ok(Self {
            raw: render(&rdns),
            rdns,
        })
    }

    /// Builds a DN from an RDN and a parent DN, for naming created entries.
    #[must_use]
    pub fn child_of(rdn: Rdn, parent: &Dn) -> Self {
        let mut rdns = Vec::with_capacity(parent.rdns.len() + 1);
        rdns.push(rdn);
        rdns.extend(parent.rdns.iter().cloned());
        Self {
            raw: render(&rdns),
            rdns,
        }
    }

    /// The canonical string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The RDN sequence, most specific component first.
    #[must_use]
    pub fn rdns(&self) -> &[Rdn] {
        &self.rdns
    }

    /// The leading (most specific) RDN.
    #[must_use]
    pub fn leading_rdn(&self) -> &Rdn {
        &self.rdns[0]
    }

    /// The parent DN, or `None` for a single-component name.
    #[must_use]
    pub fn parent(&self) -> Option<Dn> {
        if self.rdns.len() < 2 {
            return None;
        }
        let rdns = self.rdns[1..].to_vec();
        Some(Self {
            raw: render(&rdns),
            rdns,
        })
    }

    /// Returns the first value of the named attribute anywhere in the DN
    /// (case-insensitive).
    #[must_use]
    pub fn value_of(&self, attribute: &str) -> Option<&str> {
        self.rdns.iter().find_map(|rdn| rdn.value_of(attribute))
    }

    /// A case-folded form used for identity comparison; directory names
    /// compare case-insensitively.
    #[must_use]
    pub fn normalized(&self) -> String {
        self.raw.to_ascii_lowercase()
    }
}

impl PartialEq for Dn {
    fn eq(&self, other: &Self) -> bool {
        self.raw.eq_ignore_ascii_case(&other.raw)
    }
}

impl fmt::Display for Dn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Dn {
    type Err = DnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for Dn {
    type Error = DnError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

fn parse_pair(component: &str) -> Result<(String, String), DnError> {
    let mut escaped = false;
    let mut split_at = None;
    for (idx, ch) in component.char_indices() {
        if escaped {
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == '=' {
            split_at = Some(idx);
            break;
        }
    }

    let idx = split_at.ok_or_else(|| DnError::InvalidComponent(component.to_string()))?;
    let attribute = component[..idx].trim();
    let value = component[idx + 1..].trim_start();

    if attribute.is_empty() {
        return Err(DnError::MissingAttribute(component.to_string()));
    }
    if value.is_empty() {
        return Err(DnError::MissingValue(attribute.to_string()));
    }

    Ok((attribute.to_string(), unescape_value(value)?))
}

fn split_unescaped(input: &str, delimiter: char) -> Result<Vec<String>, DnError> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escaped = false;

    for ch in input.chars() {
        if escaped {
            current.push('\\');
            current.push(ch);
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == delimiter {
            parts.push(current.trim().to_string());
            current.clear();
        } else {
            current.push(ch);
        }
    }

    if escaped {
        return Err(DnError::UnterminatedEscape);
    }

    parts.push(current.trim().to_string());
    if parts.iter().any(String::is_empty) {
        return Err(DnError::InvalidComponent(input.to_string()));
    }
    Ok(parts)
}

fn unescape_value(value: &str) -> Result<String, DnError> {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            let next = chars.next().ok_or(DnError::UnterminatedEscape)?;
            result.push(next);
        } else {
            result.push(ch);
        }
    }
    Ok(result)
}

fn escape_value(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut escaped = String::with_capacity(value.len());

    for (idx, ch) in chars.iter().enumerate() {
        let needs_escape = matches!(ch, ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=')
            || (idx == 0 && (*ch == ' ' || *ch == '#'))
            || (idx == chars.len() - 1 && *ch == ' ');
        if needs_escape {
            escaped.push('\\');
        }
        escaped.push(*ch);
    }

    escaped
}

fn render(rdns: &[Rdn]) -> String {
    rdns.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
