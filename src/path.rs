//! Field paths and tree addresses.
//!
//! A field path names a field from the root of the form: `.` descends into
//! groups and either `[i]` or `.i` selects an array item. Both notations parse
//! to the same [`FieldPath`], whose `Display` form is the canonical one used
//! for every map key in the form state (`categoryGroups.0.name`).
//!
//! A tree address (built by [`build_path`]) is the location of one property
//! of a field node inside the definition tree, e.g.
//! `fields.targeting.fields.countries.value`.

use std::fmt;
use std::str::FromStr;

use crate::error::PathError;

/// The node property an address points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Value,
    Loading,
    Options,
}

impl Target {
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Value => "value",
            Target::Loading => "loading",
            Target::Options => "options",
        }
    }

    /// Parse a property name. Returns `None` for anything else.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "value" => Some(Target::Value),
            "loading" => Some(Target::Loading),
            "options" => Some(Target::Options),
            _ => None,
        }
    }
}

/// Build the tree address of `target` for the field named by `parts`.
///
/// The first part resolves to `fields.<part>`, every following part adds a
/// `.fields.<part>` hop, and the target property is appended last. An empty
/// slice yields an empty address.
///
/// ```
/// use form_engine::{build_path, Target};
///
/// assert_eq!(
///     build_path(&["targeting", "countries"], Target::Value),
///     "fields.targeting.fields.countries.value"
/// );
/// ```
pub fn build_path<S: AsRef<str>>(parts: &[S], target: Target) -> String {
    let Some((first, rest)) = parts.split_first() else {
        return String::new();
    };

    let mut address = format!("fields.{}", first.as_ref());
    for part in rest {
        address.push_str(".fields.");
        address.push_str(part.as_ref());
    }
    address.push('.');
    address.push_str(target.as_str());
    address
}

/// Split a tree address back into field-name parts and its target.
///
/// Returns `None` unless the address has exactly the shape produced by
/// [`build_path`].
pub fn parse_address(address: &str) -> Option<(Vec<String>, Target)> {
    let tokens: Vec<&str> = address.split('.').collect();
    if tokens.len() < 3 || tokens.len() % 2 == 0 {
        return None;
    }

    let (last, hops) = tokens.split_last()?;
    let target = Target::parse(last)?;

    let mut parts = Vec::with_capacity(hops.len() / 2);
    for pair in hops.chunks(2) {
        match pair {
            ["fields", name] if !name.is_empty() => parts.push((*name).to_string()),
            _ => return None,
        }
    }
    Some((parts, target))
}

/// One step of a field path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// A named child of the root or of a group, or an item key.
    Name(String),
    /// An array item position.
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Name(name) => f.write_str(name),
            Segment::Index(index) => write!(f, "{}", index),
        }
    }
}

/// A parsed field path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    /// Parse a path in dot, bracket, or mixed notation.
    ///
    /// All-digit segments are array indices, so `items.0.name` and
    /// `items[0].name` are the same path.
    ///
    /// # Errors
    ///
    /// Returns `PathError::Empty` for a blank path and `PathError::Malformed`
    /// for empty segments, unbalanced brackets, non-numeric indices, or a path
    /// that starts with an index.
    pub fn parse(path: &str) -> Result<Self, PathError> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(PathError::Empty);
        }

        let malformed = |reason: &str| PathError::Malformed {
            path: trimmed.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        for piece in trimmed.split('.') {
            if piece.is_empty() {
                return Err(malformed("empty segment"));
            }

            let (head, mut rest) = match piece.find('[') {
                Some(at) => piece.split_at(at),
                None => (piece, ""),
            };

            if !head.is_empty() {
                if head.contains(']') {
                    return Err(malformed("unmatched ']'"));
                }
                segments.push(parse_segment(head).ok_or_else(|| malformed("index too large"))?);
            }

            while !rest.is_empty() {
                let Some(inner) = rest.strip_prefix('[') else {
                    return Err(malformed("unexpected text after ']'"));
                };
                let Some(close) = inner.find(']') else {
                    return Err(malformed("unclosed '['"));
                };
                let index = &inner[..close];
                if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(malformed("array index must be a non-negative integer"));
                }
                let index = index
                    .parse::<usize>()
                    .map_err(|_| malformed("index too large"))?;
                segments.push(Segment::Index(index));
                rest = &inner[close + 1..];
            }
        }

        match segments.first() {
            Some(Segment::Name(_)) => Ok(Self { segments }),
            _ => Err(malformed("path must start with a field name")),
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Segments rendered as strings, indices included.
    pub fn parts(&self) -> Vec<String> {
        self.segments.iter().map(ToString::to_string).collect()
    }

    /// Extend the path with a named child.
    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Name(name.into()));
        Self { segments }
    }

    /// Extend the path with an array item index.
    pub fn item(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Index(index));
        Self { segments }
    }

    /// Tree address of `target` for this path. Indices are kept as plain
    /// parts, matching [`build_path`].
    pub fn address(&self, target: Target) -> String {
        build_path(&self.parts(), target)
    }
}

fn parse_segment(raw: &str) -> Option<Segment> {
    if raw.bytes().all(|b| b.is_ascii_digit()) {
        raw.parse().ok().map(Segment::Index)
    } else {
        Some(Segment::Name(raw.to_string()))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Canonical (dot) form of a path in any notation.
///
/// Paths that do not parse are returned trimmed but otherwise untouched, so
/// a caller can still use them as opaque keys.
pub fn canonicalize(path: &str) -> String {
    match FieldPath::parse(path) {
        Ok(parsed) => parsed.to_string(),
        Err(_) => path.trim().to_string(),
    }
}

/// Canonical path for a JSON Pointer (RFC 6901), e.g. `/items/0/name`.
pub fn from_pointer(pointer: &str) -> String {
    let joined = pointer
        .split('/')
        .skip(1)
        .map(|part| part.replace("~1", "/").replace("~0", "~"))
        .collect::<Vec<_>>()
        .join(".");
    canonicalize(&joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_path_top_level() {
        assert_eq!(build_path(&["name"], Target::Value), "fields.name.value");
    }

    #[test]
    fn build_path_nested_group() {
        assert_eq!(
            build_path(&["targeting", "countries"], Target::Value),
            "fields.targeting.fields.countries.value"
        );
        assert_eq!(
            build_path(&["targeting", "geo", "countries"], Target::Value),
            "fields.targeting.fields.geo.fields.countries.value"
        );
    }

    #[test]
    fn build_path_targets() {
        assert_eq!(
            build_path(&["targeting", "countries"], Target::Loading),
            "fields.targeting.fields.countries.loading"
        );
        assert_eq!(
            build_path(&["bidStrategy"], Target::Options),
            "fields.bidStrategy.options"
        );
    }

    #[test]
    fn build_path_empty() {
        let empty: [&str; 0] = [];
        assert_eq!(build_path(&empty, Target::Value), "");
    }

    #[test]
    fn parse_address_inverts_build_path() {
        let parts = ["a", "b", "c", "d"];
        for depth in 1..=parts.len() {
            let address = build_path(&parts[..depth], Target::Loading);
            let (parsed, target) = parse_address(&address).unwrap();
            assert_eq!(parsed, parts[..depth]);
            assert_eq!(target, Target::Loading);
        }
    }

    #[test]
    fn parse_address_rejects_other_shapes() {
        assert!(parse_address("").is_none());
        assert!(parse_address("fields.name").is_none());
        assert!(parse_address("fields.name.label").is_none());
        assert!(parse_address("nodes.name.value").is_none());
        assert!(parse_address("fields.a.children.b.value").is_none());
    }

    #[test]
    fn bracket_and_dot_notation_are_equivalent() {
        let bracket = FieldPath::parse("categoryGroups[0].name").unwrap();
        let dotted = FieldPath::parse("categoryGroups.0.name").unwrap();
        assert_eq!(bracket, dotted);
        assert_eq!(bracket.to_string(), "categoryGroups.0.name");
        assert_eq!(
            bracket.segments(),
            &[
                Segment::Name("categoryGroups".into()),
                Segment::Index(0),
                Segment::Name("name".into()),
            ]
        );
    }

    #[test]
    fn consecutive_brackets() {
        let path = FieldPath::parse("matrix[1][2]").unwrap();
        assert_eq!(path.to_string(), "matrix.1.2");
    }

    #[test]
    fn malformed_paths() {
        assert_eq!(FieldPath::parse("  "), Err(PathError::Empty));
        for bad in ["a..b", "a[", "a[x]", "a[0]b", "0.name", "[1]", "a]"] {
            assert!(
                matches!(FieldPath::parse(bad), Err(PathError::Malformed { .. })),
                "expected {bad} to be malformed"
            );
        }
    }

    #[test]
    fn canonicalize_normalizes_and_passes_through() {
        assert_eq!(canonicalize("items[3].cpc"), "items.3.cpc");
        assert_eq!(canonicalize("items.3.cpc"), "items.3.cpc");
        assert_eq!(canonicalize("_general"), "_general");
        assert_eq!(canonicalize("a..b"), "a..b");
    }

    #[test]
    fn from_pointer_converts_and_unescapes() {
        assert_eq!(from_pointer("/categoryGroups/0/name"), "categoryGroups.0.name");
        assert_eq!(from_pointer("/a~1b/c~0d"), "a/b.c~d");
        assert_eq!(from_pointer(""), "");
    }

    #[test]
    fn child_and_item_builders() {
        let path = FieldPath::parse("categoryGroups").unwrap().item(2).child("cpc");
        assert_eq!(path.to_string(), "categoryGroups.2.cpc");
        assert_eq!(
            path.address(Target::Value),
            "fields.categoryGroups.fields.2.fields.cpc.value"
        );
    }
}
