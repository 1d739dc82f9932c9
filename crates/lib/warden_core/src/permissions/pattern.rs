//! Path patterns for permission resources.
//!
//! Syntax, per `/`-separated segment: a literal, `{name}` (exactly one
//! segment), `*` (exactly one segment) or `**` (zero or more segments).
//! Empty segments are ignored on both sides, so `/api/persons/` and
//! `api//persons` both match `/api/persons`. A pattern may be narrowed so
//! its placeholder only matches all-digit segments.

use std::fmt;

use super::PermissionError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder { name: String, numeric: bool },
    Single,
    Any,
}

impl Segment {
    fn parse(raw: &str, pattern: &str) -> Result<Self, PermissionError> {
        match raw {
            "*" => return Ok(Segment::Single),
            "**" => return Ok(Segment::Any),
            _ => {}
        }
        let has_open = raw.contains('{');
        let has_close = raw.contains('}');
        if !has_open && !has_close {
            return Ok(Segment::Literal(raw.to_string()));
        }
        let name = raw
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .filter(|name| !name.is_empty() && !name.contains(['{', '}']))
            .ok_or_else(|| {
                PermissionError::RuleBuildFailure(format!(
                    "malformed placeholder '{raw}' in pattern '{pattern}'"
                ))
            })?;
        Ok(Segment::Placeholder {
            name: name.to_string(),
            numeric: false,
        })
    }

    fn matches(&self, segment: &str) -> bool {
        match self {
            Segment::Literal(lit) => lit == segment,
            Segment::Placeholder { numeric: true, .. } => {
                segment.bytes().all(|b| b.is_ascii_digit())
            }
            Segment::Placeholder { .. } | Segment::Single | Segment::Any => true,
        }
    }
}

/// A parsed resource pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parse a pattern. At most one `{placeholder}` and one `**` are allowed.
    pub fn parse(pattern: &str) -> Result<Self, PermissionError> {
        let trimmed = pattern.trim();
        if trimmed.is_empty() {
            return Err(PermissionError::RuleBuildFailure(
                "empty resource pattern".into(),
            ));
        }
        let segments = path_segments(trimmed)
            .map(|s| Segment::parse(s, trimmed))
            .collect::<Result<Vec<_>, _>>()?;
        let placeholders = segments
            .iter()
            .filter(|s| matches!(s, Segment::Placeholder { .. }))
            .count();
        if placeholders > 1 {
            return Err(PermissionError::RuleBuildFailure(format!(
                "pattern '{trimmed}' has {placeholders} placeholders, at most one is supported"
            )));
        }
        let wildcards = segments.iter().filter(|s| matches!(s, Segment::Any)).count();
        if wildcards > 1 {
            return Err(PermissionError::RuleBuildFailure(format!(
                "pattern '{trimmed}' has {wildcards} '**' segments, at most one is supported"
            )));
        }
        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    /// Restrict placeholders to all-digit segments.
    pub fn with_numeric_placeholders(mut self) -> Self {
        for segment in &mut self.segments {
            if let Segment::Placeholder { numeric, .. } = segment {
                *numeric = true;
            }
        }
        self
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Name of the placeholder, if any.
    pub fn placeholder(&self) -> Option<&str> {
        self.segments.iter().find_map(|s| match s {
            Segment::Placeholder { name, .. } => Some(name.as_str()),
            _ => None,
        })
    }

    /// True when `path` (query string excluded) matches this pattern.
    pub fn matches(&self, path: &str) -> bool {
        let parts: Vec<&str> = path_segments(path).collect();
        match_from(&self.segments, &parts)
    }

    /// True when the pattern contains a placeholder.
    pub fn is_templated(&self) -> bool {
        self.placeholder().is_some()
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn match_from(pattern: &[Segment], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((Segment::Any, rest)) => (0..=path.len()).any(|skip| match_from(rest, &path[skip..])),
        Some((segment, rest)) => match path.split_first() {
            Some((head, tail)) => segment.matches(head) && match_from(rest, tail),
            None => false,
        },
    }
}

/// Non-empty `/`-separated segments of a path.
pub fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Canonical form of a path: leading slash, no empty segments.
pub fn normalize_path(path: &str) -> String {
    let joined = path_segments(path).collect::<Vec<_>>().join("/");
    format!("/{joined}")
}
