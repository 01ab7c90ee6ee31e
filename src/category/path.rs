//! Materialized paths.
//!
//! A path is a dot-separated list of sibling ordinals, `"3.1.12"`, where every
//! prefix is the path of an ancestor. Paths order by the numeric value of their
//! segments, so `"1.2.2"` sorts before `"1.2.10"`. Malformed text is rejected
//! with [`CategoryError::MalformedPath`] instead of being coerced.

use super::error::{CategoryError, CategoryResult};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

const SEPARATOR: char = '.';

/// Largest ordinal a segment may hold. Ordinals are stored in SQLite
/// `INTEGER` columns, which are signed 64 bit.
pub const MAX_ORDINAL: u64 = i64::MAX as u64;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MaterializedPath {
    segments: Vec<u64>,
}

impl MaterializedPath {
    /// Path of a root category with the given ordinal.
    pub fn root(ordinal: u64) -> Self {
        MaterializedPath {
            segments: vec![ordinal],
        }
    }

    pub fn parse(s: &str) -> CategoryResult<Self> {
        if s.is_empty() {
            return Err(CategoryError::malformed_path(s, "empty path"));
        }
        let segments = s
            .split(SEPARATOR)
            .map(|segment| parse_segment(s, segment))
            .collect::<CategoryResult<Vec<_>>>()?;
        Ok(MaterializedPath { segments })
    }

    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    /// Root level is 0.
    pub fn level(&self) -> u32 {
        (self.segments.len() - 1) as u32
    }

    /// This node's ordinal among its siblings.
    pub fn last_ordinal(&self) -> u64 {
        // segments is never empty, enforced by every constructor
        self.segments[self.segments.len() - 1]
    }

    pub fn parent(&self) -> Option<MaterializedPath> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(MaterializedPath {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn child(&self, ordinal: u64) -> MaterializedPath {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend_from_slice(&self.segments);
        segments.push(ordinal);
        MaterializedPath { segments }
    }

    /// Strict descendant check: a path is not its own descendant.
    pub fn is_descendant_of(&self, ancestor: &MaterializedPath) -> bool {
        self.segments.len() > ancestor.segments.len() && self.segments.starts_with(&ancestor.segments)
    }

    pub fn is_self_or_descendant_of(&self, ancestor: &MaterializedPath) -> bool {
        self == ancestor || self.is_descendant_of(ancestor)
    }

    /// Swaps the `old_prefix` part of this path for `new_prefix`, returning
    /// `None` if this path does not live under `old_prefix`.
    pub fn with_prefix_replaced(
        &self,
        old_prefix: &MaterializedPath,
        new_prefix: &MaterializedPath,
    ) -> Option<MaterializedPath> {
        if !self.is_self_or_descendant_of(old_prefix) {
            return None;
        }
        let mut segments = new_prefix.segments.clone();
        segments.extend_from_slice(&self.segments[old_prefix.segments.len()..]);
        Some(MaterializedPath { segments })
    }
}

fn parse_segment(path: &str, segment: &str) -> CategoryResult<u64> {
    if segment.is_empty() {
        return Err(CategoryError::malformed_path(path, "empty segment"));
    }
    if !segment.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CategoryError::malformed_path(
            path,
            format!("segment '{}' is not a number", segment),
        ));
    }
    if segment.starts_with('0') {
        return Err(CategoryError::malformed_path(
            path,
            format!("segment '{}' is zero or has a leading zero", segment),
        ));
    }
    match segment.parse::<u64>() {
        Ok(ordinal) if ordinal <= MAX_ORDINAL => Ok(ordinal),
        _ => Err(CategoryError::malformed_path(
            path,
            format!("segment '{}' overflows", segment),
        )),
    }
}

impl FromStr for MaterializedPath {
    type Err = CategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MaterializedPath::parse(s)
    }
}

impl fmt::Display for MaterializedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", SEPARATOR)?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

impl Ord for MaterializedPath {
    /// Segment by segment, a shorter path sorts first on a common prefix.
    fn cmp(&self, other: &Self) -> Ordering {
        self.segments.cmp(&other.segments)
    }
}

impl PartialOrd for MaterializedPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// String-level helpers over persisted path text.

pub fn compare(a: &str, b: &str) -> CategoryResult<Ordering> {
    Ok(MaterializedPath::parse(a)?.cmp(&MaterializedPath::parse(b)?))
}

pub fn level(path: &str) -> CategoryResult<u32> {
    Ok(MaterializedPath::parse(path)?.level())
}

pub fn parent_path(path: &str) -> CategoryResult<Option<String>> {
    Ok(MaterializedPath::parse(path)?.parent().map(|p| p.to_string()))
}

pub fn child_path(parent: Option<&str>, ordinal: u64) -> CategoryResult<String> {
    if ordinal == 0 {
        return Err(CategoryError::malformed_path(
            &ordinal.to_string(),
            "ordinals start at 1",
        ));
    }
    if ordinal > MAX_ORDINAL {
        return Err(CategoryError::malformed_path(
            &ordinal.to_string(),
            "ordinal overflows",
        ));
    }
    Ok(match parent {
        Some(parent) => MaterializedPath::parse(parent)?.child(ordinal).to_string(),
        None => MaterializedPath::root(ordinal).to_string(),
    })
}

pub fn is_descendant_of(path: &str, ancestor: &str) -> CategoryResult<bool> {
    Ok(MaterializedPath::parse(path)?.is_descendant_of(&MaterializedPath::parse(ancestor)?))
}
