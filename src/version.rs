//! Fragment versions and version-range constraints
//!
//! A fragment version is the dotted numeric tail of a file name
//! (`web.v2.1.yaml` carries `2.1`), optionally ending in a pre-release
//! tag (`1.5a0`, `2.0-rc1`). A [`VersionSpec`] is a comma-separated list
//! of comparators (`>=1.0.0, <2.0.0`); a version matches the spec when it
//! satisfies every comparator.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Error produced when a version or constraint string fails to parse
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ParseVersionError {
    message: String,
}

impl ParseVersionError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A parsed fragment version: dotted numeric components plus an optional
/// pre-release tail on the final component.
///
/// Trailing zero components are insignificant for comparison: `2.1` and
/// `2.1.0` are equal. A version without a pre-release tail orders after
/// the same numeric version with one (`1.5a0 < 1.5`).
#[derive(Debug, Clone)]
pub struct Version {
    parts: Vec<u64>,
    pre: Option<String>,
    repr: String,
}

impl Version {
    /// The leading numeric components, as parsed.
    pub fn parts(&self) -> &[u64] {
        &self.parts
    }

    /// The pre-release tail, if any.
    pub fn pre(&self) -> Option<&str> {
        self.pre.as_deref()
    }

    fn part_or_zero(&self, idx: usize) -> u64 {
        self.parts.get(idx).copied().unwrap_or(0)
    }
}

impl FromStr for Version {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseVersionError::new("empty version"));
        }

        let mut parts = Vec::new();
        let mut pre = None;
        let components: Vec<&str> = s.split('.').collect();
        let last = components.len() - 1;

        for (idx, component) in components.iter().enumerate() {
            let digits_end = component
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(component.len());
            if digits_end == 0 {
                return Err(ParseVersionError::new(format!(
                    "component '{}' of version '{}' does not start with a digit",
                    component, s
                )));
            }

            let number: u64 = component[..digits_end].parse().map_err(|_| {
                ParseVersionError::new(format!(
                    "numeric component '{}' of version '{}' is out of range",
                    &component[..digits_end],
                    s
                ))
            })?;
            parts.push(number);

            let tail = &component[digits_end..];
            if !tail.is_empty() {
                if idx != last {
                    return Err(ParseVersionError::new(format!(
                        "unexpected suffix '{}' inside version '{}'",
                        tail, s
                    )));
                }
                pre = Some(tail.to_string());
            }
        }

        Ok(Self {
            parts,
            pre,
            repr: s.to_string(),
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let width = self.parts.len().max(other.parts.len());
        for idx in 0..width {
            match self.part_or_zero(idx).cmp(&other.part_or_zero(idx)) {
                Ordering::Equal => {}
                unequal => return unequal,
            }
        }

        // Release > pre-release of the same numeric version.
        match (&self.pre, &other.pre) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
    Ge,
    Gt,
    Le,
    Lt,
    /// `~=X.Y[.Z]`: at least the given version, below the next release of
    /// its second-to-last component.
    Compatible,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Comparator {
    op: Op,
    version: Version,
}

impl Comparator {
    fn matches(&self, candidate: &Version) -> bool {
        match self.op {
            Op::Eq => candidate == &self.version,
            Op::Ne => candidate != &self.version,
            Op::Ge => candidate >= &self.version,
            Op::Gt => candidate > &self.version,
            Op::Le => candidate <= &self.version,
            Op::Lt => candidate < &self.version,
            Op::Compatible => {
                let upper = self.compatible_upper_bound();
                candidate >= &self.version && candidate < &upper
            }
        }
    }

    fn compatible_upper_bound(&self) -> Version {
        // `~=` requires at least two components (checked at parse time),
        // so `parts` is never shorter than 2 here.
        let mut parts: Vec<u64> = self.version.parts[..self.version.parts.len() - 1].to_vec();
        if let Some(last) = parts.last_mut() {
            *last += 1;
        }
        let repr = parts
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(".");
        Version {
            parts,
            pre: None,
            repr,
        }
    }
}

impl FromStr for Comparator {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (op, rest) = if let Some(rest) = s.strip_prefix(">=") {
            (Op::Ge, rest)
        } else if let Some(rest) = s.strip_prefix("<=") {
            (Op::Le, rest)
        } else if let Some(rest) = s.strip_prefix("==") {
            (Op::Eq, rest)
        } else if let Some(rest) = s.strip_prefix("!=") {
            (Op::Ne, rest)
        } else if let Some(rest) = s.strip_prefix("~=") {
            (Op::Compatible, rest)
        } else if let Some(rest) = s.strip_prefix('>') {
            (Op::Gt, rest)
        } else if let Some(rest) = s.strip_prefix('<') {
            (Op::Lt, rest)
        } else {
            return Err(ParseVersionError::new(format!(
                "comparator '{}' has no operator (expected ==, !=, >=, >, <=, < or ~=)",
                s
            )));
        };

        let version: Version = rest.parse()?;
        if op == Op::Compatible && version.parts.len() < 2 {
            return Err(ParseVersionError::new(format!(
                "'~={}' needs at least two version components",
                version
            )));
        }

        Ok(Self { op, version })
    }
}

/// A version-range predicate: comma-separated comparators, all of which
/// must hold for a version to match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSpec {
    comparators: Vec<Comparator>,
    repr: String,
}

impl VersionSpec {
    /// The spec matching every version (`>=0`).
    pub fn any() -> Self {
        ">=0".parse().unwrap_or_else(|_| unreachable!())
    }

    /// True when `candidate` satisfies every comparator.
    pub fn matches(&self, candidate: &Version) -> bool {
        self.comparators.iter().all(|c| c.matches(candidate))
    }
}

impl Default for VersionSpec {
    fn default() -> Self {
        Self::any()
    }
}

impl FromStr for VersionSpec {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ParseVersionError::new("empty version constraint"));
        }

        let comparators = trimmed
            .split(',')
            .map(str::parse)
            .collect::<Result<Vec<Comparator>, _>>()?;

        Ok(Self {
            comparators,
            repr: trimmed.to_string(),
        })
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr)
    }
}

impl Serialize for VersionSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.repr)
    }
}

impl<'de> Deserialize<'de> for VersionSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}
