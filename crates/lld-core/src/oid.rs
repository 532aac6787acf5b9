//! Object identifiers and subtree boundary arithmetic
//!
//! A subtree walk is bounded by the *next sibling* of its base OID: every OID
//! inside the subtree sorts before it, every OID after the subtree sorts at or
//! past it.
//!
//! Two orders are supported. [`OidOrdering::Numeric`] compares arcs as
//! integers and is correct for every OID. [`OidOrdering::LegacyString`]
//! compares the dotted decimal renderings, which is what older discovery
//! scripts did; it misorders multi-digit arcs (`"1.10" < "1.9"`) and is kept
//! only for behaviour-compatible runs.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Numeric object identifier (immutable sequence of arcs)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OidAddress {
    arcs: Vec<u32>,
}

impl OidAddress {
    /// Create an OID from arc values
    pub fn new(arcs: impl IntoIterator<Item = u32>) -> Self {
        Self {
            arcs: arcs.into_iter().collect(),
        }
    }

    /// Parse dotted decimal notation (`"1.3.6.1.2.1.1.5.0"`, leading dot allowed)
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let body = trimmed.strip_prefix('.').unwrap_or(trimmed);

        if body.is_empty() {
            return Err(Error::invalid_oid(format!("empty OID: '{}'", s)));
        }

        let arcs = body
            .split('.')
            .map(|part| {
                part.parse::<u32>()
                    .map_err(|_| Error::invalid_oid(format!("bad arc '{}' in '{}'", part, s)))
            })
            .collect::<Result<Vec<u32>>>()?;

        Ok(Self { arcs })
    }

    /// Arc values
    pub fn arcs(&self) -> &[u32] {
        &self.arcs
    }

    /// Number of arcs
    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    /// Whether the OID has no arcs
    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    /// Trailing arc, used as the row index of a table column
    pub fn last_arc(&self) -> Option<u32> {
        self.arcs.last().copied()
    }

    /// Append one arc (`sysName` + `0` → `sysName.0`)
    pub fn child(&self, arc: u32) -> OidAddress {
        let mut arcs = self.arcs.clone();
        arcs.push(arc);
        OidAddress { arcs }
    }

    /// Append several arcs
    pub fn extend(&self, suffix: &[u32]) -> OidAddress {
        let mut arcs = self.arcs.clone();
        arcs.extend_from_slice(suffix);
        OidAddress { arcs }
    }

    /// The first OID past this subtree: last arc incremented by one
    ///
    /// `1.3.6.1.2.1.25.2.3.1.2` → `1.3.6.1.2.1.25.2.3.1.3`
    pub fn next_sibling(&self) -> Result<OidAddress> {
        let (last, head) = self
            .arcs
            .split_last()
            .ok_or_else(|| Error::invalid_oid("an empty OID has no sibling"))?;

        let bumped = last
            .checked_add(1)
            .ok_or_else(|| Error::invalid_oid(format!("last arc of {} cannot be incremented", self)))?;

        let mut arcs = head.to_vec();
        arcs.push(bumped);
        Ok(OidAddress { arcs })
    }
}

impl fmt::Display for OidAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arc in &self.arcs {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{}", arc)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for OidAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<&[u32]> for OidAddress {
    fn from(arcs: &[u32]) -> Self {
        Self::new(arcs.iter().copied())
    }
}

impl Serialize for OidAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for OidAddress {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        OidAddress::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// How the walk compares a response OID against its boundary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OidOrdering {
    /// Arc-by-arc integer comparison
    #[default]
    Numeric,
    /// Comparison of dotted decimal strings (legacy behaviour)
    LegacyString,
}

impl OidOrdering {
    /// Compare two OIDs under this ordering
    pub fn compare(self, a: &OidAddress, b: &OidAddress) -> Ordering {
        match self {
            OidOrdering::Numeric => a.cmp(b),
            OidOrdering::LegacyString => a.to_string().cmp(&b.to_string()),
        }
    }

    /// `current < boundary` under this ordering
    pub fn is_before_boundary(self, current: &OidAddress, boundary: &OidAddress) -> bool {
        self.compare(current, boundary) == Ordering::Less
    }
}
