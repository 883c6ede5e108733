//! Identity and classification types shared across the lattice crates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable arena handle for a resource in a graph.
///
/// Keys are never reused within one graph, so a stale key can only ever
/// miss, not alias another resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKey(pub u64);

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rsc#{}", self.0)
    }
}

/// Kind of a constraint edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    /// `first` must start before `then`.
    Order,
    /// `rsc` is placed relative to `with-rsc`.
    Colocation,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintKind::Order => f.write_str("order"),
            ConstraintKind::Colocation => f.write_str("colocation"),
        }
    }
}

/// What a resource represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A managed service (primitive).
    #[default]
    Service,
    /// A group of services that start in sequence on one node.
    Group,
    /// A replicated block-device resource.
    Volume,
}

/// Unordered pair of resources, the index key for connection aggregates.
///
/// `PairKey::new(a, b) == PairKey::new(b, a)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairKey {
    lo: ResourceKey,
    hi: ResourceKey,
}

impl PairKey {
    pub fn new(a: ResourceKey, b: ResourceKey) -> Self {
        if a <= b {
            Self { lo: a, hi: b }
        } else {
            Self { lo: b, hi: a }
        }
    }

    pub fn lo(&self) -> ResourceKey {
        self.lo
    }

    pub fn hi(&self) -> ResourceKey {
        self.hi
    }

    pub fn contains(&self, key: ResourceKey) -> bool {
        self.lo == key || self.hi == key
    }

    /// The endpoint opposite `key`, if `key` is part of this pair.
    pub fn other(&self, key: ResourceKey) -> Option<ResourceKey> {
        if self.lo == key {
            Some(self.hi)
        } else if self.hi == key {
            Some(self.lo)
        } else {
            None
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}~{}", self.lo, self.hi)
    }
}
