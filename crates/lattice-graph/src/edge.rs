//! A single order or colocation constraint between two resources.

use std::collections::BTreeMap;
use std::fmt;

use lattice_core::{ConstraintKind, PairKey, ResourceKey, Score};

/// Well-known constraint attribute names.
pub mod attr {
    pub const SCORE: &str = "score";
    pub const SYMMETRICAL: &str = "symmetrical";
    pub const FIRST_ACTION: &str = "first-action";
    pub const THEN_ACTION: &str = "then-action";
    pub const RSC_ROLE: &str = "rsc-role";
    pub const WITH_RSC_ROLE: &str = "with-rsc-role";
}

/// An order or colocation relationship between two resources.
///
/// For order edges `a` is the `first` resource and `b` the `then`
/// resource. For colocation edges `a` is `rsc` and `b` is `with-rsc`.
/// An edge without an `id` is pending: proposed by the operator but not
/// yet committed to the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintEdge {
    pub kind: ConstraintKind,
    pub a: ResourceKey,
    pub b: ResourceKey,
    pub score: Score,
    pub attributes: BTreeMap<String, String>,
    pub id: Option<String>,
}

impl ConstraintEdge {
    pub fn new(kind: ConstraintKind, a: ResourceKey, b: ResourceKey, score: Score) -> Self {
        Self {
            kind,
            a,
            b,
            score,
            attributes: BTreeMap::new(),
            id: None,
        }
    }

    /// `first` starts before `then`.
    pub fn order(first: ResourceKey, then: ResourceKey, score: Score) -> Self {
        Self::new(ConstraintKind::Order, first, then, score)
    }

    /// `rsc` is placed relative to `with_rsc`.
    pub fn colocation(rsc: ResourceKey, with_rsc: ResourceKey, score: Score) -> Self {
        Self::new(ConstraintKind::Colocation, rsc, with_rsc, score)
    }

    /// A freshly drawn edge carrying only its endpoints.
    pub fn pending(kind: ConstraintKind, a: ResourceKey, b: ResourceKey) -> Self {
        Self::new(kind, a, b, Score::Unset)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn is_pending(&self) -> bool {
        self.id.is_none()
    }

    pub fn pair(&self) -> PairKey {
        PairKey::new(self.a, self.b)
    }

    pub fn touches(&self, key: ResourceKey) -> bool {
        self.a == key || self.b == key
    }

    /// Whether `other` occupies the same upsert slot as `self`.
    ///
    /// Committed edges are identified by id. Pending edges are identified by
    /// kind and ordered endpoints.
    pub(crate) fn same_slot(&self, other: &ConstraintEdge) -> bool {
        if self.kind != other.kind {
            return false;
        }
        match (&self.id, &other.id) {
            (Some(x), Some(y)) => x == y,
            (None, None) => self.a == other.a && self.b == other.b,
            _ => false,
        }
    }

    /// Label used in logs and errors.
    pub fn label(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => format!("pending {} {}->{}", self.kind, self.a, self.b),
        }
    }
}

impl fmt::Display for ConstraintEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}
