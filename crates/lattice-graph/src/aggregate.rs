//! Connection aggregate — every constraint between one pair of resources.
//!
//! A pair may carry order and colocation edges at the same time, and
//! several of each (e.g. `A before B` and `B before A`). The aggregate
//! answers the questions the presentation layer asks about the pair as a
//! whole: what is the net colocation preference, is there any effective
//! ordering, and do the edges point in contradictory directions.
//!
//! # Locking
//!
//! Queries take the read lock, structural changes the write lock. All
//! access goes through [`ConnectionAggregate::read_edges`] and
//! [`ConnectionAggregate::write_edges`], so guards are released on every
//! exit path including early error returns. The lock is not reentrant:
//! closures passed to these helpers must not call back into the same
//! aggregate.

use std::collections::BTreeSet;
use std::fmt;

use lattice_core::{ConstraintKind, PairKey, ResourceKey, Score};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::edge::ConstraintEdge;
use crate::error::{GraphError, GraphResult};

/// Classification of the summed colocation score of an aggregate.
///
/// `Mixed` is the undecided state: both hard rules are present, or there
/// is nothing to decide. It does not mean "positive".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColocationScoreClass {
    Mixed,
    Infinity,
    MinusInfinity,
    Null,
    Negative,
    Positive,
}

impl fmt::Display for ColocationScoreClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Mixed => "mixed",
            Self::Infinity => "infinity",
            Self::MinusInfinity => "-infinity",
            Self::Null => "null",
            Self::Negative => "negative",
            Self::Positive => "positive",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Default)]
struct AggregateEdges {
    orders: Vec<ConstraintEdge>,
    colocations: Vec<ConstraintEdge>,
}

impl AggregateEdges {
    fn bucket(&self, kind: ConstraintKind) -> &Vec<ConstraintEdge> {
        match kind {
            ConstraintKind::Order => &self.orders,
            ConstraintKind::Colocation => &self.colocations,
        }
    }

    fn bucket_mut(&mut self, kind: ConstraintKind) -> &mut Vec<ConstraintEdge> {
        match kind {
            ConstraintKind::Order => &mut self.orders,
            ConstraintKind::Colocation => &mut self.colocations,
        }
    }

    fn is_empty(&self) -> bool {
        self.orders.is_empty() && self.colocations.is_empty()
    }
}

/// All constraints between one unordered pair of resources.
#[derive(Debug)]
pub struct ConnectionAggregate {
    pair: PairKey,
    edges: RwLock<AggregateEdges>,
    /// Unfiltered colocation class, cleared by every mutation.
    cached_colocation: Mutex<Option<ColocationScoreClass>>,
}

impl ConnectionAggregate {
    pub fn new(pair: PairKey) -> Self {
        Self {
            pair,
            edges: RwLock::new(AggregateEdges::default()),
            cached_colocation: Mutex::new(None),
        }
    }

    pub fn pair(&self) -> PairKey {
        self.pair
    }

    fn read_edges<R>(&self, f: impl FnOnce(&AggregateEdges) -> R) -> R {
        let guard = self.edges.read();
        f(&guard)
    }

    fn write_edges<R>(&self, f: impl FnOnce(&mut AggregateEdges) -> R) -> R {
        let mut guard = self.edges.write();
        let result = f(&mut guard);
        *self.cached_colocation.lock() = None;
        result
    }

    /// Insert `edge`, or update the edge occupying the same slot in place.
    ///
    /// A committed edge whose id is not yet present replaces a pending edge
    /// of the same kind and direction, which is how a drawn edge becomes a
    /// committed one.
    pub fn add_edge(&self, edge: ConstraintEdge) -> GraphResult<()> {
        if edge.pair() != self.pair {
            return Err(GraphError::EndpointMismatch {
                edge: edge.label(),
                pair: self.pair,
            });
        }
        self.write_edges(|edges| {
            let bucket = edges.bucket_mut(edge.kind);
            if let Some(existing) = bucket.iter_mut().find(|e| e.same_slot(&edge)) {
                existing.a = edge.a;
                existing.b = edge.b;
                existing.score = edge.score;
                existing.attributes = edge.attributes;
                debug!(pair = %self.pair, edge = %existing, "constraint edge updated");
                return;
            }
            if edge.id.is_some() {
                if let Some(pending) = bucket
                    .iter_mut()
                    .find(|e| e.is_pending() && e.a == edge.a && e.b == edge.b)
                {
                    debug!(pair = %self.pair, edge = %edge, "pending edge committed");
                    *pending = edge;
                    return;
                }
            }
            debug!(pair = %self.pair, edge = %edge, "constraint edge added");
            bucket.push(edge);
        });
        Ok(())
    }

    /// Remove every edge carrying `id`. Returns whether the aggregate is now
    /// empty.
    pub fn remove_edge(&self, id: &str) -> bool {
        self.write_edges(|edges| {
            edges.orders.retain(|e| e.id.as_deref() != Some(id));
            edges.colocations.retain(|e| e.id.as_deref() != Some(id));
            debug!(pair = %self.pair, edge_id = id, "constraint edge removed");
            edges.is_empty()
        })
    }

    /// Remove the pending edge of `kind` from `a` to `b`. Returns whether the
    /// aggregate is now empty.
    pub fn remove_pending(&self, kind: ConstraintKind, a: ResourceKey, b: ResourceKey) -> bool {
        self.write_edges(|edges| {
            edges
                .bucket_mut(kind)
                .retain(|e| !(e.is_pending() && e.a == a && e.b == b));
            edges.is_empty()
        })
    }

    /// Drop every edge. Used when a resource of the pair is removed.
    pub(crate) fn clear(&self) {
        self.write_edges(|edges| {
            edges.orders.clear();
            edges.colocations.clear();
        });
    }

    /// Drop edges whose endpoint fails `exists`. Returns the dropped edges.
    pub(crate) fn drop_edges_where(
        &self,
        mut dangling: impl FnMut(&ConstraintEdge) -> bool,
    ) -> Vec<ConstraintEdge> {
        self.write_edges(|edges| {
            let mut dropped = Vec::new();
            for bucket in [&mut edges.orders, &mut edges.colocations] {
                let (gone, kept): (Vec<_>, Vec<_>) = bucket.drain(..).partition(|e| dangling(e));
                *bucket = kept;
                dropped.extend(gone);
            }
            dropped
        })
    }

    pub fn is_empty(&self) -> bool {
        self.read_edges(AggregateEdges::is_empty)
    }

    pub fn len(&self) -> usize {
        self.read_edges(|edges| edges.orders.len() + edges.colocations.len())
    }

    pub fn has_order(&self) -> bool {
        self.read_edges(|edges| !edges.orders.is_empty())
    }

    pub fn has_colocation(&self) -> bool {
        self.read_edges(|edges| !edges.colocations.is_empty())
    }

    /// Snapshot of all edges, orders first.
    pub fn edges(&self) -> Vec<ConstraintEdge> {
        self.read_edges(|edges| {
            edges
                .orders
                .iter()
                .chain(edges.colocations.iter())
                .cloned()
                .collect()
        })
    }

    /// Snapshot of the edges of one kind.
    pub fn edges_of(&self, kind: ConstraintKind) -> Vec<ConstraintEdge> {
        self.read_edges(|edges| edges.bucket(kind).clone())
    }

    pub fn edge(&self, id: &str) -> Option<ConstraintEdge> {
        self.read_edges(|edges| {
            edges
                .orders
                .iter()
                .chain(edges.colocations.iter())
                .find(|e| e.id.as_deref() == Some(id))
                .cloned()
        })
    }

    /// Net colocation preference of the pair.
    ///
    /// With both filters set only edges between exactly those two
    /// resources count (in either direction); with one filter set only
    /// edges touching it count. Infinite scores raise flags instead of
    /// entering the finite sum, so any hard rule dominates finite votes.
    pub fn net_colocation_score(
        &self,
        filter_a: Option<ResourceKey>,
        filter_b: Option<ResourceKey>,
    ) -> ColocationScoreClass {
        let unfiltered = filter_a.is_none() && filter_b.is_none();
        // The cache is read and filled under the read lock so a concurrent
        // writer cannot slip a mutation between computing and storing.
        self.read_edges(|edges| {
            let mut cache = self.cached_colocation.lock();
            if unfiltered {
                if let Some(cached) = *cache {
                    return cached;
                }
            }
            let matching = edges
                .colocations
                .iter()
                .filter(|e| colocation_filter(e, filter_a, filter_b));
            let class = classify_colocation(matching);
            if class == ColocationScoreClass::Mixed && !edges.colocations.is_empty() {
                debug!(pair = %self.pair, "colocation score undecided");
            }
            if unfiltered {
                *cache = Some(class);
            }
            class
        })
    }

    /// Whether the pair has no effective ordering from `first` to `then`.
    ///
    /// Negative order scores do not order anything and clamp to zero. A pair
    /// with no order edges reports the same as one whose scores sum to zero;
    /// use [`ConnectionAggregate::has_order`] to tell them apart.
    pub fn is_order_score_null(
        &self,
        first: Option<ResourceKey>,
        then: Option<ResourceKey>,
    ) -> bool {
        self.read_edges(|edges| {
            let sum = edges
                .orders
                .iter()
                .filter(|e| first.is_none_or(|f| e.a == f) && then.is_none_or(|t| e.b == t))
                .map(|e| e.score.clamped_non_negative())
                .fold(0i64, i64::saturating_add);
            sum == 0
        })
    }

    /// Whether edges of `kind` point in more than one direction once each
    /// endpoint is collapsed to its containing group by `group_of`.
    pub fn has_two_directions(
        &self,
        kind: ConstraintKind,
        group_of: impl Fn(ResourceKey) -> ResourceKey,
    ) -> bool {
        self.read_edges(|edges| {
            let directions: BTreeSet<(ResourceKey, ResourceKey)> = edges
                .bucket(kind)
                .iter()
                .map(|e| (group_of(e.a), group_of(e.b)))
                .collect();
            if directions.len() > 1 {
                warn!(pair = %self.pair, %kind, "constraints point in both directions");
            }
            directions.len() > 1
        })
    }

    /// Whether some colocation edge places another resource with `key`.
    ///
    /// Defaults to `false` when no colocation edge names `key` as its
    /// with-rsc endpoint.
    pub fn is_with_rsc(&self, key: ResourceKey) -> bool {
        self.read_edges(|edges| edges.colocations.iter().any(|e| e.b == key))
    }
}

fn colocation_filter(
    edge: &ConstraintEdge,
    filter_a: Option<ResourceKey>,
    filter_b: Option<ResourceKey>,
) -> bool {
    match (filter_a, filter_b) {
        (Some(x), Some(y)) => edge.pair() == PairKey::new(x, y),
        (Some(x), None) | (None, Some(x)) => edge.touches(x),
        (None, None) => true,
    }
}

fn classify_colocation<'a>(edges: impl Iterator<Item = &'a ConstraintEdge>) -> ColocationScoreClass {
    let mut count = 0usize;
    let mut plus_inf = false;
    let mut minus_inf = false;
    let mut sum: i64 = 0;
    for edge in edges {
        count += 1;
        match edge.score {
            Score::PlusInfinity => plus_inf = true,
            Score::MinusInfinity => minus_inf = true,
            Score::Conflict => {
                plus_inf = true;
                minus_inf = true;
            }
            other => sum = sum.saturating_add(other.finite()),
        }
    }
    if count == 0 || (plus_inf && minus_inf) {
        ColocationScoreClass::Mixed
    } else if plus_inf {
        ColocationScoreClass::Infinity
    } else if minus_inf {
        ColocationScoreClass::MinusInfinity
    } else if sum == 0 {
        ColocationScoreClass::Null
    } else if sum < 0 {
        ColocationScoreClass::Negative
    } else {
        ColocationScoreClass::Positive
    }
}
