//! Queryable projection of open orders.
//!
//! The index is a sequence of immutable snapshots, one per committed block.
//! Reconciliation (the only writer) builds the next snapshot from the
//! current one and swaps it in; readers clone the `Arc` and never observe a
//! half-applied block. Each snapshot's generation is the height of the
//! block it reflects.
//!
//! Lookup structure:
//! - `orders`: `Outpoint -> OpenOrder`
//! - `by_offered`: `offered asset -> outpoints`, for pair queries

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use offerledger_types::{AssetId, OpenOrder, OrderStatus, Outpoint};

#[derive(Debug, Clone, Default)]
struct Snapshot {
    generation: u64,
    orders: BTreeMap<Outpoint, OpenOrder>,
    by_offered: BTreeMap<AssetId, BTreeSet<Outpoint>>,
}

impl Snapshot {
    fn admit(&mut self, order: OpenOrder) {
        if order.remaining_offer_amount == 0 {
            return;
        }
        self.by_offered
            .entry(order.offered_asset_id)
            .or_default()
            .insert(order.outpoint);
        self.orders.insert(order.outpoint, order);
    }

    fn remove(&mut self, outpoint: &Outpoint) -> bool {
        let Some(order) = self.orders.remove(outpoint) else {
            return false;
        };
        if let Some(set) = self.by_offered.get_mut(&order.offered_asset_id) {
            set.remove(outpoint);
            if set.is_empty() {
                self.by_offered.remove(&order.offered_asset_id);
            }
        }
        true
    }
}

/// The open-order index. Shared by reference; cheap to read concurrently.
#[derive(Debug, Default)]
pub struct OrderIndex {
    current: RwLock<Arc<Snapshot>>,
}

impl OrderIndex {
    /// An empty index at generation 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the index from stored orders at `generation`.
    pub fn from_orders(generation: u64, orders: impl IntoIterator<Item = OpenOrder>) -> Self {
        let mut snapshot = Snapshot {
            generation,
            ..Snapshot::default()
        };
        for order in orders {
            snapshot.admit(order);
        }
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Height of the block the index currently reflects.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.snapshot().generation
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot().orders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The open order backed by `outpoint`, if it is unspent in committed state.
    #[must_use]
    pub fn find_open_order_by_outpoint(&self, outpoint: &Outpoint) -> Option<OpenOrder> {
        self.snapshot().orders.get(outpoint).cloned()
    }

    /// Open orders selling `offered` for any of `payment_assets`.
    ///
    /// An empty `payment_assets` matches every payment asset. The result
    /// holds the snapshot current at call time, so later blocks do not
    /// change it.
    #[must_use]
    pub fn find_orders(
        &self,
        offered: AssetId,
        payment_assets: &[AssetId],
        status: OrderStatus,
    ) -> OrderQuery {
        match status {
            OrderStatus::Open => OrderQuery {
                snapshot: self.snapshot(),
                offered,
                payment_assets: payment_assets.to_vec(),
            },
        }
    }

    /// Apply one committed block: drop consumed outpoints, admit new orders,
    /// advance to `generation`.
    pub(crate) fn reconcile(
        &self,
        generation: u64,
        consumed: &[Outpoint],
        admitted: Vec<OpenOrder>,
    ) -> ReconcileSummary {
        let mut next = Snapshot::clone(&self.snapshot());
        let removed = consumed.iter().filter(|op| next.remove(op)).count();
        let added = admitted.len();
        for order in admitted {
            next.admit(order);
        }
        next.generation = generation;

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
        ReconcileSummary { added, removed }
    }
}

/// Counts from one reconciliation, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub added: usize,
    pub removed: usize,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Result of [`OrderIndex::find_orders`]: a finite, restartable sequence.
///
/// Orders are grouped by asset pair, one group per payment asset in the
/// order requested; an order accepting several requested payment assets
/// appears once, in its first group.
#[derive(Debug, Clone)]
pub struct OrderQuery {
    snapshot: Arc<Snapshot>,
    offered: AssetId,
    payment_assets: Vec<AssetId>,
}

impl OrderQuery {
    /// Generation of the snapshot this query reads.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.snapshot.generation
    }

    /// Iterate from the start. Each call yields the same sequence.
    #[must_use]
    pub fn iter(&self) -> OrderIter<'_> {
        let candidates: Vec<&OpenOrder> = self
            .snapshot
            .by_offered
            .get(&self.offered)
            .into_iter()
            .flatten()
            .filter_map(|op| self.snapshot.orders.get(op))
            .collect();
        let groups = if self.payment_assets.is_empty() {
            let mut seen = HashSet::new();
            candidates
                .iter()
                .flat_map(|o| o.prices.iter().map(|p| p.payment_asset_id))
                .filter(|asset| seen.insert(*asset))
                .collect()
        } else {
            self.payment_assets.clone()
        };
        OrderIter {
            candidates,
            groups,
            group: 0,
            pos: 0,
            seen: HashSet::new(),
        }
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<OpenOrder> {
        self.iter().cloned().collect()
    }
}

impl<'a> IntoIterator for &'a OrderQuery {
    type Item = &'a OpenOrder;
    type IntoIter = OrderIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy iterator over an [`OrderQuery`].
#[derive(Debug)]
pub struct OrderIter<'a> {
    candidates: Vec<&'a OpenOrder>,
    groups: Vec<AssetId>,
    group: usize,
    pos: usize,
    seen: HashSet<Outpoint>,
}

impl<'a> Iterator for OrderIter<'a> {
    type Item = &'a OpenOrder;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let payment = self.groups.get(self.group)?;
            let Some(order) = self.candidates.get(self.pos).copied() else {
                self.group += 1;
                self.pos = 0;
                continue;
            };
            self.pos += 1;
            if order.accepts_payment_in(payment) && self.seen.insert(order.outpoint) {
                return Some(order);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use offerledger_types::{PriceTier, TxHash};

    use super::*;

    fn asset(b: u8) -> AssetId {
        AssetId([b; 32])
    }

    fn order(offered: u8, amount: u64, payments: &[u8]) -> OpenOrder {
        OpenOrder::dummy(
            asset(offered),
            amount,
            payments.iter().map(|p| PriceTier::new(asset(*p), 1, 10)).collect(),
        )
    }

    #[test]
    fn from_orders_and_lookup() {
        let o = order(1, 100, &[2]);
        let index = OrderIndex::from_orders(5, vec![o.clone()]);
        assert_eq!(index.generation(), 5);
        assert_eq!(index.len(), 1);
        assert_eq!(index.find_open_order_by_outpoint(&o.outpoint), Some(o));
        assert!(index.find_open_order_by_outpoint(&Outpoint::new(TxHash([0u8; 32]), 0)).is_none());
    }

    #[test]
    fn zero_amount_orders_are_not_admitted() {
        let index = OrderIndex::from_orders(0, vec![order(1, 0, &[2])]);
        assert!(index.is_empty());
    }

    #[test]
    fn find_orders_filters_by_pair() {
        let a = order(1, 100, &[2]);
        let b = order(1, 50, &[3]);
        let c = order(4, 10, &[2]);
        let index = OrderIndex::from_orders(1, vec![a.clone(), b.clone(), c]);

        let found = index.find_orders(asset(1), &[asset(2)], OrderStatus::Open).to_vec();
        assert_eq!(found, vec![a.clone()]);

        let both = index.find_orders(asset(1), &[asset(3), asset(2)], OrderStatus::Open).to_vec();
        assert_eq!(both, vec![b, a]);

        assert_eq!(index.find_orders(asset(1), &[], OrderStatus::Open).iter().count(), 2);
        assert_eq!(index.find_orders(asset(9), &[], OrderStatus::Open).iter().count(), 0);
    }

    #[test]
    fn multi_asset_order_appears_once() {
        let o = order(1, 100, &[2, 3]);
        let index = OrderIndex::from_orders(1, vec![o.clone()]);
        let query = index.find_orders(asset(1), &[asset(2), asset(3)], OrderStatus::Open);
        assert_eq!(query.to_vec(), vec![o]);
    }

    #[test]
    fn query_is_restartable() {
        let index = OrderIndex::from_orders(1, vec![order(1, 1, &[2]), order(1, 2, &[2])]);
        let query = index.find_orders(asset(1), &[asset(2)], OrderStatus::Open);
        let first: Vec<_> = query.iter().map(|o| o.outpoint).collect();
        let second: Vec<_> = (&query).into_iter().map(|o| o.outpoint).collect();
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }

    #[test]
    fn reconcile_swaps_snapshot() {
        let old = order(1, 100, &[2]);
        let index = OrderIndex::from_orders(1, vec![old.clone()]);
        let before = index.find_orders(asset(1), &[asset(2)], OrderStatus::Open);

        let replacement = order(1, 80, &[2]);
        let summary = index.reconcile(2, &[old.outpoint], vec![replacement.clone()]);
        assert_eq!(summary, ReconcileSummary { added: 1, removed: 1 });
        assert_eq!(index.generation(), 2);
        assert!(index.find_open_order_by_outpoint(&old.outpoint).is_none());
        assert_eq!(index.find_open_order_by_outpoint(&replacement.outpoint), Some(replacement));

        // A query taken earlier still reads its own snapshot.
        assert_eq!(before.generation(), 1);
        assert_eq!(before.to_vec(), vec![old]);
    }

    #[test]
    fn reconcile_ignores_unknown_outpoints() {
        let index = OrderIndex::new();
        let summary = index.reconcile(1, &[Outpoint::new(TxHash([1u8; 32]), 0)], vec![]);
        assert_eq!(summary.removed, 0);
        assert_eq!(index.generation(), 1);
    }
}
