//! Merging of the REST trade snapshot with the live trade stream.

use crate::types::Trade;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use fnv::{FnvHashMap, FnvHashSet};
use smol_str::SmolStr;
use std::cmp::Ordering;
use tracing::debug;

/// Merge REST and streamed trades into one deduplicated, newest-first feed.
///
/// Stream trades are authoritative: when an id appears in both inputs the stream
/// version is kept. Output is sorted by timestamp descending, with equal timestamps
/// ordered by id descending so the result does not depend on input order, then
/// truncated to `cap`.
pub fn reconcile(rest: &[Trade], stream: &[Trade], cap: usize) -> Vec<Trade> {
    let mut by_id: FnvHashMap<&SmolStr, &Trade> =
        FnvHashMap::with_capacity_and_hasher(rest.len() + stream.len(), Default::default());

    for trade in rest.iter().chain(stream) {
        by_id.insert(&trade.id, trade);
    }

    let mut merged: Vec<Trade> = by_id.into_values().cloned().collect();
    merged.sort_by(newest_first);
    merged.truncate(cap);
    merged
}

/// Newest-first ordering with a deterministic id tiebreak.
pub fn newest_first(a: &Trade, b: &Trade) -> Ordering {
    b.timestamp
        .cmp(&a.timestamp)
        .then_with(|| b.id.cmp(&a.id))
}

/// Caller-owned trade tape for one market view.
///
/// Holds the latest REST snapshot and the streamed trades received since, and
/// re-derives the reconciled feed on every update. Created per market view and
/// dropped (or [`cleared`](Self::clear)) on teardown.
#[derive(Debug, Clone)]
pub struct TradeTape {
    cap: usize,
    retention: ChronoDuration,
    rest: Vec<Trade>,
    stream: Vec<Trade>,
    reconciled: Vec<Trade>,
    /// Ids already handed out by `take_new`
    seen: FnvHashSet<SmolStr>,
}

impl TradeTape {
    pub fn new(cap: usize, retention_secs: u32) -> Self {
        Self {
            cap,
            retention: ChronoDuration::seconds(i64::from(retention_secs)),
            rest: Vec::new(),
            stream: Vec::new(),
            reconciled: Vec::new(),
            seen: FnvHashSet::default(),
        }
    }

    /// Replace the REST snapshot.
    pub fn apply_snapshot(&mut self, trades: Vec<Trade>, now: DateTime<Utc>) {
        debug!(trades = trades.len(), "applying trade snapshot");
        self.rest = trades;
        self.refresh(now);
    }

    /// Append a streamed trade; a repeated id replaces the earlier stream copy.
    pub fn push_stream(&mut self, trade: Trade, now: DateTime<Utc>) {
        match self.stream.iter_mut().find(|held| held.id == trade.id) {
            Some(held) => *held = trade,
            None => self.stream.push(trade),
        }
        self.refresh(now);
    }

    /// Reconciled trades, newest first.
    pub fn trades(&self) -> &[Trade] {
        &self.reconciled
    }

    pub fn len(&self) -> usize {
        self.reconciled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reconciled.is_empty()
    }

    /// Most recent trade, if any.
    pub fn latest(&self) -> Option<&Trade> {
        self.reconciled.first()
    }

    /// Trades in the reconciled feed not yet returned by a previous call, newest
    /// first. Each id is reported at most once while it stays in the feed.
    pub fn take_new(&mut self) -> Vec<Trade> {
        let fresh: Vec<Trade> = self
            .reconciled
            .iter()
            .filter(|trade| !self.seen.contains(&trade.id))
            .cloned()
            .collect();
        self.seen.extend(fresh.iter().map(|trade| trade.id.clone()));
        fresh
    }

    /// Drop all held state.
    pub fn clear(&mut self) {
        self.rest.clear();
        self.stream.clear();
        self.reconciled.clear();
        self.seen.clear();
    }

    /// Prune the stream buffer and re-derive the feed.
    ///
    /// A streamed trade past retention is kept while the REST snapshot still holds
    /// its id, so the stream copy stays authoritative for as long as both exist.
    fn refresh(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.retention;
        let before = self.stream.len();
        let rest_ids: FnvHashSet<&SmolStr> = self.rest.iter().map(|trade| &trade.id).collect();
        self.stream
            .retain(|trade| trade.timestamp >= cutoff || rest_ids.contains(&trade.id));

        // Stream buffer never needs more than the display cap of most recent trades
        if self.stream.len() > self.cap {
            self.stream.sort_by(newest_first);
            self.stream.truncate(self.cap);
        }

        let pruned = before - self.stream.len();
        if pruned > 0 {
            debug!(pruned, "pruned streamed trades");
        }

        self.reconciled = reconcile(&self.rest, &self.stream, self.cap);

        // Ids that left the feed no longer need tracking
        let reconciled_ids: FnvHashSet<&SmolStr> =
            self.reconciled.iter().map(|trade| &trade.id).collect();
        self.seen.retain(|id| reconciled_ids.contains(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Side, SideSource};
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn trade(id: &str, secs: i64, quantity: Decimal) -> Trade {
        Trade {
            id: SmolStr::new(id),
            timestamp: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            price: dec!(0.5),
            quantity,
            side: Side::Buy,
            side_source: SideSource::Reported,
            outcome: SmolStr::new("yes"),
        }
    }

    fn ids(trades: &[Trade]) -> Vec<&str> {
        trades.iter().map(|trade| trade.id.as_str()).collect()
    }

    #[test]
    fn test_reconcile_orders_newest_first() {
        let rest = vec![trade("1", 5, dec!(1)), trade("2", 3, dec!(1))];
        let stream = vec![trade("3", 10, dec!(1))];

        let actual = reconcile(&rest, &stream, 10);
        assert_eq!(ids(&actual), vec!["3", "1", "2"]);
    }

    #[test]
    fn test_reconcile_stream_wins_on_conflict() {
        let rest = vec![trade("1", 5, dec!(1)), trade("2", 3, dec!(1))];
        let stream = vec![trade("1", 6, dec!(42))];

        let actual = reconcile(&rest, &stream, 10);
        assert_eq!(ids(&actual), vec!["1", "2"]);
        assert_eq!(actual[0].quantity, dec!(42));
        assert_eq!(actual[0].timestamp, stream[0].timestamp);
    }

    #[test]
    fn test_reconcile_cases() {
        struct TestCase {
            rest: Vec<Trade>,
            stream: Vec<Trade>,
            cap: usize,
            expected: Vec<&'static str>,
        }

        let tests = vec![
            TestCase {
                // TC0: both empty
                rest: vec![],
                stream: vec![],
                cap: 10,
                expected: vec![],
            },
            TestCase {
                // TC1: cap truncates oldest
                rest: vec![trade("a", 1, dec!(1)), trade("b", 2, dec!(1))],
                stream: vec![trade("c", 3, dec!(1))],
                cap: 2,
                expected: vec!["c", "b"],
            },
            TestCase {
                // TC2: equal timestamps tie-break by id descending
                rest: vec![trade("x1", 7, dec!(1)), trade("x3", 7, dec!(1))],
                stream: vec![trade("x2", 7, dec!(1))],
                cap: 10,
                expected: vec!["x3", "x2", "x1"],
            },
            TestCase {
                // TC3: duplicates inside the stream collapse
                rest: vec![],
                stream: vec![trade("d", 1, dec!(1)), trade("d", 1, dec!(2))],
                cap: 10,
                expected: vec!["d"],
            },
            TestCase {
                // TC4: zero cap yields nothing
                rest: vec![trade("a", 1, dec!(1))],
                stream: vec![],
                cap: 0,
                expected: vec![],
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = reconcile(&test.rest, &test.stream, test.cap);
            assert_eq!(ids(&actual), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_reconcile_independent_of_input_order() {
        let rest = vec![trade("a", 1, dec!(1)), trade("b", 1, dec!(1)), trade("c", 2, dec!(1))];
        let mut reversed = rest.clone();
        reversed.reverse();

        assert_eq!(reconcile(&rest, &[], 10), reconcile(&reversed, &[], 10));
    }

    #[test]
    fn test_tape_take_new_reports_each_id_once() {
        let now = Utc.timestamp_opt(1_700_000_100, 0).unwrap();
        let mut tape = TradeTape::new(10, 3600);

        tape.apply_snapshot(vec![trade("1", 5, dec!(1)), trade("2", 3, dec!(1))], now);
        assert_eq!(ids(&tape.take_new()), vec!["1", "2"]);
        assert!(tape.take_new().is_empty());

        tape.push_stream(trade("3", 10, dec!(1)), now);
        // Re-applying an overlapping snapshot does not re-report old ids
        tape.apply_snapshot(vec![trade("1", 5, dec!(1)), trade("3", 10, dec!(1))], now);
        assert_eq!(ids(&tape.take_new()), vec!["3"]);
        assert_eq!(ids(tape.trades()), vec!["3", "1"]);
    }

    #[test]
    fn test_tape_prunes_stream_by_retention() {
        let mut tape = TradeTape::new(10, 60);
        let now = Utc.timestamp_opt(1_700_000_100, 0).unwrap();

        tape.push_stream(trade("old", 0, dec!(1)), now);
        assert!(tape.is_empty());

        tape.push_stream(trade("fresh", 90, dec!(1)), now);
        assert_eq!(ids(tape.trades()), vec!["fresh"]);
        assert_eq!(tape.latest().map(|t| t.id.as_str()), Some("fresh"));

        tape.clear();
        assert!(tape.is_empty());
        assert_eq!(tape.len(), 0);
    }

    #[test]
    fn test_tape_stream_replaces_same_id() {
        let now = Utc.timestamp_opt(1_700_000_100, 0).unwrap();
        let mut tape = TradeTape::new(10, 3600);

        tape.push_stream(trade("1", 50, dec!(1)), now);
        tape.push_stream(trade("1", 50, dec!(9)), now);

        assert_eq!(tape.len(), 1);
        assert_eq!(tape.trades()[0].quantity, dec!(9));
    }

    #[test]
    fn test_tape_seen_ids_bounded_by_cap() {
        let mut tape = TradeTape::new(10, 60);

        for index in 0..500 {
            let now = Utc.timestamp_opt(1_700_000_000 + index, 0).unwrap();
            tape.push_stream(trade(&index.to_string(), index, dec!(1)), now);

            let fresh = tape.take_new();
            assert_eq!(ids(&fresh), vec![index.to_string().as_str()]);
            assert!(tape.seen.len() <= 10);
        }

        assert_eq!(tape.len(), 10);
        assert_eq!(tape.seen.len(), 10);
    }

    #[test]
    fn test_tape_stream_copy_outlives_retention_while_in_snapshot() {
        let mut tape = TradeTape::new(10, 60);
        let start = Utc.timestamp_opt(1_700_000_100, 0).unwrap();

        tape.apply_snapshot(vec![trade("1", 90, dec!(1)), trade("2", 95, dec!(1))], start);
        tape.push_stream(trade("1", 90, dec!(42)), start);

        // Past retention for the streamed copy, but the snapshot still lists the id
        let later = start + ChronoDuration::seconds(600);
        tape.apply_snapshot(vec![trade("1", 90, dec!(1)), trade("2", 95, dec!(1))], later);

        let held = tape.trades().iter().find(|trade| trade.id == "1").unwrap();
        assert_eq!(held.quantity, dec!(42));

        // Once the snapshot drops the id the expired stream copy goes too
        tape.apply_snapshot(vec![trade("2", 95, dec!(1))], later);
        assert_eq!(ids(tape.trades()), vec!["2"]);
    }
}
