//! Rolling per-client session durations
//!
//! Each client key maps to its session records in insertion order. Writes
//! prune records that fell out of the window; reads only filter by age and
//! leave storage untouched, so an idle key keeps its expired records until
//! its next write.
//!
//! A single `RwLock` guards the whole key space. Writes happen once per
//! session report, not per metrics tick.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

pub const DEFAULT_WINDOW_DAYS: i64 = 7;

/// Time source for the ledger
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One accepted session duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionRecord {
    pub timestamp: DateTime<Utc>,
    pub duration_seconds: i64,
}

/// Sliding-window duration store keyed by client
pub struct DurationLedger {
    records: RwLock<HashMap<String, Vec<SessionRecord>>>,
    clock: Arc<dyn Clock>,
    window: TimeDelta,
}

impl DurationLedger {
    /// Ledger on the wall clock with a 7-day window
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            clock,
            window: TimeDelta::days(DEFAULT_WINDOW_DAYS),
        }
    }

    pub fn with_window(mut self, window: TimeDelta) -> Self {
        self.window = window;
        self
    }

    pub fn window(&self) -> TimeDelta {
        self.window
    }

    /// Append a record stamped now, prune the key's expired records and
    /// return the rolling total.
    ///
    /// The duration is stored as given; callers reject non-positive values.
    pub fn add_record(&self, client_key: &str, duration_seconds: i64) -> i64 {
        let now = self.clock.now();
        let cutoff = now - self.window;

        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let client = records.entry(client_key.to_string()).or_default();
        client.push(SessionRecord {
            timestamp: now,
            duration_seconds,
        });
        client.retain(|record| record.timestamp > cutoff);

        Self::saturating_total(client.iter())
    }

    /// Rolling total without pruning
    pub fn get_total(&self, client_key: &str) -> i64 {
        let cutoff = self.clock.now() - self.window;
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);

        records
            .get(client_key)
            .map_or(0, |client| Self::sum_since(client, cutoff))
    }

    /// Rolling totals for every key, omitting zero totals
    pub fn get_all_totals(&self) -> HashMap<String, i64> {
        let cutoff = self.clock.now() - self.window;
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);

        records
            .iter()
            .map(|(key, client)| (key.clone(), Self::sum_since(client, cutoff)))
            .filter(|(_, total)| *total != 0)
            .collect()
    }

    /// Number of stored records for a key, expired ones included
    pub fn stored_records(&self, client_key: &str) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(client_key)
            .map_or(0, Vec::len)
    }

    fn sum_since(client: &[SessionRecord], cutoff: DateTime<Utc>) -> i64 {
        Self::saturating_total(client.iter().filter(|record| record.timestamp > cutoff))
    }

    /// Totals clamp at the `i64` bounds instead of wrapping
    fn saturating_total<'a>(records: impl Iterator<Item = &'a SessionRecord>) -> i64 {
        records.fold(0i64, |total, record| total.saturating_add(record.duration_seconds))
    }
}

impl Default for DurationLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day_zero() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap()
    }

    fn manual_ledger() -> (Arc<ManualClock>, DurationLedger) {
        let clock = Arc::new(ManualClock::new(day_zero()));
        let ledger = DurationLedger::with_clock(clock.clone());
        (clock, ledger)
    }

    #[test]
    fn test_totals_accumulate_within_window() {
        let (clock, ledger) = manual_ledger();

        assert_eq!(ledger.add_record("10.0.0.5", 120), 120);
        clock.advance(TimeDelta::hours(5));
        assert_eq!(ledger.add_record("10.0.0.5", 60), 180);
        assert_eq!(ledger.get_total("10.0.0.5"), 180);
    }

    #[test]
    fn test_expired_record_pruned_on_write() {
        let (clock, ledger) = manual_ledger();

        ledger.add_record("10.0.0.5", 100);
        clock.advance(TimeDelta::days(8));
        assert_eq!(ledger.add_record("10.0.0.5", 50), 50);
        assert_eq!(ledger.stored_records("10.0.0.5"), 1);
    }

    #[test]
    fn test_window_boundary_is_exclusive() {
        let (clock, ledger) = manual_ledger();

        ledger.add_record("k", 10);
        clock.advance(TimeDelta::days(7));
        // Exactly seven days old is outside the window
        assert_eq!(ledger.add_record("k", 5), 5);

        clock.advance(TimeDelta::days(7) - TimeDelta::seconds(1));
        assert_eq!(ledger.add_record("k", 1), 6);
    }

    #[test]
    fn test_reads_filter_but_do_not_prune() {
        let (clock, ledger) = manual_ledger();

        ledger.add_record("k", 100);
        clock.advance(TimeDelta::days(8));

        assert_eq!(ledger.get_total("k"), 0);
        assert!(ledger.get_all_totals().is_empty());
        assert_eq!(ledger.stored_records("k"), 1);
    }

    #[test]
    fn test_keys_are_independent() {
        let (clock, ledger) = manual_ledger();

        ledger.add_record("a", 100);
        clock.advance(TimeDelta::days(3));
        ledger.add_record("b", 40);
        clock.advance(TimeDelta::days(5));

        // "a" expired, "b" still inside the window
        let totals = ledger.get_all_totals();
        assert_eq!(totals.len(), 1);
        assert_eq!(totals["b"], 40);
        assert_eq!(ledger.get_total("a"), 0);
    }

    #[test]
    fn test_unknown_key_is_zero() {
        let ledger = DurationLedger::new();
        assert_eq!(ledger.get_total("nobody"), 0);
        assert_eq!(ledger.stored_records("nobody"), 0);
    }

    #[test]
    fn test_no_validation_of_duration() {
        let (_clock, ledger) = manual_ledger();

        assert_eq!(ledger.add_record("k", 0), 0);
        assert_eq!(ledger.add_record("k", -30), -30);
        assert_eq!(ledger.get_all_totals()["k"], -30);
    }

    #[test]
    fn test_huge_durations_saturate() {
        let (_clock, ledger) = manual_ledger();

        assert_eq!(ledger.add_record("k", i64::MAX), i64::MAX);
        assert_eq!(ledger.add_record("k", 1), i64::MAX);
        assert_eq!(ledger.get_total("k"), i64::MAX);
        assert_eq!(ledger.get_all_totals()["k"], i64::MAX);

        // Later writes for the key keep working
        assert_eq!(ledger.add_record("k", 5), i64::MAX);
        assert_eq!(ledger.stored_records("k"), 3);
    }

    #[test]
    fn test_custom_window() {
        let clock = Arc::new(ManualClock::new(day_zero()));
        let ledger = DurationLedger::with_clock(clock.clone()).with_window(TimeDelta::hours(1));

        ledger.add_record("k", 10);
        clock.advance(TimeDelta::minutes(61));
        assert_eq!(ledger.add_record("k", 20), 20);
    }

    #[test]
    fn test_concurrent_writers_same_key() {
        let ledger = Arc::new(DurationLedger::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        ledger.add_record("shared", 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ledger.get_total("shared"), 800);
    }
}
