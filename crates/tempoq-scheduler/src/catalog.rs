//! Schedule catalog — the in-memory index of scheduled jobs.
//!
//! Two disjoint maps keyed by schedule hash: interval entries deadline on
//! the monotonic clock, cron entries on the wall clock. A hash lives in at
//! most one map; re-scheduling a job under the other cadence moves it
//! atomically.

use std::collections::HashMap;

use serde_json::json;

use tempoq_core::Result;

use crate::iter::{CronIter, IntervalIter};

// ─────────────────────────────────────────────
// Entries
// ─────────────────────────────────────────────

/// A job firing every N seconds on the monotonic clock.
#[derive(Clone, Debug)]
pub struct IntervalEntry {
    /// Monotonic deadline of the next dispatch.
    pub next_fire_mono: f64,
    /// Opaque request forwarded to the broker on dispatch.
    pub payload: String,
    pub iter: IntervalIter,
    pub queue: String,
    /// Remaining dispatches; `-1` means infinite.
    pub run_count: i64,
}

/// A job firing on wall-clock instants produced by a cron expression.
#[derive(Clone, Debug)]
pub struct CronEntry {
    /// Unix-second deadline of the next dispatch.
    pub next_fire_wall: i64,
    pub payload: String,
    pub iter: CronIter,
    pub queue: String,
}

/// Which map an `UNSCHEDULE` found its target in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemovedFrom {
    Interval,
    Cron,
    None,
}

// ─────────────────────────────────────────────
// ScheduleCatalog
// ─────────────────────────────────────────────

/// The union of the interval and cron maps.
#[derive(Default)]
pub struct ScheduleCatalog {
    interval: HashMap<String, IntervalEntry>,
    cron: HashMap<String, CronEntry>,
}

impl ScheduleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or replace an interval entry.
    ///
    /// The first deadline is one period after `mono_now`. A hash present in
    /// the cron map is removed from there.
    pub fn upsert_interval(
        &mut self,
        hash: &str,
        payload: &str,
        interval_secs: i64,
        queue: &str,
        run_count: i64,
        mono_now: f64,
    ) -> Result<()> {
        let mut iter = IntervalIter::new(mono_now, interval_secs)?;
        let next_fire_mono = iter.next();
        self.cron.remove(hash);
        self.interval.insert(
            hash.to_string(),
            IntervalEntry {
                next_fire_mono,
                payload: payload.to_string(),
                iter,
                queue: queue.to_string(),
                run_count,
            },
        );
        Ok(())
    }

    /// Install or replace a cron entry.
    ///
    /// The seed deadline comes from the iterator; a value at or before
    /// `wall_now` is skipped once more so freshly loaded schedules don't
    /// fire a catch-up storm.
    pub fn upsert_cron(
        &mut self,
        hash: &str,
        payload: &str,
        cron_expr: &str,
        queue: &str,
        wall_now: i64,
    ) -> Result<()> {
        let mut iter = CronIter::new(cron_expr, wall_now)?;
        let next_fire_wall = iter.next_after(wall_now).ok_or_else(|| {
            tempoq_core::Error::Cron(format!("no upcoming fire time for {:?}", cron_expr))
        })?;
        self.interval.remove(hash);
        self.cron.insert(
            hash.to_string(),
            CronEntry {
                next_fire_wall,
                payload: payload.to_string(),
                iter,
                queue: queue.to_string(),
            },
        );
        Ok(())
    }

    /// Remove a hash from whichever map holds it.
    pub fn remove(&mut self, hash: &str) -> RemovedFrom {
        if self.interval.remove(hash).is_some() {
            RemovedFrom::Interval
        } else if self.cron.remove(hash).is_some() {
            RemovedFrom::Cron
        } else {
            RemovedFrom::None
        }
    }

    /// Hashes of interval entries whose deadline has been reached.
    pub fn due_interval(&self, mono_now: f64) -> Vec<String> {
        self.interval
            .iter()
            .filter(|(_, e)| e.next_fire_mono <= mono_now)
            .map(|(h, _)| h.clone())
            .collect()
    }

    /// Hashes of cron entries whose deadline has been reached.
    pub fn due_cron(&self, wall_now: i64) -> Vec<String> {
        self.cron
            .iter()
            .filter(|(_, e)| e.next_fire_wall <= wall_now)
            .map(|(h, _)| h.clone())
            .collect()
    }

    /// Advance the entry's deadline to its iterator's next value.
    ///
    /// The new deadline is written back into the entry for both cadences.
    /// Returns `false` when the hash is unknown or the iterator yields
    /// nothing further (degenerate cron expressions).
    pub fn advance(&mut self, hash: &str) -> bool {
        if let Some(entry) = self.interval.get_mut(hash) {
            entry.next_fire_mono = entry.iter.next();
            return true;
        }
        if let Some(entry) = self.cron.get_mut(hash) {
            match entry.iter.next() {
                Some(next) => {
                    entry.next_fire_wall = next;
                    return true;
                }
                None => return false,
            }
        }
        false
    }

    /// Decrement an interval entry's run count, flooring at zero.
    /// Returns the new count.
    pub fn decrement_run_count(&mut self, hash: &str) -> Option<i64> {
        let entry = self.interval.get_mut(hash)?;
        if entry.run_count > 0 {
            entry.run_count -= 1;
        }
        Some(entry.run_count)
    }

    pub fn interval(&self, hash: &str) -> Option<&IntervalEntry> {
        self.interval.get(hash)
    }

    pub fn cron(&self, hash: &str) -> Option<&CronEntry> {
        self.cron.get(hash)
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.interval.contains_key(hash) || self.cron.contains_key(hash)
    }

    pub fn interval_len(&self) -> usize {
        self.interval.len()
    }

    pub fn cron_len(&self) -> usize {
        self.cron.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interval.is_empty() && self.cron.is_empty()
    }

    /// Drop every entry (service reset).
    pub fn clear(&mut self) {
        self.interval.clear();
        self.cron.clear();
    }

    // ─────────────────────────────────────────
    // Snapshots
    // ─────────────────────────────────────────

    /// Serializable view of both maps for status output.
    ///
    /// Entry layout mirrors the wire format:
    /// `[next_fire, payload, <iterator>, queue(, run_count)]` — the
    /// iterator slot is an opaque description.
    pub fn snapshot(&self, name: &str) -> serde_json::Value {
        json!({
            "interval_jobs": self.interval_snapshot(),
            "cron_jobs": self.cron_snapshot(),
            "name": name,
        })
    }

    /// The interval map alone (peer `STATUS` replies carry only this).
    pub fn interval_snapshot(&self) -> serde_json::Value {
        let jobs: serde_json::Map<String, serde_json::Value> = self
            .interval
            .iter()
            .map(|(hash, e)| {
                (
                    hash.clone(),
                    json!([e.next_fire_mono, e.payload, e.iter.describe(), e.queue, e.run_count]),
                )
            })
            .collect();
        serde_json::Value::Object(jobs)
    }

    fn cron_snapshot(&self) -> serde_json::Value {
        let jobs: serde_json::Map<String, serde_json::Value> = self
            .cron
            .iter()
            .map(|(hash, e)| {
                (
                    hash.clone(),
                    json!([e.next_fire_wall, e.payload, e.iter.describe(), e.queue]),
                )
            })
            .collect();
        serde_json::Value::Object(jobs)
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog_with_interval(hash: &str, period: i64, run_count: i64) -> ScheduleCatalog {
        let mut cat = ScheduleCatalog::new();
        cat.upsert_interval(hash, "[]", period, "q", run_count, 100.0)
            .unwrap();
        cat
    }

    #[test]
    fn test_upsert_interval_seeds_deadline() {
        let cat = catalog_with_interval("h1", 60, -1);
        let entry = cat.interval("h1").unwrap();
        assert_eq!(entry.next_fire_mono, 160.0);
        assert_eq!(entry.run_count, -1);
    }

    #[test]
    fn test_upsert_interval_rejects_zero_period() {
        let mut cat = ScheduleCatalog::new();
        assert!(cat.upsert_interval("h", "[]", 0, "q", -1, 0.0).is_err());
        assert!(cat.is_empty());
    }

    #[test]
    fn test_upsert_cron_seeds_future_deadline() {
        let mut cat = ScheduleCatalog::new();
        cat.upsert_cron("h1", "[]", "* * * * *", "q", 1000).unwrap();
        assert_eq!(cat.cron("h1").unwrap().next_fire_wall, 1020);
    }

    #[test]
    fn test_upsert_cron_rejects_bad_expr() {
        let mut cat = ScheduleCatalog::new();
        assert!(cat.upsert_cron("h1", "[]", "bogus", "q", 1000).is_err());
        assert!(cat.is_empty());
    }

    #[test]
    fn test_maps_stay_disjoint_on_cadence_switch() {
        let mut cat = catalog_with_interval("h1", 60, -1);
        cat.upsert_cron("h1", "[]", "* * * * *", "q", 1000).unwrap();
        assert!(cat.interval("h1").is_none());
        assert!(cat.cron("h1").is_some());

        cat.upsert_interval("h1", "[]", 30, "q", -1, 0.0).unwrap();
        assert!(cat.cron("h1").is_none());
        assert!(cat.interval("h1").is_some());
        assert_eq!(cat.interval_len() + cat.cron_len(), 1);
    }

    #[test]
    fn test_upsert_supersedes() {
        let mut cat = catalog_with_interval("h1", 60, 3);
        cat.upsert_interval("h1", "[\"v2\"]", 90, "q2", 5, 100.0)
            .unwrap();
        let entry = cat.interval("h1").unwrap();
        assert_eq!(entry.payload, "[\"v2\"]");
        assert_eq!(entry.queue, "q2");
        assert_eq!(entry.run_count, 5);
        assert_eq!(entry.next_fire_mono, 190.0);
    }

    #[test]
    fn test_remove_reports_source_map() {
        let mut cat = catalog_with_interval("h1", 60, -1);
        cat.upsert_cron("h2", "[]", "* * * * *", "q", 1000).unwrap();
        assert_eq!(cat.remove("h1"), RemovedFrom::Interval);
        assert_eq!(cat.remove("h2"), RemovedFrom::Cron);
        assert_eq!(cat.remove("h2"), RemovedFrom::None);
    }

    #[test]
    fn test_due_interval_inclusive() {
        let cat = catalog_with_interval("h1", 60, -1);
        assert!(cat.due_interval(159.9).is_empty());
        assert_eq!(cat.due_interval(160.0), vec!["h1".to_string()]);
        assert_eq!(cat.due_interval(500.0), vec!["h1".to_string()]);
    }

    #[test]
    fn test_due_cron_inclusive() {
        let mut cat = ScheduleCatalog::new();
        cat.upsert_cron("h1", "[]", "* * * * *", "q", 1000).unwrap();
        assert!(cat.due_cron(1019).is_empty());
        assert_eq!(cat.due_cron(1020), vec!["h1".to_string()]);
    }

    #[test]
    fn test_advance_strictly_increases_interval() {
        let mut cat = catalog_with_interval("h1", 60, -1);
        let before = cat.interval("h1").unwrap().next_fire_mono;
        assert!(cat.advance("h1"));
        let after = cat.interval("h1").unwrap().next_fire_mono;
        assert!(after > before);
        assert_eq!(after, 220.0);
    }

    #[test]
    fn test_advance_writes_back_cron_deadline() {
        let mut cat = ScheduleCatalog::new();
        cat.upsert_cron("h1", "[]", "* * * * *", "q", 1000).unwrap();
        let before = cat.cron("h1").unwrap().next_fire_wall;
        assert!(cat.advance("h1"));
        let after = cat.cron("h1").unwrap().next_fire_wall;
        assert!(after > before);
        assert_eq!(after, 1080);
    }

    #[test]
    fn test_advance_unknown_hash() {
        let mut cat = ScheduleCatalog::new();
        assert!(!cat.advance("nope"));
    }

    #[test]
    fn test_decrement_floors_at_zero() {
        let mut cat = catalog_with_interval("h1", 60, 1);
        assert_eq!(cat.decrement_run_count("h1"), Some(0));
        assert_eq!(cat.decrement_run_count("h1"), Some(0));
    }

    #[test]
    fn test_decrement_leaves_infinite_alone() {
        let mut cat = catalog_with_interval("h1", 60, -1);
        assert_eq!(cat.decrement_run_count("h1"), Some(-1));
    }

    #[test]
    fn test_clear() {
        let mut cat = catalog_with_interval("h1", 60, -1);
        cat.upsert_cron("h2", "[]", "* * * * *", "q", 1000).unwrap();
        cat.clear();
        assert!(cat.is_empty());
    }

    #[test]
    fn test_snapshot_shape() {
        let mut cat = catalog_with_interval("h1", 60, 3);
        cat.upsert_cron("h2", "[]", "*/5 * * * *", "q", 1000).unwrap();
        let snap = cat.snapshot("sched-1");

        assert_eq!(snap["name"], "sched-1");
        let interval_jobs = snap["interval_jobs"].as_object().unwrap();
        let entry = interval_jobs["h1"].as_array().unwrap();
        assert_eq!(entry.len(), 5);
        assert_eq!(entry[0], 160.0);
        assert_eq!(entry[3], "q");
        assert_eq!(entry[4], 3);

        let cron_jobs = snap["cron_jobs"].as_object().unwrap();
        let entry = cron_jobs["h2"].as_array().unwrap();
        assert_eq!(entry.len(), 4);
        assert_eq!(entry[3], "q");
    }

    #[test]
    fn test_interval_snapshot_only_intervals() {
        let mut cat = catalog_with_interval("h1", 60, -1);
        cat.upsert_cron("h2", "[]", "* * * * *", "q", 1000).unwrap();
        let snap = cat.interval_snapshot();
        let jobs = snap.as_object().unwrap();
        assert!(jobs.contains_key("h1"));
        assert!(!jobs.contains_key("h2"));
    }
}
