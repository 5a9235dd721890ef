//! Deadline iterators — the next-fire producers stored inside catalog
//! entries.
//!
//! `IntervalIter` walks an arithmetic progression on the monotonic clock;
//! `CronIter` walks wall-clock instants produced by a five-field cron
//! expression. Neither ever regresses.

use std::str::FromStr;

use chrono::{DateTime, Utc};

use tempoq_core::{Error, Result};

// ─────────────────────────────────────────────
// IntervalIter
// ─────────────────────────────────────────────

/// Produces `anchor + p, anchor + 2p, …` in monotonic seconds.
///
/// Deadlines are computed from the anchor, not from the previous dispatch,
/// so jitter in the loop cannot accumulate into drift.
#[derive(Clone, Debug)]
pub struct IntervalIter {
    anchor: f64,
    period_secs: i64,
    steps: u64,
}

impl IntervalIter {
    /// `period_secs` must be strictly positive; zero-interval schedules
    /// are rejected rather than firing on every tick.
    pub fn new(anchor: f64, period_secs: i64) -> Result<Self> {
        if period_secs <= 0 {
            return Err(Error::Malformed(format!(
                "interval must be positive, got {}",
                period_secs
            )));
        }
        Ok(Self {
            anchor,
            period_secs,
            steps: 0,
        })
    }

    /// Next deadline in monotonic seconds.
    pub fn next(&mut self) -> f64 {
        self.steps += 1;
        self.anchor + (self.period_secs as f64) * (self.steps as f64)
    }

    /// Opaque description for status snapshots.
    pub fn describe(&self) -> String {
        format!("every:{}s", self.period_secs)
    }
}

// ─────────────────────────────────────────────
// CronIter
// ─────────────────────────────────────────────

/// Produces wall-clock unix seconds from a five-field cron expression.
#[derive(Clone, Debug)]
pub struct CronIter {
    expr: String,
    schedule: cron::Schedule,
    cursor: DateTime<Utc>,
}

impl CronIter {
    /// Parse `expr` and anchor the cursor at `from_wall` (unix seconds).
    ///
    /// The `cron` crate wants a seconds field, so the standard five-field
    /// form is normalized by prepending `0`.
    pub fn new(expr: &str, from_wall: i64) -> Result<Self> {
        let normalized = if expr.split_whitespace().count() == 5 {
            format!("0 {}", expr)
        } else {
            expr.to_string()
        };
        let schedule = cron::Schedule::from_str(&normalized)
            .map_err(|e| Error::Cron(format!("{:?}: {}", expr, e)))?;
        let cursor = DateTime::from_timestamp(from_wall, 0)
            .ok_or_else(|| Error::Cron(format!("timestamp {} out of range", from_wall)))?;
        Ok(Self {
            expr: expr.to_string(),
            schedule,
            cursor,
        })
    }

    /// Next fire time strictly after the cursor, in unix seconds.
    /// `None` when the expression yields no further instants.
    pub fn next(&mut self) -> Option<i64> {
        let next = self.schedule.after(&self.cursor).next()?;
        self.cursor = next;
        Some(next.timestamp())
    }

    /// Next fire time, skipping one extra step if the produced value is
    /// already at or before `wall_now`. Seeding entries through this avoids
    /// a catch-up dispatch storm right after load.
    pub fn next_after(&mut self, wall_now: i64) -> Option<i64> {
        let next = self.next()?;
        if next <= wall_now {
            return self.next();
        }
        Some(next)
    }

    /// The expression as received (status snapshots show this).
    pub fn describe(&self) -> String {
        self.expr.clone()
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
