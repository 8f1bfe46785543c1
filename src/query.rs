// SPDX-License-Identifier: MIT
//! Temporal query layer over the Signal Store (component F). Query shapes
//! are grounded on `dbq/pkg.go`'s `Signal` methods; the sequence matcher and
//! the duration/clock asserts are grounded on `dbq/asserts.go`.

use crate::store::Store;
use rusqlite::OptionalExtension;

/// Reads the `Value` column as a `String` regardless of the storage class
/// SQLite's NUMERIC affinity coerced it to (e.g. `"1"` may be stored as an
/// `INTEGER`, mirroring how the reference implementation's driver performs
/// an implicit string conversion on scan).
fn value_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<String> {
    use rusqlite::types::ValueRef;
    match row.get_ref(idx)? {
        ValueRef::Text(t) => Ok(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Integer(i) => Ok(i.to_string()),
        ValueRef::Real(r) => Ok(r.to_string()),
        other => Err(rusqlite::Error::InvalidColumnType(
            idx,
            "Value".to_string(),
            other.data_type(),
        )),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("signal {name:?} not found")]
    SignalNotFound { name: String },
    #[error(transparent)]
    Store(#[from] crate::store::StoreError),
    #[error("query failed: {0}")]
    Sql(#[from] rusqlite::Error),
}

/// Replaces the reference implementation's nullable-field `Timestamp`
/// carrier (see `SPEC_FULL.md` §9): a tagged union distinguishes "ran fine,
/// nothing there" from "ran fine, here it is" from "didn't run".
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult<T> {
    Found(T),
    Absent,
}

impl<T> QueryResult<T> {
    pub fn found(self) -> Option<T> {
        match self {
            QueryResult::Found(v) => Some(v),
            QueryResult::Absent => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, QueryResult::Found(_))
    }
}

/// A single recorded change: the timestamp it occurs at and the value it
/// settles on.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub timestamp: i64,
    pub value: String,
}

/// A step in a `FindFirst`/`FindFirstFrom` sequence match: given the
/// timestamp the chain has reached so far, resolves to the timestamp it
/// should continue from, or reports that the chain cannot continue from
/// there. The first step in a sequence acts as the generator (e.g.
/// `FindAfter`, advancing the candidate forward on retry); later steps
/// typically validate without advancing (e.g. `EqAt`, which returns its
/// input unchanged when it holds).
pub type Step<'a> = Box<dyn Fn(i64) -> Result<QueryResult<i64>, QueryError> + 'a>;

/// A resolved handle onto one signal's history, scoped to its `Code`.
pub struct Signal<'a> {
    store: &'a Store,
    pub name: String,
    pub code: String,
}

pub struct QueryEngine<'a> {
    store: &'a Store,
}

impl<'a> QueryEngine<'a> {
    /// # Example
    ///
    /// ```
    /// use vcdquery::store::Store;
    /// use vcdquery::query::QueryEngine;
    ///
    /// let store = Store::open_in_memory().unwrap();
    /// store.insert_signal("/top/clk", 0, "!", 1).unwrap();
    /// store.insert_value(0, "!", "0").unwrap();
    /// store.insert_value(5, "!", "1").unwrap();
    ///
    /// let engine = QueryEngine::new(&store);
    /// let clk = engine.signal("/top/clk").unwrap();
    /// assert_eq!(clk.value_at(3).unwrap().found(), Some("0".to_string()));
    /// ```
    pub fn new(store: &'a Store) -> QueryEngine<'a> {
        QueryEngine { store }
    }

    pub fn signal(&self, name: &str) -> Result<Signal<'a>, QueryError> {
        let row = self
            .store
            .find_signal_by_name(name)?
            .ok_or_else(|| QueryError::SignalNotFound { name: name.to_string() })?;
        Ok(Signal {
            store: self.store,
            name: row.name,
            code: row.code,
        })
    }

    fn seconds_per_tick(&self) -> Result<f64, QueryError> {
        match self.store.get_meta("timescale_seconds_per_tick")? {
            Some(v) => v.parse().map_err(|_| QueryError::SignalNotFound {
                name: "timescale_seconds_per_tick".to_string(),
            }),
            // No $timescale declaration seen: assume picoseconds per §9.
            None => Ok(1e-12),
        }
    }
}

impl<'a> Signal<'a> {
    fn row_at_or_before(&self, timestamp: i64) -> Result<Option<Change>, QueryError> {
        self.store
            .connection()
            .query_row(
                "SELECT Timestamp, Value FROM Svalues
                 WHERE Code = ?1 AND Timestamp <= ?2
                 ORDER BY Timestamp DESC LIMIT 1",
                rusqlite::params![self.code, timestamp],
                |row| {
                    Ok(Change {
                        timestamp: row.get(0)?,
                        value: value_column(row, 1)?,
                    })
                },
            )
            .optional()
            .map_err(QueryError::from)
    }

    fn row_strictly_after(&self, timestamp: i64) -> Result<Option<Change>, QueryError> {
        self.store
            .connection()
            .query_row(
                "SELECT Timestamp, Value FROM Svalues
                 WHERE Code = ?1 AND Timestamp > ?2
                 ORDER BY Timestamp ASC LIMIT 1",
                rusqlite::params![self.code, timestamp],
                |row| {
                    Ok(Change {
                        timestamp: row.get(0)?,
                        value: value_column(row, 1)?,
                    })
                },
            )
            .optional()
            .map_err(QueryError::from)
    }

    fn row_strictly_before(&self, timestamp: i64) -> Result<Option<Change>, QueryError> {
        self.store
            .connection()
            .query_row(
                "SELECT Timestamp, Value FROM Svalues
                 WHERE Code = ?1 AND Timestamp < ?2
                 ORDER BY Timestamp DESC LIMIT 1",
                rusqlite::params![self.code, timestamp],
                |row| {
                    Ok(Change {
                        timestamp: row.get(0)?,
                        value: value_column(row, 1)?,
                    })
                },
            )
            .optional()
            .map_err(QueryError::from)
    }

    /// Minimum `Timestamp` at which this signal's recorded value equals
    /// `value`, via the `INNER JOIN` + `MIN` shape `dbq/pkg.go` uses instead
    /// of `ORDER BY ... LIMIT 1`.
    pub fn find_first(&self, value: &str) -> Result<QueryResult<Change>, QueryError> {
        let row = self
            .store
            .connection()
            .query_row(
                "SELECT s.Timestamp, s.Value FROM Svalues s
                 INNER JOIN (
                     SELECT MIN(Timestamp) AS t FROM Svalues WHERE Code = ?1 AND Value = ?2
                 ) m ON s.Timestamp = m.t
                 WHERE s.Code = ?1 AND s.Value = ?2",
                rusqlite::params![self.code, value],
                |row| {
                    Ok(Change {
                        timestamp: row.get(0)?,
                        value: value_column(row, 1)?,
                    })
                },
            )
            .optional()?;
        Ok(row.map_or(QueryResult::Absent, QueryResult::Found))
    }

    /// Minimum `Timestamp` strictly greater than `timestamp` with value
    /// `value`.
    pub fn find_after(&self, timestamp: i64, value: &str) -> Result<QueryResult<Change>, QueryError> {
        let row = self
            .store
            .connection()
            .query_row(
                "SELECT Timestamp, Value FROM Svalues
                 WHERE Code = ?1 AND Timestamp > ?2 AND Value = ?3
                 ORDER BY Timestamp ASC LIMIT 1",
                rusqlite::params![self.code, timestamp, value],
                |row| {
                    Ok(Change {
                        timestamp: row.get(0)?,
                        value: value_column(row, 1)?,
                    })
                },
            )
            .optional()?;
        Ok(row.map_or(QueryResult::Absent, QueryResult::Found))
    }

    /// Maximum `Timestamp` strictly less than `timestamp` with value `value`.
    pub fn find_before(&self, timestamp: i64, value: &str) -> Result<QueryResult<Change>, QueryError> {
        let row = self
            .store
            .connection()
            .query_row(
                "SELECT Timestamp, Value FROM Svalues
                 WHERE Code = ?1 AND Timestamp < ?2 AND Value = ?3
                 ORDER BY Timestamp DESC LIMIT 1",
                rusqlite::params![self.code, timestamp, value],
                |row| {
                    Ok(Change {
                        timestamp: row.get(0)?,
                        value: value_column(row, 1)?,
                    })
                },
            )
            .optional()?;
        Ok(row.map_or(QueryResult::Absent, QueryResult::Found))
    }

    /// The value as of just prior to `timestamp` — the most recent change
    /// strictly before it.
    pub fn value_at(&self, timestamp: i64) -> Result<QueryResult<String>, QueryError> {
        Ok(self
            .row_strictly_before(timestamp)?
            .map_or(QueryResult::Absent, |c| QueryResult::Found(c.value)))
    }

    /// Like [`Signal::value_at`], but a record exactly at `timestamp` takes
    /// precedence over the fallback to the most recent record before it.
    pub fn value_at_p(&self, timestamp: i64) -> Result<QueryResult<Change>, QueryError> {
        Ok(self
            .row_at_or_before(timestamp)?
            .map_or(QueryResult::Absent, QueryResult::Found))
    }

    /// The `(timestamp, value)` of the most recent record strictly before
    /// `timestamp`.
    pub fn prev_change(&self, timestamp: i64) -> Result<QueryResult<Change>, QueryError> {
        Ok(self
            .row_strictly_before(timestamp)?
            .map_or(QueryResult::Absent, QueryResult::Found))
    }

    /// The `(timestamp, value)` of the earliest record strictly after
    /// `timestamp`.
    pub fn next_change(&self, timestamp: i64) -> Result<QueryResult<Change>, QueryError> {
        Ok(self
            .row_strictly_after(timestamp)?
            .map_or(QueryResult::Absent, QueryResult::Found))
    }

    /// Returns `timestamp` if [`Signal::value_at_p`] at `timestamp` equals
    /// `expected`, else absent.
    pub fn eq_at(&self, timestamp: i64, expected: &str) -> Result<QueryResult<i64>, QueryError> {
        Ok(match self.value_at_p(timestamp)? {
            QueryResult::Found(c) if c.value == expected => QueryResult::Found(timestamp),
            _ => QueryResult::Absent,
        })
    }

    /// A [`Step`] wrapping [`Signal::find_after`]: advances a candidate
    /// timestamp forward to the next point this signal takes `value`.
    pub fn after_step<'s>(&'s self, value: &'s str) -> Step<'s> {
        Box::new(move |t| {
            Ok(match self.find_after(t, value)? {
                QueryResult::Found(c) => QueryResult::Found(c.timestamp),
                QueryResult::Absent => QueryResult::Absent,
            })
        })
    }

    /// A [`Step`] wrapping [`Signal::find_before`]: advances a candidate
    /// timestamp backward to the previous point this signal took `value`.
    pub fn before_step<'s>(&'s self, value: &'s str) -> Step<'s> {
        Box::new(move |t| {
            Ok(match self.find_before(t, value)? {
                QueryResult::Found(c) => QueryResult::Found(c.timestamp),
                QueryResult::Absent => QueryResult::Absent,
            })
        })
    }

    /// A [`Step`] wrapping [`Signal::eq_at`]: validates a candidate
    /// timestamp without advancing it.
    pub fn eq_step<'s>(&'s self, value: &'s str) -> Step<'s> {
        Box::new(move |t| self.eq_at(t, value))
    }

    /// Whether the gap between two timestamps is within one nanosecond of
    /// `expected_ticks` ticks, per the reference implementation's ±1 ns
    /// tolerance.
    pub fn is_duration_approx(
        &self,
        engine: &QueryEngine,
        from: i64,
        to: i64,
        expected_ticks: i64,
    ) -> Result<bool, QueryError> {
        let seconds_per_tick = engine.seconds_per_tick()?;
        let tolerance_ticks = (1e-9 / seconds_per_tick).round().max(1.0) as i64;
        Ok((to - from - expected_ticks).abs() <= tolerance_ticks)
    }

    /// Walks the `1 → 0 → 1` value transitions from `from` (matching
    /// `dbq/asserts.go`'s own `FindAfter(from,"1")` → `"0"` → `"1"` walk) and
    /// checks that both half-periods are within tolerance of
    /// `half_period_ticks`, i.e. the signal toggles like a clock over that
    /// window.
    pub fn is_clock(
        &self,
        engine: &QueryEngine,
        from: i64,
        half_period_ticks: i64,
    ) -> Result<bool, QueryError> {
        let c1 = match self.find_after(from - 1, "1")? {
            QueryResult::Found(c) => c,
            QueryResult::Absent => return Ok(false),
        };
        let c2 = match self.find_after(c1.timestamp, "0")? {
            QueryResult::Found(c) => c,
            QueryResult::Absent => return Ok(false),
        };
        let c3 = match self.find_after(c2.timestamp, "1")? {
            QueryResult::Found(c) => c,
            QueryResult::Absent => return Ok(false),
        };
        Ok(self.is_duration_approx(engine, c1.timestamp, c2.timestamp, half_period_ticks)?
            && self.is_duration_approx(engine, c2.timestamp, c3.timestamp, half_period_ticks)?)
    }
}

/// Finds the earliest `t*` such that, starting from `t*`, applying `steps`
/// left-to-right succeeds at every step: the first step generates a
/// candidate `t*` (searching strictly after `start`), and each later step
/// must resolve starting from the previous step's result. On a mismatch
/// partway through the chain, the first step's candidate advances (`retry`)
/// and the whole chain is retried; the search terminates once that stops
/// advancing, rather than after a fixed iteration count.
pub fn find_first_from(start: i64, steps: &[Step<'_>]) -> Result<QueryResult<i64>, QueryError> {
    let Some((first, rest)) = steps.split_first() else {
        return Ok(QueryResult::Absent);
    };

    let mut cursor = start;
    loop {
        let anchor = match first(cursor)? {
            QueryResult::Found(t) => t,
            QueryResult::Absent => return Ok(QueryResult::Absent),
        };

        let mut current = anchor;
        let mut ok = true;
        for step in rest {
            match step(current)? {
                QueryResult::Found(t) => current = t,
                QueryResult::Absent => {
                    ok = false;
                    break;
                }
            }
        }
        if ok {
            return Ok(QueryResult::Found(anchor));
        }
        if anchor <= cursor {
            return Ok(QueryResult::Absent);
        }
        cursor = anchor;
    }
}

/// [`find_first_from`] starting from the very beginning of the signals'
/// histories.
pub fn find_first(steps: &[Step<'_>]) -> Result<QueryResult<i64>, QueryError> {
    find_first_from(i64::MIN, steps)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::convert::{Converter, ConverterOptions};
    use crate::store::Store;
    use crate::vcd;
    use std::io::BufReader;

    fn clock_store() -> Store {
        let src = "$timescale 1 ns $end $scope module top $end \
            $var wire 1 ! clk $end $upscope $end $enddefinitions $end \
            #0 0! #5 1! #10 0! #15 1! #20 0!";
        let file = vcd::parse(BufReader::new(src.as_bytes())).unwrap();
        let store = Store::open_in_memory().unwrap();
        Converter::new(&store, ConverterOptions::default())
            .convert(&file)
            .unwrap();
        store
    }

    #[test]
    fn value_at_is_strictly_before() {
        let store = clock_store();
        let engine = QueryEngine::new(&store);
        let clk = engine.signal("/top/clk").unwrap();
        // A record exists exactly at t=0, but value_at(0) has nothing
        // strictly before it to report.
        assert_eq!(clk.value_at(0).unwrap(), QueryResult::Absent);
        assert_eq!(clk.value_at(7).unwrap(), QueryResult::Found("1".to_string()));
        assert_eq!(clk.value_at(-1).unwrap(), QueryResult::Absent);
    }

    #[test]
    fn value_at_p_includes_exact_match() {
        let store = clock_store();
        let engine = QueryEngine::new(&store);
        let clk = engine.signal("/top/clk").unwrap();
        assert_eq!(
            clk.value_at_p(0).unwrap(),
            QueryResult::Found(Change { timestamp: 0, value: "0".to_string() })
        );
    }

    #[test]
    fn eq_at_uses_value_at_p() {
        let store = clock_store();
        let engine = QueryEngine::new(&store);
        let clk = engine.signal("/top/clk").unwrap();
        assert_eq!(clk.eq_at(0, "0").unwrap(), QueryResult::Found(0));
        assert_eq!(clk.eq_at(0, "1").unwrap(), QueryResult::Absent);
    }

    #[test]
    fn find_first_is_value_filtered() {
        let store = clock_store();
        let engine = QueryEngine::new(&store);
        let clk = engine.signal("/top/clk").unwrap();
        assert_eq!(
            clk.find_first("1").unwrap(),
            QueryResult::Found(Change { timestamp: 5, value: "1".to_string() })
        );
        assert_eq!(
            clk.find_first("0").unwrap(),
            QueryResult::Found(Change { timestamp: 0, value: "0".to_string() })
        );
    }

    #[test]
    fn find_after_and_before_are_value_filtered() {
        let store = clock_store();
        let engine = QueryEngine::new(&store);
        let clk = engine.signal("/top/clk").unwrap();
        assert_eq!(
            clk.find_after(5, "0").unwrap(),
            QueryResult::Found(Change { timestamp: 10, value: "0".to_string() })
        );
        assert_eq!(
            clk.find_before(15, "0").unwrap(),
            QueryResult::Found(Change { timestamp: 10, value: "0".to_string() })
        );
    }

    #[test]
    fn clock_is_detected() {
        let store = clock_store();
        let engine = QueryEngine::new(&store);
        let clk = engine.signal("/top/clk").unwrap();
        assert!(clk.is_clock(&engine, 0, 5).unwrap());
        assert!(!clk.is_clock(&engine, 0, 3).unwrap());
    }

    #[test]
    fn clock_detection_rejects_wrong_levels() {
        // Evenly spaced changes at t=0,5,10 (values "0","1","1") would pass a
        // spacing-only check with half_period=5, but the values never walk
        // 1 -> 0 -> 1, so this must not read as a clock.
        let mut instance = crate::fixtures::Instance::new();
        instance
            .signal("/top/weird", 1)
            .at(0, "0")
            .at(5, "1")
            .at(10, "1")
            .at(15, "0");
        let engine = QueryEngine::new(&instance.store);
        let weird = engine.signal("/top/weird").unwrap();
        assert!(!weird.is_clock(&engine, 0, 5).unwrap());
    }

    #[test]
    fn sequence_matcher_finds_rise_then_fall() {
        let store = clock_store();
        let engine = QueryEngine::new(&store);
        let clk = engine.signal("/top/clk").unwrap();
        let rises_then_falls = [clk.after_step("1"), clk.after_step("0")];
        assert_eq!(find_first(&rises_then_falls).unwrap(), QueryResult::Found(5));
    }

    #[test]
    fn sequence_matcher_spans_multiple_signals() {
        // clk1 only takes "1" at t=500; clk2/clk3 happen to equal "2"/"3"
        // at that same instant, but also at earlier, mismatched instants.
        let mut instance = crate::fixtures::Instance::new();
        instance.signal("/top/clk1", 1).at(0, "0").at(500, "1");
        instance.signal("/top/clk2", 1).at(0, "9").at(500, "2");
        instance.signal("/top/clk3", 1).at(0, "9").at(500, "3");
        let engine = QueryEngine::new(&instance.store);
        let clk1 = engine.signal("/top/clk1").unwrap();
        let clk2 = engine.signal("/top/clk2").unwrap();
        let clk3 = engine.signal("/top/clk3").unwrap();

        let steps = [clk1.after_step("1"), clk2.eq_step("2"), clk3.eq_step("3")];
        assert_eq!(find_first(&steps).unwrap(), QueryResult::Found(500));
    }

    #[test]
    fn sequence_matcher_retries_past_mismatches() {
        // clk1 takes "1" twice; only the second occurrence lines up with
        // clk2 == "2", so the matcher must retry past the first.
        let mut instance = crate::fixtures::Instance::new();
        instance.signal("/top/clk1", 1).at(0, "0").at(5, "1").at(10, "0").at(15, "1");
        instance.signal("/top/clk2", 1).at(0, "9").at(15, "2");
        let engine = QueryEngine::new(&instance.store);
        let clk1 = engine.signal("/top/clk1").unwrap();
        let clk2 = engine.signal("/top/clk2").unwrap();

        let steps = [clk1.after_step("1"), clk2.eq_step("2")];
        assert_eq!(find_first(&steps).unwrap(), QueryResult::Found(15));
    }

    #[test]
    fn sequence_matcher_reports_absent_when_unsatisfiable() {
        let store = clock_store();
        let engine = QueryEngine::new(&store);
        let clk = engine.signal("/top/clk").unwrap();
        let never = [clk.after_step("z")];
        assert_eq!(find_first(&never).unwrap(), QueryResult::Absent);
    }
}
