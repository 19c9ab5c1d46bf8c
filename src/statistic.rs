// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Per-metric aggregation across the year and replicate dimensions.
//!
//! A single `add(year, rep, value)` updates, as one unit:
//!
//! ```text
//! year_stats[year]   rep_stats[rep]   sum_grid[year][rep]   event_log[year][rep]?
//! ```
//!
//! The event log exists only when the metric's output selector asks for
//! events. All indices are validated before anything is mutated.
//!
//! Aggregators are single-writer: mutation takes `&mut self` and there is
//! no internal locking. Parallel producers should each own an aggregator
//! and [`merge`](MetricAggregator::merge) them afterwards.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, SimulationConfig};
use crate::event_log::{BucketedEventLog, EventLogError, Events, SegmentAllocator, SystemAllocator};
use crate::report::ReportWriter;
use crate::running::{AggregateSummary, RunningAggregate};
use crate::types::{Axis, OutputFlags};

const NO_BUCKETS: &[Vec<f64>] = &[];

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StatError {
    #[error("{axis} {index} outside configured range {lower}..={upper}")]
    OutOfRangeIndex {
        axis: Axis,
        index: i64,
        lower: i64,
        upper: i64,
    },

    #[error(
        "failed adding event to `{title}` at year {year}, rep {rep}: \
         {buckets} bucket(s) allocated, current bucket holds {fill} of {capacity}"
    )]
    EventLogAllocation {
        title: String,
        year: i32,
        rep: usize,
        buckets: usize,
        fill: usize,
        capacity: usize,
        #[source]
        source: EventLogError,
    },

    #[error("cannot merge `{other}` into `{title}`: year range, replicate count or event capture differs")]
    ShapeMismatch { title: String, other: String },

    #[error("metric `{0}` is already registered")]
    DuplicateTitle(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize snapshot: {0}")]
    Json(#[from] serde_json::Error),
}

impl StatError {
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, Self::OutOfRangeIndex { .. })
    }

    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io { path: path.to_path_buf(), source }
    }
}

// ---------------------------------------------------------------------------
// MetricAggregator
// ---------------------------------------------------------------------------

/// Running statistics of one named metric, sliced by year and by replicate.
#[derive(Debug, Clone)]
pub struct MetricAggregator<A = SystemAllocator> {
    title: String,
    flags: OutputFlags,
    config: SimulationConfig,
    tally: i64,
    year_stats: Vec<RunningAggregate>,
    rep_stats: Vec<RunningAggregate>,
    /// Row-major `num_years x max_reps`.
    sum_grid: Vec<f64>,
    event_logs: Option<Vec<BucketedEventLog<A>>>,
}

impl MetricAggregator {
    pub fn new(
        title: impl Into<String>,
        flags: OutputFlags,
        config: &SimulationConfig,
    ) -> Result<Self, StatError> {
        Self::with_allocator(title, flags, config, SystemAllocator)
    }
}

impl<A: SegmentAllocator + Clone> MetricAggregator<A> {
    /// Build an aggregator whose event buckets are obtained from `alloc`.
    pub fn with_allocator(
        title: impl Into<String>,
        flags: OutputFlags,
        config: &SimulationConfig,
        alloc: A,
    ) -> Result<Self, StatError> {
        config.validate()?;
        let num_years = config.num_years();
        let max_reps = config.max_reps;
        let event_logs = flags.captures_events().then(|| {
            (0..num_years * max_reps)
                .map(|_| BucketedEventLog::with_allocator(config.bucket_capacity, alloc.clone()))
                .collect()
        });

        Ok(Self {
            title: title.into(),
            flags,
            config: config.clone(),
            tally: 0,
            year_stats: vec![RunningAggregate::new(); num_years],
            rep_stats: vec![RunningAggregate::new(); max_reps],
            sum_grid: vec![0.0; num_years * max_reps],
            event_logs,
        })
    }

    /// Record one observation for `(year, rep)`.
    ///
    /// Out-of-range indices are rejected before any state changes. With
    /// event capture on, the event is stored first so that an allocation
    /// failure also leaves the running statistics untouched.
    pub fn add(&mut self, year: i32, rep: usize, value: f64) -> Result<(), StatError> {
        let (y, cell) = self.cell(year, rep)?;

        if let Some(logs) = self.event_logs.as_mut() {
            if let Err(source) = logs[cell].append(value) {
                let EventLogError::AllocationFailure { buckets, fill, capacity, .. } = source;
                return Err(StatError::EventLogAllocation {
                    title: self.title.clone(),
                    year,
                    rep,
                    buckets,
                    fill,
                    capacity,
                    source,
                });
            }
        }

        self.year_stats[y].add(value);
        self.rep_stats[rep].add(value);
        self.sum_grid[cell] += value;
        Ok(())
    }

    pub fn increment_tally(&mut self) {
        self.tally += 1;
    }

    pub fn decrement_tally(&mut self) {
        self.tally -= 1;
    }

    pub fn tally(&self) -> i64 {
        self.tally
    }

    /// Sum of every value added for exactly this `(year, rep)`.
    pub fn sum_of_year_rep(&self, year: i32, rep: usize) -> Result<f64, StatError> {
        let (_, cell) = self.cell(year, rep)?;
        Ok(self.sum_grid[cell])
    }

    /// Total of the per-year marginal sums.
    pub fn sum_across_years(&self) -> f64 {
        self.year_stats.iter().map(RunningAggregate::sum).sum()
    }

    /// Total of the per-replicate marginal sums.
    pub fn sum_across_reps(&self) -> f64 {
        self.rep_stats.iter().map(RunningAggregate::sum).sum()
    }

    pub fn year_stats(&self, year: i32) -> Result<&RunningAggregate, StatError> {
        let y = self.year_slot(year)?;
        Ok(&self.year_stats[y])
    }

    pub fn rep_stats(&self, rep: usize) -> Result<&RunningAggregate, StatError> {
        self.check_rep(rep)?;
        Ok(&self.rep_stats[rep])
    }

    /// `(year, stats)` for every configured year, in order.
    pub fn years(&self) -> impl Iterator<Item = (i32, &RunningAggregate)> + '_ {
        self.config.years().zip(self.year_stats.iter())
    }

    /// `(rep, stats)` for every replicate, in order.
    pub fn reps(&self) -> impl Iterator<Item = (usize, &RunningAggregate)> + '_ {
        self.rep_stats.iter().enumerate()
    }

    /// Rows of the sum grid: `(year, sums for reps 0..max_reps)`.
    pub fn sum_rows(&self) -> impl Iterator<Item = (i32, &[f64])> + '_ {
        self.config.years().zip(self.sum_grid.chunks(self.config.max_reps))
    }

    /// Stored events for `(year, rep)` in insertion order. Empty when
    /// event capture is off.
    pub fn events(&self, year: i32, rep: usize) -> Result<Events<'_>, StatError> {
        let (_, cell) = self.cell(year, rep)?;
        Ok(self.cell_events(cell))
    }

    /// Events of every cell, replicate-major then year.
    pub fn events_by_rep(&self) -> impl Iterator<Item = (i32, usize, Events<'_>)> + '_ {
        let max_reps = self.config.max_reps;
        (0..max_reps).flat_map(move |rep| {
            self.config
                .years()
                .enumerate()
                .map(move |(y, year)| (year, rep, self.cell_events(y * max_reps + rep)))
        })
    }

    pub fn event_log(&self, year: i32, rep: usize) -> Result<Option<&BucketedEventLog<A>>, StatError> {
        let (_, cell) = self.cell(year, rep)?;
        Ok(self.event_logs.as_ref().map(|logs| &logs[cell]))
    }

    pub fn event_count(&self) -> usize {
        self.event_logs
            .as_ref()
            .map(|logs| logs.iter().map(BucketedEventLog::len).sum())
            .unwrap_or(0)
    }

    pub fn captures_events(&self) -> bool {
        self.event_logs.is_some()
    }

    /// Reset every statistic, the sum grid, the tally and all event logs.
    /// Title, selector, year range and replicate count are kept.
    pub fn clear(&mut self) {
        self.tally = 0;
        self.year_stats.iter_mut().for_each(RunningAggregate::reset);
        self.rep_stats.iter_mut().for_each(RunningAggregate::reset);
        self.sum_grid.fill(0.0);
        if let Some(logs) = self.event_logs.as_mut() {
            logs.iter_mut().for_each(BucketedEventLog::clear);
        }
    }

    /// Fold another aggregator of identical shape into this one.
    ///
    /// All or nothing: if event memory runs out, every log is cut back to
    /// its length before the call and nothing else is touched.
    pub fn merge(&mut self, other: &Self) -> Result<(), StatError> {
        if self.config.years() != other.config.years()
            || self.config.max_reps != other.config.max_reps
            || self.captures_events() != other.captures_events()
        {
            return Err(StatError::ShapeMismatch {
                title: self.title.clone(),
                other: other.title.clone(),
            });
        }

        if let (Some(mine), Some(theirs)) = (self.event_logs.as_mut(), other.event_logs.as_ref()) {
            let marks: Vec<usize> = mine.iter().map(BucketedEventLog::len).collect();
            let copied = mine.iter_mut().zip(theirs).enumerate().try_for_each(|(cell, (dst, src))| {
                src.iter().try_for_each(|value| dst.append(value)).map_err(|e| (cell, e))
            });
            if let Err((cell, source)) = copied {
                for (log, &mark) in mine.iter_mut().zip(&marks) {
                    log.truncate(mark);
                }
                let max_reps = self.config.max_reps;
                let EventLogError::AllocationFailure { buckets, fill, capacity, .. } = source;
                return Err(StatError::EventLogAllocation {
                    title: self.title.clone(),
                    year: self.config.first_year + (cell / max_reps) as i32,
                    rep: cell % max_reps,
                    buckets,
                    fill,
                    capacity,
                    source,
                });
            }
        }

        for (dst, src) in self.year_stats.iter_mut().zip(&other.year_stats) {
            dst.merge(src);
        }
        for (dst, src) in self.rep_stats.iter_mut().zip(&other.rep_stats) {
            dst.merge(src);
        }
        for (dst, src) in self.sum_grid.iter_mut().zip(&other.sum_grid) {
            *dst += src;
        }
        self.tally += other.tally;
        Ok(())
    }

    /// Write the selected report files to the configured output directory.
    pub fn save(&self) -> Result<Vec<PathBuf>, StatError> {
        self.save_to(&self.config.output_dir)
    }

    pub fn save_to(&self, dir: &Path) -> Result<Vec<PathBuf>, StatError> {
        ReportWriter::new(dir).write(self)
    }

    pub fn snapshot(&self) -> MetricSnapshot {
        MetricSnapshot {
            title: self.title.clone(),
            flags: self.flags,
            first_year: self.config.first_year,
            last_year: self.config.last_year,
            max_reps: self.config.max_reps,
            tally: self.tally,
            by_year: self.year_stats.iter().map(RunningAggregate::summary).collect(),
            by_rep: self.rep_stats.iter().map(RunningAggregate::summary).collect(),
            sums: self.sum_grid.chunks(self.config.max_reps).map(<[f64]>::to_vec).collect(),
            event_count: self.event_count(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn flags(&self) -> OutputFlags {
        self.flags
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn first_year(&self) -> i32 {
        self.config.first_year
    }

    pub fn last_year(&self) -> i32 {
        self.config.last_year
    }

    pub fn max_reps(&self) -> usize {
        self.config.max_reps
    }

    // Index validation

    fn year_slot(&self, year: i32) -> Result<usize, StatError> {
        self.config.year_index(year).ok_or(StatError::OutOfRangeIndex {
            axis: Axis::Year,
            index: i64::from(year),
            lower: i64::from(self.config.first_year),
            upper: i64::from(self.config.last_year),
        })
    }

    fn check_rep(&self, rep: usize) -> Result<(), StatError> {
        if self.config.contains_rep(rep) {
            Ok(())
        } else {
            Err(StatError::OutOfRangeIndex {
                axis: Axis::Rep,
                index: i64::try_from(rep).unwrap_or(i64::MAX),
                lower: 0,
                upper: i64::try_from(self.config.max_reps).map_or(i64::MAX, |n| n - 1),
            })
        }
    }

    fn cell_events(&self, cell: usize) -> Events<'_> {
        match &self.event_logs {
            Some(logs) => logs[cell].iter(),
            None => NO_BUCKETS.iter().flatten().copied(),
        }
    }

    /// `(year slot, grid cell)` for a validated coordinate.
    fn cell(&self, year: i32, rep: usize) -> Result<(usize, usize), StatError> {
        let y = self.year_slot(year)?;
        self.check_rep(rep)?;
        Ok((y, y * self.config.max_reps + rep))
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Serializable view of a metric's aggregates (events are only counted).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub title: String,
    pub flags: OutputFlags,
    pub first_year: i32,
    pub last_year: i32,
    pub max_reps: usize,
    pub tally: i64,
    pub by_year: Vec<AggregateSummary>,
    pub by_rep: Vec<AggregateSummary>,
    /// `sums[year - first_year][rep]`.
    pub sums: Vec<Vec<f64>>,
    pub event_count: usize,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SimulationConfig {
        SimulationConfig::new(2000, 2001, 2).unwrap()
    }

    fn metric(flags: OutputFlags) -> MetricAggregator {
        MetricAggregator::new("Burn", flags, &config()).unwrap()
    }

    #[test]
    fn worked_example() {
        let mut m = metric(OutputFlags::OUT_DATA);
        m.add(2000, 0, 5.0).unwrap();
        m.add(2000, 1, 3.0).unwrap();
        m.add(2001, 0, 2.0).unwrap();

        assert_eq!(m.sum_of_year_rep(2000, 0).unwrap(), 5.0);
        assert_eq!(m.sum_of_year_rep(2000, 1).unwrap(), 3.0);
        assert_eq!(m.sum_of_year_rep(2001, 0).unwrap(), 2.0);
        assert_eq!(m.sum_of_year_rep(2001, 1).unwrap(), 0.0);
        assert_eq!(m.year_stats(2000).unwrap().count(), 2);
        assert_eq!(m.rep_stats(0).unwrap().count(), 2);
    }

    #[test]
    fn events_absent_without_flag() {
        let mut m = metric(OutputFlags::OUT_DATA);
        m.add(2000, 0, 1.0).unwrap();
        assert!(!m.captures_events());
        assert!(m.event_log(2000, 0).unwrap().is_none());
        assert_eq!(m.events(2000, 0).unwrap().count(), 0);
        assert_eq!(m.event_count(), 0);
    }

    #[test]
    fn events_captured_per_cell() {
        let mut m = metric(OutputFlags::OUT_EVENTS);
        m.add(2001, 1, 4.0).unwrap();
        m.add(2001, 1, -1.5).unwrap();
        m.add(2000, 1, 7.0).unwrap();
        assert_eq!(m.events(2001, 1).unwrap().collect::<Vec<_>>(), vec![4.0, -1.5]);
        assert_eq!(m.events(2000, 1).unwrap().collect::<Vec<_>>(), vec![7.0]);
        assert_eq!(m.event_count(), 3);
    }

    #[test]
    fn out_of_range_year_and_rep() {
        let mut m = metric(OutputFlags::OUT_EVENTS);
        let err = m.add(1999, 0, 1.0).unwrap_err();
        assert!(err.is_out_of_range());
        assert!(matches!(
            err,
            StatError::OutOfRangeIndex { axis: Axis::Year, index: 1999, lower: 2000, upper: 2001 }
        ));

        let err = m.add(2000, 2, 1.0).unwrap_err();
        assert!(matches!(
            err,
            StatError::OutOfRangeIndex { axis: Axis::Rep, index: 2, lower: 0, upper: 1 }
        ));
        assert!(m.sum_of_year_rep(2002, 0).unwrap_err().is_out_of_range());
        assert!(m.rep_stats(5).is_err());
        assert_eq!(m.event_count(), 0);
    }

    #[test]
    fn tally_is_independent_of_values() {
        let mut m = metric(OutputFlags::NONE);
        m.increment_tally();
        m.increment_tally();
        m.decrement_tally();
        assert_eq!(m.tally(), 1);
        assert_eq!(m.year_stats(2000).unwrap().count(), 0);
        m.decrement_tally();
        m.decrement_tally();
        assert_eq!(m.tally(), -1);
    }

    #[test]
    fn clear_keeps_shape_and_selector() {
        let mut m = metric(OutputFlags::OUT_EVENTS | OutputFlags::OUT_DATA);
        let fresh = m.snapshot();
        m.add(2000, 1, 2.0).unwrap();
        m.increment_tally();
        m.clear();
        assert_eq!(m.snapshot(), fresh);
        assert_eq!(m.event_log(2000, 1).unwrap().unwrap().bucket_count(), 1);
        assert_eq!(m.flags(), OutputFlags::OUT_EVENTS | OutputFlags::OUT_DATA);
    }

    #[test]
    fn merge_combines_everything() {
        let mut a = metric(OutputFlags::OUT_EVENTS);
        let mut b = metric(OutputFlags::OUT_EVENTS);
        a.add(2000, 0, 1.0).unwrap();
        b.add(2000, 0, 3.0).unwrap();
        b.add(2001, 1, 5.0).unwrap();
        b.increment_tally();

        a.merge(&b).unwrap();
        assert_eq!(a.sum_of_year_rep(2000, 0).unwrap(), 4.0);
        assert_eq!(a.sum_of_year_rep(2001, 1).unwrap(), 5.0);
        assert_eq!(a.year_stats(2000).unwrap().mean(), Some(2.0));
        assert_eq!(a.rep_stats(1).unwrap().count(), 1);
        assert_eq!(a.tally(), 1);
        assert_eq!(a.events(2000, 0).unwrap().collect::<Vec<_>>(), vec![1.0, 3.0]);
    }

    #[test]
    fn merge_rejects_other_shape() {
        let mut a = metric(OutputFlags::NONE);
        let other = SimulationConfig::new(2000, 2002, 2).unwrap();
        let b = MetricAggregator::new("Other", OutputFlags::NONE, &other).unwrap();
        assert!(matches!(a.merge(&b), Err(StatError::ShapeMismatch { .. })));

        let c = metric(OutputFlags::OUT_EVENTS);
        assert!(matches!(a.merge(&c), Err(StatError::ShapeMismatch { .. })));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = config();
        config.max_reps = 0;
        let err = MetricAggregator::new("x", OutputFlags::NONE, &config).unwrap_err();
        assert!(matches!(err, StatError::Config(ConfigError::NoReplicates)));
    }

    #[test]
    fn snapshot_grid_is_year_major() {
        let mut m = metric(OutputFlags::NONE);
        m.add(2001, 0, 9.0).unwrap();
        let snap = m.snapshot();
        assert_eq!(snap.sums, vec![vec![0.0, 0.0], vec![9.0, 0.0]]);
        assert_eq!(snap.by_year[1].count, 1);
        assert!(snap.by_year[0].mean.is_none());
    }
}
