// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Replicate Statistics Engine - Flat-file Reports
//
// Renders a metric's selected facets as tab-separated text:
//   <title>.txt        year x rep sum table          (OUT_DATA)
//   <title>Events.txt  every captured observation    (OUT_EVENTS)
//   <title>Stats.txt   by-year / by-rep statistics   (OUT_YEAR | OUT_REP)
// Files are written sequentially and are not transactional.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::event_log::SegmentAllocator;
use crate::running::RunningAggregate;
use crate::statistic::{MetricAggregator, StatError};
use crate::types::OutputFlags;

// ─── Writer ─────────────────────────────────────────────────────────────────

/// Writes metric report files into one output directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Emit every file selected by the metric's output flags. Returns the
    /// paths written, in the order they were produced.
    pub fn write<A: SegmentAllocator + Clone>(
        &self,
        metric: &MetricAggregator<A>,
    ) -> Result<Vec<PathBuf>, StatError> {
        let flags = metric.flags();
        let title = metric.title();
        let mut written = Vec::new();

        if flags.wants_summary() || flags.contains(OutputFlags::OUT_DATA) || metric.captures_events() {
            std::fs::create_dir_all(&self.dir).map_err(|e| StatError::io(&self.dir, e))?;
        }
        if flags.wants_summary() {
            written.push(self.write_file(&format!("{title}Stats.txt"), |out| {
                render_summary(metric, out)
            })?);
        }
        if flags.contains(OutputFlags::OUT_DATA) {
            written.push(self.write_file(&format!("{title}.txt"), |out| {
                render_data_table(metric, out)
            })?);
        }
        if metric.captures_events() {
            written.push(self.write_file(&format!("{title}Events.txt"), |out| {
                render_event_table(metric, out)
            })?);
        }
        Ok(written)
    }

    fn write_file(
        &self,
        name: &str,
        render: impl FnOnce(&mut BufWriter<File>) -> io::Result<()>,
    ) -> Result<PathBuf, StatError> {
        let path = self.dir.join(name);
        let file = File::create(&path).map_err(|e| StatError::io(&path, e))?;
        let mut out = BufWriter::new(file);
        render(&mut out)
            .and_then(|()| out.flush())
            .map_err(|e| StatError::io(&path, e))?;
        Ok(path)
    }
}

// ─── Renderers ──────────────────────────────────────────────────────────────

/// Header `Year\tRep 0\tRep 1...`, then one row per year holding the
/// per-rep sums (each value followed by a tab), then a blank line.
pub fn render_data_table<A, W>(metric: &MetricAggregator<A>, out: &mut W) -> io::Result<()>
where
    A: SegmentAllocator + Clone,
    W: Write,
{
    write!(out, "Year")?;
    for rep in 0..metric.max_reps() {
        write!(out, "\tRep {rep}")?;
    }
    writeln!(out)?;
    for (year, sums) in metric.sum_rows() {
        write!(out, "{year}\t")?;
        for sum in sums {
            write!(out, "{sum}\t")?;
        }
        writeln!(out)?;
    }
    writeln!(out)
}

/// Header `Year\tRep\tValue`, then one line per event: replicates in the
/// outer loop, years inside, events in append order.
pub fn render_event_table<A, W>(metric: &MetricAggregator<A>, out: &mut W) -> io::Result<()>
where
    A: SegmentAllocator + Clone,
    W: Write,
{
    writeln!(out, "Year\tRep\tValue")?;
    for (year, rep, events) in metric.events_by_rep() {
        for value in events {
            writeln!(out, "{year}\t{rep}\t{value}")?;
        }
    }
    Ok(())
}

/// Title line followed by the by-year and by-rep statistic rows selected
/// by the metric's flags. Undefined statistics render as `NaN`.
pub fn render_summary<A, W>(metric: &MetricAggregator<A>, out: &mut W) -> io::Result<()>
where
    A: SegmentAllocator + Clone,
    W: Write,
{
    let flags = metric.flags();
    let labelled = flags.contains(OutputFlags::OUT_FORMAT);
    writeln!(out, "{}", metric.title())?;

    if flags.contains(OutputFlags::OUT_YEAR) {
        let (years, stats): (Vec<i32>, Vec<&RunningAggregate>) = metric.years().unzip();
        if labelled {
            write_row(out, "Year:", years.iter().map(i32::to_string))?;
        }
        write_stat_rows(out, flags, labelled, &stats)?;
    }

    if flags.contains(OutputFlags::OUT_REP) {
        let (reps, stats): (Vec<usize>, Vec<&RunningAggregate>) = metric.reps().unzip();
        if labelled {
            write_row(out, "Rep:", reps.iter().map(usize::to_string))?;
        }
        write_stat_rows(out, flags, labelled, &stats)?;
    }
    Ok(())
}

/// Render a report into a `String`, for callers without a filesystem.
pub fn render_to_string(
    render: impl FnOnce(&mut Vec<u8>) -> io::Result<()>,
) -> io::Result<String> {
    let mut buf = Vec::new();
    render(&mut buf)?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn write_stat_rows<W: Write>(
    out: &mut W,
    flags: OutputFlags,
    labelled: bool,
    stats: &[&RunningAggregate],
) -> io::Result<()> {
    let rows: [(OutputFlags, &str, fn(&RunningAggregate) -> Option<f64>); 5] = [
        (OutputFlags::OUT_NUM, "Num:", |s| Some(s.count() as f64)),
        (OutputFlags::OUT_MEAN, "Mean:", RunningAggregate::mean),
        (OutputFlags::OUT_STD_DEV, "Std:", RunningAggregate::std_dev),
        (OutputFlags::OUT_MIN, "Min:", RunningAggregate::min),
        (OutputFlags::OUT_MAX, "Max:", RunningAggregate::max),
    ];
    for (flag, label, stat) in rows {
        if flags.contains(flag) {
            let label = if labelled { label } else { "" };
            write_row(out, label, stats.iter().map(|s| format_value(stat(*s))))?;
        }
    }
    Ok(())
}

fn write_row<W: Write>(
    out: &mut W,
    label: &str,
    cells: impl Iterator<Item = String>,
) -> io::Result<()> {
    write!(out, "{label}")?;
    for cell in cells {
        write!(out, "\t{cell}")?;
    }
    writeln!(out)
}

fn format_value(value: Option<f64>) -> String {
    value.unwrap_or(f64::NAN).to_string()
}

// ─── Tests ──────────────────────────────────────────────────────────────────
