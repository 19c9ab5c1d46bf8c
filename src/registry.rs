// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Replicate Statistics Engine - Metric Registry
//
// A run tracks several named metrics against one configuration. The
// registry owns them, keeps titles unique (titles are file stems) and
// saves everything at the end of the run.

use std::path::{Path, PathBuf};

use crate::config::SimulationConfig;
use crate::report::ReportWriter;
use crate::statistic::{MetricAggregator, MetricSnapshot, StatError};
use crate::types::OutputFlags;

#[derive(Debug, Clone)]
pub struct StatRegistry {
    config: SimulationConfig,
    metrics: Vec<MetricAggregator>,
}

impl StatRegistry {
    pub fn new(config: SimulationConfig) -> Result<Self, StatError> {
        config.validate()?;
        Ok(Self { config, metrics: Vec::new() })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Register a new metric and return it for immediate use.
    pub fn add_metric(
        &mut self,
        title: &str,
        flags: OutputFlags,
    ) -> Result<&mut MetricAggregator, StatError> {
        if self.metrics.iter().any(|m| m.title() == title) {
            return Err(StatError::DuplicateTitle(title.to_string()));
        }
        let metric = MetricAggregator::new(title, flags, &self.config)?;
        let index = self.metrics.len();
        self.metrics.push(metric);
        Ok(&mut self.metrics[index])
    }

    pub fn get(&self, title: &str) -> Option<&MetricAggregator> {
        self.metrics.iter().find(|m| m.title() == title)
    }

    pub fn get_mut(&mut self, title: &str) -> Option<&mut MetricAggregator> {
        self.metrics.iter_mut().find(|m| m.title() == title)
    }

    /// Metrics in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &MetricAggregator> + '_ {
        self.metrics.iter()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn clear_all(&mut self) {
        self.metrics.iter_mut().for_each(MetricAggregator::clear);
    }

    /// Save every metric into the configured output directory.
    pub fn save_all(&self) -> Result<Vec<PathBuf>, StatError> {
        let writer = ReportWriter::new(&self.config.output_dir);
        let mut written = Vec::new();
        for metric in &self.metrics {
            written.extend(writer.write(metric)?);
        }
        Ok(written)
    }

    pub fn snapshots(&self) -> Vec<MetricSnapshot> {
        self.metrics.iter().map(MetricAggregator::snapshot).collect()
    }

    /// Write all snapshots as pretty JSON to `<output_dir>/<name>.json`.
    pub fn save_json(&self, name: &str) -> Result<PathBuf, StatError> {
        let dir: &Path = &self.config.output_dir;
        std::fs::create_dir_all(dir).map_err(|e| StatError::io(dir, e))?;
        let path = dir.join(format!("{name}.json"));
        let json = serde_json::to_string_pretty(&self.snapshots())?;
        std::fs::write(&path, json).map_err(|e| StatError::io(&path, e))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(dir: &Path) -> StatRegistry {
        let config = SimulationConfig::new(1990, 1992, 3).unwrap().with_output_dir(dir);
        StatRegistry::new(config).unwrap()
    }

    #[test]
    fn duplicate_titles_rejected() {
        let mut reg = registry(Path::new("."));
        reg.add_metric("FireSize", OutputFlags::OUT_DATA).unwrap();
        let err = reg.add_metric("FireSize", OutputFlags::NONE).unwrap_err();
        assert!(matches!(err, StatError::DuplicateTitle(t) if t == "FireSize"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn metrics_are_addressable_by_title() {
        let mut reg = registry(Path::new("."));
        reg.add_metric("A", OutputFlags::NONE).unwrap().add(1991, 2, 4.0).unwrap();
        reg.add_metric("B", OutputFlags::NONE).unwrap();
        reg.get_mut("B").unwrap().increment_tally();

        assert_eq!(reg.get("A").unwrap().sum_of_year_rep(1991, 2).unwrap(), 4.0);
        assert_eq!(reg.get("B").unwrap().tally(), 1);
        assert!(reg.get("C").is_none());
        let titles: Vec<&str> = reg.iter().map(MetricAggregator::title).collect();
        assert_eq!(titles, vec!["A", "B"]);

        reg.clear_all();
        assert_eq!(reg.get("A").unwrap().sum_across_years(), 0.0);
        assert_eq!(reg.get("B").unwrap().tally(), 0);
    }

    #[test]
    fn save_all_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("stats");
        let mut reg = registry(&out);
        reg.add_metric("Area", OutputFlags::OUT_DATA).unwrap().add(1990, 0, 1.5).unwrap();
        reg.add_metric("Fires", OutputFlags::OUT_EVENTS).unwrap().add(1992, 1, 2.0).unwrap();

        let written = reg.save_all().unwrap();
        assert_eq!(written, vec![out.join("Area.txt"), out.join("FiresEvents.txt")]);

        let path = reg.save_json("summary").unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        let snaps: Vec<MetricSnapshot> = serde_json::from_str(&text).unwrap();
        assert_eq!(snaps, reg.snapshots());
        assert_eq!(snaps[1].event_count, 1);
    }
}
