// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Replicate Statistics Engine
//
// Year x replicate statistics for long-running stochastic simulations:
// running aggregates per year and per replicate, a year x rep sum grid,
// and an optional bucketed log of every observation.

pub mod types;
pub mod config;
pub mod running;
pub mod event_log;
pub mod statistic;
pub mod report;
pub mod registry;

pub use types::{Axis, OutputFlags};
pub use config::{ConfigError, SimulationConfig, DEFAULT_BUCKET_CAPACITY};
pub use running::{AggregateSummary, RunningAggregate};
pub use event_log::{AllocError, BucketedEventLog, EventLogError, SegmentAllocator, SystemAllocator};
pub use statistic::{MetricAggregator, MetricSnapshot, StatError};
pub use report::ReportWriter;
pub use registry::StatRegistry;

use wasm_bindgen::prelude::*;

// ─── WASM Interface ──────────────────────────────────────────────────────────

/// A single metric exposed to JavaScript. Reports are returned as strings
/// since the browser has no output directory.
#[wasm_bindgen]
pub struct WasmStatistic {
    inner: MetricAggregator,
}

#[wasm_bindgen]
impl WasmStatistic {
    #[wasm_bindgen(constructor)]
    pub fn new(
        title: &str,
        first_year: i32,
        last_year: i32,
        max_reps: u32,
        flags: u32,
    ) -> Result<WasmStatistic, JsError> {
        #[cfg(target_arch = "wasm32")]
        std::panic::set_hook(Box::new(console_error_panic_hook::hook));

        let config = SimulationConfig::new(first_year, last_year, max_reps as usize)?;
        let inner = MetricAggregator::new(title, OutputFlags::from_bits(flags), &config)?;
        Ok(Self { inner })
    }

    pub fn add(&mut self, year: i32, rep: u32, value: f64) -> Result<(), JsError> {
        self.inner.add(year, rep as usize, value)?;
        Ok(())
    }

    pub fn increment_tally(&mut self) { self.inner.increment_tally(); }
    pub fn decrement_tally(&mut self) { self.inner.decrement_tally(); }
    pub fn tally(&self) -> f64 { self.inner.tally() as f64 }

    pub fn sum_of_year_rep(&self, year: i32, rep: u32) -> Result<f64, JsError> {
        Ok(self.inner.sum_of_year_rep(year, rep as usize)?)
    }

    pub fn sum_across_years(&self) -> f64 { self.inner.sum_across_years() }
    pub fn sum_across_reps(&self) -> f64 { self.inner.sum_across_reps() }

    pub fn clear(&mut self) { self.inner.clear(); }

    pub fn snapshot(&self) -> JsValue {
        serde_wasm_bindgen::to_value(&self.inner.snapshot()).unwrap_or(JsValue::NULL)
    }

    /// Contents of `<title>.txt`.
    pub fn data_table(&self) -> Result<String, JsError> {
        Ok(report::render_to_string(|out| report::render_data_table(&self.inner, out))?)
    }

    /// Contents of `<title>Events.txt`.
    pub fn event_table(&self) -> Result<String, JsError> {
        Ok(report::render_to_string(|out| report::render_event_table(&self.inner, out))?)
    }

    /// Contents of `<title>Stats.txt`.
    pub fn summary(&self) -> Result<String, JsError> {
        Ok(report::render_to_string(|out| report::render_summary(&self.inner, out))?)
    }
}
