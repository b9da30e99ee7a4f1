// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Core Metrics
//!
//! Prometheus counters and gauges for the tick loop (`spec.md` §9 Design
//! Notes): ticks run, scheduler RPCs sent, projects currently backed off,
//! and each project's current REC.

use std::sync::Arc;

use prometheus::{GaugeVec, IntCounter, IntGauge, Opts, Registry};

use core_domain::error::CoreError;

/// Registers and updates the counters/gauges the tick loop reports.
pub struct CoreMetrics {
    registry: Arc<Registry>,
    ticks_run_total: IntCounter,
    rpcs_sent_total: IntCounter,
    projects_backed_off: IntGauge,
    project_rec: GaugeVec,
}

impl CoreMetrics {
    pub fn new() -> Result<Self, CoreError> {
        let registry = Arc::new(Registry::new());

        let ticks_run_total = IntCounter::with_opts(Opts::new("boinc_ticks_run_total", "Total number of scheduling ticks executed"))
            .map_err(|e| CoreError::internal(format!("failed to build ticks_run_total: {e}")))?;

        let rpcs_sent_total = IntCounter::with_opts(Opts::new("boinc_rpcs_sent_total", "Total number of scheduler RPCs sent"))
            .map_err(|e| CoreError::internal(format!("failed to build rpcs_sent_total: {e}")))?;

        let projects_backed_off = IntGauge::with_opts(Opts::new(
            "boinc_projects_backed_off",
            "Number of projects currently in scheduler-RPC back-off",
        ))
        .map_err(|e| CoreError::internal(format!("failed to build projects_backed_off: {e}")))?;

        let project_rec = GaugeVec::new(
            Opts::new("boinc_project_rec", "Current Recent Estimated Credit per project"),
            &["master_url"],
        )
        .map_err(|e| CoreError::internal(format!("failed to build project_rec: {e}")))?;

        registry
            .register(Box::new(ticks_run_total.clone()))
            .map_err(|e| CoreError::internal(format!("failed to register ticks_run_total: {e}")))?;
        registry
            .register(Box::new(rpcs_sent_total.clone()))
            .map_err(|e| CoreError::internal(format!("failed to register rpcs_sent_total: {e}")))?;
        registry
            .register(Box::new(projects_backed_off.clone()))
            .map_err(|e| CoreError::internal(format!("failed to register projects_backed_off: {e}")))?;
        registry
            .register(Box::new(project_rec.clone()))
            .map_err(|e| CoreError::internal(format!("failed to register project_rec: {e}")))?;

        Ok(Self { registry, ticks_run_total, rpcs_sent_total, projects_backed_off, project_rec })
    }

    pub fn record_tick(&self) {
        self.ticks_run_total.inc();
    }

    pub fn record_rpc_sent(&self) {
        self.rpcs_sent_total.inc();
    }

    pub fn set_projects_backed_off(&self, count: i64) {
        self.projects_backed_off.set(count);
    }

    pub fn set_project_rec(&self, master_url: &str, rec: f64) {
        self.project_rec.with_label_values(&[master_url]).set(rec);
    }

    /// Renders the current registry in the Prometheus text exposition
    /// format, for `presentation`'s metrics endpoint.
    pub fn render(&self) -> Result<String, CoreError> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        encoder
            .encode(&metric_families, &mut buf)
            .map_err(|e| CoreError::internal(format!("failed to encode metrics: {e}")))?;
        String::from_utf8(buf).map_err(|e| CoreError::internal(format!("metrics output was not valid utf-8: {e}")))
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }
}

impl Default for CoreMetrics {
    fn default() -> Self {
        Self::new().expect("default prometheus metric registration should never fail")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_and_gauges_start_at_zero() {
        let metrics = CoreMetrics::new().unwrap();
        let rendered = metrics.render().unwrap();
        assert!(rendered.contains("boinc_ticks_run_total 0"));
    }

    #[test]
    fn recording_a_tick_increments_the_counter() {
        let metrics = CoreMetrics::new().unwrap();
        metrics.record_tick();
        metrics.record_tick();
        let rendered = metrics.render().unwrap();
        assert!(rendered.contains("boinc_ticks_run_total 2"));
    }

    #[test]
    fn project_rec_is_labeled_by_master_url() {
        let metrics = CoreMetrics::new().unwrap();
        metrics.set_project_rec("https://example.org/", 123.5);
        let rendered = metrics.render().unwrap();
        assert!(rendered.contains("master_url=\"https://example.org/\""));
        assert!(rendered.contains("123.5"));
    }
}
