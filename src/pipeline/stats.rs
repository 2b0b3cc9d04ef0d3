//! Pipeline-wide statistics helpers.
//!
//! [`PipelineStats`] counts pipeline calls and their outcome, [`StatsManager`]
//! guards it for shared use, and [`BenchmarkStats`] aggregates per-iteration
//! phase timings into averages and tail percentiles.

use crate::core::context::StageTimings;
use crate::core::errors::OcrResult;
use serde::Serialize;
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Outcome counters over every [`Pipeline`](super::Pipeline) call.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub total_processed: usize,
    pub successful_predictions: usize,
    pub failed_predictions: usize,
    /// Mean wall time of one call, pre- and post-processing included.
    pub average_inference_time_ms: f64,
}

impl PipelineStats {
    fn percent_of_total(&self, count: usize) -> f64 {
        if self.total_processed == 0 {
            0.0
        } else {
            count as f64 * 100.0 / self.total_processed as f64
        }
    }

    /// Percentage in `[0, 100]`.
    pub fn success_rate(&self) -> f64 {
        self.percent_of_total(self.successful_predictions)
    }

    pub fn failure_rate(&self) -> f64 {
        self.percent_of_total(self.failed_predictions)
    }

    pub fn images_per_second(&self) -> f64 {
        if self.average_inference_time_ms > 0.0 {
            1000.0 / self.average_inference_time_ms
        } else {
            0.0
        }
    }
}

impl fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pipeline Statistics:")?;
        writeln!(f, "  Total processed: {}", self.total_processed)?;
        writeln!(
            f,
            "  Successful: {} ({:.1}%)",
            self.successful_predictions,
            self.success_rate()
        )?;
        writeln!(
            f,
            "  Failed: {} ({:.1}%)",
            self.failed_predictions,
            self.failure_rate()
        )?;
        writeln!(f, "  Average call time: {:.2} ms", self.average_inference_time_ms)?;
        writeln!(f, "  Processing speed: {:.2} images/sec", self.images_per_second())
    }
}

/// Shares one [`PipelineStats`] between concurrent callers.
#[derive(Debug, Default)]
pub struct StatsManager {
    stats: Mutex<PipelineStats>,
}

impl StatsManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PipelineStats> {
        // Counters stay meaningful even if a writer panicked mid-update.
        self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a copy of the current statistics snapshot.
    pub fn get_stats(&self) -> PipelineStats {
        self.lock().clone()
    }

    /// Folds `processed_count` more calls taking `inference_time_ms` in total
    /// into the running average.
    pub fn update_stats(
        &self,
        processed_count: usize,
        successful_count: usize,
        failed_count: usize,
        inference_time_ms: f64,
    ) {
        let mut stats = self.lock();
        let accumulated_ms = stats.average_inference_time_ms * stats.total_processed as f64;

        stats.total_processed += processed_count;
        stats.successful_predictions += successful_count;
        stats.failed_predictions += failed_count;
        stats.average_inference_time_ms = if stats.total_processed == 0 {
            0.0
        } else {
            (accumulated_ms + inference_time_ms) / stats.total_processed as f64
        };
    }

    /// Resets the tracked statistics to their default state.
    pub fn reset_stats(&self) {
        *self.lock() = PipelineStats::default();
    }
}

/// Identifies one benchmark run in reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkLabel {
    /// Task name, e.g. `Detection`.
    pub task: String,
    pub image: String,
    /// Backend name, e.g. `ORT-CPU`.
    pub backend: String,
    pub intra_threads: usize,
    pub inter_threads: usize,
}

/// Timings of every measured iteration.
#[derive(Debug, Clone, Default)]
pub struct BenchmarkStats {
    samples: Vec<StageTimings>,
}

impl BenchmarkStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(iterations: usize) -> Self {
        Self {
            samples: Vec::with_capacity(iterations),
        }
    }

    pub fn record(&mut self, timings: StageTimings) {
        self.samples.push(timings);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn mean_of(&self, f: impl Fn(&StageTimings) -> Duration) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().map(|t| to_ms(f(t))).sum::<f64>() / self.samples.len() as f64
    }

    pub fn avg_pre_ms(&self) -> f64 {
        self.mean_of(|t| t.pre)
    }

    pub fn avg_infer_ms(&self) -> f64 {
        self.mean_of(|t| t.infer)
    }

    pub fn avg_post_ms(&self) -> f64 {
        self.mean_of(|t| t.post)
    }

    pub fn avg_total_ms(&self) -> f64 {
        self.mean_of(StageTimings::total)
    }

    /// Total-time percentile, `p` in `[0, 1]`.
    ///
    /// Picks `sorted[min(floor(p * n), n - 1)]` without interpolation.
    pub fn percentile_total_ms(&self, p: f64) -> f64 {
        let mut totals: Vec<f64> = self.samples.iter().map(|t| to_ms(t.total())).collect();
        totals.sort_by(f64::total_cmp);
        percentile(&totals, p)
    }

    pub fn p90_total_ms(&self) -> f64 {
        self.percentile_total_ms(0.90)
    }

    pub fn p99_total_ms(&self) -> f64 {
        self.percentile_total_ms(0.99)
    }

    fn csv_record<'a>(&self, label: &'a BenchmarkLabel) -> CsvRecord<'a> {
        let ms = |v: f64| format!("{v:.3}");
        CsvRecord {
            image: &label.image,
            backend: &label.backend,
            intra_threads: label.intra_threads,
            inter_threads: label.inter_threads,
            avg_pre: ms(self.avg_pre_ms()),
            avg_infer: ms(self.avg_infer_ms()),
            avg_post: ms(self.avg_post_ms()),
            avg_total: ms(self.avg_total_ms()),
            p90_total: ms(self.p90_total_ms()),
            p99_total: ms(self.p99_total_ms()),
        }
    }

    /// Writes one CSV record to `out`, preceded by the header row when
    /// `with_header` is set.
    pub fn write_csv_to<W: io::Write>(
        &self,
        out: W,
        label: &BenchmarkLabel,
        with_header: bool,
    ) -> OcrResult<()> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(with_header)
            .from_writer(out);
        writer
            .serialize(self.csv_record(label))
            .map_err(io::Error::from)?;
        writer.flush()?;
        Ok(())
    }

    /// Appends a row to `<dir>/<task>.csv`, writing the header for a new file.
    pub fn write_csv(&self, dir: &Path, label: &BenchmarkLabel) -> OcrResult<()> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.csv", label.task));
        let is_new = !path.exists();
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        self.write_csv_to(file, label, is_new)
    }

    /// Human-readable summary.
    pub fn report(&self, label: &BenchmarkLabel) -> String {
        format!(
            "{} benchmark ({}, {}, intra={} inter={}, {} iterations)\n{}",
            label.task,
            label.image,
            label.backend,
            label.intra_threads,
            label.inter_threads,
            self.len(),
            self
        )
    }
}

impl fmt::Display for BenchmarkStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Average:")?;
        writeln!(f, "  pre:   {:.3} ms", self.avg_pre_ms())?;
        writeln!(f, "  infer: {:.3} ms", self.avg_infer_ms())?;
        writeln!(f, "  post:  {:.3} ms", self.avg_post_ms())?;
        writeln!(f, "  total: {:.3} ms", self.avg_total_ms())?;
        writeln!(f, "P90:")?;
        writeln!(f, "  total: {:.3} ms", self.p90_total_ms())?;
        writeln!(f, "P99:")?;
        writeln!(f, "  total: {:.3} ms", self.p99_total_ms())
    }
}

/// One row of the benchmark CSV.
#[derive(Debug, Serialize)]
struct CsvRecord<'a> {
    #[serde(rename = "Filename")]
    image: &'a str,
    #[serde(rename = "Infer-Backend")]
    backend: &'a str,
    #[serde(rename = "Intra-Thread")]
    intra_threads: usize,
    #[serde(rename = "Inter-Thread")]
    inter_threads: usize,
    #[serde(rename = "AvgPre(ms)")]
    avg_pre: String,
    #[serde(rename = "AvgInfer(ms)")]
    avg_infer: String,
    #[serde(rename = "AvgPost(ms)")]
    avg_post: String,
    #[serde(rename = "AvgTotal(ms)")]
    avg_total: String,
    #[serde(rename = "P90Total(ms)")]
    p90_total: String,
    #[serde(rename = "P99total(ms)")]
    p99_total: String,
}

fn to_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1e3
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((p * sorted.len() as f64).floor() as usize).min(sorted.len() - 1);
    sorted[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_are_zero_without_runs() {
        let stats = PipelineStats::default();
        assert_eq!(stats.success_rate(), 0.0);
        assert_eq!(stats.failure_rate(), 0.0);
        assert_eq!(stats.images_per_second(), 0.0);
    }

    #[test]
    fn summary_reports_rates_and_speed() {
        let stats = PipelineStats {
            total_processed: 4,
            successful_predictions: 3,
            failed_predictions: 1,
            average_inference_time_ms: 250.0,
        };
        assert_eq!(stats.success_rate(), 75.0);
        assert_eq!(stats.failure_rate(), 25.0);

        let display = stats.to_string();
        assert!(display.contains("Successful: 3 (75.0%)"));
        assert!(display.contains("Failed: 1 (25.0%)"));
        assert!(display.contains("Processing speed: 4.00 images/sec"));
    }

    #[test]
    fn stats_manager_updates_counters_and_average() {
        let manager = StatsManager::new();

        manager.update_stats(1, 1, 0, 100.0);
        let stats = manager.get_stats();
        assert_eq!(stats.total_processed, 1);
        assert_eq!(stats.successful_predictions, 1);
        assert_eq!(stats.failed_predictions, 0);
        assert_eq!(stats.average_inference_time_ms, 100.0);

        manager.update_stats(1, 0, 1, 200.0);
        let stats = manager.get_stats();
        assert_eq!(stats.total_processed, 2);
        assert_eq!(stats.successful_predictions, 1);
        assert_eq!(stats.failed_predictions, 1);
        assert!((stats.average_inference_time_ms - 150.0).abs() < f64::EPSILON);
    }

    #[test]
    fn stats_manager_resets_metrics() {
        let manager = StatsManager::new();
        manager.update_stats(5, 4, 1, 500.0);
        manager.reset_stats();

        let stats = manager.get_stats();
        assert_eq!(stats.total_processed, 0);
        assert_eq!(stats.successful_predictions, 0);
        assert_eq!(stats.failed_predictions, 0);
        assert_eq!(stats.average_inference_time_ms, 0.0);
    }

    fn timings(pre: u64, infer: u64, post: u64) -> StageTimings {
        StageTimings {
            pre: Duration::from_millis(pre),
            infer: Duration::from_millis(infer),
            post: Duration::from_millis(post),
        }
    }

    fn label() -> BenchmarkLabel {
        BenchmarkLabel {
            task: "Recognize".to_string(),
            image: "line.png".to_string(),
            backend: "ORT-CPU".to_string(),
            intra_threads: 4,
            inter_threads: 1,
        }
    }

    #[test]
    fn percentile_uses_floor_index() {
        let sorted: Vec<f64> = (1..=10).map(f64::from).collect();
        assert_eq!(percentile(&sorted, 0.90), 10.0);
        assert_eq!(percentile(&sorted, 0.5), 6.0);
        assert_eq!(percentile(&sorted, 0.99), 10.0);
        assert_eq!(percentile(&[], 0.9), 0.0);
    }

    #[test]
    fn benchmark_averages_each_phase() {
        let mut bench = BenchmarkStats::new();
        bench.record(timings(1, 10, 2));
        bench.record(timings(3, 20, 4));
        assert_eq!(bench.len(), 2);
        assert!((bench.avg_pre_ms() - 2.0).abs() < 1e-9);
        assert!((bench.avg_infer_ms() - 15.0).abs() < 1e-9);
        assert!((bench.avg_post_ms() - 3.0).abs() < 1e-9);
        assert!((bench.avg_total_ms() - 20.0).abs() < 1e-9);
        assert!((bench.p99_total_ms() - 27.0).abs() < 1e-9);
    }

    #[test]
    fn empty_benchmark_reports_zero() {
        let bench = BenchmarkStats::new();
        assert!(bench.is_empty());
        assert_eq!(bench.avg_total_ms(), 0.0);
        assert_eq!(bench.p90_total_ms(), 0.0);
    }

    #[test]
    fn report_lists_sections() {
        let mut bench = BenchmarkStats::new();
        bench.record(timings(1, 1, 1));
        let report = bench.report(&label());
        assert!(report.starts_with("Recognize benchmark"));
        assert!(report.contains("Average:"));
        assert!(report.contains("P90:"));
        assert!(report.contains("P99:"));
    }

    #[test]
    fn csv_gets_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut bench = BenchmarkStats::new();
        bench.record(timings(1, 2, 3));
        bench.write_csv(dir.path(), &label()).unwrap();
        bench.write_csv(dir.path(), &label()).unwrap();

        let content = std::fs::read_to_string(dir.path().join("Recognize.csv")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "Filename,Infer-Backend,Intra-Thread,Inter-Thread,AvgPre(ms),AvgInfer(ms),AvgPost(ms),AvgTotal(ms),P90Total(ms),P99total(ms)"
        );
        assert_eq!(lines[1], "line.png,ORT-CPU,4,1,1.000,2.000,3.000,6.000,6.000,6.000");
        assert_eq!(lines[2], lines[1]);
    }

    #[test]
    fn csv_quotes_image_names_with_commas() {
        let mut bench = BenchmarkStats::new();
        bench.record(timings(1, 2, 3));
        let label = BenchmarkLabel {
            image: "scan, page 1.png".to_string(),
            ..label()
        };
        let mut out = Vec::new();
        bench.write_csv_to(&mut out, &label, false).unwrap();

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(out.as_slice());
        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].len(), 10);
        assert_eq!(&records[0][0], "scan, page 1.png");
        assert_eq!(&records[0][1], "ORT-CPU");
    }
}
